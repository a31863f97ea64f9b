//! A named bundle of one queue/playlist, mixer, output set and player.
//!
//! Multiple partitions may coexist in a single process, each driving its
//! own audio outputs; outputs can migrate between partitions by name (see
//! [`Partition::move_output_to`]). The first partition created by a daemon
//! is conventionally `"default"` — it is also the only partition the
//! [`crate::state_file`] persists storage mounts for.

use crate::listener::QueueListener;
use crate::mixer::MixerMemento;
use crate::output::OutputSet;
use crate::player_control::PlayerControl;
use crate::playlist::Playlist;

pub const DEFAULT_PARTITION_NAME: &str = "default";

/// One queue+playlist+outputs bundle. Owns its slice of the audio stack;
/// the surrounding daemon owns the `Vec<Partition>` and routes client
/// connections to whichever one they're attached to.
pub struct Partition {
    pub name: String,
    pub playlist: Playlist,
    pub mixer: Box<dyn MixerMemento>,
    pub outputs: Box<dyn OutputSet>,
    pub player: Box<dyn PlayerControl>,
}

impl Partition {
    pub fn new(
        name: impl Into<String>,
        max_length: usize,
        listener: Box<dyn QueueListener>,
        mixer: Box<dyn MixerMemento>,
        outputs: Box<dyn OutputSet>,
        player: Box<dyn PlayerControl>,
    ) -> Self {
        Self {
            name: name.into(),
            playlist: Playlist::new(max_length, listener),
            mixer,
            outputs,
            player,
        }
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_PARTITION_NAME
    }

    /// Moves the named output from `self` to `other`, preserving its
    /// enabled state. Returns whether an output by that name was found.
    pub fn move_output_to(&mut self, other: &mut Partition, name: &str) -> bool {
        let Some(output) = self.outputs.remove(name) else {
            return false;
        };
        let enabled = output.enabled;
        other.outputs.add_move_from(output, enabled);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NullQueueListener;
    use crate::mixer::testing::MockMixer;
    use crate::output::OutputState;
    use crate::output::testing::MockOutputSet;
    use crate::player_control::{PlayerError, PlayerStatus, SyncInfo};
    use crate::song::DetachedSong;
    use std::time::Duration;

    struct NullPlayer;

    impl PlayerControl for NullPlayer {
        fn play(&mut self, _song: DetachedSong) -> Result<(), PlayerError> {
            Ok(())
        }
        fn enqueue_song(&mut self, _song: DetachedSong) -> Result<(), PlayerError> {
            Ok(())
        }
        fn cancel(&mut self) {}
        fn stop(&mut self) {}
        fn pause(&mut self) {}
        fn set_pause(&mut self, _pause: bool) {}
        fn seek(&mut self, _song: DetachedSong, _time: Duration) -> Result<(), PlayerError> {
            Ok(())
        }
        fn set_cross_fade(&mut self, _duration: Duration) {}
        fn set_mixramp_db(&mut self, _db: f32) {}
        fn set_mixramp_delay(&mut self, _delay: Option<Duration>) {}
        fn set_border_pause(&mut self, _border_pause: bool) {}
        fn clear_error(&mut self) {}
        fn update_audio(&mut self) {}
        fn get_status(&self) -> PlayerStatus {
            PlayerStatus::default()
        }
        fn get_sync_info(&self) -> SyncInfo {
            SyncInfo {
                state: crate::player_control::PlayerState::Stop,
                has_next_song: false,
            }
        }
    }

    fn partition(name: &str) -> Partition {
        partition_with_outputs(name, MockOutputSet::default())
    }

    fn partition_with_outputs(name: &str, outputs: MockOutputSet) -> Partition {
        Partition::new(
            name,
            16,
            Box::new(NullQueueListener),
            Box::new(MockMixer::default()),
            Box::new(outputs),
            Box::new(NullPlayer),
        )
    }

    #[test]
    fn first_partition_named_default_reports_is_default() {
        let p = partition(DEFAULT_PARTITION_NAME);
        assert!(p.is_default());
        let other = partition("upstairs");
        assert!(!other.is_default());
    }

    #[test]
    fn move_output_to_transfers_output_between_partitions() {
        let mut outputs = MockOutputSet::default();
        outputs.outputs.push(OutputState {
            name: "speakers".into(),
            enabled: true,
        });
        let mut default = partition_with_outputs(DEFAULT_PARTITION_NAME, outputs);
        let mut upstairs = partition("upstairs");

        assert!(default.move_output_to(&mut upstairs, "speakers"));
        assert!(default.outputs.find_by_name("speakers").is_none());
        assert!(upstairs.outputs.find_by_name("speakers").unwrap().enabled);
    }

    #[test]
    fn move_output_to_reports_missing_output() {
        let mut default = partition(DEFAULT_PARTITION_NAME);
        let mut upstairs = partition("upstairs");
        assert!(!default.move_output_to(&mut upstairs, "nope"));
    }
}
