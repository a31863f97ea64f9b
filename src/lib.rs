//! Persistence and playback-queue core of a music player daemon: stable
//! song ids, the queue/order/priority machinery, the playlist state
//! machine that drives a player, per-partition bundling of queue/mixer/
//! outputs, and the on-disk state file that survives a restart.
//!
//! Everything that touches real audio, the network, or a database lives
//! outside this crate, represented here only as the traits
//! ([`player_control::PlayerControl`], [`mixer::MixerMemento`],
//! [`output::OutputSet`], [`storage::CompositeStorage`],
//! [`song_loader::SongLoader`]) this crate needs to stay in sync with them.

pub mod config;
pub mod error;
pub mod id_table;
pub mod listener;
pub mod mixer;
pub mod output;
pub mod partition;
pub mod player_control;
pub mod playlist;
pub mod queue;
pub mod rand_engine;
pub mod song;
pub mod song_loader;
pub mod state_file;
pub mod storage;

pub use error::{QueueError, QueueResult};
pub use id_table::IdTable;
pub use partition::Partition;
pub use playlist::Playlist;
pub use queue::{ConsumeMode, Queue, SingleMode};
pub use song::{DetachedSong, Tag};
pub use state_file::{RestoreReport, StateFile};
