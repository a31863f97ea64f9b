//! Software-volume persistence boundary. A real mixer lives outside this
//! crate; `MixerMemento` is the sliver of its interface the state file
//! needs to save/restore software volume across restarts.

/// Software volume, 0..=100. Hardware mixers aren't covered by the state
/// file (only software volume round-trips, per the original design).
pub trait MixerMemento {
    /// A cheap hash of the current software-volume state, used by the
    /// state file to decide whether a rewrite is needed.
    fn software_volume_state_hash(&self) -> u32;

    fn save_software_volume_state(&self) -> Option<u8>;

    fn load_software_volume_state(&mut self, volume: u8);

    fn volume(&self) -> Option<u8>;

    fn set_volume(&mut self, volume: u8);
}
