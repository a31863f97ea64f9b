//! Audio output enable/disable state, as persisted by the state file.
//!
//! The real output set drives actual sound cards or network sinks; this
//! crate only needs enough of its interface to save and restore which
//! outputs were enabled.

/// One output's persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputState {
    pub name: String,
    pub enabled: bool,
}

/// The state-file-relevant slice of the output set: enumerate outputs,
/// look one up by name, and toggle enablement during restore.
pub trait OutputSet {
    fn outputs(&self) -> Vec<OutputState>;

    fn find_by_name(&self, name: &str) -> Option<OutputState>;

    fn set_enabled(&mut self, name: &str, enabled: bool);

    /// Removes and returns the named output, e.g. as the first half of
    /// moving it to another partition.
    fn remove(&mut self, name: &str) -> Option<OutputState>;

    /// Adopts `output` into this set with the given enabled state, e.g.
    /// as the second half of a cross-partition move (`CompositeStorage`'s
    /// `AddMoveFrom`).
    fn add_move_from(&mut self, output: OutputState, enabled: bool);

    /// A version counter bumped whenever any output's enabled state
    /// changes, so the state file can skip an unnecessary rewrite.
    fn state_version(&self) -> u32;
}


#[cfg(test)]
mod tests {
    use super::testing::MockOutputSet;
    use super::{OutputSet, OutputState};

    #[test]
    fn remove_then_add_move_from_transfers_state() {
        let mut source = MockOutputSet::default();
        source.outputs.push(OutputState {
            name: "speakers".into(),
            enabled: false,
        });

        let mut target = MockOutputSet::default();
        let moved = source.remove("speakers").expect("output present");
        assert!(source.find_by_name("speakers").is_none());

        target.add_move_from(moved, true);
        assert!(target.find_by_name("speakers").unwrap().enabled);
    }
}
