use crate::events::{Generation, LoadOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Settled(LoadOutcome),
}

/// Per-index load record for one image set generation.
///
/// Each slot is written at most once; writes tagged with another generation are rejected.
#[derive(Debug, Clone)]
pub struct LoadState {
    generation: Generation,
    slots: Vec<Slot>,
    settled: usize,
    failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleResult {
    Recorded,
    /// Completion belongs to a replaced image set.
    Stale,
    /// Slot already settled, or index out of range.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub generation: Generation,
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl LoadState {
    pub fn new(generation: Generation, len: usize) -> Self {
        Self {
            generation,
            slots: vec![Slot::Pending; len],
            settled: 0,
            failed: 0,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// True once the fetch for `index` settled, successfully or not.
    pub fn is_loaded(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Settled(_)))
    }

    pub fn all_loaded(&self) -> bool {
        self.settled == self.slots.len()
    }

    pub fn settle(
        &mut self,
        generation: Generation,
        index: usize,
        outcome: LoadOutcome,
    ) -> SettleResult {
        if generation != self.generation {
            return SettleResult::Stale;
        }
        match self.slots.get_mut(index) {
            Some(slot) if *slot == Slot::Pending => {
                *slot = Slot::Settled(outcome);
                self.settled += 1;
                if outcome == LoadOutcome::Failed {
                    self.failed += 1;
                }
                SettleResult::Recorded
            }
            _ => SettleResult::Ignored,
        }
    }

    pub fn report(&self) -> LoadReport {
        LoadReport {
            generation: self.generation,
            total: self.slots.len(),
            loaded: self.settled - self.failed,
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_completions_fill_independent_slots() {
        let mut state = LoadState::new(Generation(1), 3);
        assert_eq!(
            state.settle(Generation(1), 2, LoadOutcome::Loaded),
            SettleResult::Recorded
        );
        assert!(!state.is_loaded(0));
        assert!(state.is_loaded(2));
        state.settle(Generation(1), 0, LoadOutcome::Failed);
        assert!(state.is_loaded(0));
        assert!(!state.all_loaded());
        state.settle(Generation(1), 1, LoadOutcome::Loaded);
        assert!(state.all_loaded());
        let report = state.report();
        assert_eq!((report.total, report.loaded, report.failed), (3, 2, 1));
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut state = LoadState::new(Generation(2), 2);
        assert_eq!(
            state.settle(Generation(1), 0, LoadOutcome::Loaded),
            SettleResult::Stale
        );
        assert!(!state.is_loaded(0));
    }

    #[test]
    fn slots_are_written_once() {
        let mut state = LoadState::new(Generation(0), 1);
        state.settle(Generation(0), 0, LoadOutcome::Failed);
        assert_eq!(
            state.settle(Generation(0), 0, LoadOutcome::Loaded),
            SettleResult::Ignored
        );
        assert_eq!(
            state.settle(Generation(0), 5, LoadOutcome::Loaded),
            SettleResult::Ignored
        );
        assert_eq!(state.report().failed, 1);
    }
}
