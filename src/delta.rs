// Per-entity delta state for cumulative counters.

use std::collections::HashMap;
use std::hash::Hash;

/// A snapshot of monotonically non-decreasing counters.
pub trait Cumulative: Copy + Default {
    /// Counter-wise `self - prev`, clamped at zero.
    ///
    /// A counter that went backwards was reset underneath us (device re-created,
    /// counter wrapped); that interval reports zero instead of a bogus huge value.
    fn delta_since(&self, prev: &Self) -> Self;
}

/// Most recent snapshot per tracked entity.
#[derive(Debug)]
pub struct DeltaState<K, C> {
    previous: HashMap<K, C>,
}

impl<K, C> Default for DeltaState<K, C> {
    fn default() -> Self {
        Self {
            previous: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, C: Cumulative> DeltaState<K, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the zero baseline for `key` without producing a delta.
    pub fn prime(&mut self, key: K, snapshot: C) {
        self.previous.insert(key, snapshot);
    }

    /// Returns the delta against the previous snapshot and replaces it.
    /// An entity seen for the first time reports all-zero.
    pub fn advance(&mut self, key: K, snapshot: C) -> C {
        match self.previous.insert(key, snapshot) {
            Some(prev) => snapshot.delta_since(&prev),
            None => C::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Bytes(u64);

    impl Cumulative for Bytes {
        fn delta_since(&self, prev: &Self) -> Self {
            Bytes(self.0.saturating_sub(prev.0))
        }
    }

    #[test]
    fn first_advance_is_zero_baseline() {
        let mut state = DeltaState::new();
        assert_eq!(state.advance("eth0", Bytes(5_000)), Bytes(0));
        assert_eq!(state.advance("eth0", Bytes(5_300)), Bytes(300));
    }

    #[test]
    fn primed_baseline_is_used_by_first_advance() {
        let mut state = DeltaState::new();
        state.prime((), Bytes(100));
        assert_eq!(state.advance((), Bytes(150)), Bytes(50));
    }

    #[test]
    fn deltas_are_never_negative() {
        let mut state = DeltaState::new();
        let samples = [10, 20, 20, 5, 40, 41];
        state.prime(1u32, Bytes(samples[0]));
        for pair in samples.windows(2) {
            let d = state.advance(1, Bytes(pair[1]));
            assert_eq!(d.0, pair[1].saturating_sub(pair[0]));
        }
    }

    #[test]
    fn entities_are_independent() {
        let mut state = DeltaState::new();
        state.prime("a", Bytes(1));
        state.prime("b", Bytes(100));
        assert_eq!(state.advance("a", Bytes(3)), Bytes(2));
        assert_eq!(state.advance("b", Bytes(160)), Bytes(60));
        assert_eq!(state.advance("c", Bytes(500)), Bytes(0));
        assert_eq!(state.len(), 3);
    }
}
