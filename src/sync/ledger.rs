//! Highlight reference counts shared by every outliner on one map.
//!
//! Counts are unsigned. A decrement at zero is clamped and reported as
//! [`Transition::Underflow`] so the caller can journal it.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use crate::tree::model::FeatureId;

/// Effect of one counter change on the map's visible highlight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 0 → 1: the feature became highlighted.
    Added,
    /// 1 → 0: the feature is no longer highlighted.
    Removed,
    /// Count changed but visibility did not.
    Unchanged,
    /// Decrement attempted at zero; clamped.
    Underflow,
}

#[derive(Debug, Clone, Default)]
pub struct HighlightLedger {
    counts: BTreeMap<FeatureId, u32>,
}

impl HighlightLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, id: &FeatureId) -> Transition {
        let count = self.counts.entry(id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        if *count == 1 {
            Transition::Added
        } else {
            Transition::Unchanged
        }
    }

    pub fn decrement(&mut self, id: &FeatureId) -> Transition {
        match self.counts.get_mut(id) {
            None => Transition::Underflow,
            Some(count) if *count <= 1 => {
                self.counts.remove(id);
                Transition::Removed
            }
            Some(count) => {
                *count -= 1;
                Transition::Unchanged
            }
        }
    }

    #[must_use]
    pub fn count(&self, id: &FeatureId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_highlighted(&self, id: &FeatureId) -> bool {
        self.count(id) > 0
    }

    /// Number of features with a positive count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn f(id: u64) -> FeatureId {
        FeatureId::new("/area/openstreetmap.org/way", id)
    }

    #[test]
    fn shared_highlight_survives_first_release() {
        let mut ledger = HighlightLedger::new();
        assert_eq!(ledger.increment(&f(1)), Transition::Added);
        assert_eq!(ledger.increment(&f(1)), Transition::Unchanged);
        assert_eq!(ledger.decrement(&f(1)), Transition::Unchanged);
        assert!(ledger.is_highlighted(&f(1)));
        assert_eq!(ledger.decrement(&f(1)), Transition::Removed);
        assert!(!ledger.is_highlighted(&f(1)));
    }

    #[test]
    fn decrement_at_zero_is_clamped() {
        let mut ledger = HighlightLedger::new();
        assert_eq!(ledger.decrement(&f(9)), Transition::Underflow);
        assert_eq!(ledger.count(&f(9)), 0);
        assert_eq!(ledger.increment(&f(9)), Transition::Added);
    }

    proptest! {
        #[test]
        fn count_matches_clamped_model(ops in prop::collection::vec((0_u64..4, any::<bool>()), 0..64)) {
            let mut ledger = HighlightLedger::new();
            let mut model = [0_u32; 4];
            for (id, up) in ops {
                let slot = &mut model[usize::try_from(id).unwrap()];
                let transition = if up { ledger.increment(&f(id)) } else { ledger.decrement(&f(id)) };
                let before = *slot;
                if up {
                    *slot += 1;
                    prop_assert_eq!(transition == Transition::Added, before == 0);
                } else {
                    *slot = slot.saturating_sub(1);
                    prop_assert_eq!(transition == Transition::Underflow, before == 0);
                    prop_assert_eq!(transition == Transition::Removed, before == 1);
                }
                prop_assert_eq!(ledger.count(&f(id)), *slot);
            }
        }

        #[test]
        fn balanced_sequences_return_to_empty(ids in prop::collection::vec(0_u64..8, 0..32)) {
            let mut ledger = HighlightLedger::new();
            for id in &ids {
                ledger.increment(&f(*id));
            }
            for id in ids.iter().rev() {
                prop_assert_ne!(ledger.decrement(&f(*id)), Transition::Underflow);
            }
            prop_assert!(ledger.is_empty());
        }
    }
}
