//! First-match resolution over condition lists.

#![allow(missing_docs)]

use serde::Serialize;

use crate::state::store::ChipSource;
use crate::tree::model::Condition;

/// Result of resolving a condition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Found(usize),
    NotFound,
}

impl Resolution {
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Found(i) => Some(i),
            Self::NotFound => None,
        }
    }
}

impl Condition {
    /// Every `indices[i]` must hold `values[i]`. A condition with more indices
    /// than values never holds; surplus values are ignored.
    #[must_use]
    pub fn is_satisfied(&self, state: &impl ChipSource) -> bool {
        if self.indices.len() > self.values.len() {
            return false;
        }
        self.indices
            .iter()
            .zip(&self.values)
            .all(|(&index, &value)| state.chip_value(index) == value)
    }
}

/// Index of the first satisfied condition in list order.
pub fn resolve<'a, I>(conditions: I, state: &impl ChipSource) -> Resolution
where
    I: IntoIterator<Item = &'a Condition>,
{
    conditions
        .into_iter()
        .position(|c| c.is_satisfied(state))
        .map_or(Resolution::NotFound, Resolution::Found)
}
