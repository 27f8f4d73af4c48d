//! Chip and choice-chip state store.
//!
//! Mutators are plain synchronous writes: once a setter returns, the next
//! resolution pass observes the new value.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::Serialize;

use crate::tree::model::{ChipDescriptor, ChipIndex, ChipValue};

/// Read access to chip values for the resolution engine.
pub trait ChipSource {
    /// Value of chip `index`, 0 when never set.
    fn chip_value(&self, index: ChipIndex) -> ChipValue;
}

impl ChipSource for BTreeMap<ChipIndex, ChipValue> {
    fn chip_value(&self, index: ChipIndex) -> ChipValue {
        self.get(&index).copied().unwrap_or(0)
    }
}

/// Line-local chip belonging to a choice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceChip {
    pub labels: Vec<String>,
    pub value: ChipValue,
}

/// Outcome of a bucket toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketToggle {
    Selected(i64),
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientState {
    chip_values: BTreeMap<ChipIndex, ChipValue>,
    selected_bucket: Option<i64>,
    choice_chips: BTreeMap<ChipIndex, ChoiceChip>,
}

impl ClientState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_chip(&self, index: ChipIndex) -> ChipValue {
        self.chip_values.chip_value(index)
    }

    /// Returns the previous value.
    pub fn set_chip(&mut self, index: ChipIndex, value: ChipValue) -> ChipValue {
        self.chip_values.insert(index, value).unwrap_or(0)
    }

    #[must_use]
    pub const fn selected_bucket(&self) -> Option<i64> {
        self.selected_bucket
    }

    /// Select `index`, or clear when it is already selected.
    pub fn toggle_bucket(&mut self, index: i64) -> BucketToggle {
        if self.selected_bucket == Some(index) {
            self.selected_bucket = None;
            BucketToggle::Cleared
        } else {
            self.selected_bucket = Some(index);
            BucketToggle::Selected(index)
        }
    }

    pub fn clear_bucket(&mut self) {
        self.selected_bucket = None;
    }

    /// Adopt a selection decided elsewhere, such as the map-wide filter.
    pub const fn set_selected_bucket(&mut self, bucket: Option<i64>) {
        self.selected_bucket = bucket;
    }

    /// Replace chip values with response defaults (`defaults[i]` → chip `i`)
    /// and clear the bucket selection.
    pub fn seed_defaults(&mut self, defaults: &[ChipValue]) {
        self.chip_values = (0..)
            .zip(defaults.iter().copied())
            .collect::<BTreeMap<ChipIndex, ChipValue>>();
        self.selected_bucket = None;
    }

    /// Register the choice chips of a new tree, each starting at 0.
    pub fn register_choice_chips<'a>(&mut self, chips: impl IntoIterator<Item = &'a ChipDescriptor>) {
        self.choice_chips = chips
            .into_iter()
            .map(|chip| {
                (
                    chip.index,
                    ChoiceChip {
                        labels: chip.labels.clone(),
                        value: 0,
                    },
                )
            })
            .collect();
    }

    #[must_use]
    pub fn choice_chip(&self, index: ChipIndex) -> Option<&ChoiceChip> {
        self.choice_chips.get(&index)
    }

    /// Set a choice chip, clamped to its label range. Returns the stored value,
    /// or `None` for an unregistered chip.
    pub fn set_choice_chip(&mut self, index: ChipIndex, value: ChipValue) -> Option<ChipValue> {
        let chip = self.choice_chips.get_mut(&index)?;
        let max = i64::try_from(chip.labels.len()).unwrap_or(i64::MAX).saturating_sub(1).max(0);
        chip.value = value.clamp(0, max);
        Some(chip.value)
    }

    /// Chip values currently set, for diagnostics.
    #[must_use]
    pub const fn chip_values(&self) -> &BTreeMap<ChipIndex, ChipValue> {
        &self.chip_values
    }
}

impl ChipSource for ClientState {
    fn chip_value(&self, index: ChipIndex) -> ChipValue {
        self.get_chip(index)
    }
}
