//! Highlight and bucket synchronizer.
//!
//! One [`MapSynchronizer`] exists per map and is shared by every outliner on
//! it. Each outliner's published contribution is remembered so that updates
//! issue only the delta and teardown issues the exact inverse, once. Highlight
//! visibility goes through the [`HighlightLedger`]; the map collaborator only
//! sees 0 → 1 and 1 → 0 transitions.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::config::SyncConfig;
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::logger::sink::EventSink;
use crate::resolve::select::{active_geometry, active_layers, bucket_assignments};
use crate::state::store::ChipSource;
use crate::sync::ledger::{HighlightLedger, Transition};
use crate::sync::map::MapCollaborator;
use crate::tree::model::{DisplayResponse, FeatureId, TileLayer};

/// Identifier of an outliner instance.
pub type OutlinerId = u64;

/// Handle shared by all outliners on one map.
pub type SharedSynchronizer = Arc<Mutex<MapSynchronizer>>;

/// Map contribution of one outliner after resolution against its state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub highlights: Vec<FeatureId>,
    pub buckets: Vec<(FeatureId, usize)>,
    /// `(side table index, collection)` of the active geometry alternative.
    pub geometry: Option<(usize, Value)>,
    pub layers: Vec<TileLayer>,
}

impl MapState {
    /// Resolve a response's side tables against `state`.
    #[must_use]
    pub fn resolve(response: &DisplayResponse, state: &impl ChipSource) -> Self {
        Self {
            highlights: response.highlighted.clone(),
            buckets: bucket_assignments(&response.bucketed, state),
            geometry: active_geometry(&response.geometry, &response.geojson, state)
                .map(|(index, collection)| (index, collection.clone())),
            layers: active_layers(&response.layers, state)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Contribution {
    highlights: BTreeSet<FeatureId>,
    buckets: BTreeMap<FeatureId, usize>,
    /// Shown alternative; compared by collection as well as index.
    geometry: Option<(usize, Value)>,
    layers: Vec<TileLayer>,
}

/// Calls issued by one synchronization step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub highlights_added: usize,
    pub highlights_removed: usize,
    pub buckets_set: usize,
    /// Buckets were cleared and every surviving assignment replayed.
    pub buckets_replayed: bool,
    pub geometry_changed: bool,
    pub layers_changed: usize,
}

pub struct MapSynchronizer {
    map: Arc<dyn MapCollaborator>,
    config: SyncConfig,
    ledger: HighlightLedger,
    contributions: BTreeMap<OutlinerId, Contribution>,
    /// Active bucket filter and the outliner that set it.
    filter: Option<(OutlinerId, i64)>,
    sink: Arc<dyn EventSink>,
}

impl MapSynchronizer {
    #[must_use]
    pub fn new(map: Arc<dyn MapCollaborator>, config: SyncConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            map,
            config,
            ledger: HighlightLedger::new(),
            contributions: BTreeMap::new(),
            filter: None,
            sink,
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedSynchronizer {
        Arc::new(Mutex::new(self))
    }

    /// Publish a newly activated tree, superseding any earlier one from the
    /// same outliner. A bucket filter set from the superseded tree is cleared.
    pub fn activate(&mut self, outliner: OutlinerId, desired: &MapState) -> SyncReport {
        let superseded = self.contributions.contains_key(&outliner);
        let report = self.apply(outliner, desired);
        if superseded && self.bucket_filter_for(outliner).is_some() {
            self.filter = None;
            self.map.set_active_bucket_filter(None);
        }
        let event = if superseded {
            EventType::TreeSuperseded
        } else {
            EventType::TreeActivated
        };
        self.sink.record(
            LogEntry::new(event, Severity::Info)
                .outliner(outliner)
                .count(report.highlights_added as u64),
        );
        report
    }

    /// Re-publish after a state change; only the delta reaches the map.
    pub fn resync(&mut self, outliner: OutlinerId, desired: &MapState) -> SyncReport {
        if !self.contributions.contains_key(&outliner) {
            return SyncReport::default();
        }
        self.apply(outliner, desired)
    }

    /// Withdraw everything `outliner` contributed. A second teardown is a
    /// journaled no-op and returns `false`.
    pub fn deactivate(&mut self, outliner: OutlinerId) -> bool {
        let Some(contribution) = self.contributions.remove(&outliner) else {
            self.sink.record(
                LogEntry::new(EventType::DoubleTeardown, Severity::Warning)
                    .outliner(outliner)
                    .details("teardown for outliner with no published contribution"),
            );
            return false;
        };

        for id in &contribution.highlights {
            self.release(outliner, id);
        }
        if !contribution.buckets.is_empty() {
            self.replay_buckets();
        }
        if contribution.geometry.is_some() {
            self.map.remove_geometry(&layer_name(outliner));
        }
        for layer in &contribution.layers {
            self.map.remove_tile_layer(&layer_name(outliner), layer);
        }
        if matches!(self.filter, Some((owner, _)) if owner == outliner) {
            self.filter = None;
            self.map.set_active_bucket_filter(None);
        }

        self.sink.record(
            LogEntry::new(EventType::TreeDeactivated, Severity::Info)
                .outliner(outliner)
                .count(contribution.highlights.len() as u64),
        );
        true
    }

    /// Set the map-wide bucket filter; the most recent toggle wins.
    pub fn set_bucket_filter(&mut self, outliner: OutlinerId, bucket: Option<i64>) {
        self.filter = bucket.map(|b| (outliner, b));
        self.map.set_active_bucket_filter(bucket);
    }

    #[must_use]
    pub fn bucket_filter(&self) -> Option<i64> {
        self.filter.map(|(_, b)| b)
    }

    /// The active filter, if `outliner` is the one that set it.
    #[must_use]
    pub fn bucket_filter_for(&self, outliner: OutlinerId) -> Option<i64> {
        self.filter
            .and_then(|(owner, bucket)| (owner == outliner).then_some(bucket))
    }

    #[must_use]
    pub fn highlight_count(&self, id: &FeatureId) -> u32 {
        self.ledger.count(id)
    }

    #[must_use]
    pub fn is_highlighted(&self, id: &FeatureId) -> bool {
        self.ledger.is_highlighted(id)
    }

    #[must_use]
    pub fn is_active(&self, outliner: OutlinerId) -> bool {
        self.contributions.contains_key(&outliner)
    }

    #[must_use]
    pub fn active_outliners(&self) -> Vec<OutlinerId> {
        self.contributions.keys().copied().collect()
    }

    // ──────────────────── delta application ────────────────────

    fn apply(&mut self, outliner: OutlinerId, desired: &MapState) -> SyncReport {
        let mut current = self.contributions.remove(&outliner).unwrap_or_default();
        let mut report = SyncReport::default();

        let highlights: BTreeSet<FeatureId> = desired
            .highlights
            .iter()
            .filter(|id| self.config.is_highlightable(id.kind()))
            .cloned()
            .collect();
        for id in highlights.difference(&current.highlights) {
            if self.ledger.increment(id) == Transition::Added {
                self.map.add_highlight(id);
            }
            report.highlights_added += 1;
        }
        for id in current.highlights.difference(&highlights) {
            self.release(outliner, id);
            report.highlights_removed += 1;
        }
        current.highlights = highlights;

        // First assignment wins when a feature appears in several buckets.
        let mut buckets = BTreeMap::new();
        for (id, bucket) in &desired.buckets {
            buckets.entry(id.clone()).or_insert(*bucket);
        }
        let dropped = current
            .buckets
            .iter()
            .any(|(id, bucket)| buckets.get(id) != Some(bucket));
        let changed: Vec<(FeatureId, usize)> = buckets
            .iter()
            .filter(|(id, bucket)| current.buckets.get(*id) != Some(*bucket))
            .map(|(id, bucket)| (id.clone(), *bucket))
            .collect();
        let shadowed = changed.iter().any(|(id, _)| {
            self.contributions
                .range((Bound::Excluded(outliner), Bound::Unbounded))
                .any(|(_, c)| c.buckets.contains_key(id))
        });
        current.buckets = buckets;

        if current.geometry != desired.geometry {
            let layer = layer_name(outliner);
            if current.geometry.is_some() {
                self.map.remove_geometry(&layer);
            }
            if let Some((_, collection)) = &desired.geometry {
                self.map.show_geometry(&layer, collection);
            }
            current.geometry.clone_from(&desired.geometry);
            report.geometry_changed = true;
        }

        let owner = layer_name(outliner);
        for layer in current.layers.iter().filter(|l| !desired.layers.contains(l)) {
            self.map.remove_tile_layer(&owner, layer);
            report.layers_changed += 1;
        }
        for layer in desired.layers.iter().filter(|l| !current.layers.contains(l)) {
            self.map.show_tile_layer(&owner, layer);
            report.layers_changed += 1;
        }
        current.layers = desired.layers.clone();

        self.contributions.insert(outliner, current);

        if dropped || shadowed {
            report.buckets_set = self.replay_buckets();
            report.buckets_replayed = true;
        } else {
            for (id, bucket) in &changed {
                self.map.set_bucket(id, *bucket);
            }
            report.buckets_set = changed.len();
        }
        report
    }

    fn release(&mut self, outliner: OutlinerId, id: &FeatureId) {
        match self.ledger.decrement(id) {
            Transition::Removed => self.map.remove_highlight(id),
            Transition::Underflow => self.sink.record(
                LogEntry::new(EventType::HighlightUnderflow, Severity::Warning)
                    .outliner(outliner)
                    .feature(id.to_string()),
            ),
            Transition::Added | Transition::Unchanged => {}
        }
    }

    /// Clear every bucket and replay surviving assignments in outliner order,
    /// so later outliners win shared features.
    fn replay_buckets(&self) -> usize {
        self.map.clear_buckets();
        let mut issued = 0;
        for contribution in self.contributions.values() {
            for (id, bucket) in &contribution.buckets {
                self.map.set_bucket(id, *bucket);
                issued += 1;
            }
        }
        issued
    }
}

fn layer_name(outliner: OutlinerId) -> String {
    format!("outliner-{outliner}")
}
