//! Map-rendering collaborator seam and a recording implementation.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::tree::model::{FeatureId, TileLayer};

/// Operations the synchronizer issues against the map. Calls are
/// fire-and-forget; reference counting happens before they are issued, so
/// implementations see set semantics for highlights.
pub trait MapCollaborator: Send + Sync {
    fn add_highlight(&self, id: &FeatureId);
    fn remove_highlight(&self, id: &FeatureId);
    fn set_bucket(&self, id: &FeatureId, bucket: usize);
    fn clear_buckets(&self);
    fn set_active_bucket_filter(&self, bucket: Option<i64>);
    /// Show `collection` as the geometry layer named `layer`, replacing it.
    fn show_geometry(&self, layer: &str, collection: &Value);
    fn remove_geometry(&self, layer: &str);
    fn show_tile_layer(&self, owner: &str, layer: &TileLayer);
    fn remove_tile_layer(&self, owner: &str, layer: &TileLayer);
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum MapCall {
    AddHighlight { feature: String },
    RemoveHighlight { feature: String },
    SetBucket { feature: String, bucket: usize },
    ClearBuckets,
    SetActiveBucketFilter { bucket: Option<i64> },
    ShowGeometry { layer: String },
    RemoveGeometry { layer: String },
    ShowTileLayer { owner: String, path: String },
    RemoveTileLayer { owner: String, path: String },
}

#[derive(Debug, Default)]
struct RecordedState {
    calls: Vec<MapCall>,
    highlighted: BTreeSet<FeatureId>,
    buckets: BTreeMap<FeatureId, usize>,
    filter: Option<i64>,
    geometry: BTreeMap<String, Value>,
    tile_layers: BTreeSet<(String, String)>,
}

/// In-memory map that records every call and tracks the visible result.
#[derive(Debug, Default)]
pub struct RecordingMap {
    inner: Mutex<RecordedState>,
}

impl RecordingMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<MapCall> {
        self.inner.lock().calls.clone()
    }

    /// Drain recorded calls, keeping the visible state.
    pub fn take_calls(&self) -> Vec<MapCall> {
        std::mem::take(&mut self.inner.lock().calls)
    }

    #[must_use]
    pub fn is_highlighted(&self, id: &FeatureId) -> bool {
        self.inner.lock().highlighted.contains(id)
    }

    #[must_use]
    pub fn highlighted(&self) -> BTreeSet<FeatureId> {
        self.inner.lock().highlighted.clone()
    }

    #[must_use]
    pub fn bucket_of(&self, id: &FeatureId) -> Option<usize> {
        self.inner.lock().buckets.get(id).copied()
    }

    #[must_use]
    pub fn bucket_filter(&self) -> Option<i64> {
        self.inner.lock().filter
    }

    #[must_use]
    pub fn geometry_layers(&self) -> Vec<String> {
        self.inner.lock().geometry.keys().cloned().collect()
    }

    #[must_use]
    pub fn geometry(&self, layer: &str) -> Option<Value> {
        self.inner.lock().geometry.get(layer).cloned()
    }

    #[must_use]
    pub fn tile_layers(&self) -> Vec<(String, String)> {
        self.inner.lock().tile_layers.iter().cloned().collect()
    }
}

impl MapCollaborator for RecordingMap {
    fn add_highlight(&self, id: &FeatureId) {
        let mut inner = self.inner.lock();
        inner.highlighted.insert(id.clone());
        inner.calls.push(MapCall::AddHighlight {
            feature: id.to_string(),
        });
    }

    fn remove_highlight(&self, id: &FeatureId) {
        let mut inner = self.inner.lock();
        inner.highlighted.remove(id);
        inner.calls.push(MapCall::RemoveHighlight {
            feature: id.to_string(),
        });
    }

    fn set_bucket(&self, id: &FeatureId, bucket: usize) {
        let mut inner = self.inner.lock();
        inner.buckets.insert(id.clone(), bucket);
        inner.calls.push(MapCall::SetBucket {
            feature: id.to_string(),
            bucket,
        });
    }

    fn clear_buckets(&self) {
        let mut inner = self.inner.lock();
        inner.buckets.clear();
        inner.calls.push(MapCall::ClearBuckets);
    }

    fn set_active_bucket_filter(&self, bucket: Option<i64>) {
        let mut inner = self.inner.lock();
        inner.filter = bucket;
        inner.calls.push(MapCall::SetActiveBucketFilter { bucket });
    }

    fn show_geometry(&self, layer: &str, collection: &Value) {
        let mut inner = self.inner.lock();
        inner.geometry.insert(layer.to_string(), collection.clone());
        inner.calls.push(MapCall::ShowGeometry {
            layer: layer.to_string(),
        });
    }

    fn remove_geometry(&self, layer: &str) {
        let mut inner = self.inner.lock();
        inner.geometry.remove(layer);
        inner.calls.push(MapCall::RemoveGeometry {
            layer: layer.to_string(),
        });
    }

    fn show_tile_layer(&self, owner: &str, layer: &TileLayer) {
        let mut inner = self.inner.lock();
        inner
            .tile_layers
            .insert((owner.to_string(), layer.path.clone()));
        inner.calls.push(MapCall::ShowTileLayer {
            owner: owner.to_string(),
            path: layer.path.clone(),
        });
    }

    fn remove_tile_layer(&self, owner: &str, layer: &TileLayer) {
        let mut inner = self.inner.lock();
        inner
            .tile_layers
            .remove(&(owner.to_string(), layer.path.clone()));
        inner.calls.push(MapCall::RemoveTileLayer {
            owner: owner.to_string(),
            path: layer.path.clone(),
        });
    }
}
