//! Evaluation request envelope sent to the backend.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::model::{MapCenter, NodeRef};

/// Map view context attached to a request for logging on the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewContext {
    pub lat_e7: i64,
    pub lng_e7: i64,
    pub zoom: f64,
}

/// Point in E7 fixed-point degrees, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointE7 {
    pub lat_e7: i64,
    pub lng_e7: i64,
}

impl From<MapCenter> for PointE7 {
    fn from(value: MapCenter) -> Self {
        Self {
            lat_e7: value.lat_e7,
            lng_e7: value.lng_e7,
        }
    }
}

/// Request body; exactly one of `expression` or `node` is normally set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<Value>,
    pub locked: bool,
    pub log_event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_map_center: Option<PointE7>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_map_zoom: Option<f64>,
    pub session: u64,
}

impl EvaluationRequest {
    /// Request for a typed expression.
    #[must_use]
    pub fn for_expression(expression: impl Into<String>, event: &str) -> Self {
        Self {
            expression: Some(expression.into()),
            log_event: event.to_string(),
            ..Self::default()
        }
    }

    /// Request for a clicked node.
    #[must_use]
    pub fn for_node(node: &NodeRef, event: &str) -> Self {
        Self {
            node: Some(node.0.clone()),
            log_event: event.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: Option<ViewContext>) -> Self {
        if let Some(view) = view {
            self.log_map_center = Some(PointE7 {
                lat_e7: view.lat_e7,
                lng_e7: view.lng_e7,
            });
            self.log_map_zoom = Some(view.zoom);
        }
        self
    }
}
