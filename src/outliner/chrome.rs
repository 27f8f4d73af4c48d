//! Collaborator seams owned by the host: window chrome and evaluation backend.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::errors::Result;
use crate::tree::decode::DecodeReport;
use crate::tree::model::{DisplayResponse, MapCenter, NodeRef};
use crate::tree::request::EvaluationRequest;

/// A decoded backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub response: DisplayResponse,
    pub report: DecodeReport,
}

impl From<(DisplayResponse, DecodeReport)> for Decoded {
    fn from((response, report): (DisplayResponse, DecodeReport)) -> Self {
        Self { response, report }
    }
}

/// Expression evaluation backend. Failures are surfaced as transient
/// notifications and never replace the current tree.
pub trait EvaluationClient: Send + Sync {
    fn evaluate(&self, request: &EvaluationRequest) -> Result<Decoded>;
}

impl<F> EvaluationClient for F
where
    F: Fn(&EvaluationRequest) -> Result<Decoded> + Send + Sync,
{
    fn evaluate(&self, request: &EvaluationRequest) -> Result<Decoded> {
        self(request)
    }
}

/// Window chrome operations delegated by an outliner. The outliner decides
/// nothing about layout or history; it only reports the user's intent.
pub trait OutlinerChrome: Send + Sync {
    fn close(&self);
    fn share(&self);
    fn copy_expression(&self, expression: Option<&str>);
    fn toggle_visibility(&self, visible: bool);
    fn target(&self, center: MapCenter);
    fn evaluate_click_target(&self, node: &NodeRef, add_to_history: bool, recenter: bool);
}

/// Chrome intent as data, for the command queue and for recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChromeAction {
    Close,
    Share,
    CopyExpression { expression: Option<String> },
    ToggleVisibility { visible: bool },
    Target { center: MapCenter },
    EvaluateClickTarget {
        node: NodeRef,
        add_to_history: bool,
        recenter: bool,
    },
}

impl ChromeAction {
    /// Invoke the matching chrome operation.
    pub fn apply(&self, chrome: &dyn OutlinerChrome) {
        match self {
            Self::Close => chrome.close(),
            Self::Share => chrome.share(),
            Self::CopyExpression { expression } => chrome.copy_expression(expression.as_deref()),
            Self::ToggleVisibility { visible } => chrome.toggle_visibility(*visible),
            Self::Target { center } => chrome.target(*center),
            Self::EvaluateClickTarget {
                node,
                add_to_history,
                recenter,
            } => chrome.evaluate_click_target(node, *add_to_history, *recenter),
        }
    }
}

/// Chrome that records every request.
#[derive(Debug, Default)]
pub struct RecordingChrome {
    actions: Mutex<Vec<ChromeAction>>,
}

impl RecordingChrome {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn actions(&self) -> Vec<ChromeAction> {
        self.actions.lock().clone()
    }

    fn push(&self, action: ChromeAction) {
        self.actions.lock().push(action);
    }
}

impl OutlinerChrome for RecordingChrome {
    fn close(&self) {
        self.push(ChromeAction::Close);
    }

    fn share(&self) {
        self.push(ChromeAction::Share);
    }

    fn copy_expression(&self, expression: Option<&str>) {
        self.push(ChromeAction::CopyExpression {
            expression: expression.map(str::to_string),
        });
    }

    fn toggle_visibility(&self, visible: bool) {
        self.push(ChromeAction::ToggleVisibility { visible });
    }

    fn target(&self, center: MapCenter) {
        self.push(ChromeAction::Target { center });
    }

    fn evaluate_click_target(&self, node: &NodeRef, add_to_history: bool, recenter: bool) {
        self.push(ChromeAction::EvaluateClickTarget {
            node: node.clone(),
            add_to_history,
            recenter,
        });
    }
}
