//! Elm-style state model for one outliner panel.
//!
//! All outliner state lives in [`OutlinerModel`]. User input and backend
//! responses arrive as [`OutlinerMsg`] values; backend requests, chrome
//! intents and timers leave as [`OutlinerCmd`] values for the host to run.
//! Map publication is the one effect applied inside `update`, through the
//! shared synchronizer, so a state change and its map delta land together.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::Config;
use crate::core::errors::SolError;
use crate::logger::sink::EventSink;
use crate::outliner::chrome::{ChromeAction, Decoded};
use crate::state::store::ClientState;
use crate::sync::synchronizer::{MapState, OutlinerId, SharedSynchronizer};
use crate::tree::model::{ChipIndex, ChipValue, DisplayResponse, NodeRef};
use crate::tree::request::{EvaluationRequest, ViewContext};
use crate::view::primitives::{HeaderAction, RenderedStack};
use crate::view::project::{ProjectionContext, project};

// ──────────────────── notifications ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Transient message; expires after the configured time-to-live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
}

// ──────────────────── messages ────────────────────

/// What to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationTarget {
    Expression(String),
    Node(NodeRef),
}

#[derive(Debug)]
pub enum OutlinerMsg {
    /// Ask the backend for a new tree.
    Evaluate(EvaluationTarget),
    /// Backend answer for request `seq`.
    Response {
        seq: u64,
        result: Result<Decoded, SolError>,
    },
    SetChip {
        index: ChipIndex,
        value: ChipValue,
    },
    SetChoiceChip {
        index: ChipIndex,
        value: ChipValue,
    },
    ToggleBucket(i64),
    /// A clickable atom, tag or action line was clicked.
    Click {
        node: NodeRef,
        in_context: bool,
    },
    Header(HeaderAction),
    ToggleVisibility,
    ShellSubmit(String),
    NotificationExpired(u64),
    /// Map view moved; attached to later requests.
    ViewChanged(ViewContext),
    Close,
}

// ──────────────────── commands ────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OutlinerCmd {
    None,
    Fetch {
        seq: u64,
        request: EvaluationRequest,
    },
    Chrome(ChromeAction),
    ScheduleNotificationExpiry {
        id: u64,
        after: Duration,
    },
    Batch(Vec<OutlinerCmd>),
}

impl OutlinerCmd {
    /// Flatten nested batches, dropping `None`.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::None => Vec::new(),
            Self::Batch(cmds) => cmds.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}

// ──────────────────── model ────────────────────

pub struct OutlinerModel {
    pub id: OutlinerId,
    pub config: Arc<Config>,
    pub response: Option<DisplayResponse>,
    pub state: ClientState,
    pub visible: bool,
    pub closed: bool,
    /// Whether the synchronizer currently holds this outliner's contribution.
    pub published: bool,
    /// Sequence number of the most recently issued request.
    pub latest_seq: u64,
    /// Sequence number of the response currently shown.
    pub applied_seq: Option<u64>,
    pub session: u64,
    pub view: Option<ViewContext>,
    pub locked: bool,
    /// Active toasts, oldest first.
    pub notifications: Vec<Notification>,
    pub next_notification_id: u64,
    pub sync: SharedSynchronizer,
    pub sink: Arc<dyn EventSink>,
}

impl OutlinerModel {
    #[must_use]
    pub fn new(id: OutlinerId, config: Arc<Config>, sync: SharedSynchronizer, sink: Arc<dyn EventSink>) -> Self {
        Self {
            id,
            config,
            response: None,
            state: ClientState::new(),
            visible: true,
            closed: false,
            published: false,
            latest_seq: 0,
            applied_seq: None,
            session: 0,
            view: None,
            locked: false,
            notifications: Vec::new(),
            next_notification_id: 0,
            sync,
            sink,
        }
    }

    /// Push a notification, evicting the oldest beyond the configured limit.
    pub fn push_notification(&mut self, level: NotificationLevel, message: String) -> u64 {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push(Notification { id, level, message });
        let max = self.config.notifications.max_visible;
        if self.notifications.len() > max {
            let excess = self.notifications.len() - max;
            self.notifications.drain(..excess);
        }
        id
    }

    /// Current map contribution resolved against state.
    #[must_use]
    pub fn map_state(&self) -> Option<MapState> {
        self.response
            .as_ref()
            .map(|response| MapState::resolve(response, &self.state))
    }

    /// Bucket shown as selected. While published this is the map-wide filter
    /// when this outliner set it, so another outliner's toggle deselects it.
    #[must_use]
    pub fn selected_bucket(&self) -> Option<i64> {
        if self.published {
            self.sync.lock().bucket_filter_for(self.id)
        } else {
            self.state.selected_bucket()
        }
    }

    /// Project the current tree. An outliner without a tree renders empty.
    #[must_use]
    pub fn render(&self) -> RenderedStack {
        let Some(response) = &self.response else {
            return RenderedStack::default();
        };
        let ctx = ProjectionContext {
            render: &self.config.render,
            bucketed: &response.bucketed,
            targetable: response.map_center.is_some(),
            selected_bucket: self.selected_bucket(),
            swatch_total: 0,
        };
        project(&response.tree, &self.state, &ctx)
    }

    /// Build the next request envelope, advancing the sequence number.
    pub fn next_request(&mut self, target: EvaluationTarget, event: &str) -> (u64, EvaluationRequest) {
        self.latest_seq += 1;
        let request = match target {
            EvaluationTarget::Expression(expression) => EvaluationRequest::for_expression(expression, event),
            EvaluationTarget::Node(node) => EvaluationRequest::for_node(&node, event),
        };
        let request = EvaluationRequest {
            root: self.response.as_ref().and_then(|r| r.tree.id.clone()),
            locked: self.locked,
            session: self.session,
            ..request
        }
        .with_view(self.view);
        (self.latest_seq, request)
    }
}
