//! Host loop for one outliner.
//!
//! [`OutlinerHost`] drives the model/update pipeline: it runs commands,
//! queues backend fetches until [`OutlinerHost::run_until_idle`] (or
//! [`OutlinerHost::run_fetch`] for out-of-order delivery), forwards chrome
//! intents, and tracks notification timers on a caller-advanced clock. No
//! thread or wall-clock time is involved.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::sink::EventSink;
use crate::outliner::chrome::{Decoded, EvaluationClient, OutlinerChrome};
use crate::outliner::model::{OutlinerCmd, OutlinerModel, OutlinerMsg};
use crate::outliner::update::update;
use crate::sync::synchronizer::{OutlinerId, SharedSynchronizer};
use crate::tree::decode::decode;
use crate::tree::request::EvaluationRequest;
use crate::view::primitives::RenderedStack;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub seq: u64,
    pub request: EvaluationRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    notification: u64,
    remaining: Duration,
}

pub struct OutlinerHost {
    model: OutlinerModel,
    client: Arc<dyn EvaluationClient>,
    chrome: Arc<dyn OutlinerChrome>,
    pending: VecDeque<PendingFetch>,
    timers: Vec<Timer>,
}

impl OutlinerHost {
    #[must_use]
    pub fn new(
        id: OutlinerId,
        config: Arc<Config>,
        sync: SharedSynchronizer,
        sink: Arc<dyn EventSink>,
        client: Arc<dyn EvaluationClient>,
        chrome: Arc<dyn OutlinerChrome>,
    ) -> Self {
        Self {
            model: OutlinerModel::new(id, config, sync, sink),
            client,
            chrome,
            pending: VecDeque::new(),
            timers: Vec::new(),
        }
    }

    /// Apply one message and run the resulting commands.
    pub fn dispatch(&mut self, msg: OutlinerMsg) {
        let cmd = update(&mut self.model, msg);
        self.execute(cmd);
    }

    fn execute(&mut self, cmd: OutlinerCmd) {
        for cmd in cmd.flatten() {
            match cmd {
                OutlinerCmd::None | OutlinerCmd::Batch(_) => {}
                OutlinerCmd::Fetch { seq, request } => {
                    self.pending.push_back(PendingFetch { seq, request });
                }
                OutlinerCmd::Chrome(action) => action.apply(self.chrome.as_ref()),
                OutlinerCmd::ScheduleNotificationExpiry { id, after } => self.timers.push(Timer {
                    notification: id,
                    remaining: after,
                }),
            }
        }
    }

    /// Complete every queued fetch in issue order, including fetches issued
    /// while completing earlier ones.
    pub fn run_until_idle(&mut self) -> usize {
        let mut completed = 0;
        while let Some(fetch) = self.pending.pop_front() {
            self.complete(fetch);
            completed += 1;
        }
        completed
    }

    /// Complete the queued fetch with sequence `seq`, ahead of any earlier
    /// ones. Returns `false` when no such fetch is queued.
    pub fn run_fetch(&mut self, seq: u64) -> bool {
        let Some(position) = self.pending.iter().position(|f| f.seq == seq) else {
            return false;
        };
        let Some(fetch) = self.pending.remove(position) else {
            return false;
        };
        self.complete(fetch);
        true
    }

    fn complete(&mut self, fetch: PendingFetch) {
        let result = self.client.evaluate(&fetch.request);
        self.dispatch(OutlinerMsg::Response {
            seq: fetch.seq,
            result,
        });
    }

    /// Advance the notification clock, expiring due notifications in
    /// scheduling order.
    pub fn advance(&mut self, elapsed: Duration) {
        let mut due = Vec::new();
        self.timers.retain_mut(|timer| {
            timer.remaining = timer.remaining.saturating_sub(elapsed);
            if timer.remaining.is_zero() {
                due.push(timer.notification);
                false
            } else {
                true
            }
        });
        for id in due {
            self.dispatch(OutlinerMsg::NotificationExpired(id));
        }
    }

    #[must_use]
    pub fn render(&self) -> RenderedStack {
        self.model.render()
    }

    #[must_use]
    pub fn model(&self) -> &OutlinerModel {
        &self.model
    }

    #[must_use]
    pub fn pending(&self) -> Vec<u64> {
        self.pending.iter().map(|f| f.seq).collect()
    }
}

/// Client that answers every request with the same decoded payload.
#[derive(Debug, Clone)]
pub struct StaticClient {
    decoded: Decoded,
}

impl StaticClient {
    #[must_use]
    pub fn new(payload: &Value) -> Self {
        Self {
            decoded: decode(payload).into(),
        }
    }

    #[must_use]
    pub fn from_decoded(decoded: Decoded) -> Self {
        Self { decoded }
    }
}

impl EvaluationClient for StaticClient {
    fn evaluate(&self, _request: &EvaluationRequest) -> Result<Decoded> {
        Ok(self.decoded.clone())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::core::errors::SolError;
    use crate::logger::sink::NullSink;
    use crate::outliner::chrome::{ChromeAction, RecordingChrome};
    use crate::outliner::model::EvaluationTarget;
    use crate::sync::map::RecordingMap;
    use crate::sync::synchronizer::MapSynchronizer;
    use crate::view::primitives::HeaderAction;

    fn host(client: Arc<dyn EvaluationClient>) -> (OutlinerHost, Arc<RecordingChrome>) {
        let config = Arc::new(Config::default());
        let sink: Arc<dyn EventSink> = Arc::new(NullSink);
        let sync = MapSynchronizer::new(Arc::new(RecordingMap::new()), config.sync.clone(), sink.clone()).shared();
        let chrome = Arc::new(RecordingChrome::new());
        (OutlinerHost::new(1, config, sync, sink, client, chrome.clone()), chrome)
    }

    fn payload(text: &str) -> Value {
        json!({"stack": {"substacks": [{"lines": [{"value": {"atom": {"value": text}}}]}]}})
    }

    fn evaluate(host: &mut OutlinerHost, expression: &str) {
        host.dispatch(OutlinerMsg::Evaluate(EvaluationTarget::Expression(expression.into())));
    }

    #[test]
    fn fetches_run_in_order_and_last_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let client = move |request: &EvaluationRequest| -> Result<Decoded> {
            let expression = request.expression.clone().unwrap_or_default();
            log.lock().push(expression.clone());
            Ok(decode(&payload(&expression)).into())
        };
        let (mut host, _) = host(Arc::new(client));
        evaluate(&mut host, "a");
        evaluate(&mut host, "b");
        assert_eq!(host.run_until_idle(), 2);
        assert_eq!(*seen.lock(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(host.model().applied_seq, Some(2));
    }

    #[test]
    fn late_response_does_not_overwrite() {
        let client = |request: &EvaluationRequest| -> Result<Decoded> {
            Ok(decode(&payload(request.expression.as_deref().unwrap_or_default())).into())
        };
        let (mut host, _) = host(Arc::new(client));
        evaluate(&mut host, "old");
        evaluate(&mut host, "new");
        assert!(host.run_fetch(2));
        assert!(host.run_fetch(1));
        assert!(!host.run_fetch(1));
        let rendered = host.render();
        let text = rendered.lines().next().map(|l| format!("{l:?}")).unwrap_or_default();
        assert!(text.contains("new"));
    }

    #[test]
    fn failure_notification_expires_after_ttl() {
        let client = |_: &EvaluationRequest| -> Result<Decoded> { Err(SolError::collaborator("timeout")) };
        let (mut host, _) = host(Arc::new(client));
        evaluate(&mut host, "x");
        host.run_until_idle();
        assert_eq!(host.model().notifications.len(), 1);
        host.advance(Duration::from_millis(3999));
        assert_eq!(host.model().notifications.len(), 1);
        host.advance(Duration::from_millis(1));
        assert!(host.model().notifications.is_empty());
    }

    #[test]
    fn chrome_intents_are_forwarded() {
        let (mut host, chrome) = host(Arc::new(StaticClient::new(&payload("x"))));
        evaluate(&mut host, "x");
        host.run_until_idle();
        host.dispatch(OutlinerMsg::Header(HeaderAction::Share));
        host.dispatch(OutlinerMsg::Header(HeaderAction::Close));
        assert_eq!(chrome.actions(), vec![ChromeAction::Share, ChromeAction::Close]);
    }
}
