//! Update function for one outliner.
//!
//! `update()` takes the model and a message, mutates the model, and returns a
//! command for the host. Backend fetches, chrome requests and timers are
//! described as [`OutlinerCmd`] values. Map publication runs inline through
//! the shared synchronizer so a state change is fully propagated before
//! `update()` returns.

use std::time::Duration;

use crate::core::errors::SolError;
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::outliner::chrome::{ChromeAction, Decoded};
use crate::outliner::model::{EvaluationTarget, NotificationLevel, OutlinerCmd, OutlinerModel, OutlinerMsg};
use crate::view::primitives::HeaderAction;

/// Event tags carried in `logEvent`.
pub const EVENT_EXPRESSION: &str = "os";
pub const EVENT_IN_CONTEXT: &str = "oc";
pub const EVENT_SHELL: &str = "shell";

/// Apply a message to the model and return the next command for the host.
///
/// A closed outliner ignores everything except expiry timers and further
/// close requests, which are journaled as double teardown.
pub fn update(model: &mut OutlinerModel, msg: OutlinerMsg) -> OutlinerCmd {
    if model.closed && !matches!(msg, OutlinerMsg::Close | OutlinerMsg::NotificationExpired(_)) {
        return OutlinerCmd::None;
    }

    match msg {
        OutlinerMsg::Evaluate(target) => fetch(model, target, EVENT_EXPRESSION),

        OutlinerMsg::Response { seq, result } => {
            if seq != model.latest_seq {
                model.sink.record(
                    LogEntry::new(EventType::StaleResponse, Severity::Info)
                        .outliner(model.id)
                        .seq(seq)
                        .details(format!("newer request {} outstanding", model.latest_seq)),
                );
                return OutlinerCmd::None;
            }
            match result {
                Ok(decoded) => {
                    activate_response(model, seq, decoded);
                    OutlinerCmd::None
                }
                Err(err) => collaborator_failure(model, seq, &err),
            }
        }

        OutlinerMsg::SetChip { index, value } => {
            let previous = model.state.set_chip(index, value);
            if previous != value {
                model.sink.record(
                    LogEntry::new(EventType::ChipChanged, Severity::Info)
                        .outliner(model.id)
                        .chip(index, value),
                );
                resync(model);
            }
            OutlinerCmd::None
        }

        OutlinerMsg::SetChoiceChip { index, value } => {
            model.state.set_choice_chip(index, value);
            OutlinerCmd::None
        }

        OutlinerMsg::ToggleBucket(index) => {
            // Toggle against what the map shows; the latest toggle on any
            // outliner owns the filter.
            let shown = model.selected_bucket();
            model.state.set_selected_bucket(shown);
            model.state.toggle_bucket(index);
            let selected = model.state.selected_bucket();
            if model.published {
                model.sync.lock().set_bucket_filter(model.id, selected);
            }
            model.sink.record(
                LogEntry::new(EventType::BucketToggled, Severity::Info)
                    .outliner(model.id)
                    .bucket(selected),
            );
            OutlinerCmd::None
        }

        OutlinerMsg::Click { node, in_context } => {
            if in_context {
                fetch(model, EvaluationTarget::Node(node), EVENT_IN_CONTEXT)
            } else {
                OutlinerCmd::Chrome(ChromeAction::EvaluateClickTarget {
                    node,
                    add_to_history: true,
                    recenter: true,
                })
            }
        }

        OutlinerMsg::Header(action) => header_action(model, action),

        OutlinerMsg::ToggleVisibility => toggle_visibility(model),

        OutlinerMsg::ShellSubmit(expression) => {
            let expression = expression.trim();
            if expression.is_empty() {
                return OutlinerCmd::None;
            }
            fetch(model, EvaluationTarget::Expression(expression.to_string()), EVENT_SHELL)
        }

        OutlinerMsg::NotificationExpired(id) => {
            model.notifications.retain(|n| n.id != id);
            OutlinerCmd::None
        }

        OutlinerMsg::ViewChanged(view) => {
            model.view = Some(view);
            OutlinerCmd::None
        }

        OutlinerMsg::Close => close(model),
    }
}

// ──────────────────── responses ────────────────────

fn fetch(model: &mut OutlinerModel, target: EvaluationTarget, event: &str) -> OutlinerCmd {
    let (seq, request) = model.next_request(target, event);
    OutlinerCmd::Fetch { seq, request }
}

fn activate_response(model: &mut OutlinerModel, seq: u64, decoded: Decoded) {
    let Decoded { response, report } = decoded;
    if !report.is_clean() {
        model.sink.record(
            LogEntry::new(EventType::DecodeInert, Severity::Warning)
                .outliner(model.id)
                .seq(seq)
                .count((report.inert_lines + report.inert_atoms) as u64),
        );
    }

    model.state.seed_defaults(&response.chip_values);
    model.state.register_choice_chips(response.tree.choice_chips());
    model.locked = response.locked;
    model.response = Some(response);
    model.applied_seq = Some(seq);

    if model.visible {
        publish(model);
    }
}

fn collaborator_failure(model: &mut OutlinerModel, seq: u64, err: &SolError) -> OutlinerCmd {
    model.sink.record(
        LogEntry::new(EventType::CollaboratorFailure, Severity::Warning)
            .outliner(model.id)
            .seq(seq)
            .error(err),
    );
    let id = model.push_notification(NotificationLevel::Error, err.to_string());
    OutlinerCmd::ScheduleNotificationExpiry {
        id,
        after: Duration::from_millis(model.config.notifications.ttl_ms),
    }
}

// ──────────────────── map publication ────────────────────

/// Publish the current tree, superseding any earlier contribution.
fn publish(model: &mut OutlinerModel) {
    let Some(desired) = model.map_state() else {
        return;
    };
    let mut sync = model.sync.lock();
    sync.activate(model.id, &desired);
    // A filter another outliner set in the meantime stays in place.
    match model.state.selected_bucket() {
        Some(bucket) if sync.bucket_filter().is_none() => sync.set_bucket_filter(model.id, Some(bucket)),
        Some(_) => model.state.clear_bucket(),
        None => {}
    }
    drop(sync);
    model.published = true;
}

fn resync(model: &OutlinerModel) {
    if !model.published {
        return;
    }
    if let Some(desired) = model.map_state() {
        model.sync.lock().resync(model.id, &desired);
    }
}

/// Withdraw the contribution, remembering whether this outliner still owned
/// the bucket filter so showing it again restores exactly that.
fn withdraw(model: &mut OutlinerModel) {
    if model.published {
        let mut sync = model.sync.lock();
        model.state.set_selected_bucket(sync.bucket_filter_for(model.id));
        sync.deactivate(model.id);
        drop(sync);
        model.published = false;
    }
}

// ──────────────────── chrome ────────────────────

fn header_action(model: &mut OutlinerModel, action: HeaderAction) -> OutlinerCmd {
    match action {
        HeaderAction::Close => close(model),
        HeaderAction::Share => OutlinerCmd::Chrome(ChromeAction::Share),
        HeaderAction::Copy => OutlinerCmd::Chrome(ChromeAction::CopyExpression {
            expression: model.response.as_ref().and_then(|r| r.expression.clone()),
        }),
        HeaderAction::Target => model
            .response
            .as_ref()
            .and_then(|r| r.map_center)
            .map_or(OutlinerCmd::None, |center| {
                OutlinerCmd::Chrome(ChromeAction::Target { center })
            }),
        HeaderAction::ToggleVisibility => toggle_visibility(model),
    }
}

fn toggle_visibility(model: &mut OutlinerModel) -> OutlinerCmd {
    model.visible = !model.visible;
    if model.visible {
        publish(model);
    } else {
        withdraw(model);
    }
    OutlinerCmd::Chrome(ChromeAction::ToggleVisibility {
        visible: model.visible,
    })
}

fn close(model: &mut OutlinerModel) -> OutlinerCmd {
    if model.closed {
        // Journals the double teardown; the map is not touched.
        model.sync.lock().deactivate(model.id);
        return OutlinerCmd::None;
    }
    withdraw(model);
    model.closed = true;
    model.notifications.clear();
    OutlinerCmd::Chrome(ChromeAction::Close)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::core::config::Config;
    use crate::logger::sink::{EventSink, MemorySink};
    use crate::sync::map::RecordingMap;
    use crate::sync::synchronizer::MapSynchronizer;
    use crate::tree::decode::decode;
    use crate::tree::model::{FeatureId, MapCenter, NodeRef};

    struct Fixture {
        model: OutlinerModel,
        map: Arc<RecordingMap>,
        sink: Arc<MemorySink>,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(Config::default());
        let map = Arc::new(RecordingMap::new());
        let sink = Arc::new(MemorySink::new());
        let dyn_sink: Arc<dyn EventSink> = sink.clone();
        let sync = MapSynchronizer::new(map.clone(), config.sync.clone(), dyn_sink.clone()).shared();
        Fixture {
            model: OutlinerModel::new(1, config, sync, dyn_sink),
            map,
            sink,
        }
    }

    fn area(id: u64) -> FeatureId {
        FeatureId::new("/area/openstreetmap.org/way", id)
    }

    fn response(ids: &[u64]) -> Decoded {
        decode(&json!({
            "proto": {
                "stack": {"substacks": [{"lines": [{"value": {"atom": {"value": "x"}}}]}]},
                "expression": "find-area",
                "highlighted": {
                    "namespaces": ["/area/openstreetmap.org/way"],
                    "ids": [{"ids": ids}]
                },
                "chipValues": [1],
                "mapCenter": {"latE7": 10, "lngE7": 20}
            }
        }))
        .into()
    }

    fn evaluate(model: &mut OutlinerModel) -> u64 {
        match update(model, OutlinerMsg::Evaluate(EvaluationTarget::Expression("find-area".into()))) {
            OutlinerCmd::Fetch { seq, .. } => seq,
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn response_activates_and_seeds_chips() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });
        assert!(f.model.published);
        assert_eq!(f.model.state.get_chip(0), 1);
        assert!(f.map.is_highlighted(&area(1)));
        assert_eq!(f.sink.count(EventType::TreeActivated), 1);
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut f = fixture();
        let first = evaluate(&mut f.model);
        let second = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq: second, result: Ok(response(&[2])) });
        update(&mut f.model, OutlinerMsg::Response { seq: first, result: Ok(response(&[1])) });
        assert_eq!(f.model.applied_seq, Some(second));
        assert!(!f.map.is_highlighted(&area(1)));
        assert!(f.map.is_highlighted(&area(2)));
        assert_eq!(f.sink.count(EventType::StaleResponse), 1);
    }

    #[test]
    fn failure_keeps_tree_and_notifies() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });
        let seq = evaluate(&mut f.model);
        let cmd = update(
            &mut f.model,
            OutlinerMsg::Response {
                seq,
                result: Err(SolError::collaborator("backend unavailable")),
            },
        );
        let OutlinerCmd::ScheduleNotificationExpiry { id, after } = cmd else {
            panic!("expected expiry, got {cmd:?}");
        };
        assert_eq!(after, Duration::from_millis(4000));
        assert!(f.model.response.is_some());
        assert!(f.map.is_highlighted(&area(1)));
        assert_eq!(f.model.notifications.len(), 1);

        update(&mut f.model, OutlinerMsg::NotificationExpired(id));
        assert!(f.model.notifications.is_empty());
        assert_eq!(f.sink.count(EventType::CollaboratorFailure), 1);
    }

    #[test]
    fn hide_withdraws_and_show_republishes() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });

        let cmd = update(&mut f.model, OutlinerMsg::ToggleVisibility);
        assert_eq!(cmd, OutlinerCmd::Chrome(ChromeAction::ToggleVisibility { visible: false }));
        assert!(!f.map.is_highlighted(&area(1)));

        update(&mut f.model, OutlinerMsg::Header(HeaderAction::ToggleVisibility));
        assert!(f.map.is_highlighted(&area(1)));
    }

    #[test]
    fn double_close_is_journaled_not_applied() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });

        assert_eq!(
            update(&mut f.model, OutlinerMsg::Header(HeaderAction::Close)),
            OutlinerCmd::Chrome(ChromeAction::Close)
        );
        assert!(!f.map.is_highlighted(&area(1)));
        assert_eq!(update(&mut f.model, OutlinerMsg::Close), OutlinerCmd::None);
        assert_eq!(f.sink.count(EventType::DoubleTeardown), 1);
        assert_eq!(f.sink.count(EventType::HighlightUnderflow), 0);
    }

    #[test]
    fn closed_outliner_ignores_responses() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Close);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });
        assert!(f.model.response.is_none());
        assert!(f.map.highlighted().is_empty());
    }

    #[test]
    fn header_routing() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[])) });
        assert_eq!(
            update(&mut f.model, OutlinerMsg::Header(HeaderAction::Copy)),
            OutlinerCmd::Chrome(ChromeAction::CopyExpression {
                expression: Some("find-area".into())
            })
        );
        assert_eq!(
            update(&mut f.model, OutlinerMsg::Header(HeaderAction::Target)),
            OutlinerCmd::Chrome(ChromeAction::Target {
                center: MapCenter { lat_e7: 10, lng_e7: 20 }
            })
        );
    }

    #[test]
    fn clicks_route_by_context() {
        let mut f = fixture();
        let node = NodeRef(json!({"symbol": "find"}));
        let cmd = update(&mut f.model, OutlinerMsg::Click { node: node.clone(), in_context: true });
        let OutlinerCmd::Fetch { request, .. } = cmd else {
            panic!("expected fetch, got {cmd:?}");
        };
        assert_eq!(request.log_event, EVENT_IN_CONTEXT);
        assert_eq!(request.node, Some(node.0.clone()));

        let cmd = update(&mut f.model, OutlinerMsg::Click { node: node.clone(), in_context: false });
        assert_eq!(
            cmd,
            OutlinerCmd::Chrome(ChromeAction::EvaluateClickTarget {
                node,
                add_to_history: true,
                recenter: true
            })
        );
    }

    #[test]
    fn bucket_toggle_sets_global_filter_once_published() {
        let mut f = fixture();
        update(&mut f.model, OutlinerMsg::ToggleBucket(2));
        assert_eq!(f.model.selected_bucket(), Some(2));
        assert_eq!(f.map.bucket_filter(), None);

        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });
        update(&mut f.model, OutlinerMsg::ToggleBucket(2));
        assert_eq!(f.map.bucket_filter(), Some(2));
        update(&mut f.model, OutlinerMsg::ToggleBucket(2));
        assert_eq!(f.map.bucket_filter(), None);
        assert_eq!(f.sink.count(EventType::BucketToggled), 3);
    }

    #[test]
    fn hidden_outliner_restores_its_filter_on_show() {
        let mut f = fixture();
        let seq = evaluate(&mut f.model);
        update(&mut f.model, OutlinerMsg::Response { seq, result: Ok(response(&[1])) });
        update(&mut f.model, OutlinerMsg::ToggleBucket(1));

        update(&mut f.model, OutlinerMsg::ToggleVisibility);
        assert_eq!(f.map.bucket_filter(), None);
        update(&mut f.model, OutlinerMsg::ToggleBucket(0));
        assert_eq!(f.map.bucket_filter(), None);

        update(&mut f.model, OutlinerMsg::ToggleVisibility);
        assert_eq!(f.map.bucket_filter(), Some(0));
        assert_eq!(f.model.selected_bucket(), Some(0));
    }

    #[test]
    fn blank_shell_input_is_ignored() {
        let mut f = fixture();
        assert_eq!(update(&mut f.model, OutlinerMsg::ShellSubmit("   ".into())), OutlinerCmd::None);
        let cmd = update(&mut f.model, OutlinerMsg::ShellSubmit(" collect-areas ".into()));
        let OutlinerCmd::Fetch { request, .. } = cmd else {
            panic!("expected fetch, got {cmd:?}");
        };
        assert_eq!(request.expression.as_deref(), Some("collect-areas"));
        assert_eq!(request.log_event, EVENT_SHELL);
    }
}
