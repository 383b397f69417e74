//! Integration tests for the shake-to-disconnect daemon

use shake_daemon::{
    collector::{NodeGraph, SubjectId},
    config::{Config, ConfigError, NotificationMethod, SharedConfig, ThresholdSource, Thresholds},
    controller::{Collaborators, Controller, LoopSettings, SamplingContext, StartOutcome},
    detector::MotionTracker,
    executor::{BroadcastDisconnector, DisconnectError, Disconnector},
    history::Position,
    notifier::Notifier,
    protocol::{DisconnectData, Request, Response},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Counts calls before handing them to the graph.
struct CountingDisconnector {
    graph: Arc<NodeGraph>,
    calls: AtomicUsize,
}

impl Disconnector for CountingDisconnector {
    fn disconnect(&self, subject: &SubjectId) -> Result<usize, DisconnectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.graph.disconnect(subject)
    }
}

struct BrokenSettings;

impl ThresholdSource for BrokenSettings {
    fn read_thresholds(&self) -> Result<Thresholds, ConfigError> {
        Err(ConfigError::Unavailable("preferences not registered".to_string()))
    }
}

fn editor_graph() -> Arc<NodeGraph> {
    let graph = NodeGraph::new();
    graph.add_tree("Shader").unwrap();
    graph.add_node("Shader", "Texture", &[], &["Color"], Position::new(-200.0, 0.0)).unwrap();
    graph.add_node("Shader", "Mix", &["A"], &["Result"], Position::new(0.0, 0.0)).unwrap();
    graph.add_node("Shader", "Output", &["Surface"], &[], Position::new(200.0, 0.0)).unwrap();
    graph.add_node("Shader", "Noise", &[], &["Fac"], Position::new(0.0, 300.0)).unwrap();
    graph.add_node("Shader", "Bump", &["Height"], &[], Position::new(200.0, 300.0)).unwrap();
    graph.link("Shader", ("Texture", "Color"), ("Mix", "A")).unwrap();
    graph.link("Shader", ("Mix", "Result"), ("Output", "Surface")).unwrap();
    graph.link("Shader", ("Noise", "Fac"), ("Bump", "Height")).unwrap();
    graph.open_editor("Shader").unwrap();
    graph.set_active("Shader", Some("Mix")).unwrap();
    Arc::new(graph)
}

fn collaborators(
    graph: &Arc<NodeGraph>,
    disconnector: Arc<dyn Disconnector>,
    thresholds: Arc<dyn ThresholdSource>,
) -> Collaborators {
    Collaborators {
        collector: graph.clone(),
        disconnector,
        thresholds,
        notifier: Arc::new(Notifier::new(NotificationMethod::Log)),
    }
}

fn zigzag_x(i: usize) -> f64 {
    if i % 2 == 0 {
        0.0
    } else {
        30.0
    }
}

#[test]
fn test_shake_disconnects_once_and_resets() {
    let graph = editor_graph();
    let counter = Arc::new(CountingDisconnector {
        graph: graph.clone(),
        calls: AtomicUsize::new(0),
    });
    let deps = collaborators(&graph, counter.clone(), Arc::new(SharedConfig::default()));
    let mut context = SamplingContext::new(MotionTracker::new(8, 0.1), deps);

    let mut events = Vec::new();
    for i in 0..8 {
        graph.move_node("Shader", "Mix", Position::new(zigzag_x(i), 0.0)).unwrap();
        if let Some(event) = context.tick() {
            events.push((i, event));
        }
    }

    assert_eq!(events.len(), 1);
    let (at, event) = &events[0];
    assert_eq!(*at, 7);
    assert_eq!(event.subject, SubjectId::new("Shader", "Mix"));
    assert_eq!(event.links_removed, 2);
    assert_eq!(event.message(), "Disconnected: Mix");
    assert!((event.metrics.total_travel - 210.0).abs() < 1e-9);

    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    assert!(context.tracker().history().is_empty());
    assert_eq!(graph.links("Shader").unwrap().len(), 1);
}

#[test]
fn test_drag_across_canvas_keeps_links() {
    let graph = editor_graph();
    let deps = collaborators(&graph, graph.clone(), Arc::new(SharedConfig::default()));
    let mut context = SamplingContext::new(MotionTracker::new(8, 0.1), deps);

    for i in 0..30 {
        graph.move_node("Shader", "Mix", Position::new(i as f64 * 45.0, 0.0)).unwrap();
        assert!(context.tick().is_none());
    }
    assert_eq!(graph.links("Shader").unwrap().len(), 3);
}

#[test]
fn test_unreadable_thresholds_fall_back_to_defaults() {
    let graph = editor_graph();
    let deps = collaborators(&graph, graph.clone(), Arc::new(BrokenSettings));
    let mut context = SamplingContext::new(MotionTracker::new(8, 0.1), deps);

    let mut fired = 0;
    for i in 0..8 {
        graph.move_node("Shader", "Mix", Position::new(zigzag_x(i), 0.0)).unwrap();
        if context.tick().is_some() {
            fired += 1;
        }
    }
    assert_eq!(fired, 1);
}

#[test]
fn test_thresholds_are_read_every_tick() {
    let graph = editor_graph();
    let settings = Arc::new(SharedConfig::new(Config::default()));
    let deps = collaborators(&graph, graph.clone(), settings.clone());
    let mut context = SamplingContext::new(MotionTracker::new(8, 0.1), deps);

    // Seven samples with defaults, then raise the bar before the window completes.
    for i in 0..7 {
        graph.move_node("Shader", "Mix", Position::new(zigzag_x(i), 0.0)).unwrap();
        assert!(context.tick().is_none());
    }
    settings.update(|c| {
        c.detection.set_shake_threshold(1000.0);
    });
    graph.move_node("Shader", "Mix", Position::new(zigzag_x(7), 0.0)).unwrap();
    assert!(context.tick().is_none());
    assert_eq!(graph.links("Shader").unwrap().len(), 3);
}

#[test]
fn test_tick_without_subject_does_nothing() {
    let graph = editor_graph();
    graph.close_editors();
    let deps = collaborators(&graph, graph.clone(), Arc::new(SharedConfig::default()));
    let mut context = SamplingContext::new(MotionTracker::new(8, 0.1), deps);
    for _ in 0..20 {
        assert!(context.tick().is_none());
    }
    assert!(context.tracker().history().is_empty());
}

#[test]
fn test_failed_disconnect_is_tolerated() {
    let graph = editor_graph();
    let (tx, _) = broadcast::channel(4);
    let deps = collaborators(
        &graph,
        Arc::new(BroadcastDisconnector::new(tx)),
        Arc::new(SharedConfig::default()),
    );
    let mut context = SamplingContext::new(MotionTracker::new(8, 0.1), deps);
    for i in 0..8 {
        graph.move_node("Shader", "Mix", Position::new(zigzag_x(i), 0.0)).unwrap();
        assert!(context.tick().is_none());
    }
    assert!(context.tracker().history().is_empty());
}

#[test]
fn test_broadcast_disconnector_sends_command() {
    let (tx, mut rx) = broadcast::channel(4);
    let disconnector = BroadcastDisconnector::new(tx);
    assert_eq!(disconnector.disconnect(&SubjectId::new("Shader", "Mix")).unwrap(), 1);
    match rx.try_recv().unwrap() {
        Response::Disconnect { data } => assert_eq!(
            data,
            DisconnectData {
                container: "Shader".to_string(),
                item: "Mix".to_string(),
            }
        ),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_notifier_broadcasts_info() {
    let (tx, mut rx) = broadcast::channel(4);
    let notifier = Notifier::new(NotificationMethod::Log).with_broadcast(tx);
    notifier.send("Disconnected: Mix");
    match rx.try_recv().unwrap() {
        Response::Info { data } => assert_eq!(data.message, "Disconnected: Mix"),
        other => panic!("unexpected message: {:?}", other),
    }
}

fn test_controller(graph: &Arc<NodeGraph>) -> Controller {
    let deps = collaborators(graph, graph.clone(), Arc::new(SharedConfig::default()));
    Controller::new(
        deps,
        LoopSettings {
            interval: Duration::from_millis(1),
            history_len: 8,
            min_movement: 0.1,
        },
    )
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let graph = editor_graph();
    let controller = test_controller(&graph);

    assert!(!controller.is_running().await);
    assert_eq!(controller.start().await, StartOutcome::Started);
    assert_eq!(controller.start().await, StartOutcome::AlreadyRunning);
    assert!(controller.is_running().await);

    assert!(controller.stop().await);
    assert!(!controller.is_running().await);
    assert!(!controller.stop().await);

    assert_eq!(controller.start().await, StartOutcome::Started);
    controller.on_session_loaded().await;
    assert!(controller.is_running().await);
    assert!(controller.stop().await);
}

#[tokio::test]
async fn test_session_loaded_starts_tracking() {
    let graph = editor_graph();
    let controller = test_controller(&graph);
    controller.on_session_loaded().await;
    assert!(controller.is_running().await);
    controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_running_loop_disconnects_shaken_node() {
    let graph = editor_graph();
    let controller = test_controller(&graph);
    controller.start().await;

    for i in 0..8 {
        graph.move_node("Shader", "Mix", Position::new(zigzag_x(i), 0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(controller.disconnect_count(), 1);
    assert_eq!(graph.links("Shader").unwrap().len(), 1);
    assert!(controller.stop().await);
}

#[test]
fn test_request_wire_format() {
    let request: Request = serde_json::from_str(
        r#"{"cmd":"report_subject","params":{"container":"Shader","item":"Mix","x":1.5,"y":-2.0}}"#,
    )
    .unwrap();
    match request {
        Request::ReportSubject { params } => {
            assert_eq!(params.item, "Mix");
            assert_eq!(params.x, 1.5);
        }
        other => panic!("unexpected request: {:?}", other),
    }

    let request: Request =
        serde_json::from_str(r#"{"cmd":"update_config","params":{"range_limit":50.0}}"#).unwrap();
    match request {
        Request::UpdateConfig { params } => {
            assert_eq!(params.range_limit, Some(50.0));
            assert!(params.shake_threshold.is_none());
        }
        other => panic!("unexpected request: {:?}", other),
    }

    assert!(matches!(
        serde_json::from_str::<Request>(r#"{"cmd":"start_tracking"}"#).unwrap(),
        Request::StartTracking
    ));
}

#[test]
fn test_response_wire_format() {
    let json = serde_json::to_value(Response::Disconnect {
        data: DisconnectData {
            container: "Shader".to_string(),
            item: "Mix".to_string(),
        },
    })
    .unwrap();
    assert_eq!(json["type"], "disconnect");
    assert_eq!(json["data"]["item"], "Mix");

    let json = serde_json::to_value(Response::Pong).unwrap();
    assert_eq!(json["type"], "pong");
}
