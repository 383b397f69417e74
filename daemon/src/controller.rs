//! Tracking lifecycle and the sampling loop

use crate::collector::{SubjectCollector, SubjectId};
use crate::config::{Config, ThresholdSource, Thresholds};
use crate::detector::{Detector, MotionTracker, ShakeMetrics};
use crate::executor::Disconnector;
use crate::notifier::Notifier;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the loop talks to outside the tracker.
#[derive(Clone)]
pub struct Collaborators {
    pub collector: Arc<dyn SubjectCollector>,
    pub disconnector: Arc<dyn Disconnector>,
    pub thresholds: Arc<dyn ThresholdSource>,
    pub notifier: Arc<Notifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectEvent {
    pub subject: SubjectId,
    pub links_removed: usize,
    pub metrics: ShakeMetrics,
}

impl DisconnectEvent {
    pub fn message(&self) -> String {
        format!("Disconnected: {}", self.subject.item)
    }
}

/// One tracker plus its collaborators; advanced one tick at a time.
pub struct SamplingContext {
    tracker: MotionTracker,
    deps: Collaborators,
    disconnects: Arc<AtomicU64>,
}

impl SamplingContext {
    pub fn new(tracker: MotionTracker, deps: Collaborators) -> Self {
        Self {
            tracker,
            deps,
            disconnects: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn tracker(&self) -> &MotionTracker {
        &self.tracker
    }

    fn thresholds(&self) -> Thresholds {
        self.deps.thresholds.read_thresholds().unwrap_or_else(|e| {
            debug!("Threshold read failed ({}), using defaults", e);
            Thresholds::default()
        })
    }

    /// Samples the current subject once. Never fails; problems mean no work.
    pub fn tick(&mut self) -> Option<DisconnectEvent> {
        let thresholds = self.thresholds();
        let sample = self.deps.collector.current_subject()?;
        let shake = self.tracker.check(&sample, &thresholds)?;

        let links_removed = match self.deps.disconnector.disconnect(&shake.subject) {
            Ok(n) => n,
            Err(e) => {
                warn!("Disconnect of {} failed: {}", shake.subject, e);
                return None;
            }
        };

        self.disconnects.fetch_add(1, Ordering::Relaxed);
        let event = DisconnectEvent {
            subject: shake.subject,
            links_removed,
            metrics: shake.metrics,
        };
        self.deps.notifier.send(&event.message());
        Some(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum TrackingState {
    Stopped,
    Running(RunningLoop),
}

/// Loop settings fixed for the lifetime of one run.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub interval: Duration,
    pub history_len: usize,
    pub min_movement: f64,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sample_interval(),
            history_len: config.detection.history_len,
            min_movement: config.detection.min_movement,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Owns the single sampling loop of the process.
pub struct Controller {
    state: Mutex<TrackingState>,
    deps: Collaborators,
    settings: LoopSettings,
    disconnects: Arc<AtomicU64>,
}

impl Controller {
    pub fn new(deps: Collaborators, settings: LoopSettings) -> Self {
        Self {
            state: Mutex::new(TrackingState::Stopped),
            deps,
            settings,
            disconnects: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn start(&self) -> StartOutcome {
        let mut state = self.state.lock().await;
        if let TrackingState::Running(running) = &*state {
            if !running.handle.is_finished() {
                return StartOutcome::AlreadyRunning;
            }
            warn!("Sampling loop ended unexpectedly, restarting");
        }

        let mut context = SamplingContext::new(
            MotionTracker::new(self.settings.history_len, self.settings.min_movement),
            self.deps.clone(),
        );
        context.disconnects = Arc::clone(&self.disconnects);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(context, self.settings.interval, cancel.clone()));
        *state = TrackingState::Running(RunningLoop { cancel, handle });
        info!("Shake tracking started ({:?} interval)", self.settings.interval);
        StartOutcome::Started
    }

    /// Returns whether a loop was running.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, TrackingState::Stopped) {
            TrackingState::Stopped => false,
            TrackingState::Running(running) => {
                running.cancel.cancel();
                if let Err(e) = running.handle.await {
                    warn!("Sampling loop did not exit cleanly: {}", e);
                }
                info!("Shake tracking stopped");
                true
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        match &*self.state.lock().await {
            TrackingState::Stopped => false,
            TrackingState::Running(running) => !running.handle.is_finished(),
        }
    }

    /// Auto-start hook for when the host loads a document.
    pub async fn on_session_loaded(&self) {
        if self.is_running().await {
            return;
        }
        match self.start().await {
            StartOutcome::Started => debug!("Tracking auto-started on session load"),
            StartOutcome::AlreadyRunning => {}
        }
    }

    pub fn disconnect_count(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let TrackingState::Running(running) = self.state.get_mut() {
            running.cancel.cancel();
        }
    }
}

async fn sampling_loop(mut context: SamplingContext, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Some(event) = context.tick() {
                    debug!(
                        subject = %event.subject,
                        links = event.links_removed,
                        total_travel = event.metrics.total_travel,
                        "Shake handled"
                    );
                }
            }
        }
    }
    debug!("Sampling loop exited");
}
