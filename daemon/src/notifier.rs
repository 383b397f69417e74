//! Informational event sender

use crate::config::NotificationMethod;
use crate::protocol::{InfoData, Response};
use notify_rust::Notification;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

const SUMMARY: &str = "Shake to Disconnect";

/// Shows a desktop notification. May block until the notification server replies.
pub trait DesktopSink: Send + Sync + 'static {
    fn show(&self, summary: &str, body: &str) -> Result<(), notify_rust::error::Error>;
}

struct NotifyRust;

impl DesktopSink for NotifyRust {
    fn show(&self, summary: &str, body: &str) -> Result<(), notify_rust::error::Error> {
        send_notification(summary, body)
    }
}

pub struct Notifier {
    method: NotificationMethod,
    clients: Option<broadcast::Sender<Response>>,
    desktop: Arc<dyn DesktopSink>,
}

impl Notifier {
    pub fn new(method: NotificationMethod) -> Self {
        Self {
            method,
            clients: None,
            desktop: Arc::new(NotifyRust),
        }
    }

    /// Also forwards every message to connected IPC clients.
    pub fn with_broadcast(mut self, tx: broadcast::Sender<Response>) -> Self {
        self.clients = Some(tx);
        self
    }

    pub fn with_desktop_sink(mut self, sink: Arc<dyn DesktopSink>) -> Self {
        self.desktop = sink;
        self
    }

    /// Never waits on the desktop notification; that round trip runs on a
    /// blocking thread.
    pub fn send(&self, message: &str) {
        if matches!(self.method, NotificationMethod::Log | NotificationMethod::Both) {
            info!("{}", message);
        }
        if matches!(self.method, NotificationMethod::Desktop | NotificationMethod::Both) {
            self.dispatch_desktop(message.to_string());
        }
        if let Some(tx) = &self.clients {
            // No subscribers is fine
            let _ = tx.send(Response::Info {
                data: InfoData {
                    message: message.to_string(),
                },
            });
        }
    }

    fn dispatch_desktop(&self, body: String) {
        let sink = Arc::clone(&self.desktop);
        let job = move || {
            if let Err(e) = sink.show(SUMMARY, &body) {
                warn!("Desktop notification failed: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => {
                if let Err(e) = std::thread::Builder::new()
                    .name("desktop-notify".to_string())
                    .spawn(job)
                {
                    warn!("Could not spawn desktop notification thread: {}", e);
                }
            }
        }
    }
}

pub fn send_notification(summary: &str, body: &str) -> Result<(), notify_rust::error::Error> {
    Notification::new()
        .summary(summary)
        .body(body)
        .appname("ShakeDisconnect")
        .show()?;
    Ok(())
}
