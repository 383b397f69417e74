use anyhow::Result;
use shake_daemon::{
    collector::{ReportedSubject, SubjectCollector, SubjectId, SubjectSample},
    config::{Config, ConfigStore, SharedConfig},
    controller::{Collaborators, Controller, LoopSettings, StartOutcome},
    executor::BroadcastDisconnector,
    history::Position,
    notifier::Notifier,
    protocol::{ConfigData, Request, Response, StatusData},
    socket::{handle_client, RequestHandler, SocketServer},
};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

struct DaemonState {
    controller: Controller,
    config: Arc<SharedConfig>,
    store: ConfigStore,
    reported: Arc<ReportedSubject>,
}

impl DaemonState {
    fn new(
        config: Config,
        store: ConfigStore,
        broadcast_tx: tokio::sync::broadcast::Sender<Response>,
    ) -> Self {
        let settings = LoopSettings::from_config(&config);
        let notifier =
            Notifier::new(config.general.notification_method).with_broadcast(broadcast_tx.clone());
        let config = Arc::new(SharedConfig::new(config));
        let reported = Arc::new(ReportedSubject::new());

        let deps = Collaborators {
            collector: reported.clone(),
            disconnector: Arc::new(BroadcastDisconnector::new(broadcast_tx)),
            thresholds: config.clone(),
            notifier: Arc::new(notifier),
        };

        Self {
            controller: Controller::new(deps, settings),
            config,
            store,
            reported,
        }
    }

    fn config_data(&self) -> ConfigData {
        self.config.snapshot().detection.thresholds().into()
    }
}

#[async_trait::async_trait]
impl RequestHandler for DaemonState {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::StartTracking => {
                let outcome = self.controller.start().await;
                Response::Response {
                    id: None,
                    data: serde_json::json!({
                        "success": true,
                        "already_running": outcome == StartOutcome::AlreadyRunning,
                    }),
                }
            }

            Request::StopTracking => {
                self.controller.stop().await;
                Response::ok()
            }

            Request::SessionLoaded => {
                if self.config.snapshot().general.autostart {
                    self.controller.on_session_loaded().await;
                }
                Response::ok()
            }

            Request::GetStatus => Response::Status {
                data: StatusData {
                    running: self.controller.is_running().await,
                    subject: self.reported.current_subject().map(|s| s.id.to_string()),
                    disconnect_count: self.controller.disconnect_count(),
                },
            },

            Request::GetConfig => Response::Config {
                data: self.config_data(),
            },

            Request::UpdateConfig { params } => {
                let snapshot = self.config.update(|config| {
                    if let Some(v) = params.shake_threshold {
                        config.detection.set_shake_threshold(v);
                    }
                    if let Some(v) = params.range_limit {
                        config.detection.set_range_limit(v);
                    }
                    config.clone()
                });
                if let Err(e) = self.store.save(&snapshot) {
                    warn!("Failed to persist config: {}", e);
                }
                Response::Config {
                    data: self.config_data(),
                }
            }

            Request::ReportSubject { params } => {
                self.reported.report(SubjectSample {
                    id: SubjectId::new(params.container, params.item),
                    position: Position::new(params.x, params.y),
                });
                Response::ok()
            }

            Request::ClearSubject => {
                self.reported.clear();
                Response::ok()
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();
    info!("Shake-to-disconnect daemon starting...");

    let (store, config, _) = ConfigStore::open(Config::config_path());
    let autostart = config.general.autostart;

    let socket_path = SocketServer::socket_path();
    let server = SocketServer::bind(&socket_path).await?;

    let state = Arc::new(DaemonState::new(config, store, server.broadcast_sender()));

    if autostart {
        state.controller.on_session_loaded().await;
    }

    info!("Daemon ready, listening for connections...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            accepted = server.accept() => {
                match accepted {
                    Ok(stream) => {
                        let state = Arc::clone(&state);
                        let broadcast_rx = server.broadcast_sender().subscribe();
                        tokio::spawn(async move {
                            handle_client(stream, broadcast_rx, state).await;
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    state.controller.stop().await;
    Ok(())
}
