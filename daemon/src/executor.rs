//! Disconnect action executor

use crate::collector::SubjectId;
use crate::protocol::{DisconnectData, Response};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum DisconnectError {
    #[error("subject {0} no longer exists")]
    SubjectMissing(SubjectId),
    #[error("host unavailable: {0}")]
    HostUnavailable(String),
}

pub trait Disconnector: Send + Sync {
    /// Removes every link touching the subject's input and output sockets.
    ///
    /// Returns how many links were removed; zero on an already isolated node.
    fn disconnect(&self, subject: &SubjectId) -> Result<usize, DisconnectError>;
}

/// Forwards disconnect commands to connected editor clients.
///
/// The editor owns the links, so the removal count is unknown here and the
/// number of clients that received the command is returned instead.
pub struct BroadcastDisconnector {
    tx: broadcast::Sender<Response>,
}

impl BroadcastDisconnector {
    pub fn new(tx: broadcast::Sender<Response>) -> Self {
        Self { tx }
    }
}

impl Disconnector for BroadcastDisconnector {
    fn disconnect(&self, subject: &SubjectId) -> Result<usize, DisconnectError> {
        let command = Response::Disconnect {
            data: DisconnectData {
                container: subject.container.clone(),
                item: subject.item.clone(),
            },
        };
        self.tx
            .send(command)
            .map_err(|_| DisconnectError::HostUnavailable("no editor connected".to_string()))
    }
}
