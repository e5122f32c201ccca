// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer RPC server and connection handling.

use dimutex_core::{Answer, MutexCoordinator, PeerLink};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request read timed out")]
    Timeout,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Accept peer connections until shutdown, one task per connection.
///
/// Connections waiting on a deferred grant outlive the accept loop; they
/// are answered when the coordinator releases or abandons its claim.
pub async fn serve<L: PeerLink>(
    listener: TcpListener,
    coordinator: MutexCoordinator<L>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.wait_for(|stop| *stop) => break,
        };
        match accepted {
            Ok((stream, remote)) => {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(&coordinator, stream).await {
                        warn!(%remote, error = %e, "peer connection failed");
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
    info!("peer server stopped");
}

/// Handle a single peer connection
pub async fn handle_connection<L: PeerLink>(
    coordinator: &MutexCoordinator<L>,
    stream: TcpStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(ProtocolError::Timeout) => return Err(ServerError::Timeout),
        Err(ProtocolError::ConnectionClosed) => {
            debug!("peer disconnected before sending request");
            return Ok(());
        }
        Err(e) => return Err(ServerError::Protocol(e)),
    };

    debug!(?request, "received request");
    let response = handle_request(coordinator, request).await;

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

async fn handle_request<L: PeerLink>(coordinator: &MutexCoordinator<L>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong {
            node: coordinator.identity().clone(),
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            status: coordinator.status(),
        },

        Request::AccessRequest { request } => {
            let requester = request.requester.clone();
            match coordinator.answer_request(request) {
                Answer::Granted(_) => Response::Granted,
                Answer::Rejected(e) => Response::Error {
                    message: e.to_string(),
                },
                Answer::Deferred(deferred) => match deferred.wait().await {
                    Ok(_) => {
                        debug!(%requester, "deferred grant sent");
                        Response::Granted
                    }
                    Err(e) => Response::Error {
                        message: e.to_string(),
                    },
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
