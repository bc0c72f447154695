//! Worker runtime: a long-lived connection that receives job assignments and
//! reports results or failures.

pub mod processing;

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, Result};
use crate::wire::{self, WorkerFrame, WIRE_STATUS_FAILURE};
use crate::worker::processing::process_job;

/// Connect to the server's worker port and process assignments until the
/// server closes the connection or shutdown is requested.
pub async fn run_worker(addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    tracing::info!(%addr, "Connected to server");

    let worker_id = match wire::read_worker_frame(&mut stream).await? {
        Some(WorkerFrame::Hello { worker_id }) => worker_id,
        Some(other) => {
            return Err(DispatchError::Framing(format!(
                "expected handshake, got {:?}",
                other.message_type()
            )))
        }
        None => {
            return Err(DispatchError::Framing(
                "server closed the connection before the handshake".into(),
            ))
        }
    };
    tracing::info!(worker_id, "Handshake complete");

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(worker_id, "Worker shutting down");
                return Ok(());
            }
            frame = wire::read_worker_frame(&mut stream) => frame,
        };

        match frame {
            Ok(Some(WorkerFrame::NewJob { job_id, metadata })) => {
                tracing::info!(worker_id, job_id, %metadata, "Job received");
                let outcome = process_job(&metadata);
                let report = if outcome.code == wire::ErrorCode::Ok {
                    WorkerFrame::Results {
                        text: clamp_result(outcome.text),
                    }
                } else {
                    tracing::warn!(worker_id, job_id, code = ?outcome.code, "Job processing failed");
                    WorkerFrame::Status {
                        status: WIRE_STATUS_FAILURE,
                        error_code: outcome.code,
                    }
                };
                // A report that cannot be framed must not take the worker
                // down; downgrade it to a failure status, which always fits.
                let encoded = match report.encode() {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        tracing::warn!(worker_id, job_id, error = %e, "Could not frame report");
                        WorkerFrame::Status {
                            status: WIRE_STATUS_FAILURE,
                            error_code: wire::ErrorCode::Internal,
                        }
                        .encode()?
                    }
                };
                stream.write_all(&encoded).await?;
            }
            Ok(Some(other)) => {
                tracing::warn!(worker_id, msg_type = ?other.message_type(), "Unexpected frame from server");
            }
            Ok(None) => {
                tracing::info!(worker_id, "Server closed the connection");
                return Ok(());
            }
            Err(DispatchError::AppIdMismatch(app_id)) => {
                tracing::warn!(worker_id, app_id, "Dropping frame with foreign application id");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Cut a result down to what the fixed-size result blob can carry.
///
/// Processing can legitimately produce more bytes than it was given;
/// `capitalize` on some Unicode text grows under uppercasing. The wire
/// format cannot widen, so the tail is dropped at a character boundary.
fn clamp_result(mut text: String) -> String {
    let max = wire::RESULT_LEN - 1;
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}
