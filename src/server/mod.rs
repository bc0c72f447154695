//! The dispatch server: two listeners, a worker pool, and a console, all
//! funneled into one event loop.
//!
//! Registry and queue state lives in the [`Dispatcher`] and is touched only
//! by the loop task; listeners, worker readers, and client connections run
//! as tasks that deliver tagged events over a channel. Each wake handles the
//! ready events, sweeps workers that reported, then runs the scheduler.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{DispatchError, Result};
use crate::scheduler::Dispatcher;
use crate::wire::{self, ClientRequest, ErrorCode, WorkerFrame, WIRE_STATUS_FAILURE};

/// Operator commands read from standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Quit,
    Stats,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "quit" => Some(ConsoleCommand::Quit),
            "stats" => Some(ConsoleCommand::Stats),
            _ => None,
        }
    }
}

/// Tagged readiness events delivered to the loop task.
enum Event {
    ClientRequest {
        request: ClientRequest,
        reply: oneshot::Sender<String>,
    },
    WorkerReport {
        worker_id: u16,
        frame: WorkerFrame,
    },
    WorkerGone {
        worker_id: u16,
    },
    Console(ConsoleCommand),
}

pub struct Server {
    client_listener: TcpListener,
    worker_listener: TcpListener,
    dispatcher: Dispatcher,
}

impl Server {
    /// Bind both listening sockets. Failure here is fatal to startup.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let client_listener = TcpListener::bind(config.client_addr).await?;
        let worker_listener = TcpListener::bind(config.worker_addr).await?;
        Ok(Self {
            client_listener,
            worker_listener,
            dispatcher: Dispatcher::new(config.max_retries),
        })
    }

    /// Actual client listener address; useful when bound to port 0.
    pub fn client_addr(&self) -> Result<SocketAddr> {
        Ok(self.client_listener.local_addr()?)
    }

    /// Actual worker listener address.
    pub fn worker_addr(&self) -> Result<SocketAddr> {
        Ok(self.worker_listener.local_addr()?)
    }

    /// Run the event loop until the token is cancelled (signal or console
    /// `quit`).
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<Event>(128);
        spawn_console(event_tx.clone(), shutdown.clone());

        let mut writers: HashMap<u16, OwnedWriteHalf> = HashMap::new();
        tracing::info!(
            client_addr = %self.client_listener.local_addr()?,
            worker_addr = %self.worker_listener.local_addr()?,
            "Server listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                res = self.client_listener.accept() => match res {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "Client connected");
                        tokio::spawn(serve_client(stream, event_tx.clone()));
                    }
                    Err(e) => tracing::warn!(error = %e, "Client accept failed"),
                },

                res = self.worker_listener.accept() => match res {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "Worker connected");
                        self.admit_worker(stream, &event_tx, &mut writers).await;
                    }
                    Err(e) => tracing::warn!(error = %e, "Worker accept failed"),
                },

                Some(event) = event_rx.recv() => {
                    self.handle_event(event, &mut writers, &shutdown);
                }
            }

            // Post-wake phases: settle reported workers, then assign.
            self.dispatcher.sweep_reported();
            self.push_assignments(&mut writers).await;
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Accept-time handshake: allocate an id, send the hello frame, register
    /// the connection halves.
    async fn admit_worker(
        &mut self,
        stream: TcpStream,
        event_tx: &mpsc::Sender<Event>,
        writers: &mut HashMap<u16, OwnedWriteHalf>,
    ) {
        let worker_id = self.dispatcher.register_worker();
        let (read_half, mut write_half) = stream.into_split();

        let hello = WorkerFrame::Hello { worker_id };
        let frame = match hello.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Could not encode handshake");
                self.dispatcher.worker_disconnected(worker_id);
                return;
            }
        };
        if let Err(e) = write_half.write_all(&frame).await {
            tracing::warn!(worker_id, error = %e, "Handshake write failed");
            self.dispatcher.worker_disconnected(worker_id);
            return;
        }

        writers.insert(worker_id, write_half);
        tokio::spawn(read_worker(worker_id, read_half, event_tx.clone()));
    }

    fn handle_event(
        &mut self,
        event: Event,
        writers: &mut HashMap<u16, OwnedWriteHalf>,
        shutdown: &CancellationToken,
    ) {
        match event {
            Event::ClientRequest { request, reply } => {
                let text = self.dispatcher.handle_request(&request);
                // The client may have hung up; nothing to do then.
                let _ = reply.send(text);
            }
            Event::WorkerReport { worker_id, frame } => match frame {
                WorkerFrame::Status { status, error_code } => {
                    self.dispatcher
                        .record_status_report(worker_id, status, error_code);
                }
                WorkerFrame::Results { text } => {
                    self.dispatcher.record_result(worker_id, text);
                }
                other => {
                    tracing::warn!(
                        worker_id,
                        msg_type = ?other.message_type(),
                        "Unexpected frame from worker"
                    );
                }
            },
            Event::WorkerGone { worker_id } => {
                writers.remove(&worker_id);
                self.dispatcher.worker_disconnected(worker_id);
            }
            Event::Console(ConsoleCommand::Stats) => {
                println!("{}", self.dispatcher.stats());
            }
            Event::Console(ConsoleCommand::Quit) => {
                tracing::info!("Quit requested from console");
                shutdown.cancel();
            }
        }
    }

    /// Drain every eligible (worker, job) pair and push the assignment
    /// frames. A failed write counts as a disconnect, which re-queues the
    /// job through the retry path.
    async fn push_assignments(&mut self, writers: &mut HashMap<u16, OwnedWriteHalf>) {
        while let Some(assignment) = self.dispatcher.next_assignment() {
            let frame = WorkerFrame::NewJob {
                job_id: assignment.job_id,
                metadata: assignment.metadata,
            };
            let encoded = match frame.encode() {
                Ok(encoded) => encoded,
                Err(e) => {
                    // Metadata is length-checked at submit; an oversized blob
                    // here means the job record itself is unusable.
                    tracing::error!(
                        job_id = assignment.job_id,
                        error = %e,
                        "Could not encode assignment, failing job"
                    );
                    self.dispatcher.record_status_report(
                        assignment.worker_id,
                        WIRE_STATUS_FAILURE,
                        ErrorCode::InvalidJob,
                    );
                    self.dispatcher.sweep_reported();
                    continue;
                }
            };

            let Some(writer) = writers.get_mut(&assignment.worker_id) else {
                tracing::warn!(
                    worker_id = assignment.worker_id,
                    "Assignment to a worker with no connection"
                );
                self.dispatcher.worker_disconnected(assignment.worker_id);
                continue;
            };
            if let Err(e) = writer.write_all(&encoded).await {
                tracing::warn!(
                    worker_id = assignment.worker_id,
                    job_id = assignment.job_id,
                    error = %e,
                    "Assignment write failed, treating worker as gone"
                );
                writers.remove(&assignment.worker_id);
                self.dispatcher.worker_disconnected(assignment.worker_id);
            } else {
                tracing::debug!(
                    worker_id = assignment.worker_id,
                    job_id = assignment.job_id,
                    "Assignment sent"
                );
            }
        }
    }
}

/// Per-connection client task: one read, one dispatched request, one reply,
/// close. Keeping this off the loop task means a slow client never stalls
/// other descriptors.
async fn serve_client(mut stream: TcpStream, events: mpsc::Sender<Event>) {
    let reply_text = match wire::read_client_request(&mut stream).await {
        Ok(request) => {
            let (tx, rx) = oneshot::channel();
            if events
                .send(Event::ClientRequest { request, reply: tx })
                .await
                .is_err()
            {
                return;
            }
            match rx.await {
                Ok(text) => text,
                Err(_) => return,
            }
        }
        Err(DispatchError::AppIdMismatch(app_id)) => {
            // Protocol mismatch: drop silently, no reply.
            tracing::warn!(app_id, "Dropping client request with foreign application id");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting malformed client request");
            e.to_string()
        }
    };

    let mut out = reply_text.into_bytes();
    out.push(0);
    if let Err(e) = stream.write_all(&out).await {
        tracing::debug!(error = %e, "Client reply write failed");
    }
}

/// Reader task for one established worker connection. EOF or an I/O error
/// is reported as the worker being gone.
async fn read_worker(worker_id: u16, mut read_half: OwnedReadHalf, events: mpsc::Sender<Event>) {
    loop {
        match wire::read_worker_frame(&mut read_half).await {
            Ok(Some(frame)) => {
                if events
                    .send(Event::WorkerReport { worker_id, frame })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(None) => {
                let _ = events.send(Event::WorkerGone { worker_id }).await;
                return;
            }
            Err(DispatchError::AppIdMismatch(app_id)) => {
                tracing::warn!(
                    worker_id,
                    app_id,
                    "Dropping worker frame with foreign application id"
                );
            }
            Err(e) => {
                tracing::warn!(worker_id, error = %e, "Worker connection error");
                let _ = events.send(Event::WorkerGone { worker_id }).await;
                return;
            }
        }
    }
}

/// Console task: `quit` and `stats` line commands on standard input.
fn spawn_console(events: mpsc::Sender<Event>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match ConsoleCommand::parse(&line) {
                        Some(cmd) => {
                            if events.send(Event::Console(cmd)).await.is_err() {
                                return;
                            }
                        }
                        None => {
                            tracing::warn!(command = %line.trim(), "Unknown console command");
                        }
                    }
                }
                Ok(None) | Err(_) => return,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_parse_known_commands() {
        assert_eq!(ConsoleCommand::parse("quit"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("stats"), Some(ConsoleCommand::Stats));
        assert_eq!(ConsoleCommand::parse("  stats  "), Some(ConsoleCommand::Stats));
    }

    #[test]
    fn console_parse_rejects_unknown() {
        assert_eq!(ConsoleCommand::parse("restart"), None);
        assert_eq!(ConsoleCommand::parse(""), None);
    }
}
