//! One-shot client round trip: connect, send one framed request, read the
//! NUL-terminated reply, done. The server closes the connection after
//! replying.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{DispatchError, Result};
use crate::wire::ClientRequest;

/// Send one request and return the reply text with padding stripped.
pub async fn request(addr: SocketAddr, request: &ClientRequest) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(&request.encode()?).await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;

    let end = reply.iter().position(|&b| b == 0).unwrap_or(reply.len());
    String::from_utf8(reply[..end].to_vec())
        .map_err(|_| DispatchError::Framing("reply is not valid utf-8".into()))
}

/// Submit a job; returns the server's confirmation text.
pub async fn submit(addr: SocketAddr, metadata: &str) -> Result<String> {
    request(
        addr,
        &ClientRequest::Submit {
            metadata: metadata.to_string(),
        },
    )
    .await
}

/// Poll a job's status.
pub async fn status(addr: SocketAddr, job_id: u16) -> Result<String> {
    request(addr, &ClientRequest::Status { job_id }).await
}

/// Fetch a job's results.
pub async fn results(addr: SocketAddr, job_id: u16) -> Result<String> {
    request(addr, &ClientRequest::Results { job_id }).await
}
