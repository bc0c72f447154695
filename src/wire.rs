//! Binary wire protocol shared by the server, workers, and clients.
//!
//! Every message starts with a `{application_id, message_type}` header of two
//! big-endian 16-bit integers. Variable text travels in fixed-size NUL-padded
//! blobs so frames on a persistent stream are self-delimiting.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{DispatchError, Result};

/// Application id carried in every frame header. Frames with a different id
/// are dropped without a reply.
pub const APP_ID: i16 = 2005;

/// Frame header: application id + message type, 2 bytes each.
pub const HEADER_LEN: usize = 4;

/// Fixed size of the NUL-padded job metadata blob.
pub const METADATA_LEN: usize = 256;

/// Fixed size of the NUL-padded result text blob.
pub const RESULT_LEN: usize = 256;

/// Full size of a client request frame: header + command id + metadata blob.
pub const CLIENT_REQUEST_LEN: usize = HEADER_LEN + 2 + METADATA_LEN;

// ---------------------------------------------------------------------------
// Integer pack/unpack
// ---------------------------------------------------------------------------

/// Pack a 16-bit integer big-endian into `buf` at `offset`.
pub fn pack_i16(buf: &mut [u8], offset: usize, v: i16) -> Result<()> {
    let end = offset
        .checked_add(2)
        .ok_or_else(|| DispatchError::Framing("offset overflow".into()))?;
    if end > buf.len() {
        return Err(DispatchError::Framing(format!(
            "pack_i16 at {} exceeds buffer of {} bytes",
            offset,
            buf.len()
        )));
    }
    buf[offset..end].copy_from_slice(&(v as u16).to_be_bytes());
    Ok(())
}

/// Unpack a big-endian 16-bit integer. Values above 0x7FFF come back
/// negative, matching the signed reinterpretation the protocol relies on for
/// status codes like `W_FAILURE`.
pub fn unpack_i16(buf: &[u8], offset: usize) -> Result<i16> {
    let end = offset
        .checked_add(2)
        .ok_or_else(|| DispatchError::Framing("offset overflow".into()))?;
    if end > buf.len() {
        return Err(DispatchError::Framing(format!(
            "unpack_i16 at {} exceeds buffer of {} bytes",
            offset,
            buf.len()
        )));
    }
    let raw = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
    Ok(raw as i16)
}

// ---------------------------------------------------------------------------
// Message and command identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Client request: command id + metadata blob follow.
    ClientRequest,
    /// Server -> worker: assigned worker id follows.
    WorkerHello,
    /// Server -> worker: job id + metadata blob follow.
    NewJob,
    /// Worker -> server: worker status + error code follow.
    WorkerStatus,
    /// Worker -> server: result text blob follows, status implied success.
    WorkerResults,
}

impl MessageType {
    pub fn as_i16(self) -> i16 {
        match self {
            MessageType::ClientRequest => 1,
            MessageType::WorkerHello => 10,
            MessageType::NewJob => 11,
            MessageType::WorkerStatus => 12,
            MessageType::WorkerResults => 13,
        }
    }

    pub fn from_i16(v: i16) -> Result<Self> {
        match v {
            1 => Ok(MessageType::ClientRequest),
            10 => Ok(MessageType::WorkerHello),
            11 => Ok(MessageType::NewJob),
            12 => Ok(MessageType::WorkerStatus),
            13 => Ok(MessageType::WorkerResults),
            other => Err(DispatchError::Framing(format!(
                "unknown message type {}",
                other
            ))),
        }
    }

    /// Byte count of the fixed-size body that follows the header.
    pub fn body_len(self) -> usize {
        match self {
            MessageType::ClientRequest => 2 + METADATA_LEN,
            MessageType::WorkerHello => 2,
            MessageType::NewJob => 2 + METADATA_LEN,
            MessageType::WorkerStatus => 4,
            MessageType::WorkerResults => RESULT_LEN,
        }
    }
}

/// Error codes reported by workers alongside a failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    /// The job itself is malformed; never retried.
    InvalidJob,
    /// Worker-side processing fault; eligible for retry.
    Internal,
    /// Unrecognized code; treated as transient.
    Other(i16),
}

impl ErrorCode {
    pub fn as_i16(self) -> i16 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::InvalidJob => 1,
            ErrorCode::Internal => 2,
            ErrorCode::Other(v) => v,
        }
    }

    pub fn from_i16(v: i16) -> Self {
        match v {
            0 => ErrorCode::Ok,
            1 => ErrorCode::InvalidJob,
            2 => ErrorCode::Internal,
            other => ErrorCode::Other(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Padded text blobs
// ---------------------------------------------------------------------------

/// Append `text` to `buf` as a NUL-padded blob of exactly `len` bytes.
/// The text must leave room for at least one terminating NUL.
pub fn put_padded(buf: &mut BytesMut, text: &str, len: usize) -> Result<()> {
    if text.len() >= len {
        return Err(DispatchError::BadRequest(format!(
            "text of {} bytes exceeds the {}-byte limit",
            text.len(),
            len - 1
        )));
    }
    if text.bytes().any(|b| b == 0) {
        return Err(DispatchError::BadRequest(
            "text contains an embedded NUL".into(),
        ));
    }
    buf.put_slice(text.as_bytes());
    buf.put_bytes(0, len - text.len());
    Ok(())
}

/// Parse a NUL-padded blob of exactly `len` bytes starting at `offset`.
pub fn parse_padded(buf: &[u8], offset: usize, len: usize) -> Result<String> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| DispatchError::Framing("offset overflow".into()))?;
    if end > buf.len() {
        return Err(DispatchError::Framing(format!(
            "blob of {} bytes at {} exceeds buffer of {} bytes",
            len,
            offset,
            buf.len()
        )));
    }
    let blob = &buf[offset..end];
    let text_end = blob
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| DispatchError::BadRequest("unterminated text blob".into()))?;
    std::str::from_utf8(&blob[..text_end])
        .map(|s| s.to_string())
        .map_err(|_| DispatchError::BadRequest("text blob is not valid utf-8".into()))
}

// ---------------------------------------------------------------------------
// Client requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Submit { metadata: String },
    Status { job_id: u16 },
    Results { job_id: u16 },
}

const CMD_SUBMIT: i16 = 1;
const CMD_STATUS: i16 = 2;
const CMD_RESULTS: i16 = 3;

impl ClientRequest {
    /// Encode into a fixed-size request frame.
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(CLIENT_REQUEST_LEN);
        buf.put_i16(APP_ID);
        buf.put_i16(MessageType::ClientRequest.as_i16());
        match self {
            ClientRequest::Submit { metadata } => {
                buf.put_i16(CMD_SUBMIT);
                put_padded(&mut buf, metadata, METADATA_LEN)?;
            }
            ClientRequest::Status { job_id } => {
                buf.put_i16(CMD_STATUS);
                put_padded(&mut buf, &job_id.to_string(), METADATA_LEN)?;
            }
            ClientRequest::Results { job_id } => {
                buf.put_i16(CMD_RESULTS);
                put_padded(&mut buf, &job_id.to_string(), METADATA_LEN)?;
            }
        }
        Ok(buf)
    }

    /// Decode a full request frame, header included.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() != CLIENT_REQUEST_LEN {
            return Err(DispatchError::Framing(format!(
                "client request frame is {} bytes, expected {}",
                frame.len(),
                CLIENT_REQUEST_LEN
            )));
        }
        let app_id = unpack_i16(frame, 0)?;
        if app_id != APP_ID {
            return Err(DispatchError::AppIdMismatch(app_id));
        }
        let msg_type = MessageType::from_i16(unpack_i16(frame, 2)?)?;
        if msg_type != MessageType::ClientRequest {
            return Err(DispatchError::Framing(format!(
                "unexpected message type {:?} on the client port",
                msg_type
            )));
        }
        let command = unpack_i16(frame, 4)?;
        let metadata = parse_padded(frame, HEADER_LEN + 2, METADATA_LEN)?;
        match command {
            CMD_SUBMIT => {
                if metadata.trim().is_empty() {
                    return Err(DispatchError::BadRequest("empty job metadata".into()));
                }
                Ok(ClientRequest::Submit { metadata })
            }
            CMD_STATUS => Ok(ClientRequest::Status {
                job_id: parse_job_id(&metadata)?,
            }),
            CMD_RESULTS => Ok(ClientRequest::Results {
                job_id: parse_job_id(&metadata)?,
            }),
            other => Err(DispatchError::BadRequest(format!(
                "unknown command id {}",
                other
            ))),
        }
    }
}

fn parse_job_id(metadata: &str) -> Result<u16> {
    metadata
        .trim()
        .parse::<u16>()
        .map_err(|_| DispatchError::BadRequest(format!("invalid job id {:?}", metadata)))
}

/// Read one client request frame off the socket.
pub async fn read_client_request<R>(stream: &mut R) -> Result<ClientRequest>
where
    R: AsyncRead + Unpin,
{
    let mut frame = vec![0u8; CLIENT_REQUEST_LEN];
    stream
        .read_exact(&mut frame)
        .await
        .map_err(|e| DispatchError::Framing(format!("short client request: {}", e)))?;
    ClientRequest::decode(&frame)
}

// ---------------------------------------------------------------------------
// Worker channel frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerFrame {
    /// Handshake sent by the server immediately after accept.
    Hello { worker_id: u16 },
    /// Job assignment pushed by the server.
    NewJob { job_id: u16, metadata: String },
    /// Status report from a worker: wire status code + error code.
    Status { status: i16, error_code: ErrorCode },
    /// Result report from a worker; success is implied.
    Results { text: String },
}

impl WorkerFrame {
    pub fn message_type(&self) -> MessageType {
        match self {
            WorkerFrame::Hello { .. } => MessageType::WorkerHello,
            WorkerFrame::NewJob { .. } => MessageType::NewJob,
            WorkerFrame::Status { .. } => MessageType::WorkerStatus,
            WorkerFrame::Results { .. } => MessageType::WorkerResults,
        }
    }

    pub fn encode(&self) -> Result<BytesMut> {
        let msg_type = self.message_type();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + msg_type.body_len());
        buf.put_i16(APP_ID);
        buf.put_i16(msg_type.as_i16());
        match self {
            WorkerFrame::Hello { worker_id } => {
                buf.put_i16(*worker_id as i16);
            }
            WorkerFrame::NewJob { job_id, metadata } => {
                buf.put_i16(*job_id as i16);
                put_padded(&mut buf, metadata, METADATA_LEN)?;
            }
            WorkerFrame::Status { status, error_code } => {
                buf.put_i16(*status);
                buf.put_i16(error_code.as_i16());
            }
            WorkerFrame::Results { text } => {
                put_padded(&mut buf, text, RESULT_LEN)?;
            }
        }
        Ok(buf)
    }

    /// Decode a frame body given its already-parsed message type.
    pub fn decode_body(msg_type: MessageType, body: &[u8]) -> Result<Self> {
        if body.len() != msg_type.body_len() {
            return Err(DispatchError::Framing(format!(
                "{:?} body is {} bytes, expected {}",
                msg_type,
                body.len(),
                msg_type.body_len()
            )));
        }
        match msg_type {
            MessageType::WorkerHello => Ok(WorkerFrame::Hello {
                worker_id: unpack_i16(body, 0)? as u16,
            }),
            MessageType::NewJob => Ok(WorkerFrame::NewJob {
                job_id: unpack_i16(body, 0)? as u16,
                metadata: parse_padded(body, 2, METADATA_LEN)?,
            }),
            MessageType::WorkerStatus => Ok(WorkerFrame::Status {
                status: unpack_i16(body, 0)?,
                error_code: ErrorCode::from_i16(unpack_i16(body, 2)?),
            }),
            MessageType::WorkerResults => Ok(WorkerFrame::Results {
                text: parse_padded(body, 0, RESULT_LEN)?,
            }),
            MessageType::ClientRequest => Err(DispatchError::Framing(
                "client request frame on the worker channel".into(),
            )),
        }
    }
}

/// Read one frame off a worker channel. Returns `Ok(None)` on a clean EOF.
///
/// A frame with a foreign application id is consumed in full and reported as
/// `AppIdMismatch` so the caller can drop it and keep reading.
pub async fn read_worker_frame<R>(stream: &mut R) -> Result<Option<WorkerFrame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let app_id = unpack_i16(&header, 0)?;
    let msg_type = MessageType::from_i16(unpack_i16(&header, 2)?)?;

    let mut body = vec![0u8; msg_type.body_len()];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| DispatchError::Framing(format!("short {:?} body: {}", msg_type, e)))?;

    if app_id != APP_ID {
        return Err(DispatchError::AppIdMismatch(app_id));
    }

    Ok(Some(WorkerFrame::decode_body(msg_type, &body)?))
}

/// Wire value for a worker reporting success.
pub const WIRE_STATUS_SUCCESS: i16 = 1;
/// Wire value for a worker reporting failure.
pub const WIRE_STATUS_FAILURE: i16 = -1;
