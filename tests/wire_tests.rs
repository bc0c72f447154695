use dispatchd::error::DispatchError;
use dispatchd::wire::{
    self, ClientRequest, ErrorCode, MessageType, WorkerFrame, APP_ID, CLIENT_REQUEST_LEN,
    HEADER_LEN, METADATA_LEN, RESULT_LEN,
};

#[test]
fn pack_unpack_i16_round_trip() {
    let mut buf = [0u8; 4];
    wire::pack_i16(&mut buf, 0, 2005).unwrap();
    wire::pack_i16(&mut buf, 2, -1).unwrap();
    assert_eq!(wire::unpack_i16(&buf, 0).unwrap(), 2005);
    assert_eq!(wire::unpack_i16(&buf, 2).unwrap(), -1);
}

#[test]
fn unpack_i16_sign_reinterprets_high_values() {
    // 0xFFFF on the wire reads back as -1, 0x8000 as i16::MIN.
    assert_eq!(wire::unpack_i16(&[0xFF, 0xFF], 0).unwrap(), -1);
    assert_eq!(wire::unpack_i16(&[0x80, 0x00], 0).unwrap(), i16::MIN);
    assert_eq!(wire::unpack_i16(&[0x7F, 0xFF], 0).unwrap(), i16::MAX);
}

#[test]
fn pack_i16_bounds_checked() {
    let mut buf = [0u8; 3];
    assert!(matches!(
        wire::pack_i16(&mut buf, 2, 7),
        Err(DispatchError::Framing(_))
    ));
    assert!(matches!(
        wire::unpack_i16(&buf, 2),
        Err(DispatchError::Framing(_))
    ));
}

#[test]
fn client_submit_round_trip() {
    let request = ClientRequest::Submit {
        metadata: "echo hello".to_string(),
    };
    let frame = request.encode().unwrap();
    assert_eq!(frame.len(), CLIENT_REQUEST_LEN);
    assert_eq!(ClientRequest::decode(&frame).unwrap(), request);
}

#[test]
fn client_status_and_results_carry_job_id_as_text() {
    for request in [
        ClientRequest::Status { job_id: 42 },
        ClientRequest::Results { job_id: 65535 },
    ] {
        let frame = request.encode().unwrap();
        assert_eq!(ClientRequest::decode(&frame).unwrap(), request);
    }
}

#[test]
fn client_frame_rejects_foreign_app_id() {
    let request = ClientRequest::Status { job_id: 1 };
    let mut frame = request.encode().unwrap();
    frame[0] = 0x11;
    frame[1] = 0x22;
    assert!(matches!(
        ClientRequest::decode(&frame),
        Err(DispatchError::AppIdMismatch(_))
    ));
}

#[test]
fn client_frame_rejects_wrong_length() {
    let request = ClientRequest::Status { job_id: 1 };
    let frame = request.encode().unwrap();
    assert!(matches!(
        ClientRequest::decode(&frame[..frame.len() - 1]),
        Err(DispatchError::Framing(_))
    ));
}

#[test]
fn client_frame_rejects_unknown_command() {
    let request = ClientRequest::Status { job_id: 1 };
    let mut frame = request.encode().unwrap();
    // Command id field sits right after the header.
    frame[HEADER_LEN] = 0;
    frame[HEADER_LEN + 1] = 99;
    assert!(matches!(
        ClientRequest::decode(&frame),
        Err(DispatchError::BadRequest(_))
    ));
}

#[test]
fn submit_rejects_empty_metadata() {
    let frame = ClientRequest::Submit {
        metadata: " ".to_string(),
    }
    .encode()
    .unwrap();
    assert!(matches!(
        ClientRequest::decode(&frame),
        Err(DispatchError::BadRequest(_))
    ));
}

#[test]
fn status_rejects_non_numeric_job_id() {
    // Hand-build a status request whose metadata is not a number.
    let mut frame = ClientRequest::Submit {
        metadata: "notanumber".to_string(),
    }
    .encode()
    .unwrap();
    frame[HEADER_LEN + 1] = 2; // rewrite command id to STATUS
    assert!(matches!(
        ClientRequest::decode(&frame),
        Err(DispatchError::BadRequest(_))
    ));
}

#[test]
fn oversized_metadata_is_rejected_at_encode() {
    let request = ClientRequest::Submit {
        metadata: "x".repeat(METADATA_LEN),
    };
    assert!(matches!(
        request.encode(),
        Err(DispatchError::BadRequest(_))
    ));
}

#[test]
fn worker_frames_round_trip() {
    let frames = [
        WorkerFrame::Hello { worker_id: 3 },
        WorkerFrame::NewJob {
            job_id: 9,
            metadata: "capitalize abc".to_string(),
        },
        WorkerFrame::Status {
            status: wire::WIRE_STATUS_FAILURE,
            error_code: ErrorCode::InvalidJob,
        },
        WorkerFrame::Results {
            text: "word count: 7".to_string(),
        },
    ];
    for frame in frames {
        let encoded = frame.encode().unwrap();
        let msg_type = frame.message_type();
        assert_eq!(encoded.len(), HEADER_LEN + msg_type.body_len());
        let decoded = WorkerFrame::decode_body(msg_type, &encoded[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, frame);
    }
}

#[test]
fn worker_results_body_is_fixed_size() {
    assert_eq!(MessageType::WorkerResults.body_len(), RESULT_LEN);
    assert!(matches!(
        WorkerFrame::decode_body(MessageType::WorkerResults, &[0u8; 10]),
        Err(DispatchError::Framing(_))
    ));
}

#[tokio::test]
async fn read_worker_frame_returns_none_on_eof() {
    let (mut client, server) = tokio::io::duplex(1024);
    drop(server);
    assert_eq!(wire::read_worker_frame(&mut client).await.unwrap(), None);
}

#[tokio::test]
async fn read_worker_frame_reports_foreign_app_id() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let mut frame = WorkerFrame::Hello { worker_id: 1 }.encode().unwrap();
    frame[0] = 0x01;
    frame[1] = 0x02;
    tokio::io::AsyncWriteExt::write_all(&mut server, &frame)
        .await
        .unwrap();

    match wire::read_worker_frame(&mut client).await {
        Err(DispatchError::AppIdMismatch(id)) => assert_ne!(id, APP_ID),
        other => panic!("expected AppIdMismatch, got {:?}", other),
    }

    // The bad frame was consumed in full; the stream stays usable.
    let good = WorkerFrame::Hello { worker_id: 7 }.encode().unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut server, &good)
        .await
        .unwrap();
    assert_eq!(
        wire::read_worker_frame(&mut client).await.unwrap(),
        Some(WorkerFrame::Hello { worker_id: 7 })
    );
}

#[tokio::test]
async fn read_worker_frame_rejects_unknown_message_type() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let mut header = [0u8; HEADER_LEN];
    wire::pack_i16(&mut header, 0, APP_ID).unwrap();
    wire::pack_i16(&mut header, 2, 99).unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut server, &header)
        .await
        .unwrap();
    assert!(matches!(
        wire::read_worker_frame(&mut client).await,
        Err(DispatchError::Framing(_))
    ));
}
