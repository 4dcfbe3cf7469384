use crate::frame::{decode, encode, read_frame, read_message, write_frame, write_message, MAX_FRAME_LEN};
use crate::{ControlRequest, TaskEnvelope};
use bytes::Bytes;
use mrd_core::TaskId;
use std::io::Cursor;

#[tokio::test]
async fn write_message_adds_a_four_byte_length_prefix() {
    let mut buf = Vec::new();
    write_message(&mut buf, b"hello").await.expect("writes");
    assert_eq!(&buf[..4], &5u32.to_be_bytes());
    assert_eq!(&buf[4..], b"hello");
}

#[tokio::test]
async fn read_message_reads_back_what_write_message_wrote() {
    let mut buf = Vec::new();
    write_message(&mut buf, b"roundtrip").await.expect("writes");
    let mut cursor = Cursor::new(buf);
    let got = read_message(&mut cursor).await.expect("reads");
    assert_eq!(got, b"roundtrip");
}

#[tokio::test]
async fn read_message_on_truncated_stream_reports_connection_closed() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let err = read_message(&mut cursor).await.expect_err("must fail");
    assert!(matches!(err, mrd_core::ProtocolViolation::ConnectionClosed));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected_before_allocating() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes());
    let mut cursor = Cursor::new(buf);
    let err = read_message(&mut cursor).await.expect_err("must fail");
    assert!(matches!(err, mrd_core::ProtocolViolation::FrameTooLarge));
}

#[test]
fn encode_returns_raw_json_without_a_length_prefix() {
    let envelope = TaskEnvelope::new(TaskId::new(1), Bytes::from_static(b"x"));
    let bytes = encode(&envelope).expect("encodes");
    assert_eq!(bytes[0], b'{');
    let back: TaskEnvelope = decode(&bytes).expect("decodes");
    assert_eq!(back.task_id, TaskId::new(1));
}

#[tokio::test]
async fn write_frame_then_read_frame_round_trips_a_control_request() {
    let mut buf = Vec::new();
    let request = ControlRequest::Cancel { task_id: TaskId::new(9) };
    write_frame(&mut buf, &request).await.expect("writes");
    let mut cursor = Cursor::new(buf);
    let got: ControlRequest = read_frame(&mut cursor).await.expect("reads");
    assert_eq!(got, request);
}
