use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::*;

fn encode(frame: Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    FrameCodec::new()
        .encode(frame, &mut buf)
        .expect("encode failed");
    buf
}

#[test]
fn round_trip_multi_item() {
    let frame = vec![
        Bytes::from_static(b"Put"),
        Bytes::from_static(b"jobs"),
        Bytes::from_static(b"hello world"),
    ];

    let mut buf = encode(frame.clone());
    let decoded = FrameCodec::new()
        .decode(&mut buf)
        .expect("decode failed")
        .expect("expected a complete frame");

    assert_eq!(decoded, frame);
    assert!(buf.is_empty());
}

#[test]
fn round_trip_empty_frame() {
    let mut buf = encode(vec![]);
    assert_eq!(&buf[..], &[0, 0, 0, 0]);

    let decoded = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn round_trip_empty_items() {
    let frame = vec![Bytes::new(), Bytes::from_static(b"x"), Bytes::new()];

    let mut buf = encode(frame.clone());
    let decoded = FrameCodec::new().decode(&mut buf).unwrap().unwrap();

    assert_eq!(decoded, frame);
}

#[test]
fn wire_layout_is_big_endian_length_prefixed() {
    let buf = encode(vec![Bytes::from_static(b"OK")]);
    assert_eq!(&buf[..], &[0, 0, 0, 6, 0, 0, 0, 2, b'O', b'K']);
}

#[test]
fn decode_is_incremental() {
    let complete = encode(vec![Bytes::from_static(b"Info")]);
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();

    for &byte in &complete[..complete.len() - 1] {
        buf.put_u8(byte);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    buf.put_u8(complete[complete.len() - 1]);
    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded, vec![Bytes::from_static(b"Info")]);
}

#[test]
fn encode_rejects_oversize_frame() {
    let payload = Bytes::from(vec![0u8; MAX_FRAME_LEN]);
    let mut buf = BytesMut::new();

    let err = FrameCodec::new().encode(vec![payload], &mut buf).unwrap_err();
    assert!(matches!(err, FrameCodecError::FrameTooLarge));
    assert!(buf.is_empty(), "nothing may be written for a rejected frame");
}

#[test]
fn decode_rejects_oversize_prefix_before_body() {
    let mut buf = BytesMut::new();
    buf.put_u32(MAX_FRAME_LEN as u32 + 1);

    let err = FrameCodec::new().decode(&mut buf).unwrap_err();
    assert!(matches!(err, FrameCodecError::FrameTooLarge));
}

#[test]
fn decode_rejects_truncated_item_header() {
    // Body of two bytes cannot hold a four-byte item length prefix.
    let mut buf = BytesMut::new();
    buf.put_u32(2);
    buf.put_slice(&[0xaa, 0xbb]);

    let err = FrameCodec::new().decode(&mut buf).unwrap_err();
    assert!(matches!(err, FrameCodecError::BadFrameFormat));
}

#[test]
fn decode_rejects_item_overrunning_body() {
    // Item claims ten bytes but the body only holds two more.
    let mut buf = BytesMut::new();
    buf.put_u32(6);
    buf.put_u32(10);
    buf.put_slice(&[0x01, 0x02]);

    let err = FrameCodec::new().decode(&mut buf).unwrap_err();
    assert!(matches!(err, FrameCodecError::BadFrameFormat));
}

#[test]
fn server_info_uses_wire_field_names() {
    let mut info = ServerInfo {
        num_connections: 2,
        num_queues: 1,
        num_messages: 3,
        queues: HashMap::new(),
    };
    info.queues
        .insert("jobs".to_string(), QueueInfo { num_messages: 3 });

    let value = serde_json::to_value(&info).unwrap();
    assert_eq!(value["NumConnections"], 2);
    assert_eq!(value["NumQueues"], 1);
    assert_eq!(value["NumMessages"], 3);
    assert_eq!(value["Queues"]["jobs"]["NumMessages"], 3);

    let parsed: ServerInfo = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, info);
}
