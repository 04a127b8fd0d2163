//! Frame codec tests - byte-exact vectors and error detection properties.

use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

use mazout::error::{Error, ProtocolError};
use mazout::protocol::{
    checksum, decode_packet, encode_frame, encode_value, DataKind, Decimal, FrameCodec, Packet,
    Reading, Value, MIN_FRAME_SIZE,
};

// ============================================================================
// Concrete Vectors
// ============================================================================

#[test]
fn test_bus_voltage_vector() {
    let frame = encode_frame(5, &[0x00, 0x5A]).unwrap();
    let sum = 0xAA ^ 0xBB ^ 0x05 ^ 0x02 ^ 0x00 ^ 0x5A;
    assert_eq!(frame, vec![0xAA, 0xBB, 0x05, 0x02, 0x00, 0x5A, sum, 0xCC]);

    let packet = decode_packet(&frame).unwrap();
    assert_eq!(packet.type_code(), 5);
    assert_eq!(packet.kind().name(), "busVoltage");
    assert_eq!(packet.reading(), Reading::Integer(90));
}

#[test]
fn test_gps_vector() {
    let frame = encode_frame(3, b"12.9,77.6").unwrap();
    assert_eq!(frame[3], 9);
    assert_eq!(
        decode_packet(&frame).unwrap().reading(),
        Reading::Text("12.9,77.6".into())
    );
}

#[test]
fn test_type_code_table() {
    let names: Vec<&str> = (1..=12).map(|c| DataKind::from_code(c).name()).collect();
    assert_eq!(
        names,
        vec![
            "immobilize",
            "rpmPreset",
            "gps",
            "busCurrent",
            "busVoltage",
            "rpm",
            "deviceTemperature",
            "networkStrength",
            "torque",
            "SOC",
            "throttle",
            "motorTemperature",
        ]
    );
    assert_eq!(DataKind::from_code(0).name(), "unknown");
    assert_eq!(DataKind::from_code(13).name(), "unknown");
}

#[test]
fn test_decimal_kinds_use_byte_pair() {
    let value = Value::parse(DataKind::Soc, "-0.25").unwrap();
    let frame = encode_value(DataKind::Soc, &value).unwrap();
    assert_eq!(&frame[4..6], &[0x00, 0xE7]);

    let packet = decode_packet(&frame).unwrap();
    assert_eq!(packet.value(), Value::Decimal(Decimal::new(0, -25).unwrap()));
}

#[test]
fn test_integer_kinds_use_int16() {
    let value = Value::parse(DataKind::Torque, "-300").unwrap();
    let frame = encode_value(DataKind::Torque, &value).unwrap();
    assert_eq!(&frame[4..6], &(-300i16).to_be_bytes());
    assert_eq!(decode_packet(&frame).unwrap().reading(), Reading::Integer(-300));
}

#[test]
fn test_short_buffers_are_truncated() {
    for len in 0..MIN_FRAME_SIZE {
        let buf = vec![0xAA; len];
        assert_eq!(decode_packet(&buf), Err(ProtocolError::Truncated));
    }
}

#[test]
fn test_checksum_byte_corruption() {
    for payload in [&b""[..], &b"\x01"[..], &b"12.9,77.6"[..]] {
        let mut frame = encode_frame(3, payload).unwrap();
        let idx = frame.len() - 2;
        frame[idx] = frame[idx].wrapping_add(1);
        assert!(matches!(
            decode_packet(&frame),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }
}

// ============================================================================
// Stream Reassembly
// ============================================================================

#[test]
fn test_codec_one_byte_at_a_time() {
    let mut stream = Vec::new();
    stream.extend(encode_frame(6, &[0x05, 0xDC]).unwrap());
    stream.extend(encode_frame(3, b"12.9,77.6").unwrap());
    stream.extend(encode_frame(10, &[80, 5]).unwrap());

    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    let mut codes = Vec::new();

    for byte in stream {
        buf.extend_from_slice(&[byte]);
        while let Some(packet) = codec.decode(&mut buf).unwrap() {
            codes.push(packet.type_code());
        }
    }

    assert_eq!(codes, vec![6, 3, 10]);
    assert_eq!(codec.dropped(), 0);
}

// ============================================================================
// Properties
// ============================================================================

fn payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..=255)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    /// decode(encode(t, p)) == (t, p)
    #[test]
    fn prop_round_trip(type_code in any::<u8>(), payload in payload()) {
        let frame = encode_frame(type_code, &payload).unwrap();
        prop_assert_eq!(frame.len(), payload.len() + 6);
        prop_assert_eq!(frame[frame.len() - 2], checksum(&frame[..frame.len() - 2]));

        let packet = decode_packet(&frame).unwrap();
        prop_assert_eq!(packet.type_code(), type_code);
        prop_assert_eq!(packet.payload(), &payload[..]);
        prop_assert_eq!(packet, Packet::new(type_code, payload).unwrap());
    }

    /// A single bit flip outside the length and terminator bytes never
    /// decodes to a different packet.
    #[test]
    fn prop_bit_flip_detected(
        type_code in any::<u8>(),
        payload in payload(),
        pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let frame = encode_frame(type_code, &payload).unwrap();
        let candidates: Vec<usize> = (0..frame.len() - 1).filter(|&i| i != 3).collect();
        let idx = candidates[pick.index(candidates.len())];

        let mut corrupted = frame.clone();
        corrupted[idx] ^= 1 << bit;

        match decode_packet(&corrupted) {
            Err(ProtocolError::InvalidHeader) => prop_assert!(idx < 2),
            Err(ProtocolError::ChecksumMismatch { .. }) => prop_assert!(idx >= 2),
            other => prop_assert!(false, "flip at {} gave {:?}", idx, other),
        }
    }

    /// Anything not starting with the marker pair is an invalid header.
    #[test]
    fn prop_bad_marker_is_invalid_header(
        first in any::<u8>(),
        second in any::<u8>(),
        rest in proptest::collection::vec(any::<u8>(), 3..64),
    ) {
        prop_assume!(first != 0xAA || second != 0xBB);
        let mut buf = vec![first, second];
        buf.extend(rest);
        prop_assert_eq!(decode_packet(&buf), Err(ProtocolError::InvalidHeader));
    }

    /// Arbitrary bytes never panic the decoder.
    #[test]
    fn prop_arbitrary_bytes_no_panic(data in proptest::collection::vec(any::<u8>(), 0..300)) {
        let _ = decode_packet(&data);
    }

    /// Splitting a stream of frames at arbitrary points yields the same packets.
    #[test]
    fn prop_codec_split_anywhere(
        frames in proptest::collection::vec((any::<u8>(), proptest::collection::vec(any::<u8>(), 0..32)), 1..8),
        split in any::<prop::sample::Index>(),
    ) {
        let mut stream = Vec::new();
        for (code, payload) in &frames {
            stream.extend(encode_frame(*code, payload).unwrap());
        }
        let at = split.index(stream.len() + 1);

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&stream[..at]);
        let mut decoded = Vec::new();

        loop {
            match codec.decode(&mut buf) {
                Ok(Some(p)) => decoded.push((p.type_code(), p.payload().to_vec())),
                Ok(None) => break,
                Err(Error::Protocol(e)) => prop_assert!(false, "unexpected drop: {}", e),
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
        buf.extend_from_slice(&stream[at..]);
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(p)) => decoded.push((p.type_code(), p.payload().to_vec())),
                Ok(None) => break,
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        prop_assert_eq!(decoded, frames);
    }
}
