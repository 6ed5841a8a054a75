//! Tests for datagram encoding and validation.

use rstest::rstest;

use crate::fragment::*;

fn header(index: u32, total: u32) -> FragmentHeader {
    FragmentHeader::new(
        TypeTag::from("crawl-record"),
        OriginTag::from("downloader"),
        ObjectId::digest(b"payload"),
        ChannelId::new(0xfeed),
        FragmentIndex::new(index),
        total,
    )
    .expect("valid header")
}

#[rstest]
#[case(0, 0)]
#[case(3, 3)]
#[case(4, 2)]
fn header_rejects_index_outside_total(#[case] index: u32, #[case] total: u32) {
    let err = FragmentHeader::new(
        TypeTag::from("t"),
        OriginTag::from("o"),
        ObjectId::digest(b""),
        ChannelId::new(1),
        FragmentIndex::new(index),
        total,
    )
    .expect_err("index must be below total");
    assert!(matches!(err, FragmentError::IndexOutOfRange { .. }));
}

#[test]
fn decode_restores_every_field() {
    let fragment = Fragment::new(header(1, 4), vec![9; 16]);
    let bytes = fragment.encode().expect("encode");
    let decoded = Fragment::decode(&bytes).expect("decode");

    assert_eq!(decoded.header().index(), FragmentIndex::new(1));
    assert_eq!(decoded.header().total(), 4);
    assert_eq!(decoded.header().channel_id(), ChannelId::new(0xfeed));
    assert_eq!(decoded.payload(), &[9; 16]);
}

#[test]
fn decode_rejects_trailing_bytes() {
    let mut bytes = Fragment::new(header(0, 1), vec![1])
        .encode()
        .expect("encode");
    bytes.extend_from_slice(&[0, 0]);
    let err = Fragment::decode(&bytes).expect_err("trailing bytes must be rejected");
    assert!(matches!(err, FragmentError::TrailingBytes { trailing: 2 }));
}

#[test]
fn decode_rejects_garbage() {
    let err = Fragment::decode(&[0xff; 3]).expect_err("garbage must not decode");
    assert!(matches!(err, FragmentError::Decode(_)));
}

#[test]
fn decode_rejects_out_of_range_index_on_the_wire() {
    let mut forged = header(0, 1);
    forged.index = FragmentIndex::new(5);
    let bytes = Fragment::new(forged, Vec::new()).encode().expect("encode");
    let err = Fragment::decode(&bytes).expect_err("forged index must be rejected");
    assert!(matches!(
        err,
        FragmentError::IndexOutOfRange { total: 1, .. }
    ));
}

#[test]
fn encode_rejects_oversized_payload() {
    let fragment = Fragment::new(header(0, 1), vec![0; MAX_DATAGRAM_SIZE]);
    let err = fragment.encode().expect_err("payload exceeds datagram");
    assert!(matches!(err, FragmentError::Oversized { .. }));
}

#[test]
fn object_id_depends_only_on_content() {
    assert_eq!(ObjectId::digest(b"same"), ObjectId::digest(b"same"));
    assert_ne!(ObjectId::digest(b"same"), ObjectId::digest(b"different"));
    assert!(ObjectId::digest(b"x").as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn channel_ids_are_distinct_per_draw() {
    assert_ne!(ChannelId::random(), ChannelId::random());
}
