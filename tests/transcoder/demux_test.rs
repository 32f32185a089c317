//! Tests for frame demultiplexing.

use frame_supervisor::transcoder::{FrameDemuxer, FRAME_BOUNDARY_MARKER};

fn jpeg(body: &[u8]) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(body);
    data.extend_from_slice(&FRAME_BOUNDARY_MARKER);
    data
}

#[test]
fn marker_constant_is_jpeg_eoi() {
    assert_eq!(FRAME_BOUNDARY_MARKER, [0xFF, 0xD9]);
}

#[test]
fn emits_concatenation_of_all_chunks_since_last_boundary() {
    let mut demuxer = FrameDemuxer::new();
    let chunks: [&'static [u8]; 4] = [b"\xFF\xD8", b"header", b"x", b"scan\xFF\xD9"];

    let mut emitted = Vec::new();
    for chunk in chunks {
        if let Some(frame) = demuxer.feed(chunk) {
            emitted.push(frame);
        }
    }

    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].data(), b"\xFF\xD8headerxscan\xFF\xD9");
    assert_eq!(demuxer.pending_len(), 0);
}

#[test]
fn consecutive_frames_are_independent() {
    let mut demuxer = FrameDemuxer::new();
    let first = demuxer.feed(jpeg(b"one")).unwrap();
    let second = demuxer.feed(jpeg(b"two")).unwrap();

    assert_eq!(first.data(), jpeg(b"one").as_slice());
    assert_eq!(second.data(), jpeg(b"two").as_slice());
    assert_eq!(second.sequence(), first.sequence() + 1);
}

#[test]
fn single_byte_chunks_never_emit() {
    let mut demuxer = FrameDemuxer::new();
    for byte in [0xFF_u8, 0xD9, 0xFF, 0xD9] {
        assert!(demuxer.feed(vec![byte]).is_none());
    }
    assert_eq!(demuxer.pending_len(), 4);
}

#[test]
fn split_marker_with_trailing_byte_does_not_emit() {
    let mut demuxer = FrameDemuxer::new();
    assert!(demuxer.feed(&b"\xFF"[..]).is_none());
    assert!(demuxer.feed(&b"\xD9\x00"[..]).is_none());
}

#[test]
fn reset_prevents_splicing_runs() {
    let mut demuxer = FrameDemuxer::new();
    demuxer.feed(&b"\xFF\xD8half a frame from the old run"[..]);
    demuxer.reset();

    let frame = demuxer.feed(jpeg(b"fresh")).unwrap();
    assert_eq!(frame.data(), jpeg(b"fresh").as_slice());
}

#[test]
fn frame_into_bytes_round_trip() {
    let mut demuxer = FrameDemuxer::new();
    let frame = demuxer.feed(jpeg(b"z")).unwrap();
    let len = frame.len();
    let bytes = frame.into_bytes();
    assert_eq!(bytes.len(), len);
    assert!(bytes.ends_with(&FRAME_BOUNDARY_MARKER));
}
