use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::intake::attachments::{AttachmentCodec, FileError};

const CAP: u64 = 5 * 1024 * 1024;

/// Reader that flags any read, so tests can prove a rejection happened
/// before the first byte was touched.
struct ProbeReader<'a> {
    touched: &'a AtomicBool,
}

impl Read for ProbeReader<'_> {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        self.touched.store(true, Ordering::SeqCst);
        Ok(0)
    }
}

#[test]
fn disallowed_mime_is_rejected_before_any_byte_is_read() {
    let codec = AttachmentCodec::new(CAP);
    let touched = AtomicBool::new(false);

    let err = codec
        .encode_stream("malware.zip", "application/zip", 10, ProbeReader {
            touched: &touched,
        })
        .expect_err("zip must be rejected");

    assert!(matches!(err, FileError::UnsupportedType { .. }));
    assert!(!touched.load(Ordering::SeqCst), "bytes were read");
}

#[test]
fn oversized_declaration_is_rejected_before_any_byte_is_read() {
    let codec = AttachmentCodec::new(CAP);
    let touched = AtomicBool::new(false);
    let six_mib = 6 * 1024 * 1024;

    let err = codec
        .encode_stream("contract.pdf", "application/pdf", six_mib, ProbeReader {
            touched: &touched,
        })
        .expect_err("6 MiB must be rejected against a 5 MiB cap");

    match err {
        FileError::TooLarge { declared, cap, .. } => {
            assert_eq!(declared, six_mib);
            assert_eq!(cap, CAP);
        }
        other => panic!("expected size rejection, got {other:?}"),
    }
    assert!(!touched.load(Ordering::SeqCst), "bytes were read");
}

#[test]
fn chunked_encoding_matches_whole_input_encoding() {
    let codec = AttachmentCodec::new(CAP);
    // Longer than one 48 KiB chunk and not a multiple of it.
    let bytes: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

    let attachment = codec
        .encode_stream(
            "scan.jpeg",
            "image/jpeg",
            bytes.len() as u64,
            bytes.as_slice(),
        )
        .expect("encodes");

    assert_eq!(attachment.data, STANDARD.encode(&bytes));
    assert_eq!(attachment.byte_size, bytes.len() as u64);
    assert_eq!(attachment.mime_type, "image/jpeg");
}

#[test]
fn stream_longer_than_declared_is_aborted() {
    let codec = AttachmentCodec::new(CAP);
    let bytes = vec![0u8; 2048];

    let err = codec
        .encode_stream("photo.png", "image/png", 1024, bytes.as_slice())
        .expect_err("lying declaration must fail");

    assert!(matches!(
        err,
        FileError::StreamExceedsDeclared { declared: 1024, .. }
    ));
}

#[test]
fn jpg_alias_and_mixed_case_mime_are_accepted() {
    let codec = AttachmentCodec::new(CAP);
    let bytes = vec![0xffu8; 64];

    let attachment = codec
        .encode_stream("photo.jpg", "Image/JPG", 64, bytes.as_slice())
        .expect("image/jpg accepted");
    assert_eq!(attachment.mime_type, "image/jpg");
}

#[test]
fn a_failed_attachment_leaves_previous_encodings_intact() {
    let codec = AttachmentCodec::new(CAP);
    let good = vec![1u8; 128];

    let first = codec
        .encode_stream("first.pdf", "application/pdf", 128, good.as_slice())
        .expect("first encodes");

    codec
        .encode_stream("second.gif", "image/gif", 16, [0u8; 16].as_slice())
        .expect_err("gif rejected");

    assert_eq!(first.data, STANDARD.encode(&good));
}
