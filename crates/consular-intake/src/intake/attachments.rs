use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::domain::{Attachment, AttachmentUpload};

/// Input chunk size for the encoder. A multiple of 3 so the concatenation
/// of per-chunk base64 output is identical to encoding the whole input in
/// one call, without padding seams between chunks.
const CHUNK_BYTES: usize = 48 * 1024;

/// Attachment rejected before or during encoding. Raised strictly before
/// any network request is attempted.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("attachment '{filename}' has unsupported type '{mime_type}' (accepted: pdf, jpeg, jpg, png)")]
    UnsupportedType { filename: String, mime_type: String },
    #[error("attachment '{filename}' is too large ({declared} bytes, cap {cap})")]
    TooLarge {
        filename: String,
        declared: u64,
        cap: u64,
    },
    #[error("attachment '{filename}' stream exceeds its declared size of {declared} bytes")]
    StreamExceedsDeclared { filename: String, declared: u64 },
    #[error("attachment '{filename}' could not be read")]
    Read {
        filename: String,
        source: std::io::Error,
    },
}

fn allowed_mime(mime_type: &str) -> bool {
    let normalized = mime_type.trim().to_ascii_lowercase();
    normalized == mime::APPLICATION_PDF.essence_str()
        || normalized == mime::IMAGE_JPEG.essence_str()
        || normalized == mime::IMAGE_PNG.essence_str()
        // Some browsers declare jpeg uploads as image/jpg; the backends
        // accept the label as-is.
        || normalized == "image/jpg"
}

/// Validates and transport-encodes attachments. One codec instance serves
/// all attachments of a submission; each encode is independent, so a
/// rejected file leaves previously encoded ones untouched.
#[derive(Debug, Clone)]
pub struct AttachmentCodec {
    cap_bytes: u64,
}

impl AttachmentCodec {
    pub fn new(cap_bytes: u64) -> Self {
        Self { cap_bytes }
    }

    pub fn encode(&self, upload: &AttachmentUpload) -> Result<Attachment, FileError> {
        self.encode_stream(
            &upload.filename,
            &upload.mime_type,
            upload.declared_bytes,
            upload.data.as_slice(),
        )
    }

    /// Encode from a byte stream. The declared MIME type and size are
    /// judged before the first read: rejecting a mistyped or oversized file
    /// must not cost a pass over its bytes.
    pub fn encode_stream<R: Read>(
        &self,
        filename: &str,
        mime_type: &str,
        declared_bytes: u64,
        mut reader: R,
    ) -> Result<Attachment, FileError> {
        if !allowed_mime(mime_type) {
            return Err(FileError::UnsupportedType {
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
            });
        }
        if declared_bytes > self.cap_bytes {
            return Err(FileError::TooLarge {
                filename: filename.to_string(),
                declared: declared_bytes,
                cap: self.cap_bytes,
            });
        }

        let mut encoded = String::with_capacity((declared_bytes as usize).div_ceil(3) * 4);
        let mut chunk = vec![0u8; CHUNK_BYTES];
        let mut total: u64 = 0;

        loop {
            let mut filled = 0;
            while filled < CHUNK_BYTES {
                let n = reader
                    .read(&mut chunk[filled..])
                    .map_err(|source| FileError::Read {
                        filename: filename.to_string(),
                        source,
                    })?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }

            total += filled as u64;
            // A stream longer than its declaration means the pre-read size
            // check was lied to; bail rather than ship a silently larger
            // payload.
            if total > declared_bytes {
                return Err(FileError::StreamExceedsDeclared {
                    filename: filename.to_string(),
                    declared: declared_bytes,
                });
            }

            STANDARD.encode_string(&chunk[..filled], &mut encoded);
            if filled < CHUNK_BYTES {
                break;
            }
        }

        Ok(Attachment {
            filename: filename.to_string(),
            mime_type: mime_type.trim().to_ascii_lowercase(),
            byte_size: total,
            data: encoded,
        })
    }
}
