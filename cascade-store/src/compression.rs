//! Gzip compression helpers for stored code (spec §4.B).
//!
//! The compression marker is equivalent to "payload is base64-encoded
//! gzip" (spec §3 invariant): when present, `getCode` decompresses
//! transparently; when absent, it sniffs the gzip magic bytes on the
//! decoded payload as a backward-compatibility fallback, returning the
//! raw bytes unchanged if that sniff doesn't pan out.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cascade_protocol::StoreError;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Read;

/// Gzip's two-byte magic number.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One stored code payload: either compressed-and-base64-encoded, or verbatim.
#[derive(Debug, Clone)]
pub struct StoredPayload {
    /// Whether `data` is base64-encoded gzip (the compression marker).
    pub compressed: bool,
    /// The stored text: base64 gzip when `compressed`, raw UTF-8 otherwise.
    pub data: String,
}

/// Gzip-compress `raw` and base64-encode the result.
fn compress(raw: &[u8]) -> Result<String, StoreError> {
    let mut encoder = GzEncoder::new(raw, Compression::default());
    let mut out = Vec::new();
    encoder
        .read_to_end(&mut out)
        .map_err(|e| StoreError::Compression(e.to_string()))?;
    Ok(BASE64.encode(out))
}

fn decompress(gzip_bytes: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = GzDecoder::new(gzip_bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StoreError::Compression(e.to_string()))?;
    Ok(out)
}

/// Store `code`, compressing when it is at least
/// [`cascade_protocol::store::COMPRESSION_THRESHOLD_BYTES`] long and the
/// compressed form is smaller than the raw form (spec §4.B).
pub fn encode_for_storage(code: &str) -> Result<StoredPayload, StoreError> {
    if code.len() < cascade_protocol::store::COMPRESSION_THRESHOLD_BYTES {
        return Ok(StoredPayload {
            compressed: false,
            data: code.to_string(),
        });
    }
    let compressed = compress(code.as_bytes())?;
    if compressed.len() < code.len() {
        Ok(StoredPayload {
            compressed: true,
            data: compressed,
        })
    } else {
        Ok(StoredPayload {
            compressed: false,
            data: code.to_string(),
        })
    }
}

/// Read back a stored payload, transparently decompressing.
///
/// When `payload.compressed` is true, base64-decodes then gunzips.
/// When false, first checks whether the raw bytes themselves sniff as
/// gzip (the backward-compatibility path for payloads written before
/// the marker existed) and decompresses if so, falling back to the raw
/// text unchanged if that attempt fails.
pub fn decode_from_storage(payload: &StoredPayload) -> Result<String, StoreError> {
    if payload.compressed {
        let gzip_bytes = BASE64
            .decode(&payload.data)
            .map_err(|e| StoreError::Compression(e.to_string()))?;
        let raw = decompress(&gzip_bytes)?;
        return String::from_utf8(raw).map_err(|e| StoreError::Compression(e.to_string()));
    }

    let bytes = payload.data.as_bytes();
    if bytes.len() >= 2 && bytes[0..2] == GZIP_MAGIC {
        if let Ok(raw) = decompress(bytes) {
            if let Ok(text) = String::from_utf8(raw) {
                return Ok(text);
            }
        }
    }
    Ok(payload.data.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_stored_verbatim() {
        let payload = encode_for_storage("tiny").unwrap();
        assert!(!payload.compressed);
        assert_eq!(payload.data, "tiny");
    }

    #[test]
    fn large_compressible_payload_is_compressed() {
        let code = "function handler() { return 1; }\n".repeat(100);
        let payload = encode_for_storage(&code).unwrap();
        assert!(payload.compressed);
        assert!(payload.data.len() < code.len());
    }

    #[test]
    fn round_trip_preserves_content_compressed_or_not() {
        let small = "x".repeat(10);
        let large = "y".repeat(5000);
        for code in [small, large] {
            let payload = encode_for_storage(&code).unwrap();
            let back = decode_from_storage(&payload).unwrap();
            assert_eq!(back, code);
        }
    }

    #[test]
    fn incompressible_large_payload_falls_back_to_raw() {
        // High-entropy-looking text that gzip can't shrink meaningfully
        // still round-trips even if stored uncompressed.
        let code: String = (0..2000).map(|i| char::from((i % 95 + 32) as u8)).collect();
        let payload = encode_for_storage(&code).unwrap();
        let back = decode_from_storage(&payload).unwrap();
        assert_eq!(back, code);
    }
}
