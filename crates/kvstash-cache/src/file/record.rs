//! On-disk record format of the file backend.
//!
//! ```text
//! +----------+--------------+-----------------+---------+
//! | KVSTASH\n| 000000000060 | payload bytes   | \n#!    |
//! +----------+--------------+-----------------+---------+
//!   8 bytes     12 digits      JSON (maybe zlib)  3 bytes
//! ```
//!
//! The expire field always sits at byte offset 8. `0` means no expiry.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde_json::Value;

use kvstash_core::error::{AppError, ErrorKind};
use kvstash_core::result::AppResult;

/// Opening marker.
pub const RECORD_MAGIC: &[u8; 8] = b"KVSTASH\n";
/// Closing marker.
pub const RECORD_TRAILER: &[u8; 3] = b"\n#!";
/// Width of the zero-padded expire field.
pub const EXPIRE_DIGITS: usize = 12;
/// Largest expire value the field can hold.
pub const MAX_EXPIRE: u64 = 999_999_999_999;

const HEADER_LEN: usize = RECORD_MAGIC.len() + EXPIRE_DIGITS;
const COMPRESSION_LEVEL: u32 = 3;

/// A decoded cache record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Lifetime in seconds counted from the file's mtime; `0` never expires.
    pub expire: u64,
    /// Serialized (and possibly compressed) value.
    pub payload: Vec<u8>,
}

impl CacheRecord {
    /// Frame a payload.
    pub fn new(expire: u64, payload: Vec<u8>) -> Self {
        Self { expire, payload }
    }

    /// Encode to the on-disk byte layout.
    pub fn encode(&self) -> AppResult<Vec<u8>> {
        if self.expire > MAX_EXPIRE {
            return Err(AppError::validation(format!(
                "expire {} exceeds the maximum of {MAX_EXPIRE} seconds",
                self.expire
            )));
        }
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.payload.len() + RECORD_TRAILER.len());
        out.extend_from_slice(RECORD_MAGIC);
        out.extend_from_slice(format!("{:012}", self.expire).as_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(RECORD_TRAILER);
        Ok(out)
    }

    /// Decode from the on-disk byte layout.
    pub fn decode(bytes: &[u8]) -> AppResult<Self> {
        let expire = read_expire(bytes)?;
        if !bytes.ends_with(RECORD_TRAILER) || bytes.len() < HEADER_LEN + RECORD_TRAILER.len() {
            return Err(corrupt("missing record trailer"));
        }
        let payload = bytes[HEADER_LEN..bytes.len() - RECORD_TRAILER.len()].to_vec();
        Ok(Self { expire, payload })
    }
}

/// Read only the expire field of a raw record.
pub fn read_expire(bytes: &[u8]) -> AppResult<u64> {
    if bytes.len() < HEADER_LEN || !bytes.starts_with(RECORD_MAGIC) {
        return Err(corrupt("missing record header"));
    }
    let field = &bytes[RECORD_MAGIC.len()..HEADER_LEN];
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(corrupt("expire field is not numeric"));
    }
    // Twelve ASCII digits always fit in a u64.
    Ok(field
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')))
}

/// Serialize a value into a record payload.
pub fn encode_payload(value: &Value, compress: bool) -> AppResult<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    if !compress {
        return Ok(json);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Deserialize a record payload.
pub fn decode_payload(payload: &[u8], compressed: bool) -> AppResult<Value> {
    if !compressed {
        return Ok(serde_json::from_slice(payload)?);
    }
    let mut json = Vec::new();
    ZlibDecoder::new(payload)
        .read_to_end(&mut json)
        .map_err(|e| AppError::with_source(ErrorKind::Serialization, "Corrupt compressed payload", e))?;
    Ok(serde_json::from_slice(&json)?)
}

fn corrupt(reason: &str) -> AppError {
    AppError::serialization(format!("Corrupt cache record: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layout_is_byte_exact() {
        let record = CacheRecord::new(60, b"{\"a\":1}".to_vec());
        let bytes = record.encode().unwrap();
        assert_eq!(bytes, b"KVSTASH\n000000000060{\"a\":1}\n#!".to_vec());
        assert_eq!(&bytes[8..20], b"000000000060");
    }

    #[test]
    fn test_decode_reads_fields() {
        let raw = b"KVSTASH\n000000000005\"v\"\n#!";
        let record = CacheRecord::decode(raw).unwrap();
        assert_eq!(record.expire, 5);
        assert_eq!(record.payload, b"\"v\"".to_vec());
        assert_eq!(read_expire(raw).unwrap(), 5);
    }

    #[test]
    fn test_decode_rejects_truncated_record() {
        let full = CacheRecord::new(0, b"[1,2,3]".to_vec()).encode().unwrap();
        for cut in [0, 5, 12, 20, full.len() - 1] {
            assert!(CacheRecord::decode(&full[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_decode_rejects_bad_expire_field() {
        assert!(CacheRecord::decode(b"KVSTASH\n0000000000x0null\n#!").is_err());
        let err = CacheRecord::decode(b"OTHERHDR000000000000null\n#!").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }

    #[test]
    fn test_expire_overflow_rejected() {
        let err = CacheRecord::new(MAX_EXPIRE + 1, Vec::new()).encode().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(CacheRecord::new(MAX_EXPIRE, Vec::new()).encode().is_ok());
    }

    #[test]
    fn test_compressed_payload() {
        let value = json!({"text": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"});
        let plain = encode_payload(&value, false).unwrap();
        let packed = encode_payload(&value, true).unwrap();
        assert!(packed.len() < plain.len());
        assert_eq!(decode_payload(&packed, true).unwrap(), value);
        // Reading a compressed payload as plain JSON fails rather than guessing.
        assert!(decode_payload(&packed, false).is_err());
    }
}
