//! Pluggable codec interface (§9 "opaque packed arguments"): the core never
//! inspects `target_args`/`result`, it only ever sees `PackedBytes`. Encoding
//! (and any encryption) is entirely the caller's concern.

use je_protocol::PackedBytes;

pub trait Codec: Send + Sync {
    fn encode<T: serde::Serialize>(&self, value: &T) -> Result<PackedBytes, serde_json::Error>;
    fn decode<T: serde::de::DeserializeOwned>(&self, bytes: &PackedBytes) -> Result<T, serde_json::Error>;
}

/// Default codec: JSON, no encryption. Callers needing encryption implement
/// `Codec` themselves and wrap the JSON bytes, e.g. with a 32-byte key
/// (§8 "Encryption key length exactly 32 bytes").
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: serde::Serialize>(&self, value: &T) -> Result<PackedBytes, serde_json::Error> {
        Ok(PackedBytes(serde_json::to_vec(value)?))
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, bytes: &PackedBytes) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&bytes.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_roundtrips() {
        let codec = JsonCodec;
        let packed = codec.encode(&"hello world").unwrap();
        let value: String = codec.decode(&packed).unwrap();
        assert_eq!(value, "hello world");
    }
}
