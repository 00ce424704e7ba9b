//! Opaque packed argument/result payloads. The core never inspects these bytes
//! (§9 design note); over JSON they round-trip as a base64 string so the wire
//! format stays readable instead of an array-of-numbers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedBytes(pub Vec<u8>);

impl PackedBytes {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for PackedBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<PackedBytes> for Vec<u8> {
    fn from(packed: PackedBytes) -> Self {
        packed.0
    }
}

impl Serialize for PackedBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .encode(&self.0)
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackedBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use base64::Engine;
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let packed = PackedBytes(vec![0, 1, 2, 255]);
        let json = serde_json::to_string(&packed).unwrap();
        let back: PackedBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(packed, back);
    }

    #[test]
    fn empty_payload_roundtrips() {
        let packed = PackedBytes::default();
        let json = serde_json::to_string(&packed).unwrap();
        let back: PackedBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(packed, back);
    }
}
