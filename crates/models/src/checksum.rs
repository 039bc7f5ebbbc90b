use crate::error::{ErrorKind, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Write as _;

/// A content digest and the name of the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algo: String,
    #[serde(serialize_with = "serialize_digest", deserialize_with = "deserialize_digest")]
    pub digest: Vec<u8>,
}
impl Checksum {
    pub fn new(algo: impl Into<String>, digest: Vec<u8>) -> Self {
        Self { algo: algo.into(), digest }
    }

    /// Build a checksum from its external hexadecimal form.
    ///
    /// Malformed hex is an error; there is no fallback digest.
    pub fn from_hex(algo: impl Into<String>, hex: &str) -> Result<Self> {
        let digest = decode_hex(hex).ok_or_else(|| ErrorKind::InvalidChecksum(hex.to_string()))?;
        Ok(Self::new(algo, digest))
    }

    /// Lowercase hexadecimal digest.
    pub fn hex(&self) -> String {
        encode_hex(&self.digest)
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16)?;
            let low = (pair[1] as char).to_digit(16)?;
            u8::try_from(high << 4 | low).ok()
        })
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        _ = write!(out, "{b:02x}");
        out
    })
}

fn serialize_digest<S: Serializer>(digest: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode_hex(digest))
}

fn deserialize_digest<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let hex = String::deserialize(deserializer)?;
    decode_hex(&hex).ok_or_else(|| D::Error::custom(format!("invalid checksum digest: {hex}")))
}
