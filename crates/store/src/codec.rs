//! Byte representation of stored records and release keys.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use modcat_models::Version;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Leading byte of every stored record. Bump when the layout changes
/// incompatibly so old bytes are rejected instead of misread.
const RECORD_FORMAT: u8 = 1;
const KEY_SEPARATOR: u8 = 0x00;

pub(crate) fn encode<T: Serialize>(value: &T, what: &'static str) -> Result<Vec<u8>> {
    let mut bytes = vec![RECORD_FORMAT];
    serde_json::to_writer(&mut bytes, value).or_raise(|| ErrorKind::EncodeFailure(what))?;
    Ok(bytes)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8], what: &'static str) -> Result<T> {
    match bytes.split_first() {
        Some((&RECORD_FORMAT, body)) => serde_json::from_slice(body).or_raise(|| ErrorKind::DecodeFailure(what)),
        _ => exn::bail!(ErrorKind::DecodeFailure(what)),
    }
}

/// Primary key of a release: the mod id and the exact version text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseKey {
    pub modid: String,
    pub version: Version,
}
impl ReleaseKey {
    pub fn new(modid: impl Into<String>, version: Version) -> Self {
        Self { modid: modid.into(), version }
    }

    /// Mod ids end at the first NUL byte of a key, so they can't contain one.
    pub(crate) fn validate_modid(modid: &str) -> Result<()> {
        if modid.is_empty() || modid.as_bytes().contains(&KEY_SEPARATOR) {
            exn::bail!(ErrorKind::InvalidKey(modid.to_string()));
        }
        Ok(())
    }

    /// `<modid> 0x00`, the prefix shared by every version of a mod.
    pub(crate) fn mod_prefix(modid: &str) -> Result<Vec<u8>> {
        Self::validate_modid(modid)?;
        let mut prefix = Vec::with_capacity(modid.len() + 1);
        prefix.extend_from_slice(modid.as_bytes());
        prefix.push(KEY_SEPARATOR);
        Ok(prefix)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut key = Self::mod_prefix(&self.modid)?;
        key.extend_from_slice(self.version.as_str().as_bytes());
        Ok(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let split = bytes.iter().position(|b| *b == KEY_SEPARATOR).ok_or_raise(|| ErrorKind::DecodeFailure("release key"))?;
        let modid = std::str::from_utf8(&bytes[..split]).or_raise(|| ErrorKind::DecodeFailure("release key"))?;
        let version = std::str::from_utf8(&bytes[split + 1..]).or_raise(|| ErrorKind::DecodeFailure("release key"))?;
        let version = version.parse::<Version>().or_raise(|| ErrorKind::DecodeFailure("release key"))?;
        Ok(Self::new(modid, version))
    }
}
impl Display for ReleaseKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}@{}", self.modid, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcat_models::Release;

    #[test]
    fn test_release_key_bytes() {
        let key = ReleaseKey::new("fs2_open", "23.0.0-RC1".parse().unwrap());
        let bytes = key.to_bytes().unwrap();
        assert_eq!(bytes, b"fs2_open\x0023.0.0-RC1");
        assert_eq!(ReleaseKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn test_release_key_rejects_bad_modid() {
        let version: Version = "1.0".parse().unwrap();
        let err = ReleaseKey::new("", version.clone()).to_bytes().unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidKey(String::new()));
        assert!(ReleaseKey::new("bad\0id", version).to_bytes().is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_format() {
        let release = Release::new("example", "1.0.0".parse().unwrap(), "Example");
        let mut bytes = encode(&release, "release").unwrap();
        assert_eq!(decode::<Release>(&bytes, "release").unwrap(), release);
        bytes[0] = 0xff;
        let err = decode::<Release>(&bytes, "release").unwrap_err();
        assert_eq!(*err, ErrorKind::DecodeFailure("release"));
        let err = decode::<Release>(&[], "release").unwrap_err();
        assert_eq!(*err, ErrorKind::DecodeFailure("release"));
    }
}
