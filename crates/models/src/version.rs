//! Release versions.
//!
//! Catalog versions look like semantic versions but are more forgiving about
//! the core: `1`, `1.2`, `1.2.3` and `v1.2.3` are all accepted, missing
//! components count as zero. Ordering follows semantic-version precedence and
//! is then made total by comparing build metadata and finally the raw text, so
//! two different strings never compare equal.

use crate::error::{Error, ErrorKind, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// Markers used by the byte encoding in `precedence_key()`/`sort_key()`. Their
// relative order is what makes the encoding sort like `Ord for Version`.
const END: u8 = 0x00;
const PRERELEASE: u8 = 0x01;
const RELEASE: u8 = 0x02;
const NUMERIC: u8 = 0x01;
const ALPHANUMERIC: u8 = 0x02;
const NO_BUILD: u8 = 0x00;
const BUILD: u8 = 0x01;

/// A single dot-separated pre-release identifier.
///
/// The derived ordering is the semantic-version one: numeric identifiers sort
/// before alphanumeric ones, numerics compare numerically and alphanumerics
/// compare by ASCII.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<Identifier>,
    build: Option<String>,
}
impl Version {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn pre_release(&self) -> &[Identifier] {
        &self.pre
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    pub fn is_pre_release(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Bytes whose lexicographic order is the version's precedence (core
    /// numbers and pre-release identifiers, ignoring build metadata and the
    /// raw text).
    ///
    /// All versions of equal precedence share exactly this prefix of their
    /// [`sort_key()`](Self::sort_key), which is what range lookups rely on.
    pub fn precedence_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(&self.major.to_be_bytes());
        key.extend_from_slice(&self.minor.to_be_bytes());
        key.extend_from_slice(&self.patch.to_be_bytes());
        if self.pre.is_empty() {
            key.push(RELEASE);
            return key;
        }
        key.push(PRERELEASE);
        for identifier in &self.pre {
            match identifier {
                Identifier::Numeric(n) => {
                    key.push(NUMERIC);
                    key.extend_from_slice(&n.to_be_bytes());
                },
                Identifier::Alphanumeric(s) => {
                    key.push(ALPHANUMERIC);
                    key.extend_from_slice(s.as_bytes());
                    key.push(END);
                },
            }
        }
        key.push(END);
        key
    }

    /// Bytes whose lexicographic order equals `Ord for Version`.
    pub fn sort_key(&self) -> Vec<u8> {
        let mut key = self.precedence_key();
        match &self.build {
            None => key.push(NO_BUILD),
            Some(build) => {
                key.push(BUILD);
                key.extend_from_slice(build.as_bytes());
                key.push(END);
            },
        }
        key.extend_from_slice(self.raw.as_bytes());
        key
    }

    fn parse_number(component: &str, raw: &str) -> Result<u64> {
        if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
            exn::bail!(ErrorKind::InvalidVersion(raw.to_string()));
        }
        component.parse::<u64>().map_err(|_| Error::from(ErrorKind::InvalidVersion(raw.to_string())))
    }

    fn parse_identifier(identifier: &str, raw: &str) -> Result<Identifier> {
        if identifier.is_empty() || !identifier.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            exn::bail!(ErrorKind::InvalidVersion(raw.to_string()));
        }
        if identifier.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Identifier::Numeric(Self::parse_number(identifier, raw)?));
        }
        Ok(Identifier::Alphanumeric(identifier.to_string()))
    }
}

impl FromStr for Version {
    type Err = Error;
    fn from_str(raw: &str) -> Result<Self> {
        let body = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
        let (body, build) = match body.split_once('+') {
            Some((body, build)) => {
                if build.is_empty() || !build.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.') {
                    exn::bail!(ErrorKind::InvalidVersion(raw.to_string()));
                }
                (body, Some(build.to_string()))
            },
            None => (body, None),
        };
        let (core, pre) = match body.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (body, None),
        };
        let numbers = core.split('.').map(|c| Self::parse_number(c, raw)).collect::<Result<Vec<u64>>>()?;
        let (major, minor, patch) = match numbers.as_slice() {
            [major] => (*major, 0, 0),
            [major, minor] => (*major, *minor, 0),
            [major, minor, patch] => (*major, *minor, *patch),
            _ => exn::bail!(ErrorKind::InvalidVersion(raw.to_string())),
        };
        let pre = match pre {
            Some(pre) => pre.split('.').map(|i| Self::parse_identifier(i, raw)).collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self { raw: raw.to_string(), major, minor, patch, pre, build })
    }
}
impl TryFrom<&str> for Version {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                // A release outranks any of its own pre-releases.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
            .then_with(|| self.build.cmp(&other.build))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}
impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
// Every parsed field is derived from the raw text, so the raw text alone
// decides equality (and stays consistent with `Ord`).
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl Eq for Version {}
impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| D::Error::custom(format!("invalid version: {raw}")))
    }
}
