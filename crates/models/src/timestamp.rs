//! Serde helpers storing [`UtcDateTime`] as UNIX seconds.
//!
//! Use with `#[serde(with = "...")]`. Sub-second precision is dropped, which
//! matches what the catalog ever records (dates and fetch times).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::UtcDateTime;

pub mod required {
    use super::*;

    pub fn serialize<S: Serializer>(value: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        value.unix_timestamp().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UtcDateTime, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        UtcDateTime::from_unix_timestamp(seconds).map_err(D::Error::custom)
    }
}

/// Absent stays absent: `None` is never turned into the zero epoch.
pub mod optional {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<UtcDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(|v| v.unix_timestamp()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<UtcDateTime>, D::Error> {
        Option::<i64>::deserialize(deserializer)?
            .map(|seconds| UtcDateTime::from_unix_timestamp(seconds).map_err(D::Error::custom))
            .transpose()
    }
}
