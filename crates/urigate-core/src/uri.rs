// ── Uri ──
//
// The addressing unit for everything in the engine. Every Uri is
// normalized on construction, so equality is plain string equality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Scheme prefix carried by every normalized Uri.
pub const URI_SCHEME: &str = "w3://";

/// Normalized, immutable location of an API: `w3://{authority}/{path}`.
///
/// Accepts `w3://ens/api.eth`, `ens/api.eth` and `//ens/api.eth`; all three
/// normalize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    uri: String,
    /// Byte offset of the `/` separating authority from path.
    split: usize,
}

impl Uri {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidUri {
            uri: input.to_owned(),
            reason: reason.to_owned(),
        };

        let mut rest = input.trim();
        if let Some(stripped) = rest.strip_prefix(URI_SCHEME) {
            rest = stripped;
        } else {
            if rest.contains("://") {
                return Err(invalid("unsupported scheme, expected w3://"));
            }
            rest = rest.trim_start_matches('/');
        }

        let Some((authority, path)) = rest.split_once('/') else {
            return Err(invalid("expected the form authority/path"));
        };
        if authority.is_empty() {
            return Err(invalid("authority is empty"));
        }
        if path.is_empty() {
            return Err(invalid("path is empty"));
        }

        Ok(Self {
            uri: format!("{URI_SCHEME}{authority}/{path}"),
            split: URI_SCHEME.len() + authority.len(),
        })
    }

    /// The full normalized string, scheme included.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn authority(&self) -> &str {
        &self.uri[URI_SCHEME.len()..self.split]
    }

    pub fn path(&self) -> &str {
        &self.uri[self.split + 1..]
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for Uri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.uri)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
