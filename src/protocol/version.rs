//! Wire protocol version
//!
//! Envelopes carry the version as a dotted string, `"1.0"`. A trailing
//! patch component is tolerated on input and dropped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Whether frames written at `peer` can be read at `self`
    pub fn accepts(&self, peer: &ProtocolVersion) -> bool {
        self.major == peer.major && peer.minor <= self.minor
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        PROTOCOL_VERSION
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ProtocolVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::malformed(format!("invalid protocol version '{}'", s));
        let component = |part: Option<&str>| -> Result<Option<u16>> {
            part.map(|p| p.parse::<u16>().map_err(|_| invalid()))
                .transpose()
        };

        let mut parts = s.trim().split('.');
        let major = component(parts.next())?.ok_or_else(invalid)?;
        let minor = component(parts.next())?.unwrap_or(0);
        component(parts.next())?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor))
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("1".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::new(1, 0));
        assert_eq!("1.3".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::new(1, 3));
        assert_eq!(" 2.1.9 ".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::new(2, 1));

        for bad in ["", "one", "1.x", "1.2.3.4", "1..2"] {
            assert!(bad.parse::<ProtocolVersion>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_accepts_same_major_older_minor() {
        let hub = ProtocolVersion::new(1, 2);

        assert!(hub.accepts(&ProtocolVersion::new(1, 0)));
        assert!(hub.accepts(&ProtocolVersion::new(1, 2)));
        assert!(!hub.accepts(&ProtocolVersion::new(1, 3)));
        assert!(!hub.accepts(&ProtocolVersion::new(2, 0)));
    }

    #[test]
    fn test_serialized_as_string() {
        assert_eq!(serde_json::to_value(PROTOCOL_VERSION).unwrap(), "1.0");
        let decoded: ProtocolVersion = serde_json::from_str("\"1.0.4\"").unwrap();
        assert_eq!(decoded, PROTOCOL_VERSION);
        assert!(serde_json::from_str::<ProtocolVersion>(r#"{"major":1,"minor":0}"#).is_err());
    }
}
