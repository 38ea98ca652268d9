//! Owner identity of a lock-cache process
//!
//! An owner id has the form `<reachable-ipv4>:<callback-port>:<suffix>`. The
//! first two fields double as the address of the process's callback endpoint,
//! so the lock authority can reach a holder or waiter knowing only its id.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::DfsError;
use crate::utils::random_suffix;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId {
    host: String,
    port: u16,
    suffix: String,
}

impl OwnerId {
    /// Build a fresh owner id for a callback endpoint at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            suffix: random_suffix(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// URI of the callback endpoint hosted by this owner
    pub fn callback_uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.suffix)
    }
}

impl FromStr for OwnerId {
    type Err = DfsError;

    /// Parses `host:port[:suffix]`; only the host and port are needed to
    /// route callbacks, anything after the second separator is the suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DfsError::InvalidOwnerId(s.to_string());

        let mut parts = s.splitn(3, SEPARATOR);
        let host = parts.next().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let port = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .filter(|p| *p != 0)
            .ok_or_else(invalid)?;
        let suffix = parts.next().unwrap_or_default();

        Ok(Self {
            host: host.to_string(),
            port,
            suffix: suffix.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let owner = OwnerId::new("10.0.0.7", 7001);
        let text = owner.to_string();
        let fields: Vec<&str> = text.split(':').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], "10.0.0.7");
        assert_eq!(fields[1], "7001");
        assert_eq!(fields[2].len(), crate::OWNER_SUFFIX_LEN);
    }

    #[test]
    fn test_parse_back() {
        let owner = OwnerId::new("192.168.1.20", 9000);
        let parsed: OwnerId = owner.to_string().parse().unwrap();
        assert_eq!(parsed, owner);
        assert_eq!(parsed.callback_uri(), "http://192.168.1.20:9000");
    }

    #[test]
    fn test_parse_without_suffix() {
        let parsed: OwnerId = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(parsed.host(), "127.0.0.1");
        assert_eq!(parsed.port(), 5000);
        assert_eq!(parsed.suffix(), "");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "nohost", ":7000:abc", "host:notaport:abc", "host:0:abc", "host:70000"] {
            let err = bad.parse::<OwnerId>().unwrap_err();
            assert_eq!(err, DfsError::InvalidOwnerId(bad.to_string()));
        }
    }

    #[test]
    fn test_unique_per_build() {
        assert_ne!(OwnerId::new("127.0.0.1", 1), OwnerId::new("127.0.0.1", 1));
    }
}
