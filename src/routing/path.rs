//! Volume path parsing.
//!
//! Paths of the form `/volume/{name}[/rest...]` name a volume and the path
//! forwarded to its backend. The prefix is matched case-sensitively.

use crate::error::ProxyError;

const PREFIX: &str = "/volume";

/// A parsed `/volume/{name}[/rest]` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePath {
    /// Volume name segment.
    pub name: String,
    /// Remaining path forwarded upstream, always starting with `/`.
    pub rest: String,
}

impl VolumePath {
    pub fn parse(path: &str) -> Result<Self, ProxyError> {
        let malformed = || ProxyError::MalformedPath {
            path: path.to_string(),
        };

        let tail = path
            .strip_prefix(PREFIX)
            .and_then(|t| t.strip_prefix('/'))
            .ok_or_else(malformed)?;

        let (name, rest) = match tail.split_once('/') {
            Some((name, rest)) => (name, format!("/{}", rest)),
            None => (tail, "/".to_string()),
        };
        if name.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            name: name.to_string(),
            rest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_only() {
        let p = VolumePath::parse("/volume/etcd-1").unwrap();
        assert_eq!(p.name, "etcd-1");
        assert_eq!(p.rest, "/");
    }

    #[test]
    fn name_with_trailing_slash() {
        let p = VolumePath::parse("/volume/etcd-1/").unwrap();
        assert_eq!(p.name, "etcd-1");
        assert_eq!(p.rest, "/");
    }

    #[test]
    fn name_with_rest() {
        let p = VolumePath::parse("/volume/talos-control-plane-1/v3/kv/range").unwrap();
        assert_eq!(p.name, "talos-control-plane-1");
        assert_eq!(p.rest, "/v3/kv/range");
    }

    #[test]
    fn missing_name_is_malformed() {
        for path in ["/volume", "/volume/", "/volume//x", "/volumes/etcd-1", "/status"] {
            let err = VolumePath::parse(path).unwrap_err();
            assert!(matches!(err, ProxyError::MalformedPath { .. }), "{path}");
        }
    }
}
