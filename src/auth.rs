//! Caller identification.
//!
//! Sign-in itself happens in an OAuth proxy in front of the service; the
//! proxy forwards the verified email in a trusted header.

use axum::http::{HeaderMap, HeaderName};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::entitlement::EntitlementStore;
use crate::error::Result;

pub const DEFAULT_IDENTITY_HEADER: &str = "x-auth-request-email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Stable key for quota accounting: email when signed in, otherwise the
    /// client address.
    pub identity: String,
    pub email: Option<String>,
    pub entitled: bool,
}

impl Caller {
    pub fn anonymous(identity: impl Into<String>) -> Self {
        Caller {
            identity: identity.into(),
            email: None,
            entitled: false,
        }
    }
}

pub trait AuthProvider: Send + Sync {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<Caller>;
}

pub struct HeaderAuth {
    identity_header: HeaderName,
    entitlements: Arc<dyn EntitlementStore>,
}

impl HeaderAuth {
    pub fn new(identity_header: HeaderName, entitlements: Arc<dyn EntitlementStore>) -> Self {
        HeaderAuth {
            identity_header,
            entitlements,
        }
    }
}

impl AuthProvider for HeaderAuth {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<Caller> {
        let email = headers
            .get(&self.identity_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(email) = email {
            return Ok(Caller {
                identity: email.to_string(),
                email: Some(email.to_string()),
                entitled: self.entitlements.is_entitled(email)?,
            });
        }

        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let identity = match (forwarded, peer) {
            (Some(client), _) => client.to_string(),
            (None, Some(addr)) => addr.ip().to_string(),
            (None, None) => "anonymous".to_string(),
        };
        Ok(Caller::anonymous(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::MemoryEntitlements;
    use axum::http::HeaderValue;

    fn provider() -> (HeaderAuth, Arc<MemoryEntitlements>) {
        let store = Arc::new(MemoryEntitlements::new());
        let auth = HeaderAuth::new(
            HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
            store.clone(),
        );
        (auth, store)
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_signed_in_caller() {
        let (auth, store) = provider();
        store.set_entitled("pro@example.com", true).unwrap();

        let caller = auth
            .resolve(&headers(&[("x-auth-request-email", "pro@example.com")]), None)
            .unwrap();
        assert_eq!(caller.identity, "pro@example.com");
        assert_eq!(caller.email.as_deref(), Some("pro@example.com"));
        assert!(caller.entitled);

        let free = auth
            .resolve(&headers(&[("x-auth-request-email", "free@example.com")]), None)
            .unwrap();
        assert!(!free.entitled);
    }

    #[test]
    fn test_forwarded_for_takes_client_address() {
        let (auth, _) = provider();
        let caller = auth
            .resolve(
                &headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]),
                Some("127.0.0.1:4000".parse().unwrap()),
            )
            .unwrap();
        assert_eq!(caller, Caller::anonymous("203.0.113.7"));
    }

    #[test]
    fn test_peer_address_fallback() {
        let (auth, _) = provider();
        let caller = auth
            .resolve(&HeaderMap::new(), Some("198.51.100.2:5555".parse().unwrap()))
            .unwrap();
        assert_eq!(caller.identity, "198.51.100.2");
    }

    #[test]
    fn test_no_information_is_anonymous() {
        let (auth, _) = provider();
        let caller = auth
            .resolve(&headers(&[("x-auth-request-email", "  ")]), None)
            .unwrap();
        assert_eq!(caller, Caller::anonymous("anonymous"));
    }

    #[test]
    fn test_anonymous_never_entitled() {
        let (auth, store) = provider();
        store.set_entitled("203.0.113.7", true).unwrap();
        let caller = auth
            .resolve(&headers(&[("x-forwarded-for", "203.0.113.7")]), None)
            .unwrap();
        assert!(!caller.entitled);
    }
}
