use parking_lot::RwLock;
use std::collections::HashSet;

use crate::error::Result;

/// Who has a paid subscription. Written by the billing webhook, read on every
/// request.
pub trait EntitlementStore: Send + Sync {
    fn is_entitled(&self, identity: &str) -> Result<bool>;
    fn set_entitled(&self, identity: &str, entitled: bool) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryEntitlements {
    entitled: RwLock<HashSet<String>>,
}

impl MemoryEntitlements {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntitlementStore for MemoryEntitlements {
    fn is_entitled(&self, identity: &str) -> Result<bool> {
        Ok(self.entitled.read().contains(identity))
    }

    fn set_entitled(&self, identity: &str, entitled: bool) -> Result<()> {
        let mut set = self.entitled.write();
        if entitled {
            set.insert(identity.to_string());
        } else {
            set.remove(identity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_and_revoke() {
        let store = MemoryEntitlements::new();
        assert!(!store.is_entitled("a@example.com").unwrap());

        store.set_entitled("a@example.com", true).unwrap();
        assert!(store.is_entitled("a@example.com").unwrap());
        assert!(!store.is_entitled("b@example.com").unwrap());

        store.set_entitled("a@example.com", false).unwrap();
        assert!(!store.is_entitled("a@example.com").unwrap());
    }

    #[test]
    fn test_revoke_unknown_is_noop() {
        let store = MemoryEntitlements::new();
        store.set_entitled("ghost@example.com", false).unwrap();
        assert!(!store.is_entitled("ghost@example.com").unwrap());
    }
}
