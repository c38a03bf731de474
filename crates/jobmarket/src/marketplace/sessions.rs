use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use super::domain::UserId;

/// In-process bearer-token registry. Tokens are opaque and unguessable
/// enough for a single-node deployment; a shared session store would replace
/// this behind the same three calls.
#[derive(Default)]
pub struct SessionRegistry {
    tokens: Mutex<HashMap<String, UserId>>,
    sequence: AtomicU64,
}

impl SessionRegistry {
    pub fn issue(&self, user_id: UserId) -> String {
        let serial = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
            .unwrap_or(serial);
        let token = format!("sess-{serial:08x}-{:016x}", nanos.wrapping_mul(0x9e3779b97f4a7c15));

        let mut guard = self.tokens.lock().expect("session mutex poisoned");
        guard.insert(token.clone(), user_id);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<UserId> {
        let guard = self.tokens.lock().expect("session mutex poisoned");
        guard.get(token).copied()
    }

    pub fn revoke(&self, token: &str) {
        let mut guard = self.tokens.lock().expect("session mutex poisoned");
        guard.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_resolve_until_revoked() {
        let registry = SessionRegistry::default();
        let token = registry.issue(UserId(9));
        assert_eq!(registry.resolve(&token), Some(UserId(9)));

        registry.revoke(&token);
        assert_eq!(registry.resolve(&token), None);
    }

    #[test]
    fn tokens_are_unique_per_login() {
        let registry = SessionRegistry::default();
        let first = registry.issue(UserId(1));
        let second = registry.issue(UserId(1));
        assert_ne!(first, second);
    }
}
