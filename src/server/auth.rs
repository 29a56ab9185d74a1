use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Credential capability consumed by the dispatcher. Implementations must
/// tolerate concurrent calls from worker threads; a real deployment backs
/// this with a credential store, the in-memory implementation below is the
/// default wiring.
pub trait Authenticator: Send + Sync {
    /// `Ok(true)` when the credentials match an existing account.
    fn verify(&self, login: &str, password: &str) -> anyhow::Result<bool>;

    /// Create an account. `Ok(false)` when the login is already taken.
    fn register(&self, login: &str, password: &str) -> anyhow::Result<bool>;
}

/// Process-local account table. Passwords are stored as given; hashing is the
/// concern of a real credential store, not the protocol engine.
#[derive(Default)]
pub struct MemoryAuthenticator {
    accounts: DashMap<String, String>,
}

impl MemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an account, used by tests and demo setups.
    pub fn with_account(self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(login.into(), password.into());
        self
    }
}

impl Authenticator for MemoryAuthenticator {
    fn verify(&self, login: &str, password: &str) -> anyhow::Result<bool> {
        Ok(self
            .accounts
            .get(login)
            .is_some_and(|stored| stored.value() == password))
    }

    fn register(&self, login: &str, password: &str) -> anyhow::Result<bool> {
        match self.accounts.entry(login.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(password.to_string());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_verify() {
        let auth = MemoryAuthenticator::new();
        assert!(auth.register("alice", "pw").unwrap());
        assert!(!auth.register("alice", "other").unwrap());
        assert!(auth.verify("alice", "pw").unwrap());
        assert!(!auth.verify("alice", "wrong").unwrap());
        assert!(!auth.verify("bob", "pw").unwrap());
    }
}
