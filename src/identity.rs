use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token naming a handler object within an endpoint.
///
/// Generated identities are UUID-backed, so a reference handed out by the
/// discovery responder is the only practical way to learn one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_literal() {
        let id1 = Identity::new("greeter-1");
        let id2 = Identity::new("greeter-1".to_string());

        assert_eq!(id1.as_str(), "greeter-1");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_random_identities_are_distinct() {
        let id1 = Identity::random();
        let id2 = Identity::random();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_identity_display_matches_as_str() {
        let id = Identity::random();
        assert_eq!(id.to_string(), id.as_str());
    }
}
