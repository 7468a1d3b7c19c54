//! Who performed an action: a user, or the system itself (scheduled jobs).

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The identity recorded on approval history and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// An authenticated user.
    User(UserId),
    /// A scheduled job such as the escalation sweep.
    System,
}

impl Actor {
    /// Returns the user behind this actor, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::System => None,
        }
    }

    /// Returns the storage discriminator (`"user"` or `"system"`).
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::System => "system",
        }
    }

    /// Rebuilds an actor from its stored discriminator and optional user id.
    #[must_use]
    pub fn from_parts(kind: &str, user_id: Option<UserId>) -> Self {
        match (kind, user_id) {
            ("user", Some(id)) => Self::User(id),
            _ => Self::System,
        }
    }
}

impl From<UserId> for Actor {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_parts_roundtrip() {
        let user = UserId::new();
        let actor = Actor::User(user);
        assert_eq!(Actor::from_parts(actor.kind_str(), actor.user_id()), actor);
        assert_eq!(Actor::from_parts("system", None), Actor::System);
    }

    #[test]
    fn test_actor_serializes_tagged() {
        let json = serde_json::to_value(Actor::System).unwrap();
        assert_eq!(json["kind"], "system");

        let user = UserId::new();
        let json = serde_json::to_value(Actor::User(user)).unwrap();
        assert_eq!(json["kind"], "user");
        assert_eq!(json["id"], user.to_string());
    }
}
