//! The user the session acts on behalf of.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticatedUser {
    pub username: String,
    /// Global staff / superuser
    pub administrator: bool,
}

impl AuthenticatedUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            administrator: false,
        }
    }

    pub fn administrator(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            administrator: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(!AuthenticatedUser::new("staff").administrator);
        assert!(AuthenticatedUser::administrator("root").administrator);
    }

    #[test]
    fn test_deserialize_defaults() {
        let user: AuthenticatedUser = serde_yaml::from_str("username: staff\n").unwrap();
        assert_eq!(user.username, "staff");
        assert!(!user.administrator);
    }
}
