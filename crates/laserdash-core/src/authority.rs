use serde::{Deserialize, Serialize};

use crate::error::Rejection;

/// Whether this process owns writes to shared simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Authority,
    Replica,
}

impl Role {
    pub fn is_authority(self) -> bool {
        self == Role::Authority
    }

    /// Reject `operation` unless this process holds authority.
    pub fn require(self, operation: &'static str) -> Result<(), Rejection> {
        if self.is_authority() {
            Ok(())
        } else {
            tracing::warn!(operation, "rejected mutating call on a replica");
            Err(Rejection::AuthorityViolation { operation })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_rejects() {
        assert_eq!(
            Role::Replica.require("restart"),
            Err(Rejection::AuthorityViolation {
                operation: "restart"
            })
        );
        assert!(Role::Authority.require("restart").is_ok());
    }
}
