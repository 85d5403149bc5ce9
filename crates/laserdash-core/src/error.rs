use crate::participant::ParticipantId;

/// Why an ability request was refused. Not an error: the request is a no-op
/// and the reason travels to the UI as a transient signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbilityRejection {
    JumpLimitReached,
    JumpWhileDashing,
    AlreadyDashing,
    DashOnCooldown { remaining: f32 },
}

impl std::fmt::Display for AbilityRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JumpLimitReached => write!(f, "no jumps left"),
            Self::JumpWhileDashing => write!(f, "cannot jump while dashing"),
            Self::AlreadyDashing => write!(f, "dash already active"),
            Self::DashOnCooldown { remaining } => {
                write!(f, "dash on cooldown ({remaining:.1}s left)")
            },
        }
    }
}

/// A mutating call that was refused. None of these are fatal: the caller
/// logs and moves on, and the target state is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// A mutating operation reached a replica without authority.
    AuthorityViolation { operation: &'static str },
    /// The target was already terminal or already present.
    DuplicateEvent { participant: ParticipantId },
    UnknownParticipant(ParticipantId),
    RosterFull,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorityViolation { operation } => {
                write!(f, "{operation} requires simulation authority")
            },
            Self::DuplicateEvent { participant } => {
                write!(f, "duplicate event for participant {participant}")
            },
            Self::UnknownParticipant(id) => write!(f, "unknown participant {id}"),
            Self::RosterFull => write!(f, "roster is full"),
        }
    }
}

impl std::error::Error for Rejection {}
