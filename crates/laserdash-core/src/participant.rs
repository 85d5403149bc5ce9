use serde::{Deserialize, Serialize};

/// Opaque participant identity, stable for the lifetime of a session.
pub type ParticipantId = u64;

/// Longest display name carried over the wire, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 16;

/// A connected participant as reported by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Participant {
    /// Build a participant, clamping the display name to `MAX_DISPLAY_NAME_LEN`.
    /// An empty name falls back to `Player_<id>`.
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        let name: String = display_name.into();
        let display_name = if name.trim().is_empty() {
            default_display_name(id)
        } else {
            name.chars().take(MAX_DISPLAY_NAME_LEN).collect()
        };
        Self { id, display_name }
    }

    pub fn name_hash(&self) -> u32 {
        name_hash(&self.display_name)
    }
}

pub fn default_display_name(id: ParticipantId) -> String {
    format!("Player_{id}")
}

/// FNV-1a over the UTF-8 bytes. Stable across processes and platforms so
/// every replica derives the same value for a roster slot.
pub fn name_hash(name: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    name.bytes()
        .fold(OFFSET, |hash, b| (hash ^ u32::from(b)).wrapping_mul(PRIME))
}
