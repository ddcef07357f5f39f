//! Outstanding room invitations for one user.

use serde::{Deserialize, Serialize};

/// Room names a user has been invited to, oldest first.
///
/// Inviting twice to the same room keeps a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingInvitations(Vec<String>);

impl PendingInvitations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an invitation. Returns `false` if it was already pending.
    pub fn offer(&mut self, room: &str) -> bool {
        if self.contains(room) {
            return false;
        }
        self.0.push(room.to_string());
        true
    }

    /// Removes the invitation to `room`. Returns `false` if there was none.
    pub fn consume(&mut self, room: &str) -> bool {
        match self.0.iter().position(|r| r == room) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn contains(&self, room: &str) -> bool {
        self.0.iter().any(|r| r == room)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn rooms(&self) -> &[String] {
        &self.0
    }
}
