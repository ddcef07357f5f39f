//! The identity bound to one connection.

use lobby_protocol::Role;

use crate::SessionError;

/// Who is logged in on a connection, if anyone.
///
/// Owned by the connection's task. It starts empty, is bound on a
/// successful login, and is released on logout and when the connection
/// goes away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<String>,
    role: Role,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `user` to this connection.
    ///
    /// # Errors
    /// [`SessionError::AlreadyBound`] if someone is already logged in here.
    pub fn bind(&mut self, user: impl Into<String>, role: Role) -> Result<(), SessionError> {
        if let Some(current) = &self.user {
            return Err(SessionError::AlreadyBound(current.clone()));
        }
        self.user = Some(user.into());
        self.role = role;
        Ok(())
    }

    /// Clears the binding and returns who was logged in.
    pub fn release(&mut self) -> Option<String> {
        self.role = Role::default();
        self.user.take()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// The logged-in user, or [`SessionError::NotLoggedIn`].
    pub fn require_user(&self) -> Result<&str, SessionError> {
        self.user().ok_or(SessionError::NotLoggedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_anonymous() {
        let session = Session::new();
        assert!(!session.is_logged_in());
        assert!(matches!(session.require_user(), Err(SessionError::NotLoggedIn)));
    }

    #[test]
    fn test_bind_then_require_user() {
        let mut session = Session::new();
        session.bind("alice", Role::Developer).unwrap();
        assert_eq!(session.require_user().unwrap(), "alice");
        assert_eq!(session.role(), Role::Developer);
    }

    #[test]
    fn test_bind_twice_rejected() {
        let mut session = Session::new();
        session.bind("alice", Role::Player).unwrap();
        let err = session.bind("bob", Role::Player).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyBound(ref u) if u == "alice"));
        assert_eq!(session.user(), Some("alice"));
    }

    #[test]
    fn test_release_returns_user_and_resets_role() {
        let mut session = Session::new();
        session.bind("alice", Role::Developer).unwrap();
        assert_eq!(session.release().as_deref(), Some("alice"));
        assert_eq!(session.role(), Role::Player);
        assert_eq!(session.release(), None);
    }
}
