use hdcore::types::UserId;

/// The authenticated session handed to the engine at construction.
///
/// Authentication itself happens upstream; every component that needs
/// credentials receives this context explicitly instead of reading ambient
/// process-wide state.
#[derive(Clone, Debug)]
pub struct SessionContext {
    token: String,
    user_id: UserId,
}

impl SessionContext {
    pub fn new(token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            token: token.into(),
            user_id,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The viewing user. Decides which messages count as unread.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}
