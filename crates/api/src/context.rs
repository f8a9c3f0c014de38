use tradebinder_auth::Role;
use tradebinder_core::UserId;

/// Authenticated actor for a request (identity + roles from the token).
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl ActorContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.is_admin())
    }
}
