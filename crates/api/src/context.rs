use sickfits_core::UserId;

/// Session context for a request.
///
/// Always present on every route; `user_id` is `None` for anonymous callers
/// and for cookies whose signature does not verify.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    user_id: Option<UserId>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn signed_in(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }
}
