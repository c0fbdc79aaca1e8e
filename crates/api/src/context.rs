use hotelmenu_core::UserId;

/// Who is calling, as asserted by the upstream gateway.
///
/// Present on every request; anonymous callers carry `None`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RequesterContext {
    user_id: Option<UserId>,
}

impl RequesterContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }
}
