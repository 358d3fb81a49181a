mod keys;
mod session;

pub use keys::{
    ADMINISTRATOR_ACTIVATED_FILE, ADMINISTRATOR_KEY_FILE, KeyRing, USER_KEY_FILE, derive_key,
    generate_key,
};
pub use session::{SESSION_COOKIE, Session, require_session, resolve_session_key};

/// Role a request is rendered and authorized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Administrator,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "admin",
            Role::User => "user",
        }
    }

    #[must_use]
    pub const fn is_administrator(self) -> bool {
        matches!(self, Role::Administrator)
    }
}
