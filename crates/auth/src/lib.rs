//! `sickfits-auth`: credential, session and permission primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage: it hashes,
//! signs, generates and checks, and leaves persistence to the caller.

pub mod authorize;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod reset;
pub mod session;
pub mod user;

pub use authorize::{
    authorize, authorize_command, explain_authorization, require_session,
    AuthorizationExplanation, AuthzError, CommandAuthorization, PERMISSION_ADMINS,
};
pub use password::{CredentialHasher, PasswordError, PasswordService};
pub use permissions::{Permission, PermissionSet};
pub use principal::Principal;
pub use reset::{default_reset_ttl, ResetToken, ResetTokenDigest, ResetTokenRecord};
pub use session::{
    default_cookie_max_age, token_from_cookie_header, SessionClaims, SessionCookie,
    SessionTokenError, SessionTokenService, SESSION_COOKIE_NAME,
};
pub use user::{NewUser, User, UserPatch, UserProfile};
