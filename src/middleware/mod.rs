pub mod auth;
pub mod error_handler;

pub use auth::{
    hash_session_token, AuthenticatedUser, MySqlSessionRepository, SessionAuth,
    SessionRepository, SessionRecord, UserRole,
};
pub use error_handler::{json_config, json_error_handler};
