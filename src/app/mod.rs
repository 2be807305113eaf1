//! Application services composed from repositories and the crypto utilities.

pub mod auth_service;
pub mod base_service;
pub mod database_service;
pub mod list_query;
pub mod session_service;
pub mod user_service;

pub use auth_service::{AuthError, AuthService};
pub use base_service::BaseService;
pub use database_service::DatabaseService;
pub use list_query::ListQuery;
pub use session_service::{SessionClaims, SessionError, SessionService};
pub use user_service::{NewUser, UserError, UserService};
