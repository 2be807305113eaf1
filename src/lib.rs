pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{
    AuthService, BaseService, DatabaseService, ListQuery, SessionService, UserService,
};
pub use crypto::{PasswordCipher, PasswordHasher};
pub use domain::{
    auth_permission_values, AuthPermissionValue, Criteria, Entity, EntityId, FindOptions, Order,
    Pagination, Where,
};
pub use storage::{DataError, MemoryRepository, PgRepository, Repository};
