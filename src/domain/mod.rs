//! Storage-agnostic domain types: entities, query specifications, pagination
//! and the permission bitmask.

pub mod entities;
pub mod entity;
pub mod pagination;
pub mod permission;
pub mod query;

pub use entities::{DeviceEntity, ForgotPasswordEntity, ScentEntity, UserEntity};
pub use entity::{Entity, EntityId};
pub use pagination::{PageMode, PageRequest, Pagination, PaginationMeta};
pub use permission::{
    auth_permission_values, can_activate, has_permission, AuthPermissionValue,
    PermissionRequirement, PermissionToggles,
};
pub use query::{Condition, Criteria, Direction, FindOptions, Order, Where};
