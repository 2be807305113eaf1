//! Capability bitmask stored on users and checked by guarded handlers.

use bitflags::bitflags;
use serde::Deserialize;
use utoipa::ToSchema;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuthPermissionValue: u32 {
        const REFER  = 0b000001;
        const INSERT = 0b000010;
        const UPDATE = 0b000100;
        const DELETE = 0b001000;
        const PRINT  = 0b010000;
        const EXEC   = 0b100000;
    }
}

/// The three toggles an admin edits for a role.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct PermissionToggles {
    #[serde(default)]
    pub refer: Option<bool>,
    #[serde(default)]
    pub update: Option<bool>,
    #[serde(default)]
    pub print: Option<bool>,
}

/// Encodes the toggles into the stored bitmask.
///
/// `refer` grants REFER and EXEC, `update` grants INSERT, UPDATE and DELETE
/// together. The coupling is the stored contract; do not split it without a
/// product decision.
pub fn auth_permission_values(toggles: PermissionToggles) -> AuthPermissionValue {
    let mut value = AuthPermissionValue::empty();
    if toggles.refer == Some(true) {
        value |= AuthPermissionValue::REFER | AuthPermissionValue::EXEC;
    }
    if toggles.update == Some(true) {
        value |= AuthPermissionValue::INSERT
            | AuthPermissionValue::UPDATE
            | AuthPermissionValue::DELETE;
    }
    if toggles.print == Some(true) {
        value |= AuthPermissionValue::PRINT;
    }
    value
}

pub fn has_permission(stored: u32, permission: AuthPermissionValue) -> bool {
    stored & permission.bits() != 0
}

/// Marks an operation as guarded. The role code is informational; access is
/// decided on the REFER bit alone.
#[derive(Debug, Clone, Copy)]
pub struct PermissionRequirement {
    pub role_code: &'static str,
}

/// Unguarded operations always pass; guarded ones need REFER on the caller.
/// A caller with no stored permissions is treated as `0`.
pub fn can_activate(requirement: Option<PermissionRequirement>, stored: Option<u32>) -> bool {
    match requirement {
        None => true,
        Some(_) => has_permission(stored.unwrap_or(0), AuthPermissionValue::REFER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggles(
        refer: Option<bool>,
        update: Option<bool>,
        print: Option<bool>,
    ) -> PermissionToggles {
        PermissionToggles {
            refer,
            update,
            print,
        }
    }

    #[test]
    fn refer_encodes_refer_and_exec() {
        let v = auth_permission_values(toggles(Some(true), Some(false), Some(false)));
        assert_eq!(v.bits(), 33);
    }

    #[test]
    fn update_and_print_encode_thirty() {
        let v = auth_permission_values(toggles(Some(false), Some(true), Some(true)));
        assert_eq!(v.bits(), 2 + 4 + 8 + 16);
    }

    #[test]
    fn nothing_set_encodes_zero() {
        assert_eq!(auth_permission_values(PermissionToggles::default()).bits(), 0);
    }

    #[test]
    fn everything_set_uses_all_six_bits() {
        let v = auth_permission_values(toggles(Some(true), Some(true), Some(true)));
        assert_eq!(v, AuthPermissionValue::all());
        assert_eq!(v.bits(), 63);
    }

    #[test]
    fn membership_is_non_zero_and() {
        assert!(has_permission(33, AuthPermissionValue::REFER));
        assert!(has_permission(33, AuthPermissionValue::EXEC));
        assert!(!has_permission(33, AuthPermissionValue::INSERT));
        assert!(!has_permission(0, AuthPermissionValue::REFER));
    }

    #[test]
    fn guard_checks_refer_only_when_required() {
        let req = PermissionRequirement { role_code: "USER_MANAGEMENT" };
        assert!(can_activate(None, None));
        assert!(can_activate(Some(req), Some(1)));
        assert!(!can_activate(Some(req), Some(30)));
        assert!(!can_activate(Some(req), None));
    }
}
