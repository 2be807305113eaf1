//! Concrete entities of the scent platform managed through the generic repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::entity::{Entity, EntityId, CREATED_AT, DELETED_AT, UPDATED_AT};

fn base_column_type(column: &str) -> Option<&'static str> {
    match column {
        CREATED_AT | UPDATED_AT | DELETED_AT => Some("timestamptz"),
        _ => None,
    }
}

/// Application user. `password` holds the reversible cipher text.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserEntity {
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub login_name: Option<String>,
    pub mail_address: String,
    pub password: String,
    #[serde(default)]
    pub password_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_time: Option<DateTime<Utc>>,
    pub invalid_flg: bool,
    /// `AuthPermissionValue` bits.
    pub permissions: i32,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for UserEntity {
    const TABLE: &'static str = "users";
    const CREATE_TABLE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_name TEXT NOT NULL,
            login_name TEXT,
            mail_address TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            password_update_time TIMESTAMPTZ,
            last_login_time TIMESTAMPTZ,
            invalid_flg BOOLEAN NOT NULL DEFAULT FALSE,
            permissions INTEGER NOT NULL DEFAULT 0,
            note TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )";

    fn id(&self) -> EntityId {
        EntityId::Text(self.id.clone())
    }

    fn column_type(column: &str) -> Option<&'static str> {
        match column {
            "id" => Some("uuid"),
            "password_update_time" | "last_login_time" => Some("timestamptz"),
            "invalid_flg" => Some("bool"),
            "permissions" => Some("int4"),
            "user_name" | "login_name" | "mail_address" | "password" | "note" => Some("text"),
            other => base_column_type(other),
        }
    }
}

/// Single-use password reset code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForgotPasswordEntity {
    pub id: i64,
    pub code: String,
    pub user_id: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for ForgotPasswordEntity {
    const TABLE: &'static str = "forgot_passwords";
    const CREATE_TABLE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS forgot_passwords (
            id BIGSERIAL PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expired_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )";

    fn id(&self) -> EntityId {
        EntityId::Int(self.id)
    }

    fn column_type(column: &str) -> Option<&'static str> {
        match column {
            "id" => Some("int8"),
            "user_id" => Some("uuid"),
            "expired_at" => Some("timestamptz"),
            "code" => Some("text"),
            other => base_column_type(other),
        }
    }
}

/// A diffuser provisioned to (or awaiting) a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceEntity {
    pub id: i64,
    pub name: String,
    pub serial_number: String,
    #[serde(default)]
    pub warranty_expiration_date: Option<DateTime<Utc>>,
    pub is_connected: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for DeviceEntity {
    const TABLE: &'static str = "devices";
    const CREATE_TABLE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS devices (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            serial_number TEXT NOT NULL UNIQUE,
            warranty_expiration_date TIMESTAMPTZ,
            is_connected BOOLEAN NOT NULL DEFAULT FALSE,
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )";

    fn id(&self) -> EntityId {
        EntityId::Int(self.id)
    }

    fn column_type(column: &str) -> Option<&'static str> {
        match column {
            "id" => Some("int8"),
            "user_id" => Some("uuid"),
            "warranty_expiration_date" => Some("timestamptz"),
            "is_connected" => Some("bool"),
            "name" | "serial_number" => Some("text"),
            other => base_column_type(other),
        }
    }
}

/// A fragrance in the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScentEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub intensity: i32,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for ScentEntity {
    const TABLE: &'static str = "scents";
    const CREATE_TABLE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS scents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            description TEXT,
            intensity INTEGER NOT NULL DEFAULT 1,
            is_public BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )";

    fn id(&self) -> EntityId {
        EntityId::Text(self.id.clone())
    }

    fn column_type(column: &str) -> Option<&'static str> {
        match column {
            "id" => Some("uuid"),
            "intensity" => Some("int4"),
            "is_public" => Some("bool"),
            "name" | "description" => Some("text"),
            other => base_column_type(other),
        }
    }
}
