//! User administration on top of [`BaseService`].

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::app::base_service::BaseService;
use crate::app::list_query::ListQuery;
use crate::crypto::cipher::{CipherError, PasswordCipher};
use crate::crypto::random::new_access_password;
use crate::domain::entities::UserEntity;
use crate::domain::entity::EntityId;
use crate::domain::pagination::Pagination;
use crate::domain::permission::{auth_permission_values, PermissionToggles};
use crate::domain::query::{Criteria, FindOptions, Where};
use crate::storage::error::DataError;
use crate::storage::repository::{Repository, WriteResult};

/// Columns matched by the `search` list parameter.
pub const USER_SEARCH_COLUMNS: [&str; 4] = ["user_name", "login_name", "mail_address", "note"];

#[derive(Debug, Error)]
pub enum UserError {
    #[error("mail address is already registered")]
    MailTaken,
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Data(#[from] DataError),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub user_name: String,
    #[serde(default)]
    pub login_name: Option<String>,
    pub mail_address: String,
    /// Generated when omitted.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub permissions: PermissionToggles,
    #[serde(default)]
    pub note: Option<String>,
}

pub struct UserService<R> {
    base: BaseService<UserEntity, R>,
    cipher: PasswordCipher,
}

impl<R: Clone> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            cipher: self.cipher.clone(),
        }
    }
}

impl<R: Repository<UserEntity>> UserService<R> {
    pub fn new(repository: R, cipher: PasswordCipher) -> Self {
        Self {
            base: BaseService::new(repository),
            cipher,
        }
    }

    pub fn base(&self) -> &BaseService<UserEntity, R> {
        &self.base
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Pagination<UserEntity>, UserError> {
        Ok(self.base.find_all(query, &USER_SEARCH_COLUMNS).await?)
    }

    /// Creates a user with an encrypted password. When no password is given a
    /// fresh access password is generated and returned alongside the user.
    pub async fn create(
        &self,
        input: NewUser,
    ) -> Result<(UserEntity, Option<String>), UserError> {
        let by_mail = Where::new().eq("mail_address", input.mail_address.as_str());
        let taken = self
            .base
            .exists(FindOptions::filtered(by_mail).with_deleted())
            .await?;
        if taken {
            return Err(UserError::MailTaken);
        }

        let (password, generated) = match input.password {
            Some(p) => (p, None),
            None => {
                let p = new_access_password();
                (p.clone(), Some(p))
            }
        };
        let permissions = auth_permission_values(input.permissions).bits();

        let user = self
            .base
            .create(&json!({
                "user_name": input.user_name,
                "login_name": input.login_name,
                "mail_address": input.mail_address,
                "password": self.cipher.encrypt(&password),
                "invalid_flg": false,
                "permissions": permissions,
                "note": input.note,
            }))
            .await?;
        info!(user_id = %user.id, permissions, "user created");
        Ok((user, generated))
    }

    /// The user together with the plaintext of their stored password.
    pub async fn reveal_password(
        &self,
        id: impl Into<EntityId>,
    ) -> Result<Option<(UserEntity, String)>, UserError> {
        let Some(user) = self.base.find_by_id(id).await? else {
            return Ok(None);
        };
        let password = self.cipher.decrypt(&user.password)?;
        Ok(Some((user, password)))
    }

    /// Soft delete by default; `soft = false` removes the row.
    pub async fn remove(
        &self,
        id: impl Into<EntityId>,
        soft: bool,
    ) -> Result<WriteResult, UserError> {
        let result = if soft {
            self.base.delete(id).await?
        } else {
            self.base.repository().delete(Criteria::Id(id.into())).await?
        };
        Ok(result)
    }

    pub async fn restore(&self, id: impl Into<EntityId>) -> Result<WriteResult, UserError> {
        Ok(self.base.repository().restore(Criteria::Id(id.into())).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryRepository;
    use std::collections::HashMap;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn service() -> UserService<MemoryRepository<UserEntity>> {
        let cipher = PasswordCipher::from_hex_key(KEY).unwrap();
        UserService::new(MemoryRepository::new(), cipher)
    }

    fn new_user(mail: &str, password: Option<&str>) -> NewUser {
        NewUser {
            user_name: "Alice".into(),
            login_name: None,
            mail_address: mail.into(),
            password: password.map(str::to_string),
            permissions: PermissionToggles {
                refer: Some(true),
                update: None,
                print: Some(true),
            },
            note: None,
        }
    }

    #[tokio::test]
    async fn create_encrypts_and_encodes_permissions() {
        let svc = service();
        let (user, generated) = svc
            .create(new_user("alice@example.com", Some("s3cret")))
            .await
            .unwrap();
        assert!(generated.is_none());
        assert_ne!(user.password, "s3cret");
        assert_eq!(user.permissions, 1 | 32 | 16);

        let (_, plain) = svc.reveal_password(user.id).await.unwrap().unwrap();
        assert_eq!(plain, "s3cret");
    }

    #[tokio::test]
    async fn create_generates_password_when_missing() {
        let svc = service();
        let (user, generated) = svc
            .create(new_user("bob@example.com", None))
            .await
            .unwrap();
        let generated = generated.unwrap();
        assert_eq!(generated.len(), 8);
        let (_, plain) = svc.reveal_password(user.id).await.unwrap().unwrap();
        assert_eq!(plain, generated);
    }

    #[tokio::test]
    async fn duplicate_mail_is_rejected_even_after_soft_delete() {
        let svc = service();
        let (user, _) = svc
            .create(new_user("carol@example.com", Some("pw")))
            .await
            .unwrap();
        svc.remove(user.id.clone(), true).await.unwrap();
        let err = svc
            .create(new_user("carol@example.com", Some("pw")))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::MailTaken));

        assert_eq!(svc.restore(user.id.clone()).await.unwrap().affected, 1);
        assert!(svc.reveal_password(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_searches_user_columns() {
        let svc = service();
        svc.create(new_user("dave@example.com", Some("a"))).await.unwrap();
        svc.create(new_user("erin@sample.org", Some("b"))).await.unwrap();

        let params: HashMap<String, String> =
            [("search".to_string(), "sample".to_string())].into_iter().collect();
        let page = svc
            .list(&ListQuery::from_params(&params).unwrap())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].mail_address, "erin@sample.org");
    }

    #[tokio::test]
    async fn hard_remove_deletes_row() {
        let svc = service();
        let (user, _) = svc
            .create(new_user("frank@example.com", Some("x")))
            .await
            .unwrap();
        assert_eq!(svc.remove(user.id.clone(), false).await.unwrap().affected, 1);
        assert_eq!(svc.restore(user.id).await.unwrap().affected, 0);
    }
}
