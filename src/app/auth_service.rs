//! Password login and the forgot/reset/change password flows.
//!
//! Multi-step writes run on one transaction obtained from the user
//! repository and are closed with [`finish`].

use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto::cipher::{CipherError, PasswordCipher};
use crate::domain::entities::{ForgotPasswordEntity, UserEntity};
use crate::domain::query::{Criteria, Where};
use crate::storage::error::DataError;
use crate::storage::postgres::PgRepository;
use crate::storage::repository::{to_record, Repository};
use crate::storage::transaction::finish;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    NotFound,
    #[error("user is disabled")]
    Disabled,
    #[error("wrong mail address or password")]
    WrongCredentials,
    #[error("reset password code is invalid or expired")]
    InvalidResetCode,
    #[error("stored password cannot be decrypted: {0}")]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Data(DataError::Storage(err))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Clone)]
pub struct AuthService {
    users: PgRepository<UserEntity>,
    forgot_passwords: PgRepository<ForgotPasswordEntity>,
    cipher: PasswordCipher,
    code_duration: Duration,
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl AuthService {
    pub fn new(
        users: PgRepository<UserEntity>,
        forgot_passwords: PgRepository<ForgotPasswordEntity>,
        cipher: PasswordCipher,
        code_duration_minutes: i32,
    ) -> Self {
        Self {
            users,
            forgot_passwords,
            cipher,
            code_duration: Duration::minutes(i64::from(code_duration_minutes)),
        }
    }

    async fn user_by_mail(&self, mail_address: &str) -> AuthResult<Option<UserEntity>> {
        Ok(self
            .users
            .find_one_by(Where::new().eq("mail_address", mail_address))
            .await?)
    }

    fn password_matches(&self, user: &UserEntity, password: &str) -> AuthResult<bool> {
        Ok(self.cipher.decrypt(&user.password)? == password)
    }

    /// Returns the user id when the credentials match an enabled user.
    pub async fn login(&self, mail_address: &str, password: &str) -> AuthResult<String> {
        let user = self
            .user_by_mail(mail_address)
            .await?
            .ok_or(AuthError::WrongCredentials)?;
        if user.invalid_flg {
            return Err(AuthError::Disabled);
        }
        if !self.password_matches(&user, password)? {
            return Err(AuthError::WrongCredentials);
        }
        info!(user_id = %user.id, "login");
        Ok(user.id)
    }

    /// Replaces any outstanding reset code of the user with a fresh one and
    /// returns it. Delivering the code is up to the caller.
    pub async fn forgot_password(&self, mail_address: &str) -> AuthResult<String> {
        let user = self
            .user_by_mail(mail_address)
            .await?
            .ok_or(AuthError::NotFound)?;

        let record = to_record(&json!({
            "code": Uuid::new_v4().to_string(),
            "user_id": user.id,
            "expired_at": (Utc::now() + self.code_duration)
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }))?;

        let mut tx = self.users.begin().await?;
        let outcome = async {
            self.forgot_passwords
                .delete_in(&mut tx, Where::new().eq("user_id", user.id.as_str()).into())
                .await?;
            let saved = self.forgot_passwords.save_in(&mut tx, record).await?;
            Ok::<_, AuthError>(saved.code)
        }
        .await;
        let code = finish(tx, outcome).await?;
        info!(user_id = %user.id, "reset password code issued");
        Ok(code)
    }

    /// Consumes an unexpired reset code and sets the new password.
    ///
    /// The code row is locked for the rest of the transaction, so concurrent
    /// resets with the same code succeed at most once.
    pub async fn reset_password(&self, code: &str, password: &str) -> AuthResult<()> {
        let changes = to_record(&json!({
            "password": self.cipher.encrypt(password),
            "password_update_time": timestamp_now(),
        }))?;

        let mut tx = self.users.begin().await?;
        let outcome = async {
            let mut qb = self.forgot_passwords.create_query_builder();
            qb.push(" WHERE code = ")
                .push_bind(code.to_string())
                .push(" AND expired_at > now() AND deleted_at IS NULL LIMIT 1 FOR UPDATE");
            let token = self
                .forgot_passwords
                .fetch_in(&mut tx, qb)
                .await?
                .into_iter()
                .next()
                .ok_or(AuthError::InvalidResetCode)?;

            let consumed = self
                .forgot_passwords
                .delete_in(&mut tx, Criteria::from(token.id))
                .await?;
            if consumed.affected != 1 {
                return Err(AuthError::InvalidResetCode);
            }
            self.users
                .update_in(&mut tx, Criteria::from(token.user_id.clone()), changes)
                .await?;
            Ok::<_, AuthError>(token.user_id)
        }
        .await;

        match finish(tx, outcome).await {
            Ok(user_id) => {
                info!(user_id = %user_id, "password reset");
                Ok(())
            }
            Err(AuthError::InvalidResetCode) => {
                warn!("reset attempted with an unknown, used or expired code");
                Err(AuthError::InvalidResetCode)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user = self
            .users
            .find_one_by(Where::new().eq("id", user_id))
            .await?
            .ok_or(AuthError::NotFound)?;
        if !self.password_matches(&user, password)? {
            return Err(AuthError::WrongCredentials);
        }

        self.users
            .update(
                Criteria::from(user_id),
                &json!({
                    "password": self.cipher.encrypt(new_password),
                    "password_update_time": timestamp_now(),
                }),
            )
            .await?;
        info!(user_id, "password changed");
        Ok(())
    }
}
