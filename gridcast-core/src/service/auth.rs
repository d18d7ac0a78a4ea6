//! Authentication for the control surface and media credential issuance.
//!
//! Accounts are provisioned in configuration, logins trade a password for an
//! opaque bearer token, and the token directory lives in process memory.
//! Tokens therefore do not survive a restart; contributors and operators
//! simply log in again.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use nanoid::nanoid;
use std::collections::HashMap;
use tokio::task;

use crate::config::AuthConfig;
use crate::models::{Identity, Role};
use crate::{Error, Result};

/// Hash a password using Argon2id with recommended parameters
///
/// This is a CPU-intensive operation and runs on a blocking thread. Used by
/// the `hash-password` CLI helper and by tests; the server itself only ever
/// verifies.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);

        let params = ParamsBuilder::new()
            .m_cost(65536) // 64 MB
            .t_cost(3)
            .p_cost(4)
            .output_len(32)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build Argon2 params: {e}")))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?
            .to_string();

        Ok(password_hash)
    })
    .await
    .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
}

/// Verify a password against a stored PHC hash on a blocking thread.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {e}")))?;

        let argon2 = Argon2::default();
        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("Password verification failed: {e}"))),
        }
    })
    .await
    .map_err(|e| Error::Internal(format!("Password verification task failed: {e}")))?
}

/// Resolves bearer tokens to identities. The API layer and the media hub
/// both gate on this, so anything that can mint identities implements it.
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity>;
}

/// A live bearer token.
#[derive(Debug, Clone)]
pub struct TokenSession {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted login.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Config-provisioned accounts plus the in-memory token directory.
pub struct AuthService {
    accounts: HashMap<String, Account>,
    tokens: DashMap<String, TokenSession>,
    token_ttl: Duration,
}

struct Account {
    password_hash: String,
    identity: Identity,
}

impl AuthService {
    /// Build from configuration. Fails fast on malformed accounts rather
    /// than letting a publisher discover the problem at login time.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let mut accounts = HashMap::new();
        for user in &config.users {
            if user.role == Role::Source && user.home_source.is_none() {
                return Err(Error::Internal(format!(
                    "account '{}' has role 'source' but no home_source",
                    user.name
                )));
            }
            let identity = Identity {
                name: user.name.clone(),
                role: user.role,
                home_source: user.home_source.clone(),
            };
            if accounts
                .insert(
                    user.name.clone(),
                    Account {
                        password_hash: user.password_hash.clone(),
                        identity,
                    },
                )
                .is_some()
            {
                return Err(Error::Internal(format!(
                    "duplicate account name '{}'",
                    user.name
                )));
            }
        }

        Ok(Self {
            accounts,
            tokens: DashMap::new(),
            token_ttl: Duration::hours(config.token_ttl_hours as i64),
        })
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Trade a name/password pair for a bearer token.
    ///
    /// Unknown names and wrong passwords fail identically so the error does
    /// not reveal which accounts exist.
    pub async fn login(&self, name: &str, password: &str) -> Result<IssuedToken> {
        let account = self
            .accounts
            .get(name)
            .ok_or_else(|| Error::Unauthorized("invalid credentials".to_string()))?;

        if !verify_password(password, &account.password_hash).await? {
            return Err(Error::Unauthorized("invalid credentials".to_string()));
        }

        let token = nanoid!(32);
        let expires_at = Utc::now() + self.token_ttl;
        self.tokens.insert(
            token.clone(),
            TokenSession {
                identity: account.identity.clone(),
                expires_at,
            },
        );

        tracing::info!(user = %name, role = %account.identity.role, "login");
        Ok(IssuedToken {
            token,
            identity: account.identity.clone(),
            expires_at,
        })
    }

    /// Drop a token. Unknown tokens are fine, logout is idempotent.
    pub fn logout(&self, token: &str) {
        if let Some((_, session)) = self.tokens.remove(token) {
            tracing::info!(user = %session.identity.name, "logout");
        }
    }

    /// Remove expired tokens; returns how many were dropped. The server runs
    /// this on a timer so abandoned logins do not accumulate.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, session| session.expires_at > now);
        before - self.tokens.len()
    }

    #[must_use]
    pub fn active_token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[async_trait]
impl AuthGate for AuthService {
    async fn authenticate(&self, token: &str) -> Result<Identity> {
        let session = self
            .tokens
            .get(token)
            .ok_or_else(|| Error::Unauthorized("unknown token".to_string()))?;

        if session.expires_at <= Utc::now() {
            drop(session);
            self.tokens.remove(token);
            return Err(Error::Unauthorized("token expired".to_string()));
        }

        Ok(session.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserConfig;

    async fn service() -> AuthService {
        let hash = hash_password("rosebud").await.unwrap();
        let config = AuthConfig {
            users: vec![
                UserConfig {
                    name: "director".to_string(),
                    password_hash: hash.clone(),
                    role: Role::Operator,
                    home_source: None,
                },
                UserConfig {
                    name: "gate-cam".to_string(),
                    password_hash: hash,
                    role: Role::Source,
                    home_source: Some("gate-north".into()),
                },
            ],
            token_ttl_hours: 4,
        };
        AuthService::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_password_hash_roundtrip() {
        let hash = hash_password("secret-phrase").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret-phrase", &hash).await.unwrap());
        assert!(!verify_password("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let auth = service().await;
        let issued = auth.login("director", "rosebud").await.unwrap();
        assert_eq!(issued.identity.role, Role::Operator);

        let identity = auth.authenticate(&issued.token).await.unwrap();
        assert_eq!(identity.name, "director");
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let auth = service().await;

        let unknown = auth.login("nobody", "rosebud").await.unwrap_err();
        let wrong = auth.login("director", "citizen").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let auth = service().await;
        let issued = auth.login("director", "rosebud").await.unwrap();

        auth.logout(&issued.token);
        assert!(auth.authenticate(&issued.token).await.is_err());

        // Second logout is a no-op.
        auth.logout(&issued.token);
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_pruned() {
        let auth = service().await.with_token_ttl(Duration::seconds(-1));
        let issued = auth.login("gate-cam", "rosebud").await.unwrap();

        assert!(auth.authenticate(&issued.token).await.is_err());
        assert_eq!(auth.active_token_count(), 0);
    }

    #[tokio::test]
    async fn test_prune_expired_counts() {
        let auth = service().await.with_token_ttl(Duration::seconds(-1));
        auth.login("director", "rosebud").await.unwrap();
        auth.login("gate-cam", "rosebud").await.unwrap();

        assert_eq!(auth.prune_expired(), 2);
        assert_eq!(auth.active_token_count(), 0);
    }

    #[tokio::test]
    async fn test_source_account_requires_home_source() {
        let config = AuthConfig {
            users: vec![UserConfig {
                name: "stray".to_string(),
                password_hash: "$argon2id$...".to_string(),
                role: Role::Source,
                home_source: None,
            }],
            token_ttl_hours: 4,
        };
        assert!(AuthService::new(&config).is_err());
    }
}
