use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{Argon2Hasher, CredentialHasher};
use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::users::repo::{PgUserRepository, UserRepository};
use crate::users::services::UserService;

/// Shared application state: configuration plus the injected collaborators
/// (repository and credential hasher) the services are built from.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn UserRepository>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let repo = Arc::new(PgUserRepository::new(db)) as Arc<dyn UserRepository>;
        let hasher = Arc::new(Argon2Hasher) as Arc<dyn CredentialHasher>;

        Ok(Self {
            repo,
            hasher,
            config,
        })
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.repo.clone())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.users(), self.hasher.clone(), JwtKeys::from_ref(self))
    }
}
