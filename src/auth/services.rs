//! Authentication flows: credential verification, token issuance and
//! account registration. Owns no entity state of its own.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::dto::{LoginRequest, LoginResponse, RegisterRequest};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::CredentialHasher;
use crate::error::{Error, Result};
use crate::users::dto::UserView;
use crate::users::services::UserService;

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    hasher: Arc<dyn CredentialHasher>,
    tokens: JwtKeys,
}

impl AuthService {
    pub fn new(users: UserService, hasher: Arc<dyn CredentialHasher>, tokens: JwtKeys) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    /// Unknown email, missing credential and wrong password all collapse
    /// into `InvalidCredentials` so callers cannot enumerate accounts.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse> {
        let Some(principal) = self.users.principal_by_email(&req.email).await? else {
            warn!("login with unknown email");
            return Err(Error::InvalidCredentials);
        };
        let Some(digest) = principal.password_hash.as_deref() else {
            warn!(email = %principal.email, "login against credential-less account");
            return Err(Error::InvalidCredentials);
        };
        if !self.hasher.verify(&req.password, digest).map_err(Error::Internal)? {
            warn!(email = %principal.email, "login with wrong password");
            return Err(Error::InvalidCredentials);
        }

        let token = self.tokens.issue(&principal.email)?;
        info!(email = %principal.email, "user logged in");
        Ok(LoginResponse {
            token,
            email: principal.email,
            first_name: principal.first_name,
            last_name: principal.last_name,
        })
    }

    /// Creates the account with the hashed credential attached. Does not
    /// log the new user in.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserView> {
        let (payload, password) = req.into_payload();
        if password.len() < 8 {
            return Err(Error::Validation(
                "password must be at least 8 characters".into(),
            ));
        }
        let digest = self.hasher.hash(&password).map_err(Error::Internal)?;
        let view = self.users.create(payload, Some(digest)).await?;
        info!(user_id = %view.id, email = %view.email, "user registered");
        Ok(view)
    }
}
