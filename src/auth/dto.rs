use serde::{Deserialize, Serialize};

use crate::users::dto::UserPayload;

/// Login credentials; live only for the duration of the request and are
/// never persisted or logged.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub age: i32,
    pub department: String,
}

impl RegisterRequest {
    pub fn into_payload(self) -> (UserPayload, String) {
        (
            UserPayload {
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                age: self.age,
                department: self.department,
            },
            self.password,
        )
    }
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Minimal identity behind a verified bearer token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}
