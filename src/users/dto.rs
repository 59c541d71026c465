use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::users::repo_types::User;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Public view of a user: everything except the credential. Never written
/// back to storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub department: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            age: u.age,
            department: u.department,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Request body shared by create and update: the full mutable state of a
/// user. Partial updates are not supported.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub department: String,
}

impl UserPayload {
    pub fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() {
            return Err(Error::Validation("firstName must not be blank".into()));
        }
        if self.last_name.trim().is_empty() {
            return Err(Error::Validation("lastName must not be blank".into()));
        }
        if !is_valid_email(&self.email) {
            return Err(Error::Validation("email must be a valid address".into()));
        }
        if !(0..=150).contains(&self.age) {
            return Err(Error::Validation("age must be between 0 and 150".into()));
        }
        if self.department.trim().is_empty() {
            return Err(Error::Validation("department must not be blank".into()));
        }
        Ok(())
    }
}

fn default_page_size() -> u32 {
    10
}

fn default_sort_by() -> String {
    "id".into()
}

fn default_sort_dir() -> String {
    "asc".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_dir")]
    pub sort_dir: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRangeQuery {
    pub min_age: i32,
    pub max_age: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub first_name: String,
}

/// Page envelope for the paged listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<UserView>,
    pub current_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentCount {
    pub department: String,
    pub user_count: u64,
}
