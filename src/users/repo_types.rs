use std::str::FromStr;

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::{ContextV7, Timestamp, Uuid};

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub department: String,
    pub password_hash: Option<String>, // absent for users created without credentials
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields for a user about to be persisted; the repository assigns the id
/// and both timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub department: String,
    pub password_hash: Option<String>,
}

/// Full replacement state for an update. The credential is not touched by
/// updates; only registration attaches one.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub department: String,
}

/// Minimal identity the auth layer works with, joined to the persisted
/// entity only by email.
#[derive(Debug, Clone)]
pub struct Principal {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: Option<String>,
}

impl From<User> for Principal {
    fn from(u: User) -> Self {
        Self {
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            password_hash: u.password_hash,
        }
    }
}

/// Monotonic UUIDv7 source; ids from one generator are strictly increasing
/// even within the same millisecond.
pub struct UserIdGen(std::sync::Mutex<ContextV7>);

impl UserIdGen {
    pub fn new() -> Self {
        Self(std::sync::Mutex::new(ContextV7::new()))
    }

    pub fn next(&self) -> Uuid {
        Uuid::new_v7(Timestamp::now(&*self.0.lock().unwrap()))
    }
}

impl Default for UserIdGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Sortable columns for the paged listing. Wire names follow the JSON field
/// names of the user view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    FirstName,
    LastName,
    Email,
    Age,
    Department,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::FirstName => "first_name",
            SortField::LastName => "last_name",
            SortField::Email => "email",
            SortField::Age => "age",
            SortField::Department => "department",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "firstName" => Ok(SortField::FirstName),
            "lastName" => Ok(SortField::LastName),
            "email" => Ok(SortField::Email),
            "age" => Ok(SortField::Age),
            "department" => Ok(SortField::Department),
            "createdAt" => Ok(SortField::CreatedAt),
            "updatedAt" => Ok(SortField::UpdatedAt),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// "desc" in any casing sorts descending, anything else ascending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}
