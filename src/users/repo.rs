//! Persistence port for user records and its Postgres implementation.
//!
//! The unique index on `email` is the authoritative guard for the uniqueness
//! invariant: a violation surfaced by a write is translated to
//! `Error::DuplicateEmail` here, so two racing creates can never both
//! succeed even if both passed the service-level pre-check.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::users::repo_types::{
    NewUser, SortDirection, SortField, User, UserChanges, UserIdGen,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn email_taken(&self, email: &str) -> Result<bool>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn page(
        &self,
        offset: i64,
        limit: i64,
        sort: SortField,
        dir: SortDirection,
    ) -> Result<Vec<User>>;
    async fn count(&self) -> Result<u64>;
    async fn all(&self) -> Result<Vec<User>>;
    async fn by_department(&self, department: &str) -> Result<Vec<User>>;
    async fn by_age_range(&self, min: i32, max: i32) -> Result<Vec<User>>;
    async fn search_first_name(&self, pattern: &str) -> Result<Vec<User>>;
    async fn count_by_department(&self, department: &str) -> Result<u64>;
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, age, department, password_hash, created_at, updated_at";

pub struct PgUserRepository {
    pool: PgPool,
    ids: UserIdGen,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ids: UserIdGen::new(),
        }
    }
}

/// Unique-violation on the email index becomes a typed conflict; everything
/// else is a storage failure.
fn map_write_err(e: sqlx::Error, email: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::DuplicateEmail(email.to_string())
        }
        _ => Error::Storage(e),
    }
}

/// Escape LIKE metacharacters so a search pattern matches literally.
fn like_escape(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(self.ids.next())
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(user.age)
            .bind(&user.department)
            .bind(&user.password_hash)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_err(e, &user.email))?;
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn email_taken(&self, email: &str) -> Result<bool> {
        let taken =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(taken)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET first_name = $2, last_name = $3, email = $4, age = $5, \
                 department = $6, updated_at = $7 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(&changes.email)
            .bind(changes.age)
            .bind(&changes.department)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_err(e, &changes.email))?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn page(
        &self,
        offset: i64,
        limit: i64,
        sort: SortField,
        dir: SortDirection,
    ) -> Result<Vec<User>> {
        // sort/dir come from enums, never from the caller's raw string
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             ORDER BY {} {}, id ASC LIMIT $1 OFFSET $2",
            sort.column(),
            dir.keyword()
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn count(&self) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn all(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn by_department(&self, department: &str) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE department = $1 ORDER BY last_name ASC, id ASC"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(department)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn by_age_range(&self, min: i32, max: i32) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE age BETWEEN $1 AND $2");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(min)
            .bind(max)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn search_first_name(&self, pattern: &str) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE first_name ILIKE '%' || $1 || '%' ESCAPE '\\'"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(like_escape(pattern))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn count_by_department(&self, department: &str) -> Result<u64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE department = $1")
                .bind(department)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

/// In-memory repository for service-level tests. Check-then-write runs under
/// one mutex guard, matching the atomicity the Postgres unique index gives
/// the real implementation.
#[cfg(test)]
pub(crate) struct InMemoryUserRepository {
    users: std::sync::Mutex<Vec<User>>,
    ids: UserIdGen,
}

#[cfg(test)]
impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: std::sync::Mutex::new(Vec::new()),
            ids: UserIdGen::new(),
        }
    }

    fn compare(a: &User, b: &User, sort: SortField, dir: SortDirection) -> std::cmp::Ordering {
        let ord = match sort {
            SortField::Id => a.id.cmp(&b.id),
            SortField::FirstName => a.first_name.cmp(&b.first_name),
            SortField::LastName => a.last_name.cmp(&b.last_name),
            SortField::Email => a.email.cmp(&b.email),
            SortField::Age => a.age.cmp(&b.age),
            SortField::Department => a.department.cmp(&b.department),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        let ord = match dir {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(Error::DuplicateEmail(user.email));
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: self.ids.next(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            age: user.age,
            department: user.department,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn email_taken(&self, email: &str) -> Result<bool> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().any(|u| u.email == email))
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.id != id && u.email == changes.email)
        {
            return Err(Error::DuplicateEmail(changes.email));
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.first_name = changes.first_name;
        user.last_name = changes.last_name;
        user.email = changes.email;
        user.age = changes.age;
        user.department = changes.department;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn page(
        &self,
        offset: i64,
        limit: i64,
        sort: SortField,
        dir: SortDirection,
    ) -> Result<Vec<User>> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| Self::compare(a, b, sort, dir));
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.users.lock().unwrap().len() as u64)
    }

    async fn all(&self) -> Result<Vec<User>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn by_department(&self, department: &str) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.department == department)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.last_name.cmp(&b.last_name).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn by_age_range(&self, min: i32, max: i32) -> Result<Vec<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| u.age >= min && u.age <= max)
            .cloned()
            .collect())
    }

    async fn search_first_name(&self, pattern: &str) -> Result<Vec<User>> {
        let needle = pattern.to_lowercase();
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| u.first_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn count_by_department(&self, department: &str) -> Result<u64> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().filter(|u| u.department == department).count() as u64)
    }
}
