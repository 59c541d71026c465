//! User business logic: uniqueness enforcement, projection to public views,
//! pagination, filtering and search.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::users::dto::{UserPage, UserPayload, UserView};
use crate::users::repo::UserRepository;
use crate::users::repo_types::{NewUser, Principal, SortDirection, SortField, UserChanges};

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Create a user, optionally with a pre-hashed credential (registration
    /// attaches one; direct creation does not).
    ///
    /// The pre-check gives the common duplicate a clean answer; the unique
    /// index behind `insert` stays authoritative under races.
    pub async fn create(
        &self,
        payload: UserPayload,
        password_hash: Option<String>,
    ) -> Result<UserView> {
        payload.validate()?;
        if self.repo.email_taken(&payload.email).await? {
            return Err(Error::DuplicateEmail(payload.email));
        }
        let user = self
            .repo
            .insert(NewUser {
                first_name: payload.first_name,
                last_name: payload.last_name,
                email: payload.email,
                age: payload.age,
                department: payload.department,
                password_hash,
            })
            .await?;
        info!(user_id = %user.id, email = %user.email, "user created");
        Ok(user.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<UserView> {
        let user = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(user.into())
    }

    pub async fn list_paged(
        &self,
        page: u32,
        size: u32,
        sort_by: &str,
        sort_dir: &str,
    ) -> Result<UserPage> {
        if size == 0 {
            return Err(Error::InvalidQuery("page size must be at least 1".into()));
        }
        let sort = sort_by
            .parse::<SortField>()
            .map_err(|()| Error::InvalidQuery(format!("unknown sort field: {sort_by}")))?;
        let dir = SortDirection::parse(sort_dir);

        let total_items = self.repo.count().await?;
        let users = self
            .repo
            .page(i64::from(page) * i64::from(size), i64::from(size), sort, dir)
            .await?;

        let total_pages = (total_items.div_ceil(u64::from(size)) as u32).max(1);
        Ok(UserPage {
            users: users.into_iter().map(UserView::from).collect(),
            current_page: page,
            total_items,
            total_pages,
            page_size: size,
            has_next: page + 1 < total_pages,
            has_previous: page > 0,
        })
    }

    /// All users in storage order; callers must not rely on any ordering.
    pub async fn list_all(&self) -> Result<Vec<UserView>> {
        let users = self.repo.all().await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    /// Full replace of the five mutable fields. Keeping the same email never
    /// collides with the user itself.
    pub async fn update(&self, id: Uuid, payload: UserPayload) -> Result<UserView> {
        payload.validate()?;
        let current = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if current.email != payload.email && self.repo.email_taken(&payload.email).await? {
            return Err(Error::DuplicateEmail(payload.email));
        }
        let updated = self
            .repo
            .update(
                id,
                UserChanges {
                    first_name: payload.first_name,
                    last_name: payload.last_name,
                    email: payload.email,
                    age: payload.age,
                    department: payload.department,
                },
            )
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        info!(user_id = %id, "user updated");
        Ok(updated.into())
    }

    /// Permanent removal; deleting an already-absent id fails.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(Error::NotFound(id.to_string()));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    pub async fn by_department(&self, department: &str) -> Result<Vec<UserView>> {
        let users = self.repo.by_department(department).await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    pub async fn by_age_range(&self, min: i32, max: i32) -> Result<Vec<UserView>> {
        if min > max {
            return Err(Error::InvalidQuery(format!(
                "minAge {min} is greater than maxAge {max}"
            )));
        }
        let users = self.repo.by_age_range(min, max).await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    /// Case-insensitive substring match on first name; an empty pattern
    /// matches everyone.
    pub async fn search_by_first_name(&self, pattern: &str) -> Result<Vec<UserView>> {
        let users = self.repo.search_first_name(pattern).await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    pub async fn count_by_department(&self, department: &str) -> Result<u64> {
        self.repo.count_by_department(department).await
    }

    /// Minimal identity for the auth layer; the only place the stored
    /// credential leaves the repository.
    pub async fn principal_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let user = self.repo.find_by_email(email).await?;
        Ok(user.map(Principal::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::InMemoryUserRepository;

    fn service() -> UserService {
        UserService::new(Arc::new(InMemoryUserRepository::new()))
    }

    fn payload(first: &str, last: &str, email: &str, age: i32, dept: &str) -> UserPayload {
        UserPayload {
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            age,
            department: dept.into(),
        }
    }

    async fn seed(svc: &UserService, n: usize) -> Vec<UserView> {
        let mut views = Vec::with_capacity(n);
        for i in 0..n {
            let view = svc
                .create(
                    payload(
                        &format!("First{i}"),
                        &format!("Last{i}"),
                        &format!("user{i}@example.com"),
                        20 + (i as i32 % 30),
                        "Engineering",
                    ),
                    None,
                )
                .await
                .unwrap();
            views.push(view);
        }
        views
    }

    #[tokio::test]
    async fn creates_yield_unique_increasing_ids() {
        let svc = service();
        let views = seed(&svc, 10).await;
        for pair in views.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_and_store_keeps_one() {
        let svc = service();
        svc.create(payload("John", "Doe", "dup@example.com", 30, "HR"), None)
            .await
            .unwrap();
        let err = svc
            .create(payload("Jane", "Doe", "dup@example.com", 25, "HR"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail(ref e) if e == "dup@example.com"));
        assert_eq!(svc.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_matching_is_case_sensitive() {
        let svc = service();
        svc.create(payload("John", "Doe", "case@example.com", 30, "HR"), None)
            .await
            .unwrap();
        // Different casing is a different email under the exact-match policy.
        svc.create(payload("Jane", "Doe", "Case@example.com", 25, "HR"), None)
            .await
            .unwrap();
        assert_eq!(svc.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_payload_fails_validation() {
        let svc = service();
        let err = svc
            .create(payload("", "Doe", "x@example.com", 30, "HR"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = svc
            .create(payload("John", "Doe", "bad-email", 30, "HR"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn get_update_delete_missing_id_fail_not_found() {
        let svc = service();
        let missing = Uuid::new_v4();
        assert!(matches!(svc.get(missing).await, Err(Error::NotFound(_))));
        assert!(matches!(
            svc.update(missing, payload("A", "B", "a@b.co", 1, "X")).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(svc.delete(missing).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_is_permanent_and_not_silently_idempotent() {
        let svc = service();
        let view = svc
            .create(payload("John", "Doe", "gone@example.com", 30, "HR"), None)
            .await
            .unwrap();
        svc.delete(view.id).await.unwrap();
        assert!(matches!(svc.get(view.id).await, Err(Error::NotFound(_))));
        assert!(matches!(svc.delete(view.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn update_replaces_all_fields_and_refreshes_updated_at() {
        let svc = service();
        let view = svc
            .create(payload("John", "Doe", "john@example.com", 30, "HR"), None)
            .await
            .unwrap();
        let updated = svc
            .update(
                view.id,
                payload("Johnny", "Dough", "johnny@example.com", 31, "Finance"),
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Johnny");
        assert_eq!(updated.email, "johnny@example.com");
        assert_eq!(updated.department, "Finance");
        assert_eq!(updated.created_at, view.created_at);
        assert!(updated.updated_at >= view.updated_at);
    }

    #[tokio::test]
    async fn update_with_own_email_never_collides() {
        let svc = service();
        let view = svc
            .create(payload("John", "Doe", "self@example.com", 30, "HR"), None)
            .await
            .unwrap();
        let updated = svc
            .update(view.id, payload("John", "Doe", "self@example.com", 31, "HR"))
            .await
            .unwrap();
        assert_eq!(updated.age, 31);
    }

    #[tokio::test]
    async fn update_to_another_users_email_conflicts() {
        let svc = service();
        svc.create(payload("A", "A", "taken@example.com", 20, "HR"), None)
            .await
            .unwrap();
        let b = svc
            .create(payload("B", "B", "b@example.com", 21, "HR"), None)
            .await
            .unwrap();
        let err = svc
            .update(b.id, payload("B", "B", "taken@example.com", 21, "HR"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn pagination_shape_for_25_users_page_size_10() {
        let svc = service();
        seed(&svc, 25).await;

        let page0 = svc.list_paged(0, 10, "id", "asc").await.unwrap();
        let page1 = svc.list_paged(1, 10, "id", "asc").await.unwrap();
        let page2 = svc.list_paged(2, 10, "id", "asc").await.unwrap();

        assert_eq!(page0.users.len(), 10);
        assert_eq!(page1.users.len(), 10);
        assert_eq!(page2.users.len(), 5);
        for page in [&page0, &page1, &page2] {
            assert_eq!(page.total_items, 25);
            assert_eq!(page.total_pages, 3);
            assert_eq!(page.page_size, 10);
        }
        assert!(page0.has_next && page1.has_next && !page2.has_next);
        assert!(!page0.has_previous && page1.has_previous && page2.has_previous);
        assert_eq!(page0.current_page, 0);
        assert_eq!(page2.current_page, 2);
    }

    #[tokio::test]
    async fn empty_store_still_reports_one_page() {
        let svc = service();
        let page = svc.list_paged(0, 10, "id", "asc").await.unwrap();
        assert_eq!(page.total_items, 0);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next && !page.has_previous);
    }

    #[tokio::test]
    async fn unknown_sort_field_and_zero_size_are_invalid() {
        let svc = service();
        assert!(matches!(
            svc.list_paged(0, 10, "salary", "asc").await,
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            svc.list_paged(0, 0, "id", "asc").await,
            Err(Error::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn paged_listing_honors_sort_field_and_direction() {
        let svc = service();
        svc.create(payload("Zoe", "Young", "z@example.com", 40, "HR"), None)
            .await
            .unwrap();
        svc.create(payload("Amy", "Old", "a@example.com", 22, "HR"), None)
            .await
            .unwrap();

        let by_age_desc = svc.list_paged(0, 10, "age", "desc").await.unwrap();
        assert_eq!(by_age_desc.users[0].age, 40);

        let by_first_asc = svc.list_paged(0, 10, "firstName", "asc").await.unwrap();
        assert_eq!(by_first_asc.users[0].first_name, "Amy");
    }

    #[tokio::test]
    async fn age_range_is_inclusive_and_validated() {
        let svc = service();
        for (email, age) in [("a@x.co", 19), ("b@x.co", 20), ("c@x.co", 30), ("d@x.co", 31)] {
            svc.create(payload("N", "N", email, age, "HR"), None)
                .await
                .unwrap();
        }

        let err = svc.by_age_range(30, 20).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        let hits = svc.by_age_range(20, 30).await.unwrap();
        let ages: Vec<i32> = hits.iter().map(|v| v.age).collect();
        assert_eq!(hits.len(), 2);
        assert!(ages.contains(&20) && ages.contains(&30));
    }

    #[tokio::test]
    async fn first_name_search_is_case_insensitive_substring() {
        let svc = service();
        for (first, email) in [
            ("John", "john@x.co"),
            ("Johnson", "johnson@x.co"),
            ("Mary", "mary@x.co"),
        ] {
            svc.create(payload(first, "N", email, 30, "HR"), None)
                .await
                .unwrap();
        }

        let hits = svc.search_by_first_name("jo").await.unwrap();
        let names: Vec<&str> = hits.iter().map(|v| v.first_name.as_str()).collect();
        assert_eq!(hits.len(), 2);
        assert!(names.contains(&"John") && names.contains(&"Johnson"));

        let all = svc.search_by_first_name("").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn department_listing_sorts_by_last_name_and_counts() {
        let svc = service();
        for (last, email, dept) in [
            ("Wilson", "w@x.co", "Engineering"),
            ("Anderson", "an@x.co", "Engineering"),
            ("Miller", "m@x.co", "Engineering"),
            ("Smith", "s@x.co", "Marketing"),
        ] {
            svc.create(payload("N", last, email, 30, dept), None)
                .await
                .unwrap();
        }

        let engineers = svc.by_department("Engineering").await.unwrap();
        let lasts: Vec<&str> = engineers.iter().map(|v| v.last_name.as_str()).collect();
        assert_eq!(lasts, vec!["Anderson", "Miller", "Wilson"]);

        assert_eq!(svc.count_by_department("Engineering").await.unwrap(), 3);
        assert_eq!(svc.count_by_department("Marketing").await.unwrap(), 1);
        assert_eq!(svc.count_by_department("Sales").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn racing_creates_on_one_email_admit_exactly_one() {
        let svc = service();
        let a = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.create(payload("A", "A", "race@example.com", 30, "HR"), None)
                    .await
            })
        };
        let b = {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.create(payload("B", "B", "race@example.com", 31, "HR"), None)
                    .await
            })
        };
        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);
        let loser = if ra.is_err() { ra } else { rb };
        assert!(matches!(loser, Err(Error::DuplicateEmail(_))));
        assert_eq!(svc.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn principal_carries_the_credential_but_views_never_do() {
        let svc = service();
        svc.create(
            payload("John", "Doe", "p@example.com", 30, "HR"),
            Some("$argon2id$hash".into()),
        )
        .await
        .unwrap();

        let principal = svc.principal_by_email("p@example.com").await.unwrap().unwrap();
        assert_eq!(principal.password_hash.as_deref(), Some("$argon2id$hash"));
        assert!(svc.principal_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
