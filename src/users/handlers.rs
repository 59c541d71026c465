use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::Error;
use crate::state::AppState;
use crate::users::dto::{
    AgeRangeQuery, DepartmentCount, ListQuery, SearchQuery, UserPage, UserPayload, UserView,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/all", get(list_all_users))
        .route("/users/age-range", get(users_by_age_range))
        .route("/users/search", get(search_users))
        .route("/users/department/:department", get(users_by_department))
        .route(
            "/users/department/:department/count",
            get(count_by_department),
        )
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> Result<(StatusCode, Json<UserView>), Error> {
    let view = state.users().create(payload, None).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<UserPage>, Error> {
    let page = state
        .users()
        .list_paged(q.page, q.size, &q.sort_by, &q.sort_dir)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
async fn list_all_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, Error> {
    Ok(Json(state.users().list_all().await?))
}

#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, Error> {
    Ok(Json(state.users().get(id).await?))
}

#[instrument(skip(state, payload))]
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<UserView>, Error> {
    Ok(Json(state.users().update(id, payload).await?))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    state.users().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn users_by_department(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> Result<Json<Vec<UserView>>, Error> {
    Ok(Json(state.users().by_department(&department).await?))
}

#[instrument(skip(state))]
async fn users_by_age_range(
    State(state): State<AppState>,
    Query(q): Query<AgeRangeQuery>,
) -> Result<Json<Vec<UserView>>, Error> {
    Ok(Json(state.users().by_age_range(q.min_age, q.max_age).await?))
}

#[instrument(skip(state))]
async fn search_users(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<UserView>>, Error> {
    Ok(Json(state.users().search_by_first_name(&q.first_name).await?))
}

#[instrument(skip(state))]
async fn count_by_department(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> Result<Json<DepartmentCount>, Error> {
    let user_count = state.users().count_by_department(&department).await?;
    Ok(Json(DepartmentCount {
        department,
        user_count,
    }))
}
