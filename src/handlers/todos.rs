use axum::extract::{Path, State};
use axum::{http::StatusCode, response::IntoResponse, Json};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::info;

use crate::db::{create_todo, delete_todo, get_todo, list_todos, set_attachment_url, update_todo};
use crate::error::AppError;
use crate::middleware::Owner;
use crate::models::{
    CreateTodo, ItemResponse, ItemsResponse, Page, RetrieveTodosRequest, UpdateTodo,
    UploadUrlResponse,
};
use crate::query::{retrieve_todos, QueryDescriptor};
use crate::AppState;

fn validate_fields(name: &str, due_date: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Name cannot be empty"));
    }
    if Date::parse(due_date, format_description!("[year]-[month]-[day]")).is_err() {
        return Err(AppError::BadRequest("Due date must be a YYYY-MM-DD date"));
    }
    Ok(())
}

pub async fn list_all_todos(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
) -> Result<Json<ItemsResponse>, AppError> {
    let items = list_todos(&state.db, &owner_id)?;
    info!(owner = %owner_id, count = items.len(), "Listed todos");
    Ok(Json(ItemsResponse { items }))
}

pub async fn retrieve(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
    Json(req): Json<RetrieveTodosRequest>,
) -> Result<Json<Page>, AppError> {
    let descriptor = QueryDescriptor::try_from(req)?;
    let page = retrieve_todos(&state.db, &owner_id, &descriptor)?;
    info!(
        owner = %owner_id,
        page_size = descriptor.page_size,
        count = page.items.len(),
        more = page.last_item_key.is_some(),
        "Retrieved todos"
    );
    Ok(Json(page))
}

pub async fn create_new_todo(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
    Json(req): Json<CreateTodo>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    validate_fields(&req.name, &req.due_date)?;

    let item = create_todo(&state.db, &owner_id, &req)?;
    info!(owner = %owner_id, todo_id = %item.todo_id, name = %item.name, "Created todo");
    Ok((StatusCode::CREATED, Json(ItemResponse { item })))
}

pub async fn get_single_todo(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
) -> Result<Json<ItemResponse>, AppError> {
    match get_todo(&state.db, &owner_id, &todo_id)? {
        Some(item) => Ok(Json(ItemResponse { item })),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_existing_todo(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
    Json(req): Json<UpdateTodo>,
) -> Result<impl IntoResponse, AppError> {
    validate_fields(&req.name, &req.due_date)?;

    match update_todo(&state.db, &owner_id, &todo_id, &req)? {
        Some(updated) => {
            info!(owner = %owner_id, %todo_id, done = updated.done, "Updated todo");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::NotFound),
    }
}

pub async fn delete_existing_todo(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let existed = delete_todo(&state.db, &owner_id, &todo_id)?;
    info!(owner = %owner_id, %todo_id, existed, "Deleted todo");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate_upload_url(
    Owner(owner_id): Owner,
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    let attachment_url = state.attachments.object_url(&todo_id);
    if !set_attachment_url(&state.db, &owner_id, &todo_id, &attachment_url)? {
        return Err(AppError::NotFound);
    }

    let upload_url = state
        .attachments
        .upload_url(&todo_id, OffsetDateTime::now_utc());
    info!(owner = %owner_id, %todo_id, "Issued attachment upload URL");
    Ok(Json(UploadUrlResponse { upload_url }))
}
