//! HTTP surface: the task controller.
//!
//! Handlers translate requests into repository calls and wrap every
//! payload in the `{success, data?, error?, message?}` envelope. The
//! validation gate runs before any mutation touches the store.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::db::{Db, TaskFilter};
use crate::error::AppError;
use crate::models::{
    ApiResponse, CreateTodoInput, ListQuery, Task, TaskStats, UpdateTodoInput,
};
use crate::validate;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
}

/// Path id extractor whose rejection stays in the response envelope.
/// `Path<Uuid>` would answer a malformed id with a plain-text 400.
struct TodoId(Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TodoId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::BadRequest("id must be a valid UUID".to_string()))?;
        let id = Uuid::parse_str(&raw)
            .map_err(|_| AppError::BadRequest("id must be a valid UUID".to_string()))?;
        Ok(TodoId(id))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/api/todos/stats", get(dashboard_stats))
        .route(
            "/api/todos/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .with_state(state)
}

// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK", "message": "Server is running" }))
}

// GET /api/todos?status&priority&sort
async fn list_todos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let filter = TaskFilter::from_query(&query);
    let tasks = state.db.list_tasks(&filter).await?;
    Ok(Json(ApiResponse::ok(tasks)))
}

// GET /api/todos/stats
async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TaskStats>>, AppError> {
    let stats = state.db.task_stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}

// GET /api/todos/:id
async fn get_todo(
    State(state): State<AppState>,
    TodoId(id): TodoId,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = state
        .db
        .get_task(id)
        .await?
        .ok_or(AppError::NotFound("Todo not found"))?;
    Ok(Json(ApiResponse::ok(task)))
}

// POST /api/todos
async fn create_todo(
    State(state): State<AppState>,
    Json(payload): Json<CreateTodoInput>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), AppError> {
    let new = validate::create(payload)?;
    let task = state.db.insert_task(&new).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(task, "Todo created successfully")),
    ))
}

// PUT /api/todos/:id
async fn update_todo(
    State(state): State<AppState>,
    TodoId(id): TodoId,
    Json(payload): Json<UpdateTodoInput>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let patch = validate::update(payload)?;
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let task = state
        .db
        .update_task(id, &patch)
        .await?
        .ok_or(AppError::NotFound("Todo not found"))?;
    Ok(Json(ApiResponse::ok_with_message(task, "Todo updated successfully")))
}

// DELETE /api/todos/:id
async fn delete_todo(
    State(state): State<AppState>,
    TodoId(id): TodoId,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !state.db.delete_task(id).await? {
        return Err(AppError::NotFound("Todo not found"));
    }
    Ok(Json(ApiResponse::message_only("Todo deleted successfully")))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let db = Db::open_in_memory().await.unwrap();
        router(AppState { db })
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn create_then_toggle_then_filter() {
        let app = test_app().await;

        // Create: 201, completed=false, priority as given.
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "Buy milk", "priority": "low" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["completed"], false);
        assert_eq!(body["data"]["priority"], "low");
        assert_eq!(body["data"]["createdAt"], body["data"]["updatedAt"]);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        // Toggle via partial update.
        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/todos/{id}"),
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["completed"], true);
        assert_ne!(body["data"]["createdAt"], body["data"]["updatedAt"]);

        // status=completed includes it, status=pending excludes it.
        let (_, body) = call(&app, Method::GET, "/api/todos?status=completed", None).await;
        let completed: Vec<&str> =
            body["data"].as_array().unwrap().iter().map(|t| t["id"].as_str().unwrap()).collect();
        assert!(completed.contains(&id.as_str()));

        let (_, body) = call(&app, Method::GET, "/api/todos?status=pending", None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_payload_with_rule_message() {
        let app = test_app().await;

        let (status, body) =
            call(&app, Method::POST, "/api/todos", Some(json!({ "priority": "low" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "title is required");

        // Nothing was stored.
        let (_, body) = call(&app, Method::GET, "/api/todos", None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_with_no_recognized_fields_is_rejected() {
        let app = test_app().await;
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "stable", "priority": "medium" })),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let before = body["data"].clone();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/todos/{id}"),
            Some(json!({ "bogus": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No fields to update");

        // Row untouched.
        let (_, body) = call(&app, Method::GET, &format!("/api/todos/{id}"), None).await;
        assert_eq!(body["data"], before);
    }

    #[tokio::test]
    async fn unknown_ids_answer_404() {
        let app = test_app().await;
        let missing = Uuid::new_v4();

        let (status, body) =
            call(&app, Method::GET, &format!("/api/todos/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Todo not found");

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/todos/{missing}"),
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/todos/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_ids_answer_400_in_the_envelope() {
        let app = test_app().await;

        let (status, body) = call(&app, Method::GET, "/api/todos/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "id must be a valid UUID");

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/todos/not-a-uuid",
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "id must be a valid UUID");

        let (status, body) = call(&app, Method::DELETE, "/api/todos/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn delete_acknowledges_without_data() {
        let app = test_app().await;
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "doomed", "priority": "high" })),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) =
            call(&app, Method::DELETE, &format!("/api/todos/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Todo deleted successfully");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn stats_reflect_the_store() {
        let app = test_app().await;

        let (status, body) = call(&app, Method::GET, "/api/todos/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 0);
        assert_eq!(body["data"]["overdue"], 0);

        call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "late", "priority": "high", "dueDate": "2020-01-01" })),
        )
        .await;
        call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "open", "priority": "low" })),
        )
        .await;

        let (_, body) = call(&app, Method::GET, "/api/todos/stats", None).await;
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["pending"], 2);
        assert_eq!(body["data"]["highPriority"], 1);
        assert_eq!(body["data"]["overdue"], 1);
    }

    #[tokio::test]
    async fn list_ignores_unrecognized_priority_filter() {
        let app = test_app().await;
        call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "a", "priority": "low" })),
        )
        .await;
        call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "b", "priority": "high" })),
        )
        .await;

        let (status, body) =
            call(&app, Method::GET, "/api/todos?priority=urgent", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_clears_description_with_explicit_null() {
        let app = test_app().await;
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "t", "priority": "medium", "description": "notes" })),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/todos/{id}"),
            Some(json!({ "description": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["description"], Value::Null);
    }

    #[tokio::test]
    async fn health_answers_plainly() {
        let app = test_app().await;
        let (status, body) = call(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
    }
}
