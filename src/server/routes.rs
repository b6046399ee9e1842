//! HTTP and WebSocket routes of the document server.
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /users/{user_id}/days/{date}`: Day document (`{}` if none)
//! - `POST /users/{user_id}/days/{date}/{meal}`: Append one entry
//! - `PUT /users/{user_id}/days/{date}/{meal}`: Overwrite a meal's entries
//! - `GET /users/{user_id}/days/{date}/subscribe`: WebSocket; pushes the full
//!   document on connect and after every change
//!
//! An API key may only touch its own user's documents.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    middleware,
    response::Response,
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use fooddude_core::{FoodEntry, MealSlot};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, error_response, ApiKeyStore, AuthUser};
use super::hub::DayHub;
use super::storage::{DayStorage, DayStorageError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyStore>,
    pub storage: Arc<RwLock<DayStorage>>,
    pub hub: Arc<DayHub>,
}

impl AppState {
    pub fn new(api_keys: ApiKeyStore, storage: DayStorage) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
            storage: Arc::new(RwLock::new(storage)),
            hub: Arc::new(DayHub::new()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users/{user_id}/days/{date}", get(get_day))
        .route("/users/{user_id}/days/{date}/subscribe", get(subscribe))
        .route(
            "/users/{user_id}/days/{date}/{meal}",
            axum::routing::post(append_entry).put(replace_meal),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn authorize(user: &AuthUser, user_id: &str) -> Result<(), Response> {
    if user.user_id != user_id {
        tracing::warn!("{} tried to access documents of {}", user.user_id, user_id);
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "forbidden",
            "API key does not belong to this user",
        ));
    }
    DayStorage::validate_user_id(user_id).map_err(storage_error)
}

fn parse_meal(meal: &str) -> Result<MealSlot, Response> {
    meal.parse()
        .map_err(|e: String| error_response(StatusCode::BAD_REQUEST, "invalid_meal", e))
}

fn storage_error(e: DayStorageError) -> Response {
    match e {
        DayStorageError::InvalidUserId(_) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_user", e.to_string())
        }
        _ => {
            tracing::error!("{}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
    }
}

async fn get_day(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<Value>, Response> {
    authorize(&user, &user_id)?;
    let storage = state.storage.read().await;
    let doc = storage.load(&user_id, date).map_err(storage_error)?;
    Ok(Json(doc))
}

async fn append_entry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date, meal)): Path<(String, NaiveDate, String)>,
    Json(entry): Json<FoodEntry>,
) -> Result<StatusCode, Response> {
    authorize(&user, &user_id)?;
    let meal = parse_meal(&meal)?;

    // Broadcast under the lock so subscribers see writes in order.
    let storage = state.storage.write().await;
    let doc = storage
        .append(&user_id, date, meal, &entry)
        .map_err(storage_error)?;
    tracing::info!("Appended {} to {}/{}/{}", entry.name, user_id, date, meal);
    state.hub.broadcast(&user_id, date, doc).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn replace_meal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date, meal)): Path<(String, NaiveDate, String)>,
    Json(entries): Json<Vec<FoodEntry>>,
) -> Result<StatusCode, Response> {
    authorize(&user, &user_id)?;
    let meal = parse_meal(&meal)?;

    let storage = state.storage.write().await;
    let doc = storage
        .replace(&user_id, date, meal, &entries)
        .map_err(storage_error)?;
    tracing::info!(
        "Replaced {}/{}/{} with {} entries",
        user_id,
        date,
        meal,
        entries.len()
    );
    state.hub.broadcast(&user_id, date, doc).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn subscribe(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date)): Path<(String, NaiveDate)>,
) -> Response {
    if let Err(response) = authorize(&user, &user_id) {
        return response;
    }
    ws.on_upgrade(move |socket| stream_day(socket, state, user_id, date))
}

async fn send_document(
    sender: &mut SplitSink<WebSocket, Message>,
    document: &Value,
) -> Result<(), axum::Error> {
    sender
        .send(Message::Text(document.to_string().into()))
        .await
}

async fn load_current(state: &AppState, user_id: &str, date: NaiveDate) -> Option<Value> {
    match state.storage.read().await.load(user_id, date) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!("Closing subscription for {}/{}: {}", user_id, date, e);
            None
        }
    }
}

/// Pushes the current document, then every update, until the client leaves.
async fn stream_day(socket: WebSocket, state: AppState, user_id: String, date: NaiveDate) {
    // Subscribe before reading so no write falls between the two.
    let updates = state.hub.subscribe(&user_id, date).await;
    tracing::debug!("Subscriber connected to {}/{}", user_id, date);

    pump_updates(socket, &state, &user_id, date, updates).await;

    state.hub.release(&user_id, date).await;
    tracing::debug!("Subscriber left {}/{}", user_id, date);
}

async fn pump_updates(
    socket: WebSocket,
    state: &AppState,
    user_id: &str,
    date: NaiveDate,
    mut updates: broadcast::Receiver<Value>,
) {
    let (mut sender, mut receiver) = socket.split();

    let Some(current) = load_current(state, user_id, date).await else {
        return;
    };
    if send_document(&mut sender, &current).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                let doc = match update {
                    Ok(doc) => doc,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Documents are complete, so the latest one covers what was skipped.
                        tracing::debug!("Subscriber lagged by {} update(s)", skipped);
                        match load_current(state, user_id, date).await {
                            Some(doc) => doc,
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if send_document(&mut sender, &doc).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::auth::ApiKeyEntry;
    use axum::body::Body;
    use axum::http::Request;
    use fooddude_core::{DocumentStore, HttpDocumentStore};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(temp: &TempDir) -> AppState {
        let keys = ApiKeyStore::from_entries(vec![ApiKeyEntry {
            key: "alice-key".to_string(),
            user_id: "alice".to_string(),
        }]);
        AppState::new(keys, DayStorage::new(temp.path()))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let temp = TempDir::new().unwrap();
        let response = router(state(&temp))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_and_wrong_auth() {
        let temp = TempDir::new().unwrap();
        let app = router(state(&temp));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users/alice/days/2024-01-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "missing_auth");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/users/bob/days/2024-01-01")
                    .header("Authorization", "Bearer alice-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_append_then_get() {
        let temp = TempDir::new().unwrap();
        let app = router(state(&temp));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/users/alice/days/2024-01-01/lunch")
                    .header("Authorization", "Bearer alice-key")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        r#"{"foodName":"Soup","calories":90,"protein":3.0,"carbs":10.0,"fat":2.0}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/users/alice/days/2024-01-01")
                    .header("Authorization", "Bearer alice-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let doc = body_json(response).await;
        assert_eq!(doc["Lunch"][0]["foodName"], "Soup");
    }

    #[tokio::test]
    async fn test_unknown_meal_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let response = router(state(&temp))
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/users/alice/days/2024-01-01/brunch")
                    .header("Authorization", "Bearer alice-key")
                    .header("Content-Type", "application/json")
                    .body(Body::from("[]"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_http_store_against_live_server() {
        let temp = TempDir::new().unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state(&temp));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = HttpDocumentStore::new(format!("http://{}", addr), "alice-key");
        let mut snapshots = store.subscribe("alice", date()).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), snapshots.next())
            .await
            .unwrap()
            .unwrap();
        assert!(first.is_empty());

        let soup = FoodEntry::new("Soup", 90, 3.0, 10.0, 2.0);
        store.append("alice", date(), MealSlot::Lunch, &soup).await.unwrap();

        let pushed = tokio::time::timeout(Duration::from_secs(5), snapshots.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pushed.entries(MealSlot::Lunch), &[soup.clone()]);

        store.replace("alice", date(), MealSlot::Lunch, &[]).await.unwrap();
        let day = store.fetch("alice", date()).await.unwrap();
        assert!(day.entries(MealSlot::Lunch).is_empty());

        let other = HttpDocumentStore::new(format!("http://{}", addr), "alice-key");
        let err = other.fetch("bob", date()).await.unwrap_err();
        assert!(matches!(err, fooddude_core::StoreError::Rejected(_)));
    }
}
