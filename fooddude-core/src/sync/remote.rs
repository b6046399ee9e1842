//! HTTP + WebSocket client for the FoodDude document server.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::error::StoreError;
use super::store::{quarantine_malformed, DocumentStore, SnapshotStream};
use crate::models::{DayLog, FoodEntry, MealSlot};

/// Document store backed by `fooddude-server`.
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
}

impl HttpDocumentStore {
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn day_path(user: &str, date: NaiveDate) -> String {
        format!("/users/{}/days/{}", urlencoding::encode(user), date)
    }

    pub(crate) fn build_http_url(&self, path: &str) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else if let Some(rest) = self.server_url.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if self.server_url.starts_with("http://") || self.server_url.starts_with("https://") {
            self.server_url.clone()
        } else {
            format!("http://{}", self.server_url)
        };
        format!("{}{}", base, path)
    }

    pub(crate) fn build_ws_url(&self, path: &str) -> String {
        let http = self.build_http_url(path);
        if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            http
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(status))
        }
    }
}

/// Server-side failures and throttling are worth retrying; other client
/// errors are not going to change on replay.
fn status_error(status: StatusCode) -> StoreError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        StoreError::Unreachable(format!("server returned status {}", status))
    } else {
        StoreError::Rejected(format!("server returned status {}", status))
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn append(
        &self,
        user: &str,
        date: NaiveDate,
        meal: MealSlot,
        entry: &FoodEntry,
    ) -> Result<(), StoreError> {
        let url = self.build_http_url(&format!("{}/{}", Self::day_path(user, date), meal));
        self.send(self.client.post(url).json(entry)).await?;
        Ok(())
    }

    async fn replace(
        &self,
        user: &str,
        date: NaiveDate,
        meal: MealSlot,
        entries: &[FoodEntry],
    ) -> Result<(), StoreError> {
        let url = self.build_http_url(&format!("{}/{}", Self::day_path(user, date), meal));
        self.send(self.client.put(url).json(entries)).await?;
        Ok(())
    }

    async fn fetch(&self, user: &str, date: NaiveDate) -> Result<DayLog, StoreError> {
        let url = self.build_http_url(&Self::day_path(user, date));
        let document: Value = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        Ok(DayLog::from_document(&document)?)
    }

    async fn subscribe(&self, user: &str, date: NaiveDate) -> Result<SnapshotStream, StoreError> {
        let url = self.build_ws_url(&format!("{}/subscribe", Self::day_path(user, date)));
        let mut request = url
            .into_client_request()
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        tracing::debug!("Subscribed to {} {}", user, date);

        let documents = socket
            .take_while(|message| futures::future::ready(message.is_ok()))
            .filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                        Ok(doc) => Some(doc),
                        Err(e) => {
                            tracing::warn!("Ignoring unparseable snapshot: {}", e);
                            None
                        }
                    },
                    _ => None,
                }
            });

        Ok(quarantine_malformed(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_urls_from_http() {
        let store = HttpDocumentStore::new("http://localhost:8080/", "key");
        assert_eq!(
            store.build_http_url("/users/u1/days/2024-01-01"),
            "http://localhost:8080/users/u1/days/2024-01-01"
        );
        assert_eq!(
            store.build_ws_url("/users/u1/days/2024-01-01/subscribe"),
            "ws://localhost:8080/users/u1/days/2024-01-01/subscribe"
        );
    }

    #[test]
    fn test_build_urls_from_https_and_bare_host() {
        let store = HttpDocumentStore::new("https://sync.example.com", "key");
        assert_eq!(store.build_ws_url("/x"), "wss://sync.example.com/x");

        let store = HttpDocumentStore::new("localhost:8080", "key");
        assert_eq!(store.build_http_url("/x"), "http://localhost:8080/x");

        let store = HttpDocumentStore::new("wss://sync.example.com", "key");
        assert_eq!(store.build_http_url("/x"), "https://sync.example.com/x");
    }

    #[test]
    fn test_day_path_encodes_user() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            HttpDocumentStore::day_path("a b", date),
            "/users/a%20b/days/2024-03-09"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE),
            StoreError::Unreachable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN),
            StoreError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = HttpDocumentStore::new(format!("http://{}", addr), "key");
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = store
            .append("u1", date, MealSlot::Lunch, &FoodEntry::new("Soup", 90, 3.0, 10.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
    }
}
