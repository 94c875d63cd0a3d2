//! ZincSearch-compatible REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::SearchConfig;

use super::{SearchDocument, SearchError, SearchIndex};

#[derive(Debug, Clone)]
pub struct ZincClient {
    http: reqwest::Client,
    base_url: String,
    index: String,
    username: String,
    password: String,
}

impl ZincClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SearchError::Request {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url,
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/api/{}/_doc/{id}", self.base_url, self.index)
    }

    async fn check(url: &str, response: reqwest::Response) -> Result<(), SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SearchIndex for ZincClient {
    async fn insert(&self, id: &str, document: &SearchDocument) -> Result<(), SearchError> {
        let url = self.doc_url(id);
        let response = self
            .http
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(document)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Self::check(&url, response).await
    }

    async fn delete(&self, id: &str) -> Result<(), SearchError> {
        let url = self.doc_url(id);
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| SearchError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(&url, response).await
    }

    async fn probe(&self) -> Result<(), SearchError> {
        let url = format!("{}/healthz", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| SearchError::Request {
                url,
                reason: e.to_string(),
            })
    }
}


#[cfg(all(test, feature = "http-server"))]
mod server_tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{Path as UrlPath, State};
    use axum::http::{HeaderMap, Method};
    use axum::routing::put;
    use data_encoding::BASE64;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        index: String,
        id: String,
        auth: Option<String>,
        body: Bytes,
    }

    type Log = Arc<Mutex<Vec<Seen>>>;

    async fn record(
        State((log, delete_status)): State<(Log, StatusCode)>,
        method: Method,
        UrlPath((index, id)): UrlPath<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let status = if method == Method::DELETE {
            delete_status
        } else {
            StatusCode::OK
        };
        log.lock().unwrap().push(Seen {
            method,
            index,
            id,
            auth,
            body,
        });
        status
    }

    async fn spawn_zinc(delete_status: StatusCode) -> (SearchConfig, Log) {
        let log = Log::default();
        let app = Router::new()
            .route("/api/{index}/_doc/{id}", put(record).delete(record))
            .with_state((log.clone(), delete_status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = SearchConfig {
            url: format!("http://{addr}"),
            index: "Files".into(),
            ..SearchConfig::default()
        };
        (config, log)
    }

    fn expected_auth(config: &SearchConfig) -> String {
        let credentials = format!("{}:{}", config.username, config.password);
        format!("Basic {}", BASE64.encode(credentials.as_bytes()))
    }

    #[tokio::test]
    async fn test_insert_puts_document_with_basic_auth() {
        let (config, log) = spawn_zinc(StatusCode::OK).await;
        let client = ZincClient::new(&config).unwrap();
        let document = SearchDocument::new(Path::new("/data/notes.md"), "hello".into(), 5);

        client.insert("DOCID", &document).await.unwrap();

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::PUT);
        assert_eq!(seen[0].index, "Files");
        assert_eq!(seen[0].id, "DOCID");
        assert_eq!(seen[0].auth.as_deref(), Some(expected_auth(&config).as_str()));

        let body: serde_json::Value = serde_json::from_slice(&seen[0].body).unwrap();
        assert_eq!(body["where"], "/data/notes.md");
        assert_eq!(body["content"], "hello");
        assert_eq!(body["format_name"], "notes md");
    }

    #[tokio::test]
    async fn test_delete_of_missing_document_is_ok() {
        let (config, log) = spawn_zinc(StatusCode::NOT_FOUND).await;
        let client = ZincClient::new(&config).unwrap();

        client.delete("GONE").await.unwrap();

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen[0].method, Method::DELETE);
        assert_eq!(seen[0].id, "GONE");
        assert_eq!(seen[0].auth.as_deref(), Some(expected_auth(&config).as_str()));
    }

    #[tokio::test]
    async fn test_delete_server_error_is_reported() {
        let (config, _log) = spawn_zinc(StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = ZincClient::new(&config).unwrap();

        assert!(matches!(
            client.delete("ID").await,
            Err(SearchError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_reachability_check_treats_any_answer_as_up() {
        // No /healthz route: a 404 still proves the backend is up
        let (config, _log) = spawn_zinc(StatusCode::OK).await;
        ZincClient::new(&config).unwrap().probe().await.unwrap();

        let down = SearchConfig {
            url: "http://127.0.0.1:1".into(),
            ..SearchConfig::default()
        };
        assert!(ZincClient::new(&down).unwrap().probe().await.is_err());
    }
}
