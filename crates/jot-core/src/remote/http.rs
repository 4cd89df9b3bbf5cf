//! REST document API client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::timestamp::{from_remote_document, to_remote_document};
use super::{ListFilter, Page, PageRequest, RemoteResult, RemoteStore};
use crate::error::{RemoteFailure, RemoteFailureKind};
use crate::models::{Collection, RecordId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Remote store reached over HTTP at `{base}/v1/collections/{collection}/documents`
#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| RemoteFailure::network(error.to_string()))?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client,
        })
    }

    fn documents_url(&self, collection: Collection) -> String {
        format!("{}/v1/collections/{collection}/documents", self.base_url)
    }

    fn document_url(&self, collection: Collection, id: &RecordId) -> String {
        format!("{}/{id}", self.documents_url(collection))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = builder.send().await.map_err(transport_failure)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteFailure::new(
            failure_kind(status),
            parse_api_error(status, &body),
        ))
    }

    async fn document(response: reqwest::Response) -> RemoteResult<Value> {
        let body = response.json::<Value>().await.map_err(transport_failure)?;
        from_remote_document(body)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create(&self, collection: Collection, payload: Value) -> RemoteResult<Value> {
        let url = self.documents_url(collection);
        let response = self
            .send(
                self.request(reqwest::Method::POST, &url)
                    .json(&to_remote_document(payload)),
            )
            .await?;
        Self::document(response).await
    }

    async fn get(&self, collection: Collection, id: &RecordId) -> RemoteResult<Option<Value>> {
        let url = self.document_url(collection, id);
        match self.send(self.request(reqwest::Method::GET, &url)).await {
            Ok(response) => Self::document(response).await.map(Some),
            Err(failure) if failure.kind == RemoteFailureKind::NotFound => Ok(None),
            Err(failure) => Err(failure),
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Value,
    ) -> RemoteResult<Value> {
        let url = self.document_url(collection, id);
        let response = self
            .send(
                self.request(reqwest::Method::PATCH, &url)
                    .json(&to_remote_document(patch)),
            )
            .await?;
        Self::document(response).await
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &RecordId,
        context: &Value,
    ) -> RemoteResult<()> {
        let url = self.document_url(collection, id);
        let mut builder = self.request(reqwest::Method::DELETE, &url);
        if let Some(user_id) = context.get("user_id").and_then(Value::as_str) {
            builder = builder.query(&[("user_id", user_id)]);
        }
        match self.send(builder).await {
            Ok(_) => Ok(()),
            Err(failure) if failure.kind == RemoteFailureKind::NotFound => Ok(()),
            Err(failure) => Err(failure),
        }
    }

    async fn list(
        &self,
        collection: Collection,
        filter: &ListFilter,
        page: &PageRequest,
    ) -> RemoteResult<Page> {
        let url = self.documents_url(collection);
        let query = list_query(filter, page);
        let response = self
            .send(self.request(reqwest::Method::GET, &url).query(&query))
            .await?;
        let body = response
            .json::<ListResponse>()
            .await
            .map_err(transport_failure)?;

        let records = body
            .documents
            .into_iter()
            .map(from_remote_document)
            .collect::<RemoteResult<Vec<_>>>()?;
        Ok(Page {
            records,
            has_more: body.has_more,
            cursor: body.next_cursor,
        })
    }
}

fn list_query(filter: &ListFilter, page: &PageRequest) -> Vec<(String, String)> {
    let mut query = vec![
        ("limit".to_string(), page.limit.to_string()),
        ("order".to_string(), "created_at_desc".to_string()),
    ];
    if let Some(cursor) = &page.cursor {
        query.push(("cursor".to_string(), cursor.clone()));
    }
    for (field, value) in &filter.equals {
        let value = value
            .as_str()
            .map_or_else(|| value.to_string(), str::to_string);
        query.push((format!("where.{field}"), value));
    }
    query
}

fn transport_failure(error: reqwest::Error) -> RemoteFailure {
    if error.is_timeout() {
        RemoteFailure::timeout(error.to_string())
    } else if error.is_decode() {
        RemoteFailure::new(RemoteFailureKind::Invalid, error.to_string())
    } else {
        RemoteFailure::network(error.to_string())
    }
}

fn failure_kind(status: StatusCode) -> RemoteFailureKind {
    match status.as_u16() {
        401 | 403 => RemoteFailureKind::PermissionDenied,
        404 => RemoteFailureKind::NotFound,
        408 | 504 => RemoteFailureKind::Timeout,
        429 | 500..=599 => RemoteFailureKind::Unavailable,
        _ => RemoteFailureKind::Invalid,
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let invalid = |message: &str| RemoteFailure::new(RemoteFailureKind::Invalid, message);
    let base_url =
        normalize_text_option(Some(raw)).ok_or_else(|| invalid("remote URL must not be empty"))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(invalid("remote URL must include http:// or https://"))
    }
}
