//! HTTP binding of the cloud security assets endpoints

use super::types::{AssetSource, SearchPage, SearchRequest};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::types::{PaginationCursor, ResourceId, ResourceRecord};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Identifier search endpoint (cursor paginated)
pub const SEARCH_PATH: &str = "/cloud-security-assets/queries/resources/v1";

/// Detail retrieval endpoint (batched by `ids`)
pub const DETAIL_PATH: &str = "/cloud-security-assets/entities/resources/v1";

/// Cloud security assets API over the resilient HTTP client
#[derive(Debug)]
pub struct AssetsApi {
    client: HttpClient,
}

impl AssetsApi {
    /// Wrap a configured client (base URL and auth already set)
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Connectivity probe: one unfiltered search for up to 10 identifiers
    pub async fn check(&self) -> Result<SearchPage> {
        self.search(SearchRequest {
            filter: None,
            limit: 10,
            after: None,
        })
        .await
    }
}

#[async_trait]
impl AssetSource for AssetsApi {
    async fn search(&self, request: SearchRequest<'_>) -> Result<SearchPage> {
        let mut config = RequestConfig::new().query("limit", request.limit.to_string());
        if let Some(filter) = request.filter {
            config = config.query("filter", filter);
        }
        if let Some(after) = request.after {
            config = config.query("after", after.as_param());
        }

        let body = self.client.get_json(SEARCH_PATH, config).await?;
        let response: QueryResponse = parse_body(body, "search")?;
        response.log_errors("search");

        let next = response
            .meta
            .next
            .or(response.meta.pagination.next)
            .and_then(PaginationCursor::issued);

        let page = SearchPage {
            ids: response.resources.unwrap_or_default(),
            next,
            total: response.meta.pagination.total,
        };
        debug!(
            "Search returned {} ids (cursor: {})",
            page.ids.len(),
            if page.next.is_some() { "yes" } else { "no" }
        );
        Ok(page)
    }

    async fn fetch(&self, ids: &[ResourceId]) -> Result<Vec<ResourceRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let config = RequestConfig::new().query_repeated("ids", ids.iter().map(ResourceId::as_str));
        let body = self.client.get_json(DETAIL_PATH, config).await?;
        let response: EntityResponse = parse_body(body, "detail")?;
        response.log_errors("detail");

        Ok(response.resources.unwrap_or_default())
    }

    fn calls_made(&self) -> u64 {
        self.client.calls_made()
    }
}

fn parse_body<T: DeserializeOwned>(body: Value, endpoint: &str) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| Error::decode(format!("Unexpected {endpoint} response shape: {e}")))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    resources: Option<Vec<ResourceId>>,
    #[serde(default)]
    meta: QueryMeta,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryMeta {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    pagination: QueryPagination,
}

#[derive(Debug, Default, Deserialize)]
struct QueryPagination {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntityResponse {
    #[serde(default)]
    resources: Option<Vec<ResourceRecord>>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

trait ApiErrors {
    fn errors(&self) -> &[Value];

    fn log_errors(&self, endpoint: &str) {
        let errors = self.errors();
        if !errors.is_empty() {
            warn!("{endpoint} response carried {} error entries: {errors:?}", errors.len());
        }
    }
}

impl ApiErrors for QueryResponse {
    fn errors(&self) -> &[Value] {
        self.errors.as_deref().unwrap_or_default()
    }
}

impl ApiErrors for EntityResponse {
    fn errors(&self) -> &[Value] {
        self.errors.as_deref().unwrap_or_default()
    }
}
