//! Rate-governed HTTP client for the catalog API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{CatalogError, CatalogItem, ContentKind, SearchResponse, VersionDetail};
use crate::config::ApiConfig;
use crate::governor::RateGovernor;
use crate::user_agent;

/// Connect timeout for catalog requests; the overall per-request timeout
/// comes from configuration.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Source of "latest version" lookups used by item filters.
///
/// [`CatalogClient`] is the production implementation; the seam lets filter
/// logic be exercised without a network.
#[async_trait]
pub trait VersionLookup: Send + Sync {
    /// Returns the most recent version of `project_id`, or `None` when the
    /// project has no versions.
    async fn latest_version(&self, project_id: &str)
    -> Result<Option<VersionDetail>, CatalogError>;
}

/// Client for the catalog's search and version endpoints.
///
/// Every request waits on the shared [`RateGovernor`] immediately before it
/// is sent. No request is retried; callers decide what a failure means.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    page_size: u32,
    auth_token: Option<String>,
    governor: Arc<RateGovernor>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("authenticated", &self.auth_token.is_some())
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Builds a client from API settings and a shared governor.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidUrl`] if the base URL does not parse,
    /// or [`CatalogError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(skip_all, fields(base_url = %api.base_url))]
    pub fn new(api: &ApiConfig, governor: Arc<RateGovernor>) -> Result<Self, CatalogError> {
        let base_url = api.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|_| CatalogError::InvalidUrl {
            url: api.base_url.clone(),
        })?;

        let client = Client::builder()
            .user_agent(user_agent::default_user_agent())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(api.timeout_secs))
            .gzip(true)
            .build()
            .map_err(CatalogError::ClientBuild)?;

        debug!(page_size = api.page_size, "catalog client ready");

        Ok(Self {
            client,
            base_url,
            page_size: api.page_size,
            auth_token: api.auth_token.clone().filter(|token| !token.is_empty()),
            governor,
        })
    }

    /// Returns the configured page size.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetches one page of catalog items of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Api`] for non-2xx responses and transport or
    /// decode errors otherwise.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn list_page(
        &self,
        kind: ContentKind,
        page: u32,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        let offset = u64::from(page) * u64::from(self.page_size);
        let mut url = self.endpoint("/search")?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("facets", &kind.facets());

        let response: SearchResponse = self.get_json(url).await?;
        debug!(hits = response.hits.len(), "fetched catalog page");
        Ok(response.hits)
    }

    /// Fetches the most recent version of a project.
    ///
    /// The endpoint lists versions newest first; the head is returned, or
    /// `None` if the list is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Api`] for non-2xx responses and transport or
    /// decode errors otherwise.
    #[instrument(skip(self))]
    pub async fn latest_version(
        &self,
        project_id: &str,
    ) -> Result<Option<VersionDetail>, CatalogError> {
        let url = self.endpoint(&format!(
            "/project/{}/version",
            urlencoding::encode(project_id)
        ))?;
        let versions: Vec<VersionDetail> = self.get_json(url).await?;
        Ok(versions.into_iter().next())
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogError> {
        let raw = format!("{}{path}", self.base_url);
        Url::parse(&raw).map_err(|_| CatalogError::InvalidUrl { url: raw })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        self.governor.wait().await;

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::transport(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(url = %url, status = status.as_u16(), "catalog API returned error status");
            return Err(CatalogError::api(url.as_str(), status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::transport(url.as_str(), e))
    }
}

#[async_trait]
impl VersionLookup for CatalogClient {
    async fn latest_version(
        &self,
        project_id: &str,
    ) -> Result<Option<VersionDetail>, CatalogError> {
        CatalogClient::latest_version(self, project_id).await
    }
}
