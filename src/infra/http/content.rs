//! Read-only content endpoints backed by the active provider's client.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::client::{CmsClient, ContentError};
use crate::domain::{
    Author, BlogPost, Category, Collection, ContentQuery, Navigation, OrderDirection, Page,
    SearchHit, SearchType, SiteConfig, Tag,
};

use super::HttpState;
use super::error::ApiError;

const FILTER_PREFIX: &str = "filter.";

/// Parse listing parameters: `limit`, `offset`, `orderBy`,
/// `orderDirection`, `search`, `include` (comma list) and
/// `filter.<field>=<value>`. Unknown keys are ignored.
pub fn parse_content_query(params: &[(String, String)]) -> Result<ContentQuery, ApiError> {
    let mut query = ContentQuery::new();
    for (key, value) in params {
        let value = value.trim();
        match key.as_str() {
            "limit" => query.limit = Some(parse_number("limit", value)?),
            "offset" => query.offset = Some(parse_number("offset", value)?),
            "orderBy" if !value.is_empty() => query.order_by = Some(value.to_string()),
            "orderDirection" => {
                query.order_direction = Some(match value.to_ascii_lowercase().as_str() {
                    "asc" => OrderDirection::Asc,
                    "desc" => OrderDirection::Desc,
                    _ => {
                        return Err(ApiError::bad_request(
                            "Invalid order direction",
                            Some("use `asc` or `desc`".to_string()),
                        ));
                    }
                })
            }
            "search" if !value.is_empty() => query.search = Some(value.to_string()),
            "include" => query.include.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .map(str::to_string),
            ),
            other => match other.strip_prefix(FILTER_PREFIX) {
                Some(field) if !field.is_empty() && !value.is_empty() => {
                    query.filters.insert(field.to_string(), value.to_string());
                }
                _ => {}
            },
        }
    }
    Ok(query)
}

fn parse_number(key: &str, value: &str) -> Result<u32, ApiError> {
    value.parse::<u32>().map_err(|_| {
        ApiError::bad_request(
            "Invalid pagination parameter",
            Some(format!("`{key}` must be a non-negative integer")),
        )
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: &'static str,
    pub preview: bool,
    pub cache_entries: usize,
}

pub async fn healthz(State(state): State<HttpState>) -> Result<Json<HealthResponse>, ApiError> {
    let client = state.client()?;
    Ok(Json(HealthResponse {
        status: "ok",
        provider: client.provider().as_str(),
        preview: client.is_preview(),
        cache_entries: client.cache().len(),
    }))
}

async fn listing<T, F, Fut>(
    state: &HttpState,
    params: &[(String, String)],
    fetch: F,
) -> Result<Json<Collection<T>>, ApiError>
where
    F: FnOnce(Arc<CmsClient>, ContentQuery) -> Fut,
    Fut: Future<Output = Result<Collection<T>, ContentError>>,
{
    let query = parse_content_query(params)?;
    let client = state.client()?;
    Ok(Json(fetch(client, query).await?))
}

pub async fn list_pages(
    State(state): State<HttpState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Collection<Page>>, ApiError> {
    listing(&state, &params, |client, query| async move {
        client.get_pages(&query).await
    })
    .await
}

pub async fn get_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<Page>, ApiError> {
    Ok(Json(state.client()?.get_page(&slug).await?))
}

pub async fn list_posts(
    State(state): State<HttpState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Collection<BlogPost>>, ApiError> {
    listing(&state, &params, |client, query| async move {
        client.get_blog_posts(&query).await
    })
    .await
}

pub async fn get_post(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.client()?.get_blog_post(&slug).await?))
}

pub async fn list_authors(
    State(state): State<HttpState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Collection<Author>>, ApiError> {
    listing(&state, &params, |client, query| async move {
        client.get_authors(&query).await
    })
    .await
}

pub async fn get_author(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<Author>, ApiError> {
    Ok(Json(state.client()?.get_author(&slug).await?))
}

pub async fn list_categories(
    State(state): State<HttpState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Collection<Category>>, ApiError> {
    listing(&state, &params, |client, query| async move {
        client.get_categories(&query).await
    })
    .await
}

pub async fn get_category(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.client()?.get_category(&slug).await?))
}

pub async fn list_tags(
    State(state): State<HttpState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Collection<Tag>>, ApiError> {
    listing(&state, &params, |client, query| async move {
        client.get_tags(&query).await
    })
    .await
}

pub async fn get_navigation(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Navigation>, ApiError> {
    Ok(Json(state.client()?.get_navigation(&id).await?))
}

pub async fn get_site_config(
    State(state): State<HttpState>,
) -> Result<Json<SiteConfig>, ApiError> {
    Ok(Json(state.client()?.get_site_config().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

pub async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Collection<SearchHit>>, ApiError> {
    let scope = match params.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(kind) => Some(kind.parse::<SearchType>().map_err(|err| {
            ApiError::bad_request("Invalid search type", Some(err.to_string()))
        })?),
    };
    Ok(Json(state.client()?.search(&params.q, scope).await?))
}
