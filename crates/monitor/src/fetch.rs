//! Remote feed of advertisers with failing sources.
//!
//! The HTTP response is parsed leniently: every field is optional and may
//! carry any JSON type. [`normalize`] then keeps only flagged sources
//! (fetching enabled and a non-null `sync_failed_at`) and drops advertisers
//! left with none.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::Value;
use sourcewatch_core::{Advertiser, ApiConfig, Snapshot, Source};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

const UNKNOWN_ADVERTISER: &str = "Unknown Advertiser";
const UNKNOWN_SOURCE: &str = "Unknown source";
const UNKNOWN_TYPE: &str = "Unknown type";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header {name}: {message}")]
    Header { name: String, message: String },
}

/// Source of the current flagged state.
#[async_trait::async_trait]
pub trait FailureFeed: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

// ── Wire records ──────────────────────────────────────────────

/// One page of the advertisers-with-errors endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub data: Option<Vec<FeedAdvertiser>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedAdvertiser {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub sources: Option<Vec<FeedSource>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedSource {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub source_type: Option<Value>,
    #[serde(default)]
    pub fetching_enabled: Option<Value>,
    #[serde(default)]
    pub sync_failed_at: Option<Value>,
}

impl FeedSource {
    /// Enabled for fetching and currently failing.
    pub fn is_flagged(&self) -> bool {
        self.fetching_enabled.as_ref().is_some_and(truthy)
            && self.sync_failed_at.as_ref().is_some_and(|v| !v.is_null())
    }
}

/// Scalars as strings: numbers and booleans are stringified, null and
/// containers have no string form.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn string_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(scalar_string)
        .unwrap_or_else(|| default.to_string())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Reduce feed records to the flagged-only snapshot view.
///
/// Records without a usable id are skipped. When two records share an
/// advertiser id, a later record with flagged sources replaces the earlier
/// one; a later record without any leaves the earlier entry in place.
pub fn normalize(records: Vec<FeedAdvertiser>) -> Snapshot {
    let mut snapshot = Snapshot::new();

    for record in records {
        let Some(advertiser_id) = record.id.as_ref().and_then(scalar_string) else {
            warn!(name = ?record.name, "advertiser without id, skipping");
            continue;
        };

        let mut advertiser = Advertiser::new(string_or(record.name.as_ref(), UNKNOWN_ADVERTISER));

        for source in record.sources.unwrap_or_default() {
            if !source.is_flagged() {
                continue;
            }
            let Some(source_id) = source.id.as_ref().and_then(scalar_string) else {
                warn!(advertiser_id = %advertiser_id, "flagged source without id, skipping");
                continue;
            };
            advertiser.sources.insert(
                source_id,
                Source {
                    name: string_or(source.name.as_ref(), UNKNOWN_SOURCE),
                    source_type: string_or(source.source_type.as_ref(), UNKNOWN_TYPE),
                    sync_failed_at: source.sync_failed_at.as_ref().map(|v| {
                        scalar_string(v).unwrap_or_else(|| v.to_string())
                    }),
                },
            );
        }

        if advertiser.sources.is_empty() {
            debug!(advertiser_id = %advertiser_id, "no flagged sources");
        } else {
            snapshot.insert(advertiser_id, advertiser);
        }
    }

    snapshot
}

// ── HTTP feed ─────────────────────────────────────────────────

/// Reads the advertisers-with-errors endpoint over HTTP.
#[derive(Debug)]
pub struct HttpFeed {
    client: reqwest::Client,
    endpoint: Url,
    max_pages: u32,
}

impl HttpFeed {
    /// Build a feed client with credential headers and a request timeout.
    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.endpoint_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &config.auth_headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::Header {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let mut header_value = HeaderValue::from_str(value).map_err(|e| FetchError::Header {
                name: name.clone(),
                message: e.to_string(),
            })?;
            header_value.set_sensitive(true);
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            max_pages: config.max_pages.max(1),
        })
    }

    async fn fetch_page(&self, url: Url) -> Result<Vec<FeedAdvertiser>, FetchError> {
        debug!(url = %url, "requesting feed page");
        let resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let page: FeedPage = resp.json().await?;
        Ok(page.data.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl FailureFeed for HttpFeed {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let mut records = Vec::new();

        if self.max_pages == 1 {
            records = self.fetch_page(self.endpoint.clone()).await?;
        } else {
            let first = current_page(&self.endpoint);
            for page in first..first.saturating_add(self.max_pages) {
                let batch = self.fetch_page(with_page(&self.endpoint, page)).await?;
                if batch.is_empty() {
                    break;
                }
                records.extend(batch);
            }
        }

        let fetched = records.len();
        let snapshot = normalize(records);
        info!(
            records = fetched,
            advertisers = snapshot.len(),
            sources = snapshot.source_count(),
            "feed fetched"
        );
        Ok(snapshot)
    }
}

/// The `page` query parameter of `url`, defaulting to 1.
fn current_page(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1)
}

/// `url` with its `page` parameter set to `page`, other parameters untouched.
fn with_page(url: &Url, page: u32) -> Url {
    let page = page.to_string();
    let mut found = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == "page" {
                found = true;
                (k.into_owned(), page.clone())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    let mut out = url.clone();
    {
        let mut query = out.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        if !found {
            query.append_pair("page", &page);
        }
    }
    out
}
