//! Remote catalog access.
//!
//! The catalog is a hierarchical drive exposed over a Graph-style REST API.
//! This module provides:
//! - [`CatalogItem`], the immutable record built from every listing response
//! - the [`Catalog`] trait, the seam the sync coordinator and front ends use
//! - [`GraphCatalogClient`], a blocking `reqwest` implementation
//! - listing helpers (`list_all_children`, `sort_for_display`)
//!
//! # Example
//!
//! ```rust,ignore
//! use drivetune_core::catalog::{Catalog, CatalogConfig, GraphCatalogClient};
//!
//! let client = GraphCatalogClient::new(&CatalogConfig::default())?;
//! let page = client.list_children(&token, None)?;
//! for item in page.items {
//!     println!("{}", item.name);
//! }
//! ```

use std::cmp::Ordering;
use std::io::Write;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AuthError, CatalogError, Error, Result};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default number of items requested per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// File extensions treated as audio when a file carries no MIME type.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "flac", "ogg", "opus", "aiff"];

/// Kind of catalog node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    /// A folder, optionally with the number of children reported by the server.
    Folder {
        /// Child count, when the server includes it.
        child_count: Option<u64>,
    },
    /// A file.
    File {
        /// MIME type, when the server includes it.
        mime_type: Option<String>,
    },
}

/// One node of the remote hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable identifier assigned by the remote system.
    pub id: String,
    /// Display name; also the local cache key.
    pub name: String,
    /// Folder or file.
    pub kind: ItemKind,
    /// Browser link for out-of-band viewing.
    pub web_url: Option<String>,
}

impl CatalogItem {
    /// Build a folder item.
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Folder { child_count: None },
            web_url: None,
        }
    }

    /// Build a file item.
    pub fn file(id: impl Into<String>, name: impl Into<String>, mime_type: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::File {
                mime_type: mime_type.map(str::to_string),
            },
            web_url: None,
        }
    }

    /// Whether this item is a folder.
    pub const fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder { .. })
    }

    /// Whether this item is a file.
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }

    /// MIME type of a file item.
    pub fn mime_type(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File { mime_type } => mime_type.as_deref(),
            ItemKind::Folder { .. } => None,
        }
    }

    /// Whether this is an audio file.
    ///
    /// Uses the `audio/` MIME prefix; files without a MIME type fall back to
    /// the name's extension.
    pub fn is_audio(&self) -> bool {
        match &self.kind {
            ItemKind::Folder { .. } => false,
            ItemKind::File {
                mime_type: Some(mime),
            } => mime.to_ascii_lowercase().starts_with("audio/"),
            ItemKind::File { mime_type: None } => has_audio_extension(&self.name),
        }
    }
}

/// Check a file name against the known audio extensions.
pub fn has_audio_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Items on this page.
    pub items: Vec<CatalogItem>,
    /// Link to the next page, if the server reported one.
    pub next_link: Option<String>,
}

/// Catalog client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// API base URL without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Items per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

const fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Remote catalog trait for testability.
pub trait Catalog: Send + Sync {
    /// List one page of children of `folder_id` (`None` = drive root).
    ///
    /// # Errors
    ///
    /// Returns an auth error if the token is rejected, a network error on
    /// transport failure, or a decode error on a malformed response.
    fn list_children(&self, token: &str, folder_id: Option<&str>) -> Result<ListingPage>;

    /// Fetch the page behind an `@odata.nextLink`.
    fn next_page(&self, token: &str, next_link: &str) -> Result<ListingPage>;

    /// Resolve a pre-authenticated download URL for a file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoDownloadUrl`] when the response carries no locator.
    fn download_locator(&self, token: &str, item_id: &str) -> Result<String>;

    /// Stream the content behind a download locator into `sink`.
    ///
    /// Returns the number of bytes written.
    fn fetch_content(&self, locator: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// Fetch every page of a folder listing.
///
/// # Errors
///
/// Fails on the first page that fails; pages already fetched are discarded.
pub fn list_all_children<C: Catalog + ?Sized>(
    catalog: &C,
    token: &str,
    folder_id: Option<&str>,
) -> Result<Vec<CatalogItem>> {
    let mut page = catalog.list_children(token, folder_id)?;
    let mut items = std::mem::take(&mut page.items);
    let mut pages = 1usize;

    while let Some(link) = page.next_link.take() {
        page = catalog.next_page(token, &link)?;
        items.append(&mut page.items);
        pages += 1;
    }

    debug!(
        "Listed {} item(s) across {} page(s) for folder {}",
        items.len(),
        pages,
        folder_id.unwrap_or("root")
    );
    Ok(items)
}

/// Sort a listing the way it is presented: folders first, then by name
/// (case-insensitive).
pub fn sort_for_display(items: &mut [CatalogItem]) {
    items.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    });
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    value: Vec<WireItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    id: String,
    name: String,
    folder: Option<WireFolder>,
    file: Option<WireFile>,
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFolder {
    child_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocatorResponse {
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

impl From<WireItem> for CatalogItem {
    fn from(wire: WireItem) -> Self {
        let kind = match (wire.folder, wire.file) {
            (Some(folder), _) => ItemKind::Folder {
                child_count: folder.child_count,
            },
            (None, Some(file)) => ItemKind::File {
                mime_type: file.mime_type,
            },
            (None, None) => ItemKind::File { mime_type: None },
        };
        Self {
            id: wire.id,
            name: wire.name,
            kind,
            web_url: wire.web_url,
        }
    }
}

impl From<ListingResponse> for ListingPage {
    fn from(resp: ListingResponse) -> Self {
        Self {
            items: resp.value.into_iter().map(CatalogItem::from).collect(),
            next_link: resp.next_link,
        }
    }
}

/// Decode a listing response body.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] if the body is not a valid listing.
pub fn parse_listing(body: &str) -> Result<ListingPage> {
    decode::<ListingResponse>(body, "folder listing").map(ListingPage::from)
}

/// Decode a download-locator response body.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] on malformed JSON and
/// [`CatalogError::NoDownloadUrl`] when the locator field is absent.
pub fn parse_download_locator(body: &str, item_id: &str) -> Result<String> {
    decode::<LocatorResponse>(body, "download locator")?
        .download_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            Error::Catalog(CatalogError::NoDownloadUrl {
                item_id: item_id.to_string(),
            })
        })
}

fn decode<T: DeserializeOwned>(body: &str, context: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        Error::Catalog(CatalogError::Decode {
            context: context.to_string(),
            reason: e.to_string(),
        })
    })
}

// =============================================================================
// HTTP client
// =============================================================================

/// Blocking Graph API client.
#[derive(Debug, Clone)]
pub struct GraphCatalogClient {
    http: Client,
    base_url: String,
    page_size: u32,
}

impl GraphCatalogClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))?;

        info!("Catalog client targeting {}", config.base_url);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.max(1),
        })
    }

    /// URL for the children of a folder.
    fn children_url(&self, folder_id: Option<&str>) -> String {
        let path = folder_id.map_or_else(
            || "/me/drive/root/children".to_string(),
            |id| format!("/me/drive/items/{id}/children"),
        );
        format!(
            "{}{}?$select=id,name,folder,file,webUrl&$top={}",
            self.base_url, path, self.page_size
        )
    }

    /// URL for the download locator of an item.
    fn locator_url(&self, item_id: &str) -> String {
        format!(
            "{}/me/drive/items/{}?$select=id,@microsoft.graph.downloadUrl",
            self.base_url, item_id
        )
    }

    fn get_authorized(&self, url: &str, token: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .map_err(|e| network_error(url, &e))?;
        let response = check_status(url, response)?;
        response.text().map_err(|e| network_error(url, &e))
    }
}

fn network_error(url: &str, e: &reqwest::Error) -> Error {
    Error::Catalog(CatalogError::Network {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Map an HTTP status onto the error taxonomy.
fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    warn!("Request to {} failed with HTTP {}", url, status);
    Err(status_error(url, status))
}

fn status_error(url: &str, status: StatusCode) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(AuthError::Rejected {
            status: status.as_u16(),
        }),
        StatusCode::NOT_FOUND => Error::Catalog(CatalogError::NotFound {
            resource: url.to_string(),
        }),
        _ => Error::Catalog(CatalogError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }),
    }
}

impl Catalog for GraphCatalogClient {
    fn list_children(&self, token: &str, folder_id: Option<&str>) -> Result<ListingPage> {
        let url = self.children_url(folder_id);
        let body = self.get_authorized(&url, token)?;
        parse_listing(&body)
    }

    fn next_page(&self, token: &str, next_link: &str) -> Result<ListingPage> {
        let body = self.get_authorized(next_link, token)?;
        parse_listing(&body)
    }

    fn download_locator(&self, token: &str, item_id: &str) -> Result<String> {
        let url = self.locator_url(item_id);
        let body = self.get_authorized(&url, token)?;
        parse_download_locator(&body, item_id)
    }

    fn fetch_content(&self, locator: &str, sink: &mut dyn Write) -> Result<u64> {
        // Download URLs are pre-authenticated; no bearer token is sent.
        let response = self
            .http
            .get(locator)
            .send()
            .map_err(|e| network_error(locator, &e))?;
        let mut response = check_status(locator, response)?;
        let bytes = response
            .copy_to(sink)
            .map_err(|e| network_error(locator, &e))?;
        debug!("Fetched {} byte(s)", bytes);
        Ok(bytes)
    }
}
