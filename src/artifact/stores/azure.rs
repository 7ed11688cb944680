//! Azure Blob Storage container listing

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::artifact::error::ListingError;
use crate::artifact::lister::{BlobPage, BlobStore};
use crate::artifact::types::BlobEntry;
use crate::config::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STORAGE_ENDPOINT};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Blob store backed by the `comp=list` container REST API
pub struct AzureBlobStore {
    client: reqwest::Client,
    /// Endpoint template, `{account}` is replaced by the storage account
    endpoint: String,
}

impl AzureBlobStore {
    /// Creates a store for the given endpoint template
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ListingError> {
        let client = reqwest::Client::builder()
            .user_agent("artifact-resolver")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_default_endpoint() -> Result<Self, ListingError> {
        Self::new(
            DEFAULT_STORAGE_ENDPOINT,
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }
}

#[async_trait::async_trait]
impl BlobStore for AzureBlobStore {
    fn container_url(&self, account: &str, container: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.replace("{account}", account),
            container
        )
    }

    async fn fetch_page(
        &self,
        container_url: &str,
        prefix: Option<&str>,
        marker: Option<&str>,
    ) -> Result<BlobPage, ListingError> {
        let mut params = vec![("comp", "list"), ("restype", "container")];
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            params.push(("prefix", prefix));
        }
        if let Some(marker) = marker {
            params.push(("marker", marker));
        }
        let url = reqwest::Url::parse_with_params(container_url, &params)
            .map_err(|e| ListingError::InvalidUrl(format!("{}: {}", container_url, e)))?;
        debug!("Fetching listing page: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ListingError::ContainerNotFound(container_url.to_string()));
        }

        if !status.is_success() {
            warn!("Listing returned status {}: {}", status, container_url);
            return Err(ListingError::Status {
                status: status.as_u16(),
                url: container_url.to_string(),
            });
        }

        let body = response.bytes().await?;
        parse_listing(&body)
    }
}

/// Parse an `EnumerationResults` document
pub fn parse_listing(body: &[u8]) -> Result<BlobPage, ListingError> {
    let text = decode_body(body)?;
    let doc = roxmltree::Document::parse(text.trim_start_matches('\u{feff}'))
        .map_err(|e| ListingError::InvalidResponse(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "EnumerationResults" {
        return Err(ListingError::InvalidResponse(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }

    let blobs = match child_element(root, "Blobs") {
        Some(blobs) => blobs
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Blob")
            .map(parse_blob)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(BlobPage {
        blobs,
        next_marker: child_text(root, "NextMarker"),
    })
}

fn parse_blob(blob: roxmltree::Node<'_, '_>) -> Result<BlobEntry, ListingError> {
    let name = child_text(blob, "Name")
        .ok_or_else(|| ListingError::InvalidResponse("blob without <Name>".to_string()))?;
    let last_modified = child_element(blob, "Properties")
        .and_then(|props| child_text(props, "Last-Modified"))
        .ok_or_else(|| {
            ListingError::InvalidResponse(format!("blob {} without <Last-Modified>", name))
        })?;
    let last_modified = DateTime::parse_from_rfc2822(&last_modified)
        .map_err(|e| {
            ListingError::InvalidResponse(format!(
                "blob {} has invalid Last-Modified '{}': {}",
                name, last_modified, e
            ))
        })?
        .with_timezone(&Utc);

    Ok(BlobEntry::new(name, last_modified))
}

/// Strip a UTF-8 or UTF-16 byte order mark and decode the body
fn decode_body(body: &[u8]) -> Result<String, ListingError> {
    if let Some(rest) = body.strip_prefix(UTF8_BOM) {
        return decode_utf8(rest);
    }
    if let Some(rest) = body.strip_prefix(UTF16_LE_BOM) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = body.strip_prefix(UTF16_BE_BOM) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    decode_utf8(body)
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ListingError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ListingError::InvalidResponse(e.to_string()))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, ListingError> {
    if bytes.len() % 2 != 0 {
        return Err(ListingError::InvalidResponse("odd byte length in UTF-16 body".to_string()));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| ListingError::InvalidResponse(e.to_string()))
}

fn child_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
