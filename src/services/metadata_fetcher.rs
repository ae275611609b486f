//! Page metadata fetcher for linkshelf.
//!
//! Fetches a page and scans it for OpenGraph and classic meta tags to prefill
//! a bookmark's title, description and preview image. Failures are logged and
//! reported as empty metadata; they never block bookmark creation.

use async_trait::async_trait;

use crate::types::metadata::PageMetadata;

#[cfg(feature = "network")]
use crate::types::errors::MetadataError;
#[cfg(feature = "network")]
use crate::types::settings::MetadataSettings;

/// Most of a page the fetcher will read. Metadata lives in `<head>`.
pub const MAX_BODY_BYTES: usize = 512 * 1024;

/// Trait defining the metadata lookup used when adding bookmarks.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Best-effort metadata for `url`. Never fails; missing data is `None`.
    async fn fetch(&self, url: &str) -> PageMetadata;
}

/// Fetcher that never touches the network. Used when metadata lookup is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetadataFetcher;

#[async_trait]
impl MetadataFetcher for NoopMetadataFetcher {
    async fn fetch(&self, _url: &str) -> PageMetadata {
        PageMetadata::default()
    }
}

/// HTTP fetcher backed by `reqwest`.
#[cfg(feature = "network")]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "network")]
impl HttpMetadataFetcher {
    /// Builds a client with the configured User-Agent and timeout.
    pub fn new(settings: &MetadataSettings) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?;
        Ok(Self { client })
    }

    async fn try_fetch(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(MetadataError::UnsupportedUrl(url.to_string()));
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::HttpStatus(status.as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?
        {
            if !append_capped(&mut body, &chunk, MAX_BODY_BYTES) {
                tracing::debug!(url, bytes = body.len(), "page truncated for metadata scan");
                break;
            }
        }
        Ok(extract_metadata(&String::from_utf8_lossy(&body)))
    }
}

#[cfg(feature = "network")]
#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> PageMetadata {
        match self.try_fetch(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(url, error = %e, "metadata fetch failed, continuing without it");
                PageMetadata::default()
            }
        }
    }
}

/// Appends `chunk` to `body` without letting it grow past `limit` bytes.
///
/// Returns `false` once the limit is reached or the head has been closed,
/// i.e. when reading further would not change the metadata.
pub fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(body.len());
    let take = chunk.len().min(room);
    body.extend_from_slice(&chunk[..take]);
    if body.len() >= limit {
        return false;
    }
    !contains_ignore_case(body, b"</head>")
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

/// Extracts title, description and image from raw HTML.
///
/// - title: `og:title`, else `<title>`
/// - description: `og:description`, else `<meta name="description">`
/// - image: `og:image`
pub fn extract_metadata(html: &str) -> PageMetadata {
    let metas = meta_tags(html);
    let find = |key: &str| -> Option<String> {
        metas
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    };

    let title = find("og:title").or_else(|| title_tag(html));
    let description = find("og:description").or_else(|| find("description"));
    let image = find("og:image");

    PageMetadata {
        title: non_empty(title),
        description: non_empty(description),
        image: non_empty(image),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| decode_entities(v.trim()))
        .filter(|v| !v.is_empty())
}

/// Collects `(property-or-name, content)` pairs of every `<meta>` tag.
fn meta_tags(html: &str) -> Vec<(String, String)> {
    let lower = html.to_ascii_lowercase();
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = lower[cursor..].find("<meta") {
        let start = cursor + rel;
        let end = match lower[start..].find('>') {
            Some(e) => start + e,
            None => break,
        };
        let tag = &html[start + "<meta".len()..end];
        let attrs = attributes(tag);
        let key = attrs
            .iter()
            .find(|(n, _)| n == "property" || n == "name")
            .map(|(_, v)| v.clone());
        let content = attrs
            .iter()
            .find(|(n, _)| n == "content")
            .map(|(_, v)| v.clone());
        if let (Some(key), Some(content)) = (key, content) {
            found.push((key, content));
        }
        cursor = end + 1;
    }
    found
}

/// Parses `name="value"` / `name='value'` pairs. Names are lowercased.
fn attributes(tag: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let bytes = tag.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name = tag[name_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let value = match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let value_start = i + 1;
                let value_end = tag[value_start..]
                    .find(quote as char)
                    .map(|e| value_start + e)
                    .unwrap_or(tag.len());
                i = value_end + 1;
                &tag[value_start..value_end]
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &tag[value_start..i]
            }
        };
        if !name.is_empty() {
            attrs.push((name, value.to_string()));
        }
    }
    attrs
}

fn title_tag(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title>")?;
    Some(html[content_start..content_end].to_string())
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
