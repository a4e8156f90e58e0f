//! Manifest proxy client
//!
//! The platform never exposes raw manifest URLs: the player derives a set of
//! content identifiers from the course video URL and asks the manifest proxy
//! for a JSON body carrying the manifest document and the format list. The
//! document is handed to the engine through a temporary blob resource, so the
//! proxy response is the only network round trip per source change.

use crate::{
    error::Error,
    types::FormatItem,
    Result,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Identifiers extracted from a course video URL, addressed to the proxy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxyRequest {
    /// Content identifier, the last non-empty path segment
    pub content_id: String,
    /// Optional part identifier from the `part` query parameter
    pub part: Option<String>,
    /// Optional sub-identifier from the `sub` query parameter
    pub sub: Option<String>,
}

impl ProxyRequest {
    /// Derive proxy identifiers from a course video URL.
    ///
    /// Malformed URLs fall back to a plain string-split parse; derivation
    /// never fails, an empty content id is the degenerate result.
    pub fn derive(source_url: &str) -> Self {
        match Url::parse(source_url) {
            Ok(url) => {
                let content_id = url
                    .path_segments()
                    .and_then(|segments| {
                        segments.filter(|s| !s.is_empty()).next_back()
                    })
                    .unwrap_or("")
                    .to_string();

                let mut request = Self {
                    content_id,
                    ..Self::default()
                };
                for (key, value) in url.query_pairs() {
                    match key.as_ref() {
                        "part" => request.part = Some(value.into_owned()),
                        "sub" => request.sub = Some(value.into_owned()),
                        _ => {}
                    }
                }
                request
            }
            Err(_) => Self::derive_fallback(source_url),
        }
    }

    /// String-split parse for URLs the URL parser rejects
    fn derive_fallback(raw: &str) -> Self {
        let (path, query) = raw.split_once('?').unwrap_or((raw, ""));

        let content_id = path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("")
            .to_string();

        let mut request = Self {
            content_id,
            ..Self::default()
        };
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                match key {
                    "part" => request.part = Some(value.to_string()),
                    "sub" => request.sub = Some(value.to_string()),
                    _ => {}
                }
            }
        }
        request
    }
}

/// Proxy response body: the manifest document plus the formats it covers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResponse {
    pub manifest: String,
    #[serde(default)]
    pub formats: Vec<FormatItem>,
}

impl ManifestResponse {
    /// Decode a proxy response body from raw JSON
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::ManifestDecode(e.to_string()))
    }
}

/// Trait for manifest proxy clients
#[async_trait]
pub trait ManifestApi: Send + Sync {
    /// Fetch the manifest document and format list for the given identifiers
    async fn fetch(&self, request: &ProxyRequest) -> Result<ManifestResponse>;
}

/// Manifest proxy client over HTTP
pub struct HttpManifestApi {
    client: Client,
    endpoint: Url,
}

impl HttpManifestApi {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            endpoint,
        }
    }

    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Build the request URL for the given identifiers
    fn request_url(&self, request: &ProxyRequest) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("content", &request.content_id);
            if let Some(part) = &request.part {
                pairs.append_pair("part", part);
            }
            if let Some(sub) = &request.sub {
                pairs.append_pair("sub", sub);
            }
        }
        url
    }
}

#[async_trait]
impl ManifestApi for HttpManifestApi {
    #[instrument(skip(self))]
    async fn fetch(&self, request: &ProxyRequest) -> Result<ManifestResponse> {
        let url = self.request_url(request);
        debug!(url = %url, "Requesting manifest");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        let body: ManifestResponse = response
            .json()
            .await
            .map_err(|e| Error::ManifestDecode(e.to_string()))?;

        debug!(
            formats = body.formats.len(),
            manifest_bytes = body.manifest.len(),
            "Manifest received"
        );

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_from_well_formed_url() {
        let request =
            ProxyRequest::derive("https://aula.example.com/course/watch/4711?part=2&sub=en");

        assert_eq!(request.content_id, "4711");
        assert_eq!(request.part.as_deref(), Some("2"));
        assert_eq!(request.sub.as_deref(), Some("en"));
    }

    #[test]
    fn test_derive_ignores_trailing_slash() {
        let request = ProxyRequest::derive("https://aula.example.com/course/watch/4711/");
        assert_eq!(request.content_id, "4711");
        assert_eq!(request.part, None);
    }

    #[test]
    fn test_derive_from_malformed_url() {
        // No scheme: the URL parser rejects this, the fallback parse applies
        let request = ProxyRequest::derive("aula.example.com/watch/4711?part=3");

        assert_eq!(request.content_id, "4711");
        assert_eq!(request.part.as_deref(), Some("3"));
        assert_eq!(request.sub, None);
    }

    #[test]
    fn test_derive_degenerate_input() {
        let request = ProxyRequest::derive("");
        assert_eq!(request.content_id, "");

        let request = ProxyRequest::derive("???");
        assert_eq!(request.content_id, "");
    }

    #[test]
    fn test_manifest_response_from_json() {
        let body = r#"{
            "manifest": "<MPD></MPD>",
            "formats": [
                {"id": 5, "label": "720p", "codec": "avc1.64001f"},
                {"id": 50, "label": "1080p"}
            ]
        }"#;

        let response = ManifestResponse::from_json(body).unwrap();
        assert_eq!(response.manifest, "<MPD></MPD>");
        assert_eq!(response.formats.len(), 2);
        assert_eq!(response.formats[0].codec.as_deref(), Some("avc1.64001f"));
        assert!(response.formats[1].codec.is_none());
    }

    #[test]
    fn test_manifest_response_missing_formats() {
        let response = ManifestResponse::from_json(r#"{"manifest": "<MPD/>"}"#).unwrap();
        assert!(response.formats.is_empty());

        assert!(ManifestResponse::from_json("not json").is_err());
    }

    #[test]
    fn test_request_url_parameters() {
        let api = HttpManifestApi::new(
            Url::parse("https://proxy.aula.example.com/api/manifest").unwrap(),
            Duration::from_secs(10),
        );
        let url = api.request_url(&ProxyRequest {
            content_id: "4711".to_string(),
            part: Some("2".to_string()),
            sub: None,
        });

        assert_eq!(
            url.as_str(),
            "https://proxy.aula.example.com/api/manifest?content=4711&part=2"
        );
    }
}
