//! Bing Maps aerial imagery source.
//!
//! Discovery asks the Bing REST metadata service for the tile URL
//! template and subdomain once; fetching substitutes a tile's quadkey
//! into that template and returns the raw image bytes. With no access
//! key configured there simply is no imagery source, which callers
//! treat as "masks only".

use std::time::Duration;

use log::warn;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::{ClientBuildError, DEFAULT_USER_AGENT};

/// Bing imagery metadata endpoint for the aerial layer.
const METADATA_URL: &str = "https://dev.virtualearth.net/REST/V1/Imagery/Metadata/Aerial";

/// Client-side request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Synchronous source of aerial imagery tiles addressed by quadkey.
pub trait ImagerySource {
    /// Raw image bytes for the tile with the given quadkey.
    fn fetch_tile(&self, quadkey: &str) -> Result<Vec<u8>, ImageryError>;
}

/// Errors surfaced by an [`ImagerySource`].
#[derive(Debug, Error)]
pub enum ImageryError {
    /// Building the HTTP client or runtime failed.
    #[error(transparent)]
    Build(#[from] ClientBuildError),
    /// The imagery service answered with an unexpected status.
    #[error("imagery request failed with status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },
    /// The request could not be completed.
    #[error("imagery transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Bing Maps tile fetcher bound to one discovered URL template.
pub struct BingImagery {
    client: Client,
    runtime: Runtime,
    template: String,
    subdomain: String,
}

impl std::fmt::Debug for BingImagery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BingImagery")
            .field("template", &self.template)
            .field("subdomain", &self.subdomain)
            .finish_non_exhaustive()
    }
}

impl BingImagery {
    /// Discovers the tile URL template for an access key.
    ///
    /// Returns `Ok(None)` when the key is empty or the metadata holds
    /// no usable template; both mean the run proceeds without imagery.
    pub fn discover(key: &str) -> Result<Option<Self>, ImageryError> {
        if key.is_empty() {
            return Ok(None);
        }

        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| ImageryError::Build(ClientBuildError::HttpClient(err)))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ImageryError::Build(ClientBuildError::Runtime(err)))?;

        let metadata = runtime.block_on(async {
            let response = client
                .get(METADATA_URL)
                .query(&[("key", key)])
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ImageryError::Http {
                    status: status.as_u16(),
                });
            }
            let metadata: Metadata = response.json().await?;
            Ok(metadata)
        })?;

        match first_resource(metadata) {
            Some((template, subdomain)) => Ok(Some(Self {
                client,
                runtime,
                template,
                subdomain,
            })),
            None => {
                warn!("imagery metadata held no tile URL template; continuing without imagery");
                Ok(None)
            }
        }
    }

    /// The concrete tile URL for a quadkey.
    pub fn tile_url(&self, quadkey: &str) -> String {
        substitute(&self.template, &self.subdomain, quadkey)
    }
}

impl ImagerySource for BingImagery {
    fn fetch_tile(&self, quadkey: &str) -> Result<Vec<u8>, ImageryError> {
        let url = self.tile_url(quadkey);
        self.runtime.block_on(async {
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ImageryError::Http {
                    status: status.as_u16(),
                });
            }
            Ok(response.bytes().await?.to_vec())
        })
    }
}

/// Fills the `{subdomain}` and `{quadkey}` placeholders of a Bing tile
/// URL template.
fn substitute(template: &str, subdomain: &str, quadkey: &str) -> String {
    template
        .replace("{subdomain}", subdomain)
        .replace("{quadkey}", quadkey)
}

/// Template and first subdomain from the metadata document, if present.
fn first_resource(metadata: Metadata) -> Option<(String, String)> {
    let resource = metadata
        .resource_sets
        .into_iter()
        .next()?
        .resources
        .into_iter()
        .next()?;
    let template = resource.image_url?;
    let subdomain = resource.subdomains.into_iter().next()?;
    Some((template, subdomain))
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "resourceSets", default)]
    resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Deserialize)]
struct ResourceSet {
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize, Default)]
struct Resource {
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(rename = "imageUrlSubdomains", default)]
    subdomains: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const METADATA: &str = r#"{
        "resourceSets": [{
            "resources": [{
                "imageUrl": "https://ecn.{subdomain}.tiles.virtualearth.net/tiles/a{quadkey}.jpeg?g=1",
                "imageUrlSubdomains": ["t0", "t1", "t2", "t3"]
            }]
        }]
    }"#;

    #[test]
    fn first_resource_extracts_template_and_subdomain() {
        let metadata: Metadata = serde_json::from_str(METADATA).unwrap();
        let (template, subdomain) = first_resource(metadata).unwrap();
        assert!(template.contains("{quadkey}"));
        assert_eq!(subdomain, "t0");
    }

    #[rstest]
    #[case("t1", "120202", "https://ecn.t1.tiles.virtualearth.net/tiles/a120202.jpeg?g=1")]
    #[case("t0", "3", "https://ecn.t0.tiles.virtualearth.net/tiles/a3.jpeg?g=1")]
    fn substitute_fills_both_placeholders(
        #[case] subdomain: &str,
        #[case] quadkey: &str,
        #[case] expected: &str,
    ) {
        let url = substitute(
            "https://ecn.{subdomain}.tiles.virtualearth.net/tiles/a{quadkey}.jpeg?g=1",
            subdomain,
            quadkey,
        );
        assert_eq!(url, expected);
    }

    #[test]
    fn empty_metadata_yields_no_source() {
        let metadata: Metadata = serde_json::from_str(r#"{"resourceSets": []}"#).unwrap();
        assert!(first_resource(metadata).is_none());
    }
}
