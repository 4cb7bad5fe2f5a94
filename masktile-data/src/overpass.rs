//! Overpass API vector-data source.
//!
//! Builds an Overpass QL query for a bounding box and tag list, fetches
//! the JSON element stream and resolves it into [`VectorData`]: node
//! references become geodetic coordinates, relation members keep their
//! roles.
//!
//! The [`VectorSource`] trait is synchronous to keep the batch loop
//! simple and sequential; this client bridges to async `reqwest` by
//! blocking on an internally owned current-thread Tokio runtime, the
//! same bridge the rest of the workspace's HTTP collaborators use.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use log::warn;
use masktile_core::{BoundingBox, Node, Relation, RelationMember, TagQuery, Tags, VectorData, Way};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::{ClientBuildError, DEFAULT_USER_AGENT};

/// Default public Overpass endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Server-side query timeout in seconds, embedded in the QL header.
const QUERY_TIMEOUT_SECS: u32 = 50;

/// Client-side request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 90;

/// Synchronous source of raw vector features for a bounding box.
pub trait VectorSource {
    /// Fetches every feature matching any of the queries inside the
    /// bounding box.
    fn fetch(
        &self,
        bbox: &BoundingBox,
        queries: &[TagQuery],
    ) -> Result<VectorData, VectorSourceError>;
}

/// Errors surfaced by a [`VectorSource`].
#[derive(Debug, Error)]
pub enum VectorSourceError {
    /// Upstream asked us to slow down; retry/backoff is the outer
    /// loop's concern, the source itself never retries.
    #[error("vector data source is rate limited")]
    RateLimited,
    /// The endpoint answered with an unexpected status.
    #[error("vector data request failed with status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },
    /// The request could not be completed.
    #[error("vector data transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// The payload was not a valid Overpass JSON document.
    #[error("failed to decode vector data payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for an Overpass interpreter endpoint.
pub struct OverpassClient {
    client: Client,
    endpoint: String,
    runtime: Runtime,
}

impl std::fmt::Debug for OverpassClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverpassClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OverpassClient {
    /// A client against the default public endpoint.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// A client against an explicit interpreter endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(ClientBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientBuildError::Runtime)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            runtime,
        })
    }

    /// Renders the Overpass QL query: one relation and one way clause
    /// per tag, plus the recursion that pulls in every referenced node.
    fn build_query(bbox: &BoundingBox, queries: &[TagQuery]) -> String {
        let bounds = format!(
            "{},{},{},{}",
            bbox.min_lat(),
            bbox.min_lon(),
            bbox.max_lat(),
            bbox.max_lon()
        );
        let mut clauses = String::new();
        for query in queries {
            let filter = match query.value() {
                Some(value) => {
                    format!("[\"{}\"=\"{}\"]", escape(query.key()), escape(value))
                }
                None => format!("[\"{}\"]", escape(query.key())),
            };
            let _ = writeln!(clauses, "  relation{filter}({bounds});");
            let _ = writeln!(clauses, "  way{filter}({bounds});");
        }
        format!("[out:json][timeout:{QUERY_TIMEOUT_SECS}];\n(\n{clauses});\n(._;>;);\nout body;\n")
    }

    async fn fetch_async(&self, query: String) -> Result<VectorData, VectorSourceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::GATEWAY_TIMEOUT => {
                return Err(VectorSourceError::RateLimited);
            }
            status if !status.is_success() => {
                return Err(VectorSourceError::Http {
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        decode(&body)
    }
}

impl VectorSource for OverpassClient {
    fn fetch(
        &self,
        bbox: &BoundingBox,
        queries: &[TagQuery],
    ) -> Result<VectorData, VectorSourceError> {
        let query = Self::build_query(bbox, queries);
        self.runtime.block_on(self.fetch_async(query))
    }
}

/// Escapes a tag fragment for use inside a double-quoted QL string.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Decodes an Overpass JSON document into resolved vector data.
fn decode(body: &str) -> Result<VectorData, VectorSourceError> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    Ok(resolve(response))
}

/// Overpass JSON document.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

/// One element of the Overpass response stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: Tags,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<Member>,
        #[serde(default)]
        tags: Tags,
    },
}

/// A relation member reference.
#[derive(Debug, Deserialize)]
struct Member {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "ref")]
    reference: i64,
    #[serde(default)]
    role: String,
}

/// Resolves way node references against the node table. Ways with
/// missing references keep the nodes that did resolve; the gap is
/// logged, never fatal.
fn resolve(response: OverpassResponse) -> VectorData {
    let mut nodes: HashMap<i64, Node> = HashMap::new();
    let mut ways = Vec::new();
    let mut relations = Vec::new();

    for element in &response.elements {
        if let Element::Node { id, lat, lon } = element {
            nodes.insert(*id, Node { lat: *lat, lon: *lon });
        }
    }

    for element in response.elements {
        match element {
            Element::Node { .. } => {}
            Element::Way { id, nodes: refs, tags } => {
                let total = refs.len();
                let points: Vec<_> = refs
                    .iter()
                    .filter_map(|reference| nodes.get(reference))
                    .map(Node::coord)
                    .collect();
                if points.len() < total {
                    warn!(
                        "way {id}: {} of {total} node references missing from the payload",
                        total - points.len()
                    );
                }
                ways.push(Way { id, tags, points });
            }
            Element::Relation { id, members, tags } => {
                let members = members
                    .into_iter()
                    .filter(|member| member.kind == "way")
                    .map(|member| RelationMember {
                        way: member.reference,
                        role: member.role,
                    })
                    .collect();
                relations.push(Relation { id, tags, members });
            }
        }
    }

    VectorData { ways, relations }
}
