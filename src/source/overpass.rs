use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{blocking::Client, StatusCode};
use tracing::debug;

use super::{build_query, decode_response, is_rate_limit_message, FeatureClass, FeatureSource, FetchError};
use crate::geom::BoundingBox;
use crate::osm::OsmData;

const USER_AGENT: &str = concat!("roundabout/", env!("CARGO_PKG_VERSION"), " (overpass client)");

/// [`FeatureSource`] backed by an Overpass API interpreter endpoint.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
    landuse_categories: Vec<String>,
}

impl OverpassClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, landuse_categories: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            // Give the server its own query timeout before giving up on the socket.
            .timeout(timeout + Duration::from_secs(30))
            .build()
            .context("build overpass http client")?;
        Ok(Self { client, endpoint: endpoint.into(), timeout, landuse_categories })
    }

    #[inline] pub fn endpoint(&self) -> &str { &self.endpoint }

    fn post(&self, query: &str) -> Result<String, FetchError> {
        let resp = self.client
            .post(&self.endpoint)
            .form(&[("data", query)])
            .send()
            .map_err(|e| FetchError::Http(format!("POST {}: {e}", self.endpoint)))?;

        let status = resp.status();
        let body = resp.text().map_err(|e| FetchError::Http(format!("read response body: {e}")))?;
        match status {
            s if s.is_success() => Ok(body),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::GATEWAY_TIMEOUT => Err(FetchError::RateLimited(status.to_string())),
            _ if is_rate_limit_message(&body) => Err(FetchError::RateLimited(status.to_string())),
            _ => Err(FetchError::Http(format!("{status} from {}", self.endpoint))),
        }
    }
}

impl FeatureSource for OverpassClient {
    fn fetch(&self, bbox: &BoundingBox, class: FeatureClass) -> Result<OsmData, FetchError> {
        let query = build_query(bbox, class, &self.landuse_categories, self.timeout.as_secs());
        debug!(%class, %bbox, "posting overpass query");
        let body = self.post(&query)?;
        let data = decode_response(&body)?;
        debug!(%class, elements = data.len(), "overpass response decoded");
        Ok(data)
    }
}
