use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::fetch::{HttpClient, fetch_bytes};
use crate::services::crowding_api::{CrowdingApi, LiveCrowding};

/// Placeholder in the endpoint template replaced by the station's NaPTAN code.
const STATION_PLACEHOLDER: &str = "{Naptan}";

pub struct TflCrowdingClient<C> {
    http: C,
    url_template: String,
}

impl<C: HttpClient> TflCrowdingClient<C> {
    /// `url_template` must contain `{Naptan}`, e.g.
    /// `https://api.tfl.gov.uk/crowding/{Naptan}/Live`. Authentication is the
    /// job of `http` (see [`crate::fetch::auth::UrlParam`]).
    pub fn new(http: C, url_template: impl Into<String>) -> Self {
        Self {
            http,
            url_template: url_template.into(),
        }
    }

    pub fn station_url(&self, stop_id: &str) -> String {
        self.url_template
            .replace(STATION_PLACEHOLDER, &urlencoding::encode(stop_id))
    }
}

/// Decodes a live crowding response body. An empty body means "no data".
pub fn parse_live_crowding(body: &[u8]) -> Result<LiveCrowding> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LiveCrowding::default());
    }
    Ok(serde_json::from_slice(body)?)
}

#[async_trait]
impl<C: HttpClient> CrowdingApi for TflCrowdingClient<C> {
    async fn live_crowding(&self, stop_id: &str) -> Result<LiveCrowding> {
        let url = self.station_url(stop_id);
        let body = fetch_bytes(&self.http, &url).await?;
        parse_live_crowding(&body)
            .with_context(|| format!("unparseable crowding response for {stop_id}"))
    }
}
