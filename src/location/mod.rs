//! Location lookup and tracking.
//!
//! Fixes come from a [`LocationProvider`]. The shipped provider asks an IP
//! geolocation service, which is coarse (city level) but needs no hardware.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// A single position report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn map_url(&self) -> String {
        map_url(self.latitude, self.longitude)
    }
}

/// Link that opens a map centred on the given coordinates.
pub fn map_url(latitude: f64, longitude: f64) -> String {
    let query = format!("{},{}", latitude, longitude);
    format!(
        "https://www.google.com/maps/search/?api=1&query={}",
        urlencoding::encode(&query)
    )
}

/// Source of location fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn locate(&self) -> Result<LocationFix>;
}

/// User agent sent to the geolocation endpoint.
const USER_AGENT: &str = concat!("MusicManager/", env!("CARGO_PKG_VERSION"));

/// Geolocation by public IP address.
pub struct IpLocationProvider {
    http_client: reqwest::Client,
    endpoint: String,
}

/// Response of ip-api.com style services. `latitude`/`longitude` spellings
/// (ipapi.co, ipwho.is) are accepted too.
#[derive(Debug, Deserialize)]
struct IpLocationResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lon: Option<f64>,
}

impl IpLocationProvider {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LocationProvider for IpLocationProvider {
    async fn locate(&self) -> Result<LocationFix> {
        let response = self.http_client.get(&self.endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::location(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let body: IpLocationResponse = response.json().await?;
        to_fix(body, Utc::now())
    }
}

fn to_fix(response: IpLocationResponse, timestamp: DateTime<Utc>) -> Result<LocationFix> {
    if response.status.as_deref() == Some("fail") {
        return Err(Error::location(
            response
                .message
                .unwrap_or_else(|| "lookup failed".to_string()),
        ));
    }

    match (response.lat, response.lon) {
        (Some(latitude), Some(longitude)) => Ok(LocationFix {
            latitude,
            longitude,
            timestamp,
        }),
        _ => Err(Error::location("response has no coordinates")),
    }
}

/// Ask `provider` for a fix immediately and then once per `interval`.
///
/// The stream never ends; failed lookups are yielded as errors.
pub fn track<P>(provider: &P, interval: Duration) -> impl Stream<Item = Result<LocationFix>> + '_
where
    P: LocationProvider + ?Sized,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    futures::stream::unfold((provider, ticker), |(provider, mut ticker)| async move {
        ticker.tick().await;
        let fix = provider.locate().await;
        if let Err(e) = &fix {
            tracing::warn!(error = %e, "Location lookup failed");
        }
        Some((fix, (provider, ticker)))
    })
}
