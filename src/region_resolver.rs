/// REGION RESOLVER
///
/// Reverse geocoding of a course centroid to its administrative region.
/// The pipeline only sees the `RegionResolver` trait. Lookups are
/// best-effort: callers turn every failure into the `"Unknown"` label.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::config::GeocoderConfig;
use crate::error::GeocodeError;

/// Maps a coordinate to a state/province name.
pub trait RegionResolver: Send + Sync {
    /// `Ok(None)` when the service knows no region for the point.
    fn resolve(&self, lat: f64, lon: f64) -> Result<Option<String>, GeocodeError>;
}

/// Never looks anything up. Used when geocoding is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineResolver;

impl RegionResolver for OfflineResolver {
    fn resolve(&self, _lat: f64, _lon: f64) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

/// Nominatim reverse geocoding response (only the parts we read)
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<ReverseAddress>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    state: Option<String>,
    province: Option<String>,
}

/// Enforces a minimum gap between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Sleep if necessary; holding the lock serializes callers
    fn wait(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                std::thread::sleep(wait_time);
            }
        }

        *last = Some(Instant::now());
    }
}

/// Blocking client for a Nominatim-compatible `/reverse` endpoint.
pub struct NominatimResolver {
    client: reqwest::blocking::Client,
    base_url: String,
    language: String,
    rate_limiter: RateLimiter,
}

impl NominatimResolver {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        Self::with_timeout(config, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(config: &GeocoderConfig, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeocodeError::Lookup(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            rate_limiter: RateLimiter::new(config.min_interval_ms),
        })
    }
}

impl RegionResolver for NominatimResolver {
    fn resolve(&self, lat: f64, lon: f64) -> Result<Option<String>, GeocodeError> {
        self.rate_limiter.wait();

        let url = format!("{}/reverse", self.base_url);
        debug!("Reverse geocoding ({:.5}, {:.5})", lat, lon);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Lookup(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text()?;
        region_from_response(&body)
    }
}

/// Pulls the region out of a reverse geocoding JSON body.
///
/// Nominatim answers points in the sea with `{"error": "Unable to geocode"}`;
/// that is a "no region" answer, not a failure.
pub fn region_from_response(body: &str) -> Result<Option<String>, GeocodeError> {
    let parsed: ReverseResponse = serde_json::from_str(body)
        .map_err(|e| GeocodeError::Lookup(format!("unexpected response: {}", e)))?;

    if let Some(error) = parsed.error {
        debug!("Geocoder returned no match: {}", error);
        return Ok(None);
    }

    Ok(parsed
        .address
        .and_then(|a| a.state.or(a.province))
        .filter(|s| !s.trim().is_empty()))
}

/// Builds the resolver the config asks for.
pub fn resolver_from_config(config: &GeocoderConfig) -> Result<Box<dyn RegionResolver>, GeocodeError> {
    if config.enabled {
        Ok(Box::new(NominatimResolver::new(config)?))
    } else {
        Ok(Box::new(OfflineResolver))
    }
}
