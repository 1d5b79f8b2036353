//! Vehicle position sources.
//!
//! A [`VehicleSource`] is the network collaborator the scheduler polls. The
//! trait is dyn-compatible (boxed futures) so schedulers can hold any source
//! behind an `Arc<dyn VehicleSource>`.
//!
//! # Example
//!
//! ```ignore
//! use transitwatch::source::{HttpSourceConfig, HttpVehicleSource, ReqwestClient};
//!
//! let client = ReqwestClient::new()?;
//! let source = HttpVehicleSource::new(client, HttpSourceConfig::new("http://localhost:8000"));
//!
//! let payload = source.fetch_all().await?;
//! ```

mod http;

use std::future::Future;
use std::pin::Pin;

use reqwest::Url;
use thiserror::Error;

use crate::vehicle::{AllVehiclesPayload, RawVehicle};

pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};

#[cfg(test)]
pub use http::tests::MockHttpClient;

/// Default path of the "all vehicles" endpoint.
pub const DEFAULT_ALL_VEHICLES_PATH: &str = "/api/vehicles";

/// Default path of the single vehicle endpoint; `{id}` is substituted.
pub const DEFAULT_VEHICLE_PATH: &str = "/api/vehicles/{id}";

/// Boxed future returned by [`VehicleSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Errors from fetching vehicle data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The backend answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The request could not be completed.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The response body was not the expected JSON shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// Fetches vehicle state from a backend.
pub trait VehicleSource: Send + Sync + 'static {
    /// Fetch every vehicle the backend reports.
    fn fetch_all(&self) -> SourceFuture<'_, AllVehiclesPayload>;

    /// Fetch a single vehicle by id.
    fn fetch_vehicle<'a>(&'a self, id: &'a str) -> SourceFuture<'a, RawVehicle>;
}

/// Endpoint configuration for [`HttpVehicleSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Backend base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Path of the "all vehicles" endpoint.
    pub all_vehicles_path: String,
    /// Path of the single vehicle endpoint, containing `{id}`.
    pub vehicle_path: String,
}

impl HttpSourceConfig {
    /// Create a config for `base_url` with the default endpoint paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            all_vehicles_path: DEFAULT_ALL_VEHICLES_PATH.to_string(),
            vehicle_path: DEFAULT_VEHICLE_PATH.to_string(),
        }
    }

    /// Set the "all vehicles" path.
    pub fn with_all_vehicles_path(mut self, path: impl Into<String>) -> Self {
        self.all_vehicles_path = path.into();
        self
    }

    /// Set the single vehicle path.
    pub fn with_vehicle_path(mut self, path: impl Into<String>) -> Self {
        self.vehicle_path = path.into();
        self
    }

    /// Full URL of the "all vehicles" endpoint.
    pub fn all_vehicles_url(&self) -> String {
        join_url(&self.base_url, &self.all_vehicles_path)
    }

    /// Full URL of the endpoint for `id`.
    ///
    /// The id is percent-encoded as a single path segment. If the base URL
    /// does not parse, the id is substituted verbatim and the request fails
    /// later with a network error.
    pub fn vehicle_url(&self, id: &str) -> String {
        let verbatim = || join_url(&self.base_url, &self.vehicle_path.replace("{id}", id));

        let Ok(mut url) = Url::parse(&self.base_url) else {
            return verbatim();
        };
        let Ok(mut segments) = url.path_segments_mut() else {
            return verbatim();
        };
        segments.pop_if_empty();
        for part in self.vehicle_path.split('/').filter(|p| !p.is_empty()) {
            segments.push(&part.replace("{id}", id));
        }
        drop(segments);
        url.to_string()
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// [`VehicleSource`] backed by a JSON HTTP API.
pub struct HttpVehicleSource<C: AsyncHttpClient> {
    client: C,
    config: HttpSourceConfig,
}

impl<C: AsyncHttpClient> HttpVehicleSource<C> {
    /// Create a source using `client` for requests.
    pub fn new(client: C, config: HttpSourceConfig) -> Self {
        Self { client, config }
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, SourceError> {
        let body = self.client.get(&url).await?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Malformed {
            url,
            reason: e.to_string(),
        })
    }
}

impl<C: AsyncHttpClient> VehicleSource for HttpVehicleSource<C> {
    fn fetch_all(&self) -> SourceFuture<'_, AllVehiclesPayload> {
        Box::pin(self.get_json(self.config.all_vehicles_url()))
    }

    fn fetch_vehicle<'a>(&'a self, id: &'a str) -> SourceFuture<'a, RawVehicle> {
        Box::pin(self.get_json(self.config.vehicle_url(id)))
    }
}
