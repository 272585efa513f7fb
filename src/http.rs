//! HTTP transport.
//!
//! The fetcher and the image store talk to the network through the
//! [`HttpClient`] trait so they can be driven by an in-memory client in
//! tests. [`ReqwestClient`] is the production implementation.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::TimelapseError;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("rover-timelapse/", env!("CARGO_PKG_VERSION"));

/// A received HTTP response with a streaming body.
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers, names lower-cased.
    pub headers: HashMap<String, String>,
    /// The body, read lazily.
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Drain the body into a string, replacing invalid UTF-8.
    pub fn text(mut self) -> Result<String, TimelapseError> {
        let mut bytes = Vec::new();
        self.body.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// A blocking HTTP GET transport.
///
/// Implementations must be [`Send`] and [`Sync`] so one client can be shared
/// between the fetcher and the store.
pub trait HttpClient: Send + Sync {
    /// Issue a GET request to `url` with the given query parameters.
    ///
    /// Non-success statuses are returned as responses, not errors; only
    /// transport failures (DNS, TLS, timeouts) produce an `Err`.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TimelapseError>;
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Build a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TimelapseError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TimelapseError> {
        let response = self.client.get(url).query(query).send()?;

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();

        Ok(HttpResponse {
            status: response.status().as_u16(),
            headers,
            body: Box::new(response),
        })
    }
}
