//! Shared fixtures: an in-memory HTTP client and image builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat, RgbImage};
use rover_timelapse::{HttpClient, HttpResponse, TimelapseError};

pub const BASE_URL: &str = "http://api.test/rovers";

/// A canned response.
#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("X-RateLimit-Remaining".to_string(), "1000".to_string())],
            body,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.headers.clear();
        self
    }
}

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
}

/// Serves canned routes and records every request. Unknown routes get a 404.
#[derive(Default)]
pub struct FakeClient {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route for a plain URL (photo downloads).
    pub fn route(&self, url: &str, route: Route) {
        self.routes.lock().unwrap().insert(url.to_string(), route);
    }

    /// Route for one sol's photo listing.
    pub fn route_listing(&self, rover: &str, sol: u32, route: Route) {
        self.route(&listing_key(&format!("{BASE_URL}/{rover}/photos"), sol), route);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests().iter().filter(|request| request.url == url).count()
    }
}

fn listing_key(url: &str, sol: u32) -> String {
    format!("{url}#sol={sol}")
}

impl HttpClient for FakeClient {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TimelapseError> {
        self.requests.lock().unwrap().push(Request {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        });

        let key = match query.iter().find(|(name, _)| *name == "sol") {
            Some((_, sol)) => listing_key(url, sol.parse().unwrap()),
            None => url.to_string(),
        };

        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Route::status(404, "not found"));

        Ok(HttpResponse {
            status: route.status,
            headers: route
                .headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            body: Box::new(Cursor::new(route.body)),
        })
    }
}

/// A listing body with `(id, img_src)` photos.
pub fn listing_body(photos: &[(u64, &str)]) -> Vec<u8> {
    let photos: Vec<_> = photos
        .iter()
        .map(|(id, src)| {
            serde_json::json!({
                "id": id,
                "sol": 100,
                "img_src": src,
                "earth_date": "2021-06-01",
                "camera": { "id": 1, "name": "NAVCAM_LEFT" },
                "rover": { "id": 8, "name": "Perseverance" },
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({ "photos": photos })).unwrap()
}

/// A solid-colour JPEG of the given size, encoded in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, image::Rgb([180, 120, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// Write a solid-colour image to `dir/name`.
pub fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, image::Rgb([40, 90, 160]))
        .save(&path)
        .unwrap();
    path
}

/// True when the local FFmpeg build has no encoder for the requested codec.
///
/// Failures to open or feed an encoder that does exist are real errors.
pub fn encoder_unavailable(error: &TimelapseError) -> bool {
    matches!(error, TimelapseError::VideoEncodeError(message) if message.ends_with("not available"))
}
