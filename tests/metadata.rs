//! Photo listing tests against an in-memory API.

mod common;

use std::sync::Arc;

use common::{BASE_URL, FakeClient, Route, listing_body};
use rover_timelapse::{ApiKey, MetadataFetcher, RateLimit, Rover, TimelapseError};

fn fetcher(client: &Arc<FakeClient>) -> MetadataFetcher {
    MetadataFetcher::new(client.clone(), ApiKey::new("TEST_KEY")).with_base_url(BASE_URL)
}

#[test]
fn lists_photos_in_response_order() {
    let client = Arc::new(FakeClient::new());
    client.route_listing(
        "perseverance",
        100,
        Route::ok(listing_body(&[
            (30, "http://img.test/30.jpg"),
            (10, "http://img.test/10.jpg"),
            (20, "http://img.test/20.jpg"),
        ])),
    );

    let listing = fetcher(&client)
        .photos(Rover::Perseverance, "NAVCAM_LEFT", 100)
        .expect("listing");

    let ids: Vec<u64> = listing.photos.iter().map(|photo| photo.id).collect();
    assert_eq!(ids, vec![30, 10, 20]);
    assert_eq!(listing.sol, 100);
    assert_eq!(listing.photos[1].source_url, "http://img.test/10.jpg");
    assert_eq!(listing.photos[1].earth_date.as_deref(), Some("2021-06-01"));
}

#[test]
fn photos_are_tagged_with_requested_rover_and_camera() {
    let client = Arc::new(FakeClient::new());
    client.route_listing("perseverance", 7, Route::ok(listing_body(&[(1, "http://img.test/1.jpg")])));

    let listing = fetcher(&client).photos(Rover::Perseverance, "FRONT_HAZCAM_LEFT_A", 7).unwrap();

    assert_eq!(listing.photos[0].rover, "perseverance");
    assert_eq!(listing.photos[0].camera, "FRONT_HAZCAM_LEFT_A");
}

#[test]
fn request_carries_key_sol_and_camera() {
    let client = Arc::new(FakeClient::new());
    client.route_listing("curiosity", 1000, Route::ok(listing_body(&[])));

    fetcher(&client).photos(Rover::Curiosity, "NAVCAM", 1000).unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, format!("{BASE_URL}/curiosity/photos"));
    let query = &requests[0].query;
    assert!(query.contains(&("api_key".to_string(), "TEST_KEY".to_string())));
    assert!(query.contains(&("sol".to_string(), "1000".to_string())));
    assert!(query.contains(&("camera".to_string(), "NAVCAM".to_string())));
}

#[test]
fn empty_listing_is_not_an_error() {
    let client = Arc::new(FakeClient::new());
    client.route_listing("curiosity", 5, Route::ok(listing_body(&[])));

    let listing = fetcher(&client).photos(Rover::Curiosity, "NAVCAM", 5).unwrap();
    assert!(listing.photos.is_empty());
}

#[test]
fn non_success_status_carries_body() {
    let client = Arc::new(FakeClient::new());
    client.route_listing(
        "curiosity",
        5,
        Route::status(403, r#"{"error":{"code":"API_KEY_INVALID"}}"#),
    );

    let error = fetcher(&client).photos(Rover::Curiosity, "NAVCAM", 5).unwrap_err();
    match error {
        TimelapseError::MetadataRequest { sol, status, body } => {
            assert_eq!(sol, 5);
            assert_eq!(status, 403);
            assert!(body.contains("API_KEY_INVALID"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_body_is_a_json_error() {
    let client = Arc::new(FakeClient::new());
    client.route_listing("curiosity", 5, Route::ok(b"<html>maintenance</html>".to_vec()));

    let error = fetcher(&client).photos(Rover::Curiosity, "NAVCAM", 5).unwrap_err();
    assert!(matches!(error, TimelapseError::JsonError(_)));
    assert!(error.is_fatal());
}

#[test]
fn rate_limit_header_is_reported() {
    let client = Arc::new(FakeClient::new());
    client.route_listing(
        "curiosity",
        1,
        Route::ok(listing_body(&[])).with_header("X-RateLimit-Remaining", "12"),
    );
    client.route_listing("curiosity", 2, Route::ok(listing_body(&[])).without_headers());
    client.route_listing(
        "curiosity",
        3,
        Route::ok(listing_body(&[])).with_header("X-RateLimit-Remaining", "3600"),
    );

    let fetcher = fetcher(&client);
    assert_eq!(fetcher.photos(Rover::Curiosity, "NAVCAM", 1).unwrap().rate_limit, RateLimit::Low(12));
    assert_eq!(fetcher.photos(Rover::Curiosity, "NAVCAM", 2).unwrap().rate_limit, RateLimit::Unknown);
    assert_eq!(fetcher.photos(Rover::Curiosity, "NAVCAM", 3).unwrap().rate_limit, RateLimit::Ok(3600));
}
