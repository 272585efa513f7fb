//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

mod common;

use std::sync::Arc;

use common::{BASE_URL, FakeClient, Route, listing_body, write_image};
use rover_timelapse::{ApiKey, Rover, Selection, Timelapse, TimelapseError, TimelapseOptions};

#[test]
fn reversed_sol_range_message() {
    let options = TimelapseOptions::new(Rover::Curiosity, 12, 10).with_api_key(ApiKey::new("KEY"));
    let error_message = options.validate().unwrap_err().to_string();
    assert!(
        error_message.contains("start (12)") && error_message.contains("end (10)"),
        "Error message should name both bounds: {error_message}",
    );
}

#[test]
fn missing_key_mentions_environment_variable() {
    let options = TimelapseOptions::new(Rover::Curiosity, 1, 1);
    let error_message = options.validate().unwrap_err().to_string();
    assert!(
        error_message.contains("NASA_API_KEY"),
        "Error message should point at the fallback variable: {error_message}",
    );
}

#[test]
fn empty_selection_names_threshold() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let square = write_image(temporary_directory.path(), "square.png", 10, 10);

    let error_message = Selection::from_candidates(&[square], 1.25).unwrap_err().to_string();
    assert!(
        error_message.starts_with("No images found"),
        "Error message should report no images: {error_message}",
    );
    assert!(error_message.contains("1.25"), "Error message should name the threshold: {error_message}");
}

#[test]
fn metadata_failure_is_fatal_and_descriptive() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let client = Arc::new(FakeClient::new());
    client.route_listing("curiosity", 4, Route::status(429, "OVER_RATE_LIMIT"));

    let options = TimelapseOptions::new(Rover::Curiosity, 4, 4)
        .with_api_key(ApiKey::new("KEY"))
        .with_working_directory(temporary_directory.path().join("temp"));
    let error = Timelapse::new(options, client)
        .unwrap()
        .with_base_url(BASE_URL)
        .run()
        .unwrap_err();

    assert!(error.is_fatal());
    let error_message = error.to_string();
    assert!(error_message.contains("sol 4"), "{error_message}");
    assert!(error_message.contains("429"), "{error_message}");
    assert!(error_message.contains("OVER_RATE_LIMIT"), "{error_message}");
}

#[test]
fn unreachable_image_host_is_not_fatal() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let client = Arc::new(FakeClient::new());
    // The image URL has no route, so the fake client answers 404.
    client.route_listing(
        "curiosity",
        9,
        Route::ok(listing_body(&[(77, "http://img.test/missing.jpg")])),
    );

    let options = TimelapseOptions::new(Rover::Curiosity, 9, 9)
        .with_api_key(ApiKey::new("KEY"))
        .with_working_directory(temporary_directory.path().join("temp"));
    let timelapse = Timelapse::new(options, client).unwrap().with_base_url(BASE_URL);

    let collected = timelapse.collect().expect("download failures are skipped");
    assert_eq!(collected.photos_skipped, vec![77]);
    assert!(collected.paths.is_empty());

    let result = timelapse.run();
    assert!(matches!(result, Err(TimelapseError::EmptySelection { candidates: 0, .. })));
}
