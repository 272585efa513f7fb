//! Video encoder integration tests.
//!
//! Encoding tests skip themselves when the local FFmpeg build lacks the
//! requested encoder.

mod common;

use std::path::Path;

use common::{encoder_unavailable, write_image};
use rover_timelapse::{TimelapseError, VideoCodec, VideoEncoder, VideoEncoderOptions};

#[test]
fn write_frames_to_avi() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let dir = temporary_directory.path();
    let frames: Vec<_> = (0..4)
        .map(|index| write_image(dir, &format!("frame_{index}.jpg"), 64, 48))
        .collect();

    let output = dir.join("nested/out/timelapse.avi");
    let result = VideoEncoder::new(VideoEncoderOptions::default().fps(2.0)).write(&output, &frames);

    if let Err(ref error) = result {
        if encoder_unavailable(error) {
            eprintln!("Skipping: MPEG-4 encoder not available ({error})");
            return;
        }
    }
    let video = result.expect("write video");

    assert_eq!(video.frame_count, 4);
    assert_eq!((video.width, video.height), (64, 48));
    assert_eq!(video.path, output);
    assert!(Path::new(&output).exists(), "output directory should be created");
    let file_size = std::fs::metadata(&output).unwrap().len();
    assert!(file_size > 0, "output file should be non-empty");
}

#[test]
fn odd_dimensions_are_padded_to_even() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let dir = temporary_directory.path();
    let frames = vec![
        write_image(dir, "a.jpg", 275, 101),
        write_image(dir, "b.jpg", 275, 101),
    ];

    let output = dir.join("odd.avi");
    let result = VideoEncoder::new(VideoEncoderOptions::default()).write(&output, &frames);

    if let Err(ref error) = result {
        if encoder_unavailable(error) {
            eprintln!("Skipping: MPEG-4 encoder not available ({error})");
            return;
        }
    }
    let video = result.expect("write video");
    assert_eq!((video.width, video.height), (276, 102));
}

#[test]
fn write_h264_with_fractional_fps() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let dir = temporary_directory.path();
    let frames: Vec<_> = (0..3)
        .map(|index| write_image(dir, &format!("f{index}.png"), 32, 32))
        .collect();

    let output = dir.join("timelapse.mp4");
    let options = VideoEncoderOptions::default()
        .fps(1.5)
        .codec(VideoCodec::H264)
        .crf(28);
    let result = VideoEncoder::new(options).write(&output, &frames);

    if let Err(ref error) = result {
        if encoder_unavailable(error) {
            eprintln!("Skipping: H264 encoder not available ({error})");
            return;
        }
    }
    let video = result.expect("write video");
    assert_eq!(video.fps, 1.5);
    assert!(output.exists());
}

#[test]
fn write_mpeg4_with_fine_grained_fps() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let dir = temporary_directory.path();
    let frames: Vec<_> = (0..3)
        .map(|index| write_image(dir, &format!("fine_{index}.jpg"), 48, 32))
        .collect();

    let output = dir.join("fine.avi");
    let result = VideoEncoder::new(VideoEncoderOptions::default().fps(7.12345)).write(&output, &frames);

    if let Err(ref error) = result {
        if encoder_unavailable(error) {
            eprintln!("Skipping: MPEG-4 encoder not available ({error})");
            return;
        }
    }
    let video = result.expect("write video");
    assert_eq!(video.frame_count, 3);
    assert_eq!(video.fps, 7.12345);
    assert!(output.exists());
}

#[test]
fn only_missing_encoders_count_as_unavailable() {
    assert!(encoder_unavailable(&TimelapseError::VideoEncodeError(
        "codec HEVC not available".to_string()
    )));
    assert!(!encoder_unavailable(&TimelapseError::VideoEncodeError(
        "cannot open encoder: Invalid argument".to_string()
    )));
    assert!(!encoder_unavailable(&TimelapseError::VideoEncodeError(
        "send_frame failed: Invalid argument".to_string()
    )));
    assert!(!encoder_unavailable(&TimelapseError::VideoWriteError(
        "codec not available".to_string()
    )));
}

#[test]
fn write_empty_frames_returns_error() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("empty.avi");
    let frames: Vec<std::path::PathBuf> = Vec::new();

    let result = VideoEncoder::new(VideoEncoderOptions::default()).write(&output, &frames);

    assert!(matches!(result, Err(TimelapseError::VideoWriteError(_))));
    assert!(!output.exists());
}

#[test]
fn video_encoder_options_builder() {
    let options = VideoEncoderOptions::default()
        .fps(24.0)
        .codec(VideoCodec::H265)
        .crf(18)
        .bitrate(5_000_000);

    assert_eq!(options.fps, 24.0);
    assert_eq!(options.codec, VideoCodec::H265);
    assert_eq!(options.crf, Some(18));
    assert_eq!(options.bitrate, Some(5_000_000));
}
