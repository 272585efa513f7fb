//! Video assembly: encode an ordered sequence of image files into a video.
//!
//! [`VideoEncoder`] decodes one image at a time from disk, converts it to
//! YUV 4:2:0 and feeds it to an FFmpeg encoder, so memory use does not grow
//! with the length of the timelapse.
//!
//! # Example
//!
//! ```no_run
//! use rover_timelapse::{TimelapseError, VideoCodec, VideoEncoder, VideoEncoderOptions};
//!
//! let frames = ["temp/_resized_a.jpg", "temp/_resized_b.jpg"];
//! let video = VideoEncoder::new(VideoEncoderOptions::default().fps(2.0).codec(VideoCodec::H264))
//!     .write("output/timelapse.mp4", &frames)?;
//! println!("{} frames at {}x{}", video.frame_count, video.width, video.height);
//! # Ok::<(), TimelapseError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Dictionary, Packet, Rational};
use image::imageops::FilterType;

use crate::error::TimelapseError;
use crate::progress::{NoOpProgress, ProgressCallback, ProgressTracker, Stage};
use crate::selection::{open_image, read_dimensions};

/// Bitrate used for MPEG-4 Part 2 when none is configured. That encoder
/// ignores CRF and its own default is far too low for full-size navcam frames.
const DEFAULT_MPEG4_BITRATE: usize = 8_000_000;

/// Largest time-base denominator MPEG-4 Part 2 can signal.
const MAX_TIME_BASE_DENOMINATOR: i32 = 65_535;

/// Options for the video encoder.
#[derive(Debug, Clone)]
pub struct VideoEncoderOptions {
    /// Frames per second (default: 2).
    pub fps: f64,
    /// Codec to use. Default is MPEG-4 Part 2.
    pub codec: VideoCodec,
    /// Constant Rate Factor for H.264 / H.265 (0-51, lower is better). Default: 23.
    pub crf: Option<u32>,
    /// Bitrate in bits per second. If set, overrides CRF.
    pub bitrate: Option<usize>,
}

impl Default for VideoEncoderOptions {
    fn default() -> Self {
        Self {
            fps: 2.0,
            codec: VideoCodec::Mpeg4,
            crf: Some(23),
            bitrate: None,
        }
    }
}

impl VideoEncoderOptions {
    /// Set the frame rate.
    pub fn fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    /// Set the codec.
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the CRF quality value.
    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Set the target bitrate in bits per second.
    pub fn bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }
}

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// H.264 / AVC, written to MP4.
    H264,
    /// H.265 / HEVC, written to MP4.
    H265,
    /// MPEG-4 Part 2 (DivX compatible), written to AVI.
    #[default]
    Mpeg4,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }

    /// File extension of the container this codec is written to.
    pub fn extension(self) -> &'static str {
        match self {
            VideoCodec::H264 | VideoCodec::H265 => "mp4",
            VideoCodec::Mpeg4 => "avi",
        }
    }

    fn uses_crf(self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H265)
    }
}

/// The finished video.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelapseVideo {
    /// Where the video was written.
    pub path: PathBuf,
    /// Number of frames encoded.
    pub frame_count: usize,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate.
    pub fps: f64,
}

/// Encodes a sequence of image files into a video file.
pub struct VideoEncoder {
    config: VideoEncoderOptions,
    progress: Arc<dyn ProgressCallback>,
}

impl VideoEncoder {
    /// Create a new video encoder with the given options.
    pub fn new(config: VideoEncoderOptions) -> Self {
        Self {
            config,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Report each encoded frame to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Encode `frames` in order into `path`.
    ///
    /// The frame size is taken from the first image; later images of a
    /// different size are resized to match. The output directory is created
    /// if needed and the container format is inferred from the extension.
    ///
    /// # Errors
    ///
    /// - [`TimelapseError::VideoWriteError`] if `frames` is empty, or on
    ///   container or I/O failure.
    /// - [`TimelapseError::VideoEncodeError`] if the codec cannot be opened
    ///   or rejects a frame.
    /// - [`TimelapseError::ImageError`] if a frame cannot be decoded.
    pub fn write<P: AsRef<Path>, F: AsRef<Path>>(
        &self,
        path: P,
        frames: &[F],
    ) -> Result<TimelapseVideo, TimelapseError> {
        let path = path.as_ref();
        log::info!(
            "Writing {} frames to {} (codec={:?}, fps={})",
            frames.len(),
            path.display(),
            self.config.codec,
            self.config.fps,
        );

        let Some(first) = frames.first() else {
            return Err(TimelapseError::VideoWriteError("no frames to write".to_string()));
        };
        if !self.config.fps.is_finite() || self.config.fps <= 0.0 {
            return Err(TimelapseError::VideoEncodeError(format!(
                "invalid frame rate {}",
                self.config.fps
            )));
        }

        let (width, height) = read_dimensions(first.as_ref())?;
        log::info!("Video size: {width}x{height}");

        // YUV 4:2:0 needs even dimensions; the scaler absorbs the odd pixel.
        let encoded_width = (width + 1) & !1;
        let encoded_height = (height + 1) & !1;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                TimelapseError::VideoWriteError(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        ffmpeg_next::init()
            .map_err(|e| TimelapseError::VideoEncodeError(format!("cannot initialise FFmpeg: {e}")))?;

        let codec_id = self.config.codec.to_codec_id();
        let frame_rate = frame_rate(self.config.fps);
        let time_base = frame_rate.invert();

        let mut output = ffmpeg_next::format::output(path)
            .map_err(|e| TimelapseError::VideoWriteError(format!("cannot open output: {e}")))?;

        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let encoder_codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            TimelapseError::VideoEncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|e| TimelapseError::VideoWriteError(format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|e| TimelapseError::VideoEncodeError(format!("cannot create codec context: {e}")))?
            .encoder()
            .video()
            .map_err(|e| TimelapseError::VideoEncodeError(format!("cannot open video encoder: {e}")))?;

        encoder.set_width(encoded_width);
        encoder.set_height(encoded_height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(frame_rate));

        let mut codec_options = Dictionary::new();
        match (self.config.bitrate, self.config.crf) {
            (Some(bitrate), _) => encoder.set_bit_rate(bitrate),
            (None, Some(crf)) if self.config.codec.uses_crf() => {
                codec_options.set("crf", &crf.to_string());
            }
            (None, _) => encoder.set_bit_rate(DEFAULT_MPEG4_BITRATE),
        }

        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let mut opened_encoder = encoder
            .open_as_with(encoder_codec, codec_options)
            .map_err(|e| TimelapseError::VideoEncodeError(format!("cannot open encoder: {e}")))?;

        stream.set_parameters(&opened_encoder);

        output
            .write_header()
            .map_err(|e| TimelapseError::VideoWriteError(format!("cannot write header: {e}")))?;

        // The muxer may replace the stream time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| TimelapseError::VideoWriteError("output stream disappeared".to_string()))?;

        let mut scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            encoded_width,
            encoded_height,
            ScalingFlags::BICUBIC,
        )
        .map_err(|e| TimelapseError::VideoWriteError(format!("cannot create scaler: {e}")))?;

        let mut tracker = ProgressTracker::new(self.progress.clone(), Stage::Encode, Some(frames.len() as u64));
        let mut frame_index: i64 = 0;

        for frame_path in frames {
            let frame_path = frame_path.as_ref();
            let img = open_image(frame_path)?;
            let rgb = if img.width() != width || img.height() != height {
                log::warn!(
                    "{} is {}x{}, resizing to {width}x{height}",
                    frame_path.display(),
                    img.width(),
                    img.height(),
                );
                img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
            } else {
                img.to_rgb8()
            };

            let mut src_frame = VideoFrame::new(Pixel::RGB24, width, height);
            let stride = src_frame.stride(0);
            let src_data = src_frame.data_mut(0);
            let rgb_bytes = rgb.as_raw();
            let row_len = (width as usize) * 3;
            for y in 0..height as usize {
                let src_start = y * row_len;
                let dst_start = y * stride;
                src_data[dst_start..dst_start + row_len]
                    .copy_from_slice(&rgb_bytes[src_start..src_start + row_len]);
            }

            let mut dst_frame = VideoFrame::empty();
            scaler
                .run(&src_frame, &mut dst_frame)
                .map_err(|e| TimelapseError::VideoWriteError(format!("scaling failed: {e}")))?;

            dst_frame.set_pts(Some(frame_index));
            frame_index += 1;

            opened_encoder
                .send_frame(&dst_frame)
                .map_err(|e| TimelapseError::VideoEncodeError(format!("send_frame failed: {e}")))?;

            drain_packets(&mut opened_encoder, &mut output, stream_index, time_base, stream_time_base)?;
            tracker.advance();
            log::debug!("Added {}", frame_path.display());
        }

        opened_encoder
            .send_eof()
            .map_err(|e| TimelapseError::VideoEncodeError(format!("send_eof failed: {e}")))?;
        drain_packets(&mut opened_encoder, &mut output, stream_index, time_base, stream_time_base)?;

        output
            .write_trailer()
            .map_err(|e| TimelapseError::VideoWriteError(format!("cannot write trailer: {e}")))?;

        Ok(TimelapseVideo {
            path: path.to_path_buf(),
            frame_count: frames.len(),
            width: encoded_width,
            height: encoded_height,
            fps: self.config.fps,
        })
    }
}

/// Approximate `fps` by a fraction whose terms fit every supported encoder.
fn frame_rate(fps: f64) -> Rational {
    // SAFETY: av_d2q is a pure arithmetic helper.
    Rational::from(unsafe { ffmpeg_sys_next::av_d2q(fps, MAX_TIME_BASE_DENOMINATOR) })
}

fn drain_packets(
    encoder: &mut ffmpeg_next::encoder::video::Encoder,
    output: &mut ffmpeg_next::format::context::Output,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
) -> Result<(), TimelapseError> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(encoder_time_base, stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(|e| TimelapseError::VideoWriteError(format!("write packet failed: {e}")))?;
    }
    Ok(())
}

/// Set FFmpeg's own console verbosity from a `log` level.
///
/// FFmpeg prints to stderr independently of the `log` facade; this keeps the
/// two in step. `Off` silences FFmpeg entirely.
pub fn set_ffmpeg_log_level(level: log::LevelFilter) {
    use ffmpeg_next::util::log::Level;

    let ffmpeg_level = match level {
        log::LevelFilter::Off => Level::Quiet,
        log::LevelFilter::Error => Level::Error,
        log::LevelFilter::Warn => Level::Warning,
        log::LevelFilter::Info => Level::Info,
        log::LevelFilter::Debug => Level::Debug,
        log::LevelFilter::Trace => Level::Trace,
    };
    ffmpeg_next::util::log::set_level(ffmpeg_level);
}
