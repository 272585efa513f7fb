use std::{path::PathBuf, sync::Arc, sync::Mutex, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use rover_timelapse::{
    ApiKey, DEFAULT_CAMERA, DEFAULT_OUTPUT_DIRECTORY, DEFAULT_WORKING_DIRECTORY, MetadataFetcher,
    ProgressCallback, ProgressInfo, ReqwestClient, Rover, Stage, Timelapse, TimelapseOptions,
    VideoCodec,
};

const API_KEY_VARIABLE: &str = "NASA_API_KEY";

const CLI_AFTER_HELP: &str = "Examples:\n  rover-timelapse build --rover perseverance --sol-start 100 --sol-end 120 --min-aspect-ratio 1.2\n  rover-timelapse build --rover curiosity --camera NAVCAM --sol-start 1000 --sol-end 1010 --fps 4 --codec h264 --progress\n  rover-timelapse photos --rover curiosity --camera FHAZ --sol 1000 --json\n  rover-timelapse completions zsh > _rover-timelapse";

#[derive(Debug, Parser)]
#[command(
    name = "rover-timelapse",
    version,
    about = "Use the NASA API to create a timelapse of a Mars rover camera",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output (RUST_LOG overrides).
    #[arg(long, global = true)]
    verbose: bool,

    /// Show progress bars for download, resize and encode.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (off, error, warn, info, debug, trace).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<String>,

    /// HTTP request timeout in seconds.
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a sol range and encode it into a timelapse video.
    #[command(
        about = "Build a timelapse video",
        after_help = "Examples:\n  rover-timelapse build --rover perseverance --sol-start 100 --sol-end 120\n  rover-timelapse build --rover curiosity --sol-start 1000 --sol-end 1000 --keep-temp"
    )]
    Build {
        /// Name of rover (perseverance, curiosity).
        #[arg(long, value_parser = parse_rover)]
        rover: Rover,
        /// Start sol for timelapse.
        #[arg(long, alias = "sol_start")]
        sol_start: u32,
        /// End sol for timelapse (inclusive).
        #[arg(long, alias = "sol_end")]
        sol_end: u32,
        /// Minimum aspect ratio of images to consider (strictly greater).
        #[arg(long, alias = "min_aspect_ratio", default_value_t = 0.0)]
        min_aspect_ratio: f64,
        /// Frames per second of the generated timelapse.
        #[arg(long, default_value_t = 2.0)]
        fps: f64,
        /// Camera on the rover.
        #[arg(long, default_value = DEFAULT_CAMERA)]
        camera: String,
        /// NASA API key (falls back to NASA_API_KEY, also read from .env).
        #[arg(long)]
        key: Option<String>,
        /// Force download of images even if cached.
        #[arg(long, alias = "force_download")]
        force_download: bool,
        /// Keep the working directory containing raw images after the run.
        #[arg(long, alias = "keep_temp")]
        keep_temp: bool,
        /// Directory for downloaded and resized images.
        #[arg(long, default_value = DEFAULT_WORKING_DIRECTORY)]
        working_dir: PathBuf,
        /// Directory the video is written to.
        #[arg(long, default_value = DEFAULT_OUTPUT_DIRECTORY)]
        output_dir: PathBuf,
        /// Output codec: mpeg4 (AVI) | h264 (MP4) | h265 (MP4).
        #[arg(long, default_value = "mpeg4", value_parser = parse_codec)]
        codec: VideoCodec,
    },

    /// List the photos one camera took on one sol.
    #[command(
        about = "List photos for a sol",
        after_help = "Examples:\n  rover-timelapse photos --rover curiosity --sol 1000\n  rover-timelapse photos --rover perseverance --camera NAVCAM_LEFT --sol 100 --json"
    )]
    Photos {
        /// Name of rover (perseverance, curiosity).
        #[arg(long, value_parser = parse_rover)]
        rover: Rover,
        /// Sol to list.
        #[arg(long)]
        sol: u32,
        /// Camera on the rover.
        #[arg(long, default_value = DEFAULT_CAMERA)]
        camera: String,
        /// NASA API key (falls back to NASA_API_KEY, also read from .env).
        #[arg(long)]
        key: Option<String>,
        /// Output the listing as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_rover(value: &str) -> Result<Rover, String> {
    value.parse::<Rover>().map_err(|error| error.to_string())
}

fn parse_codec(value: &str) -> Result<VideoCodec, String> {
    match value.to_ascii_lowercase().as_str() {
        "mpeg4" | "divx" | "avi" => Ok(VideoCodec::Mpeg4),
        "h264" | "avc" => Ok(VideoCodec::H264),
        "h265" | "hevc" => Ok(VideoCodec::H265),
        _ => Err(format!("unsupported codec: {value} (mpeg4, h264, h265)")),
    }
}

fn parse_level_filter(value: &str) -> Option<LevelFilter> {
    match value.to_ascii_lowercase().as_str() {
        "off" | "quiet" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warning" | "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn resolve_api_key(explicit: Option<&str>) -> Result<ApiKey, Box<dyn std::error::Error>> {
    let fallback = std::env::var(API_KEY_VARIABLE).ok();
    Ok(ApiKey::resolve(explicit, fallback.as_deref())?)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let ffmpeg_level = match &global.ffmpeg_log_level {
        Some(level) => parse_level_filter(level)
            .ok_or(format!("unsupported --ffmpeg-log-level: {level}"))?,
        None => LevelFilter::Error,
    };
    rover_timelapse::set_ffmpeg_log_level(ffmpeg_level);

    Ok(())
}

/// Renders each pipeline stage as its own progress bar.
#[derive(Default)]
struct TerminalProgress {
    current: Mutex<Option<(Stage, ProgressBar)>>,
}

impl TerminalProgress {
    fn new() -> Self {
        Self::default()
    }

    fn new_bar(stage: Stage, total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {msg:>9} {bar:40.cyan/blue} {pos}/{len}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(match stage {
            Stage::Download => "download",
            Stage::Normalize => "resize",
            Stage::Encode => "encode",
            _ => "working",
        });
        bar
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        let total = info.total.unwrap_or(0);

        let restart = match current.as_ref() {
            Some((stage, bar)) => *stage != info.stage || bar.is_finished() || info.current == 1,
            None => true,
        };
        if restart {
            if let Some((_, bar)) = current.take() {
                bar.finish();
            }
            *current = Some((info.stage, Self::new_bar(info.stage, total)));
        }

        if let Some((_, bar)) = current.as_ref() {
            bar.set_position(info.current);
            if info.current >= total {
                bar.finish();
            }
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    let timeout = Duration::from_secs(cli.global.timeout);

    match cli.command {
        Commands::Build {
            rover,
            sol_start,
            sol_end,
            min_aspect_ratio,
            fps,
            camera,
            key,
            force_download,
            keep_temp,
            working_dir,
            output_dir,
            codec,
        } => {
            let api_key = resolve_api_key(key.as_deref())?;
            let mut options = TimelapseOptions::new(rover, sol_start, sol_end)
                .with_camera(camera)
                .with_min_aspect_ratio(min_aspect_ratio)
                .with_fps(fps)
                .with_force_download(force_download)
                .with_keep_temp(keep_temp)
                .with_api_key(api_key)
                .with_working_directory(working_dir)
                .with_output_directory(output_dir)
                .with_codec(codec);

            if cli.global.progress {
                options = options.with_progress(Arc::new(TerminalProgress::new()));
            }

            let client = Arc::new(ReqwestClient::new(timeout)?);
            let timelapse = Timelapse::new(options, client)?;
            let report = timelapse.run()?;

            if !report.photos_skipped.is_empty() {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} photo(s) could not be downloaded", report.photos_skipped.len()).yellow()
                );
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "{} frame(s) at {}x{} from {} photo(s)",
                    report.video.frame_count,
                    report.video.width,
                    report.video.height,
                    report.photos_listed,
                )
                .green()
            );
            println!("{}", report.video.path.display());
        }
        Commands::Photos {
            rover,
            sol,
            camera,
            key,
            json,
        } => {
            let api_key = resolve_api_key(key.as_deref())?;
            let client = Arc::new(ReqwestClient::new(timeout)?);
            let listing = MetadataFetcher::new(client, api_key).photos(rover, &camera, sol)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&listing.photos)?);
            } else {
                println!("Sol {}: {} photo(s)", listing.sol, listing.photos.len());
                for photo in &listing.photos {
                    println!("{:>10}  {}", photo.id, photo.source_url);
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "rover-timelapse", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
