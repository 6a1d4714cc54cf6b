use camera_movement_detection::analyzer::analyze_sequence;
use camera_movement_detection::config::{FeatureAlgorithm, MovementConfig};
use camera_movement_detection::data_loader::{SamplingOptions, load_frame_dir};
use camera_movement_detection::io::{object_from_json, object_to_json, render_report, write_report};
use clap::Parser;
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, author)]
struct CmdrsCli {
    /// path to a folder of frame images (analyzed in filename order)
    path: String,

    /// feature algorithm: ["fast-brief", "gradient-grid"]
    #[arg(value_enum, default_value = "fast-brief")]
    algorithm: FeatureAlgorithm,

    /// minimum keypoints per frame for geometric scoring
    #[arg(long, default_value_t = 20)]
    min_keypoints: usize,

    /// translation threshold in pixels for camera movement
    #[arg(long, default_value_t = 20.0)]
    homography_threshold: f64,

    /// minimum feature matches before a homography is fitted
    #[arg(long, default_value_t = 20)]
    min_matches: usize,

    /// moving-pixel percentage threshold for object movement
    #[arg(long, default_value_t = 2.0)]
    object_flow_threshold: f64,

    /// analyze every nth frame
    #[arg(long, default_value_t = 1)]
    step: usize,

    /// cap on analyzed frames
    #[arg(long, default_value_t = 60)]
    max_frames: usize,

    /// load the full config from a json file instead of the flags above
    #[arg(long)]
    config_json: Option<String>,

    /// write the result as json
    #[arg(long)]
    output_json: Option<String>,

    /// write the plain-text report to a file
    #[arg(long)]
    output_report: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = CmdrsCli::parse();
    let config = match &cli.config_json {
        Some(path) => object_from_json::<MovementConfig>(path),
        None => MovementConfig {
            algorithm: cli.algorithm,
            min_keypoints: cli.min_keypoints,
            homography_threshold_px: cli.homography_threshold,
            min_matches: cli.min_matches,
            object_flow_threshold_pct: cli.object_flow_threshold,
            ..MovementConfig::default()
        },
    };

    let options = SamplingOptions {
        start_idx: 0,
        step: cli.step,
        max_frames: cli.max_frames,
    };
    let frames = load_frame_dir(&cli.path, &options).expect("failed to load frames");
    println!("loaded {} frames from {}", frames.len(), cli.path);

    let now = Instant::now();
    let result = analyze_sequence(&frames, &config).expect("analysis failed");
    let duration_sec = now.elapsed().as_secs_f64();
    println!(
        "analyzed {} pairs in {:.3} sec ({:.3} sec/pair)",
        result.pair_count(),
        duration_sec,
        duration_sec / result.pair_count() as f64
    );

    print!("{}", render_report(&result));
    if let Some(path) = &cli.output_json {
        object_to_json(path, &result);
        println!("wrote {}", path);
    }
    if let Some(path) = &cli.output_report {
        write_report(path, &result);
        println!("wrote {}", path);
    }
}
