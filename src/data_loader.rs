use std::path::PathBuf;

use glob::glob;
use image::{DynamicImage, ImageReader};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::error::MovementError;

/// Frame sampling policy applied before analysis: the analyzer itself puts
/// no upper bound on frame count, truncation happens here.
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    /// First frame index to keep.
    pub start_idx: usize,
    /// Keep every `step`-th frame.
    pub step: usize,
    /// Hard cap on the number of decoded frames.
    pub max_frames: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            start_idx: 0,
            step: 1,
            max_frames: 60,
        }
    }
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg", ".jpeg"] {
            if p.as_os_str().to_string_lossy().to_lowercase().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Loads an ordered frame sequence from a folder of still images.
///
/// Files are ordered by name (the usual frame-dump convention), sampled
/// per `options`, and decoded in parallel.
pub fn load_frame_dir(
    folder: &str,
    options: &SamplingOptions,
) -> Result<Vec<DynamicImage>, MovementError> {
    let paths = glob(format!("{}/*", folder).as_str()).expect("invalid frame folder pattern");
    let mut sorted_paths: Vec<PathBuf> = paths.into_iter().filter_map(img_filter).collect();
    sorted_paths.sort();

    let selected: Vec<PathBuf> = sorted_paths
        .into_iter()
        .skip(options.start_idx)
        .step_by(options.step.max(1))
        .take(options.max_frames)
        .collect();
    log::trace!("decoding {} frames from {}", selected.len(), folder);

    selected
        .par_iter()
        .progress_count(selected.len() as u64)
        .map(|path| Ok(ImageReader::open(path)?.decode()?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_folder_yields_no_frames() {
        let frames = load_frame_dir("does/not/exist", &SamplingOptions::default()).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn sampling_skips_and_caps() {
        let options = SamplingOptions {
            start_idx: 1,
            step: 2,
            max_frames: 3,
        };
        // mirror of the selection arithmetic used above
        let selected: Vec<usize> = (0..10)
            .skip(options.start_idx)
            .step_by(options.step)
            .take(options.max_frames)
            .collect();
        assert_eq!(selected, vec![1, 3, 5]);
    }
}
