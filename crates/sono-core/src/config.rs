//! Analyzer tuning knobs. Every field has a default so a partial TOML or
//! JSON document deserializes.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_SCALE, DEFAULT_UPDATE_RATE_MS, INTEGRATION_CACHE_CAPACITY, MAX_HOMOLOGY_POINTS,
    MIN_TRAJECTORY_POINTS, NUM_SCALES, PERSISTENCE_NOISE_FLOOR, TRAJECTORY_WINDOW, WARMUP_FRAMES,
};
use crate::persistence::SweepParams;
use crate::spectrogram::PipelineConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub pipeline: PipelineConfig,
    /// Period of the analysis tick.
    pub update_rate_ms: u64,
    /// Frames buffered before a tick does any analysis.
    pub warmup_frames: usize,
    /// Consecutive frames per extracted trajectory.
    pub trajectory_window: usize,
    pub min_trajectory_points: usize,
    pub max_scale: f64,
    pub num_scales: usize,
    pub noise_floor: f64,
    /// Phase-space points handed to the persistence sweep are strided down
    /// to at most this many.
    pub max_homology_points: usize,
    pub cache_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            update_rate_ms: DEFAULT_UPDATE_RATE_MS,
            warmup_frames: WARMUP_FRAMES,
            trajectory_window: TRAJECTORY_WINDOW,
            min_trajectory_points: MIN_TRAJECTORY_POINTS,
            max_scale: DEFAULT_MAX_SCALE,
            num_scales: NUM_SCALES,
            noise_floor: PERSISTENCE_NOISE_FLOOR,
            max_homology_points: MAX_HOMOLOGY_POINTS,
            cache_capacity: INTEGRATION_CACHE_CAPACITY,
        }
    }
}

impl AnalyzerConfig {
    pub fn sweep_params(&self) -> SweepParams {
        SweepParams {
            max_scale: self.max_scale,
            num_scales: self.num_scales,
            noise_floor: self.noise_floor,
        }
    }
}
