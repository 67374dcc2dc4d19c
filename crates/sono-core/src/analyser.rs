//! Frequency analyser stage: time-domain samples in, decibel magnitudes out.
//!
//! Mirrors a browser `AnalyserNode`: Blackman window over the latest
//! `fft_size` samples, magnitude scaled by `1 / fft_size`, exponential
//! smoothing across calls, then `20·log10`. Silence reports `-∞` dB, which
//! converts back to a linear amplitude of exactly zero.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

/// Anything that can hand the pipeline fresh time-domain samples.
///
/// `read` fills as much of `out` as it can and returns how many samples were
/// written. Returning fewer than requested (including zero) is not an error;
/// the analyser keeps its previous window contents.
pub trait AudioSource: Send {
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// Sample rate of the produced signal, if the source knows it.
    fn sample_rate(&self) -> Option<f32> {
        None
    }
}

pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("buffered", &self.samples.len())
            .finish()
    }
}

impl Analyser {
    /// `fft_size` is rounded up to a power of two (minimum 32).
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            fft,
            window: blackman(fft_size),
            samples: VecDeque::from(vec![0.0; fft_size]),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex32::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins reported per frame (`fft_size / 2`).
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append samples, keeping only the most recent `fft_size`.
    pub fn push_samples(&mut self, input: &[f32]) {
        for &s in input {
            if self.samples.len() == self.fft_size {
                self.samples.pop_front();
            }
            self.samples.push_back(if s.is_finite() { s } else { 0.0 });
        }
    }

    /// Analyse the current window into `out` (length `frequency_bin_count`).
    pub fn frequency_data_db(&mut self, out: &mut [f32]) {
        for (i, (sample, w)) in self.samples.iter().zip(&self.window).enumerate() {
            self.scratch[i] = Complex32::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (k, slot) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() * scale;
            *slot = tau * *slot + (1.0 - tau) * magnitude;
        }

        for (o, m) in out.iter_mut().zip(&self.smoothed) {
            *o = amplitude_to_db(*m);
        }
    }

    /// Forget buffered samples and smoothing history.
    pub fn reset(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// `20·log10(a)`; zero maps to `-∞`.
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * amplitude.log10()
    }
}

/// Inverse of [`amplitude_to_db`]; `-∞` and NaN map to zero.
pub fn db_to_amplitude(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    10f32.powf(db / 20.0)
}

fn blackman(len: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42f32, 0.5f32, 0.08f32);
    (0..len)
        .map(|n| {
            let phase = (n as f32) * std::f32::consts::TAU / (len as f32);
            a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
        })
        .collect()
}
