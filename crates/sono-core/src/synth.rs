//! Synthetic audio sources for demos and tests.
//!
//! Each source is an endless generator except [`BufferSource`], which plays a
//! fixed recording once. `frequency_shift` rescales every produced frequency,
//! the same factor a species comparison reports, so a songbird trill can be
//! "translated" into a whale's range and back.

use std::f32::consts::TAU;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::analyser::AudioSource;

/// Optional additive uniform noise shared by the generators.
#[derive(Debug)]
struct Noise {
    amplitude: f32,
    rng: SmallRng,
}

impl Noise {
    fn none() -> Self {
        Self {
            amplitude: 0.0,
            rng: SmallRng::seed_from_u64(0),
        }
    }

    /// Amplitudes that are not finite and positive mean no noise.
    fn new(amplitude: f32, seed: u64) -> Self {
        let amplitude = if amplitude.is_finite() && amplitude > 0.0 {
            amplitude
        } else {
            0.0
        };
        Self {
            amplitude,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn sample(&mut self) -> f32 {
        if self.amplitude == 0.0 {
            return 0.0;
        }
        self.rng.random_range(-self.amplitude..=self.amplitude)
    }
}

/// Pure sine tone.
#[derive(Debug)]
pub struct ToneSource {
    sample_rate: f32,
    frequency: f32,
    amplitude: f32,
    phase: f32,
    noise: Noise,
}

impl ToneSource {
    pub fn new(sample_rate: f32, frequency: f32, amplitude: f32) -> Self {
        Self {
            sample_rate,
            frequency,
            amplitude,
            phase: 0.0,
            noise: Noise::none(),
        }
    }

    pub fn with_noise(mut self, amplitude: f32, seed: u64) -> Self {
        self.noise = Noise::new(amplitude, seed);
        self
    }

    pub fn with_frequency_shift(mut self, shift: f32) -> Self {
        self.frequency *= shift;
        self
    }
}

impl AudioSource for ToneSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let step = TAU * self.frequency / self.sample_rate;
        for s in out.iter_mut() {
            *s = self.amplitude * self.phase.sin() + self.noise.sample();
            self.phase = (self.phase + step) % TAU;
        }
        out.len()
    }

    fn sample_rate(&self) -> Option<f32> {
        Some(self.sample_rate)
    }
}

/// Repeating linear sweep from `start_hz` to `end_hz` over `period` seconds,
/// the shape of a songbird trill.
#[derive(Debug)]
pub struct ChirpSource {
    sample_rate: f32,
    start_hz: f32,
    end_hz: f32,
    period: f32,
    amplitude: f32,
    elapsed: f32,
    phase: f32,
    noise: Noise,
}

impl ChirpSource {
    pub fn new(sample_rate: f32, start_hz: f32, end_hz: f32, period: f32) -> Self {
        Self {
            sample_rate,
            start_hz,
            end_hz,
            period: period.max(1e-3),
            amplitude: 0.5,
            elapsed: 0.0,
            phase: 0.0,
            noise: Noise::none(),
        }
    }

    /// 2–8 kHz trill repeating four times a second.
    pub fn songbird(sample_rate: f32) -> Self {
        Self::new(sample_rate, 2000.0, 8000.0, 0.25)
    }

    pub fn with_noise(mut self, amplitude: f32, seed: u64) -> Self {
        self.noise = Noise::new(amplitude, seed);
        self
    }

    pub fn with_frequency_shift(mut self, shift: f32) -> Self {
        self.start_hz *= shift;
        self.end_hz *= shift;
        self
    }
}

impl AudioSource for ChirpSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let dt = 1.0 / self.sample_rate;
        for s in out.iter_mut() {
            let progress = self.elapsed / self.period;
            let freq = self.start_hz + (self.end_hz - self.start_hz) * progress;
            *s = self.amplitude * self.phase.sin() + self.noise.sample();
            self.phase = (self.phase + TAU * freq * dt) % TAU;
            self.elapsed = (self.elapsed + dt) % self.period;
        }
        out.len()
    }

    fn sample_rate(&self) -> Option<f32> {
        Some(self.sample_rate)
    }
}

/// Low tone under a slow raised-cosine envelope, the shape of a whale call.
#[derive(Debug)]
pub struct PulseSource {
    tone: ToneSource,
    envelope_hz: f32,
    elapsed: f32,
}

impl PulseSource {
    pub fn new(sample_rate: f32, frequency: f32, envelope_hz: f32) -> Self {
        Self {
            tone: ToneSource::new(sample_rate, frequency, 0.8),
            envelope_hz,
            elapsed: 0.0,
        }
    }

    /// 160 Hz moan swelling once every two seconds.
    pub fn whale(sample_rate: f32) -> Self {
        Self::new(sample_rate, 160.0, 0.5)
    }

    pub fn with_noise(mut self, amplitude: f32, seed: u64) -> Self {
        self.tone = self.tone.with_noise(amplitude, seed);
        self
    }

    pub fn with_frequency_shift(mut self, shift: f32) -> Self {
        self.tone = self.tone.with_frequency_shift(shift);
        self
    }
}

impl AudioSource for PulseSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let n = self.tone.read(out);
        let dt = 1.0 / self.tone.sample_rate;
        for s in out[..n].iter_mut() {
            let env = 0.5 * (1.0 - (TAU * self.envelope_hz * self.elapsed).cos());
            *s *= env;
            self.elapsed += dt;
        }
        n
    }

    fn sample_rate(&self) -> Option<f32> {
        Some(self.tone.sample_rate)
    }
}

/// Plays an owned recording once, then reports exhaustion.
#[derive(Debug)]
pub struct BufferSource {
    samples: Vec<f32>,
    cursor: usize,
    sample_rate: Option<f32>,
}

impl BufferSource {
    pub fn new(samples: Vec<f32>, sample_rate: Option<f32>) -> Self {
        Self {
            samples,
            cursor: 0,
            sample_rate,
        }
    }

    /// Decode little-endian `f32` PCM (mono). A trailing partial sample is
    /// ignored.
    pub fn from_f32_le_bytes(bytes: &[u8], sample_rate: Option<f32>) -> Self {
        let samples = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.cursor
    }
}

impl AudioSource for BufferSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }
}
