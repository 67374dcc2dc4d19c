//! Spectrogram pipeline: analyser → mel filterbank → bounded frame history.
//!
//! Each `process_frame` pulls one hop of audio from the connected source,
//! converts the analyser's decibel spectrum to linear amplitude, folds it into
//! `num_mel_bins` triangular mel bands and appends the result to a ring buffer
//! of at most `max_frames` frames (oldest evicted first).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::analyser::{Analyser, AudioSource, db_to_amplitude};
use crate::constants::{
    BASS_SPLIT, DEFAULT_FFT_SIZE, DEFAULT_SAMPLE_RATE, EPSILON, MID_SPLIT, NUM_MEL_BINS, Q_SCALE,
    SILENCE_FLOOR, SMOOTHING_TIME_CONSTANT, SPECTROGRAM_MAX_FRAMES,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate: f32,
    pub fft_size: usize,
    pub num_mel_bins: usize,
    pub max_frames: usize,
    pub smoothing: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            fft_size: DEFAULT_FFT_SIZE,
            num_mel_bins: NUM_MEL_BINS,
            max_frames: SPECTROGRAM_MAX_FRAMES,
            smoothing: SMOOTHING_TIME_CONSTANT,
        }
    }
}

/// Non-negative mel-band energies for one time step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpectrogramFrame(pub Vec<f32>);

impl SpectrogramFrame {
    pub fn bins(&self) -> &[f32] {
        &self.0
    }
}

/// Row-major copy of the whole buffer: `data[t * num_bins + f]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatSpectrogram {
    pub data: Vec<f32>,
    pub num_frames: usize,
    pub num_bins: usize,
}

impl FlatSpectrogram {
    /// Wrap an existing buffer. `data.len()` should equal
    /// `num_frames * num_bins`; missing cells read as zero.
    pub fn new(data: Vec<f32>, num_frames: usize, num_bins: usize) -> Self {
        Self {
            data,
            num_frames,
            num_bins,
        }
    }

    pub fn zeros(num_frames: usize, num_bins: usize) -> Self {
        Self::new(vec![0.0; num_frames * num_bins], num_frames, num_bins)
    }

    pub fn value(&self, t: usize, f: usize) -> f32 {
        if t >= self.num_frames || f >= self.num_bins {
            return 0.0;
        }
        self.data.get(t * self.num_bins + f).copied().unwrap_or(0.0)
    }
}

/// A point of the (q, p) phase plane derived from one spectrogram cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpacePoint {
    pub time: usize,
    /// Log-compressed frequency position.
    pub q: f64,
    /// Linear amplitude (momentum).
    pub p: f64,
    /// Harmonic oscillator Hamiltonian (p² + q²) / 2.
    pub energy: f64,
    pub frequency: usize,
    pub amplitude: f64,
}

/// Band ratios and spectral shape of the most recent frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub bass: f64,
    pub mid: f64,
    pub treble: f64,
    pub centroid: f64,
    pub spread: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub fft_size: usize,
    pub num_mel_bins: usize,
    pub spectrogram_frames: usize,
    pub max_frames: usize,
    pub sample_rate: f32,
    pub source_connected: bool,
}

pub struct SpectrogramPipeline {
    config: PipelineConfig,
    analyser: Analyser,
    source: Option<Box<dyn AudioSource>>,
    filterbank: Vec<Vec<f32>>,
    frames: VecDeque<SpectrogramFrame>,
    hop: Vec<f32>,
    db: Vec<f32>,
}

impl SpectrogramPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let analyser = Analyser::new(config.fft_size, config.smoothing);
        let config = PipelineConfig {
            fft_size: analyser.fft_size(),
            num_mel_bins: config.num_mel_bins.max(1),
            max_frames: config.max_frames.max(1),
            ..config
        };
        let bin_count = analyser.frequency_bin_count();
        let filterbank = mel_filterbank(config.num_mel_bins, bin_count, config.sample_rate);
        tracing::debug!(
            fft_size = config.fft_size,
            mel_bins = config.num_mel_bins,
            "spectrogram pipeline initialized"
        );
        Self {
            hop: vec![0.0; config.fft_size / 4],
            db: vec![f32::NEG_INFINITY; bin_count],
            config,
            analyser,
            source: None,
            filterbank,
            frames: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Attach the audio source feeding the analyser, replacing any previous one.
    pub fn connect(&mut self, source: Box<dyn AudioSource>) {
        if let Some(rate) = source.sample_rate()
            && (rate - self.config.sample_rate).abs() > f32::EPSILON
        {
            tracing::warn!(
                source_rate = rate,
                pipeline_rate = self.config.sample_rate,
                "audio source sample rate differs from pipeline; mel bands will be mislabeled"
            );
        }
        self.source = Some(source);
        tracing::info!("audio source connected to pipeline");
    }

    pub fn disconnect(&mut self) {
        self.source = None;
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }

    /// Samples consumed per frame (75% window overlap).
    pub fn hop_size(&self) -> usize {
        self.config.fft_size / 4
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    pub fn num_mel_bins(&self) -> usize {
        self.config.num_mel_bins
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &SpectrogramFrame> {
        self.frames.iter()
    }

    /// Pull one hop from the source, analyse it and append a mel frame.
    /// Without a source the analyser sees silence and the frame is all zero.
    pub fn process_frame(&mut self) -> &SpectrogramFrame {
        if let Some(source) = self.source.as_mut() {
            let n = source.read(&mut self.hop);
            self.analyser.push_samples(&self.hop[..n]);
        }
        self.analyser.frequency_data_db(&mut self.db);
        let linear: Vec<f32> = self.db.iter().map(|d| db_to_amplitude(*d)).collect();
        self.push_linear(&linear)
    }

    /// Append a frame from an externally computed decibel spectrum
    /// (`fft_size / 2` bins; missing bins read as silence).
    pub fn process_spectrum_db(&mut self, spectrum_db: &[f32]) -> &SpectrogramFrame {
        let linear: Vec<f32> = spectrum_db.iter().map(|d| db_to_amplitude(*d)).collect();
        self.push_linear(&linear)
    }

    fn push_linear(&mut self, linear: &[f32]) -> &SpectrogramFrame {
        let mel: Vec<f32> = self
            .filterbank
            .iter()
            .map(|filter| filter.iter().zip(linear).map(|(w, a)| w * a).sum())
            .collect();
        if self.frames.len() == self.config.max_frames {
            self.frames.pop_front();
        }
        self.frames.push_back(SpectrogramFrame(mel));
        &self.frames[self.frames.len() - 1]
    }

    /// Row-major copy of every buffered frame.
    pub fn flat(&self) -> FlatSpectrogram {
        let num_bins = self.config.num_mel_bins;
        let mut data = Vec::with_capacity(self.frames.len() * num_bins);
        for frame in &self.frames {
            data.extend_from_slice(&frame.0);
        }
        FlatSpectrogram::new(data, self.frames.len(), num_bins)
    }

    /// Lazily map every non-silent cell to phase space. Each call starts a
    /// fresh scan; the iterator is `Clone` so it can also be replayed.
    pub fn to_phase_space(&self) -> PhaseSpaceIter<'_> {
        PhaseSpaceIter {
            frames: &self.frames,
            t: 0,
            f: 0,
        }
    }

    /// Band ratios, centroid and spread of the latest frame; all-zero when
    /// nothing has been buffered.
    pub fn extract_features(&self) -> AudioFeatures {
        match self.frames.back() {
            Some(frame) => frame_features(&frame.0),
            None => AudioFeatures::default(),
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.analyser.reset();
        tracing::debug!("spectrogram buffer cleared");
    }

    pub fn state(&self) -> PipelineState {
        PipelineState {
            fft_size: self.config.fft_size,
            num_mel_bins: self.config.num_mel_bins,
            spectrogram_frames: self.frames.len(),
            max_frames: self.config.max_frames,
            sample_rate: self.config.sample_rate,
            source_connected: self.source.is_some(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PhaseSpaceIter<'a> {
    frames: &'a VecDeque<SpectrogramFrame>,
    t: usize,
    f: usize,
}

impl Iterator for PhaseSpaceIter<'_> {
    type Item = PhaseSpacePoint;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.frames.get(self.t) {
            while let Some(&amplitude) = frame.0.get(self.f) {
                let f = self.f;
                self.f += 1;
                if amplitude > SILENCE_FLOOR {
                    return Some(phase_point(self.t, f, amplitude));
                }
            }
            self.t += 1;
            self.f = 0;
        }
        None
    }
}

/// q = ln(1 + f / 100), p = amplitude, energy = (p² + q²) / 2.
pub fn phase_point(time: usize, frequency: usize, amplitude: f32) -> PhaseSpacePoint {
    let q = (1.0 + frequency as f64 / Q_SCALE).ln();
    let p = amplitude as f64;
    PhaseSpacePoint {
        time,
        q,
        p,
        energy: (p * p + q * q) / 2.0,
        frequency,
        amplitude: p,
    }
}

fn frame_features(frame: &[f32]) -> AudioFeatures {
    let n = frame.len();
    if n == 0 {
        return AudioFeatures::default();
    }
    let bass_end = (n as f64 * BASS_SPLIT).floor() as usize;
    let mid_end = (n as f64 * MID_SPLIT).floor() as usize;

    let sum = |r: std::ops::Range<usize>| frame[r].iter().map(|v| *v as f64).sum::<f64>();
    let bass = sum(0..bass_end);
    let mid = sum(bass_end..mid_end);
    let treble = sum(mid_end..n);
    let total = bass + mid + treble + EPSILON;

    let total_energy: f64 = frame.iter().map(|v| *v as f64).sum();
    let centroid = if total_energy > 0.0 {
        let weighted: f64 = frame
            .iter()
            .enumerate()
            .map(|(i, v)| i as f64 * *v as f64)
            .sum();
        weighted / total_energy / n as f64
    } else {
        0.5
    };

    let spread = if total_energy > 0.0 {
        let var: f64 = frame
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let d = i as f64 / n as f64 - centroid;
                d * d * *v as f64
            })
            .sum();
        (var / total_energy).sqrt()
    } else {
        0.0
    };

    AudioFeatures {
        bass: bass / total,
        mid: mid / total,
        treble: treble / total,
        centroid,
        spread,
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters evenly spaced on the mel scale from 0 Hz to Nyquist.
pub fn mel_filterbank(num_mel_bins: usize, num_freq_bins: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let sr = sample_rate as f64;
    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(sr / 2.0);
    let step = (max_mel - min_mel) / (num_mel_bins + 1) as f64;

    (0..num_mel_bins)
        .map(|m| {
            let low = mel_to_hz(min_mel + m as f64 * step);
            let center = mel_to_hz(min_mel + (m + 1) as f64 * step);
            let high = mel_to_hz(min_mel + (m + 2) as f64 * step);
            (0..num_freq_bins)
                .map(|k| {
                    let freq = k as f64 * sr / (2 * num_freq_bins) as f64;
                    if freq >= low && freq <= center && center > low {
                        ((freq - low) / (center - low)) as f32
                    } else if freq > center && freq <= high && high > center {
                        ((high - freq) / (high - center)) as f32
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ToneSource;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            sample_rate: 8000.0,
            fft_size: 256,
            num_mel_bins: 16,
            max_frames: 4,
            smoothing: 0.0,
        }
    }

    #[test]
    fn test_unconnected_pipeline_is_silent() {
        let mut p = SpectrogramPipeline::new(small_config());
        let frame = p.process_frame().clone();
        assert_eq!(frame.bins().len(), 16);
        assert!(frame.bins().iter().all(|v| *v == 0.0));
        assert_eq!(p.to_phase_space().count(), 0);
        let feats = p.extract_features();
        assert_eq!(feats.bass, 0.0);
        assert_eq!(feats.spread, 0.0);
        // A silent frame reports a centred spectrum.
        assert_eq!(feats.centroid, 0.5);
    }

    #[test]
    fn test_empty_pipeline_features_are_neutral() {
        let p = SpectrogramPipeline::new(small_config());
        assert_eq!(p.extract_features(), AudioFeatures::default());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut p = SpectrogramPipeline::new(small_config());
        for i in 0..6 {
            let db = vec![-(i as f32); 128];
            p.process_spectrum_db(&db);
        }
        assert_eq!(p.len(), 4);
        // Frames 2..6 remain; the oldest surviving one used -2 dB.
        let first = p.frames().next().unwrap().clone();
        let mut q = SpectrogramPipeline::new(small_config());
        let expect = q.process_spectrum_db(&vec![-2.0; 128]).clone();
        assert_eq!(first, expect);
    }

    #[test]
    fn test_filterbank_triangles_are_bounded() {
        let bank = mel_filterbank(16, 128, 8000.0);
        assert_eq!(bank.len(), 16);
        for filter in &bank {
            assert_eq!(filter.len(), 128);
            assert!(filter.iter().all(|w| (0.0..=1.0).contains(w)));
        }
        // Every band but possibly the narrowest low ones catches some bin.
        let covered = bank.iter().filter(|f| f.iter().any(|w| *w > 0.0)).count();
        assert!(covered >= 12, "only {covered} bands cover a bin");
    }

    #[test]
    fn test_tone_energy_lands_in_expected_band() {
        let mut p = SpectrogramPipeline::new(small_config());
        p.connect(Box::new(ToneSource::new(8000.0, 300.0, 1.0)));
        for _ in 0..8 {
            p.process_frame();
        }
        let feats = p.extract_features();
        assert!(feats.bass > feats.treble, "low tone should be bass-heavy: {feats:?}");
        assert!(p.to_phase_space().count() > 0);
    }

    #[test]
    fn test_phase_space_is_restartable_and_skips_silence() {
        let mut p = SpectrogramPipeline::new(small_config());
        let mut db = vec![f32::NEG_INFINITY; 128];
        db[40] = 0.0;
        p.process_spectrum_db(&db);
        let first: Vec<_> = p.to_phase_space().collect();
        let second: Vec<_> = p.to_phase_space().collect();
        assert!(!first.is_empty());
        assert_eq!(first, second);
        for pt in &first {
            assert!(pt.amplitude > SILENCE_FLOOR as f64);
            assert!((pt.energy - (pt.p * pt.p + pt.q * pt.q) / 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_phase_point_mapping() {
        let pt = phase_point(3, 100, 0.5);
        assert!((pt.q - 2f64.ln()).abs() < 1e-12);
        assert!((pt.p - 0.5).abs() < 1e-12);
        assert_eq!(pt.time, 3);
        assert_eq!(pt.frequency, 100);
    }

    #[test]
    fn test_features_split_bands() {
        let mut frame = vec![0.0f32; 20];
        frame[0] = 1.0; // bass
        frame[19] = 1.0; // treble
        let f = frame_features(&frame);
        assert!((f.bass - 0.5).abs() < 1e-6);
        assert!(f.mid.abs() < 1e-9);
        assert!((f.treble - 0.5).abs() < 1e-6);
        assert!((f.centroid - 19.0 / 2.0 / 20.0).abs() < 1e-9);
        assert!(f.spread > 0.0);
    }

    #[test]
    fn test_flat_layout() {
        let mut p = SpectrogramPipeline::new(small_config());
        p.process_spectrum_db(&vec![0.0; 128]);
        p.process_spectrum_db(&vec![f32::NEG_INFINITY; 128]);
        let flat = p.flat();
        assert_eq!(flat.num_frames, 2);
        assert_eq!(flat.num_bins, 16);
        assert_eq!(flat.data.len(), 32);
        assert!(flat.value(1, 5) == 0.0);
        assert_eq!(flat.value(9, 0), 0.0);
    }
}
