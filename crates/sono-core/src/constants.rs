/// Default audio sample rate (Hz).
pub const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;

/// Default FFT window length in samples.
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Number of triangular mel bands per spectrogram frame.
pub const NUM_MEL_BINS: usize = 128;

/// Ring-buffer capacity of the spectrogram (frames).
pub const SPECTROGRAM_MAX_FRAMES: usize = 100;

/// Exponential smoothing applied to successive FFT magnitudes.
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.3;

/// Amplitudes at or below this are dropped from the phase-space cloud.
pub const SILENCE_FLOOR: f32 = 1e-6;

/// Bass/mid split as a fraction of mel bins.
pub const BASS_SPLIT: f64 = 0.25;

/// Mid/treble split as a fraction of mel bins.
pub const MID_SPLIT: f64 = 0.6;

/// Frequency offset (in bins) of the log compression q = ln(1 + f / Q_SCALE).
pub const Q_SCALE: f64 = 100.0;

/// Step for numerical Jacobians in the pullback.
pub const PULLBACK_EPSILON: f64 = 1e-6;

/// Absolute tolerance for the discrete Stokes check.
pub const STOKES_TOLERANCE: f64 = 1e-6;

/// Number of filtration radii swept by the persistence routine.
pub const NUM_SCALES: usize = 50;

/// Default upper filtration radius.
pub const DEFAULT_MAX_SCALE: f64 = 2.0;

/// Barcodes with persistence at or below this are discarded.
pub const PERSISTENCE_NOISE_FLOOR: f64 = 0.01;

/// Upper bound on points handed to the persistence sweep per tick.
pub const MAX_HOMOLOGY_POINTS: usize = 256;

/// Hard bound on memoized integrals.
pub const INTEGRATION_CACHE_CAPACITY: usize = 1000;

/// Frames required in the ring buffer before a tick analyses anything.
pub const WARMUP_FRAMES: usize = 10;

/// Consecutive time frames folded into one trajectory current.
pub const TRAJECTORY_WINDOW: usize = 5;

/// Minimum points for a trajectory to become a 1-current.
pub const MIN_TRAJECTORY_POINTS: usize = 3;

/// Period of the analysis tick (milliseconds).
pub const DEFAULT_UPDATE_RATE_MS: u64 = 100;

/// Weights of the species similarity blend (forms, currents, homology).
pub const FORM_WEIGHT: f64 = 0.4;
pub const CURRENT_WEIGHT: f64 = 0.4;
pub const HOMOLOGY_WEIGHT: f64 = 0.2;

/// Similarity reported when one side of a comparison has no data.
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

/// Numerical epsilon for near-zero denominators
pub const EPSILON: f64 = 1e-10;
