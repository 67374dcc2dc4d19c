//! Sonotope bioacoustic topology engine.
//!
//! Turns a live audio stream into a geometric fingerprint: a mel spectrogram
//! mapped onto a (q, p) phase plane, discrete differential forms over it,
//! currents traced through it, and a zero-dimensional persistence barcode of
//! the point cloud. Fingerprints are stored per species and compared.
//!
//! No file or network I/O; persistence and transport live in other crates.

pub mod analyser;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod constants;
pub mod current;
pub mod forms;
pub mod grid;
pub mod homology;
pub mod persistence;
pub mod serde_compat;
pub mod species;
pub mod spectrogram;
pub mod synth;
pub mod time;

pub use analyser::{Analyser, AudioSource, amplitude_to_db, db_to_amplitude};
pub use analyzer::{AnalyzerState, BioacousticAnalyzer, CurrentAnalysis, TickOutcome};
pub use cache::IntegrationCache;
pub use config::AnalyzerConfig;
pub use constants::{EPSILON, STOKES_TOLERANCE};
pub use current::{Chain, Current, CurrentId, CurrentKey, PhasePoint, Shape, Triangle};
pub use forms::{
    Covector, Degree, Field, Form, FormKey, FormSet, FormsComputer, pullback, wedge_product,
};
pub use grid::FormGrid;
pub use homology::{HomologicalIntegrator, IntegratorState, StokesVerification};
pub use persistence::{Barcode, SweepParams, compute_persistent_homology};
pub use serde_compat::{CURRENT_VERSION, export_species_json, import_species_json};
pub use species::{
    LibraryStats, NewSpecies, Signature, SignatureData, SpeciesComparison, SpeciesLibrary,
    SpeciesRecord, SpeciesStats,
};
pub use spectrogram::{
    AudioFeatures, FlatSpectrogram, PhaseSpacePoint, PipelineConfig, SpectrogramFrame,
    SpectrogramPipeline,
};
pub use synth::{BufferSource, ChirpSource, PulseSource, ToneSource};
