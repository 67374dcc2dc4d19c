//! The analysis tick and the operations callers run against its results.
//!
//! `BioacousticAnalyzer` owns every stage. One call to
//! [`process_frame`](BioacousticAnalyzer::process_frame) pulls a spectrogram
//! frame and, once warmed up, recomputes forms, trajectories and barcodes
//! over the whole buffer and replaces the current analysis snapshot. The
//! tick never fails; missing data only delays or skips work.
//!
//! Scheduling lives outside the core: `start_analysis`/`stop_analysis` only
//! flip the flag a driver checks between ticks.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::analyser::AudioSource;
use crate::config::AnalyzerConfig;
use crate::current::PhasePoint;
use crate::forms::{Degree, Form, FormSet, FormsComputer, FormsState};
use crate::homology::{CurrentCounts, HomologicalIntegrator, IntegratorState, StokesVerification};
use crate::persistence::Barcode;
use crate::species::{
    LibraryStats, SignatureCurrents, SignatureData, SpeciesComparison, SpeciesLibrary,
};
use crate::spectrogram::{AudioFeatures, PhaseSpacePoint, PipelineState, SpectrogramPipeline};
use crate::time::now_unix_millis;

/// Snapshot assembled by the latest completed tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAnalysis {
    /// Unix milliseconds.
    pub timestamp: u64,
    pub forms: FormSet,
    pub phase_space: Vec<PhaseSpacePoint>,
    pub barcodes: Vec<Barcode>,
    pub features: AudioFeatures,
    pub current_count: CurrentCounts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not enough frames buffered yet.
    WarmingUp { frames: usize, required: usize },
    Analyzed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerState {
    pub is_analyzing: bool,
    pub has_analysis: bool,
    pub spectrogram: PipelineState,
    pub forms: FormsState,
    pub homology: IntegratorState,
    pub library: LibraryStats,
}

pub struct BioacousticAnalyzer {
    config: AnalyzerConfig,
    pipeline: SpectrogramPipeline,
    forms: FormsComputer,
    homology: HomologicalIntegrator,
    library: SpeciesLibrary,
    analyzing: bool,
    current: Option<CurrentAnalysis>,
}

impl BioacousticAnalyzer {
    /// An analyzer with the default species seeded.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self::with_library(config, SpeciesLibrary::new())
    }

    pub fn with_library(config: AnalyzerConfig, library: SpeciesLibrary) -> Self {
        let pipeline = SpectrogramPipeline::new(config.pipeline.clone());
        let forms = FormsComputer::new(pipeline.sample_rate());
        let homology = HomologicalIntegrator::new(config.cache_capacity, config.sweep_params());
        tracing::debug!(
            update_rate_ms = config.update_rate_ms,
            warmup = config.warmup_frames,
            "bioacoustic analyzer initialized"
        );
        Self {
            config,
            pipeline,
            forms,
            homology,
            library,
            analyzing: false,
            current: None,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn update_rate(&self) -> Duration {
        Duration::from_millis(self.config.update_rate_ms.max(1))
    }

    pub fn connect(&mut self, source: Box<dyn AudioSource>) {
        self.pipeline.connect(source);
    }

    /// Mark analysis as running. Returns `false` if it already was.
    pub fn start_analysis(&mut self) -> bool {
        if self.analyzing {
            tracing::warn!("analysis already running");
            return false;
        }
        self.analyzing = true;
        tracing::info!("starting bioacoustic analysis");
        true
    }

    pub fn stop_analysis(&mut self) {
        if self.analyzing {
            self.analyzing = false;
            tracing::info!("stopping bioacoustic analysis");
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    /// Run one analysis tick.
    pub fn process_frame(&mut self) -> TickOutcome {
        self.pipeline.process_frame();

        let frames = self.pipeline.len();
        if frames < self.config.warmup_frames {
            return TickOutcome::WarmingUp {
                frames,
                required: self.config.warmup_frames,
            };
        }

        let flat = self.pipeline.flat();
        let forms = self.forms.compute_forms_from_spectrogram(&flat);
        let phase_space: Vec<PhaseSpacePoint> = self.pipeline.to_phase_space().collect();

        self.extract_currents(&phase_space);

        let cloud = stride_points(&phase_space, self.config.max_homology_points);
        let barcodes = self
            .homology
            .compute_persistent_homology(&cloud, self.config.max_scale);
        let features = self.pipeline.extract_features();
        let current_count = self.homology.state().currents;

        tracing::debug!(
            frames,
            points = phase_space.len(),
            barcodes = barcodes.len(),
            curves = current_count.one,
            "analysis tick complete"
        );

        self.current = Some(CurrentAnalysis {
            timestamp: now_unix_millis(),
            forms,
            phase_space,
            barcodes,
            features,
            current_count,
        });
        TickOutcome::Analyzed
    }

    /// Turn every `trajectory_window` consecutive time frames into a
    /// 1-current through each frame's highest-energy point. Returns how many
    /// currents were created.
    pub fn extract_currents(&mut self, phase_space: &[PhaseSpacePoint]) -> usize {
        let mut peaks: BTreeMap<usize, PhaseSpacePoint> = BTreeMap::new();
        for point in phase_space {
            peaks
                .entry(point.time)
                .and_modify(|best| {
                    if point.energy > best.energy {
                        *best = *point;
                    }
                })
                .or_insert(*point);
        }

        let peaks: Vec<PhaseSpacePoint> = peaks.into_values().collect();
        let window = self.config.trajectory_window.max(1);
        let mut created = 0;
        let mut i = 0;
        while i + window < peaks.len() {
            let trajectory: Vec<PhasePoint> = peaks[i..i + window]
                .iter()
                .map(|pt| PhasePoint::new(pt.q, pt.p))
                .collect();
            if trajectory.len() >= self.config.min_trajectory_points {
                self.homology.create_one_current(trajectory, 1.0);
                created += 1;
            }
            i += window;
        }
        created
    }

    /// Freeze the current analysis into a signature of `species_id`.
    pub fn capture_signature(&mut self, species_id: &str) -> Option<Uuid> {
        let Some(analysis) = &self.current else {
            tracing::warn!(species = species_id, "no analysis data to capture");
            return None;
        };

        let sample_rate = self.pipeline.sample_rate();
        let duration =
            self.pipeline.len() as f64 * self.pipeline.hop_size() as f64 / sample_rate as f64;
        let data = SignatureData {
            spectrogram: self.pipeline.flat(),
            forms: analysis.forms.clone(),
            currents: SignatureCurrents {
                zero: self.homology.currents(Degree::Zero).to_vec(),
                one: self.homology.currents(Degree::One).to_vec(),
                two: self.homology.currents(Degree::Two).to_vec(),
            },
            barcodes: analysis.barcodes.clone(),
            phase_space: analysis.phase_space.clone(),
            features: analysis.features,
            duration,
            sample_rate,
            notes: String::new(),
        };
        self.library.add_signature(species_id, data)
    }

    /// Structural smoke test of the boundary/pairing path on live data.
    ///
    /// Pairs the boundary of the first trajectory with the first energy
    /// value as a constant 0-form, and the trajectory itself with that
    /// form's exterior derivative. Both sides are zero for a well-formed
    /// trajectory: a failure means the boundary chain, the degree routing
    /// or a non-finite vertex is broken, not that the sampled energy field
    /// violates Stokes. Trajectories live in phase coordinates, far inside
    /// the first grid cell, so the sampled fields cannot be paired with
    /// them directly. `None` without a trajectory or forms.
    pub fn verify_stokes_theorem(&mut self) -> Option<StokesVerification> {
        let Some(current) = self.homology.currents(Degree::One).first().cloned() else {
            tracing::warn!("no 1-currents available for Stokes verification");
            return None;
        };
        let Some(energy) = self
            .current
            .as_ref()
            .and_then(|a| a.forms.zero_forms.first().copied())
        else {
            tracing::warn!("no differential forms available for Stokes verification");
            return None;
        };

        let form = Form::constant_zero(energy);
        let d_form = form.exterior_derivative()?;
        let result = self.homology.verify_stokes(&current, &form, &d_form);
        tracing::info!(verified = result.verified(), "Stokes verification");
        Some(result)
    }

    pub fn compare_species(&self, id_a: &str, id_b: &str) -> Option<SpeciesComparison> {
        self.library.compare_species(id_a, id_b)
    }

    pub fn current_analysis(&self) -> Option<&CurrentAnalysis> {
        self.current.as_ref()
    }

    pub fn audio_features(&self) -> AudioFeatures {
        self.pipeline.extract_features()
    }

    pub fn pipeline(&self) -> &SpectrogramPipeline {
        &self.pipeline
    }

    pub fn integrator(&self) -> &HomologicalIntegrator {
        &self.homology
    }

    pub fn integrator_mut(&mut self) -> &mut HomologicalIntegrator {
        &mut self.homology
    }

    pub fn library(&self) -> &SpeciesLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut SpeciesLibrary {
        &mut self.library
    }

    pub fn into_library(self) -> SpeciesLibrary {
        self.library
    }

    pub fn state(&self) -> AnalyzerState {
        AnalyzerState {
            is_analyzing: self.analyzing,
            has_analysis: self.current.is_some(),
            spectrogram: self.pipeline.state(),
            forms: self.forms.state(),
            homology: self.homology.state(),
            library: self.library.stats(),
        }
    }

    /// Stop, and drop buffered frames, currents and the snapshot.
    pub fn clear(&mut self) {
        self.stop_analysis();
        self.pipeline.clear();
        self.forms.clear();
        self.homology.clear();
        self.current = None;
        tracing::info!("analysis data cleared");
    }

    /// [`clear`](Self::clear), then replace the library with the defaults.
    pub fn reset(&mut self) {
        self.clear();
        self.library.clear();
        self.library.initialize_default_species();
        tracing::info!("analyzer reset to initial state");
    }
}

/// Every `⌈n / max⌉`-th point, so at most `max` survive.
fn stride_points(points: &[PhaseSpacePoint], max: usize) -> Vec<PhasePoint> {
    if points.is_empty() || max == 0 {
        return Vec::new();
    }
    let stride = points.len().div_ceil(max);
    points
        .iter()
        .step_by(stride)
        .map(|p| PhasePoint::new(p.q, p.p))
        .collect()
}
