//! Species library: per-source signatures, rolling statistics and
//! cross-species comparison.
//!
//! Every failure here is soft. Unknown species, empty signature lists and
//! malformed imports log once and return `None`/`false`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    CURRENT_WEIGHT, DEFAULT_SAMPLE_RATE, EPSILON, FORM_WEIGHT, HOMOLOGY_WEIGHT, NEUTRAL_SIMILARITY,
};
use crate::current::Current;
use crate::forms::FormSet;
use crate::persistence::Barcode;
use crate::serde_compat;
use crate::spectrogram::{AudioFeatures, FlatSpectrogram, PhaseSpacePoint};
use crate::time::now_iso8601;

pub const DEFAULT_SPECIES_NAME: &str = "Unknown Species";
pub const DEFAULT_CATEGORY: &str = "unknown";
pub const DEFAULT_FREQUENCY_RANGE: [f64; 2] = [0.0, 22_050.0];
pub const DEFAULT_TYPICAL_DURATION: f64 = 5.0;

/// Metadata for a new species; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewSpecies {
    pub id: Option<String>,
    pub name: Option<String>,
    pub scientific_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub frequency_range: Option<[f64; 2]>,
    pub typical_duration: Option<f64>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeciesStats {
    pub num_recordings: usize,
    /// Mean spectral centroid.
    pub avg_frequency: f64,
    /// Mean of the three band ratios.
    pub avg_amplitude: f64,
    /// Mean barcode count.
    pub avg_complexity: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureCurrents {
    pub zero: Vec<Current>,
    pub one: Vec<Current>,
    pub two: Vec<Current>,
}

/// Analysis output handed to [`SpeciesLibrary::add_signature`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    pub spectrogram: FlatSpectrogram,
    pub forms: FormSet,
    pub currents: SignatureCurrents,
    pub barcodes: Vec<Barcode>,
    pub phase_space: Vec<PhaseSpacePoint>,
    pub features: AudioFeatures,
    /// Seconds of audio covered by the spectrogram.
    pub duration: f64,
    pub sample_rate: f32,
    pub notes: String,
}

impl Default for SignatureData {
    fn default() -> Self {
        Self {
            spectrogram: FlatSpectrogram::default(),
            forms: FormSet::empty(DEFAULT_SAMPLE_RATE),
            currents: SignatureCurrents::default(),
            barcodes: Vec::new(),
            phase_space: Vec::new(),
            features: AudioFeatures::default(),
            duration: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            notes: String::new(),
        }
    }
}

/// A frozen analysis snapshot owned by one species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub id: Uuid,
    pub timestamp: String,
    #[serde(flatten)]
    pub data: SignatureData,
}

impl Signature {
    pub fn new(data: SignatureData) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_iso8601(),
            data,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesRecord {
    pub id: String,
    pub name: String,
    pub scientific_name: Option<String>,
    pub category: String,
    pub description: String,
    /// `[low, high]` in Hz.
    pub frequency_range: [f64; 2],
    /// Seconds.
    pub typical_duration: f64,
    pub signatures: Vec<Signature>,
    pub stats: SpeciesStats,
    pub date_added: String,
    pub tags: Vec<String>,
}

impl SpeciesRecord {
    /// Fill defaults for anything `meta` leaves out.
    pub fn from_metadata(meta: NewSpecies) -> Self {
        Self {
            id: meta
                .id
                .unwrap_or_else(|| format!("species_{}", Uuid::new_v4().simple())),
            name: meta.name.unwrap_or_else(|| DEFAULT_SPECIES_NAME.to_string()),
            scientific_name: meta.scientific_name,
            category: meta.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            description: meta.description.unwrap_or_default(),
            frequency_range: meta.frequency_range.unwrap_or(DEFAULT_FREQUENCY_RANGE),
            typical_duration: meta.typical_duration.unwrap_or(DEFAULT_TYPICAL_DURATION),
            signatures: Vec::new(),
            stats: SpeciesStats::default(),
            date_added: now_iso8601(),
            tags: meta.tags,
        }
    }

    /// Recompute `stats` over every signature.
    pub fn recompute_stats(&mut self) {
        let n = self.signatures.len();
        self.stats.num_recordings = n;
        if n == 0 {
            self.stats = SpeciesStats::default();
            return;
        }
        let (mut freq, mut amp, mut complexity) = (0.0, 0.0, 0.0);
        for sig in &self.signatures {
            let f = &sig.data.features;
            freq += f.centroid;
            amp += (f.bass + f.mid + f.treble) / 3.0;
            complexity += sig.data.barcodes.len() as f64;
        }
        let n = n as f64;
        self.stats.avg_frequency = freq / n;
        self.stats.avg_amplitude = amp / n;
        self.stats.avg_complexity = complexity / n;
    }

    pub fn center_frequency(&self) -> f64 {
        (self.frequency_range[0] + self.frequency_range[1]) / 2.0
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .scientific_name
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(needle))
            || self.description.to_lowercase().contains(needle)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRef {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityDetails {
    pub forms: f64,
    pub currents: f64,
    pub homology: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesComparison {
    pub species1: SpeciesRef,
    pub species2: SpeciesRef,
    /// `0.4·forms + 0.4·currents + 0.2·homology`.
    pub similarity: f64,
    pub details: SimilarityDetails,
    /// Ratio of the second species' center frequency to the first's.
    pub frequency_shift: f64,
    pub timestamp: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub total_species: usize,
    pub total_signatures: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub avg_signatures_per_species: f64,
}

/// Species keyed by id, iterated in id order.
#[derive(Clone, Debug, Default)]
pub struct SpeciesLibrary {
    species: BTreeMap<String, SpeciesRecord>,
}

impl SpeciesLibrary {
    /// A library holding the two illustrative default species.
    pub fn new() -> Self {
        let mut lib = Self::empty();
        lib.initialize_default_species();
        lib
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Seed a songbird (2–8 kHz) and a whale (20–500 Hz).
    pub fn initialize_default_species(&mut self) {
        self.add_species(NewSpecies {
            id: Some("example_bird_1".into()),
            name: Some("Example Songbird".into()),
            scientific_name: Some("Passeridae exemplaris".into()),
            category: Some("bird".into()),
            description: Some("Example bioacoustic signature for testing".into()),
            frequency_range: Some([2000.0, 8000.0]),
            typical_duration: Some(2.5),
            tags: Vec::new(),
        });
        self.add_species(NewSpecies {
            id: Some("example_whale_1".into()),
            name: Some("Example Whale".into()),
            scientific_name: Some("Cetacea exemplaris".into()),
            category: Some("whale".into()),
            description: Some("Example whale vocalization signature".into()),
            frequency_range: Some([20.0, 500.0]),
            typical_duration: Some(10.0),
            tags: Vec::new(),
        });
        tracing::debug!(count = self.species.len(), "default species loaded");
    }

    /// Insert a species with defaults filled in, returning its id. An
    /// existing record with the same id is replaced.
    pub fn add_species(&mut self, meta: NewSpecies) -> String {
        let record = SpeciesRecord::from_metadata(meta);
        let id = record.id.clone();
        tracing::info!(id = %id, name = %record.name, "added species");
        self.insert_record(record);
        id
    }

    /// Insert a fully formed record (store load, import).
    pub fn insert_record(&mut self, record: SpeciesRecord) {
        if let Some(old) = self.species.insert(record.id.clone(), record) {
            tracing::warn!(id = %old.id, "replaced existing species record");
        }
    }

    /// Freeze `data` into a new signature and refresh the species stats.
    pub fn add_signature(&mut self, species_id: &str, data: SignatureData) -> Option<Uuid> {
        let Some(record) = self.species.get_mut(species_id) else {
            tracing::warn!(species = species_id, "species not found");
            return None;
        };
        let signature = Signature::new(data);
        let id = signature.id;
        record.signatures.push(signature);
        record.recompute_stats();
        tracing::info!(species = species_id, signature = %id, "added signature");
        Some(id)
    }

    pub fn get_species(&self, id: &str) -> Option<&SpeciesRecord> {
        self.species.get(id)
    }

    pub fn get_species_by_category(&self, category: &str) -> Vec<&SpeciesRecord> {
        self.species
            .values()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Case-insensitive substring match over name, scientific name and
    /// description.
    pub fn search_species(&self, query: &str) -> Vec<&SpeciesRecord> {
        let needle = query.to_lowercase();
        self.species.values().filter(|s| s.matches(&needle)).collect()
    }

    pub fn species(&self) -> impl Iterator<Item = &SpeciesRecord> {
        self.species.values()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Compare the first signature of each species.
    pub fn compare_species(&self, id_a: &str, id_b: &str) -> Option<SpeciesComparison> {
        let (Some(a), Some(b)) = (self.species.get(id_a), self.species.get(id_b)) else {
            tracing::warn!(a = id_a, b = id_b, "one or both species not found");
            return None;
        };
        let (Some(sig_a), Some(sig_b)) = (a.signatures.first(), b.signatures.first()) else {
            tracing::warn!(a = id_a, b = id_b, "one or both species have no signatures");
            return None;
        };

        let details = SimilarityDetails {
            forms: compare_forms(&sig_a.data.forms, &sig_b.data.forms),
            currents: compare_trajectories(&sig_a.data.currents.one, &sig_b.data.currents.one),
            homology: compare_homology(&sig_a.data.barcodes, &sig_b.data.barcodes),
        };
        let similarity = FORM_WEIGHT * details.forms
            + CURRENT_WEIGHT * details.currents
            + HOMOLOGY_WEIGHT * details.homology;

        tracing::info!(a = %a.name, b = %b.name, similarity, "compared species");
        Some(SpeciesComparison {
            species1: SpeciesRef {
                id: a.id.clone(),
                name: a.name.clone(),
            },
            species2: SpeciesRef {
                id: b.id.clone(),
                name: b.name.clone(),
            },
            similarity,
            details,
            frequency_shift: frequency_shift(a, b),
            timestamp: now_iso8601(),
        })
    }

    /// Pretty JSON in the versioned export format, or `None` if unknown.
    pub fn export_species(&self, id: &str) -> Option<String> {
        let record = self.species.get(id)?;
        match serde_compat::export_species_json(record) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(species = id, error = %e, "export failed");
                None
            }
        }
    }

    /// Parse and insert a species, returning its id. Malformed input logs
    /// and returns `None`.
    pub fn import_species(&mut self, json: &str) -> Option<String> {
        match serde_compat::import_species_json(json) {
            Ok(mut record) => {
                record.recompute_stats();
                let id = record.id.clone();
                tracing::info!(id = %id, name = %record.name, "imported species");
                self.insert_record(record);
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "species import failed");
                None
            }
        }
    }

    pub fn stats(&self) -> LibraryStats {
        let total_species = self.species.len();
        let mut total_signatures = 0;
        let mut category_counts = BTreeMap::new();
        for s in self.species.values() {
            total_signatures += s.signatures.len();
            *category_counts.entry(s.category.clone()).or_insert(0) += 1;
        }
        LibraryStats {
            total_species,
            total_signatures,
            category_counts,
            avg_signatures_per_species: if total_species > 0 {
                total_signatures as f64 / total_species as f64
            } else {
                0.0
            },
        }
    }

    pub fn clear(&mut self) {
        self.species.clear();
        tracing::debug!("species library cleared");
    }
}

fn relative_similarity(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() / a.max(b).max(EPSILON);
    (1.0 - diff).max(0.0)
}

/// Similarity of two-form magnitudes.
pub fn compare_forms(a: &FormSet, b: &FormSet) -> f64 {
    relative_similarity(a.two_form_magnitude(), b.two_form_magnitude())
}

/// Similarity of mean trajectory point counts; neutral if either side has
/// no trajectories.
pub fn compare_trajectories(a: &[Current], b: &[Current]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return NEUTRAL_SIMILARITY;
    }
    let mean = |cs: &[Current]| {
        cs.iter().map(|c| c.points().len() as f64).sum::<f64>() / cs.len() as f64
    };
    relative_similarity(mean(a), mean(b))
}

/// Similarity of barcode counts; neutral if either side has none.
pub fn compare_homology(a: &[Barcode], b: &[Barcode]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return NEUTRAL_SIMILARITY;
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    (1.0 - (na - nb).abs() / na.max(nb)).max(0.0)
}

/// `center(b) / center(a)`: the factor that maps `a`'s range onto `b`'s.
pub fn frequency_shift(a: &SpeciesRecord, b: &SpeciesRecord) -> f64 {
    let ca = a.center_frequency();
    let ca = if ca.abs() < EPSILON { EPSILON } else { ca };
    b.center_frequency() / ca
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current::{CurrentId, PhasePoint, Shape};
    use crate::forms::Degree;

    fn curve(n: usize) -> Current {
        let shape = Shape::Curve((0..n).map(|i| PhasePoint::new(i as f64, 0.0)).collect());
        Current {
            id: CurrentId {
                degree: Degree::One,
                index: 0,
            },
            weight: 1.0,
            measure: shape.measure(),
            shape,
        }
    }

    fn bar() -> Barcode {
        Barcode {
            dimension: 0,
            birth: 0.0,
            death: 2.0,
            persistence: 2.0,
            id: "0".into(),
        }
    }

    #[test]
    fn test_defaults_seeded() {
        let lib = SpeciesLibrary::new();
        assert_eq!(lib.len(), 2);
        let bird = lib.get_species("example_bird_1").unwrap();
        assert_eq!(bird.frequency_range, [2000.0, 8000.0]);
        assert_eq!(bird.category, "bird");
        assert!(lib.get_species("nope").is_none());
    }

    #[test]
    fn test_add_species_fills_defaults() {
        let mut lib = SpeciesLibrary::empty();
        let id = lib.add_species(NewSpecies {
            id: Some("x".into()),
            ..Default::default()
        });
        let rec = lib.get_species(&id).unwrap();
        assert_eq!(rec.name, DEFAULT_SPECIES_NAME);
        assert_eq!(rec.category, DEFAULT_CATEGORY);
        assert_eq!(rec.frequency_range, DEFAULT_FREQUENCY_RANGE);
        assert_eq!(rec.typical_duration, DEFAULT_TYPICAL_DURATION);
        assert!(rec.scientific_name.is_none());
    }

    #[test]
    fn test_generated_id_when_missing() {
        let mut lib = SpeciesLibrary::empty();
        let id = lib.add_species(NewSpecies::default());
        assert!(id.starts_with("species_"));
        // Back-to-back additions must not collide.
        let other = lib.add_species(NewSpecies::default());
        assert_ne!(id, other);
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn test_add_signature_updates_stats() {
        let mut lib = SpeciesLibrary::new();
        let mut data = SignatureData::default();
        data.features = AudioFeatures {
            bass: 0.3,
            mid: 0.6,
            treble: 0.9,
            centroid: 0.4,
            spread: 0.1,
        };
        data.barcodes = vec![bar(), bar()];
        assert!(lib.add_signature("example_bird_1", data).is_some());
        lib.add_signature("example_bird_1", SignatureData::default());

        let stats = &lib.get_species("example_bird_1").unwrap().stats;
        assert_eq!(stats.num_recordings, 2);
        assert!((stats.avg_frequency - 0.2).abs() < 1e-12);
        assert!((stats.avg_amplitude - 0.3).abs() < 1e-12);
        assert!((stats.avg_complexity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_signature_unknown_species() {
        let mut lib = SpeciesLibrary::new();
        assert!(lib.add_signature("ghost", SignatureData::default()).is_none());
    }

    #[test]
    fn test_search_and_category() {
        let lib = SpeciesLibrary::new();
        assert_eq!(lib.search_species("WHALE").len(), 1);
        assert_eq!(lib.search_species("exemplaris").len(), 2);
        assert_eq!(lib.search_species("vocalization").len(), 1);
        assert!(lib.search_species("dolphin").is_empty());
        assert_eq!(lib.get_species_by_category("bird").len(), 1);
    }

    #[test]
    fn test_compare_trivial_defaults() {
        let mut lib = SpeciesLibrary::new();
        lib.add_signature("example_bird_1", SignatureData::default());
        lib.add_signature("example_whale_1", SignatureData::default());
        let cmp = lib.compare_species("example_bird_1", "example_whale_1").unwrap();
        assert!((0.0..=1.0).contains(&cmp.similarity));
        assert!((cmp.details.forms - 1.0).abs() < 1e-12);
        assert_eq!(cmp.details.currents, NEUTRAL_SIMILARITY);
        assert_eq!(cmp.details.homology, NEUTRAL_SIMILARITY);
        assert!((cmp.similarity - 0.7).abs() < 1e-12);
        assert!((cmp.frequency_shift - 260.0 / 5000.0).abs() < 1e-12);
    }

    #[test]
    fn test_compare_requires_signatures() {
        let mut lib = SpeciesLibrary::new();
        assert!(lib.compare_species("example_bird_1", "example_whale_1").is_none());
        lib.add_signature("example_bird_1", SignatureData::default());
        assert!(lib.compare_species("example_bird_1", "example_whale_1").is_none());
        assert!(lib.compare_species("example_bird_1", "ghost").is_none());
    }

    #[test]
    fn test_trajectory_and_homology_similarity() {
        assert!((compare_trajectories(&[curve(4)], &[curve(2)]) - 0.5).abs() < 1e-12);
        assert_eq!(compare_trajectories(&[curve(3)], &[curve(3)]), 1.0);
        assert!((compare_homology(&[bar()], &[bar(), bar()]) - 0.5).abs() < 1e-12);
        assert_eq!(compare_homology(&[], &[bar()]), NEUTRAL_SIMILARITY);
    }

    #[test]
    fn test_library_stats() {
        let mut lib = SpeciesLibrary::new();
        lib.add_signature("example_whale_1", SignatureData::default());
        lib.add_species(NewSpecies {
            id: Some("gull".into()),
            category: Some("bird".into()),
            ..Default::default()
        });
        let s = lib.stats();
        assert_eq!(s.total_species, 3);
        assert_eq!(s.total_signatures, 1);
        assert_eq!(s.category_counts.get("bird"), Some(&2));
        assert!((s.avg_signatures_per_species - 1.0 / 3.0).abs() < 1e-12);
        lib.clear();
        assert_eq!(lib.stats(), LibraryStats::default());
    }

    #[test]
    fn test_export_import() {
        let mut lib = SpeciesLibrary::new();
        lib.add_signature("example_bird_1", SignatureData::default());
        let json = lib.export_species("example_bird_1").unwrap();
        assert!(lib.export_species("ghost").is_none());

        let mut other = SpeciesLibrary::empty();
        let id = other.import_species(&json).unwrap();
        assert_eq!(id, "example_bird_1");
        let rec = other.get_species(&id).unwrap();
        assert_eq!(rec.signatures.len(), 1);
        assert_eq!(rec.stats.num_recordings, 1);
        assert_eq!(
            rec.signatures[0].id,
            lib.get_species(&id).unwrap().signatures[0].id
        );
    }

    #[test]
    fn test_import_malformed_is_none() {
        let mut lib = SpeciesLibrary::empty();
        assert!(lib.import_species("{ not json").is_none());
        assert!(lib.is_empty());
    }
}
