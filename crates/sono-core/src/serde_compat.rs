//! JSON serde for the species export format.
//!
//! The wire format uses camelCase field names and wraps one species record
//! in a versioned envelope: `{"version": "1", "exportedAt": ..., "species":
//! {...}}`. Optional metadata may be absent on import and is defaulted the
//! same way [`SpeciesLibrary::add_species`](crate::species::SpeciesLibrary::add_species)
//! does; signatures are carried verbatim.

use serde::{Deserialize, Serialize};

use crate::species::{
    DEFAULT_CATEGORY, DEFAULT_FREQUENCY_RANGE, DEFAULT_SPECIES_NAME, DEFAULT_TYPICAL_DURATION,
    Signature, SpeciesRecord, SpeciesStats,
};
use crate::time::now_iso8601;

pub const CURRENT_VERSION: &str = "1";

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireExport {
    pub version: String,
    #[serde(rename = "exportedAt", default)]
    pub exported_at: String,
    pub species: WireSpecies,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireSpecies {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency_range: Option<[f64; 2]>,
    #[serde(default)]
    pub typical_duration: Option<f64>,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    /// Informational only; recomputed from signatures on import.
    #[serde(default)]
    pub stats: SpeciesStats,
    #[serde(default)]
    pub date_added: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

// --- Conversion ---

impl WireExport {
    pub fn from_record(record: &SpeciesRecord) -> Self {
        WireExport {
            version: CURRENT_VERSION.to_string(),
            exported_at: now_iso8601(),
            species: WireSpecies {
                id: record.id.clone(),
                name: Some(record.name.clone()),
                scientific_name: record.scientific_name.clone(),
                category: Some(record.category.clone()),
                description: Some(record.description.clone()),
                frequency_range: Some(record.frequency_range),
                typical_duration: Some(record.typical_duration),
                signatures: record.signatures.clone(),
                stats: record.stats.clone(),
                date_added: record.date_added.clone(),
                tags: record.tags.clone(),
            },
        }
    }

    pub fn into_record(self) -> SpeciesRecord {
        let wire = self.species;
        let mut record = SpeciesRecord {
            id: wire.id,
            name: wire.name.unwrap_or_else(|| DEFAULT_SPECIES_NAME.to_string()),
            scientific_name: wire.scientific_name,
            category: wire.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            description: wire.description.unwrap_or_default(),
            frequency_range: wire.frequency_range.unwrap_or(DEFAULT_FREQUENCY_RANGE),
            typical_duration: wire.typical_duration.unwrap_or(DEFAULT_TYPICAL_DURATION),
            signatures: wire.signatures,
            stats: SpeciesStats::default(),
            date_added: if wire.date_added.is_empty() {
                now_iso8601()
            } else {
                wire.date_added
            },
            tags: wire.tags,
        };
        record.recompute_stats();
        record
    }
}

/// Deserialize a species export. An unrecognised version is accepted with a
/// warning; a structurally invalid document is an error.
pub fn import_species_json(json: &str) -> Result<SpeciesRecord, serde_json::Error> {
    let wire: WireExport = serde_json::from_str(json)?;
    if wire.version != CURRENT_VERSION {
        tracing::warn!(
            version = %wire.version,
            expected = CURRENT_VERSION,
            "unknown species export version, importing anyway"
        );
    }
    Ok(wire.into_record())
}

/// Serialize one species record to the export format.
pub fn export_species_json(record: &SpeciesRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireExport::from_record(record))
}
