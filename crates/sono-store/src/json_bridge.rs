use std::fs;
use std::path::Path;

use sono_core::{export_species_json, import_species_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import one species export file, replacing any stored species with
    /// the same id. Returns the imported id.
    pub fn import_species_file(&self, path: &Path) -> Result<String> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_species_str(&json)
    }

    pub fn import_species_str(&self, json: &str) -> Result<String> {
        let record = import_species_json(json).map_err(|e| {
            tracing::error!(error = %e, "species import failed");
            StoreError::InvalidData(format!("invalid species JSON: {e}"))
        })?;
        self.save_species(&record)?;
        tracing::info!(id = %record.id, signatures = record.signatures.len(), "imported species");
        Ok(record.id)
    }

    /// Write the stored species `id` to `path` in the export format.
    pub fn export_species_file(&self, id: &str, path: &Path) -> Result<()> {
        let json = self.export_species_string(id)?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn export_species_string(&self, id: &str) -> Result<String> {
        let library = self.load_library()?;
        let record = library
            .get_species(id)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown species: {id}")))?;
        Ok(export_species_json(record)?)
    }
}
