//! Time × frequency grids with an explicit valid interior.
//!
//! Finite-difference fields are undefined on the outer `border` rings of the
//! spectrogram. Rather than trusting loop bounds in every caller, the grid
//! stores only its interior and every accessor answers `None` outside it.
//! A grid too small to have an interior simply has no cells.

use std::ops::Range;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormGrid<T> {
    time_frames: usize,
    frequency_bins: usize,
    border: usize,
    values: Vec<T>,
}

impl<T> FormGrid<T> {
    /// Build a grid over `time_frames × frequency_bins`, evaluating `cell`
    /// at every interior coordinate `(t, f)` in row-major order.
    pub fn from_fn(
        time_frames: usize,
        frequency_bins: usize,
        border: usize,
        mut cell: impl FnMut(usize, usize) -> T,
    ) -> Self {
        let rows = interior_range(time_frames, border);
        let cols = interior_range(frequency_bins, border);
        let mut values = Vec::with_capacity(rows.len() * cols.len());
        for t in rows {
            for f in cols.clone() {
                values.push(cell(t, f));
            }
        }
        Self {
            time_frames,
            frequency_bins,
            border,
            values,
        }
    }

    /// Full (uneroded) number of time frames this grid was laid over.
    pub fn time_frames(&self) -> usize {
        self.time_frames
    }

    /// Full (uneroded) number of frequency bins this grid was laid over.
    pub fn frequency_bins(&self) -> usize {
        self.frequency_bins
    }

    /// Width of the excluded ring around the grid.
    pub fn border(&self) -> usize {
        self.border
    }

    /// Valid time indices.
    pub fn time_range(&self) -> Range<usize> {
        interior_range(self.time_frames, self.border)
    }

    /// Valid frequency indices.
    pub fn frequency_range(&self) -> Range<usize> {
        interior_range(self.frequency_bins, self.border)
    }

    /// Number of valid time rows.
    pub fn rows(&self) -> usize {
        self.time_range().len()
    }

    /// Number of valid cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Interior values in row-major order.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Bounds-checked access in full-grid coordinates.
    pub fn get(&self, t: usize, f: usize) -> Option<&T> {
        let rows = self.time_range();
        let cols = self.frequency_range();
        if !rows.contains(&t) || !cols.contains(&f) {
            return None;
        }
        let idx = (t - rows.start) * cols.len() + (f - cols.start);
        self.values.get(idx)
    }

    /// Nearest-cell lookup at fractional coordinates (floored). Negative or
    /// non-finite coordinates are off-grid.
    pub fn sample(&self, t: f64, f: f64) -> Option<&T> {
        if !t.is_finite() || !f.is_finite() || t < 0.0 || f < 0.0 {
            return None;
        }
        self.get(t.floor() as usize, f.floor() as usize)
    }

    /// Iterate `(t, f, value)` over the interior in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        let rows = self.time_range();
        let cols = self.frequency_range();
        let width = cols.len();
        self.values.iter().enumerate().map(move |(i, v)| {
            let t = rows.start + i / width.max(1);
            let f = cols.start + i % width.max(1);
            (t, f, v)
        })
    }

    /// First valid cell, if the grid has any.
    pub fn first(&self) -> Option<&T> {
        self.values.first()
    }

    /// Same layout, transformed values.
    pub fn map<U>(&self, mut op: impl FnMut(&T) -> U) -> FormGrid<U> {
        FormGrid {
            time_frames: self.time_frames,
            frequency_bins: self.frequency_bins,
            border: self.border,
            values: self.values.iter().map(&mut op).collect(),
        }
    }

    /// Same layout as `self` and `other` combined cell by cell. Returns
    /// `None` when the layouts differ.
    pub fn zip_with<U, V>(
        &self,
        other: &FormGrid<U>,
        mut op: impl FnMut(&T, &U) -> V,
    ) -> Option<FormGrid<V>> {
        if self.time_frames != other.time_frames
            || self.frequency_bins != other.frequency_bins
            || self.border != other.border
            || self.values.len() != other.values.len()
        {
            return None;
        }
        Some(FormGrid {
            time_frames: self.time_frames,
            frequency_bins: self.frequency_bins,
            border: self.border,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| op(a, b))
                .collect(),
        })
    }
}

fn interior_range(len: usize, border: usize) -> Range<usize> {
    if len <= 2 * border {
        0..0
    } else {
        border..len - border
    }
}
