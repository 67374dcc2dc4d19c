//! Zero-dimensional persistence by a fixed sweep of proximity scales.
//!
//! At each of `num_scales + 1` evenly spaced radii in `[0, max_scale]` the
//! points are joined whenever they lie within the radius, and the connected
//! components are found by depth-first search. A component is identified by
//! its sorted member list; the first scale at which a given member list
//! appears is its birth. Nothing dies before the sweep ends, so every
//! component is closed at `max_scale`.
//!
//! Cost is O(scales × n²); callers keep `n` in the hundreds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_SCALE, NUM_SCALES, PERSISTENCE_NOISE_FLOOR};
use crate::current::PhasePoint;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Barcode {
    pub dimension: u8,
    pub birth: f64,
    pub death: f64,
    pub persistence: f64,
    /// Comma-joined sorted point indices of the component.
    pub id: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepParams {
    pub max_scale: f64,
    pub num_scales: usize,
    /// Bars with persistence at or below this are dropped.
    pub noise_floor: f64,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            max_scale: DEFAULT_MAX_SCALE,
            num_scales: NUM_SCALES,
            noise_floor: PERSISTENCE_NOISE_FLOOR,
        }
    }
}

impl SweepParams {
    pub fn with_max_scale(max_scale: f64) -> Self {
        Self {
            max_scale,
            ..Self::default()
        }
    }
}

/// Barcodes sorted by descending persistence; ties keep discovery order.
pub fn compute_persistent_homology(points: &[PhasePoint], params: SweepParams) -> Vec<Barcode> {
    let n = points.len();
    let num_scales = params.num_scales.max(1);
    let step = params.max_scale / num_scales as f64;

    let mut distances = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].distance(points[j]);
            distances[i * n + j] = d;
            distances[j * n + i] = d;
        }
    }

    // Features in discovery order, with an index for membership lookups.
    let mut births: Vec<(String, f64)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..=num_scales {
        let scale = i as f64 * step;
        let adjacency = build_adjacency(&distances, n, scale);
        for mut component in connected_components(&adjacency) {
            component.sort_unstable();
            let id = component
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(",");
            if !seen.contains_key(&id) {
                seen.insert(id.clone(), births.len());
                births.push((id, scale));
            }
        }
    }

    let mut barcodes: Vec<Barcode> = births
        .into_iter()
        .filter_map(|(id, birth)| {
            let death = params.max_scale;
            let persistence = death - birth;
            (persistence > params.noise_floor).then_some(Barcode {
                dimension: 0,
                birth,
                death,
                persistence,
                id,
            })
        })
        .collect();
    barcodes.sort_by(|a, b| b.persistence.total_cmp(&a.persistence));

    tracing::debug!(
        points = n,
        scales = num_scales + 1,
        barcodes = barcodes.len(),
        "persistent homology sweep complete"
    );
    barcodes
}

fn build_adjacency(distances: &[f64], n: usize, scale: f64) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if distances[i * n + j] <= scale {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    adjacency
}

/// Components in order of their lowest unvisited member.
fn connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        visited[start] = true;
        stack.push(start);
        while let Some(node) = stack.pop() {
            component.push(node);
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        components.push(component);
    }
    components
}
