//! Homological integration: the pairing ⟨T, α⟩ between currents and forms,
//! a discrete Stokes check built on it, and the persistence sweep.
//!
//! The integrator owns per-degree current collections with their id
//! counters, the last barcode set and the bounded integration cache. All of
//! it is reset together by [`HomologicalIntegrator::clear`].

use serde::Serialize;

use crate::cache::IntegrationCache;
use crate::constants::{EPSILON, INTEGRATION_CACHE_CAPACITY, STOKES_TOLERANCE};
use crate::current::{Chain, Current, CurrentId, PhasePoint, Shape, Triangle};
use crate::forms::{Degree, Form};
use crate::persistence::{Barcode, SweepParams, compute_persistent_homology};

/// Outcome of comparing ⟨∂T, α⟩ with ⟨T, dα⟩.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StokesVerification {
    Evaluated {
        lhs: f64,
        rhs: f64,
        error: f64,
        verified: bool,
    },
    /// The current has no boundary, so there is nothing to pair.
    BoundaryZero,
}

impl StokesVerification {
    pub fn verified(&self) -> bool {
        matches!(self, StokesVerification::Evaluated { verified: true, .. })
    }

    pub fn error(&self) -> Option<f64> {
        match self {
            StokesVerification::Evaluated { error, .. } => Some(*error),
            StokesVerification::BoundaryZero => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCounts {
    pub zero: usize,
    pub one: usize,
    pub two: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratorState {
    pub currents: CurrentCounts,
    pub persistent_barcodes: usize,
    pub cache_size: usize,
}

#[derive(Debug)]
pub struct HomologicalIntegrator {
    currents: [Vec<Current>; 3],
    next_index: [u64; 3],
    barcodes: Vec<Barcode>,
    cache: IntegrationCache,
    sweep: SweepParams,
}

impl Default for HomologicalIntegrator {
    fn default() -> Self {
        Self::new(INTEGRATION_CACHE_CAPACITY, SweepParams::default())
    }
}

impl HomologicalIntegrator {
    pub fn new(cache_capacity: usize, sweep: SweepParams) -> Self {
        Self {
            currents: [Vec::new(), Vec::new(), Vec::new()],
            next_index: [0; 3],
            barcodes: Vec::new(),
            cache: IntegrationCache::new(cache_capacity),
            sweep,
        }
    }

    fn push(&mut self, shape: Shape, weight: f64) -> Current {
        let degree = shape.degree();
        let slot = degree.as_u8() as usize;
        let id = CurrentId {
            degree,
            index: self.next_index[slot],
        };
        self.next_index[slot] += 1;
        let current = Current {
            id,
            weight,
            measure: shape.measure(),
            shape,
        };
        self.currents[slot].push(current.clone());
        current
    }

    pub fn create_zero_current(&mut self, point: PhasePoint, weight: f64) -> Current {
        self.push(Shape::Point(point), weight)
    }

    /// A weighted polyline; `measure` is its Euclidean length.
    pub fn create_one_current(&mut self, points: Vec<PhasePoint>, weight: f64) -> Current {
        self.push(Shape::Curve(points), weight)
    }

    /// A weighted triangulated patch; `measure` is its unsigned area.
    pub fn create_two_current(&mut self, triangles: Vec<Triangle>, weight: f64) -> Current {
        self.push(Shape::Surface(triangles), weight)
    }

    /// Currents of one degree in creation order.
    pub fn currents(&self, degree: Degree) -> &[Current] {
        &self.currents[degree.as_u8() as usize]
    }

    pub fn boundary(&self, current: &Current) -> Option<Chain> {
        current.boundary()
    }

    /// ⟨T, α⟩, memoized on the structure of `T` and `α`, so the result
    /// does not depend on which integrator created `T`. Mismatched degrees
    /// pair to zero.
    pub fn integrate(&mut self, current: &Current, form: &Form) -> f64 {
        self.cache.get_or_insert_with(current, form, || {
            integrate_shape(&current.shape, current.weight, form).unwrap_or_else(|| {
                tracing::warn!(
                    current = %current.id,
                    current_degree = %current.degree(),
                    form_degree = %form.degree(),
                    "degree mismatch in integration pairing"
                );
                0.0
            })
        })
    }

    /// ⟨C, α⟩ for a formal sum; chains are transient so this is not cached.
    pub fn integrate_chain(&self, chain: &Chain, form: &Form) -> f64 {
        if chain.degree != form.degree() {
            tracing::warn!(
                chain_degree = %chain.degree,
                form_degree = %form.degree(),
                "degree mismatch in chain pairing"
            );
            return 0.0;
        }
        chain
            .components
            .iter()
            .filter_map(|(shape, w)| integrate_shape(shape, *w, form))
            .sum()
    }

    /// Compare ⟨∂T, α⟩ against ⟨T, dα⟩; verified when they agree to 1e-6.
    pub fn verify_stokes(&mut self, current: &Current, form: &Form, d_form: &Form) -> StokesVerification {
        let Some(boundary) = current.boundary() else {
            tracing::debug!(current = %current.id, "cannot verify Stokes: boundary is zero");
            return StokesVerification::BoundaryZero;
        };
        let lhs = self.integrate_chain(&boundary, form);
        let rhs = self.integrate(current, d_form);
        let error = (lhs - rhs).abs();
        let verified = error < STOKES_TOLERANCE;
        tracing::debug!(lhs, rhs, error, verified, "Stokes verification");
        StokesVerification::Evaluated {
            lhs,
            rhs,
            error,
            verified,
        }
    }

    /// Run the persistence sweep with this integrator's parameters and
    /// `max_scale`, remembering the result.
    pub fn compute_persistent_homology(&mut self, points: &[PhasePoint], max_scale: f64) -> Vec<Barcode> {
        let params = SweepParams {
            max_scale,
            ..self.sweep
        };
        self.barcodes = compute_persistent_homology(points, params);
        self.barcodes.clone()
    }

    pub fn barcodes(&self) -> &[Barcode] {
        &self.barcodes
    }

    /// Mean over forms of matching degree of `max(0, 1 − |Iₐ − I_b| / max(|Iₐ|, |I_b|))`.
    /// Zero when the currents differ in degree or no form matches.
    pub fn compare_currents(&mut self, a: &Current, b: &Current, forms: &[Form]) -> f64 {
        if a.degree() != b.degree() {
            tracing::warn!(
                a = %a.id,
                b = %b.id,
                "cannot compare currents of different degree"
            );
            return 0.0;
        }
        let mut total = 0.0;
        let mut count = 0usize;
        for form in forms.iter().filter(|f| f.degree() == a.degree()) {
            let ia = self.integrate(a, form);
            let ib = self.integrate(b, form);
            let scale = ia.abs().max(ib.abs()).max(EPSILON);
            let diff = (ia - ib).abs() / scale;
            total += (1.0 - diff).max(0.0);
            count += 1;
        }
        if count == 0 { 0.0 } else { total / count as f64 }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn state(&self) -> IntegratorState {
        IntegratorState {
            currents: CurrentCounts {
                zero: self.currents[0].len(),
                one: self.currents[1].len(),
                two: self.currents[2].len(),
            },
            persistent_barcodes: self.barcodes.len(),
            cache_size: self.cache.len(),
        }
    }

    /// Drop currents, id counters, barcodes and cached integrals.
    pub fn clear(&mut self) {
        self.currents.iter_mut().for_each(Vec::clear);
        self.next_index = [0; 3];
        self.barcodes.clear();
        self.cache.clear();
        tracing::debug!("homology state cleared");
    }
}

/// Pair one shape with a form, or `None` if their degrees differ.
///
/// Points evaluate the form; curves take a midpoint Riemann sum of α on each
/// segment's tangent; surfaces sum ω at each centroid times signed area.
pub fn integrate_shape(shape: &Shape, weight: f64, form: &Form) -> Option<f64> {
    let value = match (shape, form) {
        (Shape::Point(pt), Form::Zero(f)) => f.at_phase(pt.q, pt.p) * weight,
        (Shape::Curve(points), Form::One(alpha)) => points
            .windows(2)
            .map(|w| {
                let mid = w[0].midpoint(w[1]);
                alpha
                    .at_phase(mid.q, mid.p)
                    .apply(w[1].q - w[0].q, w[1].p - w[0].p)
                    * weight
            })
            .sum(),
        (Shape::Surface(triangles), Form::Two(omega)) => triangles
            .iter()
            .map(|tri| {
                let c = tri.centroid();
                omega.at_phase(c.q, c.p) * tri.signed_area() * weight
            })
            .sum(),
        _ => return None,
    };
    Some(value)
}
