//! Discrete differential forms on the time × frequency plane.
//!
//! Coordinates follow the phase plane: `q` runs along frequency, `p` along
//! time. A [`Form`] carries its degree as the enum variant, and each
//! component is a [`Field`] that is either constant everywhere or sampled on
//! a [`FormGrid`] whose interior excludes the cells where finite differences
//! are undefined. Reading outside that interior yields zero.
//!
//! Zero-forms are energy density (`amplitude²`), one-forms its central
//! difference gradient, two-forms the discrete curl of the one-form field.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::constants::PULLBACK_EPSILON;
use crate::grid::FormGrid;
use crate::spectrogram::FlatSpectrogram;

/// Degree of a form or current in the 2D phase plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Degree {
    Zero,
    One,
    Two,
}

impl Degree {
    pub const ALL: [Degree; 3] = [Degree::Zero, Degree::One, Degree::Two];

    pub fn as_u8(self) -> u8 {
        match self {
            Degree::Zero => 0,
            Degree::One => 1,
            Degree::Two => 2,
        }
    }

    /// Degree one lower, if any.
    pub fn lower(self) -> Option<Degree> {
        match self {
            Degree::Zero => None,
            Degree::One => Some(Degree::Zero),
            Degree::Two => Some(Degree::One),
        }
    }
}

impl From<Degree> for u8 {
    fn from(d: Degree) -> u8 {
        d.as_u8()
    }
}

impl TryFrom<u8> for Degree {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Degree::Zero),
            1 => Ok(Degree::One),
            2 => Ok(Degree::Two),
            other => Err(format!("degree {other} does not exist in two dimensions")),
        }
    }
}

impl std::fmt::Display for Degree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// `q dq + p dp`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Covector {
    pub q: f64,
    pub p: f64,
}

impl Covector {
    pub const ZERO: Covector = Covector { q: 0.0, p: 0.0 };

    pub fn new(q: f64, p: f64) -> Self {
        Self { q, p }
    }

    /// Coefficient of `dq ∧ dp` in `self ∧ other`.
    pub fn wedge(self, other: Covector) -> f64 {
        self.q * other.p - self.p * other.q
    }

    /// Quarter turn: `*dq = dp`, `*dp = -dq`.
    pub fn hodge(self) -> Covector {
        Covector {
            q: self.p,
            p: -self.q,
        }
    }

    /// Evaluate on a tangent vector `(dq, dp)`.
    pub fn apply(self, dq: f64, dp: f64) -> f64 {
        self.q * dq + self.p * dp
    }

    pub fn scale(self, s: f64) -> Covector {
        Covector {
            q: self.q * s,
            p: self.p * s,
        }
    }

    pub fn norm(self) -> f64 {
        self.q.hypot(self.p)
    }
}

/// Form component: one value everywhere, or one value per interior cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field<T> {
    Constant(T),
    Sampled(FormGrid<T>),
}

impl<T: Copy + Default> Field<T> {
    /// Value at grid coordinates `(t, f)`, floored. Off-grid is zero.
    pub fn at(&self, t: f64, f: f64) -> T {
        match self {
            Field::Constant(v) => *v,
            Field::Sampled(grid) => grid.sample(t, f).copied().unwrap_or_default(),
        }
    }

    /// Value at phase point `(q, p)`: cell `(time = ⌊p⌋, frequency = ⌊q⌋)`.
    pub fn at_phase(&self, q: f64, p: f64) -> T {
        self.at(p, q)
    }

    pub fn map<U>(&self, mut op: impl FnMut(T) -> U) -> Field<U> {
        match self {
            Field::Constant(v) => Field::Constant(op(*v)),
            Field::Sampled(grid) => Field::Sampled(grid.map(|v| op(*v))),
        }
    }

    /// Cell-wise combination. Two sampled fields must share a layout.
    pub fn combine<U: Copy + Default, V>(
        &self,
        other: &Field<U>,
        mut op: impl FnMut(T, U) -> V,
    ) -> Option<Field<V>> {
        match (self, other) {
            (Field::Constant(a), Field::Constant(b)) => Some(Field::Constant(op(*a, *b))),
            (Field::Constant(a), Field::Sampled(g)) => Some(Field::Sampled(g.map(|b| op(*a, *b)))),
            (Field::Sampled(g), Field::Constant(b)) => Some(Field::Sampled(g.map(|a| op(*a, *b)))),
            (Field::Sampled(ga), Field::Sampled(gb)) => {
                ga.zip_with(gb, |a, b| op(*a, *b)).map(Field::Sampled)
            }
        }
    }
}

/// A differential form with its degree explicit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "degree", content = "field", rename_all = "camelCase")]
pub enum Form {
    Zero(Field<f64>),
    One(Field<Covector>),
    Two(Field<f64>),
}

/// Structural fingerprint of a form, used as the form half of an
/// integration cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormKey(pub u64);

impl Form {
    pub fn degree(&self) -> Degree {
        match self {
            Form::Zero(_) => Degree::Zero,
            Form::One(_) => Degree::One,
            Form::Two(_) => Degree::Two,
        }
    }

    pub fn constant_zero(value: f64) -> Self {
        Form::Zero(Field::Constant(value))
    }

    pub fn constant_one(covector: Covector) -> Self {
        Form::One(Field::Constant(covector))
    }

    pub fn constant_two(value: f64) -> Self {
        Form::Two(Field::Constant(value))
    }

    /// `d: Ωᵏ → Ωᵏ⁺¹`. A two-form has no derivative in two dimensions.
    pub fn exterior_derivative(&self) -> Option<Form> {
        match self {
            Form::Zero(Field::Constant(_)) => Some(Form::One(Field::Constant(Covector::ZERO))),
            Form::Zero(Field::Sampled(g)) => Some(Form::One(Field::Sampled(gradient(g)))),
            Form::One(Field::Constant(_)) => Some(Form::Two(Field::Constant(0.0))),
            Form::One(Field::Sampled(g)) => Some(Form::Two(Field::Sampled(curl(g)))),
            Form::Two(_) => {
                tracing::debug!("exterior derivative of a two-form vanishes (d² = 0)");
                None
            }
        }
    }

    /// Hodge dual in the flat plane: 0 ↔ 2, one-forms rotate a quarter turn.
    pub fn hodge_star(&self) -> Form {
        match self {
            Form::Zero(f) => Form::Two(f.clone()),
            Form::One(f) => Form::One(f.map(Covector::hodge)),
            Form::Two(f) => Form::Zero(f.clone()),
        }
    }

    /// Exterior product. Zero-forms scale; two one-forms give a two-form;
    /// anything above degree two is `None`, as is a sampled layout mismatch.
    pub fn wedge(&self, other: &Form) -> Option<Form> {
        let out = match (self, other) {
            (Form::Zero(a), Form::Zero(b)) => Form::Zero(a.combine(b, |x, y| x * y)?),
            (Form::Zero(s), Form::One(a)) | (Form::One(a), Form::Zero(s)) => {
                Form::One(a.combine(s, |c, k| c.scale(k))?)
            }
            (Form::Zero(s), Form::Two(w)) | (Form::Two(w), Form::Zero(s)) => {
                Form::Two(w.combine(s, |x, k| x * k)?)
            }
            (Form::One(a), Form::One(b)) => Form::Two(a.combine(b, Covector::wedge)?),
            _ => return None,
        };
        Some(out)
    }

    pub fn fingerprint(&self) -> FormKey {
        let mut h = DefaultHasher::new();
        self.degree().hash(&mut h);
        match self {
            Form::Zero(f) | Form::Two(f) => hash_field(f, &mut h, |v, h| v.to_bits().hash(h)),
            Form::One(f) => hash_field(f, &mut h, |c, h| {
                c.q.to_bits().hash(h);
                c.p.to_bits().hash(h);
            }),
        }
        FormKey(h.finish())
    }
}

fn hash_field<T>(field: &Field<T>, h: &mut DefaultHasher, mut cell: impl FnMut(&T, &mut DefaultHasher)) {
    match field {
        Field::Constant(v) => {
            0u8.hash(h);
            cell(v, h);
        }
        Field::Sampled(g) => {
            1u8.hash(h);
            g.time_frames().hash(h);
            g.frequency_bins().hash(h);
            g.border().hash(h);
            for v in g.values() {
                cell(v, h);
            }
        }
    }
}

/// `(∂E/∂f, ∂E/∂t)` by central differences, one ring further in.
fn gradient(e: &FormGrid<f64>) -> FormGrid<Covector> {
    let at = |t: usize, f: usize| e.get(t, f).copied().unwrap_or(0.0);
    FormGrid::from_fn(e.time_frames(), e.frequency_bins(), e.border() + 1, |t, f| {
        Covector {
            q: (at(t, f + 1) - at(t, f - 1)) / 2.0,
            p: (at(t + 1, f) - at(t - 1, f)) / 2.0,
        }
    })
}

/// `∂α_p/∂q − ∂α_q/∂p` by central differences, one ring further in.
fn curl(alpha: &FormGrid<Covector>) -> FormGrid<f64> {
    let at = |t: usize, f: usize| alpha.get(t, f).copied().unwrap_or_default();
    FormGrid::from_fn(
        alpha.time_frames(),
        alpha.frequency_bins(),
        alpha.border() + 1,
        |t, f| {
            let dap_dq = (at(t, f + 1).p - at(t, f - 1).p) / 2.0;
            let daq_dp = (at(t + 1, f).q - at(t - 1, f).q) / 2.0;
            dap_dq - daq_dp
        },
    )
}

/// Covector formula `a.q·b.p − a.p·b.q`.
pub fn wedge_product(a: Covector, b: Covector) -> f64 {
    a.wedge(b)
}

/// Transport `form` back through `map: (t, f) ↦ (t', f')` onto a
/// `time_frames × frequency_bins` domain.
///
/// The Jacobian is taken by central difference with step `1e-6`. Samples
/// whose image leaves the form's valid region read as zero. Zero-forms are
/// pulled back on the whole domain, higher degrees on the one-cell interior.
pub fn pullback(
    form: &Form,
    time_frames: usize,
    frequency_bins: usize,
    map: impl Fn(f64, f64) -> (f64, f64),
) -> Form {
    let eps = PULLBACK_EPSILON;
    // Columns of the Jacobian: (∂t'/∂t, ∂f'/∂t) and (∂t'/∂f, ∂f'/∂f).
    let jacobian = |t: f64, f: f64| {
        let (t_hi, f_hi) = (map(t + eps, f), map(t, f + eps));
        let (t_lo, f_lo) = (map(t - eps, f), map(t, f - eps));
        let d = Jacobian {
            dt_dt: (t_hi.0 - t_lo.0) / (2.0 * eps),
            df_dt: (t_hi.1 - t_lo.1) / (2.0 * eps),
            dt_df: (f_hi.0 - f_lo.0) / (2.0 * eps),
            df_df: (f_hi.1 - f_lo.1) / (2.0 * eps),
        };
        (map(t, f), d)
    };

    match form {
        Form::Zero(field) => Form::Zero(Field::Sampled(FormGrid::from_fn(
            time_frames,
            frequency_bins,
            0,
            |t, f| {
                let (mt, mf) = map(t as f64, f as f64);
                field.at(mt, mf)
            },
        ))),
        Form::One(field) => Form::One(Field::Sampled(FormGrid::from_fn(
            time_frames,
            frequency_bins,
            1,
            |t, f| {
                let ((mt, mf), j) = jacobian(t as f64, f as f64);
                let alpha = field.at(mt, mf);
                // (F*α)_f = α_q ∂f'/∂f + α_p ∂t'/∂f, and likewise along t.
                Covector {
                    q: alpha.q * j.df_df + alpha.p * j.dt_df,
                    p: alpha.q * j.df_dt + alpha.p * j.dt_dt,
                }
            },
        ))),
        Form::Two(field) => Form::Two(Field::Sampled(FormGrid::from_fn(
            time_frames,
            frequency_bins,
            1,
            |t, f| {
                let ((mt, mf), j) = jacobian(t as f64, f as f64);
                field.at(mt, mf) * j.det()
            },
        ))),
    }
}

struct Jacobian {
    dt_dt: f64,
    df_dt: f64,
    dt_df: f64,
    df_df: f64,
}

impl Jacobian {
    fn det(&self) -> f64 {
        self.dt_dt * self.df_df - self.dt_df * self.df_dt
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMetadata {
    pub time_frames: usize,
    pub frequency_bins: usize,
    pub sample_rate: f32,
}

/// One tick's worth of forms over the buffered spectrogram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSet {
    pub zero_forms: FormGrid<f64>,
    pub one_forms: FormGrid<Covector>,
    pub two_forms: FormGrid<f64>,
    pub metadata: FormMetadata,
}

impl FormSet {
    /// A set over no cells at all.
    pub fn empty(sample_rate: f32) -> Self {
        Self {
            zero_forms: FormGrid::from_fn(0, 0, 0, |_, _| 0.0),
            one_forms: FormGrid::from_fn(0, 0, 1, |_, _| Covector::ZERO),
            two_forms: FormGrid::from_fn(0, 0, 2, |_, _| 0.0),
            metadata: FormMetadata {
                time_frames: 0,
                frequency_bins: 0,
                sample_rate,
            },
        }
    }

    pub fn zero_form(&self) -> Form {
        Form::Zero(Field::Sampled(self.zero_forms.clone()))
    }

    pub fn one_form(&self) -> Form {
        Form::One(Field::Sampled(self.one_forms.clone()))
    }

    pub fn two_form(&self) -> Form {
        Form::Two(Field::Sampled(self.two_forms.clone()))
    }

    /// Every form in the set, lowest degree first.
    pub fn all(&self) -> Vec<Form> {
        vec![self.zero_form(), self.one_form(), self.two_form()]
    }

    /// Euclidean norm of the two-form coefficients.
    pub fn two_form_magnitude(&self) -> f64 {
        self.two_forms.values().iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormsState {
    pub zero_forms_count: usize,
    pub one_forms_count: usize,
    pub two_forms_count: usize,
    pub time_frames: usize,
    pub frequency_bins: usize,
}

#[derive(Debug)]
pub struct FormsComputer {
    sample_rate: f32,
    last: Option<FormSet>,
}

impl FormsComputer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            last: None,
        }
    }

    /// Energy, gradient and curl over the whole buffer. The result is a pure
    /// function of `spectrogram`; a copy is kept only for [`Self::state`].
    pub fn compute_forms_from_spectrogram(&mut self, spectrogram: &FlatSpectrogram) -> FormSet {
        let frames = spectrogram.num_frames;
        let bins = spectrogram.num_bins;

        let zero_forms = FormGrid::from_fn(frames, bins, 0, |t, f| {
            let a = spectrogram.value(t, f) as f64;
            a * a
        });
        let one_forms = gradient(&zero_forms);
        let two_forms = curl(&one_forms);

        tracing::debug!(
            frames,
            bins,
            one_form_rows = one_forms.rows(),
            two_form_rows = two_forms.rows(),
            "computed differential forms"
        );

        let set = FormSet {
            zero_forms,
            one_forms,
            two_forms,
            metadata: FormMetadata {
                time_frames: frames,
                frequency_bins: bins,
                sample_rate: self.sample_rate,
            },
        };
        self.last = Some(set.clone());
        set
    }

    pub fn last(&self) -> Option<&FormSet> {
        self.last.as_ref()
    }

    /// [`pullback`] onto the domain of the last computed set.
    pub fn pullback(&self, form: &Form, map: impl Fn(f64, f64) -> (f64, f64)) -> Form {
        let meta = self.last.as_ref().map(|s| s.metadata).unwrap_or_default();
        pullback(form, meta.time_frames, meta.frequency_bins, map)
    }

    pub fn state(&self) -> FormsState {
        match &self.last {
            Some(set) => FormsState {
                zero_forms_count: set.zero_forms.rows(),
                one_forms_count: set.one_forms.rows(),
                two_forms_count: set.two_forms.rows(),
                time_frames: set.metadata.time_frames,
                frequency_bins: set.metadata.frequency_bins,
            },
            None => FormsState {
                zero_forms_count: 0,
                one_forms_count: 0,
                two_forms_count: 0,
                time_frames: 0,
                frequency_bins: 0,
            },
        }
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, bins: usize) -> FlatSpectrogram {
        let mut data = Vec::with_capacity(frames * bins);
        for t in 0..frames {
            for f in 0..bins {
                data.push(((t * bins + f) as f32 * 0.01).sin().abs());
            }
        }
        FlatSpectrogram::new(data, frames, bins)
    }

    #[test]
    fn test_silence_gives_zero_forms() {
        let mut fc = FormsComputer::new(44_100.0);
        let set = fc.compute_forms_from_spectrogram(&FlatSpectrogram::zeros(12, 16));
        assert_eq!(set.zero_forms.len(), 12 * 16);
        assert_eq!(set.one_forms.len(), 10 * 14);
        assert_eq!(set.two_forms.len(), 8 * 12);
        assert!(set.zero_forms.values().iter().all(|v| *v == 0.0));
        assert!(set.one_forms.values().iter().all(|c| *c == Covector::ZERO));
        assert!(set.two_forms.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_one_forms_skip_border() {
        let mut fc = FormsComputer::new(44_100.0);
        let set = fc.compute_forms_from_spectrogram(&ramp(6, 6));
        assert!(set.one_forms.get(0, 3).is_none());
        assert!(set.one_forms.get(3, 5).is_none());
        assert!(set.one_forms.get(1, 1).is_some());
        assert!(set.two_forms.get(1, 1).is_none());
        assert!(set.two_forms.get(2, 2).is_some());
    }

    #[test]
    fn test_gradient_of_linear_energy() {
        let e = FormGrid::from_fn(8, 8, 0, |t, f| 3.0 * t as f64 + 0.5 * f as f64);
        let d = Form::Zero(Field::Sampled(e)).exterior_derivative().unwrap();
        let Form::One(Field::Sampled(g)) = d else {
            panic!("expected sampled one-form");
        };
        for (_, _, c) in g.iter() {
            assert!((c.q - 0.5).abs() < 1e-12);
            assert!((c.p - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_curl_of_gradient_vanishes() {
        let mut fc = FormsComputer::new(44_100.0);
        let set = fc.compute_forms_from_spectrogram(&ramp(10, 12));
        for v in set.two_forms.values() {
            assert!(v.abs() < 1e-12, "curl of gradient should vanish, got {v}");
        }
    }

    #[test]
    fn test_curl_of_rotation_field() {
        // α = -p dq + q dp with q = f, p = t has dα = 2 dq∧dp.
        let alpha = FormGrid::from_fn(6, 6, 1, |t, f| Covector::new(-(t as f64), f as f64));
        let d = Form::One(Field::Sampled(alpha)).exterior_derivative().unwrap();
        let Form::Two(Field::Sampled(w)) = d else {
            panic!("expected sampled two-form");
        };
        assert!(!w.is_empty());
        assert!(w.values().iter().all(|v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_d_of_two_form_is_none() {
        assert!(Form::constant_two(1.0).exterior_derivative().is_none());
        let g = FormGrid::from_fn(5, 5, 2, |_, _| 1.0);
        assert!(Form::Two(Field::Sampled(g)).exterior_derivative().is_none());
    }

    #[test]
    fn test_wedge_and_hodge() {
        let a = Covector::new(1.0, 2.0);
        let b = Covector::new(3.0, 4.0);
        assert!((wedge_product(a, b) - (1.0 * 4.0 - 2.0 * 3.0)).abs() < 1e-12);
        assert!((wedge_product(a, a)).abs() < 1e-12);
        assert_eq!(a.hodge(), Covector::new(2.0, -1.0));
        // ** = -1 on one-forms in two dimensions
        assert_eq!(a.hodge().hodge(), a.scale(-1.0));

        let star = Form::constant_two(5.0).hodge_star();
        assert_eq!(star, Form::constant_zero(5.0));
    }

    #[test]
    fn test_wedge_of_forms_by_degree() {
        let one = Form::constant_one(Covector::new(1.0, 0.0));
        let other = Form::constant_one(Covector::new(0.0, 1.0));
        assert_eq!(one.wedge(&other), Some(Form::constant_two(1.0)));
        assert_eq!(
            Form::constant_zero(2.0).wedge(&one),
            Some(Form::constant_one(Covector::new(2.0, 0.0)))
        );
        assert!(one.wedge(&Form::constant_two(1.0)).is_none());

        let g1 = FormGrid::from_fn(4, 4, 0, |_, _| 1.0);
        let g2 = FormGrid::from_fn(4, 4, 1, |_, _| 1.0);
        assert!(
            Form::Zero(Field::Sampled(g1))
                .wedge(&Form::Zero(Field::Sampled(g2)))
                .is_none()
        );
    }

    #[test]
    fn test_pullback_identity_preserves_values() {
        let e = FormGrid::from_fn(6, 6, 0, |t, f| (t * 6 + f) as f64);
        let form = Form::Zero(Field::Sampled(e.clone()));
        let pulled = pullback(&form, 6, 6, |t, f| (t, f));
        assert_eq!(pulled, Form::Zero(Field::Sampled(e)));
    }

    #[test]
    fn test_pullback_out_of_domain_is_zero() {
        let e = FormGrid::from_fn(4, 4, 0, |_, _| 1.0);
        let pulled = pullback(&Form::Zero(Field::Sampled(e)), 4, 4, |t, f| (t + 10.0, f));
        let Form::Zero(Field::Sampled(g)) = pulled else {
            panic!("expected sampled zero-form");
        };
        assert!(g.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pullback_scales_by_jacobian() {
        let alpha = Form::constant_one(Covector::new(1.0, 1.0));
        // Stretch time by 2: p-component doubles, q untouched.
        let Form::One(Field::Sampled(g)) = pullback(&alpha, 5, 5, |t, f| (2.0 * t, f)) else {
            panic!("expected sampled one-form");
        };
        for (_, _, c) in g.iter() {
            assert!((c.q - 1.0).abs() < 1e-4, "{c:?}");
            assert!((c.p - 2.0).abs() < 1e-4, "{c:?}");
        }

        let omega = Form::constant_two(1.5);
        let Form::Two(Field::Sampled(w)) = pullback(&omega, 5, 5, |t, f| (2.0 * t, 3.0 * f)) else {
            panic!("expected sampled two-form");
        };
        for v in w.values() {
            assert!((v - 9.0).abs() < 1e-4, "{v}");
        }
    }

    #[test]
    fn test_pullback_jacobian_is_central() {
        // t' = 50·t² has ∂t'/∂t = 100·t exactly under a central difference;
        // a one-sided step would be off by 50·ε.
        let alpha = Form::constant_one(Covector::new(0.0, 1.0));
        let Form::One(Field::Sampled(g)) = pullback(&alpha, 5, 5, |t, f| (50.0 * t * t, f)) else {
            panic!("expected sampled one-form");
        };
        assert!(!g.is_empty());
        for (t, _, c) in g.iter() {
            let exact = 100.0 * t as f64;
            assert!((c.p - exact).abs() < 1e-6, "t={t} got {} want {exact}", c.p);
            assert!(c.q.abs() < 1e-6);
        }
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Form::constant_zero(1.0);
        let b = Form::constant_zero(1.0);
        let c = Form::constant_two(1.0);
        let d = Form::constant_zero(1.0000001);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_state_counts_rows() {
        let mut fc = FormsComputer::new(8000.0);
        assert_eq!(fc.state().zero_forms_count, 0);
        fc.compute_forms_from_spectrogram(&FlatSpectrogram::zeros(12, 16));
        let s = fc.state();
        assert_eq!((s.zero_forms_count, s.one_forms_count, s.two_forms_count), (12, 10, 8));
        fc.clear();
        assert!(fc.last().is_none());
    }

    #[test]
    fn test_degree_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Degree::Two).unwrap(), "2");
        let d: Degree = serde_json::from_str("1").unwrap();
        assert_eq!(d, Degree::One);
        assert!(serde_json::from_str::<Degree>("3").is_err());
    }
}
