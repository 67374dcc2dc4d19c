//! Currents: weighted points, polylines and triangulated patches in the
//! phase plane, and the boundary operator on them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::forms::Degree;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePoint {
    pub q: f64,
    pub p: f64,
}

impl PhasePoint {
    pub fn new(q: f64, p: f64) -> Self {
        Self { q, p }
    }

    pub fn distance(self, other: PhasePoint) -> f64 {
        (self.q - other.q).hypot(self.p - other.p)
    }

    pub fn midpoint(self, other: PhasePoint) -> PhasePoint {
        PhasePoint {
            q: (self.q + other.q) / 2.0,
            p: (self.p + other.p) / 2.0,
        }
    }

    fn bits(self) -> (u64, u64) {
        (self.q.to_bits(), self.p.to_bits())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Triangle(pub [PhasePoint; 3]);

impl Triangle {
    pub fn new(a: PhasePoint, b: PhasePoint, c: PhasePoint) -> Self {
        Self([a, b, c])
    }

    /// Shoelace area, positive when the vertices run counter-clockwise in
    /// the `(q, p)` plane.
    pub fn signed_area(&self) -> f64 {
        let [a, b, c] = self.0;
        0.5 * (a.q * (b.p - c.p) + b.q * (c.p - a.p) + c.q * (a.p - b.p))
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn centroid(&self) -> PhasePoint {
        let [a, b, c] = self.0;
        PhasePoint {
            q: (a.q + b.q + c.q) / 3.0,
            p: (a.p + b.p + c.p) / 3.0,
        }
    }

    pub fn edges(&self) -> [(PhasePoint, PhasePoint); 3] {
        let [a, b, c] = self.0;
        [(a, b), (b, c), (c, a)]
    }
}

/// The geometric support of a current; its variant fixes the degree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Shape {
    Point(PhasePoint),
    Curve(Vec<PhasePoint>),
    Surface(Vec<Triangle>),
}

impl Shape {
    pub fn degree(&self) -> Degree {
        match self {
            Shape::Point(_) => Degree::Zero,
            Shape::Curve(_) => Degree::One,
            Shape::Surface(_) => Degree::Two,
        }
    }

    /// Zero for points, polyline length for curves, unsigned area for
    /// surfaces.
    pub fn measure(&self) -> f64 {
        match self {
            Shape::Point(_) => 0.0,
            Shape::Curve(points) => points.windows(2).map(|w| w[0].distance(w[1])).sum(),
            Shape::Surface(triangles) => triangles.iter().map(Triangle::area).sum(),
        }
    }
}

/// Identity of a current: its degree plus a per-degree sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrentId {
    pub degree: Degree,
    pub index: u64,
}

impl std::fmt::Display for CurrentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}curr_{}", self.degree, self.index)
    }
}

/// Structural hash of a current's shape and weight, the current half of an
/// integration cache key. Ids play no part in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrentKey(pub u64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Current {
    pub id: CurrentId,
    pub weight: f64,
    pub shape: Shape,
    /// Length for curves, area for surfaces.
    pub measure: f64,
}

impl Current {
    pub fn degree(&self) -> Degree {
        self.shape.degree()
    }

    pub fn points(&self) -> &[PhasePoint] {
        match &self.shape {
            Shape::Point(p) => std::slice::from_ref(p),
            Shape::Curve(points) => points,
            Shape::Surface(_) => &[],
        }
    }

    pub fn fingerprint(&self) -> CurrentKey {
        let mut h = DefaultHasher::new();
        self.degree().hash(&mut h);
        self.weight.to_bits().hash(&mut h);
        let vertices: &[PhasePoint] = match &self.shape {
            Shape::Point(p) => std::slice::from_ref(p),
            Shape::Curve(points) => points,
            Shape::Surface(triangles) => {
                triangles.len().hash(&mut h);
                for tri in triangles {
                    tri.0.iter().for_each(|v| v.bits().hash(&mut h));
                }
                &[]
            }
        };
        vertices.len().hash(&mut h);
        vertices.iter().for_each(|v| v.bits().hash(&mut h));
        CurrentKey(h.finish())
    }

    /// Same shape and bit-identical weight.
    pub fn same_geometry(&self, shape: &Shape, weight: f64) -> bool {
        self.weight.to_bits() == weight.to_bits() && self.shape == *shape
    }

    /// `∂T`. Points have no boundary. A curve's boundary is `+end − start`;
    /// an empty curve has none. A surface's boundary is the set of edges
    /// used by exactly one triangle, each as a two-point segment.
    pub fn boundary(&self) -> Option<Chain> {
        match &self.shape {
            Shape::Point(_) => None,
            Shape::Curve(points) => {
                let (start, end) = (points.first()?, points.last()?);
                Some(Chain {
                    degree: Degree::Zero,
                    components: vec![
                        (Shape::Point(*end), self.weight),
                        (Shape::Point(*start), -self.weight),
                    ],
                })
            }
            Shape::Surface(triangles) => Some(Chain {
                degree: Degree::One,
                components: boundary_edges(triangles)
                    .into_iter()
                    .map(|(a, b)| (Shape::Curve(vec![a, b]), self.weight))
                    .collect(),
            }),
        }
    }
}

/// Formal weighted sum of shapes of one degree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub degree: Degree,
    pub components: Vec<(Shape, f64)>,
}

/// Edges used by exactly one triangle. Edges are matched regardless of
/// direction so the shared edges of a consistently oriented mesh cancel;
/// survivors keep the orientation and order in which they were first seen.
pub fn boundary_edges(triangles: &[Triangle]) -> Vec<(PhasePoint, PhasePoint)> {
    type Key = ((u64, u64), (u64, u64));
    let key = |a: PhasePoint, b: PhasePoint| -> Key {
        let (ka, kb) = (a.bits(), b.bits());
        if ka <= kb { (ka, kb) } else { (kb, ka) }
    };

    let mut order: Vec<(Key, (PhasePoint, PhasePoint))> = Vec::new();
    let mut counts: std::collections::HashMap<Key, usize> = std::collections::HashMap::new();
    for tri in triangles {
        for (a, b) in tri.edges() {
            let k = key(a, b);
            let n = counts.entry(k).or_insert(0);
            if *n == 0 {
                order.push((k, (a, b)));
            }
            *n += 1;
        }
    }

    order
        .into_iter()
        .filter(|(k, _)| counts.get(k) == Some(&1))
        .map(|(_, edge)| edge)
        .collect()
}
