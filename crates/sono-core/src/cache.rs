//! Bounded memo of integration results.
//!
//! Keys are `(current fingerprint, form fingerprint)`, both structural, so a
//! current from another integrator or from before a `clear` finds exactly
//! the integrals of its own geometry. A hit is only trusted once the stored
//! shape, weight and form compare equal to the query; a hash collision is
//! recomputed and left uncached.
//!
//! Once `capacity` entries are held, inserting a new key first evicts the
//! oldest inserted one. Lookups do not refresh age: eviction order is
//! insertion order, not recency.

use std::collections::{HashMap, VecDeque};

use crate::current::{Current, CurrentKey, Shape};
use crate::forms::{Form, FormKey};

pub type CacheKey = (CurrentKey, FormKey);

#[derive(Debug)]
struct Entry {
    shape: Shape,
    weight: f64,
    value: f64,
}

#[derive(Debug)]
pub struct IntegrationCache {
    capacity: usize,
    entries: HashMap<CacheKey, Entry>,
    order: VecDeque<CacheKey>,
    /// One copy of every form some entry refers to, with its entry count.
    forms: HashMap<FormKey, (Form, usize)>,
}

impl IntegrationCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            forms: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached ⟨current, form⟩, computing and storing it on a miss.
    pub fn get_or_insert_with(
        &mut self,
        current: &Current,
        form: &Form,
        compute: impl FnOnce() -> f64,
    ) -> f64 {
        let key = (current.fingerprint(), form.fingerprint());
        if let Some(v) = self.lookup(&key, current, form) {
            return v;
        }
        let value = compute();
        if self.entries.contains_key(&key) {
            tracing::debug!(current = %current.id, "integration cache key collision, not caching");
            return value;
        }
        self.insert(key, current, form, value);
        value
    }

    fn lookup(&self, key: &CacheKey, current: &Current, form: &Form) -> Option<f64> {
        let entry = self.entries.get(key)?;
        if !current.same_geometry(&entry.shape, entry.weight) {
            return None;
        }
        let (stored, _) = self.forms.get(&key.1)?;
        (stored == form).then_some(entry.value)
    }

    /// `key` must not be present yet.
    fn insert(&mut self, key: CacheKey, current: &Current, form: &Form, value: f64) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.release_form(oldest.1);
            }
        }
        self.forms
            .entry(key.1)
            .and_modify(|(_, refs)| *refs += 1)
            .or_insert_with(|| (form.clone(), 1));
        self.entries.insert(
            key,
            Entry {
                shape: current.shape.clone(),
                weight: current.weight,
                value,
            },
        );
        self.order.push_back(key);
    }

    fn release_form(&mut self, key: FormKey) {
        if let Some((_, refs)) = self.forms.get_mut(&key) {
            *refs -= 1;
            if *refs == 0 {
                self.forms.remove(&key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.forms.clear();
    }
}
