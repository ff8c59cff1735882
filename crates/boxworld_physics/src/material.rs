//! Material friction table for collision response

use std::collections::HashMap;

use crate::body::{RigidBody, DEFAULT_FRICTION};

/// Pairwise friction coefficients keyed by unordered material names
///
/// Lookups are symmetric: `(a, b)` and `(b, a)` name the same entry. Pairs
/// missing from the table fall back to `default_friction`.
#[derive(Clone, Debug, PartialEq)]
pub struct FrictionTable {
    entries: HashMap<(String, String), f32>,
    /// Coefficient used for unknown pairs and for bodies without an explicit
    /// coefficient when the other body has one
    pub default_friction: f32,
}

impl Default for FrictionTable {
    fn default() -> Self {
        let mut table = Self::empty(DEFAULT_FRICTION);
        table.insert("Steel", "Concrete", 0.6);
        table.insert("Rubber", "Concrete", 0.9);
        table.insert("Rubber", "Steel", 0.8);
        table.insert("Wood", "Ice", 0.04);
        table.insert("Steel", "Steel", 0.2);
        table.insert("floor", "Steel", 0.2);
        table
    }
}

impl FrictionTable {
    /// A table with no entries
    pub fn empty(default_friction: f32) -> Self {
        Self {
            entries: HashMap::new(),
            default_friction,
        }
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Set the coefficient for a material pair, replacing any existing entry
    pub fn insert(&mut self, a: &str, b: &str, coefficient: f32) {
        self.entries.insert(Self::key(a, b), coefficient);
    }

    /// Builder form of [`FrictionTable::insert`]
    pub fn with_entry(mut self, a: &str, b: &str, coefficient: f32) -> Self {
        self.insert(a, b, coefficient);
        self
    }

    /// Coefficient stored for a material pair, if any
    pub fn get(&self, a: &str, b: &str) -> Option<f32> {
        self.entries.get(&Self::key(a, b)).copied()
    }

    /// Number of stored pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the friction coefficient between two bodies
    ///
    /// If either body carries an explicit coefficient, the smaller of the two
    /// is used (a body without one counts as `default_friction`). Otherwise
    /// the material pair is looked up, falling back to the default.
    pub fn coefficient(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        if a.friction.is_some() || b.friction.is_some() {
            let a = a.friction.unwrap_or(self.default_friction);
            let b = b.friction.unwrap_or(self.default_friction);
            return a.min(b);
        }
        self.get(&a.material, &b.material)
            .unwrap_or(self.default_friction)
    }
}
