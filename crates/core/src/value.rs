//! Typed field values exchanged with the fact store.
//!
//! These are the only value kinds a fact field can hold (§6.1): strings,
//! 32-bit integers, and doubles. VM-side computation values ([`crate::stack`]
//! in `dres-vm`) are a superset that also covers locals and globals, but
//! every fact field boils down to one of these three.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FactValue {
    String(String),
    Int(i32),
    Double(f64),
}

impl FactValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FactValue::String(_) => "string",
            FactValue::Int(_) => "int",
            FactValue::Double(_) => "double",
        }
    }

    /// Equality used by `FILTER`/`UPDATE` field matching (§6.1): string and
    /// int compare by value, double compares by exact bit pattern — no
    /// epsilon, since the only doubles that exist come from parser literals
    /// (Open Question 3, resolved in SPEC_FULL.md §9).
    pub fn matches(&self, other: &FactValue) -> bool {
        match (self, other) {
            (FactValue::String(a), FactValue::String(b)) => a == b,
            (FactValue::Int(a), FactValue::Int(b)) => a == b,
            (FactValue::Double(a), FactValue::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }

    /// Ordered comparison for `CMP LT/LE/GT/GE`: numeric operands coerce
    /// integer<->double; string/string compares use byte ordering;
    /// cross-type ordered compares are not defined here (the VM raises).
    pub fn partial_compare(&self, other: &FactValue) -> Option<Ordering> {
        match (self, other) {
            (FactValue::Int(a), FactValue::Int(b)) => Some(a.cmp(b)),
            (FactValue::Double(a), FactValue::Double(b)) => a.partial_cmp(b),
            (FactValue::Int(a), FactValue::Double(b)) => (*a as f64).partial_cmp(b),
            (FactValue::Double(a), FactValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FactValue::String(a), FactValue::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::String(s) => write!(f, "{s}"),
            FactValue::Int(i) => write!(f, "{i}"),
            FactValue::Double(d) => write!(f, "{d}"),
        }
    }
}

use std::fmt;
