// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical, typed runtime value a [`crate::vtype::VType`] validates
//! into. Values travel as `serde_json::Value` on the wire (spec §4.8: "UTF-8
//! JSON, one object per frame"); this module is the typed side of that
//! boundary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A validated enum value carrying both its canonical label and index
/// (`EnumString` in the original — spec §3 requires "both index and label
/// admissible").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub index: usize,
    pub label: String,
}

/// A homogeneous array of scalars (spec §3 "array-of-scalar").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArrayValue {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl ArrayValue {
    pub fn len(&self) -> usize {
        match self {
            Self::I8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named-column table with equal row counts across columns (spec §3
/// "table (named columns each with its own element type and equal row
/// counts)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: IndexMap<String, ArrayValue>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.columns.values().next().map(ArrayValue::len).unwrap_or(0)
    }
}

/// A validated, canonical value of some [`crate::vtype::VType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Enum(EnumValue),
    Array(ArrayValue),
    Table(Table),
    /// A device reference, resolved to the referenced device's name.
    DeviceRef(String),
}
