// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type descriptors (spec §3/§4.1 "VType"). Grounded on
//! `malcolm/core/vtype.py`'s class hierarchy (`VNumber`/`IsArray`/`VEnum`/
//! `VTable`/`VObject`), reshaped per the design notes (§9) as a composed
//! tagged enum rather than multiple inheritance: a descriptor holds a
//! scalar kind plus an `is_array` flag (the `Array` variant), with
//! `validate` dispatching on the pair.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{MalcolmError, Result};
use crate::value::{ArrayValue, EnumValue, Table, Value};

/// The scalar kinds a [`VType`] may be built from. Corresponds to the
/// `VDouble`/`VFloat`/`VLong`/`VInt`/`VShort`/`VByte`/`VBool`/`VString`
/// leaves of the original hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
}

impl ScalarKind {
    fn name(&self) -> &'static str {
        match self {
            Self::I8 => "byte",
            Self::I16 => "short",
            Self::I32 => "int",
            Self::I64 => "long",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::Bool => "bool",
            Self::Str => "string",
        }
    }
}

/// A structural type descriptor (spec §3 "Type descriptor (`VType`)").
/// Equality is structural: same kind, same labels/columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    /// Ordered labels; both index and label are admissible on validate.
    Enum(Vec<String>),
    /// Homogeneous array of one scalar kind.
    Array(ScalarKind),
    /// Named columns, each with its own scalar element type.
    Table(IndexMap<String, ScalarKind>),
    /// A device reference. `labels`, if present, restricts which device
    /// names are acceptable at construction time. Live resolution against
    /// whatever devices are actually registered is a capability the caller
    /// supplies separately — see [`DeviceResolver`] and
    /// [`VType::validate_with_resolver`] — not part of the static
    /// descriptor, since a `VType` must stay structurally comparable
    /// (spec §3: "Equality is structural").
    DeviceRef(Option<Vec<String>>),
}

/// Looks up whether a device name is currently registered (spec §2:
/// device-reference validation is "simplified to a resolver trait
/// object," since Rust has no equivalent of a duck-typed lookup closure).
/// Implemented by whichever part of the system owns the registry —
/// `malcolm-router`'s provider registry, in the shipped binary.
pub trait DeviceResolver {
    fn resolve(&self, name: &str) -> bool;
}

fn json_number_to_i64(n: &serde_json::Number) -> Option<i64> {
    n.as_i64()
}

fn check_int_roundtrip<T>(n: &serde_json::Number, value: &serde_json::Value) -> Result<T>
where
    T: TryFrom<i64> + Into<i64> + Copy,
{
    let raw = json_number_to_i64(n)
        .ok_or_else(|| MalcolmError::TypeMismatch { value: value.to_string(), expected: VType::I64 })?;
    let cast: T = T::try_from(raw)
        .map_err(|_| MalcolmError::TypeMismatch { value: value.to_string(), expected: VType::I64 })?;
    if Into::<i64>::into(cast) != raw {
        return Err(MalcolmError::TypeMismatch { value: value.to_string(), expected: VType::I64 });
    }
    Ok(cast)
}

impl VType {
    /// Validate `input`, returning the canonical [`Value`] or
    /// `MalcolmError::TypeMismatch` — never a panic, and never a silent
    /// lossy narrowing (spec §4.1: "Numeric validation rejects lossy
    /// narrowing").
    pub fn validate(&self, input: serde_json::Value) -> Result<Value> {
        self.validate_with_resolver(input, None)
    }

    /// As [`VType::validate`], but for [`VType::DeviceRef`] also consults
    /// `resolver` (if supplied) to check the name is actually registered,
    /// not just present on the static `labels` allow-list (spec §3:
    /// "device-reference (label resolved through a lookup capability)").
    /// Every other variant ignores `resolver` entirely.
    pub fn validate_with_resolver(
        &self,
        input: serde_json::Value,
        resolver: Option<&dyn DeviceResolver>,
    ) -> Result<Value> {
        match self {
            Self::I8 => self.validate_int(&input).map(|v| Value::I8(v as i8)),
            Self::I16 => self.validate_int(&input).map(|v| Value::I16(v as i16)),
            Self::I32 => self.validate_int(&input).map(|v| Value::I32(v as i32)),
            Self::I64 => self.validate_int(&input).map(Value::I64),
            Self::F32 => self.validate_f32(&input).map(Value::F32),
            Self::F64 => self.validate_f64(&input).map(Value::F64),
            Self::Bool => self.validate_bool(&input).map(Value::Bool),
            Self::Str => self.validate_str(&input).map(Value::Str),
            Self::Enum(labels) => self.validate_enum(labels, &input).map(Value::Enum),
            Self::Array(kind) => self.validate_array(*kind, input).map(Value::Array),
            Self::Table(cols) => self.validate_table(cols, input).map(Value::Table),
            Self::DeviceRef(labels) => {
                self.validate_device_ref(labels.as_deref(), &input, resolver).map(Value::DeviceRef)
            }
        }
    }

    fn validate_int(&self, input: &serde_json::Value) -> Result<i64> {
        let n = match input {
            serde_json::Value::Number(n) => n,
            _ => return Err(mismatch(input, self)),
        };
        // Generic round-trip against i64; the per-width cast in `validate`
        // re-checks width-specific round-trip via `check_int_roundtrip`.
        match self {
            Self::I8 => check_int_roundtrip::<i8>(n, input).map(i64::from),
            Self::I16 => check_int_roundtrip::<i16>(n, input).map(i64::from),
            Self::I32 => check_int_roundtrip::<i32>(n, input).map(i64::from),
            Self::I64 => n.as_i64().ok_or_else(|| mismatch(input, self)),
            _ => unreachable!("validate_int only called for integer kinds"),
        }
    }

    fn validate_f32(&self, input: &serde_json::Value) -> Result<f32> {
        let f = input.as_f64().ok_or_else(|| mismatch(input, self))?;
        let cast = f as f32;
        if (cast as f64 - f).abs() > f64::EPSILON * f.abs().max(1.0) {
            return Err(mismatch(input, self));
        }
        Ok(cast)
    }

    fn validate_f64(&self, input: &serde_json::Value) -> Result<f64> {
        input.as_f64().ok_or_else(|| mismatch(input, self))
    }

    fn validate_bool(&self, input: &serde_json::Value) -> Result<bool> {
        if let Some(b) = input.as_bool() {
            return Ok(b);
        }
        match input.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(mismatch(input, self)),
        }
    }

    fn validate_str(&self, input: &serde_json::Value) -> Result<String> {
        input.as_str().map(str::to_owned).ok_or_else(|| mismatch(input, self))
    }

    fn validate_enum(&self, labels: &[String], input: &serde_json::Value) -> Result<EnumValue> {
        if let Some(i) = input.as_u64() {
            let i = i as usize;
            return labels
                .get(i)
                .map(|label| EnumValue { index: i, label: label.clone() })
                .ok_or_else(|| mismatch(input, self));
        }
        if let Some(s) = input.as_str() {
            if let Some(index) = labels.iter().position(|l| l == s) {
                return Ok(EnumValue { index, label: s.to_owned() });
            }
        }
        Err(mismatch(input, self))
    }

    fn validate_array(&self, kind: ScalarKind, input: serde_json::Value) -> Result<ArrayValue> {
        let items = input
            .as_array()
            .cloned()
            .ok_or_else(|| MalcolmError::TypeMismatch { value: input.to_string(), expected: self.clone() })?;
        let elem = VType::from_scalar(kind);
        macro_rules! collect {
            ($variant:ident, $as_fn:expr) => {{
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let v = elem.validate(item)?;
                    out.push($as_fn(v)?);
                }
                Ok(ArrayValue::$variant(out))
            }};
        }
        match kind {
            ScalarKind::I8 => collect!(I8, |v| as_i8(v)),
            ScalarKind::I16 => collect!(I16, |v| as_i16(v)),
            ScalarKind::I32 => collect!(I32, |v| as_i32(v)),
            ScalarKind::I64 => collect!(I64, |v| as_i64_value(v)),
            ScalarKind::F32 => collect!(F32, |v| as_f32(v)),
            ScalarKind::F64 => collect!(F64, |v| as_f64_value(v)),
            ScalarKind::Bool => collect!(Bool, |v| as_bool(v)),
            ScalarKind::Str => collect!(Str, |v| as_str_value(v)),
        }
    }

    fn validate_table(
        &self,
        cols: &IndexMap<String, ScalarKind>,
        input: serde_json::Value,
    ) -> Result<Table> {
        let obj = input
            .as_object()
            .cloned()
            .ok_or_else(|| MalcolmError::TypeMismatch { value: input.to_string(), expected: self.clone() })?;
        let mut columns = IndexMap::with_capacity(cols.len());
        let mut lengths = std::collections::HashSet::new();
        for (name, kind) in cols {
            let raw = obj.get(name).cloned().unwrap_or(serde_json::Value::Array(vec![]));
            let array = match VType::Array(*kind).validate(raw)? {
                Value::Array(a) => a,
                _ => unreachable!("Array validate always returns Value::Array"),
            };
            lengths.insert(array.len());
            columns.insert(name.clone(), array);
        }
        if lengths.len() > 1 {
            return Err(MalcolmError::TypeMismatch {
                value: "<table>".into(),
                expected: self.clone(),
            });
        }
        Ok(Table { columns })
    }

    fn validate_device_ref(
        &self,
        labels: Option<&[String]>,
        input: &serde_json::Value,
        resolver: Option<&dyn DeviceResolver>,
    ) -> Result<String> {
        let s = input.as_str().ok_or_else(|| mismatch(input, self))?;
        if let Some(labels) = labels {
            if !labels.iter().any(|l| l == s) {
                return Err(mismatch(input, self));
            }
        }
        if let Some(resolver) = resolver {
            if !resolver.resolve(s) {
                return Err(mismatch(input, self));
            }
        }
        Ok(s.to_owned())
    }

    fn from_scalar(kind: ScalarKind) -> VType {
        match kind {
            ScalarKind::I8 => VType::I8,
            ScalarKind::I16 => VType::I16,
            ScalarKind::I32 => VType::I32,
            ScalarKind::I64 => VType::I64,
            ScalarKind::F32 => VType::F32,
            ScalarKind::F64 => VType::F64,
            ScalarKind::Bool => VType::Bool,
            ScalarKind::Str => VType::Str,
        }
    }

    /// Render the structural schema: `{name, version:"2", ...}`, with
    /// enums additionally carrying `labels` (spec §4.1).
    pub fn schema(&self) -> serde_json::Value {
        match self {
            Self::I8 => scalar_schema("byte"),
            Self::I16 => scalar_schema("short"),
            Self::I32 => scalar_schema("int"),
            Self::I64 => scalar_schema("long"),
            Self::F32 => scalar_schema("float"),
            Self::F64 => scalar_schema("double"),
            Self::Bool => scalar_schema("bool"),
            Self::Str => scalar_schema("string"),
            Self::Enum(labels) => {
                serde_json::json!({"name": "enum", "version": "2", "labels": labels})
            }
            Self::Array(kind) => {
                serde_json::json!({"name": format!("{}_array", kind.name()), "version": "2"})
            }
            Self::Table(cols) => {
                let column_schema: IndexMap<&String, &'static str> =
                    cols.iter().map(|(k, v)| (k, v.name())).collect();
                serde_json::json!({"name": "table", "version": "2", "columns": column_schema})
            }
            Self::DeviceRef(labels) => {
                serde_json::json!({"name": "device_ref", "version": "2", "labels": labels})
            }
        }
    }
}

fn scalar_schema(name: &str) -> serde_json::Value {
    serde_json::json!({"name": name, "version": "2"})
}

fn mismatch(input: &serde_json::Value, vtype: &VType) -> MalcolmError {
    MalcolmError::TypeMismatch { value: input.to_string(), expected: vtype.clone() }
}

fn as_i8(v: Value) -> Result<i8> {
    match v {
        Value::I8(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_i16(v: Value) -> Result<i16> {
    match v {
        Value::I16(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_i32(v: Value) -> Result<i32> {
    match v {
        Value::I32(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_i64_value(v: Value) -> Result<i64> {
    match v {
        Value::I64(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_f32(v: Value) -> Result<f32> {
    match v {
        Value::F32(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_f64_value(v: Value) -> Result<f64> {
    match v {
        Value::F64(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_bool(v: Value) -> Result<bool> {
    match v {
        Value::Bool(x) => Ok(x),
        _ => unreachable!(),
    }
}
fn as_str_value(v: Value) -> Result<String> {
    match v {
        Value::Str(x) => Ok(x),
        _ => unreachable!(),
    }
}

#[cfg(test)]
#[path = "vtype_tests.rs"]
mod tests;
