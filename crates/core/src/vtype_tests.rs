// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn int_rejects_lossy_narrowing() {
    let err = VType::I8.validate(json!(300)).unwrap_err();
    assert_eq!(err.code(), "TYPE_MISMATCH");
    assert_eq!(VType::I8.validate(json!(120)).unwrap(), Value::I8(120));
}

#[test]
fn int_rejects_fractional_value() {
    assert!(VType::I32.validate(json!(1.5)).is_err());
}

#[test]
fn float_accepts_whole_and_fractional() {
    assert_eq!(VType::F64.validate(json!(1.5)).unwrap(), Value::F64(1.5));
    assert_eq!(VType::F32.validate(json!(2.5)).unwrap(), Value::F32(2.5));
}

#[test]
fn bool_accepts_bool_and_bit() {
    assert_eq!(VType::Bool.validate(json!(true)).unwrap(), Value::Bool(true));
    assert_eq!(VType::Bool.validate(json!(1)).unwrap(), Value::Bool(true));
    assert_eq!(VType::Bool.validate(json!(0)).unwrap(), Value::Bool(false));
    assert!(VType::Bool.validate(json!(2)).is_err());
}

#[test]
fn string_requires_string() {
    assert_eq!(VType::Str.validate(json!("hi")).unwrap(), Value::Str("hi".into()));
    assert!(VType::Str.validate(json!(5)).is_err());
}

#[test]
fn enum_accepts_index_or_label() {
    let vt = VType::Enum(vec!["red".into(), "green".into(), "blue".into()]);
    assert_eq!(
        vt.validate(json!(1)).unwrap(),
        Value::Enum(EnumValue { index: 1, label: "green".into() })
    );
    assert_eq!(
        vt.validate(json!("blue")).unwrap(),
        Value::Enum(EnumValue { index: 2, label: "blue".into() })
    );
    assert!(vt.validate(json!("purple")).is_err());
    assert!(vt.validate(json!(99)).is_err());
}

#[test]
fn enum_validate_is_idempotent() {
    let vt = VType::Enum(vec!["a".into(), "b".into()]);
    let once = vt.validate(json!("b")).unwrap();
    let twice = match &once {
        Value::Enum(e) => vt.validate(json!(e.label.clone())).unwrap(),
        _ => unreachable!(),
    };
    assert_eq!(once, twice);
}

#[test]
fn array_validates_elementwise_from_generic_sequence() {
    let vt = VType::Array(ScalarKind::I32);
    let v = vt.validate(json!([1, 2, 3])).unwrap();
    assert_eq!(v, Value::Array(ArrayValue::I32(vec![1, 2, 3])));
}

#[test]
fn array_rejects_lossy_element() {
    let vt = VType::Array(ScalarKind::I8);
    assert!(vt.validate(json!([1, 2, 1000])).is_err());
}

#[test]
fn table_requires_equal_column_lengths() {
    let mut cols = IndexMap::new();
    cols.insert("x".to_owned(), ScalarKind::F64);
    cols.insert("y".to_owned(), ScalarKind::F64);
    let vt = VType::Table(cols);

    let ok = vt.validate(json!({"x": [1.0, 2.0], "y": [3.0, 4.0]}));
    assert!(ok.is_ok());

    let bad = vt.validate(json!({"x": [1.0, 2.0], "y": [3.0]}));
    assert!(bad.is_err());
}

#[test]
fn device_ref_restricts_to_labels() {
    let vt = VType::DeviceRef(Some(vec!["det1".into(), "det2".into()]));
    assert_eq!(vt.validate(json!("det1")).unwrap(), Value::DeviceRef("det1".into()));
    assert!(vt.validate(json!("unknown")).is_err());

    let open = VType::DeviceRef(None);
    assert_eq!(open.validate(json!("anything")).unwrap(), Value::DeviceRef("anything".into()));
}

struct RegisteredOnly(std::collections::HashSet<&'static str>);

impl DeviceResolver for RegisteredOnly {
    fn resolve(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

#[test]
fn device_ref_with_resolver_rejects_names_not_currently_registered() {
    let vt = VType::DeviceRef(None);
    let resolver = RegisteredOnly(["det1"].into_iter().collect());

    assert_eq!(
        vt.validate_with_resolver(json!("det1"), Some(&resolver)).unwrap(),
        Value::DeviceRef("det1".into())
    );
    assert!(vt.validate_with_resolver(json!("det2"), Some(&resolver)).is_err());
}

#[test]
fn device_ref_with_resolver_still_honors_the_static_label_list() {
    let vt = VType::DeviceRef(Some(vec!["det1".into()]));
    let resolver = RegisteredOnly(["det1", "det2"].into_iter().collect());

    // "det2" is registered but not on the static allow-list, so it's still
    // rejected: the resolver narrows further, it doesn't widen the labels.
    assert!(vt.validate_with_resolver(json!("det2"), Some(&resolver)).is_err());
}

#[test]
fn schema_includes_name_and_version() {
    let schema = VType::I32.schema();
    assert_eq!(schema["name"], "int");
    assert_eq!(schema["version"], "2");
}

#[test]
fn enum_schema_carries_labels() {
    let vt = VType::Enum(vec!["a".into(), "b".into()]);
    let schema = vt.schema();
    assert_eq!(schema["labels"], json!(["a", "b"]));
}

#[test]
fn equality_is_structural() {
    assert_eq!(VType::Enum(vec!["a".into()]), VType::Enum(vec!["a".into()]));
    assert_ne!(VType::Enum(vec!["a".into()]), VType::Enum(vec!["b".into()]));
    assert_eq!(VType::I32, VType::I32);
    assert_ne!(VType::I32, VType::I64);
}

#[test]
fn validate_is_idempotent_on_accepted_values() {
    // spec §8: VType.validate(validate(x)) == validate(x)
    let vt = VType::F32;
    let once = vt.validate(json!(1.25)).unwrap();
    let as_json = serde_json::to_value(&once).unwrap();
    let twice = vt.validate(as_json).unwrap();
    assert_eq!(once, twice);
}

mod idempotence {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn i32_validate_is_idempotent(n: i32) {
            let vt = VType::I32;
            let once = vt.validate(json!(n)).unwrap();
            let twice = vt.validate(serde_json::to_value(&once).unwrap()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn f64_validate_is_idempotent(n: f64) {
            prop_assume!(n.is_finite());
            let vt = VType::F64;
            let once = vt.validate(json!(n)).unwrap();
            let twice = vt.validate(serde_json::to_value(&once).unwrap()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn bool_validate_is_idempotent(b: bool) {
            let vt = VType::Bool;
            let once = vt.validate(json!(b)).unwrap();
            let twice = vt.validate(serde_json::to_value(&once).unwrap()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn str_validate_is_idempotent(s: String) {
            let vt = VType::Str;
            let once = vt.validate(json!(s)).unwrap();
            let twice = vt.validate(serde_json::to_value(&once).unwrap()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn enum_validate_is_idempotent_by_index(i in 0usize..4) {
            let labels: Vec<String> = vec!["a".into(), "b".into(), "c".into(), "d".into()];
            let vt = VType::Enum(labels);
            let once = vt.validate(json!(i)).unwrap();
            let twice = match &once {
                Value::Enum(e) => vt.validate(json!(e.label.clone())).unwrap(),
                _ => unreachable!(),
            };
            prop_assert_eq!(once, twice);
        }
    }
}
