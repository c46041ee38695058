#![allow(dead_code)]

pub mod logging;

use std::sync::Arc;

use cryptbox::Algorithm;
use cryptbox::BoxConfig;
use cryptbox::CryptBox;
use cryptbox::DataDirectory;
use cryptbox::LifecycleHost;
use cryptbox::LifecycleHub;
use cryptbox::ValueMap;
use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// A throwaway data directory; removed when dropped.
pub fn data_dir() -> (TempDir, DataDirectory) {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = DataDirectory::get(Some(tmp.path().to_path_buf())).unwrap();
    (tmp, data_dir)
}

/// The algorithm keyed tests run with: the default when a cipher backend is
/// compiled in.
pub fn keyed_algorithm() -> Algorithm {
    Algorithm::default()
}

pub fn keyed_box(data_dir: &DataDirectory, name: &str, key: &str) -> CryptBox {
    let config = BoxConfig::new(name, data_dir)
        .with_algorithm(keyed_algorithm())
        .with_key(key);
    CryptBox::construct(config, None).unwrap()
}

pub fn hosted_box(data_dir: &DataDirectory, name: &str, hub: &Arc<LifecycleHub>) -> CryptBox {
    let host: Arc<dyn LifecycleHost> = hub.clone();
    let config = BoxConfig::new(name, data_dir).with_algorithm(Algorithm::Identity);
    CryptBox::construct(config, Some(host)).unwrap()
}

/// JSON-like values a few levels deep, with finite floats.
pub fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// User mappings; keys never collide with the reserved header key.
pub fn arb_mapping() -> impl Strategy<Value = ValueMap> {
    prop::collection::btree_map("[a-zA-Z0-9 ]{1,12}", arb_value(), 0..8)
}
