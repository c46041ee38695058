mod common;

use std::fs;

use common::logging;
use cryptbox::encryption::transport;
use cryptbox::Algorithm;
use cryptbox::BoxConfig;
use cryptbox::BoxError;
use cryptbox::CryptBox;
use cryptbox::LoadOutcome;
use cryptbox::ValueMap;
use proptest::prop_assert_eq;
use serde_json::json;
use serde_json::Number;
use test_strategy::proptest;

fn plain_box(data_dir: &cryptbox::DataDirectory, name: &str) -> CryptBox {
    let config = BoxConfig::new(name, data_dir).with_algorithm(Algorithm::Identity);
    CryptBox::construct(config, None).unwrap()
}

#[test]
fn plain_box_round_trips() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();

    let writer = plain_box(&data_dir, "plain");
    writer.set("n", 1).unwrap();
    writer.set("f", 2.5).unwrap();
    writer.set("s", "hello").unwrap();
    writer.set("list", json!([1, "two", null])).unwrap();
    writer.set("map", json!({"nested": {"deep": true}})).unwrap();
    writer.save().unwrap();

    let reader = plain_box(&data_dir, "plain");
    assert_eq!(LoadOutcome::FromFile, reader.load(None).unwrap());
    assert_eq!(writer.keys(), reader.keys());
    for key in writer.keys() {
        assert_eq!(writer.get(&key), reader.get(&key), "value of {key}");
    }
    assert_eq!(writer.header().unwrap().created(), reader.header().unwrap().created());
}

#[proptest(cases = 32)]
fn any_mapping_survives_save_and_load(#[strategy(common::arb_mapping())] mapping: ValueMap) {
    let (_tmp, data_dir) = common::data_dir();

    let writer = plain_box(&data_dir, "generated");
    for (key, value) in &mapping {
        writer.set(key, value.clone()).unwrap();
    }
    writer.save().unwrap();

    let reader = plain_box(&data_dir, "generated");
    reader.load(None).unwrap();
    prop_assert_eq!(mapping.keys().cloned().collect::<Vec<_>>(), reader.keys());
    for (key, value) in &mapping {
        prop_assert_eq!(Some(value.clone()), reader.get(key));
    }
}

#[test]
fn box_over_existing_file_keeps_its_contents() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();

    let first = plain_box(&data_dir, "shared");
    first.set("keep", 1).unwrap();
    first.save().unwrap();
    let created = first.header().unwrap().created();

    let second = plain_box(&data_dir, "shared");
    second.set("other", 2).unwrap();
    assert!(matches!(second.save(), Err(BoxError::InvalidInput(_))));

    let reader = plain_box(&data_dir, "shared");
    reader.load(None).unwrap();
    assert_eq!(Some(json!(1)), reader.get("keep"));
    assert!(!reader.is_set("other"));
    assert_eq!(created, reader.header().unwrap().created());
}

#[test]
fn header_survives_load_without_going_backwards() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "steady");

    cb.set("k", 1).unwrap();
    cb.save().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    cb.get("k");
    let before = cb.header().unwrap();

    cb.load(None).unwrap();
    let after = cb.header().unwrap();
    assert_eq!(before.created(), after.created());
    assert!(after.accessed() >= before.accessed());
    assert!(after.modified() >= before.modified());
    assert!(after.saved() >= before.saved());
    assert!(after.loaded() > before.loaded());
}

#[test]
fn destroyed_box_leaves_its_file_alone() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let mut cb = plain_box(&data_dir, "kept");
    cb.set("k", 1).unwrap();
    cb.save().unwrap();
    cb.destroy();

    assert!(matches!(cb.wipe(), Err(BoxError::UseAfterDestroy(_))));
    assert!(matches!(cb.clear(), Err(BoxError::UseAfterDestroy(_))));
    assert!(matches!(cb.load(None), Err(BoxError::UseAfterDestroy(_))));
    assert!(cb.path().exists());

    let reader = plain_box(&data_dir, "kept");
    reader.load(None).unwrap();
    assert_eq!(Some(json!(1)), reader.get("k"));
}

#[test]
fn file_without_header_gets_a_fresh_one() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "legacy");
    fs::create_dir_all(data_dir.root_dir_path()).unwrap();
    fs::write(cb.path(), transport::encode(br#"{"a":1}"#)).unwrap();

    cb.load(None).unwrap();
    assert_eq!(Some(json!(1)), cb.get("a"));
    assert!(cb.header().unwrap().loaded().is_some());
}

#[test]
fn newer_format_version_is_refused() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "future");
    fs::create_dir_all(data_dir.root_dir_path()).unwrap();
    let payload = br#"{"_header":{"version":99,"created":0},"a":1}"#;
    fs::write(cb.path(), transport::encode(payload)).unwrap();

    assert!(matches!(cb.load(None), Err(BoxError::DecodeFailure(_))));
    assert!(!cb.is_set("a"));
}

#[test]
fn garbage_file_is_a_decode_failure_for_plain_boxes() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "garbage");
    fs::create_dir_all(data_dir.root_dir_path()).unwrap();
    fs::write(cb.path(), "!!! not base64 !!!").unwrap();
    assert!(matches!(cb.load(None), Err(BoxError::DecodeFailure(_))));

    fs::write(cb.path(), transport::encode(b"[1, 2]")).unwrap();
    assert!(matches!(cb.load(None), Err(BoxError::DecodeFailure(_))));
}

#[test]
fn increment_semantics() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "counters");

    // absent key: error, nothing created
    assert!(matches!(cb.increment("hits"), Err(BoxError::NotFound(_))));
    assert!(!cb.is_set("hits"));

    cb.set("hits", 41).unwrap();
    assert_eq!(Number::from(42), cb.increment("hits").unwrap());
    assert_eq!(Some(json!(42)), cb.get("hits"));

    cb.set("ratio", 0.5).unwrap();
    let sum = cb.increment_by("ratio", 1).unwrap();
    assert_eq!(Some(1.5), sum.as_f64());

    cb.set("name", "x").unwrap();
    assert!(matches!(
        cb.decrement("name"),
        Err(BoxError::TypeMismatch { .. })
    ));
    assert_eq!(Some(json!("x")), cb.get("name"));

    cb.set("big", i64::MAX).unwrap();
    let overflowed = cb.increment("big").unwrap();
    assert_eq!(Some(i64::MAX as u64 + 1), overflowed.as_u64());
}

#[test]
fn set_if_higher_semantics() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "scores");

    assert!(cb.set_if_higher("best", 100).unwrap());
    assert!(!cb.set_if_higher("best", 50).unwrap());
    assert_eq!(Some(json!(100)), cb.get("best"));
    assert!(cb.set_if_higher("best", 150).unwrap());
    assert_eq!(Some(json!(150)), cb.get("best"));

    cb.set("label", "gold").unwrap();
    assert!(cb.set_if_higher("label", 1).is_err());
    assert_eq!(Some(json!("gold")), cb.get("label"));
}

#[test]
fn header_read_does_not_count_as_access() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "meta");
    cb.set("k", 1).unwrap();

    let before = cb.header().unwrap();
    let header = cb.get("_header").unwrap();
    assert_eq!(json!(1), header["version"]);
    assert_eq!(Some(before), cb.header());
    assert!(matches!(
        cb.set("_header", json!({})),
        Err(BoxError::InvalidInput(_))
    ));
}

#[test]
fn header_timestamps_never_go_backwards() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "clock");

    cb.set("k", 1).unwrap();
    cb.save().unwrap();
    let first_save = cb.header().unwrap().saved().unwrap();
    cb.load(None).unwrap();
    let first_load = cb.header().unwrap().loaded().unwrap();
    assert!(first_load >= first_save);

    cb.set("k", 2).unwrap();
    cb.save().unwrap();
    assert!(cb.header().unwrap().saved().unwrap() >= first_save);
    cb.load(None).unwrap();
    assert!(cb.header().unwrap().loaded().unwrap() >= first_load);
    assert!(cb.header().unwrap().created() <= first_save);
}

#[test]
fn wipe_then_fresh_box() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "temp");
    cb.set("k", 1).unwrap();
    cb.save().unwrap();
    let created = cb.header().unwrap().created();

    cb.wipe().unwrap();
    assert!(!cb.path().exists());
    assert!(cb.keys().is_empty());

    let again = plain_box(&data_dir, "temp");
    assert_eq!(LoadOutcome::Fresh, again.load(None).unwrap());
    assert!(again.keys().is_empty());
    assert!(again.header().unwrap().created() >= created);
}

#[test]
fn clear_persists_an_empty_box() {
    logging::tracing_logger();
    let (_tmp, data_dir) = common::data_dir();
    let cb = plain_box(&data_dir, "cleared");
    cb.set("k", 1).unwrap();
    cb.save().unwrap();
    cb.clear().unwrap();

    let reader = plain_box(&data_dir, "cleared");
    assert_eq!(LoadOutcome::FromFile, reader.load(None).unwrap());
    assert!(reader.keys().is_empty());
}

#[cfg(feature = "crypto")]
mod keyed {
    use super::*;

    #[test]
    fn encrypted_round_trip() {
        logging::tracing_logger();
        let (_tmp, data_dir) = common::data_dir();

        let writer = common::keyed_box(&data_dir, "vault", "correct horse");
        writer.set("token", "s3cr3t").unwrap();
        writer.set("count", 7).unwrap();
        writer.save().unwrap();

        let on_disk = fs::read_to_string(writer.path()).unwrap();
        assert!(!on_disk.contains("s3cr3t"));

        let reader = common::keyed_box(&data_dir, "vault", "correct horse");
        reader.load(None).unwrap();
        assert_eq!(Some(json!("s3cr3t")), reader.get("token"));
        assert_eq!(Some(json!(7)), reader.get("count"));
    }

    #[test]
    fn legacy_ecb_round_trip() {
        logging::tracing_logger();
        let (_tmp, data_dir) = common::data_dir();
        let config = |name: &str| {
            BoxConfig::new(name, &data_dir)
                .with_algorithm(Algorithm::Aes256Ecb)
                .with_key("pw")
        };

        let writer = CryptBox::construct(config("ecb"), None).unwrap();
        writer.set("k", json!({"a": [1, 2, 3]})).unwrap();
        writer.save().unwrap();

        let reader = CryptBox::construct(config("ecb"), None).unwrap();
        reader.load(None).unwrap();
        assert_eq!(writer.get("k"), reader.get("k"));
    }

    #[test]
    fn wrong_key_is_detected_and_changes_nothing() {
        logging::tracing_logger();
        let (_tmp, data_dir) = common::data_dir();
        let writer = common::keyed_box(&data_dir, "locked", "right");
        writer.set("k", "v").unwrap();
        writer.save().unwrap();

        let intruder = common::keyed_box(&data_dir, "locked", "wrong");
        assert!(!intruder.verify_key("wrong"));
        assert!(intruder.verify_key("right"));

        intruder.set("mine", 1).unwrap();
        assert!(matches!(
            intruder.load(None),
            Err(BoxError::DecryptFailure(_))
        ));
        assert_eq!(Some(json!(1)), intruder.get("mine"));
        assert!(!intruder.is_set("k"));
        assert_eq!(None, intruder.header());

        // a successful load with the right key replaces the data
        intruder.load(Some("right")).unwrap();
        assert_eq!(Some(json!("v")), intruder.get("k"));
        assert!(!intruder.is_set("mine"));
    }

    #[test]
    fn empty_key_does_no_io() {
        logging::tracing_logger();
        let (_tmp, data_dir) = common::data_dir();
        let cb = CryptBox::construct(
            BoxConfig::new("keyless", &data_dir).with_algorithm(common::keyed_algorithm()),
            None,
        )
        .unwrap();

        assert!(matches!(cb.load(Some("")), Err(BoxError::InvalidInput(_))));
        assert!(!cb.verify_key(""));
        assert!(!cb.path().exists());
        assert!(!data_dir.root_dir_path().join("keyless.crypt.tmp").exists());
    }

    #[test]
    fn keyless_box_is_unlocked_by_load() {
        logging::tracing_logger();
        let (_tmp, data_dir) = common::data_dir();
        let writer = common::keyed_box(&data_dir, "later", "pw");
        writer.set("k", 1).unwrap();
        writer.save().unwrap();

        let reader = CryptBox::construct(
            BoxConfig::new("later", &data_dir).with_algorithm(common::keyed_algorithm()),
            None,
        )
        .unwrap();
        assert!(matches!(reader.load(None), Err(BoxError::MissingKey(_))));
        reader.load(Some("pw")).unwrap();
        assert_eq!(Some(json!(1)), reader.get("k"));

        // the key given on load is kept for saving
        reader.set("k", 2).unwrap();
        reader.save().unwrap();
        assert!(reader.verify_key("pw"));
    }
}
