//! End-to-end builds against real directory trees.
//!
//! Connects sigcat-store + sigcat-cas: walk a fixture dataset, checksum it,
//! write the manifest to disk and read it back.

use std::sync::Arc;

use sigcat_cas::{
    CasError, ManifestBuilder, decode_manifest, encode_manifest, manifest_file_name,
    read_manifest_file, write_manifest_file,
};
use sigcat_integration_tests::{DatasetFixture, channel_bytes, channel_name, sha256_hex};
use sigcat_store::{LocalSource, MemorySource, StoreError};
use sigcat_types::{
    BuildPolicy, DatasetConfig, KeyScheme, Manifest, SchemaKind, SubjectConventions, Value,
};

const SESSIONS: [&str; 3] = [
    "NY625_418_Part1_conversation1",
    "NY625_418_Part2_conversation1",
    "NY625_419_Part1_conversation2",
];

async fn build(config: DatasetConfig) -> Result<Manifest, CasError> {
    ManifestBuilder::new(Arc::new(LocalSource), config)?
        .build()
        .await
}

fn str_value(s: &str) -> Value {
    Value::Str(s.to_string())
}

#[tokio::test]
async fn test_subject_625_default_policy() {
    let fixture = DatasetFixture::new("tfs", "625");
    for session in SESSIONS {
        fixture.add_full_session(session, 5);
    }

    let manifest = build(fixture.config()).await.unwrap();

    let names: Vec<&str> = manifest.collections.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "conversations",
            "datum_checksums",
            "electrode_counts",
            "electrode_checksums"
        ]
    );

    let conversations = manifest.collection("conversations").unwrap();
    assert_eq!(conversations.keys().collect::<Vec<_>>(), vec!["000", "001", "002"]);
    for (i, session) in SESSIONS.iter().enumerate() {
        let key = format!("{i:03}");

        assert_eq!(
            conversations.get(&key).unwrap().get("name"),
            Some(&str_value(session))
        );

        let datum = manifest.collection("datum_checksums").unwrap().get(&key).unwrap();
        let datum_name = format!("{session}_datum_trimmed.txt");
        assert_eq!(
            datum.get(&datum_name),
            Some(&str_value(&sha256_hex(format!("datum of {session}").as_bytes())))
        );

        let count = manifest.collection("electrode_counts").unwrap().get(&key).unwrap();
        assert_eq!(count.get("count"), Some(&Value::Int(5)));

        let checksums = manifest
            .collection("electrode_checksums")
            .unwrap()
            .get(&key)
            .unwrap();
        assert_eq!(checksums.len(), 4);
        for c in 1..=4 {
            assert_eq!(
                checksums.get(&channel_name(session, c)),
                Some(&str_value(&sha256_hex(&channel_bytes(session, c))))
            );
        }
        assert!(checksums.get(&channel_name(session, 5)).is_none());
    }
}

#[tokio::test]
async fn test_numeric_channel_order() {
    let fixture = DatasetFixture::new("tfs", "625");
    fixture.add_full_session(SESSIONS[0], 12);

    let policy = BuildPolicy {
        max_channels: Some(10),
        ..BuildPolicy::default()
    };
    let manifest = build(fixture.config_with(policy)).await.unwrap();

    let Some(sigcat_types::Record::Flat(entries)) = manifest
        .collection("electrode_checksums")
        .and_then(|c| c.get("000"))
        .cloned()
    else {
        panic!("expected flat electrode record");
    };
    let keys: Vec<String> = entries.into_iter().map(|e| e.key).collect();
    let expected: Vec<String> = (1..=10).map(|c| channel_name(SESSIONS[0], c)).collect();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_session_cap_larger_than_available() {
    let fixture = DatasetFixture::new("tfs", "625");
    for session in SESSIONS {
        fixture.add_full_session(session, 2);
    }

    let policy = BuildPolicy {
        max_sessions: Some(10),
        ..BuildPolicy::default()
    };
    let manifest = build(fixture.config_with(policy)).await.unwrap();
    for collection in &manifest.collections {
        assert_eq!(collection.len(), 3, "collection {}", collection.name);
    }
}

#[tokio::test]
async fn test_session_cap_keeps_first_sessions() {
    let fixture = DatasetFixture::new("tfs", "625");
    for session in ["d_session", "a_session", "c_session", "b_session"] {
        fixture.add_full_session(session, 1);
    }

    let manifest = build(fixture.config()).await.unwrap();
    let conversations = manifest.collection("conversations").unwrap();
    let names: Vec<&Value> = conversations
        .records
        .iter()
        .filter_map(|r| r.record.get("name"))
        .collect();
    assert_eq!(
        names,
        vec![
            &str_value("a_session"),
            &str_value("b_session"),
            &str_value("c_session")
        ]
    );
}

#[tokio::test]
async fn test_absent_and_ambiguous_datum_are_soft() {
    let fixture = DatasetFixture::new("tfs", "625");
    fixture.add_full_session(SESSIONS[0], 2);

    // No misc folder at all.
    fixture.add_session(SESSIONS[1]);
    fixture.add_channel(SESSIONS[1], "ch_1.mat", b"one");

    // Two candidates: ambiguous.
    fixture.add_session(SESSIONS[2]);
    fixture.add_channel(SESSIONS[2], "ch_1.mat", b"one");
    fixture.add_datum(SESSIONS[2], "a_trimmed.txt", b"a");
    fixture.add_datum(SESSIONS[2], "b_trimmed.txt", b"b");

    let manifest = build(fixture.config()).await.unwrap();

    let datums = manifest.collection("datum_checksums").unwrap();
    assert_eq!(datums.keys().collect::<Vec<_>>(), vec!["000"]);

    let counts = manifest.collection("electrode_counts").unwrap();
    assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["000", "001", "002"]);
    assert_eq!(counts.get("001").unwrap().get("count"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_empty_electrode_folder() {
    let fixture = DatasetFixture::new("tfs", "625");
    fixture.add_session(SESSIONS[0]);

    let manifest = build(fixture.config()).await.unwrap();
    let counts = manifest.collection("electrode_counts").unwrap();
    assert_eq!(counts.get("000").unwrap().get("count"), Some(&Value::Int(0)));
    let checksums = manifest.collection("electrode_checksums").unwrap();
    assert!(checksums.get("000").unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_data_root_is_configuration_error() {
    let fixture = DatasetFixture::new("tfs", "625");
    let mut config = fixture.config();
    config.subject = "9999".to_string();

    let err = build(config).await.unwrap_err();
    assert!(matches!(err, CasError::Configuration(_)), "got {err:?}");
}

#[tokio::test]
async fn test_missing_electrode_folder_is_io_error() {
    let fixture = DatasetFixture::new("tfs", "625");
    std::fs::create_dir_all(fixture.session_dir(SESSIONS[0])).unwrap();

    let err = build(fixture.config()).await.unwrap_err();
    assert!(matches!(err, CasError::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreadable_channel_fails_build() {
    let source = MemorySource::new();
    let session = "/data/625/NY625_418_Part1_conversation1";
    source.add_file(format!("{session}/preprocessed/ch_1.mat"), b"ok".to_vec());
    source.add_unreadable(format!("{session}/preprocessed/ch_2.mat"));

    let config = DatasetConfig {
        project: "tfs".to_string(),
        subject: "625".to_string(),
        data_dir: "/data".into(),
        conventions: SubjectConventions {
            electrode_folder: "preprocessed".to_string(),
            datum_pattern: "*trimmed.txt".to_string(),
        },
        policy: BuildPolicy::default(),
    };
    let err = ManifestBuilder::new(Arc::new(source), config)
        .unwrap()
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, CasError::Io(StoreError::Io { .. })), "got {err:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_channel_symlink_fails_build() {
    let fixture = DatasetFixture::new("tfs", "625");
    fixture.add_full_session("conv_a", 1);
    let electrodes = fixture.session_dir("conv_a").join("preprocessed");
    std::os::unix::fs::symlink(
        electrodes.join("gone.bin"),
        electrodes.join(channel_name("conv_a", 2)),
    )
    .unwrap();

    let err = build(fixture.config()).await.unwrap_err();
    assert!(matches!(err, CasError::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn test_nested_schema_with_basename_keys() {
    let fixture = DatasetFixture::new("tfs", "625");
    fixture.add_full_session(SESSIONS[0], 3);

    let policy = BuildPolicy {
        schema: SchemaKind::Nested,
        key_scheme: KeyScheme::Basename,
        ..BuildPolicy::default()
    };
    let manifest = build(fixture.config_with(policy)).await.unwrap();

    assert_eq!(manifest.collections.len(), 1);
    let sessions = manifest.collection("sessions").unwrap();
    let record = sessions.get(SESSIONS[0]).unwrap();
    assert_eq!(record.kind(), SchemaKind::Nested);

    let datum = record.section("datum").unwrap();
    assert_eq!(
        datum.get("name"),
        Some(&str_value(&format!("{}_datum_trimmed.txt", SESSIONS[0])))
    );
    let electrodes = record.section("electrodes").unwrap();
    assert_eq!(electrodes.entries.len(), 3);
    assert_eq!(
        record.section("counts").unwrap().get("electrodes"),
        Some(&Value::Int(3))
    );
}

#[tokio::test]
async fn test_podcast_conventions() {
    let fixture = DatasetFixture::with_conventions(
        "podcast",
        "717",
        SubjectConventions {
            electrode_folder: "preprocessed_all".to_string(),
            datum_pattern: "*trimmed.txt".to_string(),
        },
    );
    fixture.add_full_session("NY717_111_Part1_conversation1", 2);

    let manifest = build(fixture.config()).await.unwrap();
    assert_eq!(manifest.project, "podcast");
    let counts = manifest.collection("electrode_counts").unwrap();
    assert_eq!(counts.get("000").unwrap().get("count"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_file_round_trip_and_determinism() {
    let fixture = DatasetFixture::new("tfs", "625");
    for session in SESSIONS {
        fixture.add_full_session(session, 5);
    }

    let first = build(fixture.config()).await.unwrap();
    let path = fixture.output_path(manifest_file_name("tfs", "625").to_str().unwrap());
    let digest = write_manifest_file(&path, &first).unwrap();

    assert!(path.ends_with("tfs_625.sgcm"));
    assert_eq!(read_manifest_file(&path).unwrap(), first);

    // Rebuilding with more workers yields byte-identical output.
    let policy = BuildPolicy {
        workers: 16,
        ..BuildPolicy::default()
    };
    let second = build(fixture.config_with(policy)).await.unwrap();
    let second_path = fixture.output_path("again.sgcm");
    assert_eq!(write_manifest_file(&second_path, &second).unwrap(), digest);
    assert_eq!(
        std::fs::read(&path).unwrap(),
        std::fs::read(&second_path).unwrap()
    );
}

#[tokio::test]
async fn test_truncated_file_is_corrupt() {
    let fixture = DatasetFixture::new("tfs", "625");
    fixture.add_full_session(SESSIONS[0], 2);

    let manifest = build(fixture.config()).await.unwrap();
    let bytes = encode_manifest(&manifest).unwrap();
    let path = fixture.output_path("truncated.sgcm");
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = read_manifest_file(&path).unwrap_err();
    assert!(matches!(err, CasError::CorruptData(_)), "got {err:?}");
    assert!(decode_manifest(&bytes).is_ok());
}
