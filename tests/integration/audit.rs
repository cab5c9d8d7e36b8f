//! Auditing a stored manifest against the dataset it was built from.

use std::sync::Arc;

use sigcat_cas::{
    DiscrepancyKind, ManifestBuilder, diff_manifests, read_manifest_file, write_manifest_file,
};
use sigcat_integration_tests::{DatasetFixture, channel_name, sha256_hex};
use sigcat_store::LocalSource;
use sigcat_types::{DatasetConfig, Manifest, SchemaKind};

async fn build(config: DatasetConfig) -> Manifest {
    ManifestBuilder::new(Arc::new(LocalSource), config)
        .unwrap()
        .build()
        .await
        .unwrap()
}

fn fixture_with_sessions(sessions: &[&str]) -> DatasetFixture {
    let fixture = DatasetFixture::new("tfs", "625");
    for session in sessions {
        fixture.add_full_session(session, 4);
    }
    fixture
}

#[tokio::test]
async fn test_untouched_dataset_has_no_discrepancies() {
    let fixture = fixture_with_sessions(&["conv_a", "conv_b"]);
    let path = fixture.output_path("tfs_625.sgcm");
    write_manifest_file(&path, &build(fixture.config()).await).unwrap();

    let stored = read_manifest_file(&path).unwrap();
    let fresh = build(fixture.config()).await;
    assert!(diff_manifests(&stored, &fresh).is_empty());
}

#[tokio::test]
async fn test_modified_channel_is_changed() {
    let fixture = fixture_with_sessions(&["conv_a"]);
    let stored = build(fixture.config()).await;

    let name = channel_name("conv_a", 3);
    fixture.add_channel("conv_a", &name, b"rewritten");
    let fresh = build(fixture.config()).await;

    let diffs = diff_manifests(&stored, &fresh);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].path, format!("electrode_checksums/000/{name}"));
    match &diffs[0].kind {
        DiscrepancyKind::Changed { actual, .. } => assert_eq!(*actual, sha256_hex(b"rewritten")),
        other => panic!("expected Changed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_removed_session_is_missing() {
    let fixture = fixture_with_sessions(&["conv_a", "conv_b"]);
    let stored = build(fixture.config()).await;

    std::fs::remove_dir_all(fixture.session_dir("conv_b")).unwrap();
    let fresh = build(fixture.config()).await;

    let diffs = diff_manifests(&stored, &fresh);
    assert!(!diffs.is_empty());
    assert!(
        diffs
            .iter()
            .all(|d| d.kind == DiscrepancyKind::Missing && d.path.contains("/001"))
    );
    assert!(diffs.iter().any(|d| d.path == "conversations/001"));
}

#[tokio::test]
async fn test_added_channel_changes_count_only() {
    let fixture = fixture_with_sessions(&["conv_a"]);
    let stored = build(fixture.config()).await;

    // Channel 5 is beyond the cap of four; only the count moves.
    fixture.add_channel("conv_a", &channel_name("conv_a", 5), b"new");
    let fresh = build(fixture.config()).await;

    let diffs = diff_manifests(&stored, &fresh);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].path, "electrode_counts/000/count");
    assert_eq!(
        diffs[0].kind,
        DiscrepancyKind::Changed {
            expected: "4".to_string(),
            actual: "5".to_string()
        }
    );
}

#[tokio::test]
async fn test_schema_mismatch_is_reported() {
    let fixture = fixture_with_sessions(&["conv_a"]);
    let flat = build(fixture.config()).await;

    let mut config = fixture.config();
    config.policy.schema = SchemaKind::Nested;
    let nested = build(config).await;

    let diffs = diff_manifests(&flat, &nested);
    assert!(diffs.iter().any(|d| d.path == "@schema"));
    assert!(diffs.iter().any(|d| d.path == "sessions" && d.kind == DiscrepancyKind::Unexpected));
    assert!(
        diffs
            .iter()
            .any(|d| d.path == "conversations" && d.kind == DiscrepancyKind::Missing)
    );
}
