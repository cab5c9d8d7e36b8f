//! Shared harness for sigcat integration tests.
//!
//! Provides [`DatasetFixture`], a subject tree written into a temporary
//! directory laid out the way the lab's recordings are:
//!
//! ```text
//! <data_dir>/<subject>/<session>/misc/<datum>
//! <data_dir>/<subject>/<session>/<electrode_folder>/<channel files>
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use sigcat_types::{BuildPolicy, DatasetConfig, SubjectConventions};
use tempfile::TempDir;

/// A throwaway dataset for one subject.
pub struct DatasetFixture {
    dir: TempDir,
    project: String,
    subject: String,
    conventions: SubjectConventions,
}

impl DatasetFixture {
    /// Empty subject folder using the `tfs` 625 conventions.
    pub fn new(project: &str, subject: &str) -> Self {
        Self::with_conventions(
            project,
            subject,
            SubjectConventions {
                electrode_folder: "preprocessed".to_string(),
                datum_pattern: "*trimmed.txt".to_string(),
            },
        )
    }

    /// Empty subject folder with explicit conventions.
    pub fn with_conventions(project: &str, subject: &str, conventions: SubjectConventions) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join(subject)).expect("create subject dir");
        Self {
            dir,
            project: project.to_string(),
            subject: subject.to_string(),
            conventions,
        }
    }

    /// Dataset root (parent of the subject folder).
    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a session folder.
    pub fn session_dir(&self, session: &str) -> PathBuf {
        self.dir.path().join(&self.subject).join(session)
    }

    /// Create a session with an empty electrode folder.
    pub fn add_session(&self, session: &str) -> PathBuf {
        let path = self.session_dir(session);
        std::fs::create_dir_all(path.join(&self.conventions.electrode_folder))
            .expect("create electrode dir");
        path
    }

    /// Write a datum file into the session's `misc` folder.
    pub fn add_datum(&self, session: &str, name: &str, contents: &[u8]) -> PathBuf {
        let misc = self.session_dir(session).join("misc");
        std::fs::create_dir_all(&misc).expect("create misc dir");
        let path = misc.join(name);
        std::fs::write(&path, contents).expect("write datum");
        path
    }

    /// Write one channel file into the session's electrode folder.
    pub fn add_channel(&self, session: &str, name: &str, contents: &[u8]) -> PathBuf {
        let dir = self.session_dir(session).join(&self.conventions.electrode_folder);
        std::fs::create_dir_all(&dir).expect("create electrode dir");
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write channel");
        path
    }

    /// Populate a full session: a datum plus channels `<session>_electrode_1..=n.mat`.
    pub fn add_full_session(&self, session: &str, channels: usize) {
        self.add_session(session);
        self.add_datum(
            session,
            &format!("{session}_datum_trimmed.txt"),
            format!("datum of {session}").as_bytes(),
        );
        for c in 1..=channels {
            self.add_channel(
                session,
                &channel_name(session, c),
                &channel_bytes(session, c),
            );
        }
    }

    /// Builder configuration with default policy.
    pub fn config(&self) -> DatasetConfig {
        self.config_with(BuildPolicy::default())
    }

    /// Builder configuration with an explicit policy.
    pub fn config_with(&self, policy: BuildPolicy) -> DatasetConfig {
        DatasetConfig {
            project: self.project.clone(),
            subject: self.subject.clone(),
            data_dir: self.data_dir().to_path_buf(),
            conventions: self.conventions.clone(),
            policy,
        }
    }

    /// Scratch location for manifest files, inside the temp dir.
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Channel file name used by [`DatasetFixture::add_full_session`].
pub fn channel_name(session: &str, index: usize) -> String {
    format!("{session}_electrode_{index}.mat")
}

/// Deterministic channel contents, distinct per session and channel.
pub fn channel_bytes(session: &str, index: usize) -> Vec<u8> {
    let mut data = format!("{session}:{index}:").into_bytes();
    data.extend(test_data(256 + index));
    data
}

/// Generate deterministic, non-repeating test data.
pub fn test_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// Reference SHA-256, computed independently of the engine.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
