//! TOML configuration for the `sigcat` CLI.
//!
//! Every section is optional. Without a config file the built-in convention
//! table and [`BuildPolicy::default`] apply.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sigcat_cas::CasError;
use sigcat_types::{BuildPolicy, DatasetConfig, SubjectConventions};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Build policy overrides.
    pub build: BuildSection,
    /// Extra or overriding conventions, keyed by project then subject.
    pub projects: BTreeMap<String, BTreeMap<String, SubjectConventions>>,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[build]` section.
///
/// Unset fields fall back to [`BuildPolicy::default`]. A cap of `0` lifts
/// the cap entirely.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// `"flat"` or `"nested"`.
    pub schema: Option<String>,
    /// `"index"` or `"basename"`.
    pub key_scheme: Option<String>,
    /// Maximum sessions per subject.
    pub max_sessions: Option<usize>,
    /// Maximum channel files per session.
    pub max_channels: Option<usize>,
    /// Glob for channel files.
    pub channel_pattern: Option<String>,
    /// Per-session folder holding the datum file.
    pub datum_folder: Option<String>,
    /// `"sha256"`, `"sha512"` or `"blake3"`.
    pub algorithm: Option<String>,
    /// Read size in bytes while checksumming.
    pub chunk_size: Option<usize>,
    /// Concurrent checksum workers.
    pub workers: Option<usize>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective build policy: `[build]` values over the defaults.
    pub fn policy(&self) -> Result<BuildPolicy, CasError> {
        let mut policy = BuildPolicy::default();
        let build = &self.build;

        if let Some(schema) = &build.schema {
            policy.schema = schema.parse()?;
        }
        if let Some(scheme) = &build.key_scheme {
            policy.key_scheme = scheme.parse()?;
        }
        if let Some(algorithm) = &build.algorithm {
            policy.algorithm = algorithm.parse()?;
        }
        if let Some(cap) = build.max_sessions {
            policy.max_sessions = cap_from(cap);
        }
        if let Some(cap) = build.max_channels {
            policy.max_channels = cap_from(cap);
        }
        if let Some(pattern) = &build.channel_pattern {
            policy.channel_pattern = pattern.clone();
        }
        if let Some(folder) = &build.datum_folder {
            policy.datum_folder = folder.clone();
        }
        if let Some(chunk_size) = build.chunk_size {
            policy.chunk_size = chunk_size;
        }
        if let Some(workers) = build.workers {
            policy.workers = workers;
        }

        Ok(policy)
    }

    /// Folder conventions for a subject. Config entries win over built-ins.
    pub fn conventions(&self, project: &str, subject: &str) -> Result<SubjectConventions, CasError> {
        self.projects
            .get(project)
            .and_then(|subjects| subjects.get(subject))
            .cloned()
            .or_else(|| builtin_conventions(project, subject))
            .ok_or_else(|| {
                CasError::Configuration(format!(
                    "no folder conventions for project {project:?}, subject {subject:?}"
                ))
            })
    }

    /// Everything the builder needs for one subject.
    pub fn resolve(
        &self,
        project: &str,
        subject: &str,
        data_dir: PathBuf,
    ) -> Result<DatasetConfig, CasError> {
        Ok(DatasetConfig {
            project: project.to_string(),
            subject: subject.to_string(),
            data_dir,
            conventions: self.conventions(project, subject)?,
            policy: self.policy()?,
        })
    }
}

fn cap_from(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

const PODCAST_SUBJECTS: &[&str] = &[
    "661", "662", "717", "723", "737", "741", "742", "743", "763", "798",
];

/// Conventions known for the lab's existing datasets.
pub fn builtin_conventions(project: &str, subject: &str) -> Option<SubjectConventions> {
    let (electrode_folder, datum_pattern) = match (project, subject) {
        ("podcast", s) if PODCAST_SUBJECTS.contains(&s) => ("preprocessed_all", "*trimmed.txt"),
        ("tfs", "625" | "676") => ("preprocessed", "*trimmed.txt"),
        ("tfs", "7170") => ("preprocessed_v2", "*_datum_trimmed.txt"),
        ("tfs", "798") => ("preprocessed_allElec", "*_datum_trimmed.txt"),
        _ => return None,
    };
    Some(SubjectConventions {
        electrode_folder: electrode_folder.to_string(),
        datum_pattern: datum_pattern.to_string(),
    })
}
