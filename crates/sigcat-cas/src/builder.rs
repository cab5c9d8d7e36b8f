//! Manifest building: walk a subject's sessions, checksum what was selected,
//! and assemble the keyed manifest.
//!
//! The build runs in two phases. Planning lists and selects every path
//! up front (cheap, sequential) and fixes the manifest's key order. Hashing
//! then runs on a bounded pool of blocking tasks; each digest lands in the
//! slot reserved for it during planning, so completion order never leaks
//! into the output.

use std::path::PathBuf;
use std::sync::Arc;

use sigcat_store::DatasetSource;
use sigcat_types::{
    CollectionName, DatasetConfig, Manifest, NamedCollection, Record, SchemaKind, Section,
    SelectionRecord,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::checksum::ChecksumEngine;
use crate::error::CasError;
use crate::selector::{EntryFilter, PathSelector, Selected, SelectionPolicy, SortKey};

/// Inner key under which a session's name is stored (flat schema).
pub const NAME_KEY: &str = "name";
/// Inner key under which a session's channel count is stored (flat schema).
pub const COUNT_KEY: &str = "count";
/// Middle keys of a nested session record.
pub const DATUM_SECTION: &str = "datum";
/// See [`DATUM_SECTION`].
pub const ELECTRODES_SECTION: &str = "electrodes";
/// See [`DATUM_SECTION`].
pub const COUNTS_SECTION: &str = "counts";

/// Everything decided about one session before any file is hashed.
#[derive(Debug)]
struct SessionPlan {
    key: String,
    name: String,
    datum: Option<Selected>,
    channels: Vec<Selected>,
    channel_count: usize,
}

/// Builds a [`Manifest`] for one subject from a [`DatasetSource`].
pub struct ManifestBuilder {
    source: Arc<dyn DatasetSource>,
    config: DatasetConfig,
    engine: ChecksumEngine,
}

impl ManifestBuilder {
    /// Create a builder, validating the policy's numeric parameters.
    pub fn new(source: Arc<dyn DatasetSource>, config: DatasetConfig) -> Result<Self, CasError> {
        if config.policy.workers == 0 {
            return Err(CasError::Configuration(
                "checksum workers must be at least 1".to_string(),
            ));
        }
        let engine = ChecksumEngine::new(config.policy.algorithm, config.policy.chunk_size)?;
        Ok(Self {
            source,
            config,
            engine,
        })
    }

    /// The configuration this builder runs with.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Run the build.
    ///
    /// A missing subject root is a configuration error. A missing or
    /// ambiguous datum file only leaves that session's datum out. Any
    /// unreadable channel file fails the whole build.
    #[tracing::instrument(skip(self), fields(project = %self.config.project, subject = %self.config.subject))]
    pub async fn build(&self) -> Result<Manifest, CasError> {
        let plans = self.plan()?;

        let jobs: Vec<PathBuf> = plans
            .iter()
            .flat_map(|plan| plan.datum.iter().chain(plan.channels.iter()))
            .map(|selected| selected.path.clone())
            .collect();

        info!(
            sessions = plans.len(),
            files = jobs.len(),
            workers = self.config.policy.workers,
            algorithm = %self.engine.algorithm(),
            "checksumming selected files"
        );

        let digests = checksum_all(
            Arc::clone(&self.source),
            self.engine,
            jobs,
            self.config.policy.workers,
        )
        .await?;

        let manifest = self.assemble(plans, digests)?;
        info!(collections = manifest.collections.len(), "manifest built");
        Ok(manifest)
    }

    fn plan(&self) -> Result<Vec<SessionPlan>, CasError> {
        let policy = &self.config.policy;
        let root = self.config.subject_root();
        if !self.source.is_dir(&root) {
            return Err(CasError::Configuration(format!(
                "data directory not found: {}",
                root.display()
            )));
        }

        let selector = PathSelector::new(self.source.as_ref());
        let sessions = selector.select(
            &root,
            &SelectionPolicy::new("*")
                .filter(EntryFilter::Dirs)
                .cap(policy.max_sessions),
        )?;
        debug!(
            matched = sessions.matched,
            retained = sessions.len(),
            "enumerated sessions"
        );

        let mut plans = Vec::with_capacity(sessions.len());
        for (index, session) in sessions.selected.into_iter().enumerate() {
            let datum = self.find_datum(&selector, &session)?;

            let electrode_dir = session.path.join(&self.config.conventions.electrode_folder);
            let channels = selector.select(
                &electrode_dir,
                &SelectionPolicy::new(policy.channel_pattern.clone())
                    .filter(EntryFilter::Files)
                    .sort(SortKey::IntegerSuffix)
                    .cap(policy.max_channels),
            )?;

            plans.push(SessionPlan {
                key: policy.key_scheme.outer_key(index, &session.name),
                name: session.name,
                datum,
                channel_count: channels.matched,
                channels: channels.selected,
            });
        }

        Ok(plans)
    }

    /// Locate the session's datum file; `None` unless exactly one matches.
    fn find_datum(
        &self,
        selector: &PathSelector<'_>,
        session: &Selected,
    ) -> Result<Option<Selected>, CasError> {
        let datum_dir = session.path.join(&self.config.policy.datum_folder);
        if !self.source.is_dir(&datum_dir) {
            debug!(session = %session.name, "no datum folder, skipping datum");
            return Ok(None);
        }

        let mut found = selector.select(
            &datum_dir,
            &SelectionPolicy::new(self.config.conventions.datum_pattern.clone())
                .filter(EntryFilter::Files),
        )?;

        if found.len() == 1 {
            Ok(found.selected.pop())
        } else {
            warn!(
                session = %session.name,
                pattern = %self.config.conventions.datum_pattern,
                matches = found.len(),
                "datum file missing or ambiguous, leaving it out"
            );
            Ok(None)
        }
    }

    fn assemble(&self, plans: Vec<SessionPlan>, digests: Vec<String>) -> Result<Manifest, CasError> {
        let schema = self.config.policy.schema;
        let mut manifest = Manifest::new(
            self.config.project.clone(),
            self.config.subject.clone(),
            schema,
            self.engine.algorithm(),
        );
        manifest.selection = SelectionRecord::from_policy(&self.config.policy);
        let mut digests = digests.into_iter();
        let mut next_digest = || {
            digests
                .next()
                .ok_or_else(|| CasError::Worker("fewer digests than selected files".to_string()))
        };

        match schema {
            SchemaKind::Flat => {
                let mut conversations = NamedCollection::new(CollectionName::Conversations.as_str());
                let mut datums = NamedCollection::new(CollectionName::DatumChecksums.as_str());
                let mut counts = NamedCollection::new(CollectionName::ElectrodeCounts.as_str());
                let mut checksums =
                    NamedCollection::new(CollectionName::ElectrodeChecksums.as_str());

                for plan in plans {
                    let mut name = Record::flat();
                    name.insert(NAME_KEY, plan.name.as_str())?;
                    conversations.insert(plan.key.clone(), name)?;

                    if let Some(datum) = &plan.datum {
                        let mut record = Record::flat();
                        record.insert(datum.name.clone(), next_digest()?)?;
                        datums.insert(plan.key.clone(), record)?;
                    }

                    let mut count = Record::flat();
                    count.insert(COUNT_KEY, plan.channel_count as i64)?;
                    counts.insert(plan.key.clone(), count)?;

                    let mut channels = Record::flat();
                    for channel in &plan.channels {
                        channels.insert(channel.name.clone(), next_digest()?)?;
                    }
                    checksums.insert(plan.key, channels)?;
                }

                for collection in [conversations, datums, counts, checksums] {
                    manifest.push_collection(collection)?;
                }
            }
            SchemaKind::Nested => {
                let mut sessions = NamedCollection::new(CollectionName::Sessions.as_str());

                for plan in plans {
                    let mut record = Record::nested();

                    if let Some(datum) = &plan.datum {
                        let mut section = Section::new(DATUM_SECTION);
                        section.insert("name", datum.name.as_str())?;
                        section.insert("checksum", next_digest()?)?;
                        record.insert_section(section)?;
                    }

                    let mut electrodes = Section::new(ELECTRODES_SECTION);
                    for channel in &plan.channels {
                        electrodes.insert(channel.name.clone(), next_digest()?)?;
                    }
                    record.insert_section(electrodes)?;

                    let mut counts = Section::new(COUNTS_SECTION);
                    counts.insert("electrodes", plan.channel_count as i64)?;
                    record.insert_section(counts)?;

                    sessions.insert(plan.key, record)?;
                }

                manifest.push_collection(sessions)?;
            }
        }

        Ok(manifest)
    }
}

/// Checksum `paths` on at most `workers` blocking tasks.
///
/// The returned digests are in the same order as `paths`. The first failure
/// aborts every task that has not finished and is returned as-is.
pub async fn checksum_all(
    source: Arc<dyn DatasetSource>,
    engine: ChecksumEngine,
    paths: Vec<PathBuf>,
    workers: usize,
) -> Result<Vec<String>, CasError> {
    let workers = workers.max(1);
    let mut slots: Vec<Option<String>> = vec![None; paths.len()];
    let mut pending = paths.into_iter().enumerate();
    let mut tasks = JoinSet::new();

    loop {
        while tasks.len() < workers {
            let Some((index, path)) = pending.next() else {
                break;
            };
            let source = Arc::clone(&source);
            tasks.spawn_blocking(move || {
                let result = engine.checksum(source.as_ref(), &path);
                if result.is_ok() {
                    debug!(path = %path.display(), "checksummed file");
                }
                (index, result)
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };

        let (index, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                tasks.abort_all();
                return Err(CasError::Worker(e.to_string()));
            }
        };

        match result {
            Ok(digest) => slots[index] = Some(digest),
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| CasError::Worker("checksum slot left empty".to_string())))
        .collect()
}
