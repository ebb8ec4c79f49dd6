use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{Direction, MigrationContext, MigrationRecord, MigrationRegistry, MigrationVersion};
use crate::error::{Error, Result};
use crate::metrics;
use crate::search::SearchIndex;
use crate::store::SqliteSchemaStore;

/// How far an apply run should go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Latest,
    Version(MigrationVersion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerState {
    Idle,
    Applying,
    Applied,
    Reverting,
    Reverted,
    Failed,
}

/// Outcome of a successful apply or revert run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    /// Versions applied (ascending) or reverted (descending), in run order
    pub completed: Vec<MigrationVersion>,
    /// Index updates issued during the run, including leftovers from earlier runs
    pub index_updates: usize,
}

impl RunReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            completed: Vec::new(),
            index_updates: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: MigrationVersion,
    pub name: String,
    /// False for versions only known from the ledger
    pub registered: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub migrations: Vec<MigrationStatus>,
    pub pending_index_updates: usize,
}

impl StatusReport {
    /// Registered versions not yet applied
    pub fn pending(&self) -> Vec<MigrationVersion> {
        self.migrations
            .iter()
            .filter(|m| m.registered && !m.is_applied())
            .map(|m| m.version)
            .collect()
    }

    /// Highest applied version, `ZERO` if none
    pub fn current(&self) -> MigrationVersion {
        self.migrations
            .iter()
            .filter(|m| m.is_applied())
            .map(|m| m.version)
            .max()
            .unwrap_or(MigrationVersion::ZERO)
    }
}

/// Applies and reverts registered migrations against a schema store.
///
/// Single writer: nothing here guards against a second runner working on
/// the same database.
pub struct MigrationRunner {
    registry: Arc<MigrationRegistry>,
    store: SqliteSchemaStore,
    index: Arc<dyn SearchIndex>,
    state: RunnerState,
}

impl MigrationRunner {
    pub fn new(
        registry: Arc<MigrationRegistry>,
        store: SqliteSchemaStore,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            registry,
            store,
            index,
            state: RunnerState::Idle,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SqliteSchemaStore {
        &self.store
    }

    pub fn into_store(self) -> SqliteSchemaStore {
        self.store
    }

    /// Apply pending migrations up to and including `target`.
    ///
    /// Stops at the first failing step; everything before it stays applied
    /// and a later run resumes from the failed version.
    pub async fn apply(&mut self, target: Target) -> Result<RunReport> {
        self.state = RunnerState::Applying;
        let result = self.run_apply(target).await;
        self.finish(result, RunnerState::Applied)
    }

    /// Revert applied migrations above `target`, newest first
    pub async fn revert(&mut self, target: MigrationVersion) -> Result<RunReport> {
        self.state = RunnerState::Reverting;
        let result = self.run_revert(target).await;
        self.finish(result, RunnerState::Reverted)
    }

    /// Issue index updates left in the outbox by an earlier run
    pub async fn sync_index(&mut self) -> Result<usize> {
        self.flush_index_updates().await
    }

    pub fn status(&self) -> Result<StatusReport> {
        let mut migrations: BTreeMap<MigrationVersion, MigrationStatus> = self
            .registry
            .ordered()
            .map(|record| {
                (
                    record.version,
                    MigrationStatus {
                        version: record.version,
                        name: record.name.clone(),
                        registered: true,
                        applied_at: None,
                    },
                )
            })
            .collect();

        for entry in self.store.ledger()? {
            migrations
                .entry(entry.version)
                .or_insert_with(|| MigrationStatus {
                    version: entry.version,
                    name: entry.name.clone(),
                    registered: false,
                    applied_at: None,
                })
                .applied_at = Some(entry.applied_at);
        }

        Ok(StatusReport {
            migrations: migrations.into_values().collect(),
            pending_index_updates: self.store.pending_index_updates()?.len(),
        })
    }

    fn finish(&mut self, result: Result<RunReport>, success: RunnerState) -> Result<RunReport> {
        match &result {
            Ok(report) => {
                self.state = success;
                info!(
                    direction = %report.direction,
                    completed = report.completed.len(),
                    index_updates = report.index_updates,
                    "Migration run finished"
                );
            }
            Err(e) => {
                self.state = RunnerState::Failed;
                error!(
                    version = ?e.failed_version().map(|v| v.get()),
                    error_type = e.error_type(),
                    "Migration run failed: {}",
                    e
                );
            }
        }
        result
    }

    async fn run_apply(&mut self, target: Target) -> Result<RunReport> {
        let mut report = RunReport::new(Direction::Up);

        let applied: BTreeSet<MigrationVersion> =
            self.store.applied_versions()?.into_iter().collect();
        let max_applied = applied
            .iter()
            .next_back()
            .copied()
            .unwrap_or(MigrationVersion::ZERO);

        let target = match target {
            Target::Latest => self.registry.latest().unwrap_or(MigrationVersion::ZERO),
            Target::Version(v) => {
                if applied.contains(&v) {
                    return Err(Error::AlreadyApplied(v));
                }
                if !self.registry.contains(v) {
                    return Err(Error::NotFound(format!("migration {}", v)));
                }
                v
            }
        };

        if let Some(missing) = self
            .registry
            .ordered()
            .map(|r| r.version)
            .find(|v| *v < max_applied && !applied.contains(v))
        {
            return Err(Error::LedgerGap {
                missing,
                max_applied,
            });
        }

        // rejected runs leave the outbox alone
        report.index_updates += self.flush_index_updates().await?;

        let pending: Vec<MigrationVersion> = self
            .registry
            .ordered()
            .map(|r| r.version)
            .filter(|v| *v > max_applied && *v <= target)
            .collect();

        if pending.is_empty() {
            info!(current = %max_applied, "No pending migrations");
        }
        for version in pending {
            report.index_updates += self.run_step(version, Direction::Up).await?;
            report.completed.push(version);
        }
        Ok(report)
    }

    async fn run_revert(&mut self, target: MigrationVersion) -> Result<RunReport> {
        let mut report = RunReport::new(Direction::Down);
        report.index_updates += self.flush_index_updates().await?;

        let to_revert: Vec<MigrationVersion> = self
            .store
            .applied_versions()?
            .into_iter()
            .rev()
            .filter(|v| *v > target)
            .collect();

        if to_revert.is_empty() {
            info!(target = %target, "Nothing to revert");
        }
        for version in to_revert {
            report.index_updates += self.run_step(version, Direction::Down).await?;
            report.completed.push(version);
        }
        Ok(report)
    }

    /// Run one step to commit, then issue its index updates.
    /// Returns the number of index updates issued.
    async fn run_step(&mut self, version: MigrationVersion, direction: Direction) -> Result<usize> {
        let registry = Arc::clone(&self.registry);
        let record = registry.get(version).ok_or_else(|| Error::Step {
            version,
            direction,
            source: Box::new(Error::NotFound(format!(
                "migration {} is applied but not registered",
                version
            ))),
        })?;

        info!(version = %version, name = %record.name, direction = %direction, "Running migration");
        let started = Instant::now();

        if let Err(e) = self.commit_step(record, direction) {
            metrics::record_step_error(version, direction, e.error_type());
            return Err(Error::Step {
                version,
                direction,
                source: Box::new(e),
            });
        }
        metrics::record_step_success(direction, started.elapsed());

        self.flush_index_updates().await
    }

    /// Run the step body inside a transaction and commit it together with
    /// the ledger change and the queued index updates.
    fn commit_step(&mut self, record: &MigrationRecord, direction: Direction) -> Result<()> {
        let tx = self.store.transaction()?;
        let mut ctx = MigrationContext::new(tx, record.version, direction);
        let step = record.step(direction);

        // ctx (and the transaction in it) is dropped on every early return,
        // which rolls back whatever the step wrote
        match panic::catch_unwind(AssertUnwindSafe(|| step(&mut ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(payload) => return Err(Error::StepPanicked(panic_message(payload.as_ref()))),
        }

        let (tx, updates) = ctx.into_parts();
        match direction {
            Direction::Up => tx.record_applied(record.version, &record.name)?,
            Direction::Down => tx.remove_applied(record.version)?,
        }
        for update in &updates {
            tx.enqueue_index_update(record.version, direction, update)?;
        }
        tx.commit()
    }

    /// Issue outbox entries in order, deleting each once it succeeded.
    /// The first failure stops the flush and leaves it and later entries queued.
    async fn flush_index_updates(&mut self) -> Result<usize> {
        let pending = self.store.pending_index_updates()?;
        metrics::record_pending_index_updates(pending.len());

        let mut issued = 0;
        for entry in pending {
            let update = &entry.update;
            let result = self.index.apply(update).await;
            metrics::record_index_sync(self.index.name(), update.kind.as_str(), result.is_ok());

            if let Err(e) = result {
                warn!(
                    version = %entry.version,
                    index = %update.index,
                    kind = %update.kind,
                    "Index update failed; it stays queued until the next run"
                );
                return Err(Error::Step {
                    version: entry.version,
                    direction: entry.direction,
                    source: Box::new(e),
                });
            }

            self.store.complete_index_update(entry.id)?;
            issued += 1;
            info!(
                version = %entry.version,
                index = %update.index,
                kind = %update.kind,
                attributes = ?update.attributes,
                "Updated index attributes"
            );
        }
        Ok(issued)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
