use futures::TryStreamExt;
use log::{debug, error, info, warn};

use super::{FacadeError, FacadeRecords};
use crate::{
    params,
    repo::{self, Backend},
    types::{BackendKind, MigrationReport, Record},
};

/// Tuning of the record migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Records sent with each bulk insert
    pub batch_size: usize,
    /// When a bulk insert fails, retry its records one by one instead of
    /// reporting the whole batch as failed
    pub record_fallback: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: params::MIGRATION_BATCH_SIZE,
            record_fallback: false,
        }
    }
}

impl From<&params::Settings> for MigrationOptions {
    fn from(settings: &params::Settings) -> Self {
        Self {
            record_fallback: settings.record_fallback,
            ..Self::default()
        }
    }
}

impl FacadeRecords {
    /// Copies every record of `source` into `destination`.
    ///
    /// The facade must be bound to `source`, otherwise nothing is read or
    /// written. Records are sent in batches, a rejected batch is reported
    /// record by record and the migration moves on. Batches written before a
    /// failure stay on the destination.
    ///
    /// This never fails: errors are described by the returned report.
    pub async fn migrate(&self, source: BackendKind, destination: BackendKind) -> MigrationReport {
        if self.kind() != source {
            warn!(
                "migration from `{}` requested on a `{}` store, skipping",
                source,
                self.kind()
            );
            return MigrationReport::failed(
                format!(
                    "migration only available from `{}`, store is bound to `{}`",
                    source,
                    self.kind()
                ),
                0,
            );
        }

        info!("migrating records from `{}` to `{}`", source, destination);

        let mut progress = MigrationProgress::new(self.options);
        match self.copy_records(destination, &mut progress).await {
            Ok(()) => {
                let report = progress.into_report(source, destination);
                info!("{}", report.message);
                report
            }
            Err(e) => {
                error!("migration to `{}` aborted: {}", destination, e);
                MigrationReport::failed(format!("migration failed: {e}"), progress.synced)
            }
        }
    }

    async fn copy_records(
        &self,
        destination: BackendKind,
        progress: &mut MigrationProgress,
    ) -> Result<(), FacadeError> {
        // Dedicated connection, dropped once the migration ends
        let target = FacadeRecords::connect(destination, self.connector.clone()).await?;

        let batch_size = self.options.batch_size.max(1);
        let mut cursor = self.backend.find_all().await?;
        let mut batch: Vec<Record> = Vec::with_capacity(batch_size);

        while let Some(record) = cursor.try_next().await? {
            batch.push(record);
            if batch.len() == batch_size {
                progress.flush(target.backend.as_ref(), &batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            progress.flush(target.backend.as_ref(), &batch).await;
        }

        Ok(())
    }
}

struct MigrationProgress {
    options: MigrationOptions,
    synced: usize,
    batches: usize,
    failed: usize,
    /// Leading error entries, later ones are only counted
    errors: Vec<String>,
}

impl MigrationProgress {
    fn new(options: MigrationOptions) -> Self {
        Self {
            options,
            synced: 0,
            batches: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    async fn flush(&mut self, target: &dyn Backend, batch: &[Record]) {
        self.batches += 1;

        match target.insert_many(batch).await {
            Ok(()) => {
                self.synced += batch.len();
                debug!(
                    "batch #{} stored ({} records, {} total)",
                    self.batches,
                    batch.len(),
                    self.synced
                );
            }
            Err(e) if self.options.record_fallback => {
                warn!(
                    "batch #{} rejected ({}), retrying {} records one by one",
                    self.batches,
                    e,
                    batch.len()
                );
                for record in batch {
                    match target.insert_one(record).await {
                        Ok(()) => self.synced += 1,
                        Err(e) => self.skip(record, &e),
                    }
                }
            }
            Err(e) => {
                warn!(
                    "batch #{} rejected ({}), skipping {} records",
                    self.batches,
                    e,
                    batch.len()
                );
                for record in batch {
                    self.skip(record, &e);
                }
            }
        }
    }

    fn skip(&mut self, record: &Record, e: &repo::Error) {
        self.failed += 1;
        if self.errors.len() < params::MIGRATION_REPORTED_ERRORS {
            self.errors.push(format!("record {}: {}", record.key_label(), e));
        }
    }

    fn into_report(self, source: BackendKind, destination: BackendKind) -> MigrationReport {
        let mut message = format!(
            "synced {} records from {} to {}",
            self.synced, source, destination
        );
        if self.failed > 0 {
            message.push_str(&format!(
                ". {} records skipped (likely duplicates)",
                self.failed
            ));
        }

        MigrationReport {
            success: true,
            message,
            synced_count: self.synced,
            errors: self.errors,
        }
    }
}
