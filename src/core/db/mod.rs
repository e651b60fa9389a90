mod attempt;
mod state;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use image::DynamicImage;
use state::ArchiveState;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::grading::{OfflineProcessing, PersistedAttempt};
use crate::models::StudentInfo;

pub use attempt::{AttemptRepository, StoredAttempt};

/// Attempt store: a SQLite database plus the original scans, packed into a
/// single tar.zst archive.
#[derive(Debug)]
pub struct GradingDb {
    state: Arc<ArchiveState>,
}

impl GradingDb {
    pub async fn new<P: AsRef<Path>>(archive_file: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(ArchiveState::new(archive_file).await?),
        })
    }

    /// Explicitly write the archive to disk.
    /// Required before dropping in an async context (e.g., tests with #[tokio::test]).
    pub async fn save_archive(&self) -> anyhow::Result<()> {
        self.state.save_archive().await
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    test_id: String,
    version_id: String,
    layout_seed: i64,
    student_name: String,
    student_id: String,
    answers: String,
    auto_total: i64,
    max_total: i64,
    final_total: i64,
    submitted_at: String,
    image_fname: Option<String>,
    extracted_answers: String,
    reviewed_answers: String,
}

const SELECT_ATTEMPT: &str = r#"SELECT
    id, test_id, version_id, layout_seed, student_name, student_id, answers,
    auto_total, max_total, final_total, submitted_at, image_fname,
    extracted_answers, reviewed_answers
FROM attempt"#;

impl TryFrom<AttemptRow> for StoredAttempt {
    type Error = anyhow::Error;

    fn try_from(record: AttemptRow) -> Result<Self, Self::Error> {
        let submitted_at = OffsetDateTime::parse(
            &record.submitted_at,
            &time::format_description::well_known::Rfc3339,
        )?;
        Ok(StoredAttempt {
            id: record.id,
            attempt: PersistedAttempt {
                test_id: record.test_id,
                version_id: record.version_id,
                layout_seed: record.layout_seed,
                candidate: StudentInfo::new(record.student_name, record.student_id),
                answers: serde_json::from_str(&record.answers)
                    .with_context(|| format!("Corrupt answers for attempt {}", record.id))?,
                auto_total: record.auto_total.try_into()?,
                max_total: record.max_total.try_into()?,
                final_total: record.final_total.try_into()?,
                submitted_at,
                offline_processing: OfflineProcessing {
                    original_image: record.image_fname,
                    extracted_answers: serde_json::from_str(&record.extracted_answers)
                        .with_context(|| format!("Corrupt extracted answers for attempt {}", record.id))?,
                    reviewed_answers: serde_json::from_str(&record.reviewed_answers)
                        .with_context(|| format!("Corrupt reviewed answers for attempt {}", record.id))?,
                },
            },
            _guard: (),
        })
    }
}

impl AttemptRepository for GradingDb {
    async fn save_attempt(&self, attempt: &PersistedAttempt) -> anyhow::Result<i64> {
        // Scans that exist on disk are copied in; other references are kept verbatim.
        let (image_fname, copied) = match &attempt.offline_processing.original_image {
            Some(reference) if Path::new(reference).is_file() => {
                (Some(self.state.store_scan_image(reference).await?), true)
            }
            other => (other.clone(), false),
        };

        let answers = serde_json::to_string(&attempt.answers)?;
        let extracted = serde_json::to_string(&attempt.offline_processing.extracted_answers)?;
        let reviewed = serde_json::to_string(&attempt.offline_processing.reviewed_answers)?;
        let submitted_at = attempt
            .submitted_at
            .format(&time::format_description::well_known::Rfc3339)?;

        let inserted = {
            let mut conn = self.state.conn().await?;
            sqlx::query_scalar::<_, i64>(
                r#"INSERT INTO attempt (
                    test_id, version_id, layout_seed, student_name, student_id, answers,
                    auto_total, max_total, final_total, submitted_at, image_fname,
                    extracted_answers, reviewed_answers
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id"#,
            )
            .bind(&attempt.test_id)
            .bind(&attempt.version_id)
            .bind(attempt.layout_seed)
            .bind(&attempt.candidate.name)
            .bind(&attempt.candidate.student_id)
            .bind(answers)
            .bind(i64::from(attempt.auto_total))
            .bind(i64::from(attempt.max_total))
            .bind(i64::from(attempt.final_total))
            .bind(submitted_at)
            .bind(&image_fname)
            .bind(extracted)
            .bind(reviewed)
            .fetch_one(&mut **conn)
            .await
        };

        match inserted {
            Ok(id) => {
                info!(attempt_id = id, test_id = %attempt.test_id, "attempt saved");
                Ok(id)
            }
            Err(e) => {
                // do not leave an orphaned copy behind
                if let (true, Some(fname)) = (copied, &image_fname) {
                    if let Err(cleanup) = self.state.delete_scan_image(fname).await {
                        warn!(scan = %fname, "failed to remove scan after rejected insert: {:#}", cleanup);
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn get_attempt_by_id(&self, id: i64) -> anyhow::Result<Option<StoredAttempt>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, AttemptRow>(&format!("{SELECT_ATTEMPT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?
            .map(StoredAttempt::try_from)
            .transpose()
    }

    async fn get_attempts(&self) -> anyhow::Result<Vec<StoredAttempt>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, AttemptRow>(&format!("{SELECT_ATTEMPT} ORDER BY id ASC"))
            .fetch_all(&mut **conn)
            .await?
            .into_iter()
            .map(StoredAttempt::try_from)
            .collect()
    }

    async fn get_attempts_for_test(&self, test_id: &str) -> anyhow::Result<Vec<StoredAttempt>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, AttemptRow>(&format!("{SELECT_ATTEMPT} WHERE test_id = $1 ORDER BY id ASC"))
            .bind(test_id)
            .fetch_all(&mut **conn)
            .await?
            .into_iter()
            .map(StoredAttempt::try_from)
            .collect()
    }

    async fn load_attempt_image(&self, attempt: &StoredAttempt) -> anyhow::Result<DynamicImage> {
        let fname = attempt
            .attempt
            .offline_processing
            .original_image
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Attempt {} has no stored scan", attempt.id))?;
        self.state.load_scan_image(fname).await
    }
}
