use image::DynamicImage;

use crate::grading::PersistedAttempt;

/// An attempt as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredAttempt {
    pub id: i64,
    pub attempt: PersistedAttempt,
    pub(super) _guard: (),
}

pub trait AttemptRepository {
    /// Persist a submitted attempt and return its id.
    fn save_attempt(&self, attempt: &PersistedAttempt) -> impl Future<Output = anyhow::Result<i64>>;
    fn get_attempt_by_id(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<StoredAttempt>>>;
    fn get_attempts(&self) -> impl Future<Output = anyhow::Result<Vec<StoredAttempt>>>;
    fn get_attempts_for_test(&self, test_id: &str) -> impl Future<Output = anyhow::Result<Vec<StoredAttempt>>>;
    fn load_attempt_image(&self, attempt: &StoredAttempt) -> impl Future<Output = anyhow::Result<DynamicImage>>;
}
