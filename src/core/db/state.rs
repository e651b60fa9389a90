use image::DynamicImage;
use sqlx::{
    Sqlite, pool::PoolConnection, sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    }
};
use tempdir::TempDir;
use tokio::{
    fs as async_fs,
    sync::{RwLock, RwLockReadGuard},
};

use std::{
    fs::{self, File},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use anyhow::Context;
use tar::{Archive, Builder};
use tracing::{debug, warn};
use uuid::Uuid;
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

const DB_FILE_NAME: &str = "attempts.db";
const IMAGE_DIR_NAME: &str = "scans";

/// Working copy of an attempt archive: `attempts.db` plus `scans/`, unpacked
/// into a temp dir and repacked on [`ArchiveState::save_archive`].
pub(super) struct ArchiveState {
    archive_file: PathBuf,
    working_dir: TempDir,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for ArchiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveState")
            .field("archive_file", &self.archive_file)
            .field("working_dir", &self.working_dir.path())
            .finish()
    }
}

async fn open_pool(db_file: &Path) -> anyhow::Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_opts)
        .await?)
}

/// Write an archive holding nothing, so a fresh store unpacks like an old one.
fn write_empty_archive(archive_file: &Path) -> anyhow::Result<()> {
    let out = File::create(archive_file)
        .with_context(|| format!("Failed to create attempt archive {:?}", archive_file))?;
    let encoder = ZstdEncoder::new(out, 3)?;
    Builder::new(encoder)
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .with_context(|| format!("Failed to write empty attempt archive {:?}", archive_file))?;
    Ok(())
}

/// Unpack the archive into a private temp dir that lives as long as the store.
fn unpack_archive(archive_file: &Path) -> anyhow::Result<TempDir> {
    let working_dir = TempDir::new("omrgrade_attempts")?;
    let f = File::open(archive_file)
        .with_context(|| format!("Failed to open attempt archive {:?}", archive_file))?;
    let decoder = ZstdDecoder::new(f)
        .with_context(|| format!("Invalid zstd stream in {:?}", archive_file))?;
    Archive::new(decoder)
        .unpack(working_dir.path())
        .with_context(|| format!("Failed to unpack attempt archive {:?}", archive_file))?;
    Ok(working_dir)
}

/// A store holds both `attempts.db` and `scans/`, or neither (a new store).
/// Anything in between means attempts and their scans have drifted apart.
fn ensure_store_layout(root: &Path) -> anyhow::Result<()> {
    let db_file = root.join(DB_FILE_NAME);
    let scans_dir = root.join(IMAGE_DIR_NAME);
    match (db_file.is_file(), scans_dir.is_dir()) {
        (true, true) => Ok(()),
        (false, false) => {
            fs::create_dir_all(&scans_dir)?;
            File::create(&db_file)?;
            Ok(())
        }
        (true, false) => anyhow::bail!("Attempt archive has a database but no scans directory"),
        (false, true) => anyhow::bail!("Attempt archive has scans but no attempt database"),
    }
}

impl ArchiveState {
    fn scan_path(&self, image_fname: &str) -> PathBuf {
        self.working_dir.path().join(IMAGE_DIR_NAME).join(image_fname)
    }

    /// A connection that blocks `save_archive` until it is dropped.
    pub(super) async fn conn(&self) -> anyhow::Result<DbConnGuard<'_>> {
        let pool_guard = self.pool.read().await;
        let conn = pool_guard.acquire().await?;

        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    pub(super) async fn load_scan_image(&self, image_fname: &str) -> anyhow::Result<DynamicImage> {
        let img_path = self.scan_path(image_fname);
        let bytes = async_fs::read(&img_path)
            .await
            .with_context(|| format!("Failed to read scan image {:?}", img_path))?;
        let img = image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode scan image {:?}", img_path))?;
        Ok(img)
    }

    /// Copy a graded sheet into `scans/` under a fresh uuid, keeping its
    /// extension so the format can still be guessed on load.
    pub(super) async fn store_scan_image<P: AsRef<Path>>(
        &self,
        img_path: P,
    ) -> anyhow::Result<String> {
        let img_fname = match img_path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let dest_path = self.scan_path(&img_fname);
        async_fs::copy(&img_path, &dest_path)
            .await
            .with_context(|| format!(
                "Failed to copy scan image from {:?} to {:?}",
                img_path.as_ref(),
                dest_path
            ))?;
        Ok(img_fname)
    }

    pub(super) async fn delete_scan_image(&self, image_fname: &str) -> anyhow::Result<()> {
        let img_path = self.scan_path(image_fname);
        async_fs::remove_file(&img_path)
            .await
            .with_context(|| format!("Failed to delete scan image {:?}", img_path))?;
        Ok(())
    }

    /// Pack `attempts.db` and `scans/` into the archive file, replacing it.
    fn save_tar_zstd(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.archive_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let out = File::create(&self.archive_file)
            .with_context(|| format!("Failed to create attempt archive {:?}", self.archive_file))?;

        let encoder = ZstdEncoder::new(out, 3)
            .with_context(|| format!("Failed to create zstd encoder for {:?}", self.archive_file))?;

        let mut tar = Builder::new(encoder);

        tar.append_dir_all(".", self.working_dir.path())
            .with_context(|| format!("Failed to add {:?} to tar", self.working_dir.path()))?;

        let encoder = tar.into_inner()
            .with_context(|| format!("Failed to finalize tar for {:?}", self.archive_file))?;

        encoder.finish()
            .with_context(|| format!("Failed to finalize zstd stream for {:?}", self.archive_file))?;

        Ok(())
    }

    pub(super) async fn save_archive(&self) -> anyhow::Result<()> {
        self.internal_close_and_pack(true).await
    }

    /// Flush every saved attempt into the archive file.
    ///
    /// Holds the pool write lock throughout, so no attempt insert can land
    /// between the WAL checkpoint and the tar snapshot. With `reopen` the
    /// store keeps accepting attempts afterwards.
    async fn internal_close_and_pack(&self, reopen: bool) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.write().await;

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;

        pool_guard.close().await;

        self.save_tar_zstd()?;
        debug!(archive = ?self.archive_file, "attempt archive written");

        if reopen {
            let db_file = self.working_dir.path().join(DB_FILE_NAME);
            *pool_guard = open_pool(&db_file).await?;
        }
        Ok(())
    }

    pub(super) async fn new<P: AsRef<Path>>(archive_file: P) -> anyhow::Result<Self> {
        let archive_file = archive_file.as_ref().to_path_buf();

        if !archive_file.is_file() {
            match archive_file.parent() {
                Some(parent) if parent.is_dir() => write_empty_archive(&archive_file)?,
                _ => anyhow::bail!("Attempt archive parent does not exist: {:?}", archive_file),
            }
        }

        let working_dir = unpack_archive(&archive_file)?;
        let db_file = working_dir.path().join(DB_FILE_NAME);
        ensure_store_layout(working_dir.path())?;

        let pool = open_pool(&db_file).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            archive_file,
            working_dir,
            pool: RwLock::new(pool),
        })
    }
}

/// Pooled connection that keeps the pool read lock held.
pub struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for ArchiveState {
    fn drop(&mut self) {
        // inside a runtime there is no way to block; save_archive() is the caller's job there
        if tokio::runtime::Handle::try_current().is_ok() {
            return;
        }

        let result = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(async { self.internal_close_and_pack(false).await }),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!("Failed to save attempt archive on drop: {}", e);
        }
    }
}
