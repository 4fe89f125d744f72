//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{JobStatus, QueueStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    AssetMetadata, ImageRecord, JobCounts, JobRecord, LinkRecord, NewImage, NewLink, NewScript,
    PageFields, PageRecord, QueueItem, QueueStats, ScriptRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "id, domain, status, total_pages, total_links, total_images, \
     total_scripts, created_at, started_at, completed_at";

const QUEUE_COLUMNS: &str = "id, crawl_job_id, url, depth, status, retry_count";

const PAGE_COLUMNS: &str = "id, crawl_job_id, url, title, meta_description, status_code, \
     content_type, redirect_url, redirect_count, favicon_url, crawled_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a database file and initializes its schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn delete_crawled_rows(tx: &rusqlite::Transaction<'_>, job_id: i64) -> StorageResult<()> {
        // Children of pages go first so foreign keys hold throughout.
        for table in ["links", "images", "scripts", "pages", "crawl_queue"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE crawl_job_id = ?1", table),
                params![job_id],
            )?;
        }
        Ok(())
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        domain: row.get(1)?,
        status: JobStatus::from_db_string(&row.get::<_, String>(2)?).unwrap_or(JobStatus::Failed),
        totals: JobCounts {
            pages: row.get::<_, i64>(3)? as u64,
            links: row.get::<_, i64>(4)? as u64,
            images: row.get::<_, i64>(5)? as u64,
            scripts: row.get::<_, i64>(6)? as u64,
        },
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}

fn queue_item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        job_id: row.get(1)?,
        url: row.get(2)?,
        depth: row.get(3)?,
        status: QueueStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(QueueStatus::Pending),
        retry_count: row.get(5)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        meta_description: row.get(4)?,
        status_code: row.get(5)?,
        content_type: row.get(6)?,
        redirect_url: row.get(7)?,
        redirect_count: row.get(8)?,
        favicon_url: row.get(9)?,
        crawled_at: row.get(10)?,
    })
}

/// Reads the shared asset metadata columns starting at `offset`
fn metadata_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<AssetMetadata> {
    Ok(AssetMetadata {
        status_code: row.get(offset)?,
        content_type: row.get(offset + 1)?,
        file_size: row.get::<_, Option<i64>>(offset + 2)?.map(|size| size as u64),
        redirect_count: row.get(offset + 3)?,
        width: row.get(offset + 4)?,
        height: row.get(offset + 5)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Job Management =====

    fn create_job(&mut self, domain: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_jobs (domain, status, created_at) VALUES (?1, ?2, ?3)",
            params![domain, JobStatus::Pending.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Option<JobRecord>> {
        let job = self
            .conn
            .query_row(
                &format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    fn set_job_status(&mut self, job_id: i64, status: JobStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = match status {
            JobStatus::Running => self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1, started_at = ?2, completed_at = NULL WHERE id = ?3",
                params![status.to_db_string(), now, job_id],
            )?,
            JobStatus::Completed | JobStatus::Failed => self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1, completed_at = ?2 WHERE id = ?3",
                params![status.to_db_string(), now, job_id],
            )?,
            JobStatus::Pending => self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1 WHERE id = ?2",
                params![status.to_db_string(), job_id],
            )?,
        };

        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn recompute_job_stats(&mut self, job_id: i64) -> StorageResult<JobCounts> {
        let counts = self.count_entities(job_id)?;
        let changed = self.conn.execute(
            "UPDATE crawl_jobs
             SET total_pages = ?1, total_links = ?2, total_images = ?3, total_scripts = ?4
             WHERE id = ?5",
            params![
                counts.pages as i64,
                counts.links as i64,
                counts.images as i64,
                counts.scripts as i64,
                job_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(counts)
    }

    fn reset_job(&mut self, job_id: i64) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        Self::delete_crawled_rows(&tx, job_id)?;
        let changed = tx.execute(
            "UPDATE crawl_jobs
             SET status = ?1, total_pages = 0, total_links = 0, total_images = 0,
                 total_scripts = 0, started_at = NULL, completed_at = NULL
             WHERE id = ?2",
            params![JobStatus::Pending.to_db_string(), job_id],
        )?;

        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_job(&mut self, job_id: i64) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        Self::delete_crawled_rows(&tx, job_id)?;
        let changed = tx.execute("DELETE FROM crawl_jobs WHERE id = ?1", params![job_id])?;

        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Frontier Management =====

    fn enqueue_if_absent(&mut self, job_id: i64, url: &str, depth: u32) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO crawl_queue (crawl_job_id, url, depth, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(crawl_job_id, url) DO NOTHING",
            params![job_id, url, depth, QueueStatus::Pending.to_db_string(), now],
        )?;
        Ok(inserted > 0)
    }

    fn claim_pending(&mut self, job_id: i64, limit: usize) -> StorageResult<Vec<QueueItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // A single statement, so no other claimer can observe the same rows as pending.
        let mut stmt = self.conn.prepare(&format!(
            "UPDATE crawl_queue SET status = ?1
             WHERE id IN (
                 SELECT id FROM crawl_queue
                 WHERE crawl_job_id = ?2 AND status = ?3
                 ORDER BY id
                 LIMIT ?4
             )
             RETURNING {}",
            QUEUE_COLUMNS
        ))?;

        let mut items = stmt
            .query_map(
                params![
                    QueueStatus::Processing.to_db_string(),
                    job_id,
                    QueueStatus::Pending.to_db_string(),
                    limit as i64
                ],
                queue_item_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    fn set_queue_item_status(&mut self, item_id: i64, status: QueueStatus) -> StorageResult<()> {
        let processed_at = status.is_terminal().then(|| Utc::now().to_rfc3339());
        let changed = self.conn.execute(
            "UPDATE crawl_queue SET status = ?1, processed_at = COALESCE(?2, processed_at) WHERE id = ?3",
            params![status.to_db_string(), processed_at, item_id],
        )?;

        if changed == 0 {
            return Err(StorageError::QueueItemNotFound(item_id));
        }
        Ok(())
    }

    fn increment_retry(&mut self, item_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE crawl_queue SET retry_count = retry_count + 1 WHERE id = ?1",
            params![item_id],
        )?;

        if changed == 0 {
            return Err(StorageError::QueueItemNotFound(item_id));
        }
        Ok(())
    }

    fn queue_stats(&self, job_id: i64) -> StorageResult<QueueStats> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM crawl_queue WHERE crawl_job_id = ?1 GROUP BY status",
        )?;

        let mut stats = QueueStats::default();
        let rows = stmt.query_map(params![job_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            let count = count as u64;
            stats.total += count;
            match QueueStatus::from_db_string(&status) {
                Some(QueueStatus::Pending) => stats.pending += count,
                Some(QueueStatus::Processing) => stats.processing += count,
                Some(QueueStatus::Completed) => stats.completed += count,
                Some(QueueStatus::Failed) => stats.failed += count,
                None => {}
            }
        }

        Ok(stats)
    }

    fn list_queue(&self, job_id: i64) -> StorageResult<Vec<QueueItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_queue WHERE crawl_job_id = ?1 ORDER BY id",
            QUEUE_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![job_id], queue_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ===== Page Management =====

    fn upsert_page(&mut self, job_id: i64, page: &PageFields) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO pages (crawl_job_id, url, title, meta_description, status_code,
                                content_type, redirect_url, redirect_count, favicon_url, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(crawl_job_id, url) DO UPDATE SET
                 title = excluded.title,
                 meta_description = excluded.meta_description,
                 status_code = excluded.status_code,
                 content_type = excluded.content_type,
                 redirect_url = excluded.redirect_url,
                 redirect_count = excluded.redirect_count,
                 favicon_url = excluded.favicon_url,
                 crawled_at = excluded.crawled_at
             RETURNING id",
            params![
                job_id,
                page.url,
                page.title,
                page.meta_description,
                page.status_code,
                page.content_type,
                page.redirect_url,
                page.redirect_count,
                page.favicon_url,
                now
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_page_by_url(&self, job_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE crawl_job_id = ?1 AND url = ?2",
                    PAGE_COLUMNS
                ),
                params![job_id, url],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn list_pages(&self, job_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE crawl_job_id = ?1 ORDER BY id",
            PAGE_COLUMNS
        ))?;
        let pages = stmt
            .query_map(params![job_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn list_redirects(&self, job_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages
             WHERE crawl_job_id = ?1 AND redirect_count > 0
             ORDER BY redirect_count DESC, id",
            PAGE_COLUMNS
        ))?;
        let pages = stmt
            .query_map(params![job_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    // ===== Link Management =====

    fn insert_link(&mut self, link: &NewLink) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO links (page_id, crawl_job_id, source_url, target_url, link_text,
                                is_nofollow, is_internal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                link.page_id,
                link.job_id,
                link.source_url,
                link.target_url,
                link.link_text,
                link.is_nofollow,
                link.is_internal
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_links(&self, job_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page_id, crawl_job_id, source_url, target_url, link_text,
                    is_nofollow, is_internal
             FROM links WHERE crawl_job_id = ?1 ORDER BY id",
        )?;
        let links = stmt
            .query_map(params![job_id], |row| {
                Ok(LinkRecord {
                    id: row.get(0)?,
                    page_id: row.get(1)?,
                    job_id: row.get(2)?,
                    source_url: row.get(3)?,
                    target_url: row.get(4)?,
                    link_text: row.get(5)?,
                    is_nofollow: row.get(6)?,
                    is_internal: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    // ===== Asset Management =====

    fn insert_image_if_new(&mut self, image: &NewImage) -> StorageResult<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO images (crawl_job_id, page_id, url, alt_text, is_responsive, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(crawl_job_id, url) DO NOTHING",
            params![
                image.job_id,
                image.page_id,
                image.url,
                image.alt_text,
                image.is_responsive,
                now
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn update_image_metadata(
        &mut self,
        image_id: i64,
        metadata: &AssetMetadata,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE images
             SET status_code = ?1, content_type = ?2, file_size = ?3, redirect_count = ?4,
                 width = ?5, height = ?6
             WHERE id = ?7",
            params![
                metadata.status_code,
                metadata.content_type,
                metadata.file_size.map(|size| size as i64),
                metadata.redirect_count,
                metadata.width,
                metadata.height,
                image_id
            ],
        )?;
        Ok(())
    }

    fn list_images(&self, job_id: i64) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_job_id, page_id, url, alt_text, is_responsive,
                    status_code, content_type, file_size, redirect_count, width, height
             FROM images WHERE crawl_job_id = ?1 ORDER BY id",
        )?;
        let images = stmt
            .query_map(params![job_id], |row| {
                Ok(ImageRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    page_id: row.get(2)?,
                    url: row.get(3)?,
                    alt_text: row.get(4)?,
                    is_responsive: row.get(5)?,
                    metadata: metadata_from_row(row, 6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    fn insert_script_if_new(&mut self, script: &NewScript) -> StorageResult<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO scripts (crawl_job_id, page_id, url, type, is_async, is_defer, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(crawl_job_id, url) DO NOTHING",
            params![
                script.job_id,
                script.page_id,
                script.url,
                script.script_type,
                script.is_async,
                script.is_defer,
                now
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn update_script_metadata(
        &mut self,
        script_id: i64,
        metadata: &AssetMetadata,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE scripts
             SET status_code = ?1, content_type = ?2, file_size = ?3, redirect_count = ?4
             WHERE id = ?5",
            params![
                metadata.status_code,
                metadata.content_type,
                metadata.file_size.map(|size| size as i64),
                metadata.redirect_count,
                script_id
            ],
        )?;
        Ok(())
    }

    fn list_scripts(&self, job_id: i64) -> StorageResult<Vec<ScriptRecord>> {
        // Scripts have no dimensions; NULLs keep the shared metadata layout.
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_job_id, page_id, url, type, is_async, is_defer,
                    status_code, content_type, file_size, redirect_count, NULL, NULL
             FROM scripts WHERE crawl_job_id = ?1 ORDER BY id",
        )?;
        let scripts = stmt
            .query_map(params![job_id], |row| {
                Ok(ScriptRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    page_id: row.get(2)?,
                    url: row.get(3)?,
                    script_type: row.get(4)?,
                    is_async: row.get(5)?,
                    is_defer: row.get(6)?,
                    metadata: metadata_from_row(row, 7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scripts)
    }

    // ===== Statistics =====

    fn count_entities(&self, job_id: i64) -> StorageResult<JobCounts> {
        let counts = self.conn.query_row(
            "SELECT
                 (SELECT COUNT(*) FROM pages WHERE crawl_job_id = ?1),
                 (SELECT COUNT(*) FROM links WHERE crawl_job_id = ?1),
                 (SELECT COUNT(*) FROM images WHERE crawl_job_id = ?1),
                 (SELECT COUNT(*) FROM scripts WHERE crawl_job_id = ?1)",
            params![job_id],
            |row| {
                Ok(JobCounts {
                    pages: row.get::<_, i64>(0)? as u64,
                    links: row.get::<_, i64>(1)? as u64,
                    images: row.get::<_, i64>(2)? as u64,
                    scripts: row.get::<_, i64>(3)? as u64,
                })
            },
        )?;
        Ok(counts)
    }
}
