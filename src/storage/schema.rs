//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One crawl of one domain
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    total_pages INTEGER NOT NULL DEFAULT 0,
    total_links INTEGER NOT NULL DEFAULT 0,
    total_images INTEGER NOT NULL DEFAULT 0,
    total_scripts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

-- Frontier: every URL ever scheduled for a job
CREATE TABLE IF NOT EXISTS crawl_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    retry_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    processed_at TEXT,
    UNIQUE(crawl_job_id, url)
);

CREATE INDEX IF NOT EXISTS idx_queue_job_status ON crawl_queue(crawl_job_id, status);

-- Fetched pages
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    url TEXT NOT NULL,
    title TEXT,
    meta_description TEXT,
    status_code INTEGER,
    content_type TEXT,
    redirect_url TEXT,
    redirect_count INTEGER NOT NULL DEFAULT 0,
    favicon_url TEXT,
    crawled_at TEXT,
    UNIQUE(crawl_job_id, url)
);

-- Anchors found on fetched pages
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id),
    crawl_job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    source_url TEXT NOT NULL,
    target_url TEXT NOT NULL,
    link_text TEXT,
    is_nofollow INTEGER NOT NULL DEFAULT 0,
    is_internal INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_links_job ON links(crawl_job_id);
CREATE INDEX IF NOT EXISTS idx_links_page ON links(page_id);

-- Images, one row per distinct URL per job
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    page_id INTEGER NOT NULL REFERENCES pages(id),
    url TEXT NOT NULL,
    alt_text TEXT,
    is_responsive INTEGER NOT NULL DEFAULT 0,
    status_code INTEGER,
    content_type TEXT,
    file_size INTEGER,
    width INTEGER,
    height INTEGER,
    redirect_count INTEGER NOT NULL DEFAULT 0,
    crawled_at TEXT NOT NULL,
    UNIQUE(crawl_job_id, url)
);

-- External scripts, one row per distinct URL per job
CREATE TABLE IF NOT EXISTS scripts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    page_id INTEGER NOT NULL REFERENCES pages(id),
    url TEXT NOT NULL,
    type TEXT,
    is_async INTEGER NOT NULL DEFAULT 0,
    is_defer INTEGER NOT NULL DEFAULT 0,
    status_code INTEGER,
    content_type TEXT,
    file_size INTEGER,
    redirect_count INTEGER NOT NULL DEFAULT 0,
    crawled_at TEXT NOT NULL,
    UNIQUE(crawl_job_id, url)
);
"#;

/// Initializes the database schema
///
/// Safe to call on an existing database; every statement is `IF NOT EXISTS`.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "crawl_jobs",
            "crawl_queue",
            "pages",
            "links",
            "images",
            "scripts",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_queue_rejects_duplicate_url_per_job() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO crawl_jobs (domain, created_at) VALUES ('example.com', 'now')",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO crawl_queue (crawl_job_id, url, created_at) VALUES (1, 'https://example.com/', 'now')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
