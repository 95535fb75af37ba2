use anyhow::Result;
use rusqlite::Connection;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS auth_sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            plan_tier TEXT,
            brand_voice_profile TEXT,
            target_audience TEXT,
            words_to_avoid TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS content_sources (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            title TEXT,
            file_name TEXT,
            source_text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (account_id) REFERENCES accounts(id)
        );

        CREATE TABLE IF NOT EXISTS content_generations (
            id TEXT PRIMARY KEY,
            content_source_id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            selected_types TEXT NOT NULL,
            tone_override TEXT,
            status TEXT NOT NULL DEFAULT 'processing',
            created_at TEXT NOT NULL,
            completed_at TEXT,
            FOREIGN KEY (content_source_id) REFERENCES content_sources(id),
            FOREIGN KEY (account_id) REFERENCES accounts(id)
        );

        CREATE TABLE IF NOT EXISTS generated_content (
            id TEXT PRIMARY KEY,
            generation_id TEXT NOT NULL,
            content_source_id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            content_type TEXT NOT NULL,
            content_text TEXT NOT NULL,
            content_metadata TEXT,
            revision_of TEXT,
            revision_number INTEGER NOT NULL DEFAULT 0,
            is_archived BOOLEAN NOT NULL DEFAULT 0,
            archived_at TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (generation_id) REFERENCES content_generations(id),
            FOREIGN KEY (revision_of) REFERENCES generated_content(id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_generated_content_lineage
            ON generated_content (COALESCE(revision_of, id), revision_number);
        CREATE INDEX IF NOT EXISTS idx_generated_content_source
            ON generated_content (content_source_id);

        CREATE TABLE IF NOT EXISTS api_usage_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id TEXT NOT NULL,
            generation_id TEXT,
            model TEXT NOT NULL,
            operation TEXT NOT NULL,
            content_type TEXT,
            input_tokens INTEGER NOT NULL DEFAULT 0,
            output_tokens INTEGER NOT NULL DEFAULT 0,
            cache_creation_input_tokens INTEGER NOT NULL DEFAULT 0,
            cache_read_input_tokens INTEGER NOT NULL DEFAULT 0,
            estimated_cost REAL NOT NULL DEFAULT 0,
            request_time_ms INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            error_message TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_api_usage_logs_account_time
            ON api_usage_logs (account_id, created_at);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'api_usage_logs'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }
}
