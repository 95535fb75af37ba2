use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::content::{ContentMetadata, ContentType, ToneOverride};
use crate::pipeline::cost::TokenUsage;
use crate::pipeline::quota::PlanTier;

// --- Identity ---
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn ensure_user(conn: &Connection, user_id: &str, email: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (id, email) VALUES (?1, ?2)",
        params![user_id, email],
    )?;
    Ok(())
}

/// Only the token hash is stored.
pub fn insert_auth_session(
    conn: &Connection,
    token: &str,
    user_id: &str,
    expires_at: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO auth_sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![hash_token(token), user_id, expires_at],
    )?;
    Ok(())
}

/// User id for a live session token.
pub fn resolve_session(conn: &Connection, token: &str, now: &str) -> Result<Option<String>> {
    let user_id = conn
        .query_row(
            "SELECT user_id FROM auth_sessions WHERE token_hash = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            params![hash_token(token), now],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

// --- Accounts ---
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub plan_tier: PlanTier,
    pub brand_voice_profile: Option<String>,
    pub target_audience: Option<String>,
    pub words_to_avoid: Option<String>,
}

pub fn insert_account(
    conn: &Connection,
    id: &str,
    user_id: &str,
    plan_tier: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, user_id, plan_tier) VALUES (?1, ?2, ?3)",
        params![id, user_id, plan_tier],
    )?;
    Ok(())
}

pub fn get_account_for_user(conn: &Connection, user_id: &str) -> Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT id, user_id, plan_tier, brand_voice_profile, target_audience, words_to_avoid FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| {
                let tier: Option<String> = row.get(2)?;
                Ok(Account {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    plan_tier: PlanTier::parse(tier.as_deref()),
                    brand_voice_profile: row.get(3)?,
                    target_audience: row.get(4)?,
                    words_to_avoid: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(account)
}

pub fn update_brand_voice(
    conn: &Connection,
    account_id: &str,
    profile: &str,
    target_audience: Option<&str>,
    words_to_avoid: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET brand_voice_profile = ?2, target_audience = COALESCE(?3, target_audience), words_to_avoid = COALESCE(?4, words_to_avoid) WHERE id = ?1",
        params![account_id, profile, target_audience, words_to_avoid],
    )?;
    Ok(())
}

// --- Content Sources ---
#[derive(Debug, Clone, Serialize)]
pub struct ContentSource {
    pub id: String,
    pub account_id: String,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub source_text: String,
    pub created_at: String,
}

pub fn insert_content_source(conn: &Connection, source: &ContentSource) -> Result<()> {
    conn.execute(
        "INSERT INTO content_sources (id, account_id, title, file_name, source_text, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source.id,
            source.account_id,
            source.title,
            source.file_name,
            source.source_text,
            source.created_at
        ],
    )?;
    Ok(())
}

pub fn get_content_source(conn: &Connection, id: &str) -> Result<Option<ContentSource>> {
    let source = conn
        .query_row(
            "SELECT id, account_id, title, file_name, source_text, created_at FROM content_sources WHERE id = ?1",
            params![id],
            |row| {
                Ok(ContentSource {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    title: row.get(2)?,
                    file_name: row.get(3)?,
                    source_text: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(source)
}

/// Every source of an account, newest first.
pub fn list_content_sources(conn: &Connection, account_id: &str) -> Result<Vec<ContentSource>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, title, file_name, source_text, created_at FROM content_sources WHERE account_id = ?1 ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![account_id], |row| {
        Ok(ContentSource {
            id: row.get(0)?,
            account_id: row.get(1)?,
            title: row.get(2)?,
            file_name: row.get(3)?,
            source_text: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// --- Generations ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Processing,
    Complete,
}

impl GenerationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Processing => "processing",
            GenerationStatus::Complete => "complete",
        }
    }

    fn parse(raw: &str) -> GenerationStatus {
        match raw {
            "complete" => GenerationStatus::Complete,
            _ => GenerationStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub id: String,
    pub content_source_id: String,
    pub account_id: String,
    pub selected_types: Vec<ContentType>,
    pub tone_override: Option<ToneOverride>,
    pub status: GenerationStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
}

pub fn insert_generation(conn: &Connection, generation: &Generation) -> Result<()> {
    let types = serde_json::to_string(&generation.selected_types)?;
    conn.execute(
        "INSERT INTO content_generations (id, content_source_id, account_id, selected_types, tone_override, status, created_at, completed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            generation.id,
            generation.content_source_id,
            generation.account_id,
            types,
            generation.tone_override.map(|t| t.as_str()),
            generation.status.as_str(),
            generation.created_at,
            generation.completed_at
        ],
    )?;
    Ok(())
}

pub fn complete_generation(conn: &Connection, id: &str, completed_at: &str) -> Result<()> {
    conn.execute(
        "UPDATE content_generations SET status = ?2, completed_at = ?3 WHERE id = ?1",
        params![id, GenerationStatus::Complete.as_str(), completed_at],
    )?;
    Ok(())
}

const GENERATION_COLUMNS: &str =
    "id, content_source_id, account_id, selected_types, tone_override, status, created_at, completed_at";

fn generation_from_row(row: &Row<'_>) -> rusqlite::Result<Generation> {
    let types: String = row.get(3)?;
    let selected_types: Vec<ContentType> = serde_json::from_str(&types).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let tone: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(Generation {
        id: row.get(0)?,
        content_source_id: row.get(1)?,
        account_id: row.get(2)?,
        selected_types,
        tone_override: tone.as_deref().and_then(ToneOverride::parse),
        status: GenerationStatus::parse(&status),
        created_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

pub fn get_generation(conn: &Connection, id: &str) -> Result<Option<Generation>> {
    let generation = conn
        .query_row(
            &format!("SELECT {GENERATION_COLUMNS} FROM content_generations WHERE id = ?1"),
            params![id],
            generation_from_row,
        )
        .optional()?;
    Ok(generation)
}

/// Every generation of an account, newest first.
pub fn list_generations(conn: &Connection, account_id: &str) -> Result<Vec<Generation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENERATION_COLUMNS} FROM content_generations WHERE account_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![account_id], generation_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_completed_generations_since(conn: &Connection, account_id: &str, since: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM content_generations WHERE account_id = ?1 AND status = 'complete' AND created_at >= ?2",
        params![account_id, since],
        |row| row.get(0),
    )?;
    Ok(count)
}

// --- Generated Content ---
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentArtifact {
    pub id: String,
    pub generation_id: String,
    pub content_source_id: String,
    pub account_id: String,
    pub content_type: ContentType,
    pub content_text: String,
    pub content_metadata: ContentMetadata,
    pub revision_of: Option<String>,
    pub revision_number: i64,
    pub is_archived: bool,
    pub archived_at: Option<String>,
    pub created_at: String,
}

impl ContentArtifact {
    /// Id of the revision-0 artifact of this lineage.
    pub fn lineage_root(&self) -> &str {
        self.revision_of.as_deref().unwrap_or(&self.id)
    }
}

const ARTIFACT_COLUMNS: &str = "id, generation_id, content_source_id, account_id, content_type, content_text, content_metadata, revision_of, revision_number, is_archived, archived_at, created_at";

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<ContentArtifact> {
    let content_type: String = row.get(4)?;
    let content_type = content_type.parse::<ContentType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let metadata: Option<String> = row.get(6)?;
    Ok(ContentArtifact {
        id: row.get(0)?,
        generation_id: row.get(1)?,
        content_source_id: row.get(2)?,
        account_id: row.get(3)?,
        content_type,
        content_text: row.get(5)?,
        content_metadata: ContentMetadata::from_column(metadata.as_deref()),
        revision_of: row.get(7)?,
        revision_number: row.get(8)?,
        is_archived: row.get(9)?,
        archived_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn insert_artifact_row(conn: &Connection, artifact: &ContentArtifact) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO generated_content ({ARTIFACT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            artifact.id,
            artifact.generation_id,
            artifact.content_source_id,
            artifact.account_id,
            artifact.content_type.as_str(),
            artifact.content_text,
            artifact.content_metadata.to_column(),
            artifact.revision_of,
            artifact.revision_number,
            artifact.is_archived,
            artifact.archived_at,
            artifact.created_at
        ],
    )?;
    Ok(())
}

/// Batch insert; either every row lands or none do.
pub fn insert_generated_content(conn: &Connection, artifacts: &[ContentArtifact]) -> Result<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    for artifact in artifacts {
        insert_artifact_row(&tx, artifact)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn get_generated_content(conn: &Connection, id: &str) -> Result<Option<ContentArtifact>> {
    let artifact = conn
        .query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM generated_content WHERE id = ?1"),
            params![id],
            artifact_from_row,
        )
        .optional()?;
    Ok(artifact)
}

pub fn list_content_by_generation(conn: &Connection, generation_id: &str) -> Result<Vec<ContentArtifact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTIFACT_COLUMNS} FROM generated_content WHERE generation_id = ?1 ORDER BY rowid"
    ))?;
    let rows = stmt.query_map(params![generation_id], artifact_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Live (non-archived) artifacts for a source, newest first.
pub fn list_content_by_source(conn: &Connection, source_id: &str) -> Result<Vec<ContentArtifact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTIFACT_COLUMNS} FROM generated_content WHERE content_source_id = ?1 AND is_archived = 0 ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![source_id], artifact_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Distinct content types already produced for a source, archived rows included.
pub fn existing_content_types(conn: &Connection, source_id: &str) -> Result<Vec<ContentType>> {
    let mut stmt = conn.prepare(
        "SELECT content_type FROM generated_content WHERE content_source_id = ?1 GROUP BY content_type ORDER BY MIN(rowid)",
    )?;
    let rows = stmt.query_map(params![source_id], |row| row.get::<_, String>(0))?;
    let mut types = Vec::new();
    for raw in rows {
        types.push(raw?.parse::<ContentType>()?);
    }
    Ok(types)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter {
    pub content_type: Option<ContentType>,
    pub archived: bool,
    pub limit: Option<i64>,
}

/// An account's artifacts across all sources, newest first.
pub fn list_content_history(
    conn: &Connection,
    account_id: &str,
    filter: &HistoryFilter,
) -> Result<Vec<ContentArtifact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTIFACT_COLUMNS} FROM generated_content \
         WHERE account_id = ?1 AND (?2 IS NULL OR content_type = ?2) AND is_archived = ?3 \
         ORDER BY created_at DESC, rowid DESC LIMIT ?4"
    ))?;
    let rows = stmt.query_map(
        params![
            account_id,
            filter.content_type.map(|t| t.as_str()),
            filter.archived,
            // SQLite reads a negative limit as "no limit".
            filter.limit.unwrap_or(-1)
        ],
        artifact_from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every artifact sharing `root_id` as lineage root, oldest revision first.
pub fn list_lineage(conn: &Connection, root_id: &str) -> Result<Vec<ContentArtifact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTIFACT_COLUMNS} FROM generated_content WHERE id = ?1 OR revision_of = ?1 ORDER BY revision_number ASC"
    ))?;
    let rows = stmt.query_map(params![root_id], artifact_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Insert `revision` with the next free revision number of its lineage.
///
/// The max lookup and the insert share one immediate transaction, so two
/// revisions of the same lineage can never receive the same number.
pub fn insert_revision(conn: &Connection, revision: &ContentArtifact) -> Result<ContentArtifact> {
    let root = revision
        .revision_of
        .as_deref()
        .context("a revision must reference its lineage root")?;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let current_max: i64 = tx.query_row(
        "SELECT COALESCE(MAX(revision_number), 0) FROM generated_content WHERE id = ?1 OR revision_of = ?1",
        params![root],
        |row| row.get(0),
    )?;
    let mut stored = revision.clone();
    stored.revision_number = stored.revision_number.max(current_max + 1);
    insert_artifact_row(&tx, &stored)?;
    tx.commit()?;
    Ok(stored)
}

pub fn set_archived(conn: &Connection, id: &str, archived_at: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE generated_content SET is_archived = ?2, archived_at = ?3 WHERE id = ?1",
        params![id, archived_at.is_some(), archived_at],
    )?;
    Ok(changed > 0)
}

/// Archive several artifacts of one account; returns how many rows changed.
pub fn archive_many(conn: &Connection, account_id: &str, ids: &[String], archived_at: &str) -> Result<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut changed = 0;
    for id in ids {
        changed += tx.execute(
            "UPDATE generated_content SET is_archived = 1, archived_at = ?3 WHERE id = ?1 AND account_id = ?2",
            params![id, account_id, archived_at],
        )?;
    }
    tx.commit()?;
    Ok(changed)
}

// --- API Usage Logs ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Success,
    Error,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "success",
            UsageStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub account_id: String,
    pub generation_id: Option<String>,
    pub model: String,
    pub operation: String,
    pub content_type: Option<String>,
    pub usage: TokenUsage,
    pub estimated_cost: f64,
    pub request_time_ms: i64,
    pub status: UsageStatus,
    pub error_message: Option<String>,
    pub created_at: String,
}

pub fn insert_usage_log(conn: &Connection, record: &UsageRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO api_usage_logs (account_id, generation_id, model, operation, content_type, input_tokens, output_tokens, cache_creation_input_tokens, cache_read_input_tokens, estimated_cost, request_time_ms, status, error_message, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.account_id,
            record.generation_id,
            record.model,
            record.operation,
            record.content_type,
            record.usage.input_tokens,
            record.usage.output_tokens,
            record.usage.cache_creation_input_tokens,
            record.usage.cache_read_input_tokens,
            record.estimated_cost,
            record.request_time_ms,
            record.status.as_str(),
            record.error_message,
            record.created_at
        ],
    )?;
    Ok(())
}

/// Usage rows (any status) recorded for the account at or after `since`.
pub fn count_usage_since(conn: &Connection, account_id: &str, since: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM api_usage_logs WHERE account_id = ?1 AND created_at >= ?2",
        params![account_id, since],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_usage_for_account(conn: &Connection, account_id: &str) -> Result<Vec<UsageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, generation_id, model, operation, content_type, input_tokens, output_tokens, cache_creation_input_tokens, cache_read_input_tokens, estimated_cost, request_time_ms, status, error_message, created_at FROM api_usage_logs WHERE account_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![account_id], |row| {
        let status: String = row.get(11)?;
        Ok(UsageRecord {
            account_id: row.get(0)?,
            generation_id: row.get(1)?,
            model: row.get(2)?,
            operation: row.get(3)?,
            content_type: row.get(4)?,
            usage: TokenUsage {
                input_tokens: row.get(5)?,
                output_tokens: row.get(6)?,
                cache_creation_input_tokens: row.get(7)?,
                cache_read_input_tokens: row.get(8)?,
            },
            estimated_cost: row.get(9)?,
            request_time_ms: row.get(10)?,
            status: if status == "success" {
                UsageStatus::Success
            } else {
                UsageStatus::Error
            },
            error_message: row.get(12)?,
            created_at: row.get(13)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallCost {
    pub calls: i64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_cost: f64,
    pub call_count: i64,
    pub by_operation: BTreeMap<String, CallCost>,
    pub by_content_type: BTreeMap<String, CallCost>,
}

pub fn usage_stats_since(conn: &Connection, account_id: &str, since: &str) -> Result<UsageStats> {
    let mut stmt = conn.prepare(
        "SELECT input_tokens, output_tokens, estimated_cost, operation, content_type FROM api_usage_logs WHERE account_id = ?1 AND created_at >= ?2",
    )?;
    let rows = stmt.query_map(params![account_id, since], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut stats = UsageStats::default();
    for row in rows {
        let (input, output, cost, operation, content_type) = row?;
        stats.total_input_tokens += input;
        stats.total_output_tokens += output;
        stats.total_cost += cost;
        stats.call_count += 1;

        let op = stats.by_operation.entry(operation).or_default();
        op.calls += 1;
        op.cost += cost;

        if let Some(content_type) = content_type {
            let ct = stats.by_content_type.entry(content_type).or_default();
            ct.calls += 1;
            ct.cost += cost;
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn seed_account(conn: &Connection) -> Account {
        ensure_user(conn, "user-1", Some("a@example.com")).unwrap();
        insert_account(conn, "acct-1", "user-1", Some("pro")).unwrap();
        get_account_for_user(conn, "user-1").unwrap().unwrap()
    }

    fn usage_row(account_id: &str, created_at: &str, operation: &str, cost: f64) -> UsageRecord {
        UsageRecord {
            account_id: account_id.into(),
            generation_id: None,
            model: "m".into(),
            operation: operation.into(),
            content_type: Some("blog_post".into()),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                ..Default::default()
            },
            estimated_cost: cost,
            request_time_ms: 12,
            status: UsageStatus::Success,
            error_message: None,
            created_at: created_at.into(),
        }
    }

    #[test]
    fn sessions_resolve_by_hash_and_expire() {
        let conn = open_in_memory().unwrap();
        ensure_user(&conn, "user-1", None).unwrap();
        insert_auth_session(&conn, "live", "user-1", None).unwrap();
        insert_auth_session(&conn, "old", "user-1", Some("2020-01-01T00:00:00.000Z")).unwrap();

        let now = "2026-01-01T00:00:00.000Z";
        assert_eq!(resolve_session(&conn, "live", now).unwrap().as_deref(), Some("user-1"));
        assert_eq!(resolve_session(&conn, "old", now).unwrap(), None);
        assert_eq!(resolve_session(&conn, "nope", now).unwrap(), None);

        let stored: String = conn
            .query_row("SELECT token_hash FROM auth_sessions LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_ne!(stored, "live");
    }

    #[test]
    fn unknown_plan_tier_reads_as_free() {
        let conn = open_in_memory().unwrap();
        ensure_user(&conn, "u", None).unwrap();
        insert_account(&conn, "a", "u", Some("gold")).unwrap();
        let account = get_account_for_user(&conn, "u").unwrap().unwrap();
        assert_eq!(account.plan_tier, PlanTier::Free);
        assert_eq!(seed_account(&conn).plan_tier, PlanTier::Pro);
    }

    #[test]
    fn usage_counts_respect_window_start() {
        let conn = open_in_memory().unwrap();
        let account = seed_account(&conn);
        insert_usage_log(&conn, &usage_row(&account.id, "2026-03-01T10:00:00.000Z", "content_generation", 0.1)).unwrap();
        insert_usage_log(&conn, &usage_row(&account.id, "2026-03-01T10:00:59.500Z", "content_generation", 0.2)).unwrap();
        insert_usage_log(&conn, &usage_row("other", "2026-03-01T10:00:59.500Z", "content_generation", 0.2)).unwrap();

        assert_eq!(count_usage_since(&conn, &account.id, "2026-03-01T10:00:00.000Z").unwrap(), 2);
        assert_eq!(count_usage_since(&conn, &account.id, "2026-03-01T10:00:30.000Z").unwrap(), 1);
        assert_eq!(count_usage_since(&conn, &account.id, "2026-03-02T00:00:00.000Z").unwrap(), 0);
    }

    #[test]
    fn usage_stats_group_by_operation_and_type() {
        let conn = open_in_memory().unwrap();
        let account = seed_account(&conn);
        insert_usage_log(&conn, &usage_row(&account.id, "2026-03-01T10:00:00.000Z", "content_generation", 0.25)).unwrap();
        insert_usage_log(&conn, &usage_row(&account.id, "2026-03-02T10:00:00.000Z", "content_revision", 0.5)).unwrap();
        let mut no_type = usage_row(&account.id, "2026-03-03T10:00:00.000Z", "brand_voice_analysis", 0.25);
        no_type.content_type = None;
        insert_usage_log(&conn, &no_type).unwrap();

        let stats = usage_stats_since(&conn, &account.id, "2026-03-01T00:00:00.000Z").unwrap();
        assert_eq!(stats.call_count, 3);
        assert_eq!(stats.total_input_tokens, 30);
        assert_eq!(stats.total_cost, 1.0);
        assert_eq!(stats.by_operation["content_revision"].calls, 1);
        assert_eq!(stats.by_content_type["blog_post"].calls, 2);
        assert!(!stats.by_content_type.contains_key("brand_voice_analysis"));
    }

    fn source(account_id: &str, id: &str, created_at: &str) -> ContentSource {
        ContentSource {
            id: id.into(),
            account_id: account_id.into(),
            title: None,
            file_name: None,
            source_text: "text".into(),
            created_at: created_at.into(),
        }
    }

    fn artifact(account_id: &str, id: &str, content_type: ContentType, created_at: &str) -> ContentArtifact {
        ContentArtifact {
            id: id.into(),
            generation_id: "gen-1".into(),
            content_source_id: "src-1".into(),
            account_id: account_id.into(),
            content_type,
            content_text: format!("{id} text"),
            content_metadata: ContentMetadata::None,
            revision_of: None,
            revision_number: 0,
            is_archived: false,
            archived_at: None,
            created_at: created_at.into(),
        }
    }

    #[test]
    fn account_listings_are_newest_first_and_scoped() {
        let conn = open_in_memory().unwrap();
        let account = seed_account(&conn);
        ensure_user(&conn, "user-2", None).unwrap();
        insert_account(&conn, "acct-2", "user-2", None).unwrap();

        insert_content_source(&conn, &source(&account.id, "src-1", "2026-03-01T00:00:00.000Z")).unwrap();
        insert_content_source(&conn, &source(&account.id, "src-2", "2026-03-02T00:00:00.000Z")).unwrap();
        insert_content_source(&conn, &source("acct-2", "src-x", "2026-03-03T00:00:00.000Z")).unwrap();
        let ids: Vec<String> = list_content_sources(&conn, &account.id).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["src-2", "src-1"]);

        for (id, at) in [("gen-1", "2026-03-01T01:00:00.000Z"), ("gen-2", "2026-03-02T01:00:00.000Z")] {
            insert_generation(
                &conn,
                &Generation {
                    id: id.into(),
                    content_source_id: "src-1".into(),
                    account_id: account.id.clone(),
                    selected_types: vec![ContentType::BlogPost, ContentType::TwitterThread],
                    tone_override: Some(ToneOverride::Casual),
                    status: GenerationStatus::Processing,
                    created_at: at.into(),
                    completed_at: None,
                },
            )
            .unwrap();
        }
        let generations = list_generations(&conn, &account.id).unwrap();
        assert_eq!(generations.len(), 2);
        assert_eq!(generations[0].id, "gen-2");
        assert_eq!(generations[0].selected_types, vec![ContentType::BlogPost, ContentType::TwitterThread]);
        assert_eq!(generations[0].tone_override, Some(ToneOverride::Casual));
        assert!(list_generations(&conn, "acct-2").unwrap().is_empty());
    }

    #[test]
    fn content_history_filters_by_type_and_archive_state() {
        let conn = open_in_memory().unwrap();
        let account = seed_account(&conn);
        insert_content_source(&conn, &source(&account.id, "src-1", "2026-03-01T00:00:00.000Z")).unwrap();
        insert_generation(
            &conn,
            &Generation {
                id: "gen-1".into(),
                content_source_id: "src-1".into(),
                account_id: account.id.clone(),
                selected_types: vec![ContentType::BlogPost, ContentType::TwitterThread],
                tone_override: None,
                status: GenerationStatus::Complete,
                created_at: "2026-03-01T00:00:00.000Z".into(),
                completed_at: None,
            },
        )
        .unwrap();
        insert_generated_content(
            &conn,
            &[
                artifact(&account.id, "a", ContentType::TwitterThread, "2026-03-01T01:00:00.000Z"),
                artifact(&account.id, "b", ContentType::BlogPost, "2026-03-01T02:00:00.000Z"),
                artifact(&account.id, "c", ContentType::TwitterThread, "2026-03-01T03:00:00.000Z"),
            ],
        )
        .unwrap();
        set_archived(&conn, "c", Some("2026-03-02T00:00:00.000Z")).unwrap();

        let ids = |filter: HistoryFilter| -> Vec<String> {
            list_content_history(&conn, &account.id, &filter)
                .unwrap()
                .into_iter()
                .map(|a| a.id)
                .collect()
        };
        assert_eq!(ids(HistoryFilter::default()), vec!["b", "a"]);
        assert_eq!(
            ids(HistoryFilter {
                archived: true,
                ..Default::default()
            }),
            vec!["c"]
        );
        assert_eq!(
            ids(HistoryFilter {
                content_type: Some(ContentType::BlogPost),
                ..Default::default()
            }),
            vec!["b"]
        );
        assert_eq!(
            ids(HistoryFilter {
                limit: Some(1),
                ..Default::default()
            }),
            vec!["b"]
        );
        assert!(list_content_history(&conn, "acct-2", &HistoryFilter::default()).unwrap().is_empty());

        assert_eq!(
            existing_content_types(&conn, "src-1").unwrap(),
            vec![ContentType::TwitterThread, ContentType::BlogPost]
        );
    }
}
