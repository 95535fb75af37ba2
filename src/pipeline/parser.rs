//! Turns one free-text model response into typed artifact drafts.
//!
//! Every function here is total: malformed input degrades to a single
//! best-effort draft, never to an error or an empty list.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::models::content::{ContentMetadata, ContentType};

pub const POST_LABEL: &str = "POST";
pub const EMAIL_LABEL: &str = "EMAIL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDraft {
    pub text: String,
    pub metadata: ContentMetadata,
}

impl ArtifactDraft {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ContentMetadata::None,
        }
    }
}

fn numbered_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[/.]\s*").expect("valid regex"))
}

fn delimiters() -> &'static Mutex<HashMap<String, Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// `---LABEL N---` matcher, compiled once per label.
fn delimiter(label: &str) -> Regex {
    let mut cache = delimiters()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    cache
        .entry(label.to_string())
        .or_insert_with(|| Regex::new(&format!(r"---{} \d+---", regex::escape(label))).expect("valid regex"))
        .clone()
}

fn subject_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^subject:\s*").expect("valid regex"))
}

/// Parse a response produced for `content_type`.
pub fn parse(content_type: ContentType, response: &str) -> Vec<ArtifactDraft> {
    match content_type {
        ContentType::LinkedinPost => split_delimited(response, POST_LABEL)
            .into_iter()
            .map(ArtifactDraft::plain)
            .collect(),
        ContentType::EmailSequence => parse_emails(response),
        ContentType::TwitterThread => parse_numbered_lines(response),
        ContentType::BlogPost | ContentType::ExecutiveSummary => parse_single(response),
    }
}

/// Split on `---LABEL N---` markers, dropping segments that are blank after
/// trimming. Falls back to the whole trimmed response.
pub fn split_delimited(response: &str, label: &str) -> Vec<String> {
    let items: Vec<String> = delimiter(label)
        .split(response)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        return vec![response.trim().to_string()];
    }
    items
}

/// One email: the first `subject:` line becomes metadata, all other lines the body.
pub fn parse_email(segment: &str) -> ArtifactDraft {
    let lines: Vec<&str> = segment.trim().lines().collect();
    let subject = lines
        .iter()
        .find(|l| subject_prefix().is_match(l))
        .map(|l| subject_prefix().replace(l, "").trim_end().to_string())
        .unwrap_or_default();
    let body = lines
        .iter()
        .filter(|l| !subject_prefix().is_match(l))
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    ArtifactDraft {
        text: body,
        metadata: ContentMetadata::Email { subject },
    }
}

pub fn parse_emails(response: &str) -> Vec<ArtifactDraft> {
    split_delimited(response, EMAIL_LABEL)
        .iter()
        .map(|segment| parse_email(segment))
        .collect()
}

/// Lines starting with `N/` or `N.` become one item each, prefix stripped.
pub fn parse_numbered_lines(response: &str) -> Vec<ArtifactDraft> {
    let items: Vec<ArtifactDraft> = response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && numbered_line().is_match(l))
        .map(|l| ArtifactDraft::plain(numbered_line().replace(l, "").trim().to_string()))
        .collect();
    if items.is_empty() {
        return parse_single(response);
    }
    items
}

pub fn parse_single(response: &str) -> Vec<ArtifactDraft> {
    vec![ArtifactDraft::plain(response.trim())]
}
