//! Transcript text extraction for uploaded files.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("File is not valid UTF-8 text")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    PlainText,
    WebVtt,
    Srt,
}

impl TranscriptFormat {
    /// Detect from the file name first, then the declared MIME type.
    pub fn detect(file_name: &str, mime: Option<&str>) -> Result<Self, ExtractError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".vtt") {
            return Ok(TranscriptFormat::WebVtt);
        }
        if lower.ends_with(".srt") {
            return Ok(TranscriptFormat::Srt);
        }
        if lower.ends_with(".txt") || mime == Some("text/plain") {
            return Ok(TranscriptFormat::PlainText);
        }
        let shown = match mime {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => file_name.to_string(),
        };
        Err(ExtractError::UnsupportedFormat(shown))
    }
}

fn inline_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

fn is_index(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

/// Plain text of an uploaded transcript.
pub fn extract(file_name: &str, mime: Option<&str>, bytes: &[u8]) -> Result<String, ExtractError> {
    let format = TranscriptFormat::detect(file_name, mime)?;
    let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::InvalidUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(match format {
        TranscriptFormat::PlainText => text.to_string(),
        TranscriptFormat::WebVtt => from_vtt(text),
        TranscriptFormat::Srt => from_srt(text),
    })
}

/// Cue text only: header, timings, identifiers, `NOTE` blocks and inline
/// tags are dropped.
pub fn from_vtt(content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_cue = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "WEBVTT" {
            in_cue = false;
            continue;
        }
        if trimmed.contains("-->") {
            in_cue = true;
            continue;
        }
        if is_index(trimmed) || trimmed.starts_with("NOTE") {
            continue;
        }
        if in_cue {
            let clean = inline_tag().replace_all(trimmed, "");
            let clean = clean.trim();
            if !clean.is_empty() {
                out.push(clean.to_string());
            }
        }
    }

    out.join(" ")
}

pub fn from_srt(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_index(l) && !l.contains("-->"))
        .collect::<Vec<_>>()
        .join(" ")
}
