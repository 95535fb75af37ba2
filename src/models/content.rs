use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every derivative artifact kind the generator knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    LinkedinPost,
    BlogPost,
    EmailSequence,
    TwitterThread,
    ExecutiveSummary,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::LinkedinPost,
        ContentType::BlogPost,
        ContentType::EmailSequence,
        ContentType::TwitterThread,
        ContentType::ExecutiveSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::LinkedinPost => "linkedin_post",
            ContentType::BlogPost => "blog_post",
            ContentType::EmailSequence => "email_sequence",
            ContentType::TwitterThread => "twitter_thread",
            ContentType::ExecutiveSummary => "executive_summary",
        }
    }

    /// Human wording used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::LinkedinPost => "LinkedIn post",
            ContentType::BlogPost => "blog post",
            ContentType::EmailSequence => "email",
            ContentType::TwitterThread => "Twitter thread",
            ContentType::ExecutiveSummary => "executive summary",
        }
    }

    /// Characters of source text embedded in the prompt.
    pub fn source_budget(&self) -> usize {
        match self {
            ContentType::LinkedinPost => 8_000,
            ContentType::BlogPost => 12_000,
            ContentType::EmailSequence => 8_000,
            ContentType::TwitterThread => 6_000,
            ContentType::ExecutiveSummary => 10_000,
        }
    }

    /// Number of items requested from the model in one call.
    pub fn item_count(&self) -> usize {
        match self {
            ContentType::LinkedinPost | ContentType::EmailSequence => 5,
            _ => 1,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content type: {0}")]
pub struct UnknownContentType(pub String);

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownContentType(s.to_string()))
    }
}

/// Requested size of each social post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthTier {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthTier {
    pub fn word_range(&self) -> &'static str {
        match self {
            LengthTier::Short => "50-100",
            LengthTier::Medium => "150-200",
            LengthTier::Long => "250-300",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneOverride {
    Formal,
    Casual,
    Technical,
}

impl ToneOverride {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToneOverride::Formal => "formal",
            ToneOverride::Casual => "casual",
            ToneOverride::Technical => "technical",
        }
    }

    pub fn parse(raw: &str) -> Option<ToneOverride> {
        match raw {
            "formal" => Some(ToneOverride::Formal),
            "casual" => Some(ToneOverride::Casual),
            "technical" => Some(ToneOverride::Technical),
            _ => None,
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            ToneOverride::Formal => "Use a more formal, executive-level tone than usual.",
            ToneOverride::Casual => "Use a more casual, conversational tone than usual.",
            ToneOverride::Technical => "Focus on technical details, data, and specific metrics.",
        }
    }
}

/// Type-specific artifact metadata, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentMetadata {
    #[default]
    None,
    Email {
        subject: String,
    },
    Social {
        linkedin_length: LengthTier,
    },
}

impl ContentMetadata {
    pub fn is_none(&self) -> bool {
        matches!(self, ContentMetadata::None)
    }

    /// Whether this metadata may be attached to an artifact of `content_type`.
    pub fn fits(&self, content_type: ContentType) -> bool {
        match self {
            ContentMetadata::None => true,
            ContentMetadata::Email { .. } => content_type == ContentType::EmailSequence,
            ContentMetadata::Social { .. } => content_type == ContentType::LinkedinPost,
        }
    }

    /// JSON column value; `None` is stored as NULL.
    pub fn to_column(&self) -> Option<String> {
        if self.is_none() {
            return None;
        }
        serde_json::to_string(self).ok()
    }

    /// Unreadable stored values degrade to `None` rather than failing the row.
    pub fn from_column(raw: Option<&str>) -> ContentMetadata {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}
