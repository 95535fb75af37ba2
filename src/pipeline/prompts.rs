use serde::{Deserialize, Serialize};

use crate::models::content::{ContentType, LengthTier, ToneOverride};
use crate::pipeline::parser::{EMAIL_LABEL, POST_LABEL};

pub const DEFAULT_BRAND_VOICE: &str = "Write in a professional, engaging tone.";

/// Per-type knobs that travel with a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub linkedin_length: LengthTier,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub words_to_avoid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    /// Cacheable system block.
    pub system: String,
    pub user: String,
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn audience_lines(options: &GenerationOptions) -> String {
    let mut out = String::new();
    if let Some(audience) = options.target_audience.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str(&format!("Target audience: {}\n", audience.trim()));
    }
    if let Some(avoid) = options.words_to_avoid.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str(&format!("Avoid these words/phrases: {}\n", avoid.trim()));
    }
    out
}

pub fn generation_system_prompt(brand_voice: &str) -> String {
    let voice = if brand_voice.trim().is_empty() {
        DEFAULT_BRAND_VOICE
    } else {
        brand_voice.trim()
    };
    format!(
        "You are an expert content creator. Your job is to transform transcripts into engaging, on-brand content.\n\n\
         BRAND VOICE:\n{voice}\n\n\
         Always maintain this brand voice while creating content. Be specific, use examples from the transcript, \
         and create content that provides real value to readers."
    )
}

/// System and user prompt for one content type.
pub fn build(
    content_type: ContentType,
    source: &str,
    brand_voice: &str,
    tone: Option<ToneOverride>,
    options: &GenerationOptions,
) -> BuiltPrompt {
    let transcript = truncate_chars(source, content_type.source_budget());
    let tone_line = tone.map(|t| t.instruction()).unwrap_or("");
    let audience = audience_lines(options);
    let count = content_type.item_count();

    let user = match content_type {
        ContentType::LinkedinPost => format!(
            "Generate {count} LinkedIn posts based on the following transcript. Each post should:\n\
             - Be {words} words\n\
             - Start with an attention-grabbing hook\n\
             - Include a specific insight or data point from the transcript\n\
             - End with a question or call-to-action to drive engagement\n\
             - Use short paragraphs (1-3 sentences each)\n\n\
             {tone_line}\n{audience}\n\
             TRANSCRIPT:\n{transcript}\n\n\
             Generate exactly {count} posts. Format each post with \"---{POST_LABEL} {{N}}---\" separator where N is the post number (1, 2, 3, etc).",
            words = options.linkedin_length.word_range(),
        ),
        ContentType::BlogPost => format!(
            "Write a blog post based on the following transcript. The post should:\n\
             - Be 800-1200 words\n\
             - Have a compelling title\n\
             - Include an introduction that hooks the reader\n\
             - Be organized with clear sections/headers\n\
             - Include specific examples and insights from the transcript\n\
             - End with a conclusion and call-to-action\n\n\
             {tone_line}\n{audience}\n\
             TRANSCRIPT:\n{transcript}\n\n\
             Format: Start with the title on the first line, then the content."
        ),
        ContentType::EmailSequence => format!(
            "Create a {count}-email nurture sequence based on the following transcript. Each email should:\n\
             - Be 100-150 words\n\
             - Have a compelling subject line\n\
             - Build on the previous email\n\
             - Include one key insight from the transcript\n\
             - Have a clear call-to-action\n\n\
             The sequence should educate the reader progressively.\n\n\
             {tone_line}\n{audience}\n\
             TRANSCRIPT:\n{transcript}\n\n\
             Format each email with \"---{EMAIL_LABEL} {{N}}---\" separator, then \"Subject: [subject line]\" on the next line, followed by the email body."
        ),
        ContentType::TwitterThread => format!(
            "Create a Twitter/X thread based on the following transcript. The thread should:\n\
             - Have 8-12 tweets\n\
             - Start with a hook tweet that grabs attention\n\
             - Each tweet should be under 280 characters\n\
             - Include specific insights and takeaways\n\
             - End with a summary or call-to-action\n\
             - Use thread numbering (1/, 2/, etc.)\n\n\
             {tone_line}\n{audience}\n\
             TRANSCRIPT:\n{transcript}\n\n\
             Format each tweet on its own line, numbered."
        ),
        ContentType::ExecutiveSummary => format!(
            "Write an executive summary based on the following transcript. The summary should:\n\
             - Be 250-400 words\n\
             - Start with the main thesis/key takeaway\n\
             - Include 3-5 key points\n\
             - Be written for busy executives\n\
             - Focus on actionable insights and business implications\n\
             - End with recommendations or next steps\n\n\
             {tone_line}\n{audience}\n\
             TRANSCRIPT:\n{transcript}"
        ),
    };

    BuiltPrompt {
        system: generation_system_prompt(brand_voice),
        user,
    }
}

const REVISE_SYSTEM: &str = "You are a skilled content editor. Focus on polish, not rewriting.";

/// Light-touch polish of an existing artifact.
pub fn revise(
    content_type: ContentType,
    brand_voice: &str,
    guidance: Option<&str>,
    original_text: &str,
) -> BuiltPrompt {
    let voice = if brand_voice.trim().is_empty() {
        "Professional and helpful"
    } else {
        brand_voice.trim()
    };
    let guidance = guidance
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(|g| format!("USER GUIDANCE:\n{g}\n\n"))
        .unwrap_or_default();

    let user = format!(
        "You are a content editor. Polish the following {label} content with a LIGHT TOUCH.\n\n\
         BRAND VOICE:\n{voice}\n\n\
         YOUR TASK:\n\
         - Tighten verbose sentences\n\
         - Improve hooks/openings if weak\n\
         - Strengthen CTAs if unclear\n\
         - Fix awkward phrasing\n\
         - Maintain the original message and structure\n\n\
         DO NOT:\n\
         - Change the core message or argument\n\
         - Add new sections or significantly expand\n\
         - Remove key points\n\
         - Change the overall tone drastically\n\
         - Add emojis unless the original had them\n\n\
         {guidance}\
         Return ONLY the polished content, no explanations.\n\n\
         ORIGINAL CONTENT:\n{original_text}",
        label = content_type.label(),
    );

    BuiltPrompt {
        system: REVISE_SYSTEM.to_string(),
        user,
    }
}

/// Inputs for deriving a brand-voice profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandVoiceInput {
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub style_guide: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub words_to_avoid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandVoicePrompt {
    pub prompt: BuiltPrompt,
    pub max_tokens: u32,
}

fn numbered_examples(examples: &[String]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, ex)| format!("Example {}:\n{}", i + 1, ex))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Returns `None` when there is nothing to analyze.
pub fn brand_voice(input: &BrandVoiceInput) -> Option<BrandVoicePrompt> {
    let examples: Vec<String> = input
        .examples
        .iter()
        .filter(|e| !e.trim().is_empty())
        .cloned()
        .collect();
    let guide = input
        .style_guide
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());

    let mut extras = String::new();
    if let Some(a) = input.target_audience.as_deref().filter(|s| !s.trim().is_empty()) {
        extras.push_str(&format!("Target Audience: {a}\n"));
    }
    if let Some(w) = input.words_to_avoid.as_deref().filter(|s| !s.trim().is_empty()) {
        extras.push_str(&format!("Words/Phrases to Avoid: {w}\n"));
    }

    let (system, user, max_tokens) = match (guide, examples.is_empty()) {
        (None, true) => return None,
        (None, false) => (
            "You are an expert content strategist and brand voice analyst. Your job is to analyze writing samples \
             and create clear, actionable brand voice profiles that can be used to generate consistent content.",
            format!(
                "Analyze the following content examples and create a detailed brand voice profile. This profile will be \
                 used to generate content that matches this writing style.\n\n{}\n\n{extras}\n\
                 Create a brand voice profile that includes:\n\
                 1. **Tone & Personality**: the overall tone and personality traits that come through in the writing.\n\
                 2. **Writing Style**: sentence length, paragraph structure, questions, storytelling, data usage.\n\
                 3. **Vocabulary & Language**: common phrases, terminology, formality, distinctive word choices.\n\
                 4. **Content Structure**: how ideas are organized, headers, bullet points, calls-to-action.\n\
                 5. **Unique Characteristics**: standout elements that make this voice distinctive.\n\n\
                 Write the profile in second person (\"You write in a...\") so it can be used as instructions for \
                 generating future content. Keep it concise but comprehensive (2-3 paragraphs).",
                numbered_examples(&examples)
            ),
            1500,
        ),
        (Some(guide), true) => (
            "You are an expert at analyzing brand style guides and extracting clear, actionable writing rules. Your job \
             is to transform style guide documents into practical instructions that can be followed when creating content.",
            format!(
                "Analyze the following brand style guide and extract the key rules and guidelines into a usable brand \
                 voice profile. This is a STYLE GUIDE containing RULES about how to write, not examples of actual writing.\n\n\
                 STYLE GUIDE:\n{guide}\n\n{extras}\n\
                 Extract and organize the guidelines into a brand voice profile that includes:\n\
                 1. **Tone & Voice Rules**\n\
                 2. **Do's and Don'ts**\n\
                 3. **Language Guidelines**\n\
                 4. **Formatting Rules**\n\
                 5. **Brand-Specific Requirements**\n\n\
                 Write the profile in second person (\"You should...\", \"Always...\", \"Never...\"). Be specific and \
                 actionable. Include all rules from the style guide."
            ),
            2000,
        ),
        (Some(guide), false) => (
            "You are an expert content strategist who specializes in creating comprehensive brand voice profiles. Your \
             job is to combine explicit style guide rules with implicit patterns from writing examples to create \
             detailed, actionable brand voice instructions.",
            format!(
                "Create a comprehensive brand voice profile by combining the RULES from the style guide with observations \
                 from the WRITING EXAMPLES.\n\n\
                 BRAND STYLE GUIDE (contains rules and guidelines):\n{guide}\n\n---\n\n\
                 WRITING EXAMPLES (actual content to analyze):\n{}\n\n{extras}\n\
                 Create a unified brand voice profile that:\n\
                 1. **Incorporates All Style Guide Rules**\n\
                 2. **Adds Observed Patterns** from the examples\n\
                 3. **Resolves Any Conflicts**, prioritizing the style guide\n\
                 4. **Tone & Personality**\n\
                 5. **Practical Writing Instructions**\n\n\
                 Write the profile in second person as instructions for generating future content.",
                numbered_examples(&examples)
            ),
            2500,
        ),
    };

    Some(BrandVoicePrompt {
        prompt: BuiltPrompt {
            system: system.to_string(),
            user,
        },
        max_tokens,
    })
}
