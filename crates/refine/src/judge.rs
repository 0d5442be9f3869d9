//! The refinement primitives: validate, rewrite, keyword extraction.
//!
//! All three are strictly typed behind the [`PromptJudge`] trait so the
//! engine can be exercised with scripted judges. The production
//! [`ModelJudge`] backs them with one model call each.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slidesmith_core::message::Message;
use slidesmith_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;

use crate::RefineError;
use crate::parse::parse_json_reply;

/// Topic keywords extracted once per run and shared across all items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicKeywords {
    /// Core terms of the topic
    pub keywords: Vec<String>,
    /// Concrete subjects expected to appear in imagery
    #[serde(default)]
    pub visual_subjects: Vec<String>,
    /// Terms that indicate drift away from the topic
    #[serde(default)]
    pub avoid_terms: Vec<String>,
}

impl TopicKeywords {
    /// Fallback when extraction fails: every topic word longer than three
    /// characters becomes a keyword.
    pub fn fallback(topic: &str) -> Self {
        Self {
            keywords: topic
                .split_whitespace()
                .filter(|w| w.len() > 3)
                .map(str::to_string)
                .collect(),
            visual_subjects: Vec::new(),
            avoid_terms: Vec::new(),
        }
    }
}

/// Inputs to one validation call.
#[derive(Debug, Clone)]
pub struct ValidationRequest<'a> {
    pub prompt: &'a str,
    pub topic: &'a str,
    pub title: &'a str,
    pub content: &'a [String],
    pub keywords: &'a TopicKeywords,
}

/// The scored verdict on a candidate prompt.
///
/// `is_valid` is always derived from the score and threshold — never set
/// independently, and never trusted from the model.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub score: u8,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Validation {
    /// Build a validation with `is_valid` derived as `score >= threshold`.
    pub fn scored(score: u8, threshold: u8, issues: Vec<String>, suggestions: Vec<String>) -> Self {
        let score = score.min(100);
        Self {
            score,
            is_valid: score >= threshold,
            issues,
            suggestions,
        }
    }
}

/// Inputs to one rewrite call.
#[derive(Debug, Clone)]
pub struct RewriteRequest<'a> {
    pub prompt: &'a str,
    pub topic: &'a str,
    pub issues: &'a [String],
    /// Style descriptor whose lighting/composition/mood/palette must survive
    pub style: &'a str,
    pub title: &'a str,
    pub content: &'a [String],
}

/// A rewritten candidate with the judge's reasoning.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewrite {
    pub new_prompt: String,
    pub reasoning: String,
}

/// The three refinement primitives.
#[async_trait]
pub trait PromptJudge: Send + Sync {
    /// Extract topic keywords, visual subjects, and avoid-terms.
    async fn extract_keywords(&self, topic: &str) -> Result<TopicKeywords, RefineError>;

    /// Score a candidate prompt against the topic. `threshold` only feeds
    /// the derived `is_valid`; scoring itself is threshold-independent.
    async fn validate(
        &self,
        request: ValidationRequest<'_>,
        threshold: u8,
    ) -> Result<Validation, RefineError>;

    /// Produce a new candidate fixing the reported issues.
    async fn rewrite(&self, request: RewriteRequest<'_>) -> Result<Rewrite, RefineError>;
}

/// The production judge, backed by a model provider.
pub struct ModelJudge {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ModelJudge {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn json_call(&self, prompt: String) -> Result<String, RefineError> {
        let mut request = ProviderRequest::text(self.model.clone(), vec![Message::user(prompt)]);
        request.json_reply = true;
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReply {
    score: u8,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

fn bullet_list(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| format!("- {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl PromptJudge for ModelJudge {
    async fn extract_keywords(&self, topic: &str) -> Result<TopicKeywords, RefineError> {
        let prompt = format!(
            "You are preparing validation context for presentation imagery.\n\n\
             PRESENTATION TOPIC: \"{topic}\"\n\n\
             Extract:\n\
             1. The topic's core keywords\n\
             2. Concrete VISUAL SUBJECTS an on-topic image would show (objects, scenes, settings)\n\
             3. AVOID TERMS: generic imagery that would signal drift away from this topic \
             (e.g. perfume bottles, handbags, stock-photo handshakes)\n\n\
             Return ONLY valid JSON:\n\
             {{\"keywords\": [\"...\"], \"visualSubjects\": [\"...\"], \"avoidTerms\": [\"...\"]}}"
        );
        parse_json_reply(&self.json_call(prompt).await?)
    }

    async fn validate(
        &self,
        request: ValidationRequest<'_>,
        threshold: u8,
    ) -> Result<Validation, RefineError> {
        let content_context = if request.content.is_empty() {
            String::new()
        } else {
            format!("\nSLIDE CONTENT:\n{}", bullet_list(request.content))
        };

        let keyword_context = format!(
            "\nTOPIC KEYWORDS: {}\nEXPECTED VISUAL SUBJECTS: {}\nDRIFT INDICATORS TO PENALIZE: {}",
            request.keywords.keywords.join(", "),
            request.keywords.visual_subjects.join(", "),
            request.keywords.avoid_terms.join(", "),
        );

        let prompt = format!(
            "You are a strict image prompt validator for a presentation generator.\n\
             Your job is to evaluate if this image prompt will generate an image that is \
             VISUALLY RELEVANT to the presentation topic.\n\n\
             PRESENTATION TOPIC: \"{topic}\"\n\
             SLIDE TITLE: \"{title}\"{content_context}{keyword_context}\n\n\
             IMAGE PROMPT TO VALIDATE:\n\"{prompt_text}\"\n\n\
             Score the prompt 0-100 based on these criteria:\n\n\
             1. TOPIC RELEVANCE (40 points max):\n\
                - Does the prompt describe something visually related to \"{topic}\"?\n\
                - Score 0 if it describes completely unrelated items (e.g., perfume bottles \
             for a pet business); score 40 if it directly depicts the topic's subject matter\n\n\
             2. SPECIFICITY (20 points max):\n\
                - Does it describe concrete visual elements rather than abstract concepts?\n\
                - Score 0 for vague prompts like \"elegant design\" with no subject\n\n\
             3. NO GENERIC/UNRELATED ITEMS (20 points max):\n\
                - Does the prompt AVOID generic luxury items unrelated to the topic?\n\
                - Watch for: perfume bottles, fashion items, handbags, watches (unless the \
             topic is about those)\n\n\
             4. NO TEXT/BRANDS (20 points max):\n\
                - Does the prompt AVOID describing text, words, brand names, logos, or watermarks?\n\n\
             Return ONLY valid JSON:\n\
             {{\"score\": number, \"issues\": [\"specific problems found\"], \
             \"suggestions\": [\"how to fix them\"]}}",
            topic = request.topic,
            title = request.title,
            prompt_text = request.prompt,
        );

        let reply: ValidationReply = parse_json_reply(&self.json_call(prompt).await?)?;
        Ok(Validation::scored(
            reply.score,
            threshold,
            reply.issues,
            reply.suggestions,
        ))
    }

    async fn rewrite(&self, request: RewriteRequest<'_>) -> Result<Rewrite, RefineError> {
        let content_context = if request.content.is_empty() {
            String::new()
        } else {
            format!("\nSLIDE CONTENT (for context):\n{}", bullet_list(request.content))
        };

        let issues = if request.issues.is_empty() {
            "- Prompt not relevant to topic".to_string()
        } else {
            bullet_list(request.issues)
        };

        let prompt = format!(
            "You are an expert image prompt engineer. Your task is to REWRITE an image \
             prompt that failed validation.\n\n\
             PRESENTATION TOPIC: \"{topic}\"\n\
             SLIDE TITLE: \"{title}\"{content_context}\n\n\
             VISUAL STYLE TO MAINTAIN:\n\"{style}\"\n\n\
             ORIGINAL (FAILED) PROMPT:\n\"{prompt_text}\"\n\n\
             ISSUES TO FIX:\n{issues}\n\n\
             REQUIREMENTS:\n\
             1. The new prompt MUST describe something VISUALLY RELATED to \"{topic}\"\n\
             2. MAINTAIN the visual style aesthetic: keep the same lighting, composition \
             approach, mood, and color palette hints\n\
             3. DO NOT describe any text, words, letters, brand names, logos, watermarks, \
             or UI elements with readable content\n\
             4. BE SPECIFIC about the subject matter - instead of \"elegant product\" say \
             \"elegant pet collar with gold buckle\"\n\n\
             Return ONLY valid JSON:\n\
             {{\"newPrompt\": \"the complete rewritten image prompt\", \
             \"reasoning\": \"brief explanation of what you changed and why\"}}",
            topic = request.topic,
            title = request.title,
            style = request.style,
            prompt_text = request.prompt,
        );

        parse_json_reply(&self.json_call(prompt).await?)
    }
}
