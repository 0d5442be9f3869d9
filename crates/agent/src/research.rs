//! Research gateway — selects between two research backends and
//! normalizes their output.
//!
//! - **Baseline**: one structured-JSON model call through the session's own
//!   provider. Cheap, always available.
//! - **Enhanced**: a live search-augmented OpenAI-compatible backend (xAI
//!   style) with web and social search tools, returning citations,
//!   sentiment, metrics, and a synthesis narrative, and emitting
//!   incremental progress events on the bus.
//!
//! Research is best-effort: every failure on either backend recovers to
//! empty findings and never aborts the conversation loop. Backend selection
//! is re-resolved on every invocation.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use slidesmith_config::ResearchConfig;
use slidesmith_core::event::{DomainEvent, EventBus, ResearchStatus};
use slidesmith_core::message::Message;
use slidesmith_core::provider::{Provider, ProviderRequest, ToolDefinition};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use slidesmith_providers::OpenAiCompatProvider;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("valid url regex"));
static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$[\d.,]+[BMK]?").expect("valid currency regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.]+%").expect("valid percent regex"));

/// A normalized research finding returned to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub snippet: String,
    /// Why this is relevant (baseline) or the finding category (enhanced)
    pub relevance: String,
}

/// Category of an enhanced finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Market,
    Trend,
    Competitor,
    Expert,
    Social,
}

impl FindingKind {
    fn label(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Trend => "trend",
            Self::Competitor => "competitor",
            Self::Expert => "expert",
            Self::Social => "social",
        }
    }
}

/// A source citation attached to an enhanced finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub url: String,
    pub title: String,
    pub source: String,
    /// Estimated source reliability, 1-5
    pub reliability: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// A metric extracted from a finding ("$45.2B", "15%").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

/// A finding with the full enhanced-backend context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedFinding {
    pub kind: FindingKind,
    pub summary: String,
    pub citation: Citation,
    pub sentiment: Sentiment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metric>,
}

/// The normalized result of one research invocation.
#[derive(Debug, Clone, Default)]
pub struct ResearchOutcome {
    pub findings: Vec<Finding>,
    pub enhanced: bool,
    pub enhanced_findings: Vec<EnhancedFinding>,
    pub citations: Vec<Citation>,
    pub synthesis: Option<String>,
}

impl ResearchOutcome {
    /// The value fed back to the model as the tool result.
    pub fn model_payload(&self, query: &str) -> serde_json::Value {
        let mut payload = json!({
            "success": true,
            "query": query,
            "enhanced": self.enhanced,
            "findings": self.findings,
        });
        if let Some(synthesis) = &self.synthesis {
            payload["synthesis"] = json!(synthesis);
        }
        payload
    }

    /// The value written into session state through the default executor
    /// path: the original call args plus the raw backend result, so later
    /// tool calls in the same run can reference it.
    pub fn session_payload(&self, args: &serde_json::Value) -> serde_json::Value {
        let mut payload = args.clone();
        if !payload.is_object() {
            payload = json!({});
        }
        payload["results"] = json!(self.findings);
        payload["enhanced"] = json!(self.enhanced);
        if self.enhanced {
            payload["citations"] = json!(self.citations);
            payload["rich_findings"] = json!(self.enhanced_findings);
        }
        payload
    }
}

/// The research gateway.
pub struct ResearchGateway {
    provider: Arc<dyn Provider>,
    model: String,
    config: ResearchConfig,
    enhanced: Option<Arc<dyn Provider>>,
    event_bus: Arc<EventBus>,
}

impl ResearchGateway {
    /// Build a gateway over the session's baseline provider. The enhanced
    /// client is constructed when the config carries a credential; whether
    /// it is *used* is decided on every invocation.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: ResearchConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let enhanced: Option<Arc<dyn Provider>> = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|key| {
                Arc::new(OpenAiCompatProvider::new(
                    "xai",
                    config.base_url.clone(),
                    key,
                )) as Arc<dyn Provider>
            });

        Self {
            provider,
            model: model.into(),
            config,
            enhanced,
            event_bus,
        }
    }

    /// Substitute the enhanced backend (test seam).
    pub fn with_enhanced_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.enhanced = Some(provider);
        self
    }

    /// Run one research pass. Never fails — every backend error recovers to
    /// an empty outcome.
    pub async fn research(&self, query: &str, purpose: &str) -> ResearchOutcome {
        // Backend selection happens here, per invocation
        if self.config.enhanced && self.enhanced.is_some() {
            self.enhanced_research(query).await
        } else {
            self.baseline_research(query, purpose).await
        }
    }

    async fn baseline_research(&self, query: &str, purpose: &str) -> ResearchOutcome {
        let prompt = format!(
            "You are researching material for a presentation.\n\n\
             QUERY: \"{query}\"\n\
             PURPOSE: {purpose}\n\n\
             Produce 3-5 concise findings a presenter could cite. Return ONLY valid JSON:\n\
             {{\"findings\": [{{\"title\": \"...\", \"snippet\": \"1-2 sentence summary\", \
             \"relevance\": \"why this helps the presentation\"}}]}}"
        );

        let mut request =
            ProviderRequest::text(self.model.clone(), vec![Message::user(prompt)]);
        request.json_reply = true;

        match self.provider.complete(request).await {
            Ok(response) => match parse_baseline_reply(&response.message.content) {
                Ok(findings) => {
                    debug!(count = findings.len(), "Baseline research findings");
                    ResearchOutcome {
                        findings,
                        ..Default::default()
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Baseline research reply unparseable, returning no findings");
                    ResearchOutcome::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "Baseline research call failed, returning no findings");
                ResearchOutcome::default()
            }
        }
    }

    async fn enhanced_research(&self, query: &str) -> ResearchOutcome {
        let provider = self
            .enhanced
            .as_ref()
            .expect("enhanced_research requires a backend")
            .clone();

        self.progress(ResearchStatus::Searching, "Starting research...");

        let mut request = ProviderRequest::text(
            self.config.model.clone(),
            vec![
                Message::system(
                    "You are a research analyst specializing in finding accurate, up-to-date \
                     information. Always cite your sources with URLs. Be thorough but concise. \
                     Focus on actionable insights.",
                ),
                Message::user(build_enhanced_prompt(query, &self.config)),
            ],
        );
        request.tools = search_tools(&self.config);

        match provider.complete(request).await {
            Ok(response) => {
                self.progress(ResearchStatus::Processing, "Analyzing findings...");

                let outcome = parse_enhanced_reply(&response.message.content);
                self.progress(
                    ResearchStatus::Complete,
                    format!("Found {} relevant findings", outcome.findings.len()),
                );
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Enhanced research failed, returning no findings");
                self.progress(ResearchStatus::Error, e.to_string());
                ResearchOutcome::default()
            }
        }
    }

    fn progress(&self, status: ResearchStatus, message: impl Into<String>) {
        self.event_bus.publish(DomainEvent::ResearchProgress {
            backend: "xai".into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }
}

/// Search tool declarations for the enhanced backend.
fn search_tools(config: &ResearchConfig) -> Vec<ToolDefinition> {
    let mut tools = vec![ToolDefinition {
        name: "web_search".into(),
        description: "Search the web for real-time information, statistics, and news".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" }
            },
            "required": ["query"]
        }),
    }];

    if config.include_social_search {
        tools.push(ToolDefinition {
            name: "x_search".into(),
            description: "Search X/Twitter for trends, sentiment, and social proof".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query for X/Twitter" }
                },
                "required": ["query"]
            }),
        });
    }

    tools
}

/// Build the enhanced research prompt from the configured preferences.
fn build_enhanced_prompt(query: &str, config: &ResearchConfig) -> String {
    let mut sections = vec![
        format!("Research the following topic thoroughly: \"{query}\""),
        "\nProvide findings in these specific categories:".to_string(),
    ];

    if config.include_stats {
        sections.push(
            "- MARKET DATA: Find specific market statistics, growth rates, market size, and projections with sources".into(),
        );
    }
    if config.include_social_search {
        sections.push(
            "- TRENDS: Search X/Twitter for current discussions, sentiment, and trending topics related to this".into(),
        );
    }
    if config.include_competitors {
        sections.push(
            "- COMPETITORS: Identify key players, companies, and competitors in this space".into(),
        );
    }
    if config.include_experts {
        sections.push(
            "- EXPERT OPINIONS: Find quotes, case studies, and expert perspectives".into(),
        );
    }

    sections.push("\nFor each finding:".into());
    sections.push("1. Provide a clear, concise summary".into());
    sections.push("2. Include the source URL and title".into());
    sections.push("3. Rate the source reliability (1-5 stars)".into());
    sections.push("4. Note if the sentiment is positive, negative, or neutral".into());

    sections.join("\n")
}

#[derive(Deserialize)]
struct BaselineReply {
    findings: Vec<Finding>,
}

/// Parse the baseline backend's JSON reply, tolerating markdown fences.
fn parse_baseline_reply(content: &str) -> Result<Vec<Finding>, serde_json::Error> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let reply: BaselineReply = serde_json::from_str(cleaned)?;
    Ok(reply.findings)
}

/// Parse the enhanced backend's free-text reply into structured findings.
///
/// The backend returns sectioned prose with inline URLs; each cited line
/// under a recognized section becomes a finding with a citation.
fn parse_enhanced_reply(content: &str) -> ResearchOutcome {
    let mut findings = Vec::new();
    let mut enhanced_findings = Vec::new();
    let mut citations = Vec::new();
    let mut current_kind: Option<FindingKind> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(kind) = detect_section(trimmed) {
            current_kind = Some(kind);
        }

        let (Some(url_match), Some(kind)) = (URL_RE.find(trimmed), current_kind) else {
            continue;
        };
        if trimmed.len() <= 20 {
            continue;
        }

        let url = url_match.as_str().to_string();
        let citation = Citation {
            id: format!("citation-{}", citations.len() + 1),
            title: title_from_context(trimmed, &url),
            source: source_from_url(&url),
            reliability: estimate_reliability(&url),
            url,
        };
        citations.push(citation.clone());

        let summary = clean_summary(trimmed);
        findings.push(Finding {
            title: citation.title.clone(),
            snippet: summary.clone(),
            relevance: kind.label().to_string(),
        });
        enhanced_findings.push(EnhancedFinding {
            kind,
            sentiment: detect_sentiment(trimmed),
            metrics: extract_metrics(trimmed),
            summary,
            citation,
        });
    }

    // Nothing structured found: fall back to one general finding so the
    // model still sees the substance of the reply.
    if findings.is_empty() && content.len() > 50 {
        let preview: String = content.chars().take(300).collect();
        let summary = if content.len() > 300 {
            format!("{preview}...")
        } else {
            preview
        };
        findings.push(Finding {
            title: "Research Summary".into(),
            snippet: summary,
            relevance: FindingKind::Market.label().into(),
        });
    }

    ResearchOutcome {
        findings,
        enhanced: true,
        enhanced_findings,
        citations,
        synthesis: Some(content.to_string()),
    }
}

fn detect_section(line: &str) -> Option<FindingKind> {
    if line.contains("MARKET") || line.contains("Statistics") || line.contains("Market") {
        Some(FindingKind::Market)
    } else if line.contains("TREND") || line.contains("Twitter") || line.contains("X ") {
        Some(FindingKind::Trend)
    } else if line.contains("COMPETITOR") || line.contains("Players") || line.contains("Companies")
    {
        Some(FindingKind::Competitor)
    } else if line.contains("EXPERT") || line.contains("Opinion") || line.contains("Quote") {
        Some(FindingKind::Expert)
    } else if line.contains("SOCIAL") || line.contains("Sentiment") {
        Some(FindingKind::Social)
    } else {
        None
    }
}

/// Take the first sentence-like fragment around the URL as a title.
fn title_from_context(text: &str, url: &str) -> String {
    let without_url = text.replace(url, "");
    let trimmed = without_url.trim();

    let start = trimmed.find(|c: char| c.is_uppercase());
    let title = match start {
        Some(idx) => {
            let rest = &trimmed[idx..];
            let end = rest
                .find(['.', '!', '?'])
                .map(|p| p + 1)
                .unwrap_or(rest.len());
            &rest[..end]
        }
        None => "",
    };

    if title.is_empty() {
        "Research Finding".into()
    } else {
        title.chars().take(100).collect()
    }
}

/// Extract a capitalized source name from a URL's domain.
fn source_from_url(url: &str) -> String {
    let host = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_start_matches("www.");

    match host.split('.').next() {
        Some(domain) if !domain.is_empty() => {
            let mut chars = domain.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => "Web".into(),
            }
        }
        _ => "Web".into(),
    }
}

/// Estimate reliability 1-5 from the domain.
fn estimate_reliability(url: &str) -> u8 {
    const RELIABLE: [&str; 9] = [
        "statista", "bloomberg", "reuters", "forbes", "wsj", "nytimes", "bbc", "nature", "science",
    ];
    const GOOD: [&str; 6] = [
        "techcrunch", "wired", "theverge", "arstechnica", "medium", "linkedin",
    ];

    let host = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if host.is_empty() {
        return 2;
    }
    if RELIABLE.iter().any(|d| host.contains(d)) {
        return 5;
    }
    if host.ends_with(".gov") || host.ends_with(".edu") {
        return 5;
    }
    if GOOD.iter().any(|d| host.contains(d)) {
        return 4;
    }
    3
}

/// Strip URLs and markdown noise, collapse whitespace, cap the length.
fn clean_summary(text: &str) -> String {
    let without_urls = URL_RE.replace_all(text, "");
    let without_stars = without_urls.replace('*', "");
    let collapsed = without_stars.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(200).collect()
}

fn detect_sentiment(text: &str) -> Sentiment {
    const POSITIVE: [&str; 7] = [
        "growth", "increase", "success", "leading", "best", "innovative", "breakthrough",
    ];
    const NEGATIVE: [&str; 7] = [
        "decline", "decrease", "fail", "worst", "struggling", "crisis", "problem",
    ];

    let lower = text.to_lowercase();
    let positive = POSITIVE.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE.iter().filter(|w| lower.contains(*w)).count();

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

/// Pull a currency value or percentage out of a finding line.
fn extract_metrics(text: &str) -> Option<Metric> {
    let currency = CURRENCY_RE.find(text).map(|m| m.as_str().to_string());
    let percent = PERCENT_RE.find(text).map(|m| m.as_str().to_string());

    match (currency, percent) {
        (Some(value), change) => Some(Metric {
            value,
            label: "Market Value".into(),
            change,
        }),
        (None, Some(value)) => Some(Metric {
            value,
            label: "Growth Rate".into(),
            change: None,
        }),
        (None, None) => None,
    }
}
