//! The per-item refinement loop and its parallel fan-out.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use slidesmith_config::RefineConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::judge::{
    PromptJudge, RewriteRequest, TopicKeywords, Validation, ValidationRequest,
};

/// Engine options. The iteration budget is configuration, not a constant;
/// callers tune it per deck size and latency budget.
#[derive(Debug, Clone)]
pub struct RefineOptions {
    /// Minimum score for a candidate to be accepted (non-strict `>=`)
    pub acceptance_threshold: u8,
    /// Validate/rewrite iterations per item
    pub max_iterations: u32,
    /// Fan items out in parallel
    pub parallel: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            acceptance_threshold: 70,
            max_iterations: 3,
            parallel: true,
        }
    }
}

impl From<&RefineConfig> for RefineOptions {
    fn from(config: &RefineConfig) -> Self {
        Self {
            acceptance_threshold: config.acceptance_threshold.min(100),
            max_iterations: config.max_iterations,
            parallel: config.parallel,
        }
    }
}

/// One slide's refinement input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideBrief {
    pub title: String,
    pub content: Vec<String>,
    pub initial_prompt: String,
}

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineAction {
    ExtractKeywords,
    Validate,
    Rewrite,
    Finalize,
}

/// A structured record of one engine step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineLog {
    /// Item index; `None` for run-level steps (keyword extraction)
    pub item: Option<usize>,
    pub iteration: u32,
    pub action: RefineAction,
    pub input: String,
    pub output: String,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Result for a single item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub index: usize,
    pub original_prompt: String,
    pub final_prompt: String,
    pub final_score: u8,
    pub iterations: u32,
    /// Whether any rewrite happened
    pub refined: bool,
    pub logs: Vec<RefineLog>,
}

/// The full run result. `refined_prompts` preserves 1:1 index
/// correspondence with the input items regardless of per-item outcome.
#[derive(Debug, Clone)]
pub struct RefineReport {
    pub refined_prompts: Vec<String>,
    pub logs: Vec<RefineLog>,
    pub outcomes: Vec<ItemOutcome>,
    pub items_refined: usize,
    pub total_iterations: u32,
}

/// The refinement engine.
pub struct RefineEngine {
    judge: Arc<dyn PromptJudge>,
    options: RefineOptions,
}

impl RefineEngine {
    pub fn new(judge: Arc<dyn PromptJudge>) -> Self {
        Self {
            judge,
            options: RefineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RefineOptions) -> Self {
        self.options = options;
        self
    }

    /// Refine every item's image prompt against the topic.
    ///
    /// Items are independent: they share only the read-only topic keywords,
    /// and one item exhausting its budget never blocks or delays another.
    pub async fn run(&self, topic: &str, style: &str, items: &[SlideBrief]) -> RefineReport {
        info!(
            items = items.len(),
            threshold = self.options.acceptance_threshold,
            max_iterations = self.options.max_iterations,
            parallel = self.options.parallel,
            "Refinement run starting"
        );

        let mut logs = Vec::new();

        // Extract topic keywords once; every item validates against the
        // same context so judgments stay consistent.
        let started = Instant::now();
        let keywords = match self.judge.extract_keywords(topic).await {
            Ok(kw) => {
                logs.push(RefineLog {
                    item: None,
                    iteration: 0,
                    action: RefineAction::ExtractKeywords,
                    input: topic.to_string(),
                    output: serde_json::to_string(&kw).unwrap_or_default(),
                    reasoning: format!(
                        "Extracted {} keywords, {} visual subjects",
                        kw.keywords.len(),
                        kw.visual_subjects.len()
                    ),
                    timestamp: Utc::now(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                kw
            }
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, falling back to topic words");
                let kw = TopicKeywords::fallback(topic);
                logs.push(RefineLog {
                    item: None,
                    iteration: 0,
                    action: RefineAction::ExtractKeywords,
                    input: topic.to_string(),
                    output: serde_json::to_string(&kw).unwrap_or_default(),
                    reasoning: format!("Extraction failed ({e}), using topic words"),
                    timestamp: Utc::now(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                kw
            }
        };

        let outcomes: Vec<ItemOutcome> = if self.options.parallel {
            join_all(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.process_item(index, item, topic, style, &keywords)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                results.push(self.process_item(index, item, topic, style, &keywords).await);
            }
            results
        };

        let refined_prompts = outcomes.iter().map(|o| o.final_prompt.clone()).collect();
        let items_refined = outcomes.iter().filter(|o| o.refined).count();
        let total_iterations = outcomes.iter().map(|o| o.iterations).sum();
        for outcome in &outcomes {
            logs.extend(outcome.logs.iter().cloned());
        }

        info!(items_refined, total_iterations, "Refinement run complete");

        RefineReport {
            refined_prompts,
            logs,
            outcomes,
            items_refined,
            total_iterations,
        }
    }

    /// Refine one prompt (useful for regeneration of a single slide).
    pub async fn refine_single(
        &self,
        prompt: &str,
        topic: &str,
        style: &str,
        title: &str,
        content: &[String],
    ) -> (String, Vec<RefineLog>) {
        let items = vec![SlideBrief {
            title: title.to_string(),
            content: content.to_vec(),
            initial_prompt: prompt.to_string(),
        }];
        let mut report = self.run(topic, style, &items).await;
        (report.refined_prompts.remove(0), report.logs)
    }

    /// The per-item validate/rewrite loop.
    ///
    /// Infallible: every primitive failure is recovered locally, so one
    /// item's trouble cannot poison its siblings in the fan-out.
    async fn process_item(
        &self,
        index: usize,
        item: &SlideBrief,
        topic: &str,
        style: &str,
        keywords: &TopicKeywords,
    ) -> ItemOutcome {
        let threshold = self.options.acceptance_threshold;
        let mut logs = Vec::new();
        let mut current = item.initial_prompt.clone();
        // Best scored candidate seen so far; exhaustion falls back to it.
        let mut best: Option<(String, u8)> = None;
        let mut final_score = 0u8;
        let mut iteration = 0u32;
        let mut refined = false;
        let mut finalized = false;

        while iteration < self.options.max_iterations {
            let started = Instant::now();
            let validation = match self
                .judge
                .validate(
                    ValidationRequest {
                        prompt: &current,
                        topic,
                        title: &item.title,
                        content: &item.content,
                        keywords,
                    },
                    threshold,
                )
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!(item = index, error = %e, "Validation failed, treating prompt as needing work");
                    Validation::scored(
                        30,
                        threshold,
                        vec!["Validation request failed".into()],
                        vec!["Try rewriting the prompt".into()],
                    )
                }
            };

            logs.push(RefineLog {
                item: Some(index),
                iteration,
                action: RefineAction::Validate,
                input: current.clone(),
                output: serde_json::to_string(&validation).unwrap_or_default(),
                reasoning: format!("Score: {}/100", validation.score),
                timestamp: Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
            });

            final_score = validation.score;
            if best.as_ref().is_none_or(|(_, s)| validation.score > *s) {
                best = Some((current.clone(), validation.score));
            }

            if validation.is_valid {
                logs.push(RefineLog {
                    item: Some(index),
                    iteration,
                    action: RefineAction::Finalize,
                    input: current.clone(),
                    output: current.clone(),
                    reasoning: format!("Accepted with score {}/100", validation.score),
                    timestamp: Utc::now(),
                    duration_ms: 0,
                });
                finalized = true;
                break;
            }

            refined = true;
            let rewrite_started = Instant::now();
            match self
                .judge
                .rewrite(RewriteRequest {
                    prompt: &current,
                    topic,
                    issues: &validation.issues,
                    style,
                    title: &item.title,
                    content: &item.content,
                })
                .await
            {
                Ok(rewrite) => {
                    debug!(item = index, iteration, "Rewrote candidate");
                    logs.push(RefineLog {
                        item: Some(index),
                        iteration,
                        action: RefineAction::Rewrite,
                        input: current.clone(),
                        output: rewrite.new_prompt.clone(),
                        reasoning: rewrite.reasoning,
                        timestamp: Utc::now(),
                        duration_ms: rewrite_started.elapsed().as_millis() as u64,
                    });
                    current = rewrite.new_prompt;
                }
                Err(e) => {
                    warn!(item = index, error = %e, "Rewrite failed, keeping best candidate");
                    let (prompt, score) =
                        best.clone().unwrap_or((current.clone(), final_score));
                    current = prompt;
                    final_score = score;
                    logs.push(RefineLog {
                        item: Some(index),
                        iteration,
                        action: RefineAction::Finalize,
                        input: current.clone(),
                        output: current.clone(),
                        reasoning: "Rewrite failed, using best scored candidate".into(),
                        timestamp: Utc::now(),
                        duration_ms: rewrite_started.elapsed().as_millis() as u64,
                    });
                    finalized = true;
                    break;
                }
            }

            iteration += 1;
        }

        // Budget exhausted without passing: accept the best scored
        // candidate, which is not necessarily the last one produced.
        if !finalized {
            let (prompt, score) = best.clone().unwrap_or((current.clone(), final_score));
            current = prompt;
            final_score = score;
            logs.push(RefineLog {
                item: Some(index),
                iteration,
                action: RefineAction::Finalize,
                input: current.clone(),
                output: current.clone(),
                reasoning: format!(
                    "Max iterations ({}) reached with score {}/100",
                    self.options.max_iterations, final_score
                ),
                timestamp: Utc::now(),
                duration_ms: 0,
            });
        }

        ItemOutcome {
            index,
            original_prompt: item.initial_prompt.clone(),
            final_prompt: current,
            final_score,
            iterations: iteration + 1,
            refined,
            logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RefineError;
    use crate::judge::Rewrite;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A scripted judge: per-prompt scores and issues, rewrites append "+".
    #[derive(Default)]
    struct StubJudge {
        scores: HashMap<String, u8>,
        issues: HashMap<String, Vec<String>>,
        default_score: u8,
        fail_keywords: bool,
        fail_rewrite_on: Option<String>,
        validate_calls: AtomicU32,
        rewrite_calls: AtomicU32,
        keyword_calls: AtomicU32,
    }

    impl StubJudge {
        fn passing() -> Self {
            Self {
                default_score: 90,
                ..Default::default()
            }
        }

        fn with_score(mut self, prompt: &str, score: u8) -> Self {
            self.scores.insert(prompt.into(), score);
            self
        }

        fn with_issue(mut self, prompt: &str, issue: &str) -> Self {
            self.issues.entry(prompt.into()).or_default().push(issue.into());
            self
        }
    }

    #[async_trait]
    impl PromptJudge for StubJudge {
        async fn extract_keywords(&self, topic: &str) -> Result<TopicKeywords, RefineError> {
            self.keyword_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_keywords {
                return Err(RefineError::MalformedReply("scripted failure".into()));
            }
            Ok(TopicKeywords {
                keywords: topic.split_whitespace().map(str::to_string).collect(),
                visual_subjects: vec!["subject".into()],
                avoid_terms: vec![],
            })
        }

        async fn validate(
            &self,
            request: ValidationRequest<'_>,
            threshold: u8,
        ) -> Result<Validation, RefineError> {
            self.validate_calls.fetch_add(1, Ordering::Relaxed);
            let score = *self
                .scores
                .get(request.prompt)
                .unwrap_or(&self.default_score);
            let issues = self.issues.get(request.prompt).cloned().unwrap_or_default();
            Ok(Validation::scored(score, threshold, issues, vec![]))
        }

        async fn rewrite(&self, request: RewriteRequest<'_>) -> Result<Rewrite, RefineError> {
            self.rewrite_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_rewrite_on.as_deref() == Some(request.prompt) {
                return Err(RefineError::MalformedReply("scripted rewrite failure".into()));
            }
            Ok(Rewrite {
                new_prompt: format!("{}+", request.prompt),
                reasoning: format!("fixed: {}", request.issues.join("; ")),
            })
        }
    }

    fn briefs(prompts: &[&str]) -> Vec<SlideBrief> {
        prompts
            .iter()
            .enumerate()
            .map(|(i, p)| SlideBrief {
                title: format!("Slide {i}"),
                content: vec![],
                initial_prompt: p.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn passing_items_accept_on_first_validation() {
        let judge = Arc::new(StubJudge::passing());
        let engine = RefineEngine::new(judge.clone());
        let items = briefs(&["good prompt"]);

        let report = engine.run("topic", "style", &items).await;

        assert_eq!(report.refined_prompts, vec!["good prompt".to_string()]);
        assert_eq!(report.items_refined, 0);
        assert_eq!(judge.validate_calls.load(Ordering::Relaxed), 1);
        assert_eq!(judge.rewrite_calls.load(Ordering::Relaxed), 0);
        // Validation of an accepted candidate is read-only: nothing beyond
        // the judge calls happened, and the prompt is byte-identical.
        assert_eq!(report.outcomes[0].final_score, 90);
        assert!(
            report
                .logs
                .iter()
                .any(|l| l.action == RefineAction::Finalize)
        );
    }

    #[tokio::test]
    async fn one_exhausted_item_does_not_affect_siblings() {
        // Scenario D: five items, one scores 40 forever with a budget of 2.
        let judge = Arc::new(
            StubJudge::passing()
                .with_score("bad", 40)
                .with_score("bad+", 40)
                .with_score("bad++", 40)
                .with_issue("bad", "off-topic imagery"),
        );
        let engine = RefineEngine::new(judge.clone()).with_options(RefineOptions {
            acceptance_threshold: 70,
            max_iterations: 2,
            parallel: true,
        });
        let items = briefs(&["a", "b", "bad", "c", "d"]);

        let report = engine.run("topic", "style", &items).await;

        // Output length and order always match the input
        assert_eq!(report.refined_prompts.len(), 5);
        assert_eq!(report.refined_prompts[0], "a");
        assert_eq!(report.refined_prompts[3], "c");
        assert_eq!(report.refined_prompts[4], "d");
        // The exhausted item kept its best scored candidate (all scored 40,
        // so the first seen wins) and logged a finalize entry.
        assert_eq!(report.refined_prompts[2], "bad");
        let bad_logs: Vec<_> = report
            .logs
            .iter()
            .filter(|l| l.item == Some(2))
            .collect();
        let finalize = bad_logs
            .iter()
            .find(|l| l.action == RefineAction::Finalize)
            .expect("finalize entry for the exhausted item");
        assert!(finalize.reasoning.contains("Max iterations"));
        assert_eq!(report.items_refined, 1);
    }

    #[tokio::test]
    async fn exhaustion_accepts_best_seen_not_last() {
        // Scores: initial 40, first rewrite 60, second rewrite 50. The best
        // candidate is the middle one, not the last produced.
        let judge = Arc::new(
            StubJudge::default()
                .with_score("p", 40)
                .with_score("p+", 60)
                .with_score("p++", 50),
        );
        let engine = RefineEngine::new(judge).with_options(RefineOptions {
            acceptance_threshold: 70,
            max_iterations: 3,
            parallel: false,
        });

        let report = engine.run("topic", "style", &briefs(&["p"])).await;

        assert_eq!(report.refined_prompts[0], "p+");
        assert_eq!(report.outcomes[0].final_score, 60);
        assert!(report.outcomes[0].refined);
    }

    #[tokio::test]
    async fn rewritten_candidate_is_validated_not_the_original() {
        // The rewrite fixes the flagged issue; the next validation sees the
        // new candidate and must not re-report it.
        let judge = Arc::new(
            StubJudge::passing()
                .with_score("branded", 50)
                .with_issue("branded", "mentions a brand logo"),
        );
        let engine = RefineEngine::new(judge);

        let report = engine.run("topic", "style", &briefs(&["branded"])).await;

        // Second validate entry targets the rewritten prompt and is clean
        let validates: Vec<_> = report
            .logs
            .iter()
            .filter(|l| l.action == RefineAction::Validate)
            .collect();
        assert_eq!(validates.len(), 2);
        assert_eq!(validates[0].input, "branded");
        assert!(validates[0].output.contains("brand logo"));
        assert_eq!(validates[1].input, "branded+");
        assert!(!validates[1].output.contains("brand logo"));
        assert_eq!(report.refined_prompts[0], "branded+");
    }

    #[tokio::test]
    async fn rewrite_failure_finalizes_with_best_candidate() {
        let judge = Arc::new(StubJudge {
            default_score: 40,
            fail_rewrite_on: Some("p".into()),
            ..Default::default()
        });
        let engine = RefineEngine::new(judge);

        let report = engine.run("topic", "style", &briefs(&["p"])).await;

        assert_eq!(report.refined_prompts[0], "p");
        let finalize = report
            .logs
            .iter()
            .find(|l| l.action == RefineAction::Finalize)
            .unwrap();
        assert!(finalize.reasoning.contains("Rewrite failed"));
    }

    #[tokio::test]
    async fn keyword_failure_falls_back_to_topic_words() {
        let judge = Arc::new(StubJudge {
            default_score: 90,
            fail_keywords: true,
            ..Default::default()
        });
        let engine = RefineEngine::new(judge);

        let report = engine
            .run("Dubai real estate", "style", &briefs(&["p"]))
            .await;

        let extract = report
            .logs
            .iter()
            .find(|l| l.action == RefineAction::ExtractKeywords)
            .unwrap();
        assert!(extract.item.is_none());
        assert!(extract.reasoning.contains("Extraction failed"));
        assert!(extract.output.contains("Dubai"));
        // The run still completes normally
        assert_eq!(report.refined_prompts.len(), 1);
    }

    #[tokio::test]
    async fn sequential_mode_matches_parallel_output() {
        let items = briefs(&["a", "b", "c"]);
        let parallel = RefineEngine::new(Arc::new(StubJudge::passing()))
            .run("topic", "style", &items)
            .await;
        let sequential = RefineEngine::new(Arc::new(StubJudge::passing()))
            .with_options(RefineOptions {
                parallel: false,
                ..Default::default()
            })
            .run("topic", "style", &items)
            .await;

        assert_eq!(parallel.refined_prompts, sequential.refined_prompts);
        assert_eq!(parallel.total_iterations, sequential.total_iterations);
    }

    #[tokio::test]
    async fn refine_single_wraps_one_item() {
        let engine = RefineEngine::new(Arc::new(StubJudge::passing()));
        let (prompt, logs) = engine
            .refine_single("solo prompt", "topic", "style", "Title", &[])
            .await;
        assert_eq!(prompt, "solo prompt");
        assert!(!logs.is_empty());
    }

    #[test]
    fn options_from_config() {
        let config = RefineConfig {
            acceptance_threshold: 80,
            max_iterations: 5,
            parallel: false,
        };
        let options = RefineOptions::from(&config);
        assert_eq!(options.acceptance_threshold, 80);
        assert_eq!(options.max_iterations, 5);
        assert!(!options.parallel);
    }
}
