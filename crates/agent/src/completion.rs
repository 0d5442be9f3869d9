//! Canvas completion heuristics.
//!
//! Pure functions over a session snapshot and the turn's dispatched tool
//! calls — no model calls, no mutation. The orchestrator evaluates them on
//! a fresh snapshot after the loop ends.

use serde::{Deserialize, Serialize};
use slidesmith_core::session::{LANES, Session, lane_fill_status};
use slidesmith_core::tool::{INTERRUPT_TOOL, RESEARCH_TOOL, ToolDispatch};
use slidesmith_tools::names;

/// Minimum total notes for the partial-fill completion rule.
const MIN_NOTES_FOR_PARTIAL_FILL: usize = 10;

/// Lanes that must be filled for the partial-fill rule.
const MIN_FILLED_LANES: usize = 4;

/// Outcome of the completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// The canvas is structurally complete.
    pub is_complete: bool,
    /// Complete *and* appropriate to surface to the user right now.
    pub should_present: bool,
}

/// Check whether the canvas is complete and whether to show completion UI.
///
/// Complete when the model explicitly marked the deck ready this turn, when
/// every lane has at least one note, or when most lanes are filled and the
/// canvas has grown past a minimum size. Presentation is suppressed while
/// extraction-only ingestion tools ran this turn, so multi-step ingestion
/// jobs are not interrupted by a premature prompt.
pub fn assess(session: &Session, dispatches: &[ToolDispatch]) -> Assessment {
    let marked_ready = dispatches.iter().any(|d| d.name == names::MARK_READY);
    let extraction_ran = dispatches.iter().any(|d| names::is_extraction_tool(&d.name));

    let status = lane_fill_status(&session.notes);
    let filled = status.iter().filter(|l| l.count >= 1).count();
    let all_filled = filled == LANES.len();
    let mostly_filled = filled >= MIN_FILLED_LANES;
    let total_notes = session.notes.len();

    let is_complete = marked_ready
        || all_filled
        || (mostly_filled && total_notes >= MIN_NOTES_FOR_PARTIAL_FILL);

    Assessment {
        is_complete,
        should_present: is_complete && !extraction_ran,
    }
}

/// The completion prompt surfaced to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionPrompt {
    /// One-line summary, phrased as a question-adjacent statement
    pub question: String,
    /// The two primary next steps
    pub primary_actions: Vec<String>,
    /// Secondary suggestions, led by the weakest lane when one exists
    pub secondary_options: Vec<String>,
}

/// Generate a smart completion prompt when ideation is complete.
pub fn completion_prompt(session: &Session, dispatches: &[ToolDispatch]) -> CompletionPrompt {
    let total_notes = session.notes.len();
    let research_passes = dispatches.iter().filter(|d| d.name == RESEARCH_TOOL).count();

    let mut status = lane_fill_status(&session.notes);
    status.sort_by_key(|l| l.count);
    let weakest = status.first();

    let question = format!(
        "I've created {} notes across all sections based on {} research pass{}.",
        total_notes,
        research_passes,
        if research_passes == 1 { "" } else { "es" },
    );

    let primary_actions = vec!["Build the deck".to_string(), "Go to rough draft".to_string()];

    let mut secondary_options = Vec::new();
    if let Some(lane) = weakest {
        if lane.count <= 1 {
            secondary_options.push(format!("Add more to {}", lane.name));
        }
    }
    secondary_options.push("Research a specific angle".to_string());
    secondary_options.push("Do extended research".to_string());

    CompletionPrompt {
        question,
        primary_actions,
        secondary_options,
    }
}

/// Deterministic one-line summary per dispatched tool, for turns where the
/// model produced invocations but no text.
pub fn summarize_dispatches(dispatches: &[ToolDispatch]) -> String {
    let summaries: Vec<String> = dispatches
        .iter()
        .filter(|d| d.name != INTERRUPT_TOOL)
        .map(|d| match d.name.as_str() {
            names::SET_TOPIC => format!(
                "Set topic to: \"{}\"",
                d.args["topic"].as_str().unwrap_or_default()
            ),
            names::CREATE_NOTE => {
                let content = d.args["content"].as_str().unwrap_or_default();
                let preview: String = content.chars().take(40).collect();
                format!("Created note: \"{preview}...\"")
            }
            RESEARCH_TOOL => format!(
                "Researched: {}",
                d.args["query"].as_str().unwrap_or_default()
            ),
            names::UPDATE_NOTE => "Updated note".to_string(),
            names::DELETE_NOTE => "Deleted note".to_string(),
            names::CONNECT_NOTES => "Connected notes".to_string(),
            names::MOVE_NOTE => "Moved note".to_string(),
            names::SUGGEST_STRUCTURE => "Suggested structure".to_string(),
            names::MARK_READY => "Marked deck as ready".to_string(),
            other => format!("Performed {other}"),
        })
        .collect();

    if summaries.is_empty() {
        String::new()
    } else {
        format!("Here's what I did:\n\n{}", summaries.join("\n"))
    }
}
