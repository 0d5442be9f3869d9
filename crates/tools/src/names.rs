//! Well-known tool names the completion detector and summarizer consult.

/// Signals that ideation is complete and the deck plan is ready to build.
pub const MARK_READY: &str = "mark_ready";

pub const SET_TOPIC: &str = "set_topic";
pub const CREATE_NOTE: &str = "create_note";
pub const UPDATE_NOTE: &str = "update_note";
pub const DELETE_NOTE: &str = "delete_note";
pub const CONNECT_NOTES: &str = "connect_notes";
pub const MOVE_NOTE: &str = "move_note";
pub const SUGGEST_STRUCTURE: &str = "suggest_structure";

/// Long-running ingestion tools. While any of these ran in a turn, the
/// completion prompt is suppressed so multi-step extraction jobs are not
/// interrupted.
pub const EXTRACTION_TOOLS: [&str; 10] = [
    "extract_transcript",
    "extract_web_content",
    "extract_concept",
    "extract_claim",
    "extract_example",
    "extract_framework",
    "identify_chapters",
    "add_learning_objective",
    "add_exercise",
    "add_quiz_question",
];

/// Whether a tool name belongs to the extraction set.
pub fn is_extraction_tool(name: &str) -> bool {
    EXTRACTION_TOOLS.contains(&name)
}
