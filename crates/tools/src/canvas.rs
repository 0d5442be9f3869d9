//! Canvas tool descriptors, in the function-calling format providers expect.

use serde_json::json;
use slidesmith_core::provider::ToolDefinition;
use slidesmith_core::tool::{INTERRUPT_TOOL, RESEARCH_TOOL};

use crate::names;

/// The full canvas tool catalog sent to the model on every turn.
pub fn canvas_catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: names::SET_TOPIC.into(),
            description: "Set the presentation topic for the session. Call this first when the user provides or changes the topic.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "The presentation topic, phrased as the user would pitch it."
                    }
                },
                "required": ["topic"]
            }),
        },
        ToolDefinition {
            name: names::CREATE_NOTE.into(),
            description: "Create a new sticky note on the ideation canvas. Use this to add ideas, research findings, or suggestions to the flowchart.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The text content of the note. Keep it concise - 1-3 sentences max."
                    },
                    "lane": {
                        "type": "string",
                        "enum": ["hook", "problem", "solution", "proof", "cta"],
                        "description": "Which swimlane to place the note in. Hook=attention grabber, Problem=pain points, Solution=your answer, Proof=evidence/trust, CTA=call to action."
                    },
                    "parent_id": {
                        "type": "string",
                        "description": "Optional ID of a parent note to connect this note from. Creates a visual flow arrow."
                    },
                    "color": {
                        "type": "string",
                        "enum": ["yellow", "blue", "green", "pink", "purple"],
                        "description": "Note color. yellow=user ideas, blue=AI suggestions, green=research, pink=questions, purple=key insights. Default: blue for AI notes."
                    }
                },
                "required": ["content", "lane"]
            }),
        },
        ToolDefinition {
            name: names::UPDATE_NOTE.into(),
            description: "Edit the content of an existing note on the canvas.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "note_id": {
                        "type": "string",
                        "description": "The ID of the note to update."
                    },
                    "content": {
                        "type": "string",
                        "description": "The new content for the note."
                    }
                },
                "required": ["note_id", "content"]
            }),
        },
        ToolDefinition {
            name: names::DELETE_NOTE.into(),
            description: "Remove a note from the canvas. Use sparingly - only for clearly wrong or duplicate ideas.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "note_id": {
                        "type": "string",
                        "description": "The ID of the note to delete."
                    }
                },
                "required": ["note_id"]
            }),
        },
        ToolDefinition {
            name: names::CONNECT_NOTES.into(),
            description: "Draw a connector arrow between two notes to show flow or relationship.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "from_id": {
                        "type": "string",
                        "description": "ID of the source note (arrow starts here)."
                    },
                    "to_id": {
                        "type": "string",
                        "description": "ID of the target note (arrow points here)."
                    }
                },
                "required": ["from_id", "to_id"]
            }),
        },
        ToolDefinition {
            name: names::MOVE_NOTE.into(),
            description: "Move a note to a different swimlane or position.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "note_id": {
                        "type": "string",
                        "description": "The ID of the note to move."
                    },
                    "lane": {
                        "type": "string",
                        "enum": ["hook", "problem", "solution", "proof", "cta"],
                        "description": "Target swimlane."
                    },
                    "row": {
                        "type": "integer",
                        "description": "Target row position within the lane (0 = top)."
                    }
                },
                "required": ["note_id", "lane", "row"]
            }),
        },
        ToolDefinition {
            name: RESEARCH_TOOL.into(),
            description: "Search the web for information, statistics, or examples related to the topic. Results will be added as research notes.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query. Be specific - include year, industry, or metric type for better results."
                    },
                    "purpose": {
                        "type": "string",
                        "description": "Brief explanation of why this research is needed and how it will help the presentation."
                    }
                },
                "required": ["query", "purpose"]
            }),
        },
        ToolDefinition {
            name: INTERRUPT_TOOL.into(),
            description: "Ask the user a clarifying question. Use this to gather important information about their goals, audience, or preferences.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to ask the user. Be conversational and specific."
                    },
                    "options": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Optional array of suggested answer options. Include 2-4 options if the question has common answers."
                    }
                },
                "required": ["question"]
            }),
        },
        ToolDefinition {
            name: names::SUGGEST_STRUCTURE.into(),
            description: "Propose a narrative structure for organizing the notes into a presentation flow.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "structure": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Array of section names in presentation order, e.g. [\"Hook\", \"Problem\", \"Solution\", \"Demo\", \"Pricing\", \"CTA\"]"
                    },
                    "rationale": {
                        "type": "string",
                        "description": "Brief explanation of why this structure fits the content and audience."
                    }
                },
                "required": ["structure", "rationale"]
            }),
        },
        ToolDefinition {
            name: names::MARK_READY.into(),
            description: "Signal that the ideation is complete and the deck plan is ready to build. Only call this when the user approves the structure.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "A brief summary of the deck plan - topic, slide count, key sections."
                    }
                },
                "required": ["summary"]
            }),
        },
    ]
}

/// Get a descriptor by name.
pub fn tool_by_name(name: &str) -> Option<ToolDefinition> {
    canvas_catalog().into_iter().find(|t| t.name == name)
}
