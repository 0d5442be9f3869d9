//! System prompt construction for the copilot.
//!
//! The prompt has three layers: the core autonomous-workflow instructions,
//! the current canvas state, and stage-specific guidance. Callers can swap
//! the whole builder through the [`PromptBuilder`] trait.

use slidesmith_core::session::{LANES, Session, Stage};

/// Builds stage-aware system instructions from the current session.
pub trait PromptBuilder: Send + Sync {
    fn build(&self, session: &Session) -> String;
}

/// The default canvas prompt builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasPromptBuilder;

const SYSTEM_PROMPT: &str = r#"You are an expert presentation strategist. Your job is to AUTONOMOUSLY create a complete ideation canvas.

## CRITICAL: WORK AUTONOMOUSLY UNTIL COMPLETE

DO NOT ask the user questions during your research and note creation. Complete the ENTIRE canvas first.
The user wants to SEE a complete ideation, not answer 10+ questions one at a time.

### Completion criteria (your job is NOT done until you have):
- Hook lane: 2-3 attention-grabbing notes with facts/stats
- Problem lane: 2-3 pain point notes backed by research
- Solution lane: 3-4 approach/answer notes
- Proof lane: 2-3 evidence/data notes (MUST have research backing)
- CTA lane: 1-2 call-to-action notes

### Autonomous workflow
1. User gives topic -> call set_topic IMMEDIATELY
2. Research pass: market/industry overview (use research tool)
3. Create 2-3 Hook notes from the findings
4. Research pass: problems/pain points in this space
5. Create 2-3 Problem notes from the findings
6. Create 3-4 Solution notes based on topic and research
7. Research pass: statistics, case studies, proof points
8. Create 2-3 Proof notes from the findings
9. Create 1-2 CTA notes
10. Review all lanes - if any lane is thin, research more and add notes
11. ONLY after the canvas is complete -> call ask_user to present completion

### NEVER DO THESE
- DON'T ask "What's your audience?" before researching - make assumptions
- DON'T call ask_user until ALL lanes have content (2+ notes each)
- DON'T stop after 3-4 notes - KEEP GOING until the canvas is full

## The Ideation Canvas

You're building a visual flowchart of sticky notes in 5 swimlanes:
1. **Hook** (lane 0) - attention grabbers, surprising facts, bold statements
2. **Problem** (lane 1) - pain points, challenges, what's at stake
3. **Solution** (lane 2) - the answer, product, approach
4. **Proof** (lane 3) - evidence, case studies, testimonials, data
5. **CTA** (lane 4) - call to action, next steps, the ask

## Note colors
- **blue**: AI suggestions (use for most notes)
- **green**: research findings (use when a note comes directly from research)
- **purple**: key insights

## Your mindset
- Work like a strategic consultant doing the research
- Make smart assumptions rather than asking questions
- Research deeply, create comprehensively
- Show, don't ask. Deliver, don't defer."#;

/// Describe the current canvas state for the model.
fn session_context(session: &Session) -> String {
    let lane_listings: Vec<String> = LANES
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            let notes: Vec<&slidesmith_core::session::Note> =
                session.notes.iter().filter(|n| n.lane == idx).collect();
            if notes.is_empty() {
                return None;
            }
            let listing = notes
                .iter()
                .map(|n| format!("  - [{}] {}", n.id, n.content))
                .collect::<Vec<_>>()
                .join("\n");
            Some(format!("**{}** ({} notes):\n{}", name, notes.len(), listing))
        })
        .collect();

    let canvas = if lane_listings.is_empty() {
        "## Canvas: Empty - time to add notes!".to_string()
    } else {
        format!("## Canvas State:\n{}", lane_listings.join("\n\n"))
    };

    format!(
        "## Current Session: \"{}\"\nStage: {}\nTotal notes: {}\n\n{}",
        session.topic,
        session.stage,
        session.notes.len(),
        canvas
    )
}

/// Stage-specific guidance for the autonomous completion model.
fn stage_guidance(stage: Stage) -> &'static str {
    match stage {
        Stage::Discover => {
            "## Mission: Complete Autonomous Ideation\n\n\
             The user just gave you a topic. Call set_topic immediately, research the topic \
             thoroughly (at least 3 research calls), and fill ALL lanes with notes \
             (target: 10-18 total). ONLY call ask_user when the canvas is complete. \
             If you need to make assumptions about audience, angle, or focus - MAKE THEM. \
             The user can refine later."
        }
        Stage::Expand => {
            "## Mission: Ensure Complete Coverage\n\n\
             The canvas has some content but may not be complete. Check every lane; if any \
             lane has fewer than 2 notes, research more and add content. ONLY call ask_user \
             when ALL lanes are properly filled. Do not offer to build until then."
        }
        Stage::Structure => {
            "## Mission: Final Review\n\n\
             The canvas should be nearly complete. Check that all lanes are filled (2+ notes \
             each), that Proof notes are backed by research, and that there is a clear \
             narrative flow - reorganize if needed. When satisfied, call mark_ready to \
             signal completion."
        }
        Stage::Ready => {
            "## Mission: Support User Review\n\n\
             The canvas is complete and the user is reviewing it. If they want changes, make \
             them directly without asking more questions. Support quick iteration."
        }
    }
}

impl PromptBuilder for CanvasPromptBuilder {
    fn build(&self, session: &Session) -> String {
        format!(
            "{}\n\n---\n\n{}\n\n---\n\n{}\n\nREMEMBER:\n\
             1. Always use ask_user with options for any question - never output bullet points as text\n\
             2. ACTION FIRST - create drafts quickly, refine later\n\
             3. If the user says \"write it\" or similar, IMMEDIATELY create 6-8 notes across all lanes",
            SYSTEM_PROMPT,
            session_context(session),
            stage_guidance(session.stage)
        )
    }
}
