//! Prompt Builders
//!
//! Every generation prompt the pipeline sends, one builder per call site.
//! Builders are pure string assembly so stages stay testable without a
//! network.

/// Shared knowledge-base block. Empty context collapses to a short notice so
/// the model does not hallucinate one.
fn kb_block(kb_context: &str) -> String {
    if kb_context.trim().is_empty() {
        "<knowledge_base>\n(no knowledge base context available)\n</knowledge_base>".to_string()
    } else {
        format!("<knowledge_base>\n{}\n</knowledge_base>", kb_context.trim())
    }
}

/// Idea enrichment: raw text into a structured ticket draft.
pub fn enrich_idea(raw_idea: &str, kb_context: &str) -> String {
    format!(
        r###"You are a senior product manager. Turn the raw product idea below into a structured ticket draft, grounded in the company knowledge base.

{kb}

RAW IDEA:
{raw_idea}

Respond with ONLY a JSON object, no prose, with these fields:
- "summary": one-line ticket title, imperative, under 80 characters
- "description": markdown with exactly these four sections: "## Desired Outcome", "## Problem", "## Product Vision", "## North Star Metric"
- "initiative_module": the platform module this belongs to, from the knowledge base
- "initiative_stage": the funnel stage this affects
- "initiative_scope": one of "Feature", "Improvement", "Experiment"
- "labels": comma-separated kebab-case labels as one string
- "product_category": product category if one clearly applies, else null
- "discovery": always "Validate"
- "customer_segment": who this serves
- "strategic_alignment": one sentence tying the idea to a strategic initiative
- "affected_modules": array of module names touched
- "flags": array of risks or dependencies worth flagging, may be empty

RULES:
- Ground module and initiative names in the knowledge base, never invent them.
- Keep the description concrete. No filler.
- Output raw JSON only."###,
        kb = kb_block(kb_context),
        raw_idea = raw_idea.trim(),
    )
}

/// Regenerate an enriched idea applying a change request.
pub fn enrich_idea_changes(original_json: &str, changes: &str, kb_context: &str) -> String {
    format!(
        r#"You are a senior product manager revising a structured ticket draft.

<original>
{original_json}
</original>

<changes>
{changes}
</changes>

{kb}

Apply the change request to the original draft. Preserve all fields, only modify what the change request asks for. Respond with ONLY the full revised JSON object, same schema as the original."#,
        kb = kb_block(kb_context),
    )
}

/// PRD generation from an approved idea.
pub fn prd(summary: &str, idea_description: &str, kb_context: &str, inspiration: &str) -> String {
    let inspiration_block = if inspiration.trim().is_empty() {
        String::new()
    } else {
        format!(
            "\nINSPIRATION (reference products or directions the requester pointed at):\n{}\n",
            inspiration.trim()
        )
    };
    format!(
        r#"You are a senior product manager writing a PRD.

{kb}

FEATURE: {summary}

IDEA DETAILS:
{idea_description}
{inspiration_block}
Write a complete PRD in markdown with these sections:
# {summary}
## Overview
## Problem Statement
## Goals and Success Metrics
## User Stories
## Functional Requirements
## Non-Functional Requirements
## Scope and Phasing
## Open Questions

RULES:
- Use tables where they clarify (metrics, phasing).
- Requirements are numbered and testable.
- Stay within what the idea and knowledge base support. Mark unknowns as open questions.
- Output markdown only, no preamble."#,
        kb = kb_block(kb_context),
    )
}

/// Regenerate a PRD applying a change request.
pub fn prd_changes(current_prd: &str, changes: &str, kb_context: &str) -> String {
    format!(
        r#"You are a senior product manager revising a PRD.

<current_prd>
{current_prd}
</current_prd>

<changes>
{changes}
</changes>

{kb}

Apply the change request and return the FULL revised PRD in markdown. Keep every section that the change request does not touch. Output markdown only."#,
        kb = kb_block(kb_context),
    )
}

/// Single-file HTML prototype generation.
pub fn prototype(summary: &str, prd_content: &str, design_system: &str, db_schema: &str) -> String {
    format!(
        r#"You are a frontend engineer building a clickable prototype.

FEATURE: {summary}

PRD:
{prd_content}

DESIGN SYSTEM:
{design_system}

RELEVANT DATABASE TABLES (use realistic field names in mock data):
{db_schema}

Build a single self-contained HTML file prototyping the main flows of this PRD.

RULES:
- One file: inline CSS and vanilla JavaScript only, no build step, no external requests except the Tailwind CDN script.
- Use Tailwind utility classes and follow the design system colors and type.
- Populate the UI with realistic mock data matching the database fields above.
- Interactive: navigation, form submissions, and state changes must visibly work.
- Output ONLY the HTML document, starting with <!DOCTYPE html>."#,
    )
}

/// Revise the current prototype applying a change request. The existing
/// HTML is the base to edit, not a reference; untouched flows stay as they
/// are so the published page only moves where the request says.
pub fn prototype_changes(
    summary: &str,
    prd_content: &str,
    design_system: &str,
    db_schema: &str,
    current_html: &str,
    changes: &str,
) -> String {
    format!(
        r#"You are a frontend engineer revising a clickable prototype.

<current_prototype>
{current_html}
</current_prototype>

<changes>
{changes}
</changes>

FEATURE: {summary}

PRD:
{prd_content}

DESIGN SYSTEM:
{design_system}

RELEVANT DATABASE TABLES (use realistic field names in mock data):
{db_schema}

Apply the change request to the current prototype. Keep every section, style, and behavior the change request does not touch.

RULES:
- One file: inline CSS and vanilla JavaScript only, no build step, no external requests except the Tailwind CDN script.
- Output ONLY the full revised HTML document, starting with <!DOCTYPE html>."#,
        changes = changes.trim(),
    )
}

/// Epic title and summary from a PRD.
pub fn epic(summary: &str, prd_content: &str) -> String {
    format!(
        r#"You are a senior product manager creating a delivery epic for the feature "{summary}".

PRD:
{prd_content}

Respond with ONLY a JSON object:
- "epic_title": epic name, under 60 characters, no ticket-key prefixes
- "epic_summary": 2-4 sentences covering the what and the user value

Output raw JSON only."#,
    )
}

/// Regenerate epic content applying a change request.
pub fn epic_changes(epic_title: &str, epic_summary: &str, prd_content: &str, changes: &str) -> String {
    format!(
        r#"You are a senior product manager revising a delivery epic.

<original>
{{"epic_title": {title:?}, "epic_summary": {summary:?}}}
</original>

<changes>
{changes}
</changes>

PRD:
{prd_content}

Apply the change request. Respond with ONLY the revised JSON object, same two fields."#,
        title = epic_title,
        summary = epic_summary,
    )
}

/// Task breakdown for an epic.
pub fn task_breakdown(epic_title: &str, epic_summary: &str, prd_content: &str) -> String {
    format!(
        r#"You are a senior product manager breaking the epic "{epic_title}" into engineering tasks.

EPIC SUMMARY:
{epic_summary}

PRD:
{prd_content}

Produce 8 to 15 tasks covering the full PRD scope. Respond with ONLY a JSON object:
{{"tasks": [
  {{
    "summary": "short task title",
    "task_summary": "1-2 sentence description of the work",
    "user_story": "As a <role>, I want <capability> so that <benefit>",
    "acceptance_criteria": ["verifiable criterion", "..."],
    "test_plan": "how this task is verified",
    "story_points": 1
  }}
]}}

RULES:
- story_points uses the scale 0.25, 0.5, 1, 2, 3. Anything larger must be split.
- Tasks are independently shippable where possible, ordered by dependency.
- Output raw JSON only."#,
    )
}

/// Regenerate the task breakdown applying a change request.
pub fn task_changes(current_tasks_json: &str, changes: &str, prd_content: &str) -> String {
    format!(
        r#"You are a senior product manager revising a task breakdown.

<current_tasks>
{current_tasks_json}
</current_tasks>

<changes>
{changes}
</changes>

PRD:
{prd_content}

Apply the change request to the task list. Keep tasks the change request does not touch. Respond with ONLY the full revised JSON object: {{"tasks": [...]}} with the same task schema."#,
    )
}

/// PM6 pass 1: decide what context the technical plans need.
pub fn investigation_plan(tasks_text: &str, repo_structure: &str) -> String {
    format!(
        r#"You are a tech lead planning an investigation before writing technical plans for the tasks below.

TASKS:
{tasks_text}

REPOSITORY STRUCTURE:
{repo_structure}

Decide what context you need. Respond with ONLY a JSON object:
- "db_keywords": array of keywords for finding relevant database tables
- "code_files": array of repository file paths worth reading, most relevant first
- "api_integrations": array of third-party service names the tasks touch, may be empty

Output raw JSON only."#,
    )
}

/// PM6 pass 2: technical plan per task, grounded in gathered context.
pub fn technical_plans(tasks_text: &str, context: &str) -> String {
    format!(
        r#"You are a tech lead writing implementation plans for the tasks below, using only the gathered context.

TASKS (numbered):
{tasks_text}

GATHERED CONTEXT:
{context}

For every task, respond with a technical plan. Respond with ONLY a JSON object:
{{"plans": [
  {{
    "index": 1,
    "technical_plan": ["concrete step referencing real files/tables", "..."],
    "story_points": 1
  }}
]}}

RULES:
- "index" matches the task numbering above, every task gets exactly one plan.
- Steps name actual files, tables, and endpoints from the context. No hand-waving.
- "story_points" is your confirmed estimate on the scale 0.25, 0.5, 1, 2, 3.
- Output raw JSON only."#,
    )
}

/// Revise technical plans applying a change request.
pub fn plan_changes(current_plans_json: &str, changes: &str) -> String {
    format!(
        r#"You are a tech lead revising technical plans.

<current_plans>
{current_plans_json}
</current_plans>

<changes>
{changes}
</changes>

Apply the change request. Keep plans the change request does not touch. Respond with ONLY the full revised JSON object: {{"plans": [...]}} with the same plan schema and the same indexes."#,
    )
}

/// Free-text ticket update from the /update flow.
pub fn ticket_update(issue_json: &str, instruction: &str) -> String {
    format!(
        r#"You are a product manager updating a Jira ticket from a free-text instruction.

<ticket>
{issue_json}
</ticket>

<instruction>
{instruction}
</instruction>

Respond with ONLY a JSON object containing just the fields that change:
- "summary": new title, only if the instruction changes it
- "story_points": new estimate, only if the instruction changes it
- "description_changes": 1-2 sentences describing what changed in the description, only if it did
- "updated_description": the FULL revised description in markdown, only when description_changes is present

Omit every field the instruction does not touch. Output raw JSON only."#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_idea_includes_kb_and_idea() {
        let p = enrich_idea("faster onboarding", "Modules: billing, onboarding");
        assert!(p.contains("<knowledge_base>"));
        assert!(p.contains("Modules: billing, onboarding"));
        assert!(p.contains("faster onboarding"));
    }

    #[test]
    fn test_kb_block_empty_fallback() {
        let p = enrich_idea("idea", "   ");
        assert!(p.contains("(no knowledge base context available)"));
    }

    #[test]
    fn test_prd_inspiration_optional() {
        let with = prd("Checkout", "desc", "", "like Stripe Checkout");
        assert!(with.contains("INSPIRATION"));
        let without = prd("Checkout", "desc", "", "");
        assert!(!without.contains("INSPIRATION"));
    }

    #[test]
    fn test_prototype_changes_embeds_current_html() {
        let p = prototype_changes(
            "F",
            "prd",
            "ds",
            "schema",
            "<!DOCTYPE html><body data-rev=\"v1\"></body>",
            "make the header sticky",
        );
        assert!(p.contains("<body data-rev=\"v1\">"));
        assert!(p.contains("make the header sticky"));
        assert!(p.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_epic_changes_embeds_current_values() {
        let p = epic_changes("Title", "Summary", "prd", "shorter title");
        assert!(p.contains("\"Title\""));
        assert!(p.contains("shorter title"));
    }

    #[test]
    fn test_task_breakdown_mentions_scale() {
        let p = task_breakdown("Epic", "summary", "prd");
        assert!(p.contains("0.25, 0.5, 1, 2, 3"));
        assert!(p.contains("\"tasks\""));
    }

    #[test]
    fn test_technical_plans_wraps_in_plans_object() {
        let p = technical_plans("1. task", "context");
        assert!(p.contains("\"plans\""));
        assert!(p.contains("\"index\""));
    }
}
