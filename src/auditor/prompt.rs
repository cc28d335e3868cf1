//! Review prompts.
//!
//! Both prompts end with the same response contract so the parser sees one
//! shape regardless of subject.

use crate::tracker::Issue;
use std::path::Path;

const REVIEW_GUIDANCE: &str = "\
Be thorough but practical. Report only problems that affect correctness,
security, or maintainability.";

fn response_contract(pass_meaning: &str, fail_meaning: &str) -> String {
    format!(
        r#"## Response Format

Respond with ONLY a single JSON object in exactly this shape:

{{
  "verdict": "PASS" | "FAIL" | "NEEDS_HUMAN",
  "confidence": 0.0-1.0,
  "issues": ["issue1", "issue2"],
  "suggestions": ["suggestion1", "suggestion2"]
}}

Verdicts:
- PASS: {pass_meaning}
- FAIL: {fail_meaning}
- NEEDS_HUMAN: you cannot decide; a human must review

List under "issues" only actual problems. "suggestions" are improvements
that do not block approval."#
    )
}

/// Prompt for reviewing the work behind a tracked issue.
pub fn build_bead_prompt(issue: &Issue) -> String {
    format!(
        r#"# Independent Code Review

You are a code reviewer performing independent verification of work done
for the task below. Review the work in the current directory.

## Task
- Task ID: {id}
- Title: {title}
- Description: {description}

## Review Criteria

1. Does the code meet the requirements described in the task?
2. Are there bugs, unhandled edge cases, or error handling gaps?
3. Is the code well-structured and does it follow best practices?
4. Are tests adequate and do they cover the main scenarios?
5. Are there security vulnerabilities (injection, auth bypass, etc.)?

{guidance}

{contract}"#,
        id = issue.id,
        title = issue.title,
        description = issue.description,
        guidance = REVIEW_GUIDANCE,
        contract = response_contract(
            "the work meets the requirements with no blocking issues",
            "the work has bugs, security issues, or misses requirements",
        ),
    )
}

/// Prompt for reviewing a merge request's diff against its target.
pub fn build_mr_prompt(mr_id: &str, branch: &str, target_branch: &str, workdir: &Path) -> String {
    format!(
        r#"# Independent Merge Request Review

You are a code reviewer performing independent verification of a merge
request. Review the changes between the source and target branches.

## Merge Request
- MR ID: {mr_id}
- Source Branch: {branch}
- Target Branch: {target_branch}
- Working Directory: {workdir}

To see the changes, run:

    git diff {target_branch}...{branch}

## Review Criteria

1. Does the code meet the requirements?
2. Are there bugs, unhandled edge cases, or error handling gaps?
3. Is the code well-structured and does it follow best practices?
4. Are tests adequate and do they cover the main scenarios?
5. Are there security vulnerabilities?
6. Will this merge cleanly with no conflicts?

{guidance}

{contract}"#,
        workdir = workdir.display(),
        guidance = REVIEW_GUIDANCE,
        contract = response_contract(
            "the changes are ready to merge",
            "the changes have blocking issues",
        ),
    )
}
