//! Plain-text projection of a session.
//!
//! Rendering reads the session and nothing else, so calling it twice on the
//! same state yields the same lines.

use crate::diff::{PatchLine, PatchLineKind};
use crate::session::{Session, SessionState};
use crate::turn::{ChangeSet, Turn};

pub fn render_session(session: &Session) -> Vec<String> {
    let mut lines = Vec::new();

    for (index, turn) in session.turns().iter().enumerate() {
        render_turn(index, turn, &mut lines);
    }

    lines.push(status_line(session));
    lines
}

pub fn render_turn(index: usize, turn: &Turn, lines: &mut Vec<String>) {
    match turn {
        Turn::UserInput { text } => push_block(lines, &format!("[{index}] you"), text),
        Turn::Loading { hint } => lines.push(format!("[{index}] {hint}")),
        Turn::Explanation { text } => push_block(lines, &format!("[{index}] assistant"), text),
        Turn::ExplanationWithChanges {
            explanation,
            change_set,
        }
        | Turn::MultiFileChange {
            explanation,
            change_set,
        } => {
            push_block(lines, &format!("[{index}] assistant"), explanation);
            render_change_set(index, change_set, lines);
        }
        Turn::ReplaceFile { change_set } => {
            lines.push(format!("[{index}] assistant proposes a replacement"));
            render_change_set(index, change_set, lines);
        }
        Turn::Error { message } => push_block(lines, &format!("[{index}] error"), message),
    }
}

fn render_change_set(index: usize, change_set: &ChangeSet, lines: &mut Vec<String>) {
    for change in change_set.changes() {
        let stats = change.patch().stats();
        lines.push(format!(
            "    --- {} (+{} -{})",
            change.path(),
            stats.added,
            stats.removed
        ));

        if change.is_noop() {
            lines.push("    (no changes)".to_string());
            continue;
        }

        for line in change.patch().lines() {
            lines.push(format!("    {}", patch_line(line)));
            if line.missing_newline() {
                lines.push("    \\ No newline at end of file".to_string());
            }
        }
    }

    lines.push(format!("    /apply {index} to write these changes"));
}

fn patch_line(line: &PatchLine) -> String {
    let prefix = match line.kind {
        PatchLineKind::Added => "+",
        PatchLineKind::Removed => "-",
        PatchLineKind::Context => " ",
        PatchLineKind::HunkHeader => return line.text.clone(),
    };
    format!("{prefix}{}", line.display_text())
}

fn push_block(lines: &mut Vec<String>, label: &str, text: &str) {
    let mut body = text.lines();
    match body.next() {
        Some(first) => lines.push(format!("{label}: {first}")),
        None => lines.push(format!("{label}:")),
    }
    for rest in body {
        lines.push(format!("    {rest}"));
    }
}

fn status_line(session: &Session) -> String {
    let state = match session.state() {
        SessionState::Idle => "idle".to_string(),
        SessionState::AwaitingResponse { generation } => {
            format!("awaiting response to request {generation}")
        }
    };

    format!(
        "model: {} | context files: {} | {state}",
        session.model(),
        session.context().len()
    )
}
