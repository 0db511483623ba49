//! Maps an opaque backend reply onto one of the known proposal kinds.
//!
//! Replies carry a `type` discriminant plus kind-specific companion fields:
//!
//! | `type`                     | fields                                          |
//! |----------------------------|-------------------------------------------------|
//! | `explanation`              | `content`                                       |
//! | `replace_file`             | `content`                                       |
//! | `explanation_with_changes` | `explanation`, `code`                           |
//! | `multi_file_change`        | `explanation`, `changes: [{filePath, newContent}]` |
//! | `error`                    | `message`                                       |
//!
//! Classification never fails. Anything that does not fit the table becomes
//! [`ClassifiedReply::Malformed`], which the session turns into an error turn.

use std::collections::BTreeSet;

use backend_channel::RawReply;
use serde::Deserialize;
use serde_json::Value;

pub const DISCRIMINANT_FIELD: &str = "type";

pub const KNOWN_KINDS: [&str; 5] = [
    "explanation",
    "replace_file",
    "explanation_with_changes",
    "multi_file_change",
    "error",
];

/// One file proposed by a multi-file reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedFile {
    pub file_path: String,
    pub new_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedReply {
    Explanation {
        text: String,
    },
    /// Full replacement of the active file.
    ReplaceFile {
        content: String,
    },
    /// Explanation plus full replacement of the active file.
    ExplanationWithChanges {
        explanation: String,
        code: String,
    },
    MultiFileChange {
        explanation: String,
        changes: Vec<ProposedFile>,
    },
    /// Application-level error reported by the backend itself.
    BackendError {
        message: String,
    },
    /// The reply did not match any known shape.
    Malformed {
        reason: String,
    },
}

impl ClassifiedReply {
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// True for kinds that propose file content and need a change set.
    #[must_use]
    pub fn proposes_changes(&self) -> bool {
        matches!(
            self,
            Self::ReplaceFile { .. }
                | Self::ExplanationWithChanges { .. }
                | Self::MultiFileChange { .. }
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireReply {
    Explanation {
        content: String,
    },
    ReplaceFile {
        content: String,
    },
    ExplanationWithChanges {
        explanation: String,
        code: String,
    },
    MultiFileChange {
        explanation: String,
        changes: Vec<ProposedFile>,
    },
    Error {
        message: String,
    },
}

pub fn classify(raw: &RawReply) -> ClassifiedReply {
    match classify_inner(raw) {
        Ok(reply) => reply,
        Err(reason) => ClassifiedReply::Malformed { reason },
    }
}

fn classify_inner(raw: &RawReply) -> Result<ClassifiedReply, String> {
    let Value::Object(fields) = raw else {
        return Err(format!("expected a JSON object, got {}", json_kind(raw)));
    };

    let kind = match fields.get(DISCRIMINANT_FIELD) {
        None => return Err(format!("missing `{DISCRIMINANT_FIELD}` field")),
        Some(Value::String(kind)) => kind.as_str(),
        Some(other) => {
            return Err(format!(
                "`{DISCRIMINANT_FIELD}` must be a string, got {}",
                json_kind(other)
            ))
        }
    };

    if !KNOWN_KINDS.contains(&kind) {
        return Err(format!("unknown reply type `{kind}`"));
    }

    let wire = WireReply::deserialize(raw)
        .map_err(|error| format!("invalid `{kind}` reply: {error}"))?;

    let reply = match wire {
        WireReply::Explanation { content } => ClassifiedReply::Explanation { text: content },
        WireReply::ReplaceFile { content } => ClassifiedReply::ReplaceFile { content },
        WireReply::ExplanationWithChanges { explanation, code } => {
            ClassifiedReply::ExplanationWithChanges { explanation, code }
        }
        WireReply::MultiFileChange {
            explanation,
            changes,
        } => {
            validate_changes(&changes)?;
            ClassifiedReply::MultiFileChange {
                explanation,
                changes,
            }
        }
        WireReply::Error { message } => ClassifiedReply::BackendError { message },
    };

    Ok(reply)
}

fn validate_changes(changes: &[ProposedFile]) -> Result<(), String> {
    if changes.is_empty() {
        return Err("`multi_file_change` reply has an empty `changes` list".to_string());
    }

    let mut seen = BTreeSet::new();
    for (index, change) in changes.iter().enumerate() {
        if change.file_path.trim().is_empty() {
            return Err(format!("change {index} has a blank `filePath`"));
        }
        if !seen.insert(change.file_path.as_str()) {
            return Err(format!(
                "`{}` appears more than once in `changes`",
                change.file_path
            ));
        }
    }

    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
