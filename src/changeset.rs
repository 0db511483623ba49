//! Pairs proposed contents with their originals and produces the finished turn.

use crate::classify::{ClassifiedReply, ProposedFile};
use crate::context::ContextSnapshot;
use crate::events::CoreEvent;
use crate::surface::FileSnapshot;
use crate::turn::{ChangeSet, FileChange, Turn};

/// Turns a classified reply into the turn that replaces the loading entry.
///
/// `active` must hold the latest content of the active file at build time.
/// Single-file kinds diff against it; multi-file kinds look each path up in
/// `snapshot`, falling back to an empty original with a warning.
pub fn build_turn(
    active: &FileSnapshot,
    snapshot: &ContextSnapshot,
    reply: ClassifiedReply,
    emit: &mut dyn FnMut(CoreEvent),
) -> Turn {
    match reply {
        ClassifiedReply::Explanation { text } => Turn::Explanation { text },
        ClassifiedReply::ReplaceFile { content } => Turn::ReplaceFile {
            change_set: single_file_change_set(active, content),
        },
        ClassifiedReply::ExplanationWithChanges { explanation, code } => {
            Turn::ExplanationWithChanges {
                explanation,
                change_set: single_file_change_set(active, code),
            }
        }
        ClassifiedReply::MultiFileChange {
            explanation,
            changes,
        } => match multi_file_change_set(snapshot, changes, emit) {
            Ok(change_set) => Turn::MultiFileChange {
                explanation,
                change_set,
            },
            Err(error) => {
                let message = format!("Malformed backend reply: {error}");
                emit(CoreEvent::error(message.clone()));
                Turn::Error { message }
            }
        },
        ClassifiedReply::BackendError { message } => {
            emit(CoreEvent::error(format!("Backend reported an error: {message}")));
            Turn::Error { message }
        }
        ClassifiedReply::Malformed { reason } => {
            let message = format!("Malformed backend reply: {reason}");
            emit(CoreEvent::error(message.clone()));
            Turn::Error { message }
        }
    }
}

#[must_use]
pub fn single_file_change_set(active: &FileSnapshot, proposed: String) -> ChangeSet {
    ChangeSet::single(FileChange::new(
        active.path.clone(),
        active.content.clone(),
        proposed,
    ))
}

pub fn multi_file_change_set(
    snapshot: &ContextSnapshot,
    proposals: Vec<ProposedFile>,
    emit: &mut dyn FnMut(CoreEvent),
) -> Result<ChangeSet, crate::turn::ChangeSetError> {
    let changes = proposals
        .into_iter()
        .map(|proposal| {
            let original = match snapshot.lookup(&proposal.file_path) {
                Some(content) => content.to_string(),
                None => {
                    emit(CoreEvent::warning(format!(
                        "{} was not part of the request context; treating it as a new file",
                        proposal.file_path
                    )));
                    String::new()
                }
            };

            FileChange::new(proposal.file_path, original, proposal.new_content)
        })
        .collect();

    ChangeSet::new(changes)
}
