//! Line-based unified diff between an original and a proposed text.
//!
//! The patch is advisory: applying a proposal always writes the proposed
//! content directly. [`Patch::apply_to`] exists to check that a patch and the
//! contents it was computed from agree.

use similar::{Algorithm, ChangeTag, TextDiff};
use thiserror::Error;

/// Unchanged lines kept around every changed region.
pub const CONTEXT_RADIUS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchLineKind {
    Added,
    Removed,
    Context,
    HunkHeader,
}

/// One line of a patch.
///
/// For `Added`, `Removed` and `Context` lines, `text` is the raw line including
/// its terminator (the last line of a text may have none). For `HunkHeader`
/// lines it is the `@@ -a,b +c,d @@` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLine {
    pub kind: PatchLineKind,
    pub text: String,
}

impl PatchLine {
    fn new(kind: PatchLineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Returns the line text without its terminator.
    #[must_use]
    pub fn display_text(&self) -> &str {
        trim_line_terminator(&self.text)
    }

    /// Returns true when the line is the last line of its text and has no terminator.
    #[must_use]
    pub fn missing_newline(&self) -> bool {
        self.kind != PatchLineKind::HunkHeader
            && !self.text.ends_with('\n')
            && !self.text.ends_with('\r')
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("malformed hunk header: {0}")]
    MalformedHeader(String),

    #[error("hunk starting at original line {line} overlaps the previous hunk")]
    OverlappingHunk { line: usize },

    #[error("original text has no line {line} expected by the patch")]
    MissingLine { line: usize },

    #[error("original line {line} does not match the patch: expected {expected:?}, found {found:?}")]
    ContextMismatch {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("patch line of kind {0:?} appears before any hunk header")]
    LineOutsideHunk(PatchLineKind),
}

/// Ordered hunk lines produced by [`diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    lines: Vec<PatchLine>,
}

impl Patch {
    #[must_use]
    pub fn lines(&self) -> &[PatchLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn hunk_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.kind == PatchLineKind::HunkHeader)
            .count()
    }

    #[must_use]
    pub fn stats(&self) -> PatchStats {
        let mut stats = PatchStats::default();
        for line in &self.lines {
            match line.kind {
                PatchLineKind::Added => stats.added += 1,
                PatchLineKind::Removed => stats.removed += 1,
                PatchLineKind::Context | PatchLineKind::HunkHeader => {}
            }
        }
        stats
    }

    /// Rebuilds the proposed text from `original` by replaying every hunk.
    ///
    /// Fails when a context or removed line does not match `original`, which
    /// means the patch was computed against different content.
    pub fn apply_to(&self, original: &str) -> Result<String, PatchError> {
        let tokenized = TextDiff::from_lines(original, "");
        let source = tokenized.old_slices();
        let mut output = String::with_capacity(original.len());
        let mut cursor = 0usize;
        let mut in_hunk = false;

        for line in &self.lines {
            match line.kind {
                PatchLineKind::HunkHeader => {
                    let header = HunkHeader::parse(&line.text)?;
                    let start = header.old_position();
                    if start < cursor {
                        return Err(PatchError::OverlappingHunk { line: start + 1 });
                    }
                    if start > source.len() {
                        return Err(PatchError::MissingLine { line: start });
                    }
                    for unchanged in &source[cursor..start] {
                        output.push_str(unchanged);
                    }
                    cursor = start;
                    in_hunk = true;
                }
                PatchLineKind::Context | PatchLineKind::Removed => {
                    if !in_hunk {
                        return Err(PatchError::LineOutsideHunk(line.kind));
                    }
                    let Some(found) = source.get(cursor) else {
                        return Err(PatchError::MissingLine { line: cursor + 1 });
                    };
                    if *found != line.text {
                        return Err(PatchError::ContextMismatch {
                            line: cursor + 1,
                            expected: line.text.clone(),
                            found: (*found).to_string(),
                        });
                    }
                    if line.kind == PatchLineKind::Context {
                        output.push_str(found);
                    }
                    cursor += 1;
                }
                PatchLineKind::Added => {
                    if !in_hunk {
                        return Err(PatchError::LineOutsideHunk(line.kind));
                    }
                    output.push_str(&line.text);
                }
            }
        }

        for unchanged in &source[cursor..] {
            output.push_str(unchanged);
        }

        Ok(output)
    }
}

/// Computes the line diff of `original` against `proposed`.
///
/// Identical inputs produce an empty patch. Changed regions separated by more
/// than `2 * CONTEXT_RADIUS` unchanged lines land in separate hunks.
#[must_use]
pub fn diff(original: &str, proposed: &str) -> Patch {
    if original == proposed {
        return Patch::default();
    }

    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(original, proposed);

    let mut lines = Vec::new();
    for group in text_diff.grouped_ops(CONTEXT_RADIUS) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };

        let header = HunkHeader {
            old_start: first.old_range().start,
            old_len: last.old_range().end - first.old_range().start,
            new_start: first.new_range().start,
            new_len: last.new_range().end - first.new_range().start,
        };
        lines.push(PatchLine::new(PatchLineKind::HunkHeader, header.to_string()));

        for op in &group {
            for change in text_diff.iter_changes(op) {
                let kind = match change.tag() {
                    ChangeTag::Equal => PatchLineKind::Context,
                    ChangeTag::Delete => PatchLineKind::Removed,
                    ChangeTag::Insert => PatchLineKind::Added,
                };
                lines.push(PatchLine::new(kind, change.value()));
            }
        }
    }

    Patch { lines }
}

/// Zero-based hunk ranges, rendered with unified-diff numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HunkHeader {
    old_start: usize,
    old_len: usize,
    new_start: usize,
    new_len: usize,
}

impl HunkHeader {
    fn old_position(&self) -> usize {
        self.old_start
    }

    fn parse(text: &str) -> Result<Self, PatchError> {
        let malformed = || PatchError::MalformedHeader(text.to_string());

        let body = text
            .strip_prefix("@@ -")
            .and_then(|rest| rest.strip_suffix(" @@"))
            .ok_or_else(malformed)?;
        let (old, new) = body.split_once(" +").ok_or_else(malformed)?;
        let (old_start, old_len) = parse_range(old).ok_or_else(malformed)?;
        let (new_start, new_len) = parse_range(new).ok_or_else(malformed)?;

        Ok(Self {
            old_start: from_display_start(old_start, old_len).ok_or_else(malformed)?,
            old_len,
            new_start: from_display_start(new_start, new_len).ok_or_else(malformed)?,
            new_len,
        })
    }
}

impl std::fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            to_display_start(self.old_start, self.old_len),
            self.old_len,
            to_display_start(self.new_start, self.new_len),
            self.new_len
        )
    }
}

// Unified numbering: 1-based, except an empty range names the line before it.
fn to_display_start(start: usize, len: usize) -> usize {
    if len == 0 {
        start
    } else {
        start + 1
    }
}

fn from_display_start(start: usize, len: usize) -> Option<usize> {
    if len == 0 {
        Some(start)
    } else {
        start.checked_sub(1)
    }
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (start, len) = range.split_once(',')?;
    Some((start.parse().ok()?, len.parse().ok()?))
}

fn trim_line_terminator(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text)
}
