//! Line-level differ used to find "what text is new" between two snapshots.
//!
//! Two strategies are available:
//!
//! - [`DiffStrategy::Positional`] compares line `i` of the old text with line
//!   `i` of the new text. Cheap and deterministic; an inserted line shifts
//!   every line after it into the "added" set.
//! - [`DiffStrategy::Lcs`] runs a longest-common-subsequence line diff (via
//!   `similar`), so shifted lines stay unchanged.
//!
//! Both produce a [`DiffRecord`], an ordered list of line operations.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// Which line-diff algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategy {
    /// Index-aligned comparison
    Positional,
    /// Longest-common-subsequence diff
    Lcs,
}

impl std::fmt::Display for DiffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffStrategy::Positional => write!(f, "positional"),
            DiffStrategy::Lcs => write!(f, "lcs"),
        }
    }
}

impl std::str::FromStr for DiffStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positional" => Ok(DiffStrategy::Positional),
            "lcs" => Ok(DiffStrategy::Lcs),
            _ => anyhow::bail!("Invalid diff strategy '{}'. Valid values: positional, lcs", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    Added,
    Unchanged,
    Removed,
}

/// One line-level operation. `index` is the line number in the new text for
/// `Added`/`Unchanged` and in the old text for `Removed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub op: LineOp,
    pub index: usize,
    pub text: String,
}

/// Ordered line operations between an old and a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffRecord {
    lines: Vec<DiffLine>,
}

impl DiffRecord {
    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    /// Added lines in order, with their index in the new text.
    pub fn added(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.op == LineOp::Added)
    }

    pub fn added_count(&self) -> usize {
        self.added().count()
    }

    /// Group added lines into hunks, as text taken verbatim from `new`.
    ///
    /// A hunk is a maximal run of non-`Unchanged` operations. Its text spans
    /// from the first to the last added line of the run, indentation and
    /// inner blank lines included, so it stays a substring of `new`. Only the
    /// outer whitespace is trimmed; hunks with nothing left are skipped.
    /// `new` must be the text this record was diffed to.
    pub fn added_hunks(&self, new: &str) -> Vec<String> {
        let spans = line_spans(new);
        let mut hunks = Vec::new();
        let mut run: Option<(usize, usize)> = None;

        let mut close = |run: &mut Option<(usize, usize)>| {
            if let Some((first, last)) = run.take()
                && let (Some(start), Some(end)) = (spans.get(first), spans.get(last))
            {
                let text = new[start.0..end.1].trim();
                if !text.is_empty() {
                    hunks.push(text.to_string());
                }
            }
        };

        for line in &self.lines {
            match line.op {
                LineOp::Unchanged => close(&mut run),
                LineOp::Added => {
                    run = match run {
                        Some((first, _)) => Some((first, line.index)),
                        None => Some((line.index, line.index)),
                    };
                }
                LineOp::Removed => {}
            }
        }
        close(&mut run);

        hunks
    }

    /// Render every added line as `+ <line>`, one per row.
    pub fn render_added(&self) -> String {
        self.added()
            .map(|l| format!("+ {}", l.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Stateless line differ.
#[derive(Debug, Clone, Copy)]
pub struct LineDiffer {
    strategy: DiffStrategy,
}

impl LineDiffer {
    pub fn new(strategy: DiffStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> DiffStrategy {
        self.strategy
    }

    pub fn diff(&self, old: &str, new: &str) -> DiffRecord {
        match self.strategy {
            DiffStrategy::Positional => positional_diff(old, new),
            DiffStrategy::Lcs => lcs_diff(old, new),
        }
    }
}

/// Byte range of every line of `text`, line terminator excluded.
fn line_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        spans.push((start, start + content.len()));
        start += line.len();
    }
    spans
}

fn positional_diff(old: &str, new: &str) -> DiffRecord {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let mut lines = Vec::with_capacity(old_lines.len().max(new_lines.len()));

    for i in 0..old_lines.len().max(new_lines.len()) {
        match (old_lines.get(i), new_lines.get(i)) {
            (Some(o), Some(n)) if o == n => lines.push(DiffLine {
                op: LineOp::Unchanged,
                index: i,
                text: n.to_string(),
            }),
            (o, n) => {
                if let Some(o) = o {
                    lines.push(DiffLine {
                        op: LineOp::Removed,
                        index: i,
                        text: o.to_string(),
                    });
                }
                if let Some(n) = n {
                    lines.push(DiffLine {
                        op: LineOp::Added,
                        index: i,
                        text: n.to_string(),
                    });
                }
            }
        }
    }

    DiffRecord { lines }
}

fn lcs_diff(old: &str, new: &str) -> DiffRecord {
    let diff = TextDiff::from_lines(old, new);
    let lines = diff
        .iter_all_changes()
        .map(|change| {
            let text = change.value().trim_end_matches(['\n', '\r']).to_string();
            match change.tag() {
                ChangeTag::Equal => DiffLine {
                    op: LineOp::Unchanged,
                    index: change.new_index().unwrap_or_default(),
                    text,
                },
                ChangeTag::Insert => DiffLine {
                    op: LineOp::Added,
                    index: change.new_index().unwrap_or_default(),
                    text,
                },
                ChangeTag::Delete => DiffLine {
                    op: LineOp::Removed,
                    index: change.old_index().unwrap_or_default(),
                    text,
                },
            }
        })
        .collect();

    DiffRecord { lines }
}
