//! Line-level structural diff between a golden fixture and fresh output.
//!
//! Comparison is exact: no whitespace, line-ending or trailing-newline
//! normalization happens anywhere. Two texts produce a report iff they differ
//! as byte strings. Carriage returns render as `␍` and a last line without a
//! terminator is followed by `\ No newline at end of file`, so edits that are
//! invisible in a terminal can still be located.

use std::fmt;
use std::io;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorSpec, WriteColor};

/// Number of unchanged lines shown around each change.
pub const CONTEXT_LINES: usize = 3;

/// Printed after a line that has no trailing newline.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

const CARRIAGE_RETURN: &str = "\u{240d}";
const NUL: &str = "\u{2400}";
// Keys handed to the changeset: a leading space keeps every key non-empty, a
// trailing NUL flags a missing terminator. Real NULs are rendered as `␀`.
const KEY_PREFIX: char = ' ';
const KEY_NO_NEWLINE: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Same,
    Removed,
    Added,
}

impl LineKind {
    fn marker(self) -> char {
        match self {
            LineKind::Same => ' ',
            LineKind::Removed => '-',
            LineKind::Added => '+',
        }
    }
}

/// One line of a hunk. Line numbers are 1-based and present only on the
/// side(s) the line exists on. `text` is the display form, without its
/// terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub expected_line: Option<usize>,
    pub actual_line: Option<usize>,
    pub text: String,
    pub missing_newline: bool,
}

/// A contiguous region of change plus its surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub expected_start: usize,
    pub expected_len: usize,
    pub actual_start: usize,
    pub actual_len: usize,
    pub lines: Vec<DiffLine>,
}

/// Everything needed to locate a regression in a golden fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub label: String,
    pub hunks: Vec<Hunk>,
}

impl DiffReport {
    /// Number of lines removed from or added to the expected text.
    pub fn changed_lines(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.kind != LineKind::Same)
            .count()
    }

    /// Renders the report like [`Display`](fmt::Display), with removed lines
    /// red and added lines green.
    pub fn write_colored(&self, out: &mut dyn WriteColor) -> io::Result<()> {
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(out, "--- {} (expected)", self.label)?;
        writeln!(out, "+++ {} (actual)", self.label)?;
        out.reset()?;
        for hunk in &self.hunks {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            writeln!(out, "{}", hunk.header())?;
            for line in &hunk.lines {
                match line.kind {
                    LineKind::Same => out.reset()?,
                    LineKind::Removed => out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?,
                    LineKind::Added => out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?,
                }
                writeln!(out, "{}{}", line.kind.marker(), line.text)?;
                if line.missing_newline {
                    out.reset()?;
                    writeln!(out, "{NO_NEWLINE_MARKER}")?;
                }
            }
        }
        out.reset()
    }
}

impl Hunk {
    fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.expected_start, self.expected_len, self.actual_start, self.actual_len
        )
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} (expected)", self.label)?;
        writeln!(f, "+++ {} (actual)", self.label)?;
        for hunk in &self.hunks {
            writeln!(f, "{}", hunk.header())?;
            for line in &hunk.lines {
                writeln!(f, "{}{}", line.kind.marker(), line.text)?;
                if line.missing_newline {
                    writeln!(f, "{NO_NEWLINE_MARKER}")?;
                }
            }
        }
        Ok(())
    }
}

/// Compares `expected` against `actual`.
///
/// Returns `None` when the texts are identical, otherwise a report labelled
/// with `label`.
pub fn diff(label: &str, expected: &str, actual: &str) -> Option<DiffReport> {
    if expected == actual {
        return None;
    }

    let (expected_keys, actual_keys) = (line_keys(expected), line_keys(actual));
    // The changeset cannot represent a side with zero lines.
    let diffs = match (expected_keys.is_empty(), actual_keys.is_empty()) {
        (true, _) => vec![Difference::Add(actual_keys.join("\n"))],
        (_, true) => vec![Difference::Rem(expected_keys.join("\n"))],
        _ => Changeset::new(&expected_keys.join("\n"), &actual_keys.join("\n"), "\n").diffs,
    };
    let lines = number_lines(&diffs);
    let mut hunks = group_hunks(&lines, CONTEXT_LINES);

    // The texts differ but every line matched; can only happen if the
    // changeset collapsed a difference, so show the whole text as one hunk.
    if hunks.is_empty() {
        hunks = group_hunks(&lines, usize::MAX);
    }

    Some(DiffReport {
        label: label.to_string(),
        hunks,
    })
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

/// One changeset key per line of `text`.
fn line_keys(text: &str) -> Vec<String> {
    text.split_inclusive('\n')
        .map(|line| {
            let (body, terminated) = match line.strip_suffix('\n') {
                Some(body) => (body, true),
                None => (line, false),
            };
            let mut key = String::with_capacity(body.len() + 2);
            key.push(KEY_PREFIX);
            for c in body.chars() {
                match c {
                    '\r' => key.push_str(CARRIAGE_RETURN),
                    '\0' => key.push_str(NUL),
                    c => key.push(c),
                }
            }
            if !terminated {
                key.push(KEY_NO_NEWLINE);
            }
            key
        })
        .collect()
}

/// A diff line plus the number of lines consumed on each side before it.
struct Numbered {
    line: DiffLine,
    expected_before: usize,
    actual_before: usize,
}

fn number_lines(diffs: &[Difference]) -> Vec<Numbered> {
    let mut out = Vec::new();
    let (mut exp, mut act) = (0usize, 0usize);

    for d in diffs {
        let (kind, chunk) = match d {
            Difference::Same(x) => (LineKind::Same, x),
            Difference::Rem(x) => (LineKind::Removed, x),
            Difference::Add(x) => (LineKind::Added, x),
        };
        // Consecutive lines of one kind arrive joined by the split string.
        for key in chunk.split('\n') {
            let Some(key) = key.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            let (text, missing_newline) = match key.strip_suffix(KEY_NO_NEWLINE) {
                Some(text) => (text, true),
                None => (key, false),
            };
            let (expected_before, actual_before) = (exp, act);
            let expected_line = match kind {
                LineKind::Added => None,
                _ => {
                    exp += 1;
                    Some(exp)
                }
            };
            let actual_line = match kind {
                LineKind::Removed => None,
                _ => {
                    act += 1;
                    Some(act)
                }
            };
            out.push(Numbered {
                line: DiffLine {
                    kind,
                    expected_line,
                    actual_line,
                    text: text.to_string(),
                    missing_newline,
                },
                expected_before,
                actual_before,
            });
        }
    }
    out
}

fn group_hunks(lines: &[Numbered], context: usize) -> Vec<Hunk> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (i, n) in lines.iter().enumerate() {
        if n.line.kind == LineKind::Same && context != usize::MAX {
            continue;
        }
        let start = i.saturating_sub(context);
        let end = i.saturating_add(context).saturating_add(1).min(lines.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }

    ranges
        .into_iter()
        .map(|(start, end)| {
            let slice = &lines[start..end];
            let expected_len = slice.iter().filter(|n| n.line.expected_line.is_some()).count();
            let actual_len = slice.iter().filter(|n| n.line.actual_line.is_some()).count();
            let first = &slice[0];
            Hunk {
                expected_start: hunk_start(first.expected_before, expected_len),
                expected_len,
                actual_start: hunk_start(first.actual_before, actual_len),
                actual_len,
                lines: slice.iter().map(|n| n.line.clone()).collect(),
            }
        })
        .collect()
}

/// Unified-diff convention: an empty side starts at the line before the hunk.
fn hunk_start(before: usize, len: usize) -> usize {
    if len == 0 {
        before
    } else {
        before + 1
    }
}
