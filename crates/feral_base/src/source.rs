//! Source buffer ownership and diagnostic location mapping.
//!
//! A [`SourceRegistry`] owns every source file a program touches for its
//! entire lifetime: once loaded, a [`SourceUnit`] is never evicted, so a
//! [`Location`] recorded in a token, AST node, or bytecode instruction
//! stays valid for as long as the registry is alive.
//!
//! ## Example
//!
//! ```
//! use feral_base::SourceRegistry;
//!
//! let mut reg = SourceRegistry::new();
//! let id = reg.load_str("/tmp/example.feral", "let x = 1;\nlet y = 2;\n");
//! let loc = reg.location(id, 4, 5);
//! let (line, col) = reg.line_col(loc).unwrap();
//! assert_eq!((line, col), (1, 5));
//! ```

use crate::span::Span;
use std::path::{Path, PathBuf};

/// Identifies one loaded [`SourceUnit`] within a [`SourceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    fn index(self) -> usize {
        self.0 as usize
    }

    /// The raw numeric id, for the `spec.md` §6 on-disk bytecode format's
    /// source-table section (which stores ids as plain `u64`s).
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Reconstructs a `SourceId` from a raw id previously obtained from
    /// [`SourceId::raw`] (e.g. when reading a compiled-bytecode file back).
    pub fn from_raw(raw: u32) -> Self {
        SourceId(raw)
    }
}

/// A source triple: which file, and what byte range within it.
///
/// Attached to every [`crate::Token`]-equivalent, AST node, and bytecode
/// instruction in the system so that any of them can be traced back to an
/// exact source line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub source: SourceId,
    pub start: usize,
    pub end: usize,
}

impl Location {
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    pub fn span(self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Combines two locations in the same source into one spanning both.
    ///
    /// # Panics
    ///
    /// Panics if `self` and `other` name different sources.
    pub fn merge(self, other: Location) -> Location {
        assert_eq!(self.source, other.source, "cannot merge locations across sources");
        Location {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// One loaded source file: its canonical path, directory, raw bytes, and a
/// byte-offset line table used to resolve [`Location`]s to line/column pairs.
pub struct SourceUnit {
    id: SourceId,
    path: PathBuf,
    dir: PathBuf,
    bytes: Vec<u8>,
    /// `(byteStart, byteEnd)` per line, sorted by `byteStart`.
    lines: Vec<(usize, usize)>,
}

impl SourceUnit {
    fn new(id: SourceId, path: PathBuf, bytes: Vec<u8>) -> Self {
        let dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let lines = line_table(&bytes);
        Self { id, path, dir, bytes, lines }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }

    /// Resolves a byte offset to a 1-based `(line, column)` pair.
    ///
    /// Tabs count as a single column; callers that need tab-aware caret
    /// alignment (`spec.md` §7) re-expand the raw line text themselves.
    pub fn line_col(&self, offset: usize) -> Option<(usize, usize)> {
        let idx = self
            .lines
            .binary_search_by(|&(start, end)| {
                if offset < start {
                    std::cmp::Ordering::Greater
                } else if offset >= end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()?;
        let (start, _) = self.lines[idx];
        Some((idx + 1, offset - start + 1))
    }

    /// Returns the raw text of a 1-based line number, without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let (start, end) = *self.lines.get(line.checked_sub(1)?)?;
        let mut slice = &self.bytes[start..end];
        while slice.last() == Some(&b'\n') || slice.last() == Some(&b'\r') {
            slice = &slice[..slice.len() - 1];
        }
        std::str::from_utf8(slice).ok()
    }
}

fn line_table(bytes: &[u8]) -> Vec<(usize, usize)> {
    if bytes.is_empty() {
        return vec![(0, 0)];
    }
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            lines.push((start, i + 1));
            start = i + 1;
        }
    }
    if start < bytes.len() {
        lines.push((start, bytes.len()));
    } else if lines.is_empty() {
        lines.push((0, bytes.len()));
    }
    lines
}

/// Owns every [`SourceUnit`] loaded by a running program.
///
/// Sources are canonicalized by path on load: loading the same path twice
/// returns the existing [`SourceId`] rather than creating a duplicate unit,
/// matching the module loader's idempotent-load contract (`spec.md` §4.7).
#[derive(Default)]
pub struct SourceRegistry {
    units: Vec<SourceUnit>,
    by_path: std::collections::HashMap<PathBuf, SourceId>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a file from disk, or returns its existing id if already loaded.
    pub fn load_file(&mut self, path: &Path) -> std::io::Result<SourceId> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(&id) = self.by_path.get(&canonical) {
            return Ok(id);
        }
        let bytes = std::fs::read(&canonical)?;
        Ok(self.insert(canonical, bytes))
    }

    /// Loads source text that did not come from the filesystem (e.g. `-e`
    /// expression arguments, or tests), keyed by a caller-supplied path.
    pub fn load_str(&mut self, path: impl AsRef<Path>, text: impl Into<String>) -> SourceId {
        let path = path.as_ref().to_path_buf();
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        self.insert(path, text.into().into_bytes())
    }

    fn insert(&mut self, path: PathBuf, bytes: Vec<u8>) -> SourceId {
        let id = SourceId(self.units.len() as u32);
        self.by_path.insert(path.clone(), id);
        self.units.push(SourceUnit::new(id, path, bytes));
        id
    }

    pub fn get(&self, id: SourceId) -> &SourceUnit {
        &self.units[id.index()]
    }

    pub fn location(&self, id: SourceId, start: usize, end: usize) -> Location {
        Location::new(id, start, end)
    }

    pub fn line_col(&self, loc: Location) -> Option<(usize, usize)> {
        self.get(loc.source).line_col(loc.start)
    }

    /// Renders the `§7` caret-pointer diagnostic for a location: the offending
    /// source line followed by a caret aligned under its start column,
    /// expanding tabs to match the teacher's width-preserving convention.
    pub fn render_caret(&self, loc: Location) -> String {
        let unit = self.get(loc.source);
        let Some((line, col)) = unit.line_col(loc.start) else {
            return String::new();
        };
        let text = unit.line_text(line).unwrap_or("");
        let mut caret = String::new();
        for ch in text.chars().take(col.saturating_sub(1)) {
            caret.push(if ch == '\t' { '\t' } else { ' ' });
        }
        caret.push('^');
        format!("{text}\n{caret}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_str_assigns_sequential_ids() {
        let mut reg = SourceRegistry::new();
        let a = reg.load_str("a.feral", "1;");
        let b = reg.load_str("b.feral", "2;");
        assert_ne!(a, b);
    }

    #[test]
    fn loading_same_path_twice_is_idempotent() {
        let mut reg = SourceRegistry::new();
        let a = reg.load_str("a.feral", "1;");
        let b = reg.load_str("a.feral", "1;");
        assert_eq!(a, b);
    }

    #[test]
    fn line_col_finds_first_line() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("a.feral", "let x = 1;\nlet y = 2;\n");
        assert_eq!(reg.line_col(reg.location(id, 0, 1)), Some((1, 1)));
        assert_eq!(reg.line_col(reg.location(id, 4, 5)), Some((1, 5)));
    }

    #[test]
    fn line_col_finds_second_line() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("a.feral", "let x = 1;\nlet y = 2;\n");
        assert_eq!(reg.line_col(reg.location(id, 11, 12)), Some((2, 1)));
    }

    #[test]
    fn line_text_strips_newline() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("a.feral", "abc\ndef\n");
        assert_eq!(reg.get(id).line_text(1), Some("abc"));
        assert_eq!(reg.get(id).line_text(2), Some("def"));
    }

    #[test]
    fn render_caret_points_at_column() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("a.feral", "1 / 0;\n");
        let rendered = reg.render_caret(reg.location(id, 4, 5));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "1 / 0;");
        assert_eq!(lines[1].len(), 5);
        assert!(lines[1].ends_with('^'));
    }

    #[test]
    fn location_merge_spans_both() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("a.feral", "abcdef");
        let a = reg.location(id, 0, 2);
        let b = reg.location(id, 4, 6);
        let merged = a.merge(b);
        assert_eq!((merged.start, merged.end), (0, 6));
    }
}
