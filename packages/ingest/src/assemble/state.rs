//! Cursor state threaded through assembly.

use std::collections::HashSet;

use crate::error::{IngestError, Result};
use crate::types::{Entry, Statement};

/// Where free text lands once statements have started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreeTextTarget {
    /// Append to the entry's supplemental text.
    #[default]
    Entry,
    /// Append to the text of the current statement.
    Statement,
}

/// Assembly cursors plus the entries built so far.
///
/// `current_entry` is the index of the last entry started.
/// `current_statement` is the path of child indices from that entry's
/// statement list down to the last statement created.
#[derive(Debug, Default)]
pub struct AssemblyState {
    entries: Vec<Entry>,
    seen: HashSet<String>,
    current_entry: Option<usize>,
    current_statement: Vec<usize>,
    last_top_level: Option<usize>,
}

impl AssemblyState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new entry and reset both cursors to it.
    pub fn start_entry(&mut self, entry: Entry) -> Result<()> {
        if !self.seen.insert(entry.external_id.clone()) {
            return Err(IngestError::DuplicateEntry(entry.external_id));
        }
        let is_top_level = !entry.is_enhancement;
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        self.current_entry = Some(index);
        self.current_statement.clear();
        if is_top_level {
            self.last_top_level = Some(index);
        }
        Ok(())
    }

    /// The most recently started non-enhancement entry.
    #[must_use]
    pub fn last_top_level(&self) -> Option<&Entry> {
        self.last_top_level.and_then(|i| self.entries.get(i))
    }

    /// The current entry.
    #[must_use]
    pub fn current_entry(&self) -> Option<&Entry> {
        self.current_entry.and_then(|i| self.entries.get(i))
    }

    /// Mutable access to the current entry.
    pub fn current_entry_mut(&mut self) -> Option<&mut Entry> {
        self.current_entry.and_then(|i| self.entries.get_mut(i))
    }

    /// Whether a statement cursor is set.
    #[must_use]
    pub fn has_statement(&self) -> bool {
        !self.current_statement.is_empty()
    }

    /// Depth of the current statement (0 when none).
    #[must_use]
    pub fn statement_depth(&self) -> usize {
        self.current_statement.len()
    }

    /// Append a statement to the current entry and make it current.
    pub fn push_statement(&mut self, statement: Statement, row: usize) -> Result<()> {
        self.push_at_depth(statement, 1, row)
    }

    /// Append a sub-statement to the current statement.
    ///
    /// The statement cursor does not move.
    pub fn push_substatement(&mut self, statement: Statement, row: usize) -> Result<()> {
        let label = statement.label.clone();
        let parent = self
            .statement_mut(&self.current_statement.clone())
            .ok_or(IngestError::OrphanStatement { row, record: label })?;
        parent.substatements.push(statement);
        Ok(())
    }

    /// Append a statement at `depth` (1 = directly under the entry).
    ///
    /// The new statement becomes a child of the current statement's ancestor
    /// at `depth - 1` and becomes current itself.
    pub fn push_at_depth(&mut self, statement: Statement, depth: usize, row: usize) -> Result<()> {
        let orphan = || IngestError::OrphanStatement {
            row,
            record: statement.label.clone(),
        };
        if depth == 0 || depth > self.current_statement.len() + 1 {
            return Err(orphan());
        }
        let entry_index = self.current_entry.ok_or_else(orphan)?;

        let parent_path: Vec<usize> = self.current_statement[..depth - 1].to_vec();
        let siblings = if parent_path.is_empty() {
            &mut self.entries[entry_index].statements
        } else {
            match self.statement_mut(&parent_path) {
                Some(parent) => &mut parent.substatements,
                None => return Err(orphan()),
            }
        };
        siblings.push(statement);
        let child = siblings.len() - 1;

        self.current_statement = parent_path;
        self.current_statement.push(child);
        Ok(())
    }

    /// Attach free text to the current entry or statement.
    pub fn attach_free_text(&mut self, text: &str, target: FreeTextTarget, row: usize) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if target == FreeTextTarget::Statement {
            let path = self.current_statement.clone();
            if let Some(statement) = self.statement_mut(&path) {
                if !statement.text.is_empty() {
                    statement.text.push('\n');
                }
                statement.text.push_str(text);
                return Ok(());
            }
        }

        let entry = self
            .current_entry_mut()
            .ok_or_else(|| IngestError::OrphanStatement {
                row,
                record: text.to_string(),
            })?;
        entry.supplemental.push(text.to_string());
        Ok(())
    }

    /// Consume the state, yielding entries in document order.
    #[must_use]
    pub fn finish(self) -> Vec<Entry> {
        self.entries
    }

    fn statement_mut(&mut self, path: &[usize]) -> Option<&mut Statement> {
        let entry = self.current_entry.and_then(|i| self.entries.get_mut(i))?;
        let (first, rest) = path.split_first()?;
        let mut node = entry.statements.get_mut(*first)?;
        for i in rest {
            node = node.substatements.get_mut(*i)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_attach_to_current_entry() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-1", "Policy")).unwrap();
        state.push_statement(Statement::new("a.", "one"), 2).unwrap();
        state.push_substatement(Statement::new("1.", "one.one"), 3).unwrap();
        state.push_substatement(Statement::new("2.", "one.two"), 4).unwrap();
        state.push_statement(Statement::new("b.", "two"), 5).unwrap();

        let entries = state.finish();
        let statements = &entries[0].statements;
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].substatements.len(), 2);
        assert!(statements[1].substatements.is_empty());
    }

    #[test]
    fn test_substatement_without_statement_is_orphan() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-1", "Policy")).unwrap();
        let err = state
            .push_substatement(Statement::new("AC-1a.1.", "x"), 3)
            .unwrap_err();
        assert!(matches!(err, IngestError::OrphanStatement { row: 3, .. }));
    }

    #[test]
    fn test_statement_without_entry_is_orphan() {
        let mut state = AssemblyState::new();
        assert!(state.push_statement(Statement::new("a.", "x"), 2).is_err());
        assert!(state
            .attach_free_text("text", FreeTextTarget::Entry, 2)
            .is_err());
    }

    #[test]
    fn test_new_entry_resets_statement_cursor() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-1", "Policy")).unwrap();
        state.push_statement(Statement::new("a.", "x"), 2).unwrap();
        state.start_entry(Entry::new("AC-2", "Accounts")).unwrap();
        assert!(!state.has_statement());
        assert!(state.push_substatement(Statement::new("1.", "y"), 4).is_err());
    }

    #[test]
    fn test_last_top_level_skips_enhancements() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-2", "Accounts")).unwrap();
        state
            .start_entry(Entry::new("AC-2 (1)", "Automated").enhancing("AC-2"))
            .unwrap();
        assert_eq!(state.current_entry().unwrap().external_id, "AC-2 (1)");
        assert_eq!(state.last_top_level().unwrap().external_id, "AC-2");
    }

    #[test]
    fn test_duplicate_entry() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-1", "Policy")).unwrap();
        let err = state.start_entry(Entry::new("AC-1", "Policy")).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateEntry(_)));
    }

    #[test]
    fn test_push_at_depth() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-1", "Policy")).unwrap();
        state.push_at_depth(Statement::new("a.", ""), 1, 1).unwrap();
        state.push_at_depth(Statement::new("1.", ""), 2, 1).unwrap();
        state.push_at_depth(Statement::new("(a)", ""), 3, 1).unwrap();
        assert_eq!(state.statement_depth(), 3);
        state.push_at_depth(Statement::new("2.", ""), 2, 1).unwrap();
        state.push_at_depth(Statement::new("b.", ""), 1, 1).unwrap();
        assert!(state.push_at_depth(Statement::new("x", ""), 3, 1).is_err());

        let entries = state.finish();
        let a = &entries[0].statements[0];
        assert_eq!(a.substatements.len(), 2);
        assert_eq!(a.substatements[0].substatements[0].label, "(a)");
        assert_eq!(entries[0].statements[1].label, "b.");
    }

    #[test]
    fn test_free_text_targets() {
        let mut state = AssemblyState::new();
        state.start_entry(Entry::new("AC-1", "Policy")).unwrap();
        state.push_statement(Statement::new("a.", "first"), 2).unwrap();
        state
            .attach_free_text("continued", FreeTextTarget::Statement, 3)
            .unwrap();
        state
            .attach_free_text("guidance", FreeTextTarget::Entry, 4)
            .unwrap();

        let entries = state.finish();
        assert_eq!(entries[0].statements[0].text, "first\ncontinued");
        assert_eq!(entries[0].supplemental, vec!["guidance"]);
    }
}
