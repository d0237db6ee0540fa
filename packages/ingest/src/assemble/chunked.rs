//! Two-pass parser for catalogs with one record per entry.
//!
//! Pass one walks raw lines and groups them into chunks, one per control or
//! enhancement, so multi-line cells stay with the entry that owns them.
//! Pass two splits each chunk into tab-separated fields and reads the
//! control-text cell line by line into statements.

use crate::classify::{create_rev5_classifier, RowClassifier, RowKind};
use crate::error::{IngestError, Result};
use crate::table::{ColumnMap, Field, FieldIndex, TableHeader};
use crate::types::{Entry, Statement};

use super::{read_properties, AssemblyState, CatalogParser, FreeTextTarget};

/// Raw lines belonging to one entry, each with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk {
    lines: Vec<(usize, String)>,
}

impl Chunk {
    /// Line number of the first line.
    fn line(&self) -> usize {
        self.lines.first().map_or(0, |(n, _)| *n)
    }

    fn first(&self) -> &str {
        self.lines.first().map_or("", |(_, l)| l.as_str())
    }

    fn joined(&self) -> String {
        let lines: Vec<&str> = self.lines.iter().map(|(_, l)| l.as_str()).collect();
        lines.join("\n")
    }

    /// Non-blank lines of a cell taken from this chunk, paired with the
    /// physical line each one sits on.
    ///
    /// Each cell line sits on its own physical line, so lines are located
    /// in order and a repeated line resolves to the next occurrence.
    fn cell_lines<'t>(&self, cell: &'t str) -> Vec<(usize, &'t str)> {
        let mut next = 0;
        let mut row = self.line();
        cell.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let rest = self.lines.get(next..).unwrap_or_default();
                if let Some(found) = rest.iter().position(|(_, l)| l.contains(line)) {
                    row = rest[found].0;
                    next += found + 1;
                }
                (row, line)
            })
            .collect()
    }
}

/// Label shape of a clause line; decides nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelStyle {
    Letter,
    Number,
    ParenLetter,
    ParenNumber,
}

impl LabelStyle {
    fn of(label: &str) -> Self {
        let inner = label.trim_start_matches('(');
        let numeric = inner.starts_with(|c: char| c.is_ascii_digit());
        match (label.starts_with('('), numeric) {
            (false, false) => Self::Letter,
            (false, true) => Self::Number,
            (true, false) => Self::ParenLetter,
            (true, true) => Self::ParenNumber,
        }
    }
}

/// Label styles currently open in an entry, outermost first.
#[derive(Debug, Default)]
struct Outline {
    styles: Vec<LabelStyle>,
}

impl Outline {
    /// Depth (1-based) at which a clause labeled `label` belongs.
    fn depth_for(&mut self, label: &str) -> usize {
        let style = LabelStyle::of(label);
        if let Some(pos) = self.styles.iter().position(|s| *s == style) {
            self.styles.truncate(pos + 1);
        } else {
            self.styles.push(style);
        }
        self.styles.len()
    }
}

/// Parser for tables where each entry is one record whose control text is a
/// multi-line cell of labeled clauses.
pub struct ChunkedParser {
    classifier: RowClassifier,
    columns: ColumnMap,
    free_text: FreeTextTarget,
}

impl ChunkedParser {
    /// Create a parser with an explicit classifier and column layout.
    #[must_use]
    pub fn new(classifier: RowClassifier, columns: ColumnMap) -> Self {
        Self {
            classifier,
            columns,
            free_text: FreeTextTarget::Entry,
        }
    }

    /// Parser preset for Revision 5 tables.
    #[must_use]
    pub fn rev5() -> Self {
        Self::new(create_rev5_classifier(), ColumnMap::rev5())
    }

    /// Choose where unlabeled lines after the first clause go.
    #[must_use]
    pub fn with_free_text(mut self, target: FreeTextTarget) -> Self {
        self.free_text = target;
        self
    }

    /// Group lines after the header into per-entry chunks.
    fn chunk<'a>(&self, lines: impl Iterator<Item = (usize, &'a str)>) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = Vec::new();

        for (line_no, raw) in lines {
            let line = raw.trim_end_matches('\r').trim_matches('"');
            if line.trim().is_empty() {
                continue;
            }

            let starts_entry = self
                .classifier
                .find(line)
                .is_some_and(|m| m.kind.starts_entry());
            if starts_entry {
                chunks.push(Chunk {
                    lines: vec![(line_no, line.to_string())],
                });
                continue;
            }

            match chunks.last_mut() {
                Some(chunk) => chunk.lines.push((line_no, line.to_string())),
                None => {
                    return Err(IngestError::OrphanStatement {
                        row: line_no,
                        record: line.to_string(),
                    })
                }
            }
        }

        Ok(chunks)
    }

    fn process_chunk(&self, state: &mut AssemblyState, index: &FieldIndex, chunk: &Chunk) -> Result<()> {
        let matched = self.classifier.classify_match(chunk.first(), chunk.line())?;

        let joined = chunk.joined();
        let record: Vec<&str> = joined.split('\t').collect();
        let identifier = index.text(&record, Field::Identifier);

        let mut entry = Entry::new(identifier, index.text(&record, Field::Title))
            .with_related(index.list(&record, Field::Related));
        entry.properties = read_properties(index, &record);

        if matched.kind == RowKind::Enhancement {
            let parent = match matched.group(1) {
                Some(parent) => parent.to_string(),
                None => state
                    .last_top_level()
                    .map(|e| e.external_id.clone())
                    .ok_or_else(|| IngestError::MissingParent {
                        entry: identifier.to_string(),
                        parent: String::new(),
                    })?,
            };
            entry = entry.enhancing(parent);
        }
        state.start_entry(entry)?;

        let text = chunk.cell_lines(index.text(&record, Field::Text));
        self.read_control_text(state, &text)?;

        if let Some(discussion) = index.get(&record, Field::Discussion) {
            state.attach_free_text(discussion, FreeTextTarget::Entry, chunk.line())?;
        }
        Ok(())
    }

    fn read_control_text(&self, state: &mut AssemblyState, text: &[(usize, &str)]) -> Result<()> {
        let mut outline = Outline::default();

        for &(row, line) in text {
            match self.classifier.find(line) {
                Some(m) if m.kind == RowKind::Statement => {
                    let label = m.group(1).unwrap_or_default();
                    let depth = outline.depth_for(label);
                    state.push_at_depth(Statement::new(label, m.group(2).unwrap_or_default()), depth, row)?;
                }
                _ if !state.has_statement() => {
                    if let Some(entry) = state.current_entry_mut() {
                        if !entry.text.is_empty() {
                            entry.text.push('\n');
                        }
                        entry.text.push_str(line);
                    }
                }
                _ => state.attach_free_text(line, self.free_text, row)?,
            }
        }
        Ok(())
    }
}

impl CatalogParser for ChunkedParser {
    fn parse(&self, input: &str) -> Result<Vec<Entry>> {
        let mut lines = input.lines().enumerate().map(|(i, l)| (i + 1, l));
        let header_line = lines
            .by_ref()
            .find(|(_, l)| !l.trim().is_empty())
            .map(|(_, l)| l)
            .unwrap_or_default();
        let header = TableHeader::new(header_line.trim_end_matches('\r').split('\t'));
        let index = header.resolve(&self.columns, "catalog table")?;

        let chunks = self.chunk(lines)?;
        tracing::debug!(chunks = chunks.len(), "Grouped catalog lines");

        let mut state = AssemblyState::new();
        for chunk in &chunks {
            self.process_chunk(&mut state, &index, chunk)?;
        }

        let entries = state.finish();
        tracing::debug!(entries = entries.len(), "Assembled catalog chunks");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::clean_cell;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Control Identifier\tControl (or Control Enhancement) Name\tControl (or Control Enhancement)\tDiscussion\tRelated Controls";

    fn parse(body: &str) -> Result<Vec<Entry>> {
        ChunkedParser::rev5().parse(&format!("{HEADER}\n{body}"))
    }

    #[test]
    fn test_multi_line_cell_becomes_statements() {
        let entries = parse(concat!(
            "AC-1\tPolicy and Procedures\t\"a. Develop, document, and disseminate:\n",
            "1. An access control policy that:\n",
            "(a) Addresses purpose;\n",
            "(b) Is consistent with laws; and\n",
            "2. Procedures to facilitate implementation;\n",
            "b. Review and update the policy.\"\tAccess control policy can be included.\tIA-1, PM-9\n",
        ))
        .unwrap();

        assert_eq!(entries.len(), 1);
        let ac1 = &entries[0];
        assert_eq!(ac1.external_id, "AC-1");
        assert_eq!(ac1.name, "Policy and Procedures");
        assert_eq!(ac1.related_ids, vec!["IA-1", "PM-9"]);
        assert_eq!(ac1.supplemental, vec!["Access control policy can be included."]);

        let labels: Vec<&str> = ac1.statements.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["a.", "b."]);
        let a = &ac1.statements[0];
        assert_eq!(a.text, "Develop, document, and disseminate:");
        assert_eq!(a.substatements.len(), 2);
        assert_eq!(a.substatements[0].substatements.len(), 2);
        assert_eq!(a.substatements[0].substatements[1].label, "(b)");
        assert_eq!(ac1.statements[1].text, "Review and update the policy.");
    }

    #[test]
    fn test_enhancement_parent_from_identifier() {
        let entries = parse(concat!(
            "AC-2\tAccount Management\tManage accounts.\t\t\n",
            "AC-2(1)\tAutomated System Account Management\tSupport account management.\t\tAC-2\n",
        ))
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_enhancement);
        assert_eq!(entries[1].parent_external_id.as_deref(), Some("AC-2"));
        assert_eq!(entries[1].text, "Support account management.");
    }

    #[test]
    fn test_lines_before_first_entry_are_orphans() {
        let err = parse("a. stray clause\nAC-1\tPolicy\tx\t\t\n").unwrap_err();
        assert!(matches!(err, IngestError::OrphanStatement { row: 2, .. }));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let entries = parse("\nAC-1\tPolicy\tx\t\t\n\n\nAC-2\tAccounts\ty\t\t\n").unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_free_text_after_statements_goes_to_entry_by_default() {
        let body = "AC-3\tAccess Enforcement\t\"Enforce approved authorizations.\na. first clause\nSee also the guidance.\"\t\t\n";
        let entries = parse(body).unwrap();
        assert_eq!(entries[0].text, "Enforce approved authorizations.");
        assert_eq!(entries[0].supplemental, vec!["See also the guidance."]);

        let entries = ChunkedParser::rev5()
            .with_free_text(FreeTextTarget::Statement)
            .parse(&format!("{HEADER}\n{body}"))
            .unwrap();
        assert_eq!(entries[0].statements[0].text, "first clause\nSee also the guidance.");
        assert!(entries[0].supplemental.is_empty());
    }

    #[test]
    fn test_cell_lines_keep_physical_line_numbers() {
        let body = concat!(
            "\n",
            "AC-1\tPolicy\t\"Lead text.\n",
            "\n",
            "a. first clause\n",
            "b. second clause\"\tNotes\t\n",
        );
        let lines = body.lines().enumerate().map(|(i, l)| (i + 2, l));
        let chunks = ChunkedParser::rev5().chunk(lines).unwrap();
        assert_eq!(chunks.len(), 1);

        let chunk = &chunks[0];
        assert_eq!(chunk.line(), 3);
        let joined = chunk.joined();
        let record: Vec<&str> = joined.split('\t').collect();
        assert_eq!(
            chunk.cell_lines(clean_cell(record[2])),
            vec![(3, "Lead text."), (5, "a. first clause"), (6, "b. second clause")]
        );
    }

    #[test]
    fn test_cell_lines_resolve_repeats_in_order() {
        let chunk = Chunk {
            lines: vec![
                (10, "AC-1\tPolicy\tsee below".to_string()),
                (11, "see below".to_string()),
            ],
        };
        assert_eq!(
            chunk.cell_lines("see below\nsee below"),
            vec![(10, "see below"), (11, "see below")]
        );
    }

    #[test]
    fn test_outline_depths() {
        let mut outline = Outline::default();
        assert_eq!(outline.depth_for("a."), 1);
        assert_eq!(outline.depth_for("1."), 2);
        assert_eq!(outline.depth_for("(a)"), 3);
        assert_eq!(outline.depth_for("2."), 2);
        assert_eq!(outline.depth_for("b."), 1);
        assert_eq!(outline.depth_for("(1)"), 2);
    }
}
