//! Row-at-a-time parser for catalogs with one record per statement.

use crate::classify::{create_rev4_classifier, RowClassifier, RowKind};
use crate::config::title_case;
use crate::error::{IngestError, Result};
use crate::table::{ColumnMap, Field, FieldIndex, Table};
use crate::types::{Entry, Statement};

use super::{read_properties, AssemblyState, CatalogParser, FreeTextTarget};

/// Parser for tables where every control, enhancement, statement and
/// sub-statement sits on its own row, classified by its identifier.
pub struct StreamingParser {
    classifier: RowClassifier,
    columns: ColumnMap,
    title_case: bool,
}

impl StreamingParser {
    /// Create a parser with an explicit classifier and column layout.
    #[must_use]
    pub fn new(classifier: RowClassifier, columns: ColumnMap) -> Self {
        Self {
            classifier,
            columns,
            title_case: false,
        }
    }

    /// Parser preset for Revision 4 tables.
    #[must_use]
    pub fn rev4() -> Self {
        Self::new(create_rev4_classifier(), ColumnMap::rev4()).with_title_case(true)
    }

    /// Title-case entry names.
    #[must_use]
    pub fn with_title_case(mut self, enabled: bool) -> Self {
        self.title_case = enabled;
        self
    }

    fn process_row(
        &self,
        state: &mut AssemblyState,
        index: &FieldIndex,
        record: &[&str],
        row: usize,
    ) -> Result<()> {
        let identifier = index.text(record, Field::Identifier);
        let matched = self.classifier.classify_match(identifier, row)?;
        let text = index.text(record, Field::Text);

        match matched.kind {
            RowKind::TopLevel => {
                let entry = self.build_entry(identifier, index, record);
                state.start_entry(entry)
            }
            RowKind::Enhancement => {
                let parent = state.last_top_level().ok_or_else(|| IngestError::MissingParent {
                    entry: identifier.to_string(),
                    parent: matched.group(1).unwrap_or_default().to_string(),
                })?;
                let parent_id = parent.external_id.clone();
                let parent_priority = parent.properties.priority.clone();

                let mut entry = self.build_entry(identifier, index, record).enhancing(parent_id);
                entry.properties.priority = parent_priority;
                state.start_entry(entry)
            }
            RowKind::Statement => state.push_statement(Statement::new(identifier, text), row),
            RowKind::Substatement => state.push_substatement(Statement::new(identifier, text), row),
            RowKind::FreeText => state.attach_free_text(text, FreeTextTarget::Entry, row),
        }
    }

    fn build_entry(&self, identifier: &str, index: &FieldIndex, record: &[&str]) -> Entry {
        let title = index.text(record, Field::Title);
        let name = if self.title_case {
            title_case(title)
        } else {
            title.to_string()
        };

        let mut entry = Entry::new(identifier, name).with_related(index.list(record, Field::Related));
        entry.text = index.text(record, Field::Text).to_string();
        if let Some(discussion) = index.get(record, Field::Discussion) {
            entry.supplemental.push(discussion.to_string());
        }
        entry.properties = read_properties(index, record);
        entry
    }
}

impl CatalogParser for StreamingParser {
    fn parse(&self, input: &str) -> Result<Vec<Entry>> {
        let table = Table::parse_tsv(input)?;
        let index = table.header().resolve(&self.columns, "catalog table")?;

        let mut state = AssemblyState::new();
        for i in 0..table.rows.len() {
            let record = table.row(i);
            self.process_row(&mut state, &index, &record, i + 1)?;
        }

        let entries = state.finish();
        tracing::debug!(entries = entries.len(), "Assembled catalog rows");
        Ok(entries)
    }
}
