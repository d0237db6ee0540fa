//! Assembly of classified records into an entry forest.
//!
//! Two catalog layouts are supported, each with its own parser:
//!
//! - [`StreamingParser`]: one record per row, every statement on its own row
//!   identified by a structural id (Revision 4).
//! - [`ChunkedParser`]: one record per entry, statements packed as lines
//!   inside a multi-line text cell (Revision 5). Raw lines are first grouped
//!   into per-entry chunks, then each chunk is split into fields.
//!
//! Both thread an explicit [`AssemblyState`] and produce the same
//! `Entry`/`Statement` tree shape for equivalent input.

mod chunked;
mod state;
mod streaming;

pub use chunked::ChunkedParser;
pub use state::{AssemblyState, FreeTextTarget};
pub use streaming::StreamingParser;

use crate::config::title_case;
use crate::error::Result;
use crate::table::{Field, FieldIndex};
use crate::types::{Entry, EntryProperties};

/// Capability shared by the catalog layouts.
pub trait CatalogParser {
    /// Parse a full catalog table into entries, in document order.
    fn parse(&self, input: &str) -> Result<Vec<Entry>>;
}

/// Read the optional edition-specific properties of a record.
fn read_properties(index: &FieldIndex, record: &[&str]) -> EntryProperties {
    EntryProperties {
        family: index.get(record, Field::Family).map(title_case),
        priority: index.get(record, Field::Priority).map(String::from),
        impact: index.list(record, Field::Impact),
    }
}
