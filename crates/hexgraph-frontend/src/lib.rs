//! # HexGraph Frontend
//!
//! Reading, parsing, and validation of HEX label-graph sources and label
//! name tables.

pub mod ast;
pub mod errors;
pub mod parser;
pub mod validate;

use std::path::Path;

pub use ast::{ExclusionEdge, GraphSource, HierarchyEdge, LabelTable};
pub use errors::{FrontendError, SourcePosition};
pub use parser::{parse_graph_source, parse_label_table};
pub use validate::{validate_graph_source, validate_label_table};

/// Reads and parses a graph source file.
pub fn load_graph_source(path: impl AsRef<Path>) -> Result<GraphSource, FrontendError> {
    let path = path.as_ref();
    let source = read_source(path)?;
    parse_graph_source(&source)
}

/// Reads and parses a label table file.
pub fn load_label_table(path: impl AsRef<Path>) -> Result<LabelTable, FrontendError> {
    let path = path.as_ref();
    let source = read_source(path)?;
    parse_label_table(&source)
}

fn read_source(path: &Path) -> Result<String, FrontendError> {
    std::fs::read_to_string(path).map_err(|source| FrontendError::Io {
        path: path.to_path_buf(),
        source,
    })
}
