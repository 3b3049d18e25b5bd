//! # Graph Source Parser
//!
//! Pest-based parser for the line-oriented graph description and the label
//! name table. The grammar lives in `grammar.pest` at the crate root.
//!
//! Parsing is purely syntactic: indices are decoded to `u32` but not checked
//! against a node count. Use [`crate::validate`] for that.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::{ExclusionEdge, GraphSource, HierarchyEdge, LabelTable};
use crate::errors::{FrontendError, SourcePosition};

#[derive(Parser)]
#[grammar = "../grammar.pest"]
pub struct HexGraphParser;

/// Parses a graph source into its hierarchy and exclusion edge lists.
///
/// # Example
///
/// ```rust,ignore
/// use hexgraph_frontend::parse_graph_source;
///
/// let source = "nodes 3\nh 1 0\ne 1 2\n";
/// let graph = parse_graph_source(source)?;
/// assert_eq!(graph.hierarchy.len(), 1);
/// ```
pub fn parse_graph_source(source: &str) -> Result<GraphSource, FrontendError> {
    let mut pairs = HexGraphParser::parse(Rule::graph_file, source)
        .map_err(|e| FrontendError::ParseError(e.to_string()))?;

    let mut graph = GraphSource::default();
    let Some(file) = pairs.next() else {
        return Ok(graph);
    };

    for stmt in file.into_inner() {
        match stmt.as_rule() {
            Rule::nodes_stmt => {
                let position = position_of(&stmt);
                let [count] = indices::<1>(stmt)?;
                if let Some(previous) = graph.declared_nodes {
                    return Err(FrontendError::at(
                        position,
                        format!("node count declared twice ({} and {})", previous, count),
                    ));
                }
                graph.declared_nodes = Some(count);
            }
            Rule::hierarchy_stmt => {
                let position = position_of(&stmt);
                let [child, parent] = indices::<2>(stmt)?;
                graph.hierarchy.push(HierarchyEdge {
                    child,
                    parent,
                    position,
                });
            }
            Rule::exclusion_stmt => {
                let position = position_of(&stmt);
                let [a, b] = indices::<2>(stmt)?;
                graph.exclusion.push(ExclusionEdge { a, b, position });
            }
            Rule::EOI => {}
            other => {
                return Err(FrontendError::ParseError(format!(
                    "unexpected rule in graph source: {:?}",
                    other
                )))
            }
        }
    }

    Ok(graph)
}

/// Parses a label table: one name per non-empty line.
pub fn parse_label_table(source: &str) -> Result<LabelTable, FrontendError> {
    let mut pairs = HexGraphParser::parse(Rule::label_file, source)
        .map_err(|e| FrontendError::ParseError(e.to_string()))?;

    let mut table = LabelTable::default();
    let Some(file) = pairs.next() else {
        return Ok(table);
    };

    for item in file.into_inner() {
        if item.as_rule() == Rule::label_name {
            let name = item.as_str().trim();
            if !name.is_empty() {
                table.names.push(name.to_string());
            }
        }
    }

    Ok(table)
}

fn position_of(pair: &Pair<'_, Rule>) -> SourcePosition {
    let (line, column) = pair.as_span().start_pos().line_col();
    SourcePosition {
        line: line as u32,
        column: column as u32,
    }
}

fn indices<const N: usize>(stmt: Pair<'_, Rule>) -> Result<[u32; N], FrontendError> {
    let mut out = [0_u32; N];
    let mut filled = 0;
    for pair in stmt.into_inner() {
        if pair.as_rule() != Rule::index {
            continue;
        }
        if filled == N {
            return Err(FrontendError::ParseError(format!(
                "too many indices in statement at line {}",
                position_of(&pair).line
            )));
        }
        out[filled] = pair.as_str().parse::<u32>().map_err(|e| {
            FrontendError::ParseError(format!(
                "invalid label index '{}' at line {}: {}",
                pair.as_str(),
                position_of(&pair).line,
                e
            ))
        })?;
        filled += 1;
    }
    if filled != N {
        return Err(FrontendError::ParseError(format!(
            "expected {} indices, found {}",
            N, filled
        )));
    }
    Ok(out)
}
