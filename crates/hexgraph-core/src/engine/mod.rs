//! The inference engine for HEX graphs.
//!
//! This module provides:
//! - **errors**: Error types for graph construction, inference, and layers
//! - **graph**: Immutable label graph with cached hierarchy closure
//! - **label_state**: Bitset assignments over label nodes
//! - **state_space**: Branch-and-bound enumeration of consistent states
//! - **junction_tree**: Clique-forest factorization for larger graphs
//! - **partition**: Strategy selection between the two representations
//! - **inference**: Partition function, marginals, losses and gradients

pub mod errors;
pub mod graph;
pub mod inference;
pub mod junction_tree;
pub mod label_state;
pub mod numeric;
pub mod partition;
pub mod state_space;
