//! Phylogenetic time trees for the Verdant sampler.
//!
//! - **Tree data structure** — rooted binary trees with node heights, stored
//!   as an arena and edited through a journal that supports exact rollback
//! - **Newick I/O** — read and write trees with branch lengths

pub mod newick;
pub mod tree;

pub use tree::{EdgeIndex, Node, NodeId, Tree};
