//! Address-space browsing
//!
//! - [`AddressSpaceWalker`] - Depth-first walk under a path filter and limits
//! - [`BrowseTree`] - Display tree with inline annotations
//! - [`PathIndex`] - `path label -> node id` indexes for directories and variables

pub mod index;
pub mod tree;
pub mod walker;

pub use index::PathIndex;
pub use tree::{BrowseNode, BrowseTree, TreeId};
pub use walker::{walk, AddressSpaceWalker, BrowseResult, WalkOptions, WalkStats};
