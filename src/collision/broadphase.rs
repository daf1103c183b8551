//! Broad phase: dynamic AABB tree, potential-pair table and the proxy trait
//! connecting both to user payloads.

pub mod pair_set;
pub mod proxy;
pub mod tree;

pub use pair_set::{Pair, PairHashSet};
pub use proxy::{different_owners, TreeProxy};
pub use tree::{DynamicTree, Node, PairFilter, TreeTraversal, NULL_NODE};
