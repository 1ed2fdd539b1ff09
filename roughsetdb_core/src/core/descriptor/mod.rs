pub mod check;
pub mod condition;
pub mod cq_term;
pub mod desc_tree;
pub mod descriptor;
pub mod display;
pub mod merge;
pub mod rough;
pub mod simplify;

pub use check::SubSelectOptimizationType;
pub use condition::Condition;
pub use cq_term::CQTerm;
pub use desc_tree::{DescTree, DescTreeNode, NodeId};
pub use descriptor::{Descriptor, DescriptorJoinType};

#[cfg(test)]
mod desc_tree_tests {
    include!("desc_tree_tests.rs");
}
