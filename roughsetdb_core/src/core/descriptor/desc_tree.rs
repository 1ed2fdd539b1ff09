use std::fmt;

use crate::core::{
    error::{FilterError, Result},
    multi_index::{MIUpdatingIterator, TuplePosition},
    types::{DimensionVector, LogicalOperator, Operator, RoughSetValue, Tribool},
};

use super::Descriptor;

pub type NodeId = usize;

/// Node of a [`DescTree`]. Inner nodes carry an `OR TREE` descriptor whose
/// `lop` combines the two children, leaves carry the predicate itself.
#[derive(Debug, Clone, Default)]
pub struct DescTreeNode {
    pub desc: Descriptor,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
}

impl DescTreeNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    #[inline]
    fn children(&self) -> Option<(NodeId, NodeId)> {
        Some((self.left?, self.right?))
    }
}

/// Arena backed binary tree of predicates joined by AND/OR.
/// Cloning produces an independent deep copy.
#[derive(Debug, Clone)]
pub struct DescTree {
    nodes: Vec<DescTreeNode>,
    free: Vec<NodeId>,
    root: NodeId,
}

#[inline]
fn op_tribool(op: Operator) -> Tribool {
    match op {
        Operator::True => Tribool::True,
        Operator::False => Tribool::False,
        _ => Tribool::Unknown,
    }
}

impl DescTree {
    pub fn new(desc: Descriptor) -> Self {
        Self {
            nodes: vec![DescTreeNode {
                desc,
                ..Default::default()
            }],
            free: Vec::new(),
            root: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &DescTreeNode {
        &self.nodes[id]
    }

    /// Descriptor of the root, a leaf predicate if the tree was reduced to one node.
    pub fn root_desc(&self) -> Option<&Descriptor> {
        self.nodes.get(self.root).map(|n| &n.desc)
    }

    fn alloc(&mut self, node: DescTreeNode) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = DescTreeNode::default();
        self.free.push(id);
    }

    fn release_subtree(&mut self, id: NodeId) {
        if let Some((left, right)) = self.nodes[id].children() {
            self.release_subtree(left);
            self.release_subtree(right);
        }
        self.release(id);
    }

    fn inner_node(&self, lop: LogicalOperator, left: NodeId, right: NodeId) -> DescTreeNode {
        let no_dims = self.nodes[self.root].desc.right_dims.size();
        DescTreeNode {
            desc: Descriptor {
                op: Operator::OrTree,
                lop,
                left_dims: DimensionVector::new(no_dims),
                right_dims: DimensionVector::new(no_dims),
                ..Default::default()
            },
            parent: None,
            left: Some(left),
            right: Some(right),
        }
    }

    fn set_root(&mut self, node: DescTreeNode) {
        let (left, right) = (node.left, node.right);
        let id = self.alloc(node);
        for child in [left, right].into_iter().flatten() {
            self.nodes[child].parent = Some(id);
        }
        self.root = id;
    }

    /// The current tree becomes the left child of a new `lop` root, `desc` the right one.
    pub fn add_descriptor(&mut self, lop: LogicalOperator, desc: Descriptor) {
        let right = self.alloc(DescTreeNode {
            desc,
            ..Default::default()
        });
        let root = self.inner_node(lop, self.root, right);
        self.set_root(root);
    }

    /// Like [`DescTree::add_descriptor`] with a whole tree as the right child.
    pub fn add_tree(&mut self, lop: LogicalOperator, other: DescTree) {
        let offset = self.nodes.len();
        let shift = |id: Option<NodeId>| id.map(|i| i + offset);
        self.nodes.extend(other.nodes.into_iter().map(|n| DescTreeNode {
            desc: n.desc,
            parent: shift(n.parent),
            left: shift(n.left),
            right: shift(n.right),
        }));
        self.free.extend(other.free.into_iter().map(|i| i + offset));
        let root = self.inner_node(lop, self.root, other.root + offset);
        self.set_root(root);
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match self.nodes[id].children() {
            Some((left, right)) => {
                self.collect_leaves(left, out);
                self.collect_leaves(right, out);
            }
            None => out.push(id),
        }
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(self.root, &mut out);
        out
    }

    pub fn leaf_descriptors(&self) -> impl Iterator<Item = &Descriptor> + '_ {
        self.leaves().into_iter().map(move |id| &self.nodes[id].desc)
    }

    pub fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut Descriptor)) {
        for id in self.leaves() {
            f(&mut self.nodes[id].desc);
        }
    }

    /// Puts `dst` in place of `src` and drops `src`. Its other child must
    /// already be released.
    fn replace_node(&mut self, src: NodeId, dst: NodeId) -> Tribool {
        let parent = self.nodes[src].parent;
        self.nodes[dst].parent = parent;
        match parent {
            Some(p) => {
                if self.nodes[p].left == Some(src) {
                    self.nodes[p].left = Some(dst);
                } else {
                    self.nodes[p].right = Some(dst);
                }
            }
            None => self.root = dst,
        }
        self.release(src);
        op_tribool(self.nodes[dst].desc.op)
    }

    /// Folds constant parts of the tree and merges sibling leaves under AND.
    pub fn simplify(&mut self, in_having: bool) -> Result<Tribool> {
        self.simplify_node(self.root, in_having)
    }

    fn simplify_node(&mut self, id: NodeId, in_having: bool) -> Result<Tribool> {
        let Some((left, right)) = self.nodes[id].children() else {
            let desc = &mut self.nodes[id].desc;
            desc.simplify(in_having)?;
            return Ok(op_tribool(desc.op));
        };
        let left_res = self.simplify_node(left, in_having)?;
        let right_res = self.simplify_node(right, in_having)?;

        // the children may have been replaced by their own children
        let (left, right) = self
            .nodes[id]
            .children()
            .ok_or_else(|| FilterError::Internal("descriptor tree node lost a child".into()))?;
        let lop = self.nodes[id].desc.lop;
        let mut res = match lop {
            LogicalOperator::And => Tribool::and(left_res, right_res),
            LogicalOperator::Or => Tribool::or(left_res, right_res),
        };

        if !res.is_unknown() {
            self.release_subtree(left);
            self.release_subtree(right);
            let node = &mut self.nodes[id];
            node.left = None;
            node.right = None;
            node.desc.collapse(res.is_true());
            return Ok(res);
        }

        if lop == LogicalOperator::And && self.nodes[left].is_leaf() && self.nodes[right].is_leaf() {
            let second = self.nodes[right].desc.clone();
            if self.nodes[left].desc.try_to_merge(&second) {
                self.release(right);
                res = self.replace_node(id, left);
            }
        } else if lop == LogicalOperator::Or {
            let (keep, drop) = if self.nodes[left].desc.is_false() {
                (right, left)
            } else if self.nodes[right].desc.is_false() {
                (left, right)
            } else {
                return Ok(res);
            };
            self.release_subtree(drop);
            res = self.replace_node(id, keep);
        }
        Ok(res)
    }

    /// Rough verdict of the whole tree. Every node accumulates its own value in `rv`.
    pub fn evaluate_roughly_pack(&mut self, pos: &TuplePosition) -> RoughSetValue {
        self.evaluate_roughly_node(self.root, pos)
    }

    fn evaluate_roughly_node(&mut self, id: NodeId, pos: &TuplePosition) -> RoughSetValue {
        let Some((left, right)) = self.nodes[id].children() else {
            return self.nodes[id].desc.evaluate_roughly_pack(pos);
        };
        let left_res = self.evaluate_roughly_node(left, pos);
        let right_res = self.evaluate_roughly_node(right, pos);
        let desc = &mut self.nodes[id].desc;
        let r = match desc.lop {
            LogicalOperator::And => RoughSetValue::and(left_res, right_res),
            LogicalOperator::Or => RoughSetValue::or(left_res, right_res),
        };
        desc.rv.accumulate(r);
        r
    }

    pub fn clear_rough_values(&mut self) {
        for node in self.nodes.iter_mut() {
            node.desc.rv = RoughSetValue::Unknown;
        }
    }

    pub fn rough_accumulate(&mut self, pos: &TuplePosition) {
        for id in self.leaves() {
            self.nodes[id].desc.rough_accumulate(pos);
        }
    }

    /// Turns leaves accumulated as `NONE`/`ALL` into `FALSE`/`TRUE`.
    /// Returns true if any leaf changed.
    pub fn use_rough_accumulated(&mut self) -> bool {
        let mut changed = false;
        for id in self.leaves() {
            let desc = &mut self.nodes[id].desc;
            match desc.rv {
                RoughSetValue::None => {
                    desc.collapse(false);
                    changed = true;
                }
                RoughSetValue::All => {
                    desc.collapse(true);
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }

    pub fn check_condition(&self, pos: &TuplePosition) -> Result<bool> {
        self.check_node(self.root, pos)
    }

    fn check_node(&self, id: NodeId, pos: &TuplePosition) -> Result<bool> {
        let node = &self.nodes[id];
        let Some((left, right)) = node.children() else {
            return node.desc.check_condition(pos);
        };
        Ok(match node.desc.lop {
            LogicalOperator::And => self.check_node(left, pos)? && self.check_node(right, pos)?,
            LogicalOperator::Or => self.check_node(left, pos)? || self.check_node(right, pos)?,
        })
    }

    /// True if the tree is not satisfied because of a null, not a definite mismatch.
    pub fn is_null(&self, pos: &TuplePosition) -> Result<bool> {
        self.is_null_node(self.root, pos)
    }

    fn is_null_node(&self, id: NodeId, pos: &TuplePosition) -> Result<bool> {
        let node = &self.nodes[id];
        let Some((left, right)) = node.children() else {
            return node.desc.is_null(pos);
        };
        let left_res = self.check_node(left, pos)?;
        let right_res = self.check_node(right, pos)?;
        match node.desc.lop {
            LogicalOperator::And => Ok((left_res && !right_res && self.is_null_node(right, pos)?)
                || (!left_res && right_res && self.is_null_node(left, pos)?)),
            LogicalOperator::Or => Ok(!left_res
                && !right_res
                && (self.is_null_node(right, pos)? || self.is_null_node(left, pos)?)),
        }
    }

    /// Exact evaluation of the current pack of `it`. The rough values of the
    /// nodes must describe this pack.
    pub fn evaluate_pack(&mut self, it: &mut MIUpdatingIterator) -> Result<()> {
        self.evaluate_pack_node(self.root, it)
    }

    fn evaluate_pack_node(&mut self, id: NodeId, it: &mut MIUpdatingIterator) -> Result<()> {
        if it.single_filter_dim().is_none() {
            while it.is_valid() {
                if !self.check_node(id, it.position())? {
                    it.reset_current();
                }
                it.advance();
                if it.packrow_started() {
                    break;
                }
            }
            return Ok(());
        }

        let Some((left, right)) = self.nodes[id].children() else {
            return self.nodes[id].desc.evaluate_pack(it);
        };
        let (left_rv, right_rv) = (self.nodes[left].desc.rv, self.nodes[right].desc.rv);
        let pack_start = it.current_pack();

        match self.nodes[id].desc.lop {
            LogicalOperator::And => {
                if left_rv == RoughSetValue::None || right_rv == RoughSetValue::None {
                    it.reset_current_pack();
                    it.next_packrow();
                    return Ok(());
                }
                if left_rv == RoughSetValue::All && right_rv == RoughSetValue::All {
                    it.next_packrow();
                    return Ok(());
                }
                if left_rv != RoughSetValue::All && it.is_valid() {
                    self.evaluate_pack_node(left, it)?;
                }
                // the pack may be empty already
                if right_rv != RoughSetValue::All && it.rewind_to_pack(pack_start) {
                    self.evaluate_pack_node(right, it)?;
                }
            }
            LogicalOperator::Or => {
                if left_rv == RoughSetValue::None && right_rv == RoughSetValue::None {
                    it.reset_current_pack();
                    it.next_packrow();
                    return Ok(());
                }
                if left_rv == RoughSetValue::All || right_rv == RoughSetValue::All {
                    it.next_packrow();
                    return Ok(());
                }
                if left_rv == RoughSetValue::None {
                    return self.evaluate_pack_node(right, it);
                }
                if right_rv == RoughSetValue::None {
                    return self.evaluate_pack_node(left, it);
                }
                let mut saved = it.new_pack_filter(pack_start);
                self.evaluate_pack_node(left, it)?;
                // `saved` now holds what the left branch kept
                if it.swap_pack_filter(pack_start, &mut saved) {
                    it.rewind_to_pack(pack_start);
                    self.evaluate_pack_node(right, it)?;
                    it.or_pack_filter(pack_start, &saved);
                }
            }
        }
        Ok(())
    }

    /// Orders the children of every node by `cost` and returns the total weight.
    /// For AND the cheaper branch goes first, for OR the one more likely to pass.
    pub fn evaluate_condition_weight(
        &mut self,
        cost: &mut dyn FnMut(&Descriptor, bool) -> f64,
        for_or: bool,
    ) -> f64 {
        self.condition_weight_node(self.root, cost, for_or)
    }

    fn condition_weight_node(
        &mut self,
        id: NodeId,
        cost: &mut dyn FnMut(&Descriptor, bool) -> f64,
        for_or: bool,
    ) -> f64 {
        let Some((left, right)) = self.nodes[id].children() else {
            return cost(&self.nodes[id].desc, for_or);
        };
        let or_here = self.nodes[id].desc.lop == LogicalOperator::Or;
        let e1 = self.condition_weight_node(left, cost, or_here);
        let e2 = self.condition_weight_node(right, cost, or_here);
        if e1 > e2 {
            let node = &mut self.nodes[id];
            std::mem::swap(&mut node.left, &mut node.right);
        }
        e1 + e2 + 1.0
    }

    /// Removes the predicate occurring most often which every row satisfying
    /// the tree also satisfies. The caller ANDs it to the condition.
    pub fn extract_descriptor(&mut self) -> Option<Descriptor> {
        let mut counts: Vec<(usize, Descriptor)> = Vec::new();
        for id in self.leaves() {
            let desc = &self.nodes[id].desc;
            match counts.iter_mut().find(|(_, d)| d == desc) {
                Some(entry) => entry.0 += 1,
                None => counts.push((1, desc.clone())),
            }
        }
        counts.sort_by_key(|(n, _)| *n);
        let (_, desc) = counts
            .into_iter()
            .rev()
            .find(|(_, desc)| self.can_be_extracted(self.root, desc))?;
        self.extract_node(self.root, &desc);
        Some(desc)
    }

    fn can_be_extracted(&self, id: NodeId, searched: &Descriptor) -> bool {
        let node = &self.nodes[id];
        match node.children() {
            Some((left, right)) => match node.desc.lop {
                LogicalOperator::And => {
                    self.can_be_extracted(left, searched) || self.can_be_extracted(right, searched)
                }
                LogicalOperator::Or => {
                    self.can_be_extracted(left, searched) && self.can_be_extracted(right, searched)
                }
            },
            None => match node.parent.map(|p| self.nodes[p].desc.lop) {
                Some(LogicalOperator::And) => node.desc.implies(searched),
                Some(LogicalOperator::Or) => node.desc == *searched,
                None => false,
            },
        }
    }

    fn extract_node(&mut self, id: NodeId, searched: &Descriptor) {
        let Some((left, right)) = self.nodes[id].children() else {
            return;
        };
        if !self.nodes[left].is_leaf() {
            self.extract_node(left, searched);
        } else if self.nodes[left].desc == *searched {
            self.release(left);
            self.drop_extracted(id, right, searched);
            return;
        }

        let Some(right) = self.nodes[id].right else {
            return;
        };
        if !self.nodes[right].is_leaf() {
            self.extract_node(right, searched);
        } else if self.nodes[right].desc == *searched {
            self.release(right);
            if let Some(left) = self.nodes[id].left {
                self.drop_extracted(id, left, searched);
            }
        }
    }

    /// `id` lost the extracted child, `sibling` takes its place.
    fn drop_extracted(&mut self, id: NodeId, sibling: NodeId, searched: &Descriptor) {
        let parent_is_or = self.nodes[id].desc.lop == LogicalOperator::Or;
        let no_dims = self.nodes[id].desc.right_dims.size();
        self.replace_node(id, sibling);
        if parent_is_or {
            // x OR (searched ...) is implied by the extracted predicate
            if let Some((l, r)) = self.nodes[sibling].children() {
                self.release_subtree(l);
                self.release_subtree(r);
            }
            let node = &mut self.nodes[sibling];
            node.left = None;
            node.right = None;
            node.desc = Descriptor::trivial(true, no_dims);
        } else if !self.nodes[sibling].is_leaf() {
            self.extract_node(sibling, searched);
        }
    }

    pub fn is_parameterized(&self) -> bool {
        self.leaf_descriptors().any(|d| d.is_parameterized())
    }

    pub fn without_attrs(&self) -> bool {
        self.leaf_descriptors().all(|d| d.without_attrs())
    }

    pub fn dimension_used(&self, dims: &mut DimensionVector) {
        for d in self.leaf_descriptors() {
            d.dimension_used(dims);
        }
    }

    pub fn null_may_be_true(&self) -> bool {
        self.null_may_be_true_node(self.root)
    }

    fn null_may_be_true_node(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        let Some((left, right)) = node.children() else {
            return node.desc.null_may_be_true();
        };
        if self.null_may_be_true_node(left) || self.null_may_be_true_node(right) {
            return true;
        }
        // (a1 = 3) OR TRUE: both branches must cover the same dimensions
        if node.desc.lop == LogicalOperator::Or {
            let no_dims = node.desc.right_dims.size();
            let mut dims1 = DimensionVector::new(no_dims);
            let mut dims2 = DimensionVector::new(no_dims);
            self.dims_of_node(left, &mut dims1);
            self.dims_of_node(right, &mut dims2);
            return !dims1.same_dims(&dims2);
        }
        false
    }

    fn dims_of_node(&self, id: NodeId, dims: &mut DimensionVector) {
        let mut leaves = Vec::new();
        self.collect_leaves(id, &mut leaves);
        for leaf in leaves {
            self.nodes[leaf].desc.dimension_used(dims);
        }
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[id];
        match node.children() {
            Some((left, right)) => {
                f.write_str("(")?;
                self.fmt_node(left, f)?;
                write!(f, " {} ", node.desc.lop)?;
                self.fmt_node(right, f)?;
                f.write_str(")")
            }
            None => write!(f, "{}", node.desc),
        }
    }
}

impl fmt::Display for DescTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(self.root, f)
    }
}
