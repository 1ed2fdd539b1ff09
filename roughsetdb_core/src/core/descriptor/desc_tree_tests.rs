use std::sync::Arc;

use crate::core::{
    descriptor::{DescTree, Descriptor},
    multi_index::{MIUpdatingIterator, MultiIndex, TuplePosition},
    storage::StoredTable,
    types::{DimensionVector, LogicalOperator, Operator, RoughSetValue, Tribool},
    vc::VirtualColumn,
};

fn column(name: &str, dim: usize) -> Arc<VirtualColumn> {
    let t = StoredTable::builder(name, 2)
        .int_column("a", 0..16)
        .int_column("b", (0..16).map(|v| v % 4))
        .build()
        .unwrap();
    VirtualColumn::column(&t, "a", dim).unwrap()
}

fn c(v: i64) -> Arc<VirtualColumn> {
    VirtualColumn::constant(v)
}

fn or_tree(d1: Descriptor, d2: Descriptor) -> DescTree {
    let mut tree = DescTree::new(d1);
    tree.add_descriptor(LogicalOperator::Or, d2);
    tree
}

fn filter_rows(desc: &mut Descriptor, rows: u64) -> Vec<u64> {
    let mut mind = MultiIndex::new(vec![rows], 2, u64::MAX);
    let mut it = MIUpdatingIterator::new(&mind, &DimensionVector::with_dims(1, &[0])).unwrap();
    while it.is_valid() {
        desc.evaluate_pack(&mut it).unwrap();
    }
    it.commit(&mut mind).unwrap();
    mind.get_filter(0).unwrap().rows().collect()
}

#[test]
fn constant_branches_fold_away() {
    let a = column("t", 0);
    let tree = or_tree(
        Descriptor::compare(&a, Operator::Eq, &c(5), 1),
        Descriptor::compare(&c(1), Operator::Eq, &c(2), 1),
    );
    let mut desc = Descriptor::from_tree(tree, 1);
    desc.simplify(false).unwrap();
    assert!(!desc.is_type_or_tree());
    assert_eq!(desc.op, Operator::Eq);

    let tree = or_tree(
        Descriptor::compare(&a, Operator::Eq, &c(5), 1),
        Descriptor::compare(&c(1), Operator::Less, &c(2), 1),
    );
    let mut desc = Descriptor::from_tree(tree, 1);
    desc.simplify(false).unwrap();
    assert!(desc.is_true());
}

#[test]
fn and_siblings_are_merged() {
    let a = column("t", 0);
    let mut tree = DescTree::new(Descriptor::unary(&a, Operator::IsNull, 1));
    tree.add_descriptor(LogicalOperator::And, Descriptor::compare(&a, Operator::Eq, &c(3), 1));
    assert_eq!(tree.simplify(false).unwrap(), Tribool::False);
    assert!(tree.root_desc().is_some_and(|d| d.is_false()));
}

#[test]
fn row_checks_follow_the_connectives() {
    let a = column("t", 0);
    let mut tree = or_tree(
        Descriptor::compare(&a, Operator::Less, &c(2), 1),
        Descriptor::compare(&a, Operator::More, &c(13), 1),
    );
    tree.add_descriptor(LogicalOperator::And, Descriptor::compare(&a, Operator::NotEq, &c(0), 1));

    let mut pos = TuplePosition::new(1, 2);
    let passing: Vec<u64> = (0..16)
        .filter(|row| {
            pos.set_row(0, Some(*row));
            tree.check_condition(&pos).unwrap()
        })
        .collect();
    assert_eq!(passing, vec![1, 14, 15]);
    pos.set_row(0, Some(7));
    assert!(!tree.is_null(&pos).unwrap());
}

#[test]
fn pack_evaluation_uses_rough_values() {
    let a = column("t", 0);
    let mut desc = Descriptor::from_tree(
        or_tree(
            Descriptor::compare(&a, Operator::Less, &c(2), 1),
            Descriptor::compare(&a, Operator::More, &c(13), 1),
        ),
        1,
    );
    assert_eq!(filter_rows(&mut desc, 16), vec![0, 1, 14, 15]);

    // both branches partially match the first pack
    let mut desc = Descriptor::from_tree(
        or_tree(
            Descriptor::compare(&a, Operator::Less, &c(1), 1),
            Descriptor::compare(&a, Operator::Eq, &c(3), 1),
        ),
        1,
    );
    assert_eq!(filter_rows(&mut desc, 16), vec![0, 3]);

    let mut tree = DescTree::new(Descriptor::compare(&a, Operator::MoreEq, &c(2), 1));
    tree.add_descriptor(LogicalOperator::And, Descriptor::compare(&a, Operator::Less, &c(6), 1));
    let mut desc = Descriptor::from_tree(tree, 1);
    assert_eq!(filter_rows(&mut desc, 16), vec![2, 3, 4, 5]);
}

#[test]
fn common_predicate_is_extracted() {
    let a = column("t", 0);
    let common = Descriptor::compare(&a, Operator::More, &c(3), 1);
    let mut left = DescTree::new(common.clone());
    left.add_descriptor(LogicalOperator::And, Descriptor::compare(&a, Operator::Less, &c(6), 1));
    let mut right = DescTree::new(common.clone());
    right.add_descriptor(LogicalOperator::And, Descriptor::compare(&a, Operator::Eq, &c(9), 1));
    left.add_tree(LogicalOperator::Or, right);

    let extracted = left.extract_descriptor();
    assert_eq!(extracted, Some(common));
    assert_eq!(left.to_string(), "(t.a < 6 OR t.a = 9)");
    assert_eq!(left.leaves().len(), 2);
}

#[test]
fn nothing_to_extract_from_disjoint_branches() {
    let a = column("t", 0);
    let mut tree = or_tree(
        Descriptor::compare(&a, Operator::Less, &c(2), 1),
        Descriptor::compare(&a, Operator::More, &c(13), 1),
    );
    assert!(tree.extract_descriptor().is_none());
    assert_eq!(tree.leaves().len(), 2);
}

#[test]
fn weights_order_the_children() {
    let a = column("t", 0);
    let mut tree = DescTree::new(Descriptor::compare(&a, Operator::Eq, &c(5), 1));
    tree.add_descriptor(LogicalOperator::And, Descriptor::unary(&a, Operator::IsNull, 1));
    let mut cost = |d: &Descriptor, _for_or: bool| if d.op == Operator::IsNull { 1.0 } else { 10.0 };
    assert_eq!(tree.evaluate_condition_weight(&mut cost, false), 12.0);
    assert_eq!(tree.to_string(), "(t.a IS NULL AND t.a = 5)");
}

#[test]
fn or_over_different_dimensions_may_pass_nulls() {
    let a = column("t", 0);
    let b = column("u", 1);
    let or = or_tree(
        Descriptor::compare(&a, Operator::Eq, &c(5), 2),
        Descriptor::compare(&b, Operator::Eq, &c(1), 2),
    );
    assert!(or.null_may_be_true());

    let mut and = DescTree::new(Descriptor::compare(&a, Operator::Eq, &c(5), 2));
    and.add_descriptor(LogicalOperator::And, Descriptor::compare(&b, Operator::Eq, &c(1), 2));
    assert!(!and.null_may_be_true());

    let desc = Descriptor::from_tree(and, 2);
    assert!(desc.is_type_join_complex());
}

#[test]
fn accumulated_leaves_become_constants() {
    let a = column("t", 0);
    let mut desc = Descriptor::from_tree(
        or_tree(
            Descriptor::compare(&a, Operator::Less, &c(100), 1),
            Descriptor::compare(&a, Operator::More, &c(100), 1),
        ),
        1,
    );
    let mut pos = TuplePosition::new(1, 2);
    for pack in 0..4 {
        pos.set_pack(0, pack);
        desc.rough_accumulate(&pos);
    }
    let tree = desc.tree.as_ref().unwrap();
    let rvs: Vec<RoughSetValue> = tree.leaf_descriptors().map(|d| d.rv).collect();
    assert_eq!(rvs, vec![RoughSetValue::All, RoughSetValue::None]);

    desc.simplify_after_rough_accumulate().unwrap();
    assert!(desc.is_true());
}
