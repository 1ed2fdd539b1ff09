use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};

use roughsetdb_core::core::{
    descriptor::{DescTree, Descriptor},
    multi_index::TuplePosition,
    storage::StoredTable,
    types::{ColumnType, LogicalOperator, Operator, TypedValue},
    vc::VirtualColumn,
};

fn c(v: impl Into<TypedValue>) -> Arc<VirtualColumn> {
    VirtualColumn::constant(v)
}

fn null() -> Arc<VirtualColumn> {
    VirtualColumn::constant(TypedValue::Null)
}

/// One table of 64 rows, `a` random with every 9th row null.
fn random_column(seed: u64) -> (Arc<VirtualColumn>, Vec<TypedValue>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<TypedValue> = (0..64)
        .map(|i| {
            if i % 9 == 0 {
                TypedValue::Null
            } else {
                TypedValue::Int(rng.random_range(-20..20))
            }
        })
        .collect();
    let t = StoredTable::builder("t", 3)
        .column("a", ColumnType::Int, values.clone())
        .build()
        .unwrap();
    (VirtualColumn::column(&t, "a", 0).unwrap(), values)
}

fn check_rows(desc: &Descriptor, rows: u64) -> Vec<bool> {
    let mut pos = TuplePosition::new(1, 3);
    (0..rows)
        .map(|row| {
            pos.set_row(0, Some(row));
            desc.check_condition(&pos).unwrap()
        })
        .collect()
}

#[test]
fn comparison_with_empty_set() {
    let (a, _) = random_column(1);
    let empty = VirtualColumn::const_set(Vec::<i64>::new());

    for x in [c(-3i64), c(0i64), c(12i64)] {
        let mut all = Descriptor::compare(&x, Operator::EqAll, &empty, 1);
        all.simplify(false).unwrap();
        assert!(all.is_true());

        let mut any = Descriptor::compare(&x, Operator::EqAny, &empty, 1);
        any.simplify(false).unwrap();
        assert!(any.is_false());
    }

    // the same holds row by row for a column
    let all = Descriptor::compare(&a, Operator::EqAll, &empty, 1);
    assert!(check_rows(&all, 64).into_iter().all(|r| r));
    let any = Descriptor::compare(&a, Operator::EqAny, &empty, 1);
    assert!(check_rows(&any, 64).into_iter().all(|r| !r));
}

#[test]
fn between_with_a_null_bound() {
    for v in [-5i64, 0, 3, 7, 10] {
        // v NOT BETWEEN NULL AND 3  <=>  v > 3
        let mut d = Descriptor::between(&c(v), &null(), &c(3i64), 1);
        d.op = Operator::NotBetween;
        d.simplify(false).unwrap();
        assert_eq!(d.is_true(), v > 3, "{} NOT BETWEEN NULL AND 3", v);

        // v NOT BETWEEN 3 AND NULL  <=>  v < 3
        let mut d = Descriptor::between(&c(v), &c(3i64), &null(), 1);
        d.op = Operator::NotBetween;
        d.simplify(false).unwrap();
        assert_eq!(d.is_true(), v < 3, "{} NOT BETWEEN 3 AND NULL", v);

        for (lo, hi) in [(null(), c(3i64)), (c(3i64), null()), (null(), null())] {
            let mut d = Descriptor::between(&c(v), &lo, &hi, 1);
            d.simplify(false).unwrap();
            assert!(d.is_false());
            assert!(d.null_after_simplify);
        }
    }
}

fn random_leaf(rng: &mut StdRng, a: &Arc<VirtualColumn>) -> Descriptor {
    let v = rng.random_range(-20i64..20);
    match rng.random_range(0..8) {
        0 => Descriptor::compare(a, Operator::Less, &c(v), 1),
        1 => Descriptor::compare(a, Operator::MoreEq, &c(v), 1),
        2 => Descriptor::compare(a, Operator::NotEq, &c(v), 1),
        3 => Descriptor::unary(a, Operator::IsNull, 1),
        4 => Descriptor::between(a, &c(v), &c(v + 6), 1),
        5 => Descriptor::compare(&c(v), Operator::Less, &c(0i64), 1),
        6 => Descriptor::trivial(rng.random_bool(0.5), 1),
        _ => Descriptor::compare(a, Operator::In, &VirtualColumn::const_set([v, v + 1, v + 3]), 1),
    }
}

fn random_tree(rng: &mut StdRng, a: &Arc<VirtualColumn>) -> DescTree {
    let mut tree = DescTree::new(random_leaf(rng, a));
    for _ in 0..rng.random_range(1..5) {
        let lop = if rng.random_bool(0.5) { LogicalOperator::And } else { LogicalOperator::Or };
        if rng.random_bool(0.3) {
            let mut sub = DescTree::new(random_leaf(rng, a));
            sub.add_descriptor(LogicalOperator::Or, random_leaf(rng, a));
            tree.add_tree(lop, sub);
        } else {
            tree.add_descriptor(lop, random_leaf(rng, a));
        }
    }
    tree
}

#[test]
fn simplification_keeps_row_results() {
    let (a, _) = random_column(5);
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let original = Descriptor::from_tree(random_tree(&mut rng, &a), 1);
        let mut simplified = original.clone();
        simplified.simplify(false).unwrap();
        assert_eq!(
            check_rows(&simplified, 64),
            check_rows(&original, 64),
            "{} simplified to {}",
            original,
            simplified
        );
    }
}

#[test]
fn extracted_predicate_keeps_row_results() {
    let (a, _) = random_column(8);
    let common = Descriptor::compare(&a, Operator::More, &c(-4i64), 1);

    let mut left = DescTree::new(common.clone());
    left.add_descriptor(LogicalOperator::And, Descriptor::compare(&a, Operator::Less, &c(2i64), 1));
    let mut right = DescTree::new(Descriptor::compare(&a, Operator::Eq, &c(9i64), 1));
    right.add_descriptor(LogicalOperator::And, common);
    let mut tree = left;
    tree.add_tree(LogicalOperator::Or, right);

    let original = Descriptor::from_tree(tree.clone(), 1);
    let extracted = tree.extract_descriptor().expect("common predicate");
    let rest = Descriptor::from_tree(tree, 1);

    let expected = check_rows(&original, 64);
    let got: Vec<bool> = check_rows(&extracted, 64)
        .into_iter()
        .zip(check_rows(&rest, 64))
        .map(|(x, y)| x && y)
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn null_rows_fail_every_comparison() {
    let (a, values) = random_column(2);
    let d = Descriptor::compare(&a, Operator::NotEq, &c(1000i64), 1);
    for (row, pass) in check_rows(&d, 64).into_iter().enumerate() {
        assert_eq!(pass, !values[row].is_null());
    }
}
