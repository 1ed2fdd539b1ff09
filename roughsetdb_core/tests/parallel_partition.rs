use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};

use roughsetdb_core::{
    configuration::Configuration,
    core::{
        descriptor::{Condition, DescTree, Descriptor},
        filter::ParameterizedFilter,
        storage::{StoredTable, TempTable},
        types::{LogicalOperator, Operator},
        vc::VirtualColumn,
    },
};

const ROWS: i64 = 20_000;

fn table() -> (Arc<TempTable>, Arc<VirtualColumn>, Arc<VirtualColumn>) {
    let mut rng = StdRng::seed_from_u64(2024);
    let a: Vec<i64> = (0..ROWS).map(|_| rng.random_range(0..1_000)).collect();
    let b: Vec<i64> = (0..ROWS).map(|i| i / 100 + rng.random_range(0..10)).collect();
    let t = StoredTable::builder("t", 8)
        .int_column("a", a)
        .int_column("b", b)
        .deleted_rows(&[3, 700, 701, 19_999])
        .build()
        .unwrap();
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    let b = VirtualColumn::column(&t, "b", 0).unwrap();
    (Arc::new(TempTable::new(vec![t]).unwrap()), a, b)
}

fn conditions(a: &Arc<VirtualColumn>, b: &Arc<VirtualColumn>) -> Condition {
    let c = |v: i64| VirtualColumn::constant(v);
    let mut tree = DescTree::new(Descriptor::compare(a, Operator::Less, &c(100), 1));
    tree.add_descriptor(LogicalOperator::Or, Descriptor::compare(a, Operator::MoreEq, &c(900), 1));
    [
        Descriptor::from_tree(tree, 1),
        Descriptor::between(b, &c(20), &c(150), 1),
        Descriptor::compare(a, Operator::NotEq, b, 1),
    ]
    .into_iter()
    .collect()
}

fn filter_with_pool(pool_size: usize) -> (Vec<u64>, u64) {
    let (table, a, b) = table();
    let config = Arc::new(Configuration {
        thread_pool_size: Some(pool_size),
        ..Default::default()
    });
    let mut pf = ParameterizedFilter::with_configuration(table, config);
    pf.add_conditions(conditions(&a, &b)).unwrap();
    pf.update_multi_index(false, None).unwrap();
    let rows = pf.mind().get_filter(0).unwrap().rows().collect();
    (rows, pf.mind().num_of_tuples())
}

#[test]
fn any_number_of_tasks_gives_the_sequential_result() {
    let (expected, tuples) = filter_with_pool(0);
    assert!(!expected.is_empty());
    assert_eq!(tuples, expected.len() as u64);

    for pool_size in [1, 2, 3, 7, 16, 79, 200] {
        let (rows, n) = filter_with_pool(pool_size);
        assert_eq!(rows, expected, "pool size {}", pool_size);
        assert_eq!(n, tuples);
    }
}

#[test]
fn sequential_result_matches_brute_force() {
    let (table, a, b) = table();
    let t = table.table(0);
    let a_col = a.as_single().unwrap();
    let b_col = b.as_single().unwrap();
    let (expected, _) = filter_with_pool(0);

    let brute: Vec<u64> = (0..ROWS as u64)
        .filter(|row| !t.is_deleted(*row))
        .filter(|row| {
            let va = a_col.data().value(*row).as_i64().unwrap();
            let vb = b_col.data().value(*row).as_i64().unwrap();
            (va < 100 || va >= 900) && (20..=150).contains(&vb) && va != vb
        })
        .collect();
    assert_eq!(expected, brute);
}
