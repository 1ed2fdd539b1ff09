use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use arc_swap::ArcSwap;
use log::LevelFilter;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use roughsetdb_core::{
    configuration::{self, Configuration},
    core::{
        descriptor::{Condition, Descriptor},
        error::Result,
        filter::ParameterizedFilter,
        multi_index::{DimensionGroup, MultiIndex, TuplePosition},
        storage::{StoredTable, TempTable},
        types::{ColumnType, DimensionVector, Operator, RoughSetValue, TypedValue},
        vc::{SubqueryProvider, VirtualColumn},
    },
};

fn c(v: i64) -> Arc<VirtualColumn> {
    VirtualColumn::constant(v)
}

fn sequential() -> Arc<Configuration> {
    Arc::new(Configuration {
        thread_pool_size: Some(0),
        ..Default::default()
    })
}

fn passing_rows(mind: &MultiIndex, dim: usize) -> Vec<u64> {
    mind.get_filter(dim).map(|f| f.rows().collect()).unwrap_or_default()
}

#[test]
fn cheap_equality_runs_before_column_comparison() {
    configuration::init_logging(LevelFilter::Debug);

    // 10 000 rows in packs of 4096
    let rows = 0..10_000i64;
    let t = StoredTable::builder("t", 12)
        .int_column("col_a", rows.clone().map(|i| i % 10))
        .int_column("col_b", rows.clone().map(|i| i % 7))
        .int_column("col_c", rows.clone().map(|i| i % 5))
        .build()
        .unwrap();
    let col_a = VirtualColumn::column(&t, "col_a", 0).unwrap();
    let col_b = VirtualColumn::column(&t, "col_b", 0).unwrap();
    let col_c = VirtualColumn::column(&t, "col_c", 0).unwrap();

    let table = Arc::new(TempTable::new(vec![t]).unwrap());
    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    let cond: Condition = [
        Descriptor::compare(&col_b, Operator::More, &col_c, 1),
        Descriptor::compare(&col_a, Operator::Eq, &c(5), 1),
    ]
    .into_iter()
    .collect();
    pf.add_conditions(cond).unwrap();
    pf.update_multi_index(false, None).unwrap();

    let first = &pf.get_conditions()[0];
    assert_eq!(first.op, Operator::Eq);
    assert!(first.attr.vc().is_some_and(|vc| Arc::ptr_eq(vc, &col_a)));
    assert!(pf.get_conditions()[0].evaluation < pf.get_conditions()[1].evaluation);

    let expected: Vec<u64> = rows
        .filter(|i| i % 10 == 5 && i % 7 > i % 5)
        .map(|i| i as u64)
        .collect();
    assert_eq!(passing_rows(pf.mind(), 0), expected);
    assert_eq!(pf.mind().num_of_tuples(), expected.len() as u64);
}

#[test]
fn empty_in_list_gives_no_tuples() {
    let t = StoredTable::builder("t", 4).int_column("col_x", 0..100).build().unwrap();
    let col_x = VirtualColumn::column(&t, "col_x", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![t]).unwrap());
    let empty = VirtualColumn::const_set(Vec::<i64>::new());

    let mut pf = ParameterizedFilter::with_configuration(Arc::clone(&table), sequential());
    pf.add_conditions(std::iter::once(Descriptor::compare(&col_x, Operator::In, &empty, 1)).collect())
        .unwrap();
    pf.update_multi_index(false, None).unwrap();
    assert!(pf.mind().zero_tuples());
    assert_eq!(pf.mind().num_of_tuples(), 0);

    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(std::iter::once(Descriptor::compare(&col_x, Operator::NotIn, &empty, 1)).collect())
        .unwrap();
    pf.update_multi_index(false, None).unwrap();
    assert_eq!(pf.mind().num_of_tuples(), 100);
}

fn left_join_tables() -> (Arc<TempTable>, Arc<VirtualColumn>, Arc<VirtualColumn>, Arc<VirtualColumn>) {
    let t1 = StoredTable::builder("t1", 2).int_column("a", 0..8).build().unwrap();
    let t2 = StoredTable::builder("t2", 2)
        .int_column("b", 0..4)
        .column(
            "c",
            ColumnType::Int,
            vec![TypedValue::Null, TypedValue::Int(1), TypedValue::Int(5), TypedValue::Null],
        )
        .build()
        .unwrap();
    let a = VirtualColumn::column(&t1, "a", 0).unwrap();
    let b = VirtualColumn::column(&t2, "b", 1).unwrap();
    let c = VirtualColumn::column(&t2, "c", 1).unwrap();
    (Arc::new(TempTable::new(vec![t1, t2]).unwrap()), a, b, c)
}

fn left_join_where(a: &Arc<VirtualColumn>, b: &Arc<VirtualColumn>, where_cond: Descriptor) -> Condition {
    [Descriptor::compare(a, Operator::Eq, b, 2).outer(&[0], &[1]), where_cond]
        .into_iter()
        .collect()
}

#[test]
fn where_on_outer_side_waits_for_the_join() {
    let (table, a, b, c) = left_join_tables();
    let is_null = || Descriptor::unary(&c, Operator::IsNull, 2);

    let mut before = ParameterizedFilter::with_configuration(Arc::clone(&table), sequential());
    before.add_conditions(left_join_where(&a, &b, is_null())).unwrap();
    before.syntactical_descriptor_list_preprocessing(false).unwrap();
    let where_desc = before.get_conditions().iter().find(|d| d.op == Operator::IsNull).unwrap();
    assert!(where_desc.null_may_be_true());
    assert!(where_desc.is_delayed());

    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(left_join_where(&a, &b, is_null())).unwrap();
    pf.update_multi_index(false, None).unwrap();
    let where_desc = pf.get_conditions().iter().find(|d| d.op == Operator::IsNull).unwrap();
    assert!(!where_desc.is_delayed());

    // rows 0 and 3 match a null c, rows 4..8 have no partner at all
    assert_eq!(pf.mind().num_of_tuples(), 6);
    let Some(DimensionGroup::Joined(g)) = pf.mind().group_for(1) else {
        panic!("dimensions 0 and 1 are expected to be joined");
    };
    let (s0, s1) = (g.slot_of(0).unwrap(), g.slot_of(1).unwrap());
    let mut pairs: Vec<_> = g.tuples.iter().map(|t| (t[s0], t[s1])).collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            (Some(0), Some(0)),
            (Some(3), Some(3)),
            (Some(4), None),
            (Some(5), None),
            (Some(6), None),
            (Some(7), None),
        ]
    );
}

#[test]
fn null_rejecting_where_is_not_delayed() {
    let (table, a, b, c) = left_join_tables();
    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(left_join_where(&a, &b, Descriptor::compare(&c, Operator::Eq, &self::c(5), 2)))
        .unwrap();
    pf.update_multi_index(false, None).unwrap();

    assert!(pf.get_conditions().iter().all(|d| !d.is_delayed() && d.is_inner()));
    assert_eq!(pf.mind().num_of_tuples(), 1);
}

/// Values of pack `p` lie in `[100 * p, 100 * p + 100)`.
fn clustered_table(rng: &mut StdRng, packs: i64) -> Arc<StoredTable> {
    let values: Vec<i64> = (0..packs * 16)
        .map(|i| (i / 16) * 100 + rng.random_range(0..100))
        .collect();
    StoredTable::builder("t", 4).int_column("a", values).build().unwrap()
}

#[test]
fn rough_verdicts_agree_with_exact_result() {
    let mut rng = StdRng::seed_from_u64(17);
    let t = clustered_table(&mut rng, 10);
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![Arc::clone(&t)]).unwrap());
    let cond = || -> Condition { std::iter::once(Descriptor::compare(&a, Operator::Less, &c(450), 1)).collect() };

    let mut rough = ParameterizedFilter::with_configuration(Arc::clone(&table), sequential());
    rough.add_conditions(cond()).unwrap();
    rough.rough_update_param_filter().unwrap();

    let mut exact = ParameterizedFilter::with_configuration(table, sequential());
    exact.add_conditions(cond()).unwrap();
    exact.update_multi_index(false, None).unwrap();
    let f = exact.mind().get_filter(0).unwrap();

    let mut seen = (false, false);
    for p in 0..10 {
        match rough.rough_pack_status(0, p) {
            RoughSetValue::None => {
                seen.0 = true;
                assert!(f.is_empty_pack(p), "pack {} excluded roughly", p);
            }
            RoughSetValue::All => {
                seen.1 = true;
                assert!(f.is_full(p), "pack {} accepted roughly", p);
            }
            _ => {}
        }
    }
    assert!(seen.0 && seen.1);
    assert_eq!(rough.rough_pack_status(0, 4), RoughSetValue::Some);
}

#[test]
fn filtering_never_brings_rows_back() {
    let mut rng = StdRng::seed_from_u64(3);
    let t = clustered_table(&mut rng, 8);
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![t]).unwrap());

    let mut mind = MultiIndex::new(table.orig_sizes(), table.pack_power(), u64::MAX);
    let removed: Vec<u64> = (0..128).filter(|_| rng.random_bool(0.3)).collect();
    let f = mind.get_filter_mut(0).unwrap();
    for row in &removed {
        f.reset(*row);
    }
    mind.update_num_of_tuples();
    let before = passing_rows(&mind, 0);

    let mut pf = ParameterizedFilter::with_multi_index(table, mind, sequential());
    pf.add_conditions(std::iter::once(Descriptor::compare(&a, Operator::MoreEq, &c(250), 1)).collect())
        .unwrap();
    pf.update_multi_index(false, None).unwrap();
    let after = passing_rows(pf.mind(), 0);

    assert!(after.iter().all(|row| before.contains(row)));
    assert!(removed.iter().all(|row| !after.contains(row)));
    assert!(after.len() < before.len());
}

#[test]
fn second_pass_changes_nothing() {
    let mut rng = StdRng::seed_from_u64(11);
    let t = clustered_table(&mut rng, 8);
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![t]).unwrap());
    let cond = || -> Condition {
        [
            Descriptor::between(&a, &c(120), &c(530), 1),
            Descriptor::compare(&a, Operator::NotEq, &c(300), 1),
        ]
        .into_iter()
        .collect()
    };

    let mut pf = ParameterizedFilter::with_configuration(Arc::clone(&table), sequential());
    pf.add_conditions(cond()).unwrap();
    pf.update_multi_index(false, None).unwrap();
    let first = passing_rows(pf.mind(), 0);
    assert!(!first.is_empty());

    let mut again = ParameterizedFilter::with_multi_index(table, pf.into_multi_index(), sequential());
    again.add_conditions(cond()).unwrap();
    again.update_multi_index(false, None).unwrap();
    assert_eq!(passing_rows(again.mind(), 0), first);
}

#[test]
fn limit_stops_after_enough_rows() {
    let t = StoredTable::builder("t", 4).int_column("a", 0..256).build().unwrap();
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![t]).unwrap());

    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(std::iter::once(Descriptor::compare(&a, Operator::More, &c(100), 1)).collect())
        .unwrap();
    pf.update_multi_index(false, Some(20)).unwrap();

    let rows = passing_rows(pf.mind(), 0);
    assert!(rows.len() >= 20);
    assert!(rows.iter().all(|r| *r > 100));
    assert!(rows.len() < 155);
}

#[test]
fn deleted_rows_are_filtered_without_conditions() {
    let t = StoredTable::builder("t", 2)
        .int_column("alive", 0..12)
        .int_column("a", 0..12)
        .deleted_rows(&[1, 5, 6, 11])
        .liveness_column("alive")
        .build()
        .unwrap();
    let table = Arc::new(TempTable::new(vec![t]).unwrap());

    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.update_multi_index(false, None).unwrap();
    assert_eq!(passing_rows(pf.mind(), 0), vec![0, 2, 3, 4, 7, 8, 9, 10]);
    assert_eq!(pf.mind().num_of_tuples(), 8);
}

#[test]
fn cancelled_query_stops_with_an_error() {
    let t = StoredTable::builder("t", 4).int_column("a", 0..256).build().unwrap();
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![t]).unwrap());

    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(std::iter::once(Descriptor::compare(&a, Operator::NotEq, &c(7), 1)).collect())
        .unwrap();
    pf.mind().cancellation().cancel();
    let err = pf.update_multi_index(false, None).unwrap_err();
    assert!(matches!(err, roughsetdb_core::core::error::FilterError::Cancelled));
}

/// Rows of `dim` in the result, whether still filtered or already joined.
fn result_rows(mind: &MultiIndex, dim: usize) -> Vec<u64> {
    match mind.group_for(dim) {
        Some(DimensionGroup::Joined(g)) => {
            let slot = g.slot_of(dim).unwrap();
            let mut rows: Vec<u64> = g.tuples.iter().filter_map(|t| t[slot]).collect();
            rows.sort();
            rows
        }
        _ => passing_rows(mind, dim),
    }
}

fn eight_rows() -> (Arc<TempTable>, Arc<VirtualColumn>) {
    let t = StoredTable::builder("t", 2).int_column("a", 0..8).build().unwrap();
    let a = VirtualColumn::column(&t, "a", 0).unwrap();
    (Arc::new(TempTable::new(vec![t]).unwrap()), a)
}

fn run(table: &Arc<TempTable>, descs: impl IntoIterator<Item = Descriptor>) -> ParameterizedFilter {
    let mut pf = ParameterizedFilter::with_configuration(Arc::clone(table), sequential());
    pf.add_conditions(descs.into_iter().collect()).unwrap();
    pf.update_multi_index(false, None).unwrap();
    pf
}

/// Subquery correlated with dimension 0, returning `values(row)` for each outer row.
struct PerRowSubquery {
    values: Box<dyn Fn(u64) -> Vec<i64> + Send + Sync>,
    bounds: (TypedValue, TypedValue),
    parameterized: bool,
    calls: AtomicUsize,
}

impl PerRowSubquery {
    fn new(values: impl Fn(u64) -> Vec<i64> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            values: Box::new(values),
            bounds: (TypedValue::Null, TypedValue::Null),
            parameterized: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Always returns `v`, with `v` as its rough bounds too.
    fn constant(v: i64) -> Arc<Self> {
        Arc::new(Self {
            values: Box::new(move |_| vec![v]),
            bounds: (TypedValue::Int(v), TypedValue::Int(v)),
            parameterized: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn parameterized(values: impl Fn(u64) -> Vec<i64> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            values: Box::new(values),
            bounds: (TypedValue::Null, TypedValue::Null),
            parameterized: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SubqueryProvider for PerRowSubquery {
    fn evaluate(&self, pos: &TuplePosition) -> Result<Vec<TypedValue>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(pos
            .row(0)
            .map(|row| (self.values)(row).into_iter().map(TypedValue::Int).collect())
            .unwrap_or_default())
    }

    fn result_type(&self) -> ColumnType {
        ColumnType::Int
    }

    fn rough_min(&self) -> TypedValue {
        self.bounds.0.clone()
    }

    fn rough_max(&self) -> TypedValue {
        self.bounds.1.clone()
    }

    fn is_parameterized(&self) -> bool {
        self.parameterized
    }
}

fn correlated(provider: &Arc<PerRowSubquery>) -> Arc<VirtualColumn> {
    VirtualColumn::subselect(
        Arc::clone(provider) as Arc<dyn SubqueryProvider>,
        DimensionVector::with_dims(1, &[0]),
    )
}

#[test]
fn subquery_compared_from_either_side() {
    let (table, a) = eight_rows();
    let five = || correlated(&PerRowSubquery::constant(5));

    let cases = [
        (Descriptor::compare(&five(), Operator::More, &a, 1), vec![0, 1, 2, 3, 4]),
        (Descriptor::compare(&a, Operator::Less, &five(), 1), vec![0, 1, 2, 3, 4]),
        (Descriptor::compare(&five(), Operator::Less, &a, 1), vec![6, 7]),
        (Descriptor::compare(&five(), Operator::MoreEq, &a, 1), vec![0, 1, 2, 3, 4, 5]),
        (Descriptor::compare(&five(), Operator::LessEq, &a, 1), vec![5, 6, 7]),
        (Descriptor::compare(&five(), Operator::NotEq, &a, 1), vec![0, 1, 2, 3, 4, 6, 7]),
        (Descriptor::compare(&five(), Operator::Eq, &a, 1), vec![5]),
    ];
    for (desc, expected) in cases {
        let shown = desc.to_string();
        let pf = run(&table, [desc]);
        assert_eq!(result_rows(pf.mind(), 0), expected, "{}", shown);
        assert_eq!(pf.mind().num_of_tuples(), expected.len() as u64, "{}", shown);
    }

    // every row lies below the subquery's whole range
    let hundred = correlated(&PerRowSubquery::constant(100));
    let pf = run(&table, [Descriptor::compare(&hundred, Operator::More, &a, 1)]);
    assert_eq!(pf.mind().num_of_tuples(), 8);
    let hundred = correlated(&PerRowSubquery::constant(100));
    let pf = run(&table, [Descriptor::compare(&hundred, Operator::Less, &a, 1)]);
    assert_eq!(pf.mind().num_of_tuples(), 0);
}

#[test]
fn correlated_exists_and_not_exists() {
    let (table, _) = eight_rows();
    let even = PerRowSubquery::new(|row| if row % 2 == 0 { vec![row as i64] } else { Vec::new() });

    let pf = run(&table, [Descriptor::unary(&correlated(&even), Operator::Exists, 1)]);
    assert_eq!(result_rows(pf.mind(), 0), vec![0, 2, 4, 6]);
    assert!(pf.get_conditions().iter().all(|d| d.done));

    let pf = run(&table, [Descriptor::unary(&correlated(&even), Operator::NotExists, 1)]);
    assert_eq!(result_rows(pf.mind(), 0), vec![1, 3, 5, 7]);
}

#[test]
fn in_over_correlated_subquery() {
    let (table, a) = eight_rows();
    let every_third = PerRowSubquery::new(|row| {
        let r = row as i64;
        if row % 3 == 0 { vec![r, r + 1] } else { vec![r + 1] }
    });

    let sub = correlated(&every_third);
    let pf = run(&table, [Descriptor::compare(&a, Operator::In, &sub, 1)]);
    assert_eq!(result_rows(pf.mind(), 0), vec![0, 3, 6]);
    // one evaluation per outer row, the rest served from the cache
    let cached = sub.as_subselect().unwrap().cached_results();
    assert!(cached >= 8);
    assert_eq!(every_third.calls(), cached);

    let pf = run(&table, [Descriptor::compare(&a, Operator::NotIn, &correlated(&every_third), 1)]);
    assert_eq!(result_rows(pf.mind(), 0), vec![1, 2, 4, 5, 7]);
}

#[test]
fn subquery_results_are_cached_per_outer_row() {
    let provider = PerRowSubquery::new(|row| vec![row as i64 * 10]);
    let sub = correlated(&provider);
    let column = sub.as_subselect().unwrap();
    let mut pos = TuplePosition::new(1, 2);

    pos.set_row(0, Some(3));
    assert_eq!(column.value(&pos).unwrap(), TypedValue::Int(30));
    assert_eq!(column.value(&pos).unwrap(), TypedValue::Int(30));
    assert_eq!(provider.calls(), 1);
    pos.set_row(0, Some(4));
    assert_eq!(column.value(&pos).unwrap(), TypedValue::Int(40));
    assert_eq!(provider.calls(), 2);
    assert_eq!(column.cached_results(), 2);

    column.clear_cache();
    assert_eq!(column.value(&pos).unwrap(), TypedValue::Int(40));
    assert_eq!(provider.calls(), 3);

    // parameterized subqueries are evaluated on every use
    let provider = PerRowSubquery::parameterized(|row| vec![row as i64]);
    let sub = correlated(&provider);
    let column = sub.as_subselect().unwrap();
    column.value(&pos).unwrap();
    column.value(&pos).unwrap();
    assert_eq!(provider.calls(), 2);
    assert_eq!(column.cached_results(), 0);
}

#[test]
fn parameterized_conditions_wait_for_their_values() {
    let (table, a) = eight_rows();
    let slot = Arc::new(ArcSwap::from_pointee(TypedValue::Null));
    let param = VirtualColumn::parameter(Arc::clone(&slot));
    let param_sub = correlated(&PerRowSubquery::parameterized(|row| vec![row as i64]));

    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(
        [
            Descriptor::compare(&a, Operator::Less, &param, 1),
            Descriptor::compare(&a, Operator::NotEq, &c(1), 1),
            Descriptor::compare(&a, Operator::In, &param_sub, 1),
        ]
        .into_iter()
        .collect(),
    )
    .unwrap();
    assert_eq!(pf.get_conditions().len(), 1);
    assert_eq!(pf.parametrized_conditions().len(), 2);

    pf.update_multi_index(false, None).unwrap();
    assert_eq!(result_rows(pf.mind(), 0), vec![0, 2, 3, 4, 5, 6, 7]);

    slot.store(Arc::new(TypedValue::Int(5)));
    pf.process_parameters();
    assert_eq!(pf.get_conditions().len(), 2);
    assert!(pf.parametrized_conditions().is_empty());
    pf.update_multi_index(false, None).unwrap();
    assert_eq!(result_rows(pf.mind(), 0), vec![0, 2, 3, 4]);
}

#[test]
fn primary_key_search_matches_full_scan() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut ids: Vec<i64> = (1000..1200).collect();
    ids.shuffle(&mut rng);
    let t = StoredTable::builder("t", 4)
        .int_column("id", ids.clone())
        .deleted_rows(&[5, 17, 100, 150])
        .primary_key("id")
        .build()
        .unwrap();
    let id = VirtualColumn::column(&t, "id", 0).unwrap();
    let table = Arc::new(TempTable::new(vec![Arc::clone(&t)]).unwrap());

    let cases: Vec<(Descriptor, Box<dyn Fn(i64) -> bool>)> = vec![
        (Descriptor::compare(&id, Operator::Eq, &c(1050), 1), Box::new(|v| v == 1050)),
        (Descriptor::compare(&id, Operator::Less, &c(1020), 1), Box::new(|v| v < 1020)),
        (Descriptor::compare(&id, Operator::LessEq, &c(1020), 1), Box::new(|v| v <= 1020)),
        (Descriptor::compare(&id, Operator::More, &c(1180), 1), Box::new(|v| v > 1180)),
        (Descriptor::compare(&id, Operator::MoreEq, &c(1180), 1), Box::new(|v| v >= 1180)),
        (Descriptor::between(&id, &c(1090), &c(1110), 1), Box::new(|v| (1090..=1110).contains(&v))),
        (Descriptor::between(&id, &c(1110), &c(1090), 1), Box::new(|_| false)),
        (Descriptor::compare(&id, Operator::Eq, &c(5000), 1), Box::new(|_| false)),
    ];
    for (desc, pred) in cases {
        let expected: Vec<u64> = (0..ids.len() as u64)
            .filter(|row| !t.is_deleted(*row) && pred(ids[*row as usize]))
            .collect();
        for index_search in [true, false] {
            let config = Arc::new(Configuration {
                thread_pool_size: Some(0),
                index_search: Some(index_search),
                ..Default::default()
            });
            let mut pf = ParameterizedFilter::with_configuration(Arc::clone(&table), config);
            pf.add_conditions(std::iter::once(desc.clone()).collect()).unwrap();
            pf.update_multi_index(false, None).unwrap();
            assert_eq!(
                passing_rows(pf.mind(), 0),
                expected,
                "{} with index search {}",
                desc,
                index_search
            );
            assert_eq!(pf.mind().num_of_tuples(), expected.len() as u64);
        }
    }
}

#[test]
fn is_null_on_padded_side_keeps_only_unmatched_rows() {
    let (table, a, b, _) = left_join_tables();
    let mut pf = ParameterizedFilter::with_configuration(table, sequential());
    pf.add_conditions(left_join_where(&a, &b, Descriptor::unary(&b, Operator::IsNull, 2)))
        .unwrap();
    pf.update_multi_index(false, None).unwrap();

    let where_desc = pf.get_conditions().iter().find(|d| d.op == Operator::IsNull).unwrap();
    assert!(where_desc.done);
    assert!(!where_desc.is_delayed());

    // a = 0..8 against b = 0..4: only rows 4..8 have no partner
    assert_eq!(pf.mind().num_of_tuples(), 4);
    let Some(DimensionGroup::Joined(g)) = pf.mind().group_for(0) else {
        panic!("dimensions 0 and 1 are expected to be joined");
    };
    let (s0, s1) = (g.slot_of(0).unwrap(), g.slot_of(1).unwrap());
    let mut pairs: Vec<_> = g.tuples.iter().map(|t| (t[s0], t[s1])).collect();
    pairs.sort();
    assert_eq!(pairs, (4..8).map(|r| (Some(r), None)).collect::<Vec<_>>());
}
