use std::sync::Arc;

use crate::core::{
    descriptor::{Condition, Descriptor},
    joiner::{
        choose_join_algorithm, create_joiner, reselect_join_algorithm, side_index, JoinAlgType, JoinFailure, JoinTips,
        JoinerGeneral, JoinerHash, JoinerMapped, JoinerSort, TwoDimensionalJoiner,
    },
    multi_index::{DimensionGroup, MultiIndex},
    storage::StoredTable,
    types::Operator,
    vc::VirtualColumn,
};

const PACK_POWER: u8 = 2;

fn column(table: &str, values: impl IntoIterator<Item = i64>, dim: usize) -> (Arc<VirtualColumn>, u64) {
    let t = StoredTable::builder(table, PACK_POWER)
        .int_column("a", values)
        .build()
        .unwrap();
    let rows = t.num_rows();
    (VirtualColumn::column(&t, "a", dim).unwrap(), rows)
}

fn two_tables(
    left: impl IntoIterator<Item = i64>,
    right: impl IntoIterator<Item = i64>,
) -> (Arc<VirtualColumn>, Arc<VirtualColumn>, MultiIndex) {
    let (a, n1) = column("t1", left, 0);
    let (b, n2) = column("t2", right, 1);
    (a, b, MultiIndex::new(vec![n1, n2], PACK_POWER, u64::MAX))
}

fn single(d: Descriptor) -> Condition {
    std::iter::once(d).collect()
}

fn joined_pairs(mind: &MultiIndex) -> Vec<(Option<u64>, Option<u64>)> {
    match mind.group_for(0) {
        Some(DimensionGroup::Joined(g)) => {
            let (s0, s1) = (g.slot_of(0).unwrap(), g.slot_of(1).unwrap());
            let mut pairs: Vec<_> = g.tuples.iter().map(|t| (t[s0], t[s1])).collect();
            pairs.sort();
            pairs
        }
        other => panic!("expected a joined group, got {:?}", other),
    }
}

fn brute_pairs(left: &[i64], right: &[i64], pred: impl Fn(i64, i64) -> bool) -> Vec<(Option<u64>, Option<u64>)> {
    let mut pairs = Vec::new();
    for (i, x) in left.iter().enumerate() {
        for (j, y) in right.iter().enumerate() {
            if pred(*x, *y) {
                pairs.push((Some(i as u64), Some(j as u64)));
            }
        }
    }
    pairs
}

#[test]
fn algorithm_choice_follows_first_condition() {
    let (a, b, _) = two_tables(0..4, 0..4);
    let eq = Descriptor::compare(&a, Operator::Eq, &b, 2);
    let lt = Descriptor::compare(&a, Operator::Less, &b, 2);

    assert_eq!(choose_join_algorithm(&Condition::new()), JoinAlgType::General);
    assert_eq!(choose_join_algorithm(&single(eq.clone())), JoinAlgType::Map);
    assert_eq!(
        choose_join_algorithm(&[eq.clone(), lt.clone()].into_iter().collect()),
        JoinAlgType::Hash
    );
    assert_eq!(choose_join_algorithm(&single(lt)), JoinAlgType::Sort);
    assert_eq!(choose_join_algorithm(&single(eq.outer(&[0], &[1]))), JoinAlgType::General);

    assert_eq!(reselect_join_algorithm(JoinFailure::Fail1nTooHard, JoinAlgType::Map), JoinAlgType::Hash);
    assert_eq!(reselect_join_algorithm(JoinFailure::FailWrongSides, JoinAlgType::Map), JoinAlgType::Map);
    assert_eq!(reselect_join_algorithm(JoinFailure::FailComplex, JoinAlgType::Hash), JoinAlgType::General);
    assert_eq!(JoinAlgType::General.to_string(), "[loop]");
}

#[test]
fn hash_join_matches_nested_loop() {
    let left: Vec<i64> = (0..20).map(|i| i % 5).collect();
    let right: Vec<i64> = (0..12).map(|i| i % 3).collect();
    let expected = brute_pairs(&left, &right, |x, y| x == y);

    let (a, b, mut mind) = two_tables(left.clone(), right.clone());
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    let mut hash = JoinerHash::new(JoinTips::new(&mind));
    hash.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(hash.why_failed(), JoinFailure::NotFailed);
    assert!(cond[0].done);
    assert_eq!(mind.num_of_tuples(), expected.len() as u64);
    assert_eq!(joined_pairs(&mind), expected);

    let (a, b, mut mind) = two_tables(left, right);
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    let mut general = JoinerGeneral::new(JoinTips::new(&mind));
    general.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(joined_pairs(&mind), expected);
}

#[test]
fn hash_join_checks_remaining_conditions() {
    let left: Vec<i64> = (0..16).map(|i| i % 4).collect();
    let right: Vec<i64> = (0..8).collect();
    let (a, b, mut mind) = two_tables(left.clone(), right.clone());
    let mut cond: Condition = [
        Descriptor::compare(&a, Operator::Eq, &b, 2),
        Descriptor::compare(&b, Operator::LessEq, &VirtualColumn::constant(1i64), 2),
    ]
    .into_iter()
    .collect();
    let mut hash = JoinerHash::new(JoinTips::new(&mind));
    hash.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(joined_pairs(&mind), brute_pairs(&left, &right, |x, y| x == y && y <= 1));
}

#[test]
fn mapped_join_over_unique_keys() {
    let left: Vec<i64> = (0..8).collect();
    let right: Vec<i64> = (0..16).map(|i| i % 4).collect();
    let (a, b, mut mind) = two_tables(left.clone(), right.clone());
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    let mut mapped = JoinerMapped::new(JoinTips::new(&mind));
    mapped.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(mapped.why_failed(), JoinFailure::NotFailed);
    assert_eq!(joined_pairs(&mind), brute_pairs(&left, &right, |x, y| x == y));
}

#[test]
fn mapped_join_falls_back_after_wrong_sides() {
    let (a, b, mut mind) = two_tables((0..8).map(|i| i % 2), (0..16).map(|i| i % 4));
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    let mut alg = choose_join_algorithm(&cond);
    assert_eq!(alg, JoinAlgType::Map);

    let mut joiner = create_joiner(alg, JoinTips::new(&mind));
    joiner.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(joiner.why_failed(), JoinFailure::FailWrongSides);
    assert!(!cond[0].done);
    assert_eq!(mind.num_of_tuples(), 8 * 16);

    joiner.force_switching_sides();
    joiner.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(joiner.why_failed(), JoinFailure::Fail1nTooHard);

    alg = reselect_join_algorithm(joiner.why_failed(), alg);
    assert_eq!(alg, JoinAlgType::Hash);
    let mut joiner = create_joiner(alg, JoinTips::new(&mind));
    joiner.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(joiner.why_failed(), JoinFailure::NotFailed);
    // every t1 row meets the four t2 rows with the same value
    assert_eq!(mind.num_of_tuples(), 8 * 4);
}

#[test]
fn sort_join_on_inequality() {
    let left: Vec<i64> = vec![5, 1, 9, 3, 3, 7, 0, 2, 8, 4];
    let right: Vec<i64> = vec![4, 0, 6, 2, 9, 3];
    for (op, pred) in [
        (Operator::Less, (|x, y| x < y) as fn(i64, i64) -> bool),
        (Operator::LessEq, |x, y| x <= y),
        (Operator::More, |x, y| x > y),
        (Operator::MoreEq, |x, y| x >= y),
    ] {
        let (a, b, mut mind) = two_tables(left.clone(), right.clone());
        let mut cond = single(Descriptor::compare(&a, op, &b, 2));
        let mut sort = JoinerSort::new(JoinTips::new(&mind));
        sort.execute_join_conditions(&mut mind, &mut cond).unwrap();
        assert_eq!(sort.why_failed(), JoinFailure::NotFailed, "{}", op);
        assert_eq!(joined_pairs(&mind), brute_pairs(&left, &right, pred), "{}", op);
    }
}

#[test]
fn sort_join_rejects_outer_conditions() {
    let (a, b, mut mind) = two_tables(0..4, 0..4);
    let mut cond = single(Descriptor::compare(&a, Operator::Less, &b, 2).outer(&[0], &[1]));
    let mut sort = JoinerSort::new(JoinTips::new(&mind));
    sort.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(sort.why_failed(), JoinFailure::FailComplex);
    assert!(!cond[0].done);
}

#[test]
fn outer_join_pads_with_null_rows() {
    let (a, b, mut mind) = two_tables(0..6, [0, 2, 4]);
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2).outer(&[0], &[1]));
    let mut general = JoinerGeneral::new(JoinTips::new(&mind));
    general.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(
        joined_pairs(&mind),
        vec![
            (Some(0), Some(0)),
            (Some(1), None),
            (Some(2), Some(1)),
            (Some(3), None),
            (Some(4), Some(2)),
            (Some(5), None),
        ]
    );

    let (a, b, mut mind) = two_tables(0..6, [0, 2, 4]);
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2).outer(&[0], &[1]));
    let mut tips = JoinTips::new(&mind);
    tips.null_only[1] = true;
    let mut general = JoinerGeneral::new(tips);
    general.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(joined_pairs(&mind), vec![(Some(1), None), (Some(3), None), (Some(5), None)]);
}

#[test]
fn inner_false_condition_empties_the_result() {
    let (_, _, mut mind) = two_tables(0..6, 0..6);
    let mut cond = single(Descriptor::trivial(false, 2));
    cond[0].left_dims.set(0);
    cond[0].left_dims.set(1);
    let mut general = JoinerGeneral::new(JoinTips::new(&mind));
    general.execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert!(mind.zero_tuples());
}

#[test]
fn tips_limit_count_and_distinct() {
    let left: Vec<i64> = (0..12).map(|i| i % 3).collect();
    let right: Vec<i64> = (0..9).map(|i| i % 3).collect();
    let total = brute_pairs(&left, &right, |x, y| x == y).len() as u64;

    let (a, b, mut mind) = two_tables(left.clone(), right.clone());
    let mut tips = JoinTips::new(&mind);
    tips.limit = Some(5);
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    JoinerHash::new(tips).execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(mind.num_of_tuples(), 5);

    let (a, b, mut mind) = two_tables(left.clone(), right.clone());
    let mut tips = JoinTips::new(&mind);
    tips.count_only = true;
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    JoinerHash::new(tips).execute_join_conditions(&mut mind, &mut cond).unwrap();
    assert_eq!(mind.num_of_tuples(), total);
    assert!(matches!(mind.group_for(1), Some(DimensionGroup::Counted { .. })));

    let (a, b, mut mind) = two_tables(left, right);
    let mut tips = JoinTips::new(&mind);
    tips.distinct_only[0] = true;
    let mut cond = single(Descriptor::compare(&a, Operator::Eq, &b, 2));
    JoinerHash::new(tips).execute_join_conditions(&mut mind, &mut cond).unwrap();
    // every t1 row has a partner
    assert_eq!(mind.num_of_tuples(), 12);
}

#[test]
fn cancelled_join_stops() {
    let (a, b, mut mind) = two_tables(0..8, 0..8);
    mind.cancellation().cancel();
    let mut cond = single(Descriptor::compare(&a, Operator::Less, &b, 2));
    let err = JoinerGeneral::new(JoinTips::new(&mind))
        .execute_join_conditions(&mut mind, &mut cond)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!cond[0].done);
}

#[test]
fn every_joiner_commits_and_counts() {
    let left: Vec<i64> = (0..12).collect();
    let right: Vec<i64> = (0..12).map(|i| 11 - i).collect();
    let tips = JoinTips::new(&MultiIndex::new(vec![12, 12], PACK_POWER, u64::MAX));
    let joiners: Vec<(Box<dyn TwoDimensionalJoiner>, Operator)> = vec![
        (Box::new(JoinerMapped::new(tips.clone())), Operator::Eq),
        (Box::new(JoinerHash::new(tips.clone())), Operator::Eq),
        (Box::new(JoinerSort::new(tips)), Operator::MoreEq),
    ];
    for (mut joiner, op) in joiners {
        let (a, b, mut mind) = two_tables(left.clone(), right.clone());
        let mut cond = single(Descriptor::compare(&a, op, &b, 2));
        joiner.execute_join_conditions(&mut mind, &mut cond).unwrap();
        assert_eq!(joiner.why_failed(), JoinFailure::NotFailed, "{}", joiner.algorithm());
        assert!(cond[0].done);
        let expected = match op {
            Operator::Eq => brute_pairs(&left, &right, |x, y| x == y),
            _ => brute_pairs(&left, &right, |x, y| x >= y),
        };
        assert_eq!(mind.num_of_tuples(), expected.len() as u64);
        assert_eq!(joined_pairs(&mind), expected);
    }
}

#[cfg(target_pointer_width = "64")]
#[test]
fn side_index_stops_at_32_bits() {
    assert_eq!(side_index(0), Some(0));
    assert_eq!(side_index(u32::MAX as usize), Some(u32::MAX));
    assert_eq!(side_index(u32::MAX as usize + 1), None);
}
