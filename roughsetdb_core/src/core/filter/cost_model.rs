//! Weights used to order descriptors. A weight approximates the logarithm of
//! the work (or of the result size) a descriptor causes; lower runs earlier.

use crate::{
    WEIGHT_UNKNOWN_SHAPE,
    core::{
        descriptor::Descriptor,
        multi_index::{MultiIndex, TuplePosition},
        types::{Operator, RoughSetValue, TypedValue},
        vc::{SingleColumn, VirtualColumn},
    },
};

use super::rough_multi_index::RoughMultiIndex;

/// Everything the weights look at besides the descriptor itself.
#[derive(Clone, Copy)]
pub struct CostContext<'a> {
    pub mind: &'a MultiIndex,
    pub rough_mind: Option<&'a RoughMultiIndex>,
    pub index_search: bool,
    pub no_tables: usize,
}

impl<'a> CostContext<'a> {
    pub fn new(mind: &'a MultiIndex, rough_mind: Option<&'a RoughMultiIndex>) -> Self {
        Self {
            mind,
            rough_mind,
            index_search: true,
            no_tables: mind.num_of_dimensions(),
        }
    }

    /// Share of packs of `dim` not excluded roughly, 1.0 without rough information.
    fn rough_selectivity(&self, dim: usize) -> f64 {
        match self.rough_mind {
            Some(rmi) if rmi.num_of_packs(dim) > 0 => rmi.nonempty_packs(dim) as f64 / rmi.num_of_packs(dim) as f64,
            _ => 1.0,
        }
    }

    fn tuples_of(&self, vc: &VirtualColumn) -> u64 {
        vc.approx_answer_size(self.mind)
    }
}

/// Weight of a descriptor which does not join dimensions. OR trees get their
/// branches reordered on the way.
pub fn non_join_weight(desc: &mut Descriptor, ctx: &CostContext<'_>, for_or: bool) -> f64 {
    if desc.is_type_or_tree() && !desc.is_type_join() {
        if let Some(tree) = desc.tree.as_mut() {
            return tree.evaluate_condition_weight(&mut |leaf, or| leaf_weight(leaf, ctx, or), for_or);
        }
    }
    leaf_weight(desc, ctx, for_or)
}

fn leaf_weight(desc: &Descriptor, ctx: &CostContext<'_>, for_or: bool) -> f64 {
    if desc.is_true() || desc.is_false() {
        return 0.0;
    }
    let Some(attr) = desc.attr.vc() else {
        return WEIGHT_UNKNOWN_SHAPE;
    };
    let no_obj = ctx.tuples_of(attr);

    if desc.is_type_attr_val_or_attr_val_val() {
        let Some(single) = attr.as_single().filter(|_| desc.encoded) else {
            return (1.0 + no_obj as f64).ln() + 5.0;
        };
        let mut answer_size = approx_answer_size(single, desc, ctx);
        if for_or {
            answer_size = no_obj.saturating_sub(answer_size);
        }
        let mut eval = (1.0 + answer_size as f64).ln();
        if matches!(desc.op, Operator::In | Operator::NotIn) {
            let no_in_values = desc
                .val1
                .vc()
                .filter(|vc| vc.is_const())
                .and_then(|vc| vc.set_values(&TuplePosition::new(0, 0)).ok())
                .map_or(1, |set| set.len());
            if no_in_values > 1 {
                eval += (no_in_values as f64).ln() * 0.5;
            }
        }
        let column_type = single.column_type();
        if column_type.is_string() && !column_type.is_lookup() {
            eval += 0.5;
        }
        if column_type.is_float() {
            eval += 0.1;
        }
        if matches!(desc.op, Operator::Like | Operator::NotLike) {
            eval += 0.2;
        }
        if desc.is_left_index_search(ctx.index_search, ctx.no_tables) {
            eval = 0.001;
        }
        eval
    } else if desc.is_type_attr_attr() {
        if !desc.encoded {
            return (1.0 + 2.0 * no_obj as f64).ln() + 5.0;
        }
        let n = no_obj as f64;
        let eval = if desc.op == Operator::Eq {
            let d1 = attr.approx_distinct_vals(false, Some(ctx.mind)).max(1);
            let d2 = desc
                .val1
                .vc()
                .map_or(1, |vc| vc.approx_distinct_vals(false, Some(ctx.mind)))
                .max(1);
            let classes = d1.max(d2) as f64;
            if for_or {
                (1.0 + (n - n / classes)).ln()
            } else {
                (1.0 + n / classes).ln()
            }
        } else {
            (1.0 + n / 2.0).ln()
        };
        eval + 1.0
    } else if desc.is_type_expression() {
        (1.0 + no_obj as f64).ln() + 2.0
    } else {
        WEIGHT_UNKNOWN_SHAPE
    }
}

/// Weight of a simple join between two single columns.
pub fn join_weight(desc: &Descriptor, ctx: &CostContext<'_>) -> f64 {
    let (Some(a), Some(v)) = (desc.attr.vc(), desc.val1.vc()) else {
        return WEIGHT_UNKNOWN_SHAPE;
    };
    let (Some(dim1), Some(dim2)) = (
        a.as_single().map(SingleColumn::dim),
        v.as_single().map(SingleColumn::dim),
    ) else {
        return WEIGHT_UNKNOWN_SHAPE;
    };
    let mind = ctx.mind;
    let size_of = |dim: usize| {
        if mind.get_filter(dim).is_some() {
            mind.dim_size(dim)
        } else {
            mind.orig_size(dim)
        }
    };
    let (no1, no2) = (size_of(dim1), size_of(dim2));
    if no1 == 0 || no2 == 0 {
        return 1.0;
    }
    let (n1, n2) = (no1 as f64, no2 as f64);
    let r_select1 = 0.5 + 0.5 * ctx.rough_selectivity(dim1);
    let r_select2 = 0.5 + 0.5 * ctx.rough_selectivity(dim2);
    let c_select1 = n1 / mind.orig_size(dim1).max(1) as f64;
    let c_select2 = n2 / mind.orig_size(dim2).max(1) as f64;
    let bigger = n1.max(n2);
    let (ds1, ds2) = (mind.dim_size(dim1).max(1) as f64, mind.dim_size(dim2).max(1) as f64);
    let pack_rows = (1u64 << mind.pack_power()) as f64;

    let mut eval = if desc.op == Operator::Eq {
        let dist1 = a.approx_distinct_vals(false, Some(mind)) as f64;
        let dist2 = v.approx_distinct_vals(false, Some(mind)) as f64;
        if dist1 >= 0.99 * ds1 {
            let mut e = (1.0 + n2 * r_select2 * c_select1 + n1 / 100.0).ln();
            if no2 > no1 && ds1 <= pack_rows {
                e -= 1.0;
            }
            e
        } else if dist2 >= 0.99 * ds2 {
            let mut e = (1.0 + n1 * r_select1 * c_select2 + n2 / 100.0).ln();
            if no1 > no2 && ds2 <= pack_rows {
                e -= 1.0;
            }
            e
        } else {
            let d1 = (dist1 * n1 / ds1).max(1.0);
            let d2 = (dist2 * n2 / ds2).max(1.0);
            let classes = d1.min(d2).max(1.0);
            classes.ln() + ((1.0 + n1).ln() - d1.ln()) + ((1.0 + n2).ln() - d2.ln())
        }
    } else {
        (1.0 + n1).ln() + (1.0 + n2).ln()
    };

    eval += (eval - (1.0 + bigger).ln()) * 2.0;
    if !mind.is_used_in_output(dim1) {
        eval *= 0.75;
    }
    if !mind.is_used_in_output(dim2) {
        eval *= 0.75;
    }
    eval + 20.0
}

/// Expected number of rows passing an encoded one column descriptor, from pack statistics.
pub fn approx_answer_size(single: &SingleColumn, desc: &Descriptor, ctx: &CostContext<'_>) -> u64 {
    let Some(attr) = desc.attr.vc() else {
        return 0;
    };
    let dim = single.dim();
    let mind = ctx.mind;
    let filter = mind.get_filter(dim);
    let mut pos = TuplePosition::new(mind.num_of_dimensions(), mind.pack_power());
    let mut total = 0.0f64;
    for pack in 0..single.num_packs() {
        if ctx.rough_mind.is_some_and(|r| r.pack_status(dim, pack) == RoughSetValue::None) {
            continue;
        }
        let rows = match filter {
            Some(f) => f.ones_in_pack(pack),
            None => single
                .pack_statistics(pack)
                .map_or(0, |s| s.row_count.saturating_sub(s.deleted_count)),
        };
        if rows == 0 {
            continue;
        }
        pos.set_pack(dim, pack);
        total += match attr.rough_check(&pos, desc) {
            RoughSetValue::None => 0.0,
            RoughSetValue::All => rows as f64,
            _ => rows as f64 * pack_fraction(single, pack, desc),
        };
    }
    (total.round() as u64).min(mind.dim_size(dim))
}

/// Share of a partially matching pack assumed to pass, interpolated on the
/// pack range for intervals and one half otherwise.
fn pack_fraction(single: &SingleColumn, pack: usize, desc: &Descriptor) -> f64 {
    let interval = matches!(desc.op, Operator::Between | Operator::NotBetween);
    let range = single
        .pack_range(pack)
        .and_then(|(lo, hi)| Some((lo.as_f64()?, hi.as_f64()?)))
        .filter(|(lo, hi)| hi >= lo && single.column_type().is_numeric());
    let (Some((lo, hi)), true) = (range, interval) else {
        return 0.5;
    };
    let bound = |t: Option<TypedValue>, default: f64| t.and_then(|v| v.as_f64()).unwrap_or(default);
    let v1 = bound(desc.val1.const_value(), lo);
    let v2 = bound(desc.val2.const_value(), hi);
    let width = if single.column_type().is_float() {
        (hi - lo).max(f64::MIN_POSITIVE)
    } else {
        hi - lo + 1.0
    };
    let overlap = if single.column_type().is_float() {
        (v2.min(hi) - v1.max(lo)).max(0.0)
    } else {
        (v2.min(hi) - v1.max(lo) + 1.0).max(0.0)
    };
    let inside = (overlap / width).clamp(0.0, 1.0);
    if desc.op == Operator::NotBetween { 1.0 - inside } else { inside }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        filter::condition_encoder::ConditionEncoder,
        storage::StoredTable,
        types::DimensionVector,
    };

    fn setup() -> (MultiIndex, std::sync::Arc<VirtualColumn>, std::sync::Arc<VirtualColumn>) {
        let t = StoredTable::builder("t", 4)
            .int_column("a", 0..64)
            .int_column("b", (0..64).map(|i| i % 4))
            .build()
            .unwrap();
        let mind = MultiIndex::new(vec![64], 4, u64::MAX);
        (
            mind,
            VirtualColumn::column(&t, "a", 0).unwrap(),
            VirtualColumn::column(&t, "b", 0).unwrap(),
        )
    }

    fn encoded(mut d: Descriptor) -> Descriptor {
        ConditionEncoder::encode_if_possible(&mut d, false, false).unwrap();
        d
    }

    #[test]
    fn selective_conditions_weigh_less() {
        let (mind, a, b) = setup();
        let ctx = CostContext::new(&mind, None);
        let mut point = encoded(Descriptor::compare(&a, Operator::Eq, &VirtualColumn::constant(5i64), 1));
        let mut wide = encoded(Descriptor::compare(&a, Operator::Less, &VirtualColumn::constant(48i64), 1));
        let mut attr_attr = encoded(Descriptor::compare(&a, Operator::More, &b, 1));
        let (wp, ww, wa) = (
            non_join_weight(&mut point, &ctx, false),
            non_join_weight(&mut wide, &ctx, false),
            non_join_weight(&mut attr_attr, &ctx, false),
        );
        assert!(wp < ww, "{} < {}", wp, ww);
        assert!(ww < wa, "{} < {}", ww, wa);
        assert_eq!(non_join_weight(&mut Descriptor::trivial(true, 1), &ctx, false), 0.0);
    }

    #[test]
    fn interval_answer_size_is_interpolated() {
        let (mind, a, _) = setup();
        let ctx = CostContext::new(&mind, None);
        let d = encoded(Descriptor::compare(&a, Operator::Less, &VirtualColumn::constant(20i64), 1));
        let single = a.as_single().unwrap();
        assert_eq!(approx_answer_size(single, &d, &ctx), 20);
    }

    #[test]
    fn joins_get_the_join_offset() {
        let t1 = StoredTable::builder("t1", 4).int_column("k", 0..32).build().unwrap();
        let t2 = StoredTable::builder("t2", 4).int_column("k", (0..64).map(|i| i % 32)).build().unwrap();
        let k1 = VirtualColumn::column(&t1, "k", 0).unwrap();
        let k2 = VirtualColumn::column(&t2, "k", 1).unwrap();
        let mind = MultiIndex::new(vec![32, 64], 4, u64::MAX);
        let ctx = CostContext::new(&mind, None);
        let eq = Descriptor::compare(&k1, Operator::Eq, &k2, 2);
        let less = Descriptor::compare(&k1, Operator::Less, &k2, 2);
        let (we, wl) = (join_weight(&eq, &ctx), join_weight(&less, &ctx));
        assert!(we > 15.0 && we < wl);
        let mut dims = DimensionVector::new(2);
        eq.dimension_used(&mut dims);
        assert_eq!(dims.no_one(), 2);
    }
}
