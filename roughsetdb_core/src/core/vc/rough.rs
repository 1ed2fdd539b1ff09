use std::cmp::Ordering;

use crate::core::{
    descriptor::Descriptor,
    multi_index::TuplePosition,
    storage::PackStatistics,
    types::{Collation, Operator, RoughSetValue, TypedValue},
};

use super::SingleColumn;

/// One side of an interval test, `strict` excludes the bound itself.
#[derive(Clone, Copy)]
struct Bound<'a> {
    value: &'a TypedValue,
    strict: bool,
}

/// Verdict of `lo <(=) x <(=) hi` for a pack whose values span `[min, max]`.
fn rough_interval(
    min: &TypedValue,
    max: &TypedValue,
    lo: Option<Bound<'_>>,
    hi: Option<Bound<'_>>,
    collation: Collation,
) -> RoughSetValue {
    let mut all = true;
    if let Some(lo) = lo {
        let Some(max_vs_lo) = max.cmp_collated(lo.value, collation) else {
            return RoughSetValue::Some;
        };
        if max_vs_lo == Ordering::Less || (lo.strict && max_vs_lo == Ordering::Equal) {
            return RoughSetValue::None;
        }
        let Some(min_vs_lo) = min.cmp_collated(lo.value, collation) else {
            return RoughSetValue::Some;
        };
        all &= min_vs_lo == Ordering::Greater || (!lo.strict && min_vs_lo == Ordering::Equal);
    }
    if let Some(hi) = hi {
        let Some(min_vs_hi) = min.cmp_collated(hi.value, collation) else {
            return RoughSetValue::Some;
        };
        if min_vs_hi == Ordering::Greater || (hi.strict && min_vs_hi == Ordering::Equal) {
            return RoughSetValue::None;
        }
        let Some(max_vs_hi) = max.cmp_collated(hi.value, collation) else {
            return RoughSetValue::Some;
        };
        all &= max_vs_hi == Ordering::Less || (!hi.strict && max_vs_hi == Ordering::Equal);
    }
    if all { RoughSetValue::All } else { RoughSetValue::Some }
}

#[inline]
fn negate(r: RoughSetValue) -> RoughSetValue {
    match r {
        RoughSetValue::None => RoughSetValue::All,
        RoughSetValue::All => RoughSetValue::None,
        other => other,
    }
}

fn rough_compare(min: &TypedValue, max: &TypedValue, op: Operator, v: &TypedValue, collation: Collation) -> RoughSetValue {
    let point = Some(Bound { value: v, strict: false });
    match op {
        Operator::Eq => rough_interval(min, max, point, point, collation),
        Operator::NotEq => negate(rough_interval(min, max, point, point, collation)),
        Operator::Less => rough_interval(min, max, None, Some(Bound { value: v, strict: true }), collation),
        Operator::LessEq => rough_interval(min, max, None, point, collation),
        Operator::More => rough_interval(min, max, Some(Bound { value: v, strict: true }), None, collation),
        Operator::MoreEq => rough_interval(min, max, point, None, collation),
        _ => RoughSetValue::Some,
    }
}

/// Compares the ranges of two packs for `a op b`.
fn rough_attr_attr(a: (&TypedValue, &TypedValue), b: (&TypedValue, &TypedValue), op: Operator) -> RoughSetValue {
    let (Some(amax_bmin), Some(amin_bmax)) = (a.1.sql_cmp(b.0), a.0.sql_cmp(b.1)) else {
        return RoughSetValue::Some;
    };
    let disjoint = amax_bmin == Ordering::Less || amin_bmax == Ordering::Greater;
    let single_equal = a.0.sql_eq(a.1) && b.0.sql_eq(b.1) && a.0.sql_eq(b.0);
    match op {
        Operator::Eq if disjoint => RoughSetValue::None,
        Operator::Eq if single_equal => RoughSetValue::All,
        Operator::NotEq if disjoint => RoughSetValue::All,
        Operator::NotEq if single_equal => RoughSetValue::None,
        Operator::Less if amax_bmin == Ordering::Less => RoughSetValue::All,
        Operator::Less if amin_bmax != Ordering::Less => RoughSetValue::None,
        Operator::LessEq if amax_bmin != Ordering::Greater => RoughSetValue::All,
        Operator::LessEq if amin_bmax == Ordering::Greater => RoughSetValue::None,
        Operator::More if amin_bmax == Ordering::Greater => RoughSetValue::All,
        Operator::More if amax_bmin != Ordering::Greater => RoughSetValue::None,
        Operator::MoreEq if amin_bmax != Ordering::Less => RoughSetValue::All,
        Operator::MoreEq if amax_bmin == Ordering::Less => RoughSetValue::None,
        _ => RoughSetValue::Some,
    }
}

impl SingleColumn {
    /// Pack level verdict of `desc` for the pack under `pos`, read from pack statistics only.
    pub fn rough_check(&self, pos: &TuplePosition, desc: &Descriptor) -> RoughSetValue {
        let Some(pack) = pos.pack(self.dim()) else {
            return RoughSetValue::Some;
        };
        let Some(stats) = self.pack_statistics(pack) else {
            return RoughSetValue::Some;
        };
        let deleted = self.deleted_in_pack(pack);
        if stats.row_count == 0 || deleted == stats.row_count {
            return RoughSetValue::None;
        }

        let (res, other_nulls) = self.rough_check_stats(pos, stats, desc);
        if res == RoughSetValue::All
            && (deleted > 0 || other_nulls || (stats.null_count > 0 && desc.op != Operator::IsNull))
        {
            return RoughSetValue::Some;
        }
        res
    }

    fn rough_check_stats(&self, pos: &TuplePosition, stats: &PackStatistics, desc: &Descriptor) -> (RoughSetValue, bool) {
        match desc.op {
            Operator::IsNull => {
                let r = if stats.null_count == 0 {
                    RoughSetValue::None
                } else if stats.nulls_only() {
                    RoughSetValue::All
                } else {
                    RoughSetValue::Some
                };
                return (r, false);
            }
            Operator::NotNull => {
                let r = if stats.nulls_only() {
                    RoughSetValue::None
                } else if stats.null_count == 0 {
                    RoughSetValue::All
                } else {
                    RoughSetValue::Some
                };
                return (r, false);
            }
            Operator::True => return (RoughSetValue::All, false),
            Operator::False => return (RoughSetValue::None, false),
            _ => {}
        }
        if stats.nulls_only() {
            return (RoughSetValue::None, false);
        }
        let column_type = self.column_type();
        if column_type.is_lookup() && !desc.encoded {
            return (RoughSetValue::Some, false);
        }
        if column_type.is_string() && !desc.collation.is_binary() {
            return (RoughSetValue::Some, false);
        }
        let (min, max) = (&stats.min, &stats.max);
        let collation = Collation::Binary;

        let Some(val1) = desc.val1.vc() else {
            return (RoughSetValue::Some, false);
        };

        // column against column of the same or another dimension
        if let Some(other) = val1.as_single() {
            if desc.op.is_simple_comparison() && !desc.op.is_all_any() {
                let Some(other_pack) = pos.pack(other.dim()) else {
                    return (RoughSetValue::Some, false);
                };
                let Some(other_stats) = other.pack_statistics(other_pack) else {
                    return (RoughSetValue::Some, false);
                };
                if other_stats.nulls_only() {
                    return (RoughSetValue::None, false);
                }
                let other_dirty = other_stats.null_count > 0 || other.deleted_in_pack(other_pack) > 0;
                if column_type.is_lookup() || other.column_type().is_lookup() {
                    return (RoughSetValue::Some, other_dirty);
                }
                let r = rough_attr_attr((min, max), (&other_stats.min, &other_stats.max), desc.op);
                return (r, other_dirty);
            }
            return (RoughSetValue::Some, false);
        }

        let r = match desc.op {
            Operator::In | Operator::NotIn if val1.is_multival() && val1.is_const() => {
                let Ok(set) = val1.set_values(pos) else {
                    return (RoughSetValue::Some, false);
                };
                let mut any = RoughSetValue::None;
                for v in set.values().iter().filter(|v| !v.is_null()) {
                    any = RoughSetValue::or(any, rough_compare(min, max, Operator::Eq, v, collation));
                    if any == RoughSetValue::All {
                        break;
                    }
                }
                if desc.op == Operator::In {
                    any
                } else if set.contains_null() {
                    RoughSetValue::None
                } else {
                    negate(any)
                }
            }
            Operator::Between | Operator::NotBetween => {
                let lo = desc.val1.const_value();
                let hi = desc.val2.const_value();
                let (Some(lo), Some(hi)) = (lo, hi) else {
                    return (RoughSetValue::Some, false);
                };
                if (lo.is_null() || hi.is_null()) && !desc.encoded {
                    return (RoughSetValue::Some, false);
                }
                let bound = |v: &TypedValue| -> Option<TypedValue> { (!v.is_null()).then(|| v.clone()) };
                let (lo, hi) = (bound(&lo), bound(&hi));
                let r = rough_interval(
                    min,
                    max,
                    lo.as_ref().map(|value| Bound { value, strict: desc.sharp }),
                    hi.as_ref().map(|value| Bound { value, strict: desc.sharp }),
                    collation,
                );
                if desc.op == Operator::Between { r } else { negate(r) }
            }
            op if op.is_simple_comparison() && !op.is_all_any() => {
                let Some(v) = desc.val1.const_value() else {
                    return (RoughSetValue::Some, false);
                };
                if v.is_null() {
                    RoughSetValue::None
                } else {
                    rough_compare(min, max, op, &v, collation)
                }
            }
            _ => RoughSetValue::Some,
        };
        (r, false)
    }
}
