use std::sync::Arc;

use log::trace;

use crate::core::{
    descriptor::{CQTerm, Descriptor},
    error::{FilterError, Result},
    multi_index::TuplePosition,
    types::{ColumnType, Operator, TypedValue},
    vc::{in_set::ValueSet, SingleColumn, VirtualColumn},
};

/// Integer `IN` lists spanning at most this many values become an interval
/// when they cover the span completely.
const MAX_DENSE_IN_SPAN: i64 = 65536;

/// Rewrites descriptors on stored columns into the shapes the pack loops and
/// rough checks handle directly:
///
/// * integer comparisons become closed intervals `BETWEEN lo AND hi`,
/// * real and string comparisons become `BETWEEN` with an open (null) side,
///   strict bounds marked by `sharp`,
/// * lookup columns compare dictionary codes instead of texts,
/// * `IS [NOT] NULL` and set operators fold when the column statistics decide them.
///
/// Descriptors whose shape cannot be encoded are left untouched.
pub struct ConditionEncoder {
    additional_nulls: bool,
}

impl ConditionEncoder {
    /// `additional_nulls` tells the encoder that an outer join may still add
    /// null rows to the attribute's dimension.
    pub fn new(additional_nulls: bool) -> Self {
        Self { additional_nulls }
    }

    pub fn encode_if_possible(desc: &mut Descriptor, for_rough_query: bool, additional_nulls: bool) -> Result<()> {
        if desc.done || desc.delayed || desc.encoded || desc.is_true() || desc.is_false() {
            return Ok(());
        }
        if desc.is_type_or_tree() {
            let mut res = Ok(());
            if let Some(tree) = desc.tree.as_mut() {
                tree.for_each_leaf_mut(&mut |leaf| {
                    if res.is_ok() {
                        res = Self::encode_if_possible(leaf, for_rough_query, additional_nulls);
                    }
                });
            }
            res?;
            return desc.simplify(false);
        }
        if desc.is_parameterized() || (for_rough_query && desc.is_type_subquery()) {
            return Ok(());
        }
        let Some(attr) = desc.attr.vc().cloned() else {
            return Ok(());
        };
        let Some(single) = attr.as_single() else {
            return Ok(());
        };

        if desc.is_type_attr_attr() {
            if Self::attr_attr_encodable(desc) {
                desc.encoded = true;
            }
            return Ok(());
        }
        if !(desc.is_type_attr_val_or_attr_val_val() || desc.is_type_attr_multi_val()) {
            return Ok(());
        }

        let encoder = ConditionEncoder::new(additional_nulls);
        let mut encoded = desc.clone();
        match encoder.encode(&mut encoded, &attr, single) {
            Ok(()) => {
                trace!("Encoded {} as {}", desc, encoded);
                *desc = encoded;
                desc.simplify(false)
            }
            Err(FilterError::Unsupported(reason)) => {
                trace!("{} left unencoded: {}", desc, reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// `a = b` over two numeric, non lookup columns of one type is evaluated
    /// on stored values without conversion.
    fn attr_attr_encodable(desc: &Descriptor) -> bool {
        let (Some(a), Some(b)) = (desc.attr.vc(), desc.val1.vc()) else {
            return false;
        };
        desc.op == Operator::Eq
            && a.column_type().is_numeric()
            && a.column_type() == b.column_type()
    }

    fn encode(&self, desc: &mut Descriptor, attr: &Arc<VirtualColumn>, single: &SingleColumn) -> Result<()> {
        desc.encoded = true;
        self.transform_with_respect_to_nulls(desc, attr)?;
        if Self::finished(desc) {
            return Ok(());
        }
        self.descriptor_transformation(desc, attr)?;
        if Self::finished(desc) {
            return Ok(());
        }
        match single.column_type() {
            ColumnType::Int => self.encode_on_integers(desc, attr),
            ColumnType::Real => self.encode_on_ordered(desc, ColumnType::Real),
            ColumnType::String => self.encode_on_ordered(desc, ColumnType::String),
            ColumnType::Lookup => self.encode_on_lookup(desc, attr, single),
        }
    }

    #[inline]
    fn finished(desc: &Descriptor) -> bool {
        matches!(
            desc.op,
            Operator::True | Operator::False | Operator::IsNull | Operator::NotNull
        )
    }

    #[inline]
    fn set_of(term: &CQTerm) -> Result<Option<Arc<ValueSet>>> {
        match term.vc() {
            Some(vc) if vc.is_multival() => Ok(Some(vc.set_values(&TuplePosition::new(0, 0))?)),
            _ => Ok(None),
        }
    }

    #[inline]
    fn set_false(desc: &mut Descriptor, null_after: bool) {
        desc.collapse(false);
        desc.null_after_simplify = null_after;
    }

    #[inline]
    fn set_unary(desc: &mut Descriptor, op: Operator) {
        desc.op = op;
        desc.val1 = CQTerm::default();
        desc.val2 = CQTerm::default();
        desc.sharp = false;
    }

    fn set_interval(desc: &mut Descriptor, op: Operator, low: TypedValue, high: TypedValue, sharp: bool) {
        desc.op = op;
        desc.val1 = CQTerm::new(VirtualColumn::constant(low));
        desc.val2 = CQTerm::new(VirtualColumn::constant(high));
        desc.sharp = sharp;
    }

    fn transform_with_respect_to_nulls(&self, desc: &mut Descriptor, attr: &Arc<VirtualColumn>) -> Result<()> {
        let nulls_possible = self.additional_nulls || attr.nulls_possible();
        let nulls_only = !self.additional_nulls && attr.nulls_only();
        match desc.op {
            Operator::IsNull if !nulls_possible => desc.collapse(false),
            Operator::IsNull if nulls_only => desc.collapse(true),
            Operator::NotNull if !nulls_possible => desc.collapse(true),
            Operator::NotNull if nulls_only => desc.collapse(false),
            op if op.is_set_all() || op == Operator::NotIn => {
                if Self::set_of(&desc.val1)?.is_some_and(|s| s.contains_null()) {
                    Self::set_false(desc, true);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Brings every operator to one of the simple comparisons, `[NOT] BETWEEN`,
    /// `[NOT] IN` or `[NOT] LIKE`.
    fn descriptor_transformation(&self, desc: &mut Descriptor, attr: &Arc<VirtualColumn>) -> Result<()> {
        match desc.op {
            Operator::EqAny => desc.op = Operator::In,
            Operator::NotEqAll => desc.op = Operator::NotIn,
            _ => {}
        }
        if matches!(desc.op, Operator::In | Operator::NotIn) {
            return Ok(());
        }

        if desc.op == Operator::NotBetween {
            match (desc.val1.is_null_const(), desc.val2.is_null_const()) {
                (true, true) => {
                    Self::set_false(desc, true);
                    return Ok(());
                }
                // a NOT BETWEEN NULL AND x  =>  a > x
                (true, false) => {
                    desc.op = Operator::More;
                    desc.val1 = std::mem::take(&mut desc.val2);
                }
                // a NOT BETWEEN x AND NULL  =>  a < x
                (false, true) => {
                    desc.op = Operator::Less;
                    desc.val2 = CQTerm::default();
                }
                (false, false) => {}
            }
        }
        let set = Self::set_of(&desc.val1)?;
        if set.is_none() && desc.val1.is_null_const() {
            Self::set_false(desc, true);
            return Ok(());
        }
        if desc.op == Operator::Between && desc.val2.is_null_const() {
            Self::set_false(desc, true);
            return Ok(());
        }

        let Some(set) = set else {
            return Ok(());
        };
        let op = desc.op;
        if op.is_set_all() && set.is_empty() {
            desc.collapse(true);
            return Ok(());
        }
        if op.is_set_any() && set.distinct() == 0 {
            Self::set_false(desc, set.contains_null());
            return Ok(());
        }
        match op {
            Operator::EqAll => {
                if set.distinct() == 1 {
                    desc.op = Operator::Eq;
                    desc.val1 = CQTerm::new(VirtualColumn::constant(set.min().clone()));
                } else {
                    Self::set_false(desc, false);
                }
            }
            Operator::NotEqAny => {
                if set.distinct() == 1 {
                    desc.op = Operator::NotEq;
                    desc.val1 = CQTerm::new(VirtualColumn::constant(set.min().clone()));
                } else {
                    Self::set_unary(desc, Operator::NotNull);
                    self.transform_with_respect_to_nulls(desc, attr)?;
                }
            }
            // x < ANY(s) and x > ALL(s) compare with the largest element
            Operator::LessAny | Operator::LessEqAny | Operator::MoreAll | Operator::MoreEqAll => {
                desc.op = op.unmark_all_any();
                desc.val1 = CQTerm::new(VirtualColumn::constant(set.max().clone()));
            }
            Operator::LessAll | Operator::LessEqAll | Operator::MoreAny | Operator::MoreEqAny => {
                desc.op = op.unmark_all_any();
                desc.val1 = CQTerm::new(VirtualColumn::constant(set.min().clone()));
            }
            _ => {
                // a single row subquery used as a scalar
                if set.len() > 1 {
                    return Err(FilterError::Unsupported("multiple values for a scalar operand".into()));
                }
                let v = set.values().first().cloned().unwrap_or_default();
                if v.is_null() {
                    Self::set_false(desc, true);
                } else {
                    desc.val1 = CQTerm::new(VirtualColumn::constant(v));
                }
            }
        }
        Ok(())
    }

    fn const_of(term: &CQTerm, column_type: ColumnType) -> Result<TypedValue> {
        term.const_value()
            .and_then(|v| v.coerce_to(column_type))
            .ok_or_else(|| FilterError::Unsupported(format!("constant not convertible to {}", column_type)))
    }

    fn negative_empty(desc: &mut Descriptor, contains_null: bool) {
        // NOT IN () holds for every non null value
        if contains_null {
            Self::set_false(desc, true);
        } else {
            Self::set_unary(desc, Operator::NotNull);
        }
    }

    /// Integer bounds of `attr op v`, `None` when nothing satisfies it.
    fn integer_bounds(op: Operator, v: &TypedValue) -> Option<(i64, i64)> {
        let exact = v.as_i64();
        let real = v.as_f64()?;
        let floor = exact.or_else(|| Some(real.floor()).filter(|f| f.abs() < 9.2e18).map(|f| f as i64));
        let ceil = exact.or_else(|| Some(real.ceil()).filter(|f| f.abs() < 9.2e18).map(|f| f as i64));
        match op {
            Operator::Eq => exact.map(|x| (x, x)),
            Operator::Less => {
                let hi = if exact.is_some() { ceil?.checked_sub(1)? } else { floor? };
                Some((i64::MIN, hi))
            }
            Operator::LessEq => Some((i64::MIN, floor?)),
            Operator::More => {
                let lo = if exact.is_some() { floor?.checked_add(1)? } else { ceil? };
                Some((lo, i64::MAX))
            }
            Operator::MoreEq => Some((ceil?, i64::MAX)),
            _ => None,
        }
    }

    fn encode_on_integers(&self, desc: &mut Descriptor, attr: &Arc<VirtualColumn>) -> Result<()> {
        match desc.op {
            Operator::In | Operator::NotIn => return self.transform_integer_ins(desc),
            Operator::Like | Operator::NotLike => {
                return Err(FilterError::Unsupported("LIKE on a numeric column".into()));
            }
            _ => {}
        }
        if matches!(desc.op, Operator::Between | Operator::NotBetween) {
            let low = Self::const_of(&desc.val1, ColumnType::Int)?;
            let high = Self::const_of(&desc.val2, ColumnType::Int)?;
            let (low_op, high_op) = if desc.sharp {
                (Operator::More, Operator::Less)
            } else {
                (Operator::MoreEq, Operator::LessEq)
            };
            let lo = Self::integer_bounds(low_op, &low).map(|b| b.0);
            let hi = Self::integer_bounds(high_op, &high).map(|b| b.1);
            return Ok(match (lo, hi) {
                (Some(lo), Some(hi)) if lo <= hi => {
                    let op = desc.op;
                    Self::set_interval(desc, op, TypedValue::Int(lo), TypedValue::Int(hi), false)
                }
                _ if desc.op == Operator::Between => Self::set_false(desc, false),
                _ => {
                    Self::set_unary(desc, Operator::NotNull);
                    self.transform_with_respect_to_nulls(desc, attr)?;
                }
            });
        }

        let v = Self::const_of(&desc.val1, ColumnType::Int)?;
        match desc.op {
            Operator::Eq | Operator::NotEq => match v.as_i64() {
                Some(x) => {
                    let op = if desc.op == Operator::Eq { Operator::Between } else { Operator::NotBetween };
                    Self::set_interval(desc, op, TypedValue::Int(x), TypedValue::Int(x), false);
                }
                None if desc.op == Operator::Eq => Self::set_false(desc, false),
                None => {
                    Self::set_unary(desc, Operator::NotNull);
                    self.transform_with_respect_to_nulls(desc, attr)?;
                }
            },
            op @ (Operator::Less | Operator::LessEq | Operator::More | Operator::MoreEq) => {
                match Self::integer_bounds(op, &v) {
                    Some((lo, hi)) if lo <= hi => {
                        Self::set_interval(desc, Operator::Between, TypedValue::Int(lo), TypedValue::Int(hi), false)
                    }
                    _ => Self::set_false(desc, false),
                }
            }
            op => return Err(FilterError::Unsupported(format!("operator {} on an integer column", op))),
        }
        Ok(())
    }

    fn transform_integer_ins(&self, desc: &mut Descriptor) -> Result<()> {
        let Some(set) = Self::set_of(&desc.val1)? else {
            return Err(FilterError::Unsupported("IN without a value list".into()));
        };
        let negative = desc.op == Operator::NotIn;
        if set.distinct() == 0 {
            if negative {
                Self::negative_empty(desc, set.contains_null());
            } else {
                Self::set_false(desc, set.contains_null());
            }
            return Ok(());
        }
        if set.contains_null() {
            return Ok(());
        }
        let integral: Option<Vec<i64>> = set
            .values()
            .iter()
            .map(|v| v.coerce_to(ColumnType::Int).and_then(|v| v.as_i64()))
            .collect();
        let Some(values) = integral else {
            return Ok(());
        };
        let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) else {
            return Ok(());
        };
        let span = max.saturating_sub(min).saturating_add(1);
        if span <= MAX_DENSE_IN_SPAN && span as usize == set.distinct() {
            let op = if negative { Operator::NotBetween } else { Operator::Between };
            Self::set_interval(desc, op, TypedValue::Int(min), TypedValue::Int(max), false);
        }
        Ok(())
    }

    /// Real and string columns: comparisons become half open intervals.
    fn encode_on_ordered(&self, desc: &mut Descriptor, column_type: ColumnType) -> Result<()> {
        if matches!(desc.op, Operator::Like | Operator::NotLike) {
            if column_type != ColumnType::String {
                return Err(FilterError::Unsupported("LIKE on a numeric column".into()));
            }
            let pattern = Self::const_of(&desc.val1, ColumnType::String)?;
            let Some(text) = pattern.as_str().and_then(|p| Self::literal_pattern(p, desc.like_esc)) else {
                return Ok(());
            };
            desc.op = if desc.op == Operator::Like { Operator::Eq } else { Operator::NotEq };
            desc.val1 = CQTerm::new(VirtualColumn::constant(TypedValue::Str(text)));
        }
        match desc.op {
            Operator::In | Operator::NotIn => {
                let Some(set) = Self::set_of(&desc.val1)? else {
                    return Ok(());
                };
                if set.distinct() == 0 {
                    if desc.op == Operator::NotIn {
                        Self::negative_empty(desc, set.contains_null());
                    } else {
                        Self::set_false(desc, set.contains_null());
                    }
                } else if set.distinct() == 1 && !set.contains_null() && desc.collation.is_binary() {
                    let v = set.min().coerce_to(column_type).unwrap_or_else(|| set.min().clone());
                    let op = if desc.op == Operator::In { Operator::Between } else { Operator::NotBetween };
                    Self::set_interval(desc, op, v.clone(), v, false);
                }
            }
            Operator::Between | Operator::NotBetween => {
                let low = Self::const_of(&desc.val1, column_type)?;
                let high = Self::const_of(&desc.val2, column_type)?;
                let (op, sharp) = (desc.op, desc.sharp);
                Self::set_interval(desc, op, low, high, sharp);
            }
            op => {
                let v = Self::const_of(&desc.val1, column_type)?;
                match op {
                    Operator::Eq => Self::set_interval(desc, Operator::Between, v.clone(), v, false),
                    Operator::NotEq => Self::set_interval(desc, Operator::NotBetween, v.clone(), v, false),
                    Operator::Less | Operator::LessEq => {
                        Self::set_interval(desc, Operator::Between, TypedValue::Null, v, op == Operator::Less)
                    }
                    Operator::More | Operator::MoreEq => {
                        Self::set_interval(desc, Operator::Between, v, TypedValue::Null, op == Operator::More)
                    }
                    op => return Err(FilterError::Unsupported(format!("operator {}", op))),
                }
            }
        }
        Ok(())
    }

    /// Text of a `LIKE` pattern without wildcards, escapes resolved.
    fn literal_pattern(pattern: &str, escape: char) -> Option<String> {
        let mut out = String::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '%' | '_' => return None,
                c if c == escape => out.push(chars.next()?),
                c => out.push(c),
            }
        }
        Some(out)
    }

    /// Lookup columns: constants are replaced by the dictionary codes they match.
    fn encode_on_lookup(&self, desc: &mut Descriptor, attr: &Arc<VirtualColumn>, single: &SingleColumn) -> Result<()> {
        let Some(dictionary) = single.data().dictionary() else {
            return Err(FilterError::Unsupported("lookup column without a dictionary".into()));
        };
        let collation = desc.collation;
        let codes_of = |matches: &dyn Fn(&str) -> bool| -> Vec<i64> {
            dictionary
                .iter()
                .enumerate()
                .filter(|(_, text)| matches(text))
                .map(|(code, _)| code as i64)
                .collect()
        };

        let (codes, positive, contains_null) = match desc.op {
            Operator::Eq | Operator::NotEq => {
                let v = Self::const_of(&desc.val1, ColumnType::Lookup)?;
                let text = v.as_str().unwrap_or_default().to_owned();
                (codes_of(&|d| collation.eq_str(d, &text)), desc.op == Operator::Eq, false)
            }
            Operator::Like | Operator::NotLike => {
                let v = Self::const_of(&desc.val1, ColumnType::Lookup)?;
                let pattern = v.as_str().unwrap_or_default().to_owned();
                let esc = desc.like_esc;
                (codes_of(&|d| collation.like(d, &pattern, esc)), desc.op == Operator::Like, false)
            }
            Operator::In | Operator::NotIn => {
                let Some(set) = Self::set_of(&desc.val1)? else {
                    return Err(FilterError::Unsupported("IN without a value list".into()));
                };
                let texts: Vec<String> = set.values().iter().filter_map(TypedValue::to_text).collect();
                let codes = codes_of(&|d| texts.iter().any(|t| collation.eq_str(d, t)));
                (codes, desc.op == Operator::In, set.contains_null())
            }
            op => return Err(FilterError::Unsupported(format!("operator {} on a dictionary column", op))),
        };

        match (codes.as_slice(), positive) {
            ([], true) => Self::set_false(desc, contains_null),
            ([], false) => {
                Self::negative_empty(desc, contains_null);
                self.transform_with_respect_to_nulls(desc, attr)?;
            }
            ([code], _) if !contains_null => {
                let op = if positive { Operator::Between } else { Operator::NotBetween };
                Self::set_interval(desc, op, TypedValue::Int(*code), TypedValue::Int(*code), false);
            }
            (codes, _) => {
                desc.op = if positive { Operator::In } else { Operator::NotIn };
                desc.val1 = CQTerm::new(VirtualColumn::const_set(codes.iter().copied().map(TypedValue::Int)));
                desc.val2 = CQTerm::default();
                desc.sharp = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::{
        descriptor::Descriptor,
        multi_index::TuplePosition,
        storage::StoredTable,
        types::{ColumnType, Operator, TypedValue},
        vc::VirtualColumn,
    };

    use super::ConditionEncoder;

    fn table() -> Arc<StoredTable> {
        StoredTable::builder("t", 2)
            .int_column("a", 0..16)
            .column(
                "r",
                ColumnType::Real,
                (0..16).map(|i| TypedValue::Real(i as f64 / 2.0)).collect(),
            )
            .column(
                "s",
                ColumnType::Lookup,
                (0..16)
                    .map(|i| TypedValue::Str(["red", "green", "blue"][i % 3].to_string()))
                    .collect(),
            )
            .build()
            .unwrap()
    }

    fn encoded(column: &str, op: Operator, value: TypedValue) -> Descriptor {
        let t = table();
        let attr = VirtualColumn::column(&t, column, 0).unwrap();
        let mut d = Descriptor::compare(&attr, op, &VirtualColumn::constant(value), 1);
        ConditionEncoder::encode_if_possible(&mut d, false, false).unwrap();
        d
    }

    fn bounds(d: &Descriptor) -> (TypedValue, TypedValue) {
        let pos = TuplePosition::new(0, 0);
        (d.val1.value(&pos).unwrap(), d.val2.value(&pos).unwrap())
    }

    #[test]
    fn integer_comparisons_become_closed_intervals() {
        let d = encoded("a", Operator::Less, TypedValue::Int(5));
        assert!(d.encoded);
        assert_eq!(d.op, Operator::Between);
        assert!(!d.sharp);
        assert_eq!(bounds(&d), (TypedValue::Int(i64::MIN), TypedValue::Int(4)));

        let d = encoded("a", Operator::More, TypedValue::Real(2.5));
        assert_eq!(bounds(&d), (TypedValue::Int(3), TypedValue::Int(i64::MAX)));

        let d = encoded("a", Operator::NotEq, TypedValue::Int(7));
        assert_eq!(d.op, Operator::NotBetween);
        assert_eq!(bounds(&d), (TypedValue::Int(7), TypedValue::Int(7)));
    }

    #[test]
    fn fractional_equality_on_integers_folds() {
        assert!(encoded("a", Operator::Eq, TypedValue::Real(1.5)).is_false());
        // no nulls in the column, so NOT NULL folds as well
        assert!(encoded("a", Operator::NotEq, TypedValue::Real(1.5)).is_true());
    }

    #[test]
    fn real_comparisons_use_open_sharp_bounds() {
        let d = encoded("r", Operator::Less, TypedValue::Real(3.0));
        assert_eq!(d.op, Operator::Between);
        assert!(d.sharp);
        assert_eq!(bounds(&d), (TypedValue::Null, TypedValue::Real(3.0)));
    }

    #[test]
    fn lookup_constants_become_codes() {
        let d = encoded("s", Operator::Eq, TypedValue::Str("blue".into()));
        assert_eq!(d.op, Operator::Between);
        assert_eq!(bounds(&d), (TypedValue::Int(2), TypedValue::Int(2)));

        assert!(encoded("s", Operator::Eq, TypedValue::Str("pink".into())).is_false());
        assert!(encoded("s", Operator::NotEq, TypedValue::Str("pink".into())).is_true());

        let d = encoded("s", Operator::Like, TypedValue::Str("%e%".into()));
        assert_eq!(d.op, Operator::In);
    }

    #[test]
    fn null_checks_fold_on_statistics() {
        let t = table();
        let attr = VirtualColumn::column(&t, "a", 0).unwrap();
        let mut d = Descriptor::unary(&attr, Operator::IsNull, 1);
        ConditionEncoder::encode_if_possible(&mut d, false, false).unwrap();
        assert!(d.is_false());

        let mut d = Descriptor::unary(&attr, Operator::IsNull, 1);
        ConditionEncoder::encode_if_possible(&mut d, false, true).unwrap();
        assert_eq!(d.op, Operator::IsNull);
    }

    #[test]
    fn in_lists_collapse() {
        let t = table();
        let attr = VirtualColumn::column(&t, "a", 0).unwrap();
        let mut d = Descriptor::compare(&attr, Operator::In, &VirtualColumn::const_set([3i64, 4, 5]), 1);
        ConditionEncoder::encode_if_possible(&mut d, false, false).unwrap();
        assert_eq!(d.op, Operator::Between);
        assert_eq!(bounds(&d), (TypedValue::Int(3), TypedValue::Int(5)));

        let mut d = Descriptor::compare(
            &attr,
            Operator::NotIn,
            &VirtualColumn::const_set([TypedValue::Int(1), TypedValue::Null]),
            1,
        );
        ConditionEncoder::encode_if_possible(&mut d, false, false).unwrap();
        assert!(d.is_false());
        assert!(d.null_after_simplify);
    }

    #[test]
    fn set_all_over_empty_set_is_true() {
        let t = table();
        let attr = VirtualColumn::column(&t, "a", 0).unwrap();
        let empty = VirtualColumn::const_set(Vec::<TypedValue>::new());
        let mut d = Descriptor::compare(&attr, Operator::LessAll, &empty, 1);
        ConditionEncoder::encode_if_possible(&mut d, false, false).unwrap();
        assert!(d.is_true());
    }
}
