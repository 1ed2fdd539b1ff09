use std::{cmp::Ordering, fmt};

use super::{Collation, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Real,
    String,
    /// Dictionary encoded string, rows hold the dictionary code.
    Lookup,
}

impl ColumnType {
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Real)
    }

    #[inline]
    pub fn is_string(self) -> bool {
        matches!(self, ColumnType::String | ColumnType::Lookup)
    }

    #[inline]
    pub fn is_lookup(self) -> bool {
        self == ColumnType::Lookup
    }

    #[inline]
    pub fn is_float(self) -> bool {
        self == ColumnType::Real
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format!("{:?}", self))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypedValue {
    #[default]
    Null,
    Int(i64),
    Real(f64),
    Str(String),
}

impl TypedValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Int(v) => Some(*v as f64),
            TypedValue::Real(v) => Some(*v),
            TypedValue::Str(s) => s.trim().parse::<f64>().ok(),
            TypedValue::Null => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_text(&self) -> Option<String> {
        match self {
            TypedValue::Null => None,
            TypedValue::Int(v) => Some(v.to_string()),
            TypedValue::Real(v) => Some(v.to_string()),
            TypedValue::Str(s) => Some(s.clone()),
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, TypedValue::Str(_))
    }

    /// Converts the value to the representation used by columns of `column_type`.
    /// Returns `None` when the conversion is not possible.
    pub fn coerce_to(&self, column_type: ColumnType) -> Option<TypedValue> {
        match (self, column_type) {
            (TypedValue::Null, _) => Some(TypedValue::Null),
            (TypedValue::Int(_), ColumnType::Int) => Some(self.clone()),
            (TypedValue::Real(_), ColumnType::Real) => Some(self.clone()),
            (TypedValue::Str(_), ColumnType::String | ColumnType::Lookup) => Some(self.clone()),
            (TypedValue::Int(v), ColumnType::Real) => Some(TypedValue::Real(*v as f64)),
            (TypedValue::Real(v), ColumnType::Int) => {
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                    Some(TypedValue::Int(*v as i64))
                } else {
                    // Keeps the fraction, comparisons against ints still work numerically.
                    Some(self.clone())
                }
            }
            (TypedValue::Str(s), ColumnType::Int) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(TypedValue::Int)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(TypedValue::Real))
            }
            (TypedValue::Str(s), ColumnType::Real) => {
                s.trim().parse::<f64>().ok().map(TypedValue::Real)
            }
            (TypedValue::Int(_) | TypedValue::Real(_), ColumnType::String | ColumnType::Lookup) => {
                self.to_text().map(TypedValue::Str)
            }
        }
    }

    /// SQL ordering, `None` if either side is null or the values are not comparable.
    pub fn sql_cmp(&self, other: &TypedValue) -> Option<Ordering> {
        self.cmp_collated(other, Collation::Binary)
    }

    pub fn cmp_collated(&self, other: &TypedValue, collation: Collation) -> Option<Ordering> {
        match (self, other) {
            (TypedValue::Null, _) | (_, TypedValue::Null) => None,
            (TypedValue::Int(a), TypedValue::Int(b)) => Some(a.cmp(b)),
            (TypedValue::Str(a), TypedValue::Str(b)) => Some(collation.cmp_str(a, b)),
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Equality as used by `=`: nulls never compare equal.
    #[inline]
    pub fn sql_eq(&self, other: &TypedValue) -> bool {
        self.sql_cmp(other) == Some(Ordering::Equal)
    }

    /// Evaluates `self op other` for the simple comparison and `LIKE` operators.
    /// Nulls make the comparison false.
    pub fn compare(&self, other: &TypedValue, op: Operator, like_esc: char) -> bool {
        self.compare_collated(other, op, like_esc, Collation::Binary)
    }

    pub fn compare_collated(
        &self,
        other: &TypedValue,
        op: Operator,
        like_esc: char,
        collation: Collation,
    ) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        if op == Operator::Like || op == Operator::NotLike {
            let (Some(text), Some(pattern)) = (self.to_text(), other.to_text()) else {
                return false;
            };
            let matched = collation.like(&text, &pattern, like_esc);
            return if op == Operator::Like { matched } else { !matched };
        }
        let Some(ord) = self.cmp_collated(other, collation) else {
            return false;
        };
        match op.unmark_all_any() {
            Operator::Eq => ord == Ordering::Equal,
            Operator::NotEq => ord != Ordering::Equal,
            Operator::Less => ord == Ordering::Less,
            Operator::LessEq => ord != Ordering::Greater,
            Operator::More => ord == Ordering::Greater,
            Operator::MoreEq => ord != Ordering::Less,
            _ => false,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => f.write_str("NULL"),
            TypedValue::Int(v) => write!(f, "{}", v),
            TypedValue::Real(v) => write!(f, "{}", v),
            TypedValue::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Real(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::Str(value.to_string())
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(TypedValue::Null)
    }
}

/// Hashable image of a non null value, numerically equal values share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Int(i64),
    Real(u64),
    Str(String),
}

impl ValueKey {
    pub fn from_value(value: &TypedValue) -> Option<ValueKey> {
        match value {
            TypedValue::Null => None,
            TypedValue::Int(v) => Some(ValueKey::Int(*v)),
            TypedValue::Real(v) => {
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                    Some(ValueKey::Int(*v as i64))
                } else {
                    Some(ValueKey::Real(v.to_bits()))
                }
            }
            TypedValue::Str(s) => Some(ValueKey::Str(s.clone())),
        }
    }
}
