use std::sync::Arc;

use crate::core::{
    error::Result,
    multi_index::TuplePosition,
    types::{ColumnType, TypedValue},
};

use super::VirtualColumn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Concat,
}

impl ExprOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExprOp::Add => "+",
            ExprOp::Sub | ExprOp::Neg => "-",
            ExprOp::Mul => "*",
            ExprOp::Div => "/",
            ExprOp::Concat => "||",
        }
    }
}

/// Arithmetic over other virtual columns.
#[derive(Debug, Clone)]
pub struct ExpressionColumn {
    op: ExprOp,
    args: Vec<Arc<VirtualColumn>>,
    deterministic: bool,
}

impl ExpressionColumn {
    pub fn new(op: ExprOp, args: Vec<Arc<VirtualColumn>>) -> Self {
        Self {
            op,
            args,
            deterministic: true,
        }
    }

    /// Marks the expression as returning different values on each call.
    pub fn nondeterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    #[inline]
    pub fn op(&self) -> ExprOp {
        self.op
    }

    #[inline]
    pub fn args(&self) -> &[Arc<VirtualColumn>] {
        &self.args
    }

    #[inline]
    pub fn is_deterministic(&self) -> bool {
        self.deterministic && self.args.iter().all(|a| a.is_deterministic())
    }

    pub fn column_type(&self) -> ColumnType {
        match self.op {
            ExprOp::Concat => ColumnType::String,
            ExprOp::Div => ColumnType::Real,
            _ if self.args.iter().all(|a| a.column_type() == ColumnType::Int) => ColumnType::Int,
            _ => ColumnType::Real,
        }
    }

    pub fn value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push(arg.value(pos)?);
        }
        Ok(apply(self.op, &values))
    }
}

fn apply(op: ExprOp, values: &[TypedValue]) -> TypedValue {
    if values.is_empty() || values.iter().any(TypedValue::is_null) {
        return TypedValue::Null;
    }
    if op == ExprOp::Concat {
        return TypedValue::Str(values.iter().filter_map(TypedValue::to_text).collect());
    }
    if op == ExprOp::Neg {
        return match &values[0] {
            TypedValue::Int(v) => v.checked_neg().map_or(TypedValue::Real(-(*v as f64)), TypedValue::Int),
            other => other.as_f64().map_or(TypedValue::Null, |v| TypedValue::Real(-v)),
        };
    }

    let mut acc = values[0].clone();
    for next in &values[1..] {
        acc = match (&acc, next, op) {
            (TypedValue::Int(a), TypedValue::Int(b), ExprOp::Add) => {
                a.checked_add(*b).map_or(TypedValue::Real(*a as f64 + *b as f64), TypedValue::Int)
            }
            (TypedValue::Int(a), TypedValue::Int(b), ExprOp::Sub) => {
                a.checked_sub(*b).map_or(TypedValue::Real(*a as f64 - *b as f64), TypedValue::Int)
            }
            (TypedValue::Int(a), TypedValue::Int(b), ExprOp::Mul) => {
                a.checked_mul(*b).map_or(TypedValue::Real(*a as f64 * *b as f64), TypedValue::Int)
            }
            _ => {
                let (Some(a), Some(b)) = (acc.as_f64(), next.as_f64()) else {
                    return TypedValue::Null;
                };
                match op {
                    ExprOp::Add => TypedValue::Real(a + b),
                    ExprOp::Sub => TypedValue::Real(a - b),
                    ExprOp::Mul => TypedValue::Real(a * b),
                    // division by zero is null
                    _ if b == 0.0 => return TypedValue::Null,
                    _ => TypedValue::Real(a / b),
                }
            }
        };
    }
    acc
}

/// Conversion of another column's values to `target`.
#[derive(Debug, Clone)]
pub struct TypeCastColumn {
    child: Arc<VirtualColumn>,
    target: ColumnType,
}

impl TypeCastColumn {
    pub fn new(child: Arc<VirtualColumn>, target: ColumnType) -> Self {
        Self { child, target }
    }

    #[inline]
    pub fn child(&self) -> &Arc<VirtualColumn> {
        &self.child
    }

    #[inline]
    pub fn target(&self) -> ColumnType {
        self.target
    }

    pub fn value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        Ok(self.child.value(pos)?.coerce_to(self.target).unwrap_or(TypedValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_follows_sql_nulls() {
        assert_eq!(apply(ExprOp::Add, &[TypedValue::Int(2), TypedValue::Int(3)]), TypedValue::Int(5));
        assert_eq!(apply(ExprOp::Add, &[TypedValue::Int(2), TypedValue::Null]), TypedValue::Null);
        assert_eq!(apply(ExprOp::Div, &[TypedValue::Int(1), TypedValue::Int(0)]), TypedValue::Null);
        assert_eq!(apply(ExprOp::Div, &[TypedValue::Int(3), TypedValue::Int(2)]), TypedValue::Real(1.5));
        assert_eq!(
            apply(ExprOp::Mul, &[TypedValue::Int(i64::MAX), TypedValue::Int(2)]),
            TypedValue::Real(i64::MAX as f64 * 2.0)
        );
        assert_eq!(
            apply(ExprOp::Concat, &[TypedValue::from("a"), TypedValue::Int(1)]),
            TypedValue::from("a1")
        );
    }
}
