use std::{fmt, sync::Arc};

use crate::core::{
    error::Result,
    multi_index::TuplePosition,
    types::{DimensionVector, TypedValue},
    vc::VirtualColumn,
};

/// Operand of a descriptor. An empty term stands for a missing operand,
/// e.g. `val2` of anything but `BETWEEN`.
#[derive(Debug, Clone, Default)]
pub struct CQTerm {
    vc: Option<Arc<VirtualColumn>>,
}

impl CQTerm {
    pub fn new(vc: Arc<VirtualColumn>) -> Self {
        Self { vc: Some(vc) }
    }

    #[inline]
    pub fn vc(&self) -> Option<&Arc<VirtualColumn>> {
        self.vc.as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vc.is_none()
    }

    /// Constant value of the operand. `None` for a missing operand or one depending on the tuple.
    #[inline]
    pub fn const_value(&self) -> Option<TypedValue> {
        self.vc.as_ref().and_then(|vc| vc.const_value())
    }

    /// True for a missing operand or a constant one.
    #[inline]
    pub fn is_const_or_empty(&self) -> bool {
        self.vc.as_ref().is_none_or(|vc| vc.is_const())
    }

    /// True for a missing operand or a constant null.
    pub fn is_null_const(&self) -> bool {
        match &self.vc {
            None => true,
            Some(vc) => vc.is_const() && !vc.is_multival() && vc.const_value().is_none_or(|v| v.is_null()),
        }
    }

    pub fn value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        match &self.vc {
            Some(vc) => vc.value(pos),
            None => Ok(TypedValue::Null),
        }
    }

    pub fn mark_used_dims(&self, dims: &mut DimensionVector) {
        if let Some(vc) = &self.vc {
            vc.mark_used_dims(dims);
        }
    }

    /// Dimensions read by the operand.
    pub fn dims(&self, no_dims: usize) -> DimensionVector {
        let mut dims = DimensionVector::new(no_dims);
        self.mark_used_dims(&mut dims);
        dims
    }
}

impl From<Arc<VirtualColumn>> for CQTerm {
    fn from(vc: Arc<VirtualColumn>) -> Self {
        Self::new(vc)
    }
}

/// Terms are equal when they refer to the same column. Two casts are equal
/// when they cast the same column to the same type.
impl PartialEq for CQTerm {
    fn eq(&self, other: &Self) -> bool {
        match (&self.vc, &other.vc) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                match (a.as_type_cast(), b.as_type_cast()) {
                    (Some(ca), Some(cb)) => Arc::ptr_eq(ca.child(), cb.child()) && ca.target() == cb.target(),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for CQTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vc {
            Some(vc) => write!(f, "{}", vc),
            None => f.write_str("(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ColumnType;

    #[test]
    fn identity_and_casts() {
        let a = VirtualColumn::constant(1i64);
        let b = VirtualColumn::constant(1i64);
        assert_eq!(CQTerm::new(Arc::clone(&a)), CQTerm::new(Arc::clone(&a)));
        assert_ne!(CQTerm::new(Arc::clone(&a)), CQTerm::new(Arc::clone(&b)));

        let c1 = VirtualColumn::type_cast(Arc::clone(&a), ColumnType::Real);
        let c2 = VirtualColumn::type_cast(Arc::clone(&a), ColumnType::Real);
        let c3 = VirtualColumn::type_cast(b, ColumnType::Real);
        assert_eq!(CQTerm::new(c1.clone()), CQTerm::new(c2));
        assert_ne!(CQTerm::new(c1), CQTerm::new(c3));

        assert!(CQTerm::default().is_null_const());
        assert!(CQTerm::new(VirtualColumn::constant(TypedValue::Null)).is_null_const());
        assert!(!CQTerm::new(a).is_null_const());
    }
}
