use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    EqAll,
    EqAny,
    NotEq,
    NotEqAll,
    NotEqAny,
    Less,
    LessAll,
    LessAny,
    LessEq,
    LessEqAll,
    LessEqAny,
    More,
    MoreAll,
    MoreAny,
    MoreEq,
    MoreEqAll,
    MoreEqAny,
    IsNull,
    NotNull,
    Between,
    NotBetween,
    Like,
    NotLike,
    In,
    NotIn,
    Exists,
    NotExists,
    False,
    True,
    OrTree,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::EqAll => "=ALL",
            Operator::EqAny => "=ANY",
            Operator::NotEq => "<>",
            Operator::NotEqAll => "<>ALL",
            Operator::NotEqAny => "<>ANY",
            Operator::Less => "<",
            Operator::LessAll => "<ALL",
            Operator::LessAny => "<ANY",
            Operator::LessEq => "<=",
            Operator::LessEqAll => "<=ALL",
            Operator::LessEqAny => "<=ANY",
            Operator::More => ">",
            Operator::MoreAll => ">ALL",
            Operator::MoreAny => ">ANY",
            Operator::MoreEq => ">=",
            Operator::MoreEqAll => ">=ALL",
            Operator::MoreEqAny => ">=ANY",
            Operator::IsNull => "IS NULL",
            Operator::NotNull => "IS NOT NULL",
            Operator::Between => "BET.",
            Operator::NotBetween => "NOT BET.",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Exists => "EXISTS",
            Operator::NotExists => "NOT EXISTS",
            Operator::False => "FALSE",
            Operator::True => "TRUE",
            Operator::OrTree => "OR TREE",
        }
    }

    #[inline]
    pub fn is_set_all(self) -> bool {
        matches!(
            self,
            Operator::EqAll
                | Operator::NotEqAll
                | Operator::LessAll
                | Operator::MoreAll
                | Operator::LessEqAll
                | Operator::MoreEqAll
        )
    }

    #[inline]
    pub fn is_set_any(self) -> bool {
        matches!(
            self,
            Operator::EqAny
                | Operator::NotEqAny
                | Operator::LessAny
                | Operator::MoreAny
                | Operator::LessEqAny
                | Operator::MoreEqAny
        )
    }

    /// Operators evaluated against a multi valued right side.
    #[inline]
    pub fn is_set_operator(self) -> bool {
        self.is_set_all() || self.is_set_any() || self == Operator::In || self == Operator::NotIn
    }

    #[inline]
    pub fn is_all_any(self) -> bool {
        self.is_set_all() || self.is_set_any()
    }

    /// `=`, `<>`, `<`, `<=`, `>`, `>=`
    #[inline]
    pub fn is_simple_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::NotEq
                | Operator::Less
                | Operator::LessEq
                | Operator::More
                | Operator::MoreEq
        )
    }

    #[inline]
    pub fn is_type_of_equal(self) -> bool {
        matches!(self, Operator::Eq | Operator::EqAll | Operator::EqAny)
    }

    #[inline]
    pub fn is_type_of_not_equal(self) -> bool {
        matches!(self, Operator::NotEq | Operator::NotEqAll | Operator::NotEqAny)
    }

    #[inline]
    pub fn is_type_of_less(self) -> bool {
        matches!(self, Operator::Less | Operator::LessAll | Operator::LessAny)
    }

    #[inline]
    pub fn is_type_of_less_eq(self) -> bool {
        matches!(self, Operator::LessEq | Operator::LessEqAll | Operator::LessEqAny)
    }

    #[inline]
    pub fn is_type_of_more(self) -> bool {
        matches!(self, Operator::More | Operator::MoreAll | Operator::MoreAny)
    }

    #[inline]
    pub fn is_type_of_more_eq(self) -> bool {
        matches!(self, Operator::MoreEq | Operator::MoreEqAll | Operator::MoreEqAny)
    }

    pub fn mark_with_any(self) -> Operator {
        match self {
            Operator::Eq => Operator::EqAny,
            Operator::NotEq => Operator::NotEqAny,
            Operator::Less => Operator::LessAny,
            Operator::LessEq => Operator::LessEqAny,
            Operator::More => Operator::MoreAny,
            Operator::MoreEq => Operator::MoreEqAny,
            other => other,
        }
    }

    pub fn mark_with_all(self) -> Operator {
        match self {
            Operator::Eq => Operator::EqAll,
            Operator::NotEq => Operator::NotEqAll,
            Operator::Less => Operator::LessAll,
            Operator::LessEq => Operator::LessEqAll,
            Operator::More => Operator::MoreAll,
            Operator::MoreEq => Operator::MoreEqAll,
            other => other,
        }
    }

    pub fn unmark_all_any(self) -> Operator {
        match self {
            Operator::EqAll | Operator::EqAny => Operator::Eq,
            Operator::NotEqAll | Operator::NotEqAny => Operator::NotEq,
            Operator::LessAll | Operator::LessAny => Operator::Less,
            Operator::LessEqAll | Operator::LessEqAny => Operator::LessEq,
            Operator::MoreAll | Operator::MoreAny => Operator::More,
            Operator::MoreEqAll | Operator::MoreEqAny => Operator::MoreEq,
            other => other,
        }
    }

    /// Operator obtained when both sides of a comparison are exchanged.
    pub fn switch_sides(self) -> Operator {
        match self {
            Operator::Less => Operator::More,
            Operator::More => Operator::Less,
            Operator::LessEq => Operator::MoreEq,
            Operator::MoreEq => Operator::LessEq,
            other => other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}
