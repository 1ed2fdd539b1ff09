use std::ops::Not;

/// Three valued logic used by SQL comparisons involving nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tribool {
    False,
    True,
    Unknown,
}

impl Tribool {
    #[inline]
    pub fn and(a: Tribool, b: Tribool) -> Tribool {
        match (a, b) {
            (Tribool::False, _) | (_, Tribool::False) => Tribool::False,
            (Tribool::True, Tribool::True) => Tribool::True,
            _ => Tribool::Unknown,
        }
    }

    #[inline]
    pub fn or(a: Tribool, b: Tribool) -> Tribool {
        match (a, b) {
            (Tribool::True, _) | (_, Tribool::True) => Tribool::True,
            (Tribool::False, Tribool::False) => Tribool::False,
            _ => Tribool::Unknown,
        }
    }

    #[inline]
    pub fn is_true(self) -> bool {
        self == Tribool::True
    }

    #[inline]
    pub fn is_false(self) -> bool {
        self == Tribool::False
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == Tribool::Unknown
    }
}

impl Not for Tribool {
    type Output = Tribool;

    fn not(self) -> Tribool {
        match self {
            Tribool::True => Tribool::False,
            Tribool::False => Tribool::True,
            Tribool::Unknown => Tribool::Unknown,
        }
    }
}

impl From<bool> for Tribool {
    #[inline]
    fn from(value: bool) -> Self {
        if value { Tribool::True } else { Tribool::False }
    }
}
