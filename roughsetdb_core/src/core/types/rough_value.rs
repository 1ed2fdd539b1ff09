use std::fmt;

/// Pack level verdict of a predicate.
///
/// - `None`: no row of the pack can satisfy it
/// - `All`: every row of the pack satisfies it
/// - `Some`: the pack must be checked row by row
/// - `Unknown`: nothing was evaluated yet
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoughSetValue {
    None = 0,
    Some = 1,
    All = 2,
    Unknown = 3,
}

impl RoughSetValue {
    #[inline]
    pub fn and(a: RoughSetValue, b: RoughSetValue) -> RoughSetValue {
        if a == RoughSetValue::None || b == RoughSetValue::None {
            RoughSetValue::None
        } else if a == RoughSetValue::All && b == RoughSetValue::All {
            RoughSetValue::All
        } else {
            RoughSetValue::Some
        }
    }

    #[inline]
    pub fn or(a: RoughSetValue, b: RoughSetValue) -> RoughSetValue {
        if a == RoughSetValue::All || b == RoughSetValue::All {
            RoughSetValue::All
        } else if a == RoughSetValue::None && b == RoughSetValue::None {
            RoughSetValue::None
        } else {
            RoughSetValue::Some
        }
    }

    /// Folds another check result into an accumulated verdict.
    /// A verdict can only move towards `Some`.
    #[inline]
    pub fn accumulate(&mut self, r: RoughSetValue) {
        match *self {
            RoughSetValue::Unknown => *self = r,
            RoughSetValue::None if r != RoughSetValue::None => *self = RoughSetValue::Some,
            RoughSetValue::All if r != RoughSetValue::All => *self = RoughSetValue::Some,
            _ => {}
        }
    }

    pub fn from_byte(byte: u8) -> RoughSetValue {
        match byte {
            0 => RoughSetValue::None,
            1 => RoughSetValue::Some,
            2 => RoughSetValue::All,
            _ => RoughSetValue::Unknown,
        }
    }
}

impl fmt::Display for RoughSetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoughSetValue::None => "NONE",
            RoughSetValue::Some => "SOME",
            RoughSetValue::All => "ALL",
            RoughSetValue::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulation_moves_towards_some() {
        let mut rv = RoughSetValue::Unknown;
        rv.accumulate(RoughSetValue::None);
        assert_eq!(rv, RoughSetValue::None);
        rv.accumulate(RoughSetValue::None);
        assert_eq!(rv, RoughSetValue::None);
        rv.accumulate(RoughSetValue::All);
        assert_eq!(rv, RoughSetValue::Some);
        rv.accumulate(RoughSetValue::None);
        assert_eq!(rv, RoughSetValue::Some);

        let mut all = RoughSetValue::All;
        all.accumulate(RoughSetValue::All);
        assert_eq!(all, RoughSetValue::All);
        all.accumulate(RoughSetValue::Some);
        assert_eq!(all, RoughSetValue::Some);
    }

    #[test]
    fn combinators() {
        use RoughSetValue as R;
        assert_eq!(R::and(R::All, R::Some), R::Some);
        assert_eq!(R::and(R::All, R::None), R::None);
        assert_eq!(R::and(R::All, R::All), R::All);
        assert_eq!(R::or(R::None, R::Some), R::Some);
        assert_eq!(R::or(R::None, R::All), R::All);
        assert_eq!(R::or(R::None, R::None), R::None);
        assert_eq!(R::from_byte(R::All as u8), R::All);
    }
}
