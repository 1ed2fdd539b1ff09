pub mod general;
pub mod hash;
pub mod mapped;
pub mod output;
pub mod sort;

use std::{fmt, sync::Arc};

use crate::core::{
    descriptor::{Condition, Descriptor},
    error::Result,
    multi_index::{MultiIndex, TuplePosition},
    types::Operator,
    vc::VirtualColumn,
};

pub use general::JoinerGeneral;
pub use hash::JoinerHash;
pub use mapped::JoinerMapped;
pub use output::{side_index, JoinOutput, SideTuples};
pub use sort::JoinerSort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JoinAlgType {
    None = 0,
    Sort = 1,
    Hash = 2,
    Mixed = 3,
    Map = 4,
    General = 5,
}

impl JoinAlgType {
    /// Tag used in the join result log line.
    pub fn tag(self) -> &'static str {
        match self {
            JoinAlgType::Sort => "[sort]",
            JoinAlgType::Hash => "[hash]",
            JoinAlgType::Map => "[map]",
            JoinAlgType::Mixed => "[mixed]",
            JoinAlgType::General => "[loop]",
            JoinAlgType::None => "",
        }
    }
}

impl fmt::Display for JoinAlgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why the last attempt left the conditions untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum JoinFailure {
    #[default]
    NotFailed = 0,
    FailComplex = 1,
    FailSorterTooWide = 2,
    Fail1nTooHard = 3,
    FailHash = 4,
    FailWrongSides = 5,
}

/// Hints for the last join steps, all off by default.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTips {
    /// Stop after this many result tuples.
    pub limit: Option<u64>,
    /// Only the number of tuples is needed.
    pub count_only: bool,
    /// Row numbers of these dimensions are not needed afterwards.
    pub forget_now: Vec<bool>,
    /// Repeated rows of these dimensions may be dropped.
    pub distinct_only: Vec<bool>,
    /// Outer joins emit only the null rows for these dimensions.
    pub null_only: Vec<bool>,
}

impl JoinTips {
    pub fn new(mind: &MultiIndex) -> Self {
        let n = mind.num_of_dimensions();
        Self {
            limit: None,
            count_only: false,
            forget_now: vec![false; n],
            distinct_only: vec![false; n],
            null_only: vec![false; n],
        }
    }

    #[inline]
    pub fn is_null_only(&self, dim: usize) -> bool {
        self.null_only.get(dim).copied().unwrap_or(false)
    }
}

/// Executes a group of conditions joining two sets of dimensions.
///
/// A joiner which cannot handle the conditions leaves the multi index and the
/// conditions untouched and reports the reason through [`TwoDimensionalJoiner::why_failed`].
pub trait TwoDimensionalJoiner {
    fn execute_join_conditions(&mut self, mind: &mut MultiIndex, cond: &mut Condition) -> Result<()>;

    fn why_failed(&self) -> JoinFailure;

    fn algorithm(&self) -> JoinAlgType;

    /// Next attempt traverses the other side.
    fn force_switching_sides(&mut self) {}
}

/// First choice of the algorithm for a condition group.
pub fn choose_join_algorithm(cond: &Condition) -> JoinAlgType {
    let Some(first) = cond.iter().next() else {
        return JoinAlgType::General;
    };
    if !first.is_type_join_simple() || !first.is_inner() {
        return JoinAlgType::General;
    }
    match first.op {
        Operator::Eq if cond.len() == 1 => JoinAlgType::Map,
        Operator::Eq => JoinAlgType::Hash,
        Operator::Less | Operator::LessEq | Operator::More | Operator::MoreEq => JoinAlgType::Sort,
        _ => JoinAlgType::General,
    }
}

/// Algorithm for the next attempt after `failure`.
pub fn reselect_join_algorithm(failure: JoinFailure, previous: JoinAlgType) -> JoinAlgType {
    match failure {
        JoinFailure::NotFailed | JoinFailure::FailWrongSides => previous,
        JoinFailure::Fail1nTooHard => JoinAlgType::Hash,
        _ => JoinAlgType::General,
    }
}

pub fn create_joiner(alg: JoinAlgType, tips: JoinTips) -> Box<dyn TwoDimensionalJoiner> {
    match alg {
        JoinAlgType::Map => Box::new(JoinerMapped::new(tips)),
        JoinAlgType::Hash => Box::new(JoinerHash::new(tips)),
        JoinAlgType::Sort => Box::new(JoinerSort::new(tips)),
        JoinAlgType::General | JoinAlgType::Mixed | JoinAlgType::None => Box::new(JoinerGeneral::new(tips)),
    }
}

/// Every operand column of `descs`, so pack locks can be held while the descriptors are borrowed mutably.
pub(crate) fn source_columns<'a>(descs: impl IntoIterator<Item = &'a Descriptor>) -> Vec<Arc<VirtualColumn>> {
    descs
        .into_iter()
        .flat_map(|d| [&d.attr, &d.val1, &d.val2])
        .filter_map(|t| t.vc().cloned())
        .collect()
}

/// AND of the exact checks of `descs` at `pos`.
#[inline]
pub(crate) fn check_all<'a>(descs: impl IntoIterator<Item = &'a Descriptor>, pos: &TuplePosition) -> Result<bool> {
    for d in descs {
        if !d.check_condition(pos)? {
            return Ok(false);
        }
    }
    Ok(true)
}
