use itertools::Itertools;
use log::{debug, trace};

use crate::core::{
    descriptor::Condition,
    error::{FilterError, Result},
    joiner::{JoinFailure, JoinTips, choose_join_algorithm, create_joiner, reselect_join_algorithm},
    types::DimensionVector,
};

use super::{
    cost_model,
    parameterized_filter::{ParameterizedFilter, bubble_sort},
};

impl ParameterizedFilter {
    /// Moves the conditions executable together with descriptor `desc_no` into
    /// one group, simple joins first. The moved descriptors are marked done.
    pub(super) fn prepare_joining_step(&mut self, desc_no: usize) -> Condition {
        let mut dims1 = self.descriptors[desc_no].used_dims();
        self.mind.mark_involved_dim_groups(&mut dims1);
        let cur_outer_dim = self.descriptors[desc_no].right_dims.clone();
        let outer_present = !cur_outer_dim.is_empty();

        let mut join_desc = Condition::new();
        for simple_joins_only in [true, false] {
            for d in self.descriptors.iter_mut().skip(desc_no) {
                if d.done || d.delayed || (simple_joins_only && !d.is_type_join_simple()) {
                    continue;
                }
                let dims2 = d.used_dims();
                if d.right_dims.same_dims(&cur_outer_dim) && (outer_present || dims1.includes(&dims2)) {
                    join_desc.add(d.clone());
                    d.done = true;
                }
            }
        }
        join_desc
    }

    /// Orders the remaining joins by their weights, never across outer join boundaries.
    pub(super) fn descriptor_join_ordering(&mut self) {
        let mut descriptors = std::mem::take(&mut self.descriptors);
        {
            let ctx = self.cost_context();
            for d in descriptors.iter_mut().filter(|d| !d.done && d.is_type_join_simple()) {
                d.evaluation = cost_model::join_weight(d, &ctx);
            }
        }
        self.descriptors = descriptors;
        bubble_sort(self.descriptors.as_mut_vec(), |a, b| {
            a.evaluation > b.evaluation && a.right_dims.same_dims(&b.right_dims)
        });
    }

    /// Runs one join step, retrying with another algorithm while the chosen
    /// one reports that it can not handle the conditions.
    pub(super) fn update_join_condition(&mut self, cond: &mut Condition, tips: JoinTips) -> Result<()> {
        self.rough_simplify_condition(cond)?;
        let mut all_involved_dims = DimensionVector::new(self.no_dims());
        for d in cond.iter() {
            d.dimension_used(&mut all_involved_dims);
        }
        let is_outer = cond.iter().next().is_some_and(|d| d.is_outer());
        let conditions_used = cond.len();

        let mut join_alg = choose_join_algorithm(cond);
        let mut failure = JoinFailure::NotFailed;
        let mut attempts = 0;
        loop {
            let mut joiner = create_joiner(join_alg, tips.clone());
            if failure == JoinFailure::FailWrongSides {
                joiner.force_switching_sides();
            }
            joiner.execute_join_conditions(&mut self.mind, cond)?;
            failure = joiner.why_failed();
            if failure == JoinFailure::NotFailed {
                join_alg = joiner.algorithm();
                break;
            }
            attempts += 1;
            if attempts >= self.config.join_retry_limit() {
                return Err(FilterError::JoinFailed(format!(
                    "no join algorithm accepted {} conditions after {} attempts, last failure {:?}",
                    conditions_used, attempts, failure
                )));
            }
            trace!("{} join failed with {:?}, retrying", joiner.algorithm().tag(), failure);
            join_alg = reselect_join_algorithm(failure, join_alg);
        }

        self.mind.update_num_of_tuples();
        if log::log_enabled!(log::Level::Debug) {
            let dims = all_involved_dims.iter().join("-");
            let groups = self.mind.groups_for_dims(&all_involved_dims);
            debug!(
                "Tuples after {}{} join {}{} {}: {}",
                if conditions_used > 1 { format!("{} cond. ", conditions_used) } else { String::new() },
                if is_outer { "outer" } else { "inner" },
                if all_involved_dims.no_one() == 1 { "...-" } else { "" },
                dims,
                join_alg.tag(),
                self.mind.num_of_tuples_in(&groups)
            );
        }
        Ok(())
    }
}
