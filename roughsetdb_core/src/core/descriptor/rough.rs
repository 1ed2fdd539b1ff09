use crate::core::{
    error::Result,
    multi_index::TuplePosition,
    types::{Operator, RoughSetValue},
};

use super::Descriptor;

impl Descriptor {
    /// Rough verdict for the packs under `pos`, also accumulated into `rv`.
    pub fn evaluate_roughly_pack(&mut self, pos: &TuplePosition) -> RoughSetValue {
        if self.is_type_or_tree() {
            if let Some(tree) = self.tree.as_mut() {
                return tree.evaluate_roughly_pack(pos);
            }
        }
        let r = match self.op {
            Operator::True => RoughSetValue::All,
            Operator::False => RoughSetValue::None,
            _ => match self.attr.vc() {
                Some(attr) => attr.rough_check(pos, self),
                None => RoughSetValue::Some,
            },
        };
        self.rv.accumulate(r);
        r
    }

    pub fn clear_rough_values(&mut self) {
        match self.tree.as_mut() {
            Some(tree) if self.op == Operator::OrTree => tree.clear_rough_values(),
            _ => self.rv = RoughSetValue::Unknown,
        }
    }

    /// Accumulates the verdict of another pack, skipping leaves already at `SOME`.
    pub fn rough_accumulate(&mut self, pos: &TuplePosition) {
        match self.tree.as_mut() {
            Some(tree) if self.op == Operator::OrTree => tree.rough_accumulate(pos),
            _ => {
                if self.rv != RoughSetValue::Some {
                    self.evaluate_roughly_pack(pos);
                }
            }
        }
    }

    /// Turns an accumulated `NONE` into `FALSE` and `ALL` into `TRUE`.
    pub fn simplify_after_rough_accumulate(&mut self) -> Result<()> {
        if self.is_type_or_tree() {
            let changed = self.tree.as_mut().is_some_and(|tree| tree.use_rough_accumulated());
            if changed {
                self.simplify(false)?;
            }
            return Ok(());
        }
        match self.rv {
            RoughSetValue::None => self.collapse(false),
            RoughSetValue::All => self.collapse(true),
            _ => {}
        }
        Ok(())
    }
}
