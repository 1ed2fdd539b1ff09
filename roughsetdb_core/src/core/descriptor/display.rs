use std::fmt;

use crate::core::types::Operator;

use super::Descriptor;

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operator::True | Operator::False => f.write_str(self.op.as_str())?,
            Operator::OrTree => match &self.tree {
                Some(tree) => write!(f, "{}", tree)?,
                None => f.write_str(self.lop.to_string().as_str())?,
            },
            Operator::IsNull | Operator::NotNull => write!(f, "{} {}", self.attr, self.op)?,
            Operator::Exists | Operator::NotExists => write!(f, "{} {}", self.op, self.attr)?,
            Operator::Between | Operator::NotBetween => {
                write!(f, "{} {} {} AND {}", self.attr, self.op, self.val1, self.val2)?;
                if self.sharp {
                    f.write_str(" (sharp)")?;
                }
            }
            _ => write!(f, "{} {} {}", self.attr, self.op, self.val1)?,
        }
        if self.is_outer() {
            f.write_str(" (outer")?;
            for dim in self.right_dims.iter() {
                write!(f, " d{}", dim)?;
            }
            f.write_str(")")?;
        }
        if self.delayed {
            f.write_str(" (delayed)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        descriptor::DescTree,
        storage::StoredTable,
        types::LogicalOperator,
        vc::VirtualColumn,
    };

    #[test]
    fn readable_forms() {
        let t = StoredTable::builder("t", 4).int_column("a", 0..8).build().unwrap();
        let a = VirtualColumn::column(&t, "a", 0).unwrap();
        let five = VirtualColumn::constant(5i64);

        let eq = Descriptor::compare(&a, Operator::Eq, &five, 2);
        assert_eq!(eq.to_string(), "t.a = 5");
        assert_eq!(Descriptor::unary(&a, Operator::IsNull, 2).to_string(), "t.a IS NULL");
        assert_eq!(
            Descriptor::between(&a, &VirtualColumn::constant(1i64), &five, 2).to_string(),
            "t.a BET. 1 AND 5"
        );
        assert_eq!(eq.clone().outer(&[0], &[1]).to_string(), "t.a = 5 (outer d1)");

        let mut tree = DescTree::new(eq);
        tree.add_descriptor(LogicalOperator::Or, Descriptor::unary(&a, Operator::IsNull, 2));
        assert_eq!(Descriptor::from_tree(tree, 2).to_string(), "(t.a = 5 OR t.a IS NULL)");
        assert_eq!(Descriptor::trivial(false, 2).to_string(), "FALSE");
    }
}
