use karst_utils::{Error, KarstResult};
use std::fmt;

/// Binary operators that can combine two values in an [crate::Expression].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Op {
    /// l == r
    Eq,
    /// l + r
    Add,
    /// l - r
    Sub,
    /// l * r
    Mul,
    /// l % r (Euclidean remainder)
    Mod,
    /// l > r
    Gt,
    /// l >= r
    Ge,
    /// l < r
    Lt,
    /// l <= r
    Le,
    /// l ^ r
    Xor,
    /// l | r
    Or,
    /// l & r
    And,
    /// l >> r
    Shr,
    /// l << r
    Shl,
}

impl Op {
    /// All operators, in the order they are documented.
    pub const ALL: [Op; 14] = [
        Op::Eq,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Mod,
        Op::Gt,
        Op::Ge,
        Op::Lt,
        Op::Le,
        Op::Xor,
        Op::Or,
        Op::And,
        Op::Shr,
        Op::Shl,
    ];

    /// Textual rendering used by the printer and code generators.
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Mod => "%",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Xor => "^",
            Op::Or => "|",
            Op::And => "&",
            Op::Shr => ">>",
            Op::Shl => "<<",
        }
    }

    /// Operators producing a 0/1 truth value.
    pub fn is_relational(&self) -> bool {
        matches!(self, Op::Eq | Op::Gt | Op::Ge | Op::Lt | Op::Le)
    }

    /// Apply the operator to two concrete integers.
    pub fn apply(&self, l: i64, r: i64) -> KarstResult<i64> {
        let overflow = || {
            Error::malformed_structure(format!(
                "arithmetic overflow evaluating `{l} {} {r}'",
                self.symbol()
            ))
        };
        let v = match self {
            Op::Eq => (l == r) as i64,
            Op::Add => l.checked_add(r).ok_or_else(overflow)?,
            Op::Sub => l.checked_sub(r).ok_or_else(overflow)?,
            Op::Mul => l.checked_mul(r).ok_or_else(overflow)?,
            Op::Mod => {
                if r == 0 {
                    return Err(Error::malformed_structure(format!(
                        "modulo by zero evaluating `{l} % {r}'"
                    )));
                }
                l.checked_rem_euclid(r).ok_or_else(overflow)?
            }
            Op::Gt => (l > r) as i64,
            Op::Ge => (l >= r) as i64,
            Op::Lt => (l < r) as i64,
            Op::Le => (l <= r) as i64,
            Op::Xor => l ^ r,
            Op::Or => l | r,
            Op::And => l & r,
            Op::Shr | Op::Shl => {
                let amount = u32::try_from(r)
                    .ok()
                    .filter(|a| *a < i64::BITS)
                    .ok_or_else(|| {
                        Error::malformed_structure(format!(
                            "shift amount {r} out of range"
                        ))
                    })?;
                if *self == Op::Shr {
                    l >> amount
                } else {
                    l.checked_shl(amount).ok_or_else(overflow)?
                }
            }
        };
        Ok(v)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
