//! Statements recorded into an action's trace.
use crate::{RRC, Value, VarKind, Variable};
use karst_utils::{Error, KarstResult};
use smallvec::SmallVec;

/// `dst = src`. The destination is a variable or a memory access.
#[derive(Clone, PartialEq)]
pub struct Assign {
    pub dst: Value,
    pub src: Value,
}

impl Assign {
    /// Build an assignment, rejecting destinations that are not storage.
    pub fn new(dst: Value, src: Value) -> KarstResult<Self> {
        match &dst {
            Value::Var(var) => {
                let var = var.borrow();
                if var.kind == VarKind::Configurable {
                    return Err(Error::malformed_structure(format!(
                        "cannot assign to configurable `{}' inside an action",
                        var.name
                    )));
                }
            }
            Value::Mem(_) => {}
            Value::Const(_) | Value::Expr(_) => {
                return Err(Error::malformed_structure(format!(
                    "cannot assign to `{dst}': not a variable or memory access"
                )));
            }
        }
        Ok(Self { dst, src })
    }

    pub fn eval(&self) -> KarstResult<()> {
        let value = self.src.eval()?;
        match &self.dst {
            Value::Var(var) => {
                var.borrow_mut().set(value);
                Ok(())
            }
            Value::Mem(mem) => mem.write(value),
            Value::Const(_) | Value::Expr(_) => Err(Error::malformed_structure(
                format!("cannot assign to `{}'", self.dst),
            )),
        }
    }
}

/// `if (predicate) { tbranch } else { fbranch }`.
#[derive(Clone, PartialEq)]
pub struct If {
    pub predicate: Value,
    pub tbranch: Vec<Statement>,
    pub fbranch: Vec<Statement>,
}

/// Values surfaced as the result of an action.
#[derive(Clone, PartialEq)]
pub struct Return {
    pub values: SmallVec<[Value; 2]>,
}

/// `for var in 0..bound { body }`.
#[derive(Clone, PartialEq)]
pub struct For {
    pub bound: Value,
    pub var: RRC<Variable>,
    pub body: Vec<Statement>,
}

/// A side-effecting construct recorded into a trace.
#[derive(Clone, PartialEq)]
pub enum Statement {
    Assign(Assign),
    If(If),
    Return(Return),
    For(For),
}

impl Statement {
    /// Execute the statement. Returns the values of the first `return`
    /// reached, if any.
    pub fn eval(&self) -> KarstResult<Option<Vec<i64>>> {
        match self {
            Statement::Assign(assign) => {
                assign.eval()?;
                Ok(None)
            }
            Statement::If(If {
                predicate,
                tbranch,
                fbranch,
            }) => {
                if predicate.eval()? != 0 {
                    Self::eval_all(tbranch)
                } else {
                    Self::eval_all(fbranch)
                }
            }
            Statement::Return(ret) => Ok(Some(ret.eval()?)),
            Statement::For(For { bound, var, body }) => {
                let count = bound.eval()?;
                if count < 0 {
                    return Err(Error::malformed_structure(format!(
                        "loop bound `{bound}' evaluated to {count}"
                    )));
                }
                for i in 0..count {
                    var.borrow_mut().set(i);
                    if let Some(values) = Self::eval_all(body)? {
                        return Ok(Some(values));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Execute statements in order, stopping at the first `return`.
    pub fn eval_all(stmts: &[Statement]) -> KarstResult<Option<Vec<i64>>> {
        for stmt in stmts {
            if let Some(values) = stmt.eval()? {
                return Ok(Some(values));
            }
        }
        Ok(None)
    }
}

impl Return {
    pub fn eval(&self) -> KarstResult<Vec<i64>> {
        self.values.iter().map(Value::eval).collect()
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::Printer::format_statement(self, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn assign(dst: &Value, src: impl Into<Value>) -> Statement {
        Statement::Assign(Assign::new(dst.clone(), src.into()).unwrap())
    }

    fn if_else(pred: Value, t: Statement, f: Statement) -> Statement {
        Statement::If(If {
            predicate: pred,
            tbranch: vec![t],
            fbranch: vec![f],
        })
    }

    #[test]
    fn constant_destination_is_rejected() {
        let stmt = Assign {
            dst: Value::constant(1),
            src: Value::constant(2),
        };
        assert!(stmt.eval().is_err());
        assert!(Assign::new(Value::constant(1), Value::constant(2)).is_err());
    }

    #[test]
    fn if_equality() {
        let v1 = Value::variable("a", 1);
        let v2 = Value::variable("b", 1);
        let v3 = Value::variable("c", 1);
        let v4 = Value::variable("d", 1);

        let if_1 = if_else(v1.eq_to(&v2), assign(&v1, 0), assign(&v2, 0));
        let if_2 = if_else(v1.eq_to(&v2), assign(&v1, 0), assign(&v3, 0));
        let if_3 = if_else(v1.eq_to(&v4), assign(&v1, 0), assign(&v2, 0));
        let if_4 = if_else(v1.eq_to(&v2), assign(&v1, 0), assign(&v2, 0));

        assert!(if_1 == if_4);
        assert!(if_1 != if_2);
        assert!(if_1 != if_3);
    }

    #[test]
    fn if_takes_exactly_one_branch() {
        let v1 = Value::variable("a", 4);
        let v2 = Value::variable("b", 4);
        let stmt = Statement::If(If {
            predicate: Value::from(true),
            tbranch: vec![assign(&v1, 1)],
            fbranch: vec![assign(&v1, 2), assign(&v2, 9)],
        });
        stmt.eval().unwrap();
        assert_eq!(v1.eval().unwrap(), 1);
        assert_eq!(v2.eval().unwrap(), 0);
    }

    #[test]
    fn return_equality() {
        let v1 = Value::variable("a", 1);
        let v2 = Value::variable("b", 1);
        let r_1 = Return {
            values: smallvec![v1.clone()],
        };
        let r_2 = Return {
            values: smallvec![v2],
        };
        let r_3 = Return {
            values: smallvec![v1],
        };
        assert!(r_1 != r_2);
        assert!(r_1 == r_3);
    }

    #[test]
    fn for_replays_body() {
        let acc = Value::variable("acc", 8);
        let i = Value::variable("i", 8);
        let stmt = Statement::For(For {
            bound: Value::constant(4),
            var: i.as_var().unwrap().clone(),
            body: vec![assign(&acc, &acc + &i)],
        });
        stmt.eval().unwrap();
        assert_eq!(acc.eval().unwrap(), 1 + 2 + 3);
    }

    #[test]
    fn invalid_destinations() {
        let a = Value::variable("a", 4);
        assert!(Assign::new(&a + 1, Value::constant(0)).is_err());
        assert!(Assign::new(Value::constant(1), a.clone()).is_err());
        let cfg = Value::configurable("depth", 16, 4);
        assert!(Assign::new(cfg, a).is_err());
    }
}
