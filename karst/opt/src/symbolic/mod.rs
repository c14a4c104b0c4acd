//! Bridge from IR values to solver terms.
mod solver;
mod term;

pub use solver::{SatResult, Solver, max_common_divisor};
pub use term::{Linear, Sym, SymbolTable, Term};

use karst_ir::Value;
use karst_utils::{Error, KarstResult};

/// Convert a value into a solver term, allocating one symbol per distinct
/// variable name in `table`. Memory accesses have no symbolic meaning.
pub fn to_constraint(value: &Value, table: &mut SymbolTable) -> KarstResult<Term> {
    match value {
        Value::Const(c) => Ok(Term::Lit(*c)),
        Value::Var(var) => Ok(Term::Sym(table.get_or_insert(var.borrow().name))),
        Value::Expr(e) => Ok(Term::bin(
            e.op,
            to_constraint(&e.left, table)?,
            to_constraint(&e.right, table)?,
        )),
        Value::Mem(_) => Err(Error::malformed_structure(format!(
            "cannot express memory access `{value}' as a constraint"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karst_utils::Id;

    #[test]
    fn shares_symbols_across_calls() {
        let mut table = SymbolTable::new();
        let a = Value::variable("a", 8);
        let b = Value::variable("b", 8);
        let t1 = to_constraint(&(&a + &b), &mut table).unwrap();
        let t2 = to_constraint(&(Value::variable("a", 8) * 2), &mut table).unwrap();
        assert_eq!(table.len(), 2);
        let sa = table.get(Id::from("a")).unwrap();
        let mut syms = vec![];
        t1.symbols(&mut syms);
        t2.symbols(&mut syms);
        assert_eq!(syms.len(), 2);
        assert!(syms.contains(&sa));
        assert_eq!(table.format(&t1), "(a + b)");
    }

    #[test]
    fn constants_are_literals() {
        let mut table = SymbolTable::new();
        let t = to_constraint(&Value::constant(-4), &mut table).unwrap();
        assert_eq!(t, Term::Lit(-4));
        assert!(table.is_empty());
    }
}
