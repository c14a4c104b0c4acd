use crate::symbolic::{SatResult, Solver, SymbolTable, Term, to_constraint};
use itertools::Itertools;
use karst_ir::{Model, Op, Value};
use karst_utils::{Id, KarstResult};
use linked_hash_map::LinkedHashMap;

/// Decide whether `conditions` can hold at the same time.
pub fn check_exclusive(conditions: &[Value]) -> KarstResult<SatResult> {
    let mut table = SymbolTable::new();
    let mut solver = Solver::new();
    for cond in conditions {
        solver.add(to_constraint(cond, &mut table)?);
    }
    Ok(solver.check())
}

/// True iff the conditions can never all hold. A condition set the solver
/// cannot decide is reported as not exclusive.
pub fn is_exclusive(conditions: &[Value]) -> KarstResult<bool> {
    Ok(check_exclusive(conditions)? == SatResult::Unsat)
}

/// Guard conditions of every action that declares any, each conjoined into
/// one term over a shared symbol table.
pub fn extract_action_conditions(
    model: &mut Model,
) -> KarstResult<(LinkedHashMap<Id, Term>, SymbolTable)> {
    let mut table = SymbolTable::new();
    let mut terms = LinkedHashMap::new();
    for (name, conds) in model.conditions()? {
        let Some(conj) = conds
            .iter()
            .map(|c| to_constraint(c, &mut table))
            .collect::<KarstResult<Vec<_>>>()?
            .into_iter()
            .reduce(|acc, t| Term::bin(Op::And, acc, t))
        else {
            continue;
        };
        terms.insert(*name, conj);
    }
    Ok((terms, table))
}

/// Guards of two actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPair {
    pub first: Id,
    pub second: Id,
    pub result: SatResult,
}

impl ActionPair {
    pub fn exclusive(&self) -> bool {
        self.result == SatResult::Unsat
    }
}

/// Check every unordered pair of actions that both declare guards.
pub fn exclusive_actions(model: &mut Model) -> KarstResult<Vec<ActionPair>> {
    let (terms, _) = extract_action_conditions(model)?;
    let pairs = terms
        .iter()
        .tuple_combinations()
        .map(|((a, ta), (b, tb))| {
            let mut solver = Solver::new();
            solver.add(ta.clone());
            solver.add(tb.clone());
            let result = solver.check();
            log::debug!("guards of `{a}' and `{b}': {result:?}");
            ActionPair {
                first: *a,
                second: *b,
                result,
            }
        })
        .collect();
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_conditions() {
        let a = Value::variable("a", 8);
        let b = Value::variable("b", 8);
        assert!(is_exclusive(&[a.gt(6), b.lt(3), a.lt(&b)]).unwrap());
        assert!(!is_exclusive(&[a.gt(6), (&b + &a).gt(5)]).unwrap());
        assert_eq!(
            check_exclusive(&[a.gt(6), (&b + &a).gt(5)]).unwrap(),
            SatResult::Sat
        );
    }

    #[test]
    fn memory_accesses_are_rejected() {
        let mut m = Model::new("m", 4);
        m.define_bank("mem", 8).unwrap();
        let bank = m.bank("mem").unwrap();
        let word: Value = karst_ir::MemoryAccess::direct(bank, 0.into()).into();
        assert!(check_exclusive(&[word.gt(1)]).is_err());
    }

    #[test]
    fn action_guards() {
        let mut m = Model::new("m", 4);
        let count = m.define_variable("count", 4, 0).unwrap();
        let (c1, c2, c3) = (count.clone(), count.clone(), count);
        m.define_action("push", true, move |r| {
            r.expect(c1.lt(4));
            Ok(())
        })
        .unwrap();
        m.define_action("pop", true, move |r| {
            r.expect(c2.gt(0));
            Ok(())
        })
        .unwrap();
        m.define_action("flush", true, move |r| {
            r.expect(c3.eq_to(0));
            r.expect(c3.le(0));
            Ok(())
        })
        .unwrap();
        m.define_action("idle", true, |_| Ok(())).unwrap();

        let (terms, table) = extract_action_conditions(&mut m).unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(table.len(), 1);

        let pairs = exclusive_actions(&mut m).unwrap();
        let verdict = |a: &str, b: &str| {
            pairs
                .iter()
                .find(|p| p.first == a && p.second == b)
                .map(ActionPair::exclusive)
        };
        assert_eq!(pairs.len(), 3);
        assert_eq!(verdict("push", "pop"), Some(false));
        assert_eq!(verdict("push", "flush"), Some(false));
        assert_eq!(verdict("pop", "flush"), Some(true));
    }
}
