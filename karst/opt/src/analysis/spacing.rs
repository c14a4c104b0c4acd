//! Stride detection over index expressions and update rules.
use crate::symbolic::{SymbolTable, max_common_divisor, to_constraint};
use itertools::Itertools;
use karst_ir::{Assign, Op, Value};
use karst_utils::{Error, Id, KarstResult};
use linked_hash_map::LinkedHashMap;
use std::collections::BTreeSet;

/// `(true, stride)` if a set of expressions forms an arithmetic progression,
/// `(false, 1)` otherwise.
pub type Spacing = (bool, i64);

const NO_PATTERN: Spacing = (false, 1);

fn strip_modulus(value: &Value, modulus: &Value) -> Value {
    match value {
        Value::Expr(e) if e.op == Op::Mod && e.right == *modulus => {
            strip_modulus(&e.left, modulus)
        }
        Value::Expr(e) => Value::binary(
            e.op,
            strip_modulus(&e.left, modulus),
            strip_modulus(&e.right, modulus),
        ),
        _ => value.clone(),
    }
}

/// If every expression is `_ % m` for one modulus `m`, remove every
/// `% m` from all of them. Otherwise the expressions are returned as is.
pub fn remove_mod_op(exprs: &[Value]) -> Vec<Value> {
    let moduli = exprs
        .iter()
        .map(|e| match e {
            Value::Expr(e) if e.op == Op::Mod => Some(&e.right),
            _ => None,
        })
        .collect::<Option<Vec<_>>>();
    match moduli {
        Some(moduli) if !moduli.is_empty() && moduli.iter().all_equal() => {
            let modulus = moduli[0].clone();
            exprs.iter().map(|e| strip_modulus(e, &modulus)).collect()
        }
        _ => exprs.to_vec(),
    }
}

/// Decide whether the expressions, all functions of at most one variable,
/// take values forming an arithmetic progression and find its stride.
pub fn linear_spacing(exprs: &[Value]) -> KarstResult<Spacing> {
    let free = exprs
        .iter()
        .flat_map(Value::variables)
        .map(|v| v.borrow().name)
        .unique()
        .collect_vec();
    if free.len() > 1 {
        return Err(Error::pass_assumption(
            "linear-spacing",
            format!(
                "expected a single free variable, found {}",
                free.iter().join(", ")
            ),
        ));
    }
    if exprs.len() <= 1 {
        return Ok((true, 0));
    }

    let exprs = remove_mod_op(exprs);
    let mut table = SymbolTable::new();
    let terms = exprs
        .iter()
        .map(|e| to_constraint(e, &mut table))
        .collect::<KarstResult<Vec<_>>>()?;

    let mut diffs = BTreeSet::from([0]);
    for (t1, t2) in terms.iter().tuple_combinations() {
        match (t1.clone() - t2.clone()).abs().as_lit() {
            Some(d) => {
                diffs.insert(d);
            }
            None => {
                log::debug!(
                    "no constant distance between {} and {}",
                    table.format(t1),
                    table.format(t2)
                );
                return Ok(NO_PATTERN);
            }
        }
    }
    if diffs.len() == 1 {
        return Ok((true, 0));
    }

    let diffs = diffs.into_iter().collect_vec();
    let g = max_common_divisor(&diffs);
    // Distinct multiples of g starting at 0: an arithmetic series iff the
    // sum matches 0 + g + 2g + ...
    let n = diffs.len() as i64;
    let expected = g * (n - 1) * n / 2;
    if diffs.iter().sum::<i64>() == expected {
        Ok((true, g))
    } else {
        Ok(NO_PATTERN)
    }
}

/// Per-invocation advance of each of `vars` under the update rules in
/// `updates`. `None` marks a variable that has no update rule, or whose
/// advance is not a constant; such a variable is accessed randomly.
pub fn temporal_spacing(
    updates: &[Assign],
    vars: &[Id],
) -> KarstResult<LinkedHashMap<Id, Option<i64>>> {
    let mut result = LinkedHashMap::new();
    for var in vars {
        let rules = updates
            .iter()
            .filter(|a| a.dst.var_name() == Some(*var))
            .collect_vec();
        let mut spacing = None;
        for (idx, rule) in rules.iter().enumerate() {
            let step = rule_spacing(*var, &rule.src)?;
            if idx > 0 && step != spacing {
                log::debug!("`{var}' has conflicting update rules");
                spacing = None;
                break;
            }
            spacing = step;
        }
        if spacing.is_none() {
            log::debug!("`{var}' is accessed randomly");
        }
        result.insert(*var, spacing);
    }
    Ok(result)
}

/// Spacing between `f(v)` and `f(f(v))` for the rule `v = f(v)`.
fn rule_spacing(var: Id, rule: &Value) -> KarstResult<Option<i64>> {
    let others = rule
        .variables()
        .iter()
        .any(|v| v.borrow().name != var);
    if others {
        return Ok(None);
    }
    let twice = rule.substitute(var, rule);
    Ok(match linear_spacing(&[rule.clone(), twice])? {
        (true, stride) => Some(stride),
        _ => None,
    })
}
