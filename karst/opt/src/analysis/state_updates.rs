use crate::symbolic::{SymbolTable, to_constraint};
use karst_ir::{Assign, For, If, Statement, Value};
use karst_utils::KarstResult;

fn collect_assigns(stmts: &[Statement], out: &mut Vec<Assign>) {
    for stmt in stmts {
        match stmt {
            Statement::Assign(assign) => {
                if !matches!(assign.dst, Value::Mem(_)) && !out.contains(assign)
                {
                    out.push(assign.clone());
                }
            }
            Statement::If(If {
                tbranch, fbranch, ..
            }) => {
                collect_assigns(tbranch, out);
                collect_assigns(fbranch, out);
            }
            Statement::For(For { body, .. }) => collect_assigns(body, out),
            Statement::Return(_) => {}
        }
    }
}

/// Every distinct assignment to a variable reachable in `stmts`. Writes to
/// memory are data, not state, and are left out.
pub fn get_state_updates(stmts: &[Statement]) -> Vec<Assign> {
    let mut out = vec![];
    collect_assigns(stmts, &mut out);
    out
}

fn reads_memory(value: &Value) -> bool {
    match value {
        Value::Mem(_) => true,
        Value::Expr(e) => reads_memory(&e.left) || reads_memory(&e.right),
        Value::Const(_) | Value::Var(_) => false,
    }
}

/// Assignments whose right-hand side depends on the value of some variable:
/// the candidate rules advancing an address. Memory reads and assignments
/// that simplify to a literal are dropped.
pub fn get_updated_variables(assigns: &[Assign]) -> KarstResult<Vec<Assign>> {
    let mut table = SymbolTable::new();
    let mut out = vec![];
    for assign in assigns {
        if reads_memory(&assign.src) {
            continue;
        }
        let term = to_constraint(&assign.src, &mut table)?;
        if term.simplify().as_lit().is_some() {
            continue;
        }
        out.push(assign.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use karst_ir::Model;

    #[test]
    fn state_updates() {
        let mut m = Model::new("m", 4);
        m.define_bank("mem", 8).unwrap();
        let addr = m.define_variable("addr", 2, 0).unwrap();
        let count = m.define_variable("count", 3, 0).unwrap();
        let out = m.define_port_out("out", 8, 0).unwrap();
        let full = m.define_variable("full", 1, 0).unwrap();
        m.define_action("step", true, move |r| {
            let word = r.mem("mem", &addr)?;
            r.assign(&out, word)?;
            r.assign(&addr, (&addr + 1) % 4)?;
            r.if_else(
                count.eq_to(3),
                |r| r.assign(&full, 1),
                |r| {
                    r.assign(&count, &count + 1)?;
                    r.assign(&full, 0)
                },
            )?;
            // duplicate of the first update
            r.assign(&addr, (&addr + 1) % 4)?;
            r.assign(&count, &count - &count + 2)?;
            let slot = r.mem("mem", &count)?;
            r.assign(slot, 7)
        })
        .unwrap();

        let stmts = m.statements("step").unwrap().to_vec();
        let updates = get_state_updates(&stmts);
        // out, addr, full = 1, count + 1, full = 0, count - count + 2
        assert_eq!(updates.len(), 6);
        let vars = get_updated_variables(&updates).unwrap();
        let dsts = vars
            .iter()
            .map(|a| a.dst.var_name().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(dsts, vec!["addr", "count"]);
    }
}
