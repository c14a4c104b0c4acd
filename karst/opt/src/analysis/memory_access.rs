use itertools::Itertools;
use karst_ir::{
    AccessType, For, If, MemoryAccess, Model, RRC, Statement, Value, Variable,
};
use karst_utils::{Error, Id, KarstResult};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// Memory accesses of one action in trace order.
pub type AccessList = Vec<(Rc<MemoryAccess>, AccessType)>;

/// Index expressions grouped by the variable driving them.
pub type VarAccesses = LinkedHashMap<Id, Vec<(Value, AccessType)>>;

fn visit_value(value: &Value, out: &mut AccessList) {
    match value {
        Value::Mem(mem) => out.push((Rc::clone(mem), AccessType::Read)),
        Value::Expr(e) => {
            visit_value(&e.left, out);
            visit_value(&e.right, out);
        }
        Value::Const(_) | Value::Var(_) => {}
    }
}

fn visit_stmts(stmts: &[Statement], out: &mut AccessList) {
    for stmt in stmts {
        match stmt {
            Statement::Assign(assign) => {
                if let Value::Mem(mem) = &assign.dst {
                    out.push((Rc::clone(mem), AccessType::Write));
                }
                visit_value(&assign.src, out);
            }
            Statement::If(If {
                predicate,
                tbranch,
                fbranch,
            }) => {
                visit_value(predicate, out);
                visit_stmts(tbranch, out);
                visit_stmts(fbranch, out);
            }
            Statement::Return(ret) => {
                for value in &ret.values {
                    visit_value(value, out);
                }
            }
            Statement::For(For { bound, var, body }) => {
                visit_value(bound, out);
                let name = var.borrow().name;
                let Some(count) = loop_count(bound) else {
                    log::debug!(
                        "skipping accesses in loop over `{name}': bound `{bound}' varies"
                    );
                    continue;
                };
                let mut sites = vec![];
                visit_stmts(body, &mut sites);
                // one site per iteration, with the loop variable fixed
                for i in 0..count {
                    let i = Value::constant(i);
                    out.extend(sites.iter().map(|(mem, ty)| {
                        (Rc::new(mem.substitute(name, &i)), *ty)
                    }));
                }
            }
        }
    }
}

/// Iterations of a loop whose bound is fixed for the configuration epoch.
fn loop_count(bound: &Value) -> Option<i64> {
    let mut reads = vec![];
    visit_value(bound, &mut reads);
    if !reads.is_empty()
        || bound.variables().iter().any(|v| !v.borrow().is_configurable())
    {
        return None;
    }
    bound.eval().ok().map(|n| n.max(0))
}

/// Reads and writes performed by every action. Actions that touch no
/// memory are left out.
pub fn get_memory_access(
    model: &mut Model,
) -> KarstResult<LinkedHashMap<Id, AccessList>> {
    let mut result = LinkedHashMap::new();
    for (name, stmts) in model.produce_statements()? {
        let mut accesses = vec![];
        visit_stmts(stmts, &mut accesses);
        if !accesses.is_empty() {
            result.insert(*name, accesses);
        }
    }
    Ok(result)
}

/// The single variable an index expression depends on. Configurables are
/// fixed for a configuration epoch and do not count.
pub fn root_variable(index: &Value) -> KarstResult<RRC<Variable>> {
    let vars = index
        .variables()
        .into_iter()
        .filter(|v| !v.borrow().is_configurable())
        .collect_vec();
    match vars.len() {
        1 => Ok(Rc::clone(&vars[0])),
        0 => Err(Error::malformed_structure(format!(
            "index `{index}' does not depend on any variable"
        ))),
        _ => Err(Error::malformed_structure(format!(
            "index `{index}' depends on multiple variables: {}",
            vars.iter().map(|v| v.borrow().name).join(", ")
        ))),
    }
}

/// Group the index expressions of `accesses` by their root variable.
pub fn get_var_memory_access(
    accesses: &[(Rc<MemoryAccess>, AccessType)],
) -> KarstResult<VarAccesses> {
    let mut result: VarAccesses = LinkedHashMap::new();
    for (mem, ty) in accesses {
        let root = root_variable(&mem.index)?;
        let name = root.borrow().name;
        result
            .entry(name)
            .or_insert_with(Vec::new)
            .push((mem.index.clone(), *ty));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sram() -> Model {
        let mut m = Model::new("sram", 16);
        m.define_bank("mem", 16).unwrap();
        let addr = m.define_port_in("addr", 4).unwrap();
        let data_in = m.define_port_in("data_in", 16).unwrap();
        let data_out = m.define_port_out("data_out", 16, 0).unwrap();
        let a = addr.clone();
        m.define_action("read", true, move |r| {
            let word = r.mem("mem", &a)?;
            r.assign(&data_out, word)?;
            r.ret([&data_out])
        })
        .unwrap();
        m.define_action("write", true, move |r| {
            let word = r.mem("mem", &addr)?;
            r.assign(word, &data_in)
        })
        .unwrap();
        m.define_action("nop", true, |_| Ok(())).unwrap();
        m
    }

    #[test]
    fn classifies_reads_and_writes() {
        let mut m = sram();
        let accesses = get_memory_access(&mut m).unwrap();
        assert_eq!(accesses.len(), 2);
        let read = &accesses[&Id::from("read")];
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].1, AccessType::Read);
        let write = &accesses[&Id::from("write")];
        assert_eq!(write.len(), 1);
        assert_eq!(write[0].1, AccessType::Write);

        let by_var = get_var_memory_access(read).unwrap();
        assert_eq!(by_var.len(), 1);
        let sites = &by_var[&Id::from("addr")];
        assert_eq!(sites[0].0, m.value("addr").unwrap());
    }

    #[test]
    fn nested_reads() {
        let mut m = Model::new("m", 8);
        m.define_bank("mem", 8).unwrap();
        let i = m.define_variable("i", 3, 0).unwrap();
        let out = m.define_port_out("out", 8, 0).unwrap();
        m.define_action("sum", true, move |r| {
            let w0 = r.mem("mem", &i)?;
            let w1 = r.mem("mem", (&i + 1) % 8)?;
            r.if_(i.lt(6), |r| r.assign(&out, w0 + w1))?;
            r.ret([&out])
        })
        .unwrap();
        let accesses = get_memory_access(&mut m).unwrap();
        let sum = &accesses[&Id::from("sum")];
        assert_eq!(sum.len(), 2);
        assert!(sum.iter().all(|(_, t)| *t == AccessType::Read));
        assert_eq!(get_var_memory_access(sum).unwrap()[&Id::from("i")].len(), 2);
    }

    #[test]
    fn reads_in_predicates_and_loops() {
        let mut m = Model::new("m", 8);
        m.define_bank("mem", 8).unwrap();
        let i = m.define_variable("i", 3, 0).unwrap();
        let n = m.define_variable("n", 3, 0).unwrap();
        let out = m.define_port_out("out", 8, 0).unwrap();
        let (idx, o) = (i.clone(), out.clone());
        m.define_action("check", true, move |r| {
            let word = r.mem("mem", &idx)?;
            r.if_(word.eq_to(0), |r| r.assign(&o, 1))
        })
        .unwrap();
        m.define_action("scan", true, move |r| {
            r.for_range(2, "j", |r, j| {
                let word = r.mem("mem", (&i + &j) % 8)?;
                r.assign(&out, word)
            })
        })
        .unwrap();
        m.define_action("unbounded", true, move |r| {
            r.for_range(&n, "k", |r, k| r.assign(&n, &k))
        })
        .unwrap();

        let accesses = get_memory_access(&mut m).unwrap();
        assert_eq!(accesses[&Id::from("check")].len(), 1);
        let scan = &accesses[&Id::from("scan")];
        assert_eq!(scan.len(), 2);
        let roots = scan
            .iter()
            .map(|(mem, _)| root_variable(&mem.index).unwrap().borrow().name)
            .collect_vec();
        assert_eq!(roots, [Id::from("i"), Id::from("i")]);
        assert_ne!(scan[0].0.index, scan[1].0.index);
        assert!(!accesses.contains_key(&Id::from("unbounded")));
    }

    #[test]
    fn composite_indices() {
        let a = Value::variable("a", 4);
        let b = Value::variable("b", 4);
        let depth = Value::configurable("depth", 8, 10);
        assert_eq!(
            root_variable(&(&a + &depth * 2)).unwrap().borrow().name,
            Id::from("a")
        );
        assert!(root_variable(&(&a + &b)).is_err());
        assert!(root_variable(&Value::constant(3)).is_err());
    }
}
