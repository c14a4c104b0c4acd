//! Implements a formatter for the in-memory representation of models.
//! Printing only reads the model; the traces it renders are recorded on
//! demand.
use crate::{
    BankTarget, Direction, For, If, Model, Return, Statement, Value, VarKind,
};
use itertools::Itertools;
use karst_utils::KarstResult;
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Render a value using the textual operator symbols.
    pub fn format_value(value: &Value) -> String {
        match value {
            Value::Const(c) => c.to_string(),
            Value::Var(var) => var.borrow().name.to_string(),
            Value::Expr(e) => format!(
                "({} {} {})",
                Self::format_value(&e.left),
                e.op,
                Self::format_value(&e.right)
            ),
            Value::Mem(mem) => {
                let index = Self::format_value(&mem.index);
                match &mem.target {
                    BankTarget::Direct(bank) => {
                        format!("{}[{index}]", bank.borrow().name)
                    }
                    BankTarget::Selected { selector, .. } => format!(
                        "{{{}}}[{}][{index}]",
                        mem.target.bank_names().iter().join(", "),
                        Self::format_value(selector)
                    ),
                }
            }
        }
    }

    /// A condition, always enclosed in parentheses.
    fn format_condition(value: &Value) -> String {
        match value {
            Value::Expr(_) => Self::format_value(value),
            _ => format!("({})", Self::format_value(value)),
        }
    }

    fn format_block(stmts: &[Statement], indent: usize) -> String {
        stmts
            .iter()
            .map(|s| Self::format_statement(s, indent))
            .join("\n")
    }

    /// Render a statement, indenting every line by `indent` spaces.
    pub fn format_statement(stmt: &Statement, indent: usize) -> String {
        let pad = " ".repeat(indent);
        match stmt {
            Statement::Assign(assign) => format!(
                "{pad}{} = {};",
                Self::format_value(&assign.dst),
                Self::format_value(&assign.src)
            ),
            Statement::If(If {
                predicate,
                tbranch,
                fbranch,
            }) => {
                let mut buf = format!(
                    "{pad}if {} {{\n",
                    Self::format_condition(predicate)
                );
                if !tbranch.is_empty() {
                    buf.push_str(&Self::format_block(tbranch, indent + 2));
                    buf.push('\n');
                }
                buf.push_str(&pad);
                buf.push('}');
                if !fbranch.is_empty() {
                    buf.push_str(" else {\n");
                    buf.push_str(&Self::format_block(fbranch, indent + 2));
                    buf.push('\n');
                    buf.push_str(&pad);
                    buf.push('}');
                }
                buf
            }
            Statement::Return(Return { values }) => {
                if values.len() == 1 {
                    format!("{pad}return {};", Self::format_value(&values[0]))
                } else {
                    format!(
                        "{pad}return ({});",
                        values.iter().map(Self::format_value).join(", ")
                    )
                }
            }
            Statement::For(For { bound, var, body }) => {
                let mut buf = format!(
                    "{pad}for {} in 0..{} {{\n",
                    var.borrow().name,
                    Self::format_value(bound)
                );
                if !body.is_empty() {
                    buf.push_str(&Self::format_block(body, indent + 2));
                    buf.push('\n');
                }
                buf.push_str(&pad);
                buf.push('}');
                buf
            }
        }
    }

    /// Prints out the declarations of a model followed by the trace and
    /// guard conditions of every action.
    pub fn write_model<F: io::Write>(
        model: &mut Model,
        f: &mut F,
    ) -> KarstResult<()> {
        writeln!(f, "model {} {{", model.name)?;
        for var in model.all_variables() {
            let var = var.borrow();
            let decl = match var.kind {
                VarKind::Port(Direction::Input) => "input",
                VarKind::Port(Direction::Output) => "output",
                VarKind::State => "variable",
                VarKind::Configurable => {
                    writeln!(
                        f,
                        "  configurable {}: {} = {};",
                        var.name,
                        var.width,
                        var.eval()?
                    )?;
                    continue;
                }
                VarKind::Loop => continue,
            };
            writeln!(f, "  {decl} {}: {};", var.name, var.width)?;
        }
        for (name, value) in model.constants() {
            writeln!(f, "  const {name} = {value};")?;
        }
        for bank in model.banks() {
            let bank = bank.borrow();
            writeln!(
                f,
                "  bank {}[{}]: {};",
                bank.name,
                Self::format_value(bank.size_expr()),
                bank.width
            )?;
        }

        let handshakes = model
            .actions()
            .map(|a| (a.name, a.en.borrow().name, a.rdy.borrow().name))
            .collect_vec();
        let conditions = model.conditions()?.clone();
        let traces = model.produce_statements()?;
        for (name, en, rdy) in handshakes {
            writeln!(f, "  action {name}({en}, {rdy}) {{")?;
            for cond in conditions.get(&name).into_iter().flatten() {
                writeln!(f, "    expect {};", Self::format_condition(cond))?;
            }
            if let Some(stmts) = traces.get(&name) {
                for stmt in stmts {
                    writeln!(f, "{}", Self::format_statement(stmt, 4))?;
                }
            }
            writeln!(f, "  }}")?;
        }
        if let Some(reset) = model.reset_action() {
            writeln!(f, "  reset {reset};")?;
        }
        writeln!(f, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Printer;
    use crate::{If, Model, Statement, Value};

    #[test]
    fn values() {
        let a = Value::variable("a", 4);
        let b = Value::variable("b", 4);
        assert_eq!(Printer::format_value(&((&a + 1) % &b)), "((a + 1) % b)");
        assert_eq!(Printer::format_value(&(&a << 2).ge(-3)), "((a << 2) >= -3)");
        assert_eq!(Printer::format_value(&(&a ^ &b).eq_to(0)), "((a ^ b) == 0)");
    }

    #[test]
    fn bare_conditions_are_parenthesized() {
        let valid = Value::variable("valid", 1);
        let stmt = Statement::If(If {
            predicate: valid,
            tbranch: vec![],
            fbranch: vec![],
        });
        assert_eq!(Printer::format_statement(&stmt, 0), "if (valid) {\n}");
    }

    #[test]
    fn model() {
        let mut m = Model::new("tiny", 4);
        let sel = m.define_variable("sel", 1, 0).unwrap();
        let out = m.define_port_out("out", 8, 0).unwrap();
        m.define_banks("buf", 2, 8, 4).unwrap();
        m.define_action("pick", true, move |r| {
            r.expect(sel.eq_to(0));
            let word = r.select(&sel, &["buf0", "buf1"], 1)?;
            r.if_else(
                sel.eq_to(0),
                |r| r.assign(&out, &word),
                |r| r.assign(&out, 0),
            )?;
            r.for_range(2, "i", |r, i| r.assign(&sel, i))?;
            r.ret([&out, &sel])
        })
        .unwrap();

        let mut buf = vec![];
        Printer::write_model(&mut m, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let expected = "\
model tiny {
  output out: 8;
  input EN_pick: 1;
  output RDY_pick: 1;
  variable sel: 1;
  configurable memory_size: 32 = 4;
  bank buf0[4]: 8;
  bank buf1[4]: 8;
  action pick(EN_pick, RDY_pick) {
    expect (sel == 0);
    if (sel == 0) {
      out = {buf0, buf1}[sel][1];
    } else {
      out = 0;
    }
    for i in 0..2 {
      sel = i;
    }
    return (out, sel);
  }
}
";
        assert_eq!(text, expected);
    }
}
