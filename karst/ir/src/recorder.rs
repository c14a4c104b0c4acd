use crate::{
    Assign, Bank, For, If, MemoryAccess, Model, RRC, Return, Statement, Value,
    VarKind, Variable, rrc,
};
use karst_utils::{Error, Id, KarstResult};
use std::rc::Rc;

/// Explicit recording context handed to an action's body.
///
/// Every call appends a statement to the trace being recorded. The
/// top-level recorder of an action also applies each statement to live
/// storage as soon as it is recorded; recorders for `if` branches and loop
/// bodies only record, and the enclosing statement is applied once it is
/// complete so that exactly one branch takes effect.
pub struct Recorder<'a> {
    model: &'a Model,
    stmts: Vec<Statement>,
    conditions: Vec<Value>,
    apply: bool,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(model: &'a Model, apply: bool) -> Self {
        Self {
            model,
            stmts: vec![],
            conditions: vec![],
            apply,
        }
    }

    fn branch(&self) -> Recorder<'a> {
        Recorder::new(self.model, false)
    }

    /// The model being recorded.
    pub fn model(&self) -> &'a Model {
        self.model
    }

    /// Value bound to `name`: a port, variable, configurable or constant.
    pub fn value<S: Into<Id>>(&self, name: S) -> KarstResult<Value> {
        self.model.value(name)
    }

    /// Current value of a configurable. Traces are re-recorded after every
    /// reconfiguration, so the result may be baked into the trace.
    pub fn config<S: Into<Id>>(&self, name: S) -> KarstResult<i64> {
        self.model.config_value(name)
    }

    /// `bank[index]`.
    pub fn mem<S, I>(&self, bank: S, index: I) -> KarstResult<Value>
    where
        S: Into<Id>,
        I: Into<Value>,
    {
        let bank = self.model.bank(bank)?;
        Ok(MemoryAccess::direct(bank, index.into()).into())
    }

    /// `banks[selector][index]`: an access to the bank picked by `selector`
    /// at evaluation time.
    pub fn select<L, I>(
        &self,
        selector: L,
        banks: &[&str],
        index: I,
    ) -> KarstResult<Value>
    where
        L: Into<Value>,
        I: Into<Value>,
    {
        let banks = banks
            .iter()
            .map(|b| self.model.bank(*b))
            .collect::<KarstResult<Vec<RRC<Bank>>>>()?;
        Ok(MemoryAccess::selected(selector.into(), banks, index.into())?.into())
    }

    fn emit(&mut self, stmt: Statement) -> KarstResult<()> {
        if self.apply {
            stmt.eval()?;
        }
        self.stmts.push(stmt);
        Ok(())
    }

    /// Record `dst = src`.
    pub fn assign<D, S>(&mut self, dst: D, src: S) -> KarstResult<()>
    where
        D: Into<Value>,
        S: Into<Value>,
    {
        let assign = Assign::new(dst.into(), src.into())?;
        self.emit(Statement::Assign(assign))
    }

    /// Record `if (predicate) { then }`.
    pub fn if_<P, T>(&mut self, predicate: P, then: T) -> KarstResult<()>
    where
        P: Into<Value>,
        T: FnOnce(&mut Recorder<'a>) -> KarstResult<()>,
    {
        self.if_else(predicate, then, |_| Ok(()))
    }

    /// Record `if (predicate) { then } else { otherwise }`.
    pub fn if_else<P, T, E>(
        &mut self,
        predicate: P,
        then: T,
        otherwise: E,
    ) -> KarstResult<()>
    where
        P: Into<Value>,
        T: FnOnce(&mut Recorder<'a>) -> KarstResult<()>,
        E: FnOnce(&mut Recorder<'a>) -> KarstResult<()>,
    {
        let mut tbranch = self.branch();
        then(&mut tbranch)?;
        let mut fbranch = self.branch();
        otherwise(&mut fbranch)?;
        let (tbranch, tconds) = tbranch.finish();
        let (fbranch, fconds) = fbranch.finish();
        self.conditions.extend(tconds);
        self.conditions.extend(fconds);
        self.emit(Statement::If(If {
            predicate: predicate.into(),
            tbranch,
            fbranch,
        }))
    }

    /// Record `return (values...)`.
    pub fn ret<I>(&mut self, values: I) -> KarstResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.emit(Statement::Return(Return { values }))
    }

    /// Record `for name in 0..bound { body }`. The body receives the loop
    /// variable, which lives only inside the recorded statement.
    pub fn for_range<B, F>(
        &mut self,
        bound: B,
        name: &str,
        body: F,
    ) -> KarstResult<()>
    where
        B: Into<Value>,
        F: FnOnce(&mut Recorder<'a>, Value) -> KarstResult<()>,
    {
        let name = Id::from(name);
        if let Some(kind) = self.model.namespace_of(name) {
            return Err(Error::already_bound(name, kind));
        }
        let var = rrc(Variable::new(name, 32, VarKind::Loop, 0));
        let mut inner = self.branch();
        body(&mut inner, Value::Var(Rc::clone(&var)))?;
        let (body, conds) = inner.finish();
        self.conditions.extend(conds);
        self.emit(Statement::For(For {
            bound: bound.into(),
            var,
            body,
        }))
    }

    /// Declare a guard condition of the action being recorded. Guards have no
    /// effect on evaluation; they feed the exclusivity analysis.
    pub fn expect<C: Into<Value>>(&mut self, cond: C) {
        self.conditions.push(cond.into());
    }

    pub(crate) fn finish(self) -> (Vec<Statement>, Vec<Value>) {
        (self.stmts, self.conditions)
    }
}
