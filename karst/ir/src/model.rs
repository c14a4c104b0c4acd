//! The model registry: named storage, banks and actions together with their
//! memoized statement traces.
use crate::reserved_names::{EN_PREFIX, MEMORY_SIZE, RDY_PREFIX, RESERVED_NAMES};
use crate::{
    Bank, Direction, RRC, Recorder, Statement, Value, VarKind, Variable, rrc,
};
use itertools::Itertools;
use karst_utils::{Error, GetName, Id, KarstResult, is_power_of_two};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// Body of an action. Invoked once per recording pass with a fresh
/// [Recorder].
pub type ActionBody = Rc<dyn Fn(&mut Recorder<'_>) -> KarstResult<()>>;

/// A named guarded operation on a model.
pub struct Action {
    pub name: Id,
    /// Enable input, driven to 1 while the action executes.
    pub en: RRC<Variable>,
    /// Ready output. The action only takes effect while it is non-zero.
    pub rdy: RRC<Variable>,
    body: ActionBody,
}

impl GetName for Action {
    fn name(&self) -> Id {
        self.name
    }
}

#[derive(Default)]
struct Traces {
    statements: LinkedHashMap<Id, Vec<Statement>>,
    conditions: LinkedHashMap<Id, Vec<Value>>,
}

/// A functional model of a memory: ports, internal state, configurables,
/// banks and the actions operating on them.
///
/// Names are unique across every namespace of a model. The statement trace
/// of each action is recorded on first use and memoized until the model is
/// reconfigured.
pub struct Model {
    pub name: Id,
    ports: LinkedHashMap<Id, RRC<Variable>>,
    variables: LinkedHashMap<Id, RRC<Variable>>,
    configurables: LinkedHashMap<Id, RRC<Variable>>,
    constants: LinkedHashMap<Id, i64>,
    banks: LinkedHashMap<Id, RRC<Bank>>,
    actions: LinkedHashMap<Id, Action>,
    reset_action: Option<Id>,
    traces: Option<Traces>,
}

impl Model {
    /// Create an empty model whose default bank size is `memory_size`.
    pub fn new<S: Into<Id>>(name: S, memory_size: i64) -> Self {
        let mut model = Self {
            name: name.into(),
            ports: LinkedHashMap::new(),
            variables: LinkedHashMap::new(),
            configurables: LinkedHashMap::new(),
            constants: LinkedHashMap::new(),
            banks: LinkedHashMap::new(),
            actions: LinkedHashMap::new(),
            reset_action: None,
            traces: None,
        };
        let size = Id::from(MEMORY_SIZE);
        model.configurables.insert(
            size,
            rrc(Variable::new(size, 32, VarKind::Configurable, memory_size)),
        );
        model
    }

    /// Namespace `name` is already bound in, if any.
    pub fn namespace_of(&self, name: Id) -> Option<&'static str> {
        if self.ports.contains_key(&name) {
            Some("port")
        } else if self.variables.contains_key(&name) {
            Some("variable")
        } else if self.configurables.contains_key(&name) {
            Some("configurable")
        } else if self.constants.contains_key(&name) {
            Some("constant")
        } else if self.banks.contains_key(&name) {
            Some("bank")
        } else if self.actions.contains_key(&name) {
            Some("action")
        } else {
            None
        }
    }

    fn check_fresh(&self, name: Id) -> KarstResult<()> {
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(Error::reserved_name(name));
        }
        match self.namespace_of(name) {
            Some(kind) => Err(Error::already_bound(name, kind)),
            None => Ok(()),
        }
    }

    fn invalidate(&mut self) {
        self.traces = None;
    }

    // ============ Declarations ============

    fn define_storage(
        &mut self,
        name: Id,
        width: u64,
        kind: VarKind,
        value: i64,
    ) -> KarstResult<Value> {
        self.check_fresh(name)?;
        let var = rrc(Variable::new(name, width, kind, value));
        let map = match kind {
            VarKind::Port(_) => &mut self.ports,
            VarKind::Configurable => &mut self.configurables,
            VarKind::State | VarKind::Loop => &mut self.variables,
        };
        map.insert(name, Rc::clone(&var));
        self.invalidate();
        Ok(Value::Var(var))
    }

    pub fn define_port_in<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> KarstResult<Value> {
        self.define_storage(name.into(), width, VarKind::Port(Direction::Input), 0)
    }

    pub fn define_port_out<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
        value: i64,
    ) -> KarstResult<Value> {
        self.define_storage(
            name.into(),
            width,
            VarKind::Port(Direction::Output),
            value,
        )
    }

    pub fn define_variable<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
        value: i64,
    ) -> KarstResult<Value> {
        self.define_storage(name.into(), width, VarKind::State, value)
    }

    pub fn define_configurable<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
        value: i64,
    ) -> KarstResult<Value> {
        self.define_storage(name.into(), width, VarKind::Configurable, value)
    }

    pub fn define_const<S: Into<Id>>(
        &mut self,
        name: S,
        value: i64,
    ) -> KarstResult<Value> {
        let name = name.into();
        self.check_fresh(name)?;
        self.constants.insert(name, value);
        self.invalidate();
        Ok(Value::Const(value))
    }

    /// A bank sized by the model's `memory_size` configurable.
    pub fn define_bank<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> KarstResult<()> {
        let size = self.value(MEMORY_SIZE)?;
        self.define_bank_sized(name, width, size)
    }

    /// A bank whose size is `size`, re-evaluated on every reconfiguration.
    pub fn define_bank_sized<S, V>(
        &mut self,
        name: S,
        width: u64,
        size: V,
    ) -> KarstResult<()>
    where
        S: Into<Id>,
        V: Into<Value>,
    {
        let name = name.into();
        self.check_fresh(name)?;
        let bank = Bank::new(name, width, size.into())?;
        self.banks.insert(name, rrc(bank));
        self.invalidate();
        Ok(())
    }

    /// Make `memory_size` follow `size`, an expression over other
    /// configurables. It can no longer be configured directly.
    pub fn derive_memory_size<V: Into<Value>>(&mut self, size: V) -> KarstResult<()> {
        self.value(MEMORY_SIZE)?.bind(size.into())?;
        self.invalidate();
        Ok(())
    }

    /// `count` banks named `<prefix><i>` that can be selected at runtime.
    pub fn define_banks<V: Into<Value>>(
        &mut self,
        prefix: &str,
        count: u64,
        width: u64,
        size: V,
    ) -> KarstResult<Vec<Id>> {
        if !is_power_of_two(count) {
            return Err(Error::malformed_structure(format!(
                "cannot define {count} banks `{prefix}*': count must be a power of two"
            )));
        }
        let size = size.into();
        (0..count)
            .map(|i| {
                let name = Id::from(format!("{prefix}{i}"));
                self.define_bank_sized(name, width, size.clone())?;
                Ok(name)
            })
            .collect()
    }

    /// Declare an action with freshly allocated `EN_<name>`/`RDY_<name>`
    /// ports. `ready` is the initial value of the ready port.
    pub fn define_action<S, F>(
        &mut self,
        name: S,
        ready: bool,
        body: F,
    ) -> KarstResult<()>
    where
        S: Into<Id>,
        F: Fn(&mut Recorder<'_>) -> KarstResult<()> + 'static,
    {
        let name = name.into();
        let en_name = Id::from(format!("{EN_PREFIX}{name}"));
        let rdy_name = Id::from(format!("{RDY_PREFIX}{name}"));
        for n in [name, en_name, rdy_name] {
            self.check_fresh(n)?;
        }
        let en = self.define_port_in(en_name, 1)?;
        let rdy = self.define_port_out(rdy_name, 1, ready.into())?;
        self.insert_action(name, en, rdy, Rc::new(body))
    }

    /// Declare an action whose enable and ready signals alias existing
    /// ports or variables.
    pub fn define_action_on<S, E, R, F>(
        &mut self,
        name: S,
        en: E,
        rdy: R,
        body: F,
    ) -> KarstResult<()>
    where
        S: Into<Id>,
        E: Into<Id>,
        R: Into<Id>,
        F: Fn(&mut Recorder<'_>) -> KarstResult<()> + 'static,
    {
        let name = name.into();
        self.check_fresh(name)?;
        let en = self.value(en)?;
        let rdy = self.value(rdy)?;
        self.insert_action(name, en, rdy, Rc::new(body))
    }

    fn insert_action(
        &mut self,
        name: Id,
        en: Value,
        rdy: Value,
        body: ActionBody,
    ) -> KarstResult<()> {
        let handle = |v: Value| match v {
            Value::Var(var) => Ok(var),
            other => Err(Error::malformed_structure(format!(
                "action `{name}': `{other}' cannot drive a handshake signal"
            ))),
        };
        let action = Action {
            name,
            en: handle(en)?,
            rdy: handle(rdy)?,
            body,
        };
        self.actions.insert(name, action);
        self.invalidate();
        Ok(())
    }

    /// Mark `name` as the action replayed after every recording pass.
    pub fn set_reset_action<S: Into<Id>>(&mut self, name: S) -> KarstResult<()> {
        let name = name.into();
        self.action(name)?;
        self.reset_action = Some(name);
        self.invalidate();
        Ok(())
    }

    // ============ Lookup ============

    /// Value bound to `name`: a port, variable, configurable or constant.
    pub fn value<S: Into<Id>>(&self, name: S) -> KarstResult<Value> {
        let name = name.into();
        if let Some(var) = self
            .ports
            .get(&name)
            .or_else(|| self.variables.get(&name))
            .or_else(|| self.configurables.get(&name))
        {
            return Ok(Value::Var(Rc::clone(var)));
        }
        self.constants
            .get(&name)
            .map(|c| Value::Const(*c))
            .ok_or_else(|| Error::undefined(name, "value"))
    }

    pub fn bank<S: Into<Id>>(&self, name: S) -> KarstResult<RRC<Bank>> {
        let name = name.into();
        self.banks
            .get(&name)
            .map(Rc::clone)
            .ok_or_else(|| Error::undefined(name, "bank"))
    }

    pub fn action<S: Into<Id>>(&self, name: S) -> KarstResult<&Action> {
        let name = name.into();
        self.actions
            .get(&name)
            .ok_or_else(|| Error::undefined(name, "action"))
    }

    /// Current value of a configurable.
    pub fn config_value<S: Into<Id>>(&self, name: S) -> KarstResult<i64> {
        let name = name.into();
        self.configurables
            .get(&name)
            .ok_or_else(|| Error::undefined(name, "configurable"))?
            .borrow()
            .eval()
    }

    pub fn ports(&self) -> impl Iterator<Item = &RRC<Variable>> {
        self.ports.values()
    }

    pub fn variables(&self) -> impl Iterator<Item = &RRC<Variable>> {
        self.variables.values()
    }

    pub fn configurables(&self) -> impl Iterator<Item = &RRC<Variable>> {
        self.configurables.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = (&Id, &i64)> {
        self.constants.iter()
    }

    pub fn banks(&self) -> impl Iterator<Item = &RRC<Bank>> {
        self.banks.values()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn reset_action(&self) -> Option<Id> {
        self.reset_action
    }

    /// Every port, variable and configurable in declaration order, with
    /// handles sharing an underlying name collapsed.
    pub fn all_variables(&self) -> Vec<RRC<Variable>> {
        self.ports
            .values()
            .chain(self.variables.values())
            .chain(self.configurables.values())
            .unique_by(|v| v.borrow().name)
            .map(Rc::clone)
            .collect()
    }

    // ============ Storage access ============

    /// Overwrite a port or variable. Configurables change only through
    /// [Model::configure].
    pub fn set<S: Into<Id>>(&mut self, name: S, value: i64) -> KarstResult<()> {
        let name = name.into();
        if self.configurables.contains_key(&name) {
            return Err(Error::misc(format!(
                "`{name}' is a configurable; use `configure' to change it"
            )));
        }
        let var = self
            .ports
            .get(&name)
            .or_else(|| self.variables.get(&name))
            .ok_or_else(|| Error::undefined(name, "variable"))?;
        var.borrow_mut().set(value);
        Ok(())
    }

    pub fn get<S: Into<Id>>(&self, name: S) -> KarstResult<i64> {
        self.value(name)?.eval()
    }

    /// Bind a port or variable to a value evaluated on every read.
    pub fn bind<S, V>(&mut self, name: S, value: V) -> KarstResult<()>
    where
        S: Into<Id>,
        V: Into<Value>,
    {
        let name = name.into();
        if self.configurables.contains_key(&name) {
            return Err(Error::misc(format!(
                "`{name}' is a configurable and cannot be bound"
            )));
        }
        self.value(name)?.bind(value.into())
    }

    pub fn write_bank<S: Into<Id>>(
        &mut self,
        name: S,
        addr: i64,
        data: i64,
    ) -> KarstResult<()> {
        self.bank(name)?.borrow_mut().write(addr, data)
    }

    pub fn read_bank<S: Into<Id>>(&self, name: S, addr: i64) -> KarstResult<i64> {
        self.bank(name)?.borrow().read(addr)
    }

    // ============ Configuration ============

    /// Set configurables, resize every bank and drop the memoized traces.
    pub fn configure<I, S>(&mut self, values: I) -> KarstResult<()>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<Id>,
    {
        let updates = values
            .into_iter()
            .map(|(name, value)| {
                let name = name.into();
                let var = self
                    .configurables
                    .get(&name)
                    .ok_or_else(|| Error::undefined(name, "configurable"))?;
                if let Some(derived) = var.borrow().bound_value() {
                    return Err(Error::invalid_input(format!(
                        "`{name}' is derived from `{derived}' and cannot be configured"
                    )));
                }
                Ok((Rc::clone(var), value))
            })
            .collect::<KarstResult<Vec<_>>>()?;
        let previous = updates
            .iter()
            .map(|(var, _)| var.borrow().eval())
            .collect::<KarstResult<Vec<_>>>()?;
        for (var, value) in &updates {
            log::debug!(
                "{}: configuring `{}' = {value}",
                self.name,
                var.borrow().name
            );
            var.borrow_mut().set(*value);
        }
        // every bank must accept its new size before any of them is touched
        let sizes = self
            .banks
            .values()
            .map(|bank| bank.borrow().required_len())
            .collect::<KarstResult<Vec<_>>>();
        if let Err(e) = sizes {
            for ((var, _), value) in updates.iter().zip(previous).rev() {
                var.borrow_mut().set(value);
            }
            return Err(e);
        }
        for bank in self.banks.values() {
            bank.borrow_mut().resize()?;
        }
        self.invalidate();
        Ok(())
    }

    // ============ Traces ============

    fn record(&self) -> KarstResult<Traces> {
        log::debug!("{}: recording {} action(s)", self.name, self.actions.len());
        let mut traces = Traces::default();
        for action in self.actions.values() {
            let mut recorder = Recorder::new(self, true);
            (action.body)(&mut recorder).map_err(|e| {
                let msg = format!("while recording action `{}'", action.name);
                e.with_post_msg(Some(msg))
            })?;
            let (stmts, conds) = recorder.finish();
            traces.statements.insert(action.name, stmts);
            traces.conditions.insert(action.name, conds);
        }
        if let Some(reset) = self.reset_action {
            if let Some(stmts) = traces.statements.get(&reset) {
                log::debug!("{}: replaying reset action `{reset}'", self.name);
                Statement::eval_all(stmts)?;
            }
        }
        Ok(traces)
    }

    fn traces(&mut self) -> KarstResult<&Traces> {
        let traces = match self.traces.take() {
            Some(traces) => traces,
            None => self.record()?,
        };
        Ok(&*self.traces.insert(traces))
    }

    /// Statement trace of every action, recorded on first use.
    pub fn produce_statements(
        &mut self,
    ) -> KarstResult<&LinkedHashMap<Id, Vec<Statement>>> {
        Ok(&self.traces()?.statements)
    }

    /// Statement trace of one action.
    pub fn statements<S: Into<Id>>(
        &mut self,
        action: S,
    ) -> KarstResult<&[Statement]> {
        let name = action.into();
        self.action(name)?;
        self.traces()?
            .statements
            .get(&name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::undefined(name, "action"))
    }

    /// Guard conditions declared by every action.
    pub fn conditions(
        &mut self,
    ) -> KarstResult<&LinkedHashMap<Id, Vec<Value>>> {
        Ok(&self.traces()?.conditions)
    }

    /// Whether the ready signal of `action` is currently asserted.
    pub fn is_ready<S: Into<Id>>(&self, action: S) -> KarstResult<bool> {
        Ok(self.action(action)?.rdy.borrow().eval()? != 0)
    }

    /// Invoke `action`. When the action is not ready this is a no-op that
    /// returns the latched outputs of its top-level `return`.
    pub fn call<S: Into<Id>>(&mut self, action: S) -> KarstResult<Vec<i64>> {
        let name = action.into();
        let (en, rdy) = {
            let action = self.action(name)?;
            (Rc::clone(&action.en), Rc::clone(&action.rdy))
        };
        let stmts = self
            .traces()?
            .statements
            .get(&name)
            .ok_or_else(|| Error::undefined(name, "action"))?;

        if rdy.borrow().eval()? == 0 {
            log::debug!("`{name}' is not ready; returning latched outputs");
            return match stmts.iter().find_map(|s| match s {
                Statement::Return(ret) => Some(ret),
                _ => None,
            }) {
                Some(ret) => ret.eval(),
                None => Ok(vec![]),
            };
        }

        en.borrow_mut().set(1);
        let result = Statement::eval_all(stmts);
        en.borrow_mut().set(0);
        Ok(result?.unwrap_or_default())
    }
}
