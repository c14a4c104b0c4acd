//! Values: constants, variables, configurables, binary expressions and memory
//! accesses. Every value evaluates to an integer and supports structural
//! comparison through [PartialEq], which is distinct from comparing the
//! integers two values evaluate to.
use crate::{MemoryAccess, Op, Printer, RRC, rrc};
use itertools::Itertools;
use karst_utils::{Error, GetName, Id, KarstResult};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Direction of a port, as seen from inside the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Direction {
    Input,
    Output,
}

/// The namespace a [Variable] was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum VarKind {
    /// Internal state of the model.
    State,
    /// An input or output port.
    Port(Direction),
    /// A parameter fixed for one configuration epoch.
    Configurable,
    /// The induction variable of a `for` statement.
    Loop,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::State => write!(f, "variable"),
            VarKind::Port(Direction::Input) => write!(f, "input port"),
            VarKind::Port(Direction::Output) => write!(f, "output port"),
            VarKind::Configurable => write!(f, "configurable"),
            VarKind::Loop => write!(f, "loop variable"),
        }
    }
}

#[derive(Clone)]
enum Contents {
    Int(i64),
    Bound(Value),
}

/// A named storage cell with a fixed bit width.
///
/// The current value is either an integer or another [Value] that is
/// evaluated every time this variable is read.
pub struct Variable {
    /// Name of the variable. Unique within a model.
    pub name: Id,
    /// Width of the variable in bits.
    pub width: u64,
    /// Namespace of the variable.
    pub kind: VarKind,
    contents: Contents,
}

impl Variable {
    pub fn new(name: Id, width: u64, kind: VarKind, value: i64) -> Self {
        Self {
            name,
            width,
            kind,
            contents: Contents::Int(value),
        }
    }

    pub fn is_port(&self) -> bool {
        matches!(self.kind, VarKind::Port(_))
    }

    pub fn is_configurable(&self) -> bool {
        self.kind == VarKind::Configurable
    }

    /// Current value of the variable.
    pub fn eval(&self) -> KarstResult<i64> {
        match &self.contents {
            Contents::Int(v) => Ok(*v),
            Contents::Bound(v) => v.eval(),
        }
    }

    /// Overwrite the current value with an integer.
    pub fn set(&mut self, value: i64) {
        self.contents = Contents::Int(value);
    }

    /// The value this variable is bound to, if it is not a plain integer.
    pub fn bound_value(&self) -> Option<&Value> {
        match &self.contents {
            Contents::Int(_) => None,
            Contents::Bound(v) => Some(v),
        }
    }
}

/// Variables are the same variable iff they have the same name.
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl GetName for Variable {
    fn name(&self) -> Id {
        self.name
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.name, self.width)
    }
}

static EXPR_COUNT: AtomicU32 = AtomicU32::new(0);

/// A binary operator applied to two values.
pub struct Expression {
    pub op: Op,
    pub left: Value,
    pub right: Value,
    /// Distinguishes this node from structurally equal ones in diagnostics.
    idx: u32,
}

impl Expression {
    pub fn new(op: Op, left: Value, right: Value) -> Self {
        Self {
            op,
            left,
            right,
            idx: EXPR_COUNT.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Unique index of this node.
    pub fn idx(&self) -> u32 {
        self.idx
    }

    pub fn eval(&self) -> KarstResult<i64> {
        let l = self.left.eval()?;
        let r = self.right.eval()?;
        self.op.apply(l, r)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} ({:?} {} {:?})",
            self.idx, self.left, self.op, self.right
        )
    }
}

/// A node in the value IR.
#[derive(Clone)]
pub enum Value {
    /// A fixed integer.
    Const(i64),
    /// A variable, port, configurable or loop variable.
    Var(RRC<Variable>),
    /// A binary expression.
    Expr(Rc<Expression>),
    /// A read or write of a memory bank.
    Mem(Rc<MemoryAccess>),
}

impl Value {
    pub fn constant(value: i64) -> Self {
        Value::Const(value)
    }

    /// A free-standing state variable that belongs to no model.
    pub fn variable<S: Into<Id>>(name: S, width: u64) -> Self {
        Value::Var(rrc(Variable::new(name.into(), width, VarKind::State, 0)))
    }

    /// A free-standing configurable that belongs to no model.
    pub fn configurable<S: Into<Id>>(name: S, width: u64, value: i64) -> Self {
        Value::Var(rrc(Variable::new(
            name.into(),
            width,
            VarKind::Configurable,
            value,
        )))
    }

    pub fn binary<L: Into<Value>, R: Into<Value>>(
        op: Op,
        left: L,
        right: R,
    ) -> Self {
        Value::Expr(Rc::new(Expression::new(op, left.into(), right.into())))
    }

    /// `self == rhs`. Named this way because [PartialEq] is structural.
    pub fn eq_to<R: Into<Value>>(&self, rhs: R) -> Self {
        Self::binary(Op::Eq, self.clone(), rhs)
    }
    pub fn gt<R: Into<Value>>(&self, rhs: R) -> Self {
        Self::binary(Op::Gt, self.clone(), rhs)
    }
    pub fn ge<R: Into<Value>>(&self, rhs: R) -> Self {
        Self::binary(Op::Ge, self.clone(), rhs)
    }
    pub fn lt<R: Into<Value>>(&self, rhs: R) -> Self {
        Self::binary(Op::Lt, self.clone(), rhs)
    }
    pub fn le<R: Into<Value>>(&self, rhs: R) -> Self {
        Self::binary(Op::Le, self.clone(), rhs)
    }

    /// Evaluate the value against the current contents of every variable and
    /// bank it reads.
    pub fn eval(&self) -> KarstResult<i64> {
        match self {
            Value::Const(v) => Ok(*v),
            Value::Var(var) => var.borrow().eval(),
            Value::Expr(e) => e.eval(),
            Value::Mem(m) => m.read(),
        }
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            Value::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&RRC<Variable>> {
        match self {
            Value::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Rc<Expression>> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_mem(&self) -> Option<&Rc<MemoryAccess>> {
        match self {
            Value::Mem(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the variable if this value is one.
    pub fn var_name(&self) -> Option<Id> {
        self.as_var().map(|v| v.borrow().name)
    }

    /// Overwrite the variable behind this value.
    pub fn set(&self, value: i64) -> KarstResult<()> {
        let Some(var) = self.as_var() else {
            return Err(Error::malformed_structure(format!(
                "cannot set `{self}': not a variable"
            )));
        };
        var.borrow_mut().set(value);
        Ok(())
    }

    /// Bind the variable behind this value to `value`, which is evaluated
    /// every time the variable is read. Bindings that would make the variable
    /// depend on itself are rejected.
    pub fn bind(&self, value: Value) -> KarstResult<()> {
        let Some(var) = self.as_var() else {
            return Err(Error::malformed_structure(format!(
                "cannot bind `{self}': not a variable"
            )));
        };
        let name = var.borrow().name;
        if value.depends_on(name) {
            return Err(Error::malformed_structure(format!(
                "binding `{name}' to `{value}' creates a cycle"
            )));
        }
        var.borrow_mut().contents = Contents::Bound(value);
        Ok(())
    }

    /// True if evaluating this value reads variable `name`, possibly through
    /// other bound variables.
    fn depends_on(&self, name: Id) -> bool {
        self.variables().iter().any(|v| {
            let var = v.borrow();
            var.name == name
                || var.bound_value().is_some_and(|b| b.depends_on(name))
        })
    }

    /// Every distinct variable read by this value, in depth-first
    /// left-to-right order.
    pub fn variables(&self) -> Vec<RRC<Variable>> {
        let mut out = vec![];
        self.collect_variables(&mut out);
        out.into_iter().unique_by(|v| v.borrow().name).collect()
    }

    pub(crate) fn collect_variables(&self, out: &mut Vec<RRC<Variable>>) {
        match self {
            Value::Const(_) => {}
            Value::Var(v) => out.push(Rc::clone(v)),
            Value::Expr(e) => {
                e.left.collect_variables(out);
                e.right.collect_variables(out);
            }
            Value::Mem(m) => m.collect_variables(out),
        }
    }

    /// Replace every occurrence of variable `name` with `with`.
    pub fn substitute(&self, name: Id, with: &Value) -> Value {
        match self {
            Value::Var(v) if v.borrow().name == name => with.clone(),
            Value::Const(_) | Value::Var(_) => self.clone(),
            Value::Expr(e) => Value::binary(
                e.op,
                e.left.substitute(name, with),
                e.right.substitute(name, with),
            ),
            Value::Mem(m) => Value::Mem(Rc::new(m.substitute(name, with))),
        }
    }

    /// Copy the expression structure. Variables and banks are storage and
    /// stay shared with the original.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Const(_) | Value::Var(_) => self.clone(),
            Value::Expr(e) => {
                Value::binary(e.op, e.left.deep_copy(), e.right.deep_copy())
            }
            Value::Mem(m) => Value::Mem(Rc::new(m.deep_copy())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Const(a), Value::Const(b)) => a == b,
            (Value::Var(a), Value::Var(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().name == b.borrow().name
            }
            (Value::Expr(a), Value::Expr(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.op == b.op && a.left == b.left && a.right == b.right)
            }
            (Value::Mem(a), Value::Mem(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::format_value(self))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::format_value(self))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Const(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Const(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Const(v.into())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl From<RRC<Variable>> for Value {
    fn from(v: RRC<Variable>) -> Self {
        Value::Var(v)
    }
}

impl From<&RRC<Variable>> for Value {
    fn from(v: &RRC<Variable>) -> Self {
        Value::Var(Rc::clone(v))
    }
}

impl From<MemoryAccess> for Value {
    fn from(m: MemoryAccess) -> Self {
        Value::Mem(Rc::new(m))
    }
}

/// Implement an arithmetic operator on [Value] that builds an [Expression]
/// instead of computing a result.
macro_rules! impl_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Value>> std::ops::$trait<T> for Value {
            type Output = Value;
            fn $method(self, rhs: T) -> Value {
                Value::binary($op, self, rhs)
            }
        }
        impl<T: Into<Value>> std::ops::$trait<T> for &Value {
            type Output = Value;
            fn $method(self, rhs: T) -> Value {
                Value::binary($op, self.clone(), rhs)
            }
        }
        impl std::ops::$trait<Value> for i64 {
            type Output = Value;
            fn $method(self, rhs: Value) -> Value {
                Value::binary($op, self, rhs)
            }
        }
        impl std::ops::$trait<&Value> for i64 {
            type Output = Value;
            fn $method(self, rhs: &Value) -> Value {
                Value::binary($op, self, rhs.clone())
            }
        }
        impl std::ops::$trait<Value> for i32 {
            type Output = Value;
            fn $method(self, rhs: Value) -> Value {
                Value::binary($op, self, rhs)
            }
        }
    };
}

impl_binop!(Add, add, Op::Add);
impl_binop!(Sub, sub, Op::Sub);
impl_binop!(Mul, mul, Op::Mul);
impl_binop!(Rem, rem, Op::Mod);
impl_binop!(BitXor, bitxor, Op::Xor);
impl_binop!(BitOr, bitor, Op::Or);
impl_binop!(BitAnd, bitand, Op::And);
impl_binop!(Shr, shr, Op::Shr);
impl_binop!(Shl, shl, Op::Shl);
