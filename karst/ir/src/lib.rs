//! Internal representation of karst memory models.
//!
//! A [Model] owns named storage ([Variable]s and [Bank]s) and a set of
//! actions. The body of every action is run once through a [Recorder],
//! producing a trace of [Statement]s over [Value] expressions that the
//! analyses in `karst-opt` consume.
mod bank;
mod common;
mod model;
mod ops;
mod printer;
mod recorder;
mod sram_macro;
mod stmt;
mod value;

pub mod reserved_names;

pub use bank::{AccessType, Bank, BankTarget, MemoryAccess};
pub use common::{RRC, rrc};
pub use model::{Action, ActionBody, Model};
pub use ops::Op;
pub use printer::Printer;
pub use recorder::Recorder;
pub use sram_macro::SramMacro;
pub use stmt::{Assign, For, If, Return, Statement};
pub use value::{Direction, Expression, Value, VarKind, Variable};
