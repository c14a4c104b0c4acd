//! Memory banks and the value node that reads or writes them.
use crate::{RRC, Value, Variable};
use itertools::Itertools;
use karst_utils::{Error, GetName, Id, KarstResult, is_power_of_two};
use std::fmt;
use std::rc::Rc;

/// Whether a [MemoryAccess] reads or writes its bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum AccessType {
    Read,
    Write,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Read => write!(f, "read"),
            AccessType::Write => write!(f, "write"),
        }
    }
}

/// Indexed backing storage of a model.
pub struct Bank {
    /// Name of the bank.
    pub name: Id,
    /// Width of a word in bits.
    pub width: u64,
    /// Number of words, re-evaluated whenever the model is reconfigured.
    size: Value,
    data: Vec<i64>,
}

impl Bank {
    pub fn new(name: Id, width: u64, size: Value) -> KarstResult<Self> {
        let mut bank = Self {
            name,
            width,
            size,
            data: vec![],
        };
        bank.resize()?;
        Ok(bank)
    }

    /// Expression computing the number of words in this bank.
    pub fn size_expr(&self) -> &Value {
        &self.size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of words the size expression evaluates to right now.
    pub fn required_len(&self) -> KarstResult<usize> {
        let size = self.size.eval()?;
        usize::try_from(size).map_err(|_| {
            Error::malformed_structure(format!(
                "bank `{}' has negative size {size}",
                self.name
            ))
        })
    }

    /// Re-evaluate the size expression and reset the contents to zero.
    pub fn resize(&mut self) -> KarstResult<()> {
        let size = self.required_len()?;
        log::debug!("resizing bank `{}' to {size} words", self.name);
        self.data = vec![0; size];
        Ok(())
    }

    fn offset(&self, idx: i64) -> KarstResult<usize> {
        usize::try_from(idx)
            .ok()
            .filter(|o| *o < self.data.len())
            .ok_or_else(|| {
                Error::malformed_structure(format!(
                    "index {idx} out of range for bank `{}' of size {}",
                    self.name,
                    self.data.len()
                ))
            })
    }

    pub fn read(&self, idx: i64) -> KarstResult<i64> {
        Ok(self.data[self.offset(idx)?])
    }

    pub fn write(&mut self, idx: i64, value: i64) -> KarstResult<()> {
        let offset = self.offset(idx)?;
        self.data[offset] = value;
        Ok(())
    }
}

impl GetName for Bank {
    fn name(&self) -> Id {
        self.name
    }
}

/// The bank a [MemoryAccess] targets.
#[derive(Clone)]
pub enum BankTarget {
    /// Always the same bank.
    Direct(RRC<Bank>),
    /// One of a power-of-two number of banks, chosen at evaluation time by
    /// the low bits of `selector`.
    Selected {
        selector: Value,
        banks: Vec<RRC<Bank>>,
    },
}

impl BankTarget {
    /// The bank that an access would touch right now.
    pub fn resolve(&self) -> KarstResult<RRC<Bank>> {
        match self {
            BankTarget::Direct(bank) => Ok(Rc::clone(bank)),
            BankTarget::Selected { selector, banks } => {
                let sel = selector.eval()?;
                let mask = banks.len() as i64 - 1;
                Ok(Rc::clone(&banks[(sel & mask) as usize]))
            }
        }
    }

    /// Names of every bank this target may touch.
    pub fn bank_names(&self) -> Vec<Id> {
        match self {
            BankTarget::Direct(bank) => vec![bank.borrow().name],
            BankTarget::Selected { banks, .. } => {
                banks.iter().map(|b| b.borrow().name).collect()
            }
        }
    }
}

impl PartialEq for BankTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BankTarget::Direct(_), BankTarget::Direct(_)) => {
                self.bank_names() == other.bank_names()
            }
            (
                BankTarget::Selected { selector: s1, .. },
                BankTarget::Selected { selector: s2, .. },
            ) => s1 == s2 && self.bank_names() == other.bank_names(),
            _ => false,
        }
    }
}

/// A read or write of a bank at an index expression.
#[derive(Clone, PartialEq)]
pub struct MemoryAccess {
    pub target: BankTarget,
    pub index: Value,
}

impl MemoryAccess {
    pub fn direct(bank: RRC<Bank>, index: Value) -> Self {
        Self {
            target: BankTarget::Direct(bank),
            index,
        }
    }

    /// An access to one of `banks` chosen by `selector`. The number of banks
    /// must be a power of two.
    pub fn selected(
        selector: Value,
        banks: Vec<RRC<Bank>>,
        index: Value,
    ) -> KarstResult<Self> {
        if !is_power_of_two(banks.len() as u64) {
            return Err(Error::malformed_structure(format!(
                "bank selection over {} banks ({}): count must be a power of two",
                banks.len(),
                banks.iter().map(|b| b.borrow().name).join(", ")
            )));
        }
        Ok(Self {
            target: BankTarget::Selected { selector, banks },
            index,
        })
    }

    /// Read the word currently addressed by this access.
    pub fn read(&self) -> KarstResult<i64> {
        let bank = self.target.resolve()?;
        let idx = self.index.eval()?;
        let word = bank.borrow().read(idx)?;
        Ok(word)
    }

    /// Write the word currently addressed by this access.
    pub fn write(&self, value: i64) -> KarstResult<()> {
        let bank = self.target.resolve()?;
        let idx = self.index.eval()?;
        bank.borrow_mut().write(idx, value)
    }

    pub(crate) fn collect_variables(&self, out: &mut Vec<RRC<Variable>>) {
        if let BankTarget::Selected { selector, .. } = &self.target {
            selector.collect_variables(out);
        }
        self.index.collect_variables(out);
    }

    /// Copy of this access with variable `name` replaced by `with`.
    pub fn substitute(&self, name: Id, with: &Value) -> Self {
        let target = match &self.target {
            BankTarget::Direct(_) => self.target.clone(),
            BankTarget::Selected { selector, banks } => BankTarget::Selected {
                selector: selector.substitute(name, with),
                banks: banks.clone(),
            },
        };
        Self {
            target,
            index: self.index.substitute(name, with),
        }
    }

    pub(crate) fn deep_copy(&self) -> Self {
        let target = match &self.target {
            BankTarget::Direct(_) => self.target.clone(),
            BankTarget::Selected { selector, banks } => BankTarget::Selected {
                selector: selector.deep_copy(),
                banks: banks.clone(),
            },
        };
        Self {
            target,
            index: self.index.deep_copy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrc;

    fn bank(name: &str, size: i64) -> RRC<Bank> {
        rrc(Bank::new(Id::from(name), 16, Value::constant(size)).unwrap())
    }

    #[test]
    fn read_write_direct() {
        let mem = bank("mem", 8);
        let addr = Value::variable("addr", 3);
        let access = MemoryAccess::direct(Rc::clone(&mem), addr.clone());
        addr.set(5).unwrap();
        access.write(42).unwrap();
        assert_eq!(access.read().unwrap(), 42);
        assert_eq!(mem.borrow().read(5).unwrap(), 42);
        addr.set(8).unwrap();
        assert!(access.read().is_err());
    }

    #[test]
    fn selected_banks() {
        let banks = vec![bank("b0", 4), bank("b1", 4)];
        let sel = Value::variable("sel", 1);
        let idx = Value::variable("idx", 2);
        let access =
            MemoryAccess::selected(sel.clone(), banks.clone(), idx.clone())
                .unwrap();
        sel.set(1).unwrap();
        idx.set(2).unwrap();
        access.write(7).unwrap();
        assert_eq!(banks[1].borrow().read(2).unwrap(), 7);
        assert_eq!(banks[0].borrow().read(2).unwrap(), 0);
        sel.set(0).unwrap();
        assert_eq!(access.read().unwrap(), 0);

        let three = vec![bank("c0", 4), bank("c1", 4), bank("c2", 4)];
        assert!(MemoryAccess::selected(sel, three, idx).is_err());
    }

    #[test]
    fn access_equality() {
        let mem = bank("mem", 8);
        let a1 = MemoryAccess::direct(
            Rc::clone(&mem),
            Value::variable("addr", 3) + 1,
        );
        let a2 = MemoryAccess::direct(
            bank("mem", 8),
            Value::variable("addr", 3) + 1,
        );
        let a3 = MemoryAccess::direct(mem, Value::variable("addr", 3) + 2);
        assert!(a1 == a2);
        assert!(a1 != a3);
    }
}
