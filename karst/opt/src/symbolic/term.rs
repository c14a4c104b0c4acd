//! Integer terms over solver symbols and their linear normal form.
use karst_ir::Op;
use karst_utils::Id;
use linked_hash_map::LinkedHashMap;
use std::collections::BTreeMap;
use std::fmt;

/// An unbounded integer unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sym(u32);

impl Sym {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Maps variable names to solver symbols. Threading one table through
/// several conversions keeps the symbol of a name stable across them.
#[derive(Default)]
pub struct SymbolTable {
    syms: LinkedHashMap<Id, Sym>,
    names: Vec<Id>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol for `name`, allocating a fresh one on first use.
    pub fn get_or_insert(&mut self, name: Id) -> Sym {
        if let Some(sym) = self.syms.get(&name) {
            return *sym;
        }
        let sym = Sym(self.names.len() as u32);
        self.names.push(name);
        self.syms.insert(name, sym);
        sym
    }

    pub fn get(&self, name: Id) -> Option<Sym> {
        self.syms.get(&name).copied()
    }

    pub fn name(&self, sym: Sym) -> Id {
        self.names[sym.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Render a term with symbol names.
    pub fn format(&self, term: &Term) -> String {
        match term {
            Term::Lit(v) => v.to_string(),
            Term::Sym(s) => self.name(*s).to_string(),
            Term::Bin(op, l, r) => {
                format!("({} {op} {})", self.format(l), self.format(r))
            }
        }
    }
}

/// An integer-valued term. Relational operators produce 0 or 1.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Lit(i64),
    Sym(Sym),
    Bin(Op, Box<Term>, Box<Term>),
}

impl Term {
    pub fn bin(op: Op, l: Term, r: Term) -> Term {
        Term::Bin(op, Box::new(l), Box::new(r))
    }

    pub fn as_lit(&self) -> Option<i64> {
        match self {
            Term::Lit(v) => Some(*v),
            _ => None,
        }
    }

    /// Every symbol mentioned by this term.
    pub fn symbols(&self, out: &mut Vec<Sym>) {
        match self {
            Term::Lit(_) => {}
            Term::Sym(s) => {
                if !out.contains(s) {
                    out.push(*s)
                }
            }
            Term::Bin(_, l, r) => {
                l.symbols(out);
                r.symbols(out);
            }
        }
    }

    /// Evaluate under an assignment of symbols. `None` when evaluation
    /// fails (overflow, modulo by zero, bad shift).
    pub fn eval<F: Fn(Sym) -> i64 + Copy>(&self, env: F) -> Option<i64> {
        match self {
            Term::Lit(v) => Some(*v),
            Term::Sym(s) => Some(env(*s)),
            Term::Bin(op, l, r) => op.apply(l.eval(env)?, r.eval(env)?).ok(),
        }
    }

    /// Canonical simplified form: linear parts are collected into a sum of
    /// scaled atoms plus a constant and fully constant subterms are folded.
    pub fn simplify(&self) -> Term {
        Linear::from_term(self).into_term()
    }

    /// `|self|`, simplified. Only defined when `self` simplifies to a
    /// literal; otherwise the simplified term itself.
    pub fn abs(&self) -> Term {
        match self.simplify() {
            Term::Lit(v) => Term::Lit(v.saturating_abs()),
            t => t,
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Lit(v) => write!(f, "{v}"),
            Term::Sym(s) => write!(f, "s{}", s.0),
            Term::Bin(op, l, r) => write!(f, "({l:?} {op} {r:?})"),
        }
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        Term::Lit(v)
    }
}

impl From<Sym> for Term {
    fn from(s: Sym) -> Self {
        Term::Sym(s)
    }
}

impl std::ops::Sub for Term {
    type Output = Term;
    fn sub(self, rhs: Term) -> Term {
        Term::bin(Op::Sub, self, rhs)
    }
}

impl std::ops::Add for Term {
    type Output = Term;
    fn add(self, rhs: Term) -> Term {
        Term::bin(Op::Add, self, rhs)
    }
}

/// `constant + sum(coeff * atom)`. Atoms are symbols or non-linear terms
/// already in canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Linear {
    pub coeffs: BTreeMap<Term, i64>,
    pub constant: i64,
}

impl Linear {
    pub fn constant(c: i64) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            constant: c,
        }
    }

    pub fn atom(t: Term) -> Self {
        let mut coeffs = BTreeMap::new();
        coeffs.insert(t, 1);
        Self {
            coeffs,
            constant: 0,
        }
    }

    pub fn as_constant(&self) -> Option<i64> {
        self.coeffs.is_empty().then_some(self.constant)
    }

    /// `self + k * other`. `None` on overflow.
    pub fn add_scaled(&self, other: &Linear, k: i64) -> Option<Linear> {
        let mut out = self.clone();
        out.constant = out.constant.checked_add(other.constant.checked_mul(k)?)?;
        for (atom, c) in &other.coeffs {
            let entry = out.coeffs.entry(atom.clone()).or_insert(0);
            *entry = entry.checked_add(c.checked_mul(k)?)?;
        }
        out.coeffs.retain(|_, c| *c != 0);
        Some(out)
    }

    pub fn scale(&self, k: i64) -> Option<Linear> {
        Linear::default().add_scaled(self, k)
    }

    /// Normalize a term. Subterms that cannot be expressed linearly become
    /// atoms.
    pub fn from_term(term: &Term) -> Linear {
        match term {
            Term::Lit(v) => Linear::constant(*v),
            Term::Sym(_) => Linear::atom(term.clone()),
            Term::Bin(op, l, r) => {
                let l = Linear::from_term(l);
                let r = Linear::from_term(r);
                Self::combine(*op, l, r)
            }
        }
    }

    fn combine(op: Op, l: Linear, r: Linear) -> Linear {
        let linear = match op {
            Op::Add => l.add_scaled(&r, 1),
            Op::Sub => l.add_scaled(&r, -1),
            Op::Mul => match (l.as_constant(), r.as_constant()) {
                (Some(c), _) => r.scale(c),
                (_, Some(c)) => l.scale(c),
                _ => None,
            },
            _ => match (l.as_constant(), r.as_constant()) {
                (Some(a), Some(b)) => op.apply(a, b).ok().map(Linear::constant),
                _ => None,
            },
        };
        if let Some(linear) = linear {
            return linear;
        }
        if let (Op::Mod, Some(m)) = (op, r.as_constant()) {
            if m > 0 {
                // (x + k*m + c) % m == (x + c') % m for Euclidean remainder
                let mut l = l;
                l.constant = l.constant.rem_euclid(m);
                if l.coeffs.values().all(|c| c % m == 0) {
                    return Linear::constant(l.constant);
                }
                return Linear::atom(Term::bin(op, l.into_term(), Term::Lit(m)));
            }
        }
        Linear::atom(Term::bin(op, l.into_term(), r.into_term()))
    }

    /// Canonical term for this linear form.
    pub fn into_term(self) -> Term {
        let mut acc: Option<Term> = None;
        for (atom, c) in self.coeffs {
            let scaled = if c == 1 {
                atom
            } else {
                Term::bin(Op::Mul, Term::Lit(c), atom)
            };
            acc = Some(match acc {
                None => scaled,
                Some(t) => Term::bin(Op::Add, t, scaled),
            });
        }
        match acc {
            None => Term::Lit(self.constant),
            Some(t) if self.constant == 0 => t,
            Some(t) => Term::bin(Op::Add, t, Term::Lit(self.constant)),
        }
    }
}
