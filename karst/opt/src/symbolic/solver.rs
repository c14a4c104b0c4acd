//! A small decision procedure for conjunctions of integer constraints.
//!
//! Satisfiability is established by finding a witness in a bounded search
//! around zero; unsatisfiability by Fourier-Motzkin elimination over the
//! linear relaxation with integer tightening. Anything else is
//! [SatResult::Unknown].
use super::{Linear, Sym, Term};
use itertools::Itertools;
use karst_ir::Op;
use karst_utils::gcd;
use std::collections::{BTreeMap, HashMap};

/// Outcome of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// Upper bound on the number of inequalities Fourier-Motzkin may produce
/// before giving up.
const MAX_INEQUALITIES: usize = 512;

/// Collects constraints and decides whether they can hold together.
#[derive(Default)]
pub struct Solver {
    assertions: Vec<Term>,
    model: Option<HashMap<Sym, i64>>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert that `term` is non-zero.
    pub fn add(&mut self, term: Term) {
        self.model = None;
        self.assertions.push(term);
    }

    pub fn assertions(&self) -> &[Term] {
        &self.assertions
    }

    /// Satisfying assignment found by the last [Solver::check], if any.
    pub fn model(&self) -> Option<&HashMap<Sym, i64>> {
        self.model.as_ref()
    }

    pub fn check(&mut self) -> SatResult {
        let mut syms = vec![];
        for t in &self.assertions {
            t.symbols(&mut syms);
        }
        syms.sort();

        if let Some(model) = self.find_witness(&syms) {
            self.model = Some(model);
            return SatResult::Sat;
        }
        match self.refute() {
            Some(true) => SatResult::Unsat,
            _ => {
                log::debug!(
                    "solver: {} assertion(s) over {} symbol(s) undecided",
                    self.assertions.len(),
                    syms.len()
                );
                SatResult::Unknown
            }
        }
    }

    fn holds(&self, env: &HashMap<Sym, i64>) -> bool {
        let lookup = |s: Sym| env.get(&s).copied().unwrap_or(0);
        self.assertions
            .iter()
            .all(|t| t.eval(lookup).is_some_and(|v| v != 0))
    }

    /// Enumerate assignments close to zero. The radius shrinks as the number
    /// of symbols grows to keep the search bounded.
    fn find_witness(&self, syms: &[Sym]) -> Option<HashMap<Sym, i64>> {
        let radius: i64 = match syms.len() {
            0..=3 => 16,
            4 => 4,
            5 | 6 => 2,
            _ => return None,
        };
        // 0, 1, -1, 2, -2, ...
        let candidates = std::iter::once(0)
            .chain((1..=radius).flat_map(|v| [v, -v]))
            .collect_vec();
        let mut env: HashMap<Sym, i64> = syms.iter().map(|s| (*s, 0)).collect();
        if syms.is_empty() {
            return self.holds(&env).then_some(env);
        }
        syms.iter()
            .map(|_| candidates.iter().copied())
            .multi_cartesian_product()
            .find(|values| {
                for (s, v) in syms.iter().zip(values) {
                    env.insert(*s, *v);
                }
                self.holds(&env)
            })
            .map(|values| syms.iter().copied().zip(values).collect())
    }

    /// `Some(true)` if every disjunct of the assertions is infeasible over the
    /// integers.
    fn refute(&self) -> Option<bool> {
        let mut clauses: Vec<Vec<Ineq>> = vec![vec![]];
        for t in &self.assertions {
            let dnf = to_dnf(t, true)?;
            clauses = clauses
                .iter()
                .cartesian_product(dnf.iter())
                .map(|(c, d)| c.iter().chain(d.iter()).cloned().collect())
                .collect();
            if clauses.len() > MAX_INEQUALITIES {
                return None;
            }
        }
        for clause in clauses {
            if !fourier_motzkin_infeasible(clause)? {
                return Some(false);
            }
        }
        Some(true)
    }
}

/// `linear <= 0`.
type Ineq = Linear;

fn le(l: &Term, r: &Term, offset: i64) -> Option<Ineq> {
    // l - r + offset <= 0
    Linear::from_term(l)
        .add_scaled(&Linear::from_term(r), -1)?
        .add_scaled(&Linear::constant(offset), 1)
}

/// Disjunctive normal form of `term != 0` (when `positive`) or `term == 0`.
/// `None` when the form grows too large.
fn to_dnf(term: &Term, positive: bool) -> Option<Vec<Vec<Ineq>>> {
    if let Term::Lit(v) = term {
        let holds = (*v != 0) == positive;
        return Some(if holds { vec![vec![]] } else { vec![] });
    }
    if let Term::Bin(op, l, r) = term {
        let negated = |op: Op| match op {
            Op::Gt => Op::Le,
            Op::Ge => Op::Lt,
            Op::Lt => Op::Ge,
            Op::Le => Op::Gt,
            other => other,
        };
        let op = if positive { *op } else { negated(*op) };
        return match op {
            Op::Lt => Some(vec![vec![le(l, r, 1)?]]),
            Op::Le => Some(vec![vec![le(l, r, 0)?]]),
            Op::Gt => Some(vec![vec![le(r, l, 1)?]]),
            Op::Ge => Some(vec![vec![le(r, l, 0)?]]),
            Op::Eq if positive => Some(vec![vec![le(l, r, 0)?, le(r, l, 0)?]]),
            Op::Eq => Some(vec![vec![le(l, r, 1)?], vec![le(r, l, 1)?]]),
            Op::And if is_bool(l) && is_bool(r) => {
                let (dl, dr) = (to_dnf(l, positive)?, to_dnf(r, positive)?);
                Some(if positive { conjoin(dl, dr)? } else { disjoin(dl, dr) })
            }
            Op::Or if is_bool(l) && is_bool(r) => {
                let (dl, dr) = (to_dnf(l, positive)?, to_dnf(r, positive)?);
                Some(if positive { disjoin(dl, dr) } else { conjoin(dl, dr)? })
            }
            _ => nonzero(term, positive),
        };
    }
    nonzero(term, positive)
}

/// Whether `term` always evaluates to 0 or 1.
fn is_bool(term: &Term) -> bool {
    match term {
        Term::Bin(Op::And | Op::Or, l, r) => is_bool(l) && is_bool(r),
        Term::Bin(op, ..) => op.is_relational(),
        Term::Lit(v) => *v == 0 || *v == 1,
        Term::Sym(_) => false,
    }
}

/// `term != 0` is `term >= 1 || term <= -1`.
fn nonzero(term: &Term, positive: bool) -> Option<Vec<Vec<Ineq>>> {
    let zero = Term::Lit(0);
    if positive {
        Some(vec![vec![le(&zero, term, 1)?], vec![le(term, &zero, 1)?]])
    } else {
        Some(vec![vec![le(term, &zero, 0)?, le(&zero, term, 0)?]])
    }
}

fn conjoin(l: Vec<Vec<Ineq>>, r: Vec<Vec<Ineq>>) -> Option<Vec<Vec<Ineq>>> {
    if l.len() * r.len() > MAX_INEQUALITIES {
        return None;
    }
    Some(
        l.iter()
            .cartesian_product(r.iter())
            .map(|(a, b)| a.iter().chain(b.iter()).cloned().collect())
            .collect(),
    )
}

fn disjoin(mut l: Vec<Vec<Ineq>>, r: Vec<Vec<Ineq>>) -> Vec<Vec<Ineq>> {
    l.extend(r);
    l
}

/// Divide by the gcd of the coefficients, rounding the bound towards the
/// feasible side. Returns `None` for a trivially infeasible inequality.
fn tighten(mut ineq: Ineq) -> Option<Ineq> {
    let g = ineq
        .coeffs
        .values()
        .fold(0, |g, c| gcd(g, c.unsigned_abs())) as i64;
    if g == 0 {
        return if ineq.constant > 0 { None } else { Some(ineq) };
    }
    if g > 1 {
        for c in ineq.coeffs.values_mut() {
            *c /= g;
        }
        // sum(c x) <= -k  ==>  sum(c/g x) <= floor(-k / g)
        ineq.constant = -(-ineq.constant).div_euclid(g);
    }
    Some(ineq)
}

/// Some(true) iff the conjunction has no integer solution according to
/// Fourier-Motzkin elimination with tightening. `None` if elimination
/// blows up.
fn fourier_motzkin_infeasible(ineqs: Vec<Ineq>) -> Option<bool> {
    let mut system = vec![];
    for ineq in ineqs {
        match tighten(ineq) {
            Some(ineq) => system.push(ineq),
            None => return Some(true),
        }
    }
    loop {
        let Some(var) = system.iter().flat_map(|i| i.coeffs.keys()).next().cloned()
        else {
            return Some(false);
        };
        let mut pos = vec![];
        let mut neg = vec![];
        let mut rest = vec![];
        for ineq in system {
            match ineq.coeffs.get(&var).copied() {
                Some(c) if c > 0 => pos.push((c, ineq)),
                Some(c) => neg.push((c, ineq)),
                None => rest.push(ineq),
            }
        }
        for ((cp, p), (cn, n)) in pos.iter().cartesian_product(neg.iter()) {
            // cp > 0, cn < 0: (-cn) * p + cp * n eliminates var
            let combined = p.scale(-cn)?.add_scaled(n, *cp)?;
            match tighten(combined) {
                Some(ineq) => rest.push(ineq),
                None => return Some(true),
            }
        }
        if rest.len() > MAX_INEQUALITIES {
            return None;
        }
        system = rest.into_iter().unique_by(canonical_key).collect();
    }
}

fn canonical_key(ineq: &Ineq) -> (BTreeMap<Term, i64>, i64) {
    (ineq.coeffs.clone(), ineq.constant)
}

/// Largest `g` dividing every value. Returns 0 when every value is 0.
pub fn max_common_divisor(values: &[i64]) -> i64 {
    let g = values.iter().fold(0, |g, v| gcd(g, v.unsigned_abs()));
    i64::try_from(g).unwrap_or(i64::MAX)
}
