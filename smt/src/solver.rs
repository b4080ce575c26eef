//! Solver facade: assertion stack, scoped push/pop, model handling, and
//! batch dispatch of refinement goals.

use crate::Term;
use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use z3::SatResult;

thread_local! {
    // Verification is single-threaded; the switch follows the solver's
    // thread-bound context.
    static QUERIES_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether `check` is allowed to reach the backend at all.
pub fn queries_enabled() -> bool {
    QUERIES_ENABLED.with(Cell::get)
}

/// Flip the query switch; returns the previous value.
pub fn set_queries_enabled(on: bool) -> bool {
    QUERIES_ENABLED.with(|c| c.replace(on))
}

/// Scoped override of the global query switch, restored on drop.
pub struct QueriesGuard {
    prev: bool,
}

impl QueriesGuard {
    #[must_use]
    pub fn enable() -> Self {
        Self {
            prev: set_queries_enabled(true),
        }
    }

    #[must_use]
    pub fn disable() -> Self {
        Self {
            prev: set_queries_enabled(false),
        }
    }
}

impl Drop for QueriesGuard {
    fn drop(&mut self) {
        set_queries_enabled(self.prev);
    }
}

/// Process-wide solver configuration. Call once before the first query.
pub fn solver_init(query_timeout_ms: u32) {
    z3::set_global_param("timeout", &query_timeout_ms.to_string());
}

/// A satisfying assignment, owned by the [`SolverResult`] it came from.
pub struct Model {
    m: z3::Model,
}

impl Model {
    fn new(m: z3::Model) -> Self {
        Self { m }
    }

    /// Evaluate a term under the model. With `completion`, unconstrained
    /// symbols are defaulted rather than left symbolic.
    #[must_use]
    pub fn eval(&self, t: &Term, completion: bool) -> Option<Term> {
        self.m
            .eval(t.dynamic(), completion)
            .map(Term::from_dynamic)
    }

    /// Numeric value of a bit-vector term, zero-extended.
    #[must_use]
    pub fn get_uint(&self, t: &Term) -> u64 {
        self.eval(t, true)
            .and_then(|v| v.as_bv().as_u64())
            .expect("model evaluation of a bit-vector term")
    }

    /// Numeric value of a bit-vector term, sign-extended.
    #[must_use]
    pub fn get_int(&self, t: &Term) -> i64 {
        self.eval(t, true)
            .and_then(|v| v.as_bv().as_i64())
            .expect("model evaluation of a bit-vector term")
    }

    /// All constant bindings `(symbol, value)` of the model.
    #[must_use]
    pub fn assignments(&self) -> Vec<(Term, Term)> {
        let mut out = Vec::new();
        for decl in self.m.iter() {
            if decl.arity() != 0 {
                continue;
            }
            let var = decl.apply(&[]);
            if let Some(val) = self.m.eval(&var, true) {
                out.push((Term::from_dynamic(var), Term::from_dynamic(val)));
            }
        }
        out
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.m)
    }
}

/// Outcome of a single `check`.
pub enum SolverResult {
    Unsat,
    Sat(Model),
    /// The query was not dispatched (queries disabled).
    Invalid,
    /// Timeout or interrupt; not a verification verdict.
    Unknown,
}

impl SolverResult {
    #[must_use]
    pub fn is_sat(&self) -> bool {
        matches!(self, Self::Sat(_))
    }

    #[must_use]
    pub fn is_unsat(&self) -> bool {
        matches!(self, Self::Unsat)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The countermodel of a `Sat` result.
    ///
    /// # Panics
    /// Panics on any other variant; callers must test `is_sat` first.
    #[must_use]
    pub fn model(&self) -> &Model {
        match self {
            Self::Sat(m) => m,
            _ => panic!("model() on a non-Sat solver result"),
        }
    }
}

/// Model-free summary of a batch query outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Unsat,
    Sat,
    Invalid,
    Unknown,
}

/// An assertion context over the backend solver.
pub struct Solver {
    s: z3::Solver,
}

impl Solver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            s: z3::Solver::new(),
        }
    }

    pub fn add(&mut self, t: &Term) {
        self.s.assert(&t.as_bool());
    }

    /// Open a scope. The returned guard pops it on every exit path.
    pub fn push(&mut self) -> SolverPush<'_> {
        self.s.push();
        SolverPush { solver: self }
    }

    pub fn reset(&mut self) {
        self.s.reset();
    }

    /// Assert the negation of the model's constant assignments, so the next
    /// `check` produces a different model. Used to enumerate typings.
    pub fn block(&mut self, m: &Model) {
        let diffs: Vec<Term> = m
            .assignments()
            .iter()
            .map(|(var, val)| var.ne(val))
            .collect();
        let blocked = Term::or_all(&diffs);
        self.add(&blocked);
    }

    pub fn check(&mut self) -> SolverResult {
        if !queries_enabled() {
            return SolverResult::Invalid;
        }
        match self.s.check() {
            SatResult::Unsat => SolverResult::Unsat,
            SatResult::Unknown => {
                tracing::debug!("solver returned unknown");
                SolverResult::Unknown
            }
            SatResult::Sat => match self.s.get_model() {
                Some(m) => SolverResult::Sat(Model::new(m)),
                None => SolverResult::Unknown,
            },
        }
    }

    /// Dispatch a batch of goals, each in a fresh scope. For every
    /// satisfiable goal the callback receives the goal index and its
    /// countermodel; the per-goal answers are returned so the caller can
    /// decide whether to escalate `Unknown`s.
    pub fn check_all<F>(&mut self, goals: &[Term], mut on_counterexample: F) -> Vec<Answer>
    where
        F: FnMut(usize, &Model),
    {
        let mut answers = Vec::with_capacity(goals.len());
        for (i, goal) in goals.iter().enumerate() {
            let mut scope = self.push();
            scope.add(goal);
            let answer = match scope.check() {
                SolverResult::Sat(m) => {
                    on_counterexample(i, &m);
                    Answer::Sat
                }
                SolverResult::Unsat => Answer::Unsat,
                SolverResult::Invalid => Answer::Invalid,
                SolverResult::Unknown => Answer::Unknown,
            };
            answers.push(answer);
        }
        answers
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`Solver::push`]; pops the scope when dropped.
pub struct SolverPush<'a> {
    solver: &'a mut Solver,
}

impl Deref for SolverPush<'_> {
    type Target = Solver;

    fn deref(&self) -> &Solver {
        self.solver
    }
}

impl DerefMut for SolverPush<'_> {
    fn deref_mut(&mut self) -> &mut Solver {
        self.solver
    }
}

impl Drop for SolverPush<'_> {
    fn drop(&mut self) {
        self.solver.s.pop(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sat_unsat() {
        let mut s = Solver::new();
        let a = Term::mk_bool_var("a");
        s.add(&a);
        assert!(s.check().is_sat());
        s.add(&a.not());
        assert!(s.check().is_unsat());
        s.reset();
        assert!(s.check().is_sat());
    }

    #[test]
    fn test_push_pop_guard_restores() {
        let mut s = Solver::new();
        s.add(&Term::mk_bool_var("p"));
        {
            let mut scope = s.push();
            scope.add(&Term::mk_bool(false));
            assert!(scope.check().is_unsat());
        }
        assert!(s.check().is_sat());
    }

    #[test]
    fn test_model_get_uint() {
        let mut s = Solver::new();
        let x = Term::mk_var("x", 8);
        s.add(&x.eq(&Term::mk_uint(42, 8)));
        let r = s.check();
        assert!(r.is_sat());
        assert_eq!(r.model().get_uint(&x), 42);
    }

    #[test]
    fn test_model_get_int_signed() {
        let mut s = Solver::new();
        let x = Term::mk_var("x", 8);
        s.add(&x.eq(&Term::mk_int(-1, 8)));
        let r = s.check();
        assert!(r.is_sat());
        assert_eq!(r.model().get_int(&x), -1);
        assert_eq!(r.model().get_uint(&x), 0xff);
    }

    #[test]
    fn test_block_enumerates_models() {
        let mut s = Solver::new();
        let b = Term::mk_var("b", 1);
        s.add(&b.eq(&b)); // mention b so it appears in the model
        let mut seen = Vec::new();
        loop {
            match s.check() {
                SolverResult::Sat(m) => {
                    seen.push(m.get_uint(&b));
                    s.block(&m);
                }
                SolverResult::Unsat => break,
                _ => panic!("unexpected solver outcome"),
            }
            assert!(seen.len() <= 2, "1-bit variable admits two models");
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_check_all_reports_countermodels() {
        let mut s = Solver::new();
        let x = Term::mk_var("cx", 8);
        let sat_goal = x.eq(&Term::mk_uint(7, 8));
        let unsat_goal = x.ne(&x);
        let mut hits = Vec::new();
        let answers = s.check_all(&[sat_goal, unsat_goal], |i, m| {
            hits.push((i, m.get_uint(&x)));
        });
        assert_eq!(answers, vec![Answer::Sat, Answer::Unsat]);
        assert_eq!(hits, vec![(0, 7)]);
        // the batch left no assertions behind
        assert!(s.check().is_sat());
    }

    #[test]
    fn test_queries_guard() {
        let mut s = Solver::new();
        s.add(&Term::mk_bool(true));
        {
            let _off = QueriesGuard::disable();
            assert!(s.check().is_invalid());
            {
                let _on = QueriesGuard::enable();
                assert!(s.check().is_sat());
            }
            assert!(s.check().is_invalid());
        }
        assert!(s.check().is_sat());
    }
}
