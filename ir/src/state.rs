//! Symbolic execution of one function.
//!
//! Instructions are visited in block-declaration order; every value gets a
//! [`StateValue`] exactly once. The state tracks the path domain, the
//! undefined-behavior accumulator, and the free symbols that must be
//! universally quantified in refinement queries.

use crate::function::Function;
use crate::state_value::StateValue;
use crate::value::{ConstOp, ConstantKind, Flags, Instr, Op, ValueKind, ValueRef};
use std::sync::atomic::{AtomicU64, Ordering};
use topt_smt::Term;

static UNDEF_IDS: AtomicU64 = AtomicU64::new(0);

/// Reset the undef-symbol counter. Called once per verification so symbol
/// names stay stable across runs.
pub fn reset_undef_ids() {
    UNDEF_IDS.store(0, Ordering::Relaxed);
}

fn fresh_undef_name() -> String {
    format!("undef_{}", UNDEF_IDS.fetch_add(1, Ordering::Relaxed))
}

/// A value's computed valuation plus the quantified symbols live at its
/// definition (used by per-value refinement).
#[derive(Debug, Clone)]
pub struct EnvEntry {
    pub val: StateValue,
    pub quant_vars: Vec<Term>,
}

/// Execution state for one function.
pub struct State<'f> {
    f: &'f Function,
    domain: Term,
    ub: Term,
    env: Vec<Option<EnvEntry>>,
    quant_vars: Vec<Term>,
    /// `(domain ∧ ub, value)` snapshots collected at each return.
    returns: Vec<(Term, StateValue)>,
}

impl<'f> State<'f> {
    fn new(f: &'f Function) -> Self {
        Self {
            f,
            domain: Term::mk_bool(true),
            ub: Term::mk_bool(true),
            env: vec![None; f.num_values()],
            quant_vars: Vec::new(),
            returns: Vec::new(),
        }
    }

    #[must_use]
    pub fn function(&self) -> &'f Function {
        self.f
    }

    #[must_use]
    pub fn domain(&self) -> &Term {
        &self.domain
    }

    /// The accumulated "no undefined behavior so far" predicate.
    #[must_use]
    pub fn ub(&self) -> &Term {
        &self.ub
    }

    #[must_use]
    pub fn quant_vars(&self) -> &[Term] {
        &self.quant_vars
    }

    /// The valuation of a value computed during execution.
    ///
    /// # Panics
    /// Panics when the value was never reached; that is a verifier bug.
    #[must_use]
    pub fn at(&self, r: ValueRef) -> &EnvEntry {
        self.env[r.index()]
            .as_ref()
            .expect("value has no valuation")
    }

    /// All computed valuations, in arena order.
    pub fn values(&self) -> impl Iterator<Item = (ValueRef, &EnvEntry)> {
        self.env
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (ValueRef(i), e)))
    }

    #[must_use]
    pub fn fn_returned(&self) -> bool {
        !self.returns.is_empty()
    }

    /// Disjunction of the domains collected at each return; `false` when
    /// the function never returns.
    #[must_use]
    pub fn return_domain(&self) -> Term {
        let doms: Vec<Term> = self.returns.iter().map(|(d, _)| d.clone()).collect();
        Term::or_all(&doms)
    }

    /// ITE chain selecting the valuation of the first satisfied return.
    ///
    /// # Panics
    /// Panics when the function never returns.
    #[must_use]
    pub fn return_val(&self) -> StateValue {
        let mut rev = self.returns.iter().rev();
        let (_, last) = rev.next().expect("return value of a non-returning function");
        let mut acc = last.clone();
        for (dom, val) in rev {
            acc = StateValue::mk_if(dom, val, &acc);
        }
        acc
    }

    /// Conjoin a "no UB here" condition, guarded by the current domain:
    /// dead code contributes nothing.
    fn add_ub(&mut self, e: Term) {
        self.ub = self.ub.and(&self.domain.implies(&e));
    }

    fn store(&mut self, r: ValueRef, val: StateValue) {
        debug_assert!(self.env[r.index()].is_none(), "valuation stored twice");
        self.env[r.index()] = Some(EnvEntry {
            val,
            quant_vars: self.quant_vars.clone(),
        });
    }

    /// Valuation of an operand; inputs, constants, and undef are
    /// materialized on first use, instructions must already have executed.
    fn operand(&mut self, r: ValueRef) -> StateValue {
        if let Some(e) = &self.env[r.index()] {
            return e.val.clone();
        }
        let v = self.f.value(r);
        let sv = match &v.kind {
            ValueKind::Input => StateValue::new(
                Term::mk_var(&v.name, v.ty.bits()),
                Term::mk_bool(true),
            ),
            ValueKind::Constant(_) => {
                let (val, ub) = self.const_to_smt(r);
                self.add_ub(ub);
                StateValue::new(val, Term::mk_bool(true))
            }
            ValueKind::Undef => {
                let var = Term::mk_var(&fresh_undef_name(), v.ty.bits());
                self.quant_vars.push(var.clone());
                StateValue::new(var, Term::mk_bool(true))
            }
            ValueKind::Instr(_) => panic!("instruction {} used before definition", v.name),
        };
        self.store(r, sv.clone());
        sv
    }

    /// `(value, ub)` of a constant expression. A constant is never poison;
    /// its UB is the conjunction of its operands' UB plus operator
    /// conditions.
    fn const_to_smt(&mut self, r: ValueRef) -> (Term, Term) {
        let v = self.f.value(r);
        let ValueKind::Constant(kind) = &v.kind else {
            panic!("constant lowering of a non-constant {}", v.name)
        };
        match kind {
            ConstantKind::Int(n) => (Term::mk_uint(*n, v.ty.bits()), Term::mk_bool(true)),
            ConstantKind::Named => (
                Term::mk_var(&v.name, v.ty.bits()),
                Term::mk_bool(true),
            ),
            ConstantKind::BinOp { op, a, b } => {
                let (op, a, b) = (*op, *a, *b);
                let (av, aub) = self.const_to_smt(a);
                let (bv, bub) = self.const_to_smt(b);
                let mut ub = aub.and(&bub);
                let val = match op {
                    ConstOp::Add => av.add(&bv),
                    ConstOp::Sub => av.sub(&bv),
                    ConstOp::SDiv => {
                        ub = ub.and(&div_ub(&av, &bv, true));
                        av.sdiv(&bv)
                    }
                    ConstOp::UDiv => {
                        ub = ub.and(&div_ub(&av, &bv, false));
                        av.udiv(&bv)
                    }
                };
                (val, ub)
            }
            ConstantKind::Fn { func, .. } => {
                // No lowering exists for these yet; reaching one makes the
                // path undefined.
                tracing::warn!(func = func.as_str(), "unlowered constant function");
                (Term::mk_var(&v.name, v.ty.bits()), Term::mk_bool(false))
            }
        }
    }

    fn exec_instr(&mut self, r: ValueRef) {
        let v = self.f.value(r);
        let ValueKind::Instr(instr) = &v.kind else {
            panic!("executing a non-instruction {}", v.name)
        };
        match instr.clone() {
            Instr::BinOp { op, flags, a, b } => {
                let a = self.operand(a);
                let b = self.operand(b);
                let (val, non_poison, ub) = binop_to_smt(op, flags, &a, &b);
                self.add_ub(ub);
                let sv = StateValue::new(val, non_poison);
                debug_assert_eq!(sv.bits(), v.ty.bits(), "ill-sorted {}", v.name);
                self.store(r, sv);
            }
            Instr::Return { val } => {
                let sv = self.operand(val);
                let dom = self.domain.and(&self.ub);
                self.returns.push((dom, sv));
                self.domain = Term::mk_bool(false);
            }
            Instr::Unreachable => {
                self.add_ub(Term::mk_bool(false));
                self.domain = Term::mk_bool(false);
            }
        }
    }
}

fn div_ub(a: &Term, b: &Term, signed: bool) -> Term {
    let bits = b.bits();
    let nonzero = b.ne(&Term::mk_uint(0, bits));
    if signed {
        // INT_MIN / -1 overflows
        nonzero.and(
            &a.ne(&Term::int_min(bits))
                .or(&b.ne(&Term::mk_int(-1, bits))),
        )
    } else {
        nonzero
    }
}

/// `(value, non_poison, ub)` of a binary operation over already-computed
/// operands of equal width.
fn binop_to_smt(op: Op, flags: Flags, a_sv: &StateValue, b_sv: &StateValue) -> (Term, Term, Term) {
    let a = &a_sv.value;
    let b = &b_sv.value;
    let w = a.bits();
    debug_assert_eq!(w, b.bits(), "operand width mismatch");

    let mut np = Vec::new();
    let mut ub = Term::mk_bool(true);
    let val = match op {
        Op::Add => {
            if flags.nsw {
                np.push(a.add_no_soverflow(b));
            }
            if flags.nuw {
                np.push(a.add_no_uoverflow(b));
            }
            a.add(b)
        }
        Op::Sub => {
            if flags.nsw {
                np.push(a.sub_no_soverflow(b));
            }
            if flags.nuw {
                np.push(a.sub_no_uoverflow(b));
            }
            a.sub(b)
        }
        Op::Mul => {
            if flags.nsw {
                np.push(a.mul_no_soverflow(b));
            }
            if flags.nuw {
                np.push(a.mul_no_uoverflow(b));
            }
            a.mul(b)
        }
        Op::SDiv => {
            ub = div_ub(a, b, true);
            let val = a.sdiv(b);
            if flags.exact {
                np.push(val.mul(b).eq(a));
            }
            val
        }
        Op::UDiv => {
            ub = div_ub(a, b, false);
            let val = a.udiv(b);
            if flags.exact {
                np.push(val.mul(b).eq(a));
            }
            val
        }
        Op::Shl => {
            ub = b.ult(&Term::mk_uint(u64::from(w), w));
            let val = a.shl(b);
            if flags.nsw {
                np.push(val.ashr(b).eq(a));
            }
            if flags.nuw {
                np.push(val.lshr(b).eq(a));
            }
            val
        }
        Op::LShr => {
            ub = b.ult(&Term::mk_uint(u64::from(w), w));
            let val = a.lshr(b);
            if flags.exact {
                np.push(val.shl(b).eq(a));
            }
            val
        }
        Op::AShr => {
            ub = b.ult(&Term::mk_uint(u64::from(w), w));
            let val = a.ashr(b);
            if flags.exact {
                np.push(val.shl(b).eq(a));
            }
            val
        }
    };

    let non_poison = a_sv
        .non_poison
        .and(&b_sv.non_poison)
        .and(&Term::and_all(&np));
    (val, non_poison, ub)
}

/// Execute a function against a fresh symbolic state.
pub fn sym_exec(f: &Function) -> State<'_> {
    tracing::debug!(function = f.name(), "symbolic execution");
    let mut state = State::new(f);
    for r in f.instrs() {
        state.exec_instr(r);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use crate::value::ConstFn;
    use topt_smt::{Solver, SolverResult};

    fn check(t: &Term) -> SolverResult {
        let mut s = Solver::new();
        s.add(t);
        s.check()
    }

    fn prove(p: &Term) {
        assert!(check(&p.not()).is_unsat(), "expected valid: {p}");
    }

    fn binop_fn(op: Op, flags: Flags, b_kind: Option<u64>) -> (Function, ValueRef) {
        let mut f = Function::new("src", Type::symbolic());
        let x = f.add_input("%x", Type::int(8));
        let b = match b_kind {
            Some(n) => f.add_constant(Type::int(8), ConstantKind::Int(n), n.to_string()),
            None => f.add_input("%y", Type::int(8)),
        };
        let r = f.add_instr(0, "%r", Type::int(8), Instr::BinOp { op, flags, a: x, b });
        f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: r });
        (f, r)
    }

    #[test]
    fn test_well_sorted_env() {
        let (f, r) = binop_fn(Op::Add, Flags::NONE, None);
        let st = sym_exec(&f);
        let entry = st.at(r);
        assert_eq!(entry.val.bits(), 8);
        assert!(entry.val.non_poison.is_bool());
        assert!(st.domain().is_bool());
        assert!(st.ub().is_bool());
    }

    #[test]
    fn test_plain_add_is_poison_free_and_ub_free() {
        let (f, r) = binop_fn(Op::Add, Flags::NONE, None);
        let st = sym_exec(&f);
        prove(&st.at(r).val.non_poison);
        prove(st.ub());
        assert!(st.fn_returned());
        prove(&st.return_domain());
    }

    #[test]
    fn test_udiv_by_zero_is_ub() {
        let (f, _) = binop_fn(Op::UDiv, Flags::NONE, Some(0));
        let st = sym_exec(&f);
        assert!(check(st.ub()).is_unsat());
        // the return domain inherits the UB
        assert!(check(&st.return_domain()).is_unsat());
    }

    #[test]
    fn test_udiv_nonzero_divisor_ok() {
        let (f, _) = binop_fn(Op::UDiv, Flags::NONE, Some(3));
        let st = sym_exec(&f);
        prove(st.ub());
    }

    #[test]
    fn test_sdiv_int_min_by_minus_one_is_ub() {
        let (f, _) = binop_fn(Op::SDiv, Flags::NONE, Some(0xff)); // -1 as i8
        let st = sym_exec(&f);
        let x = Term::mk_var("%x", 8);
        let at_min = st.ub().and(&x.eq(&Term::int_min(8)));
        assert!(check(&at_min).is_unsat());
        let elsewhere = st.ub().and(&x.eq(&Term::mk_uint(4, 8)));
        assert!(check(&elsewhere).is_sat());
    }

    #[test]
    fn test_oversized_shift_is_ub() {
        let (f, _) = binop_fn(Op::Shl, Flags::NONE, Some(8));
        let st = sym_exec(&f);
        assert!(check(st.ub()).is_unsat());
        let (f, _) = binop_fn(Op::Shl, Flags::NONE, Some(7));
        let st = sym_exec(&f);
        prove(st.ub());
    }

    #[test]
    fn test_add_nsw_poison_at_max() {
        let (f, r) = binop_fn(Op::Add, Flags::nsw(), Some(1));
        let st = sym_exec(&f);
        let np = &st.at(r).val.non_poison;
        let x = Term::mk_var("%x", 8);
        let at_max = np.and(&x.eq(&Term::mk_int(i64::from(i8::MAX), 8)));
        assert!(check(&at_max).is_unsat());
        let below = np.and(&x.eq(&Term::mk_uint(5, 8)));
        assert!(check(&below).is_sat());
        // without nsw the same addition is never poison
        let (f, r) = binop_fn(Op::Add, Flags::NONE, Some(1));
        let st = sym_exec(&f);
        prove(&st.at(r).val.non_poison);
    }

    #[test]
    fn test_exact_udiv_poison_on_remainder() {
        let (f, r) = binop_fn(Op::UDiv, Flags::exact(), Some(2));
        let st = sym_exec(&f);
        let np = &st.at(r).val.non_poison;
        let x = Term::mk_var("%x", 8);
        assert!(check(&np.and(&x.eq(&Term::mk_uint(3, 8)))).is_unsat());
        assert!(check(&np.and(&x.eq(&Term::mk_uint(4, 8)))).is_sat());
    }

    #[test]
    fn test_return_selects_first() {
        let mut f = Function::new("src", Type::symbolic());
        let a = f.add_constant(Type::int(8), ConstantKind::Int(1), "1");
        let b = f.add_constant(Type::int(8), ConstantKind::Int(2), "2");
        f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: a });
        f.add_instr(0, "ret#1", Type::int(8), Instr::Return { val: b });
        let st = sym_exec(&f);
        // the second return sits on a dead path; the first value wins
        prove(&st.return_val().value.eq(&Term::mk_uint(1, 8)));
        prove(&st.return_domain());
    }

    #[test]
    fn test_domain_monotonic_under_appended_unreachable() {
        let build = |with_tail: bool| {
            let mut f = Function::new("src", Type::symbolic());
            let c = f.add_constant(Type::int(8), ConstantKind::Int(0), "0");
            f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: c });
            if with_tail {
                f.add_instr(0, "unreachable#0", Type::Void, Instr::Unreachable);
            }
            f
        };
        let plain = build(false);
        let tailed = build(true);
        let d0 = sym_exec(&plain).return_domain();
        let d1 = sym_exec(&tailed).return_domain();
        prove(&d0.eq(&d1));
    }

    #[test]
    fn test_unreachable_alone_falsifies_everything() {
        let mut f = Function::new("tgt", Type::symbolic());
        f.add_instr(0, "unreachable#0", Type::Void, Instr::Unreachable);
        let st = sym_exec(&f);
        assert!(!st.fn_returned());
        assert!(check(st.ub()).is_unsat());
        assert!(check(&st.return_domain()).is_unsat());
    }

    #[test]
    fn test_undef_mints_quantified_symbols() {
        reset_undef_ids();
        let mut f = Function::new("src", Type::symbolic());
        let u = f.add_undef(Type::int(8));
        f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: u });
        let st1 = sym_exec(&f);
        let st2 = sym_exec(&f);
        assert_eq!(st1.quant_vars().len(), 1);
        assert_eq!(st2.quant_vars().len(), 1);
        // two executions mint distinct symbols
        let ne = st1.quant_vars()[0].ne(&st2.quant_vars()[0]);
        assert!(check(&ne).is_sat());
    }

    #[test]
    fn test_constant_binop_folds_with_ub() {
        let mut f = Function::new("src", Type::symbolic());
        let one = f.add_constant(Type::int(8), ConstantKind::Int(1), "1");
        let two = f.add_constant(Type::int(8), ConstantKind::Int(2), "2");
        let sum = f.add_constant(
            Type::int(8),
            ConstantKind::BinOp {
                op: ConstOp::Add,
                a: one,
                b: two,
            },
            "(1 + 2)",
        );
        f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: sum });
        let st = sym_exec(&f);
        prove(st.ub());
        prove(&st.return_val().value.eq(&Term::mk_uint(3, 8)));
    }

    #[test]
    fn test_constant_sdiv_by_zero_is_ub() {
        let mut f = Function::new("src", Type::symbolic());
        let one = f.add_constant(Type::int(8), ConstantKind::Int(1), "1");
        let zero = f.add_constant(Type::int(8), ConstantKind::Int(0), "0");
        let q = f.add_constant(
            Type::int(8),
            ConstantKind::BinOp {
                op: ConstOp::SDiv,
                a: one,
                b: zero,
            },
            "(1 / 0)",
        );
        f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: q });
        let st = sym_exec(&f);
        assert!(check(st.ub()).is_unsat());
    }

    #[test]
    fn test_constant_fn_is_ub_when_reached() {
        let mut f = Function::new("src", Type::symbolic());
        let x = f.add_constant(Type::int(8), ConstantKind::Named, "C");
        let l = f.add_constant(
            Type::int(8),
            ConstantKind::Fn {
                func: ConstFn::Log2,
                args: vec![x],
            },
            "log2(C)",
        );
        f.add_instr(0, "ret#0", Type::int(8), Instr::Return { val: l });
        let st = sym_exec(&f);
        assert!(check(st.ub()).is_unsat());
    }
}
