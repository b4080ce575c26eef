//! The refinement checker and verification driver.
//!
//! A transform pairs a source and a target function. Verification solves
//! the joint typing constraints, enumerates satisfying typing models, and
//! for each one symbolically executes both sides and dispatches the three
//! refinement queries:
//!
//! 1. `∀Q. dom_src ∧ ¬dom_tgt` — the source is defined where the target is
//!    not;
//! 2. `∀Q. dom_src ∧ np_src ∧ ¬np_tgt` — the target is more poisonous;
//! 3. `∀Q. dom_src ∧ np_src ∧ val_src ≠ val_tgt` — the values differ.
//!
//! Each later query presumes the previous condition holds, which narrows
//! the countermodel space and keeps the diagnostics precise. Failures are
//! diagnosed by presence of a countermodel.

use crate::config::{PrintOpts, VerifyOpts};
use crate::errors::Errors;
use std::collections::HashMap;
use topt_ir::{reset_undef_ids, sym_exec, Function, Pred, State, StateValue, ValueRef};
use topt_smt::{Answer, Model, QueriesGuard, Solver, SolverResult, Term};

/// A named rewrite: source function, target function, and an optional
/// precondition.
pub struct Transform {
    pub name: String,
    pub pre: Option<Pred>,
    pub src: Function,
    pub tgt: Function,
}

/// Enumerator over satisfying typing models of a constraint formula.
/// Advancing blocks the previous model and re-checks.
pub struct TypingAssignments {
    solver: Solver,
    result: SolverResult,
}

impl TypingAssignments {
    fn new(constraints: &Term) -> Self {
        let _queries = QueriesGuard::enable();
        let mut solver = Solver::new();
        solver.add(constraints);
        let result = solver.check();
        Self { solver, result }
    }

    #[must_use]
    pub fn has_model(&self) -> bool {
        self.result.is_sat()
    }

    /// The current typing model.
    ///
    /// # Panics
    /// Panics when `has_model` is false.
    #[must_use]
    pub fn model(&self) -> &Model {
        self.result.model()
    }

    /// Exclude the current model and move to the next one.
    pub fn advance(&mut self) {
        let _queries = QueriesGuard::enable();
        self.solver.block(self.result.model());
        self.result = self.solver.check();
    }
}

impl Transform {
    /// Joint typing models of source and target.
    #[must_use]
    pub fn typings(&self) -> TypingAssignments {
        let constraints = self
            .src
            .get_type_constraints()
            .and(&self.tgt.get_type_constraints());
        TypingAssignments::new(&constraints)
    }

    /// Fix concrete types on both sides from the current typing model.
    pub fn fixup_types(&mut self, typings: &TypingAssignments) {
        self.src.fixup_types(typings.model());
        self.tgt.fixup_types(typings.model());
    }

    /// Decide whether the target refines the source.
    pub fn verify(&mut self, opts: &VerifyOpts) -> Errors {
        let mut errs = Errors::new();
        reset_undef_ids();

        let mut typings = self.typings();
        if !typings.has_model() {
            errs.add("Doesn't type check");
            return errs;
        }

        let mut solver = Solver::new();
        let mut n_typings = 0u32;
        loop {
            n_typings += 1;
            tracing::debug!(transform = %self.name, n_typings, "checking typing assignment");
            self.fixup_types(&typings);

            let src_state = sym_exec(&self.src);
            let tgt_state = sym_exec(&self.tgt);
            check_states(&mut solver, &mut errs, opts, &src_state, &tgt_state);

            if opts.single_typing {
                break;
            }
            typings.advance();
            if !typings.has_model() {
                break;
            }
        }
        errs
    }

    #[must_use]
    pub fn display(&self, opts: PrintOpts) -> TransformDisplay<'_> {
        TransformDisplay { t: self, opts }
    }
}

/// A transform rendered for the diagnostic stream.
pub struct TransformDisplay<'a> {
    t: &'a Transform,
    opts: PrintOpts,
}

impl std::fmt::Display for TransformDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n----------------------------------------")?;
        if !self.t.name.is_empty() {
            writeln!(f, "Name: {}", self.t.name)?;
        }
        if let Some(pre) = &self.t.pre {
            writeln!(f, "Pre: {pre}")?;
        }
        self.t.src.print(f, self.opts.print_fn_header)?;
        writeln!(f, "=>")?;
        self.t.tgt.print(f, self.opts.print_fn_header)
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.display(PrintOpts::default()), f)
    }
}

fn check_states(
    solver: &mut Solver,
    errs: &mut Errors,
    opts: &VerifyOpts,
    src_state: &State<'_>,
    tgt_state: &State<'_>,
) {
    if opts.check_each_var {
        check_each_var(solver, errs, opts, src_state, tgt_state);
    }

    match (src_state.fn_returned(), tgt_state.fn_returned()) {
        (true, false) => {
            // the target's return domain is vacuously false
            errs.add("Source is more defined than target");
        }
        (false, true) => {
            // nothing to compare against; flagged rather than accepted
            errs.add("Target returns but source doesn't");
        }
        (false, false) => {}
        (true, true) => {
            let mut qvars = src_state.quant_vars().to_vec();
            qvars.extend_from_slice(tgt_state.quant_vars());
            check_refinement(
                solver,
                errs,
                opts,
                &qvars,
                &src_state.return_domain(),
                &src_state.return_val(),
                &tgt_state.return_domain(),
                &tgt_state.return_val(),
            );
        }
    }
}

/// Refine every named source instruction against the same-named target
/// instruction, with both domains `true`. Intermediate values are defined
/// by construction on straight-line code; this does not account for UB of
/// preceding instructions.
fn check_each_var(
    solver: &mut Solver,
    errs: &mut Errors,
    opts: &VerifyOpts,
    src_state: &State<'_>,
    tgt_state: &State<'_>,
) {
    let tgt_f = tgt_state.function();
    let tgt_by_name: HashMap<&str, ValueRef> = tgt_f
        .instrs()
        .map(|r| (tgt_f.value(r).name.as_str(), r))
        .collect();

    let src_f = src_state.function();
    for (r, entry) in src_state.values() {
        let v = src_f.value(r);
        if !v.name.starts_with('%') || !v.is_instr() {
            continue;
        }
        let Some(&tgt_ref) = tgt_by_name.get(v.name.as_str()) else {
            continue;
        };
        tracing::debug!(value = %v.name, "per-value refinement");
        let tgt_entry = tgt_state.at(tgt_ref);
        let mut qvars = entry.quant_vars.clone();
        qvars.extend_from_slice(tgt_state.quant_vars());
        let always = Term::mk_bool(true);
        check_refinement(
            solver,
            errs,
            opts,
            &qvars,
            &always,
            &entry.val,
            &always,
            &tgt_entry.val,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn check_refinement(
    solver: &mut Solver,
    errs: &mut Errors,
    opts: &VerifyOpts,
    qvars: &[Term],
    dom_a: &Term,
    a: &StateValue,
    dom_b: &Term,
    b: &StateValue,
) {
    let mut messages = vec![
        "Source is more defined than target",
        "Target is more poisonous than source",
    ];
    let mut goals = vec![
        Term::mk_forall(qvars, &dom_a.not_implies(dom_b)),
        Term::mk_forall(
            qvars,
            &dom_a.and(&a.non_poison.not_implies(&b.non_poison)),
        ),
    ];
    if a.bits() == b.bits() {
        messages.push("Value mismatch");
        goals.push(Term::mk_forall(
            qvars,
            &dom_a.and(&a.non_poison).and(&a.value.ne(&b.value)),
        ));
    } else {
        // differently-sized values cannot agree; there is no cross-program
        // constraint tying the two return types together
        tracing::warn!(src_bits = a.bits(), tgt_bits = b.bits(), "return widths differ");
        errs.add("Value mismatch");
    }

    let answers = solver.check_all(&goals, |i, model| {
        tracing::debug!(goal = messages[i], counterexample = %model, "refinement countermodel");
        errs.add(messages[i]);
    });

    for answer in answers {
        if answer == Answer::Unknown {
            tracing::info!("refinement undecided");
            if opts.fail_on_unknown {
                errs.add("refinement undecided");
            }
        }
    }
}
