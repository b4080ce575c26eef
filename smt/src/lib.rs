//! SMT layer for the topt translation validator.
//!
//! Everything above this crate manipulates two opaque handles: [`Term`], a
//! purely functional boolean/bit-vector term, and [`Solver`], an assertion
//! context with scoped push/pop and batch goal dispatch. The z3 types never
//! leak out of this crate; sharing and lifetime of the underlying AST nodes
//! are the backend's concern.

pub mod expr;
pub mod solver;

pub use expr::Term;
pub use solver::{
    queries_enabled, set_queries_enabled, solver_init, Answer, Model, QueriesGuard, Solver,
    SolverPush, SolverResult,
};
