//! Typed IR for the topt translation validator.
//!
//! Functions own their values in an arena ([`function::Function`]);
//! cross-references between values are [`value::ValueRef`] indices, valid
//! for the function's lifetime (the value graph is SSA, hence acyclic).
//! Types may be partially unknown at construction and are fixed up from a
//! solver model ([`types`]). Symbolic execution ([`state`]) turns a function
//! into a per-value map of `(value, non_poison)` pairs plus a path domain
//! and an undefined-behavior accumulator.

pub mod function;
pub mod memory;
pub mod pred;
pub mod state;
pub mod state_value;
pub mod types;
pub mod value;

pub use function::{BasicBlock, Function};
pub use memory::{Memory, Pointer};
pub use pred::{BoolOp, CmpOp, CmpPred, Pred};
pub use state::{reset_undef_ids, sym_exec, EnvEntry, State};
pub use state_value::StateValue;
pub use types::{IntType, SymbolicType, Type, TypeCategory};
pub use value::{ConstFn, ConstOp, ConstantKind, Flags, Instr, Op, Value, ValueKind, ValueRef};
