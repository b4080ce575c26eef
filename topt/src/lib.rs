//! topt — translation validation for a small SSA IR.
//!
//! A [`transform::Transform`] pairs a source function with a target
//! function. Verification first solves the joint typing constraints, then
//! symbolically executes both sides, and finally dispatches three
//! quantified refinement queries: the target must be defined wherever the
//! source is, no more poisonous, and equal in value. Failures are collated
//! as human-readable [`errors::Errors`].

pub mod config;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod transform;

pub use config::{PrintOpts, VerifyOpts};
pub use errors::Errors;
pub use parser::{parse, ParseError};
pub use transform::{Transform, TypingAssignments};
