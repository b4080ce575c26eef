//! Precondition predicates.
//!
//! `Pre:` lines parse into a small boolean tree over comparisons. The SMT
//! form is a black-box boolean symbol per comparison (declared shape only);
//! real comparison lowering is future work, so preconditions are carried
//! and printed but do not yet constrain the refinement queries.

use topt_smt::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    ULt,
    ULe,
    UGt,
    UGe,
    SLt,
    SLe,
    SGt,
    SGe,
}

impl CmpOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::ULt => "u<",
            Self::ULe => "u<=",
            Self::UGt => "u>",
            Self::UGe => "u>=",
            Self::SLt => "<",
            Self::SLe => "<=",
            Self::SGt => ">",
            Self::SGe => ">=",
        }
    }

    /// Parse a comparison operator from its surface spelling.
    #[allow(clippy::should_implement_trait)] // returns Option, not Result
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "u<" => Some(Self::ULt),
            "u<=" => Some(Self::ULe),
            "u>" => Some(Self::UGt),
            "u>=" => Some(Self::UGe),
            "<" => Some(Self::SLt),
            "<=" => Some(Self::SLe),
            ">" => Some(Self::SGt),
            ">=" => Some(Self::SGe),
            _ => None,
        }
    }
}

/// A comparison between two operands, by surface name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmpPred {
    pub lhs: String,
    pub op: CmpOp,
    pub rhs: String,
}

impl CmpPred {
    #[must_use]
    pub fn to_smt(&self) -> Term {
        Term::mk_bool_var(&format!("pred!{} {} {}", self.lhs, self.op.as_str(), self.rhs))
    }
}

impl std::fmt::Display for CmpPred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op.as_str(), self.rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// A precondition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
    Cmp(CmpPred),
    Bool {
        op: BoolOp,
        lhs: Box<Pred>,
        rhs: Box<Pred>,
    },
}

impl Pred {
    #[must_use]
    pub fn to_smt(&self) -> Term {
        match self {
            Self::Cmp(c) => c.to_smt(),
            Self::Bool { op, lhs, rhs } => {
                let a = lhs.to_smt();
                let b = rhs.to_smt();
                match op {
                    BoolOp::And => a.and(&b),
                    BoolOp::Or => a.or(&b),
                }
            }
        }
    }
}

impl std::fmt::Display for Pred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cmp(c) => write!(f, "{c}"),
            Self::Bool { op, lhs, rhs } => {
                let sym = match op {
                    BoolOp::And => "&&",
                    BoolOp::Or => "||",
                };
                write!(f, "({lhs}) {sym} ({rhs})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topt_smt::{Solver, SolverResult};

    fn cmp(lhs: &str, op: CmpOp, rhs: &str) -> Pred {
        Pred::Cmp(CmpPred {
            lhs: lhs.to_string(),
            op,
            rhs: rhs.to_string(),
        })
    }

    #[test]
    fn test_display() {
        let p = Pred::Bool {
            op: BoolOp::And,
            lhs: Box::new(cmp("%a", CmpOp::SGt, "0")),
            rhs: Box::new(cmp("%a", CmpOp::ULt, "8")),
        };
        assert_eq!(p.to_string(), "(%a > 0) && (%a u< 8)");
    }

    #[test]
    fn test_cmp_op_round_trip() {
        for op in [
            CmpOp::Eq,
            CmpOp::Ne,
            CmpOp::ULt,
            CmpOp::ULe,
            CmpOp::UGt,
            CmpOp::UGe,
            CmpOp::SLt,
            CmpOp::SLe,
            CmpOp::SGt,
            CmpOp::SGe,
        ] {
            assert_eq!(CmpOp::from_str(op.as_str()), Some(op));
        }
        assert_eq!(CmpOp::from_str("<>"), None);
    }

    #[test]
    fn test_same_shape_same_symbol() {
        let a = cmp("%a", CmpOp::Eq, "1").to_smt();
        let b = cmp("%a", CmpOp::Eq, "1").to_smt();
        // identical declared shapes name the same black-box symbol
        let mut s = Solver::new();
        s.add(&a.ne(&b));
        assert!(matches!(s.check(), SolverResult::Unsat));
    }

    #[test]
    fn test_bool_combines() {
        let p = Pred::Bool {
            op: BoolOp::Or,
            lhs: Box::new(cmp("%a", CmpOp::Eq, "1")),
            rhs: Box::new(cmp("%a", CmpOp::Ne, "1")),
        };
        let t = p.to_smt();
        assert!(t.is_bool());
        // both arms are independent black boxes, so the disjunction is
        // satisfiable but not valid
        let mut s = Solver::new();
        s.add(&t);
        assert!(s.check().is_sat());
        let mut s = Solver::new();
        s.add(&t.not());
        assert!(s.check().is_sat());
    }
}
