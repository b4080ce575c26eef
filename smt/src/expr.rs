//! Opaque boolean/bit-vector terms.
//!
//! Every operation returns a new term; no node is mutated after creation.

// Builder method names intentionally overlap with std traits, like the
// expression DSLs elsewhere in this family of tools.
#![allow(clippy::should_implement_trait)]

use z3::ast::{self, Ast, Dynamic};

/// A boolean- or bit-vector-sorted SMT term.
#[derive(Debug, Clone)]
pub struct Term(Dynamic);

impl Term {
    pub(crate) fn from_dynamic(d: Dynamic) -> Self {
        Self(d)
    }

    pub(crate) fn dynamic(&self) -> &Dynamic {
        &self.0
    }

    pub(crate) fn as_bv(&self) -> ast::BV {
        self.0.as_bv().expect("expected a bit-vector term")
    }

    pub(crate) fn as_bool(&self) -> ast::Bool {
        self.0.as_bool().expect("expected a boolean term")
    }

    // ---- constructors ----

    #[must_use]
    pub fn mk_bool(b: bool) -> Self {
        Self(ast::Bool::from_bool(b).into())
    }

    #[must_use]
    pub fn mk_uint(n: u64, bits: u32) -> Self {
        Self(ast::BV::from_u64(n, bits).into())
    }

    #[must_use]
    pub fn mk_int(n: i64, bits: u32) -> Self {
        Self(ast::BV::from_i64(n, bits).into())
    }

    /// The smallest signed value of the given width (`1000...0`).
    #[must_use]
    pub fn int_min(bits: u32) -> Self {
        Self::mk_uint(1u64 << (bits - 1), bits)
    }

    /// A free bit-vector symbol.
    #[must_use]
    pub fn mk_var(name: &str, bits: u32) -> Self {
        Self(ast::BV::new_const(name, bits).into())
    }

    /// A free boolean symbol.
    #[must_use]
    pub fn mk_bool_var(name: &str) -> Self {
        Self(ast::Bool::new_const(name).into())
    }

    // ---- introspection ----

    /// Bit-width of a bit-vector term.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.as_bv().get_size()
    }

    #[must_use]
    pub fn is_bool(&self) -> bool {
        self.0.as_bool().is_some()
    }

    // ---- bit-vector arithmetic ----

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self(self.as_bv().bvadd(&other.as_bv()).into())
    }

    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self(self.as_bv().bvsub(&other.as_bv()).into())
    }

    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        Self(self.as_bv().bvmul(&other.as_bv()).into())
    }

    #[must_use]
    pub fn sdiv(&self, other: &Self) -> Self {
        Self(self.as_bv().bvsdiv(&other.as_bv()).into())
    }

    #[must_use]
    pub fn udiv(&self, other: &Self) -> Self {
        Self(self.as_bv().bvudiv(&other.as_bv()).into())
    }

    #[must_use]
    pub fn shl(&self, other: &Self) -> Self {
        Self(self.as_bv().bvshl(&other.as_bv()).into())
    }

    #[must_use]
    pub fn lshr(&self, other: &Self) -> Self {
        Self(self.as_bv().bvlshr(&other.as_bv()).into())
    }

    #[must_use]
    pub fn ashr(&self, other: &Self) -> Self {
        Self(self.as_bv().bvashr(&other.as_bv()).into())
    }

    #[must_use]
    pub fn neg(&self) -> Self {
        Self(self.as_bv().bvneg().into())
    }

    // ---- overflow predicates ----

    #[must_use]
    pub fn add_no_soverflow(&self, other: &Self) -> Self {
        let a = self.as_bv();
        let b = other.as_bv();
        let no_over: ast::Bool = a.bvadd_no_overflow(&b, true);
        let no_under: ast::Bool = a.bvadd_no_underflow(&b);
        Self(ast::Bool::and(&[&no_over, &no_under]).into())
    }

    #[must_use]
    pub fn add_no_uoverflow(&self, other: &Self) -> Self {
        Self(self.as_bv().bvadd_no_overflow(&other.as_bv(), false).into())
    }

    #[must_use]
    pub fn sub_no_soverflow(&self, other: &Self) -> Self {
        let a = self.as_bv();
        let b = other.as_bv();
        let no_over: ast::Bool = a.bvsub_no_overflow(&b);
        let no_under: ast::Bool = a.bvsub_no_underflow(&b, true);
        Self(ast::Bool::and(&[&no_over, &no_under]).into())
    }

    #[must_use]
    pub fn sub_no_uoverflow(&self, other: &Self) -> Self {
        Self(self.as_bv().bvsub_no_underflow(&other.as_bv(), false).into())
    }

    #[must_use]
    pub fn mul_no_soverflow(&self, other: &Self) -> Self {
        let a = self.as_bv();
        let b = other.as_bv();
        let no_over: ast::Bool = a.bvmul_no_overflow(&b, true);
        let no_under: ast::Bool = a.bvmul_no_underflow(&b);
        Self(ast::Bool::and(&[&no_over, &no_under]).into())
    }

    #[must_use]
    pub fn mul_no_uoverflow(&self, other: &Self) -> Self {
        Self(self.as_bv().bvmul_no_overflow(&other.as_bv(), false).into())
    }

    // ---- comparisons ----

    #[must_use]
    pub fn eq(&self, other: &Self) -> Self {
        Self(self.0._eq(&other.0).into())
    }

    #[must_use]
    pub fn ne(&self, other: &Self) -> Self {
        Self(self.0._eq(&other.0).not().into())
    }

    #[must_use]
    pub fn ule(&self, other: &Self) -> Self {
        Self(self.as_bv().bvule(&other.as_bv()).into())
    }

    #[must_use]
    pub fn ult(&self, other: &Self) -> Self {
        Self(self.as_bv().bvult(&other.as_bv()).into())
    }

    #[must_use]
    pub fn uge(&self, other: &Self) -> Self {
        Self(self.as_bv().bvuge(&other.as_bv()).into())
    }

    #[must_use]
    pub fn ugt(&self, other: &Self) -> Self {
        Self(self.as_bv().bvugt(&other.as_bv()).into())
    }

    #[must_use]
    pub fn sle(&self, other: &Self) -> Self {
        Self(self.as_bv().bvsle(&other.as_bv()).into())
    }

    #[must_use]
    pub fn slt(&self, other: &Self) -> Self {
        Self(self.as_bv().bvslt(&other.as_bv()).into())
    }

    #[must_use]
    pub fn sge(&self, other: &Self) -> Self {
        Self(self.as_bv().bvsge(&other.as_bv()).into())
    }

    #[must_use]
    pub fn sgt(&self, other: &Self) -> Self {
        Self(self.as_bv().bvsgt(&other.as_bv()).into())
    }

    // ---- boolean connectives ----

    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self(ast::Bool::and(&[&self.as_bool(), &other.as_bool()]).into())
    }

    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self(ast::Bool::or(&[&self.as_bool(), &other.as_bool()]).into())
    }

    #[must_use]
    pub fn not(&self) -> Self {
        Self(self.as_bool().not().into())
    }

    #[must_use]
    pub fn implies(&self, other: &Self) -> Self {
        Self(self.as_bool().implies(&other.as_bool()).into())
    }

    /// `self && !other` — the shape of every refinement goal.
    #[must_use]
    pub fn not_implies(&self, other: &Self) -> Self {
        self.and(&other.not())
    }

    /// Conjunction of a slice; `true` when empty.
    #[must_use]
    pub fn and_all(terms: &[Self]) -> Self {
        let bools: Vec<ast::Bool> = terms.iter().map(Self::as_bool).collect();
        let refs: Vec<&ast::Bool> = bools.iter().collect();
        if refs.is_empty() {
            Self::mk_bool(true)
        } else {
            Self(ast::Bool::and(&refs).into())
        }
    }

    /// Disjunction of a slice; `false` when empty.
    #[must_use]
    pub fn or_all(terms: &[Self]) -> Self {
        let bools: Vec<ast::Bool> = terms.iter().map(Self::as_bool).collect();
        let refs: Vec<&ast::Bool> = bools.iter().collect();
        if refs.is_empty() {
            Self::mk_bool(false)
        } else {
            Self(ast::Bool::or(&refs).into())
        }
    }

    /// `if self then t else e`, pointwise over boolean or bit-vector arms.
    #[must_use]
    pub fn ite(&self, t: &Self, e: &Self) -> Self {
        Self(self.as_bool().ite(&t.0, &e.0))
    }

    // ---- width changes ----

    /// Widen by `amount` zero bits.
    #[must_use]
    pub fn zext(&self, amount: u32) -> Self {
        Self(self.as_bv().zero_ext(amount).into())
    }

    /// Widen by `amount` sign bits.
    #[must_use]
    pub fn sign_ext(&self, amount: u32) -> Self {
        Self(self.as_bv().sign_ext(amount).into())
    }

    /// Keep the low `to_bits` bits.
    #[must_use]
    pub fn trunc(&self, to_bits: u32) -> Self {
        Self(self.as_bv().extract(to_bits - 1, 0).into())
    }

    #[must_use]
    pub fn zext_or_trunc(&self, to_bits: u32) -> Self {
        let bits = self.bits();
        if bits < to_bits {
            self.zext(to_bits - bits)
        } else if bits > to_bits {
            self.trunc(to_bits)
        } else {
            self.clone()
        }
    }

    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        Self(self.as_bv().concat(&other.as_bv()).into())
    }

    #[must_use]
    pub fn extract(&self, high: u32, low: u32) -> Self {
        Self(self.as_bv().extract(high, low).into())
    }

    // ---- quantification and substitution ----

    /// Universal closure of `body` over the given free symbols.
    /// Identity when the set is empty.
    #[must_use]
    pub fn mk_forall(qvars: &[Self], body: &Self) -> Self {
        if qvars.is_empty() {
            return body.clone();
        }
        let bounds: Vec<&dyn Ast> = qvars.iter().map(|t| &t.0 as &dyn Ast).collect();
        Self(ast::forall_const(&bounds, &[], &body.as_bool()).into())
    }

    /// Substitute free symbols by other terms in one pass.
    #[must_use]
    pub fn subst(&self, repls: &[(Self, Self)]) -> Self {
        let pairs: Vec<(&Dynamic, &Dynamic)> = repls.iter().map(|(a, b)| (&a.0, &b.0)).collect();
        Self(self.0.substitute(&pairs))
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
