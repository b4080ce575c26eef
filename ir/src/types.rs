//! Concrete and symbolic type nodes.
//!
//! A type exposes two logical variables keyed by the operation name that
//! owns it: a 3-bit category variable `"<op>_type"` and a 10-bit width
//! variable `"<op>_bw"`. Typing a pair of functions means solving the
//! conjunction of every type's constraint; `fixup` then reads the chosen
//! category and width back from the model. Fix-up is idempotent under a
//! fixed model.

use topt_smt::{Model, Term};

const TYPE_VAR_BITS: u32 = 3;
const BW_VAR_BITS: u32 = 10;

/// Integers are limited to 64 bits.
pub const MAX_INT_BITS: u32 = 64;

fn type_var(name: &str) -> Term {
    debug_assert!(!name.is_empty(), "type variable without an operation name");
    Term::mk_var(&format!("{name}_type"), TYPE_VAR_BITS)
}

fn bw_var(name: &str) -> Term {
    debug_assert!(!name.is_empty(), "width variable without an operation name");
    Term::mk_var(&format!("{name}_bw"), BW_VAR_BITS)
}

/// The five categories a symbolic type can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Int = 0,
    Float = 1,
    Ptr = 2,
    Array = 3,
    Vector = 4,
}

impl TypeCategory {
    pub const ALL: [Self; 5] = [Self::Int, Self::Float, Self::Ptr, Self::Array, Self::Vector];

    #[must_use]
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }

    fn from_index(i: u64) -> Self {
        match i {
            0 => Self::Int,
            1 => Self::Float,
            2 => Self::Ptr,
            3 => Self::Array,
            4 => Self::Vector,
            _ => unreachable!("type category {i} out of range"),
        }
    }

    fn is_term(self, name: &str) -> Term {
        type_var(name).eq(&Term::mk_uint(self as u64, TYPE_VAR_BITS))
    }
}

/// An integer type of known or solver-drawn width.
#[derive(Debug, Clone)]
pub struct IntType {
    name: String,
    bitwidth: u32,
    /// Width came from the surface syntax rather than a model.
    defined: bool,
}

impl IntType {
    #[must_use]
    pub fn new(bits: u32) -> Self {
        Self {
            name: String::new(),
            bitwidth: bits,
            defined: true,
        }
    }

    #[must_use]
    pub fn new_symbolic() -> Self {
        Self {
            name: String::new(),
            bitwidth: 0,
            defined: false,
        }
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        assert!(self.bitwidth != 0, "width of {} not fixed yet", self.name);
        self.bitwidth
    }

    fn size_var(&self) -> Term {
        if self.defined {
            Term::mk_uint(u64::from(self.bitwidth), BW_VAR_BITS)
        } else {
            bw_var(&self.name)
        }
    }

    fn constraints(&self) -> Term {
        let bw = self.size_var();
        bw.ne(&Term::mk_uint(0, BW_VAR_BITS))
            .and(&bw.ule(&Term::mk_uint(u64::from(MAX_INT_BITS), BW_VAR_BITS)))
    }

    fn eq(&self, rhs: &Self) -> Term {
        self.size_var().eq(&rhs.size_var())
    }

    fn fixup(&mut self, m: &Model) {
        if !self.defined {
            let bits = m.get_uint(&self.size_var());
            self.bitwidth = u32::try_from(bits).expect("model width fits in u32");
        }
    }
}

#[derive(Debug, Clone)]
pub struct FloatType {
    name: String,
}

#[derive(Debug, Clone)]
pub struct PtrType {
    name: String,
}

impl PtrType {
    fn eq(&self, rhs: &Self) -> Term {
        bw_var(&self.name).eq(&bw_var(&rhs.name))
    }
}

#[derive(Debug, Clone)]
pub struct ArrayType {
    name: String,
}

#[derive(Debug, Clone)]
pub struct VectorType {
    name: String,
}

/// A type whose category and width are determined by the solver. Holds one
/// instance of every concrete variant, all sharing the operation name, plus
/// the bitmask of admissible categories and the category chosen at fix-up.
#[derive(Debug, Clone)]
pub struct SymbolicType {
    name: String,
    enabled: u8,
    chosen: Option<TypeCategory>,
    int: IntType,
    float: FloatType,
    ptr: PtrType,
    array: ArrayType,
    vector: VectorType,
}

impl SymbolicType {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: String::new(),
            enabled: TypeCategory::ALL.iter().fold(0, |m, c| m | c.mask()),
            chosen: None,
            int: IntType::new_symbolic(),
            float: FloatType {
                name: String::new(),
            },
            ptr: PtrType {
                name: String::new(),
            },
            array: ArrayType {
                name: String::new(),
            },
            vector: VectorType {
                name: String::new(),
            },
        }
    }

    #[must_use]
    pub fn chosen(&self) -> Option<TypeCategory> {
        self.chosen
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.int.name = name.to_string();
        self.float.name = name.to_string();
        self.ptr.name = name.to_string();
        self.array.name = name.to_string();
        self.vector.name = name.to_string();
    }

    fn is_category(&self, c: TypeCategory) -> Term {
        if self.enabled & c.mask() == 0 {
            Term::mk_bool(false)
        } else {
            c.is_term(&self.name)
        }
    }

    fn constraints(&self) -> Term {
        // Float/Ptr/Array/Vector constraints are `false`, so only the
        // integer arm can be satisfied; the others stay in the disjunction
        // for when they grow real constraints.
        Term::or_all(&[
            self.is_category(TypeCategory::Int).and(&self.int.constraints()),
            self.is_category(TypeCategory::Float).and(&Term::mk_bool(false)),
            self.is_category(TypeCategory::Ptr).and(&Term::mk_bool(false)),
            self.is_category(TypeCategory::Array).and(&Term::mk_bool(false)),
            self.is_category(TypeCategory::Vector).and(&Term::mk_bool(false)),
        ])
    }

    fn fixup(&mut self, m: &Model) {
        let cat = TypeCategory::from_index(m.get_uint(&type_var(&self.name)));
        assert!(
            self.enabled & cat.mask() != 0,
            "model chose a disabled category for {}",
            self.name
        );
        self.chosen = Some(cat);
        match cat {
            TypeCategory::Int => self.int.fixup(m),
            // remaining categories are unsatisfiable and cannot be chosen
            _ => unreachable!("fix-up of a stubbed type category"),
        }
    }

    fn bits(&self) -> u32 {
        match self.chosen {
            Some(TypeCategory::Int) => self.int.bits(),
            Some(_) => unreachable!("width of a stubbed type category"),
            None => panic!("width of {} queried before fix-up", self.name),
        }
    }
}

impl Default for SymbolicType {
    fn default() -> Self {
        Self::new()
    }
}

/// A type node: concrete, or symbolic until fixed up from a model.
#[derive(Debug, Clone)]
pub enum Type {
    Void,
    Int(IntType),
    Float(FloatType),
    Ptr(PtrType),
    Array(ArrayType),
    Vector(VectorType),
    Symbolic(SymbolicType),
}

impl Type {
    /// Concrete integer type of the given width.
    #[must_use]
    pub fn int(bits: u32) -> Self {
        Self::Int(IntType::new(bits))
    }

    /// Fresh symbolic type admitting every category.
    #[must_use]
    pub fn symbolic() -> Self {
        Self::Symbolic(SymbolicType::new())
    }

    /// Key the type's logical variables by the owning operation name.
    pub fn set_name(&mut self, name: &str) {
        match self {
            Self::Void => {}
            Self::Int(t) => t.name = name.to_string(),
            Self::Float(t) => t.name = name.to_string(),
            Self::Ptr(t) => t.name = name.to_string(),
            Self::Array(t) => t.name = name.to_string(),
            Self::Vector(t) => t.name = name.to_string(),
            Self::Symbolic(t) => t.set_name(name),
        }
    }

    /// Bit-width of the (fixed) type.
    ///
    /// # Panics
    /// Panics when the type is not an integer or not yet fixed; both denote
    /// a bug in the verifier.
    #[must_use]
    pub fn bits(&self) -> u32 {
        match self {
            Self::Int(t) => t.bits(),
            Self::Symbolic(t) => t.bits(),
            _ => panic!("bit-width of a non-integer type"),
        }
    }

    /// Predicate over the type's category/width variables encoding the
    /// admissible assignments. Stubbed categories contribute `false`.
    #[must_use]
    pub fn get_type_constraints(&self) -> Term {
        match self {
            Self::Void => Term::mk_bool(true),
            Self::Int(t) => t.constraints(),
            Self::Float(_) | Self::Ptr(_) | Self::Array(_) | Self::Vector(_) => {
                Term::mk_bool(false)
            }
            Self::Symbolic(t) => t.constraints(),
        }
    }

    /// Structural equality as an SMT predicate.
    #[must_use]
    pub fn type_eq(&self, other: &Self) -> Term {
        match (self, other) {
            (Self::Void, Self::Void) => Term::mk_bool(true),
            (Self::Int(a), Self::Int(b)) => a.eq(b),
            (Self::Ptr(a), Self::Ptr(b)) => a.eq(b),
            (Self::Float(_), Self::Float(_))
            | (Self::Array(_), Self::Array(_))
            | (Self::Vector(_), Self::Vector(_)) => Term::mk_bool(false),
            (Self::Symbolic(s), b) => symbolic_eq(s, b),
            (a, Self::Symbolic(s)) => symbolic_eq(s, a),
            _ => Term::mk_bool(false),
        }
    }

    /// Read the category and width chosen by the model.
    pub fn fixup(&mut self, m: &Model) {
        match self {
            Self::Int(t) => t.fixup(m),
            Self::Symbolic(t) => t.fixup(m),
            _ => {}
        }
    }

    /// Restrict a symbolic type to the integer category. No-op on an
    /// integer; any other concrete type here is a verifier bug.
    pub fn enforce_int_type(&mut self) {
        match self {
            Self::Int(_) => {}
            Self::Symbolic(t) => t.enabled &= TypeCategory::Int.mask(),
            other => unreachable!("integer enforcement on {other}"),
        }
    }

    /// Restrict a symbolic type to the int/ptr/vector categories.
    pub fn enforce_int_or_ptr_or_vector_type(&mut self) {
        match self {
            Self::Int(_) | Self::Ptr(_) | Self::Vector(_) => {}
            Self::Symbolic(t) => {
                t.enabled &= TypeCategory::Int.mask()
                    | TypeCategory::Ptr.mask()
                    | TypeCategory::Vector.mask();
            }
            other => unreachable!("int/ptr/vector enforcement on {other}"),
        }
    }
}

fn symbolic_eq(s: &SymbolicType, other: &Type) -> Term {
    match other {
        Type::Int(b) => s.is_category(TypeCategory::Int).and(&s.int.eq(b)),
        Type::Float(_) => Term::mk_bool(false),
        Type::Ptr(b) => s.is_category(TypeCategory::Ptr).and(&s.ptr.eq(b)),
        Type::Array(_) | Type::Vector(_) => Term::mk_bool(false),
        Type::Symbolic(b) => {
            let per_category = Term::or_all(&[
                s.is_category(TypeCategory::Int)
                    .and(&b.is_category(TypeCategory::Int))
                    .and(&s.int.eq(&b.int)),
                s.is_category(TypeCategory::Ptr)
                    .and(&b.is_category(TypeCategory::Ptr))
                    .and(&s.ptr.eq(&b.ptr)),
            ]);
            per_category.and(&type_var(&s.name).eq(&type_var(&b.name)))
        }
        Type::Void => Term::mk_bool(false),
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Int(t) if t.defined || t.bitwidth != 0 => write!(f, "i{}", t.bitwidth),
            Self::Int(_) => Ok(()),
            Self::Float(_) => write!(f, "float"),
            Self::Ptr(_) => write!(f, "ptr"),
            Self::Array(_) => write!(f, "array"),
            Self::Vector(_) => write!(f, "vector"),
            Self::Symbolic(t) => match t.chosen {
                Some(TypeCategory::Int) => write!(f, "i{}", t.int.bitwidth),
                Some(c) => write!(f, "{c:?}"),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topt_smt::{Solver, SolverResult};

    fn named(mut ty: Type, name: &str) -> Type {
        ty.set_name(name);
        ty
    }

    fn check(t: &Term) -> SolverResult {
        let mut s = Solver::new();
        s.add(t);
        s.check()
    }

    #[test]
    fn test_int_constraints_bounds() {
        let ty = named(Type::symbolic(), "%a");
        let c = ty.get_type_constraints();
        // some width in 1..=64 is admissible
        assert!(check(&c).is_sat());
        // width 0 is not
        let zero = bw_var("%a").eq(&Term::mk_uint(0, BW_VAR_BITS));
        assert!(check(&c.and(&zero)).is_unsat());
        // width 65 is not
        let big = bw_var("%a").eq(&Term::mk_uint(65, BW_VAR_BITS));
        assert!(check(&c.and(&big)).is_unsat());
        // width 64 is
        let max = bw_var("%a").eq(&Term::mk_uint(64, BW_VAR_BITS));
        assert!(check(&c.and(&max)).is_sat());
    }

    #[test]
    fn test_defined_int_needs_no_model() {
        let ty = Type::int(8);
        assert!(check(&ty.get_type_constraints()).is_sat());
        assert_eq!(ty.bits(), 8);
        assert_eq!(ty.to_string(), "i8");
    }

    #[test]
    fn test_concrete_eq_reduces_to_widths() {
        let a = named(Type::int(8), "%a");
        let b = named(Type::int(8), "%b");
        let c = named(Type::int(16), "%c");
        assert!(check(&a.type_eq(&b).not()).is_unsat());
        assert!(check(&a.type_eq(&c)).is_unsat());
    }

    #[test]
    fn test_symbolic_eq_concrete_forces_width() {
        let sym = named(Type::symbolic(), "%s");
        let conc = named(Type::int(8), "%c");
        let c = sym.get_type_constraints().and(&sym.type_eq(&conc));
        let r = check(&c);
        assert!(r.is_sat());
        let m = r.model();
        assert_eq!(m.get_uint(&type_var("%s")), TypeCategory::Int as u64);
        assert_eq!(m.get_uint(&bw_var("%s")), 8);
    }

    #[test]
    fn test_fixup_idempotent() {
        let mut sym = named(Type::symbolic(), "%s");
        let conc = named(Type::int(13), "%c");
        let c = sym.get_type_constraints().and(&sym.type_eq(&conc));
        let r = check(&c);
        assert!(r.is_sat());
        sym.fixup(r.model());
        assert_eq!(sym.bits(), 13);
        assert_eq!(sym.to_string(), "i13");
        sym.fixup(r.model());
        assert_eq!(sym.bits(), 13);
    }

    #[test]
    fn test_enforce_int_type() {
        let mut sym = named(Type::symbolic(), "%s");
        sym.enforce_int_type();
        // only the integer arm remains; a non-int category is unsatisfiable
        let c = sym.get_type_constraints();
        let as_float = TypeCategory::Float.is_term("%s");
        assert!(check(&c.and(&as_float)).is_unsat());
        assert!(check(&c).is_sat());
    }

    #[test]
    fn test_stubbed_types_unsatisfiable() {
        let f = named(
            Type::Float(FloatType {
                name: String::new(),
            }),
            "%f",
        );
        assert!(check(&f.get_type_constraints()).is_unsat());
    }

    #[test]
    fn test_two_symbolics_share_width() {
        let a = named(Type::symbolic(), "%a");
        let b = named(Type::symbolic(), "%b");
        let c = a
            .get_type_constraints()
            .and(&b.get_type_constraints())
            .and(&a.type_eq(&b));
        let widths_differ = bw_var("%a").ne(&bw_var("%b"));
        assert!(check(&c.and(&widths_differ)).is_unsat());
    }
}
