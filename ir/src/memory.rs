//! Memory interface stub.
//!
//! Pointers are `block-id ⊕ offset` bit-vectors; allocation mints fresh
//! block ids. The interface (alloc/store/load/memset/memcpy/ite) is kept
//! for future instructions; pointer semantics are not realized — loads
//! produce fresh unconstrained values and stores only advance a
//! generation counter.

use crate::state_value::StateValue;
use topt_smt::Term;

const BITS_FOR_OFFSET: u32 = 32;
const BITS_FOR_BID: u32 = 16;

/// A pointer into symbolic memory: `[bid, offset]`.
#[derive(Debug, Clone)]
pub struct Pointer {
    p: Term,
}

impl Pointer {
    #[must_use]
    pub fn new(p: Term) -> Self {
        debug_assert_eq!(p.bits(), BITS_FOR_BID + BITS_FOR_OFFSET);
        Self { p }
    }

    #[must_use]
    pub fn from_bid(bid: u64) -> Self {
        let p = Term::mk_uint(bid, BITS_FOR_BID).concat(&Term::mk_uint(0, BITS_FOR_OFFSET));
        Self { p }
    }

    #[must_use]
    pub fn bid(&self) -> Term {
        self.p
            .extract(BITS_FOR_BID + BITS_FOR_OFFSET - 1, BITS_FOR_OFFSET)
    }

    #[must_use]
    pub fn offset(&self) -> Term {
        self.p.extract(BITS_FOR_OFFSET - 1, 0)
    }

    #[must_use]
    pub fn term(&self) -> &Term {
        &self.p
    }
}

/// Symbolic memory, keyed by `(block id, offset)`.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    last_bid: u64,
    generation: u64,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a block; returns a pointer to its start with a fresh id.
    pub fn alloc(&mut self, _bytes: &Term) -> Pointer {
        let bid = self.last_bid;
        self.last_bid += 1;
        Pointer::from_bid(bid)
    }

    pub fn store(&mut self, _ptr: &Pointer, _val: &StateValue) {
        self.generation += 1;
    }

    pub fn load(&mut self, ptr: &Pointer, bits: u32) -> StateValue {
        let name = format!("mem_{}_{}", self.generation, ptr.term());
        StateValue::new(Term::mk_var(&name, bits), Term::mk_bool(true))
    }

    pub fn memset(&mut self, _ptr: &Pointer, _val: &StateValue, _bytes: &Term) {
        self.generation += 1;
    }

    pub fn memcpy(&mut self, _dst: &Pointer, _src: &Pointer, _bytes: &Term) {
        self.generation += 1;
    }

    /// Merge two memories under a condition.
    #[must_use]
    pub fn ite(_cond: &Term, then: &Self, els: &Self) -> Self {
        Self {
            last_bid: then.last_bid.max(els.last_bid),
            generation: then.generation.max(els.generation) + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topt_smt::{Solver, SolverResult};

    fn prove(p: &Term) {
        let mut s = Solver::new();
        s.add(&p.not());
        assert!(matches!(s.check(), SolverResult::Unsat));
    }

    #[test]
    fn test_alloc_mints_fresh_bids() {
        let mut m = Memory::new();
        let bytes = Term::mk_uint(4, 32);
        let a = m.alloc(&bytes);
        let b = m.alloc(&bytes);
        prove(&a.bid().ne(&b.bid()));
        prove(&a.offset().eq(&Term::mk_uint(0, 32)));
    }

    #[test]
    fn test_load_width() {
        let mut m = Memory::new();
        let p = m.alloc(&Term::mk_uint(4, 32));
        let v = m.load(&p, 8);
        assert_eq!(v.bits(), 8);
    }

    #[test]
    fn test_ite_advances_generation() {
        let mut a = Memory::new();
        let b = Memory::new();
        let p = a.alloc(&Term::mk_uint(1, 32));
        a.store(&p, &StateValue::new(Term::mk_uint(0, 8), Term::mk_bool(true)));
        let merged = Memory::ite(&Term::mk_bool_var("c"), &a, &b);
        assert!(merged.generation > 0);
        assert_eq!(merged.last_bid, 1);
    }
}
