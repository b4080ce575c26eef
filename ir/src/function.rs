//! Functions: value arena, labeled basic blocks, typing constraints.

use crate::types::Type;
use crate::value::{ConstantKind, Instr, Value, ValueKind, ValueRef};
use topt_smt::{Model, Term};

/// An ordered sequence of instructions identified by label. At most one
/// terminator; the implicit initial block has the empty label.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<ValueRef>,
}

/// A function owns its inputs, constants, and instructions in one arena,
/// plus an ordered list of basic blocks keyed by label.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    ret_ty: Type,
    values: Vec<Value>,
    inputs: Vec<ValueRef>,
    constants: Vec<ValueRef>,
    blocks: Vec<BasicBlock>,
}

impl Function {
    #[must_use]
    pub fn new(name: impl Into<String>, ret_ty: Type) -> Self {
        let name = name.into();
        let mut ret_ty = ret_ty;
        ret_ty.set_name(&format!("{name}#ret"));
        Self {
            name,
            ret_ty,
            values: Vec::new(),
            inputs: Vec::new(),
            constants: Vec::new(),
            blocks: vec![BasicBlock {
                label: String::new(),
                instrs: Vec::new(),
            }],
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self, r: ValueRef) -> &Value {
        &self.values[r.0]
    }

    #[must_use]
    pub fn inputs(&self) -> &[ValueRef] {
        &self.inputs
    }

    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// All values in arena order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// All instruction refs in block-declaration order.
    pub fn instrs(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.blocks.iter().flat_map(|b| b.instrs.iter().copied())
    }

    /// Find or create the block with the given label; returns its index.
    pub fn get_bb(&mut self, label: &str) -> usize {
        if let Some(i) = self.blocks.iter().position(|b| b.label == label) {
            return i;
        }
        self.blocks.push(BasicBlock {
            label: label.to_string(),
            instrs: Vec::new(),
        });
        self.blocks.len() - 1
    }

    fn push_value(&mut self, name: String, mut ty: Type, kind: ValueKind) -> ValueRef {
        ty.set_name(&name);
        self.values.push(Value { name, ty, kind });
        ValueRef(self.values.len() - 1)
    }

    pub fn add_input(&mut self, name: impl Into<String>, ty: Type) -> ValueRef {
        let r = self.push_value(name.into(), ty, ValueKind::Input);
        self.inputs.push(r);
        r
    }

    /// Constants are named by their surface form: `3`, `(a + b)`,
    /// `log2(x)`. The name keys the type variables, so equal surface forms
    /// share a typing.
    pub fn add_constant(&mut self, ty: Type, kind: ConstantKind, name: impl Into<String>) -> ValueRef {
        let r = self.push_value(name.into(), ty, ValueKind::Constant(kind));
        self.constants.push(r);
        r
    }

    pub fn add_undef(&mut self, ty: Type) -> ValueRef {
        let n = self.values.len();
        self.push_value(format!("undef#{n}"), ty, ValueKind::Undef)
    }

    /// Append an instruction to the given block. Binary operations restrict
    /// their type to the integer category on insertion.
    pub fn add_instr(
        &mut self,
        block: usize,
        name: impl Into<String>,
        mut ty: Type,
        instr: Instr,
    ) -> ValueRef {
        if let Instr::BinOp { op, flags, .. } = &instr {
            debug_assert!(flags.valid_for(*op), "flags invalid for {}", op.as_str());
            ty.enforce_int_type();
        }
        let r = self.push_value(name.into(), ty, ValueKind::Instr(instr));
        self.blocks[block].instrs.push(r);
        r
    }

    /// Conjunction of the typing constraints of every contained value plus
    /// the function signature (return type equals the returned value's
    /// type).
    #[must_use]
    pub fn get_type_constraints(&self) -> Term {
        let mut parts = Vec::with_capacity(self.values.len() + 1);
        for v in &self.values {
            parts.push(v.ty.get_type_constraints());
            match &v.kind {
                ValueKind::Instr(Instr::BinOp { a, b, .. })
                | ValueKind::Constant(ConstantKind::BinOp { a, b, .. }) => {
                    parts.push(v.ty.type_eq(&self.value(*a).ty));
                    parts.push(v.ty.type_eq(&self.value(*b).ty));
                }
                ValueKind::Instr(Instr::Return { val }) => {
                    parts.push(v.ty.type_eq(&self.value(*val).ty));
                    parts.push(self.ret_ty.type_eq(&v.ty));
                }
                _ => {}
            }
        }
        Term::and_all(&parts)
    }

    /// Fix every contained type from the model. Idempotent under a fixed
    /// model.
    pub fn fixup_types(&mut self, m: &Model) {
        for v in &mut self.values {
            v.ty.fixup(m);
        }
        self.ret_ty.fixup(m);
    }

    fn fmt_instr(&self, v: &Value, out: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ValueKind::Instr(instr) = &v.kind else {
            unreachable!("printing a non-instruction value as an instruction")
        };
        match instr {
            Instr::BinOp { op, flags, a, b } => {
                write!(out, "{} = {}{}", v.name, op.as_str(), flags)?;
                let ty = v.ty.to_string();
                if !ty.is_empty() {
                    write!(out, " {ty}")?;
                }
                write!(out, " {}, {}", self.value(*a).name, self.value(*b).name)
            }
            Instr::Return { val } => {
                write!(out, "ret")?;
                let ty = v.ty.to_string();
                if !ty.is_empty() {
                    write!(out, " {ty}")?;
                }
                write!(out, " {}", self.value(*val).name)
            }
            Instr::Unreachable => write!(out, "unreachable"),
        }
    }

    pub fn print(&self, out: &mut std::fmt::Formatter<'_>, print_header: bool) -> std::fmt::Result {
        if print_header {
            write!(out, "define {} @{}(", self.ret_ty, self.name)?;
            for (i, r) in self.inputs.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                let v = self.value(*r);
                let ty = v.ty.to_string();
                if ty.is_empty() {
                    write!(out, "{}", v.name)?;
                } else {
                    write!(out, "{ty} {}", v.name)?;
                }
            }
            writeln!(out, ") {{")?;
        }
        for b in &self.blocks {
            if !b.label.is_empty() {
                writeln!(out, "{}:", b.label)?;
            }
            for r in &b.instrs {
                self.fmt_instr(self.value(*r), out)?;
                writeln!(out)?;
            }
        }
        if print_header {
            writeln!(out, "}}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.print(f, false)
    }
}
