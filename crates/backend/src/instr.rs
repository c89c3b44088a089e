//! Low-level line emitters: type and operator spelling, three-address
//! operations, loads/stores, labels and branches, stack save/restore,
//! array allocation and slicing.

use std::fmt::Write as _;

use syntax::{BinaryOp, IdentId, TypeDesc, TypeId, TypePool};

use crate::{Answer, Dim, Emitter, EncodeError, Place};

/// Prints a float constant the way the IR expects it.
pub(crate) fn float_text(value: f64) -> String {
    format!("{:.6}", value)
}

impl<'a> Emitter<'a> {
    pub(crate) fn new_reg(&mut self) -> usize {
        let reg = self.register_num;
        self.register_num += 1;
        reg
    }

    pub(crate) fn new_label(&mut self) -> i64 {
        let label = self.label_num;
        self.label_num += 1;
        label
    }

    /// IR spelling of a semantic type. Arrays decay to element pointers
    /// here; aggregate declarations print their own bracketed shapes.
    pub(crate) fn ty(&mut self, id: TypeId) -> String {
        let sx = self.sx;
        match sx.types.get(id) {
            TypeDesc::Void => "void".to_string(),
            TypeDesc::Bool => "i1".to_string(),
            TypeDesc::Char => "i8".to_string(),
            TypeDesc::Int => "i32".to_string(),
            TypeDesc::Float => "double".to_string(),
            TypeDesc::NullPtr => "i8*".to_string(),
            TypeDesc::Vararg => "...".to_string(),
            TypeDesc::File => {
                self.needs.file = true;
                "%struct._IO_FILE".to_string()
            }
            TypeDesc::Struct(_) => format!("%struct_opt.{}", id.0),
            TypeDesc::Pointer(elem) | TypeDesc::Array(elem) => {
                format!("{}*", self.ty(*elem))
            }
            TypeDesc::Function { ret, params } => {
                let params = params.clone();
                let mut out = self.ty(*ret);
                out.push_str(" (");
                for (i, param) in params.iter().enumerate() {
                    if i != 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&self.ty(*param));
                }
                out.push(')');
                out
            }
        }
    }

    /// IR opcode or comparison for a binary operation over the given operand
    /// class: floating types take the `f`-prefixed forms, everything else
    /// (integers, pointers) the integer forms.
    pub(crate) fn op_text(&self, op: BinaryOp, ty: TypeId) -> &'static str {
        let floating = self.sx.types.is_floating(ty);
        match op.base() {
            BinaryOp::Add => {
                if floating {
                    "fadd"
                } else {
                    "add nsw"
                }
            }
            BinaryOp::Sub => {
                if floating {
                    "fsub"
                } else {
                    "sub nsw"
                }
            }
            BinaryOp::Mul => {
                if floating {
                    "fmul"
                } else {
                    "mul nsw"
                }
            }
            BinaryOp::Div => {
                if floating {
                    "fdiv"
                } else {
                    "sdiv"
                }
            }
            BinaryOp::Rem => "srem",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "ashr",
            BinaryOp::And => "and",
            BinaryOp::Xor => "xor",
            BinaryOp::Or => "or",
            BinaryOp::Eq => {
                if floating {
                    "fcmp oeq"
                } else {
                    "icmp eq"
                }
            }
            BinaryOp::Ne => {
                if floating {
                    "fcmp one"
                } else {
                    "icmp ne"
                }
            }
            BinaryOp::Lt => {
                if floating {
                    "fcmp olt"
                } else {
                    "icmp slt"
                }
            }
            BinaryOp::Gt => {
                if floating {
                    "fcmp ogt"
                } else {
                    "icmp sgt"
                }
            }
            BinaryOp::Le => {
                if floating {
                    "fcmp ole"
                } else {
                    "icmp sle"
                }
            }
            BinaryOp::Ge => {
                if floating {
                    "fcmp oge"
                } else {
                    "icmp sge"
                }
            }
            _ => "",
        }
    }

    /// Named slot of an identifier: `%var.N` for locals, `@var.N` for
    /// globals.
    pub(crate) fn slot(&self, id: IdentId) -> String {
        format!(
            "{}var.{}",
            if self.sx.idents.is_local(id) { "%" } else { "@" },
            id.0
        )
    }

    pub(crate) fn place_text(&self, place: Place) -> String {
        match place {
            Place::Slot(id) => self.slot(id),
            Place::Addr(reg) => format!("%.{}", reg),
        }
    }

    // ===== Three-address operations =====

    pub(crate) fn emit_bin_rr(&mut self, op: BinaryOp, fst: usize, snd: usize, ty: TypeId) -> usize {
        let op_s = self.op_text(op, ty);
        let ty_s = self.ty(ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = {} {} %.{}, %.{}", reg, op_s, ty_s, fst, snd);
        reg
    }

    pub(crate) fn emit_bin_rc(&mut self, op: BinaryOp, fst: usize, snd: i64, ty: TypeId) -> usize {
        let op_s = self.op_text(op, ty);
        let ty_s = self.ty(ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = {} {} %.{}, {}", reg, op_s, ty_s, fst, snd);
        reg
    }

    pub(crate) fn emit_bin_rcf(&mut self, op: BinaryOp, fst: usize, snd: f64) -> usize {
        let op_s = self.op_text(op, TypePool::FLOAT);
        let reg = self.new_reg();
        let _ = writeln!(
            self.buf,
            " %.{} = {} double %.{}, {}",
            reg,
            op_s,
            fst,
            float_text(snd)
        );
        reg
    }

    pub(crate) fn emit_bin_cr(&mut self, op: BinaryOp, fst: i64, snd: usize, ty: TypeId) -> usize {
        let op_s = self.op_text(op, ty);
        let ty_s = self.ty(ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = {} {} {}, %.{}", reg, op_s, ty_s, fst, snd);
        reg
    }

    pub(crate) fn emit_bin_cfr(&mut self, op: BinaryOp, fst: f64, snd: usize) -> usize {
        let op_s = self.op_text(op, TypePool::FLOAT);
        let reg = self.new_reg();
        let _ = writeln!(
            self.buf,
            " %.{} = {} double {}, %.{}",
            reg,
            op_s,
            float_text(fst),
            snd
        );
        reg
    }

    pub(crate) fn emit_bin_cc(&mut self, op: BinaryOp, fst: i64, snd: i64, ty: TypeId) -> usize {
        let op_s = self.op_text(op, ty);
        let ty_s = self.ty(ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = {} {} {}, {}", reg, op_s, ty_s, fst, snd);
        reg
    }

    pub(crate) fn emit_bin_ccf(&mut self, op: BinaryOp, fst: f64, snd: f64) -> usize {
        let op_s = self.op_text(op, TypePool::FLOAT);
        let reg = self.new_reg();
        let _ = writeln!(
            self.buf,
            " %.{} = {} double {}, {}",
            reg,
            op_s,
            float_text(fst),
            float_text(snd)
        );
        reg
    }

    /// Pointer compared against the null literal; always an integer-class
    /// comparison over the pointer's own spelling.
    pub(crate) fn emit_bin_rnull(&mut self, op: BinaryOp, fst: usize, ptr_ty: TypeId) -> usize {
        let op_s = self.op_text(op, TypePool::INT);
        let ty_s = self.ty(ptr_ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = {} {} %.{}, null", reg, op_s, ty_s, fst);
        reg
    }

    pub(crate) fn emit_bin_nullr(&mut self, op: BinaryOp, snd: usize, ptr_ty: TypeId) -> usize {
        let op_s = self.op_text(op, TypePool::INT);
        let ty_s = self.ty(ptr_ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = {} {} null, %.{}", reg, op_s, ty_s, snd);
        reg
    }

    // ===== Memory traffic =====

    pub(crate) fn load(&mut self, ty: TypeId, src: &str) -> usize {
        let ty_s = self.ty(ty);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = load {}, {}* {}, align 4", reg, ty_s, ty_s, src);
        reg
    }

    pub(crate) fn store(&mut self, ty: TypeId, value: &str, dst: &str) {
        let ty_s = self.ty(ty);
        let _ = writeln!(self.buf, " store {} {}, {}* {}, align 4", ty_s, value, ty_s, dst);
    }

    /// Lifts a logic answer to an `i32` register; anything else passes
    /// through untouched.
    pub(crate) fn try_zext(&mut self, answer: Answer) -> Answer {
        match answer {
            Answer::Logic(src) => {
                let reg = self.new_reg();
                let _ = writeln!(self.buf, " %.{} = zext i1 %.{} to i32", reg, src);
                Answer::Reg(reg)
            }
            other => other,
        }
    }

    // ===== Labels and branches =====

    pub(crate) fn label(&mut self, label: i64) {
        let _ = writeln!(self.buf, " label{}:", label);
        self.terminated = false;
    }

    pub(crate) fn br(&mut self, label: i64) {
        if self.terminated {
            return;
        }
        let _ = writeln!(self.buf, " br label %label{}", label);
        self.terminated = true;
    }

    pub(crate) fn br_cond_to(&mut self, reg: usize, on_true: i64, on_false: i64) {
        if self.terminated {
            return;
        }
        let _ = writeln!(
            self.buf,
            " br i1 %.{}, label %label{}, label %label{}",
            reg, on_true, on_false
        );
        self.terminated = true;
    }

    pub(crate) fn br_cond(&mut self, reg: usize) {
        let (on_true, on_false) = (self.label_true, self.label_false);
        self.br_cond_to(reg, on_true, on_false);
    }

    /// Inspects an answer and branches on its truth to the current
    /// true/false labels.
    pub(crate) fn check_and_branch(&mut self, answer: Answer) {
        match answer {
            Answer::Const(value) => {
                let target = if value != 0 { self.label_true } else { self.label_false };
                self.br(target);
            }
            Answer::Float(value) => {
                let target = if value != 0.0 { self.label_true } else { self.label_false };
                self.br(target);
            }
            Answer::Reg(reg) => {
                let flag = self.emit_bin_rc(BinaryOp::Ne, reg, 0, TypePool::INT);
                self.br_cond(flag);
            }
            Answer::Logic(reg) => self.br_cond(reg),
            _ => {}
        }
    }

    // ===== Stack bookkeeping for dynamic allocation =====

    pub(crate) fn stack_save(&mut self, index: i64) {
        let _ = writeln!(self.buf, " %dyn.{} = alloca i8*, align 4", index);
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = call i8* @llvm.stacksave()", reg);
        let _ = writeln!(self.buf, " store i8* %.{}, i8** %dyn.{}, align 4", reg, index);
        self.needs.stack_ops = true;
    }

    pub(crate) fn stack_restore(&mut self, index: i64) {
        let reg = self.new_reg();
        let _ = writeln!(self.buf, " %.{} = load i8*, i8** %dyn.{}, align 4", reg, index);
        let _ = writeln!(self.buf, " call void @llvm.stackrestore(i8* %.{})", reg);
        self.needs.stack_ops = true;
    }

    /// Restores every open block-scope save above `depth`, innermost first.
    /// Early exits run this before their terminator so each save stays
    /// paired on every path out of the scope.
    pub(crate) fn unwind_blocks(&mut self, depth: usize) {
        for i in (depth..self.block_stack.len()).rev() {
            let key = self.block_stack[i];
            self.stack_restore(key);
        }
    }

    // ===== Array allocation and slicing =====

    fn static_dims(&self, id: IdentId) -> Vec<i64> {
        self.arrays
            .get(&id)
            .map(|info| {
                info.dims
                    .iter()
                    .map(|dim| match dim {
                        Dim::Const(value) => *value,
                        Dim::Reg(_) => 0,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn nested_array_ty(dims: &[i64], elem: &str) -> String {
        let mut out = String::new();
        for dim in dims {
            let _ = write!(out, "[{} x ", dim);
        }
        out.push_str(elem);
        for _ in dims {
            out.push(']');
        }
        out
    }

    pub(crate) fn alloc_array_static(&mut self, id: IdentId, elem: TypeId, is_local: bool) {
        let dims = self.static_dims(id);
        if dims.is_empty() {
            self.report(EncodeError::SuchArrayIsNotSupported);
            return;
        }

        let elem_s = self.ty(elem);
        let shape = Self::nested_array_ty(&dims, &elem_s);
        if is_local {
            let _ = writeln!(self.buf, " %arr.{} = alloca {}, align 4", id.0, shape);
        } else {
            let _ = writeln!(
                self.buf,
                "@arr.{} = common global {} zeroinitializer, align 4",
                id.0, shape
            );
        }
    }

    /// A runtime-sized outer dimension: stack allocation by element count.
    pub(crate) fn alloc_array_dynamic(&mut self, id: IdentId, elem: TypeId) {
        let bound = match self.arrays.get(&id).and_then(|info| info.dims.first()) {
            Some(Dim::Reg(reg)) => *reg,
            _ => {
                self.report(EncodeError::SuchArrayIsNotSupported);
                return;
            }
        };

        let elem_s = self.ty(elem);
        let _ = writeln!(
            self.buf,
            " %dynarr.{} = alloca {}, i32 %.{}, align 4",
            id.0, elem_s, bound
        );
    }

    /// Peels one level of array indexing with a `getelementptr`. The static
    /// form spells the nested array type remaining at `cur_dim`; the
    /// dynamic form indexes a flat element pointer.
    pub(crate) fn slice(
        &mut self,
        id: IdentId,
        cur_dim: usize,
        prev_slice: usize,
        elem: TypeId,
        index: &Answer,
    ) -> usize {
        let (is_static, dims_n) = match self.arrays.get(&id) {
            Some(info) => (info.is_static, info.dims.len()),
            None => return 0,
        };
        if dims_n == 0 {
            return 0;
        }
        let is_local = self.sx.idents.is_local(id);
        let elem_s = self.ty(elem);

        let reg = self.new_reg();
        let mut line = format!(" %.{} = getelementptr inbounds ", reg);

        if is_static {
            let dims = self.static_dims(id);
            let start = dims_n - 1 - cur_dim.min(dims_n - 1);
            let shape = Self::nested_array_ty(&dims[start..], &elem_s);
            let _ = write!(line, "{}, {}* ", shape, shape);
            if cur_dim == dims_n - 1 {
                let _ = write!(line, "{}arr.{}, i32 0", if is_local { "%" } else { "@" }, id.0);
            } else {
                let _ = write!(line, "%.{}, i32 0", prev_slice);
            }
        } else if cur_dim == dims_n - 1 {
            let _ = write!(line, "{}, {}* %dynarr.{}", elem_s, elem_s, id.0);
        } else {
            let _ = write!(line, "{}, {}* %.{}", elem_s, elem_s, prev_slice);
        }

        match index {
            Answer::Reg(idx) => {
                let _ = write!(line, ", i32 %.{}", idx);
            }
            Answer::Const(value) => {
                let _ = write!(line, ", i32 {}", value);
            }
            _ => {
                let _ = write!(line, ", i32 0");
            }
        }

        self.buf.push_str(&line);
        self.buf.push('\n');
        reg
    }
}
