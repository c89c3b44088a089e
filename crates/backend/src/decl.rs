//! Declaration emitter: scalar locals and globals, array shapes and
//! initialization, function definitions.

use std::fmt::Write as _;

use syntax::{Decl, Expr, ExprKind, IdentId, Stmt, TypeId, TypePool};

use crate::instr::float_text;
use crate::{Answer, ArrayInfo, Dim, Emitter, EncodeError, Loc, Place};

impl<'a> Emitter<'a> {
    pub(crate) fn emit_translation_unit(&mut self) {
        let sx = self.sx;
        for decl in &sx.tree {
            self.emit_declaration(decl, false);
        }
    }

    pub(crate) fn emit_declaration(&mut self, decl: &Decl, is_local: bool) {
        match decl {
            Decl::Var { id, dims, init } => {
                self.emit_variable_declaration(*id, dims, init.as_ref(), is_local)
            }
            Decl::Func { id, params, body } => self.emit_function_definition(*id, params, body),
            // Type declarations carry no code.
            Decl::Type => {}
        }
    }

    fn emit_variable_declaration(
        &mut self,
        id: IdentId,
        dims: &[Expr],
        init: Option<&Expr>,
        is_local: bool,
    ) {
        let ty = self.sx.idents.get_type(id);

        if !self.sx.types.is_array(ty) {
            if is_local {
                self.emit_scalar_local(id, ty, init);
            } else {
                self.emit_scalar_global(id, ty, init);
            }
            return;
        }

        self.emit_array_declaration(id, ty, dims, init, is_local);
        if let Some(init) = init {
            self.emit_initialization(init, id, ty);
        }
    }

    fn emit_scalar_local(&mut self, id: IdentId, ty: TypeId, init: Option<&Expr>) {
        let ty_s = self.ty(ty);
        let _ = writeln!(self.buf, " %var.{} = alloca {}, align 4", id.0, ty_s);

        let init = match init {
            Some(init) => init,
            None => return,
        };

        let answer = self.emit_expression(init, Loc::Free);
        let answer = self.try_zext(answer);

        let dst = self.slot(id);
        match answer {
            Answer::Const(value) => self.store(ty, &value.to_string(), &dst),
            Answer::Float(value) => self.store(ty, &float_text(value), &dst),
            Answer::Reg(reg) => self.store(ty, &format!("%.{}", reg), &dst),
            // Address-of initializer: store the slot itself.
            Answer::Mem(Place::Slot(src)) => {
                let value = self.slot(src);
                self.store(ty, &value, &dst);
            }
            Answer::Mem(Place::Addr(reg)) => self.store(ty, &format!("%.{}", reg), &dst),
            Answer::Null => self.store(ty, "null", &dst),
            Answer::Logic(_) | Answer::Str(_) | Answer::Void => {}
        }
    }

    /// Globals take constant initializers inline; anything else falls back
    /// to a zeroed common definition.
    fn emit_scalar_global(&mut self, id: IdentId, ty: TypeId, init: Option<&Expr>) {
        let answer = init.map(|init| self.emit_expression(init, Loc::Free));
        let ty_s = self.ty(ty);

        match answer {
            Some(Answer::Const(value)) => {
                let _ = writeln!(self.buf, "@var.{} = global {} {}, align 4", id.0, ty_s, value);
            }
            Some(Answer::Float(value)) => {
                let _ = writeln!(
                    self.buf,
                    "@var.{} = global {} {}, align 4",
                    id.0,
                    ty_s,
                    float_text(value)
                );
            }
            _ => {
                let zero = if self.sx.types.is_integer(ty) { "0" } else { "0.0" };
                let _ = writeln!(
                    self.buf,
                    "@var.{} = common global {} {}, align 4",
                    id.0, ty_s, zero
                );
            }
        }
    }

    /// Resolves the declared shape and allocates. All-constant bounds make
    /// a static array; a runtime bound is allowed only as the single,
    /// outermost dimension.
    fn emit_array_declaration(
        &mut self,
        id: IdentId,
        ty: TypeId,
        dims: &[Expr],
        init: Option<&Expr>,
        is_local: bool,
    ) {
        let element = self.sx.types.array_element(ty);
        let has_init = init.is_some();

        self.arrays.insert(
            id,
            ArrayInfo {
                is_static: true,
                dims: Vec::new(),
            },
        );

        for (j, bound) in dims.iter().enumerate() {
            let answer = self.emit_expression(bound, Loc::Free);
            let answer = self.try_zext(answer);
            if has_init {
                // The initializer dictates the shape.
                continue;
            }

            match answer {
                Answer::Const(value) => {
                    if !self.arrays[&id].is_static {
                        self.report(EncodeError::ArrayBordersCannotBeStaticDynamic);
                    } else {
                        self.arrays.get_mut(&id).unwrap().dims.push(Dim::Const(value));
                    }
                }
                Answer::Reg(reg) => {
                    if j > 0 {
                        self.report(EncodeError::ArrayBordersCannotBeStaticDynamic);
                    } else {
                        let info = self.arrays.get_mut(&id).unwrap();
                        info.is_static = false;
                        info.dims.push(Dim::Reg(reg));
                    }
                }
                _ => {}
            }
        }

        if has_init {
            return;
        }

        if self.arrays[&id].is_static {
            self.alloc_array_static(id, element, is_local);
        } else {
            if !self.was_dynamic {
                self.stack_save(-1);
            }
            self.alloc_array_dynamic(id, element);
            self.was_dynamic = true;
        }
    }

    /// Array initialization: a braced list slices and stores element by
    /// element for locals and prints an inline aggregate for globals; a
    /// string literal fills a char array one character at a time.
    fn emit_initialization(&mut self, init: &Expr, id: IdentId, arr_ty: TypeId) {
        match &init.kind {
            ExprKind::Initializer(items) if self.sx.types.is_array(init.ty) => {
                let dimensions = self.sx.types.array_dimensions(arr_ty);
                let element = self.sx.types.array_element(arr_ty);

                // The declared bounds are replaced by the nested list sizes.
                let mut sizes = Vec::new();
                let mut level = init;
                for _ in 0..dimensions {
                    match &level.kind {
                        ExprKind::Initializer(sub) => {
                            sizes.push(Dim::Const(sub.len() as i64));
                            match sub.first() {
                                Some(first) => level = first,
                                None => break,
                            }
                        }
                        _ => break,
                    }
                }
                {
                    let info = self.arrays.get_mut(&id).unwrap();
                    info.is_static = true;
                    info.dims = sizes;
                }

                let is_local = self.sx.idents.is_local(id);
                if is_local {
                    self.alloc_array_static(id, element, true);
                } else {
                    let element_s = self.ty(element);
                    let _ = write!(
                        self.buf,
                        "@arr.{} = global [{} x {}] [",
                        id.0,
                        items.len(),
                        element_s
                    );
                }

                self.emit_one_dimension_initialization(init, id, element, dimensions - 1, 0, is_local);
            }

            ExprKind::StringLiteral(index) if self.sx.types.is_array(init.ty) => {
                let index = *index;
                let length = self.sx.strings.length(index);
                {
                    let info = self.arrays.get_mut(&id).unwrap();
                    info.is_static = true;
                    info.dims = vec![Dim::Const(length as i64)];
                }

                let element = self.sx.types.array_element(arr_ty);
                self.alloc_array_static(id, element, true);

                let bytes: Vec<u8> = self.sx.strings.get(index).bytes().collect();
                for (i, byte) in bytes.iter().enumerate() {
                    let slice_reg = self.slice(id, 0, 0, element, &Answer::Const(i as i64));
                    self.store(element, &byte.to_string(), &format!("%.{}", slice_reg));
                }
            }

            _ => {}
        }
    }

    fn emit_one_dimension_initialization(
        &mut self,
        nd: &Expr,
        id: IdentId,
        element: TypeId,
        cur_dim: usize,
        prev_slice: usize,
        is_local: bool,
    ) {
        let items = match &nd.kind {
            ExprKind::Initializer(items) => items,
            _ => return,
        };
        let size = items.len();

        for (i, sub) in items.iter().enumerate() {
            let slice_reg = if is_local {
                self.slice(id, cur_dim, prev_slice, element, &Answer::Const(i as i64))
            } else {
                0
            };

            if cur_dim != 0 {
                self.emit_one_dimension_initialization(sub, id, element, cur_dim - 1, slice_reg, true);
                continue;
            }

            let answer = self.emit_expression(sub, Loc::Free);
            let answer = self.try_zext(answer);
            let tail = if i != size - 1 { ", " } else { "], align 4\n" };
            match answer {
                Answer::Reg(reg) => {
                    self.store(element, &format!("%.{}", reg), &format!("%.{}", slice_reg))
                }
                Answer::Const(value) => {
                    if is_local {
                        self.store(element, &value.to_string(), &format!("%.{}", slice_reg));
                    } else {
                        let element_s = self.ty(element);
                        let _ = write!(self.buf, "{} {}{}", element_s, value, tail);
                    }
                }
                Answer::Float(value) => {
                    if is_local {
                        self.store(element, &float_text(value), &format!("%.{}", slice_reg));
                    } else {
                        let element_s = self.ty(element);
                        let _ = write!(self.buf, "{} {}{}", element_s, float_text(value), tail);
                    }
                }
                _ => {}
            }
        }
    }

    /// Function definition: parameter slots are alloca'd and the incoming
    /// SSA values stored into them, then the body runs as a function-body
    /// compound. `main` always ends in `ret i32 0`.
    fn emit_function_definition(&mut self, id: IdentId, params: &[IdentId], body: &Stmt) {
        self.was_dynamic = false;
        self.terminated = false;
        self.block_stack.clear();
        self.is_main = self.sx.ref_main == Some(id);

        let func_type = self.sx.idents.get_type(id);
        let ret_type = if self.is_main {
            TypePool::INT
        } else {
            self.sx.types.function_return(func_type)
        };

        let ret_s = self.ty(ret_type);
        let _ = write!(self.buf, "define {} @{}(", ret_s, self.sx.idents.get_spelling(id));
        let param_types = self.sx.types.function_params(func_type).to_vec();
        for (i, param) in param_types.iter().enumerate() {
            let text = self.ty(*param);
            let _ = write!(self.buf, "{}{}", if i == 0 { "" } else { ", " }, text);
        }
        let _ = writeln!(self.buf, ") {{");

        for (i, param) in params.iter().enumerate() {
            let param_type = self.sx.idents.get_type(*param);
            let ty_s = self.ty(param_type);
            let _ = writeln!(self.buf, " %var.{} = alloca {}, align 4", param.0, ty_s);
            let _ = writeln!(
                self.buf,
                " store {} %{}, {}* %var.{}, align 4",
                ty_s, i, ty_s, param.0
            );
        }

        match body {
            Stmt::Compound(items) => self.emit_compound(items, true),
            other => self.emit_statement(other),
        }

        if self.sx.types.is_void(ret_type) {
            if !self.terminated {
                if self.was_dynamic {
                    self.stack_restore(-1);
                }
                let _ = writeln!(self.buf, " ret void");
            }
        } else if self.is_main && !self.terminated {
            if self.was_dynamic {
                self.stack_restore(-1);
            }
            let _ = writeln!(self.buf, " ret i32 0");
        }
        let _ = writeln!(self.buf, "}}\n");

        self.is_main = false;
        self.terminated = false;
    }
}
