//! Expression emitter. Every visit takes the caller's location request and
//! returns an answer record; the caller decides what to do with it.

use std::fmt::Write as _;

use syntax::{BinaryOp, Expr, ExprKind, TypeId, TypePool, UnaryOp};

use crate::instr::float_text;
use crate::{Answer, Emitter, EncodeError, Loc, Place, MAX_CALL_ARGS};

impl<'a> Emitter<'a> {
    pub(crate) fn emit_expression(&mut self, nd: &Expr, loc: Loc) -> Answer {
        match &nd.kind {
            ExprKind::Cast { source, operand } => self.emit_cast(nd, *source, operand),
            ExprKind::Identifier { id } => self.emit_identifier(*id, loc),
            ExprKind::IntLiteral(value) => Answer::Const(*value),
            ExprKind::FloatLiteral(value) => Answer::Float(*value),
            ExprKind::StringLiteral(index) => Answer::Str(*index),
            ExprKind::NullLiteral => Answer::Null,
            ExprKind::Subscript { .. } => self.emit_subscript(nd, loc),
            ExprKind::Call { callee, args } => self.emit_call(nd, callee, args),
            ExprKind::Member { base, index, .. } => self.emit_member(nd, base, *index, loc),
            ExprKind::Unary { op, operand } => self.emit_unary(nd, *op, operand, loc),
            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(nd, *op, lhs, rhs),
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                self.emit_ternary(nd, cond, then_expr, else_expr)
            }
            // Initializers are consumed by declarations; inline sequences
            // are not lowered.
            ExprKind::Initializer(_) | ExprKind::Inline(_) => Answer::Void,
        }
    }

    /// Implicit integer-to-float promotion inserted by the front end.
    fn emit_cast(&mut self, nd: &Expr, source: TypeId, operand: &Expr) -> Answer {
        let answer = self.emit_expression(operand, Loc::Free);
        let answer = self.try_zext(answer);

        match answer {
            Answer::Reg(reg) => {
                let src_s = self.ty(source);
                let dst_s = self.ty(nd.ty);
                let result = self.new_reg();
                let _ = writeln!(
                    self.buf,
                    " %.{} = sitofp {} %.{} to {}",
                    result, src_s, reg, dst_s
                );
                Answer::Reg(result)
            }
            Answer::Const(value) => {
                if self.sx.types.is_floating(nd.ty) {
                    Answer::Float(value as f64)
                } else {
                    Answer::Const(value)
                }
            }
            other => other,
        }
    }

    fn emit_identifier(&mut self, id: syntax::IdentId, loc: Loc) -> Answer {
        let ty = self.sx.idents.get_type(id);

        // Arrays decay to a pointer to their first element.
        if self.sx.types.is_array(ty) && self.arrays.contains_key(&id) {
            let elem = self.sx.types.array_element(ty);
            let reg = self.slice(id, 0, 0, elem, &Answer::Const(0));
            return Answer::Reg(reg);
        }

        match loc {
            Loc::Mem => Answer::Mem(Place::Slot(id)),
            _ => {
                let src = self.slot(id);
                let reg = self.load(ty, &src);
                Answer::Reg(reg)
            }
        }
    }

    /// Walks the subscript chain down to the base identifier, then peels
    /// one `getelementptr` per dimension, outermost first.
    fn emit_subscript(&mut self, nd: &Expr, loc: Loc) -> Answer {
        let mut indices: Vec<&Expr> = Vec::new();
        let mut base = nd;
        while let ExprKind::Subscript { base: inner, index } = &base.kind {
            indices.push(index);
            base = inner;
        }
        let id = match base.kind {
            ExprKind::Identifier { id } => id,
            _ => return Answer::Void,
        };

        let dims_n = match self.arrays.get(&id) {
            Some(info) => info.dims.len(),
            None => return Answer::Void,
        };
        let arr_ty = self.sx.idents.get_type(id);
        let elem = self.sx.types.array_element(arr_ty);

        let mut prev = 0usize;
        for (peeled, index) in indices.iter().rev().enumerate() {
            let answer = self.emit_expression(*index, Loc::Free);
            let answer = self.try_zext(answer);
            let cur_dim = dims_n.saturating_sub(1 + peeled);
            prev = self.slice(id, cur_dim, prev, elem, &answer);
        }

        if loc != Loc::Mem {
            let reg = self.load(elem, &format!("%.{}", prev));
            Answer::Reg(reg)
        } else {
            Answer::Mem(Place::Addr(prev))
        }
    }

    /// Structure member address arithmetic; arrow access chases the base
    /// pointer first. The trailing value load is omitted on a `Mem`
    /// request.
    fn emit_member(&mut self, nd: &Expr, base: &Expr, index: usize, loc: Loc) -> Answer {
        let (base_text, struct_ty) = match &base.kind {
            ExprKind::Identifier { id } => {
                let base_ty = self.sx.idents.get_type(*id);
                if self.sx.types.is_pointer(base_ty) {
                    let src = self.slot(*id);
                    let reg = self.load(base_ty, &src);
                    (format!("%.{}", reg), self.sx.types.element(base_ty))
                } else {
                    (self.slot(*id), base_ty)
                }
            }
            _ => return Answer::Void,
        };

        let struct_s = format!("%struct_opt.{}", struct_ty.0);
        let reg = self.new_reg();
        let _ = writeln!(
            self.buf,
            " %.{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
            reg, struct_s, struct_s, base_text, index
        );

        if loc != Loc::Mem {
            let result = self.load(nd.ty, &format!("%.{}", reg));
            Answer::Reg(result)
        } else {
            Answer::Mem(Place::Addr(reg))
        }
    }

    /// Marshals arguments left-to-right, then prints the call. Library
    /// pretty-printers were already expanded upstream; only primitive calls
    /// arrive here.
    fn emit_call(&mut self, nd: &Expr, callee: &Expr, args: &[Expr]) -> Answer {
        let id = match callee.kind {
            ExprKind::Identifier { id } => id,
            _ => {
                self.report(EncodeError::IndirectCallIsNotSupported);
                return Answer::Void;
            }
        };
        if args.len() > MAX_CALL_ARGS {
            self.report(EncodeError::TooManyArguments);
            return Answer::Void;
        }
        if self.sx.idents.is_builtin(id) {
            self.used_builtins[id.0] = true;
        }

        let mut marshalled: Vec<(Answer, TypeId)> = Vec::with_capacity(args.len());
        for arg in args {
            let answer = self.emit_expression(arg, Loc::Free);
            let answer = self.try_zext(answer);
            marshalled.push((answer, arg.ty));
        }

        let result = if !self.sx.types.is_void(nd.ty) {
            Some(self.new_reg())
        } else {
            None
        };

        let func_s = self.ty(callee.ty);
        let mut line = String::new();
        if let Some(reg) = result {
            let _ = write!(line, " %.{} =", reg);
        }
        let _ = write!(line, " call {} @{}(", func_s, self.sx.idents.get_spelling(id));

        for (i, (answer, arg_ty)) in marshalled.iter().enumerate() {
            if i != 0 {
                line.push_str(", ");
            }
            match answer {
                Answer::Str(index) => {
                    let length = self.sx.strings.length(*index) + 1;
                    let _ = write!(
                        line,
                        "i8* getelementptr inbounds ([{} x i8], [{} x i8]* @.str{}, i32 0, i32 0)",
                        length, length, index
                    );
                }
                Answer::Reg(reg) => {
                    let _ = write!(line, "{} %.{}", self.ty(*arg_ty), reg);
                }
                Answer::Const(value) => {
                    let _ = write!(line, "{} {}", self.ty(*arg_ty), value);
                }
                Answer::Float(value) => {
                    let _ = write!(line, "{} {}", self.ty(*arg_ty), float_text(*value));
                }
                Answer::Null => {
                    let _ = write!(line, "{} null", self.ty(*arg_ty));
                }
                Answer::Mem(place) => {
                    let text = self.place_text(*place);
                    let _ = write!(line, "{} {}", self.ty(*arg_ty), text);
                }
                Answer::Logic(_) | Answer::Void => {
                    let _ = write!(line, "{} 0", self.ty(*arg_ty));
                }
            }
        }
        line.push_str(")\n");
        self.buf.push_str(&line);

        match result {
            Some(reg) => Answer::Reg(reg),
            None => Answer::Void,
        }
    }

    /// `++`/`--` lower to a load, an add or sub against 1 and a store back;
    /// prefix forms answer the new value, postfix forms the old one.
    fn emit_inc_dec(&mut self, nd: &Expr, op: UnaryOp, operand: &Expr) -> Answer {
        let place = match operand.kind {
            ExprKind::Identifier { id } => Place::Slot(id),
            _ => match self.emit_expression(operand, Loc::Mem) {
                Answer::Mem(place) => place,
                _ => return Answer::Void,
            },
        };
        let dst = self.place_text(place);
        let ty = nd.ty;

        let old = self.load(ty, &dst);
        let increment = matches!(op, UnaryOp::PreInc | UnaryOp::PostInc);
        let binop = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        let new = if self.sx.types.is_integer(ty) {
            self.emit_bin_rc(binop, old, 1, ty)
        } else {
            self.emit_bin_rcf(binop, old, 1.0)
        };
        self.store(ty, &format!("%.{}", new), &dst);

        let pre = matches!(op, UnaryOp::PreInc | UnaryOp::PreDec);
        Answer::Reg(if pre { new } else { old })
    }

    fn emit_unary(&mut self, nd: &Expr, op: UnaryOp, operand: &Expr, loc: Loc) -> Answer {
        match op {
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                self.emit_inc_dec(nd, op, operand)
            }

            UnaryOp::Minus => {
                let answer = self.emit_expression(operand, Loc::Reg);
                let answer = self.try_zext(answer);
                match answer {
                    Answer::Const(value) => Answer::Const(-value),
                    Answer::Float(value) => Answer::Float(-value),
                    Answer::Reg(reg) => {
                        if self.sx.types.is_floating(nd.ty) {
                            Answer::Reg(self.emit_bin_cfr(BinaryOp::Sub, 0.0, reg))
                        } else {
                            Answer::Reg(self.emit_bin_cr(BinaryOp::Sub, 0, reg, nd.ty))
                        }
                    }
                    other => other,
                }
            }

            UnaryOp::BitNot => {
                let answer = self.emit_expression(operand, Loc::Reg);
                let answer = self.try_zext(answer);
                match answer {
                    Answer::Const(value) => Answer::Const(!value),
                    Answer::Reg(reg) => Answer::Reg(self.emit_bin_rc(BinaryOp::Xor, reg, -1, nd.ty)),
                    other => other,
                }
            }

            UnaryOp::LogNot => {
                // In branch position over a short-circuit operand the
                // negation is just a label swap.
                if matches!(
                    operand.kind,
                    ExprKind::Binary { op: BinaryOp::LogAnd, .. }
                        | ExprKind::Binary { op: BinaryOp::LogOr, .. }
                ) {
                    std::mem::swap(&mut self.label_true, &mut self.label_false);
                    return self.emit_expression(operand, loc);
                }

                let answer = self.emit_expression(operand, Loc::Reg);
                let answer = self.try_zext(answer);
                match answer {
                    Answer::Const(value) => Answer::Const((value == 0) as i64),
                    Answer::Float(value) => Answer::Const((value == 0.0) as i64),
                    Answer::Null => Answer::Const(1),
                    Answer::Reg(reg) => {
                        let flag = if self.sx.types.is_floating(operand.ty) {
                            self.emit_bin_rcf(BinaryOp::Eq, reg, 0.0)
                        } else {
                            self.emit_bin_rc(BinaryOp::Eq, reg, 0, TypePool::INT)
                        };
                        Answer::Logic(flag)
                    }
                    other => other,
                }
            }

            UnaryOp::AddrOf => match operand.kind {
                ExprKind::Identifier { id } => Answer::Mem(Place::Slot(id)),
                ExprKind::Member { .. } | ExprKind::Subscript { .. } => {
                    self.emit_expression(operand, Loc::Mem)
                }
                _ => Answer::Void,
            },

            UnaryOp::Indirection => {
                let answer = self.emit_expression(operand, Loc::Reg);
                let pointer = match answer {
                    Answer::Reg(reg) => reg,
                    _ => return Answer::Void,
                };
                if loc == Loc::Mem {
                    Answer::Mem(Place::Addr(pointer))
                } else {
                    let pointee = self.sx.types.element(operand.ty);
                    let reg = self.load(pointee, &format!("%.{}", pointer));
                    Answer::Reg(reg)
                }
            }

            UnaryOp::Abs => {
                let answer = self.emit_expression(operand, Loc::Free);
                let answer = self.try_zext(answer);
                match answer {
                    Answer::Const(value) => Answer::Const(value.abs()),
                    Answer::Float(value) => Answer::Float(value.abs()),
                    Answer::Reg(reg) => {
                        let result = self.new_reg();
                        if self.sx.types.is_integer(nd.ty) {
                            let _ = writeln!(self.buf, " %.{} = call i32 @abs(i32 %.{})", result, reg);
                            self.needs.abs = true;
                        } else {
                            let _ = writeln!(
                                self.buf,
                                " %.{} = call double @llvm.fabs.f64(double %.{})",
                                result, reg
                            );
                            self.needs.fabs = true;
                        }
                        Answer::Reg(result)
                    }
                    other => other,
                }
            }
        }
    }

    /// Non-assignment binary operation: one three-address instruction per
    /// operand-kind combination. Comparisons answer `Logic`, the rest
    /// `Reg`.
    fn emit_integral(&mut self, nd: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Answer {
        let comparison = op.is_comparison();
        let mut operation_type = nd.ty;
        if comparison {
            operation_type = self
                .sx
                .types
                .usual_arithmetic_conversions(lhs.ty, rhs.ty);
            // Pointer comparisons stay integer-class over the pointer
            // spelling.
            if self.sx.types.is_pointer(lhs.ty) {
                operation_type = lhs.ty;
            } else if self.sx.types.is_pointer(rhs.ty) {
                operation_type = rhs.ty;
            } else if self.sx.types.is_null_ptr(lhs.ty) || self.sx.types.is_null_ptr(rhs.ty) {
                operation_type = TypePool::NULL_PTR;
            }
        }

        let left = self.emit_expression(lhs, Loc::Free);
        let left = self.try_zext(left);
        let right = self.emit_expression(rhs, Loc::Free);
        let right = self.try_zext(right);

        let floating = self.sx.types.is_floating(operation_type);
        let result = match (left, right) {
            (Answer::Reg(a), Answer::Reg(b)) => self.emit_bin_rr(op, a, b, operation_type),
            (Answer::Reg(a), Answer::Const(c)) => {
                if floating {
                    self.emit_bin_rcf(op, a, c as f64)
                } else {
                    self.emit_bin_rc(op, a, c, operation_type)
                }
            }
            (Answer::Reg(a), Answer::Float(f)) => self.emit_bin_rcf(op, a, f),
            (Answer::Const(c), Answer::Reg(b)) => {
                if floating {
                    self.emit_bin_cfr(op, c as f64, b)
                } else {
                    self.emit_bin_cr(op, c, b, operation_type)
                }
            }
            (Answer::Float(f), Answer::Reg(b)) => self.emit_bin_cfr(op, f, b),
            (Answer::Const(a), Answer::Const(b)) => {
                if floating {
                    self.emit_bin_ccf(op, a as f64, b as f64)
                } else {
                    self.emit_bin_cc(op, a, b, operation_type)
                }
            }
            (Answer::Float(a), Answer::Float(b)) => self.emit_bin_ccf(op, a, b),
            (Answer::Const(a), Answer::Float(b)) => self.emit_bin_ccf(op, a as f64, b),
            (Answer::Float(a), Answer::Const(b)) => self.emit_bin_ccf(op, a, b as f64),
            (Answer::Reg(a), Answer::Null) => self.emit_bin_rnull(op, a, operation_type),
            (Answer::Null, Answer::Reg(b)) => self.emit_bin_nullr(op, b, operation_type),
            // Null against null carries no information; emit nothing.
            _ => return Answer::Void,
        };

        if comparison {
            Answer::Logic(result)
        } else {
            Answer::Reg(result)
        }
    }

    /// Assignment: destination under a `Mem` request, value under `Free`.
    /// Compound forms load, operate, then store.
    fn emit_assignment(&mut self, nd: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Answer {
        let operation_type = nd.ty;

        let place = match lhs.kind {
            ExprKind::Identifier { id } => Place::Slot(id),
            _ => match self.emit_expression(lhs, Loc::Mem) {
                Answer::Mem(place) => place,
                _ => return Answer::Void,
            },
        };
        let dst = self.place_text(place);

        let value = self.emit_expression(rhs, Loc::Free);
        let mut value = self.try_zext(value);

        if op != BinaryOp::Assign {
            let current = self.load(operation_type, &dst);
            let result = match value {
                Answer::Reg(reg) => self.emit_bin_rr(op, current, reg, operation_type),
                Answer::Const(c) => {
                    if self.sx.types.is_floating(operation_type) {
                        self.emit_bin_rcf(op, current, c as f64)
                    } else {
                        self.emit_bin_rc(op, current, c, operation_type)
                    }
                }
                Answer::Float(f) => self.emit_bin_rcf(op, current, f),
                _ => return Answer::Void,
            };
            value = Answer::Reg(result);
        }

        match value {
            Answer::Reg(reg) => {
                self.store(operation_type, &format!("%.{}", reg), &dst);
                Answer::Reg(reg)
            }
            Answer::Const(c) => {
                self.store(operation_type, &c.to_string(), &dst);
                Answer::Const(c)
            }
            Answer::Float(f) => {
                self.store(operation_type, &float_text(f), &dst);
                Answer::Float(f)
            }
            // Address-of on the right-hand side: store the slot itself.
            Answer::Mem(place) => {
                let text = self.place_text(place);
                self.store(operation_type, &text, &dst);
                Answer::Mem(place)
            }
            Answer::Null => {
                self.store(operation_type, "null", &dst);
                Answer::Null
            }
            _ => Answer::Void,
        }
    }

    fn emit_binary(&mut self, nd: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Answer {
        if op.is_assignment() {
            return self.emit_assignment(nd, op, lhs, rhs);
        }

        match op {
            BinaryOp::LogAnd | BinaryOp::LogOr => {
                let label_next = self.new_label();
                let old_true = self.label_true;
                let old_false = self.label_false;

                // Short-circuit: the continue edge lands on label_next.
                if op == BinaryOp::LogOr {
                    self.label_false = label_next;
                } else {
                    self.label_true = label_next;
                }

                let left = self.emit_expression(lhs, Loc::Free);
                self.check_and_branch(left);

                self.label(label_next);
                self.label_true = old_true;
                self.label_false = old_false;

                self.emit_expression(rhs, Loc::Free)
            }
            _ => self.emit_integral(nd, op, lhs, rhs),
        }
    }

    /// Conditional expression with a `phi` join. Nested ternaries
    /// contribute their own end label as the incoming edge.
    fn emit_ternary(&mut self, nd: &Expr, cond: &Expr, then_expr: &Expr, else_expr: &Expr) -> Answer {
        let old_true = self.label_true;
        let old_false = self.label_false;
        let mut label_then = self.new_label();
        let mut label_else = self.new_label();
        let label_end = self.new_label();

        self.label_true = label_then;
        self.label_false = label_else;

        let condition = self.emit_expression(cond, Loc::Free);
        self.check_and_branch(condition);

        self.label(label_then);
        let then_is_ternary = matches!(then_expr.kind, ExprKind::Ternary { .. });
        let then_answer = self.emit_expression(then_expr, Loc::Free);
        let then_answer = self.try_zext(then_answer);
        if then_is_ternary {
            label_then = self.label_ternary_end;
        }
        self.br(label_end);

        self.label(label_else);
        let else_is_ternary = matches!(else_expr.kind, ExprKind::Ternary { .. });
        let else_answer = self.emit_expression(else_expr, Loc::Free);
        let else_answer = self.try_zext(else_answer);
        if else_is_ternary {
            label_else = self.label_ternary_end;
        }
        self.br(label_end);

        self.label(label_end);
        let ty_s = self.ty(nd.ty);
        let result = self.new_reg();
        let _ = writeln!(
            self.buf,
            " %.{} = phi {} [ {}, %label{} ], [ {}, %label{} ]",
            result,
            ty_s,
            phi_value(then_answer),
            label_then,
            phi_value(else_answer),
            label_else
        );

        self.label_true = old_true;
        self.label_false = old_false;
        self.label_ternary_end = label_end;

        Answer::Reg(result)
    }
}

fn phi_value(answer: Answer) -> String {
    match answer {
        Answer::Reg(reg) => format!("%.{}", reg),
        Answer::Const(value) => value.to_string(),
        Answer::Float(value) => float_text(value),
        Answer::Null => "null".to_string(),
        _ => "0".to_string(),
    }
}
