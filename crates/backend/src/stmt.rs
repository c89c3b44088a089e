//! Statement emitter: control flow, labels, compound scopes and the
//! per-scope stack save/restore discipline.

use std::collections::HashMap;
use std::fmt::Write as _;

use syntax::{Expr, Stmt};

use crate::{Answer, Emitter, Loc};

impl<'a> Emitter<'a> {
    pub(crate) fn emit_statement(&mut self, stmt: &Stmt) {
        // Dead code after a terminator is dropped; labels re-open a block.
        if self.terminated && !matches!(stmt, Stmt::Labeled { .. }) {
            return;
        }

        match stmt {
            Stmt::Decl(decls) => {
                for decl in decls {
                    self.emit_declaration(decl, true);
                }
            }

            Stmt::Labeled { label, body } => {
                let target = -(*label as i64);
                self.br(target);
                self.label(target);
                self.emit_statement(body);
            }

            // Lowered inside the owning switch.
            Stmt::Case { .. } | Stmt::Default => {}

            Stmt::Compound(items) => self.emit_compound(items, false),

            Stmt::Expr(expr) => {
                let _ = self.emit_expression(expr, Loc::Free);
            }

            Stmt::Null => {}

            Stmt::If { cond, then_body, else_body } => self.emit_if(cond, then_body, else_body.as_deref()),
            Stmt::Switch { cond, body } => self.emit_switch(cond, body),
            Stmt::While { cond, body } => self.emit_while(cond, body),
            Stmt::Do { body, cond } => self.emit_do(body, cond),
            Stmt::For { init, cond, step, body } => {
                self.emit_for(init.as_deref(), cond.as_ref(), step.as_ref(), body)
            }

            Stmt::Goto { label } => {
                let target = -(*label as i64);
                self.unwind_blocks(0);
                self.br(target);
            }
            Stmt::Continue => {
                let depth = self.continue_block_depth;
                self.unwind_blocks(depth);
                let target = self.label_continue;
                self.br(target);
            }
            Stmt::Break => {
                let depth = self.break_block_depth;
                self.unwind_blocks(depth);
                let target = self.label_break;
                self.br(target);
            }

            Stmt::Return { expr } => self.emit_return(expr.as_ref()),
        }
    }

    /// Every block scope except a function body frees its variable-length
    /// allocations on exit via a stack save/restore pair keyed by a fresh
    /// block number.
    pub(crate) fn emit_compound(&mut self, items: &[Stmt], is_function_body: bool) {
        let block = self.block_num;
        self.block_num += 1;

        if !is_function_body {
            self.stack_save(block);
            self.block_stack.push(block);
        }

        for item in items {
            self.emit_statement(item);
        }

        if !is_function_body {
            self.block_stack.pop();
            // A terminator inside the block already restored this save on
            // its way out.
            if !self.terminated {
                self.stack_restore(block);
            }
        }
    }

    fn emit_if(&mut self, cond: &Expr, then_body: &Stmt, else_body: Option<&Stmt>) {
        let old_true = self.label_true;
        let old_false = self.label_false;
        let label_if = self.new_label();
        let label_else = self.new_label();
        let label_end = self.new_label();

        self.label_true = label_if;
        self.label_false = label_else;

        let condition = self.emit_expression(cond, Loc::Free);
        self.check_and_branch(condition);

        self.label(label_if);
        self.emit_statement(then_body);
        self.br(label_end);

        self.label(label_else);
        if let Some(body) = else_body {
            self.emit_statement(body);
        }
        self.br(label_end);
        self.label(label_end);

        self.label_true = old_true;
        self.label_false = old_false;
    }

    fn emit_while(&mut self, cond: &Expr, body: &Stmt) {
        let old_true = self.label_true;
        let old_false = self.label_false;
        let old_break = self.label_break;
        let old_continue = self.label_continue;
        let old_break_depth = self.break_block_depth;
        let old_continue_depth = self.continue_block_depth;
        let label_condition = self.new_label();
        let label_body = self.new_label();
        let label_end = self.new_label();

        self.label_true = label_body;
        self.label_false = label_end;
        self.label_break = label_end;
        self.label_continue = label_condition;
        self.break_block_depth = self.block_stack.len();
        self.continue_block_depth = self.block_stack.len();

        self.br(label_condition);
        self.label(label_condition);

        let condition = self.emit_expression(cond, Loc::Free);
        self.check_and_branch(condition);

        self.label(label_body);
        self.emit_statement(body);
        self.br(label_condition);
        self.label(label_end);

        self.label_true = old_true;
        self.label_false = old_false;
        self.label_break = old_break;
        self.label_continue = old_continue;
        self.break_block_depth = old_break_depth;
        self.continue_block_depth = old_continue_depth;
    }

    fn emit_do(&mut self, body: &Stmt, cond: &Expr) {
        let old_true = self.label_true;
        let old_false = self.label_false;
        let old_break = self.label_break;
        let old_continue = self.label_continue;
        let old_break_depth = self.break_block_depth;
        let old_continue_depth = self.continue_block_depth;
        let label_loop = self.new_label();
        let label_end = self.new_label();

        self.label_true = label_loop;
        self.label_false = label_end;
        self.label_break = label_end;
        self.label_continue = label_loop;
        self.break_block_depth = self.block_stack.len();
        self.continue_block_depth = self.block_stack.len();

        self.br(label_loop);
        self.label(label_loop);

        self.emit_statement(body);

        let condition = self.emit_expression(cond, Loc::Free);
        self.check_and_branch(condition);

        self.label(label_end);

        self.label_true = old_true;
        self.label_false = old_false;
        self.label_break = old_break;
        self.label_continue = old_continue;
        self.break_block_depth = old_break_depth;
        self.continue_block_depth = old_continue_depth;
    }

    fn emit_for(&mut self, init: Option<&Stmt>, cond: Option<&Expr>, step: Option<&Expr>, body: &Stmt) {
        let old_true = self.label_true;
        let old_false = self.label_false;
        let old_break = self.label_break;
        let old_continue = self.label_continue;
        let old_break_depth = self.break_block_depth;
        let old_continue_depth = self.continue_block_depth;
        let label_condition = self.new_label();
        let label_body = self.new_label();
        let label_incr = self.new_label();
        let label_end = self.new_label();

        self.label_true = label_body;
        self.label_false = label_end;
        self.label_break = label_end;
        self.label_continue = label_incr;
        self.break_block_depth = self.block_stack.len();
        self.continue_block_depth = self.block_stack.len();

        if let Some(init) = init {
            self.emit_statement(init);
        }

        self.br(label_condition);
        self.label(label_condition);

        match cond {
            Some(cond) => {
                let condition = self.emit_expression(cond, Loc::Free);
                self.check_and_branch(condition);
            }
            None => self.br(label_body),
        }

        self.label(label_incr);
        if let Some(step) = step {
            let _ = self.emit_expression(step, Loc::Free);
        }
        self.br(label_condition);

        self.label(label_body);
        self.emit_statement(body);
        self.br(label_incr);

        self.label(label_end);

        self.label_true = old_true;
        self.label_false = old_false;
        self.label_break = old_break;
        self.label_continue = old_continue;
        self.break_block_depth = old_break_depth;
        self.continue_block_depth = old_continue_depth;
    }

    /// Switch lowering: case bodies in source order with fallthrough, then
    /// a dispatch block comparing the scrutinee against each case value in
    /// order; an unmatched value lands on `default` or the end.
    fn emit_switch(&mut self, cond: &Expr, body: &Stmt) {
        let scrutinee = self.emit_expression(cond, Loc::Free);
        let scrutinee = self.try_zext(scrutinee);
        let scrutinee = match scrutinee {
            Answer::Reg(reg) => format!("%.{}", reg),
            Answer::Const(value) => value.to_string(),
            _ => return,
        };

        let items: &[Stmt] = match body {
            Stmt::Compound(items) => items,
            other => std::slice::from_ref(other),
        };

        let old_break = self.label_break;
        let old_break_depth = self.break_block_depth;
        let label_dispatch = self.new_label();
        let label_end = self.new_label();
        self.label_break = label_end;
        self.break_block_depth = self.block_stack.len();

        let mut case_labels: Vec<(i64, Option<&Expr>)> = Vec::new();
        let mut label_of: HashMap<usize, i64> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            match item {
                Stmt::Case { value } => {
                    let label = self.new_label();
                    case_labels.push((label, Some(value)));
                    label_of.insert(i, label);
                }
                Stmt::Default => {
                    let label = self.new_label();
                    case_labels.push((label, None));
                    label_of.insert(i, label);
                }
                _ => {}
            }
        }

        self.br(label_dispatch);

        let mut started = false;
        for (i, item) in items.iter().enumerate() {
            if let Some(label) = label_of.get(&i) {
                if started {
                    // Fallthrough from the previous case run.
                    self.br(*label);
                }
                self.label(*label);
                started = true;
                continue;
            }
            if !started {
                continue;
            }
            self.emit_statement(item);
        }
        if started {
            self.br(label_end);
        }

        self.label(label_dispatch);
        let mut label_default = None;
        for (label, value) in &case_labels {
            let value = match value {
                Some(value) => value,
                None => {
                    label_default = Some(*label);
                    continue;
                }
            };

            let answer = self.emit_expression(*value, Loc::Free);
            let answer = self.try_zext(answer);
            let compared = match answer {
                Answer::Const(c) => {
                    let reg = self.new_reg();
                    let _ = writeln!(self.buf, " %.{} = icmp eq i32 {}, {}", reg, scrutinee, c);
                    reg
                }
                Answer::Reg(r) => {
                    let reg = self.new_reg();
                    let _ = writeln!(self.buf, " %.{} = icmp eq i32 {}, %.{}", reg, scrutinee, r);
                    reg
                }
                _ => continue,
            };

            let label_next = self.new_label();
            self.br_cond_to(compared, *label, label_next);
            self.label(label_next);
        }
        self.br(label_default.unwrap_or(label_end));

        self.label(label_end);
        self.label_break = old_break;
        self.break_block_depth = old_break_depth;
    }

    /// Return frees every enclosing block save and the dynamic stack
    /// first. In `main` the expression is evaluated for effect only; the
    /// function emitter supplies the final `ret i32 0`.
    fn emit_return(&mut self, expr: Option<&Expr>) {
        self.unwind_blocks(0);
        if self.was_dynamic {
            self.stack_restore(-1);
        }

        if self.is_main {
            if let Some(expr) = expr {
                let answer = self.emit_expression(expr, Loc::Reg);
                let _ = self.try_zext(answer);
            }
            return;
        }

        match expr {
            None => {
                let _ = writeln!(self.buf, " ret void");
                self.terminated = true;
            }
            Some(expr) => {
                let answer = self.emit_expression(expr, Loc::Reg);
                let answer = self.try_zext(answer);
                match answer {
                    Answer::Const(value) => {
                        let _ = writeln!(self.buf, " ret i32 {}", value);
                        self.terminated = true;
                    }
                    Answer::Float(value) => {
                        let _ = writeln!(self.buf, " ret double {}", crate::instr::float_text(value));
                        self.terminated = true;
                    }
                    Answer::Reg(reg) => {
                        let ty_s = self.ty(expr.ty);
                        let _ = writeln!(self.buf, " ret {} %.{}", ty_s, reg);
                        self.terminated = true;
                    }
                    Answer::Null => {
                        let ty_s = self.ty(expr.ty);
                        let _ = writeln!(self.buf, " ret {} null", ty_s);
                        self.terminated = true;
                    }
                    _ => {}
                }
            }
        }
    }
}
