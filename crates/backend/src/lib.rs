use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{bail, Result};
use log::debug;
use thiserror::Error;

use syntax::ident::{BI_ASSERT, BI_GETID, BI_PRINT, BI_PRINTF, BI_PRINTID};
use syntax::{IdentId, Syntax, Target, TypeId, Workspace, BEGIN_USER_FUNC, BEGIN_USER_TYPE};

mod decl;
mod expr;
mod instr;
mod stmt;
pub mod verify;

/// Hard cap on marshalled call arguments.
pub const MAX_CALL_ARGS: usize = 128;

/// Diagnostics reported through the error sink. Emission of the offending
/// construct is skipped; the generator keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("such array is not supported")]
    SuchArrayIsNotSupported,
    #[error("too many arguments in a call")]
    TooManyArguments,
    #[error("array borders cannot be static and dynamic")]
    ArrayBordersCannotBeStaticDynamic,
    #[error("call through a function pointer is not supported")]
    IndirectCallIsNotSupported,
}

/// Result of a translation-unit encoding: the module text plus every
/// diagnostic the error sink collected. Partial output is not rolled back.
#[derive(Debug)]
pub struct Encoded {
    pub ir: String,
    pub diagnostics: Vec<EncodeError>,
}

impl Encoded {
    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }
}

/// Where the caller wants an expression's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Loc {
    /// Materialise the value in a fresh register.
    Reg,
    /// Produce an address suitable for a store.
    Mem,
    /// No preference.
    Free,
}

/// A store destination: a named variable slot or an address already held in
/// a register.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Place {
    Slot(IdentId),
    Addr(usize),
}

/// What an expression visit hands back to its caller.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Answer {
    Reg(usize),
    Const(i64),
    Float(f64),
    /// An `i1` produced by a comparison; lifted to `i32` on demand.
    Logic(usize),
    Mem(Place),
    Str(usize),
    Null,
    /// No value: a void call or a skipped construct.
    Void,
}

/// Array dimension bound: compile-time constant or runtime register.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Dim {
    Const(i64),
    Reg(usize),
}

/// Per-array shape recorded at declaration time and consulted at use time.
#[derive(Debug)]
pub(crate) struct ArrayInfo {
    pub is_static: bool,
    pub dims: Vec<Dim>,
}

/// Extern declarations the epilogue must emit.
#[derive(Debug, Default)]
pub(crate) struct Needs {
    pub stack_ops: bool,
    pub file: bool,
    pub abs: bool,
    pub fabs: bool,
}

pub(crate) struct Emitter<'a> {
    sx: &'a Syntax,
    buf: String,

    register_num: usize,
    label_num: i64,
    block_num: i64,

    label_true: i64,
    label_false: i64,
    label_break: i64,
    label_continue: i64,
    label_ternary_end: i64,

    /// Keys of the block-scope stack saves currently open, outermost first.
    block_stack: Vec<i64>,
    /// Open-save depth at entry to the construct `break` leaves.
    break_block_depth: usize,
    /// Open-save depth at entry to the loop `continue` re-enters.
    continue_block_depth: usize,

    arrays: HashMap<IdentId, ArrayInfo>,
    needs: Needs,
    used_builtins: [bool; BEGIN_USER_FUNC],

    was_dynamic: bool,
    is_main: bool,
    terminated: bool,

    diagnostics: Vec<EncodeError>,
}

impl<'a> Emitter<'a> {
    fn new(sx: &'a Syntax) -> Self {
        Self {
            sx,
            buf: String::new(),
            register_num: 1,
            label_num: 1,
            block_num: 1,
            label_true: 0,
            label_false: 0,
            label_break: 0,
            label_continue: 0,
            label_ternary_end: 0,
            block_stack: Vec::new(),
            break_block_depth: 0,
            continue_block_depth: 0,
            arrays: HashMap::new(),
            needs: Needs::default(),
            used_builtins: [false; BEGIN_USER_FUNC],
            was_dynamic: false,
            is_main: false,
            terminated: false,
            diagnostics: Vec::new(),
        }
    }

    /// The error sink: record and continue.
    pub(crate) fn report(&mut self, error: EncodeError) {
        self.diagnostics.push(error);
    }

    fn architecture(&mut self, ws: &Workspace) {
        match ws.target() {
            Target::X86_64 => {
                let _ = writeln!(
                    self.buf,
                    "target datalayout = \"e-m:e-i64:64-f80:128-n8:16:32:64-S128\""
                );
                let _ = writeln!(self.buf, "target triple = \"x86_64-pc-linux-gnu\"\n");
            }
            Target::Mipsel => {
                let _ = writeln!(
                    self.buf,
                    "target datalayout = \"e-m:m-p:32:32-i8:8:32-i16:16:32-i64:64-n32-S64\""
                );
                let _ = writeln!(self.buf, "target triple = \"mipsel\"\n");
            }
        }
    }

    fn structs_declaration(&mut self) {
        let sx = self.sx;
        for i in BEGIN_USER_TYPE..sx.types.amount() {
            let id = TypeId(i);
            if !sx.types.is_struct(id) {
                continue;
            }
            let _ = write!(self.buf, "%struct_opt.{} = type {{ ", i);
            let fields = sx.types.struct_members(id).to_vec();
            for (j, field) in fields.iter().enumerate() {
                let text = self.ty(*field);
                let _ = write!(self.buf, "{}{}", if j == 0 { "" } else { ", " }, text);
            }
            let _ = writeln!(self.buf, " }}");
        }
        self.buf.push_str(" \n");
    }

    fn strings_declaration(&mut self) {
        let sx = self.sx;
        for i in 0..sx.strings.amount() {
            let length = sx.strings.length(i);
            let _ = write!(
                self.buf,
                "@.str{} = private unnamed_addr constant [{} x i8] c\"",
                i,
                length + 1
            );
            for byte in sx.strings.get(i).bytes() {
                if byte == b'\n' {
                    self.buf.push_str("\\0A");
                } else {
                    self.buf.push(byte as char);
                }
            }
            self.buf.push_str("\\00\", align 1\n");
        }
        self.buf.push_str(" \n");
    }

    /// Hand-written IR bodies for the library routines the language exposes
    /// directly. `assert` is complete; the pretty-printers are stubs until
    /// the runtime grows real formatting.
    fn runtime(&mut self) {
        self.buf.push_str(
            "@.str = private unnamed_addr constant [3 x i8] c\"%s\\00\", align 1\n\
             define void @assert(i32, i8*) {\n \
             %3 = alloca i32, align 4\n \
             %4 = alloca i8*, align 8\n \
             store i32 %0, i32* %3, align 4\n \
             store i8* %1, i8** %4, align 8\n \
             %5 = load i32, i32* %3, align 4\n \
             %6 = icmp ne i32 %5, 0\n \
             br i1 %6, label %10, label %7\n \
             ; <label>:7:                                      ; preds = %2\n \
             %8 = load i8*, i8** %4, align 8\n \
             %9 = call i32 (i8*, ...) @printf(i8* getelementptr inbounds ([3 x i8], [3 x i8]* @.str, i32 0, i32 0), i8* %8)\n \
             call void @exit(i32 1)\n \
             unreachable\n\
             ; <label>:10:                                     ; preds = %2\n \
             ret void\n\
             }\n\
             declare void @exit(i32)\n\n",
        );

        self.buf.push_str(
            "define void @print(...) {\n \
             ret void\n\
             }\n",
        );
        self.buf.push_str(
            "define void @printid(...) {\n \
             ret void\n\
             }\n\n",
        );
        self.used_builtins[BI_PRINTF.0] = true;

        self.buf.push_str(
            "define void @getid(...) {\n \
             ret void\n\
             }\n\n",
        );
    }

    fn epilogue(&mut self) {
        if self.needs.stack_ops {
            self.buf.push_str("declare i8* @llvm.stacksave()\n");
            self.buf.push_str("declare void @llvm.stackrestore(i8*)\n");
        }

        if self.needs.file {
            self.buf.push_str(
                "%struct._IO_FILE = type { i32, i8*, i8*, i8*, i8*, i8*, i8*, i8*, i8*, i8*, \
                 i8*, i8*, %struct._IO_marker*, %struct._IO_FILE*, i32, i32, i64, i16, i8, \
                 [1 x i8], i8*, i64, i8*, i8*, i8*, i8*, i64, i32, [20 x i8] }\n",
            );
            self.buf.push_str(
                "%struct._IO_marker = type { %struct._IO_marker*, %struct._IO_FILE*, i32 }\n",
            );
        }

        if self.needs.abs {
            self.buf.push_str("declare i32 @abs(i32)\n");
        }

        if self.needs.fabs {
            self.buf.push_str("declare double @llvm.fabs.f64(double)\n");
        }

        for i in 0..BEGIN_USER_FUNC {
            let id = IdentId(i);
            // These four have hand-written bodies in the prologue.
            if id == BI_ASSERT || id == BI_PRINT || id == BI_PRINTID || id == BI_GETID {
                continue;
            }
            if !self.used_builtins[i] {
                continue;
            }

            let func_type = self.sx.idents.get_type(id);
            let ret = self.ty(self.sx.types.function_return(func_type));
            let _ = write!(
                self.buf,
                "declare {} @{}(",
                ret,
                self.sx.idents.get_spelling(id)
            );
            let params = self.sx.types.function_params(func_type).to_vec();
            for (j, param) in params.iter().enumerate() {
                let text = self.ty(*param);
                let _ = write!(self.buf, "{}{}", if j == 0 { "" } else { ", " }, text);
            }
            let _ = writeln!(self.buf, ")");
        }
    }
}

/// Encode a checked translation unit as LLVM-IR text.
///
/// Misconfiguration is an `Err`; translation diagnostics are collected in
/// the returned `Encoded` and do not stop emission.
pub fn encode(ws: &Workspace, sx: &Syntax) -> Result<Encoded> {
    if !ws.is_correct() {
        bail!("malformed workspace flags");
    }

    let mut em = Emitter::new(sx);

    debug!("module prologue: target {:?}", ws.target());
    em.architecture(ws);
    em.structs_declaration();
    em.strings_declaration();
    em.runtime();

    debug!("translation unit: {} top-level declarations", sx.tree.len());
    em.emit_translation_unit();

    debug!(
        "epilogue: stack_ops={} abs={} fabs={} file={}",
        em.needs.stack_ops, em.needs.abs, em.needs.fabs, em.needs.file
    );
    em.epilogue();

    Ok(Encoded {
        ir: em.buf,
        diagnostics: em.diagnostics,
    })
}
