use backend::encode;
use syntax::{BinaryOp, Decl, Expr, Stmt, Syntax, TypePool, UnaryOp, Workspace};

fn emit(sx: &Syntax) -> String {
    encode(&Workspace::default(), sx).expect("encode ok").ir
}

fn push_main(sx: &mut Syntax, body: Vec<Stmt>) {
    let main_ty = sx.types.function(TypePool::INT, vec![]);
    let id = sx.idents.declare("main", main_ty, false);
    sx.ref_main = Some(id);
    sx.tree.push(Decl::Func {
        id,
        params: vec![],
        body: Stmt::Compound(body),
    });
}

#[test]
fn pointer_null_comparison_stays_icmp() {
    // int *p = 0; if (p == 0) { }
    let mut sx = Syntax::new();
    let int_ptr = sx.types.pointer_to(TypePool::INT);
    let p = sx.idents.declare("p", int_ptr, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: p,
            dims: vec![],
            init: Some(Expr::null()),
        }]),
        Stmt::If {
            cond: Expr::binary(
                BinaryOp::Eq,
                Expr::ident(p, int_ptr),
                Expr::null(),
                TypePool::INT,
            ),
            then_body: Box::new(Stmt::Null),
            else_body: None,
        },
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(
        ir.contains(&format!(" store i32* null, i32** %var.{}, align 4", p.0)),
        "IR:\n{}",
        ir
    );
    assert!(ir.contains(" = icmp eq i32* %.1, null"), "IR:\n{}", ir);
    assert!(!ir.contains("fcmp"), "null compare must stay integral, IR:\n{}", ir);
}

#[test]
fn null_on_the_left_compares_reversed() {
    let mut sx = Syntax::new();
    let int_ptr = sx.types.pointer_to(TypePool::INT);
    let p = sx.idents.declare("p", int_ptr, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: p,
            dims: vec![],
            init: Some(Expr::null()),
        }]),
        Stmt::If {
            cond: Expr::binary(
                BinaryOp::Ne,
                Expr::null(),
                Expr::ident(p, int_ptr),
                TypePool::INT,
            ),
            then_body: Box::new(Stmt::Null),
            else_body: None,
        },
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(ir.contains(" = icmp ne i32* null, %.1"), "IR:\n{}", ir);
}

#[test]
fn address_of_initializes_pointer_with_the_slot() {
    // int x; int *p = &x;
    let mut sx = Syntax::new();
    let x = sx.idents.declare("x", TypePool::INT, true);
    let int_ptr = sx.types.pointer_to(TypePool::INT);
    let p = sx.idents.declare("p", int_ptr, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: x,
            dims: vec![],
            init: None,
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: p,
            dims: vec![],
            init: Some(Expr::unary(
                UnaryOp::AddrOf,
                Expr::ident(x, TypePool::INT),
                int_ptr,
            )),
        }]),
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(
        ir.contains(&format!(
            " store i32* %var.{}, i32** %var.{}, align 4",
            x.0, p.0
        )),
        "IR:\n{}",
        ir
    );
}

#[test]
fn dereference_reads_through_two_loads() {
    // int x = *p;
    let mut sx = Syntax::new();
    let int_ptr = sx.types.pointer_to(TypePool::INT);
    let p = sx.idents.declare("p", int_ptr, true);
    let x = sx.idents.declare("x", TypePool::INT, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: p,
            dims: vec![],
            init: None,
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: x,
            dims: vec![],
            init: Some(Expr::unary(
                UnaryOp::Indirection,
                Expr::ident(p, int_ptr),
                TypePool::INT,
            )),
        }]),
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(
        ir.contains(&format!(" %.1 = load i32*, i32** %var.{}, align 4", p.0)),
        "IR:\n{}",
        ir
    );
    assert!(ir.contains(" %.2 = load i32, i32* %.1, align 4"), "IR:\n{}", ir);
    assert!(
        ir.contains(&format!(" store i32 %.2, i32* %var.{}, align 4", x.0)),
        "IR:\n{}",
        ir
    );
}

#[test]
fn dereference_store_uses_single_pointer_load() {
    // *p = 4;
    let mut sx = Syntax::new();
    let int_ptr = sx.types.pointer_to(TypePool::INT);
    let p = sx.idents.declare("p", int_ptr, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: p,
            dims: vec![],
            init: None,
        }]),
        Stmt::Expr(Expr::binary(
            BinaryOp::Assign,
            Expr::unary(
                UnaryOp::Indirection,
                Expr::ident(p, int_ptr),
                TypePool::INT,
            ),
            Expr::int(4),
            TypePool::INT,
        )),
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(
        ir.contains(&format!(" %.1 = load i32*, i32** %var.{}, align 4", p.0)),
        "IR:\n{}",
        ir
    );
    assert!(ir.contains(" store i32 4, i32* %.1, align 4"), "IR:\n{}", ir);
}

#[test]
fn indirect_call_is_reported_not_emitted() {
    // (*fp)() through a non-identifier callee expression.
    let mut sx = Syntax::new();
    let fn_ty = sx.types.function(TypePool::INT, vec![]);
    let fn_ptr = sx.types.pointer_to(fn_ty);
    let fp = sx.idents.declare("fp", fn_ptr, true);
    let callee = Expr::unary(
        UnaryOp::Indirection,
        Expr::ident(fp, fn_ptr),
        fn_ty,
    );
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: fp,
            dims: vec![],
            init: None,
        }]),
        Stmt::Expr(Expr::call(callee, vec![], TypePool::INT)),
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);

    let encoded = encode(&Workspace::default(), &sx).expect("encode ok");
    assert_eq!(encoded.error_count(), 1, "IR:\n{}", encoded.ir);
    assert_eq!(
        encoded.diagnostics[0],
        backend::EncodeError::IndirectCallIsNotSupported
    );
}

#[test]
fn comparison_lifts_to_int_only_on_demand() {
    // int c = a < b; -- one zext; if (a < b) {} -- no zext.
    let mut sx = Syntax::new();
    let a = sx.idents.declare("a", TypePool::INT, true);
    let b = sx.idents.declare("b", TypePool::INT, true);
    let c = sx.idents.declare("c", TypePool::INT, true);
    let cmp = || {
        Expr::binary(
            BinaryOp::Lt,
            Expr::ident(a, TypePool::INT),
            Expr::ident(b, TypePool::INT),
            TypePool::INT,
        )
    };
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: a,
            dims: vec![],
            init: Some(Expr::int(1)),
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: b,
            dims: vec![],
            init: Some(Expr::int(2)),
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: c,
            dims: vec![],
            init: Some(cmp()),
        }]),
        Stmt::If {
            cond: cmp(),
            then_body: Box::new(Stmt::Null),
            else_body: None,
        },
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert_eq!(
        ir.matches(" = zext i1 %.").count(),
        1,
        "only the value position lifts, IR:\n{}",
        ir
    );
}
