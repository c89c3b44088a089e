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

fn two_ints(sx: &mut Syntax) -> (syntax::IdentId, syntax::IdentId) {
    let a = sx.idents.declare("a", TypePool::INT, true);
    let b = sx.idents.declare("b", TypePool::INT, true);
    (a, b)
}

fn decls(a: syntax::IdentId, b: syntax::IdentId) -> Vec<Stmt> {
    vec![
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
    ]
}

#[test]
fn logical_and_short_circuits_through_next_label() {
    // if (a && b) { } -- the left side's true edge lands on the next label.
    let mut sx = Syntax::new();
    let (a, b) = two_ints(&mut sx);
    let mut body = decls(a, b);
    body.push(Stmt::If {
        cond: Expr::binary(
            BinaryOp::LogAnd,
            Expr::ident(a, TypePool::INT),
            Expr::ident(b, TypePool::INT),
            TypePool::INT,
        ),
        then_body: Box::new(Stmt::Null),
        else_body: None,
    });
    body.push(Stmt::Return { expr: Some(Expr::int(0)) });
    push_main(&mut sx, body);
    let ir = emit(&sx);

    // If labels are 1..3; the short-circuit continue label is 4.
    assert!(
        ir.contains(", label %label4, label %label2"),
        "LHS true edge must be the next label, IR:\n{}",
        ir
    );
    assert!(ir.contains(" label4:"), "IR:\n{}", ir);
    assert!(
        ir.contains(", label %label1, label %label2"),
        "RHS keeps the outer labels, IR:\n{}",
        ir
    );
}

#[test]
fn logical_or_short_circuits_through_next_label() {
    let mut sx = Syntax::new();
    let (a, b) = two_ints(&mut sx);
    let mut body = decls(a, b);
    body.push(Stmt::If {
        cond: Expr::binary(
            BinaryOp::LogOr,
            Expr::ident(a, TypePool::INT),
            Expr::ident(b, TypePool::INT),
            TypePool::INT,
        ),
        then_body: Box::new(Stmt::Null),
        else_body: None,
    });
    body.push(Stmt::Return { expr: Some(Expr::int(0)) });
    push_main(&mut sx, body);
    let ir = emit(&sx);

    // The left side's false edge lands on the next label.
    assert!(
        ir.contains(", label %label1, label %label4"),
        "LHS false edge must be the next label, IR:\n{}",
        ir
    );
}

#[test]
fn logical_not_materializes_as_value() {
    // int v = !a;
    let mut sx = Syntax::new();
    let a = sx.idents.declare("a", TypePool::INT, true);
    let v = sx.idents.declare("v", TypePool::INT, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: a,
            dims: vec![],
            init: Some(Expr::int(4)),
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: v,
            dims: vec![],
            init: Some(Expr::unary(
                UnaryOp::LogNot,
                Expr::ident(a, TypePool::INT),
                TypePool::INT,
            )),
        }]),
        Stmt::Return {
            expr: Some(Expr::ident(v, TypePool::INT)),
        },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(ir.contains(" = icmp eq i32 %."), "IR:\n{}", ir);
    assert!(ir.contains(" = zext i1 %."), "IR:\n{}", ir);
    assert!(
        ir.contains(&format!(", i32* %var.{}, align 4", v.0)),
        "the lifted value must be stored, IR:\n{}",
        ir
    );
}

#[test]
fn logical_not_branches_directly() {
    // if (!a) { } -- one compare, one conditional branch.
    let mut sx = Syntax::new();
    let a = sx.idents.declare("a", TypePool::INT, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: a,
            dims: vec![],
            init: Some(Expr::int(0)),
        }]),
        Stmt::If {
            cond: Expr::unary(UnaryOp::LogNot, Expr::ident(a, TypePool::INT), TypePool::INT),
            then_body: Box::new(Stmt::Null),
            else_body: None,
        },
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(ir.contains(" = icmp eq i32 %.1, 0"), "IR:\n{}", ir);
    assert!(
        ir.contains(", label %label1, label %label2"),
        "IR:\n{}",
        ir
    );
}

#[test]
fn unary_minus_and_bitnot_forms() {
    let mut sx = Syntax::new();
    let a = sx.idents.declare("a", TypePool::INT, true);
    let b = sx.idents.declare("b", TypePool::INT, true);
    let c = sx.idents.declare("c", TypePool::INT, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: a,
            dims: vec![],
            init: Some(Expr::int(3)),
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: b,
            dims: vec![],
            init: Some(Expr::unary(
                UnaryOp::Minus,
                Expr::ident(a, TypePool::INT),
                TypePool::INT,
            )),
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: c,
            dims: vec![],
            init: Some(Expr::unary(
                UnaryOp::BitNot,
                Expr::ident(a, TypePool::INT),
                TypePool::INT,
            )),
        }]),
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(ir.contains(" = sub nsw i32 0, %."), "IR:\n{}", ir);
    assert!(ir.contains(" = xor i32 %.3, -1"), "IR:\n{}", ir);
}
