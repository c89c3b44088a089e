use backend::encode;
use syntax::{BinaryOp, Decl, Expr, Stmt, Syntax, TypePool, Workspace};

fn emit(sx: &Syntax) -> String {
    encode(&Workspace::default(), sx).expect("encode ok").ir
}

fn assign(target: syntax::IdentId, value: i64) -> Stmt {
    Stmt::Expr(Expr::binary(
        BinaryOp::Assign,
        Expr::ident(target, TypePool::INT),
        Expr::int(value),
        TypePool::INT,
    ))
}

fn switch_module(with_default: bool) -> (Syntax, syntax::IdentId) {
    // switch (x) { case 1: y = 10; break; case 2: y = 20; [default: y = 30;] }
    let mut sx = Syntax::new();
    let main_ty = sx.types.function(TypePool::INT, vec![]);
    let id = sx.idents.declare("main", main_ty, false);
    sx.ref_main = Some(id);
    let x = sx.idents.declare("x", TypePool::INT, true);
    let y = sx.idents.declare("y", TypePool::INT, true);

    let mut body = vec![
        Stmt::Case { value: Expr::int(1) },
        assign(y, 10),
        Stmt::Break,
        Stmt::Case { value: Expr::int(2) },
        assign(y, 20),
    ];
    if with_default {
        body.push(Stmt::Default);
        body.push(assign(y, 30));
    }

    sx.tree.push(Decl::Func {
        id,
        params: vec![],
        body: Stmt::Compound(vec![
            Stmt::Decl(vec![Decl::Var {
                id: x,
                dims: vec![],
                init: Some(Expr::int(2)),
            }]),
            Stmt::Decl(vec![Decl::Var {
                id: y,
                dims: vec![],
                init: Some(Expr::int(0)),
            }]),
            Stmt::Switch {
                cond: Expr::ident(x, TypePool::INT),
                body: Box::new(Stmt::Compound(body)),
            },
            Stmt::Return {
                expr: Some(Expr::ident(y, TypePool::INT)),
            },
        ]),
    });
    (sx, y)
}

#[test]
fn dispatch_compares_cases_in_source_order() {
    let (sx, _) = switch_module(true);
    let ir = emit(&sx);

    // The scrutinee is loaded once, then compared case by case.
    assert!(ir.contains(" = icmp eq i32 %.1, 1"), "IR:\n{}", ir);
    assert!(ir.contains(" = icmp eq i32 %.1, 2"), "IR:\n{}", ir);
    let first = ir.find("icmp eq i32 %.1, 1").unwrap();
    let second = ir.find("icmp eq i32 %.1, 2").unwrap();
    assert!(first < second, "cases must compare in order, IR:\n{}", ir);
}

#[test]
fn break_exits_and_fallthrough_continues() {
    let (sx, _) = switch_module(true);
    let ir = emit(&sx);

    // Labels: dispatch=1, end=2, case1=3, case2=4, default=5.
    // case 1 breaks to the end.
    assert!(ir.contains(" store i32 10"), "IR:\n{}", ir);
    assert!(ir.contains(" br label %label2"), "IR:\n{}", ir);
    // case 2 falls through into the default run.
    assert!(ir.contains(" store i32 20"), "IR:\n{}", ir);
    assert!(ir.contains(" br label %label5\n label5:"), "IR:\n{}", ir);
    assert!(ir.contains(" store i32 30"), "IR:\n{}", ir);
}

#[test]
fn unmatched_scrutinee_reaches_default() {
    let (sx, _) = switch_module(true);
    let ir = emit(&sx);

    // The dispatch chain's final edge lands on the default label.
    let dispatch = ir.find(" label1:").expect("dispatch label");
    let tail = &ir[dispatch..];
    assert!(
        tail.contains(" br label %label5"),
        "dispatch must fall back to default, IR:\n{}",
        ir
    );
}

#[test]
fn without_default_unmatched_reaches_end() {
    let (sx, _) = switch_module(false);
    let ir = emit(&sx);

    let dispatch = ir.find(" label1:").expect("dispatch label");
    let tail = &ir[dispatch..];
    assert!(
        tail.contains(" br label %label2"),
        "dispatch must fall back to the end label, IR:\n{}",
        ir
    );
}
