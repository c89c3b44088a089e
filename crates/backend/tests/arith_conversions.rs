use backend::encode;
use syntax::{BinaryOp, Decl, Expr, Stmt, Syntax, TypePool, Workspace};

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
fn int_operand_promotes_through_sitofp() {
    // double x = 1.0; int i = 2; return x + i > 0;
    let mut sx = Syntax::new();
    let x = sx.idents.declare("x", TypePool::FLOAT, true);
    let i = sx.idents.declare("i", TypePool::INT, true);
    let sum = Expr::binary(
        BinaryOp::Add,
        Expr::ident(x, TypePool::FLOAT),
        Expr::cast(
            Expr::ident(i, TypePool::INT),
            TypePool::INT,
            TypePool::FLOAT,
        ),
        TypePool::FLOAT,
    );
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: x,
            dims: vec![],
            init: Some(Expr::float(1.0)),
        }]),
        Stmt::Decl(vec![Decl::Var {
            id: i,
            dims: vec![],
            init: Some(Expr::int(2)),
        }]),
        Stmt::Return {
            expr: Some(Expr::binary(BinaryOp::Gt, sum, Expr::int(0), TypePool::INT)),
        },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(
        ir.contains(" = sitofp i32 %.") && ir.contains(" to double"),
        "expected sitofp on the int side, IR:\n{}",
        ir
    );
    assert!(ir.contains(" = fadd double %."), "IR:\n{}", ir);
    assert!(ir.contains(" = fcmp ogt double %."), "IR:\n{}", ir);
    assert!(ir.contains(" = zext i1 %."), "IR:\n{}", ir);
    assert!(ir.contains(" ret i32 0"), "IR:\n{}", ir);
}

#[test]
fn float_constant_operand_uses_float_form() {
    // double d = 1.5; d = d * 2.0;
    let mut sx = Syntax::new();
    let d = sx.idents.declare("d", TypePool::FLOAT, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: d,
            dims: vec![],
            init: Some(Expr::float(1.5)),
        }]),
        Stmt::Expr(Expr::binary(
            BinaryOp::Assign,
            Expr::ident(d, TypePool::FLOAT),
            Expr::binary(
                BinaryOp::Mul,
                Expr::ident(d, TypePool::FLOAT),
                Expr::float(2.0),
                TypePool::FLOAT,
            ),
            TypePool::FLOAT,
        )),
        Stmt::Return { expr: Some(Expr::int(0)) },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(
        ir.contains(&format!(" store double 1.500000, double* %var.{}, align 4", d.0)),
        "IR:\n{}",
        ir
    );
    assert!(ir.contains(" = fmul double %.") && ir.contains(", 2.000000"), "IR:\n{}", ir);
    assert!(
        ir.contains(&format!(", double* %var.{}, align 4", d.0)),
        "IR:\n{}",
        ir
    );
}

#[test]
fn comparison_of_two_ints_stays_integral() {
    let mut sx = Syntax::new();
    let a = sx.idents.declare("a", TypePool::INT, true);
    let body = vec![
        Stmt::Decl(vec![Decl::Var {
            id: a,
            dims: vec![],
            init: Some(Expr::int(4)),
        }]),
        Stmt::Return {
            expr: Some(Expr::binary(
                BinaryOp::Le,
                Expr::ident(a, TypePool::INT),
                Expr::int(9),
                TypePool::INT,
            )),
        },
    ];
    push_main(&mut sx, body);
    let ir = emit(&sx);

    assert!(ir.contains(" = icmp sle i32 %."), "IR:\n{}", ir);
    assert!(!ir.contains("fcmp"), "unexpected float compare, IR:\n{}", ir);
}
