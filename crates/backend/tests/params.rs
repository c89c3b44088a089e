use backend::encode;
use syntax::{BinaryOp, Decl, Expr, Stmt, Syntax, TypePool, Workspace};

fn emit(sx: &Syntax) -> String {
    encode(&Workspace::default(), sx).expect("encode ok").ir
}

#[test]
fn parameters_spill_to_slots_on_entry() {
    // int add(int a, int b) { return a + b; } int main() { return add(1, 2); }
    let mut sx = Syntax::new();
    let add_ty = sx
        .types
        .function(TypePool::INT, vec![TypePool::INT, TypePool::INT]);
    let add = sx.idents.declare("add", add_ty, false);
    let a = sx.idents.declare("a", TypePool::INT, true);
    let b = sx.idents.declare("b", TypePool::INT, true);

    sx.tree.push(Decl::Func {
        id: add,
        params: vec![a, b],
        body: Stmt::Compound(vec![Stmt::Return {
            expr: Some(Expr::binary(
                BinaryOp::Add,
                Expr::ident(a, TypePool::INT),
                Expr::ident(b, TypePool::INT),
                TypePool::INT,
            )),
        }]),
    });

    let main_ty = sx.types.function(TypePool::INT, vec![]);
    let main_id = sx.idents.declare("main", main_ty, false);
    sx.ref_main = Some(main_id);
    sx.tree.push(Decl::Func {
        id: main_id,
        params: vec![],
        body: Stmt::Compound(vec![Stmt::Return {
            expr: Some(Expr::call(
                Expr::ident(add, add_ty),
                vec![Expr::int(1), Expr::int(2)],
                TypePool::INT,
            )),
        }]),
    });
    let ir = emit(&sx);

    assert!(ir.contains("define i32 @add(i32, i32) {"), "IR:\n{}", ir);
    assert!(
        ir.contains(&format!(" %var.{} = alloca i32, align 4", a.0)),
        "IR:\n{}",
        ir
    );
    assert!(
        ir.contains(&format!(" store i32 %0, i32* %var.{}, align 4", a.0)),
        "IR:\n{}",
        ir
    );
    assert!(
        ir.contains(&format!(" store i32 %1, i32* %var.{}, align 4", b.0)),
        "IR:\n{}",
        ir
    );
    assert!(ir.contains(" = add nsw i32 %."), "IR:\n{}", ir);
    assert!(ir.contains(" ret i32 %."), "IR:\n{}", ir);
    assert!(
        ir.contains(" = call i32 (i32, i32) @add(i32 1, i32 2)"),
        "IR:\n{}",
        ir
    );
}

#[test]
fn void_calls_bind_no_result_register() {
    // void poke(void); int main() { poke(); return 0; }
    let mut sx = Syntax::new();
    let poke_ty = sx.types.function(TypePool::VOID, vec![]);
    let poke = sx.idents.declare("poke", poke_ty, false);
    sx.tree.push(Decl::Func {
        id: poke,
        params: vec![],
        body: Stmt::Compound(vec![Stmt::Return { expr: None }]),
    });

    let main_ty = sx.types.function(TypePool::INT, vec![]);
    let main_id = sx.idents.declare("main", main_ty, false);
    sx.ref_main = Some(main_id);
    sx.tree.push(Decl::Func {
        id: main_id,
        params: vec![],
        body: Stmt::Compound(vec![
            Stmt::Expr(Expr::call(Expr::ident(poke, poke_ty), vec![], TypePool::VOID)),
            Stmt::Return { expr: Some(Expr::int(0)) },
        ]),
    });
    let ir = emit(&sx);

    assert!(ir.contains("define void @poke() {"), "IR:\n{}", ir);
    assert!(ir.contains(" call void () @poke()"), "IR:\n{}", ir);
    assert!(
        !ir.contains(" = call void () @poke()"),
        "void call must not bind a register, IR:\n{}",
        ir
    );
}

#[test]
fn double_parameter_spills_as_double() {
    // double half(double v) { return v; }
    let mut sx = Syntax::new();
    let half_ty = sx.types.function(TypePool::FLOAT, vec![TypePool::FLOAT]);
    let half = sx.idents.declare("half", half_ty, false);
    let v = sx.idents.declare("v", TypePool::FLOAT, true);
    sx.tree.push(Decl::Func {
        id: half,
        params: vec![v],
        body: Stmt::Compound(vec![Stmt::Return {
            expr: Some(Expr::ident(v, TypePool::FLOAT)),
        }]),
    });
    let ir = emit(&sx);

    assert!(ir.contains("define double @half(double) {"), "IR:\n{}", ir);
    assert!(
        ir.contains(&format!(" store double %0, double* %var.{}, align 4", v.0)),
        "IR:\n{}",
        ir
    );
    assert!(ir.contains(" ret double %."), "IR:\n{}", ir);
}

#[test]
fn too_many_arguments_reports_and_skips() {
    let mut sx = Syntax::new();
    let sink_ty = sx.types.function(TypePool::VOID, vec![TypePool::VARARG]);
    let sink = sx.idents.declare("sink", sink_ty, false);
    sx.tree.push(Decl::Func {
        id: sink,
        params: vec![],
        body: Stmt::Compound(vec![Stmt::Return { expr: None }]),
    });

    let main_ty = sx.types.function(TypePool::INT, vec![]);
    let main_id = sx.idents.declare("main", main_ty, false);
    sx.ref_main = Some(main_id);
    let args: Vec<Expr> = (0..200).map(Expr::int).collect();
    sx.tree.push(Decl::Func {
        id: main_id,
        params: vec![],
        body: Stmt::Compound(vec![
            Stmt::Expr(Expr::call(Expr::ident(sink, sink_ty), args, TypePool::VOID)),
            Stmt::Return { expr: Some(Expr::int(0)) },
        ]),
    });

    let encoded = encode(&Workspace::default(), &sx).expect("encode ok");
    assert_eq!(encoded.error_count(), 1, "IR:\n{}", encoded.ir);
    assert!(
        !encoded.ir.contains("@sink(i32 0"),
        "oversized call must be skipped, IR:\n{}",
        encoded.ir
    );
}
