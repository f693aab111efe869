//! End-to-end scenarios: each source compiles to a verified module whose IR
//! carries the instructions a native run would need for the expected output.

mod common;
use common::run_pipeline;

#[test]
fn integer_return() {
    let ir = run_pipeline("func main() { return 42 }");
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("ret i32 42"));
}

#[test]
fn let_and_add() {
    let ir = run_pipeline("func main() { let x = 3; let y = 4; print(x + y); return 0 }");
    assert!(ir.contains("add"));
    assert!(ir.contains("%d\\0A"), "print of an integer uses %d");
    assert!(ir.contains("@printf"));
}

#[test]
fn while_and_break() {
    let ir = run_pipeline(
        "func main() { let i = 0; while (i < 10) { if (i == 5) { break } i = i + 1 } print(i); return 0 }",
    );
    assert!(ir.contains("loop_cond"));
    assert!(ir.contains("loop_end"));
    assert!(ir.contains("icmp slt"));
    assert!(ir.contains("icmp eq"));
}

#[test]
fn call_with_parameters() {
    let ir = run_pipeline(
        "func add(a, b) { return a + b } func main() { print(add(20, 22)); return 0 }",
    );
    assert!(ir.contains("define i32 @add(i32 %a, i32 %b)"));
    assert!(ir.contains("call i32 @add(i32 20, i32 22)"));
}

#[test]
fn string_concat() {
    let ir = run_pipeline(r#"func main() { let s = "hello, " + "world"; print(s); return 0 }"#);
    assert!(ir.contains("hello, "));
    assert!(ir.contains("world"));
    for helper in ["strlen", "malloc", "strcpy", "strcat"] {
        assert!(ir.contains(&format!("@{helper}")), "missing {helper}");
    }
    assert!(ir.contains("%s\\0A"), "print of a string uses %s");
}

#[test]
fn struct_and_method() {
    let ir = run_pipeline(
        r#"
type Pessoa {
    nome: string;
    idade: int;
    func saudacao() { print(nome) }
}
func main() {
    let p = Pessoa { nome: "Ana", idade: 30 }
    p.saudacao()
    return 0
}
"#,
    );
    assert!(ir.contains("%Pessoa = type"));
    assert!(ir.contains("Pessoa.constructor"));
    assert!(ir.contains("Pessoa.saudacao"));
    assert!(ir.contains("Ana"));
}

#[test]
fn every_module_gets_a_main() {
    let ir = run_pipeline("package empty");
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("ret i32 0"));
}

#[test]
fn identical_runs_emit_identical_ir() {
    let src = include_str!("../demos/language-tour.taq");
    assert_eq!(run_pipeline(src), run_pipeline(src));
}
