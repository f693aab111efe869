use taquion::ast::StatementKind;

fn parse(src: &str) -> taquion::ast::Program {
    match taquion::parse(src) {
        Ok(program) => program,
        Err(errors) => panic!("parse errors: {errors:?}"),
    }
}

#[test]
fn demo_files_parse_cleanly() {
    for src in [
        include_str!("../demos/minimal.taq"),
        include_str!("../demos/language-tour.taq"),
        include_str!("../demos/fib.taq"),
        include_str!("../demos/strings.taq"),
        include_str!("../demos/arrays.taq"),
        include_str!("../demos/structs.taq"),
    ] {
        parse(src);
    }
}

#[test]
fn rendering_is_stable_under_reparsing() {
    for src in [
        include_str!("../demos/language-tour.taq"),
        include_str!("../demos/structs.taq"),
    ] {
        let rendered = parse(src).to_string();
        let reparsed = parse(&rendered).to_string();
        assert_eq!(rendered, reparsed);
    }
}

#[test]
fn statement_kinds_survive_the_round_trip() {
    let program = parse(include_str!("../demos/language-tour.taq"));

    let kinds: Vec<_> = program
        .statements
        .iter()
        .map(|stmt| std::mem::discriminant(&stmt.kind))
        .collect();

    let rendered = program.to_string();
    let reparsed_kinds: Vec<_> = parse(&rendered)
        .statements
        .iter()
        .map(|stmt| std::mem::discriminant(&stmt.kind))
        .collect();

    assert_eq!(kinds, reparsed_kinds);
}

#[test]
fn top_level_shape_of_the_tour() {
    let program = parse(include_str!("../demos/language-tour.taq"));

    assert!(matches!(
        program.statements[0].kind,
        StatementKind::Package { .. }
    ));
    assert!(program
        .statements
        .iter()
        .any(|stmt| matches!(&stmt.kind, StatementKind::TypeDecl(decl) if decl.name == "Contador")));
    assert!(program
        .statements
        .iter()
        .any(|stmt| matches!(&stmt.kind, StatementKind::FunctionDecl(decl) if decl.name == "main")));
}
