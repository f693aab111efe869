mod common;
use common::run_pipeline;

#[test]
#[should_panic]
fn fail_parsing() {
    run_pipeline(include_str!("fails/parse_error.taq"));
}

#[test]
#[should_panic]
fn fail_undefined_symbol() {
    run_pipeline(include_str!("fails/undefined_symbol.taq"));
}

#[test]
#[should_panic]
fn fail_assign_to_const() {
    run_pipeline(include_str!("fails/assign_to_const.taq"));
}

#[test]
#[should_panic]
fn fail_missing_field() {
    run_pipeline(include_str!("fails/missing_field.taq"));
}

#[test]
#[should_panic]
fn fail_break_outside_loop() {
    run_pipeline(include_str!("fails/break_outside_loop.taq"));
}

#[test]
#[should_panic]
fn fail_function_literal_value() {
    run_pipeline(include_str!("fails/function_literal.taq"));
}
