mod common;
use common::run_pipeline;

#[test]
fn minimal() {
    run_pipeline(include_str!("../demos/minimal.taq"));
}

#[test]
fn language_tour() {
    run_pipeline(include_str!("../demos/language-tour.taq"));
}

#[test]
fn fib() {
    run_pipeline(include_str!("../demos/fib.taq"));
}

#[test]
fn strings() {
    run_pipeline(include_str!("../demos/strings.taq"));
}

#[test]
fn arrays() {
    run_pipeline(include_str!("../demos/arrays.taq"));
}

#[test]
fn structs() {
    run_pipeline(include_str!("../demos/structs.taq"));
}
