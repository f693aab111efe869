use inkwell::context::Context;

/// Drive source text through the whole pipeline and return the textual IR.
/// Panics on any stage failure, including module verification.
pub fn run_pipeline(src: &str) -> String {
    let program = taquion::parse(src).unwrap();
    let context = Context::create();
    let module = taquion::compile(&context, &program).unwrap();
    module.verify().unwrap();
    module.print_to_string().to_string()
}
