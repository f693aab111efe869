pub mod ast;
pub mod codegen;
pub mod parsing;
pub mod token;

mod span;

pub use codegen::compile;
pub use parsing::parse;
pub use span::Span;
