//! Parsing
//!
//! This module is responsible for turning the source code from its string
//! form into an AST. The main interface is [parse] which takes a string and
//! generates an [crate::ast::Program].
//!
//! Internally, parsing works in two phases:
//! - the [lexer] scans the source text and turns it into a stream of tokens
//! - the [parser] generates the AST from these tokens
//!
//! Both the lexer and the parser are hand-written: the lexer walks a byte
//! cursor with one byte of lookahead, the parser is a Pratt parser driven by
//! prefix/infix dispatch tables over a two-token window.

use miette::Diagnostic;
use thiserror::Error;

use crate::{ast, Span};

mod lexer;
mod parser;

pub use lexer::Lexer;
pub use parser::Parser;

#[derive(Debug, Error, Diagnostic)]
pub enum ParsingError {
    #[error("Expected {expected}, got {found}")]
    UnexpectedToken {
        expected: String,
        found: String,

        #[label("here")]
        span: Span,
    },

    #[error("No prefix parser for {kind}")]
    NoPrefixParser {
        kind: String,

        #[label("cannot start an expression")]
        span: Span,
    },

    #[error("Cannot parse '{literal}' as integer")]
    InvalidInteger {
        literal: String,

        #[label("out of range")]
        span: Span,
    },
}

/// Parse source code into an AST, or collect every error the parser found
pub fn parse(source: &str) -> Result<ast::Program, Vec<ParsingError>> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();

    let errors = parser.into_errors();
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::ast::StatementKind;

    #[test]
    fn program() {
        let src = r#"
package demo

func main() {
    let x = 3
    let y = 4
    print(x + y)
    return 0
}
        "#;

        let program = parse(src).unwrap();
        assert_eq!(program.statements.len(), 2);

        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::Package { name } if name == "demo"
        ));

        let StatementKind::FunctionDecl(main) = &program.statements[1].kind else {
            panic!("expected function declaration");
        };
        assert_eq!(main.name, "main");
        assert_eq!(main.body.as_ref().unwrap().statements.len(), 4);
    }

    #[test]
    fn semicolons_are_optional() {
        let with = parse("let x = 1; print(x);").unwrap();
        let without = parse("let x = 1 print(x)").unwrap();
        assert_eq!(with.to_string(), without.to_string());
    }

    #[test]
    fn lex_clean_input_yields_no_errors() {
        let src = r#"func f(a: int) int { return a % 2 } f(10)"#;
        assert!(parse(src).is_ok());
    }

    #[test]
    fn illegal_token_is_a_parse_error() {
        let errors = parse("let x = @;").unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn parse_is_total_on_malformed_input() {
        // A pile of garbage must produce errors, never a panic
        let errors = parse("}{ ((( let = = 12x type , . func").unwrap_err();
        assert!(!errors.is_empty());
    }
}
