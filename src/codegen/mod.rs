//! Code generation
//!
//! This module is responsible for lowering an AST into an LLVM module. The
//! main interface is [compile] which walks the program once, maintaining a
//! lexically-scoped symbol table, and emits IR through inkwell's builder.
//!
//! External C helpers (`printf`, `malloc`, `strlen`, `strcpy`, `strcat`) are
//! declared eagerly at construction; they back the `print` builtin and the
//! string `+` operator. The emitted module is always named `main_module` and
//! always ends up with an `i32 main()`, stubbed in when the program does not
//! declare one.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue, IntValue};
use inkwell::{AddressSpace, IntPredicate};

use crate::{ast, Span};

mod expression;
mod statement;
mod symbol;

pub use symbol::{SymbolEntry, SymbolTable};

#[derive(Debug, Error, Diagnostic)]
pub enum CodegenError {
    #[error("The LLVM builder failed")]
    Builder(#[from] BuilderError),

    #[error("Undefined symbol `{name}`")]
    UndefinedSymbol {
        name: String,

        #[label("not found in any scope")]
        span: Span,
    },

    #[error("The function `{name}` is not defined")]
    UndefinedFunction {
        name: String,

        #[label("unknown function")]
        span: Span,
    },

    #[error("Cannot assign to constant `{name}`")]
    AssignToConstant {
        name: String,

        #[label("declared with `const`")]
        span: Span,
    },

    #[error("Unknown type `{name}`")]
    UnknownType {
        name: String,

        #[label("not a builtin or declared type")]
        span: Span,
    },

    #[error("The type `{type_name}` has no field `{field}`")]
    UnknownField {
        type_name: String,
        field: String,

        #[label("unknown field")]
        span: Span,
    },

    #[error("Missing field `{field}` in literal of type `{type_name}`")]
    MissingField {
        type_name: String,
        field: String,

        #[label("in this literal")]
        span: Span,
    },

    #[error("`{name}` is not a struct value")]
    NotAStruct {
        name: String,

        #[label("has no fields or methods")]
        span: Span,
    },

    #[error("The variable `{name}` is not an indexable array")]
    NotAnArray {
        name: String,

        #[label("cannot be indexed")]
        span: Span,
    },

    #[error("Only named arrays can be indexed")]
    UnsupportedIndexTarget {
        #[label("expected an identifier")]
        span: Span,
    },

    #[error("Assignment target must be an identifier or an array index")]
    InvalidAssignmentTarget {
        #[label("cannot be assigned to")]
        span: Span,
    },

    #[error("`break` outside of a loop")]
    BreakOutsideLoop {
        #[label("no enclosing loop")]
        span: Span,
    },

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop {
        #[label("no enclosing loop")]
        span: Span,
    },

    #[error("Mismatched integer widths in binary operation")]
    #[diagnostic(help("widen the narrower operand explicitly at its declaration"))]
    MixedIntWidths {
        #[label("operands differ in width")]
        span: Span,
    },

    #[error("Expected an integer operand")]
    NonIntegerOperand {
        #[label("not an integer")]
        span: Span,
    },

    #[error("This expression produces no value")]
    VoidValue {
        #[label("used as a value")]
        span: Span,
    },

    #[error("Anonymous function values are not supported")]
    #[diagnostic(help("declare the function at the top level with `func name(...)`"))]
    UnsupportedFunctionLiteral {
        #[label("function literal")]
        span: Span,
    },

    #[error("Only named functions and methods can be called")]
    UnsupportedCallee {
        #[label("cannot be called")]
        span: Span,
    },

    #[error("Member access requires a named struct variable")]
    UnsupportedMemberTarget {
        #[label("expected an identifier")]
        span: Span,
    },

    #[error("`print` expects exactly one argument")]
    PrintArity {
        #[label("this call")]
        span: Span,
    },

    #[error("`print` cannot format this value")]
    UnsupportedPrintArgument {
        #[label("neither integer nor string")]
        span: Span,
    },

    #[error("This statement is only allowed inside a function")]
    OutsideFunction {
        #[label("at the top level")]
        span: Span,
    },
}

type Result<T> = std::result::Result<T, CodegenError>;

/// Lower a program into a fresh LLVM module owned by `context`
pub fn compile<'ctx>(
    context: &'ctx Context,
    program: &ast::Program,
) -> Result<Module<'ctx>> {
    let mut codegen = Codegen::new(context);

    for stmt in &program.statements {
        codegen.lower_statement(stmt)?;
    }
    codegen.ensure_main()?;

    Ok(codegen.module)
}

/// Per-struct layout facts recorded by `type` declarations
#[derive(Debug, Clone)]
pub(crate) struct StructInfo<'ctx> {
    pub ty: StructType<'ctx>,
    /// Field names and types in declaration order; this is the constructor's
    /// parameter order and the ABI layout
    pub fields: Vec<(String, BasicTypeEnum<'ctx>)>,
    pub indices: HashMap<String, u32>,
}

pub(crate) struct Codegen<'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    pub(crate) symbols: SymbolTable<'ctx>,
    pub(crate) structs: HashMap<String, StructInfo<'ctx>>,

    /// Return type of the function currently being lowered
    pub(crate) current_return_type: Option<BasicTypeEnum<'ctx>>,
    /// Innermost loop's condition block, jump target of `continue`
    pub(crate) loop_cond: Option<BasicBlock<'ctx>>,
    /// Innermost loop's exit block, jump target of `break`
    pub(crate) loop_end: Option<BasicBlock<'ctx>>,

    pub(crate) printf: FunctionValue<'ctx>,
    pub(crate) malloc: FunctionValue<'ctx>,
    pub(crate) strlen: FunctionValue<'ctx>,
    pub(crate) strcpy: FunctionValue<'ctx>,
    pub(crate) strcat: FunctionValue<'ctx>,
}

impl<'ctx> Codegen<'ctx> {
    fn new(context: &'ctx Context) -> Self {
        let module = context.create_module("main_module");
        let builder = context.create_builder();

        let ptr_type = context.i8_type().ptr_type(AddressSpace::default());
        let i32_type = context.i32_type();
        let i64_type = context.i64_type();

        let printf_type = i32_type.fn_type(&[ptr_type.into()], true);
        let printf = module.add_function("printf", printf_type, Some(Linkage::External));

        let malloc_type = ptr_type.fn_type(&[i64_type.into()], false);
        let malloc = module.add_function("malloc", malloc_type, Some(Linkage::External));

        let strlen_type = i64_type.fn_type(&[ptr_type.into()], false);
        let strlen = module.add_function("strlen", strlen_type, Some(Linkage::External));

        let binary_str_type = ptr_type.fn_type(&[ptr_type.into(), ptr_type.into()], false);
        let strcpy = module.add_function("strcpy", binary_str_type, Some(Linkage::External));
        let strcat = module.add_function("strcat", binary_str_type, Some(Linkage::External));

        Self {
            context,
            module,
            builder,
            symbols: SymbolTable::new(),
            structs: HashMap::new(),
            current_return_type: None,
            loop_cond: None,
            loop_end: None,
            printf,
            malloc,
            strlen,
            strcpy,
            strcat,
        }
    }

    /// Append a stub `i32 main() {{ ret i32 0 }}` so the module always links
    fn ensure_main(&mut self) -> Result<()> {
        if self.module.get_function("main").is_some() {
            return Ok(());
        }
        log::debug!("no user-defined main, appending a stub");

        let fn_type = self.context.i32_type().fn_type(&[], false);
        let main_fn = self.module.add_function("main", fn_type, None);
        let entry = self.context.append_basic_block(main_fn, "entry");
        self.builder.position_at_end(entry);
        self.builder
            .build_return(Some(&self.context.i32_type().const_zero()))?;
        Ok(())
    }

    /// Map a source-level type name to its LLVM type
    pub(crate) fn lookup_type(&self, name: &str, span: Span) -> Result<BasicTypeEnum<'ctx>> {
        Ok(match name {
            "int" | "int32" => self.context.i32_type().into(),
            "int8" => self.context.i8_type().into(),
            "int64" => self.context.i64_type().into(),
            "bool" => self.context.bool_type().into(),
            "string" => self.context.i8_type().ptr_type(AddressSpace::default()).into(),
            other => {
                let info = self.structs.get(other).ok_or(CodegenError::UnknownType {
                    name: other.to_string(),
                    span,
                })?;
                info.ty.into()
            }
        })
    }

    /// Terminators end a block; nothing may be appended after one
    pub(crate) fn current_block_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .is_some_and(|block| block.get_terminator().is_some())
    }

    /// The function owning the builder's insert block
    pub(crate) fn active_function(&self, span: Span) -> Result<FunctionValue<'ctx>> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .ok_or(CodegenError::OutsideFunction { span })
    }

    pub(crate) fn require_block(&self, span: Span) -> Result<()> {
        if self.builder.get_insert_block().is_none() {
            return Err(CodegenError::OutsideFunction { span });
        }
        Ok(())
    }

    pub(crate) fn expect_int(
        &self,
        value: BasicValueEnum<'ctx>,
        span: Span,
    ) -> Result<IntValue<'ctx>> {
        match value {
            BasicValueEnum::IntValue(value) => Ok(value),
            _ => Err(CodegenError::NonIntegerOperand { span }),
        }
    }

    /// Coerce a lowered value into an `i1` for a conditional branch
    pub(crate) fn as_condition(
        &self,
        value: BasicValueEnum<'ctx>,
        span: Span,
    ) -> Result<IntValue<'ctx>> {
        let value = self.expect_int(value, span)?;
        if value.get_type().get_bit_width() == 1 {
            return Ok(value);
        }
        let zero = value.get_type().const_zero();
        Ok(self
            .builder
            .build_int_compare(IntPredicate::NE, value, zero, "ifcond")?)
    }

    /// Sign-extend `value` when it is an integer narrower than an integer
    /// `expected` type; anything else passes through unchanged
    pub(crate) fn widen_to(
        &self,
        value: BasicValueEnum<'ctx>,
        expected: BasicTypeEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>> {
        if let (BasicValueEnum::IntValue(int), BasicTypeEnum::IntType(expected)) = (value, expected)
        {
            if int.get_type().get_bit_width() < expected.get_bit_width() {
                let widened = self
                    .builder
                    .build_int_s_extend(int, expected, "widen")?;
                return Ok(widened.into());
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(src: &str) -> std::result::Result<String, CodegenError> {
        let program = crate::parsing::parse(src).expect("test sources parse");
        let context = Context::create();
        let module = compile(&context, &program)?;
        module
            .verify()
            .unwrap_or_else(|msg| panic!("module verification failed: {msg}"));
        Ok(module.print_to_string().to_string())
    }

    #[test]
    fn empty_program_still_has_main() {
        let ir = build("package demo").unwrap();
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn external_helpers_are_declared() {
        let ir = build("func main() { return 0 }").unwrap();
        for name in ["printf", "malloc", "strlen", "strcpy", "strcat"] {
            assert!(ir.contains(&format!("@{name}")), "missing @{name}");
        }
        assert!(ir.contains("declare"));
    }

    #[test]
    fn module_is_named_main_module() {
        let ir = build("func main() { return 0 }").unwrap();
        assert!(ir.contains("main_module"));
    }

    #[test]
    fn main_returns_integer() {
        let ir = build("func main() { return 42 }").unwrap();
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("ret i32 42"));
    }

    #[test]
    fn let_allocates_and_stores() {
        let ir = build("func main() { let x = 3; let y = 4; print(x + y); return 0 }").unwrap();
        assert!(ir.contains("alloca i32"));
        assert!(ir.contains("@printf"));
        assert!(ir.contains("%d"));
    }

    #[test]
    fn while_loop_produces_labeled_blocks() {
        let src = "func main() {
            let i = 0
            while (i < 10) { if (i == 5) { break } i = i + 1 }
            print(i)
            return 0
        }";
        let ir = build(src).unwrap();
        assert!(ir.contains("loop_cond"));
        assert!(ir.contains("loop_body"));
        assert!(ir.contains("loop_end"));
    }

    #[test]
    fn user_function_call_with_widened_args() {
        let src = "func add(a, b) { return a + b } func main() { print(add(20, 22)); return 0 }";
        let ir = build(src).unwrap();
        assert!(ir.contains("define i32 @add(i32 %a, i32 %b)"));
        assert!(ir.contains("call i32 @add"));
    }

    #[test]
    fn string_concat_goes_through_libc() {
        let src = r#"func main() { let s = "hello, " + "world"; print(s); return 0 }"#;
        let ir = build(src).unwrap();
        for helper in ["strlen", "malloc", "strcpy", "strcat"] {
            assert!(ir.contains(&format!("@{helper}")), "missing call to {helper}");
        }
        assert!(ir.contains("%s"));
    }

    #[test]
    fn struct_constructor_and_method_are_emitted() {
        let src = r#"
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
"#;
        let ir = build(src).unwrap();
        assert!(ir.contains("%Pessoa = type"));
        assert!(ir.contains("@\"Pessoa.constructor\"") || ir.contains("@Pessoa.constructor"));
        assert!(ir.contains("@\"Pessoa.saudacao\"") || ir.contains("@Pessoa.saudacao"));
    }

    #[test]
    fn composite_fields_reorder_to_declaration_order() {
        let src = r#"
type Point { x: int; y: int; }
func main() {
    let p = Point { y: 2, x: 1 }
    print(p.x)
    return 0
}
"#;
        // Out-of-order literal keys must still produce a verifiable call
        build(src).unwrap();
    }

    #[test]
    fn arrays_allocate_and_index() {
        let src = "func main() { let xs = [1, 2, 3]; xs[0] = 9; print(xs[0]); return 0 }";
        let ir = build(src).unwrap();
        assert!(ir.contains("alloca [3 x i32]"));
        assert!(ir.contains("getelementptr"));
    }

    #[test]
    fn scope_ends_at_closing_brace() {
        let src = "func main() { { let x = 1; print(x) } print(x); return 0 }";
        let err = build(src).unwrap_err();
        assert!(matches!(err, CodegenError::UndefinedSymbol { name, .. } if name == "x"));
    }

    #[test]
    fn undefined_symbol_is_named_in_the_error() {
        let err = build("func main() { return foo }").unwrap_err();
        assert!(matches!(err, CodegenError::UndefinedSymbol { name, .. } if name == "foo"));
    }

    #[test]
    fn assigning_to_const_is_rejected() {
        let err = build("func main() { const x = 1; x = 2; return 0 }").unwrap_err();
        assert!(matches!(err, CodegenError::AssignToConstant { name, .. } if name == "x"));
    }

    #[test]
    fn missing_composite_field_names_type_and_field() {
        let src = r#"
type Pessoa { nome: string; idade: int; }
func main() { let p = Pessoa { nome: "Ana" }; return 0 }
"#;
        let err = build(src).unwrap_err();
        match err {
            CodegenError::MissingField {
                type_name, field, ..
            } => {
                assert_eq!(type_name, "Pessoa");
                assert_eq!(field, "idade");
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn unknown_composite_field_is_rejected() {
        let src = r#"
type Pessoa { nome: string; }
func main() { let p = Pessoa { nome: "Ana", idade: 30 }; return 0 }
"#;
        let err = build(src).unwrap_err();
        assert!(matches!(err, CodegenError::UnknownField { field, .. } if field == "idade"));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let err = build("func main() { break; return 0 }").unwrap_err();
        assert!(matches!(err, CodegenError::BreakOutsideLoop { .. }));
    }

    #[test]
    fn continue_outside_loop_is_rejected() {
        let err = build("func main() { continue; return 0 }").unwrap_err();
        assert!(matches!(err, CodegenError::ContinueOutsideLoop { .. }));
    }

    #[test]
    fn function_literal_values_are_rejected() {
        let err = build("func main() { let f = func(x) { return x }; return 0 }").unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedFunctionLiteral { .. }));
    }

    #[test]
    fn top_level_const_integers_are_usable() {
        let src = "const limit = 3 func main() { print(limit); return 0 }";
        let ir = build(src).unwrap();
        assert!(ir.contains("i32 3"));
    }

    #[test]
    fn nested_loops_restore_break_targets() {
        let src = "func main() {
            let i = 0
            while (i < 3) {
                let j = 0
                while (j < 3) {
                    if (j == 1) { break }
                    j = j + 1
                }
                i = i + 1
            }
            print(i)
            return 0
        }";
        build(src).unwrap();
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let src = "func main() { let x = 1; while (x < 5) { x = x + 1 } print(x); return 0 }";
        assert_eq!(build(src).unwrap(), build(src).unwrap());
    }
}
