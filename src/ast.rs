//! Abstract syntax tree
//!
//! Two sum-type families, [StatementKind] and [ExpressionKind], each node
//! owning its children and carrying the span of its originating token. The
//! [std::fmt::Display] impls render a tree back into parseable source text;
//! the [ptree::TreeItem] impls back the driver's `--mode parse` view.

use std::borrow::Cow;
use std::fmt;
use std::io;

use ptree::{print_tree, Style, TreeItem};

use crate::Span;

pub type Ident = String;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Package {
        name: Ident,
    },
    Let {
        name: Ident,
        value: Expression,
    },
    Const {
        name: Ident,
        value: Expression,
    },
    Return {
        value: Option<Expression>,
    },
    Expression(Expression),
    Block(Block),
    FunctionDecl(FunctionDecl),
    TypeDecl(TypeDecl),
    While {
        condition: Expression,
        body: Block,
    },
    Break,
    Continue,
}

/// A brace-delimited statement sequence, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

/// `func NAME ( params ) [return-type] { body }`
///
/// `body` is `None` for forward declarations. The parser currently always
/// produces a body; the field permits declarations anyway.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Parameter>,
    pub return_type: Option<Ident>,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Ident,
    pub type_annotation: Option<Ident>,
    pub span: Span,
}

/// `type NAME { fields and methods }`
///
/// Field order is declaration order and establishes the struct layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: Ident,
    pub fields: Vec<StructField>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: Ident,
    pub type_name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Identifier(Ident),
    Integer(i64),
    /// Bytes between the quotes, taken verbatim (no escape decoding)
    String(String),
    Boolean(bool),

    Prefix {
        op: PrefixOp,
        right: Box<Expression>,
    },
    Infix {
        op: InfixOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    If {
        condition: Box<Expression>,
        consequence: Block,
        alternative: Option<Block>,
    },

    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Index {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    Member {
        object: Box<Expression>,
        property: Ident,
    },

    Array(Vec<Expression>),
    Composite {
        type_name: Ident,
        fields: Vec<(Ident, Expression)>,
    },
    FunctionLiteral {
        name: Option<Ident>,
        params: Vec<Parameter>,
        body: Block,
    },

    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    Greater,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Neg => write!(f, "-"),
            PrefixOp::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfixOp::Add => write!(f, "+"),
            InfixOp::Sub => write!(f, "-"),
            InfixOp::Mul => write!(f, "*"),
            InfixOp::Div => write!(f, "/"),
            InfixOp::Mod => write!(f, "%"),
            InfixOp::Eq => write!(f, "=="),
            InfixOp::NotEq => write!(f, "!="),
            InfixOp::Less => write!(f, "<"),
            InfixOp::Greater => write!(f, ">"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::Package { name } => write!(f, "package {name};"),
            StatementKind::Let { name, value } => write!(f, "let {name} = {value};"),
            StatementKind::Const { name, value } => write!(f, "const {name} = {value};"),
            StatementKind::Return { value: Some(value) } => write!(f, "return {value};"),
            StatementKind::Return { value: None } => write!(f, "return;"),
            StatementKind::Expression(expr) => write!(f, "{expr};"),
            StatementKind::Block(block) => write!(f, "{block}"),
            StatementKind::FunctionDecl(decl) => write!(f, "{decl}"),
            StatementKind::TypeDecl(decl) => write!(f, "{decl}"),
            StatementKind::While { condition, body } => write!(f, "while ({condition}) {body}"),
            StatementKind::Break => write!(f, "break;"),
            StatementKind::Continue => write!(f, "continue;"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for stmt in &self.statements {
            write!(f, "{stmt} ")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        if let Some(ret) = &self.return_type {
            write!(f, " {ret}")?;
        }
        match &self.body {
            Some(body) => write!(f, " {body}"),
            None => write!(f, ";"),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_annotation {
            Some(ty) => write!(f, "{}: {ty}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {} {{ ", self.name)?;
        for field in &self.fields {
            write!(f, "{}: {}; ", field.name, field.type_name)?;
        }
        for method in &self.methods {
            write!(f, "{method} ")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Identifier(name) => write!(f, "{name}"),
            ExpressionKind::Integer(value) => write!(f, "{value}"),
            ExpressionKind::String(value) => write!(f, "\"{value}\""),
            ExpressionKind::Boolean(value) => write!(f, "{value}"),
            ExpressionKind::Prefix { op, right } => write!(f, "({op}{right})"),
            ExpressionKind::Infix { op, left, right } => write!(f, "({left} {op} {right})"),
            ExpressionKind::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {condition} {consequence}")?;
                if let Some(alt) = alternative {
                    write!(f, " else {alt}")?;
                }
                Ok(())
            }
            ExpressionKind::Call { callee, arguments } => {
                write!(f, "{callee}(")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            ExpressionKind::Index { array, index } => write!(f, "({array}[{index}])"),
            ExpressionKind::Member { object, property } => write!(f, "({object}.{property})"),
            ExpressionKind::Array(elements) => {
                write!(f, "[")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
            ExpressionKind::Composite { type_name, fields } => {
                write!(f, "{type_name} {{ ")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, " }}")
            }
            ExpressionKind::FunctionLiteral { name, params, body } => {
                write!(f, "func")?;
                if let Some(name) = name {
                    write!(f, " {name}")?;
                }
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") {body}")
            }
            ExpressionKind::Assignment { target, value } => write!(f, "({target} = {value})"),
        }
    }
}

/// Unified node handle so statements and expressions share one tree view
#[derive(Debug, Clone)]
pub enum TreeNode {
    Stmt(Statement),
    Expr(Expression),
}

impl Program {
    pub fn pretty_print(&self) -> io::Result<()> {
        for stmt in &self.statements {
            print_tree(&TreeNode::Stmt(stmt.clone()))?;
        }
        Ok(())
    }
}

impl TreeItem for TreeNode {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        let label = match self {
            TreeNode::Stmt(stmt) => match &stmt.kind {
                StatementKind::Package { name } => format!("PACKAGE {name}"),
                StatementKind::Let { name, .. } => format!("LET {name}"),
                StatementKind::Const { name, .. } => format!("CONST {name}"),
                StatementKind::Return { .. } => String::from("RETURN"),
                StatementKind::Expression(_) => String::from("EXPR-STMT"),
                StatementKind::Block(_) => String::from("BLOCK"),
                StatementKind::FunctionDecl(decl) => format!("FUNC {}", signature(decl)),
                StatementKind::TypeDecl(decl) => format!("TYPE {}", decl.name),
                StatementKind::While { .. } => String::from("WHILE"),
                StatementKind::Break => String::from("BREAK"),
                StatementKind::Continue => String::from("CONTINUE"),
            },
            TreeNode::Expr(expr) => match &expr.kind {
                ExpressionKind::Identifier(name) => name.clone(),
                ExpressionKind::Integer(value) => value.to_string(),
                ExpressionKind::String(value) => format!("{value:?}"),
                ExpressionKind::Boolean(value) => value.to_string(),
                ExpressionKind::Prefix { op, .. } => op.to_string(),
                ExpressionKind::Infix { op, .. } => op.to_string(),
                ExpressionKind::If { .. } => String::from("IF"),
                ExpressionKind::Call { .. } => String::from("CALL"),
                ExpressionKind::Index { .. } => String::from("INDEX"),
                ExpressionKind::Member { property, .. } => format!(".{property}"),
                ExpressionKind::Array(_) => String::from("ARRAY"),
                ExpressionKind::Composite { type_name, .. } => format!("{type_name} {{...}}"),
                ExpressionKind::FunctionLiteral { .. } => String::from("FUNC-LITERAL"),
                ExpressionKind::Assignment { .. } => String::from("="),
            },
        };
        write!(f, "{}", style.paint(label))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        let children = match self {
            TreeNode::Stmt(stmt) => match &stmt.kind {
                StatementKind::Package { .. }
                | StatementKind::Break
                | StatementKind::Continue
                | StatementKind::Return { value: None } => vec![],
                StatementKind::Let { value, .. } | StatementKind::Const { value, .. } => {
                    vec![TreeNode::Expr(value.clone())]
                }
                StatementKind::Return { value: Some(value) } => vec![TreeNode::Expr(value.clone())],
                StatementKind::Expression(expr) => vec![TreeNode::Expr(expr.clone())],
                StatementKind::Block(block) => block_children(block),
                StatementKind::FunctionDecl(decl) => {
                    decl.body.as_ref().map(block_children).unwrap_or_default()
                }
                StatementKind::TypeDecl(decl) => decl
                    .methods
                    .iter()
                    .flat_map(|m| m.body.as_ref().map(block_children).unwrap_or_default())
                    .collect(),
                StatementKind::While { condition, body } => {
                    let mut nodes = vec![TreeNode::Expr(condition.clone())];
                    nodes.extend(block_children(body));
                    nodes
                }
            },
            TreeNode::Expr(expr) => match &expr.kind {
                ExpressionKind::Identifier(_)
                | ExpressionKind::Integer(_)
                | ExpressionKind::String(_)
                | ExpressionKind::Boolean(_) => vec![],
                ExpressionKind::Prefix { right, .. } => vec![TreeNode::Expr((**right).clone())],
                ExpressionKind::Infix { left, right, .. } => vec![
                    TreeNode::Expr((**left).clone()),
                    TreeNode::Expr((**right).clone()),
                ],
                ExpressionKind::If {
                    condition,
                    consequence,
                    alternative,
                } => {
                    let mut nodes = vec![TreeNode::Expr((**condition).clone())];
                    nodes.extend(block_children(consequence));
                    if let Some(alt) = alternative {
                        nodes.extend(block_children(alt));
                    }
                    nodes
                }
                ExpressionKind::Call { callee, arguments } => {
                    let mut nodes = vec![TreeNode::Expr((**callee).clone())];
                    nodes.extend(arguments.iter().cloned().map(TreeNode::Expr));
                    nodes
                }
                ExpressionKind::Index { array, index } => vec![
                    TreeNode::Expr((**array).clone()),
                    TreeNode::Expr((**index).clone()),
                ],
                ExpressionKind::Member { object, .. } => vec![TreeNode::Expr((**object).clone())],
                ExpressionKind::Array(elements) => {
                    elements.iter().cloned().map(TreeNode::Expr).collect()
                }
                ExpressionKind::Composite { fields, .. } => fields
                    .iter()
                    .map(|(_, value)| TreeNode::Expr(value.clone()))
                    .collect(),
                ExpressionKind::FunctionLiteral { body, .. } => block_children(body),
                ExpressionKind::Assignment { target, value } => vec![
                    TreeNode::Expr((**target).clone()),
                    TreeNode::Expr((**value).clone()),
                ],
            },
        };
        Cow::from(children)
    }
}

fn block_children(block: &Block) -> Vec<TreeNode> {
    block.statements.iter().cloned().map(TreeNode::Stmt).collect()
}

fn signature(decl: &FunctionDecl) -> String {
    let params: Vec<String> = decl.params.iter().map(ToString::to_string).collect();
    format!("{}({})", decl.name, params.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(kind: ExpressionKind) -> Expression {
        Expression::new(kind, Span::default())
    }

    #[test]
    fn infix_rendering_is_parenthesized() {
        let tree = expr(ExpressionKind::Infix {
            op: InfixOp::Add,
            left: Box::new(expr(ExpressionKind::Integer(1))),
            right: Box::new(expr(ExpressionKind::Infix {
                op: InfixOp::Mul,
                left: Box::new(expr(ExpressionKind::Integer(2))),
                right: Box::new(expr(ExpressionKind::Integer(3))),
            })),
        });

        assert_eq!(tree.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn let_statement_rendering() {
        let stmt = Statement::new(
            StatementKind::Let {
                name: String::from("x"),
                value: expr(ExpressionKind::Integer(42)),
            },
            Span::default(),
        );

        assert_eq!(stmt.to_string(), "let x = 42;");
    }

    #[test]
    fn composite_literal_rendering() {
        let lit = expr(ExpressionKind::Composite {
            type_name: String::from("Pessoa"),
            fields: vec![
                (
                    String::from("nome"),
                    expr(ExpressionKind::String(String::from("Ana"))),
                ),
                (String::from("idade"), expr(ExpressionKind::Integer(30))),
            ],
        });

        assert_eq!(lit.to_string(), "Pessoa { nome: \"Ana\", idade: 30 }");
    }
}
