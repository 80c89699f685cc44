//! Statement AST nodes
//!
//! Statements do not produce values: declarations, control flow,
//! import/export, and class bodies (fields, methods, a single constructor,
//! operator overloads).

use super::expression::Expr;
use super::types::TypeAnnotation;
use crate::token::{Span, Token};

/// Top-level or block-level statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression statement (calls, assignments, …)
    Expression(ExprStmt),

    /// Function declaration
    FunctionDecl(FunctionDecl),

    /// Class declaration
    ClassDecl(ClassDecl),

    /// If statement
    If(IfStmt),

    /// C-style for loop
    For(ForStmt),

    /// For-each: for (i, v in iterable)
    ForEach(ForEachStmt),

    /// Switch with fall-through clauses
    Switch(SwitchStmt),

    /// Return statement
    Return(ReturnStmt),

    /// Break statement
    Break(BreakStmt),

    /// Import statement
    Import(ImportStmt),

    /// Export statement
    Export(ExportStmt),
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expression(s) => s.span,
            Stmt::FunctionDecl(s) => s.span,
            Stmt::ClassDecl(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::ForEach(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Break(s) => s.span,
            Stmt::Import(s) => s.span,
            Stmt::Export(s) => s.span,
        }
    }
}

/// Expression used in statement position
#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_annotation: Option<TypeAnnotation>,
    pub span: Span,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Visibility modifier for class members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Private,
    Protected,
    #[default]
    Public,
}

/// Class field with optional default-value expression
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub type_annotation: Option<TypeAnnotation>,
    pub default: Option<Expr>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub span: Span,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Vec<Stmt>,
    pub is_static: bool,
    pub visibility: Visibility,
    pub span: Span,
}

/// Constructor declaration (at most one per class)
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub class_name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Operator overload declaration; the parameter types form the dispatch
/// signature.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDecl {
    pub class_name: String,
    pub operator: Token,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Class declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<FieldDecl>,
    pub constructor: Option<ConstructorDecl>,
    pub methods: Vec<MethodDecl>,
    pub operators: Vec<OperatorDecl>,
    pub span: Span,
}

/// If/else statement
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Vec<Stmt>,
    pub span: Span,
}

/// C-style for loop; all three headers optional
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// For-each loop: `for (i, v in iterable)`; `i` is an index for arrays and
/// a key for objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStmt {
    pub index_var: String,
    pub value_var: String,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// One switch clause; `value` is None for the default clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
    pub is_default: bool,
    pub span: Span,
}

/// Switch statement; clauses fall through until `break`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub discriminant: Expr,
    pub cases: Vec<CaseClause>,
    pub span: Span,
}

/// Return statement with optional value
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

/// Break statement
#[derive(Debug, Clone, PartialEq)]
pub struct BreakStmt {
    pub span: Span,
}

/// Import specifier: `name` or `name as local`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
    pub is_default: bool,
}

/// Import statement
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    pub specifiers: Vec<ImportSpecifier>,
    pub module_path: String,
    pub is_namespace: bool,
    pub namespace_name: Option<String>,
    pub span: Span,
}

/// Export specifier: `name` or `name as exported`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// Export statement: either specifiers or a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ExportStmt {
    pub specifiers: Vec<ExportSpecifier>,
    pub declaration: Option<Box<Stmt>>,
    pub is_default: bool,
    pub span: Span,
}
