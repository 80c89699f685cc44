//! Statement parsing: declarations, control flow, classes, import/export.

use super::{expr, ParseError, Parser};
use crate::ast::*;
use crate::token::Token;

/// Parse a single statement.
pub fn parse_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    match p.current() {
        Token::Let | Token::Var | Token::Const => parse_variable_declaration(p),
        Token::Function => {
            // `function name(...)` is a declaration; an anonymous
            // `function (...)` in statement position is an expression.
            if matches!(p.peek(), Some(Token::Identifier(_))) {
                parse_function_declaration(p)
            } else {
                parse_expression_statement(p)
            }
        }
        Token::Class => parse_class_declaration(p),
        Token::If => parse_if_statement(p),
        Token::For => parse_for_statement(p),
        Token::Switch => parse_switch_statement(p),
        Token::Return => parse_return_statement(p),
        Token::Break => parse_break_statement(p),
        Token::Import => parse_import_statement(p),
        Token::Export => parse_export_statement(p),
        _ => parse_expression_statement(p),
    }
}

/// Parse a `{ ... }` block of statements.
pub fn parse_block(p: &mut Parser) -> Result<Vec<Stmt>, ParseError> {
    p.expect(Token::LeftBrace)?;
    let mut body = Vec::new();
    while !p.check(&Token::RightBrace) && !p.at_eof() {
        body.push(parse_statement(p)?);
    }
    p.expect(Token::RightBrace)?;
    Ok(body)
}

/// Parse a `( name: type, ... )` parameter list.
pub fn parse_params(p: &mut Parser) -> Result<Vec<Param>, ParseError> {
    p.expect(Token::LeftParen)?;
    let mut params = Vec::new();
    if !p.check(&Token::RightParen) {
        loop {
            let span = p.current_span();
            let name = p.expect_identifier()?;
            let type_annotation = if p.eat(&Token::Colon) {
                Some(parse_type(p)?)
            } else {
                None
            };
            params.push(Param {
                name,
                type_annotation,
                span,
            });
            if !p.eat(&Token::Comma) {
                break;
            }
        }
    }
    p.expect(Token::RightParen)?;
    Ok(params)
}

/// Parse a type annotation: a named type with optional `[]` suffixes.
pub fn parse_type(p: &mut Parser) -> Result<TypeAnnotation, ParseError> {
    let name = p.expect_identifier()?;
    let mut ty = TypeAnnotation::Named(name);
    while p.check(&Token::LeftBracket) && matches!(p.peek(), Some(Token::RightBracket)) {
        p.advance();
        p.advance();
        ty = TypeAnnotation::Array(Box::new(ty));
    }
    Ok(ty)
}

fn parse_expression_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    let expr = expr::parse_expression(p)?;
    p.expect(Token::Semicolon)?;
    Ok(Stmt::Expression(ExprStmt { expr, span }))
}

/// `let x: T = v;` lowers to an assignment expression carrying the declared
/// type; a `T[]` annotation over an array literal produces a typed-array
/// literal.
fn parse_variable_declaration(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.advance(); // let / var / const

    let name = p.expect_identifier()?;
    let declared_type = if p.eat(&Token::Colon) {
        Some(parse_type(p)?)
    } else {
        None
    };

    let value = if p.eat(&Token::Equal) {
        expr::parse_expression(p)?
    } else {
        Expr::Number(NumberLit { value: 0.0, span })
    };

    let value = match (&declared_type, value) {
        (Some(TypeAnnotation::Array(elem)), Expr::Array(array)) => {
            Expr::TypedArray(TypedArrayLit {
                element: (**elem).clone(),
                elements: array.elements,
                span: array.span,
            })
        }
        (_, value) => value,
    };

    p.expect(Token::Semicolon)?;

    Ok(Stmt::Expression(ExprStmt {
        expr: Expr::Assignment(Assignment {
            name,
            value: Box::new(value),
            declared_type,
            span,
        }),
        span,
    }))
}

fn parse_function_declaration(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Function)?;
    let name = p.expect_identifier()?;
    let params = parse_params(p)?;
    let return_type = if p.eat(&Token::Colon) {
        Some(parse_type(p)?)
    } else {
        None
    };
    let body = parse_block(p)?;
    Ok(Stmt::FunctionDecl(FunctionDecl {
        name,
        params,
        return_type,
        body,
        span,
    }))
}

fn parse_if_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::If)?;
    p.expect(Token::LeftParen)?;
    let condition = expr::parse_expression(p)?;
    p.expect(Token::RightParen)?;
    let then_body = parse_block(p)?;

    let else_body = if p.eat(&Token::Else) {
        if p.check(&Token::If) {
            vec![parse_if_statement(p)?]
        } else {
            parse_block(p)?
        }
    } else {
        Vec::new()
    };

    Ok(Stmt::If(IfStmt {
        condition,
        then_body,
        else_body,
        span,
    }))
}

fn parse_for_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::For)?;
    p.expect(Token::LeftParen)?;

    // for (i, v in iterable)
    if matches!(p.current(), Token::Identifier(_)) && matches!(p.peek(), Some(Token::Comma)) {
        let index_var = p.expect_identifier()?;
        p.expect(Token::Comma)?;
        let value_var = p.expect_identifier()?;
        p.expect(Token::In)?;
        let iterable = expr::parse_expression(p)?;
        p.expect(Token::RightParen)?;
        let body = parse_block(p)?;
        return Ok(Stmt::ForEach(ForEachStmt {
            index_var,
            value_var,
            iterable,
            body,
            span,
        }));
    }

    // C-style: all three headers optional
    let init = if p.eat(&Token::Semicolon) {
        None
    } else if matches!(p.current(), Token::Let | Token::Var | Token::Const) {
        Some(Box::new(parse_variable_declaration(p)?))
    } else {
        let init_span = p.current_span();
        let init_expr = expr::parse_expression(p)?;
        p.expect(Token::Semicolon)?;
        Some(Box::new(Stmt::Expression(ExprStmt {
            expr: init_expr,
            span: init_span,
        })))
    };

    let condition = if p.check(&Token::Semicolon) {
        None
    } else {
        Some(expr::parse_expression(p)?)
    };
    p.expect(Token::Semicolon)?;

    let update = if p.check(&Token::RightParen) {
        None
    } else {
        Some(expr::parse_expression(p)?)
    };
    p.expect(Token::RightParen)?;

    let body = parse_block(p)?;

    Ok(Stmt::For(ForStmt {
        init,
        condition,
        update,
        body,
        span,
    }))
}

fn parse_switch_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Switch)?;
    p.expect(Token::LeftParen)?;
    let discriminant = expr::parse_expression(p)?;
    p.expect(Token::RightParen)?;
    p.expect(Token::LeftBrace)?;

    let mut cases = Vec::new();
    while !p.check(&Token::RightBrace) && !p.at_eof() {
        let case_span = p.current_span();
        if p.eat(&Token::Case) {
            let value = expr::parse_expression(p)?;
            p.expect(Token::Colon)?;
            let body = parse_case_body(p)?;
            cases.push(CaseClause {
                value: Some(value),
                body,
                is_default: false,
                span: case_span,
            });
        } else if p.eat(&Token::Default) {
            p.expect(Token::Colon)?;
            let body = parse_case_body(p)?;
            cases.push(CaseClause {
                value: None,
                body,
                is_default: true,
                span: case_span,
            });
        } else {
            return Err(p.unexpected_token(&[Token::Case, Token::Default]));
        }
    }
    p.expect(Token::RightBrace)?;

    Ok(Stmt::Switch(SwitchStmt {
        discriminant,
        cases,
        span,
    }))
}

fn parse_case_body(p: &mut Parser) -> Result<Vec<Stmt>, ParseError> {
    let mut body = Vec::new();
    while !p.check(&Token::Case) && !p.check(&Token::Default) && !p.check(&Token::RightBrace) {
        body.push(parse_statement(p)?);
    }
    Ok(body)
}

fn parse_return_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Return)?;
    let value = if p.check(&Token::Semicolon) {
        None
    } else {
        Some(expr::parse_expression(p)?)
    };
    p.expect(Token::Semicolon)?;
    Ok(Stmt::Return(ReturnStmt { value, span }))
}

fn parse_break_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Break)?;
    p.expect(Token::Semicolon)?;
    Ok(Stmt::Break(BreakStmt { span }))
}

fn parse_class_declaration(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Class)?;
    let name = p.expect_identifier()?;
    let parent = if p.eat(&Token::Extends) {
        Some(p.expect_identifier()?)
    } else {
        None
    };
    p.expect(Token::LeftBrace)?;

    let mut fields = Vec::new();
    let mut methods = Vec::new();
    let mut operators = Vec::new();
    let mut constructor = None;

    while !p.check(&Token::RightBrace) && !p.at_eof() {
        let member_span = p.current_span();

        let visibility = match p.current() {
            Token::Public => {
                p.advance();
                Visibility::Public
            }
            Token::Private => {
                p.advance();
                Visibility::Private
            }
            Token::Protected => {
                p.advance();
                Visibility::Protected
            }
            _ => Visibility::Public,
        };
        let is_static = p.eat(&Token::Static);

        match p.current() {
            Token::Constructor => {
                p.advance();
                let params = parse_params(p)?;
                let body = parse_block(p)?;
                if constructor.is_some() {
                    return Err(ParseError::invalid_syntax(
                        format!("class '{}' has more than one constructor", name),
                        member_span,
                    ));
                }
                constructor = Some(ConstructorDecl {
                    class_name: name.clone(),
                    params,
                    body,
                    span: member_span,
                });
            }
            Token::Operator => {
                p.advance();
                let operator = parse_operator_token(p)?;
                let params = parse_params(p)?;
                let return_type = if p.eat(&Token::Colon) {
                    Some(parse_type(p)?)
                } else {
                    None
                };
                let body = parse_block(p)?;
                operators.push(OperatorDecl {
                    class_name: name.clone(),
                    operator,
                    params,
                    return_type,
                    body,
                    span: member_span,
                });
            }
            Token::Identifier(_) => {
                let member_name = p.expect_identifier()?;
                if p.check(&Token::LeftParen) {
                    let params = parse_params(p)?;
                    let return_type = if p.eat(&Token::Colon) {
                        Some(parse_type(p)?)
                    } else {
                        None
                    };
                    let body = parse_block(p)?;
                    methods.push(MethodDecl {
                        name: member_name,
                        params,
                        return_type,
                        body,
                        is_static,
                        visibility,
                        span: member_span,
                    });
                } else {
                    let type_annotation = if p.eat(&Token::Colon) {
                        Some(parse_type(p)?)
                    } else {
                        None
                    };
                    let default = if p.eat(&Token::Equal) {
                        Some(expr::parse_expression(p)?)
                    } else {
                        None
                    };
                    p.expect(Token::Semicolon)?;
                    fields.push(FieldDecl {
                        name: member_name,
                        type_annotation,
                        default,
                        visibility,
                        is_static,
                        span: member_span,
                    });
                }
            }
            _ => {
                return Err(p.unexpected_token(&[
                    Token::Constructor,
                    Token::Operator,
                    Token::Identifier(String::new()),
                ]))
            }
        }
    }
    p.expect(Token::RightBrace)?;

    Ok(Stmt::ClassDecl(ClassDecl {
        name,
        parent,
        fields,
        constructor,
        methods,
        operators,
        span,
    }))
}

/// The token naming an overloaded operator: `+`, `==`, `[]`, …
/// `[]` is spelled as two tokens and reported as `LeftBracket`.
fn parse_operator_token(p: &mut Parser) -> Result<Token, ParseError> {
    let tok = p.current().clone();
    match tok {
        Token::Plus
        | Token::Minus
        | Token::Star
        | Token::Slash
        | Token::Percent
        | Token::StarStar
        | Token::EqualEqual
        | Token::BangEqual
        | Token::Less
        | Token::Greater
        | Token::LessEqual
        | Token::GreaterEqual => {
            p.advance();
            Ok(tok)
        }
        Token::LeftBracket => {
            p.advance();
            p.expect(Token::RightBracket)?;
            Ok(Token::LeftBracket)
        }
        _ => Err(ParseError::invalid_syntax(
            format!("'{}' cannot be overloaded", tok),
            p.current_span(),
        )),
    }
}

fn parse_import_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Import)?;

    let mut specifiers = Vec::new();
    let mut is_namespace = false;
    let mut namespace_name = None;

    if p.eat(&Token::LeftBrace) {
        // import { a, b as c } from "mod"
        while !p.check(&Token::RightBrace) {
            let imported = p.expect_identifier()?;
            let local = if p.eat(&Token::As) {
                p.expect_identifier()?
            } else {
                imported.clone()
            };
            specifiers.push(ImportSpecifier {
                imported,
                local,
                is_default: false,
            });
            if !p.eat(&Token::Comma) {
                break;
            }
        }
        p.expect(Token::RightBrace)?;
    } else if p.eat(&Token::Star) {
        // import * as ns from "mod"
        p.expect(Token::As)?;
        is_namespace = true;
        namespace_name = Some(p.expect_identifier()?);
    } else {
        // import name from "mod"  (default import)
        let name = p.expect_identifier()?;
        specifiers.push(ImportSpecifier {
            imported: name.clone(),
            local: name,
            is_default: true,
        });
    }

    p.expect(Token::From)?;
    let module_path = match p.current().clone() {
        Token::StringLit(path) => {
            p.advance();
            path
        }
        _ => {
            return Err(ParseError::invalid_syntax(
                "expected module path string",
                p.current_span(),
            ))
        }
    };
    p.expect(Token::Semicolon)?;

    Ok(Stmt::Import(ImportStmt {
        specifiers,
        module_path,
        is_namespace,
        namespace_name,
        span,
    }))
}

fn parse_export_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let span = p.current_span();
    p.expect(Token::Export)?;

    if p.eat(&Token::Default) {
        let declaration = parse_statement(p)?;
        return Ok(Stmt::Export(ExportStmt {
            specifiers: Vec::new(),
            declaration: Some(Box::new(declaration)),
            is_default: true,
            span,
        }));
    }

    if p.eat(&Token::LeftBrace) {
        let mut specifiers = Vec::new();
        while !p.check(&Token::RightBrace) {
            let local = p.expect_identifier()?;
            let exported = if p.eat(&Token::As) {
                p.expect_identifier()?
            } else {
                local.clone()
            };
            specifiers.push(ExportSpecifier { local, exported });
            if !p.eat(&Token::Comma) {
                break;
            }
        }
        p.expect(Token::RightBrace)?;
        p.expect(Token::Semicolon)?;
        return Ok(Stmt::Export(ExportStmt {
            specifiers,
            declaration: None,
            is_default: false,
            span,
        }));
    }

    let declaration = parse_statement(p)?;
    Ok(Stmt::Export(ExportStmt {
        specifiers: Vec::new(),
        declaration: Some(Box::new(declaration)),
        is_default: false,
        span,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Stmt> {
        Parser::new(source).unwrap().parse().unwrap().statements
    }

    #[test]
    fn test_variable_declaration_lowers_to_assignment() {
        let stmts = parse("let x: number = 42;");
        match &stmts[0] {
            Stmt::Expression(es) => match &es.expr {
                Expr::Assignment(a) => {
                    assert_eq!(a.name, "x");
                    assert_eq!(
                        a.declared_type,
                        Some(TypeAnnotation::Named("number".into()))
                    );
                }
                other => panic!("expected assignment, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_array_from_annotation() {
        let stmts = parse("let xs: float64[] = [1.0, 2.0, 3.0];");
        match &stmts[0] {
            Stmt::Expression(es) => match &es.expr {
                Expr::Assignment(a) => {
                    assert!(matches!(
                        a.value.as_ref(),
                        Expr::TypedArray(ta) if ta.element == TypeAnnotation::Named("float64".into())
                            && ta.elements.len() == 3
                    ));
                }
                other => panic!("expected assignment, got {:?}", other),
            },
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_for_each() {
        let stmts = parse("for (i, v in xs) { console.log(v); }");
        match &stmts[0] {
            Stmt::ForEach(fe) => {
                assert_eq!(fe.index_var, "i");
                assert_eq!(fe.value_var, "v");
                assert_eq!(fe.body.len(), 1);
            }
            other => panic!("expected for-each, got {:?}", other),
        }
    }

    #[test]
    fn test_c_style_for_with_empty_headers() {
        let stmts = parse("for (;;) { break; }");
        match &stmts[0] {
            Stmt::For(f) => {
                assert!(f.init.is_none());
                assert!(f.condition.is_none());
                assert!(f.update.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_switch_with_default() {
        let stmts = parse("switch (x) { case 1: break; default: y = 2; }");
        match &stmts[0] {
            Stmt::Switch(sw) => {
                assert_eq!(sw.cases.len(), 2);
                assert!(!sw.cases[0].is_default);
                assert!(sw.cases[1].is_default);
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn test_class_with_members() {
        let source = "class P extends Base { \
            x: number = 0; \
            private y: number = 0; \
            constructor(a, b) { this.x = a; this.y = b; } \
            sum(): number { return this.x + this.y; } \
            static origin(): number { return 0; } \
            operator [] (index: number): number { return index; } \
        }";
        let stmts = parse(source);
        match &stmts[0] {
            Stmt::ClassDecl(class) => {
                assert_eq!(class.name, "P");
                assert_eq!(class.parent.as_deref(), Some("Base"));
                assert_eq!(class.fields.len(), 2);
                assert_eq!(class.fields[1].visibility, Visibility::Private);
                assert!(class.constructor.is_some());
                assert_eq!(class.methods.len(), 2);
                assert!(class.methods[1].is_static);
                assert_eq!(class.operators.len(), 1);
                assert_eq!(class.operators[0].operator, Token::LeftBracket);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_import_named_and_default() {
        let stmts = parse("import { a, b as c } from \"mod\";");
        match &stmts[0] {
            Stmt::Import(im) => {
                assert_eq!(im.specifiers.len(), 2);
                assert_eq!(im.specifiers[1].local, "c");
                assert_eq!(im.module_path, "mod");
            }
            other => panic!("expected import, got {:?}", other),
        }

        let stmts = parse("import dflt from \"mod\";");
        match &stmts[0] {
            Stmt::Import(im) => assert!(im.specifiers[0].is_default),
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_export_declaration() {
        let stmts = parse("export const answer = 42;");
        match &stmts[0] {
            Stmt::Export(ex) => {
                assert!(!ex.is_default);
                assert!(ex.declaration.is_some());
            }
            other => panic!("expected export, got {:?}", other),
        }
    }

    #[test]
    fn test_fail_fast_on_error() {
        assert!(Parser::new("let = 5;").unwrap().parse().is_err());
        assert!(Parser::new("if x { }").unwrap().parse().is_err());
    }
}
