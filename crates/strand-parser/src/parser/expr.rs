//! Expression parsing: the precedence climb and primaries.

use super::{stmt, ParseError, Parser};
use crate::ast::*;
use crate::token::Token;

/// Parse a full expression (entry point: assignment level).
pub fn parse_expression(p: &mut Parser) -> Result<Expr, ParseError> {
    parse_assignment(p)
}

fn parse_assignment(p: &mut Parser) -> Result<Expr, ParseError> {
    let expr = parse_ternary(p)?;
    let span = expr.span();

    match p.current() {
        Token::Equal => {
            p.advance();
            let value = parse_assignment(p)?;
            match expr {
                Expr::Identifier(id) => Ok(Expr::Assignment(Assignment {
                    name: id.name,
                    value: Box::new(value),
                    declared_type: None,
                    span,
                })),
                Expr::PropertyAccess(pa) => Ok(Expr::PropertyAssignment(PropertyAssignment {
                    object: pa.object,
                    property: pa.property,
                    value: Box::new(value),
                    span,
                })),
                _ => Err(ParseError::invalid_syntax("invalid assignment target", span)),
            }
        }
        Token::PlusEqual
        | Token::MinusEqual
        | Token::StarEqual
        | Token::SlashEqual
        | Token::StarStarEqual => {
            let op = match p.advance() {
                Token::PlusEqual => Token::Plus,
                Token::MinusEqual => Token::Minus,
                Token::StarEqual => Token::Star,
                Token::SlashEqual => Token::Slash,
                Token::StarStarEqual => Token::StarStar,
                _ => unreachable!(),
            };
            let name = match &expr {
                Expr::Identifier(id) => id.name.clone(),
                _ => {
                    return Err(ParseError::invalid_syntax(
                        "compound assignment target must be a variable",
                        span,
                    ))
                }
            };
            let value = parse_assignment(p)?;
            Ok(Expr::Assignment(Assignment {
                name,
                value: Box::new(Expr::Binary(BinaryOp {
                    left: Some(Box::new(expr)),
                    op,
                    right: Box::new(value),
                    span,
                })),
                declared_type: None,
                span,
            }))
        }
        _ => Ok(expr),
    }
}

fn parse_ternary(p: &mut Parser) -> Result<Expr, ParseError> {
    let condition = parse_logical_or(p)?;
    if !p.eat(&Token::Question) {
        return Ok(condition);
    }
    let span = condition.span();
    let then_expr = parse_assignment(p)?;
    p.expect(Token::Colon)?;
    let else_expr = parse_assignment(p)?;
    Ok(Expr::Ternary(Ternary {
        condition: Box::new(condition),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
        span,
    }))
}

macro_rules! binary_level {
    ($name:ident, $next:ident, $($tok:pat_param)|+) => {
        fn $name(p: &mut Parser) -> Result<Expr, ParseError> {
            let mut expr = $next(p)?;
            while matches!(p.current(), $($tok)|+) {
                let op = p.advance();
                let right = $next(p)?;
                let span = expr.span();
                expr = Expr::Binary(BinaryOp {
                    left: Some(Box::new(expr)),
                    op,
                    right: Box::new(right),
                    span,
                });
            }
            Ok(expr)
        }
    };
}

binary_level!(parse_logical_or, parse_logical_and, Token::PipePipe);
binary_level!(parse_logical_and, parse_equality, Token::AmpAmp);
binary_level!(
    parse_equality,
    parse_comparison,
    Token::EqualEqual | Token::BangEqual | Token::EqualEqualEqual
);
binary_level!(
    parse_comparison,
    parse_addition,
    Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual
);
binary_level!(parse_addition, parse_multiplication, Token::Plus | Token::Minus);
binary_level!(
    parse_multiplication,
    parse_exponentiation,
    Token::Star | Token::Slash | Token::Percent
);

/// Exponentiation is right-associative: recurse instead of looping.
fn parse_exponentiation(p: &mut Parser) -> Result<Expr, ParseError> {
    let expr = parse_unary(p)?;
    if matches!(p.current(), Token::StarStar) {
        let op = p.advance();
        let right = parse_exponentiation(p)?;
        let span = expr.span();
        return Ok(Expr::Binary(BinaryOp {
            left: Some(Box::new(expr)),
            op,
            right: Box::new(right),
            span,
        }));
    }
    Ok(expr)
}

fn parse_unary(p: &mut Parser) -> Result<Expr, ParseError> {
    match p.current() {
        Token::Bang | Token::Minus => {
            let op = p.advance();
            let right = parse_unary(p)?;
            let span = right.span();
            Ok(Expr::Binary(BinaryOp {
                left: None,
                op,
                right: Box::new(right),
                span,
            }))
        }
        Token::Go => {
            let span = p.current_span();
            p.advance();
            let expr = parse_call(p)?;
            mark_goroutine(expr)
                .map_err(|_| ParseError::invalid_syntax("'go' can only be used with function calls", span))
        }
        Token::Await => {
            let span = p.current_span();
            p.advance();
            let expr = parse_call(p)?;
            Ok(mark_awaited(expr, span))
        }
        _ => parse_call(p),
    }
}

fn mark_goroutine(expr: Expr) -> Result<Expr, ()> {
    match expr {
        Expr::Call(mut call) => {
            call.is_goroutine = true;
            Ok(Expr::Call(call))
        }
        Expr::MethodCall(mut call) => {
            call.is_goroutine = true;
            Ok(Expr::MethodCall(call))
        }
        Expr::ExprMethodCall(mut call) => {
            call.is_goroutine = true;
            Ok(Expr::ExprMethodCall(call))
        }
        Expr::Function(mut func) => {
            func.is_goroutine = true;
            Ok(Expr::Function(func))
        }
        _ => Err(()),
    }
}

/// `await` on a call sets the call's flag; on any other expression it
/// becomes the unary right-operand binary form, lowered to a promise-await
/// helper call by the code generator.
fn mark_awaited(expr: Expr, span: crate::token::Span) -> Expr {
    match expr {
        Expr::Call(mut call) => {
            call.is_awaited = true;
            Expr::Call(call)
        }
        Expr::MethodCall(mut call) => {
            call.is_awaited = true;
            Expr::MethodCall(call)
        }
        Expr::ExprMethodCall(mut call) => {
            call.is_awaited = true;
            Expr::ExprMethodCall(call)
        }
        other => Expr::Binary(BinaryOp {
            left: None,
            op: Token::Await,
            right: Box::new(other),
            span,
        }),
    }
}

fn parse_call(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut expr = parse_primary(p)?;

    loop {
        match p.current() {
            Token::LeftParen => {
                let span = expr.span();
                p.advance();
                let args = parse_arguments(p)?;
                expr = match expr {
                    Expr::Identifier(id) => Expr::Call(Call {
                        name: id.name,
                        args,
                        is_goroutine: false,
                        is_awaited: false,
                        span,
                    }),
                    Expr::PropertyAccess(pa) => Expr::MethodCall(MethodCall {
                        object: pa.object,
                        method: pa.property,
                        args,
                        is_goroutine: false,
                        is_awaited: false,
                        span,
                    }),
                    Expr::ExprPropertyAccess(pa) => Expr::ExprMethodCall(ExprMethodCall {
                        object: pa.object,
                        method: pa.property,
                        args,
                        is_goroutine: false,
                        is_awaited: false,
                        span,
                    }),
                    // Calling any other expression (a call result, a
                    // function expression) is a dynamic invoke: an
                    // expression-method-call with an empty method name.
                    other @ (Expr::Call(_) | Expr::Function(_) | Expr::ArrayAccess(_)) => {
                        Expr::ExprMethodCall(ExprMethodCall {
                            object: Box::new(other),
                            method: String::new(),
                            args,
                            is_goroutine: false,
                            is_awaited: false,
                            span,
                        })
                    }
                    _ => {
                        return Err(ParseError::invalid_syntax("invalid function call", span));
                    }
                };
            }
            Token::Dot => {
                p.advance();
                let property = p.expect_identifier()?;
                let span = expr.span();
                expr = match expr {
                    Expr::Identifier(id) => Expr::PropertyAccess(PropertyAccess {
                        object: id.name,
                        property,
                        span,
                    }),
                    Expr::This(_) => Expr::PropertyAccess(PropertyAccess {
                        object: "this".to_string(),
                        property,
                        span,
                    }),
                    other => Expr::ExprPropertyAccess(ExprPropertyAccess {
                        object: Box::new(other),
                        property,
                        span,
                    }),
                };
            }
            Token::LeftBracket => {
                let span = expr.span();
                p.advance();
                expr = parse_index_or_slice(p, expr, span)?;
            }
            Token::PlusPlus => {
                let span = expr.span();
                p.advance();
                let name = match expr {
                    Expr::Identifier(id) => id.name,
                    _ => {
                        return Err(ParseError::invalid_syntax(
                            "'++' target must be a variable",
                            span,
                        ))
                    }
                };
                expr = Expr::PostfixIncrement(Postfix { name, span });
            }
            Token::MinusMinus => {
                let span = expr.span();
                p.advance();
                let name = match expr {
                    Expr::Identifier(id) => id.name,
                    _ => {
                        return Err(ParseError::invalid_syntax(
                            "'--' target must be a variable",
                            span,
                        ))
                    }
                };
                expr = Expr::PostfixDecrement(Postfix { name, span });
            }
            _ => break,
        }
    }

    Ok(expr)
}

fn parse_arguments(p: &mut Parser) -> Result<Vec<Expr>, ParseError> {
    let mut args = Vec::new();
    if !p.check(&Token::RightParen) {
        loop {
            args.push(parse_expression(p)?);
            if !p.eat(&Token::Comma) {
                break;
            }
        }
    }
    p.expect(Token::RightParen)?;
    Ok(args)
}

/// Inside `a[...]`: either a plain index expression or a slice triple
/// `start:end:step` with integer-literal components.
fn parse_index_or_slice(
    p: &mut Parser,
    object: Expr,
    span: crate::token::Span,
) -> Result<Expr, ParseError> {
    let mut start = None;
    if !p.check(&Token::Colon) {
        let index = parse_expression(p)?;
        if p.eat(&Token::RightBracket) {
            return Ok(Expr::ArrayAccess(ArrayAccess {
                object: Box::new(object),
                index: Some(Box::new(index)),
                slices: Vec::new(),
                is_slice: false,
                span,
            }));
        }
        start = Some(index);
    }

    p.expect(Token::Colon)?;
    let mut end = None;
    if !p.check(&Token::Colon) && !p.check(&Token::RightBracket) {
        end = Some(parse_expression(p)?);
    }
    let mut step = None;
    if p.eat(&Token::Colon) && !p.check(&Token::RightBracket) {
        step = Some(parse_expression(p)?);
    }
    p.expect(Token::RightBracket)?;

    let slice = SliceExpr {
        start: start.as_ref().map(const_int).transpose()?.unwrap_or(0),
        end: end.as_ref().map(const_int).transpose()?.unwrap_or(-1),
        step: step.as_ref().map(const_int).transpose()?.unwrap_or(1),
        start_specified: start.is_some(),
        end_specified: end.is_some(),
        step_specified: step.is_some(),
        span,
    };

    Ok(Expr::ArrayAccess(ArrayAccess {
        object: Box::new(object),
        index: None,
        slices: vec![Expr::Slice(slice)],
        is_slice: true,
        span,
    }))
}

/// Evaluate a slice component: a number literal, possibly negated.
fn const_int(expr: &Expr) -> Result<i64, ParseError> {
    match expr {
        Expr::Number(n) => Ok(n.value as i64),
        Expr::Binary(BinaryOp {
            left: None,
            op: Token::Minus,
            right,
            ..
        }) => match right.as_ref() {
            Expr::Number(n) => Ok(-(n.value as i64)),
            _ => Err(ParseError::invalid_syntax(
                "slice bounds must be integer literals",
                expr.span(),
            )),
        },
        _ => Err(ParseError::invalid_syntax(
            "slice bounds must be integer literals",
            expr.span(),
        )),
    }
}

fn parse_primary(p: &mut Parser) -> Result<Expr, ParseError> {
    let span = p.current_span();
    match p.current().clone() {
        Token::Number(value) => {
            p.advance();
            Ok(Expr::Number(NumberLit { value, span }))
        }
        Token::StringLit(value) => {
            p.advance();
            Ok(Expr::StringLit(StringLit { value, span }))
        }
        Token::Regex(pattern, flags) => {
            p.advance();
            Ok(Expr::Regex(RegexLit { pattern, flags, span }))
        }
        // Booleans lower to 1/0 number literals; comparisons and logic
        // produce the distinct boolean type during code generation.
        Token::True => {
            p.advance();
            Ok(Expr::Number(NumberLit { value: 1.0, span }))
        }
        Token::False => {
            p.advance();
            Ok(Expr::Number(NumberLit { value: 0.0, span }))
        }
        Token::Identifier(name) => {
            p.advance();
            Ok(Expr::Identifier(Identifier { name, span }))
        }
        Token::LeftParen => {
            p.advance();
            let expr = parse_expression(p)?;
            p.expect(Token::RightParen)?;
            Ok(expr)
        }
        Token::LeftBracket => {
            p.advance();
            let mut elements = Vec::new();
            if !p.check(&Token::RightBracket) {
                loop {
                    elements.push(parse_expression(p)?);
                    if !p.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            p.expect(Token::RightBracket)?;
            Ok(Expr::Array(ArrayLit { elements, span }))
        }
        Token::LeftBrace => {
            p.advance();
            let mut properties = Vec::new();
            while !p.check(&Token::RightBrace) {
                let key = match p.current().clone() {
                    Token::Identifier(name) => {
                        p.advance();
                        name
                    }
                    Token::StringLit(name) => {
                        p.advance();
                        name
                    }
                    _ => {
                        return Err(ParseError::invalid_syntax(
                            "expected property name",
                            p.current_span(),
                        ))
                    }
                };
                p.expect(Token::Colon)?;
                let value = parse_expression(p)?;
                properties.push((key, value));
                if !p.eat(&Token::Comma) {
                    break;
                }
            }
            p.expect(Token::RightBrace)?;
            Ok(Expr::Object(ObjectLit { properties, span }))
        }
        Token::This => {
            p.advance();
            Ok(Expr::This(span))
        }
        Token::Super => {
            p.advance();
            if p.eat(&Token::Dot) {
                let method = p.expect_identifier()?;
                p.expect(Token::LeftParen)?;
                let args = parse_arguments(p)?;
                Ok(Expr::SuperMethodCall(SuperMethodCall { method, args, span }))
            } else {
                p.expect(Token::LeftParen)?;
                let args = parse_arguments(p)?;
                Ok(Expr::SuperCall(SuperCall { args, span }))
            }
        }
        Token::New => {
            p.advance();
            let class_name = p.expect_identifier()?;
            let mut args = Vec::new();
            let mut named_args = Vec::new();
            if p.eat(&Token::LeftBrace) {
                // new Person{ name: "bob", age: 25 }
                while !p.check(&Token::RightBrace) {
                    let prop = p.expect_identifier()?;
                    p.expect(Token::Colon)?;
                    let value = parse_expression(p)?;
                    named_args.push((prop, value));
                    if !p.eat(&Token::Comma) {
                        break;
                    }
                }
                p.expect(Token::RightBrace)?;
            } else {
                p.expect(Token::LeftParen)?;
                args = parse_arguments(p)?;
            }
            Ok(Expr::New(NewExpr {
                class_name,
                args,
                named_args,
                span,
            }))
        }
        Token::Function => {
            p.advance();
            parse_function_expression(p)
        }
        // `go` and `await` also occur in operand position (`await go f()`)
        Token::Go => {
            p.advance();
            let expr = parse_call(p)?;
            mark_goroutine(expr)
                .map_err(|_| ParseError::invalid_syntax("'go' can only be used with function calls", span))
        }
        Token::Await => {
            p.advance();
            let expr = parse_call(p)?;
            Ok(mark_awaited(expr, span))
        }
        _ => Err(p.unexpected_token(&[Token::Identifier(String::new())])),
    }
}

/// A function expression (the `function` keyword is already consumed).
fn parse_function_expression(p: &mut Parser) -> Result<Expr, ParseError> {
    let span = p.current_span();
    let name = match p.current() {
        Token::Identifier(name) => {
            let name = name.clone();
            p.advance();
            Some(name)
        }
        _ => None,
    };
    let params = stmt::parse_params(p)?;
    let return_type = if p.eat(&Token::Colon) {
        Some(stmt::parse_type(p)?)
    } else {
        None
    };
    let body = stmt::parse_block(p)?;
    let id = p.alloc_func_expr(FuncExpr {
        name,
        params,
        return_type,
        body,
        span,
    });
    Ok(Expr::Function(FuncExprRef {
        id,
        is_goroutine: false,
        span,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(source: &str) -> Expr {
        let mut parser = Parser::new(source).unwrap();
        parse_expression(&mut parser).unwrap()
    }

    #[test]
    fn test_precedence_addition_multiplication() {
        let expr = parse_expr("1 + 2 * 3");
        match expr {
            Expr::Binary(op) => {
                assert_eq!(op.op, Token::Plus);
                assert!(matches!(*op.right, Expr::Binary(ref m) if m.op == Token::Star));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_exponentiation_right_associative() {
        let expr = parse_expr("2 ** 3 ** 2");
        match expr {
            Expr::Binary(op) => {
                assert_eq!(op.op, Token::StarStar);
                assert!(matches!(*op.left.unwrap(), Expr::Number(ref n) if n.value == 2.0));
                assert!(matches!(*op.right, Expr::Binary(ref inner) if inner.op == Token::StarStar));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_minus_has_no_left() {
        let expr = parse_expr("-x");
        match expr {
            Expr::Binary(op) => {
                assert!(op.left.is_none());
                assert_eq!(op.op, Token::Minus);
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_go_requires_call() {
        let mut parser = Parser::new("go x").unwrap();
        assert!(parse_expression(&mut parser).is_err());

        let expr = parse_expr("go f(1, 2)");
        assert!(matches!(expr, Expr::Call(ref c) if c.is_goroutine && c.args.len() == 2));
    }

    #[test]
    fn test_await_on_identifier_is_unary() {
        let expr = parse_expr("await p");
        match expr {
            Expr::Binary(op) => {
                assert!(op.left.is_none());
                assert_eq!(op.op, Token::Await);
            }
            other => panic!("expected unary await, got {:?}", other),
        }
    }

    #[test]
    fn test_method_call_shapes() {
        assert!(matches!(
            parse_expr("console.log(1)"),
            Expr::MethodCall(ref m) if m.object == "console" && m.method == "log"
        ));
        assert!(matches!(
            parse_expr("f(1).toString()"),
            Expr::ExprMethodCall(ref m) if m.method == "toString"
        ));
    }

    #[test]
    fn test_new_forms() {
        let expr = parse_expr("new Point(1, 2)");
        assert!(matches!(expr, Expr::New(ref n) if n.class_name == "Point" && n.args.len() == 2));

        let expr = parse_expr("new Person{ name: \"bob\", age: 25 }");
        assert!(matches!(expr, Expr::New(ref n) if n.named_args.len() == 2));
    }

    #[test]
    fn test_slice_access() {
        let expr = parse_expr("a[1:5:2]");
        match expr {
            Expr::ArrayAccess(access) => {
                assert!(access.is_slice);
                match &access.slices[0] {
                    Expr::Slice(s) => {
                        assert_eq!((s.start, s.end, s.step), (1, 5, 2));
                        assert!(s.start_specified && s.end_specified && s.step_specified);
                    }
                    other => panic!("expected slice, got {:?}", other),
                }
            }
            other => panic!("expected array access, got {:?}", other),
        }
    }

    #[test]
    fn test_ternary() {
        let expr = parse_expr("a > 1 ? 2 : 3");
        assert!(matches!(expr, Expr::Ternary(_)));
    }

    #[test]
    fn test_nested_function_expressions_fill_arena() {
        let mut parser = Parser::new("function(n){ return function(m){ return n + m; }; }").unwrap();
        let _ = parse_expression(&mut parser).unwrap();
        assert_eq!(parser.arena_len(), 2);
    }

    #[test]
    fn test_chained_call_is_dynamic_invoke() {
        let expr = parse_expr("f(2)(3)");
        match expr {
            Expr::ExprMethodCall(call) => {
                assert!(call.method.is_empty());
                assert!(matches!(*call.object, Expr::Call(ref inner) if inner.name == "f"));
                assert_eq!(call.args.len(), 1);
            }
            other => panic!("expected dynamic invoke, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment_desugars() {
        let expr = parse_expr("x += 2");
        match expr {
            Expr::Assignment(assign) => {
                assert_eq!(assign.name, "x");
                assert!(matches!(*assign.value, Expr::Binary(ref b) if b.op == Token::Plus));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }
}
