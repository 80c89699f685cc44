//! Function declaration, recursion, and function-expression execution.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_empty_function_returns_zero() {
    expect_i64("function empty() { } return empty();", 0);
}

#[test]
fn test_function_with_parameters() {
    expect_i64("function add(a, b) { return a + b; } return add(19, 23);", 42);
}

#[test]
fn test_function_implicit_return_is_zero() {
    expect_i64("function f(x) { let y = x + 1; } return f(10);", 0);
}

#[test]
fn test_recursion_fibonacci() {
    expect_i64(
        "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); } \
         return fib(10);",
        55,
    );
}

#[test]
fn test_six_parameters() {
    expect_i64(
        "function sum6(a, b, c, d, e, f) { return a + b + c + d + e + f; } \
         return sum6(1, 2, 3, 4, 5, 6);",
        21,
    );
}

#[test]
fn test_function_expression_invoked_through_variable() {
    expect_i64(
        "let double = function(n) { return n * 2; }; return double(21);",
        42,
    );
}

#[test]
fn test_nested_function_expressions_direct_address() {
    // The inner function is discovered and compiled first; the outer
    // references it by resolved offset and f(2)(3) yields 5.
    expect_i64(
        "let f = function(n) { return function(m) { return n + m; }; }; \
         return f(2)(3);",
        5,
    );
}

#[test]
fn test_immediately_invoked_function_expression() {
    expect_i64("return (function() { return 7; })();", 7);
}

#[test]
fn test_function_calls_function() {
    expect_i64(
        "function inc(n) { return n + 1; } \
         function twice(n) { return inc(inc(n)); } \
         return twice(40);",
        42,
    );
}
