//! Arithmetic and operator execution tests.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_return_literal() {
    expect_i64("return 42;", 42);
}

#[test]
fn test_addition_and_multiplication_precedence() {
    expect_i64("return 1 + 2 * 3;", 7);
    expect_i64("return (1 + 2) * 3;", 9);
}

#[test]
fn test_subtraction_and_division() {
    expect_i64("return 10 - 4;", 6);
    expect_i64("return 20 / 4;", 5);
    expect_i64("return 7 / 2;", 3);
}

#[test]
fn test_exponentiation_and_modulo() {
    // a ** b + b % a with a=2, b=3: 8 + 1
    expect_i64("let a = 2; let b = 3; return a ** b + b % a;", 9);
    expect_i64("return 2 ** 10;", 1024);
    expect_i64("return -7 % 3;", -1);
}

#[test]
fn test_exponentiation_right_associative() {
    expect_i64("return 2 ** 3 ** 2;", 512);
}

#[test]
fn test_unary_minus_and_not() {
    expect_i64("return -5;", -5);
    expect_i64("return !0;", 1);
    expect_i64("return !7;", 0);
}

#[test]
fn test_comparisons() {
    expect_i64("return 3 < 5;", 1);
    expect_i64("return 5 < 3;", 0);
    expect_i64("return 5 <= 5;", 1);
    expect_i64("return 4 > 4;", 0);
    expect_i64("return 4 >= 4;", 1);
    expect_i64("return 2 == 2;", 1);
    expect_i64("return 2 != 2;", 0);
    expect_i64("return 2 === 2;", 1);
}

#[test]
fn test_short_circuit_logic() {
    expect_i64("return 1 && 7;", 1);
    expect_i64("return 0 && 7;", 0);
    expect_i64("return 0 || 7;", 1);
    expect_i64("return 0 || 0;", 0);
}

#[test]
fn test_ternary() {
    expect_i64("return 1 ? 10 : 20;", 10);
    expect_i64("return 0 ? 10 : 20;", 20);
    expect_i64("let x = 5; return x > 3 ? x * 2 : x;", 10);
}

#[test]
fn test_variables_and_reassignment() {
    expect_i64("let x = 1; x = x + 2; x = x * 3; return x;", 9);
}

#[test]
fn test_compound_assignment() {
    expect_i64("let x = 2; x += 3; x *= 4; return x;", 20);
}

#[test]
fn test_postfix_increment_decrement() {
    expect_i64("let x = 5; x++; x++; x--; return x;", 6);
}

#[test]
fn test_loose_equality_on_dynamic_values() {
    // `let` without annotation binds dynamically; == goes through the
    // runtime equality helper
    expect_i64("let x = 3; return x == 3;", 1);
    expect_i64("let x = 3; return x == 4;", 0);
}
