//! Goroutine and promise execution tests.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_go_and_await() {
    expect_i64(
        "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); } \
         let p = go fib(10); \
         return await p;",
        55,
    );
}

#[test]
fn test_await_call_directly() {
    expect_i64(
        "function answer() { return 42; } \
         return await go answer();",
        42,
    );
}

#[test]
fn test_goroutine_with_two_args() {
    expect_i64(
        "function add(a, b) { return a + b; } \
         let p = go add(19, 23); \
         return await p;",
        42,
    );
}

#[test]
fn test_two_goroutines_join() {
    expect_i64(
        "function square(n) { return n * n; } \
         let a = go square(5); \
         let b = go square(6); \
         return await a + await b;",
        61,
    );
}

#[test]
fn test_goroutine_function_expression() {
    expect_i64(
        "let p = go function() { return 17; }; \
         return await p;",
        17,
    );
}
