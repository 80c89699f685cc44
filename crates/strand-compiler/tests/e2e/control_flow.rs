//! Control-flow execution tests: if/else, loops, switch, break.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_if_else() {
    expect_i64("if (1) { return 10; } return 20;", 10);
    expect_i64("if (0) { return 10; } return 20;", 20);
    expect_i64("if (0) { return 1; } else { return 2; }", 2);
}

#[test]
fn test_else_if_chain() {
    let source = "let x = 2; \
        if (x == 1) { return 10; } \
        else if (x == 2) { return 20; } \
        else { return 30; }";
    expect_i64(source, 20);
}

#[test]
fn test_for_loop_sum() {
    expect_i64(
        "let s = 0; for (let i = 0; i < 5; i++) { s = s + i; } return s;",
        10,
    );
}

#[test]
fn test_nested_for_loops() {
    expect_i64(
        "let s = 0; \
         for (let i = 0; i < 3; i++) { \
             for (let j = 0; j < 3; j++) { s = s + 1; } \
         } \
         return s;",
        9,
    );
}

#[test]
fn test_empty_for_headers_run_until_break() {
    expect_i64(
        "let i = 0; for (;;) { i = i + 1; if (i == 3) { break; } } return i;",
        3,
    );
}

#[test]
fn test_switch_matching_case() {
    expect_i64(
        "switch (2) { case 1: return 10; case 2: return 20; default: return 30; }",
        20,
    );
}

#[test]
fn test_switch_default() {
    expect_i64(
        "switch (9) { case 1: return 10; case 2: return 20; default: return 30; }",
        30,
    );
}

#[test]
fn test_switch_with_only_default_always_runs() {
    expect_i64("let x = 5; switch (x) { default: x = 7; } return x;", 7);
}

#[test]
fn test_switch_fall_through_until_break() {
    expect_i64(
        "let r = 0; \
         switch (1) { \
             case 1: r = r + 1; \
             case 2: r = r + 10; break; \
             case 3: r = r + 100; \
         } \
         return r;",
        11,
    );
}

#[test]
fn test_break_inside_switch_in_loop() {
    expect_i64(
        "let total = 0; \
         for (let i = 0; i < 4; i++) { \
             switch (i) { case 2: total = total + 100; break; default: total = total + 1; } \
         } \
         return total;",
        103,
    );
}
