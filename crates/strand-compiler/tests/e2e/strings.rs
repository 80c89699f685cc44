//! String execution tests: interning, concatenation, methods.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_string_length() {
    expect_i64("let s = \"hello\"; return s.length;", 5);
    expect_i64("let s = \"\"; return s.length;", 0);
}

#[test]
fn test_string_concat_length() {
    expect_i64(
        "let s = \"hello\"; s = s + \", \" + \"world\"; return s.length;",
        12,
    );
}

#[test]
fn test_string_equality() {
    expect_i64("return \"abc\" == \"abc\";", 1);
    expect_i64("return \"abc\" == \"abd\";", 0);
    expect_i64("return \"abc\" != \"abd\";", 1);
}

#[test]
fn test_string_ordering() {
    expect_i64("return \"abc\" < \"abd\";", 1);
    expect_i64("return \"b\" > \"a\";", 1);
}

#[test]
fn test_string_char_at() {
    // 'x' is 120
    expect_i64("let s = \"xyz\"; return s.charAt(0);", 120);
}

#[test]
fn test_string_search_with_regex() {
    expect_i64("let s = \"alpha beta\"; return s.search(/beta/);", 6);
    expect_i64("let s = \"alpha beta\"; return s.search(/zz/);", -1);
}

#[test]
fn test_regex_test_via_jit() {
    expect_i64("let re = /ab+c/; let s = \"xabbbcx\"; return re.test(s);", 1);
    expect_i64("let re = /ab+c/; let s = \"nope\"; return re.test(s);", 0);
}

#[test]
fn test_switch_on_strings() {
    expect_i64(
        "let s = \"two\"; \
         switch (s) { \
             case \"one\": return 1; \
             case \"two\": return 2; \
             default: return 0; \
         }",
        2,
    );
}
