//! Compile-pipeline assertions that do not execute code.

use super::harness::compile;
use strand_compiler::CompileError;

#[test]
fn test_emits_leading_jump_over_function_bodies() {
    let compiler = compile("function f() { return 1; } let x = f();").unwrap();
    // jmp rel32 over every function body
    assert_eq!(compiler.machine_code()[0], 0xE9);
    assert!(compiler.label_offset("__main").is_some());
    assert!(compiler.label_offset("f").is_some());
    // The function body sits between the jump and __main
    assert!(compiler.label_offset("f").unwrap() < compiler.label_offset("__main").unwrap());
}

#[test]
fn test_machine_code_is_nonempty_for_empty_program() {
    let compiler = compile("").unwrap();
    assert!(!compiler.machine_code().is_empty());
    assert!(compiler.label_offset("__main").is_some());
}

#[test]
fn test_labels_lie_within_code() {
    let compiler = compile(
        "function add(a, b) { return a + b; } \
         let total = 0; \
         for (let i = 0; i < 3; i++) { total = add(total, i); }",
    )
    .unwrap();
    let size = compiler.machine_code().len();
    for name in ["__main", "add"] {
        assert!(compiler.label_offset(name).unwrap() < size);
    }
}

#[test]
fn test_class_emission_defines_labels() {
    let compiler = compile(
        "class P { x: number = 0; constructor(a) { this.x = a; } get_x(): number { return this.x; } } \
         let p = new P(1);",
    )
    .unwrap();
    assert!(compiler.label_offset("__constructor_P").is_some());
    assert!(compiler.label_offset("__method_get_x").is_some());
    assert!(compiler.label_offset("__method_P_get_x").is_some());
}

#[test]
fn test_unknown_call_is_a_link_error() {
    let err = compile("nonexistent();").err().expect("should fail to link");
    assert!(matches!(err, CompileError::Link(name) if name == "nonexistent"));
}

#[test]
fn test_unknown_class_is_a_type_error() {
    let err = compile("let x = new Ghost();").err().expect("should fail");
    assert!(matches!(err, CompileError::Type { .. }));
}

#[test]
fn test_go_on_non_call_is_a_parse_error() {
    let err = compile("let x = go 5;").err().expect("should fail to parse");
    assert!(matches!(err, CompileError::Parse(_)));
}

#[test]
fn test_unknown_console_method_is_a_type_error() {
    let err = compile("console.shout(1);").err().expect("should fail");
    assert!(matches!(err, CompileError::Type { .. }));
}

#[test]
fn test_break_outside_loop_is_rejected() {
    assert!(compile("break;").is_err());
}

#[test]
fn test_lex_error_carries_position() {
    let err = compile("let s = \"unterminated").err().expect("should fail to lex");
    assert!(matches!(err, CompileError::Lex(_)));
}

#[test]
fn test_function_expressions_get_compiled_before_main() {
    let compiler = compile("let f = function(n) { return n + 1; };").unwrap();
    // The synthesized name is a label placed before __main
    let func_offset = compiler
        .label_offset("__func_expr_0")
        .expect("function expression label");
    assert!(func_offset < compiler.label_offset("__main").unwrap());
}
