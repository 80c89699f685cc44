//! Class execution tests: construction, fields, methods, inheritance,
//! statics, operator overloads.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_constructor_and_method() {
    expect_i64(
        "class P { \
             x: number = 0; \
             y: number = 0; \
             constructor(a, b) { this.x = a; this.y = b; } \
             sum(): number { return this.x + this.y; } \
         } \
         let p = new P(3, 4); \
         return p.sum();",
        7,
    );
}

#[test]
fn test_method_call_on_new_expression() {
    expect_i64(
        "class P { \
             x: number = 0; \
             y: number = 0; \
             constructor(a, b) { this.x = a; this.y = b; } \
             sum(): number { return this.x + this.y; } \
         } \
         return new P(3, 4).sum();",
        7,
    );
}

#[test]
fn test_field_access_by_index() {
    expect_i64(
        "class P { \
             x: number = 0; \
             y: number = 0; \
             constructor(a, b) { this.x = a; this.y = b; } \
         } \
         let p = new P(11, 31); \
         return p.x + p.y;",
        42,
    );
}

#[test]
fn test_default_constructor_keeps_field_defaults() {
    expect_i64(
        "class C { a: number = 5; b: number = 0; } \
         let c = new C(); \
         return c.a + c.b;",
        5,
    );
}

#[test]
fn test_named_args_construction() {
    expect_i64(
        "class Person { age: number = 1; shoe: number = 0; } \
         let p = new Person{ age: 25 }; \
         return p.age + p.shoe;",
        25,
    );
}

#[test]
fn test_field_assignment_through_variable() {
    expect_i64(
        "class Box { v: number = 0; } \
         let b = new Box(); \
         b.v = 9; \
         return b.v;",
        9,
    );
}

#[test]
fn test_static_properties() {
    expect_i64(
        "class Counter { } \
         Counter.total = 40; \
         Counter.total = Counter.total + 2; \
         return Counter.total;",
        42,
    );
}

#[test]
fn test_object_literal_iteration_and_access() {
    expect_i64(
        "let o = { a: 1, b: 2, c: 3 }; \
         let total = 0; \
         for (k, v in o) { total = total + v; } \
         return total;",
        6,
    );
}

#[test]
fn test_object_literal_property_by_name() {
    expect_i64("let o = { a: 7, b: 35 }; return o.a + o.b;", 42);
}

#[test]
fn test_operator_index_overload() {
    expect_i64(
        "class Doubler { \
             scale: number = 2; \
             operator [] (index: number): number { return this.scale * index; } \
         } \
         let d = new Doubler(); \
         return d[21];",
        42,
    );
}

#[test]
fn test_inherited_method_through_child() {
    expect_i64(
        "class Base { \
             v: number = 0; \
             constructor(v) { this.v = v; } \
             value(): number { return this.v; } \
         } \
         class Child extends Base { \
             constructor(v) { super(v); } \
         } \
         let c = new Child(42); \
         return c.value();",
        42,
    );
}
