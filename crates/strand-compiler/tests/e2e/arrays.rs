//! Array execution tests: literals, statics, indexing, slicing, for-each.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use super::harness::expect_i64;

#[test]
fn test_array_literal_sum() {
    expect_i64("let a = [1, 2, 3]; return a.sum();", 6);
}

#[test]
fn test_array_indexing_and_length() {
    expect_i64("let a = [10, 20, 30]; return a[1];", 20);
    expect_i64("let a = [10, 20, 30]; return a.length;", 3);
}

#[test]
fn test_array_push_and_pop() {
    expect_i64(
        "let a = [1]; a.push(2); a.push(3); let last = a.pop(); return last + a.length;",
        5,
    );
}

#[test]
fn test_array_statics() {
    expect_i64("return Array.zeros(4).length;", 4);
    expect_i64("return Array.ones(5).sum();", 5);
    expect_i64("return Array.arange(0, 5, 1).sum();", 10);
    expect_i64("return Array.linspace(0, 10, 5).max();", 10);
}

#[test]
fn test_array_stats() {
    expect_i64("let a = [4, 8, 6]; return a.mean();", 6);
    expect_i64("let a = [4, 8, 6]; return a.max();", 8);
    expect_i64("let a = [4, 8, 6]; return a.min();", 4);
}

#[test]
fn test_array_slice_syntax() {
    expect_i64("let a = [0, 1, 2, 3, 4, 5]; return a[1:4:1].sum();", 6);
    expect_i64("let a = [0, 1, 2, 3, 4, 5]; return a[::2].length;", 3);
}

#[test]
fn test_for_each_over_array() {
    expect_i64(
        "let a = [5, 10, 15]; let s = 0; for (i, v in a) { s = s + v; } return s;",
        30,
    );
}

#[test]
fn test_for_each_indexes_count_up() {
    expect_i64(
        "let a = [7, 7, 7]; let idx_sum = 0; for (i, v in a) { idx_sum = idx_sum + i; } return idx_sum;",
        3,
    );
}

#[test]
fn test_typed_array_for_each_sum() {
    // float64 elements cross the boundary as value words
    expect_i64(
        "let xs: float64[] = [1.0, 2.0, 3.0]; \
         let s = 0; \
         for (i, v in xs) { s = s + v; } \
         return s;",
        6,
    );
}

#[test]
fn test_typed_array_index_and_length() {
    expect_i64("let xs: int64[] = [10, 20, 30]; return xs[2];", 30);
    expect_i64("let xs: int32[] = [1, 2, 3, 4]; return xs.length;", 4);
}

#[test]
fn test_typed_array_push() {
    expect_i64(
        "let xs: int64[] = [1]; xs.push(41); return xs[1] + xs.length;",
        43,
    );
}
