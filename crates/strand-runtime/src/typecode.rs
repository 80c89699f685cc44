//! Numeric type codes shared between the compiler and the runtime.
//!
//! Emitted code passes these as immediates to type-aware helpers
//! (`__runtime_js_equal`, switch comparisons). The compiler's type enum
//! maps onto the same values.

pub const UNKNOWN: i64 = 0;
pub const VOID: i64 = 1;
pub const INT8: i64 = 2;
pub const INT16: i64 = 3;
pub const INT32: i64 = 4;
pub const INT64: i64 = 5;
pub const UINT8: i64 = 6;
pub const UINT16: i64 = 7;
pub const UINT32: i64 = 8;
pub const UINT64: i64 = 9;
pub const FLOAT32: i64 = 10;
pub const FLOAT64: i64 = 11;
pub const BOOLEAN: i64 = 12;
pub const STRING: i64 = 13;
pub const TENSOR: i64 = 14;
pub const ARRAY: i64 = 15;
pub const PROMISE: i64 = 16;
pub const FUNCTION: i64 = 17;
pub const REGEX: i64 = 18;
pub const SLICE: i64 = 19;
pub const CLASS_INSTANCE: i64 = 20;

/// Does the code denote a numeric scalar (integer or float)?
pub fn is_numeric(code: i64) -> bool {
    (INT8..=FLOAT64).contains(&code)
}
