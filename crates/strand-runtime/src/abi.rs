//! The C-callable helper surface consumed by emitted code.
//!
//! Math helpers live here; everything else is defined in its own module.
//! [`helper_address`] resolves the double-underscore link names that the
//! x86 emitter encodes as absolute `mov rax, imm64; call rax` sequences.
//! The table is append-only and built once.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::string::StrandString;
use crate::typecode;
use crate::{array, console, object, promise, regexp, registry, scheduler, string, timer};

// ============================================================================
// Math helpers
// ============================================================================

/// Integer exponentiation with wrapping multiplication; negative exponents
/// yield 0 (integer semantics).
pub extern "C" fn runtime_pow(base: i64, exponent: i64) -> i64 {
    if exponent < 0 {
        return 0;
    }
    let mut result: i64 = 1;
    let mut base = base;
    let mut exp = exponent as u64;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}

/// Sign-correct remainder; division by zero yields 0.
pub extern "C" fn runtime_modulo(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    a.checked_rem(b).unwrap_or(0)
}

/// JavaScript-style loose equality over (value, type-code) pairs.
///
/// Same-type operands compare directly (strings by content). Mixed
/// operands coerce numerically: booleans to 0/1, strings through a float
/// parse. A string that does not parse as a number compares unequal to
/// numbers and booleans (`false == "false"` is false).
pub extern "C" fn runtime_js_equal(
    left_value: i64,
    left_type: i64,
    right_value: i64,
    right_type: i64,
) -> i64 {
    if left_type == right_type {
        if left_type == typecode::STRING {
            // Safety: operands typed STRING are string objects
            return unsafe {
                string::string_equals(
                    left_value as *mut StrandString,
                    right_value as *mut StrandString,
                )
            };
        }
        return (left_value == right_value) as i64;
    }

    let as_number = |value: i64, code: i64| -> Option<f64> {
        match code {
            typecode::STRING => {
                if value == 0 {
                    return None;
                }
                // Safety: operands typed STRING are string objects
                let text = unsafe { (*(value as *mut StrandString)).as_str() };
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
            typecode::BOOLEAN => Some(if value != 0 { 1.0 } else { 0.0 }),
            code if typecode::is_numeric(code) || code == typecode::UNKNOWN => Some(value as f64),
            _ => None,
        }
    };

    match (
        as_number(left_value, left_type),
        as_number(right_value, right_type),
    ) {
        (Some(a), Some(b)) => (a == b) as i64,
        _ => (left_value == right_value) as i64,
    }
}

// ============================================================================
// Helper table
// ============================================================================

macro_rules! helper_table {
    ($($name:literal => $func:expr),+ $(,)?) => {{
        let mut table: FxHashMap<&'static str, usize> = FxHashMap::default();
        $(table.insert($name, $func as usize);)+
        table
    }};
}

static HELPER_TABLE: Lazy<FxHashMap<&'static str, usize>> = Lazy::new(|| {
    helper_table! {
        // Console
        "__console_log" => console::console_log,
        "__console_log_string" => console::console_log_string,
        "__console_log_number" => console::console_log_number,
        "__console_log_object" => console::console_log_object,
        "__console_log_array" => console::console_log_array,
        "__console_log_auto" => console::console_log_auto,
        "__console_log_space" => console::console_log_space,
        "__console_log_newline" => console::console_log_newline,
        "__console_time" => console::console_time,
        "__console_timeEnd" => console::console_time_end,

        // Strings
        "__string_create" => string::string_create,
        "__string_create_empty" => string::string_create_empty,
        "__string_destroy" => string::string_destroy,
        "__string_concat" => string::string_concat,
        "__string_concat_cstr" => string::string_concat_cstr,
        "__string_concat_cstr_left" => string::string_concat_cstr_left,
        "__string_equals" => string::string_equals,
        "__string_equals_cstr" => string::string_equals_cstr,
        "__string_compare" => string::string_compare,
        "__string_length" => string::string_length,
        "__string_c_str" => string::string_c_str,
        "__string_char_at" => string::string_char_at,
        "__string_intern" => string::string_intern,

        // Legacy arrays
        "__array_create" => array::array_create,
        "__array_push" => array::array_push,
        "__array_pop" => array::array_pop,
        "__array_size" => array::array_size,
        "__array_data" => array::array_data,
        "__array_get" => array::array_get,

        // Typed arrays
        "__typed_array_create_int8" => array::typed_array_create_int8,
        "__typed_array_create_int16" => array::typed_array_create_int16,
        "__typed_array_create_int32" => array::typed_array_create_int32,
        "__typed_array_create_int64" => array::typed_array_create_int64,
        "__typed_array_create_uint8" => array::typed_array_create_uint8,
        "__typed_array_create_uint16" => array::typed_array_create_uint16,
        "__typed_array_create_uint32" => array::typed_array_create_uint32,
        "__typed_array_create_uint64" => array::typed_array_create_uint64,
        "__typed_array_create_float32" => array::typed_array_create_float32,
        "__typed_array_create_float64" => array::typed_array_create_float64,
        "__typed_array_push_int8" => array::typed_array_push_int8,
        "__typed_array_push_int16" => array::typed_array_push_int16,
        "__typed_array_push_int32" => array::typed_array_push_int32,
        "__typed_array_push_int64" => array::typed_array_push_int64,
        "__typed_array_push_uint8" => array::typed_array_push_uint8,
        "__typed_array_push_uint16" => array::typed_array_push_uint16,
        "__typed_array_push_uint32" => array::typed_array_push_uint32,
        "__typed_array_push_uint64" => array::typed_array_push_uint64,
        "__typed_array_push_float32" => array::typed_array_push_float32,
        "__typed_array_push_float64" => array::typed_array_push_float64,
        "__typed_array_pop_int8" => array::typed_array_pop_int8,
        "__typed_array_pop_int16" => array::typed_array_pop_int16,
        "__typed_array_pop_int32" => array::typed_array_pop_int32,
        "__typed_array_pop_int64" => array::typed_array_pop_int64,
        "__typed_array_pop_uint8" => array::typed_array_pop_uint8,
        "__typed_array_pop_uint16" => array::typed_array_pop_uint16,
        "__typed_array_pop_uint32" => array::typed_array_pop_uint32,
        "__typed_array_pop_uint64" => array::typed_array_pop_uint64,
        "__typed_array_pop_float32" => array::typed_array_pop_float32,
        "__typed_array_pop_float64" => array::typed_array_pop_float64,
        "__typed_array_get_int8" => array::typed_array_get_int8,
        "__typed_array_get_int16" => array::typed_array_get_int16,
        "__typed_array_get_int32" => array::typed_array_get_int32,
        "__typed_array_get_int64" => array::typed_array_get_int64,
        "__typed_array_get_uint8" => array::typed_array_get_uint8,
        "__typed_array_get_uint16" => array::typed_array_get_uint16,
        "__typed_array_get_uint32" => array::typed_array_get_uint32,
        "__typed_array_get_uint64" => array::typed_array_get_uint64,
        "__typed_array_get_float32" => array::typed_array_get_float32,
        "__typed_array_get_float64" => array::typed_array_get_float64,
        "__typed_array_set_int8" => array::typed_array_set_int8,
        "__typed_array_set_int16" => array::typed_array_set_int16,
        "__typed_array_set_int32" => array::typed_array_set_int32,
        "__typed_array_set_int64" => array::typed_array_set_int64,
        "__typed_array_set_uint8" => array::typed_array_set_uint8,
        "__typed_array_set_uint16" => array::typed_array_set_uint16,
        "__typed_array_set_uint32" => array::typed_array_set_uint32,
        "__typed_array_set_uint64" => array::typed_array_set_uint64,
        "__typed_array_set_float32" => array::typed_array_set_float32,
        "__typed_array_set_float64" => array::typed_array_set_float64,
        "__typed_array_size" => array::typed_array_size,
        "__typed_array_raw_data" => array::typed_array_raw_data,

        // Simple arrays
        "__simple_array_zeros" => array::simple_array_zeros,
        "__simple_array_ones" => array::simple_array_ones,
        "__simple_array_arange" => array::simple_array_arange,
        "__simple_array_linspace" => array::simple_array_linspace,
        "__simple_array_push" => array::simple_array_push,
        "__simple_array_pop" => array::simple_array_pop,
        "__simple_array_slice" => array::simple_array_slice,
        "__simple_array_slice_all" => array::simple_array_slice_all,
        "__simple_array_get" => array::simple_array_get,
        "__simple_array_length" => array::simple_array_length,
        "__simple_array_shape" => array::simple_array_shape,
        "__simple_array_sum" => array::simple_array_sum,
        "__simple_array_mean" => array::simple_array_mean,
        "__simple_array_max" => array::simple_array_max,
        "__simple_array_min" => array::simple_array_min,
        "__simple_array_tostring" => array::simple_array_tostring,

        // Slices
        "__slice_create" => array::slice_create,

        // Objects
        "__object_create" => object::object_create,
        "__object_set_property" => object::object_set_property,
        "__object_get_property" => object::object_get_property,
        "__object_set_property_name" => object::object_set_property_name,
        "__object_get_property_name" => object::object_get_property_name,
        "__object_property_count" => object::object_property_count,
        "__object_get_property_by_name" => object::object_get_property_by_name,
        "__object_set_property_by_name" => object::object_set_property_by_name,
        "__object_destroy" => object::object_destroy,

        // Static properties
        "__static_set_property" => object::static_set_property,
        "__static_get_property" => object::static_get_property,

        // Classes
        "__register_class_inheritance" => object::register_class_inheritance,
        "__super_constructor_call" => object::super_constructor_call,

        // Math
        "__runtime_pow" => runtime_pow,
        "__runtime_modulo" => runtime_modulo,
        "__runtime_js_equal" => runtime_js_equal,

        // Regex
        "__register_regex_pattern" => regexp::register_regex_pattern,
        "__regex_create_by_id" => regexp::regex_create_by_id,
        "__regex_test" => regexp::regex_test,
        "__regex_exec" => regexp::regex_exec,
        "__regex_get_source" => regexp::regex_get_source,
        "__regex_get_global" => regexp::regex_get_global,
        "__regex_get_ignore_case" => regexp::regex_get_ignore_case,
        "__string_match" => regexp::string_match,
        "__string_replace" => regexp::string_replace,
        "__string_search" => regexp::string_search,
        "__string_split" => regexp::string_split,

        // Promises
        "__promise_all" => promise::promise_all,
        "__promise_await" => promise::promise_await,
        "__promise_resolve" => promise::promise_resolve,

        // Timers
        "__set_timeout" => timer::set_timeout,
        "__set_interval" => timer::set_interval,
        "__clear_timeout" => timer::clear_timeout,
        "__clear_interval" => timer::clear_interval,

        // Goroutines
        "__goroutine_spawn" => scheduler::goroutine_spawn,
        "__goroutine_spawn_with_arg1" => scheduler::goroutine_spawn_with_arg1,
        "__goroutine_spawn_with_arg2" => scheduler::goroutine_spawn_with_arg2,
        "__goroutine_spawn_with_args" => scheduler::goroutine_spawn_with_args,
        "__goroutine_spawn_func_ptr" => scheduler::goroutine_spawn_func_ptr,

        // Function registry
        "__register_function" => registry::register_function,
        "__register_function_fast" => registry::register_function_fast,
        "__lookup_function_fast" => registry::lookup_function_fast,
        "__lookup_function_by_id" => registry::lookup_function_by_id,

        // Executable memory
        "__set_executable_memory" => registry::set_executable_memory,
        "__executable_memory_base" => registry::executable_memory_base,
    }
});

/// Resolve a runtime helper by its link name.
pub fn helper_address(name: &str) -> Option<usize> {
    HELPER_TABLE.get(name).copied()
}

/// Every registered helper name (for diagnostics and tests).
pub fn helper_names() -> impl Iterator<Item = &'static str> {
    HELPER_TABLE.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_table_resolves_all_groups() {
        for name in [
            "__console_log_string",
            "__string_intern",
            "__array_create",
            "__typed_array_get_float64",
            "__simple_array_zeros",
            "__object_create",
            "__static_get_property",
            "__super_constructor_call",
            "__runtime_pow",
            "__regex_create_by_id",
            "__promise_await",
            "__set_timeout",
            "__goroutine_spawn",
            "__lookup_function_by_id",
            "__executable_memory_base",
        ] {
            assert!(helper_address(name).is_some(), "missing helper {}", name);
        }
        assert!(helper_address("__no_such_helper").is_none());
    }

    #[test]
    fn test_runtime_pow() {
        assert_eq!(runtime_pow(2, 10), 1024);
        assert_eq!(runtime_pow(3, 0), 1);
        assert_eq!(runtime_pow(-2, 3), -8);
        assert_eq!(runtime_pow(2, -1), 0);
    }

    #[test]
    fn test_runtime_modulo_sign_correct() {
        assert_eq!(runtime_modulo(7, 3), 1);
        assert_eq!(runtime_modulo(-7, 3), -1);
        assert_eq!(runtime_modulo(7, -3), 1);
        assert_eq!(runtime_modulo(5, 0), 0);
    }

    #[test]
    fn test_js_equal_same_types() {
        assert_eq!(runtime_js_equal(5, typecode::INT64, 5, typecode::INT64), 1);
        assert_eq!(runtime_js_equal(5, typecode::INT64, 6, typecode::INT64), 0);
    }

    #[test]
    fn test_js_equal_string_content() {
        let a = crate::string::intern_str("same") as i64;
        let b = crate::string::alloc("same") as i64;
        assert_eq!(runtime_js_equal(a, typecode::STRING, b, typecode::STRING), 1);
    }

    #[test]
    fn test_js_equal_numeric_coercion() {
        let five = crate::string::alloc("5") as i64;
        assert_eq!(
            runtime_js_equal(5, typecode::FLOAT64, five, typecode::STRING),
            1
        );

        // Boolean/number coercion
        assert_eq!(
            runtime_js_equal(1, typecode::BOOLEAN, 1, typecode::FLOAT64),
            1
        );

        // `false == "false"` is false (standard coercion, not the
        // stringly-typed shortcut)
        let text_false = crate::string::alloc("false") as i64;
        assert_eq!(
            runtime_js_equal(0, typecode::BOOLEAN, text_false, typecode::STRING),
            0
        );

        // `false == ""` is true (empty string coerces to 0)
        let empty = crate::string::alloc("") as i64;
        assert_eq!(
            runtime_js_equal(0, typecode::BOOLEAN, empty, typecode::STRING),
            1
        );
    }
}
