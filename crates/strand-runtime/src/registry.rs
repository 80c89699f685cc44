//! Function registries and the executable-memory cell.
//!
//! Two parallel maps back the two function-reference shapes: name → native
//! pointer for symbolic call sites, and a 16-bit-ID-indexed table for
//! value-carrying function references. The executable page pointer is
//! written once at install time and read-only thereafter.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::os::raw::c_char;

use crate::string::cstr_to_str;

static FUNCTIONS_BY_NAME: Lazy<Mutex<FxHashMap<String, usize>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// ID-indexed table; slot 0 is reserved (0 is the invalid ID).
static FUNCTIONS_BY_ID: Lazy<Mutex<Vec<usize>>> = Lazy::new(|| Mutex::new(vec![0]));

static EXECUTABLE_MEMORY: Lazy<Mutex<Option<(usize, usize)>>> = Lazy::new(|| Mutex::new(None));

/// # Safety
/// `name` must be null or NUL-terminated.
pub unsafe extern "C" fn register_function(name: *const c_char, func_ptr: usize) {
    FUNCTIONS_BY_NAME
        .lock()
        .insert(cstr_to_str(name).to_string(), func_ptr);
}

pub fn register_named(name: &str, func_ptr: usize) {
    FUNCTIONS_BY_NAME.lock().insert(name.to_string(), func_ptr);
}

pub fn lookup_by_name(name: &str) -> Option<usize> {
    FUNCTIONS_BY_NAME.lock().get(name).copied().filter(|&p| p != 0)
}

/// Allocate a 16-bit function ID. The pointer may be zero at registration
/// time and bound later (Phase 3 of function compilation).
pub extern "C" fn register_function_fast(func_ptr: usize, _arg_count: u16, _cc: u8) -> u16 {
    let mut table = FUNCTIONS_BY_ID.lock();
    let id = table.len();
    if id > u16::MAX as usize {
        return 0;
    }
    table.push(func_ptr);
    id as u16
}

/// Bind or rebind the pointer for an already-allocated ID.
pub fn bind_fast_function(id: u16, func_ptr: usize) {
    let mut table = FUNCTIONS_BY_ID.lock();
    if let Some(slot) = table.get_mut(id as usize) {
        *slot = func_ptr;
    }
}

pub extern "C" fn lookup_function_fast(id: u16) -> usize {
    FUNCTIONS_BY_ID
        .lock()
        .get(id as usize)
        .copied()
        .unwrap_or(0)
}

/// ID lookup used by emitted call sites. Function references carry either
/// a 16-bit ID or an already-resolved address; values above the ID range
/// pass through unchanged. Negative values yield a null pointer (runtime
/// error policy).
pub extern "C" fn lookup_function_by_id(id: i64) -> usize {
    if id < 0 {
        return 0;
    }
    if id > u16::MAX as i64 {
        return id as usize;
    }
    lookup_function_fast(id as u16)
}

/// Record the installed executable region. Written once per compilation
/// unit at install time, under the lock; a later install (a new unit in
/// the same process) replaces it.
pub extern "C" fn set_executable_memory(ptr: usize, size: usize) {
    *EXECUTABLE_MEMORY.lock() = Some((ptr, size));
}

pub extern "C" fn executable_memory_base() -> usize {
    EXECUTABLE_MEMORY.lock().map(|(ptr, _)| ptr).unwrap_or(0)
}

pub fn executable_memory_size() -> usize {
    EXECUTABLE_MEMORY.lock().map(|(_, size)| size).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_registry() {
        register_named("test_registry_fn", 0x1234);
        assert_eq!(lookup_by_name("test_registry_fn"), Some(0x1234));
        assert_eq!(lookup_by_name("test_registry_missing"), None);
    }

    #[test]
    fn test_fast_ids_are_monotonic_and_bindable() {
        let a = register_function_fast(0, 0, 0);
        let b = register_function_fast(0, 0, 0);
        assert!(b > a);
        assert!(a > 0);

        assert_eq!(lookup_function_fast(a), 0);
        bind_fast_function(a, 0xBEEF);
        assert_eq!(lookup_function_fast(a), 0xBEEF);
        assert_eq!(lookup_function_by_id(a as i64), 0xBEEF);
    }

    #[test]
    fn test_lookup_negative_is_null_and_addresses_pass_through() {
        assert_eq!(lookup_function_by_id(-1), 0);
        // Values beyond the 16-bit ID range are already addresses
        assert_eq!(lookup_function_by_id(1 << 20), 1 << 20);
    }
}
