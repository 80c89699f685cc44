//! Runtime strings and the process-wide intern pool.
//!
//! String objects handed to emitted code are heap-allocated with stable
//! addresses. Literals are interned: identical byte sequences always map to
//! the same pointer for the process lifetime. A live-pointer set backs the
//! `console.log` auto-detection helper.

use dashmap::DashSet;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::os::raw::c_char;

/// A runtime string object. The byte buffer always carries a trailing NUL
/// so `c_str` can hand out a C pointer without copying.
pub struct StrandString {
    bytes: Box<[u8]>,
    interned: bool,
}

impl StrandString {
    fn boxed(s: &str, interned: bool) -> Box<StrandString> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        Box::new(StrandString {
            bytes: bytes.into_boxed_slice(),
            interned,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len()]).unwrap_or("")
    }

    pub fn c_ptr(&self) -> *const c_char {
        self.bytes.as_ptr() as *const c_char
    }
}

/// Intern pool: bytes → stable pointer. Append-only.
static INTERN_POOL: Lazy<Mutex<FxHashMap<Vec<u8>, usize>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Every live StrandString pointer, for `log_auto` type detection.
static LIVE_STRINGS: Lazy<DashSet<usize>> = Lazy::new(DashSet::new);

/// Allocate a new (non-interned) string object.
pub fn alloc(s: &str) -> *mut StrandString {
    let ptr = Box::into_raw(StrandString::boxed(s, false));
    LIVE_STRINGS.insert(ptr as usize);
    ptr
}

/// Intern a byte string: the same bytes always yield the same pointer.
pub fn intern_str(s: &str) -> *mut StrandString {
    let mut pool = INTERN_POOL.lock();
    if let Some(&ptr) = pool.get(s.as_bytes()) {
        return ptr as *mut StrandString;
    }
    let ptr = Box::into_raw(StrandString::boxed(s, true));
    LIVE_STRINGS.insert(ptr as usize);
    pool.insert(s.as_bytes().to_vec(), ptr as usize);
    ptr
}

/// Is this pointer a live string object?
pub fn is_live_string(ptr: usize) -> bool {
    LIVE_STRINGS.contains(&ptr)
}

/// Intern `s` and return the address of its NUL-terminated bytes.
///
/// The compiler embeds these addresses as immediates in emitted code, so
/// stability for the process lifetime is load-bearing.
pub fn intern_cstr(s: &str) -> usize {
    let ptr = intern_str(s);
    // Safety: intern_str returns a valid, never-freed string object
    unsafe { (*ptr).c_ptr() as usize }
}

/// Read a NUL-terminated C string; empty on null.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated buffer.
pub unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    std::ffi::CStr::from_ptr(ptr).to_str().unwrap_or("")
}

// ============================================================================
// C-callable helpers
// ============================================================================

/// # Safety
/// `s` must be null or NUL-terminated.
pub unsafe extern "C" fn string_create(s: *const c_char) -> *mut StrandString {
    alloc(cstr_to_str(s))
}

pub extern "C" fn string_create_empty() -> *mut StrandString {
    intern_str("")
}

/// Interned strings are never freed; destroying one is a no-op.
///
/// # Safety
/// `ptr` must be null or a pointer previously returned by this module.
pub unsafe extern "C" fn string_destroy(ptr: *mut StrandString) {
    if ptr.is_null() || (*ptr).interned {
        return;
    }
    LIVE_STRINGS.remove(&(ptr as usize));
    drop(Box::from_raw(ptr));
}

/// # Safety
/// Both operands must be valid string objects or null.
pub unsafe extern "C" fn string_concat(
    a: *mut StrandString,
    b: *mut StrandString,
) -> *mut StrandString {
    let left = if a.is_null() { "" } else { (*a).as_str() };
    let right = if b.is_null() { "" } else { (*b).as_str() };
    alloc(&format!("{}{}", left, right))
}

/// # Safety
/// `a` must be a valid string object, `b` a NUL-terminated C string.
pub unsafe extern "C" fn string_concat_cstr(
    a: *mut StrandString,
    b: *const c_char,
) -> *mut StrandString {
    let left = if a.is_null() { "" } else { (*a).as_str() };
    alloc(&format!("{}{}", left, cstr_to_str(b)))
}

/// # Safety
/// `a` must be a NUL-terminated C string, `b` a valid string object.
pub unsafe extern "C" fn string_concat_cstr_left(
    a: *const c_char,
    b: *mut StrandString,
) -> *mut StrandString {
    let right = if b.is_null() { "" } else { (*b).as_str() };
    alloc(&format!("{}{}", cstr_to_str(a), right))
}

/// # Safety
/// Both operands must be valid string objects or null.
pub unsafe extern "C" fn string_equals(a: *mut StrandString, b: *mut StrandString) -> i64 {
    if a == b {
        return 1;
    }
    if a.is_null() || b.is_null() {
        return 0;
    }
    ((*a).as_str() == (*b).as_str()) as i64
}

/// # Safety
/// `a` must be a valid string object, `b` a NUL-terminated C string.
pub unsafe extern "C" fn string_equals_cstr(a: *mut StrandString, b: *const c_char) -> i64 {
    if a.is_null() {
        return 0;
    }
    ((*a).as_str() == cstr_to_str(b)) as i64
}

/// Lexicographic compare: -1 / 0 / 1.
///
/// # Safety
/// Both operands must be valid string objects or null.
pub unsafe extern "C" fn string_compare(a: *mut StrandString, b: *mut StrandString) -> i64 {
    let left = if a.is_null() { "" } else { (*a).as_str() };
    let right = if b.is_null() { "" } else { (*b).as_str() };
    match left.cmp(right) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// # Safety
/// `ptr` must be a valid string object or null.
pub unsafe extern "C" fn string_length(ptr: *mut StrandString) -> i64 {
    if ptr.is_null() {
        return 0;
    }
    (*ptr).len() as i64
}

/// # Safety
/// `ptr` must be a valid string object or null.
pub unsafe extern "C" fn string_c_str(ptr: *mut StrandString) -> *const c_char {
    if ptr.is_null() {
        return b"\0".as_ptr() as *const c_char;
    }
    (*ptr).c_ptr()
}

/// # Safety
/// `ptr` must be a valid string object or null.
pub unsafe extern "C" fn string_char_at(ptr: *mut StrandString, index: i64) -> i64 {
    if ptr.is_null() || index < 0 {
        return 0;
    }
    (*ptr)
        .as_str()
        .as_bytes()
        .get(index as usize)
        .copied()
        .map(i64::from)
        .unwrap_or(0)
}

/// # Safety
/// `s` must be null or NUL-terminated.
pub unsafe extern "C" fn string_intern(s: *const c_char) -> *mut StrandString {
    intern_str(cstr_to_str(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_canonical() {
        let a = intern_str("hello");
        let b = intern_str("hello");
        let c = intern_str("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_intern_round_trip() {
        let ptr = intern_str("round trip \n text");
        unsafe {
            let back = cstr_to_str(string_c_str(ptr));
            assert_eq!(back, "round trip \n text");
        }
    }

    #[test]
    fn test_concat_length() {
        unsafe {
            let a = alloc("foo");
            let b = alloc("barbaz");
            let joined = string_concat(a, b);
            assert_eq!(string_length(joined), string_length(a) + string_length(b));
            assert_eq!((*joined).as_str(), "foobarbaz");
        }
    }

    #[test]
    fn test_equals_and_compare() {
        unsafe {
            let a = alloc("abc");
            let b = alloc("abc");
            let c = alloc("abd");
            assert_eq!(string_equals(a, b), 1);
            assert_eq!(string_equals(a, c), 0);
            assert_eq!(string_compare(a, c), -1);
            assert_eq!(string_compare(c, a), 1);
            assert_eq!(string_compare(a, b), 0);
        }
    }

    #[test]
    fn test_destroy_interned_is_noop() {
        unsafe {
            let a = intern_str("keep me");
            string_destroy(a);
            // Still usable after the no-op destroy
            assert_eq!((*a).as_str(), "keep me");
            assert!(is_live_string(a as usize));
        }
    }

    #[test]
    fn test_char_at() {
        unsafe {
            let s = alloc("xyz");
            assert_eq!(string_char_at(s, 0), 'x' as i64);
            assert_eq!(string_char_at(s, 2), 'z' as i64);
            assert_eq!(string_char_at(s, 5), 0);
        }
    }
}
