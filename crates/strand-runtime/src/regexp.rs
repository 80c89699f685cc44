//! Regex ABI over the `regex` crate.
//!
//! Patterns are registered into a process-wide registry that hands out
//! monotonic integer IDs; emitted code constructs regex objects by ID.
//! String methods (`match`, `replace`, `search`, `split`) accept either a
//! regex object or a plain string pattern, distinguished through the
//! live-string set.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashMap;
use std::os::raw::c_char;

use crate::array::{self, Array};
use crate::string::{self, cstr_to_str, StrandString};

/// A runtime regex object.
pub struct StrandRegex {
    pub regex: Regex,
    pub source: String,
    pub flags: String,
}

impl StrandRegex {
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn is_ignore_case(&self) -> bool {
        self.flags.contains('i')
    }
}

struct PatternRegistry {
    patterns: Vec<(String, String)>,
    ids: FxHashMap<(String, String), i64>,
}

static PATTERNS: Lazy<Mutex<PatternRegistry>> = Lazy::new(|| {
    Mutex::new(PatternRegistry {
        patterns: Vec::new(),
        ids: FxHashMap::default(),
    })
});

/// Register a pattern + flags pair; identical pairs share one ID.
/// IDs are 1-based and monotonic.
///
/// # Safety
/// Both arguments must be null or NUL-terminated.
pub unsafe extern "C" fn register_regex_pattern(
    pattern: *const c_char,
    flags: *const c_char,
) -> i64 {
    let key = (
        cstr_to_str(pattern).to_string(),
        cstr_to_str(flags).to_string(),
    );
    let mut registry = PATTERNS.lock();
    if let Some(&id) = registry.ids.get(&key) {
        return id;
    }
    registry.patterns.push(key.clone());
    let id = registry.patterns.len() as i64;
    registry.ids.insert(key, id);
    id
}

/// Construct a regex object from a registered pattern ID. Unknown IDs and
/// uncompilable patterns yield null; the program continues.
pub extern "C" fn regex_create_by_id(pattern_id: i64) -> *mut StrandRegex {
    let registry = PATTERNS.lock();
    let Some((pattern, flags)) = registry
        .patterns
        .get((pattern_id - 1).max(0) as usize)
        .filter(|_| pattern_id >= 1)
        .cloned()
    else {
        return std::ptr::null_mut();
    };
    drop(registry);

    let compiled = RegexBuilder::new(&pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .build();
    match compiled {
        Ok(regex) => Box::into_raw(Box::new(StrandRegex {
            regex,
            source: pattern,
            flags,
        })),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `re` must be null or a valid regex object; `s` a valid string object.
pub unsafe extern "C" fn regex_test(re: *mut StrandRegex, s: *mut StrandString) -> i64 {
    match (re.as_ref(), s.as_ref()) {
        (Some(re), Some(s)) => re.regex.is_match(s.as_str()) as i64,
        _ => 0,
    }
}

/// Exec: array of [full match, group1, …] string objects for the first
/// match, or null when there is no match or no subject.
///
/// # Safety
/// `re` must be null or a valid regex object; `s` a valid string object.
pub unsafe extern "C" fn regex_exec(re: *mut StrandRegex, s: *mut StrandString) -> *mut Array {
    let (Some(re), Some(subject)) = (re.as_ref(), s.as_ref()) else {
        return std::ptr::null_mut();
    };
    let Some(captures) = re.regex.captures(subject.as_str()) else {
        return std::ptr::null_mut();
    };
    let result = array::array_create(captures.len() as i64);
    for group in captures.iter() {
        let text = group.map(|m| m.as_str()).unwrap_or("");
        array::array_push(result, string::alloc(text) as i64);
    }
    result
}

/// # Safety
/// `re` must be null or a valid regex object.
pub unsafe extern "C" fn regex_get_source(re: *mut StrandRegex) -> *mut StrandString {
    match re.as_ref() {
        Some(re) => string::alloc(&re.source),
        None => string::alloc(""),
    }
}

/// # Safety
/// `re` must be null or a valid regex object.
pub unsafe extern "C" fn regex_get_global(re: *mut StrandRegex) -> i64 {
    re.as_ref().map(|r| r.is_global() as i64).unwrap_or(0)
}

/// # Safety
/// `re` must be null or a valid regex object.
pub unsafe extern "C" fn regex_get_ignore_case(re: *mut StrandRegex) -> i64 {
    re.as_ref().map(|r| r.is_ignore_case() as i64).unwrap_or(0)
}

/// The pattern argument of a string method: either a regex object or a
/// plain string (matched literally).
unsafe fn as_pattern<'a>(ptr: i64) -> Option<PatternArg<'a>> {
    if ptr == 0 {
        return None;
    }
    if string::is_live_string(ptr as usize) {
        let s = &*(ptr as *mut StrandString);
        Some(PatternArg::Literal(s.as_str().to_string()))
    } else {
        let re = &*(ptr as *mut StrandRegex);
        Some(PatternArg::Regex(re))
    }
}

enum PatternArg<'a> {
    Regex(&'a StrandRegex),
    Literal(String),
}

/// `"str".match(re)`: all matches when the regex is global, otherwise the
/// exec-style first match with groups. Null when nothing matches.
///
/// # Safety
/// `s` must be a valid string object; `pattern` a regex or string object.
pub unsafe extern "C" fn string_match(s: *mut StrandString, pattern: i64) -> *mut Array {
    let Some(subject) = s.as_ref() else {
        return std::ptr::null_mut();
    };
    match as_pattern(pattern) {
        Some(PatternArg::Regex(re)) if re.is_global() => {
            let result = array::array_create(0);
            let mut any = false;
            for m in re.regex.find_iter(subject.as_str()) {
                any = true;
                array::array_push(result, string::alloc(m.as_str()) as i64);
            }
            if any {
                result
            } else {
                std::ptr::null_mut()
            }
        }
        Some(PatternArg::Regex(re)) => {
            let re_ptr = re as *const StrandRegex as *mut StrandRegex;
            regex_exec(re_ptr, s)
        }
        Some(PatternArg::Literal(lit)) => {
            if subject.as_str().contains(&lit) {
                let result = array::array_create(1);
                array::array_push(result, string::alloc(&lit) as i64);
                result
            } else {
                std::ptr::null_mut()
            }
        }
        None => std::ptr::null_mut(),
    }
}

/// `"str".replace(pat, repl)`: first occurrence, or every occurrence for a
/// global regex.
///
/// # Safety
/// All three must be valid objects of their kinds (see `as_pattern`).
pub unsafe extern "C" fn string_replace(
    s: *mut StrandString,
    pattern: i64,
    replacement: *mut StrandString,
) -> *mut StrandString {
    let Some(subject) = s.as_ref() else {
        return string::alloc("");
    };
    let repl = replacement
        .as_ref()
        .map(|r| r.as_str().to_string())
        .unwrap_or_default();
    let replaced = match as_pattern(pattern) {
        Some(PatternArg::Regex(re)) if re.is_global() => re
            .regex
            .replace_all(subject.as_str(), repl.as_str())
            .into_owned(),
        Some(PatternArg::Regex(re)) => re
            .regex
            .replace(subject.as_str(), repl.as_str())
            .into_owned(),
        Some(PatternArg::Literal(lit)) => subject.as_str().replacen(&lit, &repl, 1),
        None => subject.as_str().to_string(),
    };
    string::alloc(&replaced)
}

/// `"str".search(re)`: byte index of the first match, or -1.
///
/// # Safety
/// `s` must be a valid string object; `pattern` a regex or string object.
pub unsafe extern "C" fn string_search(s: *mut StrandString, pattern: i64) -> i64 {
    let Some(subject) = s.as_ref() else {
        return -1;
    };
    match as_pattern(pattern) {
        Some(PatternArg::Regex(re)) => re
            .regex
            .find(subject.as_str())
            .map(|m| m.start() as i64)
            .unwrap_or(-1),
        Some(PatternArg::Literal(lit)) => subject
            .as_str()
            .find(&lit)
            .map(|i| i as i64)
            .unwrap_or(-1),
        None => -1,
    }
}

/// `"str".split(delim)`: array of string objects.
///
/// # Safety
/// `s` must be a valid string object; `pattern` a regex or string object.
pub unsafe extern "C" fn string_split(s: *mut StrandString, pattern: i64) -> *mut Array {
    let result = array::array_create(0);
    let Some(subject) = s.as_ref() else {
        return result;
    };
    let parts: Vec<String> = match as_pattern(pattern) {
        Some(PatternArg::Regex(re)) => re
            .regex
            .split(subject.as_str())
            .map(|p| p.to_string())
            .collect(),
        Some(PatternArg::Literal(lit)) if !lit.is_empty() => subject
            .as_str()
            .split(&lit)
            .map(|p| p.to_string())
            .collect(),
        _ => subject.as_str().chars().map(|c| c.to_string()).collect(),
    };
    for part in parts {
        array::array_push(result, string::alloc(&part) as i64);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn make_regex(pattern: &str, flags: &str) -> *mut StrandRegex {
        let p = CString::new(pattern).unwrap();
        let f = CString::new(flags).unwrap();
        let id = unsafe { register_regex_pattern(p.as_ptr(), f.as_ptr()) };
        regex_create_by_id(id)
    }

    #[test]
    fn test_pattern_registry_dedupes() {
        let p = CString::new("xyz+").unwrap();
        let f = CString::new("").unwrap();
        let a = unsafe { register_regex_pattern(p.as_ptr(), f.as_ptr()) };
        let b = unsafe { register_regex_pattern(p.as_ptr(), f.as_ptr()) };
        assert_eq!(a, b);
        assert!(a >= 1);
    }

    #[test]
    fn test_create_unknown_id_is_null() {
        assert!(regex_create_by_id(1 << 30).is_null());
        assert!(regex_create_by_id(0).is_null());
    }

    #[test]
    fn test_test_and_flags() {
        unsafe {
            let re = make_regex("ab+c", "i");
            let hay = string::alloc("xxABBBCxx");
            assert_eq!(regex_test(re, hay), 1);
            assert_eq!(regex_get_ignore_case(re), 1);
            assert_eq!(regex_get_global(re), 0);

            let source = regex_get_source(re);
            assert_eq!((*source).as_str(), "ab+c");
        }
    }

    #[test]
    fn test_exec_returns_groups() {
        unsafe {
            let re = make_regex(r"(\d+)-(\d+)", "");
            let hay = string::alloc("order 12-34 shipped");
            let result = regex_exec(re, hay);
            assert!(!result.is_null());
            let data = &(*result).data;
            assert_eq!(data.len(), 3);
            assert_eq!((*(data[0] as *mut StrandString)).as_str(), "12-34");
            assert_eq!((*(data[1] as *mut StrandString)).as_str(), "12");
            assert_eq!((*(data[2] as *mut StrandString)).as_str(), "34");

            let miss = string::alloc("no digits");
            assert!(regex_exec(re, miss).is_null());
        }
    }

    #[test]
    fn test_string_match_global() {
        unsafe {
            let re = make_regex(r"\d+", "g");
            let hay = string::alloc("a1 b22 c333");
            let result = string_match(hay, re as i64);
            assert!(!result.is_null());
            let data = &(*result).data;
            let texts: Vec<&str> = data
                .iter()
                .map(|&p| (*(p as *mut StrandString)).as_str())
                .collect();
            assert_eq!(texts, vec!["1", "22", "333"]);
        }
    }

    #[test]
    fn test_string_replace_global_and_single() {
        unsafe {
            let re_g = make_regex("o", "g");
            let hay = string::alloc("foo boo");
            let all = string_replace(hay, re_g as i64, string::alloc("0"));
            assert_eq!((*all).as_str(), "f00 b00");

            let re = make_regex("o", "");
            let first = string_replace(hay, re as i64, string::alloc("0"));
            assert_eq!((*first).as_str(), "f0o boo");

            // Literal string pattern
            let lit = string::alloc("boo");
            let lit_replaced = string_replace(hay, lit as i64, string::alloc("bar"));
            assert_eq!((*lit_replaced).as_str(), "foo bar");
        }
    }

    #[test]
    fn test_string_search_and_split() {
        unsafe {
            let re = make_regex(r"\s+", "");
            let hay = string::alloc("alpha beta\tgamma");
            assert_eq!(string_search(hay, re as i64), 5);

            let parts = string_split(hay, re as i64);
            let data = &(*parts).data;
            let texts: Vec<&str> = data
                .iter()
                .map(|&p| (*(p as *mut StrandString)).as_str())
                .collect();
            assert_eq!(texts, vec!["alpha", "beta", "gamma"]);

            let missing = string::alloc("zz");
            assert_eq!(string_search(hay, missing as i64), -1);
        }
    }
}
