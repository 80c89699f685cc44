//! Console helpers behind `console.log`, `console.time`, `console.timeEnd`.
//!
//! `console.log` is lowered to one helper call per argument with space
//! separators and a trailing newline, so each helper prints without a
//! newline of its own.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::io::Write;
use std::os::raw::c_char;
use std::time::Instant;

use crate::object;
use crate::string::{self, cstr_to_str, StrandString};

static TIMERS: Lazy<Mutex<FxHashMap<String, Instant>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

fn write_out(text: &str) {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let _ = lock.write_all(text.as_bytes());
    let _ = lock.flush();
}

/// # Safety
/// `message` must be null or NUL-terminated.
pub unsafe extern "C" fn console_log(message: *const c_char) {
    write_out(cstr_to_str(message));
}

/// # Safety
/// `ptr` must be null or a valid string object.
pub unsafe extern "C" fn console_log_string(ptr: *mut StrandString) {
    if let Some(s) = ptr.as_ref() {
        write_out(s.as_str());
    }
}

pub extern "C" fn console_log_number(value: i64) {
    write_out(&value.to_string());
}

/// Object IDs print as `ClassName { a, b, … }`.
pub extern "C" fn console_log_object(object_id: i64) {
    match (object::class_name_of(object_id), object::property_values(object_id)) {
        (Some(class), Some(values)) => {
            let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            write_out(&format!("{} {{ {} }}", class, items.join(", ")));
        }
        _ => write_out("null"),
    }
}

/// # Safety
/// `data` must be null or point at `size` readable i64 values.
pub unsafe extern "C" fn console_log_array(data: *const i64, size: i64) {
    if data.is_null() || size < 0 {
        write_out("[]");
        return;
    }
    let slice = std::slice::from_raw_parts(data, size as usize);
    let items: Vec<String> = slice.iter().map(|v| v.to_string()).collect();
    write_out(&format!("[{}]", items.join(", ")));
}

/// Dynamic-type fallback: print live string objects as strings, everything
/// else as a number.
pub extern "C" fn console_log_auto(value: i64) {
    if string::is_live_string(value as usize) {
        // Safety: membership in the live-string set makes this a valid object
        unsafe { console_log_string(value as *mut StrandString) };
    } else {
        console_log_number(value);
    }
}

pub extern "C" fn console_log_space() {
    write_out(" ");
}

pub extern "C" fn console_log_newline() {
    write_out("\n");
}

/// # Safety
/// `label` must be null or NUL-terminated.
pub unsafe extern "C" fn console_time(label: *const c_char) {
    TIMERS
        .lock()
        .insert(cstr_to_str(label).to_string(), Instant::now());
}

/// # Safety
/// `label` must be null or NUL-terminated.
pub unsafe extern "C" fn console_time_end(label: *const c_char) {
    let label = cstr_to_str(label).to_string();
    if let Some(start) = TIMERS.lock().remove(&label) {
        write_out(&format!("{}: {:.3}ms\n", label, start.elapsed().as_secs_f64() * 1000.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_time_labels_are_tracked() {
        unsafe {
            let label = CString::new("phase").unwrap();
            console_time(label.as_ptr());
            assert!(TIMERS.lock().contains_key("phase"));
            console_time_end(label.as_ptr());
            assert!(!TIMERS.lock().contains_key("phase"));
        }
    }

    #[test]
    fn test_log_auto_distinguishes_strings() {
        // Smoke test: must not crash on either branch.
        let s = string::intern_str("auto");
        console_log_auto(s as i64);
        console_log_auto(42);
    }
}
