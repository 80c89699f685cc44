//! Object instances, static properties, and class inheritance.
//!
//! Instances live in a process-wide registry keyed by monotonic integer IDs;
//! destruction is explicit. Property access is index-based (declaration
//! order); a parallel property-name vector supports iteration.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::registry;
use crate::string::cstr_to_str;

/// A live object: class name, fixed property-value vector sized at
/// creation, and a parallel property-name vector.
pub struct ObjectInstance {
    pub class_name: String,
    pub properties: Vec<i64>,
    pub property_names: Vec<Option<CString>>,
}

static OBJECTS: Lazy<DashMap<i64, ObjectInstance>> = Lazy::new(DashMap::new);
static NEXT_OBJECT_ID: AtomicI64 = AtomicI64::new(1);

/// (class, property) → value
static STATIC_PROPERTIES: Lazy<Mutex<FxHashMap<(String, String), i64>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// child class → parent class
static INHERITANCE: Lazy<Mutex<FxHashMap<String, String>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// # Safety
/// `class_name` must be null or NUL-terminated.
pub unsafe extern "C" fn object_create(class_name: *const c_char, property_count: i64) -> i64 {
    let id = NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed);
    let count = property_count.max(0) as usize;
    OBJECTS.insert(
        id,
        ObjectInstance {
            class_name: cstr_to_str(class_name).to_string(),
            properties: vec![0; count],
            property_names: vec![None; count],
        },
    );
    id
}

pub extern "C" fn object_set_property(object_id: i64, property_index: i64, value: i64) {
    if property_index < 0 {
        return;
    }
    if let Some(mut obj) = OBJECTS.get_mut(&object_id) {
        if let Some(slot) = obj.properties.get_mut(property_index as usize) {
            *slot = value;
        }
    }
}

/// Out-of-range object IDs and indexes return 0; the program continues.
pub extern "C" fn object_get_property(object_id: i64, property_index: i64) -> i64 {
    if property_index < 0 {
        return 0;
    }
    OBJECTS
        .get(&object_id)
        .and_then(|obj| obj.properties.get(property_index as usize).copied())
        .unwrap_or(0)
}

/// # Safety
/// `name` must be null or NUL-terminated.
pub unsafe extern "C" fn object_set_property_name(
    object_id: i64,
    property_index: i64,
    name: *const c_char,
) {
    if property_index < 0 {
        return;
    }
    if let Some(mut obj) = OBJECTS.get_mut(&object_id) {
        if let Some(slot) = obj.property_names.get_mut(property_index as usize) {
            *slot = CString::new(cstr_to_str(name)).ok();
        }
    }
}

/// Returns a pointer into the instance's stored name, or null.
pub extern "C" fn object_get_property_name(object_id: i64, property_index: i64) -> *const c_char {
    if property_index < 0 {
        return std::ptr::null();
    }
    OBJECTS
        .get(&object_id)
        .and_then(|obj| {
            obj.property_names
                .get(property_index as usize)
                .and_then(|n| n.as_ref().map(|c| c.as_ptr()))
        })
        .unwrap_or(std::ptr::null())
}

/// Registered property count of an instance; for-each over objects iterates
/// exactly this many slots.
pub extern "C" fn object_property_count(object_id: i64) -> i64 {
    OBJECTS
        .get(&object_id)
        .map(|obj| obj.properties.len() as i64)
        .unwrap_or(0)
}

pub extern "C" fn object_destroy(object_id: i64) {
    OBJECTS.remove(&object_id);
}

/// Look a property up by name (object-literal instances, where no class
/// layout is registered at compile time). Unknown names return 0.
///
/// # Safety
/// `name` must be null or NUL-terminated.
pub unsafe extern "C" fn object_get_property_by_name(
    object_id: i64,
    name: *const c_char,
) -> i64 {
    let wanted = cstr_to_str(name);
    OBJECTS
        .get(&object_id)
        .and_then(|obj| {
            obj.property_names
                .iter()
                .position(|n| n.as_ref().map(|c| c.to_str().unwrap_or("")) == Some(wanted))
                .and_then(|i| obj.properties.get(i).copied())
        })
        .unwrap_or(0)
}

/// Set a property by name, matching `object_get_property_by_name`.
///
/// # Safety
/// `name` must be null or NUL-terminated.
pub unsafe extern "C" fn object_set_property_by_name(
    object_id: i64,
    name: *const c_char,
    value: i64,
) {
    let wanted = cstr_to_str(name);
    if let Some(mut obj) = OBJECTS.get_mut(&object_id) {
        if let Some(i) = obj
            .property_names
            .iter()
            .position(|n| n.as_ref().map(|c| c.to_str().unwrap_or("")) == Some(wanted))
        {
            obj.properties[i] = value;
        }
    }
}

/// Class name of a live instance (for tests and console printing).
pub fn class_name_of(object_id: i64) -> Option<String> {
    OBJECTS.get(&object_id).map(|obj| obj.class_name.clone())
}

pub fn property_values(object_id: i64) -> Option<Vec<i64>> {
    OBJECTS.get(&object_id).map(|obj| obj.properties.clone())
}

// ============================================================================
// Static properties
// ============================================================================

/// # Safety
/// Both name arguments must be null or NUL-terminated.
pub unsafe extern "C" fn static_set_property(
    class_name: *const c_char,
    property_name: *const c_char,
    value: i64,
) {
    STATIC_PROPERTIES.lock().insert(
        (
            cstr_to_str(class_name).to_string(),
            cstr_to_str(property_name).to_string(),
        ),
        value,
    );
}

/// # Safety
/// Both name arguments must be null or NUL-terminated.
pub unsafe extern "C" fn static_get_property(
    class_name: *const c_char,
    property_name: *const c_char,
) -> i64 {
    STATIC_PROPERTIES
        .lock()
        .get(&(
            cstr_to_str(class_name).to_string(),
            cstr_to_str(property_name).to_string(),
        ))
        .copied()
        .unwrap_or(0)
}

// ============================================================================
// Inheritance
// ============================================================================

/// # Safety
/// Both name arguments must be null or NUL-terminated.
pub unsafe extern "C" fn register_class_inheritance(
    child_class: *const c_char,
    parent_class: *const c_char,
) {
    INHERITANCE.lock().insert(
        cstr_to_str(child_class).to_string(),
        cstr_to_str(parent_class).to_string(),
    );
}

pub fn parent_of(class_name: &str) -> Option<String> {
    INHERITANCE.lock().get(class_name).cloned()
}

/// Call the parent-class constructor of an instance's class. The parent is
/// resolved through the inheritance table and its constructor through the
/// name registry; a missing entry is a silent no-op (runtime error policy:
/// null return, program continues).
pub extern "C" fn super_constructor_call(
    object_id: i64,
    a1: i64,
    a2: i64,
    a3: i64,
    a4: i64,
    a5: i64,
) {
    let Some(class_name) = class_name_of(object_id) else {
        return;
    };
    let Some(parent) = parent_of(&class_name) else {
        return;
    };
    let label = format!("__constructor_{}", parent);
    let Some(ptr) = registry::lookup_by_name(&label) else {
        return;
    };
    // Parent constructors receive the object id in the first slot.
    // Safety: the registry only holds entry points emitted with this ABI.
    unsafe {
        let ctor: extern "C" fn(i64, i64, i64, i64, i64, i64) = std::mem::transmute(ptr);
        ctor(object_id, a1, a2, a3, a4, a5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_object_lifecycle() {
        unsafe {
            let class = CString::new("Point").unwrap();
            let id = object_create(class.as_ptr(), 2);
            assert!(id > 0);
            assert_eq!(object_property_count(id), 2);

            object_set_property(id, 0, 3);
            object_set_property(id, 1, 4);
            assert_eq!(object_get_property(id, 0), 3);
            assert_eq!(object_get_property(id, 1), 4);

            // Out of range: zero return, no failure
            assert_eq!(object_get_property(id, 9), 0);
            assert_eq!(object_get_property(99_999_999, 0), 0);

            object_destroy(id);
            assert_eq!(object_get_property(id, 0), 0);
        }
    }

    #[test]
    fn test_property_names_for_iteration() {
        unsafe {
            let class = CString::new("ObjectLiteral").unwrap();
            let id = object_create(class.as_ptr(), 2);
            let name = CString::new("alpha").unwrap();
            object_set_property_name(id, 0, name.as_ptr());

            let got = object_get_property_name(id, 0);
            assert!(!got.is_null());
            assert_eq!(cstr_to_str(got), "alpha");
            assert!(object_get_property_name(id, 1).is_null());
        }
    }

    #[test]
    fn test_static_properties() {
        unsafe {
            let class = CString::new("Counter").unwrap();
            let prop = CString::new("total").unwrap();
            static_set_property(class.as_ptr(), prop.as_ptr(), 99);
            assert_eq!(static_get_property(class.as_ptr(), prop.as_ptr()), 99);

            let missing = CString::new("missing").unwrap();
            assert_eq!(static_get_property(class.as_ptr(), missing.as_ptr()), 0);
        }
    }

    #[test]
    fn test_inheritance_table() {
        unsafe {
            let child = CString::new("Circle").unwrap();
            let parent = CString::new("Shape").unwrap();
            register_class_inheritance(child.as_ptr(), parent.as_ptr());
            assert_eq!(parent_of("Circle").as_deref(), Some("Shape"));
            assert_eq!(parent_of("Square"), None);
        }
    }
}
