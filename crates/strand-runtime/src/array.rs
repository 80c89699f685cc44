//! Array runtimes: the legacy i64 array, per-element-type typed arrays, and
//! the simple numeric array behind the `Array` statics
//! (zeros/ones/arange/linspace) and slicing.
//!
//! Values cross the JIT boundary as 64-bit words, so the legacy and simple
//! arrays store `i64`; typed arrays store their native element type behind a
//! type-erased header (length + data pointer) so the generic `size` and
//! `raw_data` helpers work on any of them.

use crate::string;

// ============================================================================
// Legacy array
// ============================================================================

/// Growable i64 array handed to emitted code by pointer.
pub struct Array {
    pub data: Vec<i64>,
}

pub extern "C" fn array_create(initial_capacity: i64) -> *mut Array {
    let cap = initial_capacity.max(0) as usize;
    Box::into_raw(Box::new(Array {
        data: Vec::with_capacity(cap),
    }))
}

/// # Safety
/// `arr` must be null or a pointer returned by `array_create`.
pub unsafe extern "C" fn array_push(arr: *mut Array, value: i64) {
    if let Some(arr) = arr.as_mut() {
        arr.data.push(value);
    }
}

/// # Safety
/// `arr` must be null or a valid array pointer.
pub unsafe extern "C" fn array_pop(arr: *mut Array) -> i64 {
    arr.as_mut().and_then(|a| a.data.pop()).unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid array pointer.
pub unsafe extern "C" fn array_size(arr: *mut Array) -> i64 {
    arr.as_ref().map(|a| a.data.len() as i64).unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid array pointer.
pub unsafe extern "C" fn array_data(arr: *mut Array) -> *mut i64 {
    arr.as_mut()
        .map(|a| a.data.as_mut_ptr())
        .unwrap_or(std::ptr::null_mut())
}

/// Out-of-range reads return 0 and the program continues.
///
/// # Safety
/// `arr` must be null or a valid array pointer.
pub unsafe extern "C" fn array_get(arr: *mut Array, index: i64) -> i64 {
    if index < 0 {
        return 0;
    }
    arr.as_ref()
        .and_then(|a| a.data.get(index as usize).copied())
        .unwrap_or(0)
}

// ============================================================================
// Typed arrays
// ============================================================================

/// Type-erased header shared by every `TypedArray<T>`; must stay the first
/// field so the generic size/raw_data helpers can read it.
#[repr(C)]
pub struct TypedArrayHeader {
    pub len: i64,
    pub data_ptr: *mut u8,
}

#[repr(C)]
pub struct TypedArray<T> {
    pub header: TypedArrayHeader,
    pub data: Vec<T>,
}

impl<T> TypedArray<T> {
    fn new(capacity: usize) -> Box<Self> {
        let mut array = Box::new(TypedArray {
            header: TypedArrayHeader {
                len: 0,
                data_ptr: std::ptr::null_mut(),
            },
            data: Vec::with_capacity(capacity),
        });
        array.sync_header();
        array
    }

    fn sync_header(&mut self) {
        self.header.len = self.data.len() as i64;
        self.header.data_ptr = self.data.as_mut_ptr() as *mut u8;
    }
}

macro_rules! typed_array_helpers {
    ($ty:ty, $create:ident, $push:ident, $pop:ident, $get:ident, $set:ident) => {
        pub extern "C" fn $create(initial_capacity: i64) -> *mut TypedArray<$ty> {
            Box::into_raw(TypedArray::<$ty>::new(initial_capacity.max(0) as usize))
        }

        /// # Safety
        /// `arr` must be null or a matching typed-array pointer.
        pub unsafe extern "C" fn $push(arr: *mut TypedArray<$ty>, value: $ty) {
            if let Some(arr) = arr.as_mut() {
                arr.data.push(value);
                arr.sync_header();
            }
        }

        /// # Safety
        /// `arr` must be null or a matching typed-array pointer.
        pub unsafe extern "C" fn $pop(arr: *mut TypedArray<$ty>) -> $ty {
            let value = arr
                .as_mut()
                .and_then(|a| a.data.pop())
                .unwrap_or_default();
            if let Some(arr) = arr.as_mut() {
                arr.sync_header();
            }
            value
        }

        /// # Safety
        /// `arr` must be null or a matching typed-array pointer.
        pub unsafe extern "C" fn $get(arr: *mut TypedArray<$ty>, index: i64) -> $ty {
            if index < 0 {
                return <$ty>::default();
            }
            arr.as_ref()
                .and_then(|a| a.data.get(index as usize).copied())
                .unwrap_or_default()
        }

        /// # Safety
        /// `arr` must be null or a matching typed-array pointer.
        pub unsafe extern "C" fn $set(arr: *mut TypedArray<$ty>, index: i64, value: $ty) {
            if index < 0 {
                return;
            }
            if let Some(arr) = arr.as_mut() {
                if let Some(slot) = arr.data.get_mut(index as usize) {
                    *slot = value;
                }
            }
        }
    };
}

typed_array_helpers!(i8, typed_array_create_int8, typed_array_push_int8, typed_array_pop_int8, typed_array_get_int8, typed_array_set_int8);
typed_array_helpers!(i16, typed_array_create_int16, typed_array_push_int16, typed_array_pop_int16, typed_array_get_int16, typed_array_set_int16);
typed_array_helpers!(i32, typed_array_create_int32, typed_array_push_int32, typed_array_pop_int32, typed_array_get_int32, typed_array_set_int32);
typed_array_helpers!(i64, typed_array_create_int64, typed_array_push_int64, typed_array_pop_int64, typed_array_get_int64, typed_array_set_int64);
typed_array_helpers!(u8, typed_array_create_uint8, typed_array_push_uint8, typed_array_pop_uint8, typed_array_get_uint8, typed_array_set_uint8);
typed_array_helpers!(u16, typed_array_create_uint16, typed_array_push_uint16, typed_array_pop_uint16, typed_array_get_uint16, typed_array_set_uint16);
typed_array_helpers!(u32, typed_array_create_uint32, typed_array_push_uint32, typed_array_pop_uint32, typed_array_get_uint32, typed_array_set_uint32);
typed_array_helpers!(u64, typed_array_create_uint64, typed_array_push_uint64, typed_array_pop_uint64, typed_array_get_uint64, typed_array_set_uint64);
// Float arrays store native f32/f64 elements but cross the JIT boundary as
// 64-bit integer value words (all emitted code moves values through the
// integer registers), so their helpers convert at the edge.

pub extern "C" fn typed_array_create_float32(initial_capacity: i64) -> *mut TypedArray<f32> {
    Box::into_raw(TypedArray::<f32>::new(initial_capacity.max(0) as usize))
}

pub extern "C" fn typed_array_create_float64(initial_capacity: i64) -> *mut TypedArray<f64> {
    Box::into_raw(TypedArray::<f64>::new(initial_capacity.max(0) as usize))
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_push_float32(arr: *mut TypedArray<f32>, value: i64) {
    if let Some(arr) = arr.as_mut() {
        arr.data.push(value as f32);
        arr.sync_header();
    }
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_push_float64(arr: *mut TypedArray<f64>, value: i64) {
    if let Some(arr) = arr.as_mut() {
        arr.data.push(value as f64);
        arr.sync_header();
    }
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_pop_float32(arr: *mut TypedArray<f32>) -> i64 {
    let value = arr.as_mut().and_then(|a| a.data.pop()).unwrap_or(0.0);
    if let Some(arr) = arr.as_mut() {
        arr.sync_header();
    }
    value as i64
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_pop_float64(arr: *mut TypedArray<f64>) -> i64 {
    let value = arr.as_mut().and_then(|a| a.data.pop()).unwrap_or(0.0);
    if let Some(arr) = arr.as_mut() {
        arr.sync_header();
    }
    value as i64
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_get_float32(arr: *mut TypedArray<f32>, index: i64) -> i64 {
    if index < 0 {
        return 0;
    }
    arr.as_ref()
        .and_then(|a| a.data.get(index as usize).copied())
        .unwrap_or(0.0) as i64
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_get_float64(arr: *mut TypedArray<f64>, index: i64) -> i64 {
    if index < 0 {
        return 0;
    }
    arr.as_ref()
        .and_then(|a| a.data.get(index as usize).copied())
        .unwrap_or(0.0) as i64
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_set_float32(arr: *mut TypedArray<f32>, index: i64, value: i64) {
    if index < 0 {
        return;
    }
    if let Some(arr) = arr.as_mut() {
        if let Some(slot) = arr.data.get_mut(index as usize) {
            *slot = value as f32;
        }
    }
}

/// # Safety
/// `arr` must be null or a matching typed-array pointer.
pub unsafe extern "C" fn typed_array_set_float64(arr: *mut TypedArray<f64>, index: i64, value: i64) {
    if index < 0 {
        return;
    }
    if let Some(arr) = arr.as_mut() {
        if let Some(slot) = arr.data.get_mut(index as usize) {
            *slot = value as f64;
        }
    }
}

/// Length of any typed array, element type erased.
///
/// # Safety
/// `arr` must be null or a pointer to any `TypedArray<T>`.
pub unsafe extern "C" fn typed_array_size(arr: *mut TypedArrayHeader) -> i64 {
    arr.as_ref().map(|h| h.len).unwrap_or(0)
}

/// Raw element buffer of any typed array.
///
/// # Safety
/// `arr` must be null or a pointer to any `TypedArray<T>`.
pub unsafe extern "C" fn typed_array_raw_data(arr: *mut TypedArrayHeader) -> *mut u8 {
    arr.as_ref()
        .map(|h| h.data_ptr)
        .unwrap_or(std::ptr::null_mut())
}

// ============================================================================
// Simple arrays (Array.zeros / ones / arange / linspace, slicing, stats)
// ============================================================================

/// Numeric array behind the `Array` statics; elements are JIT value words.
pub struct SimpleArray {
    pub data: Vec<i64>,
}

fn simple_alloc(data: Vec<i64>) -> *mut SimpleArray {
    Box::into_raw(Box::new(SimpleArray { data }))
}

pub extern "C" fn simple_array_zeros(count: i64) -> *mut SimpleArray {
    simple_alloc(vec![0; count.max(0) as usize])
}

pub extern "C" fn simple_array_ones(count: i64) -> *mut SimpleArray {
    simple_alloc(vec![1; count.max(0) as usize])
}

pub extern "C" fn simple_array_arange(start: i64, stop: i64, step: i64) -> *mut SimpleArray {
    let step = if step == 0 { 1 } else { step };
    let mut data = Vec::new();
    let mut v = start;
    if step > 0 {
        while v < stop {
            data.push(v);
            v += step;
        }
    } else {
        while v > stop {
            data.push(v);
            v += step;
        }
    }
    simple_alloc(data)
}

pub extern "C" fn simple_array_linspace(start: i64, end: i64, count: i64) -> *mut SimpleArray {
    let count = count.max(0) as usize;
    let mut data = Vec::with_capacity(count);
    if count == 1 {
        data.push(start);
    } else if count > 1 {
        let span = end - start;
        for i in 0..count {
            data.push(start + span * i as i64 / (count as i64 - 1));
        }
    }
    simple_alloc(data)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_push(arr: *mut SimpleArray, value: i64) {
    if let Some(arr) = arr.as_mut() {
        arr.data.push(value);
    }
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_pop(arr: *mut SimpleArray) -> i64 {
    arr.as_mut().and_then(|a| a.data.pop()).unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_get(arr: *mut SimpleArray, index: i64) -> i64 {
    if index < 0 {
        return 0;
    }
    arr.as_ref()
        .and_then(|a| a.data.get(index as usize).copied())
        .unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_length(arr: *mut SimpleArray) -> i64 {
    arr.as_ref().map(|a| a.data.len() as i64).unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_shape(arr: *mut SimpleArray) -> *mut SimpleArray {
    let len = arr.as_ref().map(|a| a.data.len() as i64).unwrap_or(0);
    simple_alloc(vec![len])
}

/// Python-style slice with step; `end == -1` and unspecified flags follow
/// the slice object's convention (negative indices count from the end).
///
/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_slice(
    arr: *mut SimpleArray,
    start: i64,
    end: i64,
    step: i64,
) -> *mut SimpleArray {
    let Some(arr) = arr.as_ref() else {
        return simple_alloc(Vec::new());
    };
    let len = arr.data.len() as i64;
    let step = if step == 0 { 1 } else { step };
    let norm = |idx: i64| -> i64 {
        if idx < 0 {
            (len + idx).max(0)
        } else {
            idx.min(len)
        }
    };
    let start = norm(start);
    let end = if end == -1 { len } else { norm(end) };

    let mut data = Vec::new();
    if step > 0 {
        let mut i = start;
        while i < end {
            data.push(arr.data[i as usize]);
            i += step;
        }
    } else {
        let mut i = start;
        while i > end {
            if (0..len).contains(&i) {
                data.push(arr.data[i as usize]);
            }
            i += step;
        }
    }
    simple_alloc(data)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_slice_all(arr: *mut SimpleArray) -> *mut SimpleArray {
    let data = arr.as_ref().map(|a| a.data.clone()).unwrap_or_default();
    simple_alloc(data)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_sum(arr: *mut SimpleArray) -> i64 {
    arr.as_ref()
        .map(|a| a.data.iter().sum())
        .unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_mean(arr: *mut SimpleArray) -> i64 {
    arr.as_ref()
        .filter(|a| !a.data.is_empty())
        .map(|a| a.data.iter().sum::<i64>() / a.data.len() as i64)
        .unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_max(arr: *mut SimpleArray) -> i64 {
    arr.as_ref()
        .and_then(|a| a.data.iter().max().copied())
        .unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_min(arr: *mut SimpleArray) -> i64 {
    arr.as_ref()
        .and_then(|a| a.data.iter().min().copied())
        .unwrap_or(0)
}

/// # Safety
/// `arr` must be null or a valid simple-array pointer.
pub unsafe extern "C" fn simple_array_tostring(
    arr: *mut SimpleArray,
) -> *mut crate::string::StrandString {
    let text = arr
        .as_ref()
        .map(|a| {
            let items: Vec<String> = a.data.iter().map(|v| v.to_string()).collect();
            format!("[{}]", items.join(", "))
        })
        .unwrap_or_else(|| "[]".to_string());
    string::alloc(&text)
}

// ============================================================================
// Slice objects
// ============================================================================

/// A slice triple with "specified" flags (bit 0 start, bit 1 end, bit 2
/// step), constructed by emitted code for slice-typed operands.
#[repr(C)]
pub struct SliceDesc {
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub flags: i64,
}

pub extern "C" fn slice_create(start: i64, end: i64, step: i64, flags: i64) -> *mut SliceDesc {
    Box::into_raw(Box::new(SliceDesc {
        start,
        end,
        step,
        flags,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_create() {
        unsafe {
            let s = slice_create(1, 5, 2, 0b111);
            assert_eq!((*s).start, 1);
            assert_eq!((*s).end, 5);
            assert_eq!((*s).step, 2);
            assert_eq!((*s).flags, 0b111);
        }
    }

    #[test]
    fn test_legacy_array_push_pop() {
        unsafe {
            let arr = array_create(2);
            array_push(arr, 10);
            array_push(arr, 20);
            assert_eq!(array_size(arr), 2);
            assert_eq!(array_get(arr, 1), 20);
            assert_eq!(array_pop(arr), 20);
            assert_eq!(array_size(arr), 1);
            assert_eq!(array_get(arr, 5), 0);
        }
    }

    #[test]
    fn test_typed_array_header_is_type_erased() {
        unsafe {
            let floats = typed_array_create_float64(0);
            typed_array_push_float64(floats, 1);
            typed_array_push_float64(floats, 2);
            assert_eq!(typed_array_size(floats as *mut TypedArrayHeader), 2);
            // Elements are stored as native doubles
            assert_eq!((*floats).data, vec![1.0, 2.0]);
            assert_eq!(typed_array_get_float64(floats, 0), 1);

            let ints = typed_array_create_int32(0);
            typed_array_push_int32(ints, 7);
            assert_eq!(typed_array_size(ints as *mut TypedArrayHeader), 1);
            assert!(!typed_array_raw_data(ints as *mut TypedArrayHeader).is_null());
        }
    }

    #[test]
    fn test_typed_array_set_and_defaults() {
        unsafe {
            let arr = typed_array_create_int64(0);
            typed_array_push_int64(arr, 1);
            typed_array_set_int64(arr, 0, 42);
            assert_eq!(typed_array_get_int64(arr, 0), 42);
            // Out-of-range get returns the default, program continues
            assert_eq!(typed_array_get_int64(arr, 9), 0);
        }
    }

    #[test]
    fn test_simple_array_factories() {
        unsafe {
            let zeros = simple_array_zeros(3);
            assert_eq!(simple_array_length(zeros), 3);
            assert_eq!(simple_array_sum(zeros), 0);

            let ones = simple_array_ones(4);
            assert_eq!(simple_array_sum(ones), 4);

            let range = simple_array_arange(1, 7, 2);
            assert_eq!((*range).data, vec![1, 3, 5]);

            let lin = simple_array_linspace(0, 10, 5);
            assert_eq!((*lin).data, vec![0, 2, 5, 7, 10]);
        }
    }

    #[test]
    fn test_simple_array_stats() {
        unsafe {
            let arr = simple_array_zeros(0);
            simple_array_push(arr, 4);
            simple_array_push(arr, 8);
            simple_array_push(arr, 6);
            assert_eq!(simple_array_sum(arr), 18);
            assert_eq!(simple_array_mean(arr), 6);
            assert_eq!(simple_array_max(arr), 8);
            assert_eq!(simple_array_min(arr), 4);
        }
    }

    #[test]
    fn test_simple_array_slice() {
        unsafe {
            let arr = simple_array_arange(0, 10, 1);
            let sliced = simple_array_slice(arr, 1, 5, 2);
            assert_eq!((*sliced).data, vec![1, 3]);

            let all = simple_array_slice_all(arr);
            assert_eq!(simple_array_length(all), 10);

            // end == -1 is the "to the end" sentinel
            let tail = simple_array_slice(arr, -3, -1, 1);
            assert_eq!((*tail).data, vec![7, 8, 9]);
        }
    }

    #[test]
    fn test_simple_array_tostring() {
        unsafe {
            let arr = simple_array_arange(1, 4, 1);
            let s = simple_array_tostring(arr);
            assert_eq!((*s).as_str(), "[1, 2, 3]");
        }
    }
}
