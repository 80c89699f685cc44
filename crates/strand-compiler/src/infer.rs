//! Per-function type and stack-offset tables.
//!
//! The offset cursor starts below the six-slot parameter area (−8…−48) and
//! steps down by 8 per variable; no two live variables in one frame share
//! an offset. Allocation is idempotent per name.

use rustc_hash::FxHashMap;

use crate::types::DataType;

/// Base of the local-variable area, just below the parameter slots.
const LOCALS_BASE: i64 = -48;

/// Per-function inference frame: variable types, stack offsets, and class
/// names for class-instance bindings.
#[derive(Debug, Default)]
pub struct TypeInference {
    variable_types: FxHashMap<String, DataType>,
    variable_offsets: FxHashMap<String, i64>,
    variable_class_names: FxHashMap<String, String>,
    current_offset: i64,
}

impl TypeInference {
    pub fn new() -> Self {
        Self {
            variable_types: FxHashMap::default(),
            variable_offsets: FxHashMap::default(),
            variable_class_names: FxHashMap::default(),
            current_offset: LOCALS_BASE,
        }
    }

    /// Fresh frame; locals start below the fixed parameter area.
    pub fn reset_for_function(&mut self) {
        self.variable_types.clear();
        self.variable_offsets.clear();
        self.variable_class_names.clear();
        self.current_offset = LOCALS_BASE;
    }

    /// Fresh frame for a known parameter count; locals start below every
    /// parameter slot, with one slot of slack.
    pub fn reset_for_function_with_params(&mut self, param_count: usize) {
        self.reset_for_function();
        let below_params = -((param_count as i64 + 1) * 8) - 8;
        self.current_offset = self.current_offset.min(below_params);
    }

    /// Allocate a stack slot for a variable, or return its existing offset
    /// (updating the recorded type).
    pub fn allocate_variable(&mut self, name: &str, ty: DataType) -> i64 {
        if let Some(&offset) = self.variable_offsets.get(name) {
            self.variable_types.insert(name.to_string(), ty);
            return offset;
        }
        let offset = self.current_offset;
        self.current_offset -= 8;
        self.variable_offsets.insert(name.to_string(), offset);
        self.variable_types.insert(name.to_string(), ty);
        offset
    }

    pub fn set_variable_type(&mut self, name: &str, ty: DataType) {
        self.variable_types.insert(name.to_string(), ty);
    }

    pub fn variable_type(&self, name: &str) -> DataType {
        self.variable_types.get(name).copied().unwrap_or_default()
    }

    pub fn set_variable_offset(&mut self, name: &str, offset: i64) {
        self.variable_offsets.insert(name.to_string(), offset);
    }

    pub fn variable_offset(&self, name: &str) -> i64 {
        self.variable_offsets.get(name).copied().unwrap_or(-8)
    }

    pub fn variable_exists(&self, name: &str) -> bool {
        self.variable_offsets.contains_key(name)
    }

    pub fn set_variable_class_type(&mut self, name: &str, class_name: &str) {
        self.variable_types
            .insert(name.to_string(), DataType::ClassInstance);
        self.variable_class_names
            .insert(name.to_string(), class_name.to_string());
    }

    pub fn variable_class_name(&self, name: &str) -> Option<&str> {
        self.variable_class_names.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_distinct_and_descending() {
        let mut types = TypeInference::new();
        let a = types.allocate_variable("a", DataType::Int64);
        let b = types.allocate_variable("b", DataType::Int64);
        let c = types.allocate_variable("c", DataType::String);
        assert_eq!(a, LOCALS_BASE);
        assert_eq!(b, a - 8);
        assert_eq!(c, b - 8);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_allocate_is_idempotent_per_name() {
        let mut types = TypeInference::new();
        let first = types.allocate_variable("x", DataType::Unknown);
        let second = types.allocate_variable("x", DataType::String);
        assert_eq!(first, second);
        assert_eq!(types.variable_type("x"), DataType::String);
    }

    #[test]
    fn test_reset_with_params_clears_below_parameter_area() {
        let mut types = TypeInference::new();
        types.reset_for_function_with_params(6);
        let first = types.allocate_variable("local", DataType::Int64);
        // Six params occupy -8..-48; locals must start strictly below.
        assert!(first < -48);
    }

    #[test]
    fn test_class_binding() {
        let mut types = TypeInference::new();
        types.set_variable_class_type("p", "Point");
        assert_eq!(types.variable_type("p"), DataType::ClassInstance);
        assert_eq!(types.variable_class_name("p"), Some("Point"));
        assert_eq!(types.variable_class_name("q"), None);
    }

    #[test]
    fn test_unknown_variable_defaults() {
        let types = TypeInference::new();
        assert_eq!(types.variable_type("ghost"), DataType::Unknown);
        assert_eq!(types.variable_offset("ghost"), -8);
        assert!(!types.variable_exists("ghost"));
    }
}
