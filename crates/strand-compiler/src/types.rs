//! The concrete type lattice.
//!
//! `number` is identically `float64` (JavaScript compatibility); `unknown`
//! doubles as `any`. Binary operators join operand types over the
//! integer/float hierarchies; string absorbs `+`.

use strand_parser::ast::TypeAnnotation;
use strand_runtime::typecode;

/// Scalar element types a typed array can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl Scalar {
    /// Suffix used in the typed-array helper names (`__typed_array_get_<T>`).
    pub fn helper_suffix(self) -> &'static str {
        match self {
            Scalar::Int8 => "int8",
            Scalar::Int16 => "int16",
            Scalar::Int32 => "int32",
            Scalar::Int64 => "int64",
            Scalar::Uint8 => "uint8",
            Scalar::Uint16 => "uint16",
            Scalar::Uint32 => "uint32",
            Scalar::Uint64 => "uint64",
            Scalar::Float32 => "float32",
            Scalar::Float64 => "float64",
        }
    }
}

/// The closed type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    /// Unknown is also `any`: the dynamic-binding default.
    #[default]
    Unknown,
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Boolean,
    String,
    /// Legacy growable array
    Tensor,
    /// Simple numeric array (`Array` statics, literals)
    Array,
    TypedArray(Scalar),
    Promise,
    Function,
    Regex,
    Slice,
    /// Class instance; the class name is tracked per variable.
    ClassInstance,
}

/// `number` is identically `float64`.
pub const NUMBER: DataType = DataType::Float64;

impl DataType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Uint8
                | DataType::Uint16
                | DataType::Uint32
                | DataType::Uint64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Values whose runtime representation is a structured object: these
    /// keep their type on dynamically-typed assignment.
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            DataType::Tensor
                | DataType::Array
                | DataType::TypedArray(_)
                | DataType::String
                | DataType::Regex
                | DataType::Function
                | DataType::ClassInstance
        )
    }

    fn integer_rank(self) -> Option<usize> {
        // int8 < uint8 < int16 < uint16 < int32 < uint32 < int64 < uint64
        match self {
            DataType::Int8 => Some(0),
            DataType::Uint8 => Some(1),
            DataType::Int16 => Some(2),
            DataType::Uint16 => Some(3),
            DataType::Int32 => Some(4),
            DataType::Uint32 => Some(5),
            DataType::Int64 => Some(6),
            DataType::Uint64 => Some(7),
            _ => None,
        }
    }

    fn float_rank(self) -> Option<usize> {
        match self {
            DataType::Float32 => Some(0),
            DataType::Float64 => Some(1),
            _ => None,
        }
    }

    /// Wire code passed to type-aware runtime helpers.
    pub fn type_code(self) -> i64 {
        match self {
            DataType::Unknown => typecode::UNKNOWN,
            DataType::Void => typecode::VOID,
            DataType::Int8 => typecode::INT8,
            DataType::Int16 => typecode::INT16,
            DataType::Int32 => typecode::INT32,
            DataType::Int64 => typecode::INT64,
            DataType::Uint8 => typecode::UINT8,
            DataType::Uint16 => typecode::UINT16,
            DataType::Uint32 => typecode::UINT32,
            DataType::Uint64 => typecode::UINT64,
            DataType::Float32 => typecode::FLOAT32,
            DataType::Float64 => typecode::FLOAT64,
            DataType::Boolean => typecode::BOOLEAN,
            DataType::String => typecode::STRING,
            DataType::Tensor | DataType::TypedArray(_) => typecode::TENSOR,
            DataType::Array => typecode::ARRAY,
            DataType::Promise => typecode::PROMISE,
            DataType::Function => typecode::FUNCTION,
            DataType::Regex => typecode::REGEX,
            DataType::Slice => typecode::SLICE,
            DataType::ClassInstance => typecode::CLASS_INSTANCE,
        }
    }
}

/// Join two operand types on the arithmetic lattice.
///
/// Unknown is contagious; equal types are fixed points; float beats
/// integer; wider rank beats narrower; string absorbs everything (the `+`
/// concatenation case); any other mismatch is unknown.
pub fn cast_type(t1: DataType, t2: DataType) -> DataType {
    if t1 == DataType::Unknown || t2 == DataType::Unknown {
        return DataType::Unknown;
    }
    if t1 == t2 {
        return t1;
    }

    if t1.is_float() || t2.is_float() {
        if t1.is_float() && t2.is_float() {
            return if t1.float_rank() > t2.float_rank() { t1 } else { t2 };
        }
        return if t1.is_float() { t1 } else { t2 };
    }

    if t1.is_integer() && t2.is_integer() {
        return if t1.integer_rank() > t2.integer_rank() { t1 } else { t2 };
    }

    if t1 == DataType::String || t2 == DataType::String {
        return DataType::String;
    }

    DataType::Unknown
}

/// Resolve a source annotation to a type, plus the class name when the
/// annotation names a class.
pub fn resolve_annotation(annotation: &TypeAnnotation) -> (DataType, Option<String>) {
    match annotation {
        TypeAnnotation::Named(name) => match name.as_str() {
            "number" => (NUMBER, None),
            "int8" => (DataType::Int8, None),
            "int16" => (DataType::Int16, None),
            "int32" => (DataType::Int32, None),
            "int64" => (DataType::Int64, None),
            "uint8" => (DataType::Uint8, None),
            "uint16" => (DataType::Uint16, None),
            "uint32" => (DataType::Uint32, None),
            "uint64" => (DataType::Uint64, None),
            "float32" => (DataType::Float32, None),
            "float64" => (DataType::Float64, None),
            "boolean" | "bool" => (DataType::Boolean, None),
            "string" => (DataType::String, None),
            "void" => (DataType::Void, None),
            "any" => (DataType::Unknown, None),
            "tensor" => (DataType::Tensor, None),
            other => (DataType::ClassInstance, Some(other.to_string())),
        },
        TypeAnnotation::Array(element) => match scalar_of(element) {
            Some(scalar) => (DataType::TypedArray(scalar), None),
            None => (DataType::Array, None),
        },
    }
}

/// The value type a typed-array element loads as.
pub fn scalar_data_type(scalar: Scalar) -> DataType {
    match scalar {
        Scalar::Int8 => DataType::Int8,
        Scalar::Int16 => DataType::Int16,
        Scalar::Int32 => DataType::Int32,
        Scalar::Int64 => DataType::Int64,
        Scalar::Uint8 => DataType::Uint8,
        Scalar::Uint16 => DataType::Uint16,
        Scalar::Uint32 => DataType::Uint32,
        Scalar::Uint64 => DataType::Uint64,
        Scalar::Float32 => DataType::Float32,
        Scalar::Float64 => DataType::Float64,
    }
}

/// The scalar for a typed-array element annotation, if it names one.
pub fn scalar_of(annotation: &TypeAnnotation) -> Option<Scalar> {
    let TypeAnnotation::Named(name) = annotation else {
        return None;
    };
    match name.as_str() {
        "int8" => Some(Scalar::Int8),
        "int16" => Some(Scalar::Int16),
        "int32" => Some(Scalar::Int32),
        "int64" => Some(Scalar::Int64),
        "uint8" => Some(Scalar::Uint8),
        "uint16" => Some(Scalar::Uint16),
        "uint32" => Some(Scalar::Uint32),
        "uint64" => Some(Scalar::Uint64),
        "float32" => Some(Scalar::Float32),
        "float64" | "number" => Some(Scalar::Float64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_is_float64() {
        assert_eq!(NUMBER, DataType::Float64);
    }

    #[test]
    fn test_cast_type_identity_and_unknown() {
        assert_eq!(cast_type(DataType::Int32, DataType::Int32), DataType::Int32);
        assert_eq!(
            cast_type(DataType::Unknown, DataType::Int64),
            DataType::Unknown
        );
    }

    #[test]
    fn test_cast_type_integer_widening() {
        assert_eq!(cast_type(DataType::Int8, DataType::Int64), DataType::Int64);
        assert_eq!(
            cast_type(DataType::Uint16, DataType::Uint64),
            DataType::Uint64
        );
    }

    #[test]
    fn test_cast_type_float_beats_integer() {
        assert_eq!(
            cast_type(DataType::Int64, DataType::Float32),
            DataType::Float32
        );
        assert_eq!(
            cast_type(DataType::Float32, DataType::Float64),
            DataType::Float64
        );
    }

    #[test]
    fn test_cast_type_string_absorbs() {
        assert_eq!(
            cast_type(DataType::String, DataType::Int32),
            DataType::String
        );
        assert_eq!(
            cast_type(DataType::Boolean, DataType::String),
            DataType::String
        );
    }

    #[test]
    fn test_cast_type_mismatch_is_unknown() {
        assert_eq!(
            cast_type(DataType::Regex, DataType::Promise),
            DataType::Unknown
        );
    }

    #[test]
    fn test_cast_type_idempotent() {
        let joined = cast_type(DataType::Int32, DataType::Float64);
        assert_eq!(cast_type(joined, joined), joined);
    }

    #[test]
    fn test_resolve_annotation() {
        use strand_parser::ast::TypeAnnotation as TA;
        assert_eq!(resolve_annotation(&TA::Named("number".into())).0, NUMBER);
        assert_eq!(
            resolve_annotation(&TA::Named("Point".into())),
            (DataType::ClassInstance, Some("Point".into()))
        );
        assert_eq!(
            resolve_annotation(&TA::Array(Box::new(TA::Named("float64".into())))).0,
            DataType::TypedArray(Scalar::Float64)
        );
        assert_eq!(
            resolve_annotation(&TA::Array(Box::new(TA::Named("string".into())))).0,
            DataType::Array
        );
    }
}
