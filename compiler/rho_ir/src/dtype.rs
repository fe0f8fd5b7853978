//! Data-type tags and the numeric widening lattice.

use std::fmt;

/// Element data type of a symbol's payload.
///
/// The ordering of the numeric variants is the widening order: coercing two
/// operands takes whichever has the greater [`rank`](DataType::rank).
/// `Str` sits outside the lattice; widening against it is a conversion error
/// decided by the caller.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum DataType {
    #[default]
    Byte,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    ComplexFloat,
    ComplexDouble,
    Str,
}

impl DataType {
    /// Position in the widening lattice (Str is widest only so that a total
    /// order exists; callers reject string/numeric mixes explicitly).
    #[inline]
    pub const fn rank(self) -> u8 {
        match self {
            DataType::Byte => 0,
            DataType::Int16 => 1,
            DataType::Int32 => 2,
            DataType::Int64 => 3,
            DataType::Float => 4,
            DataType::Double => 5,
            DataType::ComplexFloat => 6,
            DataType::ComplexDouble => 7,
            DataType::Str => 8,
        }
    }

    /// Widest of two data types.
    #[inline]
    pub fn widen(self, other: DataType) -> DataType {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }

    /// True for the integral numeric types.
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    /// True for `Float` and `Double`.
    #[inline]
    pub const fn is_floating(self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// True for the complex types.
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, DataType::ComplexFloat | DataType::ComplexDouble)
    }

    /// True for any numeric type (everything except `Str`).
    #[inline]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, DataType::Str)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DataType::Byte => "byte",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::ComplexFloat => "complex-float",
            DataType::ComplexDouble => "complex-double",
            DataType::Str => "string",
        };
        f.write_str(text)
    }
}
