//! Scalar values and dtype-directed conversion.
//!
//! Conditions, loop bounds, and scalar-pointer stores all funnel through the
//! helpers here, so the truthiness and widening rules live in one place:
//! a condition must be a scalar; truthiness is nonzero (the real part for
//! complex values); strings never convert implicitly to numbers.

use rho_ir::DataType;
use rho_ir::SymId;

use crate::errors::{ExecError, ExecErrorKind};

use super::{SymClass, SymbolTable};

/// A scalar numeric value, tagged by width.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    ComplexFloat(f32, f32),
    ComplexDouble(f64, f64),
}

impl ScalarValue {
    /// Data type of this value.
    pub fn dtype(self) -> DataType {
        match self {
            ScalarValue::Byte(_) => DataType::Byte,
            ScalarValue::Int16(_) => DataType::Int16,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float(_) => DataType::Float,
            ScalarValue::Double(_) => DataType::Double,
            ScalarValue::ComplexFloat(..) => DataType::ComplexFloat,
            ScalarValue::ComplexDouble(..) => DataType::ComplexDouble,
        }
    }

    /// Value as i64, truncating floats and dropping imaginary parts.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "truncating conversion is the dialect's numeric rule"
    )]
    pub fn as_i64(self) -> i64 {
        match self {
            ScalarValue::Byte(v) => i64::from(v),
            ScalarValue::Int16(v) => i64::from(v),
            ScalarValue::Int32(v) => i64::from(v),
            ScalarValue::Int64(v) => v,
            ScalarValue::Float(v) => v as i64,
            ScalarValue::Double(v) => v as i64,
            ScalarValue::ComplexFloat(re, _) => re as i64,
            ScalarValue::ComplexDouble(re, _) => re as i64,
        }
    }

    /// Value as f64, dropping imaginary parts.
    #[expect(
        clippy::cast_precision_loss,
        reason = "widening to double is the dialect's numeric rule"
    )]
    pub fn as_f64(self) -> f64 {
        match self {
            ScalarValue::Byte(v) => f64::from(v),
            ScalarValue::Int16(v) => f64::from(v),
            ScalarValue::Int32(v) => f64::from(v),
            ScalarValue::Int64(v) => v as f64,
            ScalarValue::Float(v) => f64::from(v),
            ScalarValue::Double(v) => v,
            ScalarValue::ComplexFloat(re, _) => f64::from(re),
            ScalarValue::ComplexDouble(re, _) => re,
        }
    }

    /// Nonzero test; the real part decides for complex values.
    pub fn is_nonzero(self) -> bool {
        match self {
            ScalarValue::Byte(v) => v != 0,
            ScalarValue::Int16(v) => v != 0,
            ScalarValue::Int32(v) => v != 0,
            ScalarValue::Int64(v) => v != 0,
            ScalarValue::Float(v) => v != 0.0,
            ScalarValue::Double(v) => v != 0.0,
            ScalarValue::ComplexFloat(re, _) => re != 0.0,
            ScalarValue::ComplexDouble(re, _) => re != 0.0,
        }
    }

    /// Convert to the given numeric data type.
    ///
    /// `Str` is not a numeric target; callers reject it before converting.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "narrowing numeric stores follow the dialect's truncation rule"
    )]
    pub fn convert_to(self, dtype: DataType) -> ScalarValue {
        match dtype {
            DataType::Byte => ScalarValue::Byte(self.as_i64() as u8),
            DataType::Int16 => ScalarValue::Int16(self.as_i64() as i16),
            DataType::Int32 => ScalarValue::Int32(self.as_i64() as i32),
            DataType::Int64 => ScalarValue::Int64(self.as_i64()),
            DataType::Float => ScalarValue::Float(self.as_f64() as f32),
            DataType::Double => ScalarValue::Double(self.as_f64()),
            DataType::ComplexFloat => match self {
                ScalarValue::ComplexFloat(re, im) => ScalarValue::ComplexFloat(re, im),
                ScalarValue::ComplexDouble(re, im) => {
                    ScalarValue::ComplexFloat(re as f32, im as f32)
                }
                other => ScalarValue::ComplexFloat(other.as_f64() as f32, 0.0),
            },
            DataType::ComplexDouble => match self {
                ScalarValue::ComplexFloat(re, im) => {
                    ScalarValue::ComplexDouble(f64::from(re), f64::from(im))
                }
                ScalarValue::ComplexDouble(re, im) => ScalarValue::ComplexDouble(re, im),
                other => ScalarValue::ComplexDouble(other.as_f64(), 0.0),
            },
            // Not a numeric target; callers reject Str before converting.
            DataType::Str => self,
        }
    }
}

impl SymbolTable {
    /// Scalar value of a symbol, following Transfer aliases.
    ///
    /// Errors with a non-scalar condition when the symbol is anything other
    /// than a numeric scalar.
    pub fn scalar_value(&self, id: SymId) -> Result<ScalarValue, ExecError> {
        let resolved = self.deref(id);
        match &self.get(resolved).class {
            SymClass::Scalar(v) => Ok(*v),
            SymClass::Undefined => Err(ExecError::new(ExecErrorKind::UndefinedValue)
                .with_sym(resolved)),
            _ => Err(ExecError::new(ExecErrorKind::NonScalarCondition).with_sym(resolved)),
        }
    }

    /// Truthiness of a condition symbol: scalar and nonzero.
    pub fn truthy(&self, id: SymId) -> Result<bool, ExecError> {
        Ok(self.scalar_value(id)?.is_nonzero())
    }

    /// True when the symbol is the literal affirmative scalar (value 1).
    ///
    /// The call binder uses this to recognize the compiled form of a
    /// `NO`-prefixed keyword.
    pub fn is_affirmative(&self, id: SymId) -> bool {
        matches!(self.scalar_value(id), Ok(v) if v.as_i64() == 1 && v.dtype().is_integral())
    }
}
