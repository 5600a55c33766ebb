//! Typed values stored in rows, and the declared types of columns.

use crate::compare::CompareMode;
use crate::error::TableError;
use crate::Result;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use enum_as_inner::EnumAsInner;

/// The declared type of a column.
///
/// Variants are ordered by promotion rank:
/// when two values of different types meet, both are converted to the higher of the two.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// The type could not be resolved, e.g. a column whose definition is still being built.
    Unknown,
    Null,
    Boolean,
    Int,
    BigInt,
    Double,
    Text,
}

impl DataType {
    /// Returns the type both `a` and `b` can be converted to without losing information.
    pub fn higher_order(a: DataType, b: DataType) -> Result<DataType> {
        if a == DataType::Unknown || b == DataType::Unknown {
            return Err(TableError::UnknownDataType(format!("{a}, {b}")));
        }
        Ok(a.max(b))
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Unknown => "UNKNOWN",
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Int => "INT",
            DataType::BigInt => "BIGINT",
            DataType::Double => "DOUBLE",
            DataType::Text => "VARCHAR",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single value of a row.
///
/// `Value` is totally ordered and hashable so that it can key index maps.
/// Values of different types order by the rank of their type;
/// doubles use the IEEE total order.
#[derive(Debug, Clone, EnumAsInner)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(Box<str>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Double(_) => DataType::Double,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Returns the value as an `i64`, if it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v as i64),
            Value::BigInt(v) => Some(v),
            _ => None,
        }
    }

    /// Converts the value to `target`.
    ///
    /// NULL converts to NULL of any type.
    /// Converting to [`DataType::Unknown`] always fails.
    pub fn convert_to(&self, target: DataType) -> Result<Value> {
        if self.data_type() == target || self.is_null() {
            return Ok(self.clone());
        }
        let fail = || TableError::DataConversion {
            value: self.to_string(),
            target,
        };
        let converted = match (self, target) {
            (_, DataType::Unknown | DataType::Null) => return Err(fail()),
            (_, DataType::Text) => Value::Text(self.to_string().into()),

            (Value::Boolean(b), DataType::Int) => Value::Int(*b as i32),
            (Value::Boolean(b), DataType::BigInt) => Value::BigInt(*b as i64),
            (Value::Boolean(b), DataType::Double) => Value::Double(*b as i64 as f64),
            (Value::Int(i), DataType::Boolean) => Value::Boolean(*i != 0),
            (Value::BigInt(i), DataType::Boolean) => Value::Boolean(*i != 0),
            (Value::Int(i), DataType::BigInt) => Value::BigInt(*i as i64),
            (Value::Int(i), DataType::Double) => Value::Double(*i as f64),
            (Value::BigInt(i), DataType::Int) => Value::Int(i32::try_from(*i).map_err(|_| fail())?),
            (Value::BigInt(i), DataType::Double) => Value::Double(*i as f64),
            (Value::Double(d), DataType::Int) => {
                let r = d.round();
                if !(i32::MIN as f64..=i32::MAX as f64).contains(&r) {
                    return Err(fail());
                }
                Value::Int(r as i32)
            }
            (Value::Double(d), DataType::BigInt) => {
                let r = d.round();
                // `i64::MAX as f64` rounds up to 2^63, which is out of range.
                if !(i64::MIN as f64..-(i64::MIN as f64)).contains(&r) {
                    return Err(fail());
                }
                Value::BigInt(r as i64)
            }
            (Value::Double(d), DataType::Boolean) => Value::Boolean(*d != 0.0),

            (Value::Text(s), DataType::Boolean) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" | "T" | "YES" | "Y" | "1" => Value::Boolean(true),
                "FALSE" | "F" | "NO" | "N" | "0" => Value::Boolean(false),
                _ => return Err(fail()),
            },
            (Value::Text(s), DataType::Int) => Value::Int(s.trim().parse().map_err(|_| fail())?),
            (Value::Text(s), DataType::BigInt) => Value::BigInt(s.trim().parse().map_err(|_| fail())?),
            (Value::Text(s), DataType::Double) => Value::Double(s.trim().parse().map_err(|_| fail())?),

            (Value::Null, _) | (_, DataType::Boolean | DataType::Int | DataType::BigInt | DataType::Double) => {
                return Err(fail());
            }
        };
        Ok(converted)
    }

    /// Three-way comparison of two values of the same type under `mode`.
    ///
    /// NULL sorts before everything else.
    /// Values of different types fall back to ordering by type rank;
    /// callers that need cross-type semantics convert both sides first.
    pub fn compare_type_safe(&self, other: &Value, mode: &CompareMode) -> Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => mode.compare_str(a, b),
            _ => self.cmp(other),
        }
    }

    /// Renders the value as a SQL literal.
    pub fn sql(&self) -> String {
        match self {
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => a.data_type().cmp(&b.data_type()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int(v) => v.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v.into_boxed_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Collation;
    use proptest::prelude::*;

    #[test]
    fn higher_order_promotes() {
        assert_eq!(DataType::higher_order(DataType::Int, DataType::Double), Ok(DataType::Double));
        assert_eq!(DataType::higher_order(DataType::Text, DataType::Int), Ok(DataType::Text));
        assert_eq!(DataType::higher_order(DataType::Null, DataType::Boolean), Ok(DataType::Boolean));
        assert!(matches!(
            DataType::higher_order(DataType::Unknown, DataType::Int),
            Err(TableError::UnknownDataType(_))
        ));
    }

    #[test]
    fn convert_text_to_numbers() {
        assert_eq!(Value::from(" 42 ").convert_to(DataType::Int), Ok(Value::Int(42)));
        assert_eq!(Value::from("7").convert_to(DataType::BigInt), Ok(Value::BigInt(7)));
        assert_eq!(Value::from("yes").convert_to(DataType::Boolean), Ok(Value::Boolean(true)));
        assert!(Value::from("abc").convert_to(DataType::Int).is_err());
    }

    #[test]
    fn convert_out_of_range_fails() {
        let big = Value::BigInt(i64::from(i32::MAX) + 1);
        assert!(matches!(
            big.convert_to(DataType::Int),
            Err(TableError::DataConversion { target: DataType::Int, .. })
        ));
        assert_eq!(Value::Double(2.6).convert_to(DataType::Int), Ok(Value::Int(3)));
    }

    #[test]
    fn double_to_bigint_rejects_two_to_the_63() {
        let two_63 = Value::Double(9_223_372_036_854_775_808.0);
        assert!(matches!(
            two_63.convert_to(DataType::BigInt),
            Err(TableError::DataConversion { target: DataType::BigInt, .. })
        ));
        assert!(Value::Double(f64::NAN).convert_to(DataType::BigInt).is_err());
        let min = Value::Double(i64::MIN as f64);
        assert_eq!(min.convert_to(DataType::BigInt), Ok(Value::BigInt(i64::MIN)));
    }

    #[test]
    fn null_converts_to_anything() {
        assert_eq!(Value::Null.convert_to(DataType::Text), Ok(Value::Null));
    }

    #[test]
    fn compare_under_collation() {
        let ignore_case = CompareMode::new(Collation::IgnoreCase);
        let a = Value::from("abc");
        let b = Value::from("ABC");
        assert_eq!(a.compare_type_safe(&b, &ignore_case), Ordering::Equal);
        assert_ne!(a.compare_type_safe(&b, &CompareMode::default()), Ordering::Equal);
    }

    #[test]
    fn sql_literal_escapes_quotes() {
        assert_eq!(Value::from("it's").sql(), "'it''s'");
        assert_eq!(Value::Int(3).sql(), "3");
    }

    proptest! {
        #[test]
        fn int_to_bigint_preserves_order(a: i32, b: i32) {
            let wide_a = Value::Int(a).convert_to(DataType::BigInt).unwrap();
            let wide_b = Value::Int(b).convert_to(DataType::BigInt).unwrap();
            prop_assert_eq!(wide_a.cmp(&wide_b), a.cmp(&b));
        }

        #[test]
        fn int_to_text_round_trips(a: i32) {
            let text = Value::Int(a).convert_to(DataType::Text).unwrap();
            prop_assert_eq!(text.convert_to(DataType::Int).unwrap(), Value::Int(a));
        }
    }
}
