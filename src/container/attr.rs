use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::dtype::{byte_len, encode_elements, Dtype, Element};
use crate::error::{Result, StdFileError};

/// String-keyed attribute map carried by every node. Iteration is sorted by key.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Numeric array attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayAttr {
    /// Element type
    pub dtype: Dtype,
    /// Array shape
    pub shape: Vec<usize>,
    /// Raw little-endian, row-major bytes
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl ArrayAttr {
    /// One-dimensional array from a slice.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        ArrayAttr {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            data: encode_elements(values),
        }
    }

    /// Checks that `data` matches `shape` and `dtype`.
    pub fn validate(&self) -> Result<()> {
        let itemsize = self.dtype.itemsize().ok_or_else(|| {
            StdFileError::invalid_input("array attributes must have a fixed-size dtype")
        })?;
        let expected = byte_len(&self.shape, itemsize).ok_or_else(|| {
            StdFileError::invalid_input(format!(
                "array attribute shape {:?} of {} overflows the address space",
                self.shape, self.dtype
            ))
        })?;
        if self.data.len() != expected {
            return Err(StdFileError::invalid_input(format!(
                "array attribute holds {} bytes, shape {:?} of {} needs {}",
                self.data.len(),
                self.shape,
                self.dtype,
                expected
            )));
        }
        Ok(())
    }
}

/// A scalar or array attribute value. No nested structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    /// UTF-8 text
    Str(String),
    /// Opaque bytes
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(#[serde(with = "float_repr")] f64),
    /// Numeric array
    Array(ArrayAttr),
}

impl AttrValue {
    /// The text value, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of scalar numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::UInt(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Value equality for conflict checks. Signed and unsigned integers
    /// holding the same number are equal, and so are two NaN floats.
    pub fn same_value(&self, other: &AttrValue) -> bool {
        match (self, other) {
            (AttrValue::Int(i), AttrValue::UInt(u)) | (AttrValue::UInt(u), AttrValue::Int(i)) => {
                u64::try_from(*i).map_or(false, |i| i == *u)
            }
            (AttrValue::Float(x), AttrValue::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
            _ => self == other,
        }
    }

    /// Short type label used in reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "str",
            AttrValue::Bytes(_) => "bytes",
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::UInt(_) => "uint",
            AttrValue::Float(_) => "float",
            AttrValue::Array(_) => "array",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{:?}", s),
            AttrValue::Bytes(b) => write!(f, "b'{}'", hex::encode(b)),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::UInt(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{:?}", v),
            AttrValue::Array(a) => write!(f, "array<{}>{:?}", a.dtype, a.shape),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::UInt(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(v: Vec<u8>) -> Self {
        AttrValue::Bytes(v)
    }
}

impl From<ArrayAttr> for AttrValue {
    fn from(v: ArrayAttr) -> Self {
        AttrValue::Array(v)
    }
}

/// Hex encoding for byte payloads inside the JSON file body.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// JSON has no NaN or infinities, so those are written as strings.
mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            serializer.serialize_f64(*v)
        } else if v.is_nan() {
            serializer.serialize_str("nan")
        } else if *v > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Num(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "nan" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("invalid float '{}'", other))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_serde_shape() {
        let v = AttrValue::from("kg m-2");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"str","value":"kg m-2"}"#);
        let back: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_non_finite_float_survives_json() {
        let v = AttrValue::Float(f64::NEG_INFINITY);
        let json = serde_json::to_string(&v).unwrap();
        let back: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_array_attr_validation() {
        let ok = ArrayAttr::from_slice(&[1.0f32, 2.0, 3.0]);
        assert!(ok.validate().is_ok());
        let bad = ArrayAttr { dtype: Dtype::Float32, shape: vec![4], data: ok.data.clone() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_same_value_across_integer_widths() {
        assert!(AttrValue::Int(1).same_value(&AttrValue::UInt(1)));
        assert!(AttrValue::UInt(7).same_value(&AttrValue::Int(7)));
        assert!(!AttrValue::Int(-1).same_value(&AttrValue::UInt(u64::MAX)));
        assert!(!AttrValue::Int(1).same_value(&AttrValue::Float(1.0)));
        assert!(AttrValue::Float(f64::NAN).same_value(&AttrValue::Float(f64::NAN)));
        assert!(!AttrValue::Str("1".into()).same_value(&AttrValue::Int(1)));
    }
}
