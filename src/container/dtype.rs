use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Element type of a dataset or array attribute.
///
/// Numeric payloads are stored little-endian in row-major order. `Utf8` is a
/// scalar text value whose payload is the UTF-8 bytes of the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// One byte, 0 or 1
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    Uint8,
    /// Unsigned 16-bit integer
    Uint16,
    /// Unsigned 32-bit integer
    Uint32,
    /// Unsigned 64-bit integer
    Uint64,
    /// IEEE-754 single precision
    Float32,
    /// IEEE-754 double precision
    Float64,
    /// Variable-length UTF-8 text (scalar only)
    Utf8,
}

impl Dtype {
    /// Size of one element in bytes, `None` for variable-length text.
    pub fn itemsize(&self) -> Option<usize> {
        match self {
            Dtype::Bool | Dtype::Int8 | Dtype::Uint8 => Some(1),
            Dtype::Int16 | Dtype::Uint16 => Some(2),
            Dtype::Int32 | Dtype::Uint32 | Dtype::Float32 => Some(4),
            Dtype::Int64 | Dtype::Uint64 | Dtype::Float64 => Some(8),
            Dtype::Utf8 => None,
        }
    }

    /// Name fed into digests and shown in conflict reports.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

/// Rust scalar types that map onto a fixed-size [`Dtype`].
pub trait Element: Copy {
    /// Matching dtype.
    const DTYPE: Dtype;
    /// Appends the little-endian encoding of `self`.
    fn write_le(&self, out: &mut Vec<u8>);
    /// Decodes one element from exactly `itemsize` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: Dtype = Dtype::$dtype;

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
);

impl Element for bool {
    const DTYPE: Dtype = Dtype::Bool;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Encodes a slice of elements into raw little-endian bytes.
pub fn encode_elements<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.itemsize().unwrap_or(1));
    for v in values {
        v.write_le(&mut out);
    }
    out
}

/// Python-tuple rendering of a shape: `()`, `(3,)`, `(3, 4)`.
pub fn shape_text(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Number of elements described by `shape` (1 for scalars), `None` on overflow.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Payload size in bytes for `shape` elements of `itemsize`, `None` on overflow.
pub fn byte_len(shape: &[usize], itemsize: usize) -> Option<usize> {
    element_count(shape)?.checked_mul(itemsize)
}
