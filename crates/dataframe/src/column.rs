use crate::error::{Error, Result};

/// Role-marker bits, positioned at the same bit offsets the wire encoding
/// field uses (spec §6), so `Encoding::roles` packs directly into the wire
/// value with no translation.
pub mod role {
    pub const NONE: u32 = 0;
    pub const X: u32 = 1 << 8;
    pub const Y: u32 = 1 << 9;
    pub const Z: u32 = 1 << 10;
    pub const TIME: u32 = 1 << 11;
    pub const META: u32 = 1 << 12;
}

const ROLE_MASK: u32 = role::X | role::Y | role::Z | role::TIME | role::META;
const VALUE_MASK: u32 = 0xFF;
const NESTING_SHIFT: u32 = 16;
const NESTING_MASK: u32 = 0xF << NESTING_SHIFT;

const NESTING_COLUMN: u32 = 0;
const NESTING_LIST: u32 = 1;

/// A single dataframe value. Integers wider than 32 bits are kept in their
/// native width rather than collapsed to `f64`, so round-tripping an `i64`/
/// `u64`/`time_ns` column through the wire format never loses precision.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Lossy numeric projection, for call sites (point coordinates, sample
    /// values) that are specified as plain `f64` regardless of the column's
    /// declared encoding.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(v) => *v as f64,
            Value::UInt(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Str(_) => f64::NAN,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// A column's wire encoding: value type, role markers, and nesting kind,
/// packed the way spec §6 lays out the 32-bit `encoding` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub element: ElementType,
    pub roles: u32,
    pub nested_list: bool,
}

impl Encoding {
    pub const fn scalar(element: ElementType) -> Self {
        Encoding {
            element,
            roles: role::NONE,
            nested_list: false,
        }
    }

    pub const fn with_roles(mut self, roles: u32) -> Self {
        self.roles = roles;
        self
    }

    pub const fn as_nested_list(mut self) -> Self {
        self.nested_list = true;
        self
    }

    pub fn has_role(&self, role_bit: u32) -> bool {
        self.roles & role_bit != 0
    }

    /// Packs this encoding into the wire's 32-bit bitfield: bits[0:7] value
    /// type, bits 8-12 role markers, bits[16:19] nesting kind.
    pub fn to_wire(self) -> u32 {
        let value_bits = self.element.code() & VALUE_MASK;
        let role_bits = self.roles & ROLE_MASK;
        let nesting = if self.nested_list { NESTING_LIST } else { NESTING_COLUMN };
        value_bits | role_bits | (nesting << NESTING_SHIFT)
    }

    pub fn from_wire(bits: u32) -> Result<Self> {
        let element = ElementType::from_code(bits & VALUE_MASK)?;
        let roles = bits & ROLE_MASK;
        let nested_list = ((bits & NESTING_MASK) >> NESTING_SHIFT) == NESTING_LIST;
        Ok(Encoding { element, roles, nested_list })
    }
}

/// Scalar value encodings, numbered per spec §6's bitfield table (`BOOL=0,
/// INT8=1, …, STRING=9, TIME8=10, …`), extended with `FLOAT32`/`FLOAT64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    String,
    TimeNs,
    F32,
    F64,
}

impl ElementType {
    pub fn code(self) -> u32 {
        match self {
            ElementType::Bool => 0,
            ElementType::I8 => 1,
            ElementType::I16 => 2,
            ElementType::I32 => 3,
            ElementType::I64 => 4,
            ElementType::U8 => 5,
            ElementType::U16 => 6,
            ElementType::U32 => 7,
            ElementType::U64 => 8,
            ElementType::String => 9,
            ElementType::TimeNs => 10,
            ElementType::F32 => 11,
            ElementType::F64 => 12,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => ElementType::Bool,
            1 => ElementType::I8,
            2 => ElementType::I16,
            3 => ElementType::I32,
            4 => ElementType::I64,
            5 => ElementType::U8,
            6 => ElementType::U16,
            7 => ElementType::U32,
            8 => ElementType::U64,
            9 => ElementType::String,
            10 => ElementType::TimeNs,
            11 => ElementType::F32,
            12 => ElementType::F64,
            other => {
                return Err(Error::Corrupt {
                    reason: format!("unknown value encoding {other}"),
                })
            }
        })
    }

    /// Fixed per-element byte width, or `None` for `String` whose elements
    /// are variable-length and framed with a leading `u32` byte count.
    pub fn size_bytes(self) -> Option<usize> {
        match self {
            ElementType::Bool | ElementType::I8 | ElementType::U8 => Some(1),
            ElementType::I16 | ElementType::U16 => Some(2),
            ElementType::I32 | ElementType::U32 | ElementType::F32 => Some(4),
            ElementType::I64 | ElementType::U64 | ElementType::TimeNs | ElementType::F64 => Some(8),
            ElementType::String => None,
        }
    }
}

/// A dataframe column: either one scalar value per row, or (for raster
/// sampling results that are not forced to a single sample) a variable-length
/// list of values per row.
#[derive(Debug, Clone)]
pub enum Column {
    Scalar { encoding: Encoding, values: Vec<Value> },
    NestedList { encoding: Encoding, rows: Vec<Vec<Value>> },
}

impl Column {
    pub fn scalar(encoding: Encoding) -> Self {
        Column::Scalar { encoding, values: Vec::new() }
    }

    pub fn nested_list(encoding: Encoding) -> Self {
        Column::NestedList { encoding, rows: Vec::new() }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Column::Scalar { encoding, .. } => *encoding,
            Column::NestedList { encoding, .. } => *encoding,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Scalar { values, .. } => values.len(),
            Column::NestedList { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_scalar(&mut self, value: impl Into<Value>) {
        if let Column::Scalar { values, .. } = self {
            values.push(value.into());
        }
    }

    pub fn push_list(&mut self, values: Vec<Value>) {
        if let Column::NestedList { rows, .. } = self {
            rows.push(values);
        }
    }

    pub fn scalar_values(&self) -> Option<&[Value]> {
        match self {
            Column::Scalar { values, .. } => Some(values),
            Column::NestedList { .. } => None,
        }
    }

    /// Lossy `f64` projection of a scalar column, for callers (point
    /// coordinates) that only ever need the numeric value.
    pub fn scalar_f64_values(&self) -> Option<Vec<f64>> {
        self.scalar_values().map(|values| values.iter().map(Value::as_f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_round_trips_through_the_wire_bitfield() {
        let encoding = Encoding::scalar(ElementType::I64).with_roles(role::X | role::TIME).as_nested_list();
        let bits = encoding.to_wire();
        let decoded = Encoding::from_wire(bits).unwrap();
        assert_eq!(decoded, encoding);
    }

    #[test]
    fn role_bits_land_at_their_documented_wire_positions() {
        assert_eq!(role::X, 1 << 8);
        assert_eq!(role::Y, 1 << 9);
        assert_eq!(role::Z, 1 << 10);
        assert_eq!(role::TIME, 1 << 11);
        assert_eq!(role::META, 1 << 12);
    }

    #[test]
    fn from_wire_rejects_unknown_value_codes() {
        assert!(Encoding::from_wire(0xFF).is_err());
    }
}
