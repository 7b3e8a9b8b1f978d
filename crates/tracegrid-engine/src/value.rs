use std::sync::Arc;

/// A dynamically typed value crossing the SQL boundary into the engine.
///
/// Storages compare these against their native encodings; the coercion rules
/// live with each storage (a string is greater than every numeric, an
/// out-of-domain numeric resolves during validation, and so on).
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Long(i64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl SqlValue {
    pub fn string(s: &str) -> Self {
        SqlValue::String(Arc::from(s))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The long payload. Panics on other variants; callers are expected to
    /// have validated the type first.
    pub fn as_long(&self) -> i64 {
        match self {
            SqlValue::Long(v) => *v,
            _ => panic!("SqlValue is not a long"),
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            SqlValue::Double(v) => *v,
            _ => panic!("SqlValue is not a double"),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SqlValue::String(s) => s,
            _ => panic!("SqlValue is not a string"),
        }
    }

    /// Numeric payload widened to double, for domain bounds checks.
    ///
    /// Only meaningful for `Long`/`Double`; panics otherwise.
    pub fn numeric_as_double(&self) -> f64 {
        match self {
            SqlValue::Long(v) => *v as f64,
            SqlValue::Double(v) => *v,
            _ => panic!("SqlValue is not numeric"),
        }
    }
}
