use std::fmt;

/// The value recorded at a leaf address.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Int(i64),
    Bool(bool),
    Vector(Vec<f64>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Real(_) => f64::KIND,
            Value::Int(_) => i64::KIND,
            Value::Bool(_) => bool::KIND,
            Value::Vector(_) => <Vec<f64>>::KIND,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Real(val) => write!(f, "{}", val),
            Value::Int(val) => write!(f, "{}", val),
            Value::Bool(val) => write!(f, "{}", val),
            Value::Vector(vals) => write!(f, "{:?}", vals),
        }
    }
}

/// Rust types that can be stored in a choice map.
///
/// `from_value` returns `None` if the stored variant does not hold this
/// type; callers turn that into a `TypeMismatch` carrying the address.
pub trait ChoiceValue: Clone + Sized {
    const KIND: &'static str;

    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

impl ChoiceValue for f64 {
    const KIND: &'static str = "real";

    fn into_value(self) -> Value {
        Value::Real(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(val) => Some(*val),
            _ => None,
        }
    }
}

impl ChoiceValue for i64 {
    const KIND: &'static str = "int";

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(val) => Some(*val),
            _ => None,
        }
    }
}

impl ChoiceValue for usize {
    const KIND: &'static str = "int";

    fn into_value(self) -> Value {
        Value::Int(self as i64)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(val) => usize::try_from(*val).ok(),
            _ => None,
        }
    }
}

impl ChoiceValue for bool {
    const KIND: &'static str = "bool";

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(val) => Some(*val),
            _ => None,
        }
    }
}

impl ChoiceValue for Vec<f64> {
    const KIND: &'static str = "vector";

    fn into_value(self) -> Value {
        Value::Vector(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector(vals) => Some(vals.clone()),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Real(val)
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::Int(val)
    }
}

impl From<usize> for Value {
    fn from(val: usize) -> Self {
        Value::Int(val as i64)
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}

impl From<Vec<f64>> for Value {
    fn from(vals: Vec<f64>) -> Self {
        Value::Vector(vals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn conversions_are_checked() {
        assert_eq!(f64::from_value(&Value::Real(1.5)), Some(1.5));
        assert_eq!(f64::from_value(&Value::Int(1)), None);
        assert_eq!(usize::from_value(&Value::Int(-1)), None);
        assert_eq!(usize::from_value(&Value::Int(4)), Some(4));
        assert_eq!(bool::from_value(&true.into_value()), Some(true));
        assert_eq!(Value::from(vec![1., 2.]).kind(), "vector");
        assert_eq!(Value::Int(3).to_string(), "3");
    }
}
