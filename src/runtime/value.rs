use crate::runtime::object::{Object, format_number};
use std::fmt;

/// 模板执行过程中流转的原始操作数。
///
/// 整数字面量与整数运算的结果保留为 `Int`，其余一律是 `Object`；
/// 运算符据此区分 int/float 两种数字。
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Object(Object),
}

impl Value {
    pub const NIL: Value = Value::Object(Object::Nil);

    pub fn to_object(&self) -> Object {
        match self {
            Value::Int(i) => Object::Number(*i as f64),
            Value::Object(o) => o.clone(),
        }
    }

    pub fn into_object(self) -> Object {
        match self {
            Value::Int(i) => Object::Number(i as f64),
            Value::Object(o) => o,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Object(Object::Nil))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Object(o) => o.truthy(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Object(Object::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Object(o) => o.as_str(),
            Value::Int(_) => None,
        }
    }

    pub fn field(&self, name: &str) -> Value {
        match self {
            Value::Int(_) => Value::NIL,
            Value::Object(o) => Value::Object(o.field(name)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Object(o) => o.type_name(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NIL
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Object(Object::Number(n)) => f.write_str(&format_number(*n)),
            Value::Object(o) => write!(f, "{}", o),
        }
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Object(Object::Number(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Object(Object::Bool(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Object(Object::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Object(Object::String(s))
    }
}
