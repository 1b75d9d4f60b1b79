//! 运算符实现。
//!
//! 运算符作用在原始操作数上：`Value::Int` 属于 int 类，`Object::Number` 属于 float 类，
//! 没有定义规则的组合返回 NaN / false / Nil 而不是报错。

use crate::runtime::object::Object;
use crate::runtime::value::Value;

enum Kind<'a> {
    Int(i64),
    Float(f64),
    Str(&'a str),
    Bool(bool),
    Other,
}

fn kind(v: &Value) -> Kind<'_> {
    match v {
        Value::Int(i) => Kind::Int(*i),
        Value::Object(Object::Number(n)) => Kind::Float(*n),
        Value::Object(Object::String(s)) => Kind::Str(s),
        Value::Object(Object::Bool(b)) => Kind::Bool(*b),
        Value::Object(_) => Kind::Other,
    }
}

fn nan() -> Value {
    Value::Object(Object::Number(f64::NAN))
}

fn float(n: f64) -> Value {
    Value::Object(Object::Number(n))
}

/// `%f` 格式
fn fmt_float(n: f64) -> String {
    format!("{:.6}", n)
}

pub fn add(a: &Value, b: &Value) -> Value {
    let (x, y) = (a.to_object(), b.to_object());
    match (&x, &y) {
        (Object::String(s), _) => Value::Object(Object::String(format!("{}{}", s, y))),
        (Object::Number(l), Object::Number(r)) => float(l + r),
        (Object::Number(l), Object::String(r)) => float(l + r.trim().parse::<f64>().unwrap_or(0.0)),
        _ => Value::NIL,
    }
}

pub fn sub(a: &Value, b: &Value) -> Value {
    match (kind(a), kind(b)) {
        (Kind::Int(x), Kind::Int(y)) => match x.checked_sub(y) {
            Some(r) => Value::Int(r),
            None => float(x as f64 - y as f64),
        },
        (Kind::Int(x), Kind::Float(y)) => float(x as f64 - y),
        (Kind::Float(x), Kind::Int(y)) => float(x - y as f64),
        (Kind::Float(x), Kind::Float(y)) => float(x - y),
        _ => nan(),
    }
}

pub fn mul(a: &Value, b: &Value) -> Value {
    match (kind(a), kind(b)) {
        (Kind::Int(x), Kind::Int(y)) => match x.checked_mul(y) {
            Some(r) => Value::Int(r),
            None => float(x as f64 * y as f64),
        },
        (Kind::Int(x), Kind::Float(y)) => float(x as f64 * y),
        (Kind::Float(x), Kind::Int(y)) => float(x * y as f64),
        (Kind::Float(x), Kind::Float(y)) => float(x * y),
        _ => nan(),
    }
}

/// 除法结果总是 float
pub fn quo(a: &Value, b: &Value) -> Value {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => float(x / y),
        _ => nan(),
    }
}

/// 取余：float 操作数先截断为整数
pub fn rem(a: &Value, b: &Value) -> Value {
    let (x, y) = match (kind(a), kind(b)) {
        (Kind::Int(x), Kind::Int(y)) => (x, y),
        (Kind::Float(x), Kind::Int(y)) if x.is_finite() => (x as i64, y),
        (Kind::Int(x), Kind::Float(y)) if y.is_finite() => (x, y as i64),
        (Kind::Float(x), Kind::Float(y)) if x.is_finite() && y.is_finite() => (x as i64, y as i64),
        _ => return nan(),
    };
    match x.checked_rem(y) {
        Some(r) => Value::Int(r),
        None => nan(),
    }
}

pub fn inc(a: &Value) -> Value {
    match kind(a) {
        Kind::Int(x) => Value::Int(x.wrapping_add(1)),
        Kind::Float(x) if x.is_finite() => Value::Int(x as i64 + 1),
        _ => Value::Int(0),
    }
}

pub fn dec(a: &Value) -> Value {
    match kind(a) {
        Kind::Int(x) => Value::Int(x.wrapping_sub(1)),
        Kind::Float(x) if x.is_finite() => Value::Int(x as i64 - 1),
        _ => Value::Int(0),
    }
}

fn to_number(a: &Value) -> f64 {
    match kind(a) {
        Kind::Int(x) => x as f64,
        Kind::Float(x) => x,
        Kind::Str(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Kind::Bool(b) => b as i64 as f64,
        Kind::Other => f64::NAN,
    }
}

/// 一元负号
pub fn minus(a: &Value) -> Value {
    match kind(a) {
        Kind::Int(x) => match x.checked_neg() {
            Some(r) => Value::Int(r),
            None => float(-(x as f64)),
        },
        _ => float(-to_number(a)),
    }
}

/// 一元正号
pub fn plus(a: &Value) -> Value {
    match kind(a) {
        Kind::Int(x) => Value::Int(x),
        _ => float(to_number(a)),
    }
}

pub fn not(a: &Value) -> Value {
    Value::Object(Object::Bool(!a.truthy()))
}

pub fn eql(a: &Value, b: &Value) -> bool {
    match (kind(a), kind(b)) {
        (Kind::Int(x), Kind::Int(y)) => x == y,
        (Kind::Int(x), Kind::Float(y)) => x as f64 == y,
        (Kind::Float(x), Kind::Int(y)) => x == y as f64,
        (Kind::Float(x), Kind::Float(y)) => x == y,
        (Kind::Int(x), Kind::Str(s)) | (Kind::Str(s), Kind::Int(x)) => x.to_string() == s,
        (Kind::Float(x), Kind::Str(s)) | (Kind::Str(s), Kind::Float(x)) => fmt_float(x) == s,
        (Kind::Str(x), Kind::Str(y)) => x == y,
        (Kind::Bool(x), Kind::Bool(y)) => x == y,
        (Kind::Bool(x), Kind::Int(y)) | (Kind::Int(y), Kind::Bool(x)) => x as i64 == y,
        (Kind::Other, Kind::Other) => match (a, b) {
            (Value::Object(x), Value::Object(y)) => identical(x, y),
            _ => false,
        },
        _ => false,
    }
}

/// nil 只等于 nil；数组、map、函数按引用比较
fn identical(a: &Object, b: &Object) -> bool {
    match (a, b) {
        (Object::Nil, Object::Nil) => true,
        (Object::Array(x), Object::Array(y)) => x.ptr_eq(y),
        (Object::Map(x), Object::Map(y)) => x.ptr_eq(y),
        (Object::Func(x), Object::Func(y)) => x.ptr_eq(y),
        _ => false,
    }
}

pub fn lss(a: &Value, b: &Value) -> bool {
    match (kind(a), kind(b)) {
        (Kind::Int(x), Kind::Int(y)) => x < y,
        (Kind::Int(x), Kind::Float(y)) => (x as f64) < y,
        (Kind::Float(x), Kind::Int(y)) => x < y as f64,
        (Kind::Float(x), Kind::Float(y)) => x < y,
        (Kind::Int(x), Kind::Str(s)) => x.to_string().as_str() < s,
        (Kind::Str(s), Kind::Int(y)) => s < y.to_string().as_str(),
        (Kind::Float(x), Kind::Str(s)) => fmt_float(x).as_str() < s,
        (Kind::Str(s), Kind::Float(y)) => s < fmt_float(y).as_str(),
        (Kind::Str(x), Kind::Str(y)) => x < y,
        _ => false,
    }
}

pub fn neq(a: &Value, b: &Value) -> bool {
    !eql(a, b)
}

pub fn gt(a: &Value, b: &Value) -> bool {
    !lss(a, b) && !eql(a, b)
}

pub fn gte(a: &Value, b: &Value) -> bool {
    !lss(a, b)
}

pub fn lte(a: &Value, b: &Value) -> bool {
    lss(a, b) || eql(a, b)
}

/// JS ToInt32
fn to_i32(a: &Value) -> i32 {
    let n = to_number(a);
    if n.is_finite() { n as i64 as i32 } else { 0 }
}

pub fn b_and(a: &Value, b: &Value) -> Value {
    Value::Int((to_i32(a) & to_i32(b)) as i64)
}

pub fn b_or(a: &Value, b: &Value) -> Value {
    Value::Int((to_i32(a) | to_i32(b)) as i64)
}

pub fn b_xor(a: &Value, b: &Value) -> Value {
    Value::Int((to_i32(a) ^ to_i32(b)) as i64)
}

pub fn b_sleft(a: &Value, b: &Value) -> Value {
    Value::Int(to_i32(a).wrapping_shl(to_i32(b) as u32 & 31) as i64)
}

pub fn b_sright(a: &Value, b: &Value) -> Value {
    Value::Int(to_i32(a).wrapping_shr(to_i32(b) as u32 & 31) as i64)
}

pub fn b_usright(a: &Value, b: &Value) -> Value {
    Value::Int(((to_i32(a) as u32) >> (to_i32(b) as u32 & 31)) as i64)
}

pub fn bitnot(a: &Value) -> Value {
    Value::Int(!to_i32(a) as i64)
}

/// 返回决定结果的那个操作数
pub fn and(args: &[Value]) -> Value {
    for v in args {
        if !v.truthy() {
            return v.clone();
        }
    }
    args.last().cloned().unwrap_or_default()
}

pub fn or(args: &[Value]) -> Value {
    for v in args {
        if v.truthy() {
            return v.clone();
        }
    }
    args.last().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_eql_cross_kind() {
        assert!(eql(&Value::Int(5), &s("5")));
        assert!(eql(&s("5"), &Value::Int(5)));
        assert!(eql(&Value::from(5.0), &s("5.000000")));
        assert!(!eql(&Value::from(5.0), &s("5")));
        assert!(eql(&Value::from(true), &Value::Int(1)));
        assert!(!eql(&Value::from(true), &Value::Int(2)));
        assert!(eql(&Value::from(false), &Value::Int(0)));
        assert!(eql(&Value::Int(3), &Value::from(3.0)));
        assert!(!eql(&Value::from(true), &s("true")));
        assert!(!eql(&Value::NIL, &Value::Int(0)));
        assert!(eql(&Value::NIL, &Value::NIL));
    }

    #[test]
    fn test_eql_symmetric_same_kind() {
        let pairs = [
            (Value::Int(1), Value::Int(1)),
            (Value::Int(1), Value::Int(2)),
            (s("a"), s("a")),
            (s("a"), s("b")),
            (Value::from(true), Value::from(false)),
            (Value::from(1.5), Value::from(1.5)),
        ];
        for (a, b) in pairs {
            assert_eq!(eql(&a, &b), eql(&b, &a));
        }
    }

    #[test]
    fn test_eql_identity_for_composites() {
        let a = Object::array(vec![Object::Number(1.0)]);
        let b = Object::array(vec![Object::Number(1.0)]);
        assert!(eql(&Value::Object(a.clone()), &Value::Object(a.clone())));
        assert!(!eql(&Value::Object(a), &Value::Object(b)));
    }

    #[test]
    fn test_add() {
        assert_eq!(add(&s("a"), &s("b")), s("ab"));
        assert_eq!(add(&s("a"), &Value::Int(1)), s("a1"));
        assert_eq!(add(&Value::Int(1), &Value::Int(2)), Value::from(3.0));
        assert_eq!(add(&Value::Int(1), &s("2.5")), Value::from(3.5));
        assert_eq!(add(&Value::Int(1), &s("x")), Value::from(1.0));
        assert_eq!(add(&Value::from(true), &Value::Int(1)), Value::NIL);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(sub(&Value::Int(5), &Value::Int(2)), Value::Int(3));
        assert_eq!(sub(&Value::Int(5), &Value::from(0.5)), Value::from(4.5));
        assert_eq!(mul(&Value::Int(3), &Value::Int(4)), Value::Int(12));
        assert_eq!(quo(&Value::Int(3), &Value::Int(2)), Value::from(1.5));
        assert_eq!(rem(&Value::Int(7), &Value::Int(3)), Value::Int(1));
        assert_eq!(rem(&Value::from(7.9), &Value::from(3.2)), Value::Int(1));

        for v in [sub(&s("a"), &Value::Int(1)), mul(&Value::NIL, &Value::Int(1)), rem(&Value::Int(1), &Value::Int(0))] {
            assert!(v.as_f64().unwrap().is_nan());
        }
    }

    #[test]
    fn test_comparisons() {
        assert!(lss(&Value::Int(1), &Value::from(1.5)));
        assert!(lss(&s("a"), &s("b")));
        assert!(gt(&Value::Int(2), &Value::Int(1)));
        assert!(!gt(&Value::Int(1), &Value::Int(1)));
        assert!(gte(&Value::Int(1), &Value::Int(1)));
        assert!(lte(&Value::Int(1), &Value::Int(1)));
        assert!(neq(&Value::Int(1), &Value::Int(2)));
        assert!(!lss(&Value::from(true), &Value::Int(2)));
    }

    #[test]
    fn test_logical_returns_operand() {
        assert_eq!(and(&[Value::Int(1), s("x")]), s("x"));
        assert_eq!(and(&[Value::Int(0), s("x")]), Value::Int(0));
        assert_eq!(or(&[s(""), s("y")]), s("y"));
        assert_eq!(not(&Value::NIL), Value::from(true));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(b_and(&Value::Int(6), &Value::Int(3)), Value::Int(2));
        assert_eq!(b_or(&Value::Int(4), &Value::Int(1)), Value::Int(5));
        assert_eq!(b_sleft(&Value::Int(1), &Value::Int(4)), Value::Int(16));
        assert_eq!(b_usright(&Value::Int(-1), &Value::Int(28)), Value::Int(15));
        assert_eq!(bitnot(&Value::Int(0)), Value::Int(-1));
    }
}
