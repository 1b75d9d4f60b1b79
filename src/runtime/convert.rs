//! 宿主值 -> 动态值的转换。
//!
//! 可转换的类型集合在编译期封闭：实现了 `ToObject` 的类型才能作为渲染数据，
//! 结构体通过 `#[derive(ToObject)]` 或手写 `MapBuilder` 接入。

use crate::runtime::object::{Function, Map, Object, Origin};
use crate::runtime::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

/// 动态值能力：能把自身转换为 `Object` 的宿主类型
pub trait ToObject {
    fn to_object(&self) -> Object;
}

/// 转换任意实现了 `ToObject` 的值；对 `Object` 幂等
pub fn convert<T: ToObject + ?Sized>(value: &T) -> Object {
    value.to_object()
}

impl ToObject for Object {
    fn to_object(&self) -> Object {
        self.clone()
    }
}

impl ToObject for Value {
    fn to_object(&self) -> Object {
        Value::to_object(self)
    }
}

impl ToObject for Function {
    fn to_object(&self) -> Object {
        Object::Func(self.clone())
    }
}

impl ToObject for () {
    fn to_object(&self) -> Object {
        Object::Nil
    }
}

impl ToObject for bool {
    fn to_object(&self) -> Object {
        Object::Bool(*self)
    }
}

macro_rules! impl_number {
    ($($t:ty),*) => {
        $(
            impl ToObject for $t {
                fn to_object(&self) -> Object {
                    Object::Number(*self as f64)
                }
            }
        )*
    };
}

impl_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl ToObject for Decimal {
    fn to_object(&self) -> Object {
        self.to_f64().map(Object::Number).unwrap_or_default()
    }
}

impl ToObject for str {
    fn to_object(&self) -> Object {
        Object::String(self.to_string())
    }
}

impl ToObject for String {
    fn to_object(&self) -> Object {
        Object::String(self.clone())
    }
}

impl ToObject for char {
    fn to_object(&self) -> Object {
        Object::String(self.to_string())
    }
}

impl ToObject for Cow<'_, str> {
    fn to_object(&self) -> Object {
        Object::String(self.to_string())
    }
}

impl ToObject for NaiveDate {
    fn to_object(&self) -> Object {
        Object::String(self.format("%Y-%m-%d").to_string())
    }
}

impl ToObject for NaiveTime {
    fn to_object(&self) -> Object {
        Object::String(self.format("%H:%M:%S").to_string())
    }
}

impl ToObject for NaiveDateTime {
    fn to_object(&self) -> Object {
        Object::String(self.format("%Y-%m-%dT%H:%M:%S").to_string())
    }
}

impl<Tz: TimeZone> ToObject for DateTime<Tz>
where
    Tz::Offset: Display,
{
    fn to_object(&self) -> Object {
        Object::String(self.to_rfc3339())
    }
}

// 错误值转换为带格式的错误信息
impl ToObject for anyhow::Error {
    fn to_object(&self) -> Object {
        Object::String(format!("Error: {:#}", self))
    }
}

impl ToObject for dyn std::error::Error + Send + Sync {
    fn to_object(&self) -> Object {
        Object::String(format!("Error: {}", self))
    }
}

impl<T: ToObject + ?Sized> ToObject for &T {
    fn to_object(&self) -> Object {
        (**self).to_object()
    }
}

impl<T: ToObject + ?Sized> ToObject for Box<T> {
    fn to_object(&self) -> Object {
        (**self).to_object()
    }
}

impl<T: ToObject + ?Sized> ToObject for Arc<T> {
    fn to_object(&self) -> Object {
        (**self).to_object()
    }
}

impl<T: ToObject + ?Sized> ToObject for Rc<T> {
    fn to_object(&self) -> Object {
        (**self).to_object()
    }
}

impl<T: ToObject> ToObject for Option<T> {
    fn to_object(&self) -> Object {
        match self {
            Some(v) => v.to_object(),
            None => Object::Nil,
        }
    }
}

impl<T: ToObject> ToObject for [T] {
    fn to_object(&self) -> Object {
        Object::array(self.iter().map(ToObject::to_object).collect())
    }
}

impl<T: ToObject, const N: usize> ToObject for [T; N] {
    fn to_object(&self) -> Object {
        self.as_slice().to_object()
    }
}

impl<T: ToObject> ToObject for Vec<T> {
    fn to_object(&self) -> Object {
        self.as_slice().to_object()
    }
}

impl<T: ToObject> ToObject for VecDeque<T> {
    fn to_object(&self) -> Object {
        Object::array(self.iter().map(ToObject::to_object).collect())
    }
}

fn map_from<'a, K, V, I>(iter: I) -> Object
where
    K: ToObject + 'a,
    V: ToObject + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let items: IndexMap<String, Object> = iter
        .map(|(k, v)| (k.to_object().to_string(), v.to_object()))
        .collect();
    Object::map(items)
}

impl<K: ToObject, V: ToObject, S> ToObject for HashMap<K, V, S> {
    fn to_object(&self) -> Object {
        map_from(self.iter())
    }
}

impl<K: ToObject, V: ToObject> ToObject for BTreeMap<K, V> {
    fn to_object(&self) -> Object {
        map_from(self.iter())
    }
}

impl<K: ToObject, V: ToObject, S> ToObject for IndexMap<K, V, S> {
    fn to_object(&self) -> Object {
        map_from(self.iter())
    }
}

impl ToObject for serde_json::Value {
    fn to_object(&self) -> Object {
        use serde_json::Value as Json;
        match self {
            Json::Null => Object::Nil,
            Json::Bool(b) => Object::Bool(*b),
            Json::Number(n) => n.as_f64().map(Object::Number).unwrap_or_default(),
            Json::String(s) => Object::String(s.clone()),
            Json::Array(items) => items.to_object(),
            Json::Object(items) => Object::map(
                items
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_object()))
                    .collect(),
            ),
        }
    }
}

/// 手写结构体转换时使用的构造器
///
/// ```
/// use pugjs::{MapBuilder, Object};
///
/// let obj = MapBuilder::new()
///     .field("name", &"pug")
///     .field("stars", &5)
///     .display("pug (5)")
///     .build();
/// assert_eq!(obj.field("name"), Object::string("pug"));
/// assert_eq!(obj.to_string(), "pug (5)");
/// ```
#[derive(Default)]
pub struct MapBuilder {
    items: IndexMap<String, Object>,
    origin: Origin,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T: ToObject + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.items.insert(name.to_string(), value.to_object());
        self
    }

    /// 以 `Func` 形式暴露的方法
    pub fn method(mut self, name: &str, f: Function) -> Self {
        self.items.insert(name.to_string(), Object::Func(f));
        self
    }

    /// 宿主类型自带的字符串表示，优先于逐字段序列化
    pub fn display(mut self, display: impl Display) -> Self {
        self.origin.display = Some(display.to_string());
        self
    }

    pub fn json(mut self, json: serde_json::Value) -> Self {
        self.origin.json = Some(json);
        self
    }

    pub fn build(self) -> Object {
        if self.origin.display.is_none() && self.origin.json.is_none() {
            Object::map(self.items)
        } else {
            Object::Map(Map::with_origin(self.items, self.origin))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_scalars() {
        assert_eq!(convert(&3u8), Object::Number(3.0));
        assert_eq!(convert(&-2i64), Object::Number(-2.0));
        assert_eq!(convert(&1.5f32), Object::Number(1.5));
        assert_eq!(convert("x"), Object::string("x"));
        assert_eq!(convert(&true), Object::Bool(true));
        assert_eq!(convert(&Decimal::new(125, 2)), Object::Number(1.25));
        assert_eq!(convert(&()), Object::Nil);
    }

    #[test]
    fn test_optional_and_pointers() {
        let none: Option<String> = None;
        assert!(convert(&none).is_nil());
        assert_eq!(convert(&Some(Box::new(7))), Object::Number(7.0));
        assert_eq!(convert(&Arc::new("a".to_string())), Object::string("a"));
    }

    #[test]
    fn test_collections_preserve_order() {
        let list = vec![3, 1, 2];
        let obj = convert(&list);
        assert_eq!(obj.to_string(), "3 1 2");

        let mut m = BTreeMap::new();
        m.insert(1, "one");
        m.insert(2, "two");
        let obj = convert(&m);
        assert_eq!(obj.field("1"), Object::string("one"));
        assert_eq!(obj.field("2"), Object::string("two"));
    }

    #[test]
    fn test_convert_is_idempotent() {
        let mut m = HashMap::new();
        m.insert("a".to_string(), vec![1, 2]);
        let once = convert(&m);
        let twice = convert(&once);
        assert_eq!(once, twice);

        let s = convert("txt");
        assert_eq!(convert(&s), s);
    }

    #[test]
    fn test_errors_and_dates() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(convert(&err), Object::string("Error: boom"));

        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(convert(&d), Object::string("2024-03-01"));
    }

    #[test]
    fn test_json_values() {
        let v = serde_json::json!({"a": [1, "b", null], "c": true});
        let obj = convert(&v);
        assert_eq!(obj.field("a").to_string(), "1 b ");
        assert_eq!(obj.field("c"), Object::Bool(true));
    }
}
