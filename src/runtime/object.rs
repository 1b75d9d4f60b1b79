use crate::error::FuncError;
use crate::runtime::ops;
use crate::runtime::value::Value;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type FuncResult = Result<Value, FuncError>;

type NativeFn = dyn Fn(&[Value]) -> FuncResult + Send + Sync;

/// 模板中可调用的函数
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    f: Arc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> FuncResult + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> FuncResult {
        (self.f)(args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// 动态值：模板表达式求值时使用的统一值类型
#[derive(Clone, Debug, Default)]
pub enum Object {
    String(String),
    Number(f64),
    Bool(bool),
    Array(Array),
    Map(Map),
    Func(Function),
    #[default]
    Nil,
}

/// 有序数组，同一次渲染内共享可变（push/pop）
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Object>>>);

/// Map 保留原始宿主值的字符串/JSON 表示
#[derive(Debug, Default)]
pub struct Origin {
    pub display: Option<String>,
    pub json: Option<serde_json::Value>,
}

#[derive(Clone, Default)]
pub struct Map {
    items: Arc<RwLock<IndexMap<String, Object>>>,
    origin: Option<Arc<Origin>>,
}

impl Array {
    pub fn new(items: Vec<Object>) -> Self {
        Array(Arc::new(RwLock::new(items)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Object>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Object>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Object> {
        self.read().get(index).cloned()
    }

    /// 当前元素的快照
    pub fn items(&self) -> Vec<Object> {
        self.read().clone()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.read().iter()).finish()
    }
}

impl Map {
    pub fn new(items: IndexMap<String, Object>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            origin: None,
        }
    }

    pub fn with_origin(items: IndexMap<String, Object>, origin: Origin) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            origin: Some(Arc::new(origin)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Object>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Object>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_deref()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Object> {
        self.read().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Object) {
        self.write().insert(key.into(), value);
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Object)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// 字段查找：精确匹配 -> 首字母小写 -> 首字母大写
    pub fn field(&self, name: &str) -> Option<Object> {
        let items = self.read();
        if let Some(v) = items.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = items.get(lower_first(name).as_str()) {
            return Some(v.clone());
        }
        items.get(upper_first(name).as_str()).cloned()
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.read().iter()).finish()
    }
}

pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// JS 风格的数字输出：整数不带小数点
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// HTML 转义，与 Go 的 html.EscapeString 输出保持一致
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl Object {
    pub fn string(s: impl Into<String>) -> Self {
        Object::String(s.into())
    }

    pub fn array(items: Vec<Object>) -> Self {
        Object::Array(Array::new(items))
    }

    pub fn map(items: IndexMap<String, Object>) -> Self {
        Object::Map(Map::new(items))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Object::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// JS 风格真值判断
    pub fn truthy(&self) -> bool {
        match self {
            Object::String(s) => !s.is_empty(),
            Object::Number(n) => *n != 0.0 && !n.is_nan(),
            Object::Bool(b) => *b,
            Object::Array(a) => !a.is_empty(),
            Object::Map(m) => !m.is_empty(),
            Object::Func(_) => true,
            Object::Nil => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::Number(_) => "number",
            Object::Bool(_) => "bool",
            Object::Array(_) => "array",
            Object::Map(_) => "map",
            Object::Func(_) => "function",
            Object::Nil => "nil",
        }
    }

    /// 字段访问；Nil 对任意字段都返回 Nil
    pub fn field(&self, name: &str) -> Object {
        match self {
            Object::Map(m) => m.field(name).unwrap_or_default(),
            Object::Array(a) => array_member(a, name),
            Object::String(s) => string_member(s, name),
            _ => Object::Nil,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Object::String(s) => Json::String(s.clone()),
            Object::Number(n) => serde_json::Number::from_f64(*n)
                .map(|num| {
                    if n.fract() == 0.0 && n.abs() < 9.0e15 {
                        Json::from(*n as i64)
                    } else {
                        Json::Number(num)
                    }
                })
                .unwrap_or(Json::Null),
            Object::Bool(b) => Json::Bool(*b),
            Object::Array(a) => Json::Array(a.read().iter().map(Object::to_json).collect()),
            Object::Map(m) => {
                if let Some(json) = m.origin().and_then(|o| o.json.clone()) {
                    return json;
                }
                Json::Object(
                    m.read()
                        .iter()
                        .map(|(k, v)| (lower_first(k), v.to_json()))
                        .collect(),
                )
            }
            Object::Func(_) | Object::Nil => Json::Null,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::String(s) => f.write_str(s),
            Object::Number(n) => f.write_str(&format_number(*n)),
            Object::Bool(b) => write!(f, "{}", b),
            Object::Array(a) => {
                for (i, item) in a.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Object::Map(m) => {
                if let Some(display) = m.origin().and_then(|o| o.display.as_deref()) {
                    return f.write_str(display);
                }
                write!(f, "{}", self.to_json())
            }
            Object::Func(func) => f.write_str(func.name()),
            Object::Nil => Ok(()),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Number(a), Object::Number(b)) => a == b,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Nil, Object::Nil) => true,
            (Object::Func(a), Object::Func(b)) => a.ptr_eq(b),
            (Object::Array(a), Object::Array(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Object::Map(a), Object::Map(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            _ => false,
        }
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn arg(args: &[Value], i: usize) -> Object {
    args.get(i).map(Value::to_object).unwrap_or_default()
}

fn int_arg(args: &[Value], i: usize) -> Option<i64> {
    args.get(i).and_then(Value::as_f64).map(|n| n as i64)
}

/// JS 风格的下标归一化（负数从尾部计）
fn clamp_index(i: i64, len: usize) -> usize {
    let len = len as i64;
    let i = if i < 0 { (len + i).max(0) } else { i.min(len) };
    i as usize
}

fn array_member(array: &Array, name: &str) -> Object {
    let a = array.clone();
    let method = |f: fn(&Array, &[Value]) -> FuncResult| {
        let a = a.clone();
        Object::Func(Function::new(name, move |args| f(&a, args)))
    };
    match name {
        "length" => Object::Number(array.len() as f64),
        "indexOf" => method(|a, args| {
            let needle = args.first().cloned().unwrap_or_default();
            let pos = a
                .read()
                .iter()
                .position(|item| ops::eql(&Value::Object(item.clone()), &needle));
            Ok(Value::Object(Object::Number(
                pos.map(|p| p as f64).unwrap_or(-1.0),
            )))
        }),
        "join" => method(|a, args| {
            let sep = match args.first() {
                Some(v) => v.to_string(),
                None => ",".to_string(),
            };
            let parts: Vec<String> = a.read().iter().map(|o| o.to_string()).collect();
            Ok(Value::Object(Object::String(parts.join(&sep))))
        }),
        "push" => method(|a, args| {
            let mut items = a.write();
            items.extend(args.iter().map(Value::to_object));
            Ok(Value::Object(Object::Number(items.len() as f64)))
        }),
        "pop" => method(|a, _| Ok(Value::Object(a.write().pop().unwrap_or_default()))),
        "splice" => method(|a, args| {
            let mut items = a.write();
            let len = items.len();
            let start = clamp_index(int_arg(args, 0).unwrap_or(0), len);
            let count = int_arg(args, 1)
                .map(|c| c.max(0) as usize)
                .unwrap_or(len - start)
                .min(len - start);
            let inserted: Vec<Object> = args.iter().skip(2).map(Value::to_object).collect();
            let removed: Vec<Object> = items.splice(start..start + count, inserted).collect();
            Ok(Value::Object(Object::array(removed)))
        }),
        "slice" => method(|a, args| {
            let items = a.read();
            let len = items.len();
            let start = clamp_index(int_arg(args, 0).unwrap_or(0), len);
            let end = clamp_index(int_arg(args, 1).unwrap_or(len as i64), len);
            let out = if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            };
            Ok(Value::Object(Object::array(out)))
        }),
        _ => Object::Nil,
    }
}

fn string_member(s: &str, name: &str) -> Object {
    let owned = s.to_string();
    let method = |f: fn(&str, &[Value]) -> FuncResult| {
        let s = owned.clone();
        Object::Func(Function::new(name, move |args| f(&s, args)))
    };
    match name {
        "length" => Object::Number(s.chars().count() as f64),
        "charAt" => method(|s, args| {
            let i = int_arg(args, 0).unwrap_or(0);
            let c = if i < 0 {
                None
            } else {
                s.chars().nth(i as usize)
            };
            Ok(Value::Object(Object::String(
                c.map(String::from).unwrap_or_default(),
            )))
        }),
        "toUpperCase" => method(|s, _| Ok(Value::Object(Object::String(s.to_uppercase())))),
        "toLowerCase" => method(|s, _| Ok(Value::Object(Object::String(s.to_lowercase())))),
        "trim" => method(|s, _| Ok(Value::Object(Object::String(s.trim().to_string())))),
        "split" => method(|s, args| {
            let parts: Vec<Object> = match args.first() {
                Some(sep) => {
                    let sep = sep.to_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Object::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str())
                            .map(|p| Object::String(p.to_string()))
                            .collect()
                    }
                }
                None => vec![Object::String(s.to_string())],
            };
            Ok(Value::Object(Object::array(parts)))
        }),
        "slice" => method(|s, args| {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let start = clamp_index(int_arg(args, 0).unwrap_or(0), len);
            let end = clamp_index(int_arg(args, 1).unwrap_or(len as i64), len);
            let out: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Ok(Value::Object(Object::String(out)))
        }),
        "replace" => method(|s, args| {
            let from = arg(args, 0).to_string();
            let to = arg(args, 1).to_string();
            Ok(Value::Object(Object::String(s.replacen(&from, &to, 1))))
        }),
        "indexOf" => method(|s, args| {
            let needle = arg(args, 0).to_string();
            let pos = s
                .find(&needle)
                .map(|b| s[..b].chars().count() as f64)
                .unwrap_or(-1.0);
            Ok(Value::Object(Object::Number(pos)))
        }),
        _ => Object::Nil,
    }
}
