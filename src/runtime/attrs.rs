//! HTML 属性的合并与输出（`__attr` / `__and_attrs` / `__attrs`）

use crate::error::FuncError;
use crate::runtime::object::{FuncResult, Object, html_escape};
use crate::runtime::value::Value;
use indexmap::IndexMap;

enum AttrValue {
    Flag(bool),
    Text(String),
    Classes(Vec<String>),
}

/// `__attr name value escape`
pub(crate) fn attr(args: &[Value]) -> FuncResult {
    if args.len() != 3 {
        return Err(FuncError::new(format!(
            "wrong number of args for __attr: want 3 got {}",
            args.len()
        )));
    }
    Ok(Value::Object(make_attr(
        args[0].to_string(),
        args[1].to_object(),
        args[2].truthy(),
    )))
}

fn make_attr(name: String, value: Object, escape: bool) -> Object {
    let mut item = IndexMap::new();
    item.insert("name".to_string(), Object::String(name));
    item.insert("value".to_string(), value);
    item.insert("escape".to_string(), Object::Bool(escape));
    Object::map(item)
}

/// `&attributes(obj)`：把 map 的每一项转成属性
pub(crate) fn and_attrs(args: &[Value]) -> FuncResult {
    let mut out = Vec::new();
    for arg in args {
        if let Object::Map(m) = arg.to_object() {
            for (k, v) in m.entries() {
                out.push(make_attr(k, v, true));
            }
        }
    }
    Ok(Value::Object(Object::array(out)))
}

/// `__attrs terse attr...`：合并重复属性并输出 ` name="value"` 串
pub(crate) fn attrs(args: &[Value]) -> FuncResult {
    let Some((terse, rest)) = args.split_first() else {
        return Ok(Value::from(""));
    };
    let terse = terse.truthy();

    let mut merged: IndexMap<String, AttrValue> = IndexMap::new();
    for arg in rest {
        for item in flatten(arg.to_object()) {
            let Object::Map(m) = item else { continue };
            let name = m.get("name").map(|n| n.to_string()).unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let value = m.get("value").unwrap_or_default();
            let escape = m.get("escape").map(|e| e.truthy()).unwrap_or(true);
            merge(&mut merged, name, value, escape);
        }
    }

    let mut out = String::new();
    for (name, value) in merged {
        match value {
            AttrValue::Flag(true) if terse => {
                out.push(' ');
                out.push_str(&name);
            }
            AttrValue::Flag(true) => out.push_str(&format!(" {}=\"{}\"", name, name)),
            AttrValue::Flag(false) => {}
            AttrValue::Text(text) => out.push_str(&format!(" {}=\"{}\"", name, text)),
            AttrValue::Classes(classes) => {
                if !classes.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", classes.join(" ")));
                }
            }
        }
    }
    Ok(Value::Object(Object::String(out)))
}

fn flatten(obj: Object) -> Vec<Object> {
    match obj {
        Object::Array(a) => a.items(),
        Object::Map(_) => vec![obj],
        _ => Vec::new(),
    }
}

fn merge(merged: &mut IndexMap<String, AttrValue>, name: String, value: Object, escape: bool) {
    let esc = |s: String| if escape { html_escape(&s) } else { s };

    if name == "class" {
        let tokens = class_tokens(&value);
        let entry = merged
            .entry(name)
            .or_insert_with(|| AttrValue::Classes(Vec::new()));
        if let AttrValue::Classes(classes) = entry {
            for token in tokens.into_iter().map(esc) {
                if !classes.contains(&token) {
                    classes.push(token);
                }
            }
        }
        return;
    }

    let value = match value {
        Object::Nil => return,
        Object::Bool(b) => AttrValue::Flag(b),
        Object::Map(m) if name == "style" => AttrValue::Text(esc(
            m.entries()
                .iter()
                .map(|(k, v)| format!("{}:{};", k, v))
                .collect::<String>(),
        )),
        other => AttrValue::Text(esc(other.to_string())),
    };
    // IndexMap 覆盖时保留首次出现的位置
    merged.insert(name, value);
}

fn class_tokens(value: &Object) -> Vec<String> {
    match value {
        Object::Nil | Object::Bool(_) => Vec::new(),
        Object::Array(a) => a.items().iter().flat_map(class_tokens).collect(),
        // {active: true, hidden: false}
        Object::Map(m) => m
            .entries()
            .into_iter()
            .filter(|(_, v)| v.truthy())
            .map(|(k, _)| k)
            .collect(),
        other => other
            .to_string()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(name: &str, value: Value, escape: bool) -> Value {
        attr(&[Value::from(name), value, Value::from(escape)]).unwrap()
    }

    fn render(terse: bool, items: Vec<Value>) -> String {
        let mut args = vec![Value::from(terse)];
        args.extend(items);
        attrs(&args).unwrap().to_string()
    }

    #[test]
    fn test_duplicate_class_is_merged() {
        let out = render(
            true,
            vec![
                a("class", Value::from("a"), true),
                a("class", Value::from("b"), true),
                a("class", Value::from("a"), true),
            ],
        );
        assert_eq!(out, r#" class="a b""#);
    }

    #[test]
    fn test_other_duplicates_overwrite_in_place() {
        let out = render(
            true,
            vec![
                a("id", Value::from("x"), true),
                a("href", Value::from("/"), true),
                a("id", Value::from("y"), true),
            ],
        );
        assert_eq!(out, r#" id="y" href="/""#);
    }

    #[test]
    fn test_boolean_attributes() {
        let items = || {
            vec![
                a("checked", Value::from(true), true),
                a("disabled", Value::from(false), true),
                a("title", Value::NIL, true),
            ]
        };
        assert_eq!(render(true, items()), " checked");
        assert_eq!(render(false, items()), r#" checked="checked""#);
    }

    #[test]
    fn test_escaping() {
        let out = render(
            true,
            vec![
                a("title", Value::from("<b>"), true),
                a("data-raw", Value::from("<b>"), false),
            ],
        );
        assert_eq!(out, r#" title="&lt;b&gt;" data-raw="<b>""#);
    }

    #[test]
    fn test_attribute_blocks() {
        let mut m = IndexMap::new();
        m.insert("class".to_string(), Object::string("c"));
        m.insert("data-id".to_string(), Object::Number(3.0));
        let block = and_attrs(&[Value::Object(Object::map(m))]).unwrap();
        let out = render(true, vec![a("class", Value::from("a"), true), block]);
        assert_eq!(out, r#" class="a c" data-id="3""#);
    }
}
