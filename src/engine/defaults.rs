//! 默认模板函数

use super::functions::{FunctionRegistry, TemplateFunc};
use crate::error::FuncError;
use crate::runtime::{Function, MapBuilder, Object, Value, convert};
use std::collections::HashMap;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry
        .register(JsMath)
        .register(JsJson)
        .register_fn("startsWith", |args| {
            let s = arg(args, 0).to_string();
            Ok(Value::from(s.starts_with(&arg(args, 1).to_string())))
        })
        .register_fn("truncate", |args| {
            let s = arg(args, 0).to_string();
            let len = arg(args, 1).as_f64().unwrap_or(0.0).max(0.0) as usize;
            Ok(Value::from(truncate(&s, len)))
        })
        .register_fn("stripTags", |args| {
            let html = arg(args, 0).to_string();
            let allowed = match arg(args, 1).to_object() {
                Object::Array(a) => a.items().iter().map(Object::to_string).collect(),
                Object::Nil => Vec::new(),
                other => vec![other.to_string()],
            };
            Ok(Value::from(strip_tags(&html, &allowed)))
        });
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn num(args: &[Value], i: usize) -> f64 {
    arg(args, i).as_f64().unwrap_or(f64::NAN)
}

/// 取整结果作为整数输出，NaN 保持为 NaN
fn int(n: f64) -> Value {
    if n.is_finite() {
        Value::Int(n as i64)
    } else {
        Value::from(n)
    }
}

/// JS 的 `Math`
struct JsMath;

impl TemplateFunc for JsMath {
    fn name(&self) -> &str {
        "Math"
    }

    fn func(&self) -> Function {
        Function::new("Math", |_| {
            let math = MapBuilder::new()
                .method("ceil", Function::new("ceil", |args| Ok(int(num(args, 0).ceil()))))
                .method("floor", Function::new("floor", |args| Ok(int(num(args, 0).floor()))))
                .method("trunc", Function::new("trunc", |args| Ok(int(num(args, 0).trunc()))))
                .method("round", Function::new("round", |args| Ok(int(num(args, 0).round()))))
                .method(
                    "min",
                    Function::new("min", |args| {
                        let n = (0..args.len()).map(|i| num(args, i)).fold(f64::INFINITY, f64::min);
                        Ok(Value::from(n))
                    }),
                )
                .method(
                    "max",
                    Function::new("max", |args| {
                        let n = (0..args.len())
                            .map(|i| num(args, i))
                            .fold(f64::NEG_INFINITY, f64::max);
                        Ok(Value::from(n))
                    }),
                )
                .display("Math")
                .build();
            Ok(Value::Object(math))
        })
    }
}

/// JS 的 `JSON`
struct JsJson;

impl TemplateFunc for JsJson {
    fn name(&self) -> &str {
        "JSON"
    }

    fn func(&self) -> Function {
        Function::new("JSON", |_| {
            let json = MapBuilder::new()
                .method(
                    "stringify",
                    Function::new("stringify", |args| {
                        serde_json::to_string(&arg(args, 0).to_object())
                            .map(Value::from)
                            .map_err(|e| FuncError::new(e.to_string()))
                    }),
                )
                .method(
                    "parse",
                    Function::new("parse", |args| {
                        serde_json::from_str::<serde_json::Value>(&arg(args, 0).to_string())
                            .map(|v| Value::Object(convert(&v)))
                            .map_err(|e| FuncError::new(e.to_string()))
                    }),
                )
                .display("JSON")
                .build();
            Ok(Value::Object(json))
        })
    }
}

fn truncate(s: &str, len: usize) -> String {
    if s.chars().count() <= len {
        return s.to_string();
    }
    let mut out: String = s.chars().take(len).collect();
    out.push_str("...");
    out
}

/// 去掉 HTML 标签。`allowed` 中的标签保留，写成 `a(href rel)` 时同时保留列出的属性
fn strip_tags(html: &str, allowed: &[String]) -> String {
    let mut whitelist: HashMap<String, Vec<String>> = HashMap::new();
    for rule in allowed {
        let rule = rule.trim();
        match rule.split_once('(') {
            Some((tag, attrs)) => {
                let attrs = attrs.trim_end_matches(')').split_whitespace().map(str::to_string);
                whitelist.insert(tag.trim().to_lowercase(), attrs.collect());
            }
            None => {
                whitelist.insert(rule.to_lowercase(), Vec::new());
            }
        }
    }

    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];

        let (closing, tag) = match tag.strip_prefix('/') {
            Some(t) => (true, t),
            None => (false, tag),
        };
        let name_len = tag
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(tag.len());
        let name = tag[..name_len].to_lowercase();
        let Some(attrs) = whitelist.get(&name) else {
            continue;
        };

        if closing {
            out.push_str(&format!("</{}>", name));
            continue;
        }
        out.push('<');
        out.push_str(&name);
        for (key, value) in parse_attrs(&tag[name_len..]) {
            if attrs.iter().any(|a| a.eq_ignore_ascii_case(&key)) {
                out.push_str(&format!(" {}=\"{}\"", key, value));
            }
        }
        out.push('>');
    }
    out.push_str(rest);
    out
}

fn parse_attrs(s: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        let key_len = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let key = &rest[..key_len];
        rest = &rest[key_len..];
        let mut value = "";
        if let Some(after) = rest.strip_prefix('=') {
            match after.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let end = after[1..].find(q).map_or(after.len(), |i| i + 1);
                    value = &after[1..end];
                    rest = after.get(end + 1..).unwrap_or("");
                }
                _ => {
                    let end = after.find(char::is_whitespace).unwrap_or(after.len());
                    value = &after[..end];
                    rest = &after[end..];
                }
            }
        } else if key.is_empty() {
            // 单独的 `/`
            rest = &rest[1..];
        }
        if !key.is_empty() {
            attrs.push((key.to_string(), value.to_string()));
        }
        rest = rest.trim_start();
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(html: &str, allowed: &[&str]) -> String {
        let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
        strip_tags(html, &allowed)
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip("should be ok", &[]), "should be ok");
        assert_eq!(strip("<h1>Headline</h1>\n<p>Hello world</p>", &[]), "Headline\nHello world");
        assert_eq!(strip("<h1>Hello</h1>", &["h1", "h2", "p"]), "<h1>Hello</h1>");
        assert_eq!(
            strip("<h1>Remove Headline</h1><p>Keep paragraphs</p>", &["p"]),
            "Remove Headline<p>Keep paragraphs</p>"
        );
        assert_eq!(
            strip(
                r#"<h1 style="font-size: 500px">Remove Scripts</h1><script src="http://miner.tld/x.js">"#,
                &["h1"]
            ),
            "<h1>Remove Scripts</h1>"
        );
        let html = r#"<p>I'm a paragraph containing a <a href="http://tld.com">link</a></p>"#;
        assert_eq!(strip(html, &["p", "a(href link rel)"]), html);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_math_and_json() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry);
        let funcs = registry.plain_funcs();

        let math = funcs["Math"].call(&[]).unwrap();
        let Value::Object(Object::Func(ceil)) = math.field("ceil") else {
            panic!("ceil is not a function");
        };
        assert_eq!(ceil.call(&[Value::from(1.2)]).unwrap(), Value::Int(2));
        let Value::Object(Object::Func(max)) = math.field("max") else {
            panic!("max is not a function");
        };
        assert_eq!(max.call(&[Value::Int(1), Value::from(3.5)]).unwrap(), Value::from(3.5));

        let json = funcs["JSON"].call(&[]).unwrap();
        let Value::Object(Object::Func(stringify)) = json.field("stringify") else {
            panic!("stringify is not a function");
        };
        let list = Value::Object(Object::array(vec![Object::Number(1.0), Object::string("a")]));
        assert_eq!(stringify.call(&[list]).unwrap(), Value::from(r#"[1,"a"]"#));

        assert_eq!(
            funcs["startsWith"].call(&[Value::from("pugjs"), Value::from("pug")]).unwrap(),
            Value::from(true)
        );
    }
}
