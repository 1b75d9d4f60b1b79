//! 编译产物调用的内置函数表

use crate::error::FuncError;
use crate::runtime::attrs;
use crate::runtime::object::{FuncResult, Function, Object, html_escape};
use crate::runtime::ops;
use crate::runtime::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::LazyLock;

pub type FuncMap = HashMap<String, Function>;

/// 内置函数，进程内只构建一次
pub static BUILTINS: LazyLock<FuncMap> = LazyLock::new(builtins);

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), FuncError> {
    if args.len() != want {
        return Err(FuncError::new(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        )));
    }
    Ok(())
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn obj(o: Object) -> FuncResult {
    Ok(Value::Object(o))
}

fn concat(args: &[Value]) -> String {
    args.iter().map(|a| a.to_string()).collect()
}

fn builtins() -> FuncMap {
    let mut m = FuncMap::new();
    let mut put = |name: &str, f: fn(&[Value]) -> FuncResult| {
        m.insert(name.to_string(), Function::new(name, f));
    };

    macro_rules! binary {
        ($($name:literal => $op:path),* $(,)?) => {
            $(put($name, |args| {
                arity($name, args, 2)?;
                Ok($op(&args[0], &args[1]))
            });)*
        };
    }
    macro_rules! compare {
        ($($name:literal => $op:path),* $(,)?) => {
            $(put($name, |args| {
                arity($name, args, 2)?;
                Ok(Value::from($op(&args[0], &args[1])))
            });)*
        };
    }
    macro_rules! unary {
        ($($name:literal => $op:path),* $(,)?) => {
            $(put($name, |args| {
                arity($name, args, 1)?;
                Ok($op(&args[0]))
            });)*
        };
    }

    binary! {
        "__op__add" => ops::add,
        "__op__sub" => ops::sub,
        "__op__mul" => ops::mul,
        "__op__quo" => ops::quo,
        "__op__slash" => ops::quo,
        "__op__mod" => ops::rem,
        "__op__b_and" => ops::b_and,
        "__op__b_or" => ops::b_or,
        "__op__b_xor" => ops::b_xor,
        "__op__b_sleft" => ops::b_sleft,
        "__op__b_sright" => ops::b_sright,
        "__op__b_usright" => ops::b_usright,
    }
    compare! {
        "__op__eql" => ops::eql,
        "__op__neq" => ops::neq,
        "neq" => ops::neq,
        "__op__lt" => ops::lss,
        "__op__gt" => ops::gt,
        "__op__lte" => ops::lte,
        "__op__gte" => ops::gte,
    }
    unary! {
        "__op__not" => ops::not,
        "__op__minus" => ops::minus,
        "__op__plus" => ops::plus,
        "__op__bitnot" => ops::bitnot,
        "__op__inc" => ops::inc,
        "__op__dec" => ops::dec,
    }

    // 执行器对 and/or/__if 做了短路处理，这里是管道调用时的兜底实现
    put("__op__and", |args| Ok(ops::and(args)));
    put("__op__or", |args| Ok(ops::or(args)));
    put("__if", |args| {
        arity("__if", args, 3)?;
        Ok(if args[0].truthy() {
            args[1].clone()
        } else {
            args[2].clone()
        })
    });

    put("null", |_| Ok(Value::NIL));
    put("__void", |_| Ok(Value::NIL));
    put("__str", |args| obj(Object::String(concat(args))));
    put("raw", |args| obj(Object::String(concat(args))));
    put("unescaped", |args| obj(Object::String(concat(args))));
    put("__pug__html", |args| obj(Object::String(html_escape(&concat(args)))));
    put("json", |args| {
        arity("json", args, 1)?;
        serde_json::to_string(&args[0].to_object())
            .map(|s| Value::Object(Object::String(s)))
            .map_err(|e| FuncError::new(e.to_string()))
    });
    put("__throw", |args| Err(FuncError::new(concat(args))));

    put("__op__array", |args| {
        obj(Object::array(args.iter().map(Value::to_object).collect()))
    });
    put("__op__map", |args| {
        if args.len() % 2 != 0 {
            return Err(FuncError::new("__op__map needs key/value pairs"));
        }
        let items: IndexMap<String, Object> = args
            .chunks(2)
            .map(|kv| (kv[0].to_string(), kv[1].to_object()))
            .collect();
        obj(Object::map(items))
    });
    put("__op__map_params", map_params);
    put("__op__extend", |args| {
        let mut items = IndexMap::new();
        for a in args {
            if let Object::Map(m) = a.to_object() {
                items.extend(m.entries());
            }
        }
        obj(Object::map(items))
    });
    put("__op__keys", |args| {
        arity("__op__keys", args, 1)?;
        let keys = match args[0].to_object() {
            Object::Map(m) => m.keys().into_iter().map(Object::String).collect(),
            Object::Array(a) => (0..a.len()).map(|i| Object::Number(i as f64)).collect(),
            _ => Vec::new(),
        };
        obj(Object::array(keys))
    });
    put("__op__slice", |args| {
        let start = arg(args, 1).as_f64().unwrap_or(0.0).max(0.0) as usize;
        let items = match arg(args, 0).to_object() {
            Object::Array(a) => a.items().into_iter().skip(start).collect(),
            _ => Vec::new(),
        };
        obj(Object::array(items))
    });
    put("__op__in", |args| {
        arity("__op__in", args, 2)?;
        let found = match args[1].to_object() {
            Object::Map(m) => m.get(&args[0].to_string()).is_some(),
            Object::Array(a) => args[0]
                .as_f64()
                .is_some_and(|i| i >= 0.0 && (i as usize) < a.len()),
            _ => false,
        };
        Ok(Value::from(found))
    });
    put("__op__typeof", |args| {
        arity("__op__typeof", args, 1)?;
        let name = match &args[0] {
            Value::Int(_) => "number",
            Value::Object(o) => match o {
                Object::String(_) => "string",
                Object::Number(_) => "number",
                Object::Bool(_) => "boolean",
                Object::Func(_) => "function",
                Object::Nil => "undefined",
                Object::Array(_) | Object::Map(_) => "object",
            },
        };
        Ok(Value::from(name))
    });
    put("__op__delete", |args| {
        arity("__op__delete", args, 2)?;
        match args[0].to_object() {
            Object::Map(m) => {
                m.write().shift_remove(&args[1].to_string());
            }
            Object::Array(a) => {
                if let Some(i) = args[1].as_f64() {
                    if let Some(slot) = a.write().get_mut(i as usize) {
                        *slot = Object::Nil;
                    }
                }
            }
            _ => {}
        }
        Ok(Value::from(true))
    });
    put("__assign", assign);
    put("__pug__index", |args| {
        arity("__pug__index", args, 2)?;
        Ok(index(&args[0], &args[1]))
    });
    put("__tryindex", |args| {
        arity("__tryindex", args, 2)?;
        Ok(index(&args[0], &args[1]))
    });
    put("__Range", range);
    put("parseInt", |args| {
        let s = arg(args, 0).to_string();
        let radix = arg(args, 1).as_f64().map(|r| r as u32).unwrap_or(10);
        Ok(Value::from(parse_int(&s, radix)))
    });
    put("parseFloat", |args| {
        let s = arg(args, 0).to_string();
        Ok(Value::from(s.trim().parse::<f64>().unwrap_or(f64::NAN)))
    });

    put("__attr", attrs::attr);
    put("__attrs", attrs::attrs);
    put("__and_attrs", attrs::and_attrs);
    m
}

/// 重复的键收集为数组
fn map_params(args: &[Value]) -> FuncResult {
    if args.len() % 2 != 0 {
        return Err(FuncError::new("__op__map_params needs key/value pairs"));
    }
    let mut grouped: IndexMap<String, Vec<Object>> = IndexMap::new();
    for kv in args.chunks(2) {
        grouped
            .entry(kv[0].to_string())
            .or_default()
            .push(kv[1].to_object());
    }
    let items = grouped
        .into_iter()
        .map(|(k, mut values)| {
            let v = if values.len() == 1 {
                values.remove(0)
            } else {
                Object::array(values)
            };
            (k, v)
        })
        .collect();
    obj(Object::map(items))
}

/// `a.b = x` / `a[k] = x`
fn assign(args: &[Value]) -> FuncResult {
    arity("__assign", args, 3)?;
    let value = args[2].to_object();
    match args[0].to_object() {
        Object::Map(m) => m.insert(args[1].to_string(), value),
        Object::Array(a) => {
            let Some(i) = args[1].as_f64().filter(|i| *i >= 0.0) else {
                return Err(FuncError::new(format!("invalid array index {}", args[1])));
            };
            let i = i as usize;
            let mut items = a.write();
            if i >= items.len() {
                items.resize(i + 1, Object::Nil);
            }
            items[i] = value;
        }
        other => {
            return Err(FuncError::new(format!(
                "cannot set property {} of {}",
                args[1],
                other.type_name()
            )));
        }
    }
    Ok(Value::NIL)
}

/// 统一的下标访问：越界或不可索引时返回 Nil
pub fn index(target: &Value, key: &Value) -> Value {
    let Value::Object(target) = target else {
        return Value::NIL;
    };
    let result = match target {
        Object::Array(a) => match key.as_f64() {
            Some(i) if i >= 0.0 && i.fract() == 0.0 => a.get(i as usize).unwrap_or_default(),
            Some(_) => Object::Nil,
            None => target.field(&key.to_string()),
        },
        Object::Map(m) => m.field(&key.to_string()).unwrap_or_default(),
        Object::String(s) => match key.as_f64() {
            Some(i) if i >= 0.0 => s
                .chars()
                .nth(i as usize)
                .map(|c| Object::String(c.to_string()))
                .unwrap_or_default(),
            Some(_) => Object::Nil,
            None => target.field(&key.to_string()),
        },
        _ => Object::Nil,
    };
    Value::Object(result)
}

/// `range()` 一次性生成数组，长度上限
const MAX_RANGE_LEN: i128 = 1_000_000;

fn range(args: &[Value]) -> FuncResult {
    let nums: Vec<i64> = args
        .iter()
        .map(|a| a.as_f64().map(|n| n as i64))
        .collect::<Option<_>>()
        .ok_or_else(|| FuncError::new("range expects numbers"))?;
    let (start, end, step) = match nums.as_slice() {
        [end] => (0, *end, 1),
        [start, end] => (*start, *end, 1),
        [start, end, step] if *step != 0 => (*start, *end, *step),
        _ => return Err(FuncError::new("range expects 1 to 3 arguments")),
    };
    let (start, end, step) = (i128::from(start), i128::from(end), i128::from(step));
    let len = if step > 0 {
        (end - start + step - 1) / step
    } else {
        (start - end - step - 1) / -step
    }
    .max(0);
    if len > MAX_RANGE_LEN {
        return Err(FuncError::new(format!(
            "range of {} items exceeds the limit of {}",
            len, MAX_RANGE_LEN
        )));
    }
    let out = (0..len)
        .map(|k| Object::Number((start + k * step) as f64))
        .collect();
    obj(Object::array(out))
}

fn parse_int(s: &str, radix: u32) -> f64 {
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let s = s.trim();
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    match i64::from_str_radix(&digits[..end], radix) {
        Ok(n) if neg => -(n as f64),
        Ok(n) => n as f64,
        Err(_) => f64::NAN,
    }
}
