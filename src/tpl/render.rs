use crate::error::ExecError;
use crate::runtime::funcs::FuncMap;
use crate::runtime::{Function, Object, Value};
use crate::tpl::ast::{Command, DeclKind, Node, Operand, Pipeline, Template, TemplateName};
use crate::tpl::render_context::Context;

/// 参数：尚未求值的操作数，或管道传入的值
enum Arg<'n> {
    Op(&'n Operand),
    Val(Value),
}

struct Executor<'a> {
    tpl: &'a Template,
    funcs: &'a FuncMap,
    ctx: Context,
    out: &'a mut String,
    depth: usize,
    max_depth: usize,
}

/// 以 `data` 为根数据执行模板主体，输出追加到 `out`
pub fn execute(
    tpl: &Template,
    funcs: &FuncMap,
    data: Object,
    max_depth: usize,
    out: &mut String,
) -> Result<(), ExecError> {
    let dot = Value::Object(data.clone());
    let mut exec = Executor {
        tpl,
        funcs,
        ctx: Context::new(data),
        out,
        depth: 0,
        max_depth,
    };
    exec.walk(&tpl.root, &dot)
}

fn is_lazy(name: &str) -> bool {
    matches!(name, "__op__and" | "__op__or" | "__if")
}

impl<'a> Executor<'a> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), ExecError> {
        for node in nodes {
            match node {
                Node::Text(t) => self.out.push_str(t),
                Node::Action(pipe) => {
                    let v = self.pipeline(pipe, dot)?;
                    if pipe.decl.is_none() {
                        self.out.push_str(&v.to_string());
                    }
                }
                Node::If {
                    branches,
                    else_body,
                } => {
                    let mark = self.ctx.mark();
                    let mut matched = false;
                    for (cond, body) in branches {
                        if self.pipeline(cond, dot)?.truthy() {
                            self.walk(body, dot)?;
                            matched = true;
                            break;
                        }
                    }
                    if !matched && let Some(body) = else_body {
                        self.walk(body, dot)?;
                    }
                    self.ctx.truncate(mark);
                }
                Node::Range {
                    key,
                    value,
                    pipe,
                    body,
                    else_body,
                } => {
                    let mark = self.ctx.mark();
                    let target = self.pipeline(pipe, dot)?;
                    let items = iterate(&target)?;
                    if items.is_empty() {
                        if let Some(body) = else_body {
                            self.walk(body, dot)?;
                        }
                    }
                    for (k, v) in items {
                        let inner = self.ctx.mark();
                        if let Some(key) = key {
                            self.ctx.declare(key, k);
                        }
                        if let Some(value) = value {
                            self.ctx.declare(value, v.clone());
                        }
                        self.walk(body, &v)?;
                        self.ctx.truncate(inner);
                    }
                    self.ctx.truncate(mark);
                }
                Node::Template { name, arg } => {
                    let name = match name {
                        TemplateName::Literal(s) => s.clone(),
                        TemplateName::Var(var) => {
                            let v = self.ctx.lookup(var);
                            // 没有传入 block 的 mixin
                            if v.is_nil() {
                                continue;
                            }
                            v.to_string()
                        }
                    };
                    let tpl = self.tpl;
                    let body = tpl
                        .lookup(&name)
                        .ok_or_else(|| ExecError::UndefinedTemplate(name.clone()))?;
                    let arg = match arg {
                        Some(pipe) => self.pipeline(pipe, dot)?,
                        None => Value::NIL,
                    };
                    if self.depth >= self.max_depth {
                        return Err(ExecError::DepthExceeded(self.max_depth));
                    }
                    self.depth += 1;
                    self.ctx.push_frame();
                    let result = self.walk(body, &arg);
                    self.ctx.pop_frame();
                    self.depth -= 1;
                    result?;
                }
            }
        }
        Ok(())
    }

    fn pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> Result<Value, ExecError> {
        let mut piped = None;
        for cmd in &pipe.cmds {
            piped = Some(self.command(cmd, dot, piped)?);
        }
        let v = piped.unwrap_or_default();
        match &pipe.decl {
            Some((name, DeclKind::Declare)) => self.ctx.declare(name, v.clone()),
            Some((name, DeclKind::Assign)) => self.ctx.assign(name, v.clone()),
            None => {}
        }
        Ok(v)
    }

    fn command(&mut self, cmd: &Command, dot: &Value, piped: Option<Value>) -> Result<Value, ExecError> {
        let Some((head, rest)) = cmd.args.split_first() else {
            return Ok(Value::NIL);
        };

        if let Operand::Func(name) = head
            && is_lazy(name)
        {
            let args: Vec<Arg> = rest.iter().map(Arg::Op).chain(piped.map(Arg::Val)).collect();
            return self.lazy(name, args, dot);
        }

        let mut args = Vec::with_capacity(rest.len() + 1);
        for op in rest {
            args.push(self.operand(op, dot)?);
        }
        args.extend(piped);

        match head {
            Operand::Func(name) => self.call(name, &args),
            Operand::Var { name, fields } => {
                let base = self.ctx.lookup(name);
                self.chain(base, fields, Some(args))
            }
            Operand::Dot(fields) => self.chain(dot.clone(), fields, Some(args)),
            Operand::Sub { pipe, fields } => {
                let base = self.pipeline(pipe, dot)?;
                self.chain(base, fields, Some(args))
            }
            literal => {
                let v = self.operand(literal, dot)?;
                if args.is_empty() {
                    Ok(v)
                } else {
                    Err(ExecError::NotAFunction(v.to_string()))
                }
            }
        }
    }

    /// `__op__and`、`__op__or`、`__if` 只求值需要的参数
    fn lazy(&mut self, name: &str, args: Vec<Arg>, dot: &Value) -> Result<Value, ExecError> {
        let mut args = args.into_iter();
        match name {
            "__if" => {
                let test = match args.next() {
                    Some(a) => self.arg(a, dot)?,
                    None => return Ok(Value::NIL),
                };
                let mut branch = args.next();
                if !test.truthy() {
                    branch = args.next();
                }
                match branch {
                    Some(a) => self.arg(a, dot),
                    None => Ok(Value::NIL),
                }
            }
            _ => {
                let want = name == "__op__or";
                let mut last = Value::NIL;
                for a in args {
                    last = self.arg(a, dot)?;
                    if last.truthy() == want {
                        break;
                    }
                }
                Ok(last)
            }
        }
    }

    fn arg(&mut self, arg: Arg, dot: &Value) -> Result<Value, ExecError> {
        match arg {
            Arg::Op(op) => self.operand(op, dot),
            Arg::Val(v) => Ok(v),
        }
    }

    /// 作为参数求值：函数名、字段链上的函数都以零参数调用
    fn operand(&mut self, op: &Operand, dot: &Value) -> Result<Value, ExecError> {
        match op {
            Operand::Func(name) => {
                if is_lazy(name) {
                    return Ok(Value::NIL);
                }
                self.call(name, &[])
            }
            Operand::Var { name, fields } => {
                let base = self.ctx.lookup(name);
                self.chain(base, fields, None)
            }
            Operand::Dot(fields) => self.chain(dot.clone(), fields, None),
            Operand::Sub { pipe, fields } => {
                let base = self.pipeline(pipe, dot)?;
                self.chain(base, fields, None)
            }
            Operand::Str(s) => Ok(Value::Object(Object::String(s.clone()))),
            Operand::Int(i) => Ok(Value::Int(*i)),
            Operand::Float(f) => Ok(Value::Object(Object::Number(*f))),
            Operand::Bool(b) => Ok(Value::Object(Object::Bool(*b))),
            Operand::Nil => Ok(Value::NIL),
        }
    }

    /// 沿字段链取值；中途遇到函数以零参数调用，最后一个函数接收命令参数
    fn chain(&mut self, base: Value, fields: &[String], args: Option<Vec<Value>>) -> Result<Value, ExecError> {
        let mut v = base;
        for (i, field) in fields.iter().enumerate() {
            v = v.field(field);
            if let Value::Object(Object::Func(f)) = &v {
                let last = i + 1 == fields.len();
                let call_args = match (&args, last) {
                    (Some(args), true) => args.as_slice(),
                    _ => &[],
                };
                v = invoke(f, call_args)?;
                if last {
                    return Ok(v);
                }
            }
        }

        // 命令首位的函数值即使没有参数也要调用
        match (args, &v) {
            (Some(args), Value::Object(Object::Func(f))) => invoke(f, &args),
            (Some(args), other) if !args.is_empty() => Err(ExecError::NotAFunction(other.to_string())),
            _ => Ok(v),
        }
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, ExecError> {
        let funcs = self.funcs;
        let f = funcs
            .get(name)
            .ok_or_else(|| ExecError::UndefinedFunction(name.to_string()))?;
        invoke(f, args)
    }
}

fn invoke(f: &Function, args: &[Value]) -> Result<Value, ExecError> {
    f.call(args).map_err(|source| ExecError::Call {
        name: f.name().to_string(),
        source,
    })
}

/// range 的迭代项：数组 (下标, 元素)、map (键, 值)、字符串 (下标, 字符)
fn iterate(target: &Value) -> Result<Vec<(Value, Value)>, ExecError> {
    let items = match target {
        Value::Int(n) => (0..*n).map(|i| (Value::Int(i), Value::Int(i))).collect(),
        Value::Object(Object::Array(a)) => a
            .items()
            .into_iter()
            .enumerate()
            .map(|(i, item)| (Value::Int(i as i64), Value::Object(item)))
            .collect(),
        Value::Object(Object::Map(m)) => m
            .entries()
            .into_iter()
            .map(|(k, item)| (Value::Object(Object::String(k)), Value::Object(item)))
            .collect(),
        Value::Object(Object::String(s)) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (Value::Int(i as i64), Value::Object(Object::String(c.to_string()))))
            .collect(),
        Value::Object(Object::Nil) => Vec::new(),
        other => return Err(ExecError::NotIterable(other.type_name().to_string())),
    };
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::funcs::BUILTINS;
    use crate::runtime::MapBuilder;
    use crate::tpl::parser::parse_template;

    fn render(src: &str, data: Object) -> Result<String, ExecError> {
        let tpl = parse_template("t", src, &|n| BUILTINS.contains_key(n)).unwrap();
        let mut out = String::new();
        execute(&tpl, &BUILTINS, data, 32, &mut out)?;
        Ok(out)
    }

    fn data() -> Object {
        MapBuilder::new()
            .field("name", &"Bob")
            .field("items", &vec!["a", "b"])
            .field("empty", &Vec::<i32>::new())
            .build()
    }

    #[test]
    fn test_render_text_and_vars() {
        assert_eq!(render("hi {{$name}}!", data()).unwrap(), "hi Bob!");
        assert_eq!(render("{{.name}}", data()).unwrap(), "Bob");
        assert_eq!(render("{{$missing}}", data()).unwrap(), "");
    }

    #[test]
    fn test_render_decl_and_assign() {
        let out = render("{{$x := 1}}{{if true}}{{$x = __op__add $x 2}}{{end}}{{$x}}", data()).unwrap();
        assert_eq!(out, "3");
    }

    #[test]
    fn test_render_range() {
        let out = render("{{range $i, $v := $items}}{{$i}}={{$v}};{{end}}", data()).unwrap();
        assert_eq!(out, "0=a;1=b;");
        let out = render("{{range $v := $empty}}x{{else}}none{{end}}", data()).unwrap();
        assert_eq!(out, "none");
        assert!(matches!(render("{{range true}}{{end}}", data()), Err(ExecError::NotIterable(_))));
    }

    #[test]
    fn test_render_if_chain() {
        let src = "{{if __op__eql $name \"x\"}}1{{else if __op__eql $name \"Bob\"}}2{{else}}3{{end}}";
        assert_eq!(render(src, data()).unwrap(), "2");
    }

    #[test]
    fn test_render_pipe_and_fields() {
        assert_eq!(render("{{$items.length}}", data()).unwrap(), "2");
        assert_eq!(render("{{$items.join \"-\"}}", data()).unwrap(), "a-b");
        assert_eq!(render("{{\"<b>\" | __pug__html}}", data()).unwrap(), "&lt;b&gt;");
    }

    #[test]
    fn test_render_lazy_forms() {
        // 未选中的分支不会执行
        assert_eq!(render("{{__if true 1 (__throw \"boom\")}}", data()).unwrap(), "1");
        assert_eq!(render("{{__op__or $name (__throw \"boom\")}}", data()).unwrap(), "Bob");
        assert_eq!(render("{{__op__and $missing (__throw \"boom\")}}", data()).unwrap(), "");
    }

    #[test]
    fn test_render_templates() {
        let src = r#"{{define "greet"}}<{{.}}:{{$name}}>{{end}}{{template "greet" 1}}{{$b := "greet"}}{{template $b 2}}{{$n := null}}{{template $n}}"#;
        assert_eq!(render(src, data()).unwrap(), "<1:Bob><2:Bob>");
        assert!(matches!(render(r#"{{template "nope"}}"#, data()), Err(ExecError::UndefinedTemplate(_))));
    }

    #[test]
    fn test_render_depth_limit() {
        let src = r#"{{define "loop"}}{{template "loop"}}{{end}}{{template "loop"}}"#;
        assert!(matches!(render(src, data()), Err(ExecError::DepthExceeded(32))));
    }

    #[test]
    fn test_render_call_errors() {
        assert!(matches!(render("{{__throw \"bad\"}}", data()), Err(ExecError::Call { .. })));
        assert!(matches!(render("{{$name 1}}", data()), Err(ExecError::NotAFunction(_))));
    }
}
