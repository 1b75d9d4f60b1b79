use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Action(Pipeline),
    If {
        /// `if` 与后续 `else if` 的条件和分支
        branches: Vec<(Pipeline, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
    Range {
        key: Option<String>,
        value: Option<String>,
        pipe: Pipeline,
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },
    Template {
        name: TemplateName,
        arg: Option<Pipeline>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateName {
    Literal(String),
    /// `{{template $block}}`，运行时取变量值作为模板名
    Var(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `$x := ...`
    Declare,
    /// `$x = ...`
    Assign,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub decl: Option<(String, DeclKind)>,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Func(String),
    /// `$name.f1.f2`；`$` 本身的 name 为空串
    Var { name: String, fields: Vec<String> },
    /// `.` 或 `.f1.f2`
    Dot(Vec<String>),
    Sub {
        pipe: Box<Pipeline>,
        fields: Vec<String>,
    },
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
}

/// 解析后的模板：主体加上 `define` 出来的子模板
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub name: String,
    pub root: Arc<Vec<Node>>,
    pub defines: HashMap<String, Arc<Vec<Node>>>,
}

impl Template {
    pub fn lookup(&self, name: &str) -> Option<&Arc<Vec<Node>>> {
        if name == self.name {
            return Some(&self.root);
        }
        self.defines.get(name)
    }
}

/// 以宿主模板语言的字符串字面量形式输出
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("a\"b"), r#""a\"b""#);
        assert_eq!(quote("x\ny"), r#""x\ny""#);
        assert_eq!(quote("\u{1}"), r#""\u0001""#);
    }
}
