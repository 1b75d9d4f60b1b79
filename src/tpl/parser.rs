use crate::error::CompileError;
use crate::tpl::ast::{Command, DeclKind, Node, Operand, Pipeline, Template, TemplateName};
use std::collections::HashMap;
use std::sync::Arc;

enum TagFrame {
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        cond: Pipeline,
        in_else: bool,
    },
    Range {
        key: Option<String>,
        value: Option<String>,
        pipe: Pipeline,
        body: Option<Vec<Node>>,
    },
    Define {
        name: String,
    },
}

/// 解析宿主模板源码。`known` 判断函数名是否存在，未知函数在解析期报错。
pub fn parse_template(
    name: &str,
    src: &str,
    known: &dyn Fn(&str) -> bool,
) -> Result<Template, CompileError> {
    let mut nodes_stack: Vec<Vec<Node>> = vec![Vec::new()];
    let mut tag_stack: Vec<TagFrame> = Vec::new();
    let mut defines: HashMap<String, Arc<Vec<Node>>> = HashMap::new();
    let mut pos = 0;
    let mut trim_next = false;

    let err = |at: usize, msg: String| {
        let line = 1 + src[..at.min(src.len())].matches('\n').count();
        CompileError::Syntax(format!("{}:{}: {}", name, line, msg))
    };

    while pos <= src.len() {
        let rest = &src[pos..];
        let Some(mut open) = rest.find("{{") else {
            let text = if trim_next { rest.trim_start() } else { rest };
            append_text(top(&mut nodes_stack), text);
            break;
        };
        // `{{{` 中前面多出的 `{` 属于文本，动作从最后一个 `{{` 开始
        while rest[open + 2..].starts_with('{') {
            open += 1;
        }

        let after = &rest[open + 2..];
        let left_trim = after.starts_with('-') && after[1..].starts_with(char::is_whitespace);
        let body_start = pos + open + 2 + usize::from(left_trim);
        let end = find_action_end(src, body_start).ok_or_else(|| err(body_start, "unclosed action".into()))?;

        let mut inner = &src[body_start..end];
        let right_trim = inner.ends_with('-') && inner[..inner.len() - 1].ends_with(char::is_whitespace);
        if right_trim {
            inner = &inner[..inner.len() - 1];
        }

        // 1. 前导文本（处理 `{{-` / `-}}` 的空白裁剪）
        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        if left_trim {
            text = text.trim_end();
        }
        append_text(top(&mut nodes_stack), text);
        trim_next = right_trim;
        pos = end + 2;

        let inner = inner.trim();
        // 2. 注释
        if inner.starts_with("/*") && inner.ends_with("*/") {
            continue;
        }

        let toks = lex_action(inner).map_err(|m| err(body_start, m))?;
        if toks.is_empty() {
            return Err(err(body_start, "missing value for command".into()));
        }
        let keyword = match &toks[0].tok {
            ATok::Ident(id) => id.as_str(),
            _ => "",
        };
        let mut cur = Cursor {
            toks: &toks,
            pos: 1,
            known,
        };

        match keyword {
            "if" => {
                let cond = cur.pipeline(true).map_err(|m| err(body_start, m))?;
                cur.finish().map_err(|m| err(body_start, m))?;
                tag_stack.push(TagFrame::If {
                    branches: Vec::new(),
                    cond,
                    in_else: false,
                });
                nodes_stack.push(Vec::new());
            }
            "else" => {
                let else_if = matches!(toks.get(1).map(|t| &t.tok), Some(ATok::Ident(id)) if id == "if");
                let body = pop_body(&mut nodes_stack);
                match tag_stack.last_mut() {
                    Some(TagFrame::If {
                        branches,
                        cond,
                        in_else,
                    }) if !*in_else => {
                        branches.push((std::mem::take(cond), body));
                        if else_if {
                            cur.pos = 2;
                            *cond = cur.pipeline(true).map_err(|m| err(body_start, m))?;
                            cur.finish().map_err(|m| err(body_start, m))?;
                        } else {
                            cur.finish().map_err(|m| err(body_start, m))?;
                            *in_else = true;
                        }
                    }
                    Some(TagFrame::Range { body: slot, .. }) if slot.is_none() && !else_if => {
                        cur.finish().map_err(|m| err(body_start, m))?;
                        *slot = Some(body);
                    }
                    _ => return Err(err(body_start, "unexpected {{else}}".into())),
                }
                nodes_stack.push(Vec::new());
            }
            "end" => {
                cur.finish().map_err(|m| err(body_start, m))?;
                let body = pop_body(&mut nodes_stack);
                let node = match tag_stack.pop() {
                    Some(TagFrame::If {
                        mut branches,
                        cond,
                        in_else,
                    }) => {
                        if in_else {
                            Node::If {
                                branches,
                                else_body: Some(body),
                            }
                        } else {
                            branches.push((cond, body));
                            Node::If {
                                branches,
                                else_body: None,
                            }
                        }
                    }
                    Some(TagFrame::Range {
                        key,
                        value,
                        pipe,
                        body: main,
                    }) => {
                        let (body, else_body) = match main {
                            Some(main) => (main, Some(body)),
                            None => (body, None),
                        };
                        Node::Range {
                            key,
                            value,
                            pipe,
                            body,
                            else_body,
                        }
                    }
                    Some(TagFrame::Define { name }) => {
                        // 同名定义保留第一个
                        defines.entry(name).or_insert_with(|| Arc::new(body));
                        continue;
                    }
                    None => return Err(err(body_start, "unexpected {{end}}".into())),
                };
                top(&mut nodes_stack).push(node);
            }
            "range" => {
                let (key, value) = cur.range_vars().map_err(|m| err(body_start, m))?;
                let pipe = cur.pipeline(false).map_err(|m| err(body_start, m))?;
                cur.finish().map_err(|m| err(body_start, m))?;
                tag_stack.push(TagFrame::Range {
                    key,
                    value,
                    pipe,
                    body: None,
                });
                nodes_stack.push(Vec::new());
            }
            "define" => {
                if !tag_stack.is_empty() {
                    return Err(err(body_start, "define must be at top level".into()));
                }
                let Some(ATok::Str(define_name)) = toks.get(1).map(|t| &t.tok) else {
                    return Err(err(body_start, "define requires a quoted name".into()));
                };
                cur.pos = 2;
                cur.finish().map_err(|m| err(body_start, m))?;
                tag_stack.push(TagFrame::Define {
                    name: define_name.clone(),
                });
                nodes_stack.push(Vec::new());
            }
            "template" => {
                let target = match toks.get(1).map(|t| &t.tok) {
                    Some(ATok::Str(s)) => TemplateName::Literal(s.clone()),
                    Some(ATok::Var(v)) => TemplateName::Var(v.clone()),
                    _ => return Err(err(body_start, "template requires a name".into())),
                };
                cur.pos = 2;
                let arg = if cur.at_end() {
                    None
                } else {
                    Some(cur.pipeline(false).map_err(|m| err(body_start, m))?)
                };
                cur.finish().map_err(|m| err(body_start, m))?;
                top(&mut nodes_stack).push(Node::Template { name: target, arg });
            }
            _ => {
                cur.pos = 0;
                let pipe = cur.pipeline(true).map_err(|m| err(body_start, m))?;
                cur.finish().map_err(|m| err(body_start, m))?;
                top(&mut nodes_stack).push(Node::Action(pipe));
            }
        }
    }

    if !tag_stack.is_empty() {
        return Err(err(src.len(), "unexpected EOF".into()));
    }

    Ok(Template {
        name: name.to_string(),
        root: Arc::new(nodes_stack.pop().unwrap_or_default()),
        defines,
    })
}

fn top(stack: &mut Vec<Vec<Node>>) -> &mut Vec<Node> {
    if stack.is_empty() {
        stack.push(Vec::new());
    }
    let last = stack.len() - 1;
    &mut stack[last]
}

fn pop_body(stack: &mut Vec<Vec<Node>>) -> Vec<Node> {
    if stack.len() > 1 {
        stack.pop().unwrap_or_default()
    } else {
        Vec::new()
    }
}

fn append_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last_text)) = nodes.last_mut() {
        last_text.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// 找到动作结束的 `}}`，跳过字符串字面量与注释
fn find_action_end(src: &str, start: usize) -> Option<usize> {
    let b = src.as_bytes();
    let mut i = start;
    let trimmed = src[start..].trim_start();
    if trimmed.starts_with("/*") {
        let comment = start + (src.len() - start - trimmed.len());
        let close = src[comment + 2..].find("*/")? + comment + 4;
        return src[close..].find("}}").map(|e| close + e);
    }
    while i + 1 < b.len() {
        match b[i] {
            b'"' => {
                i += 1;
                while i < b.len() && b[i] != b'"' {
                    if b[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < b.len() && b[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if b[i + 1] == b'}' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum ATok {
    Str(String),
    Int(i64),
    Float(f64),
    Var(String),
    Field(String),
    Dot,
    Ident(String),
    LParen,
    RParen,
    Pipe,
    Declare,
    Assign,
    Comma,
}

#[derive(Debug, Clone)]
struct Lexed {
    tok: ATok,
    /// 前面是否有空白；字段链必须紧贴
    spaced: bool,
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn lex_action(src: &str) -> Result<Vec<Lexed>, String> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();
    let mut spaced = true;

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            spaced = true;
            chars.next();
            continue;
        }
        let rest = &src[i..];
        let (tok, len) = match c {
            '(' => (ATok::LParen, 1),
            ')' => (ATok::RParen, 1),
            '|' => (ATok::Pipe, 1),
            ',' => (ATok::Comma, 1),
            ':' if rest.starts_with(":=") => (ATok::Declare, 2),
            '=' => (ATok::Assign, 1),
            '"' => lex_string(rest)?,
            '`' => {
                let end = rest[1..].find('`').ok_or("unterminated raw string")?;
                (ATok::Str(rest[1..end + 1].to_string()), end + 2)
            }
            '$' => {
                let len = 1 + rest[1..].find(|ch: char| !is_ident_char(ch)).unwrap_or(rest.len() - 1);
                (ATok::Var(rest[1..len].to_string()), len)
            }
            '.' => {
                let len = 1 + rest[1..].find(|ch: char| !is_ident_char(ch)).unwrap_or(rest.len() - 1);
                if len == 1 {
                    (ATok::Dot, 1)
                } else if rest[1..].starts_with(|ch: char| ch.is_ascii_digit()) {
                    lex_number(rest)?
                } else {
                    (ATok::Field(rest[1..len].to_string()), len)
                }
            }
            c if c.is_ascii_digit() || ((c == '-' || c == '+') && rest[1..].starts_with(|ch: char| ch.is_ascii_digit() || ch == '.')) => {
                lex_number(rest)?
            }
            c if is_ident_char(c) => {
                let len = rest.find(|ch: char| !is_ident_char(ch)).unwrap_or(rest.len());
                (ATok::Ident(rest[..len].to_string()), len)
            }
            other => return Err(format!("unexpected {:?} in command", other)),
        };
        out.push(Lexed { tok, spaced });
        spaced = false;
        let end = i + len;
        while chars.peek().is_some_and(|&(j, _)| j < end) {
            chars.next();
        }
    }
    Ok(out)
}

fn lex_number(rest: &str) -> Result<(ATok, usize), String> {
    let len = rest
        .char_indices()
        .find(|&(j, ch)| {
            !(ch.is_ascii_alphanumeric()
                || ch == '.'
                || (j == 0 && (ch == '-' || ch == '+'))
                || ((ch == '-' || ch == '+') && rest[..j].ends_with(['e', 'E'])))
        })
        .map(|(j, _)| j)
        .unwrap_or(rest.len());
    let text = &rest[..len];
    if let Ok(i) = text.parse::<i64>() {
        return Ok((ATok::Int(i), len));
    }
    text.parse::<f64>()
        .map(|f| (ATok::Float(f), len))
        .map_err(|_| format!("bad number syntax: {:?}", text))
}

fn lex_string(rest: &str) -> Result<(ATok, usize), String> {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((ATok::Str(out), i + 1)),
            '\\' => {
                let (_, esc) = chars.next().ok_or("unterminated quoted string")?;
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'a' => out.push('\u{7}'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    'x' | 'u' | 'U' => {
                        let n = match esc {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let hex: String = chars.by_ref().take(n).map(|(_, h)| h).collect();
                        let ch = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| format!("invalid escape \\{}{}", esc, hex))?;
                        out.push(ch);
                    }
                    other => out.push(other),
                }
            }
            c => out.push(c),
        }
    }
    Err("unterminated quoted string".into())
}

struct Cursor<'a> {
    toks: &'a [Lexed],
    pos: usize,
    known: &'a dyn Fn(&str) -> bool,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<&ATok> {
        self.toks.get(self.pos).map(|t| &t.tok)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(format!("unexpected {:?} in action", t)),
        }
    }

    /// `range $k, $v :=` / `range $v :=`
    fn range_vars(&mut self) -> Result<(Option<String>, Option<String>), String> {
        let toks: Vec<&ATok> = self.toks[self.pos..].iter().take(4).map(|t| &t.tok).collect();
        match toks.as_slice() {
            [ATok::Var(k), ATok::Comma, ATok::Var(v), ATok::Declare, ..] => {
                self.pos += 4;
                Ok((Some(k.clone()), Some(v.clone())))
            }
            [ATok::Var(v), ATok::Declare, ..] => {
                self.pos += 2;
                Ok((None, Some(v.clone())))
            }
            _ => Ok((None, None)),
        }
    }

    fn pipeline(&mut self, allow_decl: bool) -> Result<Pipeline, String> {
        let mut pipe = Pipeline::default();
        if allow_decl {
            let toks: Vec<&ATok> = self.toks[self.pos..].iter().take(2).map(|t| &t.tok).collect();
            if let [ATok::Var(name), op @ (ATok::Declare | ATok::Assign)] = toks.as_slice() {
                let kind = if **op == ATok::Declare {
                    DeclKind::Declare
                } else {
                    DeclKind::Assign
                };
                pipe.decl = Some((name.clone(), kind));
                self.pos += 2;
            }
        }
        loop {
            pipe.cmds.push(self.command()?);
            if self.peek() == Some(&ATok::Pipe) {
                self.pos += 1;
                continue;
            }
            break;
        }
        Ok(pipe)
    }

    fn command(&mut self) -> Result<Command, String> {
        let mut args = Vec::new();
        while let Some(tok) = self.peek() {
            if matches!(tok, ATok::Pipe | ATok::RParen) {
                break;
            }
            args.push(self.operand()?);
        }
        if args.is_empty() {
            return Err("missing value for command".into());
        }
        Ok(Command { args })
    }

    fn fields(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let Some(Lexed {
            tok: ATok::Field(f),
            spaced: false,
        }) = self.toks.get(self.pos)
        {
            fields.push(f.clone());
            self.pos += 1;
        }
        fields
    }

    fn operand(&mut self) -> Result<Operand, String> {
        let Some(tok) = self.peek().cloned() else {
            return Err("missing operand".into());
        };
        self.pos += 1;
        let op = match tok {
            ATok::Str(s) => Operand::Str(s),
            ATok::Int(i) => Operand::Int(i),
            ATok::Float(f) => Operand::Float(f),
            ATok::Ident(id) => match id.as_str() {
                "true" => Operand::Bool(true),
                "false" => Operand::Bool(false),
                "nil" => Operand::Nil,
                _ if (self.known)(&id) => Operand::Func(id),
                _ => return Err(format!("function {:?} not defined", id)),
            },
            ATok::Var(name) => Operand::Var {
                name,
                fields: self.fields(),
            },
            ATok::Dot => Operand::Dot(Vec::new()),
            ATok::Field(f) => {
                let mut fields = vec![f];
                fields.extend(self.fields());
                Operand::Dot(fields)
            }
            ATok::LParen => {
                let pipe = self.pipeline(false)?;
                if self.peek() != Some(&ATok::RParen) {
                    return Err("unclosed left paren".into());
                }
                self.pos += 1;
                Operand::Sub {
                    pipe: Box::new(pipe),
                    fields: self.fields(),
                }
            }
            other => return Err(format!("unexpected {:?} in operand", other)),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "f" | "g" | "__op__add")
    }

    fn parse(src: &str) -> Template {
        parse_template("t", src, &known).unwrap()
    }

    #[test]
    fn test_parse_simple_text() {
        let t = parse("hello world");
        assert_eq!(*t.root, vec![Node::Text("hello world".into())]);
    }

    #[test]
    fn test_parse_trim_markers() {
        let t = parse("a  {{- 1 -}}  b");
        assert_eq!(t.root.len(), 3);
        assert_eq!(t.root[0], Node::Text("a".into()));
        assert_eq!(t.root[2], Node::Text("b".into()));
    }

    #[test]
    fn test_parse_brace_before_action() {
        let t = parse("a{{{$x}}}b");
        assert_eq!(t.root.len(), 3);
        assert_eq!(t.root[0], Node::Text("a{".into()));
        assert!(matches!(&t.root[1], Node::Action(_)));
        assert_eq!(t.root[2], Node::Text("}b".into()));

        let t = parse("{{{{- $x}}");
        assert_eq!(t.root[0], Node::Text("{{".into()));
    }

    #[test]
    fn test_parse_comment() {
        let t = parse("a{{/* x }} */}}b");
        assert_eq!(*t.root, vec![Node::Text("ab".into())]);
    }

    #[test]
    fn test_parse_pipeline_and_decl() {
        let t = parse(r#"{{$x := f 1 "a}}" | g}}"#);
        let Node::Action(pipe) = &t.root[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.decl, Some(("x".into(), DeclKind::Declare)));
        assert_eq!(pipe.cmds.len(), 2);
        assert_eq!(
            pipe.cmds[0].args,
            vec![
                Operand::Func("f".into()),
                Operand::Int(1),
                Operand::Str("a}}".into())
            ]
        );
    }

    #[test]
    fn test_parse_fields() {
        let t = parse("{{$a.b.c (f).d .e}}");
        let Node::Action(pipe) = &t.root[0] else {
            panic!("expected action");
        };
        let args = &pipe.cmds[0].args;
        assert_eq!(
            args[0],
            Operand::Var {
                name: "a".into(),
                fields: vec!["b".into(), "c".into()]
            }
        );
        assert!(matches!(&args[1], Operand::Sub { fields, .. } if fields == &vec!["d".to_string()]));
        assert_eq!(args[2], Operand::Dot(vec!["e".into()]));
    }

    #[test]
    fn test_parse_if_else_chain() {
        let t = parse("{{if 1}}a{{else if 2}}b{{else}}c{{end}}");
        let Node::If {
            branches,
            else_body,
        } = &t.root[0]
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(else_body.as_deref(), Some(&[Node::Text("c".into())][..]));
    }

    #[test]
    fn test_parse_range_and_define() {
        let t = parse(r#"{{define "x"}}X{{end}}{{range $k, $v := .}}{{$v}}{{else}}none{{end}}{{template "x" 1}}"#);
        assert!(t.defines.contains_key("x"));
        assert!(matches!(
            &t.root[0],
            Node::Range { key: Some(k), else_body: Some(_), .. } if k == "k"
        ));
        assert!(matches!(&t.root[1], Node::Template { arg: Some(_), .. }));
    }

    #[test]
    fn test_parse_errors() {
        for src in ["{{if 1}}a", "{{end}}", "{{unknown 1}}", "{{f", "{{(f}}"] {
            assert!(parse_template("t", src, &known).is_err(), "{}", src);
        }
    }

    #[test]
    fn test_parse_numbers() {
        let t = parse("{{f -3 1.5 2e3}}");
        let Node::Action(pipe) = &t.root[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.cmds[0].args[1], Operand::Int(-3));
        assert_eq!(pipe.cmds[0].args[2], Operand::Float(1.5));
        assert_eq!(pipe.cmds[0].args[3], Operand::Float(2000.0));
    }
}
