//! 把内嵌的 JS 表达式转成宿主模板源码

use super::render_state::RenderState;
use crate::error::CompileError;
use crate::js::{self, Expr, ParseError, ParseErrorKind, Stmt, UnaryOp};
use crate::runtime::object::html_escape;
use crate::tpl::quote;

/// 代码节点子块的占位标识符
pub(crate) const BLOCK_MARKER: &str = "__pug_block__";
/// 调试模式下保持行号稳定的空白控制标记
pub(crate) const DEBUG_MARKER: &str = "     {{- \"\" -}}\n";

enum Part {
    Lit(String),
    Expr(String),
}

impl RenderState {
    /// 转换一段 JS 源码。
    ///
    /// `raw_statement` 为真时按语句解析（`{...}` 是代码块），否则按单个值解析
    /// （`{...}` 是对象字面量）。`wrap` 决定是否输出成完整的 `{{ }}` 动作。
    pub fn js_expr(
        &mut self,
        expr: &str,
        wrap: bool,
        raw_statement: bool,
    ) -> Result<String, CompileError> {
        if expr.trim().is_empty() {
            return Ok(String::new());
        }

        let stmts = if raw_statement {
            js::parse_program(expr).map_err(|e| parse_error(expr, e))?
        } else {
            match js::parse_expression(expr).map_err(|e| parse_error(expr, e))? {
                Some(e) => vec![Stmt::Return(Some(e))],
                None => return Ok(String::new()),
            }
        };

        let separate = self.debug && wrap && stmts.len() > 1;
        let mut out = String::new();
        for stmt in &stmts {
            out.push_str(&self.statement(stmt, wrap)?);
            if separate {
                out.push_str(DEBUG_MARKER);
            }
        }
        Ok(out)
    }

    fn statement(&mut self, stmt: &Stmt, wrap: bool) -> Result<String, CompileError> {
        match stmt {
            Stmt::Expr(e) => {
                if self.discard && wrap && !has_effect(e) {
                    let value = self.expr(e, false)?;
                    return Ok(format!("{{{{__void {} -}}}}", value));
                }
                self.expr(e, wrap)
            }
            Stmt::Return(Some(e)) => self.expr(e, wrap),
            Stmt::Return(None) | Stmt::Empty => Ok(String::new()),
            Stmt::Var(decls) => decls
                .iter()
                .map(|(name, init)| self.declare(name, init.as_ref(), wrap))
                .collect(),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                let mut out = format!("{{{{if {}}}}}", self.expr(test, false)?);
                out.push_str(&self.statement(consequent, true)?);
                if let Some(alternate) = alternate {
                    let branch = self.statement(alternate, true)?;
                    if !branch.is_empty() && branch != "{{null}}" {
                        out.push_str("{{else}}");
                        out.push_str(&branch);
                    }
                }
                out.push_str("{{end}}");
                Ok(out)
            }
            Stmt::ForIn { var, object, body } => {
                let mut out = format!(
                    "{{{{range {} := (__op__keys {})}}}}",
                    var_name(var),
                    self.expr(object, false)?
                );
                out.push_str(&self.statement(body, true)?);
                out.push_str("{{end}}");
                Ok(out)
            }
            Stmt::Throw(e) => {
                let value = self.expr(e, false)?;
                Ok(if wrap {
                    format!("{{{{__throw {}}}}}", value)
                } else {
                    format!("(__throw {})", value)
                })
            }
            Stmt::Block(list) => list.iter().map(|s| self.statement(s, wrap)).collect(),
        }
    }

    fn declare(&mut self, name: &str, init: Option<&Expr>, wrap: bool) -> Result<String, CompileError> {
        let value = match init {
            Some(e) => self.expr(e, false)?,
            None => "null".to_string(),
        };
        let decl = format!("{} := {}", var_name(name), value);
        Ok(if wrap { action(&decl) } else { decl })
    }

    fn expr(&mut self, expr: &Expr, wrap: bool) -> Result<String, CompileError> {
        let value = match expr {
            Expr::Ident(name) => {
                if name == BLOCK_MARKER
                    && let Some(block) = &self.code_block
                {
                    return Ok(block.clone());
                }
                self.ident(name)
            }
            Expr::Str(s) => return self.string(s, wrap),
            Expr::Number { value, float } => {
                // 数字与布尔在输出位置直接作为文本
                return Ok(if *float {
                    format!("{:?}", value)
                } else {
                    format!("{}", *value as i64)
                });
            }
            Expr::Bool(b) => return Ok(b.to_string()),
            Expr::Null => {
                return Ok(if wrap { "{{null}}" } else { "null" }.to_string());
            }
            Expr::Array(items) => format!("(__op__array{})", self.list(items)?),
            Expr::Object(pairs) => {
                let mut out = String::from("(__op__map");
                for (key, value) in pairs {
                    out.push(' ');
                    out.push_str(&quote(key));
                    out.push(' ');
                    out.push_str(&self.expr(value, false)?);
                }
                out.push(')');
                out
            }
            Expr::Dot(object, name) => self.member(object, name)?,
            Expr::Bracket(object, member) => format!(
                "(__pug__index {} {})",
                self.expr(object, false)?,
                self.expr(member, false)?
            ),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.expr(test, false)?;
                let consequent = self.branch(consequent.as_deref())?;
                let alternate = self.branch(alternate.as_deref())?;
                format!("(__if ({}) ({}) ({}))", test, consequent, alternate)
            }
            Expr::Binary { op, left, right } => format!(
                "({} {} {})",
                op.func_name(),
                self.expr(left, false)?,
                self.expr(right, false)?
            ),
            Expr::Unary {
                op: UnaryOp::Delete,
                operand,
            } => match operand.as_ref() {
                Expr::Dot(object, name) => {
                    format!("(__op__delete {} {})", self.expr(object, false)?, quote(name))
                }
                Expr::Bracket(object, member) => format!(
                    "(__op__delete {} {})",
                    self.expr(object, false)?,
                    self.expr(member, false)?
                ),
                _ => "false".to_string(),
            },
            Expr::Unary { op, operand } => {
                format!("({} {})", op.func_name(), self.expr(operand, false)?)
            }
            Expr::Update { op, target } => {
                return match target.as_ref() {
                    Expr::Ident(name) => {
                        let var = var_name(name);
                        Ok(if wrap {
                            action(&format!("{} = {} {}", var, op.func_name(), var))
                        } else {
                            format!("({} {})", op.func_name(), var)
                        })
                    }
                    Expr::Dot(..) | Expr::Bracket(..) => {
                        let current = self.expr(target, false)?;
                        let (object, key) = self.member_parts(target)?;
                        let assign = format!(
                            "__assign {} {} ({} {})",
                            object,
                            key,
                            op.func_name(),
                            current
                        );
                        Ok(if wrap { action(&assign) } else { format!("({})", assign) })
                    }
                    other => Err(CompileError::UnsupportedExpression(format!(
                        "update of {:?}",
                        other
                    ))),
                };
            }
            Expr::Call { callee, args } => {
                format!("({}{})", self.expr(callee, false)?, self.list(args)?)
            }
            Expr::New { args, .. } => format!("(__op__array{})", self.list(args)?),
            Expr::Assign { op, target, value } => {
                return self.assign(*op, target, value, wrap);
            }
            Expr::Sequence(items) => format!("(__op__array{})", self.list(items)?),
        };

        Ok(if wrap { self.wrap_value(&value) } else { value })
    }

    fn ident(&self, name: &str) -> String {
        match name {
            "range" => "__Range".to_string(),
            "undefined" => "null".to_string(),
            _ if self.is_known(name) => name.to_string(),
            _ => var_name(name),
        }
    }

    fn string(&mut self, s: &str, wrap: bool) -> Result<String, CompileError> {
        let parts = split_interpolation(s);

        if let [Part::Lit(text)] = parts.as_slice() {
            if !wrap {
                return Ok(quote(text));
            }
            let text = if self.rawmode {
                text.clone()
            } else {
                html_escape(text)
            };
            // 文本里的 `{{` 会被当成动作，只能以字符串字面量输出
            return Ok(if text.contains("{{") {
                format!("{{{{{}}}}}", quote(&text))
            } else {
                text
            });
        }

        let mut out = String::from("(__str");
        for part in &parts {
            match part {
                Part::Lit(text) if text.is_empty() => continue,
                Part::Lit(text) => {
                    out.push(' ');
                    out.push_str(&quote(text));
                }
                Part::Expr(src) => {
                    let value = self.js_expr(src, false, false)?;
                    out.push(' ');
                    out.push_str(if value.is_empty() { "null" } else { &value });
                }
            }
        }
        out.push(')');
        Ok(if wrap { self.wrap_value(&out) } else { out })
    }

    fn member(&mut self, object: &Expr, name: &str) -> Result<String, CompileError> {
        let left = self.expr(object, false)?;
        if !is_field_name(name) {
            return Ok(format!("(__pug__index {} {})", left, quote(name)));
        }
        Ok(if left.starts_with('$') || left.starts_with('(') {
            format!("{}.{}", left, name)
        } else {
            format!("({}).{}", left, name)
        })
    }

    /// 成员赋值的目标对象与键
    fn member_parts(&mut self, target: &Expr) -> Result<(String, String), CompileError> {
        match target {
            Expr::Dot(object, name) => Ok((self.expr(object, false)?, quote(name))),
            Expr::Bracket(object, member) => {
                Ok((self.expr(object, false)?, self.expr(member, false)?))
            }
            other => Err(CompileError::UnsupportedExpression(format!(
                "assignment to {:?}",
                other
            ))),
        }
    }

    fn assign(
        &mut self,
        op: Option<js::BinOp>,
        target: &Expr,
        value: &Expr,
        wrap: bool,
    ) -> Result<String, CompileError> {
        let mut rhs = self.expr(value, false)?;
        if let Some(op) = op {
            let current = self.expr(target, false)?;
            rhs = format!("({} {} {})", op.func_name(), current, rhs);
        }

        match target {
            // 变量赋值只能是独立的动作，不能出现在命令参数里
            Expr::Ident(name) if !wrap => Err(CompileError::UnsupportedExpression(format!(
                "assignment to `{}` used as a value",
                name
            ))),
            Expr::Ident(name) => Ok(action(&format!("{} = {}", var_name(name), rhs))),
            _ => {
                let (object, key) = self.member_parts(target)?;
                let assign = format!("__assign {} {} {}", object, key, rhs);
                Ok(if wrap { action(&assign) } else { format!("({})", assign) })
            }
        }
    }

    fn branch(&mut self, expr: Option<&Expr>) -> Result<String, CompileError> {
        match expr {
            Some(e) => self.expr(e, false),
            None => Ok("null".to_string()),
        }
    }

    fn list(&mut self, items: &[Expr]) -> Result<String, CompileError> {
        let mut out = String::new();
        for item in items {
            out.push(' ');
            out.push_str(&self.expr(item, false)?);
        }
        Ok(out)
    }

    fn wrap_value(&self, value: &str) -> String {
        if self.rawmode {
            format!("{{{{{}}}}}", value)
        } else {
            format!("{{{{{} | __pug__html}}}}", value)
        }
    }
}

/// JS 标识符对应的模板变量名，模板变量里不能出现 `$`
pub(crate) fn var_name(name: &str) -> String {
    format!("${}", name.replace('$', "__dollar_"))
}

/// 无输出的动作，吃掉后面的空白
fn action(body: &str) -> String {
    format!("{{{{ {} -}}}}", body)
}

/// 赋值类表达式本身不输出值，子块占位符输出的是编译好的模板
fn has_effect(e: &Expr) -> bool {
    match e {
        Expr::Assign { .. } | Expr::Update { .. } => true,
        Expr::Ident(name) => name == BLOCK_MARKER,
        _ => false,
    }
}

fn parse_error(expr: &str, err: ParseError) -> CompileError {
    match err.kind {
        ParseErrorKind::Unsupported => {
            CompileError::UnsupportedStatement(format!("{} in `{}`", err.message, expr))
        }
        ParseErrorKind::Syntax => CompileError::Expression {
            expr: expr.to_string(),
            message: err.to_string(),
        },
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// 单遍扫描 `${...}`：`\$` 转义，遇到第一个 `}` 即结束，不支持嵌套大括号
fn split_interpolation(s: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut lit = String::new();
    let mut chars = s.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '$'))) => {
                chars.next();
                lit.push('$');
            }
            '$' if matches!(chars.peek(), Some((_, '{'))) => {
                let start = i + 2;
                let Some(len) = s[start..].find('}') else {
                    lit.push(c);
                    continue;
                };
                let end = start + len;
                parts.push(Part::Lit(std::mem::take(&mut lit)));
                parts.push(Part::Expr(s[start..end].to_string()));
                while chars.next_if(|(j, _)| *j <= end).is_some() {}
            }
            c => lit.push(c),
        }
    }
    parts.push(Part::Lit(lit));
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn state() -> RenderState {
        let known: HashSet<String> = ["foo", "null", "__Range"].iter().map(|s| s.to_string()).collect();
        RenderState::new(Arc::new(known), false)
    }

    fn js(expr: &str, wrap: bool, raw: bool) -> String {
        state().js_expr(expr, wrap, raw).unwrap()
    }

    #[test]
    fn test_modes() {
        assert_eq!(js("var a = 1", true, true), "{{ $a := 1 -}}");
        assert_eq!(js("var a = 1", false, true), "$a := 1");
        assert_eq!(
            js(r#"{"key": "value"}"#, true, false),
            r#"{{(__op__map "key" "value") | __pug__html}}"#
        );
        assert_eq!(js(r#"{"key": "value"}"#, false, false), r#"(__op__map "key" "value")"#);
        assert_eq!(js("", true, true), "");

        let mut s = state();
        assert!(matches!(
            s.js_expr("[1,2,", false, true),
            Err(CompileError::Expression { .. })
        ));
        assert!(s.js_expr("var a = 1", false, false).is_err());
    }

    #[test]
    fn test_identifier() {
        assert_eq!(js("testknown", true, true), "{{$testknown | __pug__html}}");
        assert_eq!(js("foo", false, false), "foo");
        assert_eq!(js("range", false, false), "__Range");
        assert_eq!(js("undefined", false, false), "null");

        let mut s = state();
        s.rawmode = true;
        assert_eq!(s.js_expr("testknown", true, true).unwrap(), "{{$testknown}}");
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            js(r#""foo${a} \$${1+2}""#, true, false),
            r#"{{(__str "foo" $a " $" (__op__add 1 2)) | __pug__html}}"#
        );
        assert_eq!(js(r#""test""#, true, false), "test");
        assert_eq!(js(r#""test""#, false, false), r#""test""#);
        assert_eq!(js(r#""<test>""#, true, false), "&lt;test&gt;");
        assert_eq!(js(r#""<test>""#, false, false), r#""<test>""#);
        assert_eq!(js(r#""a{{b""#, true, false), r#"{{"a{{b"}}"#);
        assert_eq!(
            js("`background-image:url(${brand.heroImage.url})`", false, false),
            r#"(__str "background-image:url(" $brand.heroImage.url ")")"#
        );
        assert_eq!(js(r#""${}""#, false, false), "(__str null)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(js("[1, 2, 3]", true, false), "{{(__op__array 1 2 3) | __pug__html}}");
        assert_eq!(js("[1, 2, 3]", false, false), "(__op__array 1 2 3)");
        assert_eq!(js("true", false, false), "true");
        assert_eq!(js("1.5", false, false), "1.5");
        assert_eq!(js("2.0", false, false), "2.0");
        assert_eq!(js("null", true, false), "{{null}}");
        assert_eq!(js("null", false, false), "null");
        assert_eq!(
            js(r#"{"key": 1, "key2": {"key1": [1+2, 3, 4]}}"#, false, false),
            r#"(__op__map "key" 1 "key2" (__op__map "key1" (__op__array (__op__add 1 2) 3 4)))"#
        );
    }

    #[test]
    fn test_member_access() {
        assert_eq!(js("a.b", false, false), "$a.b");
        assert_eq!(js("foo.b", false, false), "(foo).b");
        assert_eq!(js("a[0].b", false, false), "(__pug__index $a 0).b");
        assert_eq!(
            js("a[0][b[1]]", true, false),
            "{{(__pug__index (__pug__index $a 0) (__pug__index $b 1)) | __pug__html}}"
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(js("a & b", true, false), "{{(__op__b_and $a $b) | __pug__html}}");
        assert_eq!(js("a ? b : c", false, false), "(__if ($a) ($b) ($c))");
        assert_eq!(js("!a", false, false), "(__op__not $a)");
        assert_eq!(js("a === 1 || b", false, false), "(__op__or (__op__eql $a 1) $b)");
        assert_eq!(js("void 0", false, false), "(__void 0)");
        assert_eq!(js("delete a.b", false, false), r#"(__op__delete $a "b")"#);
        assert_eq!(js("delete a", false, false), "false");
        assert_eq!(js("new Date(1)", false, false), "(__op__array 1)");
        assert_eq!(js("1,2,3", false, false), "(__op__array 1 2 3)");
    }

    #[test]
    fn test_calls() {
        assert_eq!(js("foo(1+2)", true, false), "{{(foo (__op__add 1 2)) | __pug__html}}");
        assert_eq!(js("a.b.join(', ')", false, false), r#"($a.b.join ", ")"#);
        assert_eq!(js("f()", false, false), "($f)");
    }

    #[test]
    fn test_assignments() {
        assert_eq!(js("a = 1", true, false), "{{ $a = 1 -}}");
        assert_eq!(js("a += 2", true, true), "{{ $a = (__op__add $a 2) -}}");
        assert_eq!(js("a.b = 1", true, true), r#"{{ __assign $a "b" 1 -}}"#);
        assert_eq!(js("a[k] = 1", false, true), "(__assign $a $k 1)");
        assert_eq!(js("i++", true, true), "{{ $i = __op__inc $i -}}");
        assert_eq!(js("i--", false, true), "(__op__dec $i)");
        assert_eq!(
            js("a.n++", true, true),
            r#"{{ __assign $a "n" (__op__inc $a.n) -}}"#
        );
        assert_eq!(js("var a", true, true), "{{ $a := null -}}");
        assert!(matches!(
            state().js_expr("foo(a = 1)", true, false),
            Err(CompileError::UnsupportedExpression(_))
        ));
        assert_eq!(js("foo(a.b = 1)", false, false), r#"(foo (__assign $a "b" 1))"#);
    }

    #[test]
    fn test_dollar_identifiers() {
        assert_eq!(js("var $el = 1", true, true), "{{ $__dollar_el := 1 -}}");
        assert_eq!(js("$el", false, false), "$__dollar_el");
        assert_eq!(js("a$b.c", false, false), "$a__dollar_b.c");
        assert_eq!(js("$ = $ + 1", true, true), "{{ $__dollar_ = (__op__add $__dollar_ 1) -}}");
        assert_eq!(
            js("for (var $k in o) { x = $k }", true, true),
            "{{range $__dollar_k := (__op__keys $o)}}{{ $x = $__dollar_k -}}{{end}}"
        );
    }

    #[test]
    fn test_statements() {
        assert_eq!(
            js("if (a) { b = 1 } else { b = 2 }", true, true),
            "{{if $a}}{{ $b = 1 -}}{{else}}{{ $b = 2 -}}{{end}}"
        );
        assert_eq!(js("if (a) b = 1; else null", true, true), "{{if $a}}{{ $b = 1 -}}{{end}}");
        assert_eq!(
            js("for (var k in o) { x = k }", true, true),
            "{{range $k := (__op__keys $o)}}{{ $x = $k -}}{{end}}"
        );
        assert_eq!(js("throw 'bad'", true, true), r#"{{__throw "bad"}}"#);
        assert!(matches!(
            state().js_expr("while (a) {}", true, true),
            Err(CompileError::UnsupportedStatement(_))
        ));
    }

    #[test]
    fn test_debug_separator() {
        let mut s = state();
        s.debug = true;
        assert_eq!(
            s.js_expr("var a = 1\nvar b = 2", true, true).unwrap(),
            "{{ $a := 1 -}}     {{- \"\" -}}\n{{ $b := 2 -}}     {{- \"\" -}}\n"
        );
        assert_eq!(s.js_expr("var a = 1", true, true).unwrap(), "{{ $a := 1 -}}");
    }

    #[test]
    fn test_discard_and_code_block() {
        let mut s = state();
        s.discard = true;
        assert_eq!(s.js_expr("items.push(1)", true, true).unwrap(), "{{__void ($items.push 1) -}}");
        assert_eq!(s.js_expr("a = 1", true, true).unwrap(), "{{ $a = 1 -}}");

        s.code_block = Some("<p>x</p>".into());
        assert_eq!(
            s.js_expr("if (a) __pug_block__", true, true).unwrap(),
            "{{if $a}}<p>x</p>{{end}}"
        );
    }
}
