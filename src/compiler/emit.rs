use super::node::{Block, Code, JsExpression, Node};
use super::render_state::RenderState;
use super::tag::or_null;
use super::transpile::{BLOCK_MARKER, var_name};
use crate::error::CompileError;
use crate::tpl::quote;

impl Block {
    pub fn render(&self, p: &mut RenderState, out: &mut String) -> Result<(), CompileError> {
        for node in &self.nodes {
            node.render(p, out)?;
        }
        Ok(())
    }
}

impl Node {
    pub fn render(&self, p: &mut RenderState, out: &mut String) -> Result<(), CompileError> {
        match self {
            Node::Tag(tag) => tag.render(p, out),
            Node::Text(text) => {
                if text.contains("{{") {
                    out.push_str(&format!("{{{{{}}}}}", quote(text)));
                } else {
                    out.push_str(text);
                }
                Ok(())
            }
            Node::Code(code) => code.render(p, out),
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = value(p, test)?;
                out.push_str(&format!("{{{{if {}}}}}", test));
                consequent.render(p, out)?;
                if let Some(alternate) = alternate {
                    out.push_str("{{else}}");
                    alternate.render(p, out)?;
                }
                out.push_str("{{end}}");
                Ok(())
            }
            Node::Each {
                val,
                key,
                obj,
                block,
                alternate,
            } => {
                let obj = value(p, obj)?;
                match key {
                    Some(key) => out.push_str(&format!(
                        "{{{{range {}, {} := {}}}}}",
                        var_name(key),
                        var_name(val),
                        obj
                    )),
                    None => out.push_str(&format!("{{{{range {} := {}}}}}", var_name(val), obj)),
                }
                block.render(p, out)?;
                if let Some(alternate) = alternate {
                    out.push_str("{{else}}");
                    alternate.render(p, out)?;
                }
                out.push_str("{{end}}");
                Ok(())
            }
            Node::Case { expr, block } => render_case(p, expr, block, out),
            Node::When { .. } => Err(CompileError::InvalidAst("When outside of Case".into())),
            Node::Mixin(mixin) => mixin.render(p, out),
            Node::MixinBlock => {
                if p.mixin_depth == 0 {
                    return Err(CompileError::MixinBlockOutsideMixin);
                }
                out.push_str("{{- template $block -}}");
                Ok(())
            }
            Node::Doctype(val) => {
                let val = if val.is_empty() { "html" } else { val.as_str() };
                p.doctype = val.to_string();
                out.push_str(&doctype(val));
                Ok(())
            }
            Node::Block(block) => block.render(p, out),
        }
    }
}

impl Code {
    fn render(&self, p: &mut RenderState, out: &mut String) -> Result<(), CompileError> {
        // 子块先编译，其中的代码节点会改动 rawmode
        let block = if self.block.is_empty() {
            None
        } else {
            let mut body = String::new();
            self.block.render(p, &mut body)?;
            Some(body)
        };

        let src = match &block {
            Some(_) => format!("{} {}", self.val, BLOCK_MARKER),
            None => self.val.clone(),
        };

        p.rawmode = !self.must_escape;
        p.discard = !self.buffer;
        let previous = std::mem::replace(&mut p.code_block, block);
        let result = p.js_expr(&src, true, true);
        p.code_block = previous;
        p.discard = false;

        out.push_str(&result?);
        Ok(())
    }
}

fn value(p: &mut RenderState, expr: &JsExpression) -> Result<String, CompileError> {
    p.js_expr(expr.as_str(), false, false).map(or_null)
}

/// `case` 编译成 if/else if 链；空的 `when` 与下一个合并，`default` 放到最后的 else
fn render_case(
    p: &mut RenderState,
    expr: &JsExpression,
    block: &Block,
    out: &mut String,
) -> Result<(), CompileError> {
    let subject = value(p, expr)?;
    let mut pending: Vec<String> = Vec::new();
    let mut branches: Vec<(String, String)> = Vec::new();
    let mut default = None;

    for node in &block.nodes {
        let Node::When { expr, block } = node else {
            return Err(CompileError::InvalidAst(format!("unexpected node in Case: {:?}", node)));
        };

        let mut body = String::new();
        if expr.as_str() == "default" {
            block.render(p, &mut body)?;
            default = Some(body);
            continue;
        }

        pending.push(format!("(__op__eql {} {})", subject, value(p, expr)?));
        if block.is_empty() {
            continue;
        }
        let cond = if pending.len() == 1 {
            pending.remove(0)
        } else {
            format!("(__op__or {})", pending.join(" "))
        };
        pending.clear();
        block.render(p, &mut body)?;
        branches.push((cond, body));
    }

    if branches.is_empty() {
        if let Some(body) = default {
            out.push_str(&body);
        }
        return Ok(());
    }

    for (i, (cond, body)) in branches.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "else if" };
        out.push_str(&format!("{{{{{} {}}}}}", keyword, cond));
        out.push_str(body);
    }
    if let Some(body) = default.filter(|b| !b.is_empty()) {
        out.push_str("{{else}}");
        out.push_str(&body);
    }
    out.push_str("{{end}}");
    Ok(())
}

fn doctype(val: &str) -> String {
    let decl = match val {
        "html" => "<!DOCTYPE html>",
        "xml" => r#"<?xml version="1.0" encoding="utf-8" ?>"#,
        "transitional" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#
        }
        "strict" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#
        }
        "frameset" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#
        }
        "1.1" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#
        }
        "basic" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#
        }
        "mobile" => {
            r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#
        }
        "plist" => {
            r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#
        }
        other => return format!("<!DOCTYPE {}>", other),
    };
    decl.to_string()
}
