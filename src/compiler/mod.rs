//! pug AST 到宿主模板源码的编译器。
//!
//! 每种节点对应一个渲染函数，内嵌的 JS 表达式交给 [`RenderState::js_expr`] 转换。
//! mixin 定义与调用块最后统一追加为 `define`。

mod emit;
mod mixin;
pub mod node;
mod render_state;
mod tag;
pub mod token;
mod transpile;

use crate::error::CompileError;
use crate::tpl::{self, Template};
use std::collections::HashSet;
use std::sync::Arc;

pub use node::{Block, JsExpression, Node};
pub use render_state::{MixinRegistry, RenderState};
pub use token::{Attr, AttributeBlock, Token};

/// 编译结果：解析好的模板和生成的源码
#[derive(Debug, Clone)]
pub struct Compiled {
    pub template: Template,
    pub source: String,
}

/// 把整棵 token 树编译成宿主模板源码
pub fn token_to_template(p: &mut RenderState, token: &Token) -> Result<String, CompileError> {
    let block = match token.kind.as_str() {
        "Block" | "NamedBlock" => node::build(Some(token))?,
        _ => Block {
            nodes: node::build_node(token)?.into_iter().collect(),
        },
    };

    let mut out = String::new();
    block.render(p, &mut out)?;

    for b in p.mixins.blocks() {
        out.push('\n');
        out.push_str(b);
    }
    for def in p.mixins.definitions() {
        out.push('\n');
        out.push_str(def);
    }

    if let Some(name) = p.called_mixins.iter().find(|n| !p.mixins.contains(n)) {
        return Err(CompileError::UndefinedMixin(name.clone()));
    }
    Ok(out)
}

/// 编译并解析一个文件，mixin 表在文件之间不共享
pub fn compile(
    name: &str,
    token: &Token,
    known: Arc<HashSet<String>>,
    debug: bool,
) -> Result<Compiled, CompileError> {
    let mut state = RenderState::new(known.clone(), debug);
    let source = token_to_template(&mut state, token)?;
    let template = tpl::parse_template(name, &source, &|f| known.contains(f))?;
    Ok(Compiled { template, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::funcs::BUILTINS;
    use crate::runtime::{MapBuilder, Object};
    use serde_json::{Value as Json, json};

    fn known() -> Arc<HashSet<String>> {
        Arc::new(BUILTINS.keys().cloned().collect())
    }

    fn block(nodes: Json) -> Json {
        json!({"type": "Block", "nodes": nodes})
    }

    fn text(val: &str) -> Json {
        json!({"type": "Text", "val": val})
    }

    fn code(val: &str) -> Json {
        json!({"type": "Code", "val": val, "buffer": true, "mustEscape": true, "isInline": true})
    }

    fn compile_json(ast: Json, debug: bool) -> Result<Compiled, CompileError> {
        let token: Token = serde_json::from_value(ast).unwrap();
        compile("t", &token, known(), debug)
    }

    fn render(ast: Json, data: Object) -> String {
        let compiled = compile_json(ast, false).unwrap();
        let mut out = String::new();
        tpl::execute(&compiled.template, &BUILTINS, data, 64, &mut out)
            .unwrap_or_else(|e| panic!("{}\n{}", e, compiled.source));
        out
    }

    #[test]
    fn test_case_when_fallthrough() {
        let ast = block(json!([{
            "type": "Case", "expr": "x",
            "block": block(json!([
                {"type": "When", "expr": "'a'", "block": null},
                {"type": "When", "expr": "'b'", "block": block(json!([text("Y")]))},
                {"type": "When", "expr": "default", "block": block(json!([text("N")]))}
            ]))
        }]));
        let data = |x: &str| MapBuilder::new().field("x", &x).build();
        assert_eq!(render(ast.clone(), data("a")), "Y");
        assert_eq!(render(ast.clone(), data("b")), "Y");
        assert_eq!(render(ast, data("c")), "N");
    }

    #[test]
    fn test_case_without_match_or_default() {
        let ast = block(json!([{
            "type": "Case", "expr": "x",
            "block": block(json!([{"type": "When", "expr": "1", "block": block(json!([text("one")]))}]))
        }]));
        assert_eq!(render(ast, MapBuilder::new().field("x", &2).build()), "");

        let only_default = block(json!([{
            "type": "Case", "expr": "x",
            "block": block(json!([{"type": "When", "expr": "default", "block": block(json!([text("d")]))}]))
        }]));
        assert_eq!(render(only_default, Object::Nil), "d");
    }

    #[test]
    fn test_each_with_alternate() {
        let ast = block(json!([{
            "type": "Each", "obj": "items", "val": "item", "key": "i",
            "block": block(json!([code("i"), text(":"), code("item"), text(" ")])),
            "alternate": block(json!([text("empty")]))
        }]));
        let empty: Vec<String> = Vec::new();
        assert_eq!(render(ast.clone(), MapBuilder::new().field("items", &empty).build()), "empty");
        assert_eq!(
            render(ast, MapBuilder::new().field("items", &vec!["a", "<b>"]).build()),
            "0:a 1:&lt;b&gt; "
        );
    }

    #[test]
    fn test_tag_attributes() {
        let ast = block(json!([{
            "type": "Tag", "name": "div",
            "attrs": [
                {"name": "class", "val": "'a'", "mustEscape": true},
                {"name": "class", "val": "'b'", "mustEscape": true},
                {"name": "id", "val": "id", "mustEscape": true}
            ],
            "block": block(json!([]))
        }]));
        let data = MapBuilder::new().field("id", &"x").build();
        assert_eq!(render(ast, data), r#"<div class="a b" id="x"></div>"#);
    }

    #[test]
    fn test_doctype_and_void_elements() {
        let input = json!({"type": "Tag", "name": "input", "attrs": [{"name": "checked", "val": true}]});
        let html = block(json!([{"type": "Doctype", "val": "html"}, input.clone()]));
        assert_eq!(render(html, Object::Nil), "<!DOCTYPE html><input checked>");

        let xml = block(json!([{"type": "Doctype", "val": "xml"}, {"type": "Tag", "name": "br"}]));
        assert_eq!(render(xml, Object::Nil), r#"<?xml version="1.0" encoding="utf-8" ?><br/>"#);

        let none = block(json!([input]));
        assert_eq!(render(none, Object::Nil), r#"<input checked="checked">"#);
    }

    #[test]
    fn test_text_and_interpolation() {
        let ast = block(json!([text("a{{b "), code(r#""a${1+2}b""#)]));
        assert_eq!(render(ast, Object::Nil), "a{{b a3b");
    }

    #[test]
    fn test_text_brace_before_action() {
        let data = || MapBuilder::new().field("x", &"v").build();
        let ast = block(json!([text("a{"), code("x"), text("}")]));
        assert_eq!(render(ast, data()), "a{v}");

        let ast = block(json!([code("'{'"), code("x"), text("}}")]));
        assert_eq!(render(ast, data()), "{v}}");

        let ast = block(json!([
            text("{"),
            {"type": "Conditional", "test": "x", "consequent": block(json!([text("y")]))}
        ]));
        assert_eq!(render(ast, data()), "{y");
    }

    #[test]
    fn test_dollar_variables() {
        let ast = block(json!([
            {"type": "Code", "val": "var $el = 1", "buffer": false},
            code("$el"),
            {"type": "Each", "obj": "[1, 2]", "val": "$v", "block": block(json!([code("$v")]))}
        ]));
        assert_eq!(render(ast, Object::Nil), "112");
    }

    #[test]
    fn test_conditional() {
        let ast = block(json!([{
            "type": "Conditional", "test": "a > 1",
            "consequent": block(json!([text("yes")])),
            "alternate": block(json!([text("no")]))
        }]));
        assert_eq!(render(ast.clone(), MapBuilder::new().field("a", &2).build()), "yes");
        assert_eq!(render(ast, MapBuilder::new().field("a", &1).build()), "no");
    }

    #[test]
    fn test_unbuffered_code() {
        let ast = block(json!([
            {"type": "Code", "val": "var list = []", "buffer": false},
            {"type": "Code", "val": "list.push(1)", "buffer": false},
            {"type": "Code", "val": "list.push(2)", "buffer": false},
            code("list.join('-')")
        ]));
        assert_eq!(render(ast, Object::Nil), "1-2");
    }

    #[test]
    fn test_code_with_block() {
        let ast = block(json!([{
            "type": "Code", "val": "if (show)", "buffer": false,
            "block": block(json!([{"type": "Tag", "name": "p", "block": block(json!([text("shown")]))}]))
        }]));
        assert_eq!(render(ast.clone(), MapBuilder::new().field("show", &true).build()), "<p>shown</p>");
        assert_eq!(render(ast, MapBuilder::new().field("show", &false).build()), "");
    }

    fn mixin_def(name: &str, args: &str, body: Json) -> Json {
        json!({"type": "Mixin", "name": name, "args": args, "call": false, "block": body})
    }

    fn mixin_call(name: &str, args: &str, body: Json) -> Json {
        json!({"type": "Mixin", "name": name, "args": args, "call": true, "block": body})
    }

    #[test]
    fn test_mixin_call_and_first_definition_wins() {
        let p = |s: &str| json!({"type": "Tag", "name": "p", "block": block(json!([text(s), code("name")]))});
        let ast = block(json!([
            mixin_def("greet", "name", block(json!([p("hi ")]))),
            mixin_def("greet", "name", block(json!([p("bye ")]))),
            mixin_call("greet", "'Bob'", block(json!([])))
        ]));
        assert_eq!(render(ast, Object::Nil), "<p>hi Bob</p>");
    }

    #[test]
    fn test_mixin_block_and_rest_params() {
        let ast = block(json!([
            mixin_def("box", "first, ...rest", block(json!([{
                "type": "Tag", "name": "div",
                "block": block(json!([code("first"), code("rest.length"), {"type": "MixinBlock"}]))
            }]))),
            mixin_call("box", "1, 2, 3", block(json!([{"type": "Tag", "name": "i", "block": block(json!([text("x")]))}]))),
            mixin_call("box", "", block(json!([])))
        ]));
        assert_eq!(render(ast, Object::Nil), "<div>12<i>x</i></div><div>0</div>");
    }

    #[test]
    fn test_mixin_attributes() {
        let ast = block(json!([
            mixin_def("link", "", block(json!([{
                "type": "Tag", "name": "a", "attributeBlocks": ["attributes"], "block": block(json!([]))
            }]))),
            json!({"type": "Mixin", "name": "link", "call": true, "args": null,
                   "attrs": [{"name": "href", "val": "'/x'", "mustEscape": true}]})
        ]));
        assert_eq!(render(ast, Object::Nil), r#"<a href="/x"></a>"#);
    }

    #[test]
    fn test_mixin_errors() {
        let undefined = block(json!([mixin_call("nope", "", block(json!([])))]));
        assert!(matches!(
            compile_json(undefined, false),
            Err(CompileError::UndefinedMixin(name)) if name == "nope"
        ));

        let outside = block(json!([{"type": "MixinBlock"}]));
        assert!(matches!(
            compile_json(outside, false),
            Err(CompileError::MixinBlockOutsideMixin)
        ));
    }

    #[test]
    fn test_unknown_token_type() {
        let ast = block(json!([{"type": "Filter", "line": 7}]));
        assert!(matches!(compile_json(ast, false), Err(CompileError::UnknownToken { line: 7, .. })));
    }

    #[test]
    fn test_debug_markers_keep_output() {
        let ast = block(json!([{
            "type": "Tag", "name": "div",
            "block": block(json!([{"type": "Tag", "name": "p", "block": block(json!([text("x")]))}]))
        }]));
        let debug = compile_json(ast.clone(), true).unwrap();
        assert!(debug.source.contains(r#"{{- "" -}}"#));

        let mut out = String::new();
        tpl::execute(&debug.template, &BUILTINS, Object::Nil, 64, &mut out).unwrap();
        assert_eq!(out, render(ast, Object::Nil));
        assert_eq!(out, "<div><p>x</p></div>");
    }
}
