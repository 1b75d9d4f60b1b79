use super::token::{Attr, Token};
use crate::error::CompileError;

/// 需要经过转换器处理的 JS 源码
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsExpression(pub String);

impl JsExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JsExpression {
    fn from(s: &str) -> Self {
        JsExpression(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub nodes: Vec<Node>,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 所有子节点都是行内节点
    pub fn inline(&self) -> bool {
        self.nodes.iter().all(Node::inline)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub val: JsExpression,
    pub must_escape: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagName {
    Static(String),
    /// `#{expr}(...)` 插值标签
    Expr(JsExpression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: TagName,
    pub attrs: Vec<Attribute>,
    pub attribute_blocks: Vec<JsExpression>,
    pub self_closing: bool,
    pub is_inline: bool,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub val: String,
    pub buffer: bool,
    pub must_escape: bool,
    pub is_inline: bool,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mixin {
    pub name: String,
    pub args: String,
    pub attrs: Vec<Attribute>,
    pub attribute_blocks: Vec<JsExpression>,
    pub call: bool,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Tag(Tag),
    Text(String),
    Code(Code),
    Conditional {
        test: JsExpression,
        consequent: Box<Node>,
        alternate: Option<Box<Node>>,
    },
    Each {
        val: String,
        key: Option<String>,
        obj: JsExpression,
        block: Block,
        alternate: Option<Block>,
    },
    Case {
        expr: JsExpression,
        block: Block,
    },
    When {
        expr: JsExpression,
        block: Block,
    },
    Mixin(Mixin),
    MixinBlock,
    Doctype(String),
    Block(Block),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

impl Node {
    pub fn inline(&self) -> bool {
        match self {
            Node::Text(_) => true,
            Node::Tag(tag) => tag.is_inline,
            Node::Code(code) => code.is_inline,
            _ => false,
        }
    }
}

/// 子节点列表；注释节点不产生节点
pub fn build(parent: Option<&Token>) -> Result<Block, CompileError> {
    let mut nodes = Vec::new();
    if let Some(parent) = parent {
        for t in &parent.nodes {
            if let Some(node) = build_node(t)? {
                nodes.push(node);
            }
        }
    }
    Ok(Block { nodes })
}

fn attributes(attrs: &[Attr]) -> Vec<Attribute> {
    attrs
        .iter()
        .map(|a| Attribute {
            name: a.name.clone(),
            val: JsExpression(a.val.clone()),
            must_escape: a.must_escape,
        })
        .collect()
}

fn attribute_blocks(t: &Token) -> Vec<JsExpression> {
    t.attribute_blocks
        .iter()
        .map(|b| JsExpression::from(b.expr()))
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

pub fn build_node(t: &Token) -> Result<Option<Node>, CompileError> {
    let node = match t.kind.as_str() {
        "Tag" | "InterpolatedTag" => {
            let name = if t.kind == "Tag" {
                TagName::Static(t.name.clone())
            } else {
                TagName::Expr(JsExpression(t.expr.clone()))
            };
            let void = matches!(&name, TagName::Static(n) if is_void_element(n));
            Node::Tag(Tag {
                name,
                attrs: attributes(&t.attrs),
                attribute_blocks: attribute_blocks(t),
                self_closing: t.self_closing || void,
                is_inline: t.is_inline.unwrap_or(false),
                block: build(t.block.as_deref())?,
            })
        }
        "Text" => Node::Text(t.val.clone()),
        "Code" => Node::Code(Code {
            val: t.val.clone(),
            buffer: t.buffer.unwrap_or(true),
            must_escape: t.must_escape,
            is_inline: t.is_inline.unwrap_or(false),
            block: build(t.block.as_deref())?,
        }),
        "Conditional" => {
            let consequent = match t.consequent.as_deref() {
                Some(c) => build_node(c)?.unwrap_or(Node::Block(Block::default())),
                None => Node::Block(Block::default()),
            };
            let alternate = match t.alternate.as_deref() {
                Some(a) => build_node(a)?.map(Box::new),
                None => None,
            };
            Node::Conditional {
                test: JsExpression(t.test.clone()),
                consequent: Box::new(consequent),
                alternate,
            }
        }
        "Each" => Node::Each {
            val: t.val.clone(),
            key: non_empty(&t.key),
            obj: JsExpression(t.obj.clone()),
            block: build(t.block.as_deref())?,
            alternate: match t.alternate.as_deref() {
                Some(a) => Some(build(Some(a))?),
                None => None,
            },
        },
        "Case" => Node::Case {
            expr: JsExpression(t.expr.clone()),
            block: build(t.block.as_deref())?,
        },
        "When" => Node::When {
            expr: JsExpression(t.expr.clone()),
            block: build(t.block.as_deref())?,
        },
        "Mixin" => Node::Mixin(Mixin {
            name: t.name.clone(),
            args: t.args.clone(),
            attrs: attributes(&t.attrs),
            attribute_blocks: attribute_blocks(t),
            call: t.call,
            block: build(t.block.as_deref())?,
        }),
        "MixinBlock" => Node::MixinBlock,
        "Doctype" => Node::Doctype(t.val.clone()),
        "Block" | "NamedBlock" => Node::Block(build(Some(t))?),
        "Comment" | "BlockComment" => return Ok(None),
        other => {
            return Err(CompileError::UnknownToken {
                kind: other.to_string(),
                line: t.line,
            });
        }
    };
    Ok(Some(node))
}
