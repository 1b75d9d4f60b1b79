use serde::{Deserialize, Deserializer};

/// 外部 pug 解析器产出的 JSON AST 节点
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Token {
    #[serde(rename = "type", alias = "Type")]
    pub kind: String,
    #[serde(alias = "Name", deserialize_with = "scalar")]
    pub name: String,
    #[serde(alias = "Val", deserialize_with = "scalar")]
    pub val: String,
    #[serde(alias = "Line")]
    pub line: usize,

    #[serde(alias = "Block")]
    pub block: Option<Box<Token>>,
    #[serde(alias = "Nodes", deserialize_with = "nullable")]
    pub nodes: Vec<Token>,

    #[serde(alias = "Attrs", deserialize_with = "nullable")]
    pub attrs: Vec<Attr>,
    #[serde(alias = "AttributeBlocks", deserialize_with = "nullable")]
    pub attribute_blocks: Vec<AttributeBlock>,
    #[serde(alias = "MustEscape")]
    pub must_escape: bool,
    #[serde(alias = "Buffer")]
    pub buffer: Option<bool>,
    #[serde(alias = "SelfClosing")]
    pub self_closing: bool,
    #[serde(alias = "IsInline")]
    pub is_inline: Option<bool>,
    #[serde(alias = "Obj", deserialize_with = "scalar")]
    pub obj: String,
    #[serde(alias = "Key", deserialize_with = "scalar")]
    pub key: String,

    // mixin
    #[serde(alias = "Call")]
    pub call: bool,
    #[serde(alias = "Args", deserialize_with = "scalar")]
    pub args: String,

    // if
    #[serde(alias = "Test", deserialize_with = "scalar")]
    pub test: String,
    #[serde(alias = "Consequent")]
    pub consequent: Option<Box<Token>>,
    #[serde(alias = "Alternate")]
    pub alternate: Option<Box<Token>>,

    #[serde(alias = "Expr", deserialize_with = "scalar")]
    pub expr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attr {
    #[serde(alias = "Name")]
    pub name: String,
    /// 属性值是一段 JS 表达式源码；`input(checked)` 这类写法给出布尔值
    #[serde(alias = "Val", deserialize_with = "scalar")]
    pub val: String,
    #[serde(alias = "MustEscape")]
    pub must_escape: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttributeBlock {
    Expr(String),
    Object {
        #[serde(alias = "Val")]
        val: String,
    },
}

impl AttributeBlock {
    pub fn expr(&self) -> &str {
        match self {
            AttributeBlock::Expr(s) => s,
            AttributeBlock::Object { val } => val,
        }
    }
}

impl Token {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Token> {
        serde_json::from_slice(bytes)
    }
}

/// 字符串、数字、布尔统一读成文本，null 读成空串
fn scalar<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn nullable<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}
