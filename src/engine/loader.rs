use crate::compiler::Token;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub(crate) const AST_SUFFIX: &str = ".ast.json";

/// 读取资源重写表；文件不存在时返回 None
pub(crate) fn read_manifest(path: &Path) -> Result<Option<HashMap<String, String>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content =
        fs::read(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    let manifest = serde_json::from_slice(&content)
        .with_context(|| format!("manifest 解析失败: {}", path.display()))?;
    Ok(Some(manifest))
}

/// 递归查找 `*.ast.json`，返回 (模板名, 路径)；模板名为 `/` 连接的相对路径去掉扩展名
pub(crate) fn scan(root: &Path, filter: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("遍历目录失败: {}", root.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = template_name(root, path) else {
            continue;
        };
        if name.starts_with(filter) {
            files.push((name, path.to_path_buf()));
        }
    }
    Ok(files)
}

fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let name = parts.join("/");
    name.strip_suffix(AST_SUFFIX).map(str::to_string)
}

pub(crate) fn read_ast(path: &Path) -> Result<Token> {
    let content =
        fs::read(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    Token::from_json(&content).with_context(|| format!("AST 解析失败: {}", path.display()))
}
