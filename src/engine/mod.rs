//! 模板引擎：目录编译、缓存与渲染

mod defaults;
mod functions;
mod limit;
mod loader;
mod rendered;

use crate::compiler::{self, RenderState};
use crate::error::TemplateError;
use crate::models::engine_options::EngineOptions;
use crate::runtime::funcs::{BUILTINS, FuncMap};
use crate::runtime::{Object, ToObject};
use crate::tpl::{self, Template};
use limit::RenderLimit;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use functions::{ContextFunc, FunctionRegistry, RenderContext, TemplateFunc};
pub use rendered::Rendered;

const DEBUG_SUFFIX: &str = r#"{{- "" -}}"#;

/// 编译好的模板及其源码
#[derive(Clone)]
pub struct CachedTemplate {
    pub template: Template,
    pub source: String,
}

pub struct Engine {
    options: EngineOptions,
    registry: FunctionRegistry,
    /// 内置函数加普通函数，每次渲染在此基础上绑定上下文函数
    base_funcs: FuncMap,
    known: Arc<HashSet<String>>,
    templates: DashMap<String, Arc<CachedTemplate>>,
    asset_rewrites: RwLock<HashMap<String, String>>,
    asset_server: AtomicBool,
    loaded: AtomicBool,
    load_lock: Mutex<()>,
    load_count: AtomicUsize,
    render_limit: RenderLimit,
}

impl Engine {
    pub fn new(options: EngineOptions, registry: FunctionRegistry) -> Self {
        let mut base_funcs = BUILTINS.clone();
        base_funcs.extend(registry.plain_funcs());

        let mut known: HashSet<String> = base_funcs.keys().cloned().collect();
        known.extend(registry.names().map(str::to_string));

        let render_limit = RenderLimit::new(options.max_concurrent_renders);
        Self {
            options,
            registry,
            base_funcs,
            known: Arc::new(known),
            templates: DashMap::new(),
            asset_rewrites: RwLock::new(HashMap::new()),
            asset_server: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
            load_lock: Mutex::new(()),
            load_count: AtomicUsize::new(0),
            render_limit,
        }
    }

    /// 编译名字以 `filter` 开头的模板；空串表示全部
    pub fn load_templates(&self, filter: &str) -> Result<(), TemplateError> {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_locked(filter)
    }

    fn load_locked(&self, filter: &str) -> Result<(), TemplateError> {
        let start = Instant::now();

        let manifest_path = self.options.basedir.join("manifest.json");
        match loader::read_manifest(&manifest_path) {
            Ok(Some(manifest)) => {
                *self
                    .asset_rewrites
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = manifest;
            }
            Ok(None) => {}
            Err(e) => warn!("忽略无效的 manifest: {:#}", e),
        }

        let root = self.options.basedir.join("template").join("page");
        let files = loader::scan(&root, filter).map_err(TemplateError::Load)?;
        for (name, path) in &files {
            let token = loader::read_ast(path).map_err(TemplateError::Load)?;
            let cached = self.compile(name, &token)?;
            self.templates.insert(name.clone(), Arc::new(cached));
            debug!(template = %name, "compiled template");
        }

        let available = self
            .options
            .asset_server
            .as_deref()
            .is_some_and(|addr| probe(addr, self.options.probe_timeout));
        self.asset_server.store(available, Ordering::Release);

        if filter.is_empty() {
            self.loaded.store(true, Ordering::Release);
        }
        self.load_count.fetch_add(1, Ordering::AcqRel);
        info!(
            filter,
            count = files.len(),
            elapsed = ?start.elapsed(),
            "compiled templates"
        );
        Ok(())
    }

    fn compile(&self, name: &str, token: &compiler::Token) -> Result<CachedTemplate, TemplateError> {
        let mut state = RenderState::new(self.known.clone(), self.options.debug);
        let source =
            compiler::token_to_template(&mut state, token).map_err(|source| TemplateError::Compile {
                name: name.to_string(),
                source,
                listing: String::new(),
            })?;

        let known = &self.known;
        let template = tpl::parse_template(name, &source, &|f| known.contains(f)).map_err(|e| {
            TemplateError::Compile {
                name: name.to_string(),
                source: e,
                listing: numbered(&source),
            }
        })?;
        Ok(CachedTemplate { template, source })
    }

    fn ensure_loaded(&self, name: &str) -> Result<(), TemplateError> {
        if !self.loaded.load(Ordering::Acquire) {
            let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.loaded.load(Ordering::Acquire) {
                return self.load_locked("");
            }
        } else if self.options.debug {
            self.load_templates(name)?;
        }
        Ok(())
    }

    fn cached(&self, name: &str) -> Result<Arc<CachedTemplate>, TemplateError> {
        self.templates
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    /// 渲染模板。`name` 为 `/` 连接的相对路径，不带扩展名
    pub fn render<T: ToObject + ?Sized>(
        &self,
        ctx: &RenderContext,
        name: &str,
        data: &T,
    ) -> Result<Rendered, TemplateError> {
        let start = Instant::now();
        self.ensure_loaded(name)?;
        let cached = self.cached(name)?;

        let ctx = ctx
            .clone()
            .with("page.template", Object::string(page_template(name)));
        let mut funcs = self.base_funcs.clone();
        self.registry.bind_context(&ctx, &mut funcs);

        let data = data.to_object();
        let mut out = String::new();
        let executed = {
            let _permit = self.render_limit.acquire();
            tpl::execute(
                &cached.template,
                &funcs,
                data,
                self.options.max_depth,
                &mut out,
            )
        };
        executed.map_err(|source| TemplateError::Execution {
            name: name.to_string(),
            source,
            listing: numbered(&cached.source),
        })?;

        debug!(template = %name, elapsed = ?start.elapsed(), "rendered template");
        Ok(Rendered::new(out))
    }

    /// 带行号的编译源码，调试模式下先重新编译该模板
    pub fn debug_source(&self, name: &str) -> Result<String, TemplateError> {
        self.ensure_loaded(name)?;
        Ok(numbered(&self.cached(name)?.source))
    }

    pub fn asset_rewrite(&self, name: &str) -> Option<String> {
        self.asset_rewrites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn asset_server_available(&self) -> bool {
        self.asset_server.load(Ordering::Acquire)
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// 完成的加载次数（含单模板重载）
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::Acquire)
    }
}

fn probe(addr: &str, timeout: Duration) -> bool {
    let Ok(mut addrs) = addr.to_socket_addrs() else {
        return false;
    };
    addrs.any(|a| TcpStream::connect_timeout(&a, timeout).is_ok())
}

/// `product/detail` -> `pageProductDetail`，`home/home` -> `pageHome`
fn page_template(name: &str) -> String {
    let parts: Vec<String> = name.split('/').map(title).collect();
    let last = parts.last().cloned().unwrap_or_default();
    let page = match parts.len().checked_sub(2).map(|i| &parts[i]) {
        Some(parent) if *parent != last => format!("{}{}", parent, last),
        _ => last,
    };
    format!("page{}", page)
}

fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `%03d: ` 行号，去掉调试用的空白控制标记
fn numbered(source: &str) -> String {
    let mut out = String::new();
    for (i, line) in source.split('\n').enumerate() {
        let line = line.trim_end().trim_end_matches(DEBUG_SUFFIX).trim();
        out.push_str(&format!("{:03}: {}\n", i + 1, line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_template() {
        assert_eq!(page_template("home"), "pageHome");
        assert_eq!(page_template("product/detail"), "pageProductDetail");
        assert_eq!(page_template("checkout/checkout"), "pageCheckout");
    }

    #[test]
    fn test_numbered() {
        let src = "<div>     {{- \"\" -}}\n  <p>x</p>";
        assert_eq!(numbered(src), "001: <div>\n002: <p>x</p>\n");
    }

    #[test]
    fn test_probe_unreachable() {
        assert!(!probe("not a host", Duration::from_millis(10)));
    }
}
