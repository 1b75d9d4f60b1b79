use std::path::PathBuf;
use std::time::Duration;

pub struct EngineOptions {
    /// 模板根目录，AST 文件位于 `<basedir>/template/page`，可选的 `manifest.json` 位于根目录
    pub basedir: PathBuf,
    pub debug: bool,             // 调试模式：每次渲染重新编译目标模板
    pub asset_server: Option<String>, // 前端资源开发服务器地址，例如 localhost:1337
    pub probe_timeout: Duration, // 探测资源服务器的连接超时
    pub max_depth: usize,        // 模板嵌套调用的最大深度
    pub max_concurrent_renders: usize, // 同时执行的渲染数上限，超出的渲染排队等待
}

impl EngineOptions {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        EngineOptions {
            basedir: basedir.into(),
            debug: false,
            asset_server: None,
            probe_timeout: Duration::from_millis(200),
            max_depth: 512,
            max_concurrent_renders: 8,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn asset_server(mut self, addr: impl Into<String>) -> Self {
        self.asset_server = Some(addr.into());
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 至少为 1
    pub fn max_concurrent_renders(mut self, limit: usize) -> Self {
        self.max_concurrent_renders = limit.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builder() {
        let opts = EngineOptions::new("/srv/frontend");
        assert!(!opts.debug);
        assert!(opts.asset_server.is_none());
        assert_eq!(opts.max_depth, 512);
        assert_eq!(opts.max_concurrent_renders, 8);

        let opts = opts.debug(true).asset_server("localhost:1337").max_depth(16);
        assert!(opts.debug);
        assert_eq!(opts.asset_server.as_deref(), Some("localhost:1337"));
        assert_eq!(opts.max_depth, 16);
        assert_eq!(opts.max_concurrent_renders(0).max_concurrent_renders, 1);
    }
}
