use std::sync::{Condvar, Mutex, PoisonError};

/// 计数信号量，限制同时执行的渲染数
pub(crate) struct RenderLimit {
    available: Mutex<usize>,
    released: Condvar,
}

/// 持有期间占用一个名额，drop 时归还
pub(crate) struct Permit<'a> {
    limit: &'a RenderLimit,
}

impl RenderLimit {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            available: Mutex::new(permits.max(1)),
            released: Condvar::new(),
        }
    }

    /// 阻塞直到拿到名额
    pub(crate) fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        Permit { limit: self }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut available = self
            .limit
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.limit.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_limit_bounds_holders() {
        let limit = Arc::new(RenderLimit::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (limit, active, peak) = (limit.clone(), active.clone(), peak.clone());
                thread::spawn(move || {
                    let _permit = limit.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(*limit.available.lock().unwrap(), 2);
    }
}
