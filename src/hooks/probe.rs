use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::facility::{HostModule, InterceptionFacility};
use crate::config::ProbeConfig;

/// 能力探测节奏：固定轮询间隔加有界总超时
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            interval: Duration::from_millis(100),
        }
    }
}

impl ProbeSettings {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            interval: Duration::from_millis(config.interval_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// 轮询等待一个按暴露属性名发现的模块
///
/// 首次尝试立即发起；超时窗口耗尽仍未发现则返回 None，由调用方
/// 决定上报方式（非致命）。轮询间协作式让出。
pub async fn wait_for_module(
    facility: &dyn InterceptionFacility,
    names: &[&str],
    settings: ProbeSettings,
) -> Option<Arc<dyn HostModule>> {
    wait_until(settings, || facility.find_by_exposed_properties(names)).await
}

/// 轮询等待一个按谓词发现的模块
pub async fn wait_for_predicate(
    facility: &dyn InterceptionFacility,
    predicate: &dyn Fn(&dyn HostModule) -> bool,
    settings: ProbeSettings,
) -> Option<Arc<dyn HostModule>> {
    wait_until(settings, || facility.find_by_predicate(predicate)).await
}

async fn wait_until(
    settings: ProbeSettings,
    mut attempt: impl FnMut() -> Option<Arc<dyn HostModule>>,
) -> Option<Arc<dyn HostModule>> {
    let deadline = Instant::now() + settings.timeout;
    loop {
        if let Some(module) = attempt() {
            return Some(module);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(settings.interval).await;
    }
}
