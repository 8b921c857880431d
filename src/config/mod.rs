//! Relabel 配置模块
//!
//! 该模块提供了引擎全部的操作员配置能力，包括：
//! - 映射 / 用户名 / 标签三类重写规则的定义与 TOML 加载
//! - 每种 Hook 的功能开关与探测节奏配置
//! - 快捷动作（本地注入 / 真实发送）配置块
//! - 显式的"应用新配置"入口（`ConfigManager::apply`）；
//!   各组件在下一次调用时重新读取，不存在进程级隐式可变状态

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{RelabelError, Result};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/relabel.toml";

fn default_true() -> bool {
    true
}

/// 标识符映射规则：旧标识符 → 新标识符
///
/// 任一侧为空视为畸形规则，构建映射表时静默跳过。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MappingRule {
    pub old_id: String,
    pub new_id: String,
}

/// 用户名重写规则
///
/// 优先按标识符匹配（`match_id`），否则按用户名字面相等匹配；
/// 命中的规则全部按配置顺序生效，后面的可以覆盖前面的改写。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsernameRule {
    pub match_id: Option<String>,
    pub match_username: Option<String>,
    pub new_username: String,
}

/// 标签（discriminator）重写规则，按字面相等匹配
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TagRule {
    pub old_tag: String,
    pub new_tag: String,
}

/// 每种 Hook 的功能开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub clipboard: bool,
    pub dispatcher: bool,
    pub link_builders: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            clipboard: true,
            dispatcher: true,
            link_builders: true,
        }
    }
}

/// 能力探测节奏
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 探测总超时（毫秒）
    pub timeout_ms: u64,
    /// 轮询间隔（毫秒）
    pub interval_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            interval_ms: 100,
        }
    }
}

/// 快捷动作投递模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickMode {
    /// 本地注入：只进入本端显示管线，不产生网络效果
    #[default]
    Inject,
    /// 真实发送：走宿主出站原语，等待网络完成
    Send,
}

/// 快捷动作的嵌入卡片草稿，四个字段全空则不构建嵌入对象
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbedDraft {
    pub title: String,
    pub description: String,
    pub url: String,
    pub thumbnail: String,
}

impl EmbedDraft {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.url.is_empty()
            && self.thumbnail.is_empty()
    }
}

/// 快捷动作配置块
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuickAction {
    pub mode: QuickMode,
    pub channel_id: String,
    pub dm_user_id: String,
    pub content: String,
    pub embed: EmbedDraft,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 优先于该值）
    pub level: String,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// 引擎总配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelabelConfig {
    pub mappings: Vec<MappingRule>,
    pub usernames: Vec<UsernameRule>,
    pub tags: Vec<TagRule>,
    pub features: FeatureToggles,
    pub probe: ProbeConfig,
    pub quick: QuickAction,
    pub logging: LoggingConfig,
}

impl RelabelConfig {
    /// 从 TOML 文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径，None 时使用 [`DEFAULT_CONFIG_PATH`]
    ///
    /// 文件不存在时回退为默认配置并记录警告；读取或解析失败则返回配置错误。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        Self::load_inner(&path)
            .map_err(|err| RelabelError::configuration(format!("{err:#}")))
    }

    fn load_inner(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config format: {}", path.display()))
    }
}

/// 配置管理器
///
/// 持有当前生效的配置快照。拦截回调在每次事件上通过 [`ConfigManager::current`]
/// 重新读取，因此 [`ConfigManager::apply`] 之后的第一个事件即可看到新配置，
/// 无需失效协议。
pub struct ConfigManager {
    current: RwLock<Arc<RelabelConfig>>,
}

impl ConfigManager {
    pub fn new(config: RelabelConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// 当前配置快照
    pub fn current(&self) -> Arc<RelabelConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 应用新配置：从下一次被拦截的事件起生效
    pub fn apply(&self, config: RelabelConfig) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
        tracing::info!("configuration applied");
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(RelabelConfig::default())
    }
}
