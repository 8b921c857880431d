//! Relabel Core 公共库
//!
//! 聊天客户端标识符重写引擎：拦截宿主的内部事件流、剪贴板写入与
//! 出站链接构造，按操作员配置的映射规则改写标识符、用户名与链接，
//! 并支持合成消息（本地注入或真实发送）。
//!
//! - `rewrite`：映射表与文本/链接/实体重写器
//! - `hooks`：拦截设施端口、能力探测与 Hook 生命周期管理
//! - `synth`：合成消息的构造与投递
//! - `config`：规则与开关配置，显式的"应用新配置"入口

pub mod config;
pub mod error;
pub mod hooks;
pub mod model;
pub mod rewrite;
pub mod synth;
pub mod telemetry;

pub use config::{
    ConfigManager, EmbedDraft, FeatureToggles, LoggingConfig, MappingRule, ProbeConfig,
    QuickAction, QuickMode, RelabelConfig, TagRule, UsernameRule,
};
pub use error::*;
pub use hooks::*;
pub use model::*;
pub use rewrite::*;
pub use synth::*;
