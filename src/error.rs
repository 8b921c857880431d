//! Relabel Core 错误类型模块
//!
//! - 按错误分类统一建模：能力缺失 / 输入畸形 / 投递失败 / 配置错误
//! - 重写路径（拦截回调内部）的错误一律本地恢复并记录日志；
//!   仅合成消息路径把失败冒泡给调用方

use thiserror::Error;

/// 统一 Result 别名
pub type Result<T> = std::result::Result<T, RelabelError>;

/// 核心错误类型
#[derive(Debug, Error)]
pub enum RelabelError {
    /// 探测窗口内未发现目标宿主能力（非致命，仅上报一次）
    #[error("capability unavailable: {capability}")]
    CapabilityUnavailable { capability: String },

    /// 输入无法按期望形状解析（URL / 时间戳 / 规则），本地回退为原值
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    /// 私信通道创建或网络发送失败，向合成消息的调用方冒泡
    #[error("delivery failed: {reason}")]
    DeliveryFailed { reason: String },

    /// 配置加载或解析失败
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl RelabelError {
    pub fn capability_unavailable<T: Into<String>>(capability: T) -> Self {
        RelabelError::CapabilityUnavailable {
            capability: capability.into(),
        }
    }

    pub fn malformed<T: Into<String>>(reason: T) -> Self {
        RelabelError::MalformedInput {
            reason: reason.into(),
        }
    }

    pub fn delivery<T: Into<String>>(reason: T) -> Self {
        RelabelError::DeliveryFailed {
            reason: reason.into(),
        }
    }

    pub fn configuration<T: Into<String>>(reason: T) -> Self {
        RelabelError::Configuration {
            reason: reason.into(),
        }
    }

    /// 是否属于可本地恢复的非致命错误
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelabelError::CapabilityUnavailable { .. } | RelabelError::MalformedInput { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(RelabelError::capability_unavailable("clipboard").is_recoverable());
        assert!(RelabelError::malformed("bad url").is_recoverable());
        assert!(!RelabelError::delivery("send failed").is_recoverable());
        assert!(!RelabelError::configuration("bad toml").is_recoverable());
    }
}
