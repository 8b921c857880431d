use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::model::DispatchAction;

/// 被拦截调用的参数联合
///
/// 三类拦截点各自的参数形状；"before" 回调收到可变引用，
/// 宿主随后用（可能被改写过的）参数继续原调用。
#[derive(Debug, Clone, PartialEq)]
pub enum CallArguments {
    /// 剪贴板写入：即将被复制的字符串
    ClipboardText(String),
    /// 事件总线分发：入站动作
    Dispatch(DispatchAction),
    /// 出站链接构造：位置参数或命名选项对象
    LinkBuild(LinkArgs),
}

/// 链接构造参数
#[derive(Debug, Clone, PartialEq)]
pub enum LinkArgs {
    /// 按位置传入的标识符（仅长度为 3 时参与重映射）
    Positional(Vec<String>),
    /// 单个命名选项对象
    Options(LinkOptions),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkOptions {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    pub user_id: Option<String>,
}

/// "before" 拦截回调
pub type BeforeCallback = Arc<dyn Fn(&mut CallArguments) + Send + Sync>;

/// 拦截的撤销句柄：消费自身以撤销一次安装
pub struct ReversalHandle {
    name: Arc<str>,
    revert: Option<Box<dyn FnOnce() + Send>>,
}

impl ReversalHandle {
    pub fn new<T: Into<Arc<str>>>(name: T, revert: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            revert: Some(Box::new(revert)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revert(mut self) {
        if let Some(revert) = self.revert.take() {
            revert();
            tracing::debug!(hook = %self.name, "interception reverted");
        }
    }
}

impl fmt::Debug for ReversalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReversalHandle")
            .field("name", &self.name)
            .finish()
    }
}

/// 宿主模块
///
/// `method_source` 暴露方法的字符串化源码，仅用于降级发现策略
/// （按源码子串识别链接构造模块）；常规发现走暴露属性名。
pub trait HostModule: Send + Sync {
    fn exposed_properties(&self) -> Vec<String>;

    fn method_source(&self, method: &str) -> Option<String>;
}

/// 拦截设施：宿主运行时提供的能力查找与回调安装接口
///
/// 能力可能暂时缺席（宿主模块惰性加载），调用方需要配合
/// [`super::probe`] 轮询。
pub trait InterceptionFacility: Send + Sync {
    /// 按暴露属性名集合查找模块
    fn find_by_exposed_properties(&self, names: &[&str]) -> Option<Arc<dyn HostModule>>;

    /// 按谓词查找模块
    fn find_by_predicate(
        &self,
        predicate: &dyn Fn(&dyn HostModule) -> bool,
    ) -> Option<Arc<dyn HostModule>>;

    /// 在指定模块方法上安装 "before" 回调，返回撤销句柄
    fn install_before(
        &self,
        module: &Arc<dyn HostModule>,
        method: &str,
        callback: BeforeCallback,
    ) -> Result<ReversalHandle>;
}

/// 轻量通知端口（非致命状况的用户可见提示）
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str);
}

/// 默认通知器：只写日志
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: &str) {
        tracing::info!(notice = text, "notification");
    }
}
