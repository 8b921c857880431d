use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::facility::{
    BeforeCallback, CallArguments, HostModule, InterceptionFacility, LinkArgs, Notifier,
    ReversalHandle,
};
use super::probe::{self, ProbeSettings};
use crate::config::ConfigManager;
use crate::error::{RelabelError, Result};
use crate::model::{DispatchAction, MessageRecord};
use crate::rewrite::{self, RewriteContext};

/// 剪贴板能力的暴露属性名
const CLIPBOARD_PROPS: &[&str] = &["setString", "getString"];
/// 事件总线能力的暴露属性名
const DISPATCHER_PROPS: &[&str] = &["dispatch"];

/// 三类相互独立的拦截点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    Clipboard,
    Dispatcher,
    LinkBuilder,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Clipboard => "clipboard",
            HookKind::Dispatcher => "dispatcher",
            HookKind::LinkBuilder => "link-builder",
        }
    }
}

/// 单个拦截点的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookState {
    Uninstalled,
    Probing,
    Installed,
    Removed,
}

struct HookLifecycle {
    kind: HookKind,
    state: HookState,
    reversals: Vec<ReversalHandle>,
}

impl HookLifecycle {
    fn new(kind: HookKind) -> Self {
        Self {
            kind,
            state: HookState::Uninstalled,
            reversals: Vec::new(),
        }
    }
}

/// Hook 生命周期管理器
///
/// 三类拦截点各自独立走 `Uninstalled → Probing → Installed → Removed`
/// 状态机；某一能力缺席（探测超时）不阻塞其余拦截点，失败只上报
/// 一次且不自动重试。回调体是保护区域：重写逻辑的任何内部失败都
/// 被就地吞掉并保留原参数，绝不泄漏进宿主自身的事件处理路径。
pub struct HookManager {
    facility: Arc<dyn InterceptionFacility>,
    config: Arc<ConfigManager>,
    notifier: Arc<dyn Notifier>,
    clipboard: HookLifecycle,
    dispatcher: HookLifecycle,
    link_builder: HookLifecycle,
}

impl HookManager {
    pub fn new(
        facility: Arc<dyn InterceptionFacility>,
        config: Arc<ConfigManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            facility,
            config,
            notifier,
            clipboard: HookLifecycle::new(HookKind::Clipboard),
            dispatcher: HookLifecycle::new(HookKind::Dispatcher),
            link_builder: HookLifecycle::new(HookKind::LinkBuilder),
        }
    }

    pub fn state(&self, kind: HookKind) -> HookState {
        match kind {
            HookKind::Clipboard => self.clipboard.state,
            HookKind::Dispatcher => self.dispatcher.state,
            HookKind::LinkBuilder => self.link_builder.state,
        }
    }

    /// 启动：按防护顺序安装每个启用的拦截点
    ///
    /// 被配置关闭的拦截点直接跳过（记日志，不算失败）；探测失败的
    /// 拦截点保持 `Uninstalled` 并恰好通知一次，不影响其他拦截点。
    pub async fn start(&mut self) {
        self.notifier.notify("relabel starting");
        let features = self.config.current().features.clone();

        if features.clipboard {
            if let Err(err) = self.install_clipboard().await {
                self.report_skipped(HookKind::Clipboard, &err);
            }
        } else {
            tracing::debug!(hook = HookKind::Clipboard.as_str(), "hook disabled");
        }

        if features.link_builders {
            if let Err(err) = self.install_link_builders().await {
                self.report_skipped(HookKind::LinkBuilder, &err);
            }
        } else {
            tracing::debug!(hook = HookKind::LinkBuilder.as_str(), "hook disabled");
        }

        if features.dispatcher {
            if let Err(err) = self.install_dispatcher().await {
                self.report_skipped(HookKind::Dispatcher, &err);
            }
        } else {
            tracing::debug!(hook = HookKind::Dispatcher.as_str(), "hook disabled");
        }

        self.notifier.notify("relabel ready");
    }

    /// 停止：撤销全部已登记的回调，之后的事件原样通过
    pub fn stop(&mut self) {
        for lifecycle in [
            &mut self.clipboard,
            &mut self.link_builder,
            &mut self.dispatcher,
        ] {
            let reverted = lifecycle.reversals.len();
            for handle in lifecycle.reversals.drain(..) {
                handle.revert();
            }
            if lifecycle.state == HookState::Installed {
                lifecycle.state = HookState::Removed;
                tracing::info!(hook = lifecycle.kind.as_str(), reverted, "hook removed");
            }
        }
        self.notifier.notify("relabel stopped");
    }

    fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings::from_config(&self.config.current().probe)
    }

    async fn install_clipboard(&mut self) -> Result<()> {
        self.clipboard.state = HookState::Probing;
        let settings = self.probe_settings();
        let Some(module) =
            probe::wait_for_module(self.facility.as_ref(), CLIPBOARD_PROPS, settings).await
        else {
            self.clipboard.state = HookState::Uninstalled;
            return Err(RelabelError::capability_unavailable("clipboard write primitive"));
        };

        match self.facility.install_before(
            &module,
            "setString",
            clipboard_callback(Arc::clone(&self.config)),
        ) {
            Ok(handle) => {
                self.clipboard.reversals.push(handle);
                self.clipboard.state = HookState::Installed;
                tracing::info!("clipboard hook installed");
                Ok(())
            }
            Err(err) => {
                self.clipboard.state = HookState::Uninstalled;
                Err(err)
            }
        }
    }

    async fn install_dispatcher(&mut self) -> Result<()> {
        self.dispatcher.state = HookState::Probing;
        let settings = self.probe_settings();
        let Some(module) =
            probe::wait_for_module(self.facility.as_ref(), DISPATCHER_PROPS, settings).await
        else {
            self.dispatcher.state = HookState::Uninstalled;
            return Err(RelabelError::capability_unavailable("dispatch primitive"));
        };

        match self.facility.install_before(
            &module,
            "dispatch",
            dispatcher_callback(Arc::clone(&self.config)),
        ) {
            Ok(handle) => {
                self.dispatcher.reversals.push(handle);
                self.dispatcher.state = HookState::Installed;
                tracing::info!("dispatcher hook installed");
                Ok(())
            }
            Err(err) => {
                self.dispatcher.state = HookState::Uninstalled;
                Err(err)
            }
        }
    }

    async fn install_link_builders(&mut self) -> Result<()> {
        self.link_builder.state = HookState::Probing;
        let settings = self.probe_settings();
        let Some(module) =
            probe::wait_for_predicate(self.facility.as_ref(), &looks_like_link_builder, settings)
                .await
        else {
            self.link_builder.state = HookState::Uninstalled;
            return Err(RelabelError::capability_unavailable("link builder module"));
        };

        // 链接构造模块的每个方法都挂同一个重映射回调
        let callback = link_builder_callback(Arc::clone(&self.config));
        let mut installed = Vec::new();
        for method in module.exposed_properties() {
            if module.method_source(&method).is_none() {
                continue;
            }
            match self
                .facility
                .install_before(&module, &method, Arc::clone(&callback))
            {
                Ok(handle) => installed.push(handle),
                Err(err) => {
                    for handle in installed {
                        handle.revert();
                    }
                    self.link_builder.state = HookState::Uninstalled;
                    return Err(err);
                }
            }
        }
        if installed.is_empty() {
            self.link_builder.state = HookState::Uninstalled;
            return Err(RelabelError::capability_unavailable("link builder methods"));
        }

        let count = installed.len();
        self.link_builder.reversals.extend(installed);
        self.link_builder.state = HookState::Installed;
        tracing::info!(methods = count, "link builder hooks installed");
        Ok(())
    }

    fn report_skipped(&self, kind: HookKind, err: &RelabelError) {
        tracing::warn!(hook = kind.as_str(), error = %err, "hook left uninstalled");
        self.notifier
            .notify(&format!("relabel: {} hook skipped", kind.as_str()));
    }
}

/// 降级发现策略：按方法源码子串识别链接构造模块
fn looks_like_link_builder(module: &dyn HostModule) -> bool {
    module.exposed_properties().iter().any(|method| {
        module
            .method_source(method)
            .is_some_and(|source| source.contains("discord.com") && source.contains("/channels/"))
    })
}

/// 保护区域：在克隆出的草稿上执行重写，成功才写回
///
/// 重写逻辑的 panic 被就地捕获，原参数保持不变并记录告警。
fn guarded_rewrite<T: Clone>(label: &'static str, value: &mut T, rewrite: impl FnOnce(&mut T)) {
    let draft = value.clone();
    let outcome = catch_unwind(AssertUnwindSafe(move || {
        let mut draft = draft;
        rewrite(&mut draft);
        draft
    }));
    match outcome {
        Ok(rewritten) => *value = rewritten,
        Err(_) => {
            tracing::warn!(hook = label, "rewrite failed, intercepted arguments left unchanged");
        }
    }
}

fn clipboard_callback(config: Arc<ConfigManager>) -> BeforeCallback {
    Arc::new(move |args| {
        if let CallArguments::ClipboardText(text) = args {
            let snapshot = config.current();
            guarded_rewrite("clipboard", text, |text| {
                let ctx = RewriteContext::from_config(&snapshot);
                let rewritten = rewrite::rewrite_text(&ctx, text.as_str());
                *text = rewritten;
            });
        }
    })
}

fn dispatcher_callback(config: Arc<ConfigManager>) -> BeforeCallback {
    Arc::new(move |args| {
        if let CallArguments::Dispatch(action) = args {
            let snapshot = config.current();
            guarded_rewrite("dispatcher", action, |action| {
                let ctx = RewriteContext::from_config(&snapshot);
                match action {
                    DispatchAction::MessageCreate { message }
                    | DispatchAction::MessageUpdate { message } => {
                        if let Some(message) = message {
                            remap_record(&ctx, message);
                        }
                    }
                    DispatchAction::MessagesLoaded { messages } => {
                        for message in messages {
                            remap_record(&ctx, message);
                        }
                    }
                    DispatchAction::Other => {}
                }
            });
        }
    })
}

fn link_builder_callback(config: Arc<ConfigManager>) -> BeforeCallback {
    Arc::new(move |args| {
        if let CallArguments::LinkBuild(link) = args {
            let snapshot = config.current();
            guarded_rewrite("link-builder", link, |link| {
                let ctx = RewriteContext::from_config(&snapshot);
                match link {
                    LinkArgs::Positional(ids) if ids.len() == 3 => {
                        for id in ids.iter_mut() {
                            let mapped = ctx.id_map().lookup(id).to_string();
                            *id = mapped;
                        }
                    }
                    // 其他参数形状不属于链接构造约定，原样放行
                    LinkArgs::Positional(_) => {}
                    LinkArgs::Options(options) => {
                        for field in [
                            &mut options.guild_id,
                            &mut options.channel_id,
                            &mut options.message_id,
                            &mut options.user_id,
                        ] {
                            if let Some(value) = field.as_deref() {
                                let mapped = ctx.id_map().lookup(value).to_string();
                                *field = Some(mapped);
                            }
                        }
                    }
                }
            });
        }
    })
}

fn remap_record(ctx: &RewriteContext<'_>, message: &mut MessageRecord) {
    if let Some(author) = message.author.as_mut() {
        rewrite::rewrite_author(ctx, author);
    }
    rewrite::rewrite_message(ctx, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_rewrite_commits_on_success() {
        let mut value = String::from("before");
        guarded_rewrite("test", &mut value, |value| {
            *value = "after".to_string();
        });
        assert_eq!(value, "after");
    }

    #[test]
    fn guarded_rewrite_keeps_original_on_panic() {
        let mut value = String::from("before");
        guarded_rewrite("test", &mut value, |_value| {
            panic!("rewrite exploded");
        });
        assert_eq!(value, "before");
    }
}
