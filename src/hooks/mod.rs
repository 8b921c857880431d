//! Hook 生命周期模块
//!
//! - 定义拦截设施端口：能力查找、"before" 回调安装与撤销句柄
//! - 提供有界超时的能力探测（固定间隔轮询，协作式让出）
//! - 管理三类相互独立的拦截点生命周期，失败非致命且只上报一次

mod facility;
mod manager;
mod probe;

pub use facility::{
    BeforeCallback, CallArguments, HostModule, InterceptionFacility, LinkArgs, LinkOptions,
    LogNotifier, Notifier, ReversalHandle,
};
pub use manager::{HookKind, HookManager, HookState};
pub use probe::{ProbeSettings, wait_for_module, wait_for_predicate};
