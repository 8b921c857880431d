//! 重写引擎模块
//!
//! - 提供标识符映射表、文本/链接重写器与实体（消息/作者）重写器
//! - 重写上下文在每次被拦截事件上从配置重建，配置编辑即时生效
//! - 重写路径永不向调用方抛错：内部失败一律降级为保留原值

mod entity;
mod idmap;
mod text;

pub use entity::{rewrite_author, rewrite_message};
pub use idmap::IdentifierMap;
pub use text::{rewrite_text, rewrite_url, rewrite_urls_in_text};

use crate::config::{RelabelConfig, TagRule, UsernameRule};

/// 重写上下文：解析后的映射表加上有序的用户名/标签规则
///
/// 每次调用从配置重建（不跨事件缓存），以可接受的重建成本换取
/// 永不陈旧的规则视图；事件量受人类聊天速度约束。
pub struct RewriteContext<'a> {
    id_map: IdentifierMap,
    usernames: &'a [UsernameRule],
    tags: &'a [TagRule],
}

impl<'a> RewriteContext<'a> {
    pub fn from_config(config: &'a RelabelConfig) -> Self {
        Self {
            id_map: IdentifierMap::build(&config.mappings),
            usernames: &config.usernames,
            tags: &config.tags,
        }
    }

    pub fn id_map(&self) -> &IdentifierMap {
        &self.id_map
    }

    pub fn username_rules(&self) -> &[UsernameRule] {
        self.usernames
    }

    pub fn tag_rules(&self) -> &[TagRule] {
        self.tags
    }
}
