use super::{RewriteContext, text};
use crate::model::{AuthorRecord, MessageRecord};

/// 就地重写作者记录
///
/// 先重映射 `id`，再按配置顺序评估全部用户名规则与标签规则；
/// 命中即破坏性改写，后面的规则可以覆盖前面的结果。
/// `global_name` 仅在原值非空时跟随用户名改写。
pub fn rewrite_author(ctx: &RewriteContext<'_>, author: &mut AuthorRecord) {
    let mapped = ctx.id_map().lookup(&author.id).to_string();
    author.id = mapped;

    for rule in ctx.username_rules() {
        if rule.new_username.is_empty() {
            continue;
        }
        let by_id = rule
            .match_id
            .as_deref()
            .is_some_and(|match_id| !match_id.is_empty() && author.id == ctx.id_map().lookup(match_id));
        let by_name = !by_id
            && rule
                .match_username
                .as_deref()
                .is_some_and(|name| !name.is_empty() && author.username == name);
        if by_id || by_name {
            author.username = rule.new_username.clone();
            if author.global_name.as_deref().is_some_and(|name| !name.is_empty()) {
                author.global_name = Some(rule.new_username.clone());
            }
        }
    }

    for rule in ctx.tag_rules() {
        if rule.old_tag.is_empty() || rule.new_tag.is_empty() {
            continue;
        }
        if author.discriminator.as_deref() == Some(rule.old_tag.as_str()) {
            author.discriminator = Some(rule.new_tag.clone());
        }
    }
}

/// 就地重写消息记录
///
/// 内容走完整文本重写；提及与消息引用逐字段重映射；嵌入卡片的
/// 标题/描述只走链接重写，`url` 走单链接重写。单字段失败保留原值。
pub fn rewrite_message(ctx: &RewriteContext<'_>, message: &mut MessageRecord) {
    if let Some(content) = message.content.as_deref() {
        message.content = Some(text::rewrite_text(ctx, content));
    }

    for mention in &mut message.mentions {
        let mapped = ctx.id_map().lookup(&mention.id).to_string();
        mention.id = mapped;
    }

    if let Some(reference) = message.message_reference.as_mut() {
        for field in [
            &mut reference.guild_id,
            &mut reference.channel_id,
            &mut reference.message_id,
        ] {
            if let Some(value) = field.as_deref() {
                let mapped = ctx.id_map().lookup(value).to_string();
                *field = Some(mapped);
            }
        }
    }

    for embed in &mut message.embeds {
        if embed.title.as_deref().is_some_and(|title| !title.is_empty()) {
            let title = embed.title.take().unwrap_or_default();
            embed.title = Some(text::rewrite_urls_in_text(ctx, &title));
        }
        if embed
            .description
            .as_deref()
            .is_some_and(|description| !description.is_empty())
        {
            let description = embed.description.take().unwrap_or_default();
            embed.description = Some(text::rewrite_urls_in_text(ctx, &description));
        }
        if let Some(url) = embed.url.as_deref() {
            embed.url = Some(text::rewrite_url(ctx, url));
        }
    }
}
