use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use super::RewriteContext;
use crate::error::{RelabelError, Result};

/// 雪花标识符：17–21 位纯数字
static SNOWFLAKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{17,21}$").expect("snowflake pattern"));

/// 文本中宿主链接的扫描模式
static HOST_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.|ptb\.|canary\.)?discord\.com/[^\s)]+")
        .expect("host link pattern")
});

/// 解析后主机名的白名单校验，抵御形似域名
static ALLOWED_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:www\.|ptb\.|canary\.)?discord\.com$").expect("host allow-list"));

/// 路径首段为 `channels` 时重映射的三个标识符段：guild / channel / message
const CHANNEL_LINK_SEGMENTS: [usize; 3] = [1, 2, 3];

/// 重写一段文本
///
/// 裁剪后的整串若恰为雪花标识符，直接返回映射值（整串快速路径；
/// 该路径会丢弃首尾空白，这是保留下来的可观测行为而非待修复项）。
/// 否则在未裁剪的原文本上就地替换每个宿主链接出现处。
pub fn rewrite_text(ctx: &RewriteContext<'_>, text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return text.to_string();
    }
    if SNOWFLAKE_RE.is_match(trimmed) {
        return ctx.id_map().lookup(trimmed).to_string();
    }
    rewrite_urls_in_text(ctx, text)
}

/// 仅重写文本中的宿主链接，不启用整串雪花快速路径
///
/// 嵌入卡片的标题/描述是自然语言容器而非裸标识符字段，走这一入口。
pub fn rewrite_urls_in_text(ctx: &RewriteContext<'_>, text: &str) -> String {
    HOST_LINK_RE
        .replace_all(text, |caps: &Captures<'_>| rewrite_url(ctx, &caps[0]))
        .into_owned()
}

/// 重写单个链接；任何内部失败都降级为原样返回该出现处
pub fn rewrite_url(ctx: &RewriteContext<'_>, raw: &str) -> String {
    match try_rewrite_url(ctx, raw) {
        Ok(rewritten) => rewritten,
        Err(err) => {
            tracing::debug!(url = raw, error = %err, "link left unchanged");
            raw.to_string()
        }
    }
}

fn try_rewrite_url(ctx: &RewriteContext<'_>, raw: &str) -> Result<String> {
    let mut url =
        Url::parse(raw).map_err(|err| RelabelError::malformed(format!("url parse: {err}")))?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if !ALLOWED_HOST_RE.is_match(&host) {
        // 形似主机名：不属于白名单，原样放行
        return Ok(raw.to_string());
    }

    let mut segments: Vec<String> = url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    match segments.first().map(String::as_str) {
        Some("channels") => {
            for index in CHANNEL_LINK_SEGMENTS {
                remap_segment(ctx, &mut segments, index);
            }
        }
        Some("users") | Some("guilds") => {
            remap_segment(ctx, &mut segments, 1);
        }
        _ => {}
    }

    url.set_path(&format!("/{}", segments.join("/")));
    Ok(url.to_string())
}

fn remap_segment(ctx: &RewriteContext<'_>, segments: &mut [String], index: usize) {
    if let Some(segment) = segments.get_mut(index) {
        let mapped = ctx.id_map().lookup(segment.as_str()).to_string();
        *segment = mapped;
    }
}
