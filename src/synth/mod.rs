//! 合成消息模块
//!
//! - 解析投递目标：显式通道标识符，或经宿主协作者解析/创建的私信通道
//! - 构造完整形状的合成消息记录：本地生成标识符、按需构建嵌入卡片、
//!   标准交换格式时间戳（解析失败回退为当前时刻）
//! - 两种投递方式：本地注入（仅本端可见，无网络效果）与真实发送
//!   （等待网络完成）；本路径的失败向调用方冒泡

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::{EmbedDraft, QuickAction, QuickMode};
use crate::error::{RelabelError, Result};
use crate::hooks::Notifier;
use crate::model::{AuthorRecord, EmbedRecord, EmbedThumbnail, MessageRecord};

/// 私信通道目录（宿主能力）
pub trait ChannelDirectory: Send + Sync {
    fn get_dm_from_user_id(&self, user_id: &str) -> Option<String>;
}

/// 类 HTTP 原语（宿主能力），本模块仅用于私信通道创建
#[async_trait]
pub trait HttpGateway: Send + Sync {
    async fn post(&self, path: &str, body: JsonValue) -> Result<JsonValue>;
}

/// 消息出入站原语（宿主能力）
#[async_trait]
pub trait MessageActions: Send + Sync {
    /// 入站接收：把记录交给本端显示管线，无网络效果
    fn receive_message(&self, channel_id: &str, message: MessageRecord);

    /// 出站发送：等待网络完成
    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> Result<()>;
}

/// 出站发送的缩减记录：正文、无附件、提及策略
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub content: String,
    pub tts: bool,
    pub allowed_mentions: AllowedMentions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<EmbedRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

impl AllowedMentions {
    /// 宽松提及策略
    pub fn permissive() -> Self {
        Self {
            parse: vec!["users".into(), "roles".into(), "everyone".into()],
        }
    }
}

/// 投递目标：显式通道优先，否则按私信收件人解析
#[derive(Debug, Clone, Default)]
pub struct SyntheticTarget {
    channel_id: Option<String>,
    dm_user_id: Option<String>,
}

impl SyntheticTarget {
    pub fn channel<T: Into<String>>(channel_id: T) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            dm_user_id: None,
        }
    }

    pub fn direct_message<T: Into<String>>(user_id: T) -> Self {
        Self {
            channel_id: None,
            dm_user_id: Some(user_id.into()),
        }
    }

    pub fn from_quick(quick: &QuickAction) -> Result<Self> {
        let channel_id = quick.channel_id.trim();
        let dm_user_id = quick.dm_user_id.trim();
        if channel_id.is_empty() && dm_user_id.is_empty() {
            return Err(RelabelError::delivery(
                "provide a channel id or a DM recipient",
            ));
        }
        Ok(Self {
            channel_id: (!channel_id.is_empty()).then(|| channel_id.to_string()),
            dm_user_id: (!dm_user_id.is_empty()).then(|| dm_user_id.to_string()),
        })
    }
}

/// 合成消息器
pub struct MessageSynthesizer {
    directory: Arc<dyn ChannelDirectory>,
    http: Arc<dyn HttpGateway>,
    actions: Arc<dyn MessageActions>,
    notifier: Arc<dyn Notifier>,
}

impl MessageSynthesizer {
    pub fn new(
        directory: Arc<dyn ChannelDirectory>,
        http: Arc<dyn HttpGateway>,
        actions: Arc<dyn MessageActions>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            directory,
            http,
            actions,
            notifier,
        }
    }

    /// 构造合成消息记录（先解析目标，再组装完整形状）
    pub async fn build_synthetic_message(
        &self,
        target: &SyntheticTarget,
        content: &str,
        embed: Option<&EmbedDraft>,
        author: Option<AuthorRecord>,
        timestamp: Option<&str>,
    ) -> Result<MessageRecord> {
        let channel_id = self.resolve_target(target).await?;
        Ok(synthesize_record(channel_id, content, embed, author, timestamp))
    }

    /// 本地注入：记录只进入本端显示管线，绝不触达其他参与者
    pub async fn inject(
        &self,
        target: &SyntheticTarget,
        content: &str,
        embed: Option<&EmbedDraft>,
        author: Option<AuthorRecord>,
        timestamp: Option<&str>,
    ) -> Result<MessageRecord> {
        let record = self
            .build_synthetic_message(target, content, embed, author, timestamp)
            .await?;
        let channel_id = record.channel_id.clone().unwrap_or_default();
        self.actions.receive_message(&channel_id, record.clone());
        tracing::info!(channel = %channel_id, "synthetic message injected locally");
        self.notifier.notify("injected (local)");
        Ok(record)
    }

    /// 真实发送：缩减记录交给出站原语并等待网络完成
    pub async fn send(
        &self,
        target: &SyntheticTarget,
        content: &str,
        embed: Option<&EmbedDraft>,
    ) -> Result<()> {
        let channel_id = self.resolve_target(target).await?;
        let message = OutboundMessage {
            content: content.to_string(),
            tts: false,
            allowed_mentions: AllowedMentions::permissive(),
            embed: build_embed(embed),
        };
        self.actions.send_message(&channel_id, message).await?;
        tracing::info!(channel = %channel_id, "synthetic message sent");
        self.notifier.notify("sent");
        Ok(())
    }

    /// 执行快捷动作：按配置模式分派到注入或发送
    pub async fn run_quick_action(&self, quick: &QuickAction) -> Result<Option<MessageRecord>> {
        let target = SyntheticTarget::from_quick(quick)?;
        match quick.mode {
            QuickMode::Inject => self
                .inject(&target, &quick.content, Some(&quick.embed), None, None)
                .await
                .map(Some),
            QuickMode::Send => {
                self.send(&target, &quick.content, Some(&quick.embed)).await?;
                Ok(None)
            }
        }
    }

    async fn resolve_target(&self, target: &SyntheticTarget) -> Result<String> {
        if let Some(channel_id) = &target.channel_id {
            return Ok(channel_id.clone());
        }
        let Some(user_id) = &target.dm_user_id else {
            return Err(RelabelError::delivery(
                "provide a channel id or a DM recipient",
            ));
        };
        if let Some(existing) = self.directory.get_dm_from_user_id(user_id) {
            return Ok(existing);
        }
        let response = self
            .http
            .post(
                "/users/@me/channels",
                serde_json::json!({ "recipient_id": user_id }),
            )
            .await?;
        response
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| RelabelError::delivery("DM channel creation returned no id"))
    }
}

/// 本地生成的消息标识符：当前毫秒时间加随机决胜位，
/// 避免同一毫秒内的碰撞
fn local_message_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let tiebreak: u32 = rand::thread_rng().gen_range(0..1_000);
    format!("{millis}{tiebreak:03}")
}

fn resolve_timestamp(supplied: Option<&str>) -> String {
    let now = || Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    match supplied {
        None => now(),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => parsed
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            Err(err) => {
                tracing::debug!(timestamp = raw, error = %err, "unparseable timestamp, using now");
                now()
            }
        },
    }
}

/// 四个字段全空时不构建嵌入对象
fn build_embed(draft: Option<&EmbedDraft>) -> Option<EmbedRecord> {
    let draft = draft?;
    if draft.is_empty() {
        return None;
    }
    let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
    Some(EmbedRecord {
        kind: Some("rich".to_string()),
        title: non_empty(&draft.title),
        description: non_empty(&draft.description),
        url: non_empty(&draft.url),
        thumbnail: non_empty(&draft.thumbnail).map(|url| EmbedThumbnail { url }),
    })
}

fn synthesize_record(
    channel_id: String,
    content: &str,
    embed: Option<&EmbedDraft>,
    author: Option<AuthorRecord>,
    timestamp: Option<&str>,
) -> MessageRecord {
    MessageRecord {
        id: Some(local_message_id()),
        kind: Some(0),
        content: Some(content.to_string()),
        channel_id: Some(channel_id),
        author: Some(author.unwrap_or_else(default_author)),
        mentions: Vec::new(),
        message_reference: None,
        embeds: build_embed(embed).into_iter().collect(),
        timestamp: Some(resolve_timestamp(timestamp)),
    }
}

/// 合成消息的默认作者（本端机器人身份）
fn default_author() -> AuthorRecord {
    AuthorRecord {
        id: "0".to_string(),
        username: "relabel".to_string(),
        global_name: None,
        discriminator: Some("0000".to_string()),
        bot: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticDirectory {
        existing: Option<(String, String)>,
    }

    impl ChannelDirectory for StaticDirectory {
        fn get_dm_from_user_id(&self, user_id: &str) -> Option<String> {
            self.existing
                .as_ref()
                .filter(|(user, _)| user == user_id)
                .map(|(_, channel)| channel.clone())
        }
    }

    struct RecordingHttp {
        calls: Mutex<Vec<(String, JsonValue)>>,
        response: JsonValue,
    }

    impl RecordingHttp {
        fn returning(response: JsonValue) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response,
            }
        }
    }

    #[async_trait]
    impl HttpGateway for RecordingHttp {
        async fn post(&self, path: &str, body: JsonValue) -> Result<JsonValue> {
            self.calls.lock().unwrap().push((path.to_string(), body));
            Ok(self.response.clone())
        }
    }

    #[derive(Default)]
    struct RecordingActions {
        received: Mutex<Vec<(String, MessageRecord)>>,
        sent: Mutex<Vec<(String, OutboundMessage)>>,
        fail_send: bool,
    }

    #[async_trait]
    impl MessageActions for RecordingActions {
        fn receive_message(&self, channel_id: &str, message: MessageRecord) {
            self.received
                .lock()
                .unwrap()
                .push((channel_id.to_string(), message));
        }

        async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> Result<()> {
            if self.fail_send {
                return Err(RelabelError::delivery("network send failed"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), message));
            Ok(())
        }
    }

    struct SilentNotifier;

    impl Notifier for SilentNotifier {
        fn notify(&self, _text: &str) {}
    }

    fn synthesizer(
        directory: StaticDirectory,
        http: RecordingHttp,
        actions: Arc<RecordingActions>,
    ) -> MessageSynthesizer {
        MessageSynthesizer::new(
            Arc::new(directory),
            Arc::new(http),
            actions,
            Arc::new(SilentNotifier),
        )
    }

    const CHANNEL: &str = "33333333333333333";

    #[tokio::test]
    async fn inject_to_channel_is_local_only() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let record = synth
            .inject(&SyntheticTarget::channel(CHANNEL), "hi", None, None, None)
            .await
            .unwrap();

        assert_eq!(record.channel_id.as_deref(), Some(CHANNEL));
        assert_eq!(record.content.as_deref(), Some("hi"));
        assert!(record.embeds.is_empty());
        let author = record.author.as_ref().unwrap();
        assert_eq!(author.bot, Some(true));
        assert!(record.id.as_deref().unwrap().chars().all(|c| c.is_ascii_digit()));

        let received = actions.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, CHANNEL);
        // 本地注入不触达出站原语
        assert!(actions.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dm_target_prefers_existing_channel() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let directory = StaticDirectory {
            existing: Some(("777".to_string(), "888".to_string())),
        };
        let synth = synthesizer(directory, http, Arc::clone(&actions));

        let record = synth
            .inject(&SyntheticTarget::direct_message("777"), "yo", None, None, None)
            .await
            .unwrap();
        assert_eq!(record.channel_id.as_deref(), Some("888"));
    }

    #[tokio::test]
    async fn dm_target_creates_channel_when_missing() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({ "id": "999" }));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let record = synth
            .inject(&SyntheticTarget::direct_message("777"), "yo", None, None, None)
            .await
            .unwrap();
        assert_eq!(record.channel_id.as_deref(), Some("999"));
    }

    #[tokio::test]
    async fn dm_creation_posts_the_recipient() {
        let actions = Arc::new(RecordingActions::default());
        let http = Arc::new(RecordingHttp::returning(serde_json::json!({ "id": "999" })));
        let synth = MessageSynthesizer::new(
            Arc::new(StaticDirectory { existing: None }),
            Arc::clone(&http) as Arc<dyn HttpGateway>,
            actions,
            Arc::new(SilentNotifier),
        );

        let channel = synth
            .resolve_target(&SyntheticTarget::direct_message("777"))
            .await
            .unwrap();
        assert_eq!(channel, "999");

        let calls = http.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/users/@me/channels");
        assert_eq!(calls[0].1, serde_json::json!({ "recipient_id": "777" }));
    }

    #[tokio::test]
    async fn missing_target_is_a_delivery_failure() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let err = synth
            .inject(&SyntheticTarget::default(), "hi", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelabelError::DeliveryFailed { .. }));
    }

    #[tokio::test]
    async fn send_builds_reduced_outbound_payload() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let draft = EmbedDraft {
            title: "news".to_string(),
            ..Default::default()
        };
        synth
            .send(&SyntheticTarget::channel(CHANNEL), "hello", Some(&draft))
            .await
            .unwrap();

        let sent = actions.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (channel, message) = &sent[0];
        assert_eq!(channel, CHANNEL);
        assert_eq!(message.content, "hello");
        assert!(!message.tts);
        assert_eq!(message.allowed_mentions.parse.len(), 3);
        let embed = message.embed.as_ref().unwrap();
        assert_eq!(embed.kind.as_deref(), Some("rich"));
        assert_eq!(embed.title.as_deref(), Some("news"));
        assert!(actions.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_surfaced() {
        let actions = Arc::new(RecordingActions {
            fail_send: true,
            ..Default::default()
        });
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let err = synth
            .send(&SyntheticTarget::channel(CHANNEL), "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelabelError::DeliveryFailed { .. }));
    }

    #[tokio::test]
    async fn embed_is_built_only_when_some_field_is_set() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let empty = EmbedDraft::default();
        let record = synth
            .inject(&SyntheticTarget::channel(CHANNEL), "hi", Some(&empty), None, None)
            .await
            .unwrap();
        assert!(record.embeds.is_empty());

        let thumb_only = EmbedDraft {
            thumbnail: "https://cdn.example/x.png".to_string(),
            ..Default::default()
        };
        let record = synth
            .inject(&SyntheticTarget::channel(CHANNEL), "hi", Some(&thumb_only), None, None)
            .await
            .unwrap();
        assert_eq!(
            record.embeds[0].thumbnail.as_ref().unwrap().url,
            "https://cdn.example/x.png"
        );
        assert_eq!(record.embeds[0].title, None);
    }

    #[tokio::test]
    async fn timestamps_parse_or_fall_back_to_now() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let record = synth
            .inject(
                &SyntheticTarget::channel(CHANNEL),
                "hi",
                None,
                None,
                Some("2024-01-02T03:04:05Z"),
            )
            .await
            .unwrap();
        assert_eq!(record.timestamp.as_deref(), Some("2024-01-02T03:04:05.000Z"));

        let record = synth
            .inject(
                &SyntheticTarget::channel(CHANNEL),
                "hi",
                None,
                None,
                Some("not a timestamp"),
            )
            .await
            .unwrap();
        let fallback = record.timestamp.unwrap();
        assert!(DateTime::parse_from_rfc3339(&fallback).is_ok());
    }

    #[tokio::test]
    async fn quick_action_dispatches_on_mode() {
        let actions = Arc::new(RecordingActions::default());
        let http = RecordingHttp::returning(serde_json::json!({}));
        let synth = synthesizer(StaticDirectory { existing: None }, http, Arc::clone(&actions));

        let quick = QuickAction {
            mode: QuickMode::Inject,
            channel_id: CHANNEL.to_string(),
            content: "hi".to_string(),
            ..Default::default()
        };
        let injected = synth.run_quick_action(&quick).await.unwrap();
        assert!(injected.is_some());
        assert_eq!(actions.received.lock().unwrap().len(), 1);

        let quick = QuickAction {
            mode: QuickMode::Send,
            ..quick
        };
        let sent = synth.run_quick_action(&quick).await.unwrap();
        assert!(sent.is_none());
        assert_eq!(actions.sent.lock().unwrap().len(), 1);
    }
}
