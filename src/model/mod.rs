//! 宿主记录结构模块
//!
//! 消息 / 作者 / 嵌入卡片等对象的字段名由宿主端固定，本模块只声明
//! 引擎会触碰的类型化子集，其余传输字段不在本层承载。

use serde::{Deserialize, Serialize};

/// 作者记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<bool>,
}

/// 提及条目（引擎只重映射其 id）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
}

/// 消息引用，三个标识符彼此独立、均可缺省
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

/// 嵌入卡片
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
}

/// 消息记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Mention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<EmbedRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// 事件总线上的动作
///
/// 按宿主的 `type` 字段区分；引擎只关心三类消息事件，其余动作原样放行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DispatchAction {
    #[serde(rename = "MESSAGE_CREATE")]
    MessageCreate {
        #[serde(
            default,
            alias = "messageRecord",
            skip_serializing_if = "Option::is_none"
        )]
        message: Option<MessageRecord>,
    },
    #[serde(rename = "MESSAGE_UPDATE")]
    MessageUpdate {
        #[serde(
            default,
            alias = "messageRecord",
            skip_serializing_if = "Option::is_none"
        )]
        message: Option<MessageRecord>,
    },
    #[serde(rename = "LOAD_MESSAGES_SUCCESS")]
    MessagesLoaded {
        #[serde(default)]
        messages: Vec<MessageRecord>,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_action_tags_round_trip() {
        let action: DispatchAction = serde_json::from_value(serde_json::json!({
            "type": "MESSAGE_CREATE",
            "message": { "id": "1", "content": "hi" }
        }))
        .unwrap();
        match action {
            DispatchAction::MessageCreate { message } => {
                assert_eq!(message.unwrap().content.as_deref(), Some("hi"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn dispatch_action_accepts_message_record_alias() {
        let action: DispatchAction = serde_json::from_value(serde_json::json!({
            "type": "MESSAGE_UPDATE",
            "messageRecord": { "id": "2" }
        }))
        .unwrap();
        match action {
            DispatchAction::MessageUpdate { message } => {
                assert_eq!(message.unwrap().id.as_deref(), Some("2"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn unknown_action_maps_to_other() {
        let action: DispatchAction =
            serde_json::from_value(serde_json::json!({ "type": "TYPING_START" })).unwrap();
        assert_eq!(action, DispatchAction::Other);
    }
}
