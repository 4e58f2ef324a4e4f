use super::ApiResponse;
use crate::controller::LightUpdate;
use crate::entity::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client → Server message types
///
/// Fields are kept as raw JSON and decoded by the same rules as the HTTP
/// bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "set_color")]
    SetColor {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    #[serde(rename = "toggle")]
    Toggle {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
}

/// Server → Client: outcome of a client request
#[derive(Debug, Clone, Serialize)]
pub struct ReplyMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub message: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ReplyMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            msg_type: "error".to_string(),
            message: message.into(),
            data: Map::new(),
        }
    }
}

impl From<ApiResponse> for ReplyMessage {
    /// `{"success": m, ...}` becomes a `success` reply carrying the other
    /// fields; `{"error": m}` becomes an `error` reply.
    fn from((status, body): ApiResponse) -> Self {
        let mut data = match body.0 {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let key = if status.is_success() { "success" } else { "error" };
        let message = match data.remove(key) {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        if status.is_success() {
            Self {
                msg_type: "success".to_string(),
                message,
                data,
            }
        } else {
            Self::error(message)
        }
    }
}

/// Server → Client: light change applied by any client
#[derive(Debug, Clone, Serialize)]
pub struct LightUpdateMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub entity_id: EntityId,
    pub affected: Vec<EntityId>,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
    pub is_on: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<LightUpdate> for LightUpdateMessage {
    fn from(update: LightUpdate) -> Self {
        Self {
            msg_type: "light_update".to_string(),
            entity_id: update.entity_id,
            affected: update.affected,
            red: update.red,
            green: update.green,
            blue: update.blue,
            brightness: update.brightness,
            is_on: update.is_on,
            timestamp: update.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, Json};
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "set_color", "entity": 1, "red": 255, "is_on": true}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SetColor { fields } => {
                assert_eq!(fields["entity"], 1);
                assert_eq!(fields["red"], 255);
                assert!(!fields.contains_key("type"));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "toggle", "entity": 3}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Toggle { .. }));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "dance"}"#).is_err());
    }

    #[test]
    fn test_reply_from_success_response() {
        let reply = ReplyMessage::from((
            StatusCode::OK,
            Json(json!({"success": "Color updated successfully", "entity_id": 2})),
        ));

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["type"], "success");
        assert_eq!(value["message"], "Color updated successfully");
        assert_eq!(value["entity_id"], 2);
        assert!(value.get("success").is_none());
    }

    #[test]
    fn test_reply_from_error_response() {
        let reply = ReplyMessage::from((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Entity not found"})),
        ));

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "Entity not found"}));
    }

    #[test]
    fn test_light_update_message() {
        let update = LightUpdate {
            entity_id: 1,
            affected: vec![1, 2],
            red: 10,
            green: 20,
            blue: 30,
            brightness: 255,
            is_on: true,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(LightUpdateMessage::from(update)).unwrap();
        assert_eq!(value["type"], "light_update");
        assert_eq!(value["affected"], json!([1, 2]));
        assert_eq!(value["brightness"], 255);
    }
}
