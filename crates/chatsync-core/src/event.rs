use serde::Serialize;

pub const CONNECTED_MESSAGE: &str = "已連線";
pub const USER_DATA_UPDATED_MESSAGE: &str = "使用者資料已更新";

/// Change notifications pushed to every open browser tab.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"userDataUpdated","message":"…","data":"…"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First event on every subscription.
    Connected { message: String },

    /// The shared user data changed; `data` is the full new value.
    UserDataUpdated { message: String, data: String },
}

impl ServerEvent {
    pub fn connected() -> Self {
        ServerEvent::Connected {
            message: CONNECTED_MESSAGE.to_string(),
        }
    }

    pub fn user_data_updated(data: impl Into<String>) -> Self {
        ServerEvent::UserDataUpdated {
            message: USER_DATA_UPDATED_MESSAGE.to_string(),
            data: data.into(),
        }
    }

    /// The `type` tag, also usable as an SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::UserDataUpdated { .. } => "userDataUpdated",
        }
    }

    pub fn to_json(&self) -> String {
        // Only string fields, so serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
