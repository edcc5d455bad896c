use serde::{Deserialize, Serialize};

/// Messages exchanged between the carousel frame and its parent window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum FrameMessage {
    /// Ask the host to navigate to an application route.
    #[serde(rename = "TMA_NAVIGATE")]
    Navigate(String),
    /// Ask the host to open an absolute URL in place of the suppressed link.
    #[serde(rename = "TMA_HREF")]
    Href(String),
}

impl FrameMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "TMA_NAVIGATE",
            Self::Href(_) => "TMA_HREF",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::Navigate(target) | Self::Href(target) => target,
        }
    }
}

/// Loosely typed inbound message; anything with an unknown `type` still
/// parses so the relay can ignore it instead of rejecting the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<String>,
}

impl From<FrameMessage> for InboundMessage {
    fn from(value: FrameMessage) -> Self {
        Self {
            kind: value.kind().to_string(),
            payload: Some(value.payload().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_uses_parent_window_wire_shape() {
        let json = serde_json::to_value(FrameMessage::Navigate("promotions".into())).expect("json");
        assert_eq!(
            json,
            serde_json::json!({ "type": "TMA_NAVIGATE", "payload": "promotions" })
        );
    }

    #[test]
    fn href_parses_from_wire_shape() {
        let message: FrameMessage = serde_json::from_str(
            r#"{"type":"TMA_HREF","payload":"https://www.ambassadoribet.com/promo"}"#,
        )
        .expect("parse");
        assert_eq!(
            message,
            FrameMessage::Href("https://www.ambassadoribet.com/promo".into())
        );
    }

    #[test]
    fn inbound_message_tolerates_unknown_types() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"type":"RESIZE","payload":null}"#).expect("parse");
        assert_eq!(message.kind, "RESIZE");
        assert_eq!(message.payload, None);
    }
}
