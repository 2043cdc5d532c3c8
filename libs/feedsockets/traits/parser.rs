/// A data frame received from (or sent to) a WebSocket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Get the message as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WsMessage::Text(_) => None,
            WsMessage::Binary(b) => Some(b),
        }
    }

    /// Borrow the payload as UTF-8 text, decoding binary frames lossily
    pub fn text_lossy(&self) -> std::borrow::Cow<'_, str> {
        match self {
            WsMessage::Text(s) => std::borrow::Cow::Borrowed(s),
            WsMessage::Binary(b) => String::from_utf8_lossy(b),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }

    pub fn len(&self) -> usize {
        match self {
            WsMessage::Text(s) => s.len(),
            WsMessage::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for WsMessage {
    fn from(value: &str) -> Self {
        WsMessage::Text(value.to_string())
    }
}

impl From<String> for WsMessage {
    fn from(value: String) -> Self {
        WsMessage::Text(value)
    }
}
