// Control-plane messages sent by streaming clients.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
}

#[derive(Deserialize)]
struct TaggedCommand {
    #[serde(alias = "event")]
    r#type: String,
}

impl ControlCommand {
    /// Parses a text frame. Unknown input yields `None` and is meant to be ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.starts_with('{') {
            let tagged: TaggedCommand = serde_json::from_str(text).ok()?;
            return Self::from_token(&tagged.r#type);
        }
        Self::from_token(text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Start => "start",
            ControlCommand::Stop => "stop",
        }
    }

    // Case-insensitive; the `*Streaming` forms are the legacy event names.
    fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        let matches = |names: [&str; 2]| names.iter().any(|name| token.eq_ignore_ascii_case(name));
        if matches(["start", "startStreaming"]) {
            Some(ControlCommand::Start)
        } else if matches(["stop", "stopStreaming"]) {
            Some(ControlCommand::Stop)
        } else {
            None
        }
    }
}
