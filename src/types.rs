use serde::{Deserialize, Serialize};

/// Prefix of every record on the generation event stream.
pub const DATA_PREFIX: &str = "data: ";
/// Payload of the record that ends a generation stream. Not JSON.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Legacy in-band marker: a `text` frame containing it restarts the accumulator.
pub const RESTART_MARKER: &str = "[RESET]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Thought,
    Text,
    Status,
    Profile,
    Reset,
}

/// One unit of the streamed generation protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub content: String,
}

impl StreamFrame {
    pub fn new(kind: FrameKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self::new(FrameKind::Thought, content)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, content)
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::new(FrameKind::Status, content)
    }

    pub fn reset() -> Self {
        Self::new(FrameKind::Reset, String::new())
    }

    /// Builds a `profile` frame carrying `payload` as a JSON-encoded string.
    pub fn profile<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(FrameKind::Profile, serde_json::to_string(payload)?))
    }

    /// Serializes the frame as a complete wire record: `data: <json>\n\n`.
    pub fn to_record(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{DATA_PREFIX}{}\n\n", serde_json::to_string(self)?))
    }
}

/// The terminating wire record.
pub fn done_record() -> String {
    format!("{DATA_PREFIX}{DONE_SENTINEL}\n\n")
}

/// JSON body of every non-2xx API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeStyle {
    Minimal,
    #[default]
    Professional,
    Creative,
}

impl ReadmeStyle {
    pub fn label(&self) -> &'static str {
        match self {
            ReadmeStyle::Minimal => "minimal",
            ReadmeStyle::Professional => "professional",
            ReadmeStyle::Creative => "creative",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadmeRequest {
    pub username: String,
    #[serde(default)]
    pub style: ReadmeStyle,
    #[serde(default = "default_true")]
    pub include_stats: bool,
    #[serde(default = "default_true")]
    pub include_languages: bool,
    #[serde(default = "default_true")]
    pub refine: bool,
    #[serde(default)]
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedRequest {
    pub username: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizeRequest {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRequest {
    pub username: String,
    /// Widget theme whose palette the page should use.
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub stream_id: Option<String>,
}

/// Body of `/api/analyze` and `/api/recommend-theme`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub username: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uses_type_tag_on_the_wire() {
        let record = StreamFrame::status("Fetching").to_record().unwrap();
        assert_eq!(record, "data: {\"type\":\"status\",\"content\":\"Fetching\"}\n\n");
    }

    #[test]
    fn newlines_in_content_stay_on_one_line() {
        let record = StreamFrame::text("line one\nline two").to_record().unwrap();
        assert_eq!(record.matches('\n').count(), 2);
        assert!(record.ends_with("\n\n"));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let parsed = serde_json::from_str::<StreamFrame>(r#"{"type":"diagram","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn profile_frame_carries_json_string() {
        let frame = StreamFrame::profile(&serde_json::json!({ "login": "octocat" })).unwrap();
        assert_eq!(frame.kind, FrameKind::Profile);
        assert_eq!(frame.content, r#"{"login":"octocat"}"#);
    }

    #[test]
    fn readme_request_defaults() {
        let req: ReadmeRequest = serde_json::from_str(r#"{"username":"octocat"}"#).unwrap();
        assert_eq!(req.style, ReadmeStyle::Professional);
        assert!(req.include_stats && req.include_languages && req.refine);
        assert!(req.stream_id.is_none());
    }

    #[test]
    fn portfolio_request_theme_is_optional() {
        let req: PortfolioRequest = serde_json::from_str(r#"{"username":"octocat"}"#).unwrap();
        assert!(req.theme.is_none());
        let req: PortfolioRequest =
            serde_json::from_str(r#"{"username":"octocat","theme":"dark","stream_id":"p1"}"#).unwrap();
        assert_eq!(req.theme.as_deref(), Some("dark"));
        assert_eq!(req.stream_id.as_deref(), Some("p1"));
    }

    #[test]
    fn done_record_is_terminated() {
        assert_eq!(done_record(), "data: [DONE]\n\n");
    }
}
