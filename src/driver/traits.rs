use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Element selector for web UI elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Raw CSS selector
    Css(String),
    /// Element whose visible text matches exactly
    Text(String),
    /// Input by placeholder text
    Placeholder(String),
    /// ARIA role with accessible name (role="button", name "Save")
    Role { role: String, name: String },
}

impl Selector {
    pub fn css(css: &str) -> Self {
        Selector::Css(css.to_string())
    }

    pub fn text(text: &str) -> Self {
        Selector::Text(text.to_string())
    }

    pub fn placeholder(placeholder: &str) -> Self {
        Selector::Placeholder(placeholder.to_string())
    }

    pub fn role(role: &str, name: &str) -> Self {
        Selector::Role {
            role: role.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css={}", css),
            Selector::Text(text) => write!(f, "text=\"{}\"", text),
            Selector::Placeholder(p) => write!(f, "placeholder=\"{}\"", p),
            Selector::Role { role, name } => write!(f, "role={}[name=\"{}\"]", role, name),
        }
    }
}

/// One interaction inside a UI step.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Navigate to a URL (relative URLs are joined to the app URL)
    Goto(String),
    Click(Selector),
    Fill(Selector, String),
    /// Press a key while `Selector` has focus
    Press(Selector, String),
    /// Wait until the element is attached, up to timeout ms (0 = driver default)
    WaitFor(Selector, u64),
    /// Fail unless the element becomes visible within the driver's timeout
    ExpectVisible(Selector),
    /// Fixed settle delay in ms
    Pause(u64),
    /// Save a screenshot under the output directory
    Screenshot(String),
    /// Scan the availability calendar day by day and click the first free slot
    PickSlot { from: NaiveDate, max_attempts: u32 },
}

/// A bounded sequence of UI interactions making up one step.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSequence {
    pub label: String,
    pub commands: Vec<UiCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: String,
    /// Path relative to the API base URL, query string included
    pub path: String,
    /// Step-specific headers, on top of the driver's common headers
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    Api(ApiRequest),
    Ui(UiSequence),
}

impl ActionRequest {
    pub fn describe(&self) -> String {
        match self {
            ActionRequest::Api(req) => format!("{} {}", req.method, req.path),
            ActionRequest::Ui(seq) => seq.label.clone(),
        }
    }
}

/// What an action produced, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutcome {
    pub status_code: Option<u16>,
    pub body: Value,
    pub success: bool,
}

impl RawOutcome {
    pub fn http(status: u16, body: Value) -> Self {
        Self {
            status_code: Some(status),
            body,
            success: (200..300).contains(&status),
        }
    }

    pub fn ui(body: Value) -> Self {
        Self {
            status_code: None,
            body,
            success: true,
        }
    }

    /// Look up a dotted path (`data.access_token`) in the body.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let pointer = format!("/{}", path.replace('.', "/"));
        self.body.pointer(&pointer)
    }

    pub fn str_field(&self, path: &str) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }
}

/// The only thing the runner knows about the outside world: perform one
/// request or one UI interaction sequence.
#[async_trait]
pub trait PlatformDriver: Send + Sync {
    /// Short name used in logs ("api", "web")
    fn platform_name(&self) -> &str;

    async fn perform(&self, request: &ActionRequest) -> Result<RawOutcome>;

    /// Best-effort diagnostic capture after a failed step.
    async fn capture_failure(&self, _label: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Availability shown for a single calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotView {
    /// The "No Slots Available" signal
    NoSlots,
    /// Number of selectable time slots
    Slots(usize),
}

/// Per-date view of a provider's availability calendar.
#[async_trait]
pub trait SlotCalendar: Send + Sync {
    async fn open_date(&self, date: NaiveDate) -> Result<SlotView>;

    async fn select_slot(&self, date: NaiveDate, index: usize) -> Result<()>;
}
