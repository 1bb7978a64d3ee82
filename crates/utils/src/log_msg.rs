use axum::response::sse::Event;
use json_patch::Patch;
use serde::{Deserialize, Serialize};

/// A single message on the live event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum LogMsg {
    JsonPatch(Patch),
    Finished,
}

impl LogMsg {
    pub fn to_sse_event(&self) -> Event {
        match self {
            LogMsg::JsonPatch(patch) => Event::default()
                .event("json_patch")
                .data(serde_json::to_string(patch).unwrap_or_default()),
            LogMsg::Finished => Event::default().event("finished").data(""),
        }
    }

    /// Approximate in-memory footprint, used for history trimming.
    pub fn approx_bytes(&self) -> usize {
        match self {
            LogMsg::JsonPatch(patch) => serde_json::to_string(patch)
                .map(|s| s.len())
                .unwrap_or(2),
            LogMsg::Finished => 8,
        }
    }
}
