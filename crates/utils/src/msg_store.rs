use std::{
    collections::VecDeque,
    sync::{OnceLock, RwLock},
};

use axum::response::sse::Event;
use futures::{StreamExt, TryStreamExt};
use json_patch::Patch;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::log_msg::LogMsg;

const DEFAULT_HISTORY_MAX_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_HISTORY_MAX_ENTRIES: usize = 5000;

struct HistoryConfig {
    max_bytes: usize,
    max_entries: usize,
}

static HISTORY_CONFIG: OnceLock<HistoryConfig> = OnceLock::new();

fn history_config() -> &'static HistoryConfig {
    HISTORY_CONFIG.get_or_init(|| {
        let max_bytes = read_env_usize("MC_EVENT_HISTORY_MAX_BYTES", DEFAULT_HISTORY_MAX_BYTES);
        let max_entries =
            read_env_usize("MC_EVENT_HISTORY_MAX_ENTRIES", DEFAULT_HISTORY_MAX_ENTRIES);

        HistoryConfig {
            max_bytes: normalize_limit(max_bytes, "MC_EVENT_HISTORY_MAX_BYTES"),
            max_entries: normalize_limit(max_entries, "MC_EVENT_HISTORY_MAX_ENTRIES"),
        }
    })
}

fn read_env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(value) => match value.parse::<usize>() {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Invalid {name}='{value}': {err}. Using default {default}.");
                default
            }
        },
        Err(_) => default,
    }
}

fn normalize_limit(value: usize, name: &str) -> usize {
    if value == 0 {
        tracing::warn!("{name} set to 0. Using minimum value 1 instead.");
        1
    } else {
        value
    }
}

#[derive(Clone)]
struct StoredMsg {
    msg: LogMsg,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredMsg>,
    total_bytes: usize,
}

/// Bounded in-memory history plus a broadcast channel, so late subscribers
/// replay recent patches before switching to live messages.
pub struct MsgStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<LogMsg>,
}

impl Default for MsgStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgStore {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(10000);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
        }
    }

    pub fn push(&self, msg: LogMsg) {
        let _ = self.sender.send(msg.clone());
        let bytes = msg.approx_bytes();
        self.inner.write().unwrap().push_msg(msg, bytes);
    }

    pub fn push_patch(&self, patch: Patch) {
        self.push(LogMsg::JsonPatch(patch));
    }

    pub fn push_finished(&self) {
        self.push(LogMsg::Finished);
    }

    pub fn get_receiver(&self) -> broadcast::Receiver<LogMsg> {
        self.sender.subscribe()
    }

    pub fn get_history(&self) -> Vec<LogMsg> {
        self.inner
            .read()
            .unwrap()
            .history
            .iter()
            .map(|s| s.msg.clone())
            .collect()
    }

    /// History then live, as `LogMsg`.
    pub fn history_plus_stream(
        &self,
    ) -> futures::stream::BoxStream<'static, Result<LogMsg, std::io::Error>> {
        let (history, rx) = (self.get_history(), self.get_receiver());

        let hist = futures::stream::iter(history.into_iter().map(Ok::<_, std::io::Error>));
        let live = BroadcastStream::new(rx)
            .filter_map(|res| async move { res.ok().map(Ok::<_, std::io::Error>) });

        Box::pin(hist.chain(live))
    }

    /// Same stream but mapped to `Event` for SSE handlers.
    pub fn sse_stream(&self) -> futures::stream::BoxStream<'static, Result<Event, std::io::Error>> {
        self.history_plus_stream()
            .map_ok(|m| m.to_sse_event())
            .boxed()
    }
}

impl Inner {
    fn push_msg(&mut self, msg: LogMsg, bytes: usize) {
        let limits = history_config();

        while self.history.len() >= limits.max_entries
            || self.total_bytes.saturating_add(bytes) > limits.max_bytes
        {
            if let Some(front) = self.history.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(front.bytes);
            } else {
                break;
            }
        }
        self.history.push_back(StoredMsg { msg, bytes });
        self.total_bytes = self.total_bytes.saturating_add(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(path: &str) -> Patch {
        serde_json::from_value(serde_json::json!([{
            "op": "add",
            "path": path,
            "value": { "hello": "world" }
        }]))
        .expect("valid patch")
    }

    #[test]
    fn history_preserves_push_order() {
        let store = MsgStore::new();
        store.push_patch(patch("/tasks/a"));
        store.push_patch(patch("/tasks/b"));

        let history = store.get_history();
        assert_eq!(history.len(), 2);
        match &history[0] {
            LogMsg::JsonPatch(p) => {
                let value = serde_json::to_value(p).unwrap();
                assert_eq!(value[0]["path"], "/tasks/a");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn receiver_sees_live_messages() {
        let store = MsgStore::new();
        let mut rx = store.get_receiver();
        store.push_finished();

        let msg = rx.recv().await.expect("broadcast message");
        assert!(matches!(msg, LogMsg::Finished));
    }
}
