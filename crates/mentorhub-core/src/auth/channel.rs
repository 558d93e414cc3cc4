//! Cross-tab session channel.
//!
//! Every tab of a profile opens the same named channel on a
//! [`BroadcastHub`]. Like a browser `BroadcastChannel`, a post is delivered to
//! every other subscriber on the channel but never back to the tab that sent
//! it.
//!
//! Tabs in one process share the hub directly. Separate processes on the
//! same profile meet through an append-only event file per channel under
//! `<profile>/channels/`: each post is appended as one JSON line tagged with
//! the posting hub's id, and every hub with subscribers follows the file and
//! relays lines from other hubs to its own endpoints.

use std::collections::HashMap;
use std::io::{ErrorKind, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Name of the channel carrying session events.
pub const AUTH_CHANNEL_NAME: &str = "auth";

/// Buffered messages per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 16;

/// How often a hub checks the profile event file for new lines.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Event files past this size are emptied when a hub first opens them.
const MAX_EVENT_FILE_BYTES: u64 = 64 * 1024;

/// Origin stamped on messages relayed from another process.
const REMOTE_ORIGIN: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMessage {
    SignIn,
    SignOut,
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: u64,
    message: AuthMessage,
}

/// One line of a profile event file.
#[derive(Debug, Serialize, Deserialize)]
struct ChannelRecord {
    hub: String,
    message: AuthMessage,
}

/// Event files of one profile directory.
struct ProfileTransport {
    dir: PathBuf,
    hub_id: String,
}

impl ProfileTransport {
    fn event_file(&self, channel: &str) -> PathBuf {
        let file_name: String = channel
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.jsonl", file_name))
    }

    fn append(&self, channel: &str, message: AuthMessage) -> std::io::Result<()> {
        let record = ChannelRecord {
            hub: self.hub_id.clone(),
            message,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        std::fs::create_dir_all(&self.dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.event_file(channel))?;
        // One write per record so concurrent appenders never interleave lines
        file.write_all(&line)
    }

    fn compact(&self, channel: &str) {
        let path = self.event_file(channel);
        let oversized = std::fs::metadata(&path)
            .map(|m| m.len() > MAX_EVENT_FILE_BYTES)
            .unwrap_or(false);
        if !oversized {
            return;
        }
        match std::fs::OpenOptions::new().write(true).open(&path).and_then(|f| f.set_len(0)) {
            Ok(()) => debug!(path = %path.display(), "Emptied channel event file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to empty channel event file"),
        }
    }
}

#[derive(Default)]
struct HubInner {
    channels: Mutex<HashMap<String, broadcast::Sender<Envelope>>>,
    watchers: Mutex<HashMap<String, JoinHandle<()>>>,
    next_id: AtomicU64,
    transport: Option<ProfileTransport>,
}

impl HubInner {
    /// Start relaying other processes' posts on `channel`, once per hub.
    fn ensure_watcher(&self, channel: &str, sender: &broadcast::Sender<Envelope>) {
        let Some(transport) = &self.transport else {
            return;
        };
        let mut watchers = self
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if watchers.get(channel).is_some_and(|w| !w.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(channel, "No async runtime, not following other processes");
            return;
        };

        let path = transport.event_file(channel);
        // Only events posted from now on are relayed
        let offset = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let handle = runtime.spawn(follow_event_file(
            path,
            transport.hub_id.clone(),
            sender.clone(),
            offset,
        ));
        debug!(channel, offset, "Following channel event file");
        watchers.insert(channel.to_string(), handle);
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        let watchers = self
            .watchers
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, handle) in watchers.drain() {
            handle.abort();
        }
    }
}

async fn follow_event_file(
    path: PathBuf,
    hub_id: String,
    sender: broadcast::Sender<Envelope>,
    mut offset: u64,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        ticker.tick().await;
        match read_new_records(&path, offset).await {
            Ok((records, next)) => {
                offset = next;
                for record in records.into_iter().filter(|r| r.hub != hub_id) {
                    debug!(message = ?record.message, from = %record.hub, "Relaying post from another process");
                    let _ = sender.send(Envelope {
                        origin: REMOTE_ORIGIN,
                        message: record.message,
                    });
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => offset = 0,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read channel event file"),
        }
    }
}

/// Complete lines past `offset`, and the offset just after the last one.
async fn read_new_records(path: &Path, offset: u64) -> std::io::Result<(Vec<ChannelRecord>, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    // A shorter file was emptied and starts over
    let start = if len < offset { 0 } else { offset };
    if len == start {
        return Ok((Vec::new(), start));
    }

    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
        return Ok((Vec::new(), start));
    };
    let complete = &buf[..=last_newline];

    let records = complete
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_slice::<ChannelRecord>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Skipping malformed channel event");
                None
            }
        })
        .collect();
    Ok((records, start + complete.len() as u64))
}

/// Named channels shared by the tabs of one profile.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// Hub for tabs inside this process only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that also reaches every other process using `profile_dir`.
    pub fn for_profile(profile_dir: PathBuf) -> Self {
        let hub_id = uuid::Uuid::new_v4().to_string();
        debug!(hub = %hub_id, profile = %profile_dir.display(), "Opened profile broadcast hub");
        Self {
            inner: Arc::new(HubInner {
                channels: Mutex::default(),
                watchers: Mutex::default(),
                next_id: AtomicU64::new(0),
                transport: Some(ProfileTransport {
                    dir: profile_dir.join("channels"),
                    hub_id,
                }),
            }),
        }
    }

    /// Open a handle on a named channel. Each handle is a distinct endpoint.
    pub fn open(&self, name: &str) -> AuthChannel {
        let sender = {
            let mut channels = self
                .inner
                .channels
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            channels
                .entry(name.to_string())
                .or_insert_with(|| {
                    if let Some(transport) = &self.inner.transport {
                        transport.compact(name);
                    }
                    broadcast::channel(CHANNEL_CAPACITY).0
                })
                .clone()
        };
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(channel = name, endpoint = id, "Opened broadcast channel");
        AuthChannel {
            name: name.to_string(),
            id,
            sender,
            hub: self.inner.clone(),
        }
    }
}

/// One tab's endpoint on a named channel.
#[derive(Clone)]
pub struct AuthChannel {
    name: String,
    id: u64,
    sender: broadcast::Sender<Envelope>,
    hub: Arc<HubInner>,
}

impl AuthChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post to every other endpoint. Posting with nobody listening is fine.
    pub fn post(&self, message: AuthMessage) {
        let envelope = Envelope {
            origin: self.id,
            message,
        };
        match self.sender.send(envelope) {
            Ok(receivers) => debug!(channel = %self.name, ?message, receivers, "Posted"),
            Err(_) => debug!(channel = %self.name, ?message, "Posted with no local subscribers"),
        }

        if let Some(transport) = &self.hub.transport {
            if let Err(e) = transport.append(&self.name, message) {
                warn!(channel = %self.name, error = %e, "Failed to relay post to other processes");
            }
        }
    }

    pub fn subscribe(&self) -> AuthSubscription {
        let receiver = self.sender.subscribe();
        self.hub.ensure_watcher(&self.name, &self.sender);
        AuthSubscription {
            id: self.id,
            receiver,
        }
    }
}

pub struct AuthSubscription {
    id: u64,
    receiver: broadcast::Receiver<Envelope>,
}

impl AuthSubscription {
    /// Next message posted by another endpoint, or `None` once the channel
    /// is gone.
    pub async fn recv(&mut self) -> Option<AuthMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.origin == self.id => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth channel subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
