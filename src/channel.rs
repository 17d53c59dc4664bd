//! Command channel
//!
//! Owns the link and serializes every device exchange behind one async
//! mutex: the wire is half-duplex, and a second command written before
//! the first reply's terminator arrives corrupts both. The channel never
//! retries; motion commands are not idempotent, so retry policy belongs
//! to the caller.
//!
//! After a timeout the reply may still arrive late; the channel marks the
//! link dirty and discards stale bytes before the next write instead of
//! forcing a reconnect.

use crate::error::MountError;
use crate::protocol::TERMINATOR;
use crate::transport::MountLink;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default per-exchange deadline.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a drain keeps listening once the link goes quiet.
const DRAIN_WINDOW: Duration = Duration::from_millis(25);

/// Replies longer than this are garbage, not protocol.
const MAX_RESPONSE_LEN: usize = 1024;

/// Device verdict on a slew-start command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GotoAck {
    Accepted,
    /// Rejection code byte plus whatever explanation the firmware sent.
    Rejected(String),
}

struct LinkSlot {
    link: Option<Box<dyn MountLink>>,
    dirty: bool,
}

/// Serialized access to one mount link.
pub struct CommandChannel {
    slot: Mutex<LinkSlot>,
    command_timeout: Duration,
}

impl CommandChannel {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(LinkSlot {
                link: None,
                dirty: false,
            }),
            command_timeout,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Install a freshly opened link, replacing any previous one.
    pub async fn attach(&self, link: Box<dyn MountLink>) {
        let mut slot = self.slot.lock().await;
        slot.link = Some(link);
        slot.dirty = false;
    }

    /// Remove and return the link, if any.
    pub async fn detach(&self) -> Option<Box<dyn MountLink>> {
        let mut slot = self.slot.lock().await;
        slot.dirty = false;
        slot.link.take()
    }

    pub async fn is_attached(&self) -> bool {
        self.slot.lock().await.link.is_some()
    }

    /// Send a command and read its `#`-terminated reply, terminator
    /// stripped and whitespace trimmed.
    pub async fn exchange(&self, command: &str) -> Result<String, MountError> {
        let mut slot = self.slot.lock().await;
        let slot = &mut *slot;
        let link = match slot.link.as_mut() {
            Some(link) => link.as_mut(),
            None => return Err(MountError::NotConnected),
        };
        write_command(link, &mut slot.dirty, command).await?;
        match read_terminated(link, command, self.command_timeout).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if e.is_timeout() {
                    slot.dirty = true;
                }
                Err(e)
            }
        }
    }

    /// Send a command that acknowledges with a single unterminated byte
    /// (the `0`/`1` family).
    pub async fn exchange_ack(&self, command: &str) -> Result<u8, MountError> {
        let mut slot = self.slot.lock().await;
        let slot = &mut *slot;
        let link = match slot.link.as_mut() {
            Some(link) => link.as_mut(),
            None => return Err(MountError::NotConnected),
        };
        write_command(link, &mut slot.dirty, command).await?;
        match read_one_byte(link, command, self.command_timeout).await {
            Ok(byte) => Ok(byte),
            Err(e) => {
                if e.is_timeout() {
                    slot.dirty = true;
                }
                Err(e)
            }
        }
    }

    /// Send a slew-start command. The firmware answers `0` when the slew
    /// begins, or a nonzero code byte followed by a `#`-terminated
    /// explanation.
    pub async fn exchange_goto(&self, command: &str) -> Result<GotoAck, MountError> {
        let mut slot = self.slot.lock().await;
        let slot = &mut *slot;
        let link = match slot.link.as_mut() {
            Some(link) => link.as_mut(),
            None => return Err(MountError::NotConnected),
        };
        write_command(link, &mut slot.dirty, command).await?;
        let code = match read_one_byte(link, command, self.command_timeout).await {
            Ok(byte) => byte,
            Err(e) => {
                if e.is_timeout() {
                    slot.dirty = true;
                }
                return Err(e);
            }
        };
        if code == b'0' {
            return Ok(GotoAck::Accepted);
        }
        // Collect the trailing explanation; if it never terminates, keep
        // the code byte and flag the link for a drain.
        let detail = match read_terminated(link, command, self.command_timeout).await {
            Ok(message) => format!("{}{}", code as char, message),
            Err(e) => {
                if e.is_timeout() {
                    slot.dirty = true;
                }
                (code as char).to_string()
            }
        };
        Ok(GotoAck::Rejected(detail))
    }

    /// Send a command that produces no reply at all (motion start/stop).
    pub async fn send(&self, command: &str) -> Result<(), MountError> {
        let mut slot = self.slot.lock().await;
        let slot = &mut *slot;
        let link = match slot.link.as_mut() {
            Some(link) => link.as_mut(),
            None => return Err(MountError::NotConnected),
        };
        write_command(link, &mut slot.dirty, command).await
    }
}

/// Drain stale bytes if the previous exchange timed out, then write.
async fn write_command(
    link: &mut dyn MountLink,
    dirty: &mut bool,
    command: &str,
) -> Result<(), MountError> {
    if *dirty {
        let discarded = drain(link).await;
        if discarded > 0 {
            debug!(discarded, "drained late bytes from previous exchange");
        }
        *dirty = false;
    }
    link.write_all(command.as_bytes()).await
}

/// Discard whatever is sitting in the receive path. Returns the byte
/// count; errors just end the drain.
async fn drain(link: &mut dyn MountLink) -> usize {
    let mut buf = [0u8; 256];
    let mut discarded = 0;
    loop {
        match timeout(DRAIN_WINDOW, link.read_some(&mut buf)).await {
            Ok(Ok(n)) => discarded += n,
            Ok(Err(_)) | Err(_) => return discarded,
        }
    }
}

async fn read_terminated(
    link: &mut dyn MountLink,
    command: &str,
    deadline: Duration,
) -> Result<String, MountError> {
    let started = tokio::time::Instant::now();
    let mut collected: Vec<u8> = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let remaining = deadline
            .checked_sub(started.elapsed())
            .filter(|d| !d.is_zero())
            .ok_or_else(|| MountError::timeout(command, deadline.as_millis() as u64))?;
        let n = match timeout(remaining, link.read_some(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Err(MountError::timeout(command, deadline.as_millis() as u64)),
        };
        for &byte in &buf[..n] {
            if byte == TERMINATOR {
                let text = String::from_utf8_lossy(&collected).trim().to_string();
                return Ok(text);
            }
            collected.push(byte);
            if collected.len() > MAX_RESPONSE_LEN {
                warn!(command, "unterminated response overflow");
                return Err(MountError::malformed(
                    command,
                    String::from_utf8_lossy(&collected[..64]),
                ));
            }
        }
    }
}

async fn read_one_byte(
    link: &mut dyn MountLink,
    command: &str,
    deadline: Duration,
) -> Result<u8, MountError> {
    let mut buf = [0u8; 1];
    match timeout(deadline, link.read_some(&mut buf)).await {
        Ok(result) => {
            result?;
            Ok(buf[0])
        }
        Err(_) => Err(MountError::timeout(command, deadline.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct ScriptInner {
        /// Reply queued for each accepted write; `None` swallows the
        /// command without answering.
        replies: VecDeque<Option<Vec<u8>>>,
        /// Bytes currently readable.
        pending: Vec<u8>,
        /// Commands seen, in write order.
        writes: Vec<String>,
        /// Set if a write landed while a previous reply was unread.
        overlapped: bool,
    }

    #[derive(Clone)]
    struct ScriptedLink(Arc<StdMutex<ScriptInner>>);

    impl ScriptedLink {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(ScriptInner::default())))
        }

        fn push_reply(&self, reply: Option<&[u8]>) {
            self.0
                .lock()
                .unwrap()
                .replies
                .push_back(reply.map(|r| r.to_vec()));
        }

        fn inject_stale(&self, bytes: &[u8]) {
            self.0.lock().unwrap().pending.extend_from_slice(bytes);
        }

        fn writes(&self) -> Vec<String> {
            self.0.lock().unwrap().writes.clone()
        }

        fn overlapped(&self) -> bool {
            self.0.lock().unwrap().overlapped
        }
    }

    #[async_trait]
    impl MountLink for ScriptedLink {
        async fn write_all(&mut self, data: &[u8]) -> Result<(), MountError> {
            // A tiny pause widens the race window for the serialization test.
            tokio::time::sleep(Duration::from_millis(1)).await;
            let mut inner = self.0.lock().unwrap();
            if !inner.pending.is_empty() {
                inner.overlapped = true;
            }
            inner.writes.push(String::from_utf8_lossy(data).to_string());
            if let Some(reply) = inner.replies.pop_front().flatten() {
                inner.pending.extend_from_slice(&reply);
            }
            Ok(())
        }

        async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, MountError> {
            loop {
                {
                    let mut inner = self.0.lock().unwrap();
                    if !inner.pending.is_empty() {
                        let n = inner.pending.len().min(buf.len());
                        buf[..n].copy_from_slice(&inner.pending[..n]);
                        inner.pending.drain(..n);
                        return Ok(n);
                    }
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    #[tokio::test]
    async fn test_exchange_strips_terminator() {
        let link = ScriptedLink::new();
        link.push_reply(Some(b"12:34:56#"));
        let channel = CommandChannel::new(DEFAULT_COMMAND_TIMEOUT);
        channel.attach(Box::new(link.clone())).await;

        let reply = channel.exchange(":GR#").await.unwrap();
        assert_eq!(reply, "12:34:56");
        assert_eq!(link.writes(), vec![":GR#".to_string()]);
    }

    #[tokio::test]
    async fn test_exchange_without_link_is_not_connected() {
        let channel = CommandChannel::new(DEFAULT_COMMAND_TIMEOUT);
        let err = channel.exchange(":GR#").await.unwrap_err();
        assert!(matches!(err, MountError::NotConnected));
    }

    #[tokio::test]
    async fn test_timeout_then_drain_recovers_the_link() {
        let link = ScriptedLink::new();
        link.push_reply(None); // first command never answered
        link.push_reply(Some(b"+40:00:00#"));
        let channel = CommandChannel::new(Duration::from_millis(50));
        channel.attach(Box::new(link.clone())).await;

        let err = channel.exchange(":GR#").await.unwrap_err();
        assert!(err.is_timeout());

        // The late reply lands after the deadline...
        link.inject_stale(b"12:00:00#");

        // ...and must not be mistaken for the next command's reply.
        let reply = channel.exchange(":GD#").await.unwrap();
        assert_eq!(reply, "+40:00:00");
    }

    #[tokio::test]
    async fn test_goto_ack_accepted_and_rejected() {
        let link = ScriptedLink::new();
        link.push_reply(Some(b"0"));
        link.push_reply(Some(b"1Object below horizon#"));
        let channel = CommandChannel::new(DEFAULT_COMMAND_TIMEOUT);
        channel.attach(Box::new(link.clone())).await;

        assert_eq!(channel.exchange_goto(":MS#").await.unwrap(), GotoAck::Accepted);
        match channel.exchange_goto(":MS#").await.unwrap() {
            GotoAck::Rejected(detail) => assert_eq!(detail, "1Object below horizon"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_never_interleave() {
        let link = ScriptedLink::new();
        for _ in 0..40 {
            link.push_reply(Some(b"ok#"));
        }
        let channel = Arc::new(CommandChannel::new(DEFAULT_COMMAND_TIMEOUT));
        channel.attach(Box::new(link.clone())).await;

        let a = {
            let channel = channel.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    channel.exchange(":GR#").await.unwrap();
                }
            })
        };
        let b = {
            let channel = channel.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    channel.exchange(":GD#").await.unwrap();
                }
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert!(!link.overlapped(), "a write landed mid-exchange");
        assert_eq!(link.writes().len(), 40);
    }
}
