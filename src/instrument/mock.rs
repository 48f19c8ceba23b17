//! A scripted instrument bus for tests and dry runs.
//!
//! `MockBus` answers queries from a script instead of hardware: sticky
//! responses repeat for every occurrence of a command, queued replies are
//! consumed once each (and take precedence), and replies can be error or
//! delayed variants to exercise failure and timeout paths. Every write and
//! query is recorded for later inspection, as is the close call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::core::ScpiBus;

#[derive(Clone, Debug)]
enum Reply {
    Value(String),
    Error(String),
    Delayed(Duration, String),
}

#[derive(Default)]
struct Inner {
    sticky: Mutex<HashMap<String, String>>,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    write_errors: Mutex<Vec<(String, String)>>,
    writes: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
    closed: AtomicBool,
}

/// A scripted [`ScpiBus`].
///
/// Clones share the same script and recorded history, so a test can keep a
/// handle while the pipeline under test owns another.
#[derive(Clone, Default)]
pub struct MockBus {
    inner: Arc<Inner>,
}

impl MockBus {
    /// A bus with an empty script; unexpected queries error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every occurrence of `command` with `value`.
    pub fn with_response(self, command: &str, value: &str) -> Self {
        self.set_response(command, value);
        self
    }

    /// Answer every occurrence of `command` with `value` (non-consuming form).
    pub fn set_response(&self, command: &str, value: &str) {
        lock(&self.inner.sticky).insert(command.to_string(), value.to_string());
    }

    /// Queue a one-shot reply for `command`; consumed before sticky replies.
    pub fn push_reply(&self, command: &str, value: &str) {
        self.push(command, Reply::Value(value.to_string()));
    }

    /// Queue a one-shot query failure for `command`.
    pub fn push_query_error(&self, command: &str, message: &str) {
        self.push(command, Reply::Error(message.to_string()));
    }

    /// Queue a one-shot reply delivered only after `delay`.
    pub fn push_delayed_reply(&self, command: &str, delay: Duration, value: &str) {
        self.push(command, Reply::Delayed(delay, value.to_string()));
    }

    /// Fail any write whose command contains `fragment`.
    pub fn fail_writes_containing(&self, fragment: &str, message: &str) {
        lock(&self.inner.write_errors).push((fragment.to_string(), message.to_string()));
    }

    fn push(&self, command: &str, reply: Reply) {
        lock(&self.inner.queued)
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every command sent through [`ScpiBus::write`], in order.
    pub fn writes(&self) -> Vec<String> {
        lock(&self.inner.writes).clone()
    }

    /// Every command sent through [`ScpiBus::query`], in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.inner.queries).clone()
    }

    /// Whether [`ScpiBus::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Mutex recovery: the lock only guards plain data, so a poisoned lock (a
/// panicked test thread) still yields usable state.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl ScpiBus for MockBus {
    async fn query(&self, command: &str) -> Result<String> {
        lock(&self.inner.queries).push(command.to_string());

        let queued = lock(&self.inner.queued)
            .get_mut(command)
            .and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(reply) => reply,
            None => match lock(&self.inner.sticky).get(command) {
                Some(value) => Reply::Value(value.clone()),
                None => return Err(anyhow!("unexpected query: {command}")),
            },
        };

        match reply {
            Reply::Value(value) => Ok(value),
            Reply::Error(message) => Err(anyhow!("{message}")),
            Reply::Delayed(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }
    }

    async fn write(&self, command: &str) -> Result<()> {
        lock(&self.inner.writes).push(command.to_string());
        let failure = lock(&self.inner.write_errors)
            .iter()
            .find(|(fragment, _)| command.contains(fragment))
            .map(|(_, message)| message.clone());
        match failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_replies_take_precedence_and_drain() {
        let bus = MockBus::new().with_response("OUTP? 0", "1.0");
        bus.push_reply("OUTP? 0", "9.0");

        assert_eq!(bus.query("OUTP? 0").await.unwrap(), "9.0");
        assert_eq!(bus.query("OUTP? 0").await.unwrap(), "1.0");
        assert_eq!(bus.query("OUTP? 0").await.unwrap(), "1.0");
    }

    #[tokio::test]
    async fn test_unexpected_query_errors() {
        let bus = MockBus::new();
        let err = bus.query("*IDN?").await.unwrap_err();
        assert!(err.to_string().contains("unexpected query"));
    }

    #[tokio::test]
    async fn test_write_failure_injection() {
        let bus = MockBus::new();
        bus.fail_writes_containing(":MMEM:LOAD:CORR", "no such file");

        assert!(bus.write(":SENS1:SWE:POIN 1601").await.is_ok());
        assert!(bus.write(":MMEM:LOAD:CORR \"cal.corr\"").await.is_err());
        assert_eq!(bus.writes().len(), 2, "failed writes are still recorded");
    }

    #[tokio::test]
    async fn test_close_is_observable_through_clones() {
        let bus = MockBus::new();
        let mut owned = bus.clone();
        owned.close().await.unwrap();
        assert!(bus.is_closed());
    }
}
