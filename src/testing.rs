// Test doubles for the collaborators

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{
    composer::{ComposerError, InputStatus, MediaComposer},
    probe::OutputProber,
};

/// Call received by the mock composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerCall {
    Create { name: String, url: String },
    SetVisible { name: String, visible: bool },
    Remove { name: String },
    Kick { key: String },
}

struct MockInput {
    url: String,
    visible: bool,
    polls: u32,
}

/// In-memory composer
pub struct MockComposer {
    calls: Mutex<Vec<ComposerCall>>,
    inputs: Mutex<HashMap<String, MockInput>>,

    /// Status polls before an input reports Playing
    polls_until_playing: u32,

    /// Inputs whose URL ends with one of these keys never play
    stalled_keys: Mutex<HashSet<String>>,

    /// Inputs whose URL ends with one of these keys report Error
    broken_keys: Mutex<HashSet<String>>,

    unavailable: AtomicBool,

    /// Kicks wait while this is false
    kicks_open: watch::Sender<bool>,
}

impl MockComposer {
    pub fn new() -> MockComposer {
        MockComposer::with_polls_until_playing(1)
    }

    pub fn with_polls_until_playing(polls: u32) -> MockComposer {
        MockComposer {
            calls: Mutex::new(Vec::new()),
            inputs: Mutex::new(HashMap::new()),
            polls_until_playing: polls,
            stalled_keys: Mutex::new(HashSet::new()),
            broken_keys: Mutex::new(HashSet::new()),
            unavailable: AtomicBool::new(false),
            kicks_open: watch::Sender::new(true),
        }
    }

    pub fn stall_key(&self, key: &str) {
        self.stalled_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn break_key(&self, key: &str) {
        self.broken_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes kicks block until released. Blocked kicks are already recorded.
    pub fn hold_kicks(&self) {
        self.kicks_open.send_replace(false);
    }

    pub fn release_kicks(&self) {
        self.kicks_open.send_replace(true);
    }

    pub fn calls(&self) -> Vec<ComposerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kicked(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ComposerCall::Kick { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ComposerCall::Create { .. }))
            .count()
    }

    /// URLs of the inputs still present
    pub fn input_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .inputs
            .lock()
            .unwrap()
            .values()
            .map(|i| i.url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// URLs of the visible inputs
    pub fn visible_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .inputs
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.visible)
            .map(|i| i.url.clone())
            .collect();
        urls.sort();
        urls
    }

    fn record(&self, call: ComposerCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_available(&self) -> Result<(), ComposerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ComposerError::Unavailable("mock offline".to_string()));
        }

        Ok(())
    }

    fn not_found(name: &str) -> ComposerError {
        ComposerError::Request {
            request: "mock".to_string(),
            code: 600,
            comment: format!("no input named {}", name),
        }
    }
}

fn url_matches(url: &str, keys: &HashSet<String>) -> bool {
    keys.iter().any(|k| url.ends_with(&format!("/{}", k)))
}

#[async_trait]
impl MediaComposer for MockComposer {
    async fn create_input(&self, name: &str, url: &str) -> Result<(), ComposerError> {
        self.check_available()?;

        self.record(ComposerCall::Create {
            name: name.to_string(),
            url: url.to_string(),
        });

        self.inputs.lock().unwrap().insert(
            name.to_string(),
            MockInput {
                url: url.to_string(),
                visible: false,
                polls: 0,
            },
        );

        Ok(())
    }

    async fn set_visible(&self, name: &str, visible: bool) -> Result<(), ComposerError> {
        self.check_available()?;

        self.record(ComposerCall::SetVisible {
            name: name.to_string(),
            visible,
        });

        match self.inputs.lock().unwrap().get_mut(name) {
            Some(input) => {
                input.visible = visible;
                Ok(())
            }
            None => Err(MockComposer::not_found(name)),
        }
    }

    async fn remove_input(&self, name: &str) -> Result<(), ComposerError> {
        self.check_available()?;

        self.record(ComposerCall::Remove {
            name: name.to_string(),
        });

        match self.inputs.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(MockComposer::not_found(name)),
        }
    }

    async fn get_input_status(&self, name: &str) -> Result<InputStatus, ComposerError> {
        self.check_available()?;

        let stalled = self.stalled_keys.lock().unwrap().clone();
        let broken = self.broken_keys.lock().unwrap().clone();

        let mut inputs = self.inputs.lock().unwrap();

        let input = match inputs.get_mut(name) {
            Some(i) => i,
            None => return Err(MockComposer::not_found(name)),
        };

        if url_matches(&input.url, &broken) {
            return Ok(InputStatus::Error);
        }

        if url_matches(&input.url, &stalled) {
            return Ok(InputStatus::Buffering);
        }

        input.polls += 1;

        if input.polls >= self.polls_until_playing {
            Ok(InputStatus::Playing)
        } else {
            Ok(InputStatus::Buffering)
        }
    }

    async fn kick_publisher(&self, key: &str) -> Result<(), ComposerError> {
        self.record(ComposerCall::Kick {
            key: key.to_string(),
        });

        let mut open = self.kicks_open.subscribe();
        let _ = open.wait_for(|o| *o).await;

        Ok(())
    }
}

/// Prober with a switchable answer
pub struct MockProber {
    reachable: AtomicBool,
    probes: AtomicU32,
}

impl MockProber {
    pub fn new(reachable: bool) -> MockProber {
        MockProber {
            reachable: AtomicBool::new(reachable),
            probes: AtomicU32::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputProber for MockProber {
    async fn probe_reachable(&self, _url: &str, _timeout: Duration) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}
