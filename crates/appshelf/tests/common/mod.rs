//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use appshelf::{AppList, AttributeKind, Item, ListConfig, LoadError};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// An installed app with scripted loader behaviour.
pub struct FakeApp {
    pub key: String,
    pub name: Option<String>,
    /// Icon loads that fail with resource exhaustion before one succeeds.
    pub icon_failures: usize,
    /// Loaders that panic instead of returning.
    pub name_panics: bool,
    pub icon_panics: bool,
    pub name_loads: Arc<AtomicUsize>,
    pub icon_loads: Arc<AtomicUsize>,
    name_gate: Option<Receiver<()>>,
    icon_gate: Option<Receiver<()>>,
}

impl FakeApp {
    pub fn new(key: &str, name: &str) -> Self {
        Self {
            key: key.to_string(),
            name: Some(name.to_string()),
            icon_failures: 0,
            name_panics: false,
            icon_panics: false,
            name_loads: Arc::new(AtomicUsize::new(0)),
            icon_loads: Arc::new(AtomicUsize::new(0)),
            name_gate: None,
            icon_gate: None,
        }
    }

    /// An app whose loader cannot produce a name.
    pub fn nameless(key: &str) -> Self {
        Self {
            name: None,
            ..Self::new(key, "")
        }
    }

    pub fn failing_icon(mut self, failures: usize) -> Self {
        self.icon_failures = failures;
        self
    }

    pub fn panicking_name(mut self) -> Self {
        self.name_panics = true;
        self
    }

    pub fn panicking_icon(mut self) -> Self {
        self.icon_panics = true;
        self
    }

    /// Name loads block until `gate` releases them.
    pub fn gated_name(mut self, gate: &Gate) -> Self {
        self.name_gate = Some(gate.receiver.clone());
        self
    }

    /// Icon loads block until `gate` releases them.
    pub fn gated_icon(mut self, gate: &Gate) -> Self {
        self.icon_gate = Some(gate.receiver.clone());
        self
    }
}

impl Item for FakeApp {
    type Icon = Arc<Vec<u8>>;

    fn key(&self) -> &str {
        &self.key
    }

    fn load_name(&self) -> Result<String, LoadError> {
        self.name_loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.name_gate {
            let _ = gate.recv_timeout(Duration::from_secs(10));
        }
        if self.name_panics {
            panic!("name loader for {} crashed", self.key);
        }
        self.name.clone().ok_or(LoadError::Missing(AttributeKind::Name))
    }

    fn load_icon(&self) -> Result<Self::Icon, LoadError> {
        let call = self.icon_loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.icon_gate {
            let _ = gate.recv_timeout(Duration::from_secs(10));
        }
        if self.icon_panics {
            panic!("icon loader for {} crashed", self.key);
        }
        if call < self.icon_failures {
            return Err(LoadError::ResourceExhausted(AttributeKind::Icon));
        }
        Ok(Arc::new(self.key.as_bytes().to_vec()))
    }
}

/// Releases gated loads one token at a time.
pub struct Gate {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Gate {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn release(&self, loads: usize) {
        for _ in 0..loads {
            self.sender.send(()).unwrap();
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn new_list() -> AppList<FakeApp> {
    init_tracing();
    AppList::new(ListConfig::default()).unwrap()
}

pub fn apps(pairs: &[(&str, &str)]) -> Vec<FakeApp> {
    pairs.iter().map(|(key, name)| FakeApp::new(key, name)).collect()
}

/// Drive the list until `done` holds or five seconds pass.
pub fn pump_until(list: &mut AppList<FakeApp>, mut done: impl FnMut(&AppList<FakeApp>) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        list.process_events();
        if done(list) {
            return true;
        }
        list.wait_for_events(Duration::from_millis(10));
    }
    done(list)
}

/// Drive the list for a fixed time.
pub fn pump_for(list: &mut AppList<FakeApp>, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        list.wait_for_events(Duration::from_millis(5));
    }
}

/// Drive the list until every name and icon load has been delivered.
pub fn settle(list: &mut AppList<FakeApp>) {
    assert!(pump_until(list, |list| list.names_loaded() && list.pending_icon_loads() == 0));
}
