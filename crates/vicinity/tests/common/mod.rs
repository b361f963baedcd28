//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use vicinity::{NotifyError, ProbeError, Prober, Notifier, Signal};

/// What a [`ScriptedProber`] answers on every call
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Present,
    Absent,
    Fails,
}

/// Probe double with a fixed outcome, an optional delay and call tracking
pub struct ScriptedProber {
    outcome: Outcome,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    started_at: Arc<Mutex<Vec<Instant>>>,
}

#[derive(Clone, Default)]
pub struct ProbeHandle {
    pub calls: Arc<AtomicUsize>,
    pub completed: Arc<AtomicUsize>,
    pub started_at: Arc<Mutex<Vec<Instant>>>,
}

impl ProbeHandle {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn started_at(&self) -> Vec<Instant> {
        self.started_at.lock().unwrap().clone()
    }
}

impl ScriptedProber {
    pub fn new(outcome: Outcome) -> (Self, ProbeHandle) {
        Self::delayed(outcome, Duration::ZERO)
    }

    pub fn delayed(outcome: Outcome, delay: Duration) -> (Self, ProbeHandle) {
        let handle = ProbeHandle::default();
        let prober = Self {
            outcome,
            delay,
            calls: Arc::clone(&handle.calls),
            completed: Arc::clone(&handle.completed),
            started_at: Arc::clone(&handle.started_at),
        };
        (prober, handle)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn check(&self) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started_at.lock().unwrap().push(Instant::now());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match self.outcome {
            Outcome::Present => Ok(true),
            Outcome::Absent => Ok(false),
            Outcome::Fails => Err(ProbeError::Timeout(Duration::from_secs(5))),
        }
    }
}

/// Notifier double that records every call and can reject chosen targets
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, Signal)>>,
    failing: HashSet<String>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_for(targets: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::default(),
            failing: targets.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Calls sorted by target name, since units complete in any order
    pub fn calls(&self) -> Vec<(String, Signal)> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_by(|a, b| a.0.cmp(&b.0));
        calls
    }

    pub fn calls_for(&self, target: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(name, _)| name == target).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, target: &str, signal: Signal) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push((target.to_string(), signal));
        if self.failing.contains(target) {
            return Err(NotifyError::Rejected { status: 503 });
        }
        Ok(())
    }
}

pub fn call(target: &str, signal: Signal) -> (String, Signal) {
    (target.to_string(), signal)
}
