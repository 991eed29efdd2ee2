//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single middle-tier instance
//! - Track health state (Unknown/Healthy/Unhealthy) with thresholds
//! - Carry the weight used by weighted balancing

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::EndpointConfig;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// Where an instance lives, as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointAddr {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl EndpointAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// `host:port`, the identity used across refreshes.
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&EndpointConfig> for EndpointAddr {
    fn from(cfg: &EndpointConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            weight: cfg.weight,
        }
    }
}

/// A single middle-tier instance in a server list.
#[derive(Debug)]
pub struct Endpoint {
    addr: EndpointAddr,
    id: String,
    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl Endpoint {
    pub fn new(addr: EndpointAddr) -> Self {
        let id = addr.id();
        Self {
            addr,
            id,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.addr.host
    }

    pub fn port(&self) -> u16 {
        self.addr.port
    }

    pub fn weight(&self) -> u32 {
        self.addr.weight
    }

    pub fn addr(&self) -> &EndpointAddr {
        &self.addr
    }

    /// `http://host:port` followed by `path_and_query`.
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("http://{}:{}{}", self.addr.host, self.addr.port, path_and_query)
    }

    // --- Health Logic ---

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Healthy or not yet checked.
    pub fn is_healthy(&self) -> bool {
        self.health() != HealthState::Unhealthy
    }

    /// Force a state, bypassing thresholds.
    pub fn set_health(&self, state: HealthState) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Report a successful check. Returns true on a transition to Healthy.
    pub fn mark_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.health() == HealthState::Healthy {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Report a failed check. Returns true on a transition to Unhealthy.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        if self.health() == HealthState::Unhealthy {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            return true;
        }
        false
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
