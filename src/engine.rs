//! Authorization engine
//!
//! For every payload observed in a frame the engine makes exactly one
//! decision:
//!
//! 1. Not in the registry snapshot: [`Decision::Denied`]. Nothing changes.
//! 2. In the registry and outside its suppression window:
//!    [`Decision::GrantedLogged`], carrying the attendance event to append.
//! 3. In the registry but logged too recently: [`Decision::GrantedSuppressed`].
//!
//! The engine performs no I/O. Writing the event is left to the caller so
//! that storage failures surface where they can be handled.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use parking_lot::Mutex;

use crate::cooldown::{Cooldown, CooldownResult};
use crate::error::Result;
use crate::registry::{Registry, RegistryStore};
use crate::sink::AttendanceEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Authorized and logged now.
    GrantedLogged(AttendanceEvent),
    /// Authorized, but logged too recently to log again.
    GrantedSuppressed { remaining: Duration },
    /// Not in the registry.
    Denied,
}

/// Outcome of a [`Decision`] without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    GrantedLogged,
    GrantedSuppressed,
    Denied,
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::GrantedLogged(_) => DecisionKind::GrantedLogged,
            Self::GrantedSuppressed { .. } => DecisionKind::GrantedSuppressed,
            Self::Denied => DecisionKind::Denied,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.kind().is_granted()
    }

    /// The event to append, if this decision produced one.
    pub fn event(&self) -> Option<&AttendanceEvent> {
        match self {
            Self::GrantedLogged(event) => Some(event),
            _ => None,
        }
    }
}

impl DecisionKind {
    pub fn is_granted(self) -> bool {
        !matches!(self, Self::Denied)
    }

    /// Status label shown next to a detected code.
    pub fn label(self) -> &'static str {
        if self.is_granted() {
            "ACCESS GRANTED"
        } else {
            "ACCESS DENIED"
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GrantedLogged => "GRANTED_LOGGED",
            Self::GrantedSuppressed => "GRANTED_SUPPRESSED",
            Self::Denied => "DENIED",
        })
    }
}

/// Membership test plus per-payload suppression for one session.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    registry: Registry,
    cooldown: Cooldown,
}

impl AuthorizationEngine {
    /// `registry` is a snapshot; later additions to the store are not seen.
    pub fn new(registry: Registry, cooldown: Cooldown) -> Self {
        info!(
            "Authorization engine ready: {} authorized payloads, {}s suppression",
            registry.len(),
            cooldown.interval().num_seconds()
        );
        Self { registry, cooldown }
    }

    /// Snapshot `store` and start a fresh session's worth of state.
    pub fn from_store<S: RegistryStore + ?Sized>(store: &S, cooldown: Cooldown) -> Result<Self> {
        Ok(Self::new(store.load()?, cooldown))
    }

    pub fn evaluate(&mut self, payload: &str, observed_at: DateTime<Utc>) -> Decision {
        let decision = self.decide(payload, observed_at);
        if decision.event().is_some() {
            self.cooldown.record(payload, observed_at);
        }
        decision
    }

    /// Evaluate, handing a logged event to `commit` before its suppression
    /// window starts.
    ///
    /// If `commit` fails the error is returned and the cooldown is left as
    /// it was, so the next observation of the payload is logged again.
    pub fn evaluate_with<E>(
        &mut self,
        payload: &str,
        observed_at: DateTime<Utc>,
        commit: impl FnOnce(&AttendanceEvent) -> std::result::Result<(), E>,
    ) -> std::result::Result<Decision, E> {
        let decision = self.decide(payload, observed_at);
        if let Decision::GrantedLogged(event) = &decision {
            commit(event)?;
            self.cooldown.record(payload, observed_at);
        }
        Ok(decision)
    }

    fn decide(&self, payload: &str, observed_at: DateTime<Utc>) -> Decision {
        if !self.registry.contains(payload) {
            debug!("Denied unknown payload ({} bytes)", payload.len());
            return Decision::Denied;
        }

        match self.cooldown.check(payload, observed_at) {
            CooldownResult::Ready => {
                debug!("Granted and logged at {observed_at}");
                Decision::GrantedLogged(AttendanceEvent::new(payload, observed_at))
            }
            CooldownResult::Wait { remaining } => {
                debug!("Granted, suppressed for another {}ms", remaining.num_milliseconds());
                Decision::GrantedSuppressed { remaining }
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }
}

/// An engine that may be fed from several threads.
///
/// The membership test and the suppression check-and-record happen under
/// a single lock, so two frames carrying the same payload cannot both be
/// logged inside one window.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<AuthorizationEngine>>,
}

impl SharedEngine {
    pub fn new(engine: AuthorizationEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn evaluate(&self, payload: &str, observed_at: DateTime<Utc>) -> Decision {
        self.inner.lock().evaluate(payload, observed_at)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<T>(&self, f: impl FnOnce(&mut AuthorizationEngine) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

impl From<AuthorizationEngine> for SharedEngine {
    fn from(engine: AuthorizationEngine) -> Self {
        Self::new(engine)
    }
}
