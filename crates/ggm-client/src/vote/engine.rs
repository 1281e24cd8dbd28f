//! Optimistic vote store.
//!
//! Every toggle is applied locally first, then reconciled with the service.
//! A failed reconciliation restores the exact pre-toggle value and counters.
//!
//! While a toggle is pending, further toggles on the same grant are dropped
//! until the cool-down expires. The cool-down is not tied to request
//! completion, so a slow request can be overtaken by a later toggle. The
//! settlement of an overtaken toggle is ignored: the later toggle owns the
//! control.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::state::{RemoteOp, VoteState, VoteTally};
use crate::client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::identity::IdentityResolver;
use crate::types::{GrantId, VoteAction};

/// Remote authority for votes.
#[async_trait]
pub trait VoteBackend: Send + Sync {
    async fn fetch_vote(
        &self,
        grant_id: &GrantId,
        researcher: &str,
    ) -> ClientResult<Option<VoteAction>>;

    async fn set_vote(
        &self,
        grant_id: &GrantId,
        researcher: &str,
        action: VoteAction,
    ) -> ClientResult<()>;

    async fn remove_vote(&self, grant_id: &GrantId, researcher: &str) -> ClientResult<()>;
}

#[async_trait]
impl VoteBackend for ApiClient {
    async fn fetch_vote(
        &self,
        grant_id: &GrantId,
        researcher: &str,
    ) -> ClientResult<Option<VoteAction>> {
        self.get_vote(grant_id, researcher).await
    }

    async fn set_vote(
        &self,
        grant_id: &GrantId,
        researcher: &str,
        action: VoteAction,
    ) -> ClientResult<()> {
        ApiClient::set_vote(self, grant_id, researcher, action).await?;
        Ok(())
    }

    async fn remove_vote(&self, grant_id: &GrantId, researcher: &str) -> ClientResult<()> {
        ApiClient::remove_vote(self, grant_id, researcher).await
    }
}

/// What a vote control should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSnapshot {
    pub grant_id: GrantId,
    pub state: VoteState,
    pub tally: VoteTally,
    pub pending: bool,
    /// User-facing error from the last failed toggle.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Accepted and confirmed by the service.
    Applied(VoteSnapshot),
    /// Ignored because a toggle on the same grant was still pending.
    Dropped,
    /// Accepted, but a later toggle took over before this one settled.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(&VoteSnapshot) + Send + Sync>;

#[derive(Default)]
struct Control {
    state: VoteState,
    tally: VoteTally,
    pending: bool,
    error: Option<String>,
    /// Identifies this mount, so a late query never lands on a remount.
    /// `None` while only observers have been registered.
    mount: Option<u64>,
    /// Last accepted toggle, 0 if none.
    seq: u64,
    cooldown_until: Option<Instant>,
    observers: Vec<(ObserverId, Observer)>,
}

impl Control {
    fn snapshot(&self, grant_id: &GrantId) -> VoteSnapshot {
        VoteSnapshot {
            grant_id: grant_id.clone(),
            state: self.state,
            tally: self.tally,
            pending: self.pending,
            error: self.error.clone(),
        }
    }

    fn observers(&self) -> Vec<Observer> {
        self.observers.iter().map(|(_, o)| o.clone()).collect()
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.pending && self.cooldown_until.is_some_and(|until| now < until)
    }
}

struct Inner {
    backend: Arc<dyn VoteBackend>,
    identity: IdentityResolver,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    controls: Mutex<HashMap<GrantId, Control>>,
    counter: AtomicU64,
}

/// Per-grant optimistic vote controls. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct VoteStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for VoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoteStore")
            .field("cooldown", &self.inner.cooldown)
            .finish_non_exhaustive()
    }
}

impl VoteStore {
    pub fn new(
        backend: Arc<dyn VoteBackend>,
        identity: IdentityResolver,
        cooldown: Duration,
    ) -> Self {
        Self::with_clock(backend, identity, cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn VoteBackend>,
        identity: IdentityResolver,
        cooldown: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                identity,
                clock,
                cooldown,
                controls: Mutex::new(HashMap::new()),
                counter: AtomicU64::new(1),
            }),
        }
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.inner.identity
    }

    fn controls(&self) -> MutexGuard<'_, HashMap<GrantId, Control>> {
        self.inner
            .controls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self) -> u64 {
        self.inner.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Create the control for a grant and adopt the service's vote.
    pub async fn mount(&self, grant_id: impl Into<GrantId>) -> VoteSnapshot {
        self.mount_with_tally(grant_id, VoteTally::default()).await
    }

    /// [`mount`](Self::mount) with initial display counters.
    ///
    /// Mounting an already mounted grant returns its current snapshot.
    /// The service's answer is only adopted if nothing happened locally
    /// while it was in flight.
    pub async fn mount_with_tally(
        &self,
        grant_id: impl Into<GrantId>,
        tally: VoteTally,
    ) -> VoteSnapshot {
        let grant_id = grant_id.into();
        let mount = self.next_id();
        {
            let mut controls = self.controls();
            let control = controls.entry(grant_id.clone()).or_default();
            if control.mount.is_some() {
                return control.snapshot(&grant_id);
            }
            control.mount = Some(mount);
            control.tally = tally;
            let observers = control.observers();
            let snapshot = control.snapshot(&grant_id);
            drop(controls);
            notify(&observers, &snapshot);
        }

        let researcher = match self.inner.identity.get().await {
            Some(r) => r,
            None => return self.snapshot_or_default(&grant_id, tally),
        };

        let remote = match self.inner.backend.fetch_vote(&grant_id, &researcher).await {
            Ok(action) => VoteState::from(action),
            Err(e) => {
                warn!(grant = %grant_id, error = %e, "initial vote query failed");
                return self.snapshot_or_default(&grant_id, tally);
            }
        };

        let (snapshot, observers) = {
            let mut controls = self.controls();
            match controls.get_mut(&grant_id) {
                Some(control) if control.mount == Some(mount) => {
                    if control.pending || control.seq != 0 {
                        debug!(grant = %grant_id, "local toggle happened, discarding initial vote");
                        (control.snapshot(&grant_id), Vec::new())
                    } else if control.state == remote {
                        (control.snapshot(&grant_id), Vec::new())
                    } else {
                        control.state = remote;
                        (control.snapshot(&grant_id), control.observers())
                    }
                }
                Some(control) => {
                    debug!(grant = %grant_id, "grant remounted, discarding initial vote");
                    (control.snapshot(&grant_id), Vec::new())
                }
                None => {
                    debug!(grant = %grant_id, "control unmounted, discarding initial vote");
                    drop(controls);
                    return self.snapshot_or_default(&grant_id, tally);
                }
            }
        };

        notify(&observers, &snapshot);
        snapshot
    }

    fn snapshot_or_default(&self, grant_id: &GrantId, tally: VoteTally) -> VoteSnapshot {
        self.snapshot(grant_id.clone()).unwrap_or(VoteSnapshot {
            grant_id: grant_id.clone(),
            state: VoteState::None,
            tally,
            pending: false,
            error: None,
        })
    }

    /// Toggle a vote on a grant.
    ///
    /// An unmounted grant gets a control on first toggle, without the
    /// initial query. On a failed reconciliation the control is rolled back,
    /// observers see the error, and [`ClientError::VoteRejected`] is returned.
    pub async fn toggle(
        &self,
        grant_id: impl Into<GrantId>,
        action: VoteAction,
    ) -> ClientResult<ToggleOutcome> {
        let grant_id = grant_id.into();
        let researcher = self
            .inner
            .identity
            .get()
            .await
            .ok_or(ClientError::MissingIdentity)?;
        let now = self.inner.clock.now();

        let (seq, before, op, snapshot, observers) = {
            let mut controls = self.controls();
            let control = controls.entry(grant_id.clone()).or_default();
            if control.mount.is_none() {
                control.mount = Some(self.next_id());
            }

            if control.cooling_down(now) {
                debug!(grant = %grant_id, action = %action, "toggle dropped while pending");
                return Ok(ToggleOutcome::Dropped);
            }

            let before = (control.state, control.tally);
            let (next, op) = control.state.toggle(action);
            let seq = self.next_id();

            control.tally = control.tally.shift(control.state, next);
            control.state = next;
            control.pending = true;
            control.error = None;
            control.seq = seq;
            control.cooldown_until = Some(now + self.inner.cooldown);

            (
                seq,
                before,
                op,
                control.snapshot(&grant_id),
                control.observers(),
            )
        };
        notify(&observers, &snapshot);

        let result = match op {
            RemoteOp::Set(action) => {
                self.inner
                    .backend
                    .set_vote(&grant_id, &researcher, action)
                    .await
            }
            RemoteOp::Remove => self.inner.backend.remove_vote(&grant_id, &researcher).await,
        };

        let (snapshot, observers) = {
            let mut controls = self.controls();
            let control = match controls.get_mut(&grant_id) {
                Some(c) if c.seq == seq => c,
                Some(_) => {
                    debug!(grant = %grant_id, seq, "settled toggle was superseded");
                    return Ok(ToggleOutcome::Superseded);
                }
                None => {
                    debug!(grant = %grant_id, "control unmounted before toggle settled");
                    return result.map(|()| ToggleOutcome::Superseded).map_err(|e| {
                        ClientError::VoteRejected {
                            grant_id: grant_id.to_string(),
                            message: e.to_string(),
                        }
                    });
                }
            };

            control.pending = false;
            if let Err(e) = &result {
                warn!(
                    grant = %grant_id,
                    error = %e,
                    restored = %before.0,
                    "vote rejected, rolling back"
                );
                control.state = before.0;
                control.tally = before.1;
                control.error = Some(
                    ClientError::VoteRejected {
                        grant_id: grant_id.to_string(),
                        message: e.to_string(),
                    }
                    .user_message()
                    .to_string(),
                );
            } else {
                info!(grant = %grant_id, state = %control.state, "vote recorded");
            }
            (control.snapshot(&grant_id), control.observers())
        };
        notify(&observers, &snapshot);

        match result {
            Ok(()) => Ok(ToggleOutcome::Applied(snapshot)),
            Err(e) => Err(ClientError::VoteRejected {
                grant_id: grant_id.to_string(),
                message: e.to_string(),
            }),
        }
    }

    pub fn snapshot(&self, grant_id: impl Into<GrantId>) -> Option<VoteSnapshot> {
        let grant_id = grant_id.into();
        self.controls()
            .get(&grant_id)
            .filter(|c| c.mount.is_some())
            .map(|c| c.snapshot(&grant_id))
    }

    /// Call `callback` after every change to the grant's control.
    pub fn on_state_change<F>(&self, grant_id: impl Into<GrantId>, callback: F) -> ObserverId
    where
        F: Fn(&VoteSnapshot) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id());
        let grant_id = grant_id.into();
        let mut controls = self.controls();
        let control = controls.entry(grant_id).or_default();
        control.observers.push((id, Arc::new(callback)));
        id
    }

    pub fn remove_observer(&self, grant_id: impl Into<GrantId>, id: ObserverId) -> bool {
        let grant_id = grant_id.into();
        let mut controls = self.controls();
        match controls.get_mut(&grant_id) {
            Some(control) => {
                let before = control.observers.len();
                control.observers.retain(|(o, _)| *o != id);
                control.observers.len() != before
            }
            None => false,
        }
    }

    /// Discard a grant's control and its observers.
    pub fn unmount(&self, grant_id: impl Into<GrantId>) -> bool {
        self.controls().remove(&grant_id.into()).is_some()
    }

    /// Discard every control.
    pub fn clear(&self) {
        let mut controls = self.controls();
        debug!(count = controls.len(), "clearing vote controls");
        controls.clear();
    }
}

/// Called with no lock held, so observers may call back into the store.
fn notify(observers: &[Observer], snapshot: &VoteSnapshot) {
    for observer in observers {
        observer(snapshot);
    }
}
