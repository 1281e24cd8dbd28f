//! Integration tests for VoteStore.
//!
//! A scripted backend holds individual calls behind gates so races between
//! toggles, settlements and the initial query can be replayed
//! deterministically. Time is a ManualClock; nothing sleeps.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ggm_client::{
    ApiClient, ClientConfig, ClientError, ClientResult, GrantId, IdentityResolver, ManualClock,
    ToggleOutcome, VoteAction, VoteBackend, VoteSnapshot, VoteState, VoteStore, VoteTally,
};
use tokio::sync::Semaphore;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOLDOWN: Duration = Duration::from_millis(300);
const RESEARCHER: &str = "A. Researcher";

#[derive(Default)]
struct ScriptedBackend {
    remote: Mutex<HashMap<GrantId, VoteAction>>,
    calls: Mutex<Vec<String>>,
    /// Write call index -> gate it waits on.
    write_gates: Mutex<HashMap<usize, Arc<Semaphore>>>,
    query_gate: Mutex<Option<Arc<Semaphore>>>,
    failing_writes: Mutex<HashSet<usize>>,
    writes: Mutex<usize>,
}

impl ScriptedBackend {
    fn with_remote(grant: u64, action: VoteAction) -> Self {
        let backend = Self::default();
        backend
            .remote
            .lock()
            .unwrap()
            .insert(GrantId::from(grant), action);
        backend
    }

    fn hold_write(&self, index: usize) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.write_gates.lock().unwrap().insert(index, gate.clone());
        gate
    }

    fn hold_query(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.query_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn fail_write(&self, index: usize) {
        self.failing_writes.lock().unwrap().insert(index);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn write(&self, call: String) -> ClientResult<()> {
        let index = {
            let mut writes = self.writes.lock().unwrap();
            let index = *writes;
            *writes += 1;
            index
        };
        self.calls.lock().unwrap().push(call);

        let gate = self.write_gates.lock().unwrap().get(&index).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        if self.failing_writes.lock().unwrap().contains(&index) {
            return Err(ClientError::Status {
                status: 500,
                url: "http://backend/vote".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VoteBackend for ScriptedBackend {
    async fn fetch_vote(
        &self,
        grant_id: &GrantId,
        _researcher: &str,
    ) -> ClientResult<Option<VoteAction>> {
        self.calls.lock().unwrap().push(format!("GET {}", grant_id));
        let gate = self.query_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }
        Ok(self.remote.lock().unwrap().get(grant_id).copied())
    }

    async fn set_vote(
        &self,
        grant_id: &GrantId,
        _researcher: &str,
        action: VoteAction,
    ) -> ClientResult<()> {
        self.write(format!("SET {} {}", grant_id, action)).await
    }

    async fn remove_vote(&self, grant_id: &GrantId, _researcher: &str) -> ClientResult<()> {
        self.write(format!("REMOVE {}", grant_id)).await
    }
}

struct Harness {
    backend: Arc<ScriptedBackend>,
    clock: Arc<ManualClock>,
    store: VoteStore,
}

async fn harness(backend: ScriptedBackend) -> Harness {
    let backend = Arc::new(backend);
    let clock = Arc::new(ManualClock::new());
    let identity = IdentityResolver::in_memory();
    identity.set(RESEARCHER).await.unwrap();
    let store = VoteStore::with_clock(backend.clone(), identity, COOLDOWN, clock.clone());
    Harness {
        backend,
        clock,
        store,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn state_of(store: &VoteStore, grant: u64) -> VoteState {
    store.snapshot(grant).expect("control mounted").state
}

#[tokio::test]
async fn test_rejected_vote_rolls_back_against_service() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vote/42/A.%20Researcher"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/vote"))
        .and(body_json(serde_json::json!({
            "grant_id": 42,
            "researcher_id": "A. Researcher",
            "action": "positive"
        })))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::default().with_api_url(mock_server.uri());
    let api = ApiClient::new(&config).unwrap();
    let identity = IdentityResolver::in_memory();
    identity.set(RESEARCHER).await.unwrap();
    let store = VoteStore::new(Arc::new(api), identity, config.vote_cooldown());

    let mounted = store.mount(42u64).await;
    assert_eq!(mounted.state, VoteState::None);

    let seen: Arc<Mutex<Vec<(VoteState, bool)>>> = Arc::default();
    let sink = seen.clone();
    store.on_state_change(42u64, move |s: &VoteSnapshot| {
        sink.lock().unwrap().push((s.state, s.pending));
    });

    let err = store.toggle(42u64, VoteAction::Positive).await.unwrap_err();
    assert!(matches!(err, ClientError::VoteRejected { .. }), "got {:?}", err);
    assert_eq!(err.user_message(), "Couldn't register vote - please try again.");

    let snapshot = store.snapshot(42u64).unwrap();
    assert_eq!(snapshot.state, VoteState::None);
    assert!(!snapshot.pending);
    assert!(snapshot.error.is_some());

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(VoteState::Positive, true), (VoteState::None, false)]
    );
}

#[tokio::test]
async fn test_toggle_twice_returns_to_none() {
    let h = harness(ScriptedBackend::default()).await;
    h.store.mount(1u64).await;

    let first = h.store.toggle(1u64, VoteAction::Positive).await.unwrap();
    match first {
        ToggleOutcome::Applied(s) => {
            assert_eq!(s.state, VoteState::Positive);
            assert!(!s.pending);
        }
        other => panic!("expected Applied, got {:?}", other),
    }

    h.store.toggle(1u64, VoteAction::Positive).await.unwrap();
    assert_eq!(state_of(&h.store, 1), VoteState::None);
    assert_eq!(h.backend.calls(), vec!["GET 1", "SET 1 positive", "REMOVE 1"]);
}

#[tokio::test]
async fn test_switching_sides_issues_single_set() {
    let h = harness(ScriptedBackend::with_remote(5, VoteAction::Negative)).await;

    let mounted = h.store.mount_with_tally(5u64, VoteTally::new(2, 3)).await;
    assert_eq!(mounted.state, VoteState::Negative);
    assert_eq!(mounted.tally, VoteTally::new(2, 3), "adopting remote state keeps counters");

    h.store.toggle(5u64, VoteAction::Positive).await.unwrap();

    let snapshot = h.store.snapshot(5u64).unwrap();
    assert_eq!(snapshot.state, VoteState::Positive);
    assert_eq!(snapshot.tally, VoteTally::new(3, 2));
    assert_eq!(h.backend.calls(), vec!["GET 5", "SET 5 positive"]);
}

#[tokio::test]
async fn test_failed_switch_restores_value_and_counters() {
    let backend = ScriptedBackend::with_remote(5, VoteAction::Negative);
    backend.fail_write(0);
    let h = harness(backend).await;
    h.store.mount_with_tally(5u64, VoteTally::new(2, 3)).await;

    let before = h.store.snapshot(5u64).unwrap();
    let result = h.store.toggle(5u64, VoteAction::Positive).await;
    assert!(matches!(result, Err(ClientError::VoteRejected { .. })));

    let after = h.store.snapshot(5u64).unwrap();
    assert_eq!(after.state, before.state);
    assert_eq!(after.tally, before.tally);
    assert!(!after.pending);
    assert!(after.error.is_some());

    // The next toggle is a fresh attempt and clears the error.
    h.store.toggle(5u64, VoteAction::Negative).await.unwrap();
    let retried = h.store.snapshot(5u64).unwrap();
    assert_eq!(retried.state, VoteState::None);
    assert!(retried.error.is_none());
}

#[tokio::test]
async fn test_toggle_dropped_while_pending() {
    let backend = ScriptedBackend::default();
    let gate = backend.hold_write(0);
    let h = harness(backend).await;
    h.store.mount(9u64).await;

    let store = h.store.clone();
    let first = tokio::spawn(async move { store.toggle(9u64, VoteAction::Positive).await });
    let backend = h.backend.clone();
    wait_until(|| backend.calls().len() == 2).await;

    let mid = h.store.snapshot(9u64).unwrap();
    assert_eq!(mid.state, VoteState::Positive);
    assert!(mid.pending);

    for action in [VoteAction::Positive, VoteAction::Negative] {
        let outcome = h.store.toggle(9u64, action).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Dropped);
    }
    assert_eq!(state_of(&h.store, 9), VoteState::Positive);

    gate.add_permits(1);
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, ToggleOutcome::Applied(_)));
    assert_eq!(h.backend.calls(), vec!["GET 9", "SET 9 positive"]);
}

#[tokio::test]
async fn test_cooldown_expiry_lets_later_toggle_take_over() {
    let backend = ScriptedBackend::default();
    let slow = backend.hold_write(0);
    let fast = backend.hold_write(1);
    backend.fail_write(0);
    let h = harness(backend).await;
    h.store.mount(3u64).await;

    let store = h.store.clone();
    let first = tokio::spawn(async move { store.toggle(3u64, VoteAction::Positive).await });
    let backend = h.backend.clone();
    wait_until(|| backend.calls().len() == 2).await;

    h.clock.advance(COOLDOWN);

    let store = h.store.clone();
    let second = tokio::spawn(async move { store.toggle(3u64, VoteAction::Positive).await });
    let backend = h.backend.clone();
    wait_until(|| backend.calls().len() == 3).await;
    assert_eq!(state_of(&h.store, 3), VoteState::None);

    // The overtaken toggle fails, but neither rolls back nor clears pending.
    slow.add_permits(1);
    assert_eq!(first.await.unwrap().unwrap(), ToggleOutcome::Superseded);
    let snapshot = h.store.snapshot(3u64).unwrap();
    assert_eq!(snapshot.state, VoteState::None);
    assert!(snapshot.pending);
    assert!(snapshot.error.is_none());

    fast.add_permits(1);
    assert!(matches!(
        second.await.unwrap().unwrap(),
        ToggleOutcome::Applied(_)
    ));
    assert!(!h.store.snapshot(3u64).unwrap().pending);
    assert_eq!(
        h.backend.calls(),
        vec!["GET 3", "SET 3 positive", "REMOVE 3"]
    );
}

#[tokio::test]
async fn test_cooldown_not_yet_expired() {
    let backend = ScriptedBackend::default();
    let gate = backend.hold_write(0);
    let h = harness(backend).await;

    let store = h.store.clone();
    let first = tokio::spawn(async move { store.toggle(4u64, VoteAction::Negative).await });
    let backend = h.backend.clone();
    wait_until(|| backend.calls().len() == 1).await;

    h.clock.advance(COOLDOWN - Duration::from_millis(1));
    assert_eq!(
        h.store.toggle(4u64, VoteAction::Negative).await.unwrap(),
        ToggleOutcome::Dropped
    );

    gate.add_permits(1);
    first.await.unwrap().unwrap();
    assert_eq!(state_of(&h.store, 4), VoteState::Negative);
}

#[tokio::test]
async fn test_late_initial_query_is_discarded() {
    let backend = ScriptedBackend::with_remote(8, VoteAction::Negative);
    let query = backend.hold_query();
    let h = harness(backend).await;

    let store = h.store.clone();
    let mount = tokio::spawn(async move { store.mount(8u64).await });
    let backend = h.backend.clone();
    wait_until(|| backend.calls().len() == 1).await;

    h.store.toggle(8u64, VoteAction::Positive).await.unwrap();
    assert_eq!(state_of(&h.store, 8), VoteState::Positive);

    query.add_permits(1);
    let snapshot = mount.await.unwrap();
    assert_eq!(snapshot.state, VoteState::Positive);
    assert_eq!(state_of(&h.store, 8), VoteState::Positive);
}

#[tokio::test]
async fn test_initial_query_adopted_and_mount_is_idempotent() {
    let h = harness(ScriptedBackend::with_remote(2, VoteAction::Positive)).await;

    assert_eq!(h.store.mount(2u64).await.state, VoteState::Positive);
    assert_eq!(h.store.mount(2u64).await.state, VoteState::Positive);
    assert_eq!(h.backend.calls(), vec!["GET 2"]);
}

#[tokio::test]
async fn test_toggle_without_identity() {
    let backend = Arc::new(ScriptedBackend::default());
    let store = VoteStore::new(
        backend.clone(),
        IdentityResolver::in_memory(),
        COOLDOWN,
    );

    let snapshot = store.mount(6u64).await;
    assert_eq!(snapshot.state, VoteState::None);

    let err = store.toggle(6u64, VoteAction::Positive).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingIdentity));
    assert_eq!(state_of(&store, 6), VoteState::None);
    assert!(backend.calls().is_empty(), "no query and no write without identity");
}

#[tokio::test]
async fn test_observers_and_unmount() {
    let h = harness(ScriptedBackend::default()).await;
    h.store.mount(11u64).await;

    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    let id = h.store.on_state_change(11u64, move |_| *sink.lock().unwrap() += 1);

    h.store.toggle(11u64, VoteAction::Negative).await.unwrap();
    assert_eq!(*count.lock().unwrap(), 2, "optimistic change and settlement");

    assert!(h.store.remove_observer(11u64, id));
    h.store.toggle(11u64, VoteAction::Negative).await.unwrap();
    assert_eq!(*count.lock().unwrap(), 2);

    assert!(h.store.unmount(11u64));
    assert!(h.store.snapshot(11u64).is_none());
    assert!(!h.store.unmount(11u64));
}

#[tokio::test]
async fn test_grants_are_independent() {
    let backend = ScriptedBackend::default();
    let gate = backend.hold_write(0);
    let h = harness(backend).await;

    let store = h.store.clone();
    let pending = tokio::spawn(async move { store.toggle(20u64, VoteAction::Positive).await });
    let backend = h.backend.clone();
    wait_until(|| backend.calls().len() == 1).await;

    let other = h.store.toggle("ERC-21", VoteAction::Negative).await.unwrap();
    assert!(matches!(other, ToggleOutcome::Applied(_)));
    assert_eq!(
        h.store.snapshot("ERC-21").unwrap().state,
        VoteState::Negative
    );

    gate.add_permits(1);
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_observer_registered_before_mount() {
    let h = harness(ScriptedBackend::with_remote(7, VoteAction::Positive)).await;

    let seen: Arc<Mutex<Vec<(VoteState, VoteTally)>>> = Arc::default();
    let sink = seen.clone();
    h.store.on_state_change(7u64, move |s: &VoteSnapshot| {
        sink.lock().unwrap().push((s.state, s.tally));
    });
    assert!(h.backend.calls().is_empty());
    assert!(h.store.snapshot(7u64).is_none(), "observers alone do not mount");

    let snapshot = h.store.mount_with_tally(7u64, VoteTally::new(5, 1)).await;
    assert_eq!(snapshot.state, VoteState::Positive);
    assert_eq!(snapshot.tally, VoteTally::new(5, 1));
    assert_eq!(h.backend.calls(), vec!["GET 7"]);

    assert_eq!(
        seen.lock().unwrap().last().copied(),
        Some((VoteState::Positive, VoteTally::new(5, 1)))
    );

    // Mounted now: a second mount neither queries nor resets counters.
    h.store.mount_with_tally(7u64, VoteTally::default()).await;
    assert_eq!(h.backend.calls(), vec!["GET 7"]);
    assert_eq!(h.store.snapshot(7u64).unwrap().tally, VoteTally::new(5, 1));
}

#[tokio::test]
async fn test_numeric_string_and_number_share_control() {
    let h = harness(ScriptedBackend::default()).await;
    h.store.mount("42").await;

    h.store.toggle(42u64, VoteAction::Negative).await.unwrap();
    assert_eq!(h.store.snapshot("42").unwrap().state, VoteState::Negative);
    assert_eq!(h.backend.calls(), vec!["GET 42", "SET 42 negative"]);

    h.store.toggle("42", VoteAction::Negative).await.unwrap();
    assert_eq!(state_of(&h.store, 42), VoteState::None);
}
