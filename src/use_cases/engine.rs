use super::types::{EngineUpdate, RosterState, SwarmEvent};
use crate::domain::intents::{self, IntentLedger};
use crate::domain::ports::SessionStore;
use crate::domain::systems::settlement::{SettlementAction, SettlementDetector};
use crate::domain::systems::{forces, integrator};
use crate::domain::tuning::{PhysicsTuning, SettlementTuning};
use crate::domain::{
    DecisionRecord, EnginePhase, IntentReport, PuckSample, PuckState, SessionRecord,
    SessionStatus, Vec2,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::{debug, info, warn};

// Publish roughly 1-in-10 ticks to bound broadcast volume; intents and the
// decision are published on their own cadence.
const PUCK_PUBLISH_TICKS: u64 = 10;

/// The single authoritative tick loop for one session.
///
/// Exactly one `swarm_task` owns puck state and engine phase per session;
/// every connection is a projection fed by its broadcasts. Events are
/// drained at tick start so each tick is one sequential unit of work and
/// intermediate state is never observable half-updated.
#[allow(clippy::too_many_arguments)]
pub async fn swarm_task(
    record: SessionRecord,
    option_points: Vec<Vec2>,
    store: Arc<dyn SessionStore>,
    mut event_rx: mpsc::Receiver<SwarmEvent>,
    update_tx: broadcast::Sender<EngineUpdate>,
    roster_tx: watch::Sender<RosterState>,
    decision_tx: watch::Sender<Option<DecisionRecord>>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    let physics = PhysicsTuning::default();
    let settlement = SettlementTuning::default();
    let mut detector = SettlementDetector::new(settlement);
    let mut intent_ledger = IntentLedger::new(intents::DEFAULT_LIVENESS_SECS);
    let mut puck = PuckState::centered();
    let mut roster: HashSet<u64> = HashSet::new();
    let mut status = record.status;
    let mut decision: Option<DecisionRecord> = None;

    let mut tick: u64 = 0;
    let mut clock: f32 = 0.0;
    let dt = tick_interval.as_secs_f32();

    // Drive the fixed-step engine loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly when the session is removed.
                break;
            }
            _ = interval.tick() => {}
        }

        clock += dt;

        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                SwarmEvent::Join { participant_id } => {
                    if roster.insert(participant_id) {
                        info!(participant_id, "participant joined");
                        if status == SessionStatus::Pending {
                            status = SessionStatus::Active;
                            spawn_status_update(&store, &record.session_id, status);
                        }
                        let store = store.clone();
                        let session_id = record.session_id.clone();
                        tokio::spawn(async move {
                            if let Err(error) =
                                store.add_participant(&session_id, participant_id).await
                            {
                                warn!(%error, participant_id, "failed to persist participant");
                            }
                        });
                        publish_roster(&roster_tx, status, roster.len());
                    }
                }
                SwarmEvent::Leave { participant_id } => {
                    if roster.remove(&participant_id) {
                        info!(participant_id, "participant left");
                        intent_ledger.remove(participant_id);
                        publish_roster(&roster_tx, status, roster.len());
                    }
                }
                SwarmEvent::Intent {
                    participant_id,
                    target,
                } => {
                    // Intents after the decision are no-ops, not errors.
                    if detector.decided() {
                        continue;
                    }
                    let stored = intent_ledger.report(participant_id, target, clock);
                    let _ = update_tx.send(EngineUpdate::Intent(IntentReport {
                        participant_id,
                        target: stored,
                    }));
                }
                SwarmEvent::Reset => {
                    info!("puck reset");
                    puck.reset();
                    detector.reset();
                    // Show the re-centered puck immediately instead of
                    // waiting out the publish throttle.
                    let _ = update_tx.send(EngineUpdate::Puck(PuckSample {
                        tick,
                        position: puck.position,
                        velocity: puck.velocity,
                    }));
                }
            }
        }

        match detector.phase() {
            EnginePhase::Decided(_) => {
                // Frozen; the puck no longer moves and nothing is published.
            }
            EnginePhase::Settling(option) => {
                if let Some(target) = option_points.get(option) {
                    integrator::settle_toward(&mut puck, *target, settlement.settle_rate);
                }
            }
            EnginePhase::Free | EnginePhase::Attracting(_) => {
                let force = forces::net_force(
                    puck.position,
                    intent_ledger.fresh_targets(clock),
                    detector.attractor(&option_points),
                    &physics,
                );
                integrator::tick_puck(&mut puck, force, &physics);
            }
        }

        // A recorded decision stands even if the puck is later reset and
        // wanders back into a basin.
        if decision.is_none() {
            match detector.observe(puck.position, &option_points, dt) {
                SettlementAction::None => {}
                SettlementAction::Snapped { option } => {
                    if let Some(target) = option_points.get(option) {
                        puck.position = *target;
                    }
                    puck.velocity = Vec2::ZERO;
                    debug!(option, "settling on option");
                }
                SettlementAction::Finalized { option, conviction } => {
                    let label = record
                        .options
                        .get(option)
                        .cloned()
                        .unwrap_or_else(|| format!("option-{option}"));
                    info!(option, %label, conviction, "swarm decided");

                    let recorded = DecisionRecord {
                        option_index: option,
                        option: label,
                        conviction,
                    };
                    decision = Some(recorded.clone());
                    status = SessionStatus::Completed;
                    let _ = decision_tx.send(Some(recorded.clone()));
                    publish_roster(&roster_tx, status, roster.len());

                    let store = store.clone();
                    let session_id = record.session_id.clone();
                    tokio::spawn(async move {
                        if let Err(error) = store.record_decision(&session_id, &recorded).await {
                            warn!(%error, "failed to persist decision");
                        }
                        if let Err(error) = store
                            .set_session_status(&session_id, SessionStatus::Completed)
                            .await
                        {
                            warn!(%error, "failed to persist session status");
                        }
                    });
                }
            }
        }

        tick += 1;
        if !detector.decided() && tick % PUCK_PUBLISH_TICKS == 0 {
            let _ = update_tx.send(EngineUpdate::Puck(PuckSample {
                tick,
                position: puck.position,
                velocity: puck.velocity,
            }));
        }
    }
}

fn publish_roster(roster_tx: &watch::Sender<RosterState>, status: SessionStatus, count: usize) {
    let _ = roster_tx.send(RosterState {
        status,
        participants: count as u32,
    });
}

fn spawn_status_update(store: &Arc<dyn SessionStore>, session_id: &str, status: SessionStatus) {
    let store = store.clone();
    let session_id = session_id.to_string();
    tokio::spawn(async move {
        if let Err(error) = store.set_session_status(&session_id, status).await {
            warn!(%error, ?status, "failed to persist session status");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layout::option_positions;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // In-memory double that records what the engine persisted.
    #[derive(Default)]
    struct RecordingStore {
        decisions: Mutex<Vec<DecisionRecord>>,
        statuses: Mutex<Vec<SessionStatus>>,
    }

    #[async_trait]
    impl SessionStore for RecordingStore {
        async fn create_session(&self, _record: SessionRecord) -> Result<(), String> {
            Ok(())
        }

        async fn get_session(&self, _session_id: &str) -> Result<Option<SessionRecord>, String> {
            Ok(None)
        }

        async fn list_open_sessions(&self) -> Result<Vec<SessionRecord>, String> {
            Ok(Vec::new())
        }

        async fn add_participant(
            &self,
            _session_id: &str,
            _participant_id: u64,
        ) -> Result<(), String> {
            Ok(())
        }

        async fn participant_count(&self, _session_id: &str) -> Result<u32, String> {
            Ok(0)
        }

        async fn record_decision(
            &self,
            _session_id: &str,
            decision: &DecisionRecord,
        ) -> Result<(), String> {
            self.decisions
                .lock()
                .expect("decisions mutex poisoned")
                .push(decision.clone());
            Ok(())
        }

        async fn set_session_status(
            &self,
            _session_id: &str,
            status: SessionStatus,
        ) -> Result<(), String> {
            self.statuses
                .lock()
                .expect("statuses mutex poisoned")
                .push(status);
            Ok(())
        }
    }

    struct Harness {
        event_tx: mpsc::Sender<SwarmEvent>,
        update_rx: broadcast::Receiver<EngineUpdate>,
        roster_rx: watch::Receiver<RosterState>,
        decision_rx: watch::Receiver<Option<DecisionRecord>>,
        store: Arc<RecordingStore>,
        shutdown: Arc<Notify>,
    }

    fn spawn_engine(options: Vec<String>) -> Harness {
        let store = Arc::new(RecordingStore::default());
        let (event_tx, event_rx) = mpsc::channel(64);
        let (update_tx, update_rx) = broadcast::channel(1024);
        let (roster_tx, roster_rx) = watch::channel(RosterState {
            status: SessionStatus::Pending,
            participants: 0,
        });
        let (decision_tx, decision_rx) = watch::channel(None);
        let shutdown = Arc::new(Notify::new());

        let record = SessionRecord {
            session_id: "s-1".to_string(),
            title: "lunch".to_string(),
            question: "where to?".to_string(),
            options: options.clone(),
            status: SessionStatus::Pending,
        };
        let points = option_positions(options.len());

        tokio::spawn(swarm_task(
            record,
            points,
            store.clone() as Arc<dyn SessionStore>,
            event_rx,
            update_tx,
            roster_tx,
            decision_tx,
            Duration::from_millis(33),
            shutdown.clone(),
        ));

        Harness {
            event_tx,
            update_rx,
            roster_rx,
            decision_rx,
            store,
            shutdown,
        }
    }

    fn three_options() -> Vec<String> {
        vec!["tacos".into(), "ramen".into(), "pizza".into()]
    }

    #[tokio::test(start_paused = true)]
    async fn a_steady_pull_decides_on_the_nearest_option_exactly_once() {
        let mut h = spawn_engine(three_options());

        h.event_tx
            .send(SwarmEvent::Join { participant_id: 1 })
            .await
            .expect("engine alive");
        h.event_tx
            .send(SwarmEvent::Intent {
                participant_id: 1,
                target: Vec2::new(25.0, 25.0),
            })
            .await
            .expect("engine alive");

        tokio::time::timeout(Duration::from_secs(60), h.decision_rx.changed())
            .await
            .expect("decision within simulated time")
            .expect("engine alive");

        let decision = h
            .decision_rx
            .borrow_and_update()
            .clone()
            .expect("decision present");
        assert_eq!(decision.option_index, 0);
        assert_eq!(decision.option, "tacos");
        assert_eq!(decision.conviction, 1.0);

        // Give the persistence tasks room to run, then verify exactly one
        // decision reached the store.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.decisions.lock().expect("mutex").len(), 1);
        let statuses = h.store.statuses.lock().expect("mutex").clone();
        assert!(statuses.contains(&SessionStatus::Active));
        assert!(statuses.contains(&SessionStatus::Completed));

        h.shutdown.notify_one();
    }

    #[tokio::test(start_paused = true)]
    async fn decided_is_terminal_for_puck_and_intents() {
        let mut h = spawn_engine(three_options());

        h.event_tx
            .send(SwarmEvent::Join { participant_id: 1 })
            .await
            .expect("engine alive");
        h.event_tx
            .send(SwarmEvent::Intent {
                participant_id: 1,
                target: Vec2::new(25.0, 25.0),
            })
            .await
            .expect("engine alive");

        tokio::time::timeout(Duration::from_secs(60), h.decision_rx.changed())
            .await
            .expect("decision within simulated time")
            .expect("engine alive");

        // Drain everything published on the way to the decision.
        while h.update_rx.try_recv().is_ok() {}

        // Later intents are no-ops: no echoes, no further puck samples.
        h.event_tx
            .send(SwarmEvent::Intent {
                participant_id: 1,
                target: Vec2::new(90.0, 90.0),
            })
            .await
            .expect("engine alive");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(matches!(
            h.update_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        // And the decision never changes.
        assert!(!h.decision_rx.has_changed().expect("engine alive"));

        h.shutdown.notify_one();
    }

    #[tokio::test(start_paused = true)]
    async fn reset_recenters_the_puck_and_publishes_immediately() {
        let mut h = spawn_engine(three_options());

        h.event_tx
            .send(SwarmEvent::Join { participant_id: 1 })
            .await
            .expect("engine alive");
        h.event_tx
            .send(SwarmEvent::Intent {
                participant_id: 1,
                target: Vec2::new(75.0, 75.0),
            })
            .await
            .expect("engine alive");

        // Let the puck drift off-center, then reset.
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.event_tx.send(SwarmEvent::Reset).await.expect("engine alive");

        // Samples published before the reset was drained may still be
        // queued; the reset itself publishes an exactly-centered sample.
        let mut recentered = false;
        for _ in 0..32 {
            match tokio::time::timeout(Duration::from_secs(5), h.update_rx.recv())
                .await
                .expect("sample within simulated time")
                .expect("engine alive")
            {
                EngineUpdate::Puck(sample)
                    if sample.position == Vec2::new(50.0, 50.0)
                        && sample.velocity == Vec2::ZERO =>
                {
                    recentered = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(recentered, "reset should publish a centered puck sample");

        h.shutdown.notify_one();
    }

    #[tokio::test(start_paused = true)]
    async fn roster_tracks_joins_and_leaves() {
        let mut h = spawn_engine(three_options());

        h.event_tx
            .send(SwarmEvent::Join { participant_id: 1 })
            .await
            .expect("engine alive");
        h.roster_rx.changed().await.expect("engine alive");
        let roster = *h.roster_rx.borrow_and_update();
        assert_eq!(roster.participants, 1);
        assert_eq!(roster.status, SessionStatus::Active);

        h.event_tx
            .send(SwarmEvent::Leave { participant_id: 1 })
            .await
            .expect("engine alive");
        h.roster_rx.changed().await.expect("engine alive");
        let roster = *h.roster_rx.borrow_and_update();
        assert_eq!(roster.participants, 0);

        h.shutdown.notify_one();
    }
}
