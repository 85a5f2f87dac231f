//! Session orchestrator.
//!
//! Commands and deadline firings for one session run inside that session's
//! lane: load the durable state, compute the transition, store it, then arm
//! or disarm timers and publish events. Timers are only a hint about when to
//! look again; every decision is re-derived from what is stored.

use chrono::{DateTime, Utc};
use db::{DbError, SessionStore};
use events::{Event, EventBus, EventEnvelope};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tempo_core::{PhaseSession, PhaseStatus, PhaseTemplate, Session, SessionStatus, SessionView, Timed};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{OrchestratorError, Result};
use crate::join_code::{JoinCodeSource, RandomJoinCodes};
use crate::lane::LaneRegistry;
use crate::scheduler::{DeadlineKey, DeadlineKind, FiredDeadline, PhaseScheduler};
use crate::state_machine::{self, Effect, Transition};
use crate::templates::PhaseTemplateProvider;

/// Attempts at finding an unused join code before giving up.
const JOIN_CODE_ATTEMPTS: usize = 8;

/// Delay before a deadline whose handling failed is tried again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn SessionStore>,
    templates: Arc<dyn PhaseTemplateProvider>,
    pub(crate) event_bus: EventBus,
    clock: Arc<dyn Clock>,
    scheduler: PhaseScheduler,
    lanes: LaneRegistry,
    join_codes: Arc<dyn JoinCodeSource>,
}

/// Cheap to clone; all clones drive the same sessions.
#[derive(Clone)]
pub struct SessionOrchestrator {
    pub(crate) inner: Arc<Inner>,
}

pub struct SessionOrchestratorBuilder {
    store: Arc<dyn SessionStore>,
    templates: Arc<dyn PhaseTemplateProvider>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    join_codes: Arc<dyn JoinCodeSource>,
}

impl SessionOrchestratorBuilder {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_join_codes(mut self, join_codes: Arc<dyn JoinCodeSource>) -> Self {
        self.join_codes = join_codes;
        self
    }

    /// Builds the orchestrator and spawns its deadline dispatcher, so this
    /// must run inside a tokio runtime.
    pub fn build(self) -> SessionOrchestrator {
        let (scheduler, fired) = PhaseScheduler::new();
        let inner = Arc::new(Inner {
            store: self.store,
            templates: self.templates,
            event_bus: self.event_bus,
            clock: self.clock,
            scheduler,
            lanes: LaneRegistry::new(),
            join_codes: self.join_codes,
        });

        spawn_dispatcher(Arc::downgrade(&inner), fired);
        SessionOrchestrator { inner }
    }
}

/// Routes fired deadlines to their handlers. Stops once the orchestrator is
/// dropped.
fn spawn_dispatcher(inner: Weak<Inner>, mut fired: mpsc::UnboundedReceiver<FiredDeadline>) {
    tokio::spawn(async move {
        while let Some(deadline) = fired.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let orchestrator = SessionOrchestrator { inner };
            tokio::spawn(async move {
                orchestrator.dispatch(deadline).await;
            });
        }
        debug!("Deadline dispatcher stopped");
    });
}

impl SessionOrchestrator {
    pub fn builder(
        store: Arc<dyn SessionStore>,
        templates: Arc<dyn PhaseTemplateProvider>,
        event_bus: EventBus,
    ) -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder {
            store,
            templates,
            event_bus,
            clock: Arc::new(SystemClock::new()),
            join_codes: Arc::new(RandomJoinCodes),
        }
    }

    pub fn new(
        store: Arc<dyn SessionStore>,
        templates: Arc<dyn PhaseTemplateProvider>,
        event_bus: EventBus,
    ) -> Self {
        Self::builder(store, templates, event_bus).build()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.inner.scheduler
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Creates a session with one pending phase per template of the format.
    pub async fn create(
        &self,
        game_format_id: i64,
        creator_id: i64,
        budget_seconds: i64,
        scheduled_start: Option<DateTime<Utc>>,
    ) -> Result<SessionView> {
        if budget_seconds <= 0 {
            return Err(OrchestratorError::Validation(
                "budget_seconds must be positive".to_string(),
            ));
        }

        let templates = self.inner.templates.phase_templates(game_format_id).await?;
        if !is_runnable_format(&templates) {
            return Err(OrchestratorError::InvalidFormat(game_format_id));
        }

        let now = self.now();
        let mut attempt = 0;
        let (session, phases) = loop {
            attempt += 1;
            let mut session = Session::new(
                game_format_id,
                creator_id,
                self.inner.join_codes.next_code(),
                budget_seconds,
                now,
            );
            if let Some(at) = scheduled_start {
                session = session.with_scheduled_start(at);
            }
            let phases: Vec<PhaseSession> = templates
                .iter()
                .map(|t| PhaseSession::from_template(session.id, t))
                .collect();

            match self.inner.store.insert_session(&session, &phases).await {
                Ok(()) => break (session, phases),
                Err(DbError::JoinCodeTaken(code)) if attempt < JOIN_CODE_ATTEMPTS => {
                    debug!(join_code = %code, attempt, "Join code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            session_id = %session.id,
            game_format_id,
            creator_id,
            phases = phases.len(),
            "Session created"
        );
        self.inner.event_bus.publish(EventEnvelope::at(
            Event::SessionCreated {
                session_id: session.id,
                status: session.status,
                join_code: session.join_code.clone(),
            },
            now,
        ));

        let _lane = self.inner.lanes.acquire(session.id).await;
        match session.scheduled_start {
            Some(at) if at > now => {
                let key = DeadlineKey::new(session.id, DeadlineKind::ScheduledStart);
                self.inner.scheduler.arm(key, delay_until(now, at));
                info!(session_id = %session.id, scheduled_start = %at, "Session start scheduled");
                Ok(SessionView::new(&session, &phases, now))
            }
            Some(_) => {
                let transition = state_machine::start(&session, &phases, now)?;
                self.apply(transition).await
            }
            None => Ok(SessionView::new(&session, &phases, now)),
        }
    }

    async fn load(&self, session_id: Uuid) -> Result<(Session, Vec<PhaseSession>)> {
        self.inner
            .store
            .load(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::session_not_found(session_id))
    }

    /// Runs one command inside the session's lane.
    async fn command<F>(&self, session_id: Uuid, op: &'static str, f: F) -> Result<SessionView>
    where
        F: FnOnce(&Session, &[PhaseSession], DateTime<Utc>) -> Result<Transition>,
    {
        let _lane = self.inner.lanes.acquire(session_id).await;
        let (session, phases) = self.load(session_id).await?;
        let now = self.now();

        let transition = f(&session, &phases, now).map_err(|e| {
            debug!(session_id = %session_id, op, error = %e, "Command rejected");
            e
        })?;
        let view = self.apply(transition).await?;
        info!(session_id = %session_id, op, status = view.session.status.as_str(), "Session transition");
        Ok(view)
    }

    pub async fn start(&self, session_id: Uuid) -> Result<SessionView> {
        self.command(session_id, "start", state_machine::start).await
    }

    pub async fn pause(&self, session_id: Uuid) -> Result<SessionView> {
        self.command(session_id, "pause", state_machine::pause).await
    }

    pub async fn resume(&self, session_id: Uuid) -> Result<SessionView> {
        self.command(session_id, "resume", state_machine::resume).await
    }

    pub async fn complete(&self, session_id: Uuid) -> Result<SessionView> {
        self.command(session_id, "complete", state_machine::complete).await
    }

    pub async fn extend(&self, session_id: Uuid, additional_seconds: i64) -> Result<SessionView> {
        self.command(session_id, "extend", |session, phases, now| {
            state_machine::extend(session, phases, additional_seconds, now)
        })
        .await
    }

    /// Live view of a session. Does not take the lane.
    pub async fn status(&self, session_id: Uuid) -> Result<SessionView> {
        let (session, phases) = self.load(session_id).await?;
        Ok(SessionView::new(&session, &phases, self.now()))
    }

    /// Sessions newest first, optionally only those of one creator.
    pub async fn list(&self, creator_id: Option<i64>) -> Result<Vec<Session>> {
        Ok(self.inner.store.list_sessions(creator_id).await?)
    }

    /// Stores the transition, then applies its effects.
    async fn apply(&self, transition: Transition) -> Result<SessionView> {
        if transition.needs_persist() {
            self.inner
                .store
                .save(&transition.session, &transition.changed_phases())
                .await?;
        }

        let session_id = transition.session.id;
        let now = self.now();
        for effect in transition.effects {
            match effect {
                Effect::Arm { kind, at } => {
                    self.inner
                        .scheduler
                        .arm(DeadlineKey::new(session_id, kind), delay_until(now, at));
                }
                Effect::Disarm(kind) => {
                    self.inner.scheduler.disarm(DeadlineKey::new(session_id, kind));
                }
                Effect::Publish { event, at } => {
                    self.inner.event_bus.publish(EventEnvelope::at(event, at));
                }
            }
        }

        if transition.session.status == SessionStatus::Completed {
            self.inner.scheduler.disarm_session(session_id);
            self.inner.lanes.retire(session_id);
        }

        Ok(SessionView::new(&transition.session, &transition.phases, now))
    }

    /// Handles a deadline firing inside the session's lane. The token must
    /// still be the armed one, otherwise the firing is stale.
    async fn on_deadline<F>(&self, key: DeadlineKey, token: u64, f: F) -> Result<SessionView>
    where
        F: FnOnce(&Session, &[PhaseSession], DateTime<Utc>) -> Result<Transition>,
    {
        let _lane = self.inner.lanes.acquire(key.session_id).await;
        if !self.inner.scheduler.take_if_current(key, token) {
            return Err(OrchestratorError::Stale);
        }

        let result: Result<SessionView> = async move {
            let (session, phases) = self.load(key.session_id).await?;
            let transition = f(&session, &phases, self.now())?;
            self.apply(transition).await
        }
        .await;

        if let Err(OrchestratorError::Database(e)) = &result {
            error!(session_id = %key.session_id, ?key.kind, error = %e, "Deadline handling failed, retrying");
            self.inner.scheduler.arm(key, RETRY_DELAY);
        }
        result
    }

    /// A phase's budget deadline fired.
    pub async fn on_phase_deadline(
        &self,
        session_id: Uuid,
        phase_session_id: Uuid,
        token: u64,
    ) -> Result<SessionView> {
        let key = DeadlineKey::new(session_id, DeadlineKind::Phase(phase_session_id));
        self.on_deadline(key, token, |session, phases, now| {
            state_machine::expire_phase(session, phases, phase_session_id, now)
        })
        .await
    }

    /// The session's total budget deadline fired.
    pub async fn on_session_deadline(&self, session_id: Uuid, token: u64) -> Result<SessionView> {
        let key = DeadlineKey::new(session_id, DeadlineKind::SessionBudget);
        self.on_deadline(key, token, state_machine::expire_session)
            .await
    }

    /// A scheduled start time was reached.
    pub async fn on_scheduled_start(&self, session_id: Uuid, token: u64) -> Result<SessionView> {
        let key = DeadlineKey::new(session_id, DeadlineKind::ScheduledStart);
        self.on_deadline(key, token, state_machine::scheduled_start)
            .await
    }

    async fn dispatch(&self, deadline: FiredDeadline) {
        let FiredDeadline { key, token } = deadline;
        let result = match key.kind {
            DeadlineKind::Phase(phase_session_id) => {
                self.on_phase_deadline(key.session_id, phase_session_id, token)
                    .await
            }
            DeadlineKind::SessionBudget => self.on_session_deadline(key.session_id, token).await,
            DeadlineKind::ScheduledStart => self.on_scheduled_start(key.session_id, token).await,
        };

        match result {
            Ok(view) => debug!(
                session_id = %key.session_id,
                ?key.kind,
                status = view.session.status.as_str(),
                "Deadline handled"
            ),
            Err(OrchestratorError::Stale) => {
                debug!(session_id = %key.session_id, ?key.kind, token, "Ignoring stale deadline")
            }
            Err(e) => warn!(session_id = %key.session_id, ?key.kind, error = %e, "Deadline failed"),
        }
    }

    /// Re-arms every deadline implied by durable state. Run once at process
    /// start, before serving commands. Deadlines already in the past fire
    /// immediately.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for session in self.inner.store.open_sessions().await? {
            let _lane = self.inner.lanes.acquire(session.id).await;
            let phases = self.inner.store.find_phases(session.id).await?;
            let now = self.now();
            report.sessions += 1;

            match session.status {
                SessionStatus::Active => {
                    if let Some(at) = session.exhausted_at() {
                        self.arm_recovered(session.id, DeadlineKind::SessionBudget, now, at);
                        report.deadlines += 1;
                    }
                    let mut running = 0;
                    for phase in phases.iter().filter(|p| p.status == PhaseStatus::Active) {
                        if let Some(at) = phase.exhausted_at() {
                            self.arm_recovered(session.id, DeadlineKind::Phase(phase.id), now, at);
                            report.deadlines += 1;
                            running += 1;
                        }
                    }
                    if running == 0 {
                        warn!(session_id = %session.id, "Active session has no running phase");
                    }
                }
                SessionStatus::Pending => {
                    if let Some(at) = session.scheduled_start {
                        self.arm_recovered(session.id, DeadlineKind::ScheduledStart, now, at);
                        report.deadlines += 1;
                    }
                }
                SessionStatus::Paused | SessionStatus::Completed => {}
            }
        }

        info!(
            sessions = report.sessions,
            deadlines = report.deadlines,
            "Recovered session deadlines"
        );
        Ok(report)
    }

    fn arm_recovered(&self, session_id: Uuid, kind: DeadlineKind, now: DateTime<Utc>, at: DateTime<Utc>) {
        debug!(session_id = %session_id, ?kind, deadline = %at, "Re-arming deadline");
        self.inner
            .scheduler
            .arm(DeadlineKey::new(session_id, kind), delay_until(now, at));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Open sessions inspected.
    pub sessions: usize,
    /// Deadlines armed.
    pub deadlines: usize,
}

/// At least one phase, every budget positive and no two phases sharing a
/// position.
fn is_runnable_format(templates: &[PhaseTemplate]) -> bool {
    let mut positions: Vec<i32> = templates.iter().map(|t| t.position).collect();
    positions.sort_unstable();
    !templates.is_empty()
        && templates.iter().all(|t| t.budget_seconds > 0)
        && positions.windows(2).all(|w| w[0] != w[1])
}

fn delay_until(now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
