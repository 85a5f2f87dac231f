//! The nested session/phase state machine.
//!
//! Every function here is pure: it takes the current durable state and
//! `now`, and returns the new state together with the effects the caller has
//! to apply once that state is stored (timers to arm or disarm, events to
//! publish). Nothing is applied on error.

use chrono::{DateTime, Utc};
use events::Event;
use tempo_core::{PhaseSession, PhaseStatus, Session, SessionStatus, Timed};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::scheduler::DeadlineKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Arm { kind: DeadlineKind, at: DateTime<Utc> },
    Disarm(DeadlineKind),
    Publish { event: Event, at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    /// All phases of the session in position order, after the transition.
    pub phases: Vec<PhaseSession>,
    pub effects: Vec<Effect>,
    session_changed: bool,
    changed: Vec<Uuid>,
}

impl Transition {
    fn new(session: &Session, phases: &[PhaseSession]) -> Self {
        let mut phases = phases.to_vec();
        phases.sort_by_key(|p| p.position);
        Self {
            session: session.clone(),
            phases,
            effects: Vec::new(),
            session_changed: false,
            changed: Vec::new(),
        }
    }

    /// Whether anything has to be written back.
    pub fn needs_persist(&self) -> bool {
        self.session_changed || !self.changed.is_empty()
    }

    /// The phases modified by this transition.
    pub fn changed_phases(&self) -> Vec<PhaseSession> {
        self.phases
            .iter()
            .filter(|p| self.changed.contains(&p.id))
            .cloned()
            .collect()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Publish { event, .. } => Some(event),
            _ => None,
        })
    }

    fn touch(&mut self, index: usize) {
        let id = self.phases[index].id;
        if !self.changed.contains(&id) {
            self.changed.push(id);
        }
    }

    fn publish(&mut self, event: Event, at: DateTime<Utc>) {
        self.effects.push(Effect::Publish { event, at });
    }

    fn session_event(&mut self, at: DateTime<Utc>) {
        let session_id = self.session.id;
        let status = self.session.status;
        let event = match status {
            SessionStatus::Active => Event::SessionStarted { session_id, status },
            SessionStatus::Paused => Event::SessionPaused { session_id, status },
            SessionStatus::Completed => Event::SessionCompleted { session_id, status },
            SessionStatus::Pending => return,
        };
        self.publish(event, at);
    }

    fn phase_event(&mut self, index: usize, at: DateTime<Utc>) {
        let phase = &self.phases[index];
        let (session_id, phase_session_id, position, status) =
            (phase.session_id, phase.id, phase.position, phase.status);
        let event = match status {
            PhaseStatus::Completed => Event::PhaseCompleted {
                session_id,
                phase_session_id,
                position,
                status,
            },
            _ => Event::PhaseStarted {
                session_id,
                phase_session_id,
                position,
                status,
            },
        };
        self.publish(event, at);
    }

    fn index_where(&self, status: PhaseStatus) -> Option<usize> {
        self.phases.iter().position(|p| p.status == status)
    }

    /// Next pending phase after `index` in position order.
    fn next_pending(&self, after: Option<usize>) -> Option<usize> {
        let from = after.map_or(0, |i| i + 1);
        (from..self.phases.len()).find(|&i| self.phases[i].status == PhaseStatus::Pending)
    }

    fn arm_phase(&mut self, index: usize) {
        let phase = &self.phases[index];
        if let Some(at) = phase.exhausted_at() {
            self.effects.push(Effect::Arm {
                kind: DeadlineKind::Phase(phase.id),
                at,
            });
        }
    }

    fn arm_session_budget(&mut self) {
        if let Some(at) = self.session.exhausted_at() {
            self.effects.push(Effect::Arm {
                kind: DeadlineKind::SessionBudget,
                at,
            });
        }
    }

    fn activate_phase(&mut self, index: usize, at: DateTime<Utc>) -> Result<()> {
        self.phases[index].activate(at)?;
        self.touch(index);
        self.arm_phase(index);
        self.phase_event(index, at);
        Ok(())
    }

    /// Closes every open phase and the session itself at `at`.
    fn close_session(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.session.complete(at)?;
        self.session_changed = true;

        for index in 0..self.phases.len() {
            if self.phases[index].status.is_terminal() {
                continue;
            }
            self.phases[index].complete(at)?;
            self.touch(index);
            let id = self.phases[index].id;
            self.effects.push(Effect::Disarm(DeadlineKind::Phase(id)));
            self.phase_event(index, at);
        }

        self.effects.push(Effect::Disarm(DeadlineKind::SessionBudget));
        self.effects.push(Effect::Disarm(DeadlineKind::ScheduledStart));
        self.session_event(at);
        Ok(())
    }
}

/// PENDING → ACTIVE; the first phase starts with it.
pub fn start(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    t.session.start(now)?;
    t.session_changed = true;

    let first = t
        .next_pending(None)
        .ok_or(OrchestratorError::InvalidFormat(session.game_format_id))?;

    t.effects.push(Effect::Disarm(DeadlineKind::ScheduledStart));
    t.session_event(now);
    t.activate_phase(first, now)?;
    t.arm_session_budget();
    Ok(t)
}

/// ACTIVE → PAUSED; the running phase is frozen with it.
pub fn pause(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    t.session.pause(now)?;
    t.session_changed = true;

    if let Some(index) = t.index_where(PhaseStatus::Active) {
        t.phases[index].pause(now)?;
        t.touch(index);
        let id = t.phases[index].id;
        t.effects.push(Effect::Disarm(DeadlineKind::Phase(id)));
    }
    t.effects.push(Effect::Disarm(DeadlineKind::SessionBudget));
    t.session_event(now);
    Ok(t)
}

/// PAUSED → ACTIVE; the paused phase continues with what it had left.
pub fn resume(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    t.session.resume(now)?;
    t.session_changed = true;

    let session_id = t.session.id;
    let status = t.session.status;
    t.publish(Event::SessionResumed { session_id, status }, now);

    if let Some(index) = t.index_where(PhaseStatus::Paused) {
        t.phases[index].resume(now)?;
        t.touch(index);
        t.arm_phase(index);
    } else if t.index_where(PhaseStatus::Active).is_none() {
        // Paused between phases: pick up with the next one.
        if let Some(index) = t.next_pending(None) {
            t.activate_phase(index, now)?;
        }
    }
    t.arm_session_budget();
    Ok(t)
}

/// Forced completion from ACTIVE or PAUSED.
pub fn complete(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    t.close_session(now)?;
    Ok(t)
}

/// Adds to the total budget.
pub fn extend(
    session: &Session,
    phases: &[PhaseSession],
    additional_seconds: i64,
    now: DateTime<Utc>,
) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    t.session.extend(additional_seconds)?;
    t.session_changed = true;

    if t.session.status == SessionStatus::Active {
        t.arm_session_budget();
    }
    let event = Event::SessionExtended {
        session_id: t.session.id,
        status: t.session.status,
        budget_seconds: t.session.budget_seconds,
    };
    t.publish(event, now);
    Ok(t)
}

/// A phase deadline fired.
///
/// If the durable clock says time is left the deadline is simply re-armed.
/// Otherwise the phase completes at the instant its budget ran out and the
/// next phase starts from that same instant, so late firings after a
/// restart lose no time. When the session budget ran out no later than the
/// phase budget, the whole session closes at the session's exhaustion
/// instant instead.
pub fn expire_phase(
    session: &Session,
    phases: &[PhaseSession],
    phase_session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    let index = t
        .phases
        .iter()
        .position(|p| p.id == phase_session_id)
        .ok_or(OrchestratorError::Stale)?;

    if t.session.status != SessionStatus::Active || t.phases[index].status != PhaseStatus::Active {
        return Err(OrchestratorError::Stale);
    }

    if t.phases[index].remaining_ms(now) > 0 {
        t.arm_phase(index);
        return Ok(t);
    }

    let at = t.phases[index].exhausted_at().unwrap_or(now);
    if let Some(session_at) = t.session.exhausted_at().filter(|s| *s <= at) {
        t.close_session(session_at)?;
        return Ok(t);
    }

    t.phases[index].expire(at)?;
    t.touch(index);
    t.phase_event(index, at);

    match t.next_pending(Some(index)) {
        Some(next) => t.activate_phase(next, at)?,
        None => t.close_session(at)?,
    }
    Ok(t)
}

/// The session's total budget deadline fired.
pub fn expire_session(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Result<Transition> {
    let mut t = Transition::new(session, phases);
    if t.session.status != SessionStatus::Active {
        return Err(OrchestratorError::Stale);
    }

    if t.session.remaining_ms(now) > 0 {
        t.arm_session_budget();
        return Ok(t);
    }

    let at = t.session.exhausted_at().unwrap_or(now);
    t.close_session(at)?;
    Ok(t)
}

/// A scheduled start fired.
pub fn scheduled_start(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Result<Transition> {
    if session.status != SessionStatus::Pending {
        return Err(OrchestratorError::Stale);
    }
    if let Some(at) = session.scheduled_start.filter(|at| *at > now) {
        let mut t = Transition::new(session, phases);
        t.effects.push(Effect::Arm {
            kind: DeadlineKind::ScheduledStart,
            at,
        });
        return Ok(t);
    }
    start(session, phases, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempo_core::PhaseTemplate;

    fn fixture(budget: i64, phase_budgets: &[i64]) -> (Session, Vec<PhaseSession>) {
        let session = Session::new(1, 1, "MACHINE1", budget, Utc::now());
        let phases = phase_budgets
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let position = i as i32 + 1;
                PhaseSession::from_template(
                    session.id,
                    &PhaseTemplate::new(1, position as i64, position, "p", *b),
                )
            })
            .collect();
        (session, phases)
    }

    fn kinds(t: &Transition) -> Vec<&'static str> {
        t.events().map(|e| e.kind()).collect()
    }

    fn active_count(phases: &[PhaseSession]) -> usize {
        phases.iter().filter(|p| p.status == PhaseStatus::Active).count()
    }

    #[test]
    fn test_start_activates_first_phase() {
        let (session, phases) = fixture(600, &[5, 3]);
        let t0 = session.created_at;

        let t = start(&session, &phases, t0).unwrap();
        assert_eq!(t.session.status, SessionStatus::Active);
        assert_eq!(t.phases[0].status, PhaseStatus::Active);
        assert_eq!(t.phases[1].status, PhaseStatus::Pending);
        assert_eq!(kinds(&t), vec!["session.started", "phase.started"]);
        assert_eq!(t.changed_phases().len(), 1);

        assert!(t.effects.contains(&Effect::Arm {
            kind: DeadlineKind::Phase(phases[0].id),
            at: t0 + Duration::seconds(5),
        }));
        assert!(t.effects.contains(&Effect::Arm {
            kind: DeadlineKind::SessionBudget,
            at: t0 + Duration::seconds(600),
        }));
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let (session, phases) = fixture(60, &[5]);
        let t = start(&session, &phases, session.created_at).unwrap();
        let err = start(&t.session, &t.phases, session.created_at).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let (session, phases) = fixture(60, &[5]);
        let t0 = session.created_at;

        let t = start(&session, &phases, t0).unwrap();
        let t = pause(&t.session, &t.phases, t0 + Duration::seconds(2)).unwrap();
        assert_eq!(t.session.elapsed_ms, 2000);
        assert_eq!(t.phases[0].status, PhaseStatus::Paused);
        assert_eq!(t.phases[0].elapsed_ms, 2000);
        assert!(t.effects.contains(&Effect::Disarm(DeadlineKind::Phase(phases[0].id))));
        assert!(t.effects.contains(&Effect::Disarm(DeadlineKind::SessionBudget)));
        assert_eq!(kinds(&t), vec!["session.paused"]);

        let t = resume(&t.session, &t.phases, t0 + Duration::seconds(10)).unwrap();
        assert_eq!(t.phases[0].status, PhaseStatus::Active);
        assert!(t.effects.contains(&Effect::Arm {
            kind: DeadlineKind::Phase(phases[0].id),
            at: t0 + Duration::seconds(13),
        }));
        assert_eq!(kinds(&t), vec!["session.resumed"]);
    }

    #[test]
    fn test_pause_requires_active() {
        let (session, phases) = fixture(60, &[5]);
        let err = pause(&session, &phases, session.created_at).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        let err = resume(&session, &phases, session.created_at).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[test]
    fn test_complete_closes_every_open_phase() {
        let (session, phases) = fixture(60, &[5, 3, 2]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        let t = complete(&t.session, &t.phases, t0 + Duration::seconds(1)).unwrap();
        assert_eq!(t.session.status, SessionStatus::Completed);
        assert_eq!(t.session.elapsed_ms, 60_000);
        assert!(t.phases.iter().all(|p| p.status == PhaseStatus::Completed));
        assert_eq!(t.phases[0].elapsed_ms, 1000);
        assert_eq!(
            kinds(&t),
            vec!["phase.completed", "phase.completed", "phase.completed", "session.completed"]
        );
    }

    #[test]
    fn test_complete_pending_and_completed() {
        let (session, phases) = fixture(60, &[5]);
        let err = complete(&session, &phases, session.created_at).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        let t = start(&session, &phases, session.created_at).unwrap();
        let t = complete(&t.session, &t.phases, session.created_at).unwrap();
        let err = complete(&t.session, &t.phases, session.created_at).unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyCompleted(id) if id == session.id));
    }

    #[test]
    fn test_early_firing_only_rearms() {
        let (session, phases) = fixture(60, &[5]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        let early = expire_phase(&t.session, &t.phases, phases[0].id, t0 + Duration::seconds(4)).unwrap();
        assert!(!early.needs_persist());
        assert_eq!(
            early.effects,
            vec![Effect::Arm {
                kind: DeadlineKind::Phase(phases[0].id),
                at: t0 + Duration::seconds(5),
            }]
        );
    }

    #[test]
    fn test_expiry_advances_in_order() {
        let (session, phases) = fixture(600, &[5, 3]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        let t = expire_phase(&t.session, &t.phases, phases[0].id, t0 + Duration::seconds(5)).unwrap();
        assert_eq!(t.phases[0].status, PhaseStatus::Completed);
        assert_eq!(t.phases[0].elapsed_ms, 5000);
        assert_eq!(t.phases[1].status, PhaseStatus::Active);
        assert_eq!(t.phases[1].active_since, Some(t0 + Duration::seconds(5)));
        assert_eq!(active_count(&t.phases), 1);
        assert_eq!(kinds(&t), vec!["phase.completed", "phase.started"]);

        let t = expire_phase(&t.session, &t.phases, phases[1].id, t0 + Duration::seconds(8)).unwrap();
        assert_eq!(t.session.status, SessionStatus::Completed);
        assert_eq!(t.session.ended_at, Some(t0 + Duration::seconds(8)));
        assert_eq!(kinds(&t), vec!["phase.completed", "session.completed"]);
    }

    #[test]
    fn test_late_firing_uses_exhaustion_instant() {
        let (session, phases) = fixture(600, &[5, 3]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        // Process was down until t0 + 60s.
        let late = t0 + Duration::seconds(60);
        let t = expire_phase(&t.session, &t.phases, phases[0].id, late).unwrap();
        assert_eq!(t.phases[0].ended_at, Some(t0 + Duration::seconds(5)));
        assert_eq!(t.phases[1].active_since, Some(t0 + Duration::seconds(5)));
        assert!(t.effects.contains(&Effect::Arm {
            kind: DeadlineKind::Phase(phases[1].id),
            at: t0 + Duration::seconds(8),
        }));

        let t = expire_phase(&t.session, &t.phases, phases[1].id, late).unwrap();
        assert_eq!(t.session.ended_at, Some(t0 + Duration::seconds(8)));
    }

    #[test]
    fn test_late_phase_firing_respects_earlier_session_exhaustion() {
        let (session, phases) = fixture(4, &[5, 3]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        // Both deadlines are overdue; the phase firing gets the lane first.
        let late = t0 + Duration::seconds(60);
        let t = expire_phase(&t.session, &t.phases, phases[0].id, late).unwrap();
        assert_eq!(t.session.status, SessionStatus::Completed);
        assert_eq!(t.session.ended_at, Some(t0 + Duration::seconds(4)));
        assert_eq!(t.phases[0].ended_at, Some(t0 + Duration::seconds(4)));
        assert_eq!(t.phases[0].elapsed_ms, 4000);
        assert_eq!(t.phases[1].status, PhaseStatus::Completed);
        assert!(t.phases[1].active_since.is_none());
        assert_eq!(active_count(&t.phases), 0);
        assert!(!kinds(&t).contains(&"phase.started"));
        assert_eq!(kinds(&t).last(), Some(&"session.completed"));

        let err = expire_session(&t.session, &t.phases, late).unwrap_err();
        assert!(matches!(err, OrchestratorError::Stale));
    }

    #[test]
    fn test_expiry_of_paused_phase_is_stale() {
        let (session, phases) = fixture(60, &[5]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();
        let t = pause(&t.session, &t.phases, t0 + Duration::seconds(1)).unwrap();

        let err = expire_phase(&t.session, &t.phases, phases[0].id, t0 + Duration::seconds(9)).unwrap_err();
        assert!(matches!(err, OrchestratorError::Stale));

        let err = expire_phase(&t.session, &t.phases, Uuid::new_v4(), t0).unwrap_err();
        assert!(matches!(err, OrchestratorError::Stale));
    }

    #[test]
    fn test_session_budget_expiry() {
        let (session, phases) = fixture(4, &[5, 3]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        let early = expire_session(&t.session, &t.phases, t0 + Duration::seconds(3)).unwrap();
        assert!(!early.needs_persist());

        let t = expire_session(&t.session, &t.phases, t0 + Duration::seconds(4)).unwrap();
        assert_eq!(t.session.status, SessionStatus::Completed);
        assert_eq!(t.phases[0].elapsed_ms, 4000);
        assert_eq!(t.phases[1].status, PhaseStatus::Completed);
        assert_eq!(active_count(&t.phases), 0);
    }

    #[test]
    fn test_extend_rearms_running_budget() {
        let (session, phases) = fixture(10, &[5]);
        let t0 = session.created_at;
        let t = start(&session, &phases, t0).unwrap();

        let t = extend(&t.session, &t.phases, 20, t0 + Duration::seconds(1)).unwrap();
        assert_eq!(t.session.budget_seconds, 30);
        assert!(t.effects.contains(&Effect::Arm {
            kind: DeadlineKind::SessionBudget,
            at: t0 + Duration::seconds(30),
        }));
        assert_eq!(kinds(&t), vec!["session.extended"]);

        let err = extend(&t.session, &t.phases, 0, t0).unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[test]
    fn test_scheduled_start() {
        let (session, phases) = fixture(60, &[5]);
        let t0 = session.created_at;
        let session = session.with_scheduled_start(t0 + Duration::seconds(30));

        let early = scheduled_start(&session, &phases, t0 + Duration::seconds(29)).unwrap();
        assert!(!early.needs_persist());

        let t = scheduled_start(&session, &phases, t0 + Duration::seconds(30)).unwrap();
        assert_eq!(t.session.status, SessionStatus::Active);

        let err = scheduled_start(&t.session, &t.phases, t0 + Duration::seconds(31)).unwrap_err();
        assert!(matches!(err, OrchestratorError::Stale));
    }

    #[test]
    fn test_single_active_phase_through_interleavings() {
        let (session, phases) = fixture(600, &[3, 3, 3]);
        let t0 = session.created_at;
        let mut t = start(&session, &phases, t0).unwrap();
        let mut now = t0;

        for step in 0..12 {
            now += Duration::seconds(1);
            let next = match step % 4 {
                0 => pause(&t.session, &t.phases, now),
                1 => resume(&t.session, &t.phases, now),
                _ => {
                    let id = t.phases.iter().find(|p| p.status == PhaseStatus::Active).map(|p| p.id);
                    match id {
                        Some(id) => expire_phase(&t.session, &t.phases, id, now + Duration::seconds(3)),
                        None => continue,
                    }
                }
            };
            if let Ok(next) = next {
                t = next;
            }
            assert!(active_count(&t.phases) <= 1);
            if t.session.status == SessionStatus::Active {
                assert_eq!(active_count(&t.phases), 1);
            }
        }
    }
}
