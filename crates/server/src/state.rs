use events::EventBus;
use orchestrator::SessionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(orchestrator: SessionOrchestrator) -> Self {
        let event_bus = orchestrator.event_bus().clone();
        Self {
            orchestrator,
            event_bus,
        }
    }
}
