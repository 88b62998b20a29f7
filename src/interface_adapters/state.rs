use crate::domain::ports::SessionStore;
use crate::use_cases::SessionRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Registry of active session engines.
    pub session_registry: Arc<SessionRegistry>,
    // External session/storage layer behind its port.
    pub store: Arc<dyn SessionStore>,
}
