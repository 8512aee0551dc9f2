//! Client core for the transit delay planner: API access, the cascading
//! trip selection controller, and the persisted sign-in session.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod providers;
pub mod selection;
pub mod session;
mod session_store;
pub mod trip;

pub use api::ApiClient;
pub use chat::ChatAssistant;
pub use config::{load_settings, Settings};
pub use error::{AuthError, ClientError, SelectionError, SubmitError, ValidationError};
pub use selection::{
    ControllerConfig, ControllerEvent, ControllerServices, NodeKind, NodePhase, SelectionController,
};
pub use session::{MemorySessionStore, Session, SessionContext, SessionStore};
pub use session_store::DurableSessionStore;
pub use trip::{DelayBand, EventType, PredictionOutcome, TripParameters, WeatherCondition};
