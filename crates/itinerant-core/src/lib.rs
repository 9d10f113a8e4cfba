//! itinerant-core – the trip co-design session workflow.
//!
//! The crate owns everything between an HTTP handler and the outside world:
//!
//! - [`session`]: the TTL-evicting session store and its background sweeper.
//! - [`workflow`]: the stage state machine, its transition table and the
//!   destination-change back-edge.
//! - [`enrich`]: batched, idempotent name → coordinate resolution.
//! - [`services`]: the Generation / Places / Geocoding collaborator boundary
//!   plus HTTP implementations of each.
//! - [`coords`], [`conversation`], [`map`]: small pure helpers.

pub mod conversation;
pub mod coords;
pub mod enrich;
pub mod error;
pub mod map;
pub mod model;
pub mod services;
pub mod session;
pub mod stage;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use conversation::{ChatMessage, ConversationLog, Role};
pub use coords::Coordinates;
pub use enrich::{Enricher, EnrichmentReport};
pub use error::WorkflowError;
pub use map::MapView;
pub use model::{Session, TripInfo, WorkflowState};
pub use session::{MemorySessionStore, SessionPatch, SessionStore, SessionSweeper};
pub use workflow::{ActivityMove, DaySelections, StageOutcome, Workflow, WorkflowConfig};
