//! rollcall - scannable identity tokens and attendance authorization
//!
//! Two pipelines share one data model:
//! - **Issuance**: [`Issuer`] turns a display name into an identity token,
//!   renders its payload as a QR code, and registers the payload.
//! - **Authorization**: a [`ScanSession`] pulls frames, decodes payloads,
//!   asks the [`AuthorizationEngine`] for a decision on each one, and
//!   appends an attendance event for every payload that is authorized and
//!   outside its suppression window.
//!
//! Payloads are plain text. Anyone who can read a code can copy it.

pub mod artifact;
pub mod audit;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod frame;
pub mod issuance;
pub mod presenter;
pub mod registry;
pub mod session;
pub mod sink;
pub mod token;

pub use artifact::{ArtifactRenderer, SvgQrRenderer};
pub use audit::{AuditLog, FileAuditLog, IssuanceRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use cooldown::Cooldown;
pub use encoder::{IdentityEncoder, IssuedIdentity};
pub use engine::{AuthorizationEngine, Decision, DecisionKind, SharedEngine};
pub use error::{Error, Result};
pub use frame::{BoundingBox, CodeReader, Detection, Frame, FrameSource};
pub use issuance::{Issued, Issuer};
pub use presenter::{LogPresenter, Presenter};
pub use registry::{FileRegistry, MemoryRegistry, Registry, RegistryStore};
pub use session::{ScanSession, SessionSummary, StopSignal};
pub use sink::{AttendanceEvent, EventSink, FileEventSink, MemorySink};
pub use token::{IdentityToken, Payload, PayloadFormat, TokenFields, TokenId};
