// cardwatch-api: Async Rust client for the attendance backend (REST + event stream)

pub mod client;
pub mod error;
pub mod models;
pub mod stream;
pub mod transport;

pub use client::AttendanceClient;
pub use error::Error;
pub use models::{
    Attendance, AttendanceFilters, CreateUserRequest, Direction, HealthStatus, PresentUser,
    UpdateUserRequest, User, UserRef,
};
pub use stream::{
    AttendanceEvent, IgnoreReason, IgnoredEvent, MessageStream, SseConnector, StreamConnector,
    StreamEvent, UnknownEvent, WireMessage,
};
pub use transport::TransportConfig;
