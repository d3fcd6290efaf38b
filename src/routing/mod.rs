//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → path.rs (parse /volume/{name}[/rest])
//!     → router.rs (route lookup)
//!     → table.rs (volume lookup, lock-free read)
//!     → volume.rs (round-robin / degraded selection)
//!     → Return: Route or UnknownVolume / NoHealthyEndpoint
//!
//! Table updates (health tracker, reload, registration):
//!     → table.rs writer lock
//!     → build new Volume / map
//!     → atomic swap
//! ```

pub mod path;
pub mod router;
pub mod table;
pub mod volume;

pub use path::VolumePath;
pub use router::{RequestRouter, Route};
pub use table::{AppliedProbe, ReloadSummary, RoutingTable, TableSnapshot};
pub use volume::{Selection, SelectionPolicy, Volume, VolumeHealth};
