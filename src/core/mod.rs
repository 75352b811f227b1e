// Core algorithm exports
pub mod compatibility;
pub mod discovery;
pub mod distance;
pub mod filters;
pub mod profiles;
pub mod signals;

pub use compatibility::{is_mutually_compatible, resolve_clauses, CompatibilityClause};
pub use discovery::{DiscoveryDefaults, DiscoveryEngine, NearbyParams, NearbyResult};
pub use distance::{calculate_bounding_box, distance_between, haversine_distance, is_within_bounding_box};
pub use filters::{build_filters, matches_all, AgeBounds, Criterion, FilterParams};
pub use profiles::ProfileDirectory;
pub use signals::SignalTracker;
