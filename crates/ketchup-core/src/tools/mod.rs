//! Tools the planning model can call, and the registry that dispatches them.

pub mod directions;
pub mod maps;
pub mod places;
pub mod registry;
pub mod result;
pub mod units;

pub use directions::{GET_DIRECTIONS, GetDirections, TravelMode};
pub use maps::MapsClient;
pub use places::{SEARCH_PLACES, SearchPlaces};
pub use registry::{Tool, ToolRegistry};
pub use result::{ToolError, ToolResult};

/// Registry with both maps-backed tools sharing one client.
pub fn maps_registry(maps: MapsClient) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(GetDirections::new(maps.clone()));
    registry.register(SearchPlaces::new(maps));
    registry
}
