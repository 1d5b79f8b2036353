//! Vehicle data model and icon resolution.

mod icon;
mod model;

pub use icon::{IconResolver, KnownModeIcons, DEFAULT_ICON_KEY, DEFAULT_ICON_MODES};
pub use model::{
    normalize_mode, AllVehiclesPayload, RawCoordinate, RawVehicle, TrackedVehicle, UNKNOWN_MODE,
};
