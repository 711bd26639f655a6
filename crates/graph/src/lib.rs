//! Location topology consumed by spatial algorithms: who neighbors whom,
//! which locations can be entered, and straight-line distance between two
//! locations.

pub mod room;
pub mod store;
pub mod topology;

pub use room::{coord_to_room_name, room_name_to_coord, RoomGrid};
pub use store::LocationGraph;
pub use topology::Topology;
