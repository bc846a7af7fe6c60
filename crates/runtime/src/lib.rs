pub mod event_bus;
pub mod frame;
pub mod pulse;
pub mod rotation;

pub use event_bus::*;
pub use frame::*;
pub use pulse::*;
pub use rotation::*;
