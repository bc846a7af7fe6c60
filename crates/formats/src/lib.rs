pub mod affiliation;
pub mod raster;

pub use affiliation::*;
pub use raster::*;
