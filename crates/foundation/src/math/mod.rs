pub mod bezier;
pub mod geodesy;
pub mod vec;

pub use bezier::*;
pub use geodesy::*;
pub use vec::*;
