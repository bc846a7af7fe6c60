pub mod components;
pub mod curves;
pub mod entity;
pub mod landmass;
pub mod markers;
pub mod mesh;
pub mod prefabs;
pub mod resources;
pub mod world;

pub use world::*;
