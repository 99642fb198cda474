//! Business logic services for the farmstead server

pub mod crop;
pub mod farm;

pub use crop::CropService;
pub use farm::FarmService;
