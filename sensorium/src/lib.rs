#[cfg(test)]
#[macro_use]
extern crate is_close;

pub mod array;

pub mod config;

pub mod data;

pub mod data_type;
pub use data_type::{ArrayElement, DataType};

pub mod device;
pub use array::Array;
pub use device::Device;

pub mod env_utils;
pub mod evaluation;
pub mod model;
