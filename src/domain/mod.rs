// Domain layer: value types and ports. Network, files and CLI live outside.

pub mod model;
pub mod ports;
