// Color validation and brightness scales
pub mod color;

// Entity hierarchy and cycle detection
pub mod entity;

// Light state history and propagation
pub mod state;

// Pixel buffer and hardware sink
pub mod render;

// SQLite persistence
pub mod storage;

// Serialized access to tree, history and strip
pub mod controller;

// HTTP and WebSocket APIs
pub mod api;

// Service configuration
pub mod config;

mod error;

pub use controller::LightController;
pub use error::{LightError, LightResult};
