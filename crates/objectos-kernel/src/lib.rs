//! # Kernel
//!
//! The plugin trait, the context handed to plugins, and the lifecycle
//! manager that resolves boot order and drives plugins through
//! `init -> start -> (running) -> destroy`.

pub mod context;
pub mod lifecycle;
pub mod plugin;

pub use context::PluginContext;
pub use lifecycle::{Kernel, KernelError, KernelResult};
pub use plugin::{HealthCheck, HealthReport, HealthStatus, Plugin, PluginError, PluginResult};
