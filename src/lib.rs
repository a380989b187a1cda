pub mod app;
pub mod frame;
pub mod geometry;
pub mod graphics;
pub mod input;
pub mod math;
pub mod options;
pub mod platform;
pub mod runtime;
pub mod session;
pub mod swapchain;

pub use app::{App, AppError, RunSummary};
pub use options::{Invocation, Options};
