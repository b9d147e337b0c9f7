//! Task registry, data model, and HTTP/WebSocket surface.

pub mod model;
pub mod registry;
pub mod routes;

pub use model::{Operation, Task, TaskEvent, TaskStatus};
pub use registry::TaskRegistry;
pub use routes::task_routes;
