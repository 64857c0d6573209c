// Order execution and position lifecycle module
pub mod debounce;
pub mod filters;
pub mod lifecycle;
pub mod order;
pub mod reconcile;

pub use debounce::debounce;
pub use filters::passes_filters;
pub use lifecycle::{LifecycleConfig, PositionLifecycle};
pub use order::OrderExecutor;
pub use reconcile::reconcile;
