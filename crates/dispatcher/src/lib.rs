pub mod correlation;
pub mod delay;
pub mod dispatcher;
pub mod interpreter;
pub mod metrics;

pub use correlation::CorrelationRegistry;
pub use delay::DelayScheduler;
pub use dispatcher::RequestDispatcher;
pub use interpreter::{interpret, ResponseOutcome};
pub use metrics::DispatchOutcome;
