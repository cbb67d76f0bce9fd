//! Domain state machines for orders and jobs.

pub mod job_status;
pub mod order_status;

pub use job_status::{derive_order_status_on_job_completion, JobStatus, JobType, TransitionError};
pub use order_status::OrderStatus;
