//! Background jobs processed by the apalis worker.

mod email_job;
mod queue;

pub use email_job::{email_job_handler, EmailJob};
pub use queue::connect_email_queue;
