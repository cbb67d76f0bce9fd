pub mod client;
pub mod contract;
pub mod document_sequence;
pub mod job;
pub mod job_status_update;
pub mod notification;
pub mod order;
pub mod order_item;
pub mod order_status_update;
