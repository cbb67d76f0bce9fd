// Workflow core
pub mod jobs;
pub mod orders;

// Supporting records
pub mod clients;
pub mod contracts;
pub mod notifications;

// Document numbering
pub mod sequences;
