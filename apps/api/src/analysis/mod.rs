// AI analysis of a tracked application.

pub mod handlers;
pub mod prompts;
