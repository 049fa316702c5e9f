pub mod diff;
pub mod errors;
pub mod inference;
pub mod narrate_config;
pub mod pipeline;
pub mod prompt;
pub mod tracker;
pub mod ui;
pub mod watch;
