pub mod handler;
pub mod messages;
pub mod state;

// Re-export the entry point so the binary and the tests can drive the bot
// without reaching into the handler module.
pub use handler::handle_event;
pub use state::AppState;
