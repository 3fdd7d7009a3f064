//! Application state and screen flow

pub mod screen;
pub mod state;

pub use screen::{AppCoordinator, NameInput, NameMode, Screen};
pub use state::{banner_text, Board};
