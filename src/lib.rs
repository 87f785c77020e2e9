// Library exports for the binary and integration tests

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod panel;
pub mod render;
pub mod store;
pub mod view;

pub use error::PanelError;
pub use panel::{Confirm, DeclineAll, FilewatcherPanel, PanelSettings};
