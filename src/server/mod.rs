pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
mod settings;
pub mod state;
mod views;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_metrics_server, run_server};
pub use settings::apply_settings;
pub use state::ServerState;
pub use views::{SettingsView, SourceStatus};
