pub mod animation;
pub mod app;
pub mod channel;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod refresh;
pub mod state;
pub mod stats;
pub mod toast;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
