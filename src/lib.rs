pub mod config;
pub mod console;
pub mod kernel;
pub mod outputs;
pub mod services;
pub mod stream;
pub mod view;

// Re-export the pieces an embedding dashboard touches directly
pub use config::ViewConfig;
pub use kernel::reactor::{Reactor, ReactorConfig};
pub use kernel::state::DashboardSnapshot;
pub use view::{FreshnessView, ViewHandle};
