pub mod event;
pub mod history;
pub mod phase;
pub mod reactor;
pub mod scheduler;
pub mod selection;
pub mod series;
pub mod state;
pub mod summary;
pub mod telemetry;
pub mod time;
