mod command;
mod event;
mod frame;
mod state;
mod units;

pub use command::Command;
pub use event::{ConnectionState, Event};
pub use frame::{ConfigUpdate, LocationUpdate, ScanFrame, ScanLog, ScanStatus};
pub use state::{EngineState, ReconnectPolicy, SourceConfig, DEFAULT_SERVER, STREAM_PATH};
pub use units::{Decibels, Megahertz};
