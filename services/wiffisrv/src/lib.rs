//! Wiffi telemetry gateway
//!
//! Receives JSON datagrams from Wiffi sensor modules over TCP, keeps one
//! point group per module in the object store in line with the variables
//! the module reports, and writes the reported values into those points.

pub mod core;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod server;

pub use crate::core::config::{AppConfig, ConfigManager};
pub use crate::core::gateway::{FrameOutcome, Gateway};
pub use error::{Result, WiffiSrvError};
pub use protocol::{Datagram, FrameExtractor};
pub use server::WiffiServer;
