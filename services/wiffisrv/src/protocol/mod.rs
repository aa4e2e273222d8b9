//! Wire protocol of the Wiffi modules
//!
//! - `frame`: extracting JSON objects from the receive buffer
//! - `datagram`: the decoded payload (module type and variables)

pub mod datagram;
pub mod frame;

pub use datagram::{Datagram, Variable};
pub use frame::{Frame, FrameExtractor, DEFAULT_MAX_BUFFER_SIZE};
