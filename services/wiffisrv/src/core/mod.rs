//! Gateway core: configuration, bootstrap and the datagram pipeline
//!
//! Pipeline per frame: `resolver` -> `reconciler` (on module type change)
//! -> `publisher`. `registry` keeps the stored device groups in line with
//! the configuration, `layout` owns the fixed objects.

pub mod bootstrap;
pub mod config;
pub mod extensions;
pub mod gateway;
pub mod layout;
pub mod publisher;
pub mod reconciler;
pub mod registry;
pub mod resolver;
