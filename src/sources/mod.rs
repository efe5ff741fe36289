//! Upstream source clients

pub mod xtream;

pub use xtream::XtreamClient;
