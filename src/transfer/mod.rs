//! Data transfer
//!
//! Data channel establishment and the byte movers for LIST, RETR and STOR.

pub mod data_channel;
pub mod file_ops;
pub mod modes;
pub mod results;

pub use data_channel::{DataChannel, DataChannelRequest, DataEndpoint, PassiveListener, PortRange, establish};
pub use modes::{DataMode, TransferType};
pub use results::{TransferOutcome, TransferReport};
