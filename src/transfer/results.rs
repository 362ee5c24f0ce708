//! Transfer result types

use crate::protocol::responses::{
    ACTION_ABORTED, FILE_UNAVAILABLE, Reply, TRANSFER_ABORTED, TRANSFER_COMPLETE,
};

/// How a transfer ended; selects the terminal control reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    NotFound,
    IoError,
    ConnectionAborted,
}

impl TransferOutcome {
    pub fn reply(&self) -> Reply {
        match self {
            TransferOutcome::Success => Reply::new(TRANSFER_COMPLETE, "Transfer complete."),
            TransferOutcome::NotFound => Reply::new(FILE_UNAVAILABLE, "File not found."),
            TransferOutcome::IoError => Reply::new(ACTION_ABORTED, "Requested action aborted."),
            TransferOutcome::ConnectionAborted => {
                Reply::new(TRANSFER_ABORTED, "Connection closed; transfer aborted.")
            }
        }
    }
}

/// Outcome plus the number of payload bytes moved over the data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub outcome: TransferOutcome,
    pub bytes: u64,
}

impl TransferReport {
    pub fn new(outcome: TransferOutcome, bytes: u64) -> Self {
        Self { outcome, bytes }
    }
}
