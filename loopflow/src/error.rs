use thiserror::Error;

use crate::packet_features::FlowKey;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("capture source failure: {0}")]
    Capture(String),

    #[error("output error: {0}")]
    Output(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("flow {0} has no packets")]
    EmptyFlow(FlowKey),
}

impl From<pcap::Error> for SessionError {
    fn from(err: pcap::Error) -> Self {
        SessionError::Capture(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
