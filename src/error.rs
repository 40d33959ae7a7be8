use std::time::Duration;

use thiserror::Error;

/// Failures while locating and opening the tester. Fatal to the session.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device not found (VID=0x{vid:04X}, PID=0x{pid:04X})")]
    NotFound { vid: u16, pid: u16 },
    #[error("no vendor interface (class 0xFF) found")]
    NoVendorInterface,
    #[error("could not find bulk endpoints on vendor interface {0}")]
    NoBulkEndpoints(u8),
    #[error("usb: {0}")]
    Usb(#[from] rusb::Error),
}

/// A single control or bulk transfer that did not complete as expected.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer timed out")]
    Timeout,
    #[error("wrong length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("short write: {wrote} of {len} bytes accepted")]
    ShortWrite { wrote: usize, len: usize },
    #[error("usb: {0}")]
    Usb(rusb::Error),
}

impl From<rusb::Error> for TransferError {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => TransferError::Timeout,
            other => TransferError::Usb(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum PortSwitchError {
    #[error("set port {port}: {source}")]
    Command {
        port: u8,
        #[source]
        source: TransferError,
    },
    #[error("device did not re-enumerate within {waited:?} after switching to port {port}: {last}")]
    Reenumeration {
        port: u8,
        waited: Duration,
        #[source]
        last: DeviceError,
    },
}

/// Echoed loopback packet did not match what was sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EchoError {
    #[error("short echo ({0} bytes)")]
    Short(usize),
    #[error("header mismatch seq={seq} len={len} expected seq={expected_seq} len={expected_len}")]
    HeaderMismatch {
        seq: u32,
        len: u16,
        expected_seq: u32,
        expected_len: u16,
    },
    #[error("USB len mismatch: declared {declared}, received {actual}")]
    LengthMismatch { declared: u16, actual: usize },
    #[error("payload mismatch at {offset}")]
    PayloadMismatch { offset: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowerReportError {
    #[error("power report wrong length: {got} != {expected}")]
    Length { got: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that stop a session before any port is tested.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Discovery(#[from] DeviceError),
    #[error("port map request: {0}")]
    PortMap(#[source] TransferError),
}
