use rusb::{Direction, Recipient, RequestType};

use super::power::POWER_REPORT_SIZE;

// ---- Device identity ----
pub const VID: u16 = 0x1209;
pub const PID: u16 = 0x4004;

/// bInterfaceClass of the tester's vendor interface.
pub const VENDOR_CLASS: u8 = 0xFF;

/// Port the tester falls back to between runs.
pub const NEUTRAL_PORT: u8 = 0;

/// Vendor control requests understood by the tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlCommand {
    /// IN: u8 active port
    GetPort,
    /// OUT: wValue = port, no data stage
    SetPort(u8),
    /// IN: power report blob
    GetPower,
    /// IN: u8 bitmask of available ports
    GetPortMap,
}

impl CtrlCommand {
    pub fn request(self) -> u8 {
        match self {
            CtrlCommand::GetPort => 0x01,
            CtrlCommand::SetPort(_) => 0x02,
            CtrlCommand::GetPower => 0x03,
            CtrlCommand::GetPortMap => 0x10,
        }
    }

    pub fn value(self) -> u16 {
        match self {
            CtrlCommand::SetPort(port) => port as u16,
            _ => 0,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            CtrlCommand::SetPort(_) => Direction::Out,
            _ => Direction::In,
        }
    }

    /// bmRequestType: vendor request addressed to the interface.
    pub fn request_type(self) -> u8 {
        rusb::request_type(self.direction(), RequestType::Vendor, Recipient::Interface)
    }

    /// Bytes expected in the data stage.
    pub fn response_len(self) -> usize {
        match self {
            CtrlCommand::GetPort | CtrlCommand::GetPortMap => 1,
            CtrlCommand::GetPower => POWER_REPORT_SIZE,
            CtrlCommand::SetPort(_) => 0,
        }
    }
}

/// Ports whose bit is set in the map, ascending.
pub fn ports_from_map(map: u8) -> Vec<u8> {
    (0..8).filter(|i| (map >> i) & 1 == 1).collect()
}
