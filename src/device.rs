use std::time::Duration;

use rusb::{Context, DeviceHandle, TransferType, UsbContext};
use tracing::{debug, info};

use crate::error::{DeviceError, TransferError};
use crate::proto::command::{CtrlCommand, PID, VENDOR_CLASS, VID};


/// Default bound on every control transfer and per-packet bulk read.
pub const TIMEOUT: Duration = Duration::from_millis(1000);

/// One open handle on the tester. Invalid after `set_port` returns.
pub trait TesterLink {
    fn port_map(&mut self) -> Result<u8, TransferError>;
    fn set_port(&mut self, port: u8) -> Result<(), TransferError>;
    fn port_echo(&mut self) -> Result<u8, TransferError>;
    /// Raw power report blob; length is checked by the decoder.
    fn power_report(&mut self) -> Result<Vec<u8>, TransferError>;
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransferError>;
    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError>;
}

/// Produces fresh links; called once at start and again after every re-enumeration.
pub trait Discover {
    type Link: TesterLink;

    fn discover(&self) -> Result<Self::Link, DeviceError>;
}

pub struct UsbDiscovery {
    context: Context,
    control_timeout: Duration,
}

impl UsbDiscovery {
    pub fn new(control_timeout: Duration) -> Result<Self, DeviceError> {
        Ok(Self {
            context: Context::new()?,
            control_timeout,
        })
    }
}

impl Discover for UsbDiscovery {
    type Link = UsbTester;

    fn discover(&self) -> Result<UsbTester, DeviceError> {
        let mut handle = self
            .context
            .open_device_with_vid_pid(VID, PID)
            .ok_or(DeviceError::NotFound { vid: VID, pid: PID })?;
        // already configured is fine
        if let Err(e) = handle.set_active_configuration(1) {
            debug!(error = %e, "set_configuration ignored");
        }

        let device = handle.device();
        let config = device.active_config_descriptor()?;
        let iface = config
            .interfaces()
            .flat_map(|i| i.descriptors())
            .find(|d| d.class_code() == VENDOR_CLASS)
            .ok_or(DeviceError::NoVendorInterface)?;
        let interface = iface.interface_number();

        let bulk = |dir: rusb::Direction| {
            iface
                .endpoint_descriptors()
                .find(|ep| ep.transfer_type() == TransferType::Bulk && ep.direction() == dir)
                .map(|ep| ep.address())
        };
        let (ep_out, ep_in) = match (bulk(rusb::Direction::Out), bulk(rusb::Direction::In)) {
            (Some(o), Some(i)) => (o, i),
            _ => return Err(DeviceError::NoBulkEndpoints(interface)),
        };

        // not supported on every platform
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(interface)?;

        info!(
            bus = device.bus_number(),
            address = device.address(),
            interface,
            ep_out,
            ep_in,
            "tester opened"
        );

        Ok(UsbTester {
            handle,
            interface,
            ep_out,
            ep_in,
            timeout: self.control_timeout,
        })
    }
}

pub struct UsbTester {
    handle: DeviceHandle<Context>,
    interface: u8,
    ep_out: u8,
    ep_in: u8,
    timeout: Duration,
}

impl UsbTester {
    fn ctrl_in(&self, cmd: CtrlCommand) -> Result<Vec<u8>, TransferError> {
        let mut buf = vec![0u8; cmd.response_len()];
        let n = self.handle.read_control(
            cmd.request_type(),
            cmd.request(),
            cmd.value(),
            self.interface as u16,
            &mut buf,
            self.timeout,
        )?;
        buf.truncate(n);
        Ok(buf)
    }

    fn ctrl_in_byte(&self, cmd: CtrlCommand) -> Result<u8, TransferError> {
        match self.ctrl_in(cmd)?.as_slice() {
            [b] => Ok(*b),
            other => Err(TransferError::WrongLength {
                expected: 1,
                got: other.len(),
            }),
        }
    }
}

impl TesterLink for UsbTester {
    fn port_map(&mut self) -> Result<u8, TransferError> {
        self.ctrl_in_byte(CtrlCommand::GetPortMap)
    }

    fn set_port(&mut self, port: u8) -> Result<(), TransferError> {
        let cmd = CtrlCommand::SetPort(port);
        self.handle.write_control(
            cmd.request_type(),
            cmd.request(),
            cmd.value(),
            self.interface as u16,
            &[],
            self.timeout,
        )?;
        Ok(())
    }

    fn port_echo(&mut self) -> Result<u8, TransferError> {
        self.ctrl_in_byte(CtrlCommand::GetPort)
    }

    fn power_report(&mut self) -> Result<Vec<u8>, TransferError> {
        self.ctrl_in(CtrlCommand::GetPower)
    }

    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransferError> {
        Ok(self.handle.write_bulk(self.ep_out, data, timeout)?)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError> {
        Ok(self.handle.read_bulk(self.ep_in, buf, timeout)?)
    }
}

impl Drop for UsbTester {
    fn drop(&mut self) {
        // the device may already be gone after a port switch
        let _ = self.handle.release_interface(self.interface);
    }
}
