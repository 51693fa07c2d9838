use embedded_hal::i2c::{ErrorKind, I2c};
use log::debug;

use crate::error::BusError;
use crate::status::{Command, StatusFlags};

pub const REG_STATUS: u8 = 0x00;
pub const REG_TAG_ID: u8 = 0x01;
pub const REG_TIMER_LEFT: u8 = 0x09;
pub const REG_COMMAND: u8 = 0x10;

const TAG_ID_LEN: usize = 8;

/// Register-level access to the monitored endpoints.
///
/// Every method is exactly one bus transaction against one address.
pub trait BusTransport {
    fn read_status(&mut self, address: u8) -> Result<StatusFlags, BusError>;

    fn write_command(&mut self, address: u8, command: Command) -> Result<(), BusError>;

    /// ASCII tag identifier currently stored on the endpoint.
    fn read_tag_id(&mut self, address: u8) -> Result<String, BusError>;

    /// Seconds left before the endpoint raises its alarm.
    fn read_timer_left(&mut self, address: u8) -> Result<u16, BusError>;

    /// Release the underlying handle. Further calls fail with [`BusError::Closed`].
    fn close(&mut self) {}
}

/// [`BusTransport`] over any `embedded-hal` I2C bus.
pub struct I2cBus<I: I2c> {
    i2c: Option<I>,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(i2c: I) -> Self {
        I2cBus { i2c: Some(i2c) }
    }

    /// Give back the underlying bus, if it has not been closed.
    pub fn release(self) -> Option<I> {
        self.i2c
    }

    fn handle(&mut self) -> Result<&mut I, BusError> {
        self.i2c.as_mut().ok_or(BusError::Closed)
    }

    fn read_register(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), BusError> {
        self.handle()?
            .write_read(address, &[register], buf)
            .map_err(map_i2c_error)
    }
}

fn map_i2c_error<E: embedded_hal::i2c::Error>(err: E) -> BusError {
    match err.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        kind => BusError::Transfer(format!("{:?}", kind)),
    }
}

impl<I: I2c> BusTransport for I2cBus<I> {
    fn read_status(&mut self, address: u8) -> Result<StatusFlags, BusError> {
        let mut buf = [0u8; 1];
        self.read_register(address, REG_STATUS, &mut buf)?;
        Ok(StatusFlags::from_bits(buf[0]))
    }

    fn write_command(&mut self, address: u8, command: Command) -> Result<(), BusError> {
        debug!("Writing command {:?} to 0x{:02X}", command, address);
        self.handle()?
            .write(address, &[REG_COMMAND, command.code()])
            .map_err(map_i2c_error)
    }

    fn read_tag_id(&mut self, address: u8) -> Result<String, BusError> {
        let mut buf = [0u8; TAG_ID_LEN];
        self.read_register(address, REG_TAG_ID, &mut buf)?;
        let end = buf.iter().position(|b| *b == 0).unwrap_or(TAG_ID_LEN);
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    fn read_timer_left(&mut self, address: u8) -> Result<u16, BusError> {
        let mut buf = [0u8; 2];
        self.read_register(address, REG_TIMER_LEFT, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn close(&mut self) {
        if self.i2c.take().is_some() {
            debug!("Bus handle released");
        }
    }
}

/// Open the Linux i2c-dev character device at `path`.
pub fn open_linux(path: &str) -> Result<I2cBus<linux_embedded_hal::I2cdev>, BusError> {
    let dev = linux_embedded_hal::I2cdev::new(path)
        .map_err(|err| BusError::Open(format!("{}: {}", path, err)))?;
    Ok(I2cBus::new(dev))
}
