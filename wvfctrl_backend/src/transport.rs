//! The narrow USB interface the controller talks through.
//!
//! A [`Transport`] opens a card by the serial number of its USB bridge, writes raw bytes to
//! it and closes it again. Writes are blocking and either deliver every byte or fail.
//!
//! Two implementations ship with the crate:
//! - [`RecordingTransport`], which keeps every frame in memory. It backs dry runs and tests.
//! - `FtdiTransport` (feature `ftdi`), which drives the FTDI D2XX driver.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::TransportError;

/// Opaque handle of an open device, only meaningful to the transport that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

pub trait Transport {
    fn open(&mut self, serial: &str) -> Result<DeviceHandle, TransportError>;
    fn write(&mut self, handle: DeviceHandle, bytes: &[u8]) -> Result<(), TransportError>;
    fn close(&mut self, handle: DeviceHandle) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, serial: &str) -> Result<DeviceHandle, TransportError> {
        (**self).open(serial)
    }
    fn write(&mut self, handle: DeviceHandle, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(handle, bytes)
    }
    fn close(&mut self, handle: DeviceHandle) -> Result<(), TransportError> {
        (**self).close(handle)
    }
}

/// One write as seen by a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFrame {
    pub serial: String,
    pub bytes: Vec<u8>,
}

/// In-memory transport recording every write, in order.
///
/// By default any serial number can be opened. [`RecordingTransport::with_devices`] restricts
/// the attached devices, and [`RecordingTransport::fail_after`] makes writes fail once a
/// number of them succeeded, which is how transmission failures are exercised.
///
/// # Example
/// ```
/// # use wvfctrl_backend::*;
/// let mut transport = RecordingTransport::with_devices(&["DACBRD00"]);
/// let handle = transport.open("DACBRD00").unwrap();
/// transport.write(handle, &[0x04, 0x00, 0x05]).unwrap();
/// assert_eq!(transport.bytes_for("DACBRD00"), vec![0x04, 0x00, 0x05]);
/// assert!(transport.open("DACBRD01").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    attached: Option<Vec<String>>,
    open: IndexMap<usize, String>,
    next_handle: usize,
    frames: Vec<RecordedFrame>,
    fail_after: Option<usize>,
    closed: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport on which only `serials` can be opened.
    pub fn with_devices(serials: &[&str]) -> Self {
        Self {
            attached: Some(serials.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Lets `writes` more writes succeed, then fails every following one.
    pub fn fail_after(&mut self, writes: usize) {
        self.fail_after = Some(self.frames.len() + writes);
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// Frames written to `serial`, in order.
    pub fn frames_for(&self, serial: &str) -> Vec<&[u8]> {
        self.frames
            .iter()
            .filter(|f| f.serial == serial)
            .map(|f| f.bytes.as_slice())
            .collect()
    }

    /// Every byte written to `serial`, frames concatenated.
    pub fn bytes_for(&self, serial: &str) -> Vec<u8> {
        self.frames_for(serial).concat()
    }

    /// Serial numbers currently open, in opening order.
    pub fn open_serials(&self) -> Vec<&str> {
        self.open.values().map(|s| s.as_str()).collect()
    }

    /// Serial numbers closed so far, in closing order.
    pub fn closed_serials(&self) -> Vec<&str> {
        self.closed.iter().map(|s| s.as_str()).collect()
    }

    pub fn clear_frames(&mut self) {
        self.frames.clear();
        self.fail_after = None;
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, serial: &str) -> Result<DeviceHandle, TransportError> {
        if let Some(attached) = &self.attached {
            if !attached.iter().any(|s| s == serial) {
                return Err(TransportError::NoSuchDevice(serial.to_string()));
            }
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.open.insert(handle, serial.to_string());
        Ok(DeviceHandle(handle))
    }

    fn write(&mut self, handle: DeviceHandle, bytes: &[u8]) -> Result<(), TransportError> {
        let serial = self
            .open
            .get(&handle.0)
            .ok_or(TransportError::BadHandle(handle.0))?
            .clone();
        if self.fail_after.is_some_and(|limit| self.frames.len() >= limit) {
            return Err(TransportError::Other(format!("injected failure on {}", serial)));
        }
        debug!("{}: {:02X?}", serial, bytes);
        self.frames.push(RecordedFrame {
            serial,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self, handle: DeviceHandle) -> Result<(), TransportError> {
        let serial = self
            .open
            .shift_remove(&handle.0)
            .ok_or(TransportError::BadHandle(handle.0))?;
        self.closed.push(serial);
        Ok(())
    }
}
