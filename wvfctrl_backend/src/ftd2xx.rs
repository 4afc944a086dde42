//! Minimal rust wrapper for the parts of the FTDI D2XX library used to talk to the cards'
//! FT245 USB bridges.
//!
//! The cards are opened by the serial number of their bridge. [`FtdiTransport`] implements
//! [`Transport`] on top of `FT_OpenEx`, `FT_Write` and `FT_Close`; every call goes through
//! [`ft_call`], which turns a non-zero `FT_STATUS` into a [`TransportError::Status`].
//! Before opening, the serial is looked up in the driver's device list so a missing card
//! is reported as [`TransportError::NoSuchDevice`].
//!
//! Requires the `ftdi` feature and the `ftd2xx` driver library at link time.

use std::ffi::{CStr, CString};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::*;

type CVoidPtr = *mut libc::c_void;
type CDword = libc::c_uint;
type CUlong = libc::c_ulong;
type FtStatus = CUlong;
pub type FtHandle = CVoidPtr;

pub const FT_OK: FtStatus = 0;
pub const FT_OPEN_BY_SERIAL_NUMBER: CDword = 1;

/// Node of the device list filled by `FT_GetDeviceInfoList`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FtDeviceListInfoNode {
    pub flags: CUlong,
    pub device_type: CUlong,
    pub id: CUlong,
    pub loc_id: CDword,
    pub serial_number: [libc::c_char; 16],
    pub description: [libc::c_char; 64],
    pub handle: FtHandle,
}

#[link(name = "ftd2xx")]
extern "C" {
    fn FT_OpenEx(arg: CVoidPtr, flags: CDword, handle: *mut FtHandle) -> FtStatus;
    fn FT_Close(handle: FtHandle) -> FtStatus;
    fn FT_Write(
        handle: FtHandle,
        buffer: *const libc::c_void,
        bytes_to_write: CDword,
        bytes_written: *mut CDword,
    ) -> FtStatus;
    fn FT_CreateDeviceInfoList(num_devs: *mut CDword) -> FtStatus;
    fn FT_GetDeviceInfoList(list: *mut FtDeviceListInfoNode, num_devs: *mut CDword) -> FtStatus;
}

/// Calls a D2XX function and maps a failed status to [`TransportError::Status`].
pub fn ft_call<F: FnOnce() -> FtStatus>(op: &'static str, func: F) -> Result<(), TransportError> {
    let status = func();
    if status != FT_OK {
        return Err(TransportError::Status {
            op,
            status: status as u32,
        });
    }
    Ok(())
}

/// Serial numbers of every FTDI device currently attached.
pub fn attached_serials() -> Result<Vec<String>, TransportError> {
    let mut num_devs: CDword = 0;
    ft_call("FT_CreateDeviceInfoList", || unsafe {
        FT_CreateDeviceInfoList(&mut num_devs as *mut CDword)
    })?;
    if num_devs == 0 {
        return Ok(Vec::new());
    }
    let empty = FtDeviceListInfoNode {
        flags: 0,
        device_type: 0,
        id: 0,
        loc_id: 0,
        serial_number: [0; 16],
        description: [0; 64],
        handle: std::ptr::null_mut(),
    };
    let mut nodes = vec![empty; num_devs as usize];
    ft_call("FT_GetDeviceInfoList", || unsafe {
        FT_GetDeviceInfoList(nodes.as_mut_ptr(), &mut num_devs as *mut CDword)
    })?;
    Ok(nodes
        .iter()
        .take(num_devs as usize)
        .map(|node| {
            unsafe { CStr::from_ptr(node.serial_number.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        })
        .collect())
}

/// Fails with [`TransportError::NoSuchDevice`] unless `serial` is among `attached`.
pub fn require_attached(attached: &[String], serial: &str) -> Result<(), TransportError> {
    if attached.iter().any(|s| s == serial) {
        Ok(())
    } else {
        Err(TransportError::NoSuchDevice(serial.to_string()))
    }
}

/// [`Transport`] over the D2XX driver. Handles still open on drop are closed.
#[derive(Default)]
pub struct FtdiTransport {
    handles: IndexMap<usize, (String, FtHandle)>,
    next_handle: usize,
}

impl FtdiTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for FtdiTransport {
    fn open(&mut self, serial: &str) -> Result<DeviceHandle, TransportError> {
        require_attached(&attached_serials()?, serial)?;
        let serial_cstr =
            CString::new(serial).map_err(|_| TransportError::NoSuchDevice(serial.to_string()))?;
        let mut ft_handle: FtHandle = std::ptr::null_mut();
        ft_call("FT_OpenEx", || unsafe {
            FT_OpenEx(
                serial_cstr.as_ptr() as CVoidPtr,
                FT_OPEN_BY_SERIAL_NUMBER,
                &mut ft_handle as *mut FtHandle,
            )
        })?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(handle, (serial.to_string(), ft_handle));
        debug!("FT_OpenEx({}) -> handle {}", serial, handle);
        Ok(DeviceHandle(handle))
    }

    fn write(&mut self, handle: DeviceHandle, bytes: &[u8]) -> Result<(), TransportError> {
        let (_, ft_handle) = self
            .handles
            .get(&handle.0)
            .ok_or(TransportError::BadHandle(handle.0))?;
        let mut written: CDword = 0;
        ft_call("FT_Write", || unsafe {
            FT_Write(
                *ft_handle,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len() as CDword,
                &mut written as *mut CDword,
            )
        })?;
        if written as usize != bytes.len() {
            return Err(TransportError::ShortWrite {
                written: written as usize,
                expected: bytes.len(),
            });
        }
        Ok(())
    }

    fn close(&mut self, handle: DeviceHandle) -> Result<(), TransportError> {
        let (_, ft_handle) = self
            .handles
            .shift_remove(&handle.0)
            .ok_or(TransportError::BadHandle(handle.0))?;
        ft_call("FT_Close", || unsafe { FT_Close(ft_handle) })
    }
}

impl Drop for FtdiTransport {
    fn drop(&mut self) {
        for (_, (serial, ft_handle)) in self.handles.drain(..) {
            if let Err(err) = ft_call("FT_Close", || unsafe { FT_Close(ft_handle) }) {
                warn!("Failed to close {}: {}", serial, err);
            }
        }
    }
}
