//! Connection state of the registered boards.
//!
//! [`BoardConnections`] maps each connected board's serial number to the handle its
//! transport issued. The experiment opens every registered board at once and closes them
//! all on disconnect or drop.

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use wvfcompiler_backend::BoardRegistry;

use crate::error::*;
use crate::transport::*;

#[derive(Debug, Clone, Default)]
pub struct BoardConnections {
    handles: IndexMap<String, DeviceHandle>,
}

impl BoardConnections {
    pub fn new() -> Self {
        Self {
            handles: IndexMap::new(),
        }
    }

    /// Opens every board of `registry` that is not open yet, in registration order.
    ///
    /// Stops at the first board the transport cannot open and reports it as
    /// [`ControlError::DeviceNotFound`]. Boards opened before the failure stay open.
    pub fn open_all<T: Transport>(
        &mut self,
        registry: &BoardRegistry,
        transport: &mut T,
    ) -> ControlResult<()> {
        for board in registry.boards() {
            if self.handles.contains_key(board.serial()) {
                continue;
            }
            let handle = transport
                .open(board.serial())
                .map_err(|source| ControlError::DeviceNotFound {
                    serial: board.serial().to_string(),
                    source,
                })?;
            info!(
                "Connected to board {} ({} channels)",
                board.serial(),
                board.num_channels()
            );
            self.handles.insert(board.serial().to_string(), handle);
        }
        Ok(())
    }

    /// Closes every open board. Close failures are logged and do not stop the others
    /// from closing. Returns the number of boards closed cleanly.
    pub fn close_all<T: Transport>(&mut self, transport: &mut T) -> usize {
        let mut closed = 0;
        for (serial, handle) in self.handles.drain(..) {
            match transport.close(handle) {
                Ok(()) => {
                    debug!("Closed board {}", serial);
                    closed += 1;
                }
                Err(err) => warn!("Failed to close board {}: {}", serial, err),
            }
        }
        closed
    }

    pub fn handle(&self, serial: &str) -> ControlResult<DeviceHandle> {
        self.handles
            .get(serial)
            .copied()
            .ok_or_else(|| ControlError::NotConnected(serial.to_string()))
    }

    /// Writes `bytes` to the board `serial`.
    pub fn write<T: Transport>(
        &self,
        transport: &mut T,
        serial: &str,
        bytes: &[u8],
    ) -> ControlResult<()> {
        let handle = self.handle(serial)?;
        transport
            .write(handle, bytes)
            .map_err(|source| ControlError::TransmitFailed {
                serial: serial.to_string(),
                source,
            })
    }

    pub fn is_connected(&self, serial: &str) -> bool {
        self.handles.contains_key(serial)
    }

    pub fn serials(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn registry() -> BoardRegistry {
        BoardRegistry::from_device_list("DACBRD00 3 DACBRD01 3").unwrap()
    }

    #[test]
    fn open_and_close_all() {
        let mut transport = RecordingTransport::new();
        let mut connections = BoardConnections::new();
        connections.open_all(&registry(), &mut transport).unwrap();
        assert_eq!(connections.serials().collect::<Vec<_>>(), vec!["DACBRD00", "DACBRD01"]);
        // Already open boards are not reopened
        connections.open_all(&registry(), &mut transport).unwrap();
        assert_eq!(transport.open_serials().len(), 2);

        assert_eq!(connections.close_all(&mut transport), 2);
        assert!(connections.is_empty());
        assert_eq!(transport.closed_serials(), vec!["DACBRD00", "DACBRD01"]);
    }

    #[test]
    fn missing_board_is_reported() {
        let mut transport = RecordingTransport::with_devices(&["DACBRD00"]);
        let mut connections = BoardConnections::new();
        let err = connections.open_all(&registry(), &mut transport).unwrap_err();
        assert!(matches!(
            err,
            ControlError::DeviceNotFound { ref serial, .. } if serial == "DACBRD01"
        ));
        assert!(connections.is_connected("DACBRD00"));
        assert!(!connections.is_connected("DACBRD01"));
    }

    #[test]
    fn write_requires_connection() {
        let mut transport = RecordingTransport::new();
        let connections = BoardConnections::new();
        assert_eq!(
            connections.write(&mut transport, "DACBRD00", &[1]),
            Err(ControlError::NotConnected("DACBRD00".to_string()))
        );
    }

    #[test]
    fn write_failure_names_board() {
        let mut transport = RecordingTransport::new();
        let mut connections = BoardConnections::new();
        connections.open_all(&registry(), &mut transport).unwrap();
        transport.fail_after(0);
        assert!(matches!(
            connections.write(&mut transport, "DACBRD01", &[1]),
            Err(ControlError::TransmitFailed { ref serial, .. }) if serial == "DACBRD01"
        ));
    }
}
