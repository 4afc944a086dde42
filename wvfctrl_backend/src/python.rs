//! Python bindings, built with the `python` feature.
//!
//! ```python
//! import numpy as np
//! from wvfctrl_backend import Experiment
//!
//! exp = Experiment("DACBRD00 3", dry_run=True)
//! exp.waveform(0, 0, np.array([1.0, 2.0]), np.array([0.0, 5.0]), np.array([5.0, 5.0]))
//! exp.connect()
//! exp.run(0)
//! ```

use numpy::PyReadonlyArray1;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use wvfcompiler_backend::*;

use crate::error::ControlError;
use crate::experiment;
use crate::transport::*;

fn value_err(err: CompilerError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn control_err(err: ControlError) -> PyErr {
    match err {
        ControlError::Compiler(err) => value_err(err),
        err => PyRuntimeError::new_err(err.to_string()),
    }
}

#[cfg(feature = "ftdi")]
fn hardware_transport() -> PyResult<Box<dyn Transport>> {
    Ok(Box::new(crate::ftd2xx::FtdiTransport::new()))
}

#[cfg(not(feature = "ftdi"))]
fn hardware_transport() -> PyResult<Box<dyn Transport>> {
    Err(PyRuntimeError::new_err(
        "built without the ftdi feature, only dry_run=True is available",
    ))
}

/// Waveform card experiment. The transport holds raw driver handles, hence `unsendable`.
#[pyclass(unsendable, name = "Experiment")]
pub struct PyExperiment {
    inner: experiment::Experiment<Box<dyn Transport>>,
}

#[pymethods]
impl PyExperiment {
    #[new]
    #[pyo3(signature = (devices="", dry_run=false, legacy=false, free_run=false))]
    fn new(devices: &str, dry_run: bool, legacy: bool, free_run: bool) -> PyResult<Self> {
        let transport: Box<dyn Transport> = if dry_run {
            Box::new(RecordingTransport::new())
        } else {
            hardware_transport()?
        };
        let config = if legacy {
            EncoderConfig::legacy()
        } else {
            EncoderConfig::sequencer()
        }
        .with_free_run(free_run);
        let mut inner =
            experiment::Experiment::with_config(transport, config).map_err(control_err)?;
        inner.add_device_list(devices).map_err(value_err)?;
        Ok(Self { inner })
    }

    fn add_board(&mut self, serial: &str, num_channels: usize) -> PyResult<usize> {
        self.inner.add_board(serial, num_channels).map_err(value_err)
    }

    fn add_device_list(&mut self, devices: &str) -> PyResult<()> {
        self.inner.add_device_list(devices).map_err(value_err)
    }

    fn resolve(&self, channel: usize) -> PyResult<(usize, usize)> {
        self.inner.resolve(channel).map_err(value_err)
    }

    fn board_channel(&self, board: usize, local: usize) -> PyResult<usize> {
        self.inner.board_channel(board, local).map_err(value_err)
    }

    fn total_channels(&self) -> usize {
        self.inner.registry().total_channels()
    }

    /// Appends a waveform step from columns of absolute end times (ms), start and end voltages.
    fn waveform(
        &mut self,
        channel: usize,
        step: usize,
        times: PyReadonlyArray1<f64>,
        starts: PyReadonlyArray1<f64>,
        ends: PyReadonlyArray1<f64>,
    ) -> PyResult<usize> {
        let samples =
            waveform_samples_from_columns(times.as_array(), starts.as_array(), ends.as_array())
                .map_err(value_err)?;
        self.inner.waveform(channel, step, &samples).map_err(value_err)
    }

    fn constant(&mut self, channel: usize, step: usize, voltage: f64) -> PyResult<usize> {
        self.inner.constant(channel, step, voltage).map_err(value_err)
    }

    /// Appends a logic step from columns of durations (ms) and port bitmasks.
    fn logic(
        &mut self,
        channel: usize,
        step: usize,
        times: PyReadonlyArray1<f64>,
        masks: PyReadonlyArray1<u32>,
    ) -> PyResult<usize> {
        let samples =
            logic_samples_from_columns(times.as_array(), masks.as_array()).map_err(value_err)?;
        self.inner.logic(channel, step, &samples).map_err(value_err)
    }

    #[staticmethod]
    fn logic_mask(lines: Vec<&str>) -> PyResult<u32> {
        wvfcompiler_backend::logic_mask(&lines).map_err(value_err)
    }

    #[pyo3(signature = (channel=-1, step=-1))]
    fn clear(&mut self, channel: i64, step: i64) {
        self.inner.clear(channel, step);
    }

    fn channel_total_length(&self, channel: usize) -> usize {
        self.inner.channel_total_length(channel)
    }

    fn channel_program(&self, channel: usize) -> Vec<u8> {
        self.inner.channel_program(channel)
    }

    fn channel_steps(&self, channel: usize) -> Vec<usize> {
        self.inner.channel_steps(channel)
    }

    fn next_step(&self, channel: usize) -> usize {
        self.inner.next_step(channel)
    }

    fn programmed_channels(&self) -> Vec<usize> {
        self.inner.programmed_channels()
    }

    fn connect(&mut self) -> PyResult<()> {
        self.inner.connect().map_err(control_err)
    }

    fn disconnect(&mut self) -> usize {
        self.inner.disconnect()
    }

    fn transmit(&mut self, channel: usize) -> PyResult<()> {
        self.inner.transmit(channel).map_err(control_err)
    }

    fn trigger(&mut self, channel: usize) -> PyResult<()> {
        self.inner.trigger(channel).map_err(control_err)
    }

    fn transmit_all(&mut self) -> PyResult<()> {
        self.inner.transmit_all().map_err(control_err)
    }

    fn run(&mut self, channel: usize) -> PyResult<()> {
        self.inner.run(channel).map_err(control_err)
    }
}

#[pymodule]
fn wvfctrl_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyExperiment>()?;
    Ok(())
}
