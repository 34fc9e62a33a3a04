//! Output sinks for the LED control points
//!
//! Every control point is a write-only integer destination. Writes are
//! best effort: a failure is logged and dropped, so the in-memory light state
//! may run ahead of the hardware until the next successful write.

use log::{debug, trace, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use triled_lights_lib::{ControlPoint, Writes};

use crate::config::Config;

/// A destination that accepts one unsigned integer at a time.
pub trait OutputSink: Send + Sync {
    /// Write `value` followed by a newline.
    fn write(&self, value: u32) -> io::Result<()>;
}

/// A sysfs attribute kept open for the life of the service.
pub struct SysfsSink {
    path: PathBuf,
    file: Option<File>,
}

impl SysfsSink {
    /// Open `path` for writing.
    ///
    /// A path that can't be opened still yields a sink; its writes fail
    /// with `NotFound` and get logged like any other write failure.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => {
                debug!("Opened {}", path.display());
                Some(file)
            }
            Err(e) => {
                warn!("Failed to open {}: {e}", path.display());
                None
            }
        };
        Self { path, file }
    }
}

impl OutputSink for SysfsSink {
    fn write(&self, value: u32) -> io::Result<()> {
        let mut file = self.file.as_ref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not open", self.path.display()),
            )
        })?;
        // One write per value; sysfs attributes don't accept partial updates
        file.write_all(format!("{value}\n").as_bytes())?;
        file.flush()
    }
}

/// One sink per control point.
pub struct Sinks {
    sinks: [Box<dyn OutputSink>; ControlPoint::ALL.len()],
}

impl Sinks {
    /// Build the sink set with `make` called once per control point.
    pub fn new(make: impl FnMut(ControlPoint) -> Box<dyn OutputSink>) -> Self {
        Self {
            sinks: ControlPoint::ALL.map(make),
        }
    }

    /// Open every configured sysfs attribute.
    pub fn open_sysfs(config: &Config) -> Self {
        Self::new(|point| Box::new(SysfsSink::open(config.path_for(point))))
    }

    /// Write a single value, logging instead of returning failures.
    pub fn emit(&self, point: ControlPoint, value: u32) {
        match self.sinks[point as usize].write(value) {
            Ok(()) => trace!("{} <= {value}", point.name()),
            Err(e) => warn!("Failed to write {value} to {}: {e}", point.name()),
        }
    }

    /// Apply writes in order. A failed write does not stop the rest.
    pub fn apply(&self, writes: &Writes) {
        for &(point, value) in writes {
            self.emit(point, value);
        }
    }
}
