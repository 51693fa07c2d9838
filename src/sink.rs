use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::Result;
use crate::messages::{Event, EventType};

/// Durable, append-only destination for every emitted event.
pub trait EventSink {
    fn record(&mut self, event: &Event) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each event through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&mut self, event: &Event) -> Result<()> {
        match event.event_type {
            EventType::DeviceUnreachable => warn!("{}", event),
            _ => info!("{}", event),
        }
        Ok(())
    }
}

/// One JSON object per line, appended to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Recording events to {}", path.display());
        Ok(JsonLinesSink {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Serialize fully first so a failure never leaves half a line behind.
    fn append<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        Ok(())
    }
}

impl EventSink for JsonLinesSink {
    fn record(&mut self, event: &Event) -> Result<()> {
        self.append(event)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Fans each event out to several sinks. A failing sink does not stop the others.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn EventSink + Send>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn record_all(&mut self, event: &Event) {
        for sink in &mut self.sinks {
            if let Err(err) = sink.record(event) {
                warn!("Error recording event {}: {}", event.event_type, err);
            }
        }
    }

    pub fn flush_all(&mut self) {
        for sink in &mut self.sinks {
            if let Err(err) = sink.flush() {
                warn!("Error flushing event sink: {}", err);
            }
        }
    }
}
