use std::{fs::OpenOptions, io::Write, path::PathBuf};

use log::{debug, info};

use crate::{args::ExportMethodType, error::Result, flows::flow_features::FlowFeatures};

/// Append-only sink for feature rows.
///
/// The destination is opened on the first row, so a session without flows
/// leaves no file behind. A CSV file that already holds data gets no second
/// header.
pub struct OutputWriter {
    export_type: ExportMethodType,
    file_path: PathBuf,
    writer: Option<csv::Writer<Box<dyn Write + Send>>>,
    appended_to_existing: bool,
    flows_written: u64,
}

impl OutputWriter {
    pub fn new(export_type: ExportMethodType, file_path: impl Into<PathBuf>) -> Self {
        OutputWriter {
            export_type,
            file_path: file_path.into(),
            writer: None,
            appended_to_existing: false,
            flows_written: 0,
        }
    }

    pub fn write_flow(&mut self, flow: &FlowFeatures) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(self.open()?);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.serialize(flow)?;
            self.flows_written += 1;
        }
        Ok(())
    }

    /// Flushes the writer and closes the output file
    pub fn flush_and_close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn flows_written(&self) -> u64 {
        self.flows_written
    }

    pub fn appended_to_existing(&self) -> bool {
        self.appended_to_existing
    }

    fn open(&mut self) -> Result<csv::Writer<Box<dyn Write + Send>>> {
        debug!("Initializing output writer");
        let (sink, write_header): (Box<dyn Write + Send>, bool) = match self.export_type {
            ExportMethodType::Csv => {
                let has_data = std::fs::metadata(&self.file_path)
                    .map(|metadata| metadata.len() > 0)
                    .unwrap_or(false);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.file_path)?;
                if has_data {
                    info!("Appending to existing dataset {:?}", self.file_path);
                }
                self.appended_to_existing = has_data;
                (Box::new(file), !has_data)
            }
            ExportMethodType::Print => (Box::new(std::io::stdout()), true),
        };

        Ok(csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(sink))
    }
}
