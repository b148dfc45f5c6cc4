//! Report slice generation

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::ReportError;
use crate::host::{Host, OrganizationLookup};
use crate::mapper::{HostMapper, ReportContext};
use crate::stream::{FragmentSink, JsonStream, WriterSink};

/// Renders one batch of hosts as a report slice document
///
/// ```json
/// { "report_slice_id": "...", "hosts": [ ... ] }
/// ```
///
/// Hosts without subscription data are skipped and not counted.
pub struct SliceGenerator<'a> {
    slice_id: String,
    hosts: Vec<Host>,
    context: &'a ReportContext,
    organizations: &'a dyn OrganizationLookup,
    hosts_count: usize,
}

impl<'a> SliceGenerator<'a> {
    /// Create a generator with a random slice id
    pub fn new(
        hosts: Vec<Host>,
        context: &'a ReportContext,
        organizations: &'a dyn OrganizationLookup,
    ) -> Self {
        Self {
            slice_id: Uuid::new_v4().to_string(),
            hosts,
            context,
            organizations,
            hosts_count: 0,
        }
    }

    /// Use a caller supplied slice id
    #[must_use]
    pub fn with_slice_id(mut self, slice_id: impl Into<String>) -> Self {
        self.slice_id = slice_id.into();
        self
    }

    #[must_use]
    pub fn slice_id(&self) -> &str {
        &self.slice_id
    }

    /// Number of hosts emitted by the last render
    #[must_use]
    pub fn hosts_count(&self) -> usize {
        self.hosts_count
    }

    /// Render into an in-memory fragment list
    pub fn render(&mut self) -> Vec<String> {
        self.render_into(Vec::new())
    }

    /// Render the slice and write it to `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn render_to_file(&mut self, path: &Path) -> Result<u64, ReportError> {
        let file = File::create(path).map_err(|e| ReportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let sink = self.render_into(WriterSink::new(BufWriter::new(file)));
        let written = sink.bytes_written();
        sink.finish().map_err(|e| ReportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(written)
    }

    /// Render into any sink and hand it back
    #[instrument(skip(self, sink), fields(slice_id = %self.slice_id, batch = self.hosts.len()))]
    pub fn render_into<S: FragmentSink>(&mut self, sink: S) -> S {
        let mapper = HostMapper::new(self.context, self.organizations);
        let mut stream = JsonStream::with_sink(sink);
        let mut count = 0;

        stream.object(|s| {
            s.field("report_slice_id", self.slice_id.as_str());
            s.array_field("hosts", |s| {
                for host in &self.hosts {
                    if mapper.report_host(s, host) {
                        count += 1;
                    } else {
                        debug!(host = %host.name, "skipping host without subscription");
                    }
                }
            });
        });

        self.hosts_count = count;
        info!(hosts_count = count, "rendered report slice");
        stream.into_sink()
    }
}
