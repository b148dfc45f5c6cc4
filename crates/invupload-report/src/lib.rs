//! invupload-report: Inventory report slices
//!
//! Streams batches of managed hosts as JSON documents in the format expected
//! by the cloud inventory service, without building the document in memory.

pub mod error;
pub mod facts;
pub mod host;
pub mod mapper;
pub mod slice;
pub mod stream;

pub use error::ReportError;
pub use host::{
    Host, OrganizationInfo, OrganizationLookup, StaticOrganizations, SubscriptionFacet, load_hosts,
};
pub use mapper::{HostMapper, ReportContext};
pub use slice::SliceGenerator;
pub use stream::{FragmentSink, JsonStream, WriterSink};
