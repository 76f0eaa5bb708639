//! Browser-side plumbing: CDP transport, page interface, accessibility
//! snapshots, and node-to-xpath resolution.

pub mod cdp;
pub mod page;
pub mod resolver;
pub mod snapshot;

pub use cdp::CdpClient;
pub use page::{discover_pages, Page, PageRegistry, PageTarget};
pub use resolver::resolve_node_xpath;
pub use snapshot::{build_snapshot, AXNode, IframeNode, SimplifiedNode, TreeResult};
