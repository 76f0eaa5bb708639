//! Observe / act / extract orchestration over an explicit page driver.

pub mod act;
pub mod driver;
pub mod extract;
pub mod observe;
pub mod overlay;

pub use act::ActHandler;
pub use driver::{CdpDriver, PageDriver};
pub use extract::ExtractHandler;
pub use observe::ObserveHandler;

#[cfg(test)]
pub(crate) mod test_support;
