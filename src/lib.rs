//! # sigroute
//!
//! SS7 MTP3 message routing and network management core:
//!
//! - **Router** - multiplexes MSUs across redundant Layer 3 networks,
//!   dispatches to user parts, forwards transit traffic in STP mode
//! - **SNM** - Q.704 management entity: restart, changeover/changeback,
//!   link inhibit, route tests, TFP/TFR/TFA advertisement
//! - **BER** - ASN.1 codec and MIB tree for the management interfaces
//!
//! The core is synchronous and poll driven: the host calls
//! `timer_tick(now)` with a monotonic millisecond clock; no background
//! threads are spawned.
//!
//! ## Example
//! ```rust,ignore
//! use sigroute::{Management, Router, RouterConfig};
//! use std::sync::Arc;
//!
//! let config = RouterConfig { transfer: true, ..Default::default() };
//! let router = Router::new("mtp3", &config)?;
//! let mgmt = Management::new("snm");
//! router.attach_management(&(mgmt.clone() as _));
//! router.restart();
//! ```

pub mod asn1;
pub mod config;
pub mod control;
pub mod errors;
pub mod layer;
pub mod msu;
pub mod route;
pub mod router;
pub mod snm;
#[cfg(test)]
pub(crate) mod testutil;
pub mod timer;
pub mod types;

// Re-exports
pub use config::RouterConfig;
pub use control::ControlParams;
pub use errors::{AsnError, Result, SigError};
pub use layer::{Layer3, Layer4, NetRoute};
pub use msu::{sif, Msu};
pub use route::{state_mask, Route, RouteState, RouteTable};
pub use router::Router;
pub use snm::messages::{SnmMessage, SnmType};
pub use snm::{Maintenance, Management};
pub use types::{inhibit, HandledMsu, Label, PointCode, PointCodeKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use std::sync::Arc;

/// Assemble a router from its configuration, attaching a management
/// entity unless the configuration disables it
pub fn build_router(
    name: &str,
    config: &RouterConfig,
) -> Result<(Arc<Router>, Option<Arc<Management>>)> {
    let router = Router::new(name, config)?;
    let mgmt = if config.management {
        let mgmt = Management::new(format!("{name}-snm"));
        router.attach_management(&(mgmt.clone() as Arc<dyn Layer4>));
        Some(mgmt)
    } else {
        None
    };
    Ok((router, mgmt))
}
