//! Layer 3 (network) and Layer 4 (user part) interface contracts
//!
//! The router sits between the two: networks deliver received MSUs and
//! link-state notifications upward, user parts consume them and send
//! their own traffic back down. The router itself satisfies the
//! [`Layer3`] contract so stacks can be chained.

use crate::control::ControlParams;
use crate::msu::Msu;
use crate::route::RouteState;
use crate::router::Router;
use crate::types::{Label, PointCode, PointCodeKind};
use std::sync::{Arc, Weak};

/// A destination advertised by a network, used to seed the routing table
#[derive(Debug, Clone, Copy)]
pub struct NetRoute {
    /// Packed destination point code
    pub packed: u32,
    /// Priority of this network toward the destination; 0 = adjacent
    pub priority: u32,
    /// Reachability as known by the network
    pub state: RouteState,
}

/// A lower-layer signalling network.
///
/// Implementations are owned by the engine; the router and its routes
/// keep only weak references, so every method must tolerate being
/// called while the network is being torn down.
pub trait Layer3: Send + Sync {
    fn name(&self) -> &str;

    /// Back-reference installed by the router on attach, cleared on detach
    fn attach(&self, _router: Option<Weak<Router>>) {}

    /// Whether the network (or one specific link of it) can carry traffic
    fn operational(&self, sls: Option<u8>) -> bool;

    /// Local point code for a family, 0 when none is configured
    fn local(&self, kind: PointCodeKind) -> u32;

    /// Network indicator for a family
    fn network_indicator(&self, _kind: PointCodeKind, default: u8) -> u8 {
        default
    }

    /// Priority toward a destination; `None` means no route, 0 adjacent
    fn route_priority(&self, kind: PointCodeKind, packed: u32) -> Option<u32>;

    /// Reachability of a destination as seen by this network
    fn route_state(&self, kind: PointCodeKind, packed: u32) -> Option<RouteState>;

    /// Update this network's own view of a destination
    fn set_route_state(&self, kind: PointCodeKind, packed: u32, state: RouteState) -> bool;

    /// Destinations this network advertises
    fn routes(&self, kind: PointCodeKind) -> Vec<NetRoute>;

    /// Send an MSU; returns the link selector actually used
    fn transmit_msu(&self, msu: &Msu, label: &Label, sls: i32) -> Option<u8>;

    /// Set/clear inhibition flags on a link
    fn inhibit(&self, sls: u8, set: u8, clear: u8) -> bool;

    /// Whether any of the masked inhibition flags are set on a link
    fn inhibited(&self, sls: u8, mask: u8) -> bool;

    /// Last known transmit sequence of a link; bit 24+ set selects the
    /// extended changeover acknowledgment
    fn sequence(&self, _sls: u8) -> Option<u32> {
        None
    }

    /// Re-queue MSUs still unacknowledged past `sequence` on a link
    fn recover_msus(&self, _sls: u8, _sequence: u32) {}

    /// Number of links currently carrying traffic, when known
    fn links_active(&self) -> Option<u32> {
        None
    }

    /// Out-of-band control (emergency resume during isolation)
    fn control(&self, _params: &ControlParams) -> bool {
        false
    }
}

/// An upper-layer user part (ISUP, SCCP, the SNM entity itself).
pub trait Layer4: Send + Sync {
    fn name(&self) -> &str;

    /// Back-reference installed by the router on attach, cleared on detach
    fn attach(&self, _router: Option<Weak<Router>>) {}

    /// Offer a received MSU; the returned disposition drives the
    /// router's delivery scan
    fn received_msu(
        &self,
        msu: &Msu,
        label: &Label,
        network: Option<&Arc<dyn Layer3>>,
        sls: i32,
    ) -> crate::types::HandledMsu;

    /// Link or network state change; `sls` is `None` for whole-network
    /// events
    fn notify(&self, network: Option<&Arc<dyn Layer3>>, sls: Option<u8>);

    /// Remote User Part Unavailable indication
    fn received_upu(
        &self,
        _kind: PointCodeKind,
        _node: PointCode,
        _part: u8,
        _cause: u8,
        _label: &Label,
        _sls: i32,
    ) {
    }

    /// Out-of-band control
    fn control(&self, _params: &ControlParams) -> bool {
        false
    }
}
