//! Destination routes and the per-family routing table

use crate::layer::Layer3;
use crate::msu::Msu;
use crate::types::{Label, PointCodeKind, KIND_COUNT};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Reachability of a destination.
///
/// The numeric values are maskable bits; the declaration order is the
/// lattice order used when aggregating per-network sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RouteState {
    Prohibited = 0x01,
    Unknown = 0x02,
    Restricted = 0x04,
    Congestion = 0x08,
    Allowed = 0x10,
}

/// State mask sets for route filtering
pub mod state_mask {
    /// Everything except Prohibited
    pub const NOT_PROHIBITED: u8 = 0x1e;
    /// Everything except Unknown
    pub const KNOWN: u8 = 0x1d;
    /// Any state at all
    pub const ANY: u8 = 0x1f;
}

impl RouteState {
    pub fn mask(self) -> u8 {
        self as u8
    }

    pub fn matches(self, mask: u8) -> bool {
        self.mask() & mask != 0
    }

    /// Control operation name advertising this state
    pub fn operation(self) -> &'static str {
        match self {
            Self::Prohibited => "prohibit",
            Self::Unknown => "unknown",
            Self::Restricted => "restrict",
            Self::Congestion => "congest",
            Self::Allowed => "allow",
        }
    }
}

/// A weak network entry with its cached priority toward the destination
#[derive(Clone)]
struct NetworkEntry {
    network: Weak<dyn Layer3>,
    priority: u32,
}

/// A route toward one destination point code.
///
/// Holds the networks able to reach the destination in ascending
/// priority order; the networks themselves are owned by the engine, the
/// route only indexes them. A route with no networks left is deleted by
/// the table.
#[derive(Clone)]
pub struct Route {
    kind: PointCodeKind,
    packed: u32,
    state: RouteState,
    shift: u32,
    networks: Vec<NetworkEntry>,
}

impl Route {
    pub fn new(kind: PointCodeKind, packed: u32, shift: u32) -> Self {
        Self { kind, packed, state: RouteState::Unknown, shift, networks: Vec::new() }
    }

    pub fn kind(&self) -> PointCodeKind {
        self.kind
    }

    pub fn packed(&self) -> u32 {
        self.packed
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    pub fn set_state(&mut self, state: RouteState) {
        self.state = state;
    }

    /// Route priority: the best (lowest) of the attached networks.
    /// 0 means the destination is an adjacent node.
    pub fn priority(&self) -> u32 {
        self.networks.iter().map(|e| e.priority).min().unwrap_or(u32::MAX)
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Attach a network or refresh its priority.
    ///
    /// Rejects networks reporting no route to the destination. The list
    /// stays ascending by priority, equal priorities keep attach order.
    pub fn attach(&mut self, network: &Arc<dyn Layer3>) {
        let Some(priority) = network.route_priority(self.kind, self.packed) else {
            return;
        };
        self.detach(network);
        let pos = self
            .networks
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.networks.len());
        self.networks
            .insert(pos, NetworkEntry { network: Arc::downgrade(network), priority });
    }

    /// Remove a network; returns true while other networks remain.
    /// Entries whose owner already dropped the network are pruned too.
    pub fn detach(&mut self, network: &Arc<dyn Layer3>) -> bool {
        self.networks.retain(|e| match e.network.upgrade() {
            Some(n) => !Arc::ptr_eq(&n, network),
            None => false,
        });
        !self.networks.is_empty()
    }

    pub fn has_network(&self, network: &Arc<dyn Layer3>) -> bool {
        self.networks
            .iter()
            .any(|e| e.network.upgrade().map_or(false, |n| Arc::ptr_eq(&n, network)))
    }

    /// Whether at least one attached network is operational
    pub fn operational(&self, sls: Option<u8>) -> bool {
        self.upgraded().iter().any(|(n, _)| n.operational(sls))
    }

    /// Live networks in priority order
    pub fn upgraded(&self) -> Vec<(Arc<dyn Layer3>, u32)> {
        self.networks
            .iter()
            .filter_map(|e| e.network.upgrade().map(|n| (n, e.priority)))
            .collect()
    }

    /// Try the attached networks until one accepts the MSU.
    ///
    /// Iteration starts at index `sls >> shift` and wraps, spreading
    /// load across equal-priority networks; `source` is skipped so
    /// transit traffic is never reflected to its origin.
    pub fn transmit_msu(
        &self,
        msu: &Msu,
        label: &Label,
        sls: i32,
        source: Option<&Arc<dyn Layer3>>,
    ) -> Option<u8> {
        let nets = self.upgraded();
        if nets.is_empty() {
            return None;
        }
        let start = (sls.max(0) as usize >> self.shift) % nets.len();
        for i in 0..nets.len() {
            let (net, _) = &nets[(start + i) % nets.len()];
            if let Some(src) = source {
                if Arc::ptr_eq(net, src) {
                    continue;
                }
            }
            debug!(network = net.name(), dest = self.packed, "attempting transmit");
            if let Some(tx) = net.transmit_msu(msu, label, sls) {
                return Some(tx);
            }
        }
        None
    }
}

/// Per-family ordered route maps.
///
/// Iteration follows ascending packed destination, which fixes the
/// order of advertisement bursts and periodic route tests.
pub struct RouteTable {
    families: [BTreeMap<u32, Route>; KIND_COUNT],
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self { families: [BTreeMap::new(), BTreeMap::new(), BTreeMap::new()] }
    }

    pub fn find(&self, kind: PointCodeKind, packed: u32) -> Option<&Route> {
        self.families[kind.index()].get(&packed)
    }

    pub fn find_mut(&mut self, kind: PointCodeKind, packed: u32) -> Option<&mut Route> {
        self.families[kind.index()].get_mut(&packed)
    }

    /// Snapshot a route whose state matches the mask
    pub fn find_matching(&self, kind: PointCodeKind, packed: u32, mask: u8) -> Option<Route> {
        self.find(kind, packed).filter(|r| r.state().matches(mask)).cloned()
    }

    pub fn iter(&self, kind: PointCodeKind) -> impl Iterator<Item = &Route> {
        self.families[kind.index()].values()
    }

    pub fn len(&self, kind: PointCodeKind) -> usize {
        self.families[kind.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.iter().all(BTreeMap::is_empty)
    }

    /// Import every destination a network advertises
    pub fn update_routes(&mut self, network: &Arc<dyn Layer3>) {
        for kind in PointCodeKind::ALL {
            for adv in network.routes(kind) {
                if adv.packed == 0 {
                    continue;
                }
                let route = self.families[kind.index()]
                    .entry(adv.packed)
                    .or_insert_with(|| Route::new(kind, adv.packed, 0));
                route.attach(network);
                debug!(
                    kind = kind.name(),
                    dest = adv.packed,
                    priority = adv.priority,
                    "route imported"
                );
            }
        }
    }

    /// Drop a network from every route, deleting routes left empty
    pub fn remove_routes(&mut self, network: &Arc<dyn Layer3>) {
        for family in &mut self.families {
            family.retain(|_, route| route.detach(network));
        }
    }
}
