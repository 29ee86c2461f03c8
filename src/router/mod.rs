//! The MTP3 message router
//!
//! Multiplexes MSU traffic across the attached networks, dispatches
//! received MSUs to user parts, forwards transit traffic when acting as
//! an STP, and drives the MTP restart, isolation and route-test
//! procedures. Thread safe; all timers are polled through
//! [`Router::timer_tick`].

use crate::config::RouterConfig;
use crate::control::ControlParams;
use crate::errors::ConfigError;
use crate::layer::{Layer3, Layer4, NetRoute};
use crate::msu::{sif, Msu};
use crate::route::{state_mask, Route, RouteState, RouteTable};
use crate::timer::SigTimer;
use crate::types::{Label, PointCode, PointCodeKind, KIND_COUNT};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mutable router state guarded by the main mutex
struct RouterState {
    networks: Vec<Weak<dyn Layer3>>,
    user_parts: Vec<Weak<dyn Layer4>>,
    /// Generation counter bumped on every list mutation; delivery scans
    /// restart when it moves under them
    changes: u64,
    started: bool,
    phase2: bool,
    check_routes: bool,
    restart: SigTimer,
    isolate: SigTimer,
    route_test: SigTimer,
}

/// SS7 MTP3 router.
///
/// Owns the routing table; networks and user parts are owned by the
/// engine and referenced weakly. The router itself satisfies [`Layer3`]
/// so it can be attached below another router.
pub struct Router {
    name: String,
    transfer: bool,
    test_restricted: bool,
    local: [u32; KIND_COUNT],
    send_unavail: AtomicBool,
    send_prohibited: AtomicBool,
    rx_msu: AtomicU64,
    tx_msu: AtomicU64,
    fwd_msu: AtomicU64,
    clock: AtomicU64,
    state: Mutex<RouterState>,
    routes: Mutex<RouteTable>,
    mngmt: Mutex<Weak<dyn Layer4>>,
}

fn snm_state(operation: &str) -> Option<RouteState> {
    match operation {
        "prohibit" | "test-prohibited" => Some(RouteState::Prohibited),
        "restrict" | "test-restricted" => Some(RouteState::Restricted),
        "congest" => Some(RouteState::Congestion),
        "allow" | "allowed" => Some(RouteState::Allowed),
        _ => None,
    }
}

impl Router {
    pub fn new(name: impl Into<String>, config: &RouterConfig) -> Result<Arc<Self>, ConfigError> {
        let local = config.local_codes()?;
        Ok(Arc::new(Self {
            name: name.into(),
            transfer: config.transfer,
            test_restricted: config.testrestricted,
            local,
            send_unavail: AtomicBool::new(config.sendupu),
            send_prohibited: AtomicBool::new(config.sendtfp),
            rx_msu: AtomicU64::new(0),
            tx_msu: AtomicU64::new(0),
            fwd_msu: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            state: Mutex::new(RouterState {
                networks: Vec::new(),
                user_parts: Vec::new(),
                changes: 0,
                started: false,
                phase2: false,
                check_routes: false,
                restart: SigTimer::new(config.restart_interval()),
                isolate: SigTimer::new(config.isolation_interval()),
                route_test: SigTimer::new(config.route_test_interval()),
            }),
            routes: Mutex::new(RouteTable::new()),
            mngmt: Mutex::new(Weak::<NullPart>::new() as Weak<dyn Layer4>),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer
    }

    pub fn started(&self) -> bool {
        lock(&self.state).started
    }

    pub fn rx_count(&self) -> u64 {
        self.rx_msu.load(Ordering::Relaxed)
    }

    pub fn tx_count(&self) -> u64 {
        self.tx_msu.load(Ordering::Relaxed)
    }

    pub fn fwd_count(&self) -> u64 {
        self.fwd_msu.load(Ordering::Relaxed)
    }

    fn now(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    /// The attached management entity, when alive
    pub fn management(&self) -> Option<Arc<dyn Layer4>> {
        lock(&self.mngmt).upgrade()
    }

    /// Attach a lower-layer network and import its advertised routes
    pub fn attach_network(self: &Arc<Self>, network: &Arc<dyn Layer3>) {
        {
            let mut st = lock(&self.state);
            let present = st
                .networks
                .iter()
                .any(|w| w.upgrade().map_or(false, |n| Arc::ptr_eq(&n, network)));
            if !present {
                st.changes += 1;
                st.networks.push(Arc::downgrade(network));
                debug!(router = %self.name, network = network.name(), "attached network");
            }
        }
        lock(&self.routes).update_routes(network);
        network.attach(Some(Arc::downgrade(self)));
    }

    /// Detach a network and drop the routes it carried alone
    pub fn detach_network(&self, network: &Arc<dyn Layer3>) {
        let removed = {
            let mut st = lock(&self.state);
            let before = st.networks.len();
            st.networks
                .retain(|w| w.upgrade().map_or(false, |n| !Arc::ptr_eq(&n, network)));
            if st.networks.len() != before {
                st.changes += 1;
                true
            } else {
                false
            }
        };
        if removed {
            lock(&self.routes).remove_routes(network);
            network.attach(None);
            debug!(router = %self.name, network = network.name(), "detached network");
        }
    }

    /// Attach an upper-layer user part
    pub fn attach_user_part(self: &Arc<Self>, part: &Arc<dyn Layer4>) {
        {
            let mut st = lock(&self.state);
            let present = st
                .user_parts
                .iter()
                .any(|w| w.upgrade().map_or(false, |p| Arc::ptr_eq(&p, part)));
            if !present {
                st.changes += 1;
                st.user_parts.push(Arc::downgrade(part));
                debug!(router = %self.name, part = part.name(), "attached user part");
            }
        }
        part.attach(Some(Arc::downgrade(self)));
    }

    /// Detach a user part; the management slot is cleared when it was
    /// the one leaving
    pub fn detach_user_part(&self, part: &Arc<dyn Layer4>) {
        let removed = {
            let mut st = lock(&self.state);
            let before = st.user_parts.len();
            st.user_parts
                .retain(|w| w.upgrade().map_or(false, |p| !Arc::ptr_eq(&p, part)));
            if st.user_parts.len() != before {
                st.changes += 1;
                true
            } else {
                false
            }
        };
        if removed {
            let mut mngmt = lock(&self.mngmt);
            if mngmt.upgrade().map_or(false, |m| Arc::ptr_eq(&m, part)) {
                *mngmt = Weak::<NullPart>::new() as Weak<dyn Layer4>;
            }
            drop(mngmt);
            part.attach(None);
            debug!(router = %self.name, part = part.name(), "detached user part");
        }
    }

    /// Attach the SNM management entity as a user part and remember it
    /// as the advertisement sink
    pub fn attach_management(self: &Arc<Self>, mgmt: &Arc<dyn Layer4>) {
        *lock(&self.mngmt) = Arc::downgrade(mgmt);
        self.attach_user_part(mgmt);
    }

    /// Configured local point code for a family, 0 when none
    pub fn local(&self, kind: PointCodeKind) -> u32 {
        self.local[kind.index()]
    }

    /// Network indicator: first attached network that has a local
    /// address in the family decides, else the default applies
    pub fn get_ni(&self, kind: PointCodeKind, default: u8) -> u8 {
        let default = if default & 0xc0 == 0 { default << 6 } else { default };
        for net in self.networks() {
            if net.local(kind) != 0 {
                return net.network_indicator(kind, default);
            }
        }
        default
    }

    fn networks(&self) -> Vec<Arc<dyn Layer3>> {
        lock(&self.state)
            .networks
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn user_parts(&self) -> Vec<Arc<dyn Layer4>> {
        lock(&self.state)
            .user_parts
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Begin the MTP restart procedure
    pub fn restart(&self) -> bool {
        info!(router = %self.name, stp = self.transfer, "restart initiated");
        let now = self.now();
        let mut st = lock(&self.state);
        st.phase2 = false;
        st.started = false;
        st.check_routes = true;
        st.isolate.stop();
        st.restart.start(now);
        st.route_test.stop();
        true
    }

    /// Stop all MTP operation
    pub fn disable(&self) {
        info!(router = %self.name, "MTP operation disabled");
        let mut st = lock(&self.state);
        st.phase2 = false;
        st.started = false;
        st.check_routes = false;
        st.isolate.stop();
        st.restart.stop();
        st.route_test.stop();
    }

    /// Restart phase 2 (STP only): advertise the prohibited routes
    /// learned so far
    fn restart2(&self) {
        {
            let mut st = lock(&self.state);
            if st.phase2 || !self.transfer {
                return;
            }
            info!(router = %self.name, "restart entering second phase");
            st.phase2 = true;
        }
        self.notify_routes(RouteState::Prohibited.mask(), None);
    }

    /// Drive all router timers; `now` is a monotonic millisecond clock
    pub fn timer_tick(self: &Arc<Self>, now: u64) {
        self.clock.store(now, Ordering::Relaxed);
        enum Action {
            None,
            RouteTest,
            Phase2,
            Complete,
        }
        let action = {
            let mut st = lock(&self.state);
            if st.isolate.timeout(now) {
                warn!(router = %self.name, "node is isolated and down");
                st.phase2 = false;
                st.started = false;
                st.isolate.stop();
                st.restart.stop();
                return;
            }
            if st.started {
                if st.route_test.timeout(now) {
                    st.route_test.start(now);
                    Action::RouteTest
                } else {
                    Action::None
                }
            } else if self.transfer && !st.phase2 {
                if st.restart.fires_within(now, 5_000) {
                    Action::Phase2
                } else {
                    Action::None
                }
            } else if st.restart.timeout(now) {
                info!(router = %self.name, stp = self.transfer, "restart complete");
                st.restart.stop();
                st.started = true;
                st.phase2 = false;
                if st.route_test.interval() > 0 {
                    st.route_test.start(now);
                }
                Action::Complete
            } else {
                Action::None
            }
        };
        match action {
            Action::RouteTest => self.send_route_test(),
            Action::Phase2 => self.restart2(),
            Action::Complete => {
                self.send_restart(None);
                if lock(&self.state).check_routes {
                    self.check_routes(None);
                }
                if self.transfer {
                    self.notify_routes(state_mask::NOT_PROHIBITED, None);
                }
                let me: Arc<dyn Layer3> = self.clone();
                for part in self.user_parts() {
                    part.notify(Some(&me), None);
                }
            }
            Action::None => {}
        }
    }

    /// Route an MSU through the table, counting transmissions and
    /// transit forwards
    pub fn route_msu(
        &self,
        msu: &Msu,
        label: &Label,
        network: Option<&Arc<dyn Layer3>>,
        sls: i32,
        states: u8,
    ) -> Option<u8> {
        let route = lock(&self.routes).find_matching(
            label.kind,
            label.dpc.pack(label.kind),
            states,
        )?;
        let tx = route.transmit_msu(msu, label, sls, network)?;
        self.tx_msu.fetch_add(1, Ordering::Relaxed);
        if network.is_some() {
            self.fwd_msu.fetch_add(1, Ordering::Relaxed);
        }
        Some(tx)
    }

    /// Send an MSU originated locally. Management and maintenance
    /// traffic may use prohibited routes.
    pub fn transmit_msu(&self, msu: &Msu, label: &Label, sls: i32) -> Option<u8> {
        let states = match msu.sif() {
            sif::SNM | sif::MTN | sif::MTNS => state_mask::ANY,
            _ => state_mask::NOT_PROHIBITED,
        };
        self.route_msu(msu, label, None, sls, states)
    }

    /// Deliver a received MSU to the user parts, forwarding it as
    /// transit traffic when nobody claims it and we are an STP.
    pub fn received_msu(
        self: &Arc<Self>,
        msu: &Msu,
        label: &Label,
        network: Option<&Arc<dyn Layer3>>,
        sls: i32,
    ) -> crate::types::HandledMsu {
        use crate::types::HandledMsu;
        self.rx_msu.fetch_add(1, Ordering::Relaxed);
        let mut ret = HandledMsu::Rejected;
        'scan: loop {
            let mut idx = 0;
            loop {
                let (part, generation) = {
                    let st = lock(&self.state);
                    if idx >= st.user_parts.len() {
                        break 'scan;
                    }
                    (st.user_parts[idx].upgrade(), st.changes)
                };
                let Some(part) = part else {
                    idx += 1;
                    continue;
                };
                let handled = part.received_msu(msu, label, network, sls);
                match handled {
                    HandledMsu::Accepted | HandledMsu::Failure => return handled,
                    HandledMsu::Rejected => {}
                    other => ret = other,
                }
                // list changed under us: restart the scan
                if lock(&self.state).changes != generation {
                    continue 'scan;
                }
                idx += 1;
            }
        }
        match ret {
            HandledMsu::Unequipped | HandledMsu::Inaccessible => {
                return if self.send_unavail.load(Ordering::Relaxed) {
                    ret
                } else {
                    HandledMsu::Failure
                };
            }
            _ => {}
        }
        let dpc = label.dpc.pack(label.kind);
        let mut local = self.local(label.kind) == dpc;
        if let (false, Some(net)) = (local, network) {
            local = net.local(label.kind) == dpc;
        }
        if local {
            return if self.send_unavail.load(Ordering::Relaxed) {
                HandledMsu::Unequipped
            } else {
                HandledMsu::Failure
            };
        }
        if self.transfer {
            if self
                .route_msu(msu, label, network, label.sls as i32, state_mask::NOT_PROHIBITED)
                .is_some()
            {
                return HandledMsu::Accepted;
            }
            return if self.send_prohibited.load(Ordering::Relaxed) {
                HandledMsu::NoAddress
            } else {
                HandledMsu::Failure
            };
        }
        HandledMsu::Failure
    }

    /// Broadcast a User Part Unavailable indication to all user parts
    pub fn received_upu(
        &self,
        kind: PointCodeKind,
        node: PointCode,
        part: u8,
        cause: u8,
        label: &Label,
        sls: i32,
    ) {
        for l4 in self.user_parts() {
            l4.received_upu(kind, node, part, cause, label, sls);
        }
    }

    /// Link or network state change reported by a lower layer
    pub fn notify(self: &Arc<Self>, network: Option<&Arc<dyn Layer3>>, sls: Option<u8>) {
        let net_oper = network.map(|n| n.operational(None)).unwrap_or(false);
        let link_oper = match (network, sls) {
            (Some(n), Some(s)) => n.operational(Some(s)),
            _ => true,
        };
        let first_link = network
            .and_then(|n| n.links_active())
            .map_or(true, |count| count <= 1);
        debug!(
            router = %self.name,
            state = if network.is_none() { "no-net" } else if net_oper { "net-up" } else { "net-down" },
            "notified"
        );
        enum After {
            None,
            SendRestart,
            CheckRoutes,
            Restart,
        }
        let mut use_me = false;
        let after = {
            let mut st = lock(&self.state);
            match network {
                Some(_) if net_oper => {
                    if st.isolate.started() {
                        info!(router = %self.name, "isolation ended before shutting down");
                        st.isolate.stop();
                    }
                    if st.started {
                        if link_oper && first_link {
                            After::SendRestart
                        } else {
                            After::None
                        }
                    } else {
                        use_me = true;
                        if st.restart.started() {
                            After::None
                        } else {
                            After::Restart
                        }
                    }
                }
                Some(_) => After::CheckRoutes,
                None => After::None,
            }
        };
        match after {
            After::SendRestart => self.send_restart(network),
            After::CheckRoutes => self.check_routes(network),
            After::Restart => {
                self.restart();
            }
            After::None => {}
        }
        let mgmt = self.management();
        let me: Arc<dyn Layer3> = self.clone();
        for part in self.user_parts() {
            let is_mgmt = mgmt.as_ref().map_or(false, |m| Arc::ptr_eq(m, &part));
            if use_me && !is_mgmt {
                part.notify(Some(&me), None);
            } else {
                part.notify(network, sls);
            }
        }
    }

    /// Mark every unreachable route Prohibited; when nothing at all is
    /// reachable start the isolation timer and force links back up
    pub fn check_routes(self: &Arc<Self>, no_resume: Option<&Arc<dyn Layer3>>) {
        if lock(&self.state).isolate.started() {
            return;
        }
        lock(&self.state).check_routes = false;
        let snapshot: Vec<Route> = {
            let rt = lock(&self.routes);
            PointCodeKind::ALL
                .iter()
                .flat_map(|k| rt.iter(*k).cloned().collect::<Vec<_>>())
                .collect()
        };
        let mut isolated = true;
        let mut prohibited = Vec::new();
        for route in &snapshot {
            if route.operational(None) {
                isolated = false;
            } else if route.state() != RouteState::Prohibited {
                prohibited.push((route.kind(), route.packed()));
            }
        }
        for (kind, packed) in prohibited {
            let changed = {
                let mut rt = lock(&self.routes);
                rt.find_mut(kind, packed).map(|r| {
                    r.set_state(RouteState::Prohibited);
                    r.clone()
                })
            };
            if let Some(route) = changed {
                self.route_changed(&route, kind, None);
            }
        }
        if isolated {
            warn!(router = %self.name, "node has become isolated");
            let now = self.now();
            lock(&self.state).isolate.start(now);
            for net in self.networks() {
                if let Some(skip) = no_resume {
                    if Arc::ptr_eq(&net, skip) {
                        continue;
                    }
                }
                let ctl = ControlParams::new("resume")
                    .with("automatic", "true")
                    .with("emergency", "true");
                net.control(&ctl);
                if !lock(&self.state).isolate.started() {
                    break;
                }
            }
        }
    }

    /// Advertise a route state change to the adjacent nodes.
    ///
    /// Only an STP advertises, never during restart phase 1, and only
    /// Prohibited before the restart completes. The advertisement never
    /// leaves through a network the changed route itself uses (split
    /// horizon). `peer` restricts the burst to one adjacent node.
    fn route_changed(&self, route: &Route, kind: PointCodeKind, peer: Option<u32>) {
        let dest = PointCode::from_packed(kind, route.packed());
        let state = route.state();
        debug!(
            router = %self.name,
            dest = %dest,
            state = state.operation(),
            "destination state changed"
        );
        let (started, phase2) = {
            let st = lock(&self.state);
            (st.started, st.phase2)
        };
        if !(self.transfer && (started || phase2)) {
            return;
        }
        if state != RouteState::Prohibited && !started {
            return;
        }
        if state == RouteState::Unknown {
            return;
        }
        let Some(mgmt) = self.management() else {
            return;
        };
        let adjacent: Vec<Route> = {
            let rt = lock(&self.routes);
            rt.iter(kind)
                .filter(|r| r.priority() == 0 && r.packed() != route.packed())
                .cloned()
                .collect()
        };
        for r in adjacent {
            if let Some(p) = peer {
                if p != r.packed() {
                    continue;
                }
            }
            let adj = PointCode::from_packed(kind, r.packed());
            let mut local = self.local(kind);
            for (net, _) in r.upgraded() {
                if !net.operational(None) {
                    continue;
                }
                if route.has_network(&net) {
                    debug!(router = %self.name, dest = %dest, network = net.name(),
                        "not advertising route back on its own network");
                    continue;
                }
                let mut net_local = net.local(kind);
                if net_local == 0 {
                    net_local = local;
                }
                if net_local == 0 {
                    continue;
                }
                // use the router's own local address at most once
                if local == net_local {
                    local = 0;
                }
                let addr = format!(
                    "{},{},{}",
                    kind.name(),
                    PointCode::from_packed(kind, net_local),
                    adj
                );
                debug!(router = %self.name, dest = %dest, state = state.operation(),
                    address = %addr, "advertising route");
                let ctl = ControlParams::new(state.operation())
                    .with("address", addr)
                    .with("destination", dest.to_string())
                    .with("automatic", "true");
                mgmt.control(&ctl);
            }
        }
    }

    /// Re-advertise routes matching the state mask, optionally to a
    /// single adjacent node
    pub fn notify_routes(&self, states: u8, peer: Option<u32>) {
        let snapshot: Vec<(PointCodeKind, Route)> = {
            let rt = lock(&self.routes);
            PointCodeKind::ALL
                .iter()
                .flat_map(|k| rt.iter(*k).map(|r| (*k, r.clone())).collect::<Vec<_>>())
                .collect()
        };
        for (kind, route) in snapshot {
            if route.state().matches(states) {
                self.route_changed(&route, kind, peer);
            }
        }
    }

    /// Current aggregate state of a route
    pub fn route_state(&self, kind: PointCodeKind, packed: u32) -> Option<RouteState> {
        lock(&self.routes).find(kind, packed).map(Route::state)
    }

    /// Force the aggregate state of a route, advertising a change
    pub fn set_route_state(
        &self,
        kind: PointCodeKind,
        packed: u32,
        state: RouteState,
        peer: Option<u32>,
    ) -> bool {
        let changed = {
            let mut rt = lock(&self.routes);
            let Some(route) = rt.find_mut(kind, packed) else {
                return false;
            };
            if route.state() == state {
                None
            } else {
                route.set_state(state);
                Some(route.clone())
            }
        };
        if let Some(route) = changed {
            if state != RouteState::Unknown {
                self.route_changed(&route, kind, peer);
            }
        }
        true
    }

    /// Update the state of a route as reported by the node `src_pc`.
    ///
    /// Only the sub-state held by the network adjacent to the reporter
    /// is overwritten; the aggregate becomes the maximum known state
    /// across operational networks.
    pub fn set_route_specific_state(
        &self,
        kind: PointCodeKind,
        packed: u32,
        src_pc: u32,
        state: RouteState,
        peer: Option<u32>,
    ) -> bool {
        if packed == 0 || src_pc == 0 {
            return false;
        }
        let Some(route) = lock(&self.routes).find(kind, packed).cloned() else {
            return false;
        };
        let mut best = state;
        let mut adjacent_seen = false;
        for (net, _) in route.upgraded() {
            let Some(sub) = net.route_state(kind, packed) else {
                continue;
            };
            if net.route_priority(kind, src_pc) == Some(0) {
                adjacent_seen = true;
                net.set_route_state(kind, packed, state);
            } else if sub != RouteState::Unknown && sub > best && net.operational(None) {
                best = sub;
            }
        }
        if !adjacent_seen {
            return false;
        }
        let changed = {
            let mut rt = lock(&self.routes);
            match rt.find_mut(kind, packed) {
                Some(route) if route.state() != best => {
                    route.set_state(best);
                    Some(route.clone())
                }
                _ => None,
            }
        };
        if let Some(route) = changed {
            if state != RouteState::Unknown {
                self.route_changed(&route, kind, peer);
            }
        }
        true
    }

    /// Send Traffic Restart Allowed to every operational adjacent node,
    /// or only through `only` when given
    pub fn send_restart(&self, only: Option<&Arc<dyn Layer3>>) {
        let Some(mgmt) = self.management() else {
            return;
        };
        for kind in PointCodeKind::ALL {
            let adjacent: Vec<Route> = {
                let rt = lock(&self.routes);
                rt.iter(kind).filter(|r| r.priority() == 0).cloned().collect()
            };
            for r in adjacent {
                let mut local = self.local(kind);
                let adj = PointCode::from_packed(kind, r.packed());
                for (net, _) in r.upgraded() {
                    if let Some(filter) = only {
                        if !Arc::ptr_eq(&net, filter) {
                            continue;
                        }
                    }
                    if !net.operational(None) {
                        continue;
                    }
                    let mut net_local = net.local(kind);
                    if net_local == 0 {
                        net_local = local;
                    }
                    if net_local == 0 {
                        continue;
                    }
                    if local == net_local {
                        local = 0;
                    }
                    let addr = format!(
                        "{},{},{}",
                        kind.name(),
                        PointCode::from_packed(kind, net_local),
                        adj
                    );
                    debug!(router = %self.name, address = %addr, "sending restart allowed");
                    let ctl = ControlParams::new("restart")
                        .with("address", addr)
                        .with("automatic", "true");
                    mgmt.control(&ctl);
                    if only.is_some() {
                        break;
                    }
                }
            }
        }
    }

    /// Periodic RST/RSR toward prohibited (and optionally restricted)
    /// non-adjacent destinations
    pub fn send_route_test(&self) {
        let Some(mgmt) = self.management() else {
            return;
        };
        for kind in PointCodeKind::ALL {
            let (tested, all): (Vec<Route>, Vec<Route>) = {
                let rt = lock(&self.routes);
                (
                    rt.iter(kind).filter(|r| r.priority() != 0).cloned().collect(),
                    rt.iter(kind).cloned().collect(),
                )
            };
            for r in tested {
                let oper = match r.state() {
                    RouteState::Prohibited => "test-prohibited",
                    RouteState::Restricted if self.test_restricted => "test-restricted",
                    _ => continue,
                };
                let dest = PointCode::from_packed(kind, r.packed());
                let mut local = self.local(kind);
                for (net, _) in r.upgraded() {
                    if !net.operational(None) {
                        continue;
                    }
                    let mut net_local = net.local(kind);
                    if net_local == 0 {
                        net_local = local;
                    }
                    if net_local == 0 {
                        continue;
                    }
                    // the test goes to the adjacent node reached on the
                    // same network
                    let remote = all
                        .iter()
                        .find(|r2| r2.priority() == 0 && r2.has_network(&net))
                        .map(Route::packed)
                        .unwrap_or(0);
                    if remote == 0 {
                        continue;
                    }
                    if local == net_local {
                        local = 0;
                    }
                    let addr = format!(
                        "{},{},{}",
                        kind.name(),
                        PointCode::from_packed(kind, net_local),
                        PointCode::from_packed(kind, remote)
                    );
                    debug!(router = %self.name, oper, dest = %dest, address = %addr,
                        "sending route test");
                    let ctl = ControlParams::new(oper)
                        .with("address", addr)
                        .with("destination", dest.to_string())
                        .with("automatic", "true");
                    mgmt.control(&ctl);
                }
            }
        }
    }

    /// Request uninhibition of a link on every adjacent route of a
    /// network
    pub fn uninhibit(&self, network: &Arc<dyn Layer3>, sls: u8, force: bool) -> bool {
        let Some(mgmt) = self.management() else {
            return false;
        };
        let cmd = if force { "link-force-uninhibit" } else { "link-uninhibit" };
        let mut ok = false;
        for kind in PointCodeKind::ALL {
            let mut local = network.local(kind);
            if local == 0 {
                local = self.local(kind);
            }
            if local == 0 {
                continue;
            }
            for adv in network.routes(kind) {
                if adv.priority != 0 {
                    continue;
                }
                let addr = format!(
                    "{},{},{},{}",
                    kind.name(),
                    PointCode::from_packed(kind, local),
                    PointCode::from_packed(kind, adv.packed),
                    sls
                );
                debug!(router = %self.name, cmd, address = %addr, "requesting uninhibit");
                let ctl = ControlParams::new(cmd)
                    .with("address", addr)
                    .with("automatic", "true");
                mgmt.control(&ctl);
                ok = true;
            }
        }
        ok
    }

    fn adjacent_network(&self, link: &Label) -> Option<Arc<dyn Layer3>> {
        let remote = link.dpc.pack(link.kind);
        if remote == 0 {
            return None;
        }
        self.networks()
            .into_iter()
            .find(|n| n.route_priority(link.kind, remote) == Some(0))
    }

    /// Set or clear inhibition flags on the link a label designates.
    ///
    /// With `not_last`, refuses to inhibit the only active link of the
    /// adjacent network.
    pub fn inhibit(&self, link: &Label, set: u8, clear: u8, not_last: bool) -> bool {
        let Some(net) = self.adjacent_network(link) else {
            return false;
        };
        if not_last && set != 0 {
            let single = net.links_active() == Some(1);
            if single && !net.inhibited(link.sls, 0x0f) {
                return false;
            }
        }
        net.inhibit(link.sls, set, clear)
    }

    /// Whether any of the masked inhibition flags are set on a link
    pub fn inhibited(&self, link: &Label, flags: u8) -> bool {
        self.adjacent_network(link)
            .map_or(false, |net| net.inhibited(link.sls, flags))
    }

    /// Send sequence of the link a label designates
    pub fn get_sequence(&self, link: &Label) -> Option<u32> {
        self.adjacent_network(link)?.sequence(link.sls)
    }

    /// Recover in-flight MSUs on the link a label designates
    pub fn recover_msus(&self, link: &Label, sequence: u32) {
        if let Some(net) = self.adjacent_network(link) {
            net.recover_msus(link.sls, sequence);
        }
    }

    /// Control surface: pause/resume/traffic/advertise plus the
    /// route-state operations of §Q.704
    pub fn control(self: &Arc<Self>, params: &ControlParams) -> bool {
        let unavail = self.send_unavail.load(Ordering::Relaxed);
        self.send_unavail
            .store(params.get_bool("sendupu", unavail), Ordering::Relaxed);
        let prohibited = self.send_prohibited.load(Ordering::Relaxed);
        self.send_prohibited
            .store(params.get_bool("sendtfp", prohibited), Ordering::Relaxed);
        match params.operation() {
            "pause" => {
                self.disable();
                true
            }
            "resume" => {
                let st = lock(&self.state);
                if st.started || st.restart.started() {
                    return true;
                }
                drop(st);
                self.restart()
            }
            "restart" => self.restart(),
            "traffic" => {
                self.send_restart(None);
                self.operational(None)
            }
            "status" => self.operational(None),
            "advertise" => {
                let (started, phase2) = {
                    let st = lock(&self.state);
                    (st.started, st.phase2)
                };
                if !(self.transfer && (started || phase2)) {
                    return false;
                }
                self.notify_routes(state_mask::ANY, None);
                true
            }
            op => self.control_route_op(op, params),
        }
    }

    fn control_route_op(&self, op: &str, params: &ControlParams) -> bool {
        let Some(state) = snm_state(op) else {
            return false;
        };
        let automatic = params.get_bool("automatic", false);
        let Some(kind) = params
            .get("pointcodetype")
            .and_then(|t| t.parse::<PointCodeKind>().ok())
        else {
            if !automatic {
                warn!(router = %self.name, op, "control error: missing 'pointcodetype'");
            }
            return false;
        };
        let Some(dest) = params.get("destination").and_then(|d| PointCode::parse(d).ok())
        else {
            if !automatic {
                warn!(router = %self.name, op, "control error: missing 'destination'");
            }
            return false;
        };
        let packed = dest.pack(kind);
        if matches!(op, "test-prohibited" | "test-restricted") {
            // a route test: answer only when our view disagrees
            let Some(current) = self.route_state(kind, packed) else {
                return false;
            };
            if current == RouteState::Unknown {
                return false;
            }
            if current == state {
                return true;
            }
            let (started, mgmt) = (self.started(), self.management());
            let Some(mgmt) = mgmt else {
                return false;
            };
            if !(self.transfer && started) {
                return false;
            }
            let Some(addr) = params.get("back-address").or_else(|| params.get("address"))
            else {
                warn!(router = %self.name, op, "control error: missing 'address'");
                return false;
            };
            debug!(router = %self.name, dest = %dest, state = current.operation(),
                "advertising tested route");
            let ctl = ControlParams::new(current.operation())
                .with("address", addr)
                .with("destination", dest.to_string())
                .with("automatic", "true");
            mgmt.control(&ctl);
            return true;
        }
        let source = params
            .get("source")
            .map(str::to_string)
            .or_else(|| {
                self_address_source(params)
            });
        if let Some(src) = source {
            let Ok(opc) = PointCode::parse(&src) else {
                if !automatic {
                    warn!(router = %self.name, op, source = %src, "control error: invalid source");
                }
                return false;
            };
            if !self.set_route_specific_state(kind, packed, opc.pack(kind), state, None) {
                if !automatic {
                    warn!(router = %self.name, op, dest = %dest, source = %src,
                        "control error: no such route");
                }
                return false;
            }
        } else if !self.set_route_state(kind, packed, state, None) {
            if !automatic {
                warn!(router = %self.name, op, dest = %dest, "control error: no such route");
            }
            return false;
        }
        // a restarted adjacent node gets our full routing view
        if op == "allowed" && self.transfer && self.started() {
            self.notify_routes(state_mask::ANY, Some(packed));
        }
        true
    }

    /// Whether this node can currently carry traffic
    pub fn operational(&self, sls: Option<u8>) -> bool {
        {
            let st = lock(&self.state);
            if !st.started || st.isolate.started() {
                return false;
            }
        }
        self.networks().iter().any(|n| n.operational(sls))
    }
}

fn self_address_source(params: &ControlParams) -> Option<String> {
    params
        .address_fields()
        .and_then(|f| f.get(1).map(|s| s.to_string()))
}

/// Placeholder for the empty management weak slot
struct NullPart;

impl Layer4 for NullPart {
    fn name(&self) -> &str {
        "null"
    }
    fn received_msu(
        &self,
        _msu: &Msu,
        _label: &Label,
        _network: Option<&Arc<dyn Layer3>>,
        _sls: i32,
    ) -> crate::types::HandledMsu {
        crate::types::HandledMsu::Rejected
    }
    fn notify(&self, _network: Option<&Arc<dyn Layer3>>, _sls: Option<u8>) {}
}

impl Layer3 for Router {
    fn name(&self) -> &str {
        &self.name
    }

    fn operational(&self, sls: Option<u8>) -> bool {
        Router::operational(self, sls)
    }

    fn local(&self, kind: PointCodeKind) -> u32 {
        Router::local(self, kind)
    }

    fn network_indicator(&self, kind: PointCodeKind, default: u8) -> u8 {
        self.get_ni(kind, default)
    }

    fn route_priority(&self, kind: PointCodeKind, packed: u32) -> Option<u32> {
        lock(&self.routes).find(kind, packed).map(Route::priority)
    }

    fn route_state(&self, kind: PointCodeKind, packed: u32) -> Option<RouteState> {
        Router::route_state(self, kind, packed)
    }

    fn set_route_state(&self, kind: PointCodeKind, packed: u32, state: RouteState) -> bool {
        let mut rt = lock(&self.routes);
        match rt.find_mut(kind, packed) {
            Some(route) => {
                route.set_state(state);
                true
            }
            None => false,
        }
    }

    fn routes(&self, kind: PointCodeKind) -> Vec<NetRoute> {
        lock(&self.routes)
            .iter(kind)
            .map(|r| NetRoute { packed: r.packed(), priority: r.priority(), state: r.state() })
            .collect()
    }

    fn transmit_msu(&self, msu: &Msu, label: &Label, sls: i32) -> Option<u8> {
        Router::transmit_msu(self, msu, label, sls)
    }

    fn inhibit(&self, _sls: u8, _set: u8, _clear: u8) -> bool {
        false
    }

    fn inhibited(&self, _sls: u8, _mask: u8) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msu::build_sio;
    use crate::testutil::{MockNet, MockPart};
    use crate::types::HandledMsu;

    fn pc(n: u8, c: u8, m: u8) -> PointCode {
        PointCode::new(n, c, m)
    }

    fn l3(net: &Arc<MockNet>) -> Arc<dyn Layer3> {
        net.clone()
    }

    fn l4(part: &Arc<MockPart>) -> Arc<dyn Layer4> {
        part.clone()
    }

    fn sn_router(locals: &[&str]) -> Arc<Router> {
        let config = RouterConfig {
            local: locals.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Router::new("router", &config).unwrap()
    }

    fn stp_router(locals: &[&str]) -> Arc<Router> {
        let config = RouterConfig {
            transfer: true,
            local: locals.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Router::new("stp", &config).unwrap()
    }

    /// Drive the restart machine to Started (STP default timing)
    fn start_stp(router: &Arc<Router>) {
        router.restart();
        router.timer_tick(56_000);
        router.timer_tick(61_000);
        assert!(router.started());
    }

    fn isup(dpc: PointCode, opc: PointCode, sls: u8) -> (Msu, Label) {
        let label = Label::new(PointCodeKind::Itu, dpc, opc, sls, 0);
        (Msu::new(build_sio(2, 0, sif::ISUP), &label, &[0x01, 0x02]), label)
    }

    #[test]
    fn inbound_isup_accepted() {
        let router = sn_router(&["ITU,1-2-3"]);
        let part = MockPart::new("isup", HandledMsu::Accepted);
        router.attach_user_part(&l4(&part));
        let (msu, label) = isup(pc(1, 2, 3), pc(3, 4, 5), 0);
        let result = router.received_msu(&msu, &label, None, 0);
        assert_eq!(result, HandledMsu::Accepted);
        assert_eq!(router.rx_count(), 1);
        assert_eq!(router.tx_count(), 0);
        assert_eq!(router.fwd_count(), 0);
        assert_eq!(part.received.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn stp_forwards_transit() {
        let router = stp_router(&["ITU,1-2-3"]);
        let out = MockNet::new("out");
        out.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        let input = MockNet::new("in");
        router.attach_network(&l3(&out));
        router.attach_network(&l3(&input));
        let (msu, label) = isup(pc(5, 5, 5), pc(3, 4, 5), 0);
        let source = l3(&input);
        let result = router.received_msu(&msu, &label, Some(&source), 0);
        assert_eq!(result, HandledMsu::Accepted);
        assert_eq!(out.tx_count(), 1);
        assert_eq!(input.tx_count(), 0);
        assert_eq!(router.fwd_count(), 1);
        assert_eq!(router.tx_count(), 1);
    }

    #[test]
    fn sn_rejects_unknown_destination() {
        let router = sn_router(&["ITU,1-2-3"]);
        let (msu, label) = isup(pc(5, 5, 5), pc(3, 4, 5), 0);
        let result = router.received_msu(&msu, &label, None, 0);
        assert_eq!(result, HandledMsu::Failure);
    }

    #[test]
    fn stp_unknown_destination_reports_no_address() {
        let router = stp_router(&["ITU,1-2-3"]);
        let (msu, label) = isup(pc(7, 7, 7), pc(3, 4, 5), 0);
        assert_eq!(router.received_msu(&msu, &label, None, 0), HandledMsu::NoAddress);
    }

    #[test]
    fn unequipped_surfaces_when_sendupu() {
        let router = sn_router(&["ITU,1-2-3"]);
        let part = MockPart::new("sccp", HandledMsu::Unequipped);
        router.attach_user_part(&l4(&part));
        let (msu, label) = isup(pc(1, 2, 3), pc(3, 4, 5), 0);
        assert_eq!(router.received_msu(&msu, &label, None, 0), HandledMsu::Unequipped);
        // runtime toggle via control
        let ctl = ControlParams::new("status").with("sendupu", "false");
        router.control(&ctl);
        assert_eq!(router.received_msu(&msu, &label, None, 0), HandledMsu::Failure);
    }

    #[test]
    fn local_destination_without_user_part() {
        let router = sn_router(&["ITU,1-2-3"]);
        let (msu, label) = isup(pc(1, 2, 3), pc(3, 4, 5), 0);
        assert_eq!(router.received_msu(&msu, &label, None, 0), HandledMsu::Unequipped);
    }

    #[test]
    fn management_traffic_uses_prohibited_routes() {
        let router = sn_router(&["ITU,1-2-3"]);
        let net = MockNet::new("net");
        net.add_route(PointCodeKind::Itu, pc(5, 5, 5), 0);
        router.attach_network(&l3(&net));
        let packed = pc(5, 5, 5).pack(PointCodeKind::Itu);
        router.set_route_state(PointCodeKind::Itu, packed, RouteState::Prohibited, None);
        let label = Label::new(PointCodeKind::Itu, pc(5, 5, 5), pc(1, 2, 3), 0, 0);
        let snm = Msu::new(build_sio(2, 0, sif::SNM), &label, &[0x17]);
        assert!(router.transmit_msu(&snm, &label, 0).is_some());
        let isup = Msu::new(build_sio(2, 0, sif::ISUP), &label, &[0x01]);
        assert!(router.transmit_msu(&isup, &label, 0).is_none());
    }

    #[test]
    fn split_horizon_advertisement() {
        let router = stp_router(&["ITU,1-2-3"]);
        let net_a = MockNet::new("a");
        net_a.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        net_a.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        let net_b = MockNet::new("b");
        net_b.add_route(PointCodeKind::Itu, pc(3, 3, 3), 0);
        let mgmt = MockPart::new("snm", HandledMsu::Rejected);
        router.attach_management(&l4(&mgmt));
        router.attach_network(&l3(&net_a));
        router.attach_network(&l3(&net_b));
        start_stp(&router);
        mgmt.controls.lock().unwrap().clear();
        let dest = pc(5, 5, 5).pack(PointCodeKind::Itu);
        let src = pc(2, 2, 2).pack(PointCodeKind::Itu);
        assert!(router.set_route_specific_state(
            PointCodeKind::Itu,
            dest,
            src,
            RouteState::Prohibited,
            None,
        ));
        let controls = mgmt.controls.lock().unwrap();
        let prohibits: Vec<_> =
            controls.iter().filter(|c| c.operation() == "prohibit").collect();
        assert_eq!(prohibits.len(), 1);
        // advertised toward the other adjacent node, never via the
        // route's own network
        assert_eq!(prohibits[0].get("address"), Some("ITU,1-2-3,3-3-3"));
        assert_eq!(prohibits[0].get("destination"), Some("5-5-5"));
    }

    #[test]
    fn restart_phases_gate_advertisement() {
        let router = stp_router(&["ITU,1-2-3"]);
        let net_a = MockNet::new("a");
        net_a.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        net_a.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        net_a.add_route(PointCodeKind::Itu, pc(6, 6, 6), 1);
        let net_b = MockNet::new("b");
        net_b.add_route(PointCodeKind::Itu, pc(3, 3, 3), 0);
        let mgmt = MockPart::new("snm", HandledMsu::Rejected);
        router.attach_management(&l4(&mgmt));
        router.attach_network(&l3(&net_a));
        router.attach_network(&l3(&net_b));
        let prohibited = pc(5, 5, 5).pack(PointCodeKind::Itu);
        let allowed = pc(6, 6, 6).pack(PointCodeKind::Itu);
        router.set_route_state(PointCodeKind::Itu, prohibited, RouteState::Prohibited, None);
        router.set_route_state(PointCodeKind::Itu, allowed, RouteState::Allowed, None);
        router.restart();
        router.timer_tick(56_000);
        let phase2_ops = mgmt.control_ops();
        assert!(phase2_ops.contains(&"prohibit".to_string()));
        assert!(!phase2_ops.contains(&"allow".to_string()));
        mgmt.controls.lock().unwrap().clear();
        router.timer_tick(61_000);
        assert!(router.started());
        let started_ops = mgmt.control_ops();
        assert!(started_ops.contains(&"allow".to_string()));
        assert!(started_ops.contains(&"restart".to_string()));
    }

    #[test]
    fn isolation_detection_and_recovery() {
        let router = stp_router(&["ITU,1-2-3"]);
        let net_a = MockNet::new("a");
        net_a.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        let net_b = MockNet::new("b");
        net_b.add_route(PointCodeKind::Itu, pc(3, 3, 3), 0);
        router.attach_network(&l3(&net_a));
        router.attach_network(&l3(&net_b));
        start_stp(&router);
        net_a.up.store(false, std::sync::atomic::Ordering::SeqCst);
        net_b.up.store(false, std::sync::atomic::Ordering::SeqCst);
        let cause = l3(&net_a);
        router.notify(Some(&cause), None);
        // emergency resume goes everywhere except the causing network
        assert!(net_a.controls.lock().unwrap().is_empty());
        let resumes = net_b.controls.lock().unwrap();
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0].operation(), "resume");
        assert!(resumes[0].get_bool("emergency", false));
        drop(resumes);
        // a network recovering before the timer fires cancels isolation
        net_b.up.store(true, std::sync::atomic::Ordering::SeqCst);
        let recovered = l3(&net_b);
        router.notify(Some(&recovered), None);
        router.timer_tick(70_000);
        assert!(router.started());
        assert!(router.operational(None));
    }

    #[test]
    fn isolation_timeout_shuts_down() {
        let router = stp_router(&["ITU,1-2-3"]);
        let net_a = MockNet::new("a");
        net_a.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        router.attach_network(&l3(&net_a));
        start_stp(&router);
        net_a.up.store(false, std::sync::atomic::Ordering::SeqCst);
        let cause = l3(&net_a);
        router.notify(Some(&cause), None);
        // isolation timer started at the last polled clock (61 s)
        router.timer_tick(62_500);
        assert!(!router.started());
    }

    #[test]
    fn upu_broadcast() {
        let router = sn_router(&["ITU,1-2-3"]);
        let a = MockPart::new("a", HandledMsu::Rejected);
        let b = MockPart::new("b", HandledMsu::Rejected);
        router.attach_user_part(&l4(&a));
        router.attach_user_part(&l4(&b));
        let label = Label::new(PointCodeKind::Itu, pc(1, 2, 3), pc(3, 4, 5), 0, 0);
        router.received_upu(PointCodeKind::Itu, pc(9, 9, 9), sif::ISUP, 1, &label, 0);
        assert_eq!(a.upus.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(b.upus.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    /// A user part that detaches another part when first offered an MSU
    struct DetachingPart {
        victim: Mutex<Option<Arc<dyn Layer4>>>,
        router: Mutex<Weak<Router>>,
        calls: AtomicU64,
    }

    impl Layer4 for DetachingPart {
        fn name(&self) -> &str {
            "detacher"
        }
        fn attach(&self, router: Option<Weak<Router>>) {
            *self.router.lock().unwrap() = router.unwrap_or_default();
        }
        fn received_msu(
            &self,
            _msu: &Msu,
            _label: &Label,
            _network: Option<&Arc<dyn Layer3>>,
            _sls: i32,
        ) -> HandledMsu {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(victim) = self.victim.lock().unwrap().take() {
                if let Some(router) = self.router.lock().unwrap().upgrade() {
                    router.detach_user_part(&victim);
                }
            }
            HandledMsu::Rejected
        }
        fn notify(&self, _network: Option<&Arc<dyn Layer3>>, _sls: Option<u8>) {}
    }

    #[test]
    fn delivery_scan_restarts_on_list_change() {
        let router = sn_router(&["ITU,1-2-3"]);
        let victim = MockPart::new("victim", HandledMsu::Accepted);
        let detacher: Arc<dyn Layer4> = Arc::new(DetachingPart {
            victim: Mutex::new(Some(l4(&victim))),
            router: Mutex::new(Weak::new()),
            calls: AtomicU64::new(0),
        });
        router.attach_user_part(&detacher);
        router.attach_user_part(&l4(&victim));
        let (msu, label) = isup(pc(1, 2, 3), pc(3, 4, 5), 0);
        let result = router.received_msu(&msu, &label, None, 0);
        // the victim was removed mid-scan and never sees the MSU; the
        // restarted scan offers the MSU to the detacher twice
        assert_eq!(victim.received.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(result, HandledMsu::Unequipped);
    }

    #[test]
    fn periodic_route_test() {
        let router = stp_router(&["ITU,1-2-3"]);
        let net_a = MockNet::new("a");
        net_a.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        net_a.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        let mgmt = MockPart::new("snm", HandledMsu::Rejected);
        router.attach_management(&l4(&mgmt));
        router.attach_network(&l3(&net_a));
        start_stp(&router);
        let dest = pc(5, 5, 5).pack(PointCodeKind::Itu);
        router.set_route_state(PointCodeKind::Itu, dest, RouteState::Prohibited, None);
        mgmt.controls.lock().unwrap().clear();
        // route test timer armed at 61 s with the 50 s default
        router.timer_tick(111_001);
        let controls = mgmt.controls.lock().unwrap();
        let tests: Vec<_> = controls
            .iter()
            .filter(|c| c.operation() == "test-prohibited")
            .collect();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].get("destination"), Some("5-5-5"));
        assert_eq!(tests[0].get("address"), Some("ITU,1-2-3,2-2-2"));
    }

    #[test]
    fn inhibit_delegates_to_adjacent_network() {
        let router = sn_router(&["ITU,1-2-3"]);
        let net = MockNet::new("net");
        net.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        router.attach_network(&l3(&net));
        let link = Label::new(PointCodeKind::Itu, pc(2, 2, 2), pc(1, 2, 3), 3, 0);
        assert!(router.inhibit(&link, crate::types::inhibit::INACTIVE, 0, false));
        assert_eq!(
            net.inhibit_calls.lock().unwrap().as_slice(),
            &[(3, crate::types::inhibit::INACTIVE, 0)]
        );
        // refusing to inhibit the last active link
        *net.active_links.lock().unwrap() = Some(1);
        let link2 = Label::new(PointCodeKind::Itu, pc(2, 2, 2), pc(1, 2, 3), 4, 0);
        assert!(!router.inhibit(&link2, crate::types::inhibit::LOCAL, 0, true));
    }

    #[test]
    fn uninhibit_requests_go_to_adjacent_routes() {
        let router = sn_router(&["ITU,1-2-3"]);
        let net = MockNet::new("net");
        net.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        net.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        let mgmt = MockPart::new("snm", HandledMsu::Rejected);
        router.attach_management(&l4(&mgmt));
        router.attach_network(&l3(&net));
        let target = l3(&net);
        assert!(router.uninhibit(&target, 6, true));
        let controls = mgmt.controls.lock().unwrap();
        // one request per adjacent route, none for the far destination
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].operation(), "link-force-uninhibit");
        assert_eq!(controls[0].get("address"), Some("ITU,1-2-3,2-2-2,6"));
    }

    #[test]
    fn tra_control_readvertises_to_peer() {
        let router = stp_router(&["ITU,1-2-3"]);
        let net_a = MockNet::new("a");
        net_a.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        net_a.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        let net_b = MockNet::new("b");
        net_b.add_route(PointCodeKind::Itu, pc(3, 3, 3), 0);
        let mgmt = MockPart::new("snm", HandledMsu::Rejected);
        router.attach_management(&l4(&mgmt));
        router.attach_network(&l3(&net_a));
        router.attach_network(&l3(&net_b));
        start_stp(&router);
        router.set_route_state(
            PointCodeKind::Itu,
            pc(5, 5, 5).pack(PointCodeKind::Itu),
            RouteState::Allowed,
            None,
        );
        mgmt.controls.lock().unwrap().clear();
        // TRA from the node adjacent via net_b
        let ctl = ControlParams::new("allowed")
            .with("pointcodetype", "ITU")
            .with("destination", "3-3-3")
            .with("automatic", "true");
        assert!(router.control(&ctl));
        let ops = mgmt.control_ops();
        // full routing view advertised to the restarted peer
        assert!(ops.contains(&"allow".to_string()));
    }
}
