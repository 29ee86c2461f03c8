//! Shared mocks for router and management tests

use crate::control::ControlParams;
use crate::layer::{Layer3, Layer4, NetRoute};
use crate::msu::Msu;
use crate::route::RouteState;
use crate::router::Router;
use crate::types::{HandledMsu, Label, PointCode, PointCodeKind};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Scriptable Layer 3 network capturing everything the router does to it
pub struct MockNet {
    pub name: String,
    pub locals: Mutex<HashMap<PointCodeKind, u32>>,
    pub advertised: Mutex<Vec<(PointCodeKind, NetRoute)>>,
    pub priorities: Mutex<HashMap<(PointCodeKind, u32), u32>>,
    pub states: Mutex<HashMap<(PointCodeKind, u32), RouteState>>,
    pub up: AtomicBool,
    pub links_down: Mutex<HashSet<u8>>,
    /// When set, only these links exist at all
    pub links_up: Mutex<Option<HashSet<u8>>>,
    pub accept_tx: AtomicBool,
    pub transmitted: Mutex<Vec<(Msu, Label, i32)>>,
    pub inhibit_calls: Mutex<Vec<(u8, u8, u8)>>,
    pub inhibit_flags: Mutex<HashMap<u8, u8>>,
    pub seq: Mutex<Option<u32>>,
    pub recovered: Mutex<Vec<(u8, u32)>>,
    pub controls: Mutex<Vec<ControlParams>>,
    pub active_links: Mutex<Option<u32>>,
}

impl MockNet {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            locals: Mutex::new(HashMap::new()),
            advertised: Mutex::new(Vec::new()),
            priorities: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            up: AtomicBool::new(true),
            links_down: Mutex::new(HashSet::new()),
            links_up: Mutex::new(None),
            accept_tx: AtomicBool::new(true),
            transmitted: Mutex::new(Vec::new()),
            inhibit_calls: Mutex::new(Vec::new()),
            inhibit_flags: Mutex::new(HashMap::new()),
            seq: Mutex::new(None),
            recovered: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            active_links: Mutex::new(None),
        })
    }

    pub fn set_local(&self, kind: PointCodeKind, pc: PointCode) {
        self.locals.lock().unwrap().insert(kind, pc.pack(kind));
    }

    pub fn add_route(&self, kind: PointCodeKind, dest: PointCode, priority: u32) {
        let packed = dest.pack(kind);
        self.advertised.lock().unwrap().push((
            kind,
            NetRoute { packed, priority, state: RouteState::Unknown },
        ));
        self.priorities.lock().unwrap().insert((kind, packed), priority);
        self.states.lock().unwrap().insert((kind, packed), RouteState::Unknown);
    }

    pub fn tx_count(&self) -> usize {
        self.transmitted.lock().unwrap().len()
    }

    pub fn last_tx(&self) -> Option<(Msu, Label, i32)> {
        self.transmitted.lock().unwrap().last().cloned()
    }
}

impl Layer3 for MockNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn operational(&self, sls: Option<u8>) -> bool {
        if !self.up.load(Ordering::SeqCst) {
            return false;
        }
        match sls {
            Some(s) => {
                if self.links_down.lock().unwrap().contains(&s) {
                    return false;
                }
                self.links_up
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map_or(true, |links| links.contains(&s))
            }
            None => true,
        }
    }

    fn local(&self, kind: PointCodeKind) -> u32 {
        self.locals.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    fn route_priority(&self, kind: PointCodeKind, packed: u32) -> Option<u32> {
        self.priorities.lock().unwrap().get(&(kind, packed)).copied()
    }

    fn route_state(&self, kind: PointCodeKind, packed: u32) -> Option<RouteState> {
        self.states.lock().unwrap().get(&(kind, packed)).copied()
    }

    fn set_route_state(&self, kind: PointCodeKind, packed: u32, state: RouteState) -> bool {
        let mut states = self.states.lock().unwrap();
        match states.get_mut(&(kind, packed)) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    fn routes(&self, kind: PointCodeKind) -> Vec<NetRoute> {
        self.advertised
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, r)| *r)
            .collect()
    }

    fn transmit_msu(&self, msu: &Msu, label: &Label, sls: i32) -> Option<u8> {
        self.transmitted.lock().unwrap().push((msu.clone(), *label, sls));
        if self.accept_tx.load(Ordering::SeqCst) {
            Some(label.sls)
        } else {
            None
        }
    }

    fn inhibit(&self, sls: u8, set: u8, clear: u8) -> bool {
        self.inhibit_calls.lock().unwrap().push((sls, set, clear));
        let mut flags = self.inhibit_flags.lock().unwrap();
        let entry = flags.entry(sls).or_insert(0);
        *entry = (*entry | set) & !clear;
        true
    }

    fn inhibited(&self, sls: u8, mask: u8) -> bool {
        self.inhibit_flags.lock().unwrap().get(&sls).copied().unwrap_or(0) & mask != 0
    }

    fn sequence(&self, _sls: u8) -> Option<u32> {
        *self.seq.lock().unwrap()
    }

    fn recover_msus(&self, sls: u8, sequence: u32) {
        self.recovered.lock().unwrap().push((sls, sequence));
    }

    fn links_active(&self) -> Option<u32> {
        *self.active_links.lock().unwrap()
    }

    fn control(&self, params: &ControlParams) -> bool {
        self.controls.lock().unwrap().push(params.clone());
        true
    }
}

/// Scriptable Layer 4 user part
pub struct MockPart {
    pub name: String,
    pub response: Mutex<HandledMsu>,
    pub received: AtomicU32,
    pub upus: AtomicU32,
    pub notifies: AtomicU32,
    pub controls: Mutex<Vec<ControlParams>>,
    pub router: Mutex<Weak<Router>>,
}

impl MockPart {
    pub fn new(name: &str, response: HandledMsu) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            response: Mutex::new(response),
            received: AtomicU32::new(0),
            upus: AtomicU32::new(0),
            notifies: AtomicU32::new(0),
            controls: Mutex::new(Vec::new()),
            router: Mutex::new(Weak::new()),
        })
    }

    pub fn control_ops(&self) -> Vec<String> {
        self.controls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.operation().to_string())
            .collect()
    }
}

impl Layer4 for MockPart {
    fn name(&self) -> &str {
        &self.name
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
        self.received.fetch_add(1, Ordering::SeqCst);
        *self.response.lock().unwrap()
    }

    fn notify(&self, _network: Option<&Arc<dyn Layer3>>, _sls: Option<u8>) {
        self.notifies.fetch_add(1, Ordering::SeqCst);
    }

    fn received_upu(
        &self,
        _kind: PointCodeKind,
        _node: PointCode,
        _part: u8,
        _cause: u8,
        _label: &Label,
        _sls: i32,
    ) {
        self.upus.fetch_add(1, Ordering::SeqCst);
    }

    fn control(&self, params: &ControlParams) -> bool {
        self.controls.lock().unwrap().push(params.clone());
        true
    }
}
