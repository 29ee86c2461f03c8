//! Signalling Network Management entity
//!
//! The SNM user part: parses and builds the Q.704 management messages,
//! coordinates changeover/changeback with a retransmitting
//! pending-message table, answers link inhibit requests and propagates
//! User Part Unavailable indications. A companion [`Maintenance`] peer
//! answers signalling link test messages.

pub mod messages;

use crate::control::ControlParams;
use crate::layer::{Layer3, Layer4};
use crate::msu::{build_sio, sif, Msu};
use crate::router::Router;
use crate::timer::{PendingMsg, PendingQueue};
use crate::types::{inhibit, HandledMsu, Label, PointCode, PointCodeKind};
use bytes::{BufMut, BytesMut};
use messages::{SnmMessage, SnmType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

/// Signalling link test message (Q.707)
const MTN_SLTM: u8 = 0x11;
/// Signalling link test acknowledgment
const MTN_SLTA: u8 = 0x21;

/// Changeover order retransmission window (ms)
const COO_RETRANSMIT: u64 = 1_800;
/// Changeback declaration retransmission interval (ms)
const CBD_RETRANSMIT: u64 = 1_000;
/// Changeback global deadline (ms)
const CBD_GLOBAL: u64 = 2_000;
/// Emergency changeover acknowledgment deferral (ms)
const ECA_GLOBAL: u64 = 200;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The SNM management user part
pub struct Management {
    name: String,
    /// Default network indicator when no network decides
    ni: u8,
    router: Mutex<Weak<Router>>,
    pending: Mutex<PendingQueue>,
    /// Last polled clock, used to stamp new pending messages
    clock: AtomicU64,
}

impl Management {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_ni(name, 2)
    }

    pub fn with_ni(name: impl Into<String>, ni: u8) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ni,
            router: Mutex::new(Weak::new()),
            pending: Mutex::new(PendingQueue::new()),
            clock: AtomicU64::new(0),
        })
    }

    fn router(&self) -> Option<Arc<Router>> {
        lock(&self.router).upgrade()
    }

    /// Number of buffered management messages awaiting acknowledgment
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    fn transmit(&self, msu: &Msu, label: &Label, tx_sls: i32) -> Option<u8> {
        self.router()?.transmit_msu(msu, label, tx_sls)
    }

    fn inhibit_link(&self, link: &Label, set: u8, clear: u8) -> bool {
        self.router()
            .map_or(false, |r| r.inhibit(link, set, clear, false))
    }

    fn recover(&self, link: &Label, sequence: u32) {
        if let Some(router) = self.router() {
            router.recover_msus(link, sequence);
        }
    }

    /// Buffer a management message for retransmission.
    ///
    /// With a non-zero interval the message is sent once right away;
    /// it is then re-sent every `interval` ms until `global` expires.
    pub fn postpone(
        &self,
        msu: Msu,
        label: Label,
        tx_sls: i32,
        interval: u64,
        global: u64,
    ) -> bool {
        if interval != 0 && self.transmit(&msu, &label, tx_sls).is_none() {
            return false;
        }
        let now = self.clock.load(Ordering::Relaxed);
        lock(&self.pending).add(PendingMsg::new(msu, label, tx_sls, interval, global, now));
        true
    }

    /// Drain expired pending messages: retransmit or finalize.
    ///
    /// Re-arming happens after the drain so a zero-interval entry is
    /// retransmitted once per tick, not forever.
    pub fn timer_tick(&self, now: u64) {
        self.clock.store(now, Ordering::Relaxed);
        let mut requeue = Vec::new();
        loop {
            let Some(mut msg) = lock(&self.pending).timeout(now) else {
                break;
            };
            if msg.expired(now) {
                self.final_timeout(&msg);
            } else {
                self.transmit(&msg.msu, &msg.label, msg.tx_sls);
                msg.rearm(now);
                requeue.push(msg);
            }
        }
        let mut pending = lock(&self.pending);
        for msg in requeue {
            pending.add(msg);
        }
    }

    /// A pending message ran out its global deadline unacknowledged:
    /// complete the procedure locally with best-effort state
    fn final_timeout(&self, msg: &PendingMsg) {
        let link = format!("{},{}", msg.label.kind.name(), msg.label);
        match msg.snm_code().and_then(SnmType::from_byte) {
            Some(SnmType::Coo | SnmType::Xco | SnmType::Eco) => {
                info!(mgmt = %self.name, link = %link, "changeover timed out");
                self.inhibit_link(&msg.label, inhibit::INACTIVE, 0);
            }
            Some(SnmType::Eca) => {
                info!(mgmt = %self.name, link = %link, "emergency changeover acknowledge");
                self.transmit(&msg.msu, &msg.label, msg.tx_sls);
            }
            Some(SnmType::Cbd) => {
                info!(mgmt = %self.name, link = %link, "changeback timed out");
                self.inhibit_link(&msg.label, 0, inhibit::INACTIVE);
            }
            _ => {
                debug!(mgmt = %self.name, link = %link, "expired control sequence");
            }
        }
    }

    fn handle_transfer(&self, msg: &SnmMessage, label: &Label, sls: i32) -> HandledMsu {
        let Some((dest, _)) = msg.destination else {
            warn!(mgmt = %self.name, msg = msg.name(), label = %label,
                "received without destination");
            return HandledMsu::Accepted;
        };
        let status = match msg.snm_type {
            SnmType::Tfp => "prohibited",
            SnmType::Tfa => "allowed",
            _ => "restricted",
        };
        info!(mgmt = %self.name, msg = msg.name(), label = %label, dest = %dest,
            "traffic is {status} to destination");
        if let Some(router) = self.router() {
            let op = match msg.snm_type {
                SnmType::Tfp => "prohibit",
                SnmType::Tfa => "allow",
                _ => "restrict",
            };
            let addr = format!(
                "{},{},{},{}",
                label.kind.name(),
                label.opc,
                label.dpc,
                sls
            );
            let ctl = ControlParams::new(op)
                .with("pointcodetype", label.kind.name())
                .with("destination", dest.to_string())
                .with("source", label.opc.to_string())
                .with("address", addr)
                .with("automatic", "true");
            router.control(&ctl);
        }
        HandledMsu::Accepted
    }

    fn handle_changeover_order(
        &self,
        msu: &Msu,
        msg: &SnmMessage,
        label: &Label,
        sls: i32,
    ) -> HandledMsu {
        let lbl = label.reply(label.sls, 0);
        if !self.inhibit_link(&lbl, inhibit::INACTIVE, 0) {
            warn!(mgmt = %self.name, msg = msg.name(), label = %label, "unexpected changeover");
            return HandledMsu::Accepted;
        }
        info!(mgmt = %self.name, link = %lbl, "changeover order");
        if let Some(seq) = msg.sequence {
            self.recover(&lbl, seq);
        }
        match self.router().and_then(|r| r.get_sequence(&lbl)) {
            Some(seq) => {
                // acknowledge with the sequence our side stopped at
                let data = if seq & 0xff00_0000 != 0 {
                    messages::build_extended(SnmType::Xca, seq & 0x00ff_ffff)
                } else {
                    let slc = msg.slc.unwrap_or(sls.max(0) as u8);
                    messages::build_slc_value(SnmType::Coa, label.kind, seq, slc)
                };
                let answer = Msu::new(msu.sio(), &lbl, &data);
                if self.transmit(&answer, &lbl, sls).is_some() {
                    HandledMsu::Accepted
                } else {
                    HandledMsu::Failure
                }
            }
            None => {
                // no sequence known yet, defer an emergency acknowledgment
                let data = messages::build_plain(SnmType::Eca);
                let answer = Msu::new(msu.sio(), &lbl, &data);
                if self.postpone(answer, lbl, sls, 0, ECA_GLOBAL) {
                    HandledMsu::Accepted
                } else {
                    HandledMsu::Failure
                }
            }
        }
    }

    fn handle_changeover_ack(&self, msg: &SnmMessage, label: &Label) -> HandledMsu {
        let pend = lock(&self.pending).take(|p| {
            p.matches(label)
                && matches!(
                    p.snm_code().and_then(SnmType::from_byte),
                    Some(SnmType::Coo | SnmType::Xco | SnmType::Eco)
                )
        });
        match pend {
            Some(pend) => {
                info!(mgmt = %self.name, link = %pend.label, "changeover acknowledged");
                self.inhibit_link(&pend.label, inhibit::INACTIVE, 0);
                if let Some(seq) = msg.sequence {
                    self.recover(&pend.label, seq);
                }
            }
            None => {
                warn!(mgmt = %self.name, msg = msg.name(), label = %label,
                    "unexpected changeover acknowledgment");
            }
        }
        HandledMsu::Accepted
    }

    fn handle_changeback(&self, msu: &Msu, label: &Label, sls: i32, code: &[u8]) -> HandledMsu {
        let lbl = label.reply(label.sls, 0);
        if !self.inhibit_link(&lbl, 0, inhibit::INACTIVE) {
            warn!(mgmt = %self.name, label = %label, "unexpected changeback declaration");
            return HandledMsu::Accepted;
        }
        info!(mgmt = %self.name, link = %lbl, "changeback declaration");
        let mut data = BytesMut::with_capacity(1 + code.len());
        data.put_u8(SnmType::Cba as u8);
        data.put_slice(code);
        let answer = Msu::new(msu.sio(), &lbl, &data);
        if self.transmit(&answer, &lbl, sls).is_some() {
            HandledMsu::Accepted
        } else {
            HandledMsu::Failure
        }
    }

    fn handle_changeback_ack(&self, msu: &Msu, label: &Label, code: &[u8]) -> HandledMsu {
        let pend = lock(&self.pending).take(|p| {
            p.msu.len() == msu.len()
                && p.snm_code().and_then(SnmType::from_byte) == Some(SnmType::Cbd)
                && p.snm_extra() == code
                && p.matches(label)
        });
        match pend {
            Some(pend) => {
                info!(mgmt = %self.name, link = %pend.label, "changeback acknowledged");
                self.inhibit_link(&pend.label, 0, inhibit::INACTIVE);
            }
            None => {
                warn!(mgmt = %self.name, label = %label, "unexpected changeback acknowledgment");
            }
        }
        HandledMsu::Accepted
    }

    fn handle_inhibit(&self, msu: &Msu, msg: &SnmMessage, label: &Label, sls: i32) -> HandledMsu {
        let lbl = label.reply(label.sls, 0);
        let Some(router) = self.router() else {
            return HandledMsu::Accepted;
        };
        let answer = match msg.snm_type {
            SnmType::Lin => {
                // refuse rather than inhibit the last active link
                if router.inhibit(&lbl, inhibit::REMOTE, 0, true) {
                    Some(SnmType::Lia)
                } else {
                    Some(SnmType::Lid)
                }
            }
            _ => {
                if router.inhibit(&lbl, 0, inhibit::REMOTE, false) {
                    Some(SnmType::Lua)
                } else {
                    None
                }
            }
        };
        match answer {
            Some(code) => {
                let data = messages::build_plain(code);
                let reply = Msu::new(msu.sio(), &lbl, &data);
                if self.transmit(&reply, &lbl, sls).is_some() {
                    HandledMsu::Accepted
                } else {
                    HandledMsu::Failure
                }
            }
            None => HandledMsu::Accepted,
        }
    }

    fn handle_upu(&self, msg: &SnmMessage, label: &Label, sls: i32) -> HandledMsu {
        info!(mgmt = %self.name,
            part = msg.part.unwrap_or(0xff),
            cause = msg.cause.unwrap_or(0xff),
            dest = %msg.destination.map(|(pc, _)| pc.to_string()).unwrap_or_default(),
            "user part unavailable");
        if let (Some(router), Some((pc, _)), Some(part), Some(cause)) =
            (self.router(), msg.destination, msg.part, msg.cause)
        {
            if part > sif::MTNS && part <= 0x0f && cause <= 0x0f {
                router.received_upu(label.kind, pc, part, cause, label, sls);
            }
        }
        HandledMsu::Accepted
    }

    /// Build and send a management message described by a control
    /// request
    pub fn control(&self, params: &ControlParams) -> bool {
        use SnmType::*;
        let Some(cmd) = SnmType::from_name(params.operation()) else {
            return false;
        };
        let Some(fields) = params.address_fields() else {
            return false;
        };
        if fields.len() < 3 {
            return false;
        }
        let Ok(kind) = fields[0].parse::<PointCodeKind>() else {
            return false;
        };
        let Ok(opc) = PointCode::parse(fields[1]) else {
            return false;
        };
        let Ok(dpc) = PointCode::parse(fields[2]) else {
            return false;
        };
        let sls: i32 = fields
            .get(3)
            .and_then(|s| s.parse().ok())
            .unwrap_or(-1);
        let spare: u8 = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        let ni = self
            .router()
            .map(|r| r.get_ni(kind, self.ni))
            .unwrap_or(self.ni);
        let tx_sio = build_sio(ni, 0, sif::SNM);
        let label = Label::new(kind, dpc, opc, sls.max(0) as u8, spare);
        let mut tx_sls = sls;
        if matches!(cmd, Coo | Coa | Cbd | Cba) {
            // answers and orders avoid the link being changed over
            tx_sls = (tx_sls + 1) & 0xff;
        }
        let tx_sls = params.get_int("linksel", tx_sls as i64) as i32;
        match cmd {
            // messages carrying a destination point code
            Tfp | Tfa | Tfr | Tfc | Rst | Rsr => {
                let dest = match params.get("destination") {
                    None => opc,
                    Some(text) => match PointCode::parse(text) {
                        Ok(pc) => pc,
                        Err(_) => return false,
                    },
                };
                let data = messages::build_dest(cmd, kind, dest, spare);
                let msu = Msu::new(tx_sio, &label, &data);
                self.transmit(&msu, &label, tx_sls).is_some()
            }
            // messages with just the heading code
            Eco | Tra | Lin | Lun | Lia | Lua | Lid | Lfu | Llt | Lrt | Rct | Css | Cns
            | Cnp => {
                let data = messages::build_plain(cmd);
                let msu = Msu::new(tx_sio, &label, &data);
                self.transmit(&msu, &label, tx_sls).is_some()
            }
            Coo | Coa => {
                if params.get_bool("emergency", false) {
                    let ecmd = if cmd == Coo { Eco } else { Eca };
                    let data = messages::build_plain(ecmd);
                    let msu = Msu::new(tx_sio, &label, &data);
                    return self.transmit(&msu, &label, tx_sls).is_some();
                }
                let seq = (params.get_int("sequence", 0) & 0x7f) as u32;
                let slc = params.get_int("slc", sls as i64) as u8;
                let data = messages::build_slc_value(cmd, kind, seq, slc);
                let msu = Msu::new(tx_sio, &label, &data);
                if cmd == Coa {
                    self.transmit(&msu, &label, tx_sls).is_some()
                } else {
                    self.postpone(msu, label, tx_sls, COO_RETRANSMIT, 0)
                }
            }
            Xco | Xca => {
                let seq = (params.get_int("sequence", 0) as u32) & 0x00ff_ffff;
                let data = messages::build_extended(cmd, seq);
                let msu = Msu::new(tx_sio, &label, &data);
                if cmd == Xca {
                    self.transmit(&msu, &label, tx_sls).is_some()
                } else {
                    self.postpone(msu, label, tx_sls, COO_RETRANSMIT, 0)
                }
            }
            Cbd | Cba => {
                let code = params.get_int("code", 0) as u32;
                let slc = params.get_int("slc", sls as i64) as u8;
                let data = messages::build_slc_value(cmd, kind, code, slc);
                let msu = Msu::new(tx_sio, &label, &data);
                if cmd == Cba {
                    self.transmit(&msu, &label, tx_sls).is_some()
                } else {
                    self.postpone(msu, label, tx_sls, CBD_RETRANSMIT, CBD_GLOBAL)
                }
            }
            other => {
                warn!(mgmt = %self.name, cmd = other.name(), "unimplemented control");
                false
            }
        }
    }
}

impl Layer4 for Management {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, router: Option<Weak<Router>>) {
        *lock(&self.router) = router.unwrap_or_default();
    }

    fn received_msu(
        &self,
        msu: &Msu,
        label: &Label,
        network: Option<&Arc<dyn Layer3>>,
        sls: i32,
    ) -> HandledMsu {
        if msu.sif() != sif::SNM {
            return HandledMsu::Rejected;
        }
        // management traffic must be addressed to us
        let mut local = network.map_or(0, |n| n.local(label.kind));
        if local == 0 {
            local = self.router().map_or(0, |r| r.local(label.kind));
        }
        if local != 0 && label.dpc.pack(label.kind) != local {
            return HandledMsu::Rejected;
        }
        let payload = msu.payload(label);
        let Some(&code) = payload.first() else {
            warn!(mgmt = %self.name, label = %label, "SNM without heading code");
            return HandledMsu::Failure;
        };
        let Some(snm_type) = SnmType::from_byte(code) else {
            warn!(mgmt = %self.name, label = %label, code, "unknown SNM heading code");
            return HandledMsu::Accepted;
        };
        let msg = SnmMessage::parse(snm_type, label.kind, &payload[1..]);
        debug!(mgmt = %self.name, msg = msg.name(), label = %label, sls, "received");
        use SnmType::*;
        match snm_type {
            Tfp | Tfr | Tfa => self.handle_transfer(&msg, label, sls),
            Tra => {
                let dest = label.opc;
                info!(mgmt = %self.name, label = %label, dest = %dest,
                    "traffic can restart to destination");
                if let Some(router) = self.router() {
                    let ctl = ControlParams::new("allowed")
                        .with("pointcodetype", label.kind.name())
                        .with("destination", dest.to_string())
                        .with("automatic", "true");
                    router.control(&ctl);
                }
                HandledMsu::Accepted
            }
            Coo | Xco | Eco => self.handle_changeover_order(msu, &msg, label, sls),
            Coa | Xca | Eca => self.handle_changeover_ack(&msg, label),
            Cbd => self.handle_changeback(msu, label, sls, &payload[1..]),
            Cba => self.handle_changeback_ack(msu, label, &payload[1..]),
            Lin | Lun | Lfu => self.handle_inhibit(msu, &msg, label, sls),
            Upu => self.handle_upu(&msg, label, sls),
            other => {
                warn!(mgmt = %self.name, msg = other.name(),
                    group = other.group().name(), label = %label, len = payload.len(),
                    "unhandled SNM message");
                HandledMsu::Accepted
            }
        }
    }

    /// React to a link state change: order changeover when a link went
    /// down, changeback when it came up again
    fn notify(&self, network: Option<&Arc<dyn Layer3>>, sls: Option<u8>) {
        let (Some(network), Some(sls)) = (network, sls) else {
            return;
        };
        let link_up = network.operational(Some(sls));
        if link_up && !network.inhibited(sls, inhibit::INACTIVE) {
            return;
        }
        let avail: Vec<u8> = (0..=255u8)
            .filter(|tx| {
                *tx != sls && !network.inhibited(*tx, 0x0f) && network.operational(Some(*tx))
            })
            .collect();
        let router = self.router();
        let oper = if link_up { "changeback" } else { "changeover" };
        for kind in PointCodeKind::ALL {
            let mut local = network.local(kind);
            if local == 0 {
                if let Some(r) = &router {
                    local = r.local(kind);
                }
            }
            if local == 0 {
                continue;
            }
            let local_pc = PointCode::from_packed(kind, local);
            info!(mgmt = %self.name, kind = kind.name(), local = %local_pc, sls,
                state = if link_up { "up" } else { "down" }, "link state changed");
            for adv in network.routes(kind) {
                if adv.priority != 0 {
                    continue;
                }
                // found an adjacent node, emit change orders toward it
                let mut seq: Option<u32> = None;
                let mut emit = true;
                if !link_up && network.inhibited(sls, inhibit::INACTIVE) {
                    // already out of traffic, only fix up sequences
                    seq = network.sequence(sls);
                    if seq.is_none() {
                        return;
                    }
                    emit = false;
                }
                let adj_pc = PointCode::from_packed(kind, adv.packed);
                let addr = format!("{},{},{},{}", kind.name(), local_pc, adj_pc, sls);
                if emit {
                    for tx in &avail {
                        let mut ctl = ControlParams::new(oper)
                            .with("address", addr.clone())
                            .with("slc", sls.to_string())
                            .with("linksel", tx.to_string())
                            .with("automatic", "true");
                        if link_up {
                            ctl.set("code", tx.to_string());
                        } else {
                            if seq.is_none() {
                                seq = network.sequence(sls);
                            }
                            match seq {
                                Some(s) => ctl.set("sequence", s.to_string()),
                                None => ctl.set("emergency", "true"),
                            };
                        }
                        debug!(mgmt = %self.name, oper, address = %addr, linksel = tx,
                            "sending link change order");
                        self.control(&ctl);
                    }
                }
                // upgrade pending emergency acks now that a sequence is
                // known
                while let Some(s) = seq {
                    let probe = Label::new(kind, local_pc, adj_pc, sls, 0);
                    let pend = lock(&self.pending).take(|p| {
                        p.matches(&probe)
                            && p.snm_code().and_then(SnmType::from_byte) == Some(SnmType::Eca)
                    });
                    let Some(pend) = pend else {
                        break;
                    };
                    let (cmd, seq_out) = if s & 0xff00_0000 != 0 {
                        ("XCA", s & 0x00ff_ffff)
                    } else {
                        ("COA", s)
                    };
                    info!(mgmt = %self.name, cmd, sequence = seq_out,
                        "turning pending emergency ack into sequenced ack");
                    let ctl = ControlParams::new(cmd)
                        .with("address", addr.clone())
                        .with("slc", sls.to_string())
                        .with("linksel", pend.tx_sls.to_string())
                        .with("sequence", seq_out.to_string())
                        .with("automatic", "true");
                    self.control(&ctl);
                }
            }
        }
    }

    fn control(&self, params: &ControlParams) -> bool {
        Management::control(self, params)
    }
}

/// The maintenance user part: answers signalling link test messages
pub struct Maintenance {
    name: String,
    router: Mutex<Weak<Router>>,
}

impl Maintenance {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into(), router: Mutex::new(Weak::new()) })
    }

    fn router(&self) -> Option<Arc<Router>> {
        lock(&self.router).upgrade()
    }
}

impl Layer4 for Maintenance {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, router: Option<Weak<Router>>) {
        *lock(&self.router) = router.unwrap_or_default();
    }

    fn received_msu(
        &self,
        msu: &Msu,
        label: &Label,
        network: Option<&Arc<dyn Layer3>>,
        sls: i32,
    ) -> HandledMsu {
        if msu.sif() != sif::MTN && msu.sif() != sif::MTNS {
            return HandledMsu::Rejected;
        }
        if let Some(net) = network {
            let local = net.local(label.kind);
            if local != 0 && label.dpc.pack(label.kind) != local {
                return HandledMsu::Rejected;
            }
        }
        let payload = msu.payload(label);
        if payload.len() < 2 {
            warn!(mtn = %self.name, label = %label, "truncated maintenance message");
            return HandledMsu::Failure;
        }
        // test pattern length lives in the high nibble
        let pattern_len = (payload[1] >> 4) as usize;
        let Some(pattern) = payload.get(2..2 + pattern_len) else {
            warn!(mtn = %self.name, label = %label, code = payload[0], len = pattern_len,
                "maintenance message with invalid pattern length");
            return HandledMsu::Failure;
        };
        if label.sls != sls.max(0) as u8 {
            warn!(mtn = %self.name, label = %label, sls, "link test received on wrong link");
        }
        match payload[0] {
            MTN_SLTM => {
                info!(mtn = %self.name, label = %label, len = pattern_len, "received SLTM");
                let lbl = label.reply(label.sls, 0);
                let mut data = BytesMut::with_capacity(2 + pattern_len);
                data.put_u8(MTN_SLTA);
                data.put_u8((pattern_len as u8) << 4);
                data.put_slice(pattern);
                let answer = Msu::new(msu.sio(), &lbl, &data);
                info!(mtn = %self.name, label = %lbl, len = pattern_len, "sending SLTA");
                let sent = self
                    .router()
                    .and_then(|r| r.transmit_msu(&answer, &lbl, lbl.sls as i32));
                if sent.is_some() {
                    HandledMsu::Accepted
                } else {
                    HandledMsu::Failure
                }
            }
            MTN_SLTA => {
                info!(mtn = %self.name, label = %label, len = pattern_len, "received SLTA");
                HandledMsu::Accepted
            }
            other => {
                warn!(mtn = %self.name, label = %label, code = other,
                    "unhandled maintenance message");
                HandledMsu::Failure
            }
        }
    }

    fn notify(&self, _network: Option<&Arc<dyn Layer3>>, _sls: Option<u8>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::route::RouteState;
    use crate::testutil::{MockNet, MockPart};
    use bytes::BytesMut;
    use std::sync::atomic::Ordering;

    fn pc(n: u8, c: u8, m: u8) -> PointCode {
        PointCode::new(n, c, m)
    }

    /// Router with one adjacent network toward 2-2-2 and the SNM
    /// entity attached
    fn setup() -> (Arc<Router>, Arc<MockNet>, Arc<Management>) {
        let config = RouterConfig { local: vec!["ITU,1-2-3".into()], ..Default::default() };
        let router = Router::new("router", &config).unwrap();
        let net = MockNet::new("net");
        net.add_route(PointCodeKind::Itu, pc(2, 2, 2), 0);
        let mgmt = Management::new("snm");
        router.attach_management(&(mgmt.clone() as Arc<dyn Layer4>));
        router.attach_network(&(net.clone() as Arc<dyn Layer3>));
        mgmt.timer_tick(0);
        (router, net, mgmt)
    }

    /// Label of a message arriving from the adjacent node
    fn from_peer(sls: u8) -> Label {
        Label::new(PointCodeKind::Itu, pc(1, 2, 3), pc(2, 2, 2), sls, 0)
    }

    fn snm_msu(label: &Label, payload: &[u8]) -> Msu {
        Msu::new(build_sio(2, 0, sif::SNM), label, payload)
    }

    #[test]
    fn changeover_order_answered_with_sequence() {
        let (_router, net, mgmt) = setup();
        *net.seq.lock().unwrap() = Some(42);
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Coo as u8, 17]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        let result = mgmt.received_msu(&msu, &label, Some(&net_l3), 3);
        assert_eq!(result, HandledMsu::Accepted);
        // the link was taken out of traffic and in-flight MSUs recovered
        assert!(net
            .inhibit_calls
            .lock()
            .unwrap()
            .contains(&(3, inhibit::INACTIVE, 0)));
        assert!(net.recovered.lock().unwrap().contains(&(3, 17)));
        // acknowledged with our own send sequence
        let (coa, lbl, tx_sls) = net.last_tx().unwrap();
        assert_eq!(coa.payload(&lbl), &[SnmType::Coa as u8, 42]);
        assert_eq!(lbl.dpc, pc(2, 2, 2));
        assert_eq!(lbl.opc, pc(1, 2, 3));
        assert_eq!(tx_sls, 3);
    }

    #[test]
    fn changeover_order_without_sequence_defers_eca() {
        let (_router, net, mgmt) = setup();
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Coo as u8, 17]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 3), HandledMsu::Accepted);
        assert_eq!(mgmt.pending_count(), 1);
        assert_eq!(net.tx_count(), 0);
        // retransmitted on every tick until the 200 ms deadline
        mgmt.timer_tick(50);
        assert_eq!(net.tx_count(), 1);
        let (eca, _, _) = net.last_tx().unwrap();
        assert_eq!(eca.payload(&from_peer(3).reply(3, 0)), &[SnmType::Eca as u8]);
        mgmt.timer_tick(250);
        assert_eq!(mgmt.pending_count(), 0);
        // the final timeout still emits the emergency acknowledgment
        assert_eq!(net.tx_count(), 2);
    }

    #[test]
    fn changeover_ack_matches_pending_order() {
        let (_router, net, mgmt) = setup();
        let ctl = ControlParams::new("changeover")
            .with("address", "ITU,1-2-3,2-2-2,3")
            .with("sequence", "5");
        assert!(mgmt.control(&ctl));
        assert_eq!(mgmt.pending_count(), 1);
        let (coo, _, tx_sls) = net.last_tx().unwrap();
        let tx_label = Label::new(PointCodeKind::Itu, pc(2, 2, 2), pc(1, 2, 3), 3, 0);
        assert_eq!(coo.payload(&tx_label), &[SnmType::Coo as u8, 5]);
        // orders avoid the changed-over link
        assert_eq!(tx_sls, 4);
        net.inhibit_calls.lock().unwrap().clear();
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Coa as u8, 9]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 3), HandledMsu::Accepted);
        assert_eq!(mgmt.pending_count(), 0);
        assert!(net
            .inhibit_calls
            .lock()
            .unwrap()
            .contains(&(3, inhibit::INACTIVE, 0)));
        assert!(net.recovered.lock().unwrap().contains(&(3, 9)));
    }

    #[test]
    fn changeover_timeout_inhibits_anyway() {
        let (_router, net, mgmt) = setup();
        let ctl = ControlParams::new("changeover")
            .with("address", "ITU,1-2-3,2-2-2,3")
            .with("sequence", "5");
        assert!(mgmt.control(&ctl));
        net.inhibit_calls.lock().unwrap().clear();
        // no global deadline: the first expiry is final
        mgmt.timer_tick(1_900);
        assert_eq!(mgmt.pending_count(), 0);
        assert!(net
            .inhibit_calls
            .lock()
            .unwrap()
            .contains(&(3, inhibit::INACTIVE, 0)));
    }

    #[test]
    fn changeback_declaration_echoed() {
        let (_router, net, mgmt) = setup();
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Cbd as u8, 0x07]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 3), HandledMsu::Accepted);
        assert!(net.inhibit_calls.lock().unwrap().contains(&(3, 0, inhibit::INACTIVE)));
        let (cba, lbl, _) = net.last_tx().unwrap();
        assert_eq!(cba.payload(&lbl), &[SnmType::Cba as u8, 0x07]);
        assert_eq!(lbl.dpc, pc(2, 2, 2));
    }

    #[test]
    fn changeback_ack_and_timeout() {
        let (_router, net, mgmt) = setup();
        let ctl = ControlParams::new("changeback")
            .with("address", "ITU,1-2-3,2-2-2,3")
            .with("code", "7");
        assert!(mgmt.control(&ctl));
        assert_eq!(net.tx_count(), 1);
        // retransmit at the 1 s interval
        mgmt.timer_tick(1_100);
        assert_eq!(net.tx_count(), 2);
        assert_eq!(mgmt.pending_count(), 1);
        // global deadline reached: cleared locally
        net.inhibit_calls.lock().unwrap().clear();
        mgmt.timer_tick(2_200);
        assert_eq!(mgmt.pending_count(), 0);
        assert!(net.inhibit_calls.lock().unwrap().contains(&(3, 0, inhibit::INACTIVE)));
    }

    #[test]
    fn changeback_ack_matches_code() {
        let (_router, net, mgmt) = setup();
        let ctl = ControlParams::new("changeback")
            .with("address", "ITU,1-2-3,2-2-2,3")
            .with("code", "7");
        assert!(mgmt.control(&ctl));
        net.inhibit_calls.lock().unwrap().clear();
        // acknowledgment with a different code is ignored
        let label = from_peer(3);
        let wrong = snm_msu(&label, &[SnmType::Cba as u8, 9]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        mgmt.received_msu(&wrong, &label, Some(&net_l3), 3);
        assert_eq!(mgmt.pending_count(), 1);
        let right = snm_msu(&label, &[SnmType::Cba as u8, 7]);
        mgmt.received_msu(&right, &label, Some(&net_l3), 3);
        assert_eq!(mgmt.pending_count(), 0);
        assert!(net.inhibit_calls.lock().unwrap().contains(&(3, 0, inhibit::INACTIVE)));
    }

    #[test]
    fn link_inhibit_accepted_and_denied() {
        let (_router, net, mgmt) = setup();
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Lin as u8]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 3), HandledMsu::Accepted);
        let (lia, lbl, _) = net.last_tx().unwrap();
        assert_eq!(lia.payload(&lbl), &[SnmType::Lia as u8]);
        assert!(net.inhibit_calls.lock().unwrap().contains(&(3, inhibit::REMOTE, 0)));
        // inhibiting the only active link is denied
        *net.active_links.lock().unwrap() = Some(1);
        net.inhibit_flags.lock().unwrap().clear();
        let label2 = from_peer(4);
        let msu2 = snm_msu(&label2, &[SnmType::Lin as u8]);
        assert_eq!(mgmt.received_msu(&msu2, &label2, Some(&net_l3), 4), HandledMsu::Accepted);
        let (lid, lbl2, _) = net.last_tx().unwrap();
        assert_eq!(lid.payload(&lbl2), &[SnmType::Lid as u8]);
    }

    #[test]
    fn link_uninhibit_acknowledged() {
        let (_router, net, mgmt) = setup();
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Lun as u8]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 3), HandledMsu::Accepted);
        assert!(net.inhibit_calls.lock().unwrap().contains(&(3, 0, inhibit::REMOTE)));
        let (lua, lbl, _) = net.last_tx().unwrap();
        assert_eq!(lua.payload(&lbl), &[SnmType::Lua as u8]);
    }

    #[test]
    fn tfp_reception_updates_route_state() {
        let (router, net, mgmt) = setup();
        net.add_route(PointCodeKind::Itu, pc(5, 5, 5), 1);
        router.detach_network(&(net.clone() as Arc<dyn Layer3>));
        router.attach_network(&(net.clone() as Arc<dyn Layer3>));
        let label = from_peer(0);
        let mut payload = BytesMut::new();
        payload.put_u8(SnmType::Tfp as u8);
        pc(5, 5, 5).store(PointCodeKind::Itu, &mut payload, 0);
        let msu = snm_msu(&label, &payload);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 0), HandledMsu::Accepted);
        let packed = pc(5, 5, 5).pack(PointCodeKind::Itu);
        assert_eq!(router.route_state(PointCodeKind::Itu, packed), Some(RouteState::Prohibited));
        assert_eq!(
            net.states.lock().unwrap().get(&(PointCodeKind::Itu, packed)),
            Some(&RouteState::Prohibited)
        );
    }

    #[test]
    fn upu_propagates_to_user_parts() {
        let (router, net, mgmt) = setup();
        let part = MockPart::new("isup", HandledMsu::Rejected);
        router.attach_user_part(&(part.clone() as Arc<dyn Layer4>));
        let label = from_peer(0);
        let mut payload = BytesMut::new();
        payload.put_u8(SnmType::Upu as u8);
        pc(9, 9, 9).store(PointCodeKind::Itu, &mut payload, 0);
        payload.put_u8((0x01 << 4) | sif::ISUP);
        let msu = snm_msu(&label, &payload);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 0), HandledMsu::Accepted);
        assert_eq!(part.upus.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn foreign_destination_rejected() {
        let (_router, net, mgmt) = setup();
        // addressed to some other node: not our management traffic
        let label = Label::new(PointCodeKind::Itu, pc(7, 7, 7), pc(2, 2, 2), 0, 0);
        let msu = snm_msu(&label, &[SnmType::Tra as u8]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        assert_eq!(mgmt.received_msu(&msu, &label, Some(&net_l3), 0), HandledMsu::Rejected);
    }

    #[test]
    fn pending_eca_upgraded_when_sequence_appears() {
        let (_router, net, mgmt) = setup();
        net.set_local(PointCodeKind::Itu, pc(1, 2, 3));
        // changeover order arrives while no sequence is known
        let label = from_peer(3);
        let msu = snm_msu(&label, &[SnmType::Coo as u8, 17]);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        mgmt.received_msu(&msu, &label, Some(&net_l3), 3);
        assert_eq!(mgmt.pending_count(), 1);
        // the sequence becomes available and the link reports down
        *net.seq.lock().unwrap() = Some(77);
        net.links_down.lock().unwrap().insert(3);
        mgmt.notify(Some(&net_l3), Some(3));
        assert_eq!(mgmt.pending_count(), 0);
        let (coa, lbl, _) = net.last_tx().unwrap();
        assert_eq!(coa.payload(&lbl), &[SnmType::Coa as u8, 77]);
        assert_eq!(lbl.dpc, pc(2, 2, 2));
    }

    #[test]
    fn link_down_emits_changeover_orders() {
        let (_router, net, mgmt) = setup();
        net.set_local(PointCodeKind::Itu, pc(1, 2, 3));
        *net.seq.lock().unwrap() = Some(11);
        *net.links_up.lock().unwrap() = Some([3u8, 4u8].into_iter().collect());
        net.links_down.lock().unwrap().insert(3);
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        mgmt.notify(Some(&net_l3), Some(3));
        // a changeover order went out toward the adjacent node with our
        // stop sequence, buffered for acknowledgment
        assert_eq!(mgmt.pending_count(), 1);
        let sent = net.transmitted.lock().unwrap();
        assert!(!sent.is_empty());
        let (coo, lbl, _) = sent.first().unwrap();
        assert_eq!(coo.payload(lbl), &[SnmType::Coo as u8, 11]);
        assert_eq!(lbl.dpc, pc(2, 2, 2));
    }

    #[test]
    fn sltm_answered_with_slta() {
        let (router, net, _mgmt) = setup();
        let mtn = Maintenance::new("mtn");
        router.attach_user_part(&(mtn.clone() as Arc<dyn Layer4>));
        let label = from_peer(2);
        let msu = Msu::new(
            build_sio(2, 0, sif::MTN),
            &label,
            &[MTN_SLTM, 0x30, 0xaa, 0xbb, 0xcc],
        );
        let net_l3 = net.clone() as Arc<dyn Layer3>;
        let result = router.received_msu(&msu, &label, Some(&net_l3), 2);
        assert_eq!(result, HandledMsu::Accepted);
        let (slta, lbl, tx_sls) = net.last_tx().unwrap();
        assert_eq!(slta.payload(&lbl), &[MTN_SLTA, 0x30, 0xaa, 0xbb, 0xcc]);
        assert_eq!(lbl.dpc, pc(2, 2, 2));
        assert_eq!(lbl.opc, pc(1, 2, 3));
        assert_eq!(tx_sls, 2);
    }
}
