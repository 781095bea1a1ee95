//! Per-datagram dispatch (§4.5): the handshake state machine and the
//! voice-path pipeline. One call per decoded inbound message; the listener
//! recv loop (`listener.rs`) owns framing and socket I/O, this module owns
//! the state machine and routing decisions.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use nexus_core::errors::NexusError;
use nexus_core::ids::{PeerId, StreamId, SystemName};
use nexus_core::peer::{HandshakeState, Peer, PeerConfig};
use nexus_core::router::{self, Target};
use nexus_core::subscription::parse_options;
use nexus_proto::{Inbound, Outbound, RptAck, Rptc, Rptcl, Rptk, Rptl, RptPing, Dmrd, MstNak, MstPong};

use crate::state::{ListenerState, ServerState};

pub async fn handle_datagram(state: &Arc<ServerState>, listener: &ListenerState, addr: SocketAddr, buf: &[u8]) {
    let inbound = match Inbound::decode(buf) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(%addr, error = %NexusError::Parse(e), "dropping malformed datagram");
            return;
        }
    };

    match inbound {
        Inbound::Rptl(rptl) => handle_rptl(state, listener, addr, rptl).await,
        Inbound::Rptk(rptk) => handle_rptk(state, listener, addr, rptk).await,
        Inbound::Rptc(rptc) => handle_rptc(state, listener, addr, rptc).await,
        Inbound::RptPing(ping) => handle_ping(state, listener, addr, ping).await,
        Inbound::Rptcl(rptcl) => handle_rptcl(state, listener, rptcl).await,
        Inbound::Dmrd(dmrd) => handle_dmrd(state, listener, addr, dmrd).await,
    }
}

async fn reply(listener: &ListenerState, addr: SocketAddr, out: Outbound) {
    if let Err(e) = listener.socket.send_to(&out.encode(), addr).await {
        warn!(system = %listener.name, %addr, error = %e, "socket send failed");
    }
}

async fn handle_rptl(state: &Arc<ServerState>, listener: &ListenerState, addr: SocketAddr, rptl: Rptl) {
    let peer_id = PeerId(rptl.peer_id);
    if !listener.acl.registration.evaluate(rptl.peer_id) {
        state.acl_metrics.acl_reject("reg_acl");
        reply(listener, addr, Outbound::MstNak(MstNak { peer_id: rptl.peer_id })).await;
        return;
    }

    let nonce: u32 = rand::random();
    let now = Utc::now();
    state.registry.insert_on_rptl(Peer::new_on_rptl(peer_id, addr, nonce, now));
    state.peer_system.write().insert(peer_id, listener.name.clone());

    reply(listener, addr, Outbound::RptAck(RptAck { context: nonce })).await;
}

async fn handle_rptk(state: &Arc<ServerState>, listener: &ListenerState, addr: SocketAddr, rptk: Rptk) {
    let peer_id = PeerId(rptk.peer_id);
    let nonce = state.registry.with_peer(peer_id, |p| p.nonce).flatten();

    let Some(nonce) = nonce else {
        state.peer_metrics.auth_failure();
        reply(listener, addr, Outbound::MstNak(MstNak { peer_id: rptk.peer_id })).await;
        return;
    };

    let mut hasher = Sha256::new();
    hasher.update(nonce.to_be_bytes());
    hasher.update(listener.passphrase.as_bytes());
    let expected: [u8; 32] = hasher.finalize().into();

    if expected == rptk.digest {
        state.registry.with_peer_mut(peer_id, |p| p.mark_authenticated());
        reply(listener, addr, Outbound::RptAck(RptAck { context: rptk.peer_id })).await;
    } else {
        state.peer_metrics.auth_failure();
        state.registry.remove(peer_id);
        state.forget_peer(peer_id);
        reply(listener, addr, Outbound::MstNak(MstNak { peer_id: rptk.peer_id })).await;
    }
}

async fn handle_rptc(state: &Arc<ServerState>, listener: &ListenerState, addr: SocketAddr, rptc: Rptc) {
    let peer_id = PeerId(rptc.peer_id);

    let current_state = state.registry.with_peer(peer_id, |p| p.state);
    if current_state != Some(HandshakeState::Authenticated) {
        // RPTC out of sequence (never authenticated, or already connected
        // and retransmitting) is ignored; the handshake graph only advances.
        return;
    }

    let config = PeerConfig {
        callsign: rptc.callsign.clone(),
        rx_freq: rptc.rx_freq,
        tx_freq: rptc.tx_freq,
        tx_power: rptc.tx_power,
        color_code: rptc.color_code,
        latitude: rptc.latitude,
        longitude: rptc.longitude,
        height: rptc.height,
        location: rptc.location,
        description: rptc.description.clone(),
        url: rptc.url,
        software_id: rptc.software_id,
        package_id: rptc.package_id,
    };
    let opts = parse_options(&format!("{};{}", rptc.description, rptc.tail));

    let connected = state.registry.with_peer_mut(peer_id, |p| {
        p.mark_connected(config);
        p.subscriptions.apply_options(&opts);
    });
    if connected.is_none() {
        // RPTC for a peer_id that never did RPTL/RPTK; nothing to commit.
        return;
    }

    state.hooks.on_peer_connected(peer_id, &rptc.callsign, addr);
    state.peer_metrics.peer_connected();
    let _ = state
        .publisher
        .publish("peer_connected", serde_json::json!({"id": peer_id.0, "callsign": rptc.callsign}))
        .await;

    info!(system = %listener.name, peer = %peer_id, callsign = %rptc.callsign, "peer connected");
    reply(listener, addr, Outbound::RptAck(RptAck { context: rptc.peer_id })).await;
}

async fn handle_ping(state: &Arc<ServerState>, listener: &ListenerState, addr: SocketAddr, ping: RptPing) {
    let peer_id = PeerId(ping.peer_id);
    let now = Utc::now();
    state.registry.with_peer_mut(peer_id, |p| p.touch(now));
    reply(listener, addr, Outbound::MstPong(MstPong { peer_id: ping.peer_id })).await;
}

async fn handle_rptcl(state: &Arc<ServerState>, listener: &ListenerState, rptcl: Rptcl) {
    let peer_id = PeerId(rptcl.peer_id);
    // A close from an unknown peer is silently dropped (§9 open question).
    if state.registry.remove(peer_id).is_none() {
        return;
    }
    state.forget_peer(peer_id);
    state.hooks.on_peer_disconnected(peer_id);
    state.peer_metrics.peer_disconnected();
    let _ = state.publisher.publish("peer_disconnected", serde_json::json!({"id": peer_id.0})).await;
    info!(system = %listener.name, peer = %peer_id, "peer disconnected");
}

async fn handle_dmrd(state: &Arc<ServerState>, listener: &ListenerState, addr: SocketAddr, dmrd: Dmrd) {
    let repeater_id = PeerId(dmrd.repeater_id);

    let recorded_addr = state.registry.with_peer(repeater_id, |p| (p.address, p.state));
    let Some((recorded_addr, peer_state)) = recorded_addr else {
        debug!(system = %listener.name, %addr, repeater_id = dmrd.repeater_id, "DMRD from unregistered repeater id");
        return;
    };
    if recorded_addr != addr {
        warn!(system = %listener.name, %addr, repeater_id = dmrd.repeater_id, "source address mismatch, dropping (possible spoof)");
        return;
    }
    if peer_state != HandshakeState::Connected {
        return;
    }

    if !listener.acl.subscriber.evaluate(dmrd.source_id) {
        state.acl_metrics.acl_reject("sub_acl");
        return;
    }
    let tg_acl_name: &'static str = match dmrd.timeslot {
        nexus_proto::Timeslot::One => "tg1_acl",
        nexus_proto::Timeslot::Two => "tg2_acl",
    };
    if !listener.acl.tg_acl(dmrd.timeslot).evaluate(dmrd.destination_id) {
        state.acl_metrics.acl_reject(tg_acl_name);
        return;
    }

    let now = Utc::now();
    let byte_len = dmrd.payload.len() as u64 + 20;
    state.registry.with_peer_mut(repeater_id, |p| {
        p.touch(now);
        p.record_packet(byte_len);
        p.subscriptions.add_dynamic(dmrd.destination_id, dmrd.timeslot, now);
    });

    let covered_by_static = {
        let mut rule_sets = state.rule_sets.write();
        let mut timers = state.bridge_timers.lock();
        for rule_set in rule_sets.iter_mut() {
            rule_set.process_activation(dmrd.destination_id);
            for key in rule_set.process_deactivation(dmrd.destination_id) {
                timers.cancel(&key);
            }
        }
        // Refresh every active, timeout-bearing rule this packet matches
        // (§4.3): covers both the activation above and ongoing chatter on
        // an already-active rule keeping its timer alive.
        for rule_set in rule_sets.iter() {
            for rule in rule_set.rules() {
                if rule.active
                    && rule.tgid == dmrd.destination_id
                    && rule.timeslot == dmrd.timeslot
                    && rule.timeout_minutes > 0
                {
                    timers.refresh((rule.system.clone(), rule.tgid, rule.timeslot), rule.timeout_minutes, now);
                }
            }
        }
        rule_sets.iter().any(|rs| rs.covers(dmrd.destination_id, dmrd.timeslot))
    };

    // A dynamic bridge only exists for a (tgid, timeslot) not already
    // covered by an active static rule (§3); otherwise the static rule's
    // own fan-out is the route and no dynamic-bridge bookkeeping is needed.
    if !covered_by_static {
        let mut bridges = state.dynamic_bridges.lock();
        router::record_dynamic_activity(&mut bridges, &dmrd, repeater_id, now);
    }

    let source_name = if listener.repeat { listener.name.self_loop() } else { listener.name.clone() };

    let outcome = {
        let mut tracker = state.tracker.lock();
        let rule_sets = state.rule_sets.read();
        router::route(&dmrd, &source_name, &mut tracker, &rule_sets, &state.registry, now)
    };

    if outcome.targets.is_empty() {
        state.router_metrics.stream_dedup_drop();
    } else {
        state.router_metrics.packet_routed(outcome.targets.len());
    }

    let wire = dmrd.encode();
    for target in &outcome.targets {
        match target {
            Target::Peer(peer_id) => send_to_peer(state, *peer_id, &wire).await,
            Target::System(name) => send_to_system(state, name, &wire).await,
        }
    }

    if outcome.should_end_stream {
        state.tracker.lock().end(StreamId(dmrd.stream_id));
    }

    record_transmission(state, &dmrd, now).await;
}

async fn send_to_peer(state: &Arc<ServerState>, peer_id: PeerId, wire: &[u8]) {
    let Some(addr) = state.registry.with_peer(peer_id, |p| p.address) else {
        return;
    };
    let Some(system) = state.peer_system.read().get(&peer_id).cloned() else {
        return;
    };
    let Some(socket) = state.socket_for_system(&system) else {
        return;
    };
    if let Err(e) = socket.send_to(wire, addr).await {
        warn!(peer = %peer_id, error = %e, "fan-out send failed");
    }
}

async fn send_to_system(state: &Arc<ServerState>, system: &SystemName, wire: &[u8]) {
    let Some(socket) = state.socket_for_system(system) else {
        return;
    };
    for (peer_id, addr) in state.peers_of_system(system) {
        if let Err(e) = socket.send_to(wire, addr).await {
            warn!(peer = %peer_id, system = %system, error = %e, "fan-out send failed");
        }
    }
}

async fn record_transmission(state: &Arc<ServerState>, dmrd: &Dmrd, now: chrono::DateTime<Utc>) {
    let stream_id = StreamId(dmrd.stream_id);
    state.transmission_logger.lock().record_packet(
        stream_id,
        dmrd.source_id,
        dmrd.destination_id,
        dmrd.timeslot,
        dmrd.repeater_id,
        now,
    );

    if !dmrd.is_voice_terminator() {
        return;
    }

    let finished = state.transmission_logger.lock().finish_stream(stream_id);
    match finished {
        Some(tx) => {
            state.transmission_metrics.transmission_logged(tx.duration_seconds);
            if let Err(e) = state.transmission_store.create(&tx).await {
                state.transmission_metrics.persistence_error();
                warn!(error = %e, "failed to persist transmission record");
            }
        }
        None => state.transmission_metrics.transmission_discarded_too_short(),
    }
}
