//! One UDP receive loop per configured system (§5 task 1). Binds a single
//! socket, decodes nothing itself — framing and state-machine logic live in
//! `dispatch` — and exits on cancellation once the socket read is unblocked.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::handle_datagram;
use crate::state::{ListenerState, ServerState};

const MAX_DATAGRAM_LEN: usize = 4096;

pub async fn run(state: Arc<ServerState>, listener: Arc<ListenerState>, token: CancellationToken) {
    info!(system = %listener.name, addr = %listener.socket.local_addr().map(|a| a.to_string()).unwrap_or_default(), "listener started");

    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(system = %listener.name, "listener shutting down");
                break;
            }
            result = listener.socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, addr)) => {
                        handle_datagram(&state, &listener, addr, &buf[..len]).await;
                    }
                    Err(e) => {
                        warn!(system = %listener.name, error = %e, "socket recv error");
                    }
                }
            }
        }
    }
}
