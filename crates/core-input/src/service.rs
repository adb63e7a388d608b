//! The async control-channel receiver: one tokio task owning the input
//! socket for the lifetime of the engine.
//!
//! Datagrams are decoded and translated inline (both are cheap and pure),
//! and the resulting commands handed to the render thread over the bounded
//! queue with `try_send`; the receive task must never block on a slow
//! consumer. Shutdown is cooperative via a paired `Notify` handle, the same
//! arrangement either side can outlive briefly without unsafety.

use crate::translate::translate;
use core_events::{
    COMMANDS_DROPPED_CLOSED, COMMANDS_DROPPED_FULL, COMMANDS_ENQUEUED, COMMANDS_REJECTED,
    CommandSender, OSC_DATAGRAMS, OSC_DECODE_FAILURES,
};
use core_osc::OscMessage;
use crossbeam_channel::TrySendError;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering::Relaxed;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Largest control datagram we accept; anything longer is a misdirected
/// sender and gets truncated into a decode failure.
const RECV_BUFFER_LEN: usize = 1536;

/// Caller-side handle that asks the receive task to exit.
#[derive(Clone, Debug)]
pub struct OscShutdown {
    notify: Arc<Notify>,
}

impl OscShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (OscShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            OscShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    ShutdownSignal,
    ChannelClosed,
}

impl ExitReason {
    fn as_str(self) -> &'static str {
        match self {
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
        }
    }
}

/// Bind the control socket and spawn the receive task. Returns the task
/// handle, the shutdown handle, and the bound address (useful when the
/// configuration asked for port 0).
pub async fn spawn_osc_receiver(
    bind_addr: &str,
    sender: CommandSender,
) -> io::Result<(JoinHandle<()>, OscShutdown, SocketAddr)> {
    let socket = UdpSocket::bind(bind_addr).await?;
    let local_addr = socket.local_addr()?;
    info!(target: "input.osc", %local_addr, "control channel listening");
    let (shutdown, listener) = ShutdownListener::new_pair();
    let handle = tokio::spawn(receive_loop(socket, sender, listener));
    Ok((handle, shutdown, local_addr))
}

async fn receive_loop(socket: UdpSocket, sender: CommandSender, listener: ShutdownListener) {
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let reason = loop {
        tokio::select! {
            _ = listener.wait() => break ExitReason::ShutdownSignal,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => {
                    if !handle_datagram(&buf[..len], peer, &sender) {
                        break ExitReason::ChannelClosed;
                    }
                }
                Err(error) => {
                    // Transient socket errors (e.g. ICMP-reflected resets on
                    // some platforms) must not kill the control channel.
                    warn!(target: "input.osc", %error, "recv_from failed");
                }
            },
        }
    };
    info!(target: "input.osc", reason = reason.as_str(), "control channel stopped");
}

/// Decode, translate, and enqueue one datagram. Returns `false` only when
/// the engine side of the queue is gone and the task should exit.
fn handle_datagram(bytes: &[u8], peer: SocketAddr, sender: &CommandSender) -> bool {
    OSC_DATAGRAMS.fetch_add(1, Relaxed);
    let message = match OscMessage::decode(bytes) {
        Ok(message) => message,
        Err(error) => {
            OSC_DECODE_FAILURES.fetch_add(1, Relaxed);
            warn!(target: "input.osc", %peer, %error, len = bytes.len(), "undecodable datagram");
            return true;
        }
    };
    let command = match translate(&message) {
        Ok(command) => command,
        Err(error) => {
            COMMANDS_REJECTED.fetch_add(1, Relaxed);
            warn!(target: "input.osc", %peer, %error, "rejected control message");
            return true;
        }
    };
    debug!(target: "input.osc", %peer, ?command, "command received");
    match sender.try_send(command) {
        Ok(()) => {
            COMMANDS_ENQUEUED.fetch_add(1, Relaxed);
            true
        }
        Err(TrySendError::Full(command)) => {
            COMMANDS_DROPPED_FULL.fetch_add(1, Relaxed);
            warn!(target: "input.osc", ?command, "command queue full, dropping");
            true
        }
        Err(TrySendError::Disconnected(_)) => {
            COMMANDS_DROPPED_CLOSED.fetch_add(1, Relaxed);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{EngineCommand, command_channel};
    use core_osc::OscArg;
    use std::time::Duration;

    fn encode(address: &str, args: Vec<OscArg>) -> Vec<u8> {
        OscMessage::new(address, args).encode()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn datagrams_become_commands() {
        let (tx, rx) = command_channel();
        let (handle, shutdown, addr) = spawn_osc_receiver("127.0.0.1:0", tx)
            .await
            .expect("bind loopback");

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .send_to(&encode("/change_scene", vec![OscArg::Int(1)]), addr)
            .unwrap();
        client.send_to(&encode("/pause", vec![]), addr).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, EngineCommand::CacheScene(1));
        assert_eq!(second, EngineCommand::Pause);

        shutdown.signal();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task exits on signal")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bad_datagrams_are_skipped_not_fatal() {
        let (tx, rx) = command_channel();
        let (handle, shutdown, addr) = spawn_osc_receiver("127.0.0.1:0", tx)
            .await
            .expect("bind loopback");

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"not osc at all", addr).unwrap();
        client
            .send_to(&encode("/no_such_address", vec![]), addr)
            .unwrap();
        client.send_to(&encode("/resume", vec![]), addr).unwrap();

        // Only the valid message surfaces; the two bad ones are warned away.
        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, EngineCommand::Resume);
        assert!(rx.try_recv().is_err());

        shutdown.signal();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task exits on signal")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn receiver_exits_when_queue_closes() {
        let (tx, rx) = command_channel();
        let (handle, _shutdown, addr) = spawn_osc_receiver("127.0.0.1:0", tx)
            .await
            .expect("bind loopback");
        drop(rx);

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(&encode("/pause", vec![]), addr).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("task observes closed queue")
            .unwrap();
    }
}
