use crate::comm::config::CommConfig;
use crate::comm::error::{CommError, CommInitError};
use crate::comm::protocol::{
    HEADER_LEN, decode_header, decode_request_payload, encode_request_ack,
    encode_response_packets, encode_tool_list,
};
use crate::comm::types::{MsgType, ResponsePayload, ToolCall, ToolListPayload, ToolReply};
use crate::executor::ToolDefinition;
use std::collections::HashMap;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Largest datagram a UDP socket accepts
const RECV_BUFFER_BYTES: usize = 65536;

/// Sequence deduplication entry
#[derive(Debug)]
struct DedupEntry {
    /// When this entry was created
    instant: Instant,
    /// Hash of the request payload, so a reused (client, seq) with another request is not a duplicate
    fingerprint: u64,
    /// Cached response packets to resend if duplicate
    cached_response: Option<Vec<Vec<u8>>>,
}

type DedupTable = Arc<Mutex<HashMap<SocketAddr, HashMap<u32, DedupEntry>>>>;

/// What to do with a request after consulting the dedup table
enum Dedup {
    /// First time this seq is seen
    New,
    /// Seen before and answered
    Answered(Vec<Vec<u8>>),
    /// Seen before, still running
    InFlight,
}

/// Comm server - receives tool calls and discovery requests over UDP
pub struct Comm {
    socket: Arc<UdpSocket>,
    config: CommConfig,
    tool_list: ToolListPayload,
    /// Channel sender to forward ToolCalls to the daemon loop
    loop_sender: mpsc::Sender<ToolCall>,
    /// Sequence deduplication table per client
    dedup: DedupTable,
}

impl Comm {
    /// Get local socket address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Create a new Comm instance and bind UDP socket
    /// Returns the comm instance and receiver for tool calls
    pub async fn new(
        config: CommConfig,
        tools: Vec<ToolDefinition>,
    ) -> StdResult<(Comm, mpsc::Receiver<ToolCall>), CommInitError> {
        let socket = UdpSocket::bind(config.bind_addr()?)
            .await
            .map_err(|e| CommInitError::BindFailed(e.to_string()))?;

        if let Ok(addr) = socket.local_addr() {
            info!(addr = %addr, server_name = %config.server_name, "Comm listening");
        }

        let (tx, rx) = mpsc::channel(1024);

        let tool_list = ToolListPayload {
            server_name: config.server_name.clone(),
            tools,
        };

        Ok((
            Self {
                socket: Arc::new(socket),
                config,
                tool_list,
                loop_sender: tx,
                dedup: Arc::new(Mutex::new(HashMap::new())),
            },
            rx,
        ))
    }

    /// Run the Comm server
    pub async fn run(self) -> StdResult<(), CommError> {
        let mut buf = vec![0u8; RECV_BUFFER_BYTES];
        let mut cleanup_interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, addr)) => {
                            let packet = &buf[..len];
                            if let Err(e) = self.handle_packet(packet, addr).await {
                                warn!(client = %addr, error = %e, "Failed to handle packet");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Recv error");
                            return Err(CommError::RecvError(e.to_string()));
                        }
                    }
                }
                _ = cleanup_interval.tick() => {
                    self.cleanup_dedup().await;
                }
            }
        }
    }

    /// Handle incoming packet
    async fn handle_packet(
        &self,
        packet: &[u8],
        client_addr: SocketAddr,
    ) -> StdResult<(), CommError> {
        if packet.len() < HEADER_LEN {
            warn!(client = %client_addr, len = packet.len(), "Truncated packet");
            return Err(CommError::DecodeError("Packet too short".to_string()));
        }

        let payload_len = packet.len() - HEADER_LEN;
        if payload_len > self.config.max_payload_bytes {
            warn!(client = %client_addr, payload_len, "Payload too large");
            return Err(CommError::PayloadTooLarge(payload_len));
        }

        let (msg_type, seq) = decode_header(packet)?;
        let payload = &packet[HEADER_LEN..];

        debug!(msg_type = msg_type as u8, client = %client_addr, seq, "Received packet");

        match msg_type {
            MsgType::Request => self.handle_request(payload, seq, client_addr).await,
            MsgType::ListTools => self.handle_list_tools(seq, client_addr).await,
            _ => {
                warn!(
                    msg_type = msg_type as u8,
                    client = %client_addr,
                    "Unexpected message type"
                );
                Ok(())
            }
        }
    }

    /// Answer a discovery request
    async fn handle_list_tools(&self, seq: u32, client_addr: SocketAddr) -> StdResult<(), CommError> {
        let packet = encode_tool_list(seq, &self.tool_list)?;
        send(&self.socket, &packet, client_addr).await?;
        debug!(seq, client = %client_addr, tools = self.tool_list.tools.len(), "Sent TOOL_LIST");
        Ok(())
    }

    /// Handle incoming REQUEST
    async fn handle_request(
        &self,
        payload_bytes: &[u8],
        seq: u32,
        client_addr: SocketAddr,
    ) -> StdResult<(), CommError> {
        let fingerprint = fingerprint(payload_bytes);

        match self.check_dedup(seq, fingerprint, client_addr).await {
            Dedup::Answered(cached) => {
                info!(seq, client = %client_addr, "Duplicate request, resending cached response");
                for packet in &cached {
                    send(&self.socket, packet, client_addr).await?;
                }
                return Ok(());
            }
            Dedup::InFlight => {
                debug!(seq, client = %client_addr, "Duplicate request still running, sending ACK");
                let ack = encode_request_ack(seq)?;
                return send(&self.socket, &ack, client_addr).await;
            }
            Dedup::New => {}
        }

        let request_payload = match decode_request_payload(payload_bytes) {
            Ok(p) => p,
            Err(e) => {
                // Undecodable requests are never forwarded; forget the seq so a fixed resend is accepted
                self.forget(seq, client_addr).await;
                return Err(e);
            }
        };

        info!(
            seq,
            client = %client_addr,
            tool = %request_payload.tool,
            "New request"
        );

        let ack = encode_request_ack(seq)?;
        send(&self.socket, &ack, client_addr).await?;
        debug!(seq, client = %client_addr, "Sent REQUEST_ACK");

        let (reply_tx, reply_rx) = oneshot::channel::<ToolReply>();

        let call = ToolCall {
            tool: request_payload.tool,
            arguments: request_payload.arguments,
            reply: reply_tx,
            source_addr: client_addr,
        };

        let responder = Responder {
            socket: Arc::clone(&self.socket),
            dedup: Arc::clone(&self.dedup),
            max_payload_bytes: self.config.max_payload_bytes,
            seq,
            fingerprint,
            client_addr,
        };

        if let Err(e) = self.loop_sender.send(call).await {
            error!(error = %e, "Failed to send request to daemon loop");
            responder
                .respond(ToolReply::error("Internal server error"))
                .await?;
            return Err(CommError::ChannelClosed);
        }

        let response_timeout = self.config.response_timeout_secs.map(Duration::from_secs);
        tokio::spawn(async move {
            let reply = await_reply(reply_rx, response_timeout, seq).await;
            if let Err(e) = responder.respond(reply).await {
                warn!(seq, client = %client_addr, error = %e, "Failed to send response");
            }
        });

        Ok(())
    }

    /// Look up `seq`, registering it if new or if it now carries a different request
    async fn check_dedup(&self, seq: u32, fingerprint: u64, client_addr: SocketAddr) -> Dedup {
        let mut dedup = self.dedup.lock().await;
        let client_entries = dedup.entry(client_addr).or_default();

        if !client_entries.contains_key(&seq) && client_entries.len() >= self.config.dedup_capacity {
            let oldest_seq = client_entries
                .iter()
                .min_by_key(|(_, e)| e.instant)
                .map(|(seq, _)| *seq);
            if let Some(seq_to_remove) = oldest_seq {
                client_entries.remove(&seq_to_remove);
                debug!(seq = seq_to_remove, "Dedup table at capacity, removed oldest entry");
            }
        }

        let fresh = DedupEntry {
            instant: Instant::now(),
            fingerprint,
            cached_response: None,
        };

        match client_entries.entry(seq) {
            Entry::Occupied(mut entry) => {
                if entry.get().fingerprint != fingerprint {
                    debug!(seq, client = %client_addr, "Seq reused with a different request");
                    entry.insert(fresh);
                    return Dedup::New;
                }
                match &entry.get().cached_response {
                    Some(cached) => Dedup::Answered(cached.clone()),
                    None => Dedup::InFlight,
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                Dedup::New
            }
        }
    }

    async fn forget(&self, seq: u32, client_addr: SocketAddr) {
        let mut dedup = self.dedup.lock().await;
        if let Some(client_entries) = dedup.get_mut(&client_addr) {
            client_entries.remove(&seq);
        }
    }

    /// Cleanup expired entries from deduplication table
    async fn cleanup_dedup(&self) {
        let mut dedup = self.dedup.lock().await;
        let ttl = Duration::from_secs(self.config.dedup_ttl_secs);
        let now = Instant::now();

        for entries in dedup.values_mut() {
            // In-flight entries stay until answered
            entries.retain(|_seq, entry| {
                entry.cached_response.is_none() || now.duration_since(entry.instant) < ttl
            });
        }

        dedup.retain(|_addr, entries| !entries.is_empty());

        debug!(clients = dedup.len(), "Dedup table cleaned");
    }
}

/// Wait for the daemon loop's reply to one call
async fn await_reply(
    reply_rx: oneshot::Receiver<ToolReply>,
    response_timeout: Option<Duration>,
    seq: u32,
) -> ToolReply {
    let received = match response_timeout {
        Some(limit) => match timeout(limit, reply_rx).await {
            Ok(received) => received,
            Err(_) => {
                warn!(seq, timeout_secs = limit.as_secs(), "Timeout waiting for response");
                return ToolReply::error("Response timeout");
            }
        },
        None => reply_rx.await,
    };

    match received {
        Ok(reply) => reply,
        Err(_) => {
            warn!(seq, "Channel closed without response");
            ToolReply::error("No response from handler")
        }
    }
}

/// Sends the response for one request and caches it for deduplication
struct Responder {
    socket: Arc<UdpSocket>,
    dedup: DedupTable,
    max_payload_bytes: usize,
    seq: u32,
    fingerprint: u64,
    client_addr: SocketAddr,
}

impl Responder {
    async fn respond(self, reply: ToolReply) -> StdResult<(), CommError> {
        let packets =
            encode_response_packets(self.seq, &ResponsePayload::from(reply), self.max_payload_bytes)?;

        if packets.len() > 1 {
            debug!(seq = self.seq, chunks = packets.len(), "Response split into chunks");
        }

        for packet in &packets {
            send(&self.socket, packet, self.client_addr).await?;
        }
        debug!(seq = self.seq, client = %self.client_addr, "Sent RESPONSE");

        let mut dedup = self.dedup.lock().await;
        if let Some(client_entries) = dedup.get_mut(&self.client_addr) {
            // The seq may have been taken over by a newer request in the meantime
            if let Some(entry) = client_entries.get_mut(&self.seq)
                && entry.fingerprint == self.fingerprint
            {
                entry.instant = Instant::now();
                entry.cached_response = Some(packets);
            }
        }

        Ok(())
    }
}

fn fingerprint(payload: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

async fn send(socket: &UdpSocket, packet: &[u8], addr: SocketAddr) -> StdResult<(), CommError> {
    socket
        .send_to(packet, addr)
        .await
        .map(|_| ())
        .map_err(|e| CommError::SendError(e.to_string()))
}
