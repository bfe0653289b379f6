//! Terminal server CLI client
//!
//! Sends `run_command` calls to the terminal server daemon over UDP and prints
//! the captured output. Runs a single command with `-c`, lists the registered
//! tools with `--list-tools`, or starts an interactive prompt with history.

use clap::Parser;
use rmp_serde::decode::Deserializer;
use rmp_serde::encode::Serializer;
use rustyline::Editor;
use rustyline::history::FileHistory;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const HEADER_LEN: usize = 5;
const CHUNK_HEADER_LEN: usize = 8;
const RUN_COMMAND_TOOL: &str = "run_command";
const ERROR_PREFIX: &str = "Error executing command: ";

/// Message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum MsgType {
    Request = 0x01,
    RequestAck = 0x02,
    Response = 0x03,
    ListTools = 0x04,
    ToolList = 0x05,
    ResponseChunk = 0x06,
}

/// Tool call payload
#[derive(Debug, Serialize)]
struct RequestPayload {
    tool: String,
    arguments: serde_json::Value,
}

/// Tool result payload
#[derive(Debug, Serialize, Deserialize)]
struct ResponsePayload {
    content: serde_json::Value,
    is_error: bool,
}

/// Registered tool
#[derive(Debug, Deserialize)]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    #[serde(default)]
    output_schema: Option<serde_json::Value>,
}

/// Discovery payload
#[derive(Debug, Deserialize)]
struct ToolListPayload {
    server_name: String,
    tools: Vec<ToolDefinition>,
}

/// run_command result
#[derive(Debug, Serialize, Deserialize)]
struct ExecutionResult {
    stdout: String,
    stderr: String,
    return_code: i32,
}

impl ExecutionResult {
    /// Process exit code for this result
    ///
    /// A failure to run the command exits 1, a signal-terminated command
    /// exits 128 + signal like a shell would.
    fn exit_code(&self) -> i32 {
        if self.return_code == -1 && self.stderr.starts_with(ERROR_PREFIX) {
            1
        } else if self.return_code < 0 {
            128 - self.return_code
        } else {
            self.return_code
        }
    }
}

/// Reassembles RESPONSE_CHUNK packets
#[derive(Debug, Default)]
struct ChunkAssembler {
    chunks: Vec<Option<Vec<u8>>>,
    received: usize,
}

impl ChunkAssembler {
    fn is_started(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Add one chunk payload; returns the response once complete
    fn push(&mut self, data: &[u8]) -> io::Result<Option<ResponsePayload>> {
        let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidData, msg);

        if data.len() < CHUNK_HEADER_LEN {
            return Err(invalid("Chunk too short".to_string()));
        }
        let index = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let total = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if total == 0 || index >= total {
            return Err(invalid(format!("Invalid chunk {} of {}", index, total)));
        }

        if self.chunks.is_empty() {
            self.chunks = vec![None; total];
        } else if self.chunks.len() != total {
            return Err(invalid("Chunk total changed".to_string()));
        }

        if self.chunks[index].is_none() {
            self.chunks[index] = Some(data[CHUNK_HEADER_LEN..].to_vec());
            self.received += 1;
        }

        if self.received < self.chunks.len() {
            return Ok(None);
        }

        let body: Vec<u8> = self.chunks.drain(..).flatten().flatten().collect();
        self.received = 0;
        decode_payload(&body).map(Some)
    }
}

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "terminal-cli")]
#[command(about = "Terminal server CLI client")]
struct Args {
    /// Daemon address (e.g., 127.0.0.1:9710)
    #[arg(short, long, default_value = "127.0.0.1:9710")]
    target: SocketAddr,

    /// ACK timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Give up waiting for a result after this many seconds (default: wait for the command)
    #[arg(long)]
    response_timeout: Option<u64>,

    /// Maximum retry attempts
    #[arg(short, long, default_value = "3")]
    max_retries: u32,

    /// History file path
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Run a single command and exit with its return code
    #[arg(short, long)]
    command: Option<String>,

    /// List the tools registered with the daemon
    #[arg(long, conflicts_with = "command")]
    list_tools: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

/// CLI configuration
#[derive(Debug, Clone)]
struct Config {
    target: SocketAddr,
    ack_timeout_secs: u64,
    response_timeout_secs: Option<u64>,
    max_retries: u32,
    history_file: PathBuf,
    json: bool,
}

impl Config {
    fn from_args(args: &Args) -> Self {
        let history_file = args.history_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|p| p.join(".terminal_cli_history"))
                .unwrap_or_else(|| PathBuf::from(".terminal_cli_history"))
        });

        Self {
            target: args.target,
            ack_timeout_secs: args.timeout,
            response_timeout_secs: args.response_timeout,
            max_retries: args.max_retries,
            history_file,
            json: args.json,
        }
    }
}

/// Main client state
struct Client {
    socket: UdpSocket,
    config: Config,
    seq: AtomicU32,
}

impl Client {
    async fn new(config: Config) -> io::Result<Self> {
        let bind_addr = if config.target.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        Ok(Self {
            socket,
            config,
            seq: AtomicU32::new(initial_seq()),
        })
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Call a tool and wait for its result
    async fn call_tool(&self, tool: &str, arguments: serde_json::Value) -> io::Result<ResponsePayload> {
        let seq = self.next_seq();
        let payload = RequestPayload {
            tool: tool.to_string(),
            arguments,
        };
        let packet = encode_packet(MsgType::Request, seq, Some(&payload))?;

        for _attempt in 0..self.config.max_retries {
            self.socket.send_to(&packet, self.config.target).await?;

            let mut assembler = ChunkAssembler::default();

            // A cached result may arrive in place of the ACK on resend
            let first = [MsgType::RequestAck, MsgType::Response, MsgType::ResponseChunk];
            match self.wait_for(seq, &first, Some(self.config.ack_timeout_secs)).await? {
                Some((MsgType::Response, payload)) => return decode_payload(&payload),
                Some((MsgType::ResponseChunk, payload)) => {
                    if let Some(response) = assembler.push(&payload)? {
                        return Ok(response);
                    }
                }
                Some(_) => {}
                None => {
                    eprintln!("[warning] No ACK from daemon, retrying...");
                    continue;
                }
            }

            match self.wait_for_response(seq, &mut assembler).await? {
                Some(response) => return Ok(response),
                None => {
                    eprintln!("[warning] Response incomplete, retrying...");
                    continue;
                }
            }
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "terminal server not responding",
        ))
    }

    /// Wait for a RESPONSE or the remaining RESPONSE_CHUNKs; None on timeout
    async fn wait_for_response(
        &self,
        seq: u32,
        assembler: &mut ChunkAssembler,
    ) -> io::Result<Option<ResponsePayload>> {
        let expected = [MsgType::Response, MsgType::ResponseChunk];
        loop {
            // Once chunks arrive the rest follow right behind
            let limit = if assembler.is_started() {
                Some(self.config.ack_timeout_secs)
            } else {
                self.config.response_timeout_secs
            };

            match self.wait_for(seq, &expected, limit).await? {
                Some((MsgType::Response, payload)) => return decode_payload(&payload).map(Some),
                Some((_, payload)) => {
                    if let Some(response) = assembler.push(&payload)? {
                        return Ok(Some(response));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    /// Fetch the registered tools
    async fn list_tools(&self) -> io::Result<ToolListPayload> {
        let seq = self.next_seq();
        let packet = encode_packet(MsgType::ListTools, seq, None::<&()>)?;

        for _attempt in 0..self.config.max_retries {
            self.socket.send_to(&packet, self.config.target).await?;

            if let Some((_, payload)) = self.wait_for(seq, &[MsgType::ToolList], Some(self.config.ack_timeout_secs)).await? {
                return decode_payload(&payload);
            }
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "terminal server not responding",
        ))
    }

    /// Wait for a packet of one of `expected` types carrying `expected_seq`
    ///
    /// Returns None on timeout. Packets from other senders or for other
    /// sequences are skipped.
    async fn wait_for(
        &self,
        expected_seq: u32,
        expected: &[MsgType],
        timeout_secs: Option<u64>,
    ) -> io::Result<Option<(MsgType, Vec<u8>)>> {
        let receive = async {
            let mut buf = vec![0u8; 65536];
            loop {
                let (len, addr) = self.socket.recv_from(&mut buf).await?;
                if addr != self.config.target || len < HEADER_LEN {
                    continue;
                }

                let seq = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
                if seq != expected_seq {
                    continue;
                }

                if let Some(msg_type) = expected.iter().copied().find(|t| *t as u8 == buf[0]) {
                    return Ok::<_, io::Error>((msg_type, buf[HEADER_LEN..len].to_vec()));
                }
            }
        };

        match timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), receive).await {
                Ok(result) => result.map(Some),
                Err(_) => Ok(None),
            },
            None => receive.await.map(Some),
        }
    }
}

/// Starting seq, distinct per process so a reused client port never repeats an earlier seq
fn initial_seq() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or(0);
    nanos ^ std::process::id().rotate_left(16)
}

fn encode_packet(msg_type: MsgType, seq: u32, payload: Option<&impl Serialize>) -> io::Result<Vec<u8>> {
    let mut packet = vec![msg_type as u8];
    packet.extend_from_slice(&seq.to_be_bytes());

    if let Some(p) = payload {
        let mut ser = Serializer::new(&mut packet);
        p.serialize(&mut ser)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    }

    Ok(packet)
}

fn decode_payload<T: DeserializeOwned>(data: &[u8]) -> io::Result<T> {
    let mut de = Deserializer::new(data);
    T::deserialize(&mut de).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Print a run_command response; returns the process exit code to report
fn print_response(response: ResponsePayload, json: bool) -> io::Result<i32> {
    if response.is_error {
        let message = match &response.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        eprintln!("[error] {}", message);
        return Ok(1);
    }

    let result: ExecutionResult = serde_json::from_value(response.content)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", result.stdout);
        io::stdout().flush()?;
        eprint!("{}", result.stderr);
        if result.return_code != 0 {
            eprintln!("[exit {}]", result.return_code);
        }
    }

    Ok(result.exit_code())
}

fn print_tools(tools: &ToolListPayload, json: bool) -> io::Result<()> {
    if json {
        let value = serde_json::json!({
            "server_name": tools.server_name,
            "tools": tools.tools.iter().map(|t| serde_json::json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
                "output_schema": t.output_schema,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", tools.server_name);
    for tool in &tools.tools {
        println!();
        println!("{}", tool.name);
        for line in tool.description.lines() {
            println!("    {}", line);
        }
        println!("    input: {}", tool.input_schema);
    }
    Ok(())
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args);

    let rt = tokio::runtime::Runtime::new()?;

    if args.list_tools {
        return rt.block_on(async {
            let client = Client::new(config.clone()).await?;
            let tools = client.list_tools().await?;
            print_tools(&tools, config.json)
        });
    }

    if let Some(command) = args.command {
        let code = rt.block_on(async {
            let client = Client::new(config.clone()).await?;
            let response = client
                .call_tool(RUN_COMMAND_TOOL, serde_json::json!({ "command": command }))
                .await?;
            print_response(response, config.json)
        });

        match code {
            Ok(code) => std::process::exit(code),
            Err(e) => {
                eprintln!("[error] {}", e);
                std::process::exit(1);
            }
        }
    }

    rt.block_on(async { run_interactive(config).await })
}

async fn run_interactive(config: Config) -> io::Result<()> {
    let client = Client::new(config.clone()).await?;

    let mut rl: Editor<(), FileHistory> = Editor::new().map_err(io::Error::other)?;

    if config.history_file.exists()
        && let Err(e) = rl.load_history(&config.history_file)
    {
        eprintln!("[warning] Failed to load history: {}", e);
    }

    println!("terminal-cli v{}", env!("CARGO_PKG_VERSION"));
    println!("Target: {}", client.config.target);
    println!("Type a command and press Enter. Ctrl+D to quit.");
    println!();

    loop {
        match rl.readline("$ ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(input);

                let arguments = serde_json::json!({ "command": input });
                match client.call_tool(RUN_COMMAND_TOOL, arguments).await {
                    Ok(response) => {
                        if let Err(e) = print_response(response, config.json) {
                            eprintln!("[error] {}", e);
                        }
                    }
                    Err(e) => {
                        eprintln!("[error] {}", e);
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                eprintln!("[error] Readline error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&config.history_file) {
        eprintln!("[warning] Failed to save history: {}", e);
    }

    println!("\nGoodbye!");
    Ok(())
}
