//! FrameNet - Typed envelopes over blocking sockets
//!
//! Command line tool for sending and receiving notes over framenet sockets.

use std::path::PathBuf;
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use framenet::config::{self, Config};
use framenet::protocol::{self, Note};
use framenet::{Address, ReceivedDatagram, Socket, SocketKind, SocketOptions, StreamMiss};

/// FrameNet - Typed envelopes over TCP and UDP
#[derive(Parser)]
#[command(name = "framenet")]
#[command(author = "FrameNet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Send and receive typed envelopes over TCP and UDP", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Transport selector for the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stream,
    Datagram,
}

impl From<Transport> for SocketKind {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Stream => SocketKind::Stream,
            Transport::Datagram => SocketKind::Datagram,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Receive notes and print them as JSON lines
    Listen {
        /// Socket kind to listen on
        #[arg(short, long, value_enum, default_value_t = Transport::Datagram)]
        transport: Transport,

        /// Port to bind (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Literal IPv4 address to bind (defaults to the configured address)
        #[arg(long)]
        ip: Option<String>,
    },

    /// Send one note
    Send {
        /// Destination as ip:port
        #[arg(long)]
        to: Address,

        /// Socket kind to send with
        #[arg(short, long, value_enum, default_value_t = Transport::Datagram)]
        transport: Transport,

        /// Note text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Listen {
            transport,
            port,
            ip,
        } => {
            let mut bind = config.network.bind_address();
            if port.is_some() || ip.is_some() {
                bind = Address::new(
                    ip.unwrap_or_else(|| bind.ip().to_string()),
                    port.unwrap_or(bind.port()),
                );
            }
            run_listener(&config, transport.into(), bind)?;
        }
        Commands::Send {
            to,
            transport,
            text,
        } => {
            let note = Note::new(config.general.name.clone(), text.join(" "));
            send_note(&config, transport.into(), &to, &note)?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Bind a socket and print every note that arrives
fn run_listener(config: &Config, kind: SocketKind, bind: Address) -> anyhow::Result<()> {
    let options = SocketOptions::from(&config.network);
    let socket = options.open(kind)?;
    socket.bind(bind.port(), bind.ip())?;

    match kind {
        SocketKind::Datagram => {
            tracing::info!("Listening for datagrams on {}", socket.local_address());
            loop {
                match socket.receive_any::<Note>() {
                    ReceivedDatagram::Message(datagram) => {
                        print_note(&datagram.from, &datagram.payload)?;
                    }
                    ReceivedDatagram::Nothing if !socket.is_valid() => {
                        anyhow::bail!("Datagram socket {} failed", socket.id());
                    }
                    ReceivedDatagram::Nothing => {}
                }
            }
        }
        SocketKind::Stream => {
            socket.listen()?;
            tracing::info!("Listening for streams on {}", socket.local_address());
            loop {
                let connection = socket.accept();
                if !socket.is_valid() {
                    anyhow::bail!("Listening socket {} failed", socket.id());
                }
                if !connection.is_valid() {
                    continue;
                }

                thread::spawn(move || serve_stream(connection));
            }
        }
    }
}

/// Read envelopes from one connection until it closes
fn serve_stream(connection: Socket) {
    let peer = connection.peer_address();
    tracing::info!("Client connected: {} ({})", peer, connection.id());

    let reason = loop {
        let received = connection.receive();
        match received.miss() {
            None => match received.decode::<Note>() {
                Some(note) => {
                    if let Err(err) = print_note(&peer, &note) {
                        tracing::error!("Failed to print note: {}", err);
                    }
                }
                None => tracing::debug!("Ignoring envelope that is not a note from {}", peer),
            },
            Some(StreamMiss::Pending) => {}
            Some(StreamMiss::Closed) => break "closed by peer",
            Some(StreamMiss::Malformed { declared }) => {
                tracing::warn!("{} announced a {} byte envelope", peer, declared);
                if let Err(err) = connection.shutdown() {
                    tracing::debug!("Failed to shut down {}: {}", peer, err);
                }
                break "malformed envelope";
            }
            Some(StreamMiss::Fault) => break "socket fault",
        }
    };

    tracing::info!("Client disconnected: {} - {}", peer, reason);
}

fn send_note(config: &Config, kind: SocketKind, to: &Address, note: &Note) -> anyhow::Result<()> {
    let options = SocketOptions::from(&config.network);
    let socket = options.open(kind)?;

    match kind {
        SocketKind::Datagram => {
            socket.send_to(to, note)?;
        }
        SocketKind::Stream => {
            socket.connect(to)?;
            socket.send_payload(note)?;
            socket.shutdown()?;
        }
    }

    tracing::info!("Sent note to {} ({} characters)", to, note.text.chars().count());
    Ok(())
}

fn print_note(from: &Address, note: &Note) -> anyhow::Result<()> {
    println!("{} {}", from, serde_json::to_string(note)?);
    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    println!("FrameNet Protocol Information");
    println!("=============================\n");

    println!("Header size: {} bytes", protocol::HEADER_SIZE);
    println!("Max envelope: {} bytes", protocol::MAX_ENVELOPE_SIZE);
    println!("Max datagram: {} bytes", protocol::MAX_DATAGRAM_SIZE);
    println!("Default port: {}", protocol::DEFAULT_PORT);
    println!("Note type tag: {:#018x}", protocol::type_tag::<Note>());
}
