//! BLE messaging tool for Gizwits devices
//!
//! Scans for Gizwits devices, sends text in MTU-sized packets and prints
//! whatever the device notifies back.

use clap::{Parser, Subcommand};
use gizwits_ble_controller::{
    ChannelListener, ControllerError, LinkConfig, LinkEvent, Session, ble,
};
use gizwits_link::LinkError;
use log::warn;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "gizwits-ble")]
#[command(about = "BLE messaging tool for Gizwits devices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for Gizwits devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Send a message to a device
    Send {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Text to send
        #[arg(short, long, conflicts_with = "file")]
        message: Option<String>,
        /// Send the contents of a file instead
        #[arg(short, long)]
        file: Option<String>,
        /// Largest packet to write (clamped to 1..=512, and to MTU - 3 with --mtu)
        #[arg(long)]
        packet_size: Option<usize>,
        /// ATT MTU negotiated with the device; sizes packets to MTU - 3
        #[arg(long)]
        mtu: Option<u16>,
        /// Abort if a write is not acknowledged within this many milliseconds
        #[arg(long)]
        ack_timeout_ms: Option<u64>,
        /// Keep listening for replies this many seconds after sending
        #[arg(short, long, default_value = "0")]
        listen: u64,
    },
    /// Print messages a device notifies
    Listen {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// How long to listen in seconds
        #[arg(long, default_value = "30")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { duration } => {
            scan_devices(Duration::from_secs(duration)).await?;
        }
        Commands::Send {
            device,
            message,
            file,
            packet_size,
            mtu,
            ack_timeout_ms,
            listen,
        } => {
            let payload = read_payload(message, file)?;
            let config = link_config(packet_size, mtu, ack_timeout_ms);
            send_message(device, payload, config, Duration::from_secs(listen)).await?;
        }
        Commands::Listen { device, duration } => {
            listen_device(device, Duration::from_secs(duration)).await?;
        }
    }

    Ok(())
}

fn read_payload(
    message: Option<String>,
    file: Option<String>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    match (message, file) {
        (Some(message), _) => Ok(message.into_bytes()),
        (None, Some(file)) => Ok(std::fs::read(file)?),
        (None, None) => Err("Either --message or --file is required".into()),
    }
}

fn link_config(
    packet_size: Option<usize>,
    mtu: Option<u16>,
    ack_timeout_ms: Option<u64>,
) -> LinkConfig {
    let mut config = match mtu {
        Some(mtu) => LinkConfig::default().with_mtu(mtu),
        None => LinkConfig::default(),
    };
    if let Some(size) = packet_size {
        if mtu.is_none() && size > config.packet_size {
            warn!("--packet-size {size} without --mtu may exceed what the link accepts");
        }
        config.packet_size = size;
    }
    config.ack_timeout = ack_timeout_ms.map(Duration::from_millis);
    config
}

async fn scan_devices(duration: Duration) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for Gizwits devices ({} seconds)...", duration.as_secs());

    let devices = ble::scan(duration).await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_gizwits { " [GIZWITS]" } else { "" };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }

    Ok(())
}

async fn open_session(
    target: Option<String>,
    config: LinkConfig,
) -> Result<(Session<ChannelListener>, UnboundedReceiver<LinkEvent>), Box<dyn std::error::Error>>
{
    println!("Scanning for Gizwits devices...");
    let peripheral = ble::find_device(target.as_deref(), config.scan_duration).await?;

    println!("Connecting...");
    let (listener, events) = ChannelListener::new();
    let session = Session::connect(peripheral, listener, config).await?;
    if let Some(mode) = session.write_mode() {
        println!("Connected! (write {})", mode.as_str());
    }

    Ok((session, events))
}

async fn send_message(
    target: Option<String>,
    payload: Vec<u8>,
    config: LinkConfig,
    listen: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, mut events) = open_session(target, config).await?;

    println!("Sending {} bytes...", payload.len());
    let sent = session.send(payload).await;
    print_events(&mut events);
    if let Err(e) = sent {
        if let Err(disconnect) = session.disconnect().await {
            warn!("disconnect failed: {disconnect}");
        }
        return Err(e.into());
    }

    if !listen.is_zero() {
        listen_for(&mut session, &mut events, listen).await?;
    }

    session.disconnect().await?;
    Ok(())
}

async fn listen_device(
    target: Option<String>,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, mut events) = open_session(target, LinkConfig::default()).await?;
    listen_for(&mut session, &mut events, duration).await?;
    session.disconnect().await?;
    Ok(())
}

async fn listen_for(
    session: &mut Session<ChannelListener>,
    events: &mut UnboundedReceiver<LinkEvent>,
    duration: Duration,
) -> Result<(), ControllerError> {
    println!("Listening for {} seconds...", duration.as_secs());
    let deadline = tokio::time::Instant::now() + duration;

    loop {
        match tokio::time::timeout_at(deadline, session.pump_notification()).await {
            Err(_) => break,
            Ok(Ok(true)) => print_events(events),
            Ok(Ok(false)) => {
                println!("Device disconnected.");
                break;
            }
            Ok(Err(ControllerError::Link(LinkError::Decode { bytes, source }))) => {
                warn!("undecodable notification: {source}");
                println!("  <- (binary) {}", hex(&bytes));
            }
            Ok(Err(e)) => return Err(e),
        }
    }

    Ok(())
}

fn print_events(events: &mut UnboundedReceiver<LinkEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            LinkEvent::Sent(payload) => println!("Sent {} bytes.", payload.len()),
            LinkEvent::Received(message) => println!("  <- {}", message),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
