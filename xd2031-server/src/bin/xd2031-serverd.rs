//! Host-side filesystem server daemon.
//!
//! CLI surface grounded in `original_source/pcserver/fsser.c`'s `main`
//! (`-A`/`-X`/`-d`/`-v`), replaced with `clap` derive parsing
//! (`SPEC_FULL.md` §6/A3). The main loop mirrors `fscmd.c`'s `cmd_loop`:
//! blocking read off the transport, feed the framer, dispatch each
//! decoded packet, write replies back.

use std::io::{Read, Write};
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use serialport::{DataBits, FlowControl, Parity, StopBits};

use xd2031_proto::framer::{Framer, FramerEvent};
use xd2031_proto::FS_SYNC;
use xd2031_server::{Dispatcher, ProviderRegistry, RuntimeConfig, ServerError};

/// Baud rate used when `--device` names a serial port rather than `auto`/`-`.
const SERIAL_BAUD_RATE: u32 = 115_200;

/// Host-side filesystem server for the XD-2031 firmware.
#[derive(Parser, Debug)]
#[command(name = "xd2031-serverd")]
struct Args {
    /// Assign a drive: `<drive>=<provider>:<path>` (e.g. `0=fs:/tmp/root`)
    /// or `<drive>==<source>/<subpath>` to derive from an already-assigned
    /// drive.
    #[arg(short = 'A', long = "assign", value_name = "SPEC")]
    assign: Vec<String>,

    /// Register a `<bus>:<cmd>` option, replayed on every firmware RESET.
    #[arg(short = 'X', long = "xcmd", value_name = "BUS:CMD")]
    xcmd: Vec<String>,

    /// Serial device to use, or `auto`/`-` for stdio.
    #[arg(short = 'd', long = "device", default_value = "auto")]
    device: String,

    /// Increase log verbosity; repeatable.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(err) = run(&args) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), ServerError> {
    let mut registry = ProviderRegistry::with_cwd_default()?;
    for spec in &args.assign {
        registry.assign(&translate_assign_spec(spec)?)?;
    }

    let mut config = RuntimeConfig::new();
    for spec in &args.xcmd {
        config.record_xcmd(spec.clone());
    }

    let mut dispatcher = Dispatcher::new(registry, config);
    let mut transport = open_transport(&args.device)?;
    info!("xd2031-serverd ready on device {:?}", args.device);

    let mut framer = Framer::new();
    let mut read_buf = [0u8; 256];

    loop {
        let n = transport.read(&mut read_buf).map_err(ServerError::Transport)?;
        if n == 0 {
            info!("transport closed, exiting");
            return Ok(());
        }
        framer.feed(&read_buf[..n]);

        loop {
            match framer.poll() {
                FramerEvent::Packet(packet) => {
                    for reply in dispatcher.dispatch(&packet) {
                        transport.write_all(&reply.encode()).map_err(ServerError::Transport)?;
                    }
                }
                FramerEvent::Sync => {
                    transport.write_all(&[FS_SYNC]).map_err(ServerError::Transport)?;
                }
                FramerEvent::NeedMore => break,
            }
        }
    }
}

/// Rewrites the `-A` CLI form (`<drive>=<provider>:<path>` or
/// `<drive>==<source>/<subpath>`, `SPEC_FULL.md` §6) into the
/// `ProviderRegistry::assign` wire form (`drive:provider=path` or
/// `drive:=source/subpath`, matching the form an ASSIGN command-channel
/// payload arrives in).
fn translate_assign_spec(cli: &str) -> Result<String, ServerError> {
    let (drive, rest) = cli.split_once('=').ok_or_else(|| ServerError::BadAssignSpec(cli.to_string()))?;
    if let Some(child) = rest.strip_prefix('=') {
        return Ok(format!("{drive}:={child}"));
    }
    let (provider, path) = rest.split_once(':').ok_or_else(|| ServerError::BadAssignSpec(cli.to_string()))?;
    Ok(format!("{drive}:{provider}={path}"))
}

/// A transport is just a reliable, duplex byte stream — the only
/// interface `spec.md` §1 says this core is allowed to depend on.
trait Transport: Read + Write {}
impl<T: Read + Write> Transport for T {}

fn open_transport(device: &str) -> Result<Box<dyn Transport>, ServerError> {
    if device == "auto" || device == "-" {
        return Ok(Box::new(StdioTransport::new()));
    }
    let port = serialport::new(device, SERIAL_BAUD_RATE)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_secs(1))
        .open()
        .map_err(|e| ServerError::TransportOpen(device.to_string(), std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    Ok(Box::new(port))
}

/// Duplex wrapper over stdin/stdout, used when no serial device is given.
struct StdioTransport {
    input: std::io::Stdin,
    output: std::io::Stdout,
}

impl StdioTransport {
    fn new() -> Self {
        Self {
            input: std::io::stdin(),
            output: std::io::stdout(),
        }
    }
}

impl Read for StdioTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for StdioTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assign_translates_cli_form_to_wire_form() {
        assert_eq!(translate_assign_spec("0=fs:/tmp/root").unwrap(), "0:fs=/tmp/root");
    }

    #[test]
    fn child_assign_translates_cli_form_to_wire_form() {
        assert_eq!(translate_assign_spec("1==0/SUB").unwrap(), "1:=0/SUB");
    }

    #[test]
    fn assign_without_a_drive_separator_is_rejected() {
        assert!(translate_assign_spec("not-a-spec").is_err());
    }
}
