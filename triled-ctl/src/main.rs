//! TriLED control client
//!
//! Sends a single request to a running lights service and prints its reply.
//!
//! Usage: cargo run -p triled-ctl -- set notifications 0xff0000 --on-ms 500 --off-ms 500

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;
use triled_lights_lib::{FlashMode, LightRequest};
use triled_protocol::{Command, Response};

#[derive(Parser, Debug)]
#[command(name = "triled-ctl")]
#[command(version, about = "Send a request to the TriLED lights service")]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:4782")]
    address: String,

    /// Seconds to wait for a reply
    #[arg(short, long, default_value = "5")]
    timeout: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Set a light's color and flash pattern
    Set {
        /// Light type name or numeric id
        light: String,
        /// Packed ARGB color, hex with a 0x or # prefix, or decimal
        color: String,
        /// Flash on time in milliseconds
        #[arg(long, requires = "off_ms", conflicts_with = "hardware")]
        on_ms: Option<u32>,
        /// Flash off time in milliseconds
        #[arg(long, requires = "on_ms")]
        off_ms: Option<u32>,
        /// Request hardware-driven flashing
        #[arg(long)]
        hardware: bool,
    },
    /// List the light types the service supports
    Types,
    /// Check that the service is answering
    Ping,
}

impl Action {
    /// Build the protocol command, validating arguments before connecting.
    fn to_command(&self) -> Result<Command> {
        match self {
            Self::Set {
                light,
                color,
                on_ms,
                off_ms,
                hardware,
            } => {
                let Command::Set { light, request } =
                    Command::parse(&format!("SET {light} {color}"))?
                else {
                    bail!("'{light}' does not name a light");
                };
                if request.flash_mode != FlashMode::None {
                    bail!("unexpected arguments after color '{color}'");
                }

                let request = match (on_ms, off_ms) {
                    (Some(on), Some(off)) => LightRequest::timed(request.color, *on, *off),
                    _ if *hardware => LightRequest {
                        flash_mode: FlashMode::Hardware,
                        ..request
                    },
                    _ => request,
                };
                Ok(Command::Set { light, request })
            }
            Self::Types => Ok(Command::Types),
            Self::Ping => Ok(Command::Ping),
        }
    }
}

fn send(args: &Args, command: &Command) -> Result<String> {
    debug!("Connecting to {}", args.address);
    let stream = TcpStream::connect(&args.address)
        .with_context(|| format!("failed to connect to {}", args.address))?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(Duration::from_secs(args.timeout)))?;

    let mut writer = &stream;
    debug!("TX: {command}");
    writer.write_all(format!("{command}\n").as_bytes())?;

    let mut reply = String::new();
    BufReader::new(&stream)
        .read_line(&mut reply)
        .context("failed to read reply")?;
    if reply.is_empty() {
        bail!("connection closed before a reply arrived");
    }
    debug!("RX: {}", reply.trim_end());
    Ok(reply.trim_end().to_string())
}

fn run(args: &Args) -> Result<bool> {
    let command = args.action.to_command()?;
    let reply = send(args, &command)?;
    println!("{reply}");
    Ok(!Response::is_failure_line(&reply))
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use triled_lights_lib::LightType;

    fn set_with(light: &str, color: &str, flash: Option<(u32, u32)>, hardware: bool) -> Action {
        Action::Set {
            light: light.into(),
            color: color.into(),
            on_ms: flash.map(|(on, _)| on),
            off_ms: flash.map(|(_, off)| off),
            hardware,
        }
    }

    fn set(light: &str, color: &str) -> Action {
        set_with(light, color, None, false)
    }

    #[test]
    fn test_set_builds_steady_command() {
        let command = set("notifications", "0xff0000").to_command().unwrap();
        assert_eq!(
            command,
            Command::Set {
                light: LightType::Notifications,
                request: LightRequest::new(0x00FF_0000),
            }
        );
        assert_eq!(command.to_string(), "SET NOTIFICATIONS 0x00ff0000");
    }

    #[test]
    fn test_set_with_timing_and_hardware() {
        let timed = set_with("4", "#80123456", Some((250, 750)), false);
        assert_eq!(
            timed.to_command().unwrap().to_string(),
            "SET NOTIFICATIONS 0x80123456 TIMED 250 750"
        );

        let hardware = set_with("battery", "255", None, true);
        assert_eq!(
            hardware.to_command().unwrap().to_string(),
            "SET BATTERY 0x000000ff HARDWARE"
        );
    }

    #[test]
    fn test_set_rejects_bad_arguments_locally() {
        assert!(set("lamp", "0xff").to_command().is_err());
        assert!(set("battery", "red").to_command().is_err());
        // Extra words would otherwise be smuggled into the line
        assert!(set("battery", "0xff TIMED 1 1").to_command().is_err());
    }

    #[test]
    fn test_types_and_ping() {
        assert_eq!(Action::Types.to_command().unwrap(), Command::Types);
        assert_eq!(Action::Ping.to_command().unwrap(), Command::Ping);
    }

    #[test]
    fn test_cli_parses_set() {
        let args = Args::try_parse_from([
            "triled-ctl",
            "--address",
            "10.0.0.2:4782",
            "set",
            "attention",
            "0x112233",
            "--on-ms",
            "1000",
            "--off-ms",
            "1000",
        ])
        .unwrap();
        assert_eq!(args.address, "10.0.0.2:4782");
        assert_eq!(
            args.action.to_command().unwrap().to_string(),
            "SET ATTENTION 0x00112233 TIMED 1000 1000"
        );

        assert!(Args::try_parse_from(["triled-ctl", "set", "battery", "1", "--on-ms", "5"]).is_err());
        assert!(Args::try_parse_from([
            "triled-ctl", "set", "battery", "1", "--on-ms", "5", "--off-ms", "5", "--hardware"
        ])
        .is_err());
    }

    #[test]
    fn test_send_reads_one_reply_line() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(&stream).read_line(&mut line).unwrap();
            (&stream).write_all(b"LIGHT_NOT_SUPPORTED\n").unwrap();
            line
        });

        let args = Args {
            address,
            timeout: 5,
            action: set("keyboard", "0xff"),
        };
        let command = args.action.to_command().unwrap();
        let reply = send(&args, &command).unwrap();

        assert_eq!(reply, "LIGHT_NOT_SUPPORTED");
        assert!(Response::is_failure_line(&reply));
        assert_eq!(server.join().unwrap(), "SET KEYBOARD 0x000000ff\n");
    }
}
