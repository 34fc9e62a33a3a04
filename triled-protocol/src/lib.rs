//! Line protocol for the TriLED dispatch surface
//!
//! Clients send one ASCII command per line and get one reply line back:
//!
//! ```text
//! SET <type> <color> [NONE | TIMED <on_ms> <off_ms> | HARDWARE]
//! TYPES
//! ECHO ON|OFF
//! PING
//! ```
//!
//! `<type>` is a light type name (`NOTIFICATIONS`) or its numeric id (`4`).
//! `<color>` is packed ARGB, hex with a `0x` or `#` prefix, or decimal.
//! Keywords are case-insensitive.

use std::fmt;
use std::str::SplitWhitespace;

use derive_more::{Display, Error};
use enumset::EnumSet;
use log::debug;
use triled_lights_lib::{FlashMode, LightRequest, LightType, Status};

/// Errors from parsing a command line
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ParseError {
    #[display("empty command")]
    Empty,
    #[display("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[display("missing {what}")]
    Missing { what: &'static str },
    #[display("invalid light type '{value}'")]
    InvalidType { value: String },
    #[display("invalid color '{value}'")]
    InvalidColor { value: String },
    #[display("invalid duration '{value}'")]
    InvalidDuration { value: String },
    #[display("invalid flash mode '{value}'")]
    InvalidFlashMode { value: String },
    #[display("invalid argument '{value}'")]
    InvalidArgument { value: String },
    #[display("unexpected argument '{value}'")]
    TrailingArgument { value: String },
}

/// A parsed client command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set { light: LightType, request: LightRequest },
    Types,
    Echo(bool),
    Ping,
}

fn next_arg<'a>(args: &mut SplitWhitespace<'a>, what: &'static str) -> Result<&'a str, ParseError> {
    args.next().ok_or(ParseError::Missing { what })
}

fn parse_light_type(value: &str) -> Result<LightType, ParseError> {
    let light = if value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok().and_then(LightType::from_id)
    } else {
        LightType::from_name(value)
    };
    light.ok_or_else(|| ParseError::InvalidType {
        value: value.to_string(),
    })
}

fn parse_color(value: &str) -> Result<u32, ParseError> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('#'));
    let parsed = match hex {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ParseError::InvalidColor {
        value: value.to_string(),
    })
}

fn parse_duration(value: &str) -> Result<u32, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidDuration {
        value: value.to_string(),
    })
}

fn parse_flash(color: u32, args: &mut SplitWhitespace<'_>) -> Result<LightRequest, ParseError> {
    let Some(mode) = args.next() else {
        return Ok(LightRequest::new(color));
    };

    match mode.to_ascii_uppercase().as_str() {
        "NONE" => Ok(LightRequest::new(color)),
        "TIMED" => {
            let on = parse_duration(next_arg(args, "flash on time")?)?;
            let off = parse_duration(next_arg(args, "flash off time")?)?;
            Ok(LightRequest::timed(color, on, off))
        }
        "HARDWARE" => Ok(LightRequest {
            flash_mode: FlashMode::Hardware,
            ..LightRequest::new(color)
        }),
        _ => Err(ParseError::InvalidFlashMode {
            value: mode.to_string(),
        }),
    }
}

impl Command {
    /// Parse a single command line (without its terminator).
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut args = line.split_whitespace();
        let keyword = args.next().ok_or(ParseError::Empty)?.to_ascii_uppercase();

        let command = match keyword.as_str() {
            "SET" => {
                let light = parse_light_type(next_arg(&mut args, "light type")?)?;
                let color = parse_color(next_arg(&mut args, "color")?)?;
                let request = parse_flash(color, &mut args)?;
                Self::Set { light, request }
            }
            "TYPES" => Self::Types,
            "PING" => Self::Ping,
            "ECHO" => {
                let value = next_arg(&mut args, "ON or OFF")?;
                match value.to_ascii_uppercase().as_str() {
                    "ON" => Self::Echo(true),
                    "OFF" => Self::Echo(false),
                    _ => {
                        return Err(ParseError::InvalidArgument {
                            value: value.to_string(),
                        })
                    }
                }
            }
            _ => return Err(ParseError::UnknownCommand { command: keyword }),
        };

        if let Some(extra) = args.next() {
            return Err(ParseError::TrailingArgument {
                value: extra.to_string(),
            });
        }
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { light, request } => {
                write!(f, "SET {light} {:#010x}", request.color)?;
                match request.flash_mode {
                    FlashMode::None => Ok(()),
                    FlashMode::Timed => {
                        write!(f, " TIMED {} {}", request.flash_on_ms, request.flash_off_ms)
                    }
                    FlashMode::Hardware => f.write_str(" HARDWARE"),
                }
            }
            Self::Types => f.write_str("TYPES"),
            Self::Echo(on) => f.write_str(if *on { "ECHO ON" } else { "ECHO OFF" }),
            Self::Ping => f.write_str("PING"),
        }
    }
}

/// A reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Status(Status),
    Types(EnumSet<LightType>),
    Ok,
    Pong,
    Error(ParseError),
}

impl Response {
    /// Whether a reply line reports a failed request.
    #[must_use]
    pub fn is_failure_line(line: &str) -> bool {
        line.starts_with("ERROR") || line == Status::LightNotSupported.as_str()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => f.write_str(status.as_str()),
            Self::Types(types) => {
                let mut first = true;
                for t in types.iter() {
                    if !first {
                        f.write_str(" ")?;
                    }
                    f.write_str(t.name())?;
                    first = false;
                }
                Ok(())
            }
            Self::Ok => f.write_str("OK"),
            Self::Pong => f.write_str("PONG"),
            Self::Error(e) => write!(f, "ERROR {e}"),
        }
    }
}

/// The operations a session forwards to the lights service.
pub trait LightDispatch {
    fn set_light(&self, light: LightType, request: LightRequest) -> Status;
    fn supported_types(&self) -> EnumSet<LightType>;
}

/// Per-connection protocol state
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Repeat each command line before its reply (ECHO ON/OFF)
    pub echo_enabled: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a parsed command against the lights service.
    pub fn execute<L: LightDispatch + ?Sized>(&mut self, command: Command, lights: &L) -> Response {
        match command {
            Command::Set { light, request } => Response::Status(lights.set_light(light, request)),
            Command::Types => Response::Types(lights.supported_types()),
            Command::Echo(on) => {
                self.echo_enabled = on;
                Response::Ok
            }
            Command::Ping => Response::Pong,
        }
    }

    /// Handle one raw line and return the text to send back.
    ///
    /// Blank lines produce no output. The echo decision uses the setting in
    /// effect before the line was handled, so `ECHO OFF` is itself echoed.
    pub fn handle_line<L: LightDispatch + ?Sized>(&mut self, line: &str, lights: &L) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let echo = self.echo_enabled;
        let response = match Command::parse(line) {
            Ok(command) => self.execute(command, lights),
            Err(e) => {
                debug!("Rejected command '{line}': {e}");
                Response::Error(e)
            }
        };

        Some(if echo {
            format!("{line}\n{response}\n")
        } else {
            format!("{response}\n")
        })
    }
}
