//! Indicator light arbitration for TriLED
//!
//! This library decides which of several competing light requests gets to
//! drive the single RGB LED triad, and encodes the winner into the integer
//! values the LED controller expects. It is hardware-agnostic and can be
//! tested without a device: all I/O is left to the caller, which applies the
//! [`HardwareOutput`] returned by [`ZoneStates::resolve`].

use enumset::{enum_set, EnumSet, EnumSetType};
pub use rgb::RGB8;

mod color;
mod zones;

pub use color::{apply_alpha_scale, channels, is_lit, luma, pack, scale_backlight, DEFAULT_MAX_BRIGHTNESS};
pub use zones::{
    compute_blink_timing, BlinkTiming, ControlPoint, HardwareOutput, Writes, Zone, ZoneStates,
    RAMP_DURATION_MS,
};

/// Light channel identifiers known to the host interface.
///
/// Discriminants match the numeric ids used on the wire. Only the types in
/// [`SUPPORTED_TYPES`] are backed by hardware on this device.
#[derive(Debug, Hash, EnumSetType)]
pub enum LightType {
    Backlight = 0,
    Keyboard = 1,
    Buttons = 2,
    Battery = 3,
    Notifications = 4,
    Attention = 5,
    Bluetooth = 6,
    Wifi = 7,
}

/// Channels registered with the dispatch surface.
pub const SUPPORTED_TYPES: EnumSet<LightType> = enum_set!(
    LightType::Backlight
        | LightType::Attention
        | LightType::Battery
        | LightType::Buttons
        | LightType::Notifications
);

impl LightType {
    pub const ALL: [LightType; 8] = [
        Self::Backlight,
        Self::Keyboard,
        Self::Buttons,
        Self::Battery,
        Self::Notifications,
        Self::Attention,
        Self::Bluetooth,
        Self::Wifi,
    ];

    /// Numeric wire id
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Backlight => "BACKLIGHT",
            Self::Keyboard => "KEYBOARD",
            Self::Buttons => "BUTTONS",
            Self::Battery => "BATTERY",
            Self::Notifications => "NOTIFICATIONS",
            Self::Attention => "ATTENTION",
            Self::Bluetooth => "BLUETOOTH",
            Self::Wifi => "WIFI",
        }
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// The arbitrated zone this channel feeds, if any.
    ///
    /// Backlight is driven directly and never arbitrated; unsupported
    /// channels have no zone either.
    #[must_use]
    pub const fn zone(self) -> Option<Zone> {
        match self {
            Self::Notifications => Some(Zone::Notification),
            Self::Attention => Some(Zone::Attention),
            Self::Battery => Some(Zone::Battery),
            Self::Buttons => Some(Zone::Buttons),
            Self::Backlight | Self::Keyboard | Self::Bluetooth | Self::Wifi => None,
        }
    }

    #[must_use]
    pub fn is_supported(self) -> bool {
        SUPPORTED_TYPES.contains(self)
    }
}

impl std::fmt::Display for LightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a request wants to flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashMode {
    #[default]
    None,
    /// Blink with the request's on/off durations
    Timed,
    /// Left to the hardware's own pattern; treated as steady here
    Hardware,
}

/// A single light request as submitted by a caller.
///
/// `color` is packed ARGB: the top byte is an alpha/brightness override,
/// followed by red, green and blue. A newer request for the same channel
/// replaces the previous one entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightRequest {
    pub color: u32,
    pub flash_mode: FlashMode,
    pub flash_on_ms: u32,
    pub flash_off_ms: u32,
}

impl LightRequest {
    /// Steady request for `color`
    #[must_use]
    pub const fn new(color: u32) -> Self {
        Self {
            color,
            flash_mode: FlashMode::None,
            flash_on_ms: 0,
            flash_off_ms: 0,
        }
    }

    /// Timed blink request
    #[must_use]
    pub const fn timed(color: u32, flash_on_ms: u32, flash_off_ms: u32) -> Self {
        Self {
            color,
            flash_mode: FlashMode::Timed,
            flash_on_ms,
            flash_off_ms,
        }
    }

    #[must_use]
    pub fn is_lit(&self) -> bool {
        is_lit(self.color)
    }
}

/// Fixed properties of the backlight panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Largest value the backlight control point accepts
    pub max_brightness: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            max_brightness: DEFAULT_MAX_BRIGHTNESS,
        }
    }
}

/// Result of a `set_light` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    LightNotSupported,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::LightNotSupported => "LIGHT_NOT_SUPPORTED",
        }
    }
}
