//! Zone state and priority arbitration
//!
//! Four logical zones compete for the one RGB triad. [`ZoneStates`] holds the
//! latest request per zone and [`ZoneStates::resolve`] turns that snapshot
//! into a complete [`HardwareOutput`]. Nothing here touches hardware; the
//! caller writes [`HardwareOutput::writes`] to the sinks.

use smallvec::SmallVec;

use crate::color::luma;
use crate::{FlashMode, LightRequest};

/// Time the LED controller spends ramping between off and peak, in ms.
pub const RAMP_DURATION_MS: u32 = 400;

/// Logical zones arbitrated for the shared LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Notification,
    Attention,
    Battery,
    Buttons,
}

impl Zone {
    /// Zones in arbitration order, highest priority first.
    pub const PRIORITY: [Zone; 4] = [Self::Notification, Self::Attention, Self::Battery, Self::Buttons];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Named hardware control points, each accepting one integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlPoint {
    Backlight,
    Red,
    Green,
    Blue,
    /// Steady-high portion of a red blink cycle
    RedOnTime,
    /// Full red blink cycle length
    RedPeriod,
    RedRampTime,
    /// Non-zero starts the red blink at that brightness, zero stops it
    RedBlink,
}

impl ControlPoint {
    pub const ALL: [ControlPoint; 8] = [
        Self::Backlight,
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::RedOnTime,
        Self::RedPeriod,
        Self::RedRampTime,
        Self::RedBlink,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Backlight => "backlight",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::RedOnTime => "red_on_time",
            Self::RedPeriod => "red_period",
            Self::RedRampTime => "red_ramp_time",
            Self::RedBlink => "red_blink",
        }
    }
}

/// Red channel blink register values, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkTiming {
    /// Time held at peak brightness per cycle
    pub pause_hi_ms: u32,
    pub period_ms: u32,
    pub ramp_ms: u32,
}

/// Derive hardware blink timing from requested on/off durations.
///
/// Returns `None` unless both durations are non-zero. The ramp starts at
/// [`RAMP_DURATION_MS`]; when that would leave less than half of the
/// on-time at peak, the plateau is clamped to `on_ms / 2` and the ramp
/// shrinks to split the remainder between rise and fall.
#[must_use]
pub fn compute_blink_timing(on_ms: u32, off_ms: u32) -> Option<BlinkTiming> {
    if on_ms == 0 || off_ms == 0 {
        return None;
    }

    let on = i64::from(on_ms);
    let mut ramp = i64::from(RAMP_DURATION_MS);
    let mut pause_hi = on - ramp;

    if pause_hi < on / 2 {
        pause_hi = on / 2;
        ramp = (on - pause_hi) / 2;
    }

    // Both are in 0..=on_ms after the correction above
    let to_u32 = |v: i64| u32::try_from(v).unwrap_or(u32::MAX);

    Some(BlinkTiming {
        pause_hi_ms: to_u32(pause_hi),
        period_ms: on_ms.saturating_add(off_ms),
        ramp_ms: to_u32(ramp),
    })
}

/// Complete state of the shared LED after arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareOutput {
    /// Nothing lit
    Off,
    /// Only the buttons zone is lit; all channels at the button brightness
    Buttons { level: u32 },
    /// Steady colored zone, with the button glow on green and blue
    Steady { red: u32, green: u32, blue: u32 },
    /// Hardware blink on the red channel
    Blink { brightness: u32, timing: BlinkTiming },
}

/// Ordered control point writes for one [`HardwareOutput`]
pub type Writes = SmallVec<[(ControlPoint, u32); 8]>;

impl HardwareOutput {
    /// The writes that put the hardware in this state, in order.
    ///
    /// Every lit state disables the red blink first so a running blink is
    /// stopped before the channels are reconfigured.
    #[must_use]
    pub fn writes(&self) -> Writes {
        use ControlPoint::{Blue, Green, Red, RedBlink, RedOnTime, RedPeriod, RedRampTime};

        match *self {
            Self::Off => smallvec::smallvec![(Red, 0), (Green, 0), (Blue, 0), (RedBlink, 0)],
            Self::Buttons { level } => {
                smallvec::smallvec![(RedBlink, 0), (Red, level), (Green, level), (Blue, level)]
            }
            Self::Steady { red, green, blue } => {
                smallvec::smallvec![(RedBlink, 0), (Red, red), (Green, green), (Blue, blue)]
            }
            Self::Blink { brightness, timing } => smallvec::smallvec![
                (RedBlink, 0),
                (RedOnTime, timing.pause_hi_ms),
                (RedPeriod, timing.period_ms),
                (RedRampTime, timing.ramp_ms),
                (RedBlink, brightness),
                (Green, 0),
                (Blue, 0),
            ],
        }
    }
}

/// Latest request for each arbitrated zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneStates {
    requests: [LightRequest; 4],
}

impl ZoneStates {
    /// All zones off
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the request held for `zone`.
    pub fn set(&mut self, zone: Zone, request: LightRequest) {
        self.requests[zone.index()] = request;
    }

    #[must_use]
    pub fn get(&self, zone: Zone) -> &LightRequest {
        &self.requests[zone.index()]
    }

    /// The highest-priority zone whose request is lit.
    #[must_use]
    pub fn active_zone(&self) -> Option<Zone> {
        Zone::PRIORITY.into_iter().find(|&z| self.get(z).is_lit())
    }

    /// Arbitrate the current snapshot into a full hardware state.
    #[must_use]
    pub fn resolve(&self) -> HardwareOutput {
        let buttons = self.get(Zone::Buttons);

        match self.active_zone() {
            None => HardwareOutput::Off,
            Some(Zone::Buttons) => HardwareOutput::Buttons {
                level: luma(buttons.color),
            },
            Some(zone) => colored_output(self.get(zone), buttons),
        }
    }
}

/// Output for a lit notification, attention or battery request.
fn colored_output(active: &LightRequest, buttons: &LightRequest) -> HardwareOutput {
    let brightness = luma(active.color);
    let button_brightness = luma(buttons.color);

    let (on_ms, off_ms) = match active.flash_mode {
        FlashMode::Timed => (active.flash_on_ms, active.flash_off_ms),
        FlashMode::None | FlashMode::Hardware => (0, 0),
    };

    match compute_blink_timing(on_ms, off_ms) {
        Some(timing) => HardwareOutput::Blink { brightness, timing },
        None => HardwareOutput::Steady {
            red: brightness,
            green: button_brightness,
            blue: button_brightness,
        },
    }
}
