//! The lights service
//!
//! Routes requests per light type: backlight requests are scaled and written
//! directly, everything else goes through zone arbitration. Each zone update
//! holds the zone lock from the store update until the last sink write, so
//! concurrent callers can never leave the LED in a mix of two states.

use enumset::EnumSet;
use log::{debug, trace};
use std::sync::{Mutex, PoisonError};
use triled_lights_lib::{
    apply_alpha_scale, luma, scale_backlight, ControlPoint, LightRequest, LightType, PanelConfig,
    Status, Zone, ZoneStates, DEFAULT_MAX_BRIGHTNESS, SUPPORTED_TYPES,
};
use triled_protocol::LightDispatch;

use crate::sinks::Sinks;

pub struct Light {
    sinks: Sinks,
    panel: PanelConfig,
    zones: Mutex<ZoneStates>,
    backlight: Mutex<()>,
}

impl Light {
    pub fn new(sinks: Sinks, panel: PanelConfig) -> Self {
        debug!("Creating light service, panel max brightness {}", panel.max_brightness);
        Self {
            sinks,
            panel,
            zones: Mutex::new(ZoneStates::new()),
            backlight: Mutex::new(()),
        }
    }

    /// Submit a request for one light type.
    pub fn set_light(&self, light: LightType, request: LightRequest) -> Status {
        if !light.is_supported() {
            debug!("Rejecting request for unsupported light {light}");
            return Status::LightNotSupported;
        }

        match light.zone() {
            Some(zone) => self.set_zone(zone, request),
            None => self.set_backlight(&request),
        }
        Status::Success
    }

    #[must_use]
    pub fn supported_types(&self) -> EnumSet<LightType> {
        SUPPORTED_TYPES
    }

    /// Snapshot of the current zone requests
    #[cfg(test)]
    #[must_use]
    pub fn zone_states(&self) -> ZoneStates {
        self.zones.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_backlight(&self, request: &LightRequest) {
        let _guard = self.backlight.lock().unwrap_or_else(PoisonError::into_inner);

        let brightness = luma(request.color);
        let scaled = scale_backlight(brightness, self.panel.max_brightness);
        if self.panel.max_brightness != DEFAULT_MAX_BRIGHTNESS {
            trace!("Scaling backlight {brightness} => {scaled}");
        }

        self.sinks.emit(ControlPoint::Backlight, scaled);
    }

    fn set_zone(&self, zone: Zone, request: LightRequest) {
        // Only notifications honor the alpha byte as a brightness override
        let request = if zone == Zone::Notification {
            apply_alpha_scale(request)
        } else {
            request
        };

        let mut zones = self.zones.lock().unwrap_or_else(PoisonError::into_inner);
        zones.set(zone, request);

        let output = zones.resolve();
        debug!(
            "{zone:?} set to {:#010x}, active zone {:?}, output {output:?}",
            request.color,
            zones.active_zone()
        );

        self.sinks.apply(&output.writes());
    }
}

impl LightDispatch for Light {
    fn set_light(&self, light: LightType, request: LightRequest) -> Status {
        Light::set_light(self, light, request)
    }

    fn supported_types(&self) -> EnumSet<LightType> {
        Light::supported_types(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::testing::{recording_sinks, WriteLog};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use triled_lights_lib::HardwareOutput;

    fn light_with_log(panel_max: u32) -> (Light, WriteLog) {
        let (sinks, log, _) = recording_sinks(&[]);
        let light = Light::new(
            sinks,
            PanelConfig {
                max_brightness: panel_max,
            },
        );
        (light, log)
    }

    /// Last value written to `point`
    fn last(log: &WriteLog, point: ControlPoint) -> Option<u32> {
        log.lock()
            .unwrap()
            .iter()
            .rev()
            .find(|&&(p, _)| p == point)
            .map(|&(_, v)| v)
    }

    fn take(log: &WriteLog) -> Vec<(ControlPoint, u32)> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[test]
    fn test_steady_notification_with_unlit_buttons() {
        let (light, log) = light_with_log(255);
        light.set_light(LightType::Buttons, LightRequest::new(0));
        let status = light.set_light(LightType::Notifications, LightRequest::new(0x00FF_0000));

        assert_eq!(status, Status::Success);
        assert_eq!(last(&log, ControlPoint::Red), Some(luma(0x00FF_0000)));
        assert_eq!(last(&log, ControlPoint::Green), Some(0));
        assert_eq!(last(&log, ControlPoint::Blue), Some(0));
        assert_eq!(last(&log, ControlPoint::RedBlink), Some(0));
    }

    #[test]
    fn test_timed_attention_programs_blink() {
        let (light, log) = light_with_log(255);
        light.set_light(LightType::Attention, LightRequest::timed(0x0011_2233, 1000, 1000));

        assert_eq!(
            take(&log),
            vec![
                (ControlPoint::RedBlink, 0),
                (ControlPoint::RedOnTime, 600),
                (ControlPoint::RedPeriod, 2000),
                (ControlPoint::RedRampTime, 400),
                (ControlPoint::RedBlink, luma(0x0011_2233)),
                (ControlPoint::Green, 0),
                (ControlPoint::Blue, 0),
            ]
        );
    }

    #[test]
    fn test_buttons_only() {
        let (light, log) = light_with_log(255);
        light.set_light(LightType::Buttons, LightRequest::new(0x0080_8080));

        let level = luma(0x0080_8080);
        assert_eq!(last(&log, ControlPoint::Red), Some(level));
        assert_eq!(last(&log, ControlPoint::Green), Some(level));
        assert_eq!(last(&log, ControlPoint::Blue), Some(level));
        assert_eq!(last(&log, ControlPoint::RedBlink), Some(0));
    }

    #[test]
    fn test_backlight_scaled_to_panel() {
        let (light, log) = light_with_log(128);
        light.set_light(LightType::Backlight, LightRequest::new(0x00FF_FFFF));

        assert_eq!(take(&log), vec![(ControlPoint::Backlight, 255 * 128 / 255)]);
    }

    #[test]
    fn test_backlight_does_not_touch_zones() {
        let (light, log) = light_with_log(255);
        light.set_light(LightType::Notifications, LightRequest::new(0x0000_FF00));
        take(&log);

        light.set_light(LightType::Backlight, LightRequest::new(0x0080_8080));
        assert_eq!(take(&log), vec![(ControlPoint::Backlight, 0x80)]);
        assert_eq!(light.zone_states().active_zone(), Some(Zone::Notification));
    }

    #[test]
    fn test_unsupported_light_changes_nothing() {
        let (light, log) = light_with_log(255);
        for t in [LightType::Keyboard, LightType::Bluetooth, LightType::Wifi] {
            assert_eq!(
                light.set_light(t, LightRequest::new(0x00FF_FFFF)),
                Status::LightNotSupported
            );
        }
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(light.zone_states(), ZoneStates::new());
    }

    #[test]
    fn test_notification_alpha_is_applied() {
        let (light, log) = light_with_log(255);
        light.set_light(LightType::Notifications, LightRequest::new(0x80FF_0000));

        assert_eq!(
            light.zone_states().get(Zone::Notification).color,
            0x0080_0000
        );
        assert_eq!(last(&log, ControlPoint::Red), Some(luma(0x0080_0000)));
    }

    #[test]
    fn test_other_zones_ignore_alpha() {
        let (light, _log) = light_with_log(255);
        light.set_light(LightType::Battery, LightRequest::new(0x80FF_0000));
        assert_eq!(light.zone_states().get(Zone::Battery).color, 0x80FF_0000);
    }

    #[test]
    fn test_clearing_winner_falls_back_to_next_zone() {
        let (light, log) = light_with_log(255);
        light.set_light(LightType::Battery, LightRequest::new(0x0000_00FF));
        light.set_light(LightType::Notifications, LightRequest::timed(0x00FF_0000, 500, 500));
        take(&log);

        light.set_light(LightType::Notifications, LightRequest::new(0));
        assert_eq!(
            take(&log),
            vec![
                (ControlPoint::RedBlink, 0),
                (ControlPoint::Red, luma(0x0000_00FF)),
                (ControlPoint::Green, 0),
                (ControlPoint::Blue, 0),
            ]
        );

        light.set_light(LightType::Battery, LightRequest::new(0));
        assert_eq!(
            take(&log),
            HardwareOutput::Off.writes().to_vec()
        );
    }

    #[test]
    fn test_identical_requests_write_identically() {
        let (light, log) = light_with_log(255);
        let req = LightRequest::timed(0x0011_2233, 300, 700);

        light.set_light(LightType::Attention, req);
        let first = take(&log);
        light.set_light(LightType::Attention, req);
        let second = take(&log);

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_failure_does_not_block_later_requests() {
        let (sinks, log, fail) = recording_sinks(&[ControlPoint::Red]);
        let light = Light::new(sinks, PanelConfig::default());

        fail.store(true, Ordering::SeqCst);
        let status = light.set_light(LightType::Battery, LightRequest::new(0x00FF_FFFF));
        assert_eq!(status, Status::Success);
        // The software state is updated even though red was not written
        assert_eq!(light.zone_states().active_zone(), Some(Zone::Battery));
        assert_eq!(last(&log, ControlPoint::Red), None);
        assert_eq!(last(&log, ControlPoint::Blue), Some(0));

        fail.store(false, Ordering::SeqCst);
        light.set_light(LightType::Battery, LightRequest::new(0x00FF_FFFF));
        assert_eq!(last(&log, ControlPoint::Red), Some(255));
    }

    #[test]
    fn test_concurrent_updates_leave_consistent_output() {
        let (light, log) = light_with_log(255);
        let light = Arc::new(light);

        let handles: Vec<_> = [
            LightType::Notifications,
            LightType::Attention,
            LightType::Battery,
            LightType::Buttons,
        ]
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            let light = Arc::clone(&light);
            std::thread::spawn(move || {
                for n in 0..200u32 {
                    let color = if n % 3 == 0 { 0 } else { 0x0010_2030 + n + i as u32 };
                    let req = if n % 2 == 0 {
                        LightRequest::new(color)
                    } else {
                        LightRequest::timed(color, 100 + n, 100)
                    };
                    light.set_light(t, req);
                }
            })
        })
        .collect();

        for h in handles {
            h.join().unwrap();
        }

        // The tail of the log must be exactly the writes for the final state
        let expected = light.zone_states().resolve().writes().to_vec();
        let log = log.lock().unwrap();
        assert!(log.len() >= expected.len());
        assert_eq!(&log[log.len() - expected.len()..], expected.as_slice());
    }
}
