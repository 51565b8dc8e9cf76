use super::{as_bool, as_time, emit, exposed};
use crate::{EventEmitter, FieldDispatchTable, InterfaceError, NodeImpl, TimeDependent};
use vrml_field::FieldType;

/// Generates time and fraction events while active. Driven by the browser
/// clock through `update`.
pub struct TimeSensor {
    cycle_interval: EventEmitter,
    enabled: EventEmitter,
    looping: EventEmitter,
    start_time: EventEmitter,
    stop_time: EventEmitter,
    cycle_time: EventEmitter,
    fraction_changed: EventEmitter,
    is_active: EventEmitter,
    time: EventEmitter,
    active: bool,
    cycle: f64,
}

impl Default for TimeSensor {
    fn default() -> Self {
        Self {
            cycle_interval: exposed(1.0f64),
            enabled: exposed(true),
            looping: exposed(false),
            start_time: exposed(0.0f64),
            stop_time: exposed(0.0f64),
            cycle_time: exposed(0.0f64),
            fraction_changed: exposed(0.0f32),
            is_active: exposed(false),
            time: exposed(0.0f64),
            active: false,
            cycle: 0.0,
        }
    }
}

impl TimeSensor {
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn deactivate(&mut self) {
        self.active = false;
        emit(&mut self.is_active, false);
    }
}

impl NodeImpl for TimeSensor {
    const TYPE_ID: &'static str = "TimeSensor";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_exposed_field(FieldType::SFTime, "cycleInterval", |n| &n.cycle_interval, |n| &mut n.cycle_interval)?;
        table.add_exposed_field(FieldType::SFBool, "enabled", |n| &n.enabled, |n| &mut n.enabled)?;
        table.add_exposed_field(FieldType::SFBool, "loop", |n| &n.looping, |n| &mut n.looping)?;
        table.add_exposed_field(FieldType::SFTime, "startTime", |n| &n.start_time, |n| &mut n.start_time)?;
        table.add_exposed_field(FieldType::SFTime, "stopTime", |n| &n.stop_time, |n| &mut n.stop_time)?;
        table.add_event_out(FieldType::SFTime, "cycleTime", |n| &n.cycle_time, |n| &mut n.cycle_time)?;
        table.add_event_out(FieldType::SFFloat, "fraction_changed", |n| &n.fraction_changed, |n| &mut n.fraction_changed)?;
        table.add_event_out(FieldType::SFBool, "isActive", |n| &n.is_active, |n| &mut n.is_active)?;
        table.add_event_out(FieldType::SFTime, "time", |n| &n.time, |n| &mut n.time)?;
        Ok(())
    }

    fn as_time_dependent(&mut self) -> Option<&mut dyn TimeDependent> {
        Some(self)
    }
}

impl TimeDependent for TimeSensor {
    fn update(&mut self, now: f64) {
        let interval = as_time(&self.cycle_interval);
        if !as_bool(&self.enabled) || interval <= 0.0 {
            if self.active {
                self.deactivate();
            }
            return;
        }
        let start = as_time(&self.start_time);
        let stop = as_time(&self.stop_time);
        let looping = as_bool(&self.looping);
        let stopped = stop > start && now >= stop;

        if !self.active {
            let finished = !looping && now >= start + interval;
            if now < start || stopped || finished {
                return;
            }
            self.active = true;
            self.cycle = ((now - start) / interval).floor();
            emit(&mut self.is_active, true);
            emit(&mut self.cycle_time, now);
        }

        let elapsed = now - start;
        let mut done = stopped;
        let fraction = if !looping && elapsed >= interval {
            done = true;
            1.0
        } else {
            let cycle = (elapsed / interval).floor();
            if cycle > self.cycle {
                self.cycle = cycle;
                emit(&mut self.cycle_time, now);
            }
            (elapsed - cycle * interval) / interval
        };
        emit(&mut self.fraction_changed, fraction as f32);
        emit(&mut self.time, now);
        if done {
            self.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(start: f64, interval: f64, looping: bool) -> TimeSensor {
        let mut sensor = TimeSensor::default();
        emit(&mut sensor.start_time, start);
        emit(&mut sensor.cycle_interval, interval);
        emit(&mut sensor.looping, looping);
        sensor
    }

    fn fraction(sensor: &TimeSensor) -> f32 {
        sensor.fraction_changed.value().as_f32().unwrap_or_default()
    }

    #[test]
    fn inactive_before_start() {
        let mut s = sensor(10.0, 2.0, false);
        s.update(5.0);
        assert!(!s.is_active());
        assert!(!s.fraction_changed.is_pending());
    }

    #[test]
    fn single_cycle_ends_at_one() {
        let mut s = sensor(10.0, 2.0, false);
        s.update(10.5);
        assert!(s.is_active());
        assert!((fraction(&s) - 0.25).abs() < 1e-6);

        s.update(13.0);
        assert!(!s.is_active());
        assert_eq!(fraction(&s), 1.0);
        assert_eq!(s.is_active.value().as_bool(), Some(false));
    }

    #[test]
    fn looping_wraps_and_reports_cycle_time() {
        let mut s = sensor(0.0, 2.0, true);
        s.update(1.0);
        s.update(3.0);
        assert!(s.is_active());
        assert!((fraction(&s) - 0.5).abs() < 1e-6);
        assert_eq!(s.cycle_time.value().as_time(), Some(3.0));
    }

    #[test]
    fn stop_time_after_start_deactivates() {
        let mut s = sensor(0.0, 10.0, true);
        emit(&mut s.stop_time, 4.0);
        s.update(1.0);
        assert!(s.is_active());
        s.update(4.5);
        assert!(!s.is_active());
    }
}
