//! H-bridge output stage over embedded-hal pins.
//!
//! Matches VNH-style drivers: two direction inputs (`INA`, `INB`), a PWM
//! speed input and an enable line (`ENAB`).

use embedded_hal::{
    digital::{Error as _, OutputPin},
    pwm::{Error as _, SetDutyCycle},
};

use super::{Actuator, Direction, DriverError};

/// Direction pins, PWM channel and enable line of one H-bridge.
pub struct HBridge<InA, InB, Pwm, En> {
    ina: InA,
    inb: InB,
    pwm: Pwm,
    enab: En,
    /// Last direction written to `INA`/`INB`.
    direction: Direction,
}

impl<InA, InB, Pwm, En> HBridge<InA, InB, Pwm, En>
where
    InA: OutputPin,
    InB: OutputPin,
    Pwm: SetDutyCycle,
    En: OutputPin,
{
    pub fn new(
        ina: InA,
        inb: InB,
        pwm: Pwm,
        enab: En,
    ) -> Self {
        Self {
            ina,
            inb,
            pwm,
            enab,
            direction: Direction::Stop,
        }
    }

    /// Give the pins back, e.g. to reconfigure them for another use.
    pub fn release(self) -> (InA, InB, Pwm, En) {
        (self.ina, self.inb, self.pwm, self.enab)
    }

    fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), DriverError> {
        let (a, b) = match direction {
            Direction::Extend => (true, false),
            Direction::Retract => (false, true),
            Direction::Stop => (false, false),
        };
        self.ina
            .set_state(a.into())
            .map_err(|e| DriverError::Pin(e.kind()))?;
        self.inb
            .set_state(b.into())
            .map_err(|e| DriverError::Pin(e.kind()))?;
        self.direction = direction;
        Ok(())
    }

    fn set_duty(
        &mut self,
        duty: u16,
        full_scale: u16,
    ) -> Result<(), DriverError> {
        let max = self.pwm.max_duty_cycle();
        let scaled = if full_scale == 0 {
            0
        } else {
            (u32::from(duty.min(full_scale)) * u32::from(max) / u32::from(full_scale)) as u16
        };
        self.pwm
            .set_duty_cycle(scaled)
            .map_err(|e| DriverError::Pwm(e.kind()))
    }
}

impl<InA, InB, Pwm, En> Actuator for HBridge<InA, InB, Pwm, En>
where
    InA: OutputPin,
    InB: OutputPin,
    Pwm: SetDutyCycle,
    En: OutputPin,
{
    fn configure(&mut self) -> Result<(), DriverError> {
        self.set_direction(Direction::Stop)?;
        self.set_duty(0, 1)?;
        self.set_enabled(false)
    }

    fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), DriverError> {
        self.enab
            .set_state(enabled.into())
            .map_err(|e| DriverError::Pin(e.kind()))
    }

    fn drive(
        &mut self,
        direction: Direction,
        duty: u16,
        full_scale: u16,
    ) -> Result<(), DriverError> {
        // Duty is zero whenever the direction pins change.
        if direction == Direction::Stop || duty == 0 {
            self.set_duty(0, full_scale)?;
            return self.set_direction(Direction::Stop);
        }
        if direction != self.direction && self.direction != Direction::Stop {
            self.set_duty(0, full_scale)?;
        }
        self.set_direction(direction)?;
        self.set_duty(duty, full_scale)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::{cell::RefCell, convert::Infallible};
    use std::vec::Vec;

    #[derive(Default)]
    struct Pin(bool);

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0 = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0 = true;
            Ok(())
        }
    }

    struct Duty {
        max: u16,
        value: u16,
    }

    impl embedded_hal::pwm::ErrorType for Duty {
        type Error = Infallible;
    }

    impl SetDutyCycle for Duty {
        fn max_duty_cycle(&self) -> u16 {
            self.max
        }

        fn set_duty_cycle(
            &mut self,
            duty: u16,
        ) -> Result<(), Self::Error> {
            self.value = duty;
            Ok(())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Write {
        Ina(bool),
        Inb(bool),
        En(bool),
        Duty(u16),
    }

    /// Pin that appends every level it is set to a shared log.
    struct LogPin<'a>(&'a RefCell<Vec<Write>>, fn(bool) -> Write);

    impl embedded_hal::digital::ErrorType for LogPin<'_> {
        type Error = Infallible;
    }

    impl OutputPin for LogPin<'_> {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.borrow_mut().push((self.1)(false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.borrow_mut().push((self.1)(true));
            Ok(())
        }
    }

    struct LogDuty<'a>(&'a RefCell<Vec<Write>>);

    impl embedded_hal::pwm::ErrorType for LogDuty<'_> {
        type Error = Infallible;
    }

    impl SetDutyCycle for LogDuty<'_> {
        fn max_duty_cycle(&self) -> u16 {
            255
        }

        fn set_duty_cycle(
            &mut self,
            duty: u16,
        ) -> Result<(), Self::Error> {
            self.0.borrow_mut().push(Write::Duty(duty));
            Ok(())
        }
    }

    type LogBridge<'a> = HBridge<LogPin<'a>, LogPin<'a>, LogDuty<'a>, LogPin<'a>>;

    fn logged(log: &RefCell<Vec<Write>>) -> LogBridge<'_> {
        HBridge::new(
            LogPin(log, Write::Ina),
            LogPin(log, Write::Inb),
            LogDuty(log),
            LogPin(log, Write::En),
        )
    }

    fn bridge(max: u16) -> HBridge<Pin, Pin, Duty, Pin> {
        HBridge::new(
            Pin::default(),
            Pin::default(),
            Duty { max, value: 7 },
            Pin(true),
        )
    }

    #[test]
    fn configure_leaves_everything_off() {
        let mut hb = bridge(255);
        hb.configure().unwrap();
        let (a, b, pwm, en) = hb.release();
        assert!(!a.0 && !b.0 && !en.0);
        assert_eq!(pwm.value, 0);
    }

    #[test]
    fn extend_sets_ina() {
        let mut hb = bridge(255);
        hb.drive(Direction::Extend, 128, 255).unwrap();
        let (a, b, pwm, _) = hb.release();
        assert!(a.0 && !b.0);
        assert_eq!(pwm.value, 128);
    }

    #[test]
    fn retract_sets_inb() {
        let mut hb = bridge(255);
        hb.drive(Direction::Retract, 40, 255).unwrap();
        let (a, b, pwm, _) = hb.release();
        assert!(!a.0 && b.0);
        assert_eq!(pwm.value, 40);
    }

    #[test]
    fn duty_scales_to_peripheral_resolution() {
        let mut hb = bridge(1000);
        hb.drive(Direction::Extend, 255, 255).unwrap();
        let (_, _, pwm, _) = hb.release();
        assert_eq!(pwm.value, 1000);

        let mut hb = bridge(1000);
        hb.drive(Direction::Extend, 600, 255).unwrap();
        let (_, _, pwm, _) = hb.release();
        assert_eq!(pwm.value, 1000, "duty above full scale saturates");
    }

    #[test]
    fn zero_duty_releases_direction() {
        let mut hb = bridge(255);
        hb.drive(Direction::Extend, 100, 255).unwrap();
        hb.drive(Direction::Extend, 0, 255).unwrap();
        let (a, b, pwm, _) = hb.release();
        assert!(!a.0 && !b.0);
        assert_eq!(pwm.value, 0);
    }

    #[test]
    fn reversal_zeroes_duty_before_flipping_pins() {
        let log = RefCell::new(Vec::new());
        let mut hb = logged(&log);
        hb.drive(Direction::Extend, 255, 255).unwrap();
        log.borrow_mut().clear();

        hb.drive(Direction::Retract, 255, 255).unwrap();
        assert_eq!(
            *log.borrow(),
            [
                Write::Duty(0),
                Write::Ina(false),
                Write::Inb(true),
                Write::Duty(255),
            ]
        );
    }

    #[test]
    fn same_direction_updates_duty_in_place() {
        let log = RefCell::new(Vec::new());
        let mut hb = logged(&log);
        hb.drive(Direction::Retract, 50, 255).unwrap();
        assert_eq!(
            *log.borrow(),
            [Write::Ina(false), Write::Inb(true), Write::Duty(50)]
        );
        log.borrow_mut().clear();

        hb.drive(Direction::Retract, 200, 255).unwrap();
        assert_eq!(
            *log.borrow(),
            [Write::Ina(false), Write::Inb(true), Write::Duty(200)]
        );
    }
}
