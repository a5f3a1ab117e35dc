// This file is only compiled during tests

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::Result;

thread_local! {
    static MOCK_PWM_DUTY: RefCell<HashMap<u8, f64>> = RefCell::new(HashMap::new());
}

pub struct Pwm {
    pin: u8,
}

impl Pwm {
    pub fn new(pin: u8) -> Result<Self> {
        Ok(Pwm { pin })
    }

    pub fn set_duty_cycle(&self, duty_cycle: f64) -> Result<()> {
        MOCK_PWM_DUTY.with(|duty| {
            duty.borrow_mut().insert(self.pin, duty_cycle);
        });
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        MOCK_PWM_DUTY.with(|duty| {
            duty.borrow_mut().remove(&self.pin);
        });
        Ok(())
    }
}

// Test helper: last duty cycle written to `pin`, if the channel is enabled
pub fn get_mock_duty_cycle(pin: u8) -> Option<f64> {
    MOCK_PWM_DUTY.with(|duty| duty.borrow().get(&pin).copied())
}
