use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use crate::config::{JOG_REPEAT_MS, PinConfig};
use crate::error::Result;
use crate::node::Command;
use crate::observation::ObservationKind;

// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, InputPin, Level};

#[cfg(test)]
// This is only used in testing, not compiled in release.
use crate::mocks::mock_gpio::{Gpio, InputPin, Level};

/// What the two buttons mean on this node.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Role {
    /// Button 1 sends the mount observation, button 2 the destination observation.
    Pointer,
    /// Button 1 raises both servos, button 2 lowers them, repeating while held.
    Mount,
}

/// Two pull-up push buttons, active low.
pub struct Buttons {
    button_1: InputPin,
    button_2: InputPin,
    role: Role,
    jog_step: f64,
    last: (bool, bool),
}

impl Buttons {
    pub fn new(pins: &PinConfig, role: Role, jog_step: f64) -> Result<Self> {
        let gpio = Gpio::new()?;

        let button_1 = gpio.get(pins.button_1)?.into_input_pullup();
        let button_2 = gpio.get(pins.button_2)?.into_input_pullup();

        thread::sleep(Duration::from_millis(100));

        info!(
            "listening on buttons (GPIO {} and {}) as {:?}",
            pins.button_1, pins.button_2, role
        );
        Ok(Self {
            button_1,
            button_2,
            role,
            jog_step,
            last: (false, false),
        })
    }

    pub fn read_buttons(&self) -> (bool, bool) {
        (
            self.button_1.read() == Level::Low,
            self.button_2.read() == Level::Low,
        )
    }

    /// Sample the buttons once and return the command they ask for, if any.
    ///
    /// Pointer captures fire on the press edge only. Mount jogs fire on every sample
    /// while a button is held.
    pub fn update(&mut self) -> Option<Command> {
        let (pressed_1, pressed_2) = self.read_buttons();
        let (was_1, was_2) = self.last;
        self.last = (pressed_1, pressed_2);

        match self.role {
            Role::Pointer => {
                if pressed_1 && !was_1 {
                    Some(Command::Capture(ObservationKind::Mount))
                } else if pressed_2 && !was_2 {
                    Some(Command::Capture(ObservationKind::Destination))
                } else {
                    None
                }
            }
            Role::Mount => {
                if pressed_1 {
                    Some(Command::Jog(self.jog_step))
                } else if pressed_2 {
                    Some(Command::Jog(-self.jog_step))
                } else {
                    None
                }
            }
        }
    }

    /// Poll the buttons on a helper thread, feeding commands into `commands`.
    ///
    /// The thread ends when the receiving side hangs up.
    pub fn spawn(mut self, commands: Sender<Command>) -> JoinHandle<()> {
        thread::spawn(move || {
            let period = Duration::from_millis(JOG_REPEAT_MS);
            loop {
                if let Some(command) = self.update() {
                    debug!("button: {:?}", command);
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                thread::sleep(period);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::mock_gpio;

    fn buttons(role: Role) -> Buttons {
        mock_gpio::reset_mock_pins();
        Buttons::new(&PinConfig::default(), role, 0.01).unwrap()
    }

    fn press(pin: u8) {
        mock_gpio::set_mock_pin_level(pin, mock_gpio::Level::Low);
    }

    fn release(pin: u8) {
        mock_gpio::set_mock_pin_level(pin, mock_gpio::Level::High);
    }

    #[test]
    fn test_buttons_start_released() {
        let mut ui = buttons(Role::Pointer);
        assert_eq!(ui.read_buttons(), (false, false));
        assert_eq!(ui.update(), None);
    }

    #[test]
    fn test_pointer_captures_on_press_edge() {
        let pins = PinConfig::default();
        let mut ui = buttons(Role::Pointer);

        press(pins.button_1);
        assert_eq!(ui.update(), Some(Command::Capture(ObservationKind::Mount)));
        // held, no repeat
        assert_eq!(ui.update(), None);
        release(pins.button_1);
        assert_eq!(ui.update(), None);

        press(pins.button_2);
        assert_eq!(
            ui.update(),
            Some(Command::Capture(ObservationKind::Destination))
        );
    }

    #[test]
    fn test_mount_jogs_while_held() {
        let pins = PinConfig::default();
        let mut ui = buttons(Role::Mount);

        press(pins.button_1);
        for _ in 0..3 {
            assert_eq!(ui.update(), Some(Command::Jog(0.01)));
        }
        release(pins.button_1);
        press(pins.button_2);
        assert_eq!(ui.update(), Some(Command::Jog(-0.01)));
        release(pins.button_2);
        assert_eq!(ui.update(), None);
    }

    #[test]
    fn test_button_1_wins_when_both_held() {
        let pins = PinConfig::default();
        let mut ui = buttons(Role::Mount);
        press(pins.button_1);
        press(pins.button_2);
        assert_eq!(ui.update(), Some(Command::Jog(0.01)));
    }
}
