// Stand-ins for rppal, swapped in with #[cfg(test)] imports.

pub mod mock_gpio;
pub mod mock_pwm;
