/*!
 # Command payloads

 Builders for the plaintext payloads understood by the device. Every
 payload starts with the magic byte `0xBC` followed by the command code,
 and is zero padded to a fixed length: 9 bytes, or 10 bytes for timers.

 The builders only validate and serialize. Payloads are obfuscated with
 [`crate::codec::encode`] before they are sent.
*/

use chrono::{Datelike, Timelike};
use thiserror::Error;

use crate::function::Function;
use crate::schedule::Repeat;

/// First byte of every plaintext payload
pub const MAGIC_BYTE: u8 = 0xBC;

/// Highest accepted brightness and flash speed
pub const MAX_PERCENT: u8 = 100;

/// Flash speeds below this value are raised to it
pub const MIN_FLASH_SPEED: u8 = 4;

/// Number of timers built into the device
pub const TIMER_SLOTS: u8 = 8;

/// Length of every payload except timers
const PAYLOAD_LEN: usize = Command::OnOff.payload_len();

/// Length of a timer payload
const TIMER_PAYLOAD_LEN: usize = Command::Timer.payload_len();

/// Commands which can be sent to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    OnOff = 1,
    Control = 2,
    SetPassword = 3,
    PasswordInput = 4,
    Timer = 5,
    Rtc = 6,
}

impl Command {
    /// Wire code of the command
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Total payload length including magic and command bytes
    pub const fn payload_len(self) -> usize {
        match self {
            Command::Timer => 10,
            _ => 9,
        }
    }
}

/// Errors raised for command parameters the device doesn't accept
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("function Keep can only be used with timers")]
    KeepNotAllowed,

    #[error("function {0} can't be used with timers")]
    FlashNotAllowedInTimer(Function),

    #[error("the password must consist of exactly six digits")]
    InvalidPassword,
}

fn check_range(field: &'static str, value: u8, max: u8) -> Result<u8, ValidationError> {
    if value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: 0,
            max,
        });
    }
    Ok(value)
}

/// Lays out a 9 byte payload for `command`
fn payload(command: Command, fields: [u8; PAYLOAD_LEN - 2]) -> [u8; PAYLOAD_LEN] {
    let mut bytes = [0u8; PAYLOAD_LEN];
    bytes[0] = MAGIC_BYTE;
    bytes[1] = command.code();
    bytes[2..].copy_from_slice(&fields);
    bytes
}

/// Turns the device on or off
pub fn on_off(on: bool) -> [u8; PAYLOAD_LEN] {
    payload(Command::OnOff, [on as u8, 0, 0, 0, 0, 0, 0])
}

/// Sets the function, brightness and flash speed of the device
///
/// # Arguments
///
/// * `function` - Any function except [`Function::Keep`]
/// * `brightness` - 0 (dim) to 100 (bright)
/// * `flash_speed` - 0 (slow) to 100 (fast), only affects the flash functions
pub fn control(
    function: Function,
    brightness: u8,
    flash_speed: u8,
) -> Result<[u8; PAYLOAD_LEN], ValidationError> {
    if function == Function::Keep {
        return Err(ValidationError::KeepNotAllowed);
    }
    let brightness = check_range("brightness", brightness, MAX_PERCENT)?;
    let flash_speed = check_range("flash speed", flash_speed, MAX_PERCENT)?;

    // The device counts the other way round and faults on values above 96
    let flash = MAX_PERCENT - flash_speed.max(MIN_FLASH_SPEED);

    Ok(payload(
        Command::Control,
        [function.code(), brightness, flash, 0, 0, 0, 0],
    ))
}

fn password_bytes(password: &str) -> Result<[u8; 4], ValidationError> {
    if password.len() != 6 || !password.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidPassword);
    }
    let number: u32 = password
        .parse()
        .map_err(|_| ValidationError::InvalidPassword)?;
    Ok(number.to_be_bytes())
}

/// Authenticates with the device, must be the first message after connecting
///
/// The password must consist of exactly six ASCII digits.
pub fn password_input(password: &str) -> Result<[u8; PAYLOAD_LEN], ValidationError> {
    let [b0, b1, b2, b3] = password_bytes(password)?;
    Ok(payload(Command::PasswordInput, [b0, b1, b2, b3, 0, 0, 0]))
}

/// Changes the password of the device
///
/// The password must consist of exactly six ASCII digits.
pub fn set_password(password: &str) -> Result<[u8; PAYLOAD_LEN], ValidationError> {
    let [b0, b1, b2, b3] = password_bytes(password)?;
    Ok(payload(Command::SetPassword, [b0, b1, b2, b3, 0, 0, 0]))
}

/// One of the device's built-in timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    /// Timer number (0-7)
    pub slot: u8,
    /// Whether the timer is enabled
    pub active: bool,
    /// Turn the device on (`true`) or off (`false`) when triggered
    pub turn_on: bool,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Function set when triggered, flash functions are not allowed
    pub function: Function,
    /// Days on which the timer repeats
    pub repeat: Repeat,
    /// Brightness set when triggered (0-100)
    pub brightness: u8,
}

impl Timer {
    /// Creates an active timer turning the device on with a steady light at full brightness
    pub fn new(slot: u8, hour: u8, minute: u8) -> Self {
        Self {
            slot,
            active: true,
            turn_on: true,
            hour,
            minute,
            function: Function::Steady,
            repeat: Repeat::NONE,
            brightness: MAX_PERCENT,
        }
    }

    /// Creates an inactive timer for `slot`
    pub fn inactive(slot: u8) -> Self {
        Self::new(slot, 0, 0).active(false).turn_on(false)
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn turn_on(mut self, turn_on: bool) -> Self {
        self.turn_on = turn_on;
        self
    }

    pub fn function(mut self, function: Function) -> Self {
        self.function = function;
        self
    }

    pub fn repeat(mut self, repeat: impl Into<Repeat>) -> Self {
        self.repeat = repeat.into();
        self
    }

    pub fn brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }
}

/// Configures one of the device's timers
///
/// The device's clock must be set with [`rtc`] for timers to trigger at the right time.
pub fn timer(timer: &Timer) -> Result<[u8; TIMER_PAYLOAD_LEN], ValidationError> {
    let slot = check_range("timer slot", timer.slot, TIMER_SLOTS - 1)?;
    let hour = check_range("hour", timer.hour, 23)?;
    let minute = check_range("minute", timer.minute, 59)?;
    if timer.function.is_flash() {
        return Err(ValidationError::FlashNotAllowedInTimer(timer.function));
    }
    let brightness = check_range("brightness", timer.brightness, MAX_PERCENT)?;

    Ok([
        MAGIC_BYTE,
        Command::Timer.code(),
        slot,
        timer.turn_on as u8,
        timer.active as u8,
        hour,
        minute,
        timer.repeat.mask(),
        timer.function.code(),
        brightness,
    ])
}

/// Sets the device's real time clock
pub fn rtc<T: Datelike + Timelike>(time: &T) -> [u8; PAYLOAD_LEN] {
    let [year_lo, year_hi] = (time.year() as u16).to_le_bytes();
    payload(
        Command::Rtc,
        [
            time.second() as u8,
            time.minute() as u8,
            time.hour() as u8,
            time.day() as u8,
            time.month() as u8,
            year_lo,
            year_hi,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Weekday;
    use chrono::NaiveDate;

    #[test]
    fn test_payload_lengths() {
        assert_eq!(on_off(true).len(), Command::OnOff.payload_len());
        assert_eq!(
            control(Function::Steady, 0, 0).unwrap().len(),
            Command::Control.payload_len()
        );
        assert_eq!(
            timer(&Timer::new(0, 0, 0)).unwrap().len(),
            Command::Timer.payload_len()
        );
    }

    #[test]
    fn test_on_off() {
        assert_eq!(
            on_off(true),
            [0xBC, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            on_off(false),
            [0xBC, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_control() {
        let cases = [
            (Function::Combination, 0x23, 0x44, [0x01, 0x23, 0x20]),
            (Function::InWaves, 0x01, 0x00, [0x02, 0x01, 0x60]),
            (Function::Sequential, 0x00, 0x08, [0x03, 0x00, 0x5C]),
            (Function::SloGlo, 0x64, 0x12, [0x04, 0x64, 0x52]),
            (Function::Chasing, 0x63, 0x64, [0x05, 0x63, 0x00]),
            (Function::SlowFade, 0x19, 0x55, [0x06, 0x19, 0x0F]),
            (Function::Twinkle, 0x37, 0x01, [0x07, 0x37, 0x60]),
            (Function::Steady, 0x45, 0x63, [0x08, 0x45, 0x01]),
            (Function::FlashAlternating, 0x57, 0x50, [0x09, 0x57, 0x14]),
            (Function::FlashSynchronous, 0x0F, 0x28, [0x0A, 0x0F, 0x3C]),
        ];
        for (function, brightness, speed, [code, bri, flash]) in cases {
            assert_eq!(
                control(function, brightness, speed).unwrap(),
                [0xBC, 0x02, code, bri, flash, 0x00, 0x00, 0x00, 0x00]
            );
        }
    }

    #[test]
    fn test_control_flash_speed_clamp() {
        for speed in 0..=4 {
            assert_eq!(control(Function::Chasing, 50, speed).unwrap()[4], 0x60);
        }
        assert_eq!(control(Function::Chasing, 50, 5).unwrap()[4], 0x5F);
    }

    #[test]
    fn test_control_invalid() {
        assert_eq!(
            control(Function::InWaves, 101, 33),
            Err(ValidationError::OutOfRange {
                field: "brightness",
                value: 101,
                min: 0,
                max: 100
            })
        );
        assert_eq!(
            control(Function::Sequential, 56, 101),
            Err(ValidationError::OutOfRange {
                field: "flash speed",
                value: 101,
                min: 0,
                max: 100
            })
        );
        assert_eq!(
            control(Function::Keep, 79, 12),
            Err(ValidationError::KeepNotAllowed)
        );
    }

    #[test]
    fn test_password_input() {
        let cases = [
            ("123456", [0x00, 0x01, 0xE2, 0x40]),
            ("000000", [0x00, 0x00, 0x00, 0x00]),
            ("999999", [0x00, 0x0F, 0x42, 0x3F]),
            ("650238", [0x00, 0x09, 0xEB, 0xFE]),
        ];
        for (password, [b0, b1, b2, b3]) in cases {
            assert_eq!(
                password_input(password).unwrap(),
                [0xBC, 0x04, b0, b1, b2, b3, 0x00, 0x00, 0x00]
            );
            assert_eq!(
                set_password(password).unwrap(),
                [0xBC, 0x03, b0, b1, b2, b3, 0x00, 0x00, 0x00]
            );
        }
    }

    #[test]
    fn test_password_invalid() {
        for password in ["1234567", "", "-123", "12345", "+12345", "12a456", "١٢٣٤٥٦"] {
            assert_eq!(
                password_input(password),
                Err(ValidationError::InvalidPassword)
            );
            assert_eq!(set_password(password), Err(ValidationError::InvalidPassword));
        }
    }

    #[test]
    fn test_timer() {
        let t = Timer::new(0, 12, 12)
            .turn_on(false)
            .function(Function::InWaves)
            .repeat(Weekday::Saturday | Weekday::Sunday);
        assert_eq!(
            timer(&t).unwrap(),
            [0xBC, 0x05, 0x00, 0x00, 0x01, 0x0C, 0x0C, 0x41, 0x02, 0x64]
        );

        let t = Timer::new(1, 16, 57)
            .active(false)
            .function(Function::Sequential)
            .repeat(Repeat::WEEKDAYS)
            .brightness(53);
        assert_eq!(
            timer(&t).unwrap(),
            [0xBC, 0x05, 0x01, 0x01, 0x00, 0x10, 0x39, 0x3E, 0x03, 0x35]
        );

        let t = Timer::new(6, 14, 3)
            .function(Function::Keep)
            .repeat(Weekday::Monday | Weekday::Tuesday | Weekday::Sunday)
            .brightness(10);
        assert_eq!(
            timer(&t).unwrap(),
            [0xBC, 0x05, 0x06, 0x01, 0x01, 0x0E, 0x03, 0x07, 0x00, 0x0A]
        );

        let t = t.repeat(Repeat::NONE);
        assert_eq!(
            timer(&t).unwrap(),
            [0xBC, 0x05, 0x06, 0x01, 0x01, 0x0E, 0x03, 0x00, 0x00, 0x0A]
        );
    }

    #[test]
    fn test_timer_repeat_order() {
        let forward: Repeat = Weekday::ALL.into_iter().collect();
        let backward: Repeat = Weekday::ALL.into_iter().rev().collect();
        let a = timer(&Timer::new(2, 8, 0).repeat(forward)).unwrap();
        let b = timer(&Timer::new(2, 8, 0).repeat(backward)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[7], 0x7F);
    }

    #[test]
    fn test_timer_upper_bounds() {
        let t = Timer::new(TIMER_SLOTS - 1, 23, 59).brightness(MAX_PERCENT);
        assert_eq!(
            timer(&t).unwrap(),
            [0xBC, 0x05, 0x07, 0x01, 0x01, 0x17, 0x3B, 0x00, 0x08, 0x64]
        );
        assert_eq!(control(Function::Steady, 100, 100).unwrap()[3..5], [0x64, 0x00]);
    }

    #[test]
    fn test_timer_invalid() {
        let out_of_range = |field, value, max| {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: 0,
                max,
            })
        };

        assert_eq!(timer(&Timer::new(8, 1, 1)), out_of_range("timer slot", 8, 7));
        assert_eq!(timer(&Timer::new(0, 24, 1)), out_of_range("hour", 24, 23));
        assert_eq!(timer(&Timer::new(0, 1, 60)), out_of_range("minute", 60, 59));
        assert_eq!(
            timer(&Timer::new(0, 1, 1).brightness(101)),
            out_of_range("brightness", 101, 100)
        );

        for function in [Function::FlashAlternating, Function::FlashSynchronous] {
            assert_eq!(
                timer(&Timer::new(0, 1, 1).function(function)),
                Err(ValidationError::FlashNotAllowedInTimer(function))
            );
        }
    }

    #[test]
    fn test_rtc() {
        let cases = [
            ((2022, 11, 4, 9, 19, 27), [0x1B, 0x13, 0x09, 0x04, 0x0B, 0xE6, 0x07]),
            ((2013, 1, 1, 1, 7, 6), [0x06, 0x07, 0x01, 0x01, 0x01, 0xDD, 0x07]),
            ((2023, 12, 31, 23, 59, 58), [0x3A, 0x3B, 0x17, 0x1F, 0x0C, 0xE7, 0x07]),
            ((2048, 5, 24, 16, 43, 0), [0x00, 0x2B, 0x10, 0x18, 0x05, 0x00, 0x08]),
        ];
        for ((year, month, day, hour, minute, second), fields) in cases {
            let time = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| date.and_hms_opt(hour, minute, second))
                .unwrap();
            let mut expected = vec![0xBC, 0x06];
            expected.extend_from_slice(&fields);
            assert_eq!(rtc(&time).to_vec(), expected);
        }
    }
}
