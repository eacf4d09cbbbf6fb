/*!
 # Light functions

 This module defines the lighting effects the string lights support.
 Each function is sent to the device as its wire code.
*/

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Represents the light functions of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Function {
    /// Leave the current function unchanged, only valid for timers
    Keep = 0,
    /// Cycles through all other functions
    Combination = 1,
    /// Brightness rolls through the string in waves
    InWaves = 2,
    /// Lights turn on one after another
    Sequential = 3,
    /// Slow glow in and out
    SloGlo = 4,
    /// Chasing lights
    Chasing = 5,
    /// Slow fade in and out
    SlowFade = 6,
    /// Twinkling lights
    Twinkle = 7,
    /// Steady light
    Steady = 8,
    /// Alternating flash, speed controlled by flash speed
    FlashAlternating = 9,
    /// Synchronous flash, speed controlled by flash speed
    FlashSynchronous = 10,
}

impl Function {
    /// All functions in wire code order
    pub const ALL: [Function; 11] = [
        Function::Keep,
        Function::Combination,
        Function::InWaves,
        Function::Sequential,
        Function::SloGlo,
        Function::Chasing,
        Function::SlowFade,
        Function::Twinkle,
        Function::Steady,
        Function::FlashAlternating,
        Function::FlashSynchronous,
    ];

    /// Wire code of the function
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the function flashes, flash functions can't be used with timers
    pub const fn is_flash(self) -> bool {
        matches!(self, Function::FlashAlternating | Function::FlashSynchronous)
    }

    /// Looks up a function by its wire code
    pub fn from_code(code: u8) -> Option<Function> {
        Self::ALL.get(code as usize).copied()
    }

    /// Short lowercase name used on the command line
    pub const fn name(self) -> &'static str {
        match self {
            Function::Keep => "keep",
            Function::Combination => "combination",
            Function::InWaves => "in_waves",
            Function::Sequential => "sequential",
            Function::SloGlo => "slo_glo",
            Function::Chasing => "chasing",
            Function::SlowFade => "slow_fade",
            Function::Twinkle => "twinkle",
            Function::Steady => "steady",
            Function::FlashAlternating => "flash_alternating",
            Function::FlashSynchronous => "flash_synchronous",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        if let Ok(code) = normalized.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| Error::Parse(format!("unknown function code {code}")));
        }
        Self::ALL
            .into_iter()
            .find(|function| function.name() == normalized)
            .ok_or_else(|| Error::Parse(format!("unknown function '{s}'")))
    }
}
