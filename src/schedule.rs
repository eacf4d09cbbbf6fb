/*!
 # Timer repeat days

 Timers on the device repeat on a set of weekdays, sent as a single
 bitmask byte. Sunday is the lowest bit, bit 7 is unused.
*/

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::Error;

/// Days of the week with their bit in the repeat mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Weekday {
    Sunday = 0x01,
    Monday = 0x02,
    Tuesday = 0x04,
    Wednesday = 0x08,
    Thursday = 0x10,
    Friday = 0x20,
    Saturday = 0x40,
}

impl Weekday {
    /// All weekdays, starting on Sunday
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// Bit of the day in the repeat mask
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// Set of weekdays on which a timer repeats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Repeat(u8);

impl Repeat {
    /// No repeat (0x00)
    pub const NONE: Repeat = Repeat(0x00);
    /// Monday to Friday (0x3E)
    pub const WEEKDAYS: Repeat = Repeat(0x02 | 0x04 | 0x08 | 0x10 | 0x20);
    /// Saturday and Sunday (0x41)
    pub const WEEKEND: Repeat = Repeat(0x40 | 0x01);
    /// Every day (0x7F)
    pub const EVERYDAY: Repeat = Repeat(0x7F);

    /// Bitmask sent to the device
    pub const fn mask(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, day: Weekday) -> bool {
        self.0 & day.bit() != 0
    }

    /// Returns the set with `day` added
    pub const fn with(self, day: Weekday) -> Repeat {
        Repeat(self.0 | day.bit())
    }

    /// Iterates over the contained days, starting on Sunday
    pub fn days(self) -> impl Iterator<Item = Weekday> {
        Weekday::ALL.into_iter().filter(move |day| self.contains(*day))
    }
}

impl From<Weekday> for Repeat {
    fn from(day: Weekday) -> Self {
        Repeat(day.bit())
    }
}

impl BitOr for Repeat {
    type Output = Repeat;

    fn bitor(self, rhs: Repeat) -> Repeat {
        Repeat(self.0 | rhs.0)
    }
}

impl BitOr<Weekday> for Repeat {
    type Output = Repeat;

    fn bitor(self, rhs: Weekday) -> Repeat {
        self.with(rhs)
    }
}

impl BitOr for Weekday {
    type Output = Repeat;

    fn bitor(self, rhs: Weekday) -> Repeat {
        Repeat::from(self).with(rhs)
    }
}

impl BitOrAssign<Weekday> for Repeat {
    fn bitor_assign(&mut self, rhs: Weekday) {
        *self = self.with(rhs);
    }
}

impl FromIterator<Weekday> for Repeat {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Repeat::NONE, Repeat::with)
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Repeat::NONE => f.write_str("none"),
            Repeat::EVERYDAY => f.write_str("everyday"),
            Repeat::WEEKDAYS => f.write_str("weekdays"),
            Repeat::WEEKEND => f.write_str("weekend"),
            _ => {
                let names: Vec<_> = self.days().map(day_name).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sunday => "sun",
        Weekday::Monday => "mon",
        Weekday::Tuesday => "tue",
        Weekday::Wednesday => "wed",
        Weekday::Thursday => "thu",
        Weekday::Friday => "fri",
        Weekday::Saturday => "sat",
    }
}

impl FromStr for Weekday {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sun" | "sunday" => Ok(Weekday::Sunday),
            "mon" | "monday" => Ok(Weekday::Monday),
            "tue" | "tuesday" => Ok(Weekday::Tuesday),
            "wed" | "wednesday" => Ok(Weekday::Wednesday),
            "thu" | "thursday" => Ok(Weekday::Thursday),
            "fri" | "friday" => Ok(Weekday::Friday),
            "sat" | "saturday" => Ok(Weekday::Saturday),
            _ => Err(Error::Parse(format!("unknown day '{s}'"))),
        }
    }
}

/// Parses `mon`, `monday`, `all`, `weekdays`, `weekend`, `none` and
/// comma separated combinations like `mon,wed,weekend`
impl FromStr for Repeat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut repeat = Repeat::NONE;
        for part in s.split(',') {
            repeat = repeat
                | match part.trim().to_lowercase().as_str() {
                    "" | "none" => Repeat::NONE,
                    "all" | "everyday" | "daily" => Repeat::EVERYDAY,
                    "weekdays" => Repeat::WEEKDAYS,
                    "weekend" => Repeat::WEEKEND,
                    _ => part.parse::<Weekday>()?.into(),
                };
        }
        Ok(repeat)
    }
}
