use std::fmt;

use serde_derive::Serialize;

/// Raw status byte reported by an endpoint.
///
/// Each flag is independent; a cleared bit means the condition is false.
/// A failed read is represented as `Option::<StatusFlags>::None` by callers,
/// never as a zero byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const TAG_PRESENT: u8 = 0x01;
    pub const TIMER_RUNNING: u8 = 0x02;
    pub const ALARM_ACTIVE: u8 = 0x04;

    pub const fn from_bits(bits: u8) -> Self {
        StatusFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn tag_present(self) -> bool {
        self.0 & Self::TAG_PRESENT != 0
    }

    pub const fn timer_running(self) -> bool {
        self.0 & Self::TIMER_RUNNING != 0
    }

    pub const fn alarm_active(self) -> bool {
        self.0 & Self::ALARM_ACTIVE != 0
    }
}

impl From<u8> for StatusFlags {
    fn from(bits: u8) -> Self {
        StatusFlags(bits)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0b{:03b} (tag={}, timer={}, alarm={})",
            self.0,
            self.tag_present(),
            self.timer_running(),
            self.alarm_active()
        )
    }
}

/// Commands accepted by the endpoint command register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Nop,
    StopAlarm,
    ClearTagList,
    AddTag,
}

impl Command {
    pub const fn code(self) -> u8 {
        match self {
            Command::Nop => 0x00,
            Command::StopAlarm => 0x01,
            Command::ClearTagList => 0x02,
            Command::AddTag => 0x03,
        }
    }
}
