//! Frame content parsing and outbound line encoding.
//!
//! Inbound frame contents (markers already stripped):
//!
//! | content        | meaning                        |
//! |----------------|--------------------------------|
//! | `ADC:<0-100>`  | volume knob position           |
//! | `BTN:<1-4>`    | button press, see [`HardwareButton`] |
//!
//! Whitespace around the integer is ignored. Anything else is a [`FrameError`].

use std::fmt;

use thiserror::Error;

pub const VOLUME_MIN: i64 = 0;
pub const VOLUME_MAX: i64 = 100;

/// Buttons on the controller board, numbered as the firmware sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HardwareButton {
    TogglePlayPause = 1,
    Next = 2,
    Previous = 3,
    Quit = 4,
}

impl HardwareButton {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for HardwareButton {
    type Error = FrameError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(HardwareButton::TogglePlayPause),
            2 => Ok(HardwareButton::Next),
            3 => Ok(HardwareButton::Previous),
            4 => Ok(HardwareButton::Quit),
            other => Err(FrameError::ButtonOutOfRange(other)),
        }
    }
}

/// A validated event from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    Volume(u8),
    Button(HardwareButton),
}

/// Why a frame was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    NotUtf8,
    #[error("frame has no TAG:value separator")]
    MissingSeparator,
    #[error("unknown frame tag {0:?}")]
    UnknownTag(String),
    #[error("frame value {0:?} is not an integer")]
    InvalidValue(String),
    #[error("ADC value {0} outside 0-100")]
    VolumeOutOfRange(i64),
    #[error("button id {0} outside 1-4")]
    ButtonOutOfRange(i64),
}

/// Parse the content between two markers.
pub fn parse_frame(content: &[u8]) -> Result<InboundMessage, FrameError> {
    let text = std::str::from_utf8(content).map_err(|_| FrameError::NotUtf8)?;
    let (tag, raw_value) = text.split_once(':').ok_or(FrameError::MissingSeparator)?;
    let raw_value = raw_value.trim();

    match tag {
        "ADC" => {
            let value = parse_int(raw_value)?;
            if (VOLUME_MIN..=VOLUME_MAX).contains(&value) {
                Ok(InboundMessage::Volume(value as u8))
            } else {
                Err(FrameError::VolumeOutOfRange(value))
            }
        }
        "BTN" => {
            let value = parse_int(raw_value)?;
            HardwareButton::try_from(value).map(InboundMessage::Button)
        }
        other => Err(FrameError::UnknownTag(other.to_string())),
    }
}

// Digits with an optional leading '-'; `str::parse` alone would also take '+'.
fn parse_int(raw: &str) -> Result<i64, FrameError> {
    if raw.starts_with('+') {
        return Err(FrameError::InvalidValue(raw.to_string()));
    }
    raw.parse::<i64>()
        .map_err(|_| FrameError::InvalidValue(raw.to_string()))
}

/// Lines sent from the host to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Song { title: String, artist: String },
    State { playing: bool },
}

impl OutboundMessage {
    /// Wire form, newline-terminated.
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundMessage::Song { title, artist } => {
                write!(f, "SONG|{}|{}", single_line(title), single_line(artist))
            }
            OutboundMessage::State { playing: true } => f.write_str("STATE|PLAYING"),
            OutboundMessage::State { playing: false } => f.write_str("STATE|PAUSED"),
        }
    }
}

// An embedded line break would end the line early on the board side.
fn single_line(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains(['\n', '\r']) {
        s.replace(['\n', '\r'], " ").into()
    } else {
        s.into()
    }
}
