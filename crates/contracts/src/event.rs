//! Event - the canonical sensor observation
//!
//! One line of a board log. Created by ingestion, consumed once by the
//! colony or the tube event detector. Only the world timestamp may be
//! written after construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ContractError, TagId, TubeId};

/// Event type column (`event_type` in the log line)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Rfid,
    Beam,
    TouchRaw,
    Sync,
    AnalogPd,
}

impl EventType {
    /// Numeric code written by the boards
    pub fn code(self) -> u8 {
        match self {
            EventType::Rfid => 0,
            EventType::Beam => 1,
            EventType::TouchRaw => 2,
            EventType::Sync => 3,
            EventType::AnalogPd => 4,
        }
    }

    /// Decode the numeric event type column
    pub fn from_code(code: i64) -> Result<Self, ContractError> {
        match code {
            0 => Ok(EventType::Rfid),
            1 => Ok(EventType::Beam),
            2 => Ok(EventType::TouchRaw),
            3 => Ok(EventType::Sync),
            4 => Ok(EventType::AnalogPd),
            _ => Err(ContractError::UnknownEventType { code }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Rfid => "rfid",
            EventType::Beam => "beam",
            EventType::TouchRaw => "touch_raw",
            EventType::Sync => "sync",
            EventType::AnalogPd => "analog_pd",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag-in-range edge reported by readers that expose the antenna signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfidEdge {
    /// Tag entered antenna range (`r`)
    Rise,
    /// Tag left antenna range (`f`)
    Fall,
}

/// RFID payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfidSignal {
    /// A decoded tag. `valid` is false when the reader flagged a checksum error.
    Tag { tag: TagId, valid: bool },
    /// Antenna range edge, carries no tag
    Edge(RfidEdge),
}

/// Beam side (data0 of a beam event)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamSide {
    Left,
    Right,
}

impl BeamSide {
    pub fn code(self) -> u8 {
        match self {
            BeamSide::Left => 0,
            BeamSide::Right => 1,
        }
    }
}

/// Beam state (data1 of a beam event)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamState {
    Unbroken,
    Broken,
}

impl BeamState {
    pub fn code(self) -> u8 {
        match self {
            BeamState::Unbroken => 0,
            BeamState::Broken => 1,
        }
    }
}

/// Typed data0 / data1 columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Rfid(RfidSignal),
    Beam { side: BeamSide, state: BeamState },
    TouchRaw { left: i64, right: i64 },
    Sync { data0: i64, data1: i64 },
    AnalogPd { data0: i64, data1: i64 },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Rfid(_) => EventType::Rfid,
            EventPayload::Beam { .. } => EventType::Beam,
            EventPayload::TouchRaw { .. } => EventType::TouchRaw,
            EventPayload::Sync { .. } => EventType::Sync,
            EventPayload::AnalogPd { .. } => EventType::AnalogPd,
        }
    }
}

/// One sensor observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Board tick counter (milliseconds, wraps at 2^32)
    timestamp: u32,

    /// Board id, equal to the tube index
    board: TubeId,

    payload: EventPayload,

    /// Synchronized time (ms), set by the colony clock
    world_timestamp: Option<f64>,
}

impl Event {
    pub fn new(timestamp: u32, board: TubeId, payload: EventPayload) -> Self {
        Self {
            timestamp,
            board,
            payload,
            world_timestamp: None,
        }
    }

    /// A valid tag read
    pub fn rfid(timestamp: u32, board: TubeId, tag: impl Into<TagId>) -> Self {
        Self::new(
            timestamp,
            board,
            EventPayload::Rfid(RfidSignal::Tag {
                tag: tag.into(),
                valid: true,
            }),
        )
    }

    /// A tag read the reader flagged as corrupt
    pub fn rfid_invalid(timestamp: u32, board: TubeId, tag: impl Into<TagId>) -> Self {
        Self::new(
            timestamp,
            board,
            EventPayload::Rfid(RfidSignal::Tag {
                tag: tag.into(),
                valid: false,
            }),
        )
    }

    pub fn rfid_edge(timestamp: u32, board: TubeId, edge: RfidEdge) -> Self {
        Self::new(timestamp, board, EventPayload::Rfid(RfidSignal::Edge(edge)))
    }

    pub fn beam(timestamp: u32, board: TubeId, side: BeamSide, state: BeamState) -> Self {
        Self::new(timestamp, board, EventPayload::Beam { side, state })
    }

    pub fn sync(timestamp: u32, board: TubeId) -> Self {
        Self::new(timestamp, board, EventPayload::Sync { data0: 0, data1: 0 })
    }

    /// Attach a pre-computed world timestamp (builder form)
    pub fn with_world_timestamp(mut self, world_timestamp: f64) -> Self {
        self.world_timestamp = Some(world_timestamp);
        self
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    #[inline]
    pub fn board(&self) -> TubeId {
        self.board
    }

    #[inline]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    #[inline]
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    #[inline]
    pub fn world_timestamp(&self) -> Option<f64> {
        self.world_timestamp
    }

    /// World time, falling back to the raw tick count for unstamped events
    #[inline]
    pub fn world_time(&self) -> f64 {
        self.world_timestamp.unwrap_or(self.timestamp as f64)
    }

    /// Write the synchronized timestamp. The only mutation an event allows.
    pub fn annotate_world_timestamp(&mut self, world_timestamp: f64) {
        self.world_timestamp = Some(world_timestamp);
    }

    /// Tag of a valid RFID read
    pub fn valid_tag(&self) -> Option<&TagId> {
        match &self.payload {
            EventPayload::Rfid(RfidSignal::Tag { tag, valid: true }) => Some(tag),
            _ => None,
        }
    }

    /// data0 column as written to the log
    pub fn data0(&self) -> String {
        match &self.payload {
            EventPayload::Rfid(RfidSignal::Tag { tag, .. }) => tag.to_string(),
            EventPayload::Rfid(RfidSignal::Edge(RfidEdge::Rise)) => "r".to_string(),
            EventPayload::Rfid(RfidSignal::Edge(RfidEdge::Fall)) => "f".to_string(),
            EventPayload::Beam { side, .. } => side.code().to_string(),
            EventPayload::TouchRaw { left, .. } => left.to_string(),
            EventPayload::Sync { data0, .. } | EventPayload::AnalogPd { data0, .. } => {
                data0.to_string()
            }
        }
    }

    /// data1 column as written to the log
    pub fn data1(&self) -> String {
        match &self.payload {
            EventPayload::Rfid(RfidSignal::Tag { valid, .. }) => {
                let flag = if *valid { "0" } else { "1" };
                flag.to_string()
            }
            EventPayload::Rfid(RfidSignal::Edge(_)) => "1".to_string(),
            EventPayload::Beam { state, .. } => state.code().to_string(),
            EventPayload::TouchRaw { right, .. } => right.to_string(),
            EventPayload::Sync { data1, .. } | EventPayload::AnalogPd { data1, .. } => {
                data1.to_string()
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{:x},{},{},{}",
            self.timestamp,
            self.board,
            self.event_type().code(),
            self.data0(),
            self.data1()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_codes() {
        for code in 0..5 {
            let et = EventType::from_code(code).unwrap();
            assert_eq!(et.code() as i64, code);
        }
        assert!(matches!(
            EventType::from_code(9),
            Err(ContractError::UnknownEventType { code: 9 })
        ));
    }

    #[test]
    fn test_world_time_fallback() {
        let mut e = Event::rfid(1200, 2, "ab12");
        assert_eq!(e.world_timestamp(), None);
        assert_eq!(e.world_time(), 1200.0);
        e.annotate_world_timestamp(5.0e5);
        assert_eq!(e.world_time(), 5.0e5);
    }

    #[test]
    fn test_valid_tag_only_for_valid_reads() {
        assert_eq!(
            Event::rfid(0, 0, "ab12").valid_tag().map(|t| t.as_str()),
            Some("AB12")
        );
        assert!(Event::rfid_invalid(0, 0, "ab12").valid_tag().is_none());
        assert!(Event::rfid_edge(0, 0, RfidEdge::Rise).valid_tag().is_none());
        assert!(Event::sync(0, 0).valid_tag().is_none());
    }

    #[test]
    fn test_display_matches_log_line() {
        let e = Event::beam(77, 11, BeamSide::Right, BeamState::Broken);
        assert_eq!(e.to_string(), "77,b,1,1,1");
        let e = Event::rfid(78, 1, "2a006d2d1b");
        assert_eq!(e.to_string(), "78,1,0,2A006D2D1B,0");
    }
}
