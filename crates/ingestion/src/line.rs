//! Event line parsing
//!
//! `timestamp,board_id,event_type,data0,data1`, board id in hex.

use contracts::{
    BeamSide, BeamState, ContractError, Event, EventPayload, EventType, RfidEdge, RfidSignal,
    TagId,
};

use crate::error::{IngestionError, Result};

/// Parse one raw log line.
///
/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(',').collect();
    parse_fields(&fields, 0).map(Some)
}

/// Parse the five columns of one event
pub fn parse_fields(fields: &[&str], line: u64) -> Result<Event> {
    if fields.len() != 5 {
        return Err(IngestionError::malformed(
            line,
            format!("expected 5 fields, got {}", fields.len()),
        ));
    }
    let timestamp = fields[0]
        .trim()
        .parse::<u32>()
        .map_err(|e| IngestionError::malformed(line, format!("timestamp {:?}: {e}", fields[0])))?;
    let board = usize::from_str_radix(fields[1].trim(), 16)
        .map_err(|e| IngestionError::malformed(line, format!("board id {:?}: {e}", fields[1])))?;
    let code = fields[2]
        .trim()
        .parse::<i64>()
        .map_err(|e| IngestionError::malformed(line, format!("event type {:?}: {e}", fields[2])))?;
    let event_type = EventType::from_code(code).map_err(|e| IngestionError::from_contract(line, e))?;
    let payload = parse_payload(event_type, fields[3].trim(), fields[4].trim())
        .map_err(|e| IngestionError::from_contract(line, e))?;
    Ok(Event::new(timestamp, board, payload))
}

/// Interpret data0 / data1 for an event type
pub fn parse_payload(
    event_type: EventType,
    data0: &str,
    data1: &str,
) -> std::result::Result<EventPayload, ContractError> {
    match event_type {
        EventType::Rfid => parse_rfid(data0, data1).map(EventPayload::Rfid),
        EventType::Beam => Ok(EventPayload::Beam {
            side: parse_beam_side(data0)?,
            state: parse_beam_state(data1)?,
        }),
        EventType::TouchRaw => Ok(EventPayload::TouchRaw {
            left: parse_int(event_type, "data0", data0)?,
            right: parse_int(event_type, "data1", data1)?,
        }),
        EventType::Sync => Ok(EventPayload::Sync {
            data0: parse_int(event_type, "data0", data0)?,
            data1: parse_int(event_type, "data1", data1)?,
        }),
        EventType::AnalogPd => Ok(EventPayload::AnalogPd {
            data0: parse_int(event_type, "data0", data0)?,
            data1: parse_int(event_type, "data1", data1)?,
        }),
    }
}

fn parse_rfid(data0: &str, data1: &str) -> std::result::Result<RfidSignal, ContractError> {
    match data0 {
        "r" | "R" => return Ok(RfidSignal::Edge(RfidEdge::Rise)),
        "f" | "F" => return Ok(RfidSignal::Edge(RfidEdge::Fall)),
        _ => {}
    }
    let tag = TagId::new(data0);
    if !tag.is_hex() {
        return Err(ContractError::invalid_event_data("rfid", "data0", data0));
    }
    let flag = parse_int(EventType::Rfid, "data1", data1)?;
    Ok(RfidSignal::Tag {
        tag,
        valid: flag == 0,
    })
}

fn parse_beam_side(data0: &str) -> std::result::Result<BeamSide, ContractError> {
    match data0 {
        "0" | "L" | "l" => Ok(BeamSide::Left),
        "1" | "R" | "r" => Ok(BeamSide::Right),
        _ => Err(ContractError::invalid_event_data("beam", "data0", data0)),
    }
}

fn parse_beam_state(data1: &str) -> std::result::Result<BeamState, ContractError> {
    match data1 {
        "0" | "u" | "U" => Ok(BeamState::Unbroken),
        "1" | "b" | "B" => Ok(BeamState::Broken),
        _ => Err(ContractError::invalid_event_data("beam", "data1", data1)),
    }
}

fn parse_int(
    event_type: EventType,
    column: &'static str,
    value: &str,
) -> std::result::Result<i64, ContractError> {
    value
        .parse::<i64>()
        .map_err(|_| ContractError::invalid_event_data(event_type.as_str(), column, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfid_read() {
        let e = parse_line("1024,b,0,2a006d2d1b,0").unwrap().unwrap();
        assert_eq!(e.timestamp(), 1024);
        assert_eq!(e.board(), 11);
        assert_eq!(e.valid_tag().map(|t| t.as_str()), Some("2A006D2D1B"));
    }

    #[test]
    fn test_parse_invalid_read_flag() {
        let e = parse_line("5,0,0,2a006d2d1b,1").unwrap().unwrap();
        assert!(e.valid_tag().is_none());
        assert_eq!(e.event_type(), EventType::Rfid);
    }

    #[test]
    fn test_parse_rfid_edges() {
        let e = parse_line("5,2,0,r,1").unwrap().unwrap();
        assert_eq!(
            e.payload(),
            &EventPayload::Rfid(RfidSignal::Edge(RfidEdge::Rise))
        );
        let e = parse_line("9,2,0,f,1").unwrap().unwrap();
        assert_eq!(
            e.payload(),
            &EventPayload::Rfid(RfidSignal::Edge(RfidEdge::Fall))
        );
    }

    #[test]
    fn test_parse_beam_letter_and_numeric() {
        let a = parse_line("10,3,1,R,b").unwrap().unwrap();
        let b = parse_line("10,3,1,1,1").unwrap().unwrap();
        assert_eq!(a, b);
        let c = parse_line("11,3,1,L,u").unwrap().unwrap();
        assert_eq!(
            c.payload(),
            &EventPayload::Beam {
                side: BeamSide::Left,
                state: BeamState::Unbroken
            }
        );
    }

    #[test]
    fn test_skip_blank_and_comment() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# board 3 booted").unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_line("1,2,3").is_err());
        assert!(parse_line("x,0,0,aa,0").is_err());
        assert!(parse_line("1,zz,0,aa,0").is_err());
        assert!(parse_line("1,0,7,aa,0").is_err());
        assert!(parse_line("1,0,1,X,0").is_err());
        assert!(parse_line("1,0,0,not-hex,0").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let line = "4294967295,a,1,0,1";
        let e = parse_line(line).unwrap().unwrap();
        assert_eq!(e.to_string(), line);
    }
}
