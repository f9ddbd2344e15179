//! Beam and RFID intervals of one tube.

use std::collections::BTreeMap;

use contracts::{
    BeamSide, BeamState, DetectorConfig, Event, EventPayload, Interval, RfidEdge, RfidInterval,
    RfidSignal, TagId,
};

/// Everything the overlap graph is built from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TubeIntervals {
    pub left: Vec<Interval>,
    pub right: Vec<Interval>,
    pub rfid: Vec<RfidInterval>,
}

impl TubeIntervals {
    /// Derive all interval classes from one tube's events (time ordered)
    pub fn from_events<'a>(
        events: impl IntoIterator<Item = &'a Event>,
        config: &DetectorConfig,
    ) -> Self {
        let events: Vec<&Event> = events.into_iter().collect();
        Self {
            left: beam_intervals(&events, BeamSide::Left, config.min_duration),
            right: beam_intervals(&events, BeamSide::Right, config.min_duration),
            rfid: rfid_intervals(&events, config.min_duration, config.read_cluster_gap),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty() && self.rfid.is_empty()
    }
}

/// Break -> unbreak pairs on one side. A leading unbreak and a trailing
/// break have no partner and are dropped; repeated breaks keep the first.
pub fn beam_intervals(events: &[&Event], side: BeamSide, min_duration: f64) -> Vec<Interval> {
    let mut out = Vec::new();
    let mut open: Option<f64> = None;
    for event in events {
        let EventPayload::Beam { side: s, state } = event.payload() else {
            continue;
        };
        if *s != side {
            continue;
        }
        let t = event.world_time();
        match (state, open) {
            (BeamState::Broken, None) => open = Some(t),
            (BeamState::Broken, Some(_)) => {}
            (BeamState::Unbroken, Some(start)) => {
                out.push(Interval::new(start, t));
                open = None;
            }
            (BeamState::Unbroken, None) => {}
        }
    }
    out.retain(|i| i.duration() >= min_duration);
    out
}

/// Tag presence intervals.
///
/// With tag-in-range edges: rise, one or more valid reads, fall. Each
/// distinct tag read inside the window gets the window as its interval;
/// windows without a read, or cut short by a new rise, are dropped.
///
/// A tube that never reports an edge falls back to clustering reads of the
/// same tag separated by at most `cluster_gap`.
pub fn rfid_intervals(
    events: &[&Event],
    min_duration: f64,
    cluster_gap: f64,
) -> Vec<RfidInterval> {
    let has_edges = events
        .iter()
        .any(|e| matches!(e.payload(), EventPayload::Rfid(RfidSignal::Edge(_))));
    let mut out = if has_edges {
        let mut v = edge_windows(events);
        v.retain(|r| r.interval.duration() >= min_duration);
        v
    } else {
        cluster_reads(events, cluster_gap)
    };
    out.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));
    out
}

fn edge_windows(events: &[&Event]) -> Vec<RfidInterval> {
    let mut out = Vec::new();
    let mut rise: Option<f64> = None;
    let mut tags: Vec<TagId> = Vec::new();
    for event in events {
        let EventPayload::Rfid(signal) = event.payload() else {
            continue;
        };
        let t = event.world_time();
        match signal {
            RfidSignal::Edge(RfidEdge::Rise) => {
                rise = Some(t);
                tags.clear();
            }
            RfidSignal::Tag { tag, valid: true } => {
                if rise.is_some() && !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
            RfidSignal::Tag { valid: false, .. } => {}
            RfidSignal::Edge(RfidEdge::Fall) => {
                if let Some(start) = rise.take() {
                    for tag in tags.drain(..) {
                        out.push(RfidInterval {
                            interval: Interval::new(start, t),
                            tag,
                        });
                    }
                }
                tags.clear();
            }
        }
    }
    out
}

fn cluster_reads(events: &[&Event], gap: f64) -> Vec<RfidInterval> {
    let mut open: BTreeMap<TagId, Interval> = BTreeMap::new();
    let mut out = Vec::new();
    for event in events {
        let Some(tag) = event.valid_tag() else {
            continue;
        };
        let t = event.world_time();
        match open.get_mut(tag) {
            Some(current) if t - current.end <= gap => current.end = t,
            Some(current) => {
                out.push(RfidInterval {
                    interval: *current,
                    tag: tag.clone(),
                });
                *current = Interval::new(t, t);
            }
            None => {
                open.insert(tag.clone(), Interval::new(t, t));
            }
        }
    }
    out.extend(
        open.into_iter()
            .map(|(tag, interval)| RfidInterval { interval, tag }),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(e: Event) -> Event {
        let t = e.timestamp() as f64;
        e.with_world_timestamp(t)
    }

    fn beam(t: u32, side: BeamSide, state: BeamState) -> Event {
        stamp(Event::beam(t, 0, side, state))
    }

    #[test]
    fn test_beam_pairs_strip_incomplete() {
        let events = vec![
            beam(0, BeamSide::Left, BeamState::Unbroken),
            beam(10, BeamSide::Left, BeamState::Broken),
            beam(15, BeamSide::Left, BeamState::Broken),
            beam(40, BeamSide::Left, BeamState::Unbroken),
            beam(50, BeamSide::Right, BeamState::Broken),
            beam(60, BeamSide::Left, BeamState::Broken),
        ];
        let refs: Vec<&Event> = events.iter().collect();
        assert_eq!(
            beam_intervals(&refs, BeamSide::Left, 0.0),
            vec![Interval::new(10.0, 40.0)]
        );
        assert!(beam_intervals(&refs, BeamSide::Right, 0.0).is_empty());
        assert!(beam_intervals(&refs, BeamSide::Left, 31.0).is_empty());
    }

    #[test]
    fn test_rfid_triples() {
        let events = vec![
            stamp(Event::rfid(5, 0, "AA")), // before any rise
            stamp(Event::rfid_edge(10, 0, RfidEdge::Rise)),
            stamp(Event::rfid(12, 0, "AA")),
            stamp(Event::rfid(13, 0, "AA")),
            stamp(Event::rfid_edge(30, 0, RfidEdge::Fall)),
            stamp(Event::rfid_edge(40, 0, RfidEdge::Rise)),
            stamp(Event::rfid_edge(45, 0, RfidEdge::Fall)), // no read
            stamp(Event::rfid_edge(50, 0, RfidEdge::Rise)),
            stamp(Event::rfid(55, 0, "BB")), // never falls
        ];
        let refs: Vec<&Event> = events.iter().collect();
        let out = rfid_intervals(&refs, 0.0, 500.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].interval, Interval::new(10.0, 30.0));
        assert_eq!(out[0].tag, "AA");
    }

    #[test]
    fn test_read_clustering_without_edges() {
        let events = vec![
            stamp(Event::rfid(0, 0, "AA")),
            stamp(Event::rfid(300, 0, "AA")),
            stamp(Event::rfid(350, 0, "BB")),
            stamp(Event::rfid(2000, 0, "AA")),
        ];
        let refs: Vec<&Event> = events.iter().collect();
        let out = rfid_intervals(&refs, 0.0, 500.0);
        let spans: Vec<(f64, f64, &str)> = out
            .iter()
            .map(|r| (r.interval.start, r.interval.end, r.tag.as_str()))
            .collect();
        assert_eq!(
            spans,
            vec![
                (0.0, 300.0, "AA"),
                (350.0, 350.0, "BB"),
                (2000.0, 2000.0, "AA")
            ]
        );
    }
}
