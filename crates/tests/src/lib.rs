//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract smoke tests
//! - Log segments -> clock -> streaming tracker / tube event detector
//! - Two-source merge of both occupancy paths
//! - Read-sequence tracing against the streaming tracker
//! - Config -> colony wiring

#[cfg(test)]
mod fixtures {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use contracts::{BeamSide, BeamState, Event, RfidEdge};

    /// One clean passage through `tube` starting at tick `t0`, as log lines
    pub fn passage_lines(tube: usize, t0: u32, tag: &str, rightward: bool) -> Vec<String> {
        let (first, second) = if rightward { (0, 1) } else { (1, 0) };
        vec![
            format!("{},{:x},1,{},1", t0, tube, first),
            format!("{},{:x},0,r,0", t0 + 50, tube),
            format!("{},{:x},0,{},0", t0 + 100, tube, tag),
            format!("{},{:x},1,{},1", t0 + 150, tube, second),
            format!("{},{:x},0,f,0", t0 + 200, tube),
            format!("{},{:x},1,{},0", t0 + 300, tube, first),
            format!("{},{:x},1,{},0", t0 + 450, tube, second),
        ]
    }

    /// The same passage as in-memory events with world times
    pub fn passage_events(tube: usize, t0: f64, tag: &str, rightward: bool) -> Vec<(f64, Event)> {
        let (first, second) = if rightward {
            (BeamSide::Left, BeamSide::Right)
        } else {
            (BeamSide::Right, BeamSide::Left)
        };
        vec![
            (t0, Event::beam(0, tube, first, BeamState::Broken)),
            (t0 + 50.0, Event::rfid_edge(0, tube, RfidEdge::Rise)),
            (t0 + 100.0, Event::rfid(0, tube, tag)),
            (t0 + 150.0, Event::beam(0, tube, second, BeamState::Broken)),
            (t0 + 200.0, Event::rfid_edge(0, tube, RfidEdge::Fall)),
            (t0 + 300.0, Event::beam(0, tube, first, BeamState::Unbroken)),
            (t0 + 450.0, Event::beam(0, tube, second, BeamState::Unbroken)),
        ]
    }

    /// Sort by time and stamp world time (tick = rounded world ms)
    pub fn stamp(mut timed: Vec<(f64, Event)>) -> Vec<Event> {
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));
        timed
            .into_iter()
            .map(|(t, e)| {
                let tick = t.max(0.0).round() as u32;
                let raw = Event::new(tick, e.board(), e.payload().clone());
                raw.with_world_timestamp(t)
            })
            .collect()
    }

    pub fn write_segment(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{ColonyLayout, EventType};

    #[test]
    fn test_event_line_round_trip() {
        let line = "1234,a,0,2A006D2D1B,0";
        let event = ingestion::parse_line(line).unwrap().unwrap();
        assert_eq!(event.event_type(), EventType::Rfid);
        assert_eq!(event.board(), 10);
        assert_eq!(event.to_string().to_ascii_lowercase(), line.to_ascii_lowercase());
    }

    #[test]
    fn test_layout_cage_counts() {
        assert_eq!(ColonyLayout::linear(6).n_cages(), 7);
        assert_eq!(ColonyLayout::ring(6).n_cages(), 6);
    }
}

#[cfg(test)]
mod e2e_tests {
    use colony::Colony;
    use contracts::{ColonyConfig, ColonyLayout, Direction, OccupancyOrigin};
    use ingestion::{clock_samples, load_segments};
    use tube_events::{occupancy_from_tube_events, TubeEventDetector};

    use crate::fixtures::{passage_lines, write_segment};

    const ANCHOR_MS: f64 = 1_704_067_200_000.0; // 2024-01-01T00:00:00Z

    /// Animal walks tube 0 -> tube N-1 of a linear colony, one passage every
    /// 4 s, split over two one-minute segments
    fn traversal_segments(n_tubes: usize, dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut first = vec!["0,0,3,0,0".to_string()];
        let mut second = vec!["60000,0,3,0,0".to_string()];
        for tube in 0..n_tubes {
            let t0 = 1000 + tube as u32 * 4000;
            first.extend(passage_lines(tube, t0, "2a006d2d1b", true));
        }
        // a second animal idles on tube 0 in the next segment
        second.extend(passage_lines(0, 61_000, "0bad0bad01", true));
        vec![
            write_segment(dir, "240101_000000.csv", &first),
            write_segment(dir, "240101_000100.csv", &second),
        ]
    }

    #[test]
    fn test_traversal_streaming_and_batch() {
        let n_tubes = 6;
        let dir = tempfile::tempdir().unwrap();
        let paths = traversal_segments(n_tubes, dir.path());
        let segments = load_segments(&paths).unwrap();
        assert_eq!(segments.len(), 2);

        let mut colony = Colony::new(ColonyConfig::new(ColonyLayout::linear(n_tubes)));
        assert!(colony.sync_clock(&clock_samples(&segments)));
        let mut events = Vec::new();
        for segment in segments {
            colony.begin_segment();
            for mut event in segment.events {
                colony.process_event(&mut event);
                events.push(event);
            }
        }

        // streaming path
        let focus = [contracts::TagId::from("2A006D2D1B")];
        let streaming = colony.get_occupancy(Some(&focus[..]));
        assert_eq!(streaming.len(), n_tubes - 1);
        assert!(colony.teleports().is_empty());
        for (i, record) in streaming.iter().enumerate() {
            assert_eq!(record.cage, i + 1);
            assert!((record.duration() - 4000.0).abs() < 1.0);
            assert_eq!(record.origin, OccupancyOrigin::Crossing);
        }
        assert!((streaming[0].enter_time - (ANCHOR_MS + 1100.0)).abs() < 1.0);

        // batch path over the events the tracker stamped
        let layout = ColonyLayout::linear(n_tubes);
        let detector = TubeEventDetector::default();
        let found = detector.detect(&events);
        assert_eq!(found.len(), n_tubes + 1);
        assert!(found.iter().all(|e| e.direction == Direction::Right));

        let batch = occupancy_from_tube_events(&found, &layout);
        assert_eq!(batch.len(), n_tubes - 1);
        for record in &batch {
            assert!((record.duration() - (4000.0 - 450.0)).abs() < 1.0);
        }

        // both paths agree on every cage
        let merged =
            merger::merge_tube_event_occupancies_by_animal(&streaming, &batch, &layout).unwrap();
        assert!(merged.conflicts.is_empty());
        assert_eq!(merged.records.len(), n_tubes - 1);
        assert!(merged
            .records
            .iter()
            .all(|r| r.origin == OccupancyOrigin::Merged));
        let culled = merger::merge_occupancies([merged.records], true).unwrap();
        assert_eq!(culled.len(), n_tubes - 1);
    }

    #[test]
    fn test_traversal_read_sequence_matches_streaming() {
        let n_tubes = 6;
        let dir = tempfile::tempdir().unwrap();
        let paths = traversal_segments(n_tubes, dir.path());
        let segments = load_segments(&paths).unwrap();

        let layout = ColonyLayout::linear(n_tubes);
        let mut colony = Colony::new(ColonyConfig::new(layout));
        assert!(colony.sync_clock(&clock_samples(&segments)));
        let mut events = Vec::new();
        for segment in segments {
            colony.begin_segment();
            for mut event in segment.events {
                colony.process_event(&mut event);
                events.push(event);
            }
        }

        let settings = sequences::SequenceSettings {
            merge_threshold: None,
            fallback_threshold: 800.0,
            min_reads: 2,
            event_gap: 800.0,
        };
        let report = sequences::analyze(&events, &layout, &settings);
        // the idle animal has a single read
        assert_eq!(report.skipped_animals, 1);
        assert_eq!(report.reliability["2A006D2D1B"], Some(1.0));
        assert!(report.multi_animal_events.is_empty());

        let sequence = report.occupancy;
        assert_eq!(sequence.len(), n_tubes - 1);
        assert!(sequence
            .iter()
            .all(|r| r.origin == OccupancyOrigin::ReadSequence));

        let focus = [contracts::TagId::from("2A006D2D1B")];
        let streaming = colony.get_occupancy(Some(&focus[..]));
        for (a, b) in streaming.iter().zip(&sequence) {
            assert_eq!(a.cage, b.cage);
            assert!((a.enter_time - b.enter_time).abs() < 1e-6);
            assert!((a.exit_time - b.exit_time).abs() < 1e-6);
        }
        let culled = merger::merge_occupancies([streaming, sequence], true).unwrap();
        assert_eq!(culled.len(), n_tubes - 1);
        assert!(culled.iter().all(|r| r.origin == OccupancyOrigin::Crossing));
    }

    #[test]
    fn test_back_and_forth_prediction_chain() {
        // tube 1, tube 1 again after a long gap, then tube 0: the animal went
        // into cage 2 and back, then into cage 1 and out through tube 0
        let dir = tempfile::tempdir().unwrap();
        let lines = vec![
            "0,0,0,aa,0".to_string(),
            "2000,1,0,aa,0".to_string(),
            "9000,1,0,aa,0".to_string(),
            "15000,0,0,aa,0".to_string(),
        ];
        let path = write_segment(dir.path(), "chain.csv", &lines);
        let segments = load_segments(&[path]).unwrap();

        let mut colony = Colony::new(ColonyConfig::new(ColonyLayout::linear(3)));
        assert!(!colony.sync_clock(&clock_samples(&segments)));
        for mut event in segments.into_iter().flat_map(|s| s.events) {
            colony.process_event(&mut event);
        }
        let cages: Vec<usize> = colony
            .get_occupancy(None)
            .iter()
            .map(|r| r.cage)
            .collect();
        assert_eq!(cages, vec![1, 2, 1]);
    }
}

#[cfg(test)]
mod noise_tests {
    use contracts::{ColonyLayout, Direction, Event};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tube_events::{find_tube_events, occupancy_from_tube_events};

    use crate::fixtures::{passage_events, stamp};

    #[test]
    fn test_jittered_walks_resolve() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let n_tubes = 4;
        let mut timed: Vec<(f64, Event)> = Vec::new();
        // right across every tube, then back left
        for tube in 0..n_tubes {
            timed.extend(passage_events(tube, tube as f64 * 5000.0, "C0FFEE", true));
        }
        let back = n_tubes as f64 * 5000.0;
        for (k, tube) in (0..n_tubes).rev().enumerate() {
            timed.extend(passage_events(tube, back + k as f64 * 5000.0, "C0FFEE", false));
        }
        let jittered = timed
            .into_iter()
            .map(|(t, e)| (t + rng.random_range(-20.0..20.0), e))
            .collect();
        let events = stamp(jittered);

        let found = find_tube_events(&events, 0.0, 0.0, true, true);
        assert_eq!(found.len(), 2 * n_tubes);
        assert!(found.iter().all(|e| e.direction.is_resolved()));
        assert_eq!(
            found.iter().filter(|e| e.direction == Direction::Left).count(),
            n_tubes
        );

        let occupancy = occupancy_from_tube_events(&found, &ColonyLayout::linear(n_tubes));
        let cages: Vec<usize> = occupancy.iter().map(|r| r.cage).collect();
        // out to cage 4, turn around there, back to cage 0
        assert_eq!(cages, vec![1, 2, 3, 4, 3, 2, 1]);
    }

    #[test]
    fn test_beam_flicker_without_tag_is_not_an_event() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut timed = Vec::new();
        for k in 0..20 {
            let t = k as f64 * 700.0 + rng.random_range(0.0..100.0);
            let side = if k % 2 == 0 {
                contracts::BeamSide::Left
            } else {
                contracts::BeamSide::Right
            };
            timed.push((t, Event::beam(0, 1, side, contracts::BeamState::Broken)));
            timed.push((t + 40.0, Event::beam(0, 1, side, contracts::BeamState::Unbroken)));
        }
        let events = stamp(timed);
        assert!(find_tube_events(&events, 0.0, 0.0, true, true).is_empty());
    }
}

#[cfg(test)]
mod config_tests {
    use colony::Colony;
    use config_loader::ConfigLoader;
    use contracts::{Event, Topology};

    const CONFIG: &str = r#"
[colony]
n_tubes = 4
topology = "ring"
rfid_merge_threshold_ms = 500.0
autotune_merge_threshold = false

[detector]
margin = 10.0

[[animals]]
tag = "2a006d2d1b"
name = "pip"
meta = { sex = "f" }
"#;

    #[test]
    fn test_config_drives_colony() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, config_loader::ConfigFormat::Toml)
            .unwrap();
        assert_eq!(blueprint.colony.topology, Topology::Ring);
        assert_eq!(blueprint.detector.margin, 10.0);

        let mut colony = Colony::from_blueprint(&blueprint).unwrap();
        assert_eq!(colony.merge_threshold(), 500.0);
        // ring: tube 3 -> tube 0 is a right step into cage 0
        for mut event in [Event::rfid(0, 3, "2A006D2D1B"), Event::rfid(1000, 0, "2A006D2D1B")] {
            colony.process_event(&mut event);
        }
        let occupancy = colony.get_occupancy(None);
        assert_eq!(occupancy.len(), 1);
        assert_eq!(occupancy[0].cage, 0);

        let tracker = colony.animal("2A006D2D1B").unwrap();
        assert_eq!(tracker.profile().name, "pip");
        assert_eq!(blueprint.display_name(tracker.tag()), "pip");
    }

    #[test]
    fn test_reserved_meta_rejected_at_load() {
        let bad = CONFIG.replace("sex", "rfid");
        assert!(ConfigLoader::load_from_str(&bad, config_loader::ConfigFormat::Toml).is_err());
    }
}
