//! Overlap graph over left / right / rfid intervals.
//!
//! Nodes are `(class, index)`. Two nodes are joined when their intervals
//! overlap after widening both by the margin. Connected components grown
//! from right-beam intervals become candidate tube events.

use std::collections::{HashMap, HashSet, VecDeque};

use contracts::{Interval, TagId, TubeEvent, TubeId};

use crate::intervals::TubeIntervals;

/// Interval class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Class {
    Left,
    Right,
    Rfid,
}

/// Graph node
pub type Node = (Class, usize);

/// Index pairs `(i, j)` with `a[i]` overlapping `b[j]`.
///
/// `b` is swept in start order with a running maximum of ends, so each
/// query only visits the window of `b` that can still overlap.
pub fn overlap_pairs(a: &[Interval], b: &[Interval], margin: f64) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..b.len()).collect();
    order.sort_by(|&x, &y| b[x].start.total_cmp(&b[y].start));
    let prefix_max_end: Vec<f64> = order
        .iter()
        .scan(f64::NEG_INFINITY, |max, &j| {
            *max = max.max(b[j].end);
            Some(*max)
        })
        .collect();

    let mut pairs = Vec::new();
    for (i, ai) in a.iter().enumerate() {
        let lo = prefix_max_end.partition_point(|&end| end + margin < ai.start - margin);
        let hi = order.partition_point(|&j| b[j].start - margin <= ai.end + margin);
        for &j in order.get(lo..hi).unwrap_or(&[]) {
            if ai.overlaps(&b[j], margin) {
                pairs.push((i, j));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

/// Undirected adjacency over all three classes
#[derive(Debug, Default)]
pub struct OverlapGraph {
    adjacency: HashMap<Node, Vec<Node>>,
}

impl OverlapGraph {
    pub fn build(intervals: &TubeIntervals, margin: f64) -> Self {
        let rfid: Vec<Interval> = intervals.rfid.iter().map(|r| r.interval).collect();
        let classes: [(Class, &[Interval]); 3] = [
            (Class::Left, &intervals.left),
            (Class::Right, &intervals.right),
            (Class::Rfid, &rfid),
        ];
        let mut graph = Self::default();
        for (x, (class_a, a)) in classes.iter().enumerate() {
            for (class_b, b) in classes.iter().skip(x + 1) {
                for (i, j) in overlap_pairs(a, b, margin) {
                    graph.connect((*class_a, i), (*class_b, j));
                }
            }
        }
        graph
    }

    fn connect(&mut self, a: Node, b: Node) {
        self.adjacency.entry(a).or_default().push(b);
        self.adjacency.entry(b).or_default().push(a);
    }

    pub fn neighbours(&self, node: &Node) -> &[Node] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Connected component of `seed` (breadth first, explicit worklist)
    pub fn component(&self, seed: Node, visited: &mut HashSet<Node>) -> Vec<Node> {
        let mut members = Vec::new();
        if !visited.insert(seed) {
            return members;
        }
        let mut queue = VecDeque::from([seed]);
        while let Some(node) = queue.pop_front() {
            members.push(node);
            for next in self.neighbours(&node) {
                if visited.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        members.sort_unstable();
        members
    }
}

/// Candidate events of one tube, one per right-seeded component carrying
/// at least one tag. Direction is left unknown.
pub fn candidate_events(tube: TubeId, intervals: &TubeIntervals, margin: f64) -> Vec<TubeEvent> {
    let graph = OverlapGraph::build(intervals, margin);
    let mut visited = HashSet::new();
    let mut seeds: Vec<usize> = (0..intervals.right.len()).collect();
    seeds.sort_by(|&x, &y| intervals.right[x].start.total_cmp(&intervals.right[y].start));

    let mut events = Vec::new();
    for seed in seeds {
        let members = graph.component((Class::Right, seed), &mut visited);
        if let Some(event) = assemble(tube, intervals, &members) {
            events.push(event);
        }
    }
    events.sort_by(|a, b| a.start.total_cmp(&b.start));
    events
}

fn assemble(tube: TubeId, intervals: &TubeIntervals, members: &[Node]) -> Option<TubeEvent> {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut rfid = Vec::new();
    for &(class, i) in members {
        match class {
            Class::Left => left.push(intervals.left[i]),
            Class::Right => right.push(intervals.right[i]),
            Class::Rfid => rfid.push(intervals.rfid[i].clone()),
        }
    }
    let mut animals: Vec<TagId> = rfid.iter().map(|r| r.tag.clone()).collect();
    animals.sort();
    animals.dedup();
    if animals.is_empty() {
        return None;
    }
    left.sort_by(|a, b| a.start.total_cmp(&b.start));
    right.sort_by(|a, b| a.start.total_cmp(&b.start));
    rfid.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));

    let all = left
        .iter()
        .chain(right.iter())
        .chain(rfid.iter().map(|r| &r.interval));
    let (start, end) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(s, e), i| {
        (s.min(i.start), e.max(i.end))
    });
    Some(TubeEvent {
        tube,
        start,
        end,
        animals,
        left,
        right,
        rfid,
        direction: Default::default(),
        level: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RfidInterval;

    fn iv(s: f64, e: f64) -> Interval {
        Interval::new(s, e)
    }

    fn tag(s: f64, e: f64, t: &str) -> RfidInterval {
        RfidInterval {
            interval: iv(s, e),
            tag: t.into(),
        }
    }

    #[test]
    fn test_overlap_pairs_matches_brute_force() {
        let a = vec![iv(0.0, 10.0), iv(50.0, 60.0), iv(5.0, 100.0)];
        let b = vec![iv(8.0, 9.0), iv(0.0, 200.0), iv(61.0, 62.0), iv(300.0, 301.0)];
        for margin in [0.0, 1.0, 50.0] {
            let mut brute = Vec::new();
            for (i, x) in a.iter().enumerate() {
                for (j, y) in b.iter().enumerate() {
                    if x.overlaps(y, margin) {
                        brute.push((i, j));
                    }
                }
            }
            assert_eq!(overlap_pairs(&a, &b, margin), brute, "margin {margin}");
        }
    }

    #[test]
    fn test_component_spans_classes() {
        let intervals = TubeIntervals {
            left: vec![iv(0.0, 100.0), iv(1000.0, 1100.0)],
            right: vec![iv(80.0, 200.0), iv(5000.0, 5100.0)],
            rfid: vec![tag(50.0, 150.0, "A"), tag(180.0, 250.0, "B")],
        };
        let events = candidate_events(3, &intervals, 0.0);
        // second right interval has no tag and is discarded
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.tube, 3);
        assert_eq!((e.start, e.end), (0.0, 250.0));
        assert_eq!(e.animals, vec![TagId::from("A"), TagId::from("B")]);
        assert_eq!(e.left.len(), 1);
        assert_eq!(e.right.len(), 1);
    }

    #[test]
    fn test_margin_joins_components() {
        let intervals = TubeIntervals {
            left: vec![iv(0.0, 100.0)],
            right: vec![iv(110.0, 200.0)],
            rfid: vec![tag(150.0, 160.0, "A")],
        };
        let tight = candidate_events(0, &intervals, 0.0);
        assert!(tight[0].left.is_empty());
        let loose = candidate_events(0, &intervals, 5.0);
        assert_eq!(loose[0].left.len(), 1);
    }
}
