//! Colony topology: how tubes connect cages.

use serde::{Deserialize, Serialize};

/// Tube index (equal to the board id of the tube's sensors)
pub type TubeId = usize;

/// Cage index
pub type CageId = usize;

/// Tube arrangement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Cages in a row, `n_tubes + 1` cages
    #[default]
    Linear,
    /// Last tube connects back to the first cage, `n_tubes` cages
    Ring,
}

/// Tube / cage adjacency of a colony.
///
/// Tube `i` always has cage `i` on its left. Its right cage is `i + 1`,
/// wrapping to cage 0 for the last tube of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyLayout {
    pub n_tubes: usize,
    #[serde(default)]
    pub topology: Topology,
}

impl ColonyLayout {
    pub fn linear(n_tubes: usize) -> Self {
        Self {
            n_tubes,
            topology: Topology::Linear,
        }
    }

    pub fn ring(n_tubes: usize) -> Self {
        Self {
            n_tubes,
            topology: Topology::Ring,
        }
    }

    #[inline]
    pub fn is_ring(&self) -> bool {
        self.topology == Topology::Ring
    }

    pub fn n_cages(&self) -> usize {
        match self.topology {
            Topology::Linear => self.n_tubes + 1,
            Topology::Ring => self.n_tubes,
        }
    }

    #[inline]
    pub fn left_cage(&self, tube: TubeId) -> CageId {
        tube
    }

    pub fn right_cage(&self, tube: TubeId) -> CageId {
        if self.is_ring() && tube + 1 == self.n_tubes {
            0
        } else {
            tube + 1
        }
    }

    /// Both cages a tube opens onto, `(left, right)`
    pub fn cages_of(&self, tube: TubeId) -> (CageId, CageId) {
        (self.left_cage(tube), self.right_cage(tube))
    }

    pub fn tube_touches_cage(&self, tube: TubeId, cage: CageId) -> bool {
        let (left, right) = self.cages_of(tube);
        cage == left || cage == right
    }

    /// The cage on the other side of `tube`, if `cage` is one of its ends
    pub fn opposite_cage(&self, tube: TubeId, cage: CageId) -> Option<CageId> {
        let (left, right) = self.cages_of(tube);
        if cage == left {
            Some(right)
        } else if cage == right {
            Some(left)
        } else {
            None
        }
    }

    /// `to` is one step to the right of `from`
    pub fn is_right_step(&self, from: TubeId, to: TubeId) -> bool {
        to == from + 1 || (self.is_ring() && from + 1 == self.n_tubes && to == 0)
    }

    /// `to` is one step to the left of `from`
    pub fn is_left_step(&self, from: TubeId, to: TubeId) -> bool {
        to + 1 == from || (self.is_ring() && from == 0 && to + 1 == self.n_tubes)
    }

    /// The cage two neighbouring tubes both open onto
    pub fn shared_cage(&self, a: TubeId, b: TubeId) -> Option<CageId> {
        if self.is_right_step(a, b) {
            Some(self.right_cage(a))
        } else if self.is_left_step(a, b) {
            Some(self.left_cage(a))
        } else {
            None
        }
    }

    /// The tube connecting two cages, if they are neighbours
    pub fn tube_between(&self, a: CageId, b: CageId) -> Option<TubeId> {
        (0..self.n_tubes).find(|&tube| {
            let (left, right) = self.cages_of(tube);
            (left == a && right == b) || (left == b && right == a)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_cages() {
        let layout = ColonyLayout::linear(4);
        assert_eq!(layout.n_cages(), 5);
        assert_eq!(layout.cages_of(0), (0, 1));
        assert_eq!(layout.cages_of(3), (3, 4));
        assert!(!layout.is_right_step(3, 0));
        assert!(!layout.is_left_step(0, 3));
    }

    #[test]
    fn test_ring_wraps() {
        let layout = ColonyLayout::ring(5);
        assert_eq!(layout.n_cages(), 5);
        assert_eq!(layout.cages_of(4), (4, 0));
        assert!(layout.is_right_step(4, 0));
        assert!(layout.is_left_step(0, 4));
        assert!(!layout.is_right_step(0, 3));
        assert!(!layout.is_left_step(0, 3));
        assert_eq!(layout.tube_between(0, 4), Some(4));
        assert_eq!(layout.shared_cage(4, 0), Some(0));
        assert_eq!(layout.shared_cage(2, 1), Some(2));
        assert_eq!(layout.shared_cage(0, 2), None);
    }

    #[test]
    fn test_opposite_cage() {
        let layout = ColonyLayout::linear(3);
        assert_eq!(layout.opposite_cage(1, 1), Some(2));
        assert_eq!(layout.opposite_cage(1, 2), Some(1));
        assert_eq!(layout.opposite_cage(1, 3), None);
    }
}
