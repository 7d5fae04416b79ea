use crate::{SegmentId, VehicleId, VehicleSet};
use smallvec::SmallVec;

/// A reference to a lane of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LaneRef {
    pub segment: SegmentId,
    pub lane: usize,
}

/// A lane of a road segment, holding its vehicles ordered by position.
#[derive(Clone, Debug, Default)]
pub struct Lane {
    /// The vehicles on the lane, rearmost first.
    vehicles: Vec<VehicleId>,
    /// The lane vehicles continue into at the end of the segment.
    successor: Option<LaneRef>,
    /// The lanes feeding into this one.
    predecessors: SmallVec<[LaneRef; 2]>,
}

impl Lane {
    /// The vehicles on the lane, rearmost first.
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    pub fn successor(&self) -> Option<LaneRef> {
        self.successor
    }

    pub fn predecessors(&self) -> &[LaneRef] {
        &self.predecessors
    }

    pub(crate) fn set_successor(&mut self, lane: LaneRef) {
        self.successor = Some(lane);
    }

    pub(crate) fn add_predecessor(&mut self, lane: LaneRef) {
        if !self.predecessors.contains(&lane) {
            self.predecessors.push(lane);
        }
    }

    /// The rearmost vehicle.
    pub fn rear_vehicle(&self) -> Option<VehicleId> {
        self.vehicles.first().copied()
    }

    /// The frontmost vehicle.
    pub fn front_vehicle(&self) -> Option<VehicleId> {
        self.vehicles.last().copied()
    }

    /// The index of the first vehicle whose front is beyond `pos`.
    pub(crate) fn index_ahead_of(&self, vehicles: &VehicleSet, pos: f64) -> usize {
        self.vehicles.partition_point(|id| vehicles[*id].pos() <= pos)
    }

    /// Inserts the vehicle with the given ID into the lane.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        let idx = self.index_ahead_of(vehicles, vehicles[id].pos());
        self.vehicles.insert(idx, id);
    }

    /// Removes the vehicle with the given ID from the lane.
    pub(crate) fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(idx) = self.vehicles.iter().rposition(|v| *v == id) {
            self.vehicles.remove(idx);
        }
    }

    /// Removes and returns the frontmost vehicle if its front is beyond `pos`.
    pub(crate) fn pop_beyond(&mut self, vehicles: &VehicleSet, pos: f64) -> Option<VehicleId> {
        let id = self.front_vehicle()?;
        if vehicles[id].pos() > pos {
            self.vehicles.pop()
        } else {
            None
        }
    }

    /// Restores the position order after integration.
    pub(crate) fn sort(&mut self, vehicles: &VehicleSet) {
        self.vehicles
            .sort_by(|a, b| vehicles[*a].pos().total_cmp(&vehicles[*b].pos()));
    }

    pub(crate) fn clear(&mut self) {
        self.vehicles.clear();
    }
}
