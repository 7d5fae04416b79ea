//! The hand-off between an external road network loader and the simulation.

use crate::network::RoadNetwork;

/// Builds the road network topology.
pub trait TopologyLoader {
    /// Adds segments and lane connections to an empty network. Returns `false` if
    /// the network could not be loaded.
    fn load(&mut self, network: &mut RoadNetwork) -> bool;
}

impl<F: FnMut(&mut RoadNetwork) -> bool> TopologyLoader for F {
    fn load(&mut self, network: &mut RoadNetwork) -> bool {
        self(network)
    }
}

/// A road segment of an in-memory topology.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentSpec {
    pub road_id: String,
    /// Length in m.
    pub length: f64,
    pub lanes: usize,
}

/// A lane connection of an in-memory topology.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneConnection {
    pub from: String,
    pub from_lane: usize,
    pub to: String,
    pub to_lane: usize,
}

/// An in-memory topology, as produced by an external network file reader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Topology {
    pub segments: Vec<SegmentSpec>,
    pub connections: Vec<LaneConnection>,
}

impl Topology {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a road segment.
    pub fn segment(mut self, road_id: &str, length: f64, lanes: usize) -> Self {
        self.segments.push(SegmentSpec {
            road_id: road_id.into(),
            length,
            lanes,
        });
        self
    }

    /// Connects lane `from_lane` of `from` to lane `to_lane` of `to`.
    pub fn connect(mut self, from: &str, from_lane: usize, to: &str, to_lane: usize) -> Self {
        self.connections.push(LaneConnection {
            from: from.into(),
            from_lane,
            to: to.into(),
            to_lane,
        });
        self
    }

    /// Connects every lane of `from` to the same lane of `to`.
    pub fn continue_into(mut self, from: &str, to: &str) -> Self {
        let lanes = self
            .segments
            .iter()
            .find(|s| s.road_id == from)
            .map_or(0, |s| s.lanes);
        for lane in 0..lanes {
            self = self.connect(from, lane, to, lane);
        }
        self
    }
}

impl TopologyLoader for Topology {
    fn load(&mut self, network: &mut RoadNetwork) -> bool {
        for spec in &self.segments {
            if !(spec.length > 0.0) || spec.lanes == 0 {
                log::error!(
                    "road {} has length {} and {} lanes",
                    spec.road_id,
                    spec.length,
                    spec.lanes
                );
                return false;
            }
            network.add_segment(&spec.road_id, spec.length, spec.lanes);
        }
        for conn in &self.connections {
            let result = network.find_by_road_id(&conn.from).and_then(|from| {
                let to = network.find_by_road_id(&conn.to)?;
                network.connect(from, conn.from_lane, to, conn.to_lane)
            });
            if let Err(err) = result {
                log::error!("{}", err);
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn loads_connected_roads() {
        let mut topology = Topology::new()
            .segment("a", 500.0, 2)
            .segment("b", 300.0, 2)
            .continue_into("a", "b");
        let mut network = RoadNetwork::new();
        assert!(topology.load(&mut network));

        let a = network.find_by_road_id("a").unwrap();
        let b = network.find_by_road_id("b").unwrap();
        let lane = &network.segment(a).lanes()[1];
        assert_eq!(lane.successor().map(|l| (l.segment, l.lane)), Some((b, 1)));
        assert_eq!(network.segment(b).lanes()[1].predecessors().len(), 1);
        assert!(!network.segment(a).has_exit());
        assert!(network.segment(b).has_exit());
    }

    #[test]
    fn fails_on_dangling_connection() {
        let mut topology = Topology::new().segment("a", 500.0, 1).connect("a", 0, "z", 0);
        assert!(!topology.load(&mut RoadNetwork::new()));
    }
}
