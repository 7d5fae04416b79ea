use crate::config::LaneChangeConfig;
use crate::model::{FollowInput, LongitudinalModel};
use crate::rng::SimRng;
use crate::{SegmentId, VehicleId};

pub use self::factory::{VehicleFactory, VehicleType};
pub(crate) use self::lane_change::{LaneChangeAccelerations, LaneDirection};
pub use self::memory::Memory;
pub use self::noise::Noise;

mod factory;
pub(crate) mod lane_change;
mod memory;
mod noise;

/// Whether a vehicle takes part in traffic or blocks a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleKind {
    Normal,
    /// A permanently stationary vehicle.
    Obstacle,
}

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// A sequential number, unique within a run, used in log messages.
    number: u64,
    /// The index of the vehicle's type in the [VehicleFactory].
    type_index: usize,
    kind: VehicleKind,
    /// Length in m.
    length: f64,
    /// Maximum deceleration, a positive number in m/s^2.
    max_decel: f64,
    /// The segment the vehicle is travelling on.
    segment: SegmentId,
    /// The lane index within the segment.
    lane: usize,
    /// The longitudinal position of the front of the vehicle, in m.
    pos: f64,
    /// The front position before the last integration.
    prev_pos: f64,
    /// Speed in m/s.
    vel: f64,
    /// Acceleration in m/s^2, as computed in the current step.
    acc: f64,
    /// Individual factor on the desired speed.
    speed_factor: f64,
    model: LongitudinalModel,
    lane_change: Option<LaneChangeConfig>,
    noise: Option<Noise>,
    memory: Option<Memory>,
    /// Whether the driver follows the diversion sign it is passing, once decided.
    diverting: Option<bool>,
    /// The simulation time at which the vehicle entered the network.
    entry_time: f64,
}

/// The outcome of the acceleration pass for one vehicle, applied after all
/// vehicles have been evaluated.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AccelerationUpdate {
    pub acc: f64,
    pub noise: Option<Noise>,
    pub memory: Option<Memory>,
}

impl Vehicle {
    /// Creates a new vehicle of the given type.
    pub(crate) fn new(
        id: VehicleId,
        number: u64,
        type_index: usize,
        vtype: &VehicleType,
        speed_factor: f64,
        entry_time: f64,
    ) -> Self {
        Self {
            id,
            number,
            type_index,
            kind: vtype.kind,
            length: vtype.length,
            max_decel: vtype.max_deceleration,
            segment: SegmentId::default(),
            lane: 0,
            pos: 0.0,
            prev_pos: 0.0,
            vel: 0.0,
            acc: 0.0,
            speed_factor,
            model: vtype.model.clone(),
            lane_change: vtype.lane_change,
            noise: vtype.noise.map(Noise::new),
            memory: vtype.memory.map(Memory::new),
            diverting: None,
            entry_time,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's sequential number.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// The index of the vehicle's type.
    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn kind(&self) -> VehicleKind {
        self.kind
    }

    pub fn is_obstacle(&self) -> bool {
        self.kind == VehicleKind::Obstacle
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The vehicle's maximum deceleration in m/s^2.
    pub fn max_deceleration(&self) -> f64 {
        self.max_decel
    }

    /// The ID of the segment the vehicle is currently travelling on.
    pub fn segment_id(&self) -> SegmentId {
        self.segment
    }

    /// The lane index the vehicle is currently in.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn pos(&self) -> f64 {
        self.pos
    }

    /// The longitudinal position of the rear of the vehicle in m.
    pub fn pos_rear(&self) -> f64 {
        self.pos - self.length
    }

    /// The front position before the most recent integration.
    pub fn prev_pos(&self) -> f64 {
        self.prev_pos
    }

    /// The vehicle's velocity in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The vehicle's acceleration in m/s^2.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    /// The individual desired speed factor.
    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn model(&self) -> &LongitudinalModel {
        &self.model
    }

    pub fn lane_change(&self) -> Option<&LaneChangeConfig> {
        self.lane_change.as_ref()
    }

    /// Whether the driver follows the diversion it is passing.
    pub fn is_diverting(&self) -> bool {
        self.diverting == Some(true)
    }

    pub(crate) fn diverting(&self) -> Option<bool> {
        self.diverting
    }

    pub(crate) fn set_diverting(&mut self, diverting: Option<bool>) {
        self.diverting = diverting;
    }

    /// The simulation time at which the vehicle entered the network.
    pub fn entry_time(&self) -> f64 {
        self.entry_time
    }

    /// Whether the vehicle is stopped.
    pub fn has_stopped(&self) -> bool {
        self.vel < 0.1
    }

    /// Sets the vehicle's position in the network.
    pub(crate) fn set_location(&mut self, segment: SegmentId, lane: usize, pos: f64) {
        self.segment = segment;
        self.lane = lane;
        self.pos = pos;
        self.prev_pos = pos;
    }

    /// Moves the vehicle into another lane of the same segment.
    pub(crate) fn set_lane(&mut self, lane: usize) {
        self.lane = lane;
    }

    /// Moves the vehicle onto the successor segment, shifting its position by the
    /// length of the segment it leaves.
    pub(crate) fn transfer(&mut self, segment: SegmentId, lane: usize, offset: f64) {
        self.segment = segment;
        self.lane = lane;
        self.pos -= offset;
        self.prev_pos -= offset;
        self.diverting = None;
    }

    pub(crate) fn set_speed(&mut self, vel: f64) {
        self.vel = f64::max(vel, 0.0);
    }

    /// Computes the acceleration for the given situation without committing any state.
    ///
    /// The car-following part sees the leader through the vehicle's memory, if any;
    /// `stop` is an additional standing obstacle (e.g. a red light) whose constraint
    /// is combined by taking the minimum. Noise is added last.
    pub(crate) fn compute_acceleration(
        &self,
        input: FollowInput,
        stop: Option<f64>,
        rng: &mut SimRng,
    ) -> AccelerationUpdate {
        if self.is_obstacle() {
            return AccelerationUpdate {
                acc: 0.0,
                noise: self.noise,
                memory: self.memory,
            };
        }

        let mut memory = self.memory;
        let perceived = match memory.as_mut() {
            Some(memory) => {
                let (gap, leader_speed) = memory.perceive(input.gap, input.leader_speed, input.dt);
                FollowInput {
                    gap,
                    leader_speed,
                    ..input
                }
            }
            None => input,
        };
        let mut acc = self.model.acceleration(&perceived, rng);

        if let Some(distance) = stop {
            let stop_input = input.behind(distance, 0.0, 0.0);
            acc = f64::min(acc, self.model.acceleration(&stop_input, rng));
        }

        let mut noise = self.noise;
        if let Some(noise) = noise.as_mut() {
            acc += noise.advance(input.dt, rng);
        }

        AccelerationUpdate {
            acc: f64::max(acc, -self.max_decel),
            noise,
            memory,
        }
    }

    /// The acceleration the model alone yields, used for lane-change evaluation.
    pub(crate) fn model_acceleration(&self, input: &FollowInput, rng: &mut SimRng) -> f64 {
        if self.is_obstacle() {
            0.0
        } else {
            self.model.acceleration(input, rng)
        }
    }

    /// Commits the result of the acceleration pass.
    pub(crate) fn apply(&mut self, update: AccelerationUpdate) {
        self.acc = update.acc;
        self.noise = update.noise;
        self.memory = update.memory;
    }

    /// Integrates the vehicle's velocity and position with the ballistic update.
    /// A vehicle whose speed would turn negative stops within the step.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    pub(crate) fn integrate(&mut self, dt: f64) {
        self.prev_pos = self.pos;
        if self.is_obstacle() {
            return;
        }
        let vel = self.vel + self.acc * dt;
        if vel < 0.0 {
            if self.acc < 0.0 {
                self.pos -= 0.5 * self.vel * self.vel / self.acc;
            }
            self.vel = 0.0;
        } else {
            self.pos += self.vel * dt + 0.5 * self.acc * dt * dt;
            self.vel = vel;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ModelSpec, VehicleTypeConfig};
    use assert_approx_eq::assert_approx_eq;
    use slotmap::SlotMap;

    fn car() -> Vehicle {
        let factory = VehicleFactory::new(&[VehicleTypeConfig {
            label: "car".into(),
            length: 5.0,
            max_deceleration: 9.0,
            obstacle: false,
            model: ModelSpec::new("IDM", [("v0", 30.0)]),
            lane_change: None,
            noise: None,
            memory: None,
            speed_factor_stddev: None,
        }])
        .unwrap();
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        let id = ids.insert(());
        Vehicle::new(id, 1, 0, factory.get(0), 1.0, 0.0)
    }

    #[test]
    fn ballistic_integration() {
        let mut veh = car();
        veh.set_speed(10.0);
        veh.apply(AccelerationUpdate {
            acc: 2.0,
            noise: None,
            memory: None,
        });
        veh.integrate(0.5);
        assert_approx_eq!(veh.pos(), 5.25);
        assert_approx_eq!(veh.vel(), 11.0);
        assert_approx_eq!(veh.prev_pos(), 0.0);
    }

    #[test]
    fn stops_within_step_instead_of_reversing() {
        let mut veh = car();
        veh.set_speed(2.0);
        veh.apply(AccelerationUpdate {
            acc: -8.0,
            noise: None,
            memory: None,
        });
        veh.integrate(1.0);
        assert_eq!(veh.vel(), 0.0);
        assert_approx_eq!(veh.pos(), 0.25);
    }

    #[test]
    fn stop_line_caps_acceleration() {
        let veh = car();
        let mut rng = SimRng::with_seed(0);
        let input = FollowInput::free(15.0, 0.1);
        let free = veh.compute_acceleration(input, None, &mut rng).acc;
        let stopping = veh.compute_acceleration(input, Some(30.0), &mut rng).acc;
        assert!(free > 0.0);
        assert!(stopping < 0.0);
        assert!(stopping >= -veh.max_deceleration());
    }
}
