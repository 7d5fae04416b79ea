use crate::config::RegulatorConfig;
use crate::error::ConfigError;
use crate::light::LightStatus;
use crate::network::RoadNetwork;
use crate::{SegmentId, TrafficLightId};

/// Tolerance on phase durations against accumulated time steps, in s.
const EPSILON: f64 = 1e-9;

/// A status change sent from a regulator to a traffic light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalEvent {
    pub light: TrafficLightId,
    pub status: LightStatus,
}

/// A phase of a signal plan.
#[derive(Clone, Debug)]
pub struct Phase {
    /// The status of every controlled light during the phase.
    pub statuses: Vec<(TrafficLightId, LightStatus)>,
    pub min_duration: f64,
    pub max_duration: f64,
    /// A detector `(segment, index)` whose traffic extends the phase.
    pub extend_on: Option<(SegmentId, usize)>,
}

impl Phase {
    /// A phase of fixed duration.
    pub fn fixed(statuses: Vec<(TrafficLightId, LightStatus)>, duration: f64) -> Self {
        Self {
            statuses,
            min_duration: duration,
            max_duration: duration,
            extend_on: None,
        }
    }
}

/// Drives a group of traffic lights through a cyclic signal plan.
#[derive(Clone, Debug)]
pub struct Regulator {
    name: String,
    phases: Vec<Phase>,
    /// Time into the plan at `t = 0`, in s.
    offset: f64,
    current: usize,
    elapsed: f64,
    switches: u64,
}

impl Regulator {
    /// Creates a regulator. An empty plan never emits events.
    pub fn new(name: &str, phases: Vec<Phase>, offset: f64) -> Self {
        Self {
            name: name.into(),
            phases,
            offset,
            current: 0,
            elapsed: 0.0,
            switches: 0,
        }
    }

    /// Resolves a regulator configuration against the network.
    pub fn from_config(config: &RegulatorConfig, network: &RoadNetwork) -> Result<Self, ConfigError> {
        if config.phases.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "regulator {} has no phases",
                config.name
            )));
        }
        let mut phases = Vec::with_capacity(config.phases.len());
        for phase in &config.phases {
            if !(phase.min_duration > 0.0) || phase.max_duration < phase.min_duration {
                return Err(ConfigError::Invalid(format!(
                    "regulator {} has a phase lasting {} to {} s",
                    config.name, phase.min_duration, phase.max_duration
                )));
            }
            let statuses = phase
                .statuses
                .iter()
                .map(|(signal, status)| Ok((network.find_signal(signal)?, *status)))
                .collect::<Result<Vec<_>, ConfigError>>()?;
            let extend_on = match &phase.extend_on {
                Some((road, index)) => {
                    let segment = network.find_by_road_id(road)?;
                    if network.segment(segment).detector(*index).is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "road {} has no detector {}",
                            road, index
                        )));
                    }
                    Some((segment, *index))
                }
                None => None,
            };
            phases.push(Phase {
                statuses,
                min_duration: phase.min_duration,
                max_duration: phase.max_duration,
                extend_on,
            });
        }
        Ok(Self::new(&config.name, phases, config.offset))
    }

    /// The standard plan for a single light: green, amber, red and red-amber.
    pub fn fixed_cycle(
        name: &str,
        light: TrafficLightId,
        green: f64,
        amber: f64,
        red: f64,
        red_amber: f64,
    ) -> Self {
        use LightStatus::*;
        let phases = [(Green, green), (GreenRed, amber), (Red, red), (RedGreen, red_amber)]
            .into_iter()
            .map(|(status, duration)| Phase::fixed(vec![(light, status)], duration))
            .collect();
        Self::new(name, phases, 0.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index of the active phase.
    pub fn current_phase(&self) -> usize {
        self.current
    }

    /// The time spent in the active phase, in s.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// The number of phase switches since the last reset.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Restarts the plan at its offset and returns the events that set up the
    /// active phase.
    pub(crate) fn reset(&mut self) -> Vec<SignalEvent> {
        self.current = 0;
        self.elapsed = 0.0;
        self.switches = 0;
        let cycle: f64 = self.phases.iter().map(|p| p.min_duration).sum();
        if cycle > 0.0 {
            let mut remaining = self.offset.rem_euclid(cycle);
            while remaining + EPSILON >= self.phases[self.current].min_duration {
                remaining -= self.phases[self.current].min_duration;
                self.current = (self.current + 1) % self.phases.len();
            }
            self.elapsed = f64::max(remaining, 0.0);
        }
        self.events()
    }

    /// Advances the plan by `dt` and returns the events of a phase switch, if any.
    pub(crate) fn time_step(&mut self, dt: f64, network: &RoadNetwork) -> Vec<SignalEvent> {
        let Some(phase) = self.phases.get(self.current) else {
            return vec![];
        };
        self.elapsed += dt;
        let demand = phase.extend_on.map_or(false, |(segment, index)| {
            network
                .segment(segment)
                .detector(index)
                .map_or(false, |det| det.last_sample().count > 0)
        });
        let expired = self.elapsed + EPSILON >= phase.max_duration
            || (self.elapsed + EPSILON >= phase.min_duration && !demand);
        if !expired {
            return vec![];
        }
        self.current = (self.current + 1) % self.phases.len();
        self.elapsed = 0.0;
        self.switches += 1;
        log::debug!("regulator {} switched to phase {}", self.name, self.current);
        self.events()
    }

    fn events(&self) -> Vec<SignalEvent> {
        self.phases.get(self.current).map_or(vec![], |phase| {
            phase
                .statuses
                .iter()
                .map(|(light, status)| SignalEvent {
                    light: *light,
                    status: *status,
                })
                .collect()
        })
    }

    /// Logs the regulator's summary at the end of a run.
    pub(crate) fn simulation_completed(&self, time: f64) {
        log::info!(
            "regulator {}: {} phase switches in {:.1} s",
            self.name,
            self.switches,
            time
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::SlotMap;

    fn light() -> TrafficLightId {
        SlotMap::<TrafficLightId, ()>::with_key().insert(())
    }

    #[test]
    fn fixed_cycle_switches_on_time() {
        let light = light();
        let network = RoadNetwork::new();
        let mut regulator = Regulator::fixed_cycle("r", light, 10.0, 2.0, 10.0, 1.0);
        let initial = regulator.reset();
        assert_eq!(
            initial,
            [SignalEvent {
                light,
                status: LightStatus::Green
            }]
        );

        let mut statuses = vec![];
        for _ in 0..230 {
            for event in regulator.time_step(0.1, &network) {
                statuses.push(event.status);
            }
        }
        use LightStatus::*;
        assert_eq!(statuses, [GreenRed, Red, RedGreen, Green]);
    }

    #[test]
    fn offset_starts_later_in_the_plan() {
        let mut regulator = Regulator::fixed_cycle("r", light(), 10.0, 2.0, 10.0, 1.0);
        regulator.offset = 15.0;
        let events = regulator.reset();
        assert_eq!(events[0].status, LightStatus::Red);
        assert!((regulator.elapsed() - 3.0).abs() < 1e-9);
    }
}
