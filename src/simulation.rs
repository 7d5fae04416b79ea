use crate::boundary::{InflowTimeSeries, MacroSource, MicroSource, SimpleRamp, Sink, TrafficSource};
use crate::composition::TrafficComposition;
use crate::config::{RoadConfig, ScenarioConfig, SourceConfig};
use crate::error::{ConfigError, SimError};
use crate::initial;
use crate::network::RoadNetwork;
use crate::objects::{DiversionSign, FlowConservingBottleneck, LoopDetector, RoadObject, SpeedLimit};
use crate::regulator::Regulator;
use crate::rng::SimRng;
use crate::topology::TopologyLoader;
use crate::vehicle::VehicleFactory;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Simulated time after which the run may end once only obstacles remain, in s.
const MIN_RUN_TIME: f64 = 60.0;

/// Throughput is logged every this many iterations.
const LOG_INTERVAL: u64 = 1000;

/// The lifecycle state of a [Simulation].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Uninitialized,
    Initialized,
    Running,
    Completed,
}

/// Receives a notification after every completed step.
///
/// Listeners run on the simulation thread and must return promptly.
pub trait TimestepListener {
    fn time_step(&mut self, dt: f64, simulation_time: f64, iteration_count: u64);
}

impl<F: FnMut(f64, f64, u64)> TimestepListener for F {
    fn time_step(&mut self, dt: f64, simulation_time: f64, iteration_count: u64) {
        self(dt, simulation_time, iteration_count)
    }
}

/// Requests a running simulation to stop before its next step.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A traffic simulation run over a road network.
pub struct Simulation {
    config: ScenarioConfig,
    state: SimulationState,
    /// The road network with its vehicles.
    network: RoadNetwork,
    /// The traffic light controllers.
    regulators: Vec<Regulator>,
    rng: SimRng,
    /// The simulation time in s.
    time: f64,
    /// The number of completed steps.
    iteration: u64,
    listeners: Vec<Box<dyn TimestepListener>>,
    on_complete: Option<Box<dyn FnMut(f64)>>,
    stop: StopHandle,
    /// The wall-clock start of the current run.
    started: Option<Instant>,
}

impl Simulation {
    /// Creates an uninitialized simulation of the given scenario.
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            state: SimulationState::Uninitialized,
            network: RoadNetwork::new(),
            regulators: vec![],
            rng: SimRng::default(),
            time: 0.0,
            iteration: 0,
            listeners: vec![],
            on_complete: None,
            stop: StopHandle::default(),
            started: None,
        }
    }

    /// Builds the network and everything attached to it from the scenario
    /// configuration, and places the initial vehicles.
    ///
    /// On error the simulation stays uninitialized and cannot be stepped.
    pub fn initialize(&mut self, loader: &mut dyn TopologyLoader) -> Result<(), ConfigError> {
        self.state = SimulationState::Uninitialized;
        self.network.clear();
        self.regulators.clear();
        let result = self.build(loader);
        if result.is_err() {
            self.network.clear();
            self.regulators.clear();
            self.state = SimulationState::Uninitialized;
        }
        result
    }

    fn build(&mut self, loader: &mut dyn TopologyLoader) -> Result<(), ConfigError> {
        let config = &self.config;
        if !(config.timestep > 0.0) {
            return Err(ConfigError::Invalid(format!("timestep {}", config.timestep)));
        }
        if config.duration.map_or(false, |d| !(d >= 0.0)) {
            return Err(ConfigError::Invalid(format!("duration {:?}", config.duration)));
        }
        log::info!("initializing scenario {}", config.name);

        if !loader.load(&mut self.network) {
            return Err(ConfigError::NetworkLoad);
        }
        self.network.set_crash_exit(config.crash_exit);
        self.rng = if config.fixed_seed {
            SimRng::with_seed(config.seed)
        } else {
            SimRng::from_entropy()
        };

        let factory = VehicleFactory::new(&config.vehicle_types)?;
        let composition = if config.composition.is_empty() {
            None
        } else {
            Some(TrafficComposition::new(&config.composition, &factory)?)
        };
        self.network.set_factory(factory);
        self.network.set_composition(composition);

        for light in &config.traffic_lights {
            self.network
                .add_traffic_light(&light.signal_id, &light.road_id, light.position)?;
        }
        for road in &config.roads {
            configure_road(road, &mut self.network)?;
        }
        self.network.finalize();
        for regulator in &config.regulators {
            self.regulators
                .push(Regulator::from_config(regulator, &self.network)?);
        }

        for regulator in &mut self.regulators {
            for event in regulator.reset() {
                self.network.apply_signal_event(&event);
            }
        }
        self.network.check_lights()?;

        self.reset_run()?;
        log::info!(
            "initialized {} roads, {} vehicles",
            self.network.segments().count(),
            self.network.vehicle_count()
        );
        Ok(())
    }

    /// Clears the run state, keeping the network and its configuration, and
    /// places the initial vehicles again.
    pub fn reset(&mut self) -> Result<(), SimError> {
        if self.state == SimulationState::Uninitialized {
            return Err(SimError::InvalidState(self.state));
        }
        self.reset_run()?;
        Ok(())
    }

    fn reset_run(&mut self) -> Result<(), ConfigError> {
        self.network.reset();
        self.rng.reset();
        for regulator in &mut self.regulators {
            for event in regulator.reset() {
                self.network.apply_signal_event(&event);
            }
        }
        initial::apply(&self.config.initial_conditions, &mut self.network, &mut self.rng)?;
        self.time = 0.0;
        self.iteration = 0;
        self.started = None;
        self.stop.clear();
        self.state = SimulationState::Initialized;
        Ok(())
    }

    /// Releases the network and every vehicle.
    pub fn clear(&mut self) {
        self.network.clear();
        self.regulators.clear();
        self.time = 0.0;
        self.iteration = 0;
        self.state = SimulationState::Uninitialized;
    }

    /// Replaces the scenario and initializes it.
    pub fn load_scenario(
        &mut self,
        config: ScenarioConfig,
        loader: &mut dyn TopologyLoader,
    ) -> Result<(), ConfigError> {
        self.clear();
        self.config = config;
        self.initialize(loader)
    }

    /// Executes one step: traffic control, the network update, then listeners.
    pub fn step(&mut self) -> Result<(), SimError> {
        match self.state {
            SimulationState::Initialized | SimulationState::Running => {}
            state => return Err(SimError::InvalidState(state)),
        }
        self.state = SimulationState::Running;
        let dt = self.config.timestep;
        self.time += dt;
        self.iteration += 1;

        for regulator in &mut self.regulators {
            for event in regulator.time_step(dt, &self.network) {
                self.network.apply_signal_event(&event);
            }
        }
        if let Err(err) = self.network.time_step(dt, self.time, &mut self.rng) {
            self.state = SimulationState::Completed;
            return Err(err);
        }
        for listener in &mut self.listeners {
            listener.time_step(dt, self.time, self.iteration);
        }

        if self.iteration % LOG_INTERVAL == 0 {
            log::info!(
                "t={:.1}s, iteration {}, {} vehicles",
                self.time,
                self.iteration,
                self.network.vehicle_count()
            );
        }
        Ok(())
    }

    /// Steps until the duration is reached, the completion predicate holds or a
    /// stop is requested, then completes the run. Returns the final simulation time.
    pub fn run_to_completion(&mut self) -> Result<f64, SimError> {
        match self.state {
            SimulationState::Initialized | SimulationState::Running => {}
            state => return Err(SimError::InvalidState(state)),
        }
        log::info!("running scenario {}", self.config.name);
        self.started = Some(Instant::now());
        let duration = self.config.duration.unwrap_or(f64::INFINITY);
        while self.time < duration && !self.is_finished() {
            if self.stop.is_stopped() {
                log::info!("stop requested at t={:.1}s", self.time);
                break;
            }
            self.step()?;
        }
        self.complete();
        Ok(self.time)
    }

    fn complete(&mut self) {
        self.state = SimulationState::Completed;
        for regulator in &self.regulators {
            regulator.simulation_completed(self.time);
        }
        if let Some(started) = self.started {
            let elapsed = started.elapsed().as_secs_f64();
            log::info!(
                "completed after {:.1} s simulated in {:.2} s wall-clock ({:.0}x), {} vehicles remaining",
                self.time,
                elapsed,
                self.time / f64::max(elapsed, 1e-6),
                self.network.vehicle_count()
            );
        }
        if let Some(callback) = self.on_complete.as_mut() {
            callback(self.time);
        }
    }

    /// Whether the run is over: past the minimum run time with only obstacles left.
    pub fn is_finished(&self) -> bool {
        self.time > MIN_RUN_TIME && self.network.vehicle_count() == self.network.obstacle_count()
    }

    /// Registers a listener notified after every step.
    pub fn add_listener(&mut self, listener: impl TimestepListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Sets the callback invoked with the final simulation time on completion.
    pub fn set_completion_callback(&mut self, callback: impl FnMut(f64) + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// A handle for requesting a stop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Gets the road network.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn regulators(&self) -> &[Regulator] {
        &self.regulators
    }

    /// The simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The number of completed steps.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// The wall-clock time of the current simulation time in ms since the UNIX
    /// epoch, if the scenario sets a time offset.
    pub fn wall_clock_millis(&self) -> Option<i64> {
        self.config
            .time_offset_millis
            .map(|offset| offset + (self.time * 1000.0).round() as i64)
    }

    /// The number of live vehicles, obstacles included.
    pub fn vehicle_count(&self) -> usize {
        self.network.vehicle_count()
    }

    /// The number of obstacles in the network.
    pub fn obstacle_count(&self) -> usize {
        self.network.obstacle_count()
    }

    /// The total number of vehicles inserted by sources and ramps.
    pub fn inserted(&self) -> u64 {
        self.network.inserted()
    }

    /// The total number of vehicles removed by sinks.
    pub fn removed(&self) -> u64 {
        self.network.removed()
    }
}

/// Attaches a road's boundary conditions and road objects to its segment.
fn configure_road(road: &RoadConfig, network: &mut RoadNetwork) -> Result<(), ConfigError> {
    let id = network.find_by_road_id(&road.road_id)?;
    let (length, lanes) = {
        let segment = network.segment(id);
        (segment.length(), segment.lane_count())
    };

    if let Some(entries) = &road.composition {
        let composition = TrafficComposition::new(entries, network.factory())?;
        network.segment_mut(id).set_composition(composition);
    }
    let has_composition =
        network.segment(id).composition().is_some() || network.composition().is_some();
    let no_composition = || ConfigError::Invalid(format!("no traffic composition for road {}", road.road_id));

    if let Some(source) = &road.source {
        let source = match source {
            SourceConfig::Macro {
                inflow,
                gap_acceptance,
            } => {
                if !has_composition {
                    return Err(no_composition());
                }
                TrafficSource::Macro(MacroSource::new(InflowTimeSeries::new(inflow), *gap_acceptance))
            }
            SourceConfig::Micro { records, policy } => {
                let source = MicroSource::new(records, *policy, &road.road_id, lanes, network.factory())?;
                if source.needs_composition() && !has_composition {
                    return Err(no_composition());
                }
                TrafficSource::Micro(source)
            }
        };
        network.segment_mut(id).set_source(source);
    }

    if let Some(ramp) = &road.simple_ramp {
        if !has_composition {
            return Err(no_composition());
        }
        if let Some(lane) = ramp.lane.filter(|lane| *lane >= lanes) {
            return Err(ConfigError::InvalidLane {
                road: road.road_id.clone(),
                lane,
                lanes,
            });
        }
        network
            .segment_mut(id)
            .set_ramp(SimpleRamp::new(ramp, length, lanes));
    }

    if let Some(sink) = road.sink {
        if !network.segment(id).has_exit() {
            return Err(ConfigError::NoSink(road.road_id.clone()));
        }
        network.segment_mut(id).set_sink(Sink::new(sink));
    }

    let segment = network.segment_mut(id);
    if let Some(detectors) = &road.detectors {
        if !(detectors.sample_interval > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "detector sample interval {} on road {}",
                detectors.sample_interval, road.road_id
            )));
        }
        for position in &detectors.positions {
            segment.add_object(RoadObject::Detector(LoopDetector::new(
                *position,
                detectors.sample_interval,
                lanes,
            )));
        }
    }
    for bottleneck in &road.bottlenecks {
        segment.add_object(RoadObject::Bottleneck(FlowConservingBottleneck::new(&bottleneck.points)?));
    }
    for limit in &road.speed_limits {
        segment.add_object(RoadObject::SpeedLimit(SpeedLimit {
            position: limit.position,
            limit: limit.limit,
        }));
    }
    for diversion in &road.diversions {
        if let Some(lane) = diversion.lane.filter(|lane| *lane >= lanes) {
            return Err(ConfigError::InvalidLane {
                road: road.road_id.clone(),
                lane,
                lanes,
            });
        }
        segment.add_object(RoadObject::Diversion(DiversionSign::new(
            diversion.position,
            diversion.valid_length,
            diversion.lane,
            diversion.compliance,
        )));
    }
    Ok(())
}
