//! Tests that run whole scenarios through the public API.

use assert_approx_eq::assert_approx_eq;
use traffic_kernel::config::{
    BottleneckConfig, BottleneckPoint, CompositionEntry, GapAcceptance, InfeasiblePolicy, InflowPoint,
    InitialConditions, InitialVehicle, MicroInflowRecord, ModelSpec, PhaseConfig, RegulatorConfig, RoadConfig,
    ScenarioConfig, SimpleRampConfig, SinkConfig, SourceConfig, TrafficLightConfig, VehicleTypeConfig,
};
use traffic_kernel::{
    ConfigError, LightStatus, MicroSource, Simulation, SimulationState, Topology, TrafficSource, Vehicle,
};

fn car(model: ModelSpec) -> VehicleTypeConfig {
    VehicleTypeConfig {
        label: "car".into(),
        length: 5.0,
        max_deceleration: 9.0,
        obstacle: false,
        model,
        lane_change: None,
        noise: None,
        memory: None,
        speed_factor_stddev: None,
    }
}

fn idm() -> ModelSpec {
    ModelSpec::new(
        "IDM",
        [("v0", 30.0), ("T", 1.5), ("s0", 2.0), ("a", 1.0), ("b", 1.5)],
    )
}

fn base_config(model: ModelSpec) -> ScenarioConfig {
    ScenarioConfig {
        vehicle_types: vec![car(model), VehicleTypeConfig::obstacle("obstacle", 0.0)],
        composition: vec![CompositionEntry::new("car", 1.0)],
        ..Default::default()
    }
}

fn constant_inflow(flow_per_hour: f64, speed: f64) -> Vec<InflowPoint> {
    vec![InflowPoint {
        time: 0.0,
        flow_per_hour,
        speed,
    }]
}

fn initial_vehicle(road_id: &str, label: &str, position: f64, speed: f64) -> InitialVehicle {
    InitialVehicle {
        road_id: road_id.into(),
        lane: 0,
        position,
        speed,
        type_label: Some(label.into()),
    }
}

fn moving_vehicles(sim: &Simulation) -> Vec<&Vehicle> {
    sim.network()
        .vehicles()
        .filter(|veh| !veh.is_obstacle())
        .collect()
}

/// A vehicle approaching a stationary obstacle stops at the minimum gap behind it.
#[test]
fn vehicle_stops_behind_obstacle() {
    let config = ScenarioConfig {
        duration: Some(300.0),
        initial_conditions: InitialConditions {
            vehicles: vec![
                initial_vehicle("main", "obstacle", 500.0, 0.0),
                initial_vehicle("main", "car", 0.0, 20.0),
            ],
            densities: vec![],
        },
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 1000.0, 1))
        .unwrap();

    let mut pos = 0.0;
    while sim.time() < 300.0 {
        sim.step().unwrap();
        let veh = moving_vehicles(&sim)[0];
        assert!(veh.pos() >= pos);
        assert!(veh.pos() < 500.0);
        pos = veh.pos();
    }
    // Stopping within a step settles a few cm inside the standstill gap.
    let veh = moving_vehicles(&sim)[0];
    assert!(veh.vel() < 0.1);
    assert_approx_eq!(veh.pos(), 500.0 - 2.0, 0.05);
}

/// A macroscopic source at 1800 veh/h inserts one vehicle every two seconds.
#[test]
fn macro_source_inserts_at_target_flow() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Macro {
                inflow: constant_inflow(1800.0, 25.0),
                gap_acceptance: GapAcceptance::default(),
            }),
            sink: Some(SinkConfig::default()),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 2000.0, 1))
        .unwrap();
    for _ in 0..300 {
        sim.step().unwrap();
    }
    assert!((29..=30).contains(&sim.inserted()));
    assert_eq!(sim.removed(), 0);
}

/// Every vehicle is either in the network or has been removed by a sink.
#[test]
fn vehicles_are_conserved() {
    let config = ScenarioConfig {
        roads: vec![
            RoadConfig {
                source: Some(SourceConfig::Macro {
                    inflow: constant_inflow(2400.0, 20.0),
                    gap_acceptance: GapAcceptance::default(),
                }),
                ..RoadConfig::new("up")
            },
            RoadConfig {
                sink: Some(SinkConfig::default()),
                ..RoadConfig::new("down")
            },
        ],
        initial_conditions: InitialConditions {
            vehicles: vec![
                initial_vehicle("up", "car", 100.0, 10.0),
                initial_vehicle("down", "obstacle", 150.0, 0.0),
            ],
            densities: vec![],
        },
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    let mut topology = Topology::new()
        .segment("up", 300.0, 2)
        .segment("down", 200.0, 2)
        .continue_into("up", "down");
    sim.initialize(&mut topology).unwrap();
    assert_eq!(sim.obstacle_count(), 1);

    for _ in 0..600 {
        sim.step().unwrap();
        let moving = moving_vehicles(&sim).len() as u64;
        assert_eq!(
            moving,
            sim.inserted() + sim.network().initial() - sim.removed()
        );
    }
    assert!(sim.removed() > 0);
}

/// Runs with the same seed give identical trajectories, even with a stochastic model.
#[test]
fn fixed_seed_is_reproducible() {
    let run = || {
        let config = ScenarioConfig {
            fixed_seed: true,
            seed: 1234,
            roads: vec![RoadConfig {
                source: Some(SourceConfig::Macro {
                    inflow: constant_inflow(1500.0, 15.0),
                    gap_acceptance: GapAcceptance::default(),
                }),
                sink: Some(SinkConfig::default()),
                ..RoadConfig::new("main")
            }],
            ..base_config(ModelSpec::new("NSM", [("p_slowdown", 0.3)]))
        };
        let mut sim = Simulation::new(config);
        sim.initialize(&mut Topology::new().segment("main", 1500.0, 1))
            .unwrap();
        for _ in 0..400 {
            sim.step().unwrap();
        }
        let mut state = sim
            .network()
            .vehicles()
            .map(|veh| (veh.number(), veh.pos(), veh.vel()))
            .collect::<Vec<_>>();
        state.sort_by_key(|(number, _, _)| *number);
        state
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

/// Resetting replays the run from the beginning.
#[test]
fn reset_replays_the_run() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Macro {
                inflow: constant_inflow(1200.0, 20.0),
                gap_acceptance: GapAcceptance::default(),
            }),
            sink: Some(SinkConfig::default()),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 1000.0, 1))
        .unwrap();
    let positions = |sim: &Simulation| {
        let mut state = moving_vehicles(sim)
            .iter()
            .map(|veh| (veh.number(), veh.pos()))
            .collect::<Vec<_>>();
        state.sort_by_key(|(number, _)| *number);
        state
    };

    for _ in 0..200 {
        sim.step().unwrap();
    }
    let first = positions(&sim);
    sim.reset().unwrap();
    assert_eq!(sim.vehicle_count(), 0);
    for _ in 0..200 {
        sim.step().unwrap();
    }
    assert!(!first.is_empty());
    assert_eq!(first, positions(&sim));
}

/// Without a duration the run ends after a minute once only obstacles remain.
#[test]
fn completes_when_network_is_empty() {
    let arrivals = [1.0, 2.0, 3.0]
        .into_iter()
        .map(|time| MicroInflowRecord {
            time,
            lane: 0,
            type_label: Some("car".into()),
            speed: 20.0,
        })
        .collect();
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Micro {
                records: arrivals,
                policy: InfeasiblePolicy::Drop,
            }),
            sink: Some(SinkConfig::default()),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 300.0, 1))
        .unwrap();

    let completed = std::rc::Rc::new(std::cell::Cell::new(None));
    let flag = completed.clone();
    sim.set_completion_callback(move |time| flag.set(Some(time)));
    let steps = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = steps.clone();
    sim.add_listener(move |_dt: f64, _time: f64, _iteration: u64| counter.set(counter.get() + 1));

    let time = sim.run_to_completion().unwrap();
    assert!(time > 60.0 && time < 61.0);
    assert_eq!(completed.get(), Some(time));
    assert_eq!(steps.get(), sim.iteration());
    assert_eq!(sim.state(), SimulationState::Completed);
    assert_eq!(sim.inserted(), 3);
    assert_eq!(sim.removed(), 3);
    assert_eq!(sim.vehicle_count(), 0);
}

#[test]
fn stop_handle_ends_run() {
    let mut sim = Simulation::new(ScenarioConfig {
        duration: Some(1000.0),
        ..base_config(idm())
    });
    sim.initialize(&mut Topology::new().segment("main", 100.0, 1))
        .unwrap();
    let handle = sim.stop_handle();
    sim.add_listener(move |_dt: f64, time: f64, _iteration: u64| {
        if time >= 10.0 {
            handle.stop();
        }
    });
    let time = sim.run_to_completion().unwrap();
    assert!(time >= 10.0 && time < 10.5);
}

/// A red light holds traffic back at its stop line.
#[test]
fn red_light_stops_vehicles() {
    let config = ScenarioConfig {
        duration: Some(120.0),
        traffic_lights: vec![TrafficLightConfig {
            signal_id: "s1".into(),
            road_id: "main".into(),
            position: 300.0,
        }],
        regulators: vec![RegulatorConfig {
            name: "junction".into(),
            phases: vec![PhaseConfig {
                statuses: vec![("s1".into(), LightStatus::Red)],
                min_duration: 1000.0,
                max_duration: 1000.0,
                extend_on: None,
            }],
            offset: 0.0,
        }],
        initial_conditions: InitialConditions {
            vehicles: vec![initial_vehicle("main", "car", 0.0, 15.0)],
            densities: vec![],
        },
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 1000.0, 1))
        .unwrap();
    sim.run_to_completion().unwrap();

    let veh = moving_vehicles(&sim)[0];
    assert!(veh.pos() < 300.0);
    assert!(veh.pos() > 290.0);
    assert!(veh.has_stopped());
}

/// An on-ramp merges vehicles into its zone.
#[test]
fn ramp_merges_vehicles() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            simple_ramp: Some(SimpleRampConfig {
                inflow: constant_inflow(900.0, 20.0),
                merge_start: 500.0,
                merge_length: 200.0,
                ..Default::default()
            }),
            sink: Some(SinkConfig::default()),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 2000.0, 2))
        .unwrap();
    for _ in 0..600 {
        sim.step().unwrap();
    }

    let segment = sim.network().segments().next().unwrap();
    let ramp = segment.ramp().unwrap();
    assert!(ramp.inserted() >= 25);
    assert_eq!(ramp.lane(), 1);
    // Merged vehicles never appear upstream of the zone.
    assert!(sim
        .network()
        .vehicles()
        .all(|veh| veh.pos() >= 500.0 && veh.lane() == 1));
}

/// Obstacles inserted by a source do not keep an open-ended run going.
#[test]
fn completes_with_inserted_obstacle() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Micro {
                records: vec![MicroInflowRecord {
                    time: 1.0,
                    lane: 0,
                    type_label: Some("obstacle".into()),
                    speed: 0.0,
                }],
                policy: InfeasiblePolicy::Drop,
            }),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 300.0, 1))
        .unwrap();
    assert_eq!(sim.obstacle_count(), 0);

    let time = sim.run_to_completion().unwrap();
    assert!(time > 60.0 && time < 61.0);
    assert_eq!(sim.vehicle_count(), 1);
    assert_eq!(sim.obstacle_count(), 1);
}

fn waiting_at_source(sim: &Simulation) -> f64 {
    match sim.network().segments().next().unwrap().source() {
        Some(TrafficSource::Macro(source)) => source.waiting(),
        other => panic!("expected a macroscopic source, got {:?}", other),
    }
}

/// A blocked entry delays macroscopic inflow instead of losing it.
#[test]
fn blocked_macro_inflow_is_delayed() {
    let config = ScenarioConfig {
        traffic_lights: vec![TrafficLightConfig {
            signal_id: "s1".into(),
            road_id: "main".into(),
            position: 40.0,
        }],
        regulators: vec![RegulatorConfig {
            name: "entry".into(),
            phases: vec![
                PhaseConfig {
                    statuses: vec![("s1".into(), LightStatus::Red)],
                    min_duration: 60.0,
                    max_duration: 60.0,
                    extend_on: None,
                },
                PhaseConfig {
                    statuses: vec![("s1".into(), LightStatus::Green)],
                    min_duration: 1000.0,
                    max_duration: 1000.0,
                    extend_on: None,
                },
            ],
            offset: 0.0,
        }],
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Macro {
                inflow: constant_inflow(900.0, 10.0),
                gap_acceptance: GapAcceptance::default(),
            }),
            sink: Some(SinkConfig::default()),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 1000.0, 1))
        .unwrap();

    let mut most_waiting: f64 = 0.0;
    for _ in 0..3000 {
        sim.step().unwrap();
        let waiting = waiting_at_source(&sim);
        most_waiting = most_waiting.max(waiting);
        assert_approx_eq!(sim.inserted() as f64 + waiting, 0.25 * sim.time(), 1e-6);
    }
    // The queue behind the red light reached back to the entry.
    assert!(most_waiting > 2.0);
    assert!(waiting_at_source(&sim) < 1.0);
}

fn blocked_arrival(policy: InfeasiblePolicy) -> Simulation {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Micro {
                records: vec![MicroInflowRecord {
                    time: 0.0,
                    lane: 0,
                    type_label: Some("car".into()),
                    speed: 0.0,
                }],
                policy,
            }),
            ..RoadConfig::new("main")
        }],
        initial_conditions: InitialConditions {
            vehicles: vec![initial_vehicle("main", "car", 1.0, 10.0)],
            densities: vec![],
        },
        ..base_config(idm())
    };
    let mut sim = Simulation::new(config);
    sim.initialize(&mut Topology::new().segment("main", 1000.0, 1))
        .unwrap();
    sim
}

fn micro_source(sim: &Simulation) -> &MicroSource {
    match sim.network().segments().next().unwrap().source() {
        Some(TrafficSource::Micro(source)) => source,
        other => panic!("expected a microscopic source, got {:?}", other),
    }
}

/// An arrival overlapping the vehicle at the entry is dropped.
#[test]
fn blocked_arrival_is_dropped() {
    let mut sim = blocked_arrival(InfeasiblePolicy::Drop);
    sim.step().unwrap();
    assert_eq!(micro_source(&sim).dropped(), 1);
    assert_eq!(micro_source(&sim).inserted(), 0);
    assert!(!micro_source(&sim).is_pending());

    sim.step().unwrap();
    assert_eq!(micro_source(&sim).inserted(), 0);
    assert_eq!(sim.vehicle_count(), 1);
}

/// A deferred arrival enters once the vehicle ahead has cleared the entry.
#[test]
fn blocked_arrival_is_deferred() {
    let mut sim = blocked_arrival(InfeasiblePolicy::Defer);
    sim.step().unwrap();
    assert!(micro_source(&sim).is_pending());
    assert_eq!(micro_source(&sim).inserted(), 0);
    assert_eq!(micro_source(&sim).dropped(), 0);
    assert_eq!(sim.vehicle_count(), 1);

    sim.step().unwrap();
    assert!(!micro_source(&sim).is_pending());
    assert_eq!(micro_source(&sim).inserted(), 1);
    assert_eq!(sim.vehicle_count(), 2);
    let mut lane = sim.network().vehicles().collect::<Vec<_>>();
    lane.sort_by(|a, b| a.pos().total_cmp(&b.pos()));
    assert_eq!(lane[0].pos(), 0.0);
    assert!(lane[1].pos_rear() >= lane[0].pos());
}

fn init_error(config: ScenarioConfig, topology: Topology) -> ConfigError {
    let mut sim = Simulation::new(config);
    let mut topology = topology;
    let err = sim.initialize(&mut topology).unwrap_err();
    assert_eq!(sim.state(), SimulationState::Uninitialized);
    err
}

#[test]
fn rejects_unknown_model() {
    let err = init_error(
        base_config(ModelSpec::new("FOO", [])),
        Topology::new().segment("main", 100.0, 1),
    );
    assert_eq!(err, ConfigError::UnknownModel("FOO".into()));
}

#[test]
fn rejects_unknown_road() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig::new("nowhere")],
        ..base_config(idm())
    };
    let err = init_error(config, Topology::new().segment("main", 100.0, 1));
    assert_eq!(err, ConfigError::UnknownRoad("nowhere".into()));
}

#[test]
fn rejects_light_without_regulator() {
    let config = ScenarioConfig {
        traffic_lights: vec![TrafficLightConfig {
            signal_id: "s1".into(),
            road_id: "main".into(),
            position: 50.0,
        }],
        ..base_config(idm())
    };
    let err = init_error(config, Topology::new().segment("main", 100.0, 1));
    assert_eq!(
        err,
        ConfigError::UninitializedLight {
            signal: "s1".into(),
            road: "main".into(),
        }
    );
}

#[test]
fn rejects_micro_arrival_on_missing_lane() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Micro {
                records: vec![MicroInflowRecord {
                    time: 0.0,
                    lane: 3,
                    type_label: None,
                    speed: 10.0,
                }],
                policy: InfeasiblePolicy::Defer,
            }),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let err = init_error(config, Topology::new().segment("main", 100.0, 2));
    assert_eq!(
        err,
        ConfigError::InvalidLane {
            road: "main".into(),
            lane: 3,
            lanes: 2,
        }
    );
}

#[test]
fn rejects_sink_without_exit() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            sink: Some(SinkConfig::default()),
            ..RoadConfig::new("a")
        }],
        ..base_config(idm())
    };
    let topology = Topology::new()
        .segment("a", 100.0, 1)
        .segment("b", 100.0, 1)
        .continue_into("a", "b");
    assert_eq!(init_error(config, topology), ConfigError::NoSink("a".into()));
}

#[test]
fn rejects_bottleneck_with_repeated_knot() {
    let knot = |position| BottleneckPoint {
        position,
        alpha_t: 1.2,
        alpha_v0: 0.9,
    };
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            bottlenecks: vec![BottleneckConfig {
                points: vec![knot(200.0), knot(200.0)],
            }],
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let err = init_error(config, Topology::new().segment("main", 500.0, 1));
    assert!(matches!(err, ConfigError::Invalid(_)), "{:?}", err);
}

#[test]
fn rejects_failed_topology() {
    let err = init_error(base_config(idm()), Topology::new().segment("main", -1.0, 1));
    assert_eq!(err, ConfigError::NetworkLoad);
}

#[cfg(feature = "serde")]
#[test]
fn scenario_config_round_trips_through_json() {
    let config = ScenarioConfig {
        roads: vec![RoadConfig {
            source: Some(SourceConfig::Macro {
                inflow: constant_inflow(1800.0, 25.0),
                gap_acceptance: GapAcceptance::default(),
            }),
            ..RoadConfig::new("main")
        }],
        ..base_config(idm())
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: ScenarioConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
}
