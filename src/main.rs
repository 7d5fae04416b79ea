use std::time::Instant;

use traffic_kernel::config::{
    CompositionEntry, GapAcceptance, InflowPoint, LaneChangeConfig, ModelSpec, RoadConfig, ScenarioConfig,
    SinkConfig, SourceConfig, VehicleTypeConfig,
};
use traffic_kernel::{Simulation, Topology};

fn vehicle_type(label: &str, length: f64, model: ModelSpec) -> VehicleTypeConfig {
    VehicleTypeConfig {
        label: label.into(),
        length,
        max_deceleration: 9.0,
        obstacle: false,
        model,
        lane_change: Some(LaneChangeConfig::default()),
        noise: None,
        memory: None,
        speed_factor_stddev: Some(0.1),
    }
}

fn main() {
    env_logger::init();

    let inflow = vec![
        InflowPoint {
            time: 0.0,
            flow_per_hour: 1200.0,
            speed: 25.0,
        },
        InflowPoint {
            time: 600.0,
            flow_per_hour: 1800.0,
            speed: 20.0,
        },
    ];
    let config = ScenarioConfig {
        name: "two-lane freeway".into(),
        timestep: 0.2,
        duration: Some(1200.0),
        vehicle_types: vec![
            vehicle_type("car", 5.0, ModelSpec::new("IDM", [("v0", 33.0), ("T", 1.2)])),
            vehicle_type("truck", 12.0, ModelSpec::new("IDM", [("v0", 22.0), ("T", 1.6)])),
        ],
        composition: vec![CompositionEntry::new("car", 0.8), CompositionEntry::new("truck", 0.2)],
        roads: vec![
            RoadConfig {
                source: Some(SourceConfig::Macro {
                    inflow,
                    gap_acceptance: GapAcceptance::default(),
                }),
                ..RoadConfig::new("upstream")
            },
            RoadConfig {
                sink: Some(SinkConfig::default()),
                ..RoadConfig::new("downstream")
            },
        ],
        ..Default::default()
    };

    let mut topology = Topology::new()
        .segment("upstream", 2000.0, 2)
        .segment("downstream", 1000.0, 2)
        .continue_into("upstream", "downstream");

    let mut sim = Simulation::new(config);
    if let Err(err) = sim.initialize(&mut topology) {
        eprintln!("Invalid scenario: {}", err);
        std::process::exit(1);
    }

    println!("Simulating...");
    let start = Instant::now();
    match sim.run_to_completion() {
        Ok(time) => {
            let elapsed = start.elapsed();
            println!(
                "Simulated {:.0} s in {:?} --> {:.0}x speedup ({} inserted, {} removed, {} remaining)",
                time,
                elapsed,
                time / elapsed.as_secs_f64(),
                sim.inserted(),
                sim.removed(),
                sim.vehicle_count(),
            );
        }
        Err(err) => {
            eprintln!("Simulation aborted: {}", err);
            std::process::exit(1);
        }
    }
}
