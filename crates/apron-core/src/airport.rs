//! Static airport data: gates, runways, approaches, waypoints and routes.
//!
//! The tables are injected into the fleet at construction. Every name that
//! appears in a route table, approach or zone is checked by
//! [`Airport::validate`], so lookups during a run only fail when the data was
//! mutated after loading.

use crate::error::{ConfigError, Result};
use crate::geometry::METERS_PER_FOOT;
use crate::models::{
    AirportInfo, Approach, ArrivalEntry, DepartureProcedure, DetectionZone, FinalApproach, Gate,
    GateStatus, Pattern, Runway, RunwayExit, ZoneKind,
};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// One directed edge of the published taxiway graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxiwayLink {
    pub from: String,
    pub to: String,
    pub heading_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airport {
    pub info: AirportInfo,
    pub runways: Vec<Runway>,
    pub pattern: Pattern,
    pub approaches: Vec<Approach>,
    pub gates: Vec<Gate>,
    /// Ground waypoints by name, meters
    pub waypoints: BTreeMap<String, DVec3>,
    /// Approach fixes by name; y is the fix altitude in meters
    pub fixes: BTreeMap<String, DVec3>,
    pub zones: Vec<DetectionZone>,
    pub departure: DepartureProcedure,
    /// Runway exits in the order a landing roll passes them
    pub exits: Vec<RunwayExit>,
    /// Shared taxi-in waypoints between the parallel taxiway and the apron
    pub taxi_in_trunk: Vec<String>,
    pub arrival: ArrivalEntry,
    pub final_approach: FinalApproach,
    /// Published taxiway connectivity. Routing is table-driven; the graph is
    /// loaded and validated for completeness only.
    #[serde(default)]
    pub taxiway_graph: Vec<TaxiwayLink>,
}

impl Airport {
    /// Parse and validate an airport document.
    pub fn from_json(json: &str) -> Result<Self> {
        let airport: Airport = serde_json::from_str(json)?;
        airport.validate()?;
        Ok(airport)
    }

    /// Check that every cross reference in the tables resolves.
    pub fn validate(&self) -> Result<()> {
        for gate in &self.gates {
            self.waypoint(&gate.pushback_target)?;
            self.waypoint(&gate.taxi_out)?;
            if let Some(taxi_in) = &gate.taxi_in {
                self.waypoint(taxi_in)?;
            }
        }
        for approach in &self.approaches {
            if approach.waypoints.is_empty() {
                return Err(ConfigError::MalformedAirport(format!(
                    "approach {} has no waypoints",
                    approach.name
                )));
            }
            for fix in &approach.waypoints {
                self.approach_fix(fix)?;
            }
            self.runway(&approach.runway)?;
        }
        for runway in &self.pattern.runways_in_use {
            self.runway(runway)?;
        }
        self.runway(&self.departure.runway)?;
        for name in &self.departure.trunk {
            self.waypoint(name)?;
        }
        for name in [
            &self.departure.hold_short,
            &self.departure.takeoff_position,
            &self.departure.takeoff_aim,
        ] {
            self.waypoint(name)?;
        }
        if self.departure.trunk.last() != Some(&self.departure.takeoff_position) {
            return Err(ConfigError::MalformedAirport(
                "departure trunk must end at the takeoff position".into(),
            ));
        }
        if self.exits.is_empty() {
            return Err(ConfigError::MalformedAirport("runway has no exits".into()));
        }
        for exit in &self.exits {
            self.waypoint(&exit.name)?;
            self.waypoint(&exit.join)?;
            for name in &exit.route {
                self.waypoint(name)?;
            }
        }
        for name in &self.taxi_in_trunk {
            self.waypoint(name)?;
        }
        for zone in &self.zones {
            if let ZoneKind::ExitPassed(exit) = &zone.kind {
                self.exit(exit)?;
            }
        }
        self.approach_fix(&self.final_approach.descending_target)
            .or_else(|_| self.waypoint(&self.final_approach.descending_target))?;
        self.waypoint(&self.final_approach.runway_end)?;
        self.waypoint(&self.final_approach.threshold)?;
        for link in &self.taxiway_graph {
            self.waypoint(&link.from)?;
            self.waypoint(&link.to)?;
        }
        Ok(())
    }

    /// Field elevation expressed as a world height in meters.
    pub fn ground_height_m(&self) -> f64 {
        self.info.field_elevation_ft * METERS_PER_FOOT
    }

    pub fn waypoint(&self, name: &str) -> Result<DVec3> {
        self.waypoints
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownWaypoint(name.to_string()))
    }

    pub fn approach_fix(&self, name: &str) -> Result<DVec3> {
        self.fixes
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownWaypoint(name.to_string()))
    }

    /// Landing reference point, looked up among fixes first.
    pub fn landing_reference(&self, name: &str) -> Result<DVec3> {
        self.approach_fix(name).or_else(|_| self.waypoint(name))
    }

    pub fn gate(&self, name: &str) -> Result<&Gate> {
        self.gates
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| ConfigError::UnknownGate(name.to_string()))
    }

    pub fn gate_status(&self, name: &str) -> Result<GateStatus> {
        Ok(self.gate(name)?.status)
    }

    pub fn set_gate_status(&mut self, name: &str, status: GateStatus) -> Result<()> {
        let gate = self
            .gates
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| ConfigError::UnknownGate(name.to_string()))?;
        tracing::debug!("Gate {} {:?} -> {:?}", name, gate.status, status);
        gate.status = status;
        Ok(())
    }

    /// Names of gates that are neither occupied nor reserved.
    pub fn available_gates(&self) -> Vec<String> {
        self.gates
            .iter()
            .filter(|g| g.status == GateStatus::Empty)
            .map(|g| g.name.clone())
            .collect()
    }

    pub fn runways_in_use(&self) -> &[String] {
        &self.pattern.runways_in_use
    }

    pub fn runway(&self, name: &str) -> Result<&Runway> {
        self.runways
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ConfigError::UnknownRunway(name.to_string()))
    }

    pub fn approach(&self, name: &str) -> Result<&Approach> {
        self.approaches
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| ConfigError::UnknownApproach(name.to_string()))
    }

    /// Approaches that land on `runway`, in table order.
    pub fn approaches_for_runway(&self, runway: &str) -> Vec<String> {
        self.approaches
            .iter()
            .filter(|a| a.runway == runway)
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn runway_width_for_approach(&self, approach: &str) -> Result<f64> {
        let approach = self.approach(approach)?;
        Ok(self.runway(&approach.runway)?.width_m)
    }

    pub fn exit(&self, name: &str) -> Result<&RunwayExit> {
        self.exits
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownExit(name.to_string()))
    }

    pub fn exit_names(&self) -> Vec<String> {
        self.exits.iter().map(|e| e.name.clone()).collect()
    }

    /// Taxi route from a gate's pushback point to the takeoff position.
    pub fn departure_route(&self, gate: &str) -> Result<VecDeque<String>> {
        let gate = self.gate(gate)?;
        let mut route = VecDeque::with_capacity(self.departure.trunk.len() + 1);
        route.push_back(gate.taxi_out.clone());
        route.extend(self.departure.trunk.iter().cloned());
        Ok(route)
    }

    /// Waypoints that take a landing aircraft off the runway at `exit`.
    pub fn exit_route(&self, exit: &str) -> Result<Vec<String>> {
        Ok(self.exit(exit)?.route.clone())
    }

    /// Waypoints from the end of an exit route to the apron point of `gate`.
    pub fn taxi_in_route(&self, exit: &str, gate: &str) -> Result<Vec<String>> {
        let exit = self.exit(exit)?;
        let gate = self.gate(gate)?;
        let mut route = Vec::with_capacity(self.taxi_in_trunk.len() + 2);
        route.push(exit.join.clone());
        route.extend(self.taxi_in_trunk.iter().cloned());
        route.extend(gate.taxi_in.iter().cloned());
        Ok(route)
    }

    /// Detection zones that contain a world position.
    pub fn zones_containing(&self, position: DVec3) -> impl Iterator<Item = &DetectionZone> {
        self.zones.iter().filter(move |z| z.contains(position))
    }

    /// Outgoing taxiway graph edges of a waypoint.
    pub fn neighbors(&self, name: &str) -> Vec<&TaxiwayLink> {
        self.taxiway_graph.iter().filter(|l| l.from == name).collect()
    }

    /// The schematic Palo Alto layout the simulator ships with.
    ///
    /// Runway 31 lies along x = 0 with the landing threshold near the origin
    /// and the roll toward +z. The parallel taxiway runs at x = 120 and the
    /// apron lane with its six gates sits east of it.
    pub fn palo_alto() -> Self {
        let mut waypoints = BTreeMap::new();
        let mut put = |name: &str, x: f64, z: f64| {
            waypoints.insert(name.to_string(), DVec3::new(x, 0.0, z));
        };

        // Runway centerline
        put("R6", 0.0, 20.0);
        put("Runway31TakeoffSign", 0.0, 40.0);
        put("R5", 0.0, 250.0);
        put("R4", 0.0, 330.0);
        put("R3", 0.0, 450.0);
        put("R2", 0.0, 540.0);
        put("R1", 0.0, 650.0);
        put("RunwayEnd", 0.0, 745.0);
        put("Threshold", 0.0, 0.0);

        // Hold short and runway entry
        put("EnterRunway31Sign", 95.0, 10.0);
        put("A1", 65.0, 5.0);
        put("A2", 30.0, 5.0);

        // Exit connectors
        put("B2", 40.0, 280.0);
        put("B1", 90.0, 300.0);
        put("C2", 40.0, 470.0);
        put("C1", 90.0, 460.0);
        put("E2", 40.0, 665.0);
        put("E1", 90.0, 660.0);

        // Parallel taxiway
        for (name, z) in [
            ("Y10", 30.0),
            ("Y9", 80.0),
            ("Y8", 140.0),
            ("Y7", 200.0),
            ("Y6", 260.0),
            ("Y5", 300.0),
            ("Y4", 340.0),
            ("Y3", 440.0),
            ("Y2", 480.0),
            ("Y1", 640.0),
        ] {
            put(name, 120.0, z);
        }

        // Apron connector and lane
        put("Z2", 150.0, 260.0);
        put("Z1", 200.0, 260.0);
        put("W1", 240.0, 270.0);
        for i in 2..=14 {
            put(&format!("W{}", i), 240.0, 250.0 - 15.0 * (i - 2) as f64);
        }
        put("W15", 230.0, 55.0);
        put("W16", 215.0, 45.0);
        put("W17", 200.0, 45.0);
        put("W18", 185.0, 50.0);
        put("T1", 165.0, 60.0);
        put("T2", 140.0, 70.0);

        let gate_specs = [
            ("P1", 235.7, "W2", "W3", None),
            ("Q1", 205.7, "W4", "W5", Some("W4")),
            ("S1", 175.7, "W6", "W7", Some("W6")),
            ("U1", 145.7, "W8", "W9", Some("W8")),
            ("V1", 115.7, "W10", "W11", Some("W10")),
            ("X1", 85.7, "W12", "W13", Some("W12")),
        ];
        let gates = gate_specs
            .iter()
            .map(|(name, z, pushback, taxi_out, taxi_in)| Gate {
                name: name.to_string(),
                status: GateStatus::Empty,
                position: DVec3::new(200.0, 0.0, *z),
                heading_deg: 270.0,
                entry: DVec3::new(225.7, 0.0, *z),
                pushback_target: pushback.to_string(),
                taxi_out: taxi_out.to_string(),
                taxi_in: taxi_in.map(str::to_string),
            })
            .collect();

        let mut fixes = BTreeMap::new();
        for (name, x, z, altitude_m) in [
            ("A", 0.0, -3000.0, 165.0),
            ("A1", 600.0, -4300.0, 230.0),
            ("A2", 0.0, -4300.0, 230.0),
            ("B", 1500.0, -1500.0, 245.0),
            ("C", 3000.0, -1000.0, 305.0),
            ("D", 2500.0, -3000.0, 245.0),
            ("D1", 1500.0, -4200.0, 245.0),
            ("E", 2500.0, -4500.0, 245.0),
            ("E1", 2000.0, -5500.0, 245.0),
            ("F", 300.0, -5000.0, 240.0),
            ("F1", 1000.0, -5800.0, 245.0),
            ("G", 3500.0, -3500.0, 305.0),
            ("G1", 2000.0, -5000.0, 290.0),
            ("DescendingTarget", 0.0, 150.0, 0.0),
        ] {
            fixes.insert(name.to_string(), DVec3::new(x, altitude_m, z));
        }

        let approach = |name: &str, names: &[&str], altitude: f64| Approach {
            name: name.to_string(),
            waypoints: names.iter().map(|f| f.to_string()).collect(),
            target_altitude_ft: altitude,
            runway: "31".to_string(),
        };

        let exits = vec![
            RunwayExit {
                name: "R5".into(),
                route: vec!["R5".into(), "B2".into(), "B1".into()],
                join: "Y5".into(),
            },
            RunwayExit {
                name: "R3".into(),
                route: vec!["R3".into(), "C2".into(), "C1".into()],
                join: "Y3".into(),
            },
            RunwayExit {
                name: "R1".into(),
                route: vec!["R1".into(), "E2".into(), "E1".into()],
                join: "Y1".into(),
            },
        ];

        let mut zones = vec![DetectionZone {
            kind: ZoneKind::RunwayEntry,
            center: DVec3::new(0.0, 0.0, 20.0),
            radius_m: 40.0,
            max_height_m: 100.0,
        }];
        for (exit, z) in [("R5", 280.0), ("R3", 480.0), ("R1", 680.0)] {
            zones.push(DetectionZone {
                kind: ZoneKind::ExitPassed(exit.to_string()),
                center: DVec3::new(0.0, 0.0, z),
                radius_m: 15.0,
                max_height_m: 30.0,
            });
        }

        let taxiway_graph = [
            ("Q1", "Q2", 270.0),
            ("P1", "P2", 270.0),
            ("R1", "E2", 180.0),
            ("R1", "R2", 0.0),
            ("R2", "R3", 0.0),
            ("R3", "R4", 0.0),
            ("R4", "R5", 0.0),
            ("R5", "B2", 180.0),
            ("R6", "A2", 0.0),
            ("R6", "Runway31TakeoffSign", 180.0),
            ("E1", "E2", 270.0),
            ("E1", "Y1", 90.0),
            ("C1", "C2", 270.0),
            ("C1", "Y3", 90.0),
            ("B1", "B2", 270.0),
            ("B1", "Y5", 90.0),
            ("A1", "A2", 270.0),
            ("A1", "EnterRunway31Sign", 90.0),
            ("Y5", "Y6", 0.0),
            ("Y6", "Z2", 0.0),
            ("Y9", "Y10", 0.0),
            ("Y10", "EnterRunway31Sign", 0.0),
            ("Z1", "Z2", 270.0),
            ("Z1", "W1", 90.0),
            ("W1", "W2", 0.0),
            ("W2", "W3", 0.0),
            ("W6", "T1", 0.0),
            ("T1", "T2", 270.0),
            ("T2", "Y9", 270.0),
        ]
        .iter()
        .filter(|(from, to, _)| waypoints.contains_key(*from) && waypoints.contains_key(*to))
        .map(|(from, to, heading)| TaxiwayLink {
            from: from.to_string(),
            to: to.to_string(),
            heading_deg: *heading,
        })
        .collect();

        Self {
            info: AirportInfo {
                name: "PaloAlto".into(),
                field_elevation_ft: 11.0,
            },
            runways: vec![
                Runway {
                    name: "31".into(),
                    width_m: 21.336,
                    length_m: 744.626,
                },
                Runway {
                    name: "13".into(),
                    width_m: 21.336,
                    length_m: 744.626,
                },
            ],
            pattern: Pattern {
                wind_direction_deg: 310.0,
                runways_in_use: vec!["31".into()],
            },
            approaches: vec![
                approach("A", &["B", "D", "D1", "A1", "A"], 800.0),
                approach("B", &["B", "D", "E", "E1", "F1", "F", "A"], 800.0),
                approach("C", &["A2", "A"], 630.0),
                approach("D", &["C", "G", "G1", "A2", "A"], 1000.0),
            ],
            gates,
            waypoints,
            fixes,
            zones,
            departure: DepartureProcedure {
                runway: "31".into(),
                trunk: [
                    "W14",
                    "W15",
                    "W16",
                    "W17",
                    "W18",
                    "T1",
                    "T2",
                    "Y9",
                    "Y10",
                    "EnterRunway31Sign",
                    "A1",
                    "A2",
                    "R6",
                    "Runway31TakeoffSign",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                hold_short: "EnterRunway31Sign".into(),
                takeoff_position: "Runway31TakeoffSign".into(),
                takeoff_aim: "R1".into(),
                climb_heading_deg: 322.0,
                climb_altitude_ft: 1148.0,
                climb_vertical_rate_fpm: 1000.0,
                flap_retract_altitude_ft: 750.0,
            },
            exits,
            taxi_in_trunk: ["Y6", "Z2", "Z1", "W1", "W2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            arrival: ArrivalEntry {
                position: DVec3::new(2600.0, 700.0 * METERS_PER_FOOT, 200.0),
                heading_deg: 200.0,
                speed_kt: 75.0,
                altitude_ft: 700.0,
            },
            final_approach: FinalApproach {
                descending_target: "DescendingTarget".into(),
                runway_end: "RunwayEnd".into(),
                threshold: "Threshold".into(),
            },
            taxiway_graph,
        }
    }
}
