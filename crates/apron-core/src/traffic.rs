//! Taxi traffic tracking.
//!
//! Each taxiing aircraft keeps the set of nearby aircraft that could block
//! it. The simulation loop runs a [`ProximitySensor`] once per tick and
//! feeds every hit to the observer's [`TrafficTracker`]; the tracker
//! filters by the candidate's lifecycle state.

use crate::geometry::{direction_from_heading, flatten, ground_distance};
use crate::lifecycle::LifecycleState;
use crate::models::AircraftId;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Which way the proximity sensor looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadarMode {
    Forward,
    /// Used while pushing back
    Backward,
}

/// What other aircraft can see of an aircraft during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub id: AircraftId,
    pub tail: String,
    pub state: LifecycleState,
    pub position: DVec3,
    pub heading_deg: f64,
    pub radar: Option<RadarMode>,
}

/// Returns the aircraft currently inside an observer's sensor volume.
pub trait ProximitySensor {
    fn scan(&self, observer: &TrafficSnapshot, others: &[TrafficSnapshot]) -> Vec<AircraftId>;
}

/// A flat cone in front of (or behind) the observer.
#[derive(Debug, Clone, Copy)]
pub struct ConeRadar {
    pub range_m: f64,
    pub half_angle_deg: f64,
}

impl ProximitySensor for ConeRadar {
    fn scan(&self, observer: &TrafficSnapshot, others: &[TrafficSnapshot]) -> Vec<AircraftId> {
        let Some(mode) = observer.radar else {
            return Vec::new();
        };
        let mut look = direction_from_heading(observer.heading_deg);
        if mode == RadarMode::Backward {
            look = -look;
        }
        others
            .iter()
            .filter(|other| other.id != observer.id)
            .filter(|other| {
                let offset = flatten(other.position - observer.position);
                let distance = offset.length();
                if distance > self.range_m {
                    return false;
                }
                distance < 1e-6 || look.angle_between(offset).to_degrees() <= self.half_angle_deg
            })
            .map(|other| other.id)
            .collect()
    }
}

/// Ordered set of aircraft an observer is keeping an eye on.
#[derive(Debug, Clone, Default)]
pub struct TrafficTracker {
    tracked: Vec<AircraftId>,
}

impl TrafficTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `candidate` if its state can interfere with taxiing.
    ///
    /// Returns whether the candidate was newly added.
    pub fn admit(&mut self, candidate: AircraftId, state: LifecycleState) -> bool {
        if !state.is_ground() || state.is_in_gate() {
            return false;
        }
        if self.tracked.contains(&candidate) {
            return false;
        }
        self.tracked.push(candidate);
        true
    }

    pub fn remove(&mut self, id: AircraftId) {
        self.tracked.retain(|tracked| *tracked != id);
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
    }

    pub fn contains(&self, id: AircraftId) -> bool {
        self.tracked.contains(&id)
    }

    pub fn tracked(&self) -> &[AircraftId] {
        &self.tracked
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// First tracked aircraft, in tracking order, whose current state blocks.
    ///
    /// `state_of` resolves a handle to its current state; handles that no
    /// longer resolve are skipped.
    pub fn first_blocking<F>(&self, state_of: F) -> Option<AircraftId>
    where
        F: Fn(AircraftId) -> Option<LifecycleState>,
    {
        self.tracked
            .iter()
            .copied()
            .find(|id| state_of(*id).is_some_and(|state| state.can_block()))
    }
}

/// Whether a traffic hold on `blocker` may be lifted.
pub fn traffic_cleared(
    own_position: DVec3,
    blocker: Option<&TrafficSnapshot>,
    release_distance_m: f64,
) -> bool {
    match blocker {
        None => true,
        Some(blocker) => {
            blocker.state == LifecycleState::Inactive
                || ground_distance(own_position, blocker.position) >= release_distance_m
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> AircraftId {
        AircraftId::new(index, 0)
    }

    fn snapshot(index: u32, state: LifecycleState, x: f64, z: f64, heading: f64) -> TrafficSnapshot {
        TrafficSnapshot {
            id: id(index),
            tail: format!("N{}", index),
            state,
            position: DVec3::new(x, 0.0, z),
            heading_deg: heading,
            radar: Some(RadarMode::Forward),
        }
    }

    #[test]
    fn test_admit_filters_by_state_group() {
        let mut tracker = TrafficTracker::new();
        assert!(tracker.admit(id(1), LifecycleState::TaxiToRunway));
        assert!(!tracker.admit(id(1), LifecycleState::TaxiToRunway));
        assert!(!tracker.admit(id(2), LifecycleState::Loading));
        assert!(!tracker.admit(id(3), LifecycleState::PushbackRequest));
        assert!(!tracker.admit(id(4), LifecycleState::OnFinal));
        assert!(tracker.admit(id(5), LifecycleState::ExitRunway));
        assert!(tracker.admit(id(6), LifecycleState::Inactive));
        assert_eq!(tracker.tracked(), &[id(1), id(5), id(6)]);
    }

    #[test]
    fn test_first_blocking_skips_parked() {
        let mut tracker = TrafficTracker::new();
        tracker.admit(id(1), LifecycleState::Inactive);
        tracker.admit(id(2), LifecycleState::HoldOnTraffic);
        tracker.admit(id(3), LifecycleState::TaxiToRunway);
        let states = |candidate: AircraftId| match candidate.index {
            1 => Some(LifecycleState::Inactive),
            2 => Some(LifecycleState::HoldOnTraffic),
            _ => Some(LifecycleState::TaxiToRunway),
        };
        assert_eq!(tracker.first_blocking(states), Some(id(2)));
    }

    #[test]
    fn test_first_blocking_ignores_destroyed() {
        let mut tracker = TrafficTracker::new();
        assert!(tracker.admit(id(7), LifecycleState::TaxiToRunway));
        assert_eq!(tracker.first_blocking(|_| None), None);
    }

    #[test]
    fn test_cone_radar_sees_ahead_only() {
        let radar = ConeRadar {
            range_m: 40.0,
            half_angle_deg: 30.0,
        };
        let observer = snapshot(0, LifecycleState::TaxiToRunway, 0.0, 0.0, 0.0);
        let others = vec![
            snapshot(1, LifecycleState::TaxiToRunway, 0.0, 30.0, 0.0),
            snapshot(2, LifecycleState::TaxiToRunway, 0.0, -20.0, 0.0),
            snapshot(3, LifecycleState::TaxiToRunway, 30.0, 5.0, 0.0),
            snapshot(4, LifecycleState::TaxiToRunway, 0.0, 60.0, 0.0),
        ];
        assert_eq!(radar.scan(&observer, &others), vec![id(1)]);
    }

    #[test]
    fn test_backward_radar_looks_behind() {
        let radar = ConeRadar {
            range_m: 40.0,
            half_angle_deg: 30.0,
        };
        let mut observer = snapshot(0, LifecycleState::Pushback, 0.0, 0.0, 0.0);
        observer.radar = Some(RadarMode::Backward);
        let behind = snapshot(1, LifecycleState::TaxiToRunway, 0.0, -20.0, 0.0);
        let ahead = snapshot(2, LifecycleState::TaxiToRunway, 0.0, 20.0, 0.0);
        assert_eq!(radar.scan(&observer, &[behind, ahead]), vec![id(1)]);
    }

    #[test]
    fn test_radar_off_sees_nothing() {
        let radar = ConeRadar {
            range_m: 40.0,
            half_angle_deg: 30.0,
        };
        let mut observer = snapshot(0, LifecycleState::Loading, 0.0, 0.0, 0.0);
        observer.radar = None;
        let ahead = snapshot(2, LifecycleState::TaxiToRunway, 0.0, 20.0, 0.0);
        assert!(radar.scan(&observer, &[ahead]).is_empty());
    }

    #[test]
    fn test_release_distance_and_inactive() {
        let blocker = snapshot(1, LifecycleState::TaxiToRunway, 0.0, 44.0, 0.0);
        assert!(!traffic_cleared(DVec3::ZERO, Some(&blocker), 45.0));
        let far = snapshot(1, LifecycleState::TaxiToRunway, 0.0, 45.0, 0.0);
        assert!(traffic_cleared(DVec3::ZERO, Some(&far), 45.0));
        let parked = snapshot(1, LifecycleState::Inactive, 0.0, 5.0, 0.0);
        assert!(traffic_cleared(DVec3::ZERO, Some(&parked), 45.0));
        assert!(traffic_cleared(DVec3::ZERO, None, 45.0));
    }
}
