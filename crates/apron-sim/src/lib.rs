//! Headless driver for the apron traffic simulator.
//!
//! Supplies the collaborators the core leaves abstract: a point-mass
//! airframe, a scripted tower operator and a timed radio that records
//! everything said on the ground frequency.

pub mod kinematics;
pub mod radio;
pub mod runner;
pub mod tower;

pub use kinematics::{KinematicFactory, PointMass, SharedBody};
pub use radio::{RadioLog, TranscriptEntry};
pub use runner::{run, RunOptions, RunSummary, Simulation};
pub use tower::{Card, ScriptedTower};
