//! # Agora Agents
//!
//! The agents that run on the Agora runtime:
//!
//! - [`greeter`]: connects, says hello, leaves.
//! - [`sensor`]: perceives disaster severity on a fixed period.
//! - [`rescue`]: a rescue team modelled as a state machine.
//! - [`collective`]: recon, coordinator, and watchdog exchanging
//!   INFORM / REQUEST messages.
//!
//! Every random input goes through a [`percept::Sense`], so runs can be
//! seeded or scripted.

pub mod collective;
pub mod greeter;
pub mod percept;
pub mod rescue;
pub mod sensor;

pub use collective::{Collective, CollectiveSenses, OperationSummary};
pub use greeter::greeter_agent;
pub use percept::{Scripted, Sense, Severity};
pub use rescue::{RescueState, rescue_agent};
pub use sensor::{SensorState, sensor_agent};
