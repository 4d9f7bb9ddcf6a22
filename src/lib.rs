//! # UAV Commander Library
//!
//! Command executor for a single aircraft, driven by a ground client over UDP.
//!
//! The client sends framed requests (`SET_OFFBOARD`, `SET_ARM`,
//! `SET_RETURN_TO_HOME`, `GOTO`, `HEARTBEAT`). Mutating commands run one at
//! a time against a [`gateway::FlightGateway`]; heartbeats answer with a
//! telemetry snapshot and the progress of the last command.

pub mod config;
pub mod error;
pub mod executor;
pub mod framing;
pub mod gateway;
pub mod message;
pub mod navigation;
pub mod server;
