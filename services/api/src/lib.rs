//! SentryDash API server.
//!
//! Serves room occupancy over HTTP: entry/exit recording, overflow
//! suggestions, reservations and roster login. Room state lives in a
//! [`store::RoomStore`]; every occupancy mutation goes through the
//! compare-and-swap loop in [`service::OccupancyService`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod retry;
pub mod service;
pub mod state;
pub mod store;
