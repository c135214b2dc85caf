//! Natours: tour catalogue, reviews, accounts and paid bookings over a
//! JSON HTTP API backed by PostgreSQL.

pub mod aggregate;
pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod query;
pub mod repository;
pub mod state;
pub mod validation;
