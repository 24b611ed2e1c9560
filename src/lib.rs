//! Billing core of the OnliPet app: PIX payload generation and the premium
//! plan lifecycle, with a small HTTP surface on top.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pix;
pub mod services;
pub mod tasks;
