// ABOUTME: Library root for finn-bobil-sync
// ABOUTME: Mirrors finn.no camper-van listings into MySQL and logs every change

pub mod commands;
pub mod config;
pub mod finn;
pub mod store;
pub mod sync;
pub mod utils;
