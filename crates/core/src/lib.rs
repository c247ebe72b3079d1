//! Core library: folder registry, video enumeration, tagging, playback memory
//! and the dispatch table that front ends drive.

pub mod browser;
pub mod config;
pub mod folders;
pub mod library;
pub mod models;
pub mod paths;
pub mod playback;
pub mod player;
pub mod scanner;
pub mod tags;
