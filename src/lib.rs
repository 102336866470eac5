pub mod config;
pub mod content;
pub mod dom;
pub mod engine;
pub mod map;
pub mod nav;
pub mod net;
pub mod prefs;
