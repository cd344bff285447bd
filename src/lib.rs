//! Reorderable setlist with a single embedded media player.

pub mod config;
pub mod config_persistence;
pub mod db_manager;
pub mod debounce;
pub mod drag;
pub mod headless_host;
pub mod lookup_worker;
pub mod media_link;
pub mod oembed_lookup;
pub mod platform;
pub mod player;
pub mod protocol;
pub mod reference_labels;
pub mod selection;
pub mod session;
pub mod setlist;
pub mod song;
