pub mod activity;
pub mod animation;
pub mod cli;
pub mod executor;
pub mod gesture_state;
pub mod motion;
pub mod multi_state;
pub mod overview_command;
pub mod recents_animation;
pub mod service;
pub mod swipe;
pub mod swipe_tracker;
pub mod system;
pub mod tasks;
pub mod utils;

#[cfg(test)]
mod tests;
