pub mod fakes;
mod fixture;
mod gestures;
mod model;
mod service;
