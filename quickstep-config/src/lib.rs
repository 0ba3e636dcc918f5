//! KDL configuration for the gesture core.
//!
//! Every section is optional and every value has a default, so an empty file is a valid config.

use std::ffi::OsStr;
use std::path::Path;

use miette::{Context, IntoDiagnostic};
use tracing::debug;

pub mod gestures;
pub mod recents;
pub mod touch_region;
pub mod utils;

pub use crate::gestures::{Gestures, SpringParams};
pub use crate::recents::{Debug, Overview, Recents};
pub use crate::touch_region::{ComponentName, TouchRegion};
pub use crate::utils::FloatOrInt;

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Config {
    #[knuffel(child, default)]
    pub gestures: Gestures,
    #[knuffel(child, default)]
    pub touch_region: TouchRegion,
    #[knuffel(child, default)]
    pub recents: Recents,
    #[knuffel(child, default)]
    pub overview: Overview,
    #[knuffel(child, default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let filename = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("config.kdl");
        let config = Self::parse(filename, &contents).context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        let _span = tracy_client::span!("Config::parse");
        knuffel::parse(filename, text)
    }
}
