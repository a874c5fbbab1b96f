//! Plugins used by the bundled widgets

pub mod masker;
pub mod slider_flex;
pub mod zoom;

pub use masker::{Masker, MASKER};
pub use slider_flex::SliderFlex;
pub use zoom::{Zoom, ZOOM};

use vane_core::{Registry, Result};

/// Register every bundled plugin type
pub fn register(registry: &Registry) -> Result<()> {
    Masker::register(registry)?;
    Zoom::register(registry)?;
    SliderFlex::register(registry)?;
    Ok(())
}
