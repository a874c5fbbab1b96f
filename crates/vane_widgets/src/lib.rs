//! Vane Widget Library
//!
//! Widgets and plugins built on the public `vane_core` runtime:
//!
//! - [`Slider`]: touch carousel with auto advance
//! - [`ImageView`]: full-screen image viewer with zoom
//! - [`FileUpload`]: single-file uploader over a pluggable [`Transport`]
//! - [`plugins`]: `Masker`, `Zoom` and `SliderFlex`
//!
//! # Example
//!
//! ```rust
//! use vane_core::{Options, Registry};
//! use vane_widgets::prelude::*;
//!
//! let registry = Registry::default();
//! vane_widgets::register_all(&registry).unwrap();
//!
//! let dom = registry.dom();
//! let main = dom.create_element("div");
//! let wrapper = dom.create_element("div");
//! dom.append_child(main, wrapper);
//! for _ in 0..3 {
//!     dom.append_child(wrapper, dom.create_element("div"));
//! }
//!
//! let slider = Slider::new(&registry, Options::new().main(main).set("auto", false)).unwrap();
//! slider.render().unwrap();
//! slider.next().unwrap();
//! assert_eq!(slider.get("index").as_i64(), Some(1));
//! ```

pub mod file_upload;
pub mod image_view;
pub mod plugins;
pub mod slider;

pub use file_upload::{
    FailReason, FileUpload, FileUploadRuntime, Transport, UploadFile, UploadReply, UploadRequest,
    UploadState, FILE_UPLOAD, PROGRESS_TICK,
};
pub use image_view::{fit_image, Fit, ImageView, ImageViewRuntime, IMAGE_VIEW};
pub use slider::{Slider, SliderRuntime, SLIDER, SLIDER_FLEX};

use vane_core::{Registry, Result};

/// Register `Slider`, `ImageView` and every bundled plugin
///
/// `FileUpload` needs a transport and is registered on its own through
/// [`FileUpload::register`].
pub fn register_all(registry: &Registry) -> Result<()> {
    Slider::register(registry)?;
    ImageView::register(registry)?;
    plugins::register(registry)?;
    tracing::debug!("bundled widgets registered");
    Ok(())
}

pub mod prelude {
    pub use crate::file_upload::{FileUpload, Transport, UploadFile, UploadReply, UploadState};
    pub use crate::image_view::ImageView;
    pub use crate::plugins::{Masker, SliderFlex, Zoom};
    pub use crate::slider::Slider;
}
