//! Transformer trait and the action types it negotiates over.
//!
//! A [`Transformer`] is a pluggable backend that can probe the pixel size of a
//! source and produce a modified variant of it. Before anything runs, the
//! [`registry`](super::registry) asks each transformer how well it can handle
//! a concrete [`Action`] via [`Transformer::can_execute`]. The answer depends
//! on the action kind *and* the input, so one backend may be `Preferred` for
//! modifying a JPEG, `Fallback` for probing it and `Unable` to touch a PDF.
//!
//! Implementations:
//! - [`RustTransformer`](super::rust_backend::RustTransformer): raster formats,
//!   in-process on the `image` crate.
//! - [`MagickTransformer`](super::magick_backend::MagickTransformer): every
//!   format, through an ImageMagick or GraphicsMagick subprocess.

use super::density::DensityPlan;
use super::gate::{Interrupt, Interruption};
use super::params::{ImageFile, ImageType, VariantRequest};
use crate::geometry::{CropRect, Dimensions};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Interrupted: {0}")]
    Interrupted(#[from] Interruption),
}

/// How well a transformer can execute a given action.
///
/// Ordered so that `Preferred > Fallback > Unable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Unable,
    Fallback,
    Preferred,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Unable => "unable",
            Capability::Fallback => "fallback",
            Capability::Preferred => "preferred",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ProbeDimensions,
    Modify,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::ProbeDimensions => "probe dimensions",
            ActionKind::Modify => "modify",
        })
    }
}

/// Determine the pixel size of `source`.
#[derive(Debug, Clone, Copy)]
pub struct ProbeAction<'a> {
    pub source: &'a ImageFile,
    pub interrupt: &'a Interrupt,
}

/// Produce the variant described by `request` from `source`.
///
/// For scalable sources `plan` carries the rasterization density and the crop
/// already translated into rasterized coordinates.
#[derive(Debug, Clone, Copy)]
pub struct ModifyAction<'a> {
    pub source: &'a ImageFile,
    pub request: &'a VariantRequest,
    pub plan: Option<&'a DensityPlan>,
    pub interrupt: &'a Interrupt,
}

impl ModifyAction<'_> {
    /// The crop to apply, in the coordinates of the decoded image.
    pub fn crop(&self) -> Option<CropRect> {
        match self.plan {
            Some(plan) => plan.crop,
            None => self.request.crop(),
        }
    }

    /// The decoded image will need its alpha channel flattened.
    pub fn flattens_alpha(&self) -> bool {
        self.source.image_type().has_transparency() && !self.request.output().has_transparency()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ProbeDimensions(ProbeAction<'a>),
    Modify(ModifyAction<'a>),
}

impl Action<'_> {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ProbeDimensions(_) => ActionKind::ProbeDimensions,
            Action::Modify(_) => ActionKind::Modify,
        }
    }

    pub fn source(&self) -> &ImageFile {
        match self {
            Action::ProbeDimensions(probe) => probe.source,
            Action::Modify(modify) => modify.source,
        }
    }

    pub fn source_type(&self) -> ImageType {
        self.source().image_type()
    }
}

/// A pluggable image transformer.
///
/// Implementations must not mutate the source and must not depend on the
/// order of calls; the engine may call them from many threads at once.
pub trait Transformer: Send + Sync {
    /// Unique name, used for configuration and in errors.
    fn name(&self) -> &str;

    /// Capability for this specific action on this specific input.
    ///
    /// Return `Unable` for inputs the transformer would fail on (e.g. a
    /// vector format without its companion tool), never `Preferred`.
    fn can_execute(&self, action: &Action<'_>) -> Capability;

    fn probe_dimensions(&self, action: &ProbeAction<'_>) -> Result<Dimensions, BackendError>;

    fn modify(&self, action: &ModifyAction<'_>) -> Result<ImageFile, BackendError>;
}
