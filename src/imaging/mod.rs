//! Image variant creation: negotiation, planning and dispatch.
//!
//! | Stage | Module |
//! |---|---|
//! | **Describe** | [`params`]: image types, files and variant requests |
//! | **Resolve** | [`calculations`]: pure size, ratio and crop math |
//! | **Plan** | [`density`]: rasterization density for vector sources |
//! | **Negotiate** | [`registry`]: capability + priority selection |
//! | **Admit** | [`gate`]: bounded concurrency, cancellation, timeouts |
//! | **Execute** | [`rust_backend`], [`magick_backend`] |
//!
//! [`operations::VariantEngine`] runs these stages in order. Backends sit
//! behind the [`Transformer`] trait so tests can swap in the recording
//! `MockTransformer` from [`backend::tests`].

pub mod backend;
pub mod calculations;
pub mod density;
pub mod error;
pub mod gate;
pub mod magick_backend;
pub mod operations;
pub mod params;
pub mod registry;
pub mod rust_backend;

pub use backend::{Action, ActionKind, BackendError, Capability, Transformer};
pub use density::{DensityPlan, DensityPlanner, DensitySettings};
pub use error::TransformError;
pub use gate::{AdmissionGate, Interrupt, Interruption};
pub use magick_backend::{MagickSettings, MagickTransformer};
pub use operations::VariantEngine;
pub use params::{Density, ImageFile, ImageType, Quality, VariantRequest, VariantRequestBuilder};
pub use registry::{RegistryError, TransformerDescriptor, TransformerRegistry};
pub use rust_backend::RustTransformer;
