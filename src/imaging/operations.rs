//! High-level variant creation.
//!
//! [`VariantEngine`] ties the pieces together. For each request it runs:
//!
//! 1. **Probe**: the best probing transformer reports the source size.
//! 2. **Resolve**: [`VariantRequestBuilder::resolve`] fills every placeholder.
//! 3. **Plan**: scalable sources get a rasterization density.
//! 4. **Select**: the registry picks one transformer for the modify action.
//! 5. **Execute**: inside an [`AdmissionGate`] slot, under the timeout.
//!
//! A failed execution is reported as-is; the engine does not retry with the
//! next candidate.

use super::backend::{Action, ModifyAction, ProbeAction};
use super::density::{DensityPlanner, DensitySettings};
use super::error::TransformError;
use super::gate::{AdmissionGate, Interrupt};
use super::magick_backend::MagickTransformer;
use super::params::{ImageFile, VariantRequest, VariantRequestBuilder};
use super::registry::{RegistryError, TransformerRegistry};
use super::rust_backend::RustTransformer;
use crate::config::{EngineConfig, effective_concurrency};
use crate::geometry::Dimensions;
use log::{debug, error, info};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;

pub struct VariantEngine {
    registry: TransformerRegistry,
    planner: DensityPlanner,
    gate: AdmissionGate,
    timeout: Option<Duration>,
}

impl VariantEngine {
    pub fn new(
        registry: TransformerRegistry,
        planner: DensityPlanner,
        concurrency: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            planner,
            gate: AdmissionGate::new(concurrency),
            timeout,
        }
    }

    /// Build an engine with the built-in transformers registered per `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, RegistryError> {
        let registry = TransformerRegistry::new();
        let rust = &config.transformers.rust;
        registry.register(
            Arc::new(RustTransformer::default()),
            rust.priority,
            rust.enabled,
        )?;
        let magick = &config.transformers.imagemagick;
        registry.register(
            Arc::new(MagickTransformer::new(config.magick_settings())),
            magick.priority,
            magick.enabled,
        )?;

        Ok(Self::new(
            registry,
            DensityPlanner::new(config.density_settings()),
            effective_concurrency(&config.processing),
            config.timeout(),
        ))
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn density_settings(&self) -> DensitySettings {
        self.planner.settings()
    }

    /// A fresh interrupt carrying the engine timeout.
    pub fn interrupt(&self) -> Interrupt {
        match self.timeout {
            Some(timeout) => Interrupt::with_timeout(timeout),
            None => Interrupt::none(),
        }
    }

    pub fn probe_dimensions(&self, source: &ImageFile) -> Result<Dimensions, TransformError> {
        self.probe_dimensions_with(source, &self.interrupt())
    }

    /// Ask the best probing transformer for the pixel size of `source`.
    ///
    /// Anything short of a complete, non-zero size is `DimensionProbeFailed`.
    pub fn probe_dimensions_with(
        &self,
        source: &ImageFile,
        interrupt: &Interrupt,
    ) -> Result<Dimensions, TransformError> {
        let probe = ProbeAction { source, interrupt };
        let candidate = self.registry.select(&Action::ProbeDimensions(probe))?;

        let _permit = self.gate.acquire(interrupt)?;
        let dimensions = candidate
            .transformer
            .probe_dimensions(&probe)
            .map_err(|e| match TransformError::from_backend(candidate.name(), e) {
                TransformError::BackendExecutionFailed { transformer, cause } => {
                    TransformError::DimensionProbeFailed(format!("{transformer}: {cause}"))
                }
                other => other,
            })?;

        if dimensions.is_partial() {
            return Err(TransformError::DimensionProbeFailed(format!(
                "{} reported {dimensions} for a {} source",
                candidate.name(),
                source.image_type()
            )));
        }
        debug!(
            "Probed {} source with {}: {dimensions}",
            source.image_type(),
            candidate.name()
        );
        Ok(dimensions)
    }

    pub fn create_variant(
        &self,
        source: &ImageFile,
        builder: &VariantRequestBuilder,
    ) -> Result<ImageFile, TransformError> {
        self.create_variant_with(source, builder, &self.interrupt())
    }

    /// Probe, resolve and apply a single variant request.
    pub fn create_variant_with(
        &self,
        source: &ImageFile,
        builder: &VariantRequestBuilder,
        interrupt: &Interrupt,
    ) -> Result<ImageFile, TransformError> {
        let size = self.probe_dimensions_with(source, interrupt)?;
        let request = builder.resolve(source.image_type(), size)?;
        self.apply_with(source, size, &request, interrupt)
    }

    pub fn apply(
        &self,
        source: &ImageFile,
        size: Dimensions,
        request: &VariantRequest,
    ) -> Result<ImageFile, TransformError> {
        self.apply_with(source, size, request, &self.interrupt())
    }

    /// Run an already resolved request against a source of known `size`.
    pub fn apply_with(
        &self,
        source: &ImageFile,
        size: Dimensions,
        request: &VariantRequest,
        interrupt: &Interrupt,
    ) -> Result<ImageFile, TransformError> {
        let plan = self.planner.plan(source.image_type(), size, request)?;
        let modify = ModifyAction {
            source,
            request,
            plan: plan.as_ref(),
            interrupt,
        };
        let candidate = self.registry.select(&Action::Modify(modify))?;

        let _permit = self.gate.acquire(interrupt)?;
        let variant = candidate.transformer.modify(&modify).map_err(|e| {
            error!(
                "{} failed to create {}x{} {} variant: {e}",
                candidate.name(),
                request.width(),
                request.height(),
                request.output()
            );
            TransformError::from_backend(candidate.name(), e)
        })?;

        info!(
            "{} -> {}x{} {} via {} ({} bytes)",
            source.image_type(),
            request.width(),
            request.height(),
            request.output(),
            candidate.name(),
            variant.byte_size()
        );
        Ok(variant)
    }

    /// Create several variants of one source, probing it only once.
    ///
    /// The outer error is a probe failure; each variant has its own result.
    /// Variants run in parallel, bounded by the admission gate.
    pub fn create_variants(
        &self,
        source: &ImageFile,
        builders: &[VariantRequestBuilder],
    ) -> Result<Vec<Result<ImageFile, TransformError>>, TransformError> {
        let size = self.probe_dimensions(source)?;
        Ok(builders
            .par_iter()
            .map(|builder| {
                let request = builder.resolve(source.image_type(), size)?;
                self.apply(source, size, &request)
            })
            .collect())
    }
}
