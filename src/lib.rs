//! # Variant Engine
//!
//! Produces resized, cropped and re-encoded *variants* of a source image.
//! Callers describe the variant they want, possibly leaving parts of it
//! open ("600 wide, whatever height keeps the ratio"); the engine fills the
//! gaps from the source and hands the job to the best available backend.
//!
//! # Architecture: Five-Step Dispatch
//!
//! ```text
//! 1. Probe      source           →  Dimensions       (best probing transformer)
//! 2. Resolve    request builder  →  VariantRequest   (pure geometry)
//! 3. Plan       vector sources   →  DensityPlan      (rasterization density)
//! 4. Select     Action           →  Candidate        (capability, then priority)
//! 5. Execute    gate slot        →  ImageFile        (with cancellation/timeout)
//! ```
//!
//! Steps 2 and 3 are pure functions, so most behaviour is unit-testable
//! without decoding a single pixel. Step 4 only *asks* transformers what
//! they can do; exactly one transformer runs per action.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | Exact rationals, pixel boxes, size specs and crops |
//! | [`imaging`] | Requests, density planning, registry, gate, backends, engine |
//! | [`config`] | `engine.toml` loading, validation and stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Exact Aspect Ratios
//!
//! Ratios are reduced `i32` fractions with overflow-checked arithmetic
//! ([`geometry::Rational`]). Comparing `4:3` crops computed from different
//! source sizes must not depend on floating point noise, and an overflow is
//! reported instead of wrapping.
//!
//! ## Capability Negotiation Over Format Tables
//!
//! Backends are not registered against a static format list. Each one
//! answers [`imaging::Transformer::can_execute`] for the concrete action, so
//! a backend can prefer JPEGs, fall back for probes and refuse PDFs when
//! Ghostscript is missing. Priorities only break ties within a capability
//! tier, and a failed execution is never silently retried elsewhere.
//!
//! ## Two Backends
//!
//! The in-process [`imaging::RustTransformer`] handles common raster formats
//! with no system dependencies. [`imaging::MagickTransformer`] shells out to
//! ImageMagick (or GraphicsMagick) for everything else, including SVG, EPS and
//! PDF sources.

pub mod config;
pub mod geometry;
pub mod imaging;
pub mod output;
