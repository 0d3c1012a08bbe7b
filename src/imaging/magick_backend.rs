//! ImageMagick / GraphicsMagick subprocess transformer.
//!
//! Handles every format the engine knows, including scalable sources, which it
//! rasterizes at the density chosen by the [`density`](super::density) planner.
//! EPS and PDF need Ghostscript; without it they are `Unable` so the registry
//! never selects this transformer for them.
//!
//! Source bytes are piped to the tool's stdin and the variant is read from its
//! stdout. The child is polled while it runs and killed as soon as the
//! caller's interrupt fires.
//!
//! The convert arguments, in order:
//!
//! ```text
//! [-density HxV] <type>:-[0] [-background white -flatten] [-crop WxH+X+Y +repage]
//! -resize WxH! -colorspace sRGB -strip [-quality Q] <output>:-
//! ```

use super::backend::{Action, BackendError, Capability, ModifyAction, ProbeAction, Transformer};
use super::gate::Interrupt;
use super::params::{ImageFile, ImageType, Quality};
use crate::geometry::Dimensions;
use log::{debug, error};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const ALPHA_BACKGROUND: &str = "white";

/// Tool location and feature switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagickSettings {
    /// Directory holding the binaries. Empty means search `$PATH`.
    pub path: PathBuf,
    /// Ghostscript is installed, so EPS and PDF can be read.
    pub ghostscript: bool,
    /// Run `gm convert` / `gm identify` instead of ImageMagick.
    pub graphicsmagick: bool,
    /// Used when a request does not set its own quality.
    pub quality: Quality,
}

impl Default for MagickSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            ghostscript: false,
            graphicsmagick: false,
            quality: Quality::new(85),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Convert,
    Identify,
}

impl Tool {
    fn name(self) -> &'static str {
        match self {
            Tool::Convert => "convert",
            Tool::Identify => "identify",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MagickTransformer {
    settings: MagickSettings,
}

impl MagickTransformer {
    pub const NAME: &'static str = "imagemagick";

    pub fn new(settings: MagickSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MagickSettings {
        &self.settings
    }

    /// First line of `convert -version`, or `None` if the tool cannot run.
    pub fn version(&self) -> Option<String> {
        let (program, prefix) = self.command(Tool::Convert);
        let output = Command::new(program)
            .args(prefix)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }

    fn readable(&self, image_type: ImageType) -> bool {
        self.settings.ghostscript || !matches!(image_type, ImageType::Eps | ImageType::Pdf)
    }

    /// Program to run and the arguments that precede the tool's own.
    fn command(&self, tool: Tool) -> (PathBuf, Vec<&'static str>) {
        let dir: &Path = &self.settings.path;
        if self.settings.graphicsmagick {
            (dir.join("gm"), vec![tool.name()])
        } else {
            (dir.join(tool.name()), Vec::new())
        }
    }

    fn run(
        &self,
        tool: Tool,
        args: &[String],
        input: &[u8],
        interrupt: &Interrupt,
    ) -> Result<Vec<u8>, BackendError> {
        let (program, prefix) = self.command(tool);
        debug!("Running {} {} {}", program.display(), prefix.join(" "), args.join(" "));

        let mut child = Command::new(&program)
            .args(&prefix)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to start {}: {e}", program.display()))
            })?;

        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackendError::ProcessingFailed(format!(
                "{} pipes unavailable",
                program.display()
            )));
        };

        thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let written = stdin.write_all(input);
                drop(stdin);
                written
            });
            let reader = scope.spawn(move || {
                let mut bytes = Vec::new();
                stdout.read_to_end(&mut bytes).map(|_| bytes)
            });
            let diagnostics = scope.spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            });

            let waited = wait_for_exit(&mut child, interrupt);
            if waited.is_err() {
                let _ = child.kill();
                let _ = child.wait();
            }

            let written = join(writer)?;
            let output = join(reader)?;
            let diagnostics = join(diagnostics)?;
            let status = waited?;

            if !status.success() {
                return Err(BackendError::ProcessingFailed(format!(
                    "{} exited with {status}: {}",
                    program.display(),
                    diagnostics.trim()
                )));
            }
            match written {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(BackendError::Io(e)),
                _ => {}
            }
            Ok(output?)
        })
    }
}

/// Poll the child until it exits or the interrupt fires.
fn wait_for_exit(child: &mut Child, interrupt: &Interrupt) -> Result<ExitStatus, BackendError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        interrupt.check()?;
        thread::sleep(POLL_INTERVAL);
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> Result<T, BackendError> {
    handle
        .join()
        .map_err(|_| BackendError::ProcessingFailed("pipe thread panicked".to_string()))
}

/// Input specifier reading the first frame or page from stdin.
fn input_spec(image_type: ImageType) -> String {
    format!("{}:-[0]", image_type.extension())
}

/// Arguments for `convert` producing the variant of `action`.
pub fn modify_arguments(action: &ModifyAction<'_>, default_quality: Quality) -> Vec<String> {
    let request = action.request;
    let mut args = Vec::new();

    // Density must precede the input to affect rasterization
    if let Some(plan) = action.plan {
        args.push("-density".to_string());
        args.push(format!("{}x{}", plan.horizontal, plan.vertical));
    }
    args.push(input_spec(action.source.image_type()));

    if action.flattens_alpha() {
        args.push("-background".to_string());
        args.push(ALPHA_BACKGROUND.to_string());
        args.push("-flatten".to_string());
    }
    if let Some(crop) = action.crop() {
        args.push("-crop".to_string());
        args.push(crop.to_string());
        args.push("+repage".to_string());
    }

    args.push("-resize".to_string());
    args.push(format!("{}x{}!", request.width(), request.height()));
    args.push("-colorspace".to_string());
    args.push("sRGB".to_string());
    args.push("-strip".to_string());

    if matches!(request.output(), ImageType::Jpeg | ImageType::Webp) {
        let quality = request.quality().unwrap_or(default_quality);
        args.push("-quality".to_string());
        args.push(quality.value().to_string());
    }
    args.push(format!("{}:-", request.output().extension()));
    args
}

fn identify_arguments(image_type: ImageType) -> Vec<String> {
    vec![
        "-format".to_string(),
        "%w %h".to_string(),
        input_spec(image_type),
    ]
}

/// Parse `identify -format "%w %h"` output.
fn parse_dimensions(output: &str) -> Option<Dimensions> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(Dimensions::new(width, height))
}

impl Transformer for MagickTransformer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_execute(&self, action: &Action<'_>) -> Capability {
        if !self.readable(action.source_type()) {
            return Capability::Unable;
        }
        match action {
            Action::ProbeDimensions(_) => Capability::Fallback,
            Action::Modify(modify) if modify.request.output() == ImageType::Svg => {
                Capability::Unable
            }
            Action::Modify(_) => Capability::Preferred,
        }
    }

    fn probe_dimensions(&self, action: &ProbeAction<'_>) -> Result<Dimensions, BackendError> {
        let source_type = action.source.image_type();
        if !self.readable(source_type) {
            return Err(BackendError::Unsupported(format!(
                "{source_type} without Ghostscript"
            )));
        }
        let output = self.run(
            Tool::Identify,
            &identify_arguments(source_type),
            action.source.content(),
            action.interrupt,
        )?;
        let text = String::from_utf8_lossy(&output);
        parse_dimensions(&text).ok_or_else(|| {
            BackendError::ProcessingFailed(format!("Unexpected identify output: {}", text.trim()))
        })
    }

    fn modify(&self, action: &ModifyAction<'_>) -> Result<ImageFile, BackendError> {
        let args = modify_arguments(action, self.settings.quality);
        let bytes = self
            .run(Tool::Convert, &args, action.source.content(), action.interrupt)
            .inspect_err(|e| error!("Failed to apply modification: {e}"))?;
        if bytes.is_empty() {
            return Err(BackendError::ProcessingFailed(
                "convert produced no output".to_string(),
            ));
        }
        Ok(ImageFile::new(action.request.output(), bytes))
    }
}
