use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use variant_engine::geometry::{CropRect, Rational};
use variant_engine::imaging::{
    Density, ImageFile, ImageType, MagickTransformer, Quality, VariantEngine, VariantRequestBuilder,
};
use variant_engine::config;
use variant_engine::output::{self, RenderSummary};

#[derive(Parser)]
#[command(name = "variant-engine")]
#[command(about = "Create resized, cropped and re-encoded image variants")]
#[command(long_about = "\
Create resized, cropped and re-encoded image variants

Unset sizes are derived from the source: give only --width and the height
follows the source (or --ratio) aspect ratio. Without --stretch, raster
variants never exceed the source and a centred crop absorbs any ratio change.

Vector sources (SVG, EPS, PDF) are rasterized at a density chosen for the
requested size; EPS and PDF need ImageMagick with Ghostscript.

Run 'variant-engine gen-config' to generate a documented engine.toml.")]
#[command(version)]
struct Cli {
    /// Engine config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log dispatch decisions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the type and pixel size of an image
    Probe {
        /// Source image
        file: PathBuf,

        /// Print a JSON object instead of text
        #[arg(long)]
        json: bool,
    },
    /// Create one variant of an image
    Render(RenderArgs),
    /// List registered transformers and their status
    Transformers,
    /// Print a stock engine.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Source image
    file: PathBuf,

    /// Output file; its extension picks the format unless --format is given
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// Aspect ratio as width/height, e.g. 16/9
    #[arg(long)]
    ratio: Option<Rational>,

    /// Crop in source pixels as x,y,width,height
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropRect>,

    /// Rasterization multiplier for vector sources: N or HxV
    #[arg(long)]
    density: Option<Density>,

    /// Output format (jpeg, png, gif, tiff, webp, svg, eps, pdf)
    #[arg(long)]
    format: Option<ImageType>,

    /// Distort to exactly the requested size instead of cropping
    #[arg(long)]
    stretch: bool,

    /// Shrink the requested box to the source aspect ratio
    #[arg(long)]
    keep_aspect: bool,

    /// Lossy encoding quality, 1-100
    #[arg(long)]
    quality: Option<u32>,
}

impl RenderArgs {
    fn builder(&self) -> VariantRequestBuilder {
        let mut builder = VariantRequestBuilder::new()
            .stretch(self.stretch)
            .keep_aspect(self.keep_aspect);
        if let Some(width) = self.width {
            builder = builder.width(width);
        }
        if let Some(height) = self.height {
            builder = builder.height(height);
        }
        if let Some(max_width) = self.max_width {
            builder = builder.max_width(max_width);
        }
        if let Some(max_height) = self.max_height {
            builder = builder.max_height(max_height);
        }
        if let Some(ratio) = self.ratio {
            builder = builder.ratio(ratio);
        }
        if let Some(crop) = self.crop {
            builder = builder.crop(crop);
        }
        if let Some(density) = self.density {
            builder = builder.density(density);
        }
        if let Some(output) = self.output_type() {
            builder = builder.output(output);
        }
        if let Some(quality) = self.quality {
            builder = builder.quality(Quality::new(quality));
        }
        builder
    }

    fn output_type(&self) -> Option<ImageType> {
        self.format.or_else(|| {
            self.output
                .extension()
                .and_then(|e| e.to_str())
                .and_then(ImageType::from_extension)
        })
    }
}

fn parse_crop(s: &str) -> Result<CropRect, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, width, height] = parts[..] else {
        return Err(format!("expected x,y,width,height, got {s:?}"));
    };
    let number_error = |part: &str| format!("invalid number {part:?} in crop {s:?}");
    Ok(CropRect::new(
        x.parse().map_err(|_| number_error(x))?,
        y.parse().map_err(|_| number_error(y))?,
        width.parse().map_err(|_| number_error(width))?,
        height.parse().map_err(|_| number_error(height))?,
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let engine_config = config::load_config(cli.config.as_deref())?;
    let engine = VariantEngine::from_config(&engine_config)?;

    match cli.command {
        Command::Probe { file, json } => {
            let source = ImageFile::open(&file)?;
            let size = engine.probe_dimensions(&source)?;
            if json {
                let report = serde_json::json!({
                    "type": source.image_type().extension(),
                    "content_type": source.image_type().content_type(),
                    "width": size.width,
                    "height": size.height,
                    "bytes": source.byte_size(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_probe(&file, &source, size);
            }
        }
        Command::Render(args) => {
            let source = ImageFile::open(&args.file)?;
            let size = engine.probe_dimensions(&source)?;
            let request = args.builder().resolve(source.image_type(), size)?;
            let variant = engine.apply(&source, size, &request)?;
            write_variant(&args.output, &variant)?;
            output::print_render(&RenderSummary {
                source_path: &args.file,
                source_type: source.image_type(),
                source_size: size,
                output_path: &args.output,
                variant_size: request.target(),
                variant: &variant,
            });
        }
        Command::Transformers => {
            let magick = MagickTransformer::new(engine_config.magick_settings());
            let versions = [(MagickTransformer::NAME, magick.version())];
            output::print_transformers(&engine.registry().descriptors(), &versions);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Default to `info`, or `debug` with `--verbose`; `RUST_LOG` still wins.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn write_variant(path: &Path, variant: &ImageFile) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, variant.content())
}
