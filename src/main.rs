use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use ms_preprocess_rs::logger;
use ms_preprocess_rs::multispectral::conversions::CaptureStackPipeline;
use ms_preprocess_rs::multispectral::imaging::load_warp_matrices;
use ms_preprocess_rs::multispectral::metadata::DEFAULT_CONFIG;
use ms_preprocess_rs::multispectral::{
    BasicImaging, CameraModel, Exiftool, IrradianceMode, PanelSettings, ReflectanceConfig,
    ReflectancePipeline, StackConfig, TiffCompression, copy_exif_data_to_stacks,
};

#[derive(Parser)]
#[command(name = "ms_preprocess")]
#[command(about = "Panel calibration, reflectance conversion and capture stacking for multispectral imagery")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// exiftool executable (default: `exiftoolpath` on Windows, else `exiftool` on PATH)
    #[arg(long, global = true)]
    exiftool: Option<PathBuf>,

    /// exiftool config declaring the camera's XMP namespace
    #[arg(long, global = true)]
    exiftool_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find calibration panels and print the per-band panel reflectance.
    Calibrate(CalibrateArgs),

    /// Convert every frame of a dataset to panel-calibrated reflectance.
    Reflectance(ReflectanceArgs),

    /// Build irradiance-normalised multi-band stacks, one per capture.
    Stack(StackArgs),

    /// Copy tags from band-1 source frames onto existing stacks.
    CopyMetadata {
        /// Directory searched recursively for `*_1.tif` source frames
        #[arg(long)]
        source: PathBuf,

        /// Directory holding `<prefix>.tif` stacks
        #[arg(long)]
        stacks: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct PanelArgs {
    /// Dataset root holding capture directories.
    #[arg(long)]
    dataset: PathBuf,

    #[arg(long, value_enum, default_value_t = CameraArg::Altum)]
    camera: CameraArg,

    /// Capture directory scanned first for panels.
    #[arg(long)]
    calibration_dir: Option<String>,

    /// JSON panel settings (region, thresholds, reflectance per band).
    #[arg(long)]
    panel_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    #[command(flatten)]
    panel: PanelArgs,
}

#[derive(Debug, Clone, Args)]
struct ReflectanceArgs {
    #[command(flatten)]
    panel: PanelArgs,

    /// Output root (default: `_radiance_to_reflectance` next to the dataset).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Band suffix left out of the conversion; repeatable (default: the camera's thermal band, if any).
    #[arg(long = "exclude-band")]
    exclude_bands: Vec<u8>,

    /// TIFF compression (default: none).
    #[arg(long, value_enum)]
    compression: Option<CompressionArg>,
}

#[derive(Debug, Clone, Args)]
struct StackArgs {
    /// Directory searched recursively for captures.
    #[arg(long)]
    input: PathBuf,

    /// Stack directory (default: `stacks` next to the input).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Thumbnail directory (default: `thumbnails` next to the stacks).
    #[arg(long)]
    thumbnail_dir: Option<PathBuf>,

    #[arg(long)]
    no_thumbnails: bool,

    /// Rewrite stacks that already exist.
    #[arg(long)]
    overwrite: bool,

    /// Per-band DLS correction coefficients, comma separated.
    #[arg(long, value_delimiter = ',')]
    dls_coef: Option<Vec<f64>>,

    /// JSON array of 3x3 homographies, one per band.
    #[arg(long)]
    warp_matrices: Option<PathBuf>,

    /// Ground altitude in metres; logs flight altitude above ground.
    #[arg(long)]
    ground_alt: Option<f64>,

    /// Copy the first band's tags onto each stack.
    #[arg(long)]
    copy_metadata: bool,

    /// TIFF compression (default: none).
    #[arg(long, value_enum)]
    compression: Option<CompressionArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CameraArg {
    Altum,
    Rededge,
    RededgeMxDual,
}

impl From<CameraArg> for CameraModel {
    fn from(arg: CameraArg) -> Self {
        match arg {
            CameraArg::Altum => CameraModel::Altum,
            CameraArg::Rededge => CameraModel::RedEdge,
            CameraArg::RededgeMxDual => CameraModel::RedEdgeMxDual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Lzw,
    DeflateFast,
    DeflateBalanced,
    DeflateBest,
}

impl From<CompressionArg> for TiffCompression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => TiffCompression::None,
            CompressionArg::Lzw => TiffCompression::Lzw,
            CompressionArg::DeflateFast => TiffCompression::DeflateFast,
            CompressionArg::DeflateBalanced => TiffCompression::DeflateBalanced,
            CompressionArg::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

fn exiftool(cli: &Cli) -> Exiftool {
    let tool = match &cli.exiftool {
        Some(path) => Exiftool::new(path),
        None => Exiftool::from_env(),
    };
    let config = cli.exiftool_config.clone().or_else(|| {
        let default = Path::new(DEFAULT_CONFIG);
        if default.is_file() {
            Some(default.to_path_buf())
        } else {
            warn!("{} not found, camera XMP tags may not be copied", DEFAULT_CONFIG);
            None
        }
    });
    tool.with_config(config)
}

fn imaging_backend(panel_config: Option<&Path>) -> Result<BasicImaging> {
    let settings = match panel_config {
        Some(path) => PanelSettings::from_json_file(path)
            .with_context(|| format!("loading panel settings from {}", path.display()))?,
        None => PanelSettings::default(),
    };
    Ok(BasicImaging::new(settings))
}

fn panel_config(panel: &PanelArgs) -> ReflectanceConfig {
    ReflectanceConfig::builder()
        .camera(panel.camera.into())
        .calibration_dir(panel.calibration_dir.clone())
        .build()
}

fn reflectance_config(args: &ReflectanceArgs) -> ReflectanceConfig {
    let mut builder = ReflectanceConfig::builder()
        .camera(args.panel.camera.into())
        .calibration_dir(args.panel.calibration_dir.clone())
        .output_dir(args.output.clone());
    if !args.exclude_bands.is_empty() {
        builder = builder.excluded_bands(args.exclude_bands.clone());
    }
    if let Some(compression) = args.compression {
        builder = builder.compression(compression.into());
    }
    builder.build()
}

fn stack_config(args: &StackArgs) -> Result<StackConfig> {
    let warps = match &args.warp_matrices {
        Some(path) => Some(
            load_warp_matrices(path)
                .with_context(|| format!("loading warp matrices from {}", path.display()))?,
        ),
        None => None,
    };
    let irradiance = match &args.dls_coef {
        Some(coefficients) if coefficients.is_empty() => bail!("--dls-coef needs at least one value"),
        Some(coefficients) => IrradianceMode::Scaled(coefficients.clone()),
        None => IrradianceMode::Direct,
    };

    let mut builder = StackConfig::builder()
        .overwrite(args.overwrite)
        .generate_thumbnails(!args.no_thumbnails)
        .irradiance(irradiance)
        .warp_matrices(warps)
        .ground_altitude(args.ground_alt)
        .output_dir(args.output.clone())
        .thumbnail_dir(args.thumbnail_dir.clone())
        .copy_metadata(args.copy_metadata);
    if let Some(compression) = args.compression {
        builder = builder.compression(compression.into());
    }
    Ok(builder.build())
}

fn calibrate(cli: &Cli, args: &CalibrateArgs) -> Result<()> {
    let backend = imaging_backend(args.panel.panel_config.as_deref())?;
    let pipeline = ReflectancePipeline::new(panel_config(&args.panel), backend, exiftool(cli));

    let calibration = pipeline
        .calibrate(&args.panel.dataset)
        .with_context(|| format!("calibrating {}", args.panel.dataset.display()))?;

    for (band, reflectance) in calibration.reflectance() {
        info!("{:<10} panel reflectance {:.4}", band, reflectance);
    }
    info!(
        mean_radiance = calibration.mean_radiance(),
        source = %calibration.source_frame().display(),
        "Calibration complete"
    );
    Ok(())
}

fn reflectance(cli: &Cli, args: &ReflectanceArgs) -> Result<()> {
    let backend = imaging_backend(args.panel.panel_config.as_deref())?;
    let pipeline = ReflectancePipeline::new(reflectance_config(args), backend, exiftool(cli));
    info!(
        camera = ?pipeline.config().camera,
        excluded_bands = ?pipeline.config().excluded_bands,
        compression = ?pipeline.config().compression,
        "Converting dataset"
    );

    let report = pipeline
        .run(&args.panel.dataset)
        .with_context(|| format!("converting {}", args.panel.dataset.display()))?;

    info!(frames = report.outputs.len(), "Reflectance conversion complete");
    report.timings.log_summary();
    Ok(())
}

fn stack(cli: &Cli, args: &StackArgs) -> Result<()> {
    let config = stack_config(args)?;
    let pipeline = CaptureStackPipeline::new(config, BasicImaging::default(), exiftool(cli));
    info!(
        irradiance = ?pipeline.config().irradiance,
        compression = ?pipeline.config().compression,
        "Stacking {}",
        args.input.display()
    );

    let report = pipeline
        .run(&args.input)
        .with_context(|| format!("stacking captures in {}", args.input.display()))?;

    info!(
        written = report.written.len(),
        skipped_existing = report.skipped_existing,
        skipped_incomplete = report.skipped_incomplete,
        released = report.buffers_released,
        "Stacking complete"
    );
    report.timings.log_summary();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(logger::level_for_verbosity(cli.verbose));

    info!("Starting ms_preprocess...");

    match &cli.command {
        Commands::Calibrate(args) => calibrate(&cli, args),
        Commands::Reflectance(args) => reflectance(&cli, args),
        Commands::Stack(args) => stack(&cli, args),
        Commands::CopyMetadata { source, stacks } => {
            let updated = copy_exif_data_to_stacks(&exiftool(&cli), source, stacks)
                .with_context(|| format!("copying metadata onto stacks in {}", stacks.display()))?;
            info!(stacks = updated.len(), "Metadata copied");
            Ok(())
        }
    }
}
