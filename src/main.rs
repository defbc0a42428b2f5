use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use albrt::logging;
use albrt::manager::Manager;
use albrt_core::context::{JsonFileStorage, executable_dir};
use albrt_core::vr::{SimulatedRuntime, VrRuntime};
use albrt_core::{ConfigStorage, ConfigStore, RunOutcome, Scheduler, Setting};
use albrt_overlay::gpu::{DEFAULT_TEXTURE_HEIGHT, DEFAULT_TEXTURE_WIDTH};
use albrt_overlay::{MaskUniforms, Renderer, RendererConfig, SoftwareBackend};
use albrt_types::{MaskType, OverlaySettings};

#[derive(Parser)]
#[command(version, about = "Per-eye HMD overlay masks")]
struct Cli {
    /// Settings file (defaults to settings.json beside the executable)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. "debug" or "info,albrt_core=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the overlays and run the tick loop
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// Directory holding Shaders/ and ImageMasks/
        #[arg(long, default_value = ".")]
        assets: PathBuf,

        /// Use the in-process runtime even when SteamVR support is built in
        #[arg(long)]
        simulate: bool,
    },
    /// Render one frame of the configured mask to left.png and right.png
    Render {
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long)]
        mask: Option<MaskArg>,

        #[arg(long, default_value_t = DEFAULT_TEXTURE_WIDTH)]
        width: u32,

        #[arg(long, default_value_t = DEFAULT_TEXTURE_HEIGHT)]
        height: u32,
    },
    /// Inspect or reset the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Path,
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum MaskArg {
    None,
    Patch,
    Slat,
}

impl From<MaskArg> for MaskType {
    fn from(arg: MaskArg) -> Self {
        match arg {
            MaskArg::None => MaskType::None,
            MaskArg::Patch => MaskType::Patch,
            MaskArg::Slat => MaskType::Slat,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_dir = executable_dir().unwrap_or_else(|_| PathBuf::from("."));
    let _log_guard = logging::init(&log_dir, cli.log_level.as_deref());

    let storage = match &cli.config {
        Some(path) => JsonFileStorage::new(path),
        None => match JsonFileStorage::beside_executable() {
            Ok(storage) => storage,
            Err(e) => {
                error!(error = %e, "no settings location");
                return ExitCode::FAILURE;
            }
        },
    };

    let result = match cli.command {
        Commands::Run {
            ticks,
            assets,
            simulate,
        } => run(storage, ticks, assets, simulate),
        Commands::Render {
            out,
            mask,
            width,
            height,
        } => render(&storage, &out, mask, width, height),
        Commands::Config { action } => config(&storage, action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    storage: JsonFileStorage,
    ticks: Option<u64>,
    assets: PathBuf,
    simulate: bool,
) -> Result<(), String> {
    #[cfg(feature = "openvr")]
    if !simulate {
        info!("using the SteamVR runtime");
        return run_with(albrt_core::vr::OpenVrRuntime::new(), storage, ticks, assets);
    }
    #[cfg(not(feature = "openvr"))]
    if !simulate {
        info!("built without SteamVR support; using the in-process runtime");
    }
    run_with(SimulatedRuntime::new(), storage, ticks, assets)
}

fn run_with<R: VrRuntime>(
    runtime: R,
    storage: JsonFileStorage,
    ticks: Option<u64>,
    assets: PathBuf,
) -> Result<(), String> {
    let renderer_config = RendererConfig {
        asset_dir: assets,
        ..RendererConfig::default()
    };
    let mut manager = Manager::new(
        runtime,
        SoftwareBackend::new(),
        Box::new(storage),
        renderer_config,
    );

    if let Err(e) = manager.start() {
        return Err(format!("{} {}\n{}", e.code(), e.message(), e.solution()));
    }
    info!(ipd = %manager.resolver().readable_ipd(), "overlays placed");

    let mut scheduler = Scheduler::new(manager.cancel_token());
    let outcome = scheduler.run_until_cancelled(&mut manager, ticks);
    if outcome == RunOutcome::TickLimit {
        manager.quit();
    }
    info!(?outcome, ticks = scheduler.ticks(), "exited");
    Ok(())
}

fn render(
    storage: &JsonFileStorage,
    out: &Path,
    mask: Option<MaskArg>,
    width: u32,
    height: u32,
) -> Result<(), String> {
    let mut store = ConfigStore::new();
    if let Ok(settings) = storage.load() {
        store.apply_settings(&settings);
    }
    if let Some(mask) = mask {
        store.set(Setting::OverlayMaskType(mask.into()));
    }

    let mut renderer = Renderer::new(
        SoftwareBackend::new(),
        RendererConfig {
            width,
            height,
            ..RendererConfig::default()
        },
    );
    renderer.start().map_err(|e| e.to_string())?;
    let textures = renderer
        .draw_if_needed(&MaskUniforms::from_store(&store), 0.0)
        .map_err(|e| e.to_string())?
        .ok_or("mask type has no 2D rendering")?;

    std::fs::create_dir_all(out).map_err(|e| format!("{}: {e}", out.display()))?;
    for (name, texture) in [("left.png", textures.left), ("right.png", textures.right)] {
        let path = out.join(name);
        renderer
            .gpu()
            .save_png(texture.handle, &path)
            .map_err(|e| e.to_string())?;
        println!("wrote {}", path.display());
    }
    renderer.destroy();
    Ok(())
}

fn config(storage: &JsonFileStorage, action: ConfigAction) -> Result<(), String> {
    match action {
        ConfigAction::Path => println!("{}", storage.path().display()),
        ConfigAction::Show => {
            let settings = storage.load().unwrap_or_default();
            let json = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            storage
                .save(&OverlaySettings::default())
                .map_err(|e| e.to_string())?;
            println!("reset {}", storage.path().display());
        }
    }
    Ok(())
}
