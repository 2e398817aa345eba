use crate::{
    config::Config,
    controller::{DirectorySink, PageController},
    document::{DocumentHandle, LopdfDocument},
    engine::{qpdf::QpdfLoader, EngineAdapter, EnginePaths},
    packager::ZipArchiveBuilder,
    primitives::{convert_points, format_bytes, standard_page_name},
    session::IncomingFile,
    tools::{ExtractTool, ImageTool, RepairTool, Tool},
    util::{ensure_dir, looks_like_url},
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "docbatch")]
#[command(about = "Sequential batch document pipeline (repair engine + page tools + zip packaging)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./docbatch.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bootstrap the repair engine and print its diagnostics.
    Doctor {},
    /// Print page count, file size and page sizes.
    Info {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// in, mm, px or pt.
        #[arg(long, default_value = "pt")]
        unit: String,
    },
    /// Repair PDFs through the engine.
    Repair {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Copy a page selection such as "1,3-5" out of each PDF.
    Extract {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long, default_value = "")]
        pages: String,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Convert JPEG images into one-page PDFs.
    Img2pdf {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        margin: Option<f32>,
        /// Page color as #rrggbb.
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Info { input, unit } => info_cmd(&cfg, input, unit),
        Command::Repair { input, out_dir } => {
            let adapter = EngineAdapter::new(QpdfLoader::new(&cfg), EnginePaths::from_config(&cfg));
            run_tool(&cfg, RepairTool::new(&adapter, &cfg), input, out_dir.as_deref())
        }
        Command::Extract {
            input,
            pages,
            out_dir,
        } => run_tool(&cfg, ExtractTool::new(pages.clone(), &cfg), input, out_dir.as_deref()),
        Command::Img2pdf {
            input,
            margin,
            background,
            out_dir,
        } => {
            let mut cfg = cfg.clone();
            if let Some(margin) = margin {
                cfg.tools.img2pdf.margin_points = *margin;
            }
            if let Some(background) = background {
                cfg.tools.img2pdf.background = background.clone();
            }
            run_tool(&cfg, ImageTool::new(&cfg), input, out_dir.as_deref())
        }
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    for candidate in ["docbatch.toml", "docbatch.example.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Config::load(&path);
        }
    }
    Ok(Config::default())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.out_dir).join("docbatch.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let diag = QpdfLoader::new(cfg).doctor();
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if !diag.ok {
        bail!("engine is not usable: {}", diag.error.unwrap_or_default());
    }
    Ok(())
}

fn info_cmd(cfg: &Config, inputs: &[PathBuf], unit: &str) -> Result<()> {
    let mut docs = Vec::new();
    for file in read_inputs(cfg, inputs)? {
        let doc = LopdfDocument::load(&file.bytes)
            .with_context(|| format!("opening {}", file.name))?;
        let pages = (0..doc.page_count())
            .map(|i| match doc.page_size(i) {
                Some((w, h)) => serde_json::json!({
                    "page": i + 1,
                    "width": convert_points(w, unit),
                    "height": convert_points(h, unit),
                    "name": standard_page_name(w, h),
                }),
                None => serde_json::json!({ "page": i + 1 }),
            })
            .collect::<Vec<_>>();
        docs.push(serde_json::json!({
            "file": file.name,
            "size": format_bytes(file.size_bytes, 2),
            "page_count": doc.page_count(),
            "unit": unit,
            "pages": pages,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&docs)?);
    Ok(())
}

fn run_tool<T: Tool>(cfg: &Config, tool: T, inputs: &[PathBuf], out_override: Option<&Path>) -> Result<()> {
    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let incoming = read_inputs(cfg, inputs)?;

    let mut controller = PageController::new(
        tool,
        ZipArchiveBuilder::from_config(cfg),
        DirectorySink::new(&out_dir),
    )
    .with_max_files(cfg.intake.max_files);

    controller
        .accept_files(incoming)
        .map_err(|e| anyhow!(e.user_message()))?;

    let outcome = controller.process(|index, total, name| {
        info!("[{}/{}] {}", index + 1, total, name);
    });
    controller.acknowledge();
    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            debug!("batch failed: {err}");
            bail!("{}", err.user_message());
        }
    };

    if !report.failed.is_empty() {
        warn!("{}", report.message);
    }

    if cfg.output.write_report_json {
        ensure_dir(&out_dir)?;
        std::fs::write(
            out_dir.join(&cfg.output.report_filename),
            serde_json::to_string_pretty(&report)?,
        )?;
    }

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).with_context(|| "serializing effective config")?;
        let path = out_dir.join("effective-config.toml");
        std::fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": report.status,
                "message": report.message,
                "output": report.artifact.path,
                "size": report.artifact.size,
            }))?
        );
    }

    Ok(())
}

fn read_inputs(cfg: &Config, inputs: &[PathBuf]) -> Result<Vec<IncomingFile>> {
    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        let input_str = input.display().to_string();
        if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
            return Err(anyhow!("URL inputs are disabled: {input_str}"));
        }
        if !input.is_file() {
            return Err(anyhow!("input does not exist: {}", input.display()));
        }
        let name = input
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("input has no usable file name: {}", input.display()))?
            .to_string();
        let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        files.push(IncomingFile::new(name, bytes));
    }
    Ok(files)
}
