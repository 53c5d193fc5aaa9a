use std::io::Read;
use std::path::Path;

use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use dmt::cli::{self, CliArgs};
use dmt::config;
use dmt::{Template, VarStore};

fn main() {
    let args = cli::parse_args();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("dmt: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: &CliArgs) -> dmt::Result<()> {
    // ── Context ───────────────────────────────────────────────────────────────
    let constants = match cli::resolve_context_path(args.context.as_deref()) {
        // An explicitly named context file must exist.
        Some(path) if args.context.is_some() => config::load_context_file(&path)?,
        Some(path) => config::load_context_optional(&path)?.unwrap_or_default(),
        None => VarStore::new(),
    };

    // ── Template ──────────────────────────────────────────────────────────────
    let (source, name) = match args.input_path() {
        Some(path) => (std::fs::read_to_string(path)?, display_name(path)),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            (source, "<stdin>".to_owned())
        }
    };
    debug!(template = %name, bytes = source.len(), "read template");

    let template = Template::compile(&source, &name, constants)?;
    let doc = template.render()?;
    info!(template = %name, "rendered");

    println!("{}", doc.to_json(args.null_policy(), args.pretty)?);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().unwrap_or(path.as_os_str()).to_string_lossy().into_owned()
}
