use bundle_dts::bundle;
use bundle_dts::BundleConfig;
use bundle_dts::BundleOutput;
use bundle_dts::Program;
use clap::Parser;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(author, version, about = "TypeScript declaration bundler")]
struct Cli {
  /// Bundler configuration (JSON).
  #[arg(long)]
  config: PathBuf,

  /// Symbol graph produced by the analyzer (JSON).
  #[arg(long)]
  program: PathBuf,

  /// Directory that output paths are resolved against.
  #[arg(long, default_value = ".")]
  out_dir: PathBuf,

  /// Print the outputs as JSON instead of writing files.
  #[arg(long)]
  json: bool,

  /// Echo the configuration and log progress to stderr.
  #[arg(long)]
  verbose: bool,

  /// Emit tracing spans (JSON) for debugging.
  #[arg(long)]
  trace: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.trace, cli.verbose);
  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("{err}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: &Cli) -> Result<(), String> {
  let config_text = read(&cli.config)?;
  let mut config = BundleConfig::from_json(&config_text)
    .map_err(|err| format!("invalid config {}: {err}", cli.config.display()))?;
  config.verbose |= cli.verbose;
  let program_text = read(&cli.program)?;
  let program = Program::from_json(&program_text)
    .map_err(|err| format!("invalid program {}: {err}", cli.program.display()))?;

  let outputs = bundle(&program, &config).map_err(|err| err.to_string())?;
  if cli.json {
    let serialized = serde_json::to_string_pretty(&outputs)
      .map_err(|err| format!("failed to serialize JSON: {err}"))?;
    println!("{serialized}");
    return Ok(());
  }
  for output in &outputs {
    write_output(&cli.out_dir, output)?;
  }
  Ok(())
}

fn read(path: &Path) -> Result<String, String> {
  fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))
}

fn write_output(out_dir: &Path, output: &BundleOutput) -> Result<(), String> {
  let path = out_dir.join(&output.path);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
  }
  fs::write(&path, &output.code).map_err(|err| format!("failed to write {}: {err}", path.display()))?;
  println!("{}", path.display());
  Ok(())
}

fn init_tracing(trace: bool, verbose: bool) {
  if trace {
    let _ = tracing_subscriber::fmt()
      .with_span_events(FmtSpan::CLOSE)
      .with_max_level(Level::DEBUG)
      .json()
      .with_ansi(false)
      .with_writer(std::io::stderr)
      .try_init();
  } else if verbose {
    let _ = tracing_subscriber::fmt()
      .with_max_level(Level::INFO)
      .with_target(false)
      .with_writer(std::io::stderr)
      .try_init();
  }
}
