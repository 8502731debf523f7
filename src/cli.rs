use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "wasmpad", about = "Client for a remote compile-and-run wasm playground", version)]
pub struct Cli {
    /// Source file to compile; reads stdin when omitted and piped.
    #[arg(value_name = "SOURCE")]
    pub source: Option<String>,

    /// Package name identifying this editor session. It doubles as the
    /// correlation key the service uses to name the produced artifact.
    #[arg(long)]
    pub package: Option<String>,

    /// Driver snippet: a call over the artifact's exports, e.g. `add(2, 3)`.
    #[arg(long)]
    pub run: Option<String>,

    /// Read the driver snippet from a file.
    #[arg(long = "run-file", conflicts_with = "run")]
    pub run_file: Option<String>,

    /// Compile service base URL (overrides COMPILE_URL).
    #[arg(long)]
    pub url: Option<String>,

    /// Request timeout in seconds (overrides REQUEST_TIMEOUT).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip source normalization (dedent and trailing newline).
    #[arg(long = "no-format")]
    pub no_format: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
