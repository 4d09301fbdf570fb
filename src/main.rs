use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use tracing::{debug, error};

use mdnav::{
    abbrev::{Escaping, Expander, TokenPolicy},
    html::{self, PageShellContext},
    logging, serve, Error, Result,
};

#[derive(Subcommand)]
enum Commands {
    /// Expand `TOKEN (expansion)` patterns into <abbr> markup
    Expand {
        /// Input file; reads stdin when omitted
        file: Option<PathBuf>,
        /// Which tokens may be abbreviated: `any` or `acronym`
        #[arg(long, default_value_t = TokenPolicy::AnyToken)]
        policy: TokenPolicy,
        /// Emit tokens and titles without HTML escaping
        #[arg(long)]
        no_escape: bool,
    },
    /// Render a markdown file to a full HTML page on stdout
    Render {
        /// Path to the markdown file
        file: String,
        #[arg(long, default_value_t = TokenPolicy::AnyToken)]
        policy: TokenPolicy,
    },
    /// Serve a markdown file and its directory over HTTP
    Serve {
        /// Path to the markdown file
        file: String,
        /// Interface address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Starting port number for the HTTP server
        #[arg(long, default_value = "3333")]
        port: u16,
        #[arg(long, default_value_t = TokenPolicy::AnyToken)]
        policy: TokenPolicy,
    },
}

#[derive(Parser)]
#[command(
    name = "mdnav",
    version,
    about = "Markdown pages with abbreviation expansion and a responsive navbar",
    after_help = "LOGGING:\n  Set MDNAV_LOG to a tracing filter (default: info), e.g. MDNAV_LOG=mdnav=debug"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing();

    let outcome = match cli.command {
        Commands::Expand {
            file,
            policy,
            no_escape,
        } => {
            let escaping = if no_escape { Escaping::None } else { Escaping::Html };
            run_expand(file.as_deref(), Expander::new(policy).with_escaping(escaping))
        }
        Commands::Render { file, policy } => run_render(&file, Expander::new(policy)),
        Commands::Serve {
            file,
            bind,
            port,
            policy,
        } => run_serve(file, bind, port, Expander::new(policy)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_expand(file: Option<&Path>, expander: Expander) -> Result<()> {
    let input = match file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    debug!(bytes = input.len(), policy = %expander.policy(), "expand");
    let mut stdout = io::stdout().lock();
    stdout.write_all(expander.expand(&input).as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn run_render(file_arg: &str, expander: Expander) -> Result<()> {
    let path = check_markdown_path(file_arg)?;
    let source = fs::read_to_string(path)?;
    let canonical = fs::canonicalize(path)?;
    let root = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let pages = serve::collect_pages(&root);
    let url_path = serve::url_path_for(&canonical, &root);
    let (body, headings) = html::render_markdown(&source, &canonical, &root, &expander);
    let ctx = PageShellContext {
        pages: &pages,
        page_url_path: url_path.as_deref(),
    };
    let page = html::build_page_shell(&body, &headings, &canonical, &ctx);

    let mut stdout = io::stdout().lock();
    stdout.write_all(page.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn run_serve(file_arg: String, bind: String, port: u16, expander: Expander) -> Result<()> {
    check_markdown_path(&file_arg)?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(serve::run_serve(
        file_arg,
        bind,
        port,
        serve::AppConfig { expander },
    ))
}

/// Reject paths without a markdown extension or that do not exist.
fn check_markdown_path(file_arg: &str) -> Result<&Path> {
    let path = Path::new(file_arg);
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown" | "mdx" | "mdown" | "mkd" | "mkdn") => {}
        Some(ext) => {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{ext}' is not a recognized markdown extension"),
            )))
        }
        None => {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{file_arg}' has no file extension"),
            )))
        }
    }
    if !path.is_file() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("file not found: {file_arg}"),
        )));
    }
    Ok(path)
}
