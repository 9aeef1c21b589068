//! stackscrape - Structural HTML extraction by example

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stackscrape::{Example, FetchConfig, Result, Scraper, Source};

#[derive(Parser)]
#[command(name = "stackscrape")]
#[command(version, about = "Structural HTML extraction by example", long_about = None)]
#[command(after_help = "EXAMPLES:
    stackscrape build -e 'First title' --url https://news.example/ --rules-out rules.json
    stackscrape apply --rules rules.json --url https://news.example/page/2")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Learn rules from example values and print what they extract
    Build {
        /// Value visible on the page (repeatable)
        #[arg(short, long = "example", value_name = "TEXT")]
        examples: Vec<String>,

        /// Treat each example as a regular expression
        #[arg(long)]
        regex: bool,

        /// Similarity threshold for example text, 1.0 is exact
        #[arg(long, default_value_t = 1.0)]
        text_ratio: f64,

        /// Write the learned rules to this file
        #[arg(long, value_name = "FILE")]
        rules_out: Option<PathBuf>,

        #[command(flatten)]
        page: PageArgs,
    },
    /// Replay saved rules against a page
    Apply {
        /// Rules file written by `build --rules-out`
        #[arg(long, value_name = "FILE")]
        rules: PathBuf,

        /// Similarity threshold for class and style attributes, 1.0 is exact
        #[arg(long, default_value_t = 1.0)]
        attr_ratio: f64,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args)]
struct PageArgs {
    /// Fetch the page from this URL
    #[arg(long, conflicts_with = "html", required_unless_present = "html")]
    url: Option<String>,

    /// Read the page from a local file
    #[arg(long, value_name = "FILE", requires = "base_url")]
    html: Option<PathBuf>,

    /// URL the local file was served from
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct FetchArgs {
    /// Fetch attempts before giving up
    #[arg(long, global = true, env = "SCRAPER_ATTEMPTS", default_value_t = 3)]
    attempts: u32,

    /// Pause between attempts, in milliseconds
    #[arg(long, global = true, env = "SCRAPER_INTERVAL", default_value_t = 1000)]
    interval_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, global = true, env = "SCRAPER_TIMEOUT", default_value_t = 30)]
    timeout_secs: u64,

    /// User-Agent header sent with every request
    #[arg(long, global = true, env = "SCRAPER_USER_AGENT")]
    user_agent: Option<String>,
}

impl FetchArgs {
    fn config(&self) -> FetchConfig {
        let config = FetchConfig::default()
            .with_attempts(self.attempts)
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.user_agent {
            Some(ua) => config.with_user_agent(ua),
            None => config,
        }
    }
}

impl PageArgs {
    fn source(&self) -> Result<Source> {
        match (&self.url, &self.html) {
            (Some(url), _) => Ok(Source::url(url)),
            (None, Some(path)) => Ok(Source::markup(
                fs::read_to_string(path)?,
                self.base_url.clone().unwrap_or_default(),
            )),
            (None, None) => Ok(Source::markup(
                String::new(),
                self.base_url.clone().unwrap_or_default(),
            )),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut scraper = Scraper::new(cli.fetch.config())?;

    let values = match cli.command {
        Command::Build {
            examples,
            regex,
            text_ratio,
            rules_out,
            page,
        } => {
            let examples = if regex {
                examples
                    .iter()
                    .map(|e| Example::pattern(e))
                    .collect::<Result<Vec<_>>>()?
            } else {
                examples.into_iter().map(Example::from).collect()
            };
            let values = scraper.build(examples, &page.source()?, text_ratio)?;
            if let Some(path) = rules_out {
                scraper.save_rules(&path)?;
                tracing::info!(path = %path.display(), rules = scraper.rules().len(), "saved rules");
            }
            values
        }
        Command::Apply {
            rules,
            attr_ratio,
            page,
        } => {
            scraper.load_rules(&rules)?;
            scraper.apply_to_document(&page.source()?, attr_ratio)?
        }
    };

    for value in values {
        match value {
            Some(v) => println!("{v}"),
            None => println!("null"),
        }
    }
    Ok(())
}
