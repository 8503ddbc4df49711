//! fuzzreq
//!
//! Command-line front end for the fuzzy request engine: counts, previews
//! and sends the requests produced by a `$generator$` template.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use config::CliConfig;
use fuzzy_engine::{replay, ConcreteRequest, FuzzyGenerator, ReplayOutcome, TemplateParser};
use http::ReqwestSender;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "fuzzreq", author, version, about, long_about = None)]
pub struct Args {
    /// File holding the request head (request line and headers)
    #[arg(long)]
    pub head: PathBuf,

    /// File holding the request body
    #[arg(long)]
    pub body: Option<PathBuf>,

    /// Send the body as written, without expanding `$...$` in it
    #[arg(long)]
    pub raw_body: bool,

    /// TOML configuration file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print how many requests the template expands to
    Count,

    /// Print a page of generated requests
    Preview {
        /// Requests per page
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Print requests as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Send every generated request
    Send {
        /// Send without asking when there are many requests
        #[arg(long, short = 'y')]
        yes: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(args: Args, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("--log-level: {}", reason))?;
    }
    logging::init_logging(&config.logging)?;

    let head = read_text(&args.head)?;
    let body = match &args.body {
        Some(path) => read_text(path)?,
        None => String::new(),
    };
    let body = if args.raw_body {
        TemplateParser::escape(&body)
    } else {
        body
    };

    let generator = FuzzyGenerator::new(&head, &body, &config.fuzzer).map_err(error::CliError::from)?;
    if !generator.evaluated().template().has_generators() {
        tracing::warn!("Template has no $...$ generators, it expands to a single request");
    }
    tracing::info!(
        generators = generator.specs().len(),
        requests = generator.count(),
        "Template expanded"
    );

    match args.command {
        Command::Count => println!("{}", generator.count()),
        Command::Preview { limit, page, json } => {
            for (ordinal, request) in preview_page(&generator, limit, page) {
                if json {
                    println!("{}", serde_json::to_string(&request)?);
                } else {
                    print_request(ordinal, &request);
                }
            }
        }
        Command::Send { yes, json } => {
            if generator.needs_confirmation() && !yes {
                bail!(
                    "{} requests would be sent (more than {}); pass --yes to send them",
                    generator.count(),
                    config.fuzzer.confirm_threshold
                );
            }

            let sender = ReqwestSender::new(&config.http)?;
            let outcome = replay(&generator, &sender, &config.fuzzer, &cancel).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
    }

    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Requests on page `page` with `limit` requests per page, with their ordinals
pub fn preview_page(
    generator: &FuzzyGenerator,
    limit: usize,
    page: usize,
) -> Vec<(usize, ConcreteRequest)> {
    let Some(first) = page.checked_mul(limit) else {
        return Vec::new();
    };

    (first..first.saturating_add(limit))
        .map_while(|ordinal| generator.request_at(ordinal).map(|request| (ordinal, request)))
        .collect()
}

fn print_request(ordinal: usize, request: &ConcreteRequest) {
    println!("--- request {} ---", ordinal);
    println!("{}", request.head);
    if !request.body.is_empty() {
        println!();
        println!("{}", request.body);
    }
}

fn print_outcome(outcome: &ReplayOutcome) {
    for exchange in &outcome.exchanges {
        let first_line = exchange.head.lines().next().unwrap_or_default();
        match (&exchange.response, &exchange.error) {
            (Some(response), _) => println!(
                "#{} {} -> {} ({} bytes)",
                exchange.index,
                first_line,
                response.status,
                response.body.len()
            ),
            (None, Some(error)) => println!("#{} {} -> error: {}", exchange.index, first_line, error),
            (None, None) => println!("#{} {}", exchange.index, first_line),
        }
    }

    if let Some(reason) = &outcome.stopped {
        println!("Stopped early: {:?}", reason);
    }
    println!("{}", outcome.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzy_engine::FuzzerConfig;

    fn generator(head: &str) -> FuzzyGenerator {
        FuzzyGenerator::new(head, "", &FuzzerConfig::default()).unwrap()
    }

    #[test]
    fn test_preview_pages() {
        let generator = generator("$range(7)$");
        let page = |limit, page| {
            preview_page(&generator, limit, page)
                .into_iter()
                .map(|(ordinal, request)| (ordinal, request.head))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            page(3, 0),
            vec![(0, "0".to_string()), (1, "1".to_string()), (2, "2".to_string())]
        );
        assert_eq!(page(3, 2), vec![(6, "6".to_string())]);
        assert!(page(3, 3).is_empty());
        assert!(page(0, 0).is_empty());
        assert!(page(usize::MAX, 2).is_empty());
    }

    #[tokio::test]
    async fn test_run_count_and_preview() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("head.txt");
        std::fs::write(&head, "GET /$['a','b']$ HTTP/1.1\nHost: x.test").unwrap();

        for command in [
            Command::Count,
            Command::Preview {
                limit: 5,
                page: 0,
                json: true,
            },
        ] {
            let args = Args {
                head: head.clone(),
                body: None,
                raw_body: false,
                config: None,
                log_level: Some("warn".to_string()),
                command,
            };
            assert!(run(args, CancellationToken::new()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_raw_body_is_not_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("head.txt");
        let body = dir.path().join("body.txt");
        std::fs::write(&head, "POST /pay HTTP/1.1\nHost: x.test").unwrap();
        std::fs::write(&body, "amount=$5").unwrap();

        let args = |raw_body| Args {
            head: head.clone(),
            body: Some(body.clone()),
            raw_body,
            config: None,
            log_level: Some("warn".to_string()),
            command: Command::Count,
        };

        assert!(run(args(false), CancellationToken::new()).await.is_err());
        assert!(run(args(true), CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("head.txt");
        std::fs::write(&head, "GET /$range(21)$ HTTP/1.1\nHost: 127.0.0.1:9").unwrap();

        let args = Args {
            head,
            body: None,
            raw_body: false,
            config: None,
            log_level: None,
            command: Command::Send {
                yes: false,
                json: false,
            },
        };
        let error = run(args, CancellationToken::new()).await.unwrap_err();
        assert!(error.to_string().contains("--yes"));
    }

    #[tokio::test]
    async fn test_run_reports_template_errors() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("head.txt");
        std::fs::write(&head, "GET /$range(3) HTTP/1.1").unwrap();

        let args = Args {
            head,
            body: None,
            raw_body: false,
            config: None,
            log_level: None,
            command: Command::Count,
        };
        let error = run(args, CancellationToken::new()).await.unwrap_err();
        assert!(error.to_string().contains("hint:"));
    }

    #[tokio::test]
    async fn test_run_rejects_bad_log_level() {
        let args = Args {
            head: PathBuf::from("unused"),
            body: None,
            raw_body: false,
            config: None,
            log_level: Some("chatty".to_string()),
            command: Command::Count,
        };
        assert!(run(args, CancellationToken::new()).await.is_err());
    }
}
