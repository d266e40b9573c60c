use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_probe::{
    proxy::{
        AddressParser, BulkConfig, BulkLoader, Candidate, CheckerConfig, DohResolver, GeoClient,
        ProbeResult, ProxyChecker, RangeExpander, TokenAuthenticator,
    },
    server::{self, AppState},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A proxy endpoint prober with DoH resolution and bounded-concurrency batch checks
#[derive(Parser)]
#[command(name = "proxy-probe")]
#[command(about = "Probe endpoints for working forward proxies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a single endpoint (domains are resolved first)
    Probe {
        /// Endpoint in any supported notation
        target: String,
        /// Timeout in seconds for connect and each read
        #[arg(long, default_value = "5")]
        timeout: u64,
        /// Enrich working endpoints with geolocation
        #[arg(long)]
        geo: bool,
    },
    /// Resolve a domain to its candidate IP set over DoH
    Resolve {
        /// Domain name, optionally with an embedded port
        domain: String,
    },
    /// Expand a range spec into IPv4 literals
    Expand {
        /// Range in A.B.C.D/24 or A.B.C.start-end notation
        range: String,
    },
    /// Check many endpoints and save results
    Check {
        /// Endpoints and/or range specs
        targets: Vec<String>,
        /// Input file with one entry per line
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output file for working endpoints
        #[arg(short, long)]
        good: Option<PathBuf>,
        /// Output file for failed endpoints
        #[arg(short, long)]
        bad: Option<PathBuf>,
        /// Number of probes run concurrently per batch
        #[arg(long, default_value = "20")]
        batch_size: usize,
        /// Timeout in seconds for connect and each read
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
    /// Fetch a remote text resource and extract candidates
    Fetch {
        /// URL of a .txt/.csv resource listing endpoints
        url: String,
        /// Output file for extracted endpoints
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Probe the extracted candidates as well
        #[arg(long)]
        check: bool,
        /// Timeout in seconds for the fetch
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Run the HTTP probe/resolve API
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        listen: String,
        /// Origin string mixed into issued tokens
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        origin: String,
        /// Static override credential; token checks are permissive when unset
        #[arg(long)]
        auth_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("proxy_probe=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            target,
            timeout,
            geo,
        } => {
            let checker = ProxyChecker::with_config(
                CheckerConfig::new().with_timeout(Duration::from_secs(timeout)),
            );

            let candidate = AddressParser::parse(&target);
            let candidates = if candidate.is_ip_literal() {
                vec![candidate]
            } else {
                let resolver = DohResolver::new()?;
                let ips = resolver.resolve(&candidate.host).await?;
                println!("Resolved {} to {} address(es)", candidate.host, ips.len());
                ips.into_iter()
                    .map(|ip| Candidate::new(ip, candidate.port))
                    .collect()
            };

            let results = checker.check_all(candidates).await;
            let geo_client = if geo { Some(GeoClient::new()?) } else { None };
            for result in &results {
                println!("{}", result);
                if result.is_working() {
                    if let Some(client) = &geo_client {
                        match client.lookup(result.candidate.connect_host()).await {
                            Ok(location) => println!("  {}", location),
                            Err(e) => eprintln!("  geo lookup failed: {}", e),
                        }
                    }
                }
            }
        }
        Commands::Resolve { domain } => {
            let resolver = DohResolver::new()?;
            let outcome = resolver.resolve_outcome(&domain).await;
            if outcome.succeeded {
                println!("{} resolved to {} address(es):", outcome.domain, outcome.ips.len());
                for ip in &outcome.ips {
                    println!("{}", ip);
                }
            } else {
                eprintln!(
                    "Resolution failed: {}",
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Commands::Expand { range } => {
            let ips = RangeExpander::expand(&range);
            if ips.is_empty() {
                eprintln!("Not a recognized range: {}", range);
            } else {
                for ip in ips {
                    println!("{}", ip);
                }
            }
        }
        Commands::Check {
            targets,
            input,
            good,
            bad,
            batch_size,
            timeout,
        } => {
            let mut entries = targets;
            if let Some(path) = input {
                let content = std::fs::read_to_string(&path)?;
                for line in content.lines() {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with('#') {
                        entries.push(trimmed.to_string());
                    }
                }
            }

            let candidates = BulkLoader::parse_entries(&entries.join(","));
            println!("Checking {} unique candidates", candidates.len());
            println!("Batch size: {}, timeout: {}s", batch_size, timeout);
            println!();

            let config = CheckerConfig::new()
                .with_batch_size(batch_size)
                .with_timeout(Duration::from_secs(timeout));
            let checker = ProxyChecker::with_config(config);
            let (good_results, bad_results) = checker.check_and_separate(candidates).await;

            println!(
                "Results: {} working, {} failed",
                good_results.len(),
                bad_results.len()
            );

            if !good_results.is_empty() {
                println!("\nWorking endpoints:");
                for result in &good_results {
                    println!("  {}", result);
                }
            }

            if let Some(good_path) = good {
                save_endpoints(&good_results, &good_path)?;
                println!("Saved {} working endpoints to {:?}", good_results.len(), good_path);
            }
            if let Some(bad_path) = bad {
                save_endpoints(&bad_results, &bad_path)?;
                println!("Saved {} failed endpoints to {:?}", bad_results.len(), bad_path);
            }
        }
        Commands::Fetch {
            url,
            output,
            check,
            timeout,
        } => {
            let loader = BulkLoader::with_config(
                BulkConfig::new().with_timeout(Duration::from_secs(timeout)),
            )?;
            let candidates = loader.fetch_url(&url).await?;
            println!("Extracted {} candidates from {}", candidates.len(), url);

            if let Some(output_path) = &output {
                let content: String = candidates
                    .iter()
                    .map(|c| c.to_endpoint())
                    .collect::<Vec<_>>()
                    .join("\n");
                std::fs::write(output_path, content)?;
                println!("Saved candidates to {:?}", output_path);
            } else if !check {
                for candidate in &candidates {
                    println!("{}", candidate);
                }
            }

            if check {
                let checker = ProxyChecker::new();
                let (good_results, bad_results) = checker.check_and_separate(candidates).await;
                println!(
                    "Results: {} working, {} failed",
                    good_results.len(),
                    bad_results.len()
                );
                for result in &good_results {
                    println!("  {}", result);
                }
            }
        }
        Commands::Serve {
            listen,
            origin,
            auth_token,
        } => {
            let state = AppState {
                checker: ProxyChecker::new(),
                resolver: Arc::new(DohResolver::new()?),
                geo: Arc::new(GeoClient::new()?),
                auth: Arc::new(TokenAuthenticator::new(origin, auth_token)),
            };
            let app = server::router(state);

            let listener = tokio::net::TcpListener::bind(&listen).await?;
            tracing::info!("API listening on {}", listen);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

/// Save probed endpoints one per line in HOST:PORT form
fn save_endpoints(results: &[ProbeResult], path: &PathBuf) -> Result<()> {
    let content: String = results
        .iter()
        .map(|r| r.candidate.to_endpoint())
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(path, content)?;
    Ok(())
}
