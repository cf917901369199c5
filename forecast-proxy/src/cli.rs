use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use forecast_core::{Config, ForecastService, LocationQuery};
use std::{net::SocketAddr, path::PathBuf};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast-proxy", version, about = "Weather forecast aggregation proxy")]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to listen on, overrides `bind` from the config file.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Fetch one forecast and print the normalized payload as JSON.
    Show {
        /// Place name.
        #[arg(long)]
        city: Option<String>,

        /// Latitude; used together with --lon and wins over --city.
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,

        /// Longitude.
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<String>,
    },

    /// Print where the config file is looked up.
    ConfigPath,

    /// Write the default configuration to the config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::config_file_path(),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let path = self.config_path()?;

        match self.command {
            Command::Serve { bind } => {
                let config = Config::load_from(&path)?;
                let service = ForecastService::from_config(&config)?;
                let bind = bind.unwrap_or(config.bind);
                forecast_proxy::run_http_server(service, bind).await?;
            }
            Command::Show { city, lat, lon } => {
                let config = Config::load_from(&path)?;
                let service = ForecastService::from_config(&config)?;
                let query =
                    LocationQuery::from_params(city.as_deref(), lat.as_deref(), lon.as_deref());

                let payload = service.forecast(&query).await?;
                let json = serde_json::to_string_pretty(&payload)
                    .context("Failed to serialize forecast")?;
                println!("{json}");
            }
            Command::ConfigPath => {
                println!("{}", path.display());
            }
            Command::InitConfig { force } => {
                if path.exists() && !force {
                    bail!(
                        "Config file already exists: {}\n\
                         Hint: pass --force to overwrite it.",
                        path.display()
                    );
                }
                Config::default().save_to(&path)?;
                println!("Wrote default config to {}", path.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_bind() {
        let cli = Cli::try_parse_from(["forecast-proxy", "serve", "--bind", "0.0.0.0:9000"])
            .expect("parse");
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind.map(|b| b.port()), Some(9000)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_show_with_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "forecast-proxy",
            "show",
            "--lat",
            "-33.87",
            "--lon",
            "151.21",
        ])
        .expect("parse");
        match cli.command {
            Command::Show { lat, lon, city } => {
                assert_eq!(lat.as_deref(), Some("-33.87"));
                assert_eq!(lon.as_deref(), Some("151.21"));
                assert!(city.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["forecast-proxy", "config-path", "--config", "/tmp/x.toml"])
            .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }
}
