use clap::ArgMatches;
use std::time::Duration;
use url::Url;

use crate::cli;

pub struct Config {
    pub beacon_node: Url,
    pub execution_node: Url,
    pub epoch: u64,
    pub timeout: Duration,
    pub log_level: String,
    pub validator: Option<u64>,
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, String> {
        let beacon_node = parse_url(matches, cli::BEACON_NODE)?;
        let execution_node = parse_url(matches, cli::EXECUTION_NODE)?;

        let epoch = parse_u64(matches, cli::EPOCH)?;
        let timeout = Duration::from_secs(parse_u64(matches, cli::TIMEOUT)?);

        let log_level = matches
            .get_one::<String>(cli::LOG_LEVEL)
            .cloned()
            .unwrap_or_else(|| "info".to_string());

        let validator = matches
            .get_one::<String>(cli::VALIDATOR)
            .map(|value| {
                value
                    .parse()
                    .map_err(|e| format!("Invalid --{}: {}", cli::VALIDATOR, e))
            })
            .transpose()?;

        Ok(Config {
            beacon_node,
            execution_node,
            epoch,
            timeout,
            log_level,
            validator,
        })
    }
}

fn parse_url(matches: &ArgMatches, flag: &str) -> Result<Url, String> {
    matches
        .get_one::<String>(flag)
        .ok_or_else(|| format!("Missing --{}", flag))?
        .parse()
        .map_err(|e| format!("Invalid --{}: {}", flag, e))
}

fn parse_u64(matches: &ArgMatches, flag: &str) -> Result<u64, String> {
    matches
        .get_one::<String>(flag)
        .ok_or_else(|| format!("Missing --{}", flag))?
        .parse()
        .map_err(|e| format!("Invalid --{}: {}", flag, e))
}
