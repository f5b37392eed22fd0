use clap::{Arg, Command};
use log::info;

use beacon_client::{BeaconNodeHttpClient, Timeouts};
use execution_client::HttpJsonRpc;

use crate::config::Config;
use crate::logger;

pub const BEACON_NODE: &str = "beacon-node";
pub const EXECUTION_NODE: &str = "execution-node";
pub const EPOCH: &str = "epoch";
pub const TIMEOUT: &str = "timeout";
pub const LOG_LEVEL: &str = "log-level";
pub const VALIDATOR: &str = "validator";

pub fn app() -> Command {
    Command::new("eth_rewards_daemon")
        .about("Computes the reward and penalty breakdown of every validator for one epoch")
        .arg(
            Arg::new(BEACON_NODE)
                .long(BEACON_NODE)
                .value_name("URL")
                .help("Beacon node API endpoint")
                .default_value("http://localhost:5052"),
        )
        .arg(
            Arg::new(EXECUTION_NODE)
                .long(EXECUTION_NODE)
                .value_name("URL")
                .help("Execution node API endpoint")
                .default_value("http://localhost:8545"),
        )
        .arg(
            Arg::new(EPOCH)
                .long(EPOCH)
                .value_name("EPOCH")
                .help("Epoch to calculate rewards for")
                .required(true),
        )
        .arg(
            Arg::new(TIMEOUT)
                .long(TIMEOUT)
                .value_name("SECONDS")
                .help("Timeout applied to each beacon node request")
                .default_value("30"),
        )
        .arg(
            Arg::new(LOG_LEVEL)
                .long(LOG_LEVEL)
                .value_name("LEVEL")
                .help("One of error, warn, info, debug or trace")
                .default_value("info"),
        )
        .arg(
            Arg::new(VALIDATOR)
                .long(VALIDATOR)
                .value_name("INDEX")
                .help("Print the income record of this validator as JSON"),
        )
}

pub async fn run() -> Result<(), String> {
    let matches = app().get_matches();

    let config = Config::from_matches(&matches)?;

    logger::init_logger(&config.log_level);

    let beacon = BeaconNodeHttpClient::new(
        config.beacon_node.clone(),
        Timeouts::set_all(config.timeout),
    );
    let execution = HttpJsonRpc::new(config.execution_node.clone())
        .map_err(|e| format!("Failure: {:?}", e))?;

    let income = eth_rewards::get_rewards_for_epoch(config.epoch, &beacon, &execution)
        .await
        .map_err(|e| format!("Failure: {:?}", e))?;

    let proposals_missed: u64 = income.values().map(|i| i.proposals_missed).sum();
    info!(
        "epoch {}: {} validators with income, {} proposals missed",
        config.epoch,
        income.len(),
        proposals_missed
    );

    if let Some(validator_index) = config.validator {
        let record = income.get(&validator_index).cloned().unwrap_or_default();
        info!(
            "validator {}: {} gwei net consensus rewards",
            validator_index,
            record.total_consensus_rewards()
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&record).map_err(|e| format!("Failure: {}", e))?
        );
    }

    Ok(())
}
