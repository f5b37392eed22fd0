//! Computes the complete reward and penalty breakdown of every validator for
//! a single epoch, by aggregating the beacon node's reward endpoints with
//! execution-layer fee reconciliation.
//!
//! The entry point is [`get_rewards_for_epoch`]. One worker runs per slot of
//! the epoch under a concurrency cap, alongside one epoch-wide attestation
//! reward task; all workers merge into a single mutex-guarded
//! [`IncomeLedger`]. The first failing worker aborts the whole computation
//! and the partial ledger is discarded.

pub mod el_rewards;
pub mod income;

use futures::stream::{self, TryStreamExt};
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use beacon_client::types::{Epoch, Slot, ValidatorIndex};
use beacon_client::BeaconRewardsApi;
use execution_client::ExecutionApi;

pub use income::{IncomeLedger, ValidatorEpochIncome};

/// How many per-slot workers may be in flight at once.
pub const MAX_CONCURRENT_SLOT_REQUESTS: usize = 32;

#[derive(Debug)]
pub enum Error {
    /// A beacon node call failed outside the expected domain conditions.
    BeaconNode(beacon_client::Error),
    /// An execution node call failed.
    ExecutionNode(execution_client::Error),
    /// The duties response for the epoch was empty; the slot range cannot be
    /// derived without it.
    NoProposerDuties(Epoch),
    /// A slot inside the epoch has no assigned proposer. Duties cover every
    /// slot of the epoch, so this indicates inconsistent duty data.
    ProposerNotFound { slot: Slot },
    /// The block-rewards endpoint reported a different proposer than the
    /// duty assignment for the slot.
    ProposerIndexMismatch {
        slot: Slot,
        expected: ValidatorIndex,
        found: ValidatorIndex,
    },
    /// The beacon block referenced an execution block the execution node
    /// does not have.
    ExecutionBlockNotFound { block_number: u64, slot: Slot },
    /// A receipt came back without an effective gas price, meaning the
    /// execution node's response is incomplete.
    MissingEffectiveGasPrice { block_number: u64, slot: Slot },
    /// Every receipt-batch attempt for the block failed.
    ReceiptRequestFailed {
        block_number: u64,
        slot: Slot,
        error: String,
    },
}

impl From<beacon_client::Error> for Error {
    fn from(e: beacon_client::Error) -> Self {
        Error::BeaconNode(e)
    }
}

impl From<execution_client::Error> for Error {
    fn from(e: execution_client::Error) -> Self {
        Error::ExecutionNode(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Compute the full per-validator income breakdown for `epoch`.
///
/// The number of slots per epoch is derived from the length of the duties
/// response, so the engine is not tied to one chain configuration.
pub async fn get_rewards_for_epoch<B, E>(
    epoch: Epoch,
    beacon: &B,
    execution: &E,
) -> Result<HashMap<ValidatorIndex, ValidatorEpochIncome>, Error>
where
    B: BeaconRewardsApi + Sync,
    E: ExecutionApi + Sync,
{
    let start = Instant::now();

    let duties = beacon.proposer_duties(epoch).await?;
    if duties.is_empty() {
        return Err(Error::NoProposerDuties(epoch));
    }

    let slots_per_epoch = duties.len() as u64;
    let start_slot = epoch * slots_per_epoch;
    let end_slot = start_slot + slots_per_epoch - 1;

    let slot_proposers = duties
        .iter()
        .map(|duty| (duty.slot, duty.validator_index))
        .collect::<HashMap<Slot, ValidatorIndex>>();

    info!(
        "retrieving rewards for epoch {} (slots {} - {})",
        epoch, start_slot, end_slot
    );

    let ledger = IncomeLedger::new();

    let slot_tasks = stream::iter((start_slot + 1..=end_slot).map(Ok::<_, Error>))
        .try_for_each_concurrent(Some(MAX_CONCURRENT_SLOT_REQUESTS), |slot| {
            process_slot(slot, &slot_proposers, &ledger, beacon, execution)
        });

    tokio::try_join!(
        slot_tasks,
        process_attestation_rewards(epoch, &ledger, beacon)
    )?;

    info!(
        "retrieved epoch {} rewards in {:?}",
        epoch,
        start.elapsed()
    );

    Ok(ledger.into_map())
}

/// Gather everything attributable to a single slot: fee income for the
/// proposed execution block (or missed/pre-merge bookkeeping), sync committee
/// rewards, and the proposer's inclusion rewards.
async fn process_slot<B, E>(
    slot: Slot,
    slot_proposers: &HashMap<Slot, ValidatorIndex>,
    ledger: &IncomeLedger,
    beacon: &B,
    execution: &E,
) -> Result<(), Error>
where
    B: BeaconRewardsApi + Sync,
    E: ExecutionApi + Sync,
{
    let proposer = *slot_proposers
        .get(&slot)
        .ok_or(Error::ProposerNotFound { slot })?;

    match beacon.execution_block_number(slot).await {
        Ok(Some(block_number)) => {
            let fee = el_rewards::get_el_reward_for_block(execution, block_number, slot).await?;
            ledger.add_tx_fee(proposer, &fee);
        }
        Ok(None) => {
            info!("validator {} missed slot {}", proposer, slot);
            ledger.update(proposer, |income| income.proposals_missed += 1);
        }
        // Pre-merge blocks carry no execution payload and hence no fee
        // income; everything below still applies to them.
        Err(beacon_client::Error::PreMergeSlot) => {}
        Err(e) => return Err(e.into()),
    }

    // Reward data can exist even for a slot whose block resolution reported
    // "not found" (e.g. after a re-org), so these calls are not gated on the
    // outcome above; they report their own 404s independently.
    match beacon.sync_committee_rewards(slot).await {
        Ok(Some(rewards)) => {
            for entry in rewards {
                ledger.update(entry.validator_index, |income| {
                    if entry.reward > 0 {
                        income.sync_committee_reward += entry.reward as u64;
                    } else {
                        income.sync_committee_penalty += entry.reward.unsigned_abs();
                    }
                });
            }
        }
        Ok(None) => {}
        Err(beacon_client::Error::PreSyncCommitteePeriod) => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(reward) = beacon.block_rewards(slot).await? {
        if reward.proposer_index != proposer {
            return Err(Error::ProposerIndexMismatch {
                slot,
                expected: proposer,
                found: reward.proposer_index,
            });
        }

        ledger.update(proposer, |income| {
            income.proposer_attestation_inclusion_reward += reward.attestations;
            income.proposer_slashing_inclusion_reward +=
                reward.attester_slashings + reward.proposer_slashings;
            income.proposer_sync_inclusion_reward += reward.sync_aggregate;
        });
    }

    Ok(())
}

/// Route the epoch-wide attestation reward components into the ledger.
/// Positive components are rewards, negative ones penalties; a negative
/// inclusion delay component is the finality delay penalty.
async fn process_attestation_rewards<B: BeaconRewardsApi + Sync>(
    epoch: Epoch,
    ledger: &IncomeLedger,
    beacon: &B,
) -> Result<(), Error> {
    let rewards = beacon.attestation_rewards(epoch).await?;

    for entry in rewards.total_rewards {
        ledger.update(entry.validator_index, |income| {
            if entry.head > 0 {
                income.attestation_head_reward += entry.head as u64;
            }
            if entry.source > 0 {
                income.attestation_source_reward += entry.source as u64;
            } else {
                income.attestation_source_penalty += entry.source.unsigned_abs();
            }
            if entry.target > 0 {
                income.attestation_target_reward += entry.target as u64;
            } else {
                income.attestation_target_penalty += entry.target.unsigned_abs();
            }
            if entry.inclusion_delay < 0 {
                income.finality_delay_penalty += entry.inclusion_delay.unsigned_abs();
            }
        });
    }

    Ok(())
}
