//! The per-validator income ledger built up over one epoch.

use num_bigint::{BigInt, Sign};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use beacon_client::types::ValidatorIndex;

/// Everything a single validator earned and was penalised during one epoch.
///
/// Consensus-layer amounts are in gwei. The execution-layer fee income is in
/// wei, stored as the big-endian bytes of the accumulated total since it
/// routinely exceeds 64 bits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEpochIncome {
    pub attestation_head_reward: u64,
    pub attestation_source_reward: u64,
    pub attestation_source_penalty: u64,
    pub attestation_target_reward: u64,
    pub attestation_target_penalty: u64,
    pub finality_delay_penalty: u64,
    pub proposer_attestation_inclusion_reward: u64,
    pub proposer_slashing_inclusion_reward: u64,
    pub proposer_sync_inclusion_reward: u64,
    pub sync_committee_reward: u64,
    pub sync_committee_penalty: u64,
    /// Reserved: the reward endpoints consumed here do not report slashing
    /// income.
    pub slashing_reward: u64,
    pub slashing_penalty: u64,
    /// Assigned-but-unproduced blocks.
    pub proposals_missed: u64,
    /// Net transaction fee income in wei, big-endian. Empty until the
    /// validator's first reconciled proposal of the epoch.
    #[serde(with = "serde_utils::hex_vec")]
    pub tx_fee_reward_wei: Vec<u8>,
}

impl ValidatorEpochIncome {
    /// The validator's net consensus-layer income for the epoch, in gwei.
    /// Execution fees are excluded; they are denominated in wei.
    pub fn total_consensus_rewards(&self) -> i64 {
        let rewards = self.attestation_head_reward
            + self.attestation_source_reward
            + self.attestation_target_reward
            + self.proposer_attestation_inclusion_reward
            + self.proposer_slashing_inclusion_reward
            + self.proposer_sync_inclusion_reward
            + self.sync_committee_reward
            + self.slashing_reward;

        let penalties = self.attestation_source_penalty
            + self.attestation_target_penalty
            + self.finality_delay_penalty
            + self.sync_committee_penalty
            + self.slashing_penalty;

        rewards as i64 - penalties as i64
    }

    /// The accumulated execution fee income as a big integer.
    pub fn tx_fee_reward(&self) -> BigInt {
        BigInt::from_bytes_be(Sign::Plus, &self.tx_fee_reward_wei)
    }

    /// Fold one block's reconciled fee into the running total. A validator
    /// may propose more than one block per epoch.
    pub fn add_tx_fee(&mut self, fee: &BigInt) {
        let total = self.tx_fee_reward() + fee;
        let (_, bytes) = total.to_bytes_be();
        self.tx_fee_reward_wei = bytes;
    }
}

/// The shared map of validator incomes for one epoch.
///
/// Worker tasks hold the lock only for the duration of a field update, never
/// across a network call. Whichever task first touches a validator index
/// creates its zero-valued record.
#[derive(Default)]
pub struct IncomeLedger {
    validators: Mutex<HashMap<ValidatorIndex, ValidatorEpochIncome>>,
}

impl IncomeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to the validator's record under the ledger lock.
    pub fn update<F>(&self, validator_index: ValidatorIndex, f: F)
    where
        F: FnOnce(&mut ValidatorEpochIncome),
    {
        let mut validators = self.validators.lock();
        f(validators.entry(validator_index).or_default())
    }

    /// Accumulate execution fee income for a proposer.
    pub fn add_tx_fee(&self, validator_index: ValidatorIndex, fee: &BigInt) {
        self.update(validator_index, |income| income.add_tx_fee(fee));
    }

    /// Consume the ledger, yielding the per-validator incomes.
    pub fn into_map(self) -> HashMap<ValidatorIndex, ValidatorEpochIncome> {
        self.validators.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_creates_zeroed_record() {
        let ledger = IncomeLedger::new();
        ledger.update(9, |income| income.sync_committee_penalty += 7);

        let map = ledger.into_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&9].sync_committee_penalty, 7);
        assert_eq!(map[&9].sync_committee_reward, 0);
        assert!(map[&9].tx_fee_reward_wei.is_empty());
    }

    #[test]
    fn tx_fees_accumulate_across_proposals() {
        let ledger = IncomeLedger::new();
        ledger.add_tx_fee(3, &BigInt::from(100u32));
        ledger.add_tx_fee(3, &BigInt::from(50u32));

        let map = ledger.into_map();
        assert_eq!(map[&3].tx_fee_reward(), BigInt::from(150u32));
        assert_eq!(map[&3].tx_fee_reward_wei, vec![150]);
    }

    #[test]
    fn tx_fee_survives_64_bit_overflow() {
        let ledger = IncomeLedger::new();
        let fee = BigInt::from(u64::MAX) * 16u32;
        ledger.add_tx_fee(0, &fee);

        let map = ledger.into_map();
        assert_eq!(map[&0].tx_fee_reward(), fee);
    }

    #[test]
    fn total_consensus_rewards_nets_penalties() {
        let income = ValidatorEpochIncome {
            attestation_head_reward: 10,
            attestation_source_reward: 5,
            attestation_target_penalty: 3,
            sync_committee_penalty: 7,
            proposer_sync_inclusion_reward: 2,
            ..Default::default()
        };

        assert_eq!(income.total_consensus_rewards(), 10 + 5 + 2 - 3 - 7);
    }
}
