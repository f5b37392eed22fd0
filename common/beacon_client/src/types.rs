//! Types returned by the subset of the beacon node HTTP API that the reward
//! aggregation engine consumes.
//!
//! The API encodes large integers as decimal strings to avoid precision loss
//! in JSON tooling; the `serde_utils` quoted-integer adapters decode them to
//! native widths and fail closed on malformed values.

use ethereum_types::H256;
use serde::{Deserialize, Serialize};

/// A consensus-layer epoch number.
pub type Epoch = u64;

/// A consensus-layer slot number.
pub type Slot = u64;

/// The canonical index of a validator in the registry.
pub type ValidatorIndex = u64;

/// An API error serializable to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub stacktraces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct GenericResponse<T: Serialize + serde::de::DeserializeOwned> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct DutiesResponse<T: Serialize + serde::de::DeserializeOwned> {
    pub dependent_root: H256,
    pub data: T,
}

/// The pre-computed assignment of a proposer to a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerDuty {
    pub pubkey: String,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: ValidatorIndex,
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: Slot,
}

/// The epoch-wide attestation reward report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationRewards {
    pub ideal_rewards: Vec<IdealAttestationRewards>,
    pub total_rewards: Vec<TotalAttestationRewards>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealAttestationRewards {
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub head: i64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub target: i64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub source: i64,
}

/// Realised attestation reward components for one validator. Negative values
/// are penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalAttestationRewards {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: ValidatorIndex,
    #[serde(with = "serde_utils::quoted_i64")]
    pub head: i64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub target: i64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub source: i64,
    /// Omitted by the API from Altair onwards.
    #[serde(default, with = "serde_utils::quoted_i64")]
    pub inclusion_delay: i64,
}

/// One validator's sync committee reward for a single slot, in gwei.
/// Negative values are penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCommitteeReward {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: ValidatorIndex,
    #[serde(with = "serde_utils::quoted_i64")]
    pub reward: i64,
}

/// The consensus rewards a proposer earned from the contents of one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockReward {
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: ValidatorIndex,
    #[serde(with = "serde_utils::quoted_u64")]
    pub total: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub attestations: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub sync_aggregate: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_slashings: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub attester_slashings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorBalanceData {
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: ValidatorIndex,
    #[serde(with = "serde_utils::quoted_u64")]
    pub balance: u64,
}

/// A signed beacon block, reduced to the fields needed to resolve the
/// execution block a proposal carried. Everything else in the block body is
/// ignored during decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBlockSummary {
    pub message: BlockSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: Slot,
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: ValidatorIndex,
    pub body: BlockBodySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockBodySummary {
    /// Absent on blocks that predate the execution merge.
    #[serde(default)]
    pub execution_payload: Option<ExecutionPayloadSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPayloadSummary {
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proposer_duties_decode() {
        let response: DutiesResponse<Vec<ProposerDuty>> = serde_json::from_value(json!({
            "dependent_root": "0x0000000000000000000000000000000000000000000000000000000000000001",
            "execution_optimistic": false,
            "data": [
                {
                    "pubkey": "0xa99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4bf2d153f649f7b53359fe8b94a38e44c",
                    "validator_index": "123",
                    "slot": "6403"
                }
            ]
        }))
        .unwrap();

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].validator_index, 123);
        assert_eq!(response.data[0].slot, 6403);
    }

    #[test]
    fn attestation_rewards_decode_signed_components() {
        let rewards: AttestationRewards = serde_json::from_value(json!({
            "ideal_rewards": [
                {"effective_balance": "32000000000", "head": "2500", "target": "5000", "source": "5000"}
            ],
            "total_rewards": [
                {"validator_index": "7", "head": "2500", "target": "-5000", "source": "5000"}
            ]
        }))
        .unwrap();

        assert_eq!(rewards.total_rewards[0].validator_index, 7);
        assert_eq!(rewards.total_rewards[0].target, -5000);
        // Post-Altair responses omit the inclusion delay entirely.
        assert_eq!(rewards.total_rewards[0].inclusion_delay, 0);
    }

    #[test]
    fn sync_committee_reward_decode_negative() {
        let reward: SyncCommitteeReward =
            serde_json::from_value(json!({"validator_index": "3", "reward": "-7"})).unwrap();

        assert_eq!(reward.validator_index, 3);
        assert_eq!(reward.reward, -7);
    }

    #[test]
    fn block_summary_decode_pre_merge() {
        let summary: SignedBlockSummary = serde_json::from_value(json!({
            "message": {
                "slot": "100",
                "proposer_index": "42",
                "parent_root": "0x0000000000000000000000000000000000000000000000000000000000000002",
                "body": {
                    "randao_reveal": "0x00",
                    "attestations": []
                }
            },
            "signature": "0x00"
        }))
        .unwrap();

        assert_eq!(summary.message.proposer_index, 42);
        assert!(summary.message.body.execution_payload.is_none());
    }

    #[test]
    fn block_summary_decode_post_merge() {
        let summary: SignedBlockSummary = serde_json::from_value(json!({
            "message": {
                "slot": "4700013",
                "proposer_index": "42",
                "body": {
                    "execution_payload": {
                        "block_number": "15537394",
                        "gas_used": "29999827",
                        "transactions": []
                    }
                }
            }
        }))
        .unwrap();

        let payload = summary.message.body.execution_payload.unwrap();
        assert_eq!(payload.block_number, 15_537_394);
    }
}
