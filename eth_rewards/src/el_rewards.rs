//! Reconciles the net transaction fee income a proposed execution block paid
//! its proposer.

use ethereum_types::{H256, U256};
use log::warn;
use num_bigint::{BigInt, Sign};
use std::time::Duration;

use beacon_client::types::Slot;
use execution_client::json_structures::TxReceipt;
use execution_client::ExecutionApi;

use crate::Error;

/// How many times the batched receipt lookup is attempted before the epoch
/// computation is abandoned.
pub const RECEIPT_RETRY_LIMIT: u64 = 16;

/// The net tip the block at `block_number` paid its proposer, in wei: the sum
/// over all receipts of `effective_gas_price * gas_used`, minus the base fee
/// burnt for the gas the block consumed. The result is not clamped; callers
/// that require a non-negative tip must validate it.
pub async fn get_el_reward_for_block<E: ExecutionApi + Sync>(
    execution: &E,
    block_number: u64,
    slot: Slot,
) -> Result<BigInt, Error> {
    let block = execution
        .get_block_by_number(block_number)
        .await?
        .ok_or(Error::ExecutionBlockNotFound { block_number, slot })?;

    // An empty block burns nothing and tips nothing.
    if block.transactions.is_empty() {
        return Ok(BigInt::from(0));
    }

    let receipts = batch_request_receipts(execution, &block.transactions, block_number, slot).await?;

    let mut total_fee = BigInt::from(0);
    for receipt in &receipts {
        let effective_gas_price = receipt
            .effective_gas_price
            .ok_or(Error::MissingEffectiveGasPrice { block_number, slot })?;
        total_fee += to_bigint(effective_gas_price) * receipt.gas_used;
    }

    let burnt_fee = to_bigint(block.base_fee_per_gas) * block.gas_used;

    Ok(total_fee - burnt_fee)
}

/// Fetch the receipts for every transaction in the block, retrying the whole
/// batch with a linearly growing delay. Receipts are all-or-nothing: a batch
/// with any failed lookup is retried in full.
async fn batch_request_receipts<E: ExecutionApi + Sync>(
    execution: &E,
    hashes: &[H256],
    block_number: u64,
    slot: Slot,
) -> Result<Vec<TxReceipt>, Error> {
    let mut last_error = None;

    for attempt in 0..RECEIPT_RETRY_LIMIT {
        tokio::time::sleep(Duration::from_secs(attempt)).await;

        match execution.get_transaction_receipts(hashes).await {
            Ok(receipts) => return Ok(receipts),
            Err(e) => {
                warn!(
                    "error fetching receipts for block {} (slot {}) on attempt {}: {}",
                    block_number, slot, attempt, e
                );
                last_error = Some(e);
            }
        }
    }

    Err(Error::ReceiptRequestFailed {
        block_number,
        slot,
        error: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

fn to_bigint(value: U256) -> BigInt {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    BigInt::from_bytes_be(Sign::Plus, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u256_conversion_is_lossless_beyond_64_bits() {
        let value = U256::from(u64::MAX) * U256::from(u64::MAX);
        let expected = BigInt::from(u64::MAX) * BigInt::from(u64::MAX);
        assert_eq!(to_bigint(value), expected);
    }
}
