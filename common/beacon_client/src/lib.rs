//! A typed HTTP client for the beacon node endpoints that feed per-validator
//! reward attribution: proposer duties, attestation/sync-committee/block
//! rewards, validator balances, and execution payload lookups.
//!
//! The aggregation engine consumes this crate only through the
//! [`BeaconRewardsApi`] trait, so tests can substitute in-memory nodes.

pub mod types;

use async_trait::async_trait;
use reqwest::{IntoUrl, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;

use types::*;

pub use reqwest;
pub use url::Url;

const V1: &str = "v1";
const V2: &str = "v2";

#[derive(Debug)]
pub enum Error {
    /// The `reqwest` client raised an error.
    HttpClient(reqwest::Error),
    /// The server returned an error message where the body was able to be parsed.
    ServerMessage(ErrorMessage),
    /// The server returned an error message where the body was unable to be parsed.
    StatusCode(StatusCode),
    /// The supplied URL is badly formatted. It should look something like `http://127.0.0.1:5052`.
    InvalidUrl(Url),
    /// The slot predates the activation of sync committees.
    PreSyncCommitteePeriod,
    /// The block at this slot predates the execution merge and carries no
    /// execution payload.
    PreMergeSlot,
    /// The server returned a balances response without the requested validator.
    MissingBalance,
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::HttpClient(error)
    }
}

impl Error {
    /// If the error has a HTTP status code, return it.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpClient(error) => error.status(),
            Error::ServerMessage(msg) => StatusCode::try_from(msg.code).ok(),
            Error::StatusCode(status) => Some(*status),
            Error::InvalidUrl(_)
            | Error::PreSyncCommitteePeriod
            | Error::PreMergeSlot
            | Error::MissingBalance => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Trait for converting a 404 error into an `Option<Response>`.
trait ResponseOptional {
    fn optional(self) -> Result<Option<Response>, Error>;
}

impl ResponseOptional for Result<Response, Error> {
    fn optional(self) -> Result<Option<Response>, Error> {
        match self {
            Ok(x) => Ok(Some(x)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A distinct timeout per endpoint, so the slow reward queries do not share
/// a deadline with cheap duty lookups.
#[derive(Clone)]
pub struct Timeouts {
    pub proposer_duties: Duration,
    pub attestation_rewards: Duration,
    pub sync_committee_rewards: Duration,
    pub block_rewards: Duration,
    pub get_block: Duration,
    pub validator_balances: Duration,
}

impl Timeouts {
    pub fn set_all(timeout: Duration) -> Self {
        Timeouts {
            proposer_duties: timeout,
            attestation_rewards: timeout,
            sync_committee_rewards: timeout,
            block_rewards: timeout,
            get_block: timeout,
            validator_balances: timeout,
        }
    }
}

/// A wrapper around `reqwest::Client` which provides convenience methods for
/// the beacon node reward and duty endpoints.
#[derive(Clone)]
pub struct BeaconNodeHttpClient {
    client: reqwest::Client,
    server: Url,
    timeouts: Timeouts,
}

impl fmt::Display for BeaconNodeHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.server.fmt(f)
    }
}

impl BeaconNodeHttpClient {
    pub fn new(server: Url, timeouts: Timeouts) -> Self {
        Self {
            client: reqwest::Client::new(),
            server,
            timeouts,
        }
    }

    pub fn from_components(server: Url, client: reqwest::Client, timeouts: Timeouts) -> Self {
        Self {
            client,
            server,
            timeouts,
        }
    }

    /// Return the path with the standard `/eth/vX` prefix applied.
    fn eth_path(&self, version: &str) -> Result<Url, Error> {
        let mut path = self.server.clone();

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("eth")
            .push(version);

        Ok(path)
    }

    /// Perform an HTTP GET request, returning the `Response` for processing.
    async fn get_response<U: IntoUrl>(
        &self,
        url: U,
        timeout: Duration,
    ) -> Result<Response, Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        ok_or_error(response).await
    }

    /// Perform a HTTP GET request with a custom timeout.
    async fn get_with_timeout<T: DeserializeOwned, U: IntoUrl>(
        &self,
        url: U,
        timeout: Duration,
    ) -> Result<T, Error> {
        Ok(self.get_response(url, timeout).await?.json().await?)
    }

    /// Perform a HTTP GET request with a custom timeout, returning `None` on
    /// a 404 error.
    async fn get_opt_with_timeout<T: DeserializeOwned, U: IntoUrl>(
        &self,
        url: U,
        timeout: Duration,
    ) -> Result<Option<T>, Error> {
        match self.get_response(url, timeout).await.optional()? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    /// Perform a HTTP POST request with a custom timeout.
    async fn post_with_timeout<T: Serialize, U: IntoUrl, R: DeserializeOwned>(
        &self,
        url: U,
        body: &T,
        timeout: Duration,
    ) -> Result<R, Error> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        Ok(ok_or_error(response).await?.json().await?)
    }

    /// `GET validator/duties/proposer/{epoch}`
    pub async fn get_validator_duties_proposer(
        &self,
        epoch: Epoch,
    ) -> Result<DutiesResponse<Vec<ProposerDuty>>, Error> {
        let mut path = self.eth_path(V1)?;

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("validator")
            .push("duties")
            .push("proposer")
            .push(&epoch.to_string());

        self.get_with_timeout(path, self.timeouts.proposer_duties)
            .await
    }

    /// `POST beacon/rewards/attestations/{epoch}`
    ///
    /// An empty request body asks the node for every validator.
    pub async fn post_beacon_rewards_attestations(
        &self,
        epoch: Epoch,
    ) -> Result<AttestationRewards, Error> {
        let mut path = self.eth_path(V1)?;

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("beacon")
            .push("rewards")
            .push("attestations")
            .push(&epoch.to_string());

        let response: GenericResponse<AttestationRewards> = self
            .post_with_timeout(path, &json!([]), self.timeouts.attestation_rewards)
            .await?;

        Ok(response.data)
    }

    /// `POST beacon/rewards/sync_committee/{slot}`
    ///
    /// Returns `Ok(None)` when there is no block at the slot. The standard
    /// API answers 500 for slots before the sync committee fork; that is
    /// reported as `Error::PreSyncCommitteePeriod` rather than a generic
    /// failure.
    pub async fn post_beacon_rewards_sync_committee(
        &self,
        slot: Slot,
    ) -> Result<Option<Vec<SyncCommitteeReward>>, Error> {
        let mut path = self.eth_path(V1)?;

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("beacon")
            .push("rewards")
            .push("sync_committee")
            .push(&slot.to_string());

        let response = self
            .client
            .post(path)
            .timeout(self.timeouts.sync_committee_rewards)
            .json(&json!([]))
            .send()
            .await?;

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(Error::PreSyncCommitteePeriod);
        }

        match ok_or_error(response).await.optional()? {
            Some(response) => {
                let rewards: GenericResponse<Vec<SyncCommitteeReward>> = response.json().await?;
                Ok(Some(rewards.data))
            }
            None => Ok(None),
        }
    }

    /// `GET beacon/rewards/blocks/{slot}`
    ///
    /// Returns `Ok(None)` when there is no block at the slot.
    pub async fn get_beacon_rewards_blocks(&self, slot: Slot) -> Result<Option<BlockReward>, Error> {
        let mut path = self.eth_path(V1)?;

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("beacon")
            .push("rewards")
            .push("blocks")
            .push(&slot.to_string());

        let response: Option<GenericResponse<BlockReward>> = self
            .get_opt_with_timeout(path, self.timeouts.block_rewards)
            .await?;

        Ok(response.map(|r| r.data))
    }

    /// `GET beacon/blocks/{slot}`, reduced to the execution block number the
    /// proposal carried.
    ///
    /// Returns `Ok(None)` when the proposer did not publish a block at the
    /// slot. A published block without an execution payload is reported as
    /// `Error::PreMergeSlot`.
    pub async fn get_execution_block_number(&self, slot: Slot) -> Result<Option<u64>, Error> {
        let mut path = self.eth_path(V2)?;

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("beacon")
            .push("blocks")
            .push(&slot.to_string());

        let response: Option<GenericResponse<SignedBlockSummary>> = self
            .get_opt_with_timeout(path, self.timeouts.get_block)
            .await?;

        let Some(response) = response else {
            return Ok(None);
        };

        match response.data.message.body.execution_payload {
            Some(payload) => Ok(Some(payload.block_number)),
            None => Err(Error::PreMergeSlot),
        }
    }

    /// `GET beacon/states/{slot}/validator_balances?id={validator_index}`
    pub async fn get_validator_balance(
        &self,
        slot: Slot,
        validator_index: ValidatorIndex,
    ) -> Result<u64, Error> {
        let mut path = self.eth_path(V1)?;

        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .push("beacon")
            .push("states")
            .push(&slot.to_string())
            .push("validator_balances");

        path.query_pairs_mut()
            .append_pair("id", &validator_index.to_string());

        let response: GenericResponse<Vec<ValidatorBalanceData>> = self
            .get_with_timeout(path, self.timeouts.validator_balances)
            .await?;

        response
            .data
            .first()
            .map(|balance| balance.balance)
            .ok_or(Error::MissingBalance)
    }
}

/// The read operations the reward aggregation engine needs from a beacon
/// node. [`BeaconNodeHttpClient`] is the production implementation.
#[async_trait]
pub trait BeaconRewardsApi {
    /// The proposer assignments for every slot of `epoch`.
    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, Error>;

    /// The attestation reward components for every validator, for the whole
    /// epoch.
    async fn attestation_rewards(&self, epoch: Epoch) -> Result<AttestationRewards, Error>;

    /// Per-validator sync committee rewards for one slot. `None` when there
    /// is no block at the slot.
    async fn sync_committee_rewards(
        &self,
        slot: Slot,
    ) -> Result<Option<Vec<SyncCommitteeReward>>, Error>;

    /// The proposer's inclusion rewards for the block at `slot`. `None` when
    /// there is no block at the slot.
    async fn block_rewards(&self, slot: Slot) -> Result<Option<BlockReward>, Error>;

    /// The execution block number carried by the block at `slot`. `None` when
    /// there is no block at the slot; `Error::PreMergeSlot` when the block
    /// has no execution payload.
    async fn execution_block_number(&self, slot: Slot) -> Result<Option<u64>, Error>;

    /// A validator's balance in gwei at the given slot.
    async fn validator_balance(
        &self,
        slot: Slot,
        validator_index: ValidatorIndex,
    ) -> Result<u64, Error>;
}

#[async_trait]
impl BeaconRewardsApi for BeaconNodeHttpClient {
    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, Error> {
        Ok(self.get_validator_duties_proposer(epoch).await?.data)
    }

    async fn attestation_rewards(&self, epoch: Epoch) -> Result<AttestationRewards, Error> {
        self.post_beacon_rewards_attestations(epoch).await
    }

    async fn sync_committee_rewards(
        &self,
        slot: Slot,
    ) -> Result<Option<Vec<SyncCommitteeReward>>, Error> {
        self.post_beacon_rewards_sync_committee(slot).await
    }

    async fn block_rewards(&self, slot: Slot) -> Result<Option<BlockReward>, Error> {
        self.get_beacon_rewards_blocks(slot).await
    }

    async fn execution_block_number(&self, slot: Slot) -> Result<Option<u64>, Error> {
        self.get_execution_block_number(slot).await
    }

    async fn validator_balance(
        &self,
        slot: Slot,
        validator_index: ValidatorIndex,
    ) -> Result<u64, Error> {
        self.get_validator_balance(slot, validator_index).await
    }
}

async fn ok_or_error(response: Response) -> Result<Response, Error> {
    let status = response.status();

    if status == StatusCode::OK {
        Ok(response)
    } else if let Ok(message) = response.json().await {
        Err(Error::ServerMessage(message))
    } else {
        Err(Error::StatusCode(status))
    }
}
