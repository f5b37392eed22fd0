//! A JSON-RPC-over-HTTP client for the execution node, restricted to the two
//! calls fee reconciliation relies on: a block lookup by number and a batched
//! transaction receipt lookup.

pub mod json_structures;

use async_trait::async_trait;
use json_structures::*;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::time::Duration;

pub use ethereum_types::{H256, U256};
pub use reqwest::Client;
pub use url::Url;

const STATIC_ID: u32 = 1;
pub const JSONRPC_VERSION: &str = "2.0";

pub const RETURN_FULL_TRANSACTION_OBJECTS: bool = false;

pub const ETH_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
pub const ETH_GET_BLOCK_BY_NUMBER_TIMEOUT: Duration = Duration::from_secs(10);

pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const ETH_GET_TRANSACTION_RECEIPT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum Error {
    HttpClient(reqwest::Error),
    Json(serde_json::Error),
    ServerMessage { code: i64, message: String },
    InvalidBatchResponse(&'static str),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::HttpClient(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub struct HttpJsonRpc {
    pub client: Client,
    pub url: Url,
}

impl HttpJsonRpc {
    pub fn new(url: Url) -> Result<Self, Error> {
        Ok(Self {
            client: Client::builder().build()?,
            url,
        })
    }

    pub async fn rpc_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, Error> {
        let body = JsonRequestBody {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: json!(STATIC_ID),
        };

        let body: JsonResponseBody = self
            .client
            .post(self.url.clone())
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (body.result, body.error) {
            (result, None) => serde_json::from_value(result).map_err(Into::into),
            (_, Some(error)) => Err(Error::ServerMessage {
                code: error.code,
                message: error.message,
            }),
        }
    }

    /// Issue every request in `params_list` as one JSON-RPC batch call.
    ///
    /// Responses are matched back to their requests by id since servers may
    /// answer a batch in any order. Results are all-or-nothing: an
    /// element-level error fails the whole call.
    pub async fn rpc_batch_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params_list: Vec<serde_json::Value>,
        timeout: Duration,
    ) -> Result<Vec<T>, Error> {
        if params_list.is_empty() {
            return Ok(vec![]);
        }

        let batch = params_list
            .into_iter()
            .enumerate()
            .map(|(id, params)| JsonRequestBody {
                jsonrpc: JSONRPC_VERSION,
                method,
                params,
                id: json!(id),
            })
            .collect::<Vec<_>>();

        let bodies: Vec<JsonResponseBody> = self
            .client
            .post(self.url.clone())
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&batch)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        collect_batch_results(batch.len(), bodies)
    }
}

/// Re-order a batch response by request id and decode every element,
/// rejecting the batch if any element failed or is missing.
fn collect_batch_results<T: DeserializeOwned>(
    expected: usize,
    bodies: Vec<JsonResponseBody>,
) -> Result<Vec<T>, Error> {
    if bodies.len() != expected {
        return Err(Error::InvalidBatchResponse(
            "response count does not match request count",
        ));
    }

    let mut results: Vec<Option<T>> = (0..expected).map(|_| None).collect();

    for body in bodies {
        let id = body
            .id
            .as_u64()
            .and_then(|id| usize::try_from(id).ok())
            .filter(|id| *id < expected)
            .ok_or(Error::InvalidBatchResponse("unknown response id"))?;

        if results[id].is_some() {
            return Err(Error::InvalidBatchResponse("duplicate response id"));
        }

        match (body.result, body.error) {
            (result, None) => results[id] = Some(serde_json::from_value(result)?),
            (_, Some(error)) => {
                return Err(Error::ServerMessage {
                    code: error.code,
                    message: error.message,
                })
            }
        }
    }

    results
        .into_iter()
        .map(|result| result.ok_or(Error::InvalidBatchResponse("missing response id")))
        .collect()
}

/// The execution node calls the fee reconciliation path relies on.
/// [`HttpJsonRpc`] is the production implementation.
#[async_trait]
pub trait ExecutionApi {
    /// Fetch a block by number, with transaction hashes only. `None` when the
    /// node does not have the block.
    async fn get_block_by_number(&self, block_number: u64)
        -> Result<Option<ExecutionBlock>, Error>;

    /// Fetch the receipts for `hashes` in a single batched call. Each attempt
    /// is bounded by its own request timeout.
    async fn get_transaction_receipts(&self, hashes: &[H256]) -> Result<Vec<TxReceipt>, Error>;
}

#[async_trait]
impl ExecutionApi for HttpJsonRpc {
    async fn get_block_by_number(
        &self,
        block_number: u64,
    ) -> Result<Option<ExecutionBlock>, Error> {
        let params = json!([
            format!("{block_number:#x}"),
            RETURN_FULL_TRANSACTION_OBJECTS
        ]);

        self.rpc_request(
            ETH_GET_BLOCK_BY_NUMBER,
            params,
            ETH_GET_BLOCK_BY_NUMBER_TIMEOUT,
        )
        .await
    }

    async fn get_transaction_receipts(&self, hashes: &[H256]) -> Result<Vec<TxReceipt>, Error> {
        let params_list = hashes.iter().map(|hash| json!([hash])).collect();

        self.rpc_batch_request(
            ETH_GET_TRANSACTION_RECEIPT,
            params_list,
            ETH_GET_TRANSACTION_RECEIPT_TIMEOUT,
        )
        .await
    }
}
