//! HTTP weight submitter.
//!
//! `POST {base_url}/subnets/{netuid}/weights`. The provider endpoint is
//! expected to treat the epoch as an idempotency key and to answer
//! `409 Conflict` with `{ "digest": ... }` when the epoch already holds a
//! vector.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::domain::{BridgeError, BridgeResult, PeerId, SignedSubmission};
use crate::ports::WeightSubmitter;

#[derive(Serialize)]
struct WeightsBody<'a> {
    epoch: u64,
    signer: &'a PeerId,
    digest: &'a str,
    signature: &'a str,
    weights: Vec<(PeerId, u16)>,
}

#[derive(Deserialize)]
struct ConflictBody {
    digest: String,
}

/// Submits signed weight vectors over HTTP.
pub struct HttpWeightSubmitter {
    client: Client,
    base_url: String,
}

impl HttpWeightSubmitter {
    /// Create a submitter; `timeout` bounds each request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BridgeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("weight client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WeightSubmitter for HttpWeightSubmitter {
    async fn submit(&self, signed: &SignedSubmission) -> BridgeResult<()> {
        let submission = &signed.submission;
        let url = format!("{}/subnets/{}/weights", self.base_url, submission.netuid);
        let body = WeightsBody {
            epoch: submission.epoch,
            signer: &signed.signer,
            digest: &signed.digest,
            signature: &signed.signature,
            weights: submission.quantized(u16::MAX),
        };
        let failure = |reason: String| BridgeError::CommitFailure {
            epoch: submission.epoch,
            attempt: 0,
            reason,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::CONFLICT {
            let text = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ConflictBody>(&text) {
                Ok(body) => Err(BridgeError::EpochAlreadyCommitted {
                    epoch: submission.epoch,
                    digest: body.digest,
                }),
                Err(_) => Err(failure(format!("HTTP {status}: {text}"))),
            }
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(failure(format!("HTTP {status}: {text}")))
        }
    }
}
