//! # Task Result Aggregator
//!
//! Collects signed results for one task until operators holding the
//! threshold share of stake agree on a response, then emits a certificate.
//!
//! ## Threshold
//!
//! `threshold_bips` is out of 10,000. A response reaches quorum when
//! `signed_weight * 10_000 >= threshold_bips * total_weight`.
//!
//! Weight is tallied per response digest. Operators that answer differently
//! are accepted and counted towards their own response, so a minority answer
//! never blocks or pollutes the majority's certificate.
//!
//! ## Concurrency
//!
//! One mutex per aggregator serializes signature processing and certificate
//! generation. Signature verification runs outside of it.

use super::certificate::{Certificate, SignerWeight};
use super::digest::SigningContext;
use super::errors::AggregationError;
use super::operator::Operator;
use super::scheme::{AggregationScheme, TaskResult};
use alloy_primitives::{Address, B256};
use op_02_task_store::MAX_THRESHOLD_BIPS;
use operator_telemetry::{CERTIFICATES_GENERATED, SIGNATURES_PROCESSED};
use parking_lot::Mutex;
use shared_types::{unix_now, OperatorSetId, Task, TaskId};
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Construction parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorParams {
    pub task_id: TaskId,
    pub avs_address: Address,
    pub operator_set_id: OperatorSetId,
    pub reference_timestamp: u64,
    pub threshold_bips: u16,
    pub payload: Vec<u8>,
    pub deadline_unix_seconds: Option<u64>,
}

impl AggregatorParams {
    pub fn for_task(task: &Task, reference_timestamp: u64, threshold_bips: u16) -> Self {
        Self {
            task_id: task.task_id.clone(),
            avs_address: task.avs_address,
            operator_set_id: task.operator_set_id,
            reference_timestamp,
            threshold_bips,
            payload: task.payload.clone(),
            deadline_unix_seconds: task.deadline_unix_seconds,
        }
    }
}

struct Tally {
    weight: u64,
    output: Vec<u8>,
}

struct State<S: AggregationScheme> {
    /// Operator → (digest it signed, its proof).
    accepted: BTreeMap<Address, (B256, S::Proof)>,
    tallies: HashMap<B256, Tally>,
    certificate: Option<Certificate<S::Material>>,
}

pub struct TaskResultAggregator<S: AggregationScheme> {
    context: SigningContext,
    threshold_bips: u16,
    deadline_unix_seconds: Option<u64>,
    roster: BTreeMap<Address, Operator<S::Key>>,
    total_weight: u64,
    cancel: Option<CancellationToken>,
    state: Mutex<State<S>>,
}

impl<S: AggregationScheme> TaskResultAggregator<S> {
    pub fn new(
        params: AggregatorParams,
        operators: Vec<Operator<S::Key>>,
    ) -> Result<Self, AggregationError> {
        if params.threshold_bips == 0 || params.threshold_bips > MAX_THRESHOLD_BIPS {
            return Err(AggregationError::InvalidConfig(format!(
                "threshold must be within 1..={} bips, got {}",
                MAX_THRESHOLD_BIPS, params.threshold_bips
            )));
        }
        if operators.is_empty() {
            return Err(AggregationError::InvalidConfig(
                "operator set is empty".to_string(),
            ));
        }

        let mut roster = BTreeMap::new();
        let mut total_weight = 0u64;
        for operator in operators {
            total_weight = total_weight.checked_add(operator.weight).ok_or_else(|| {
                AggregationError::InvalidConfig("total weight overflows".to_string())
            })?;
            if let Some(previous) = roster.insert(operator.address, operator) {
                return Err(AggregationError::InvalidConfig(format!(
                    "operator {} listed twice",
                    previous.address
                )));
            }
        }
        if total_weight == 0 {
            return Err(AggregationError::InvalidConfig(
                "operator set has zero total weight".to_string(),
            ));
        }

        let context = SigningContext::new(
            params.task_id,
            params.avs_address,
            params.operator_set_id,
            params.reference_timestamp,
            &params.payload,
        );

        Ok(Self {
            context,
            threshold_bips: params.threshold_bips,
            deadline_unix_seconds: params.deadline_unix_seconds,
            roster,
            total_weight,
            cancel: None,
            state: Mutex::new(State {
                accepted: BTreeMap::new(),
                tallies: HashMap::new(),
                certificate: None,
            }),
        })
    }

    /// Bind to a block context; once `token` fires, no further work is done.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn context(&self) -> &SigningContext {
        &self.context
    }

    pub fn task_id(&self) -> &TaskId {
        &self.context.task_id
    }

    pub fn threshold_bips(&self) -> u16 {
        self.threshold_bips
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn operator(&self, address: &Address) -> Option<&Operator<S::Key>> {
        self.roster.get(address)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Verify and record one operator's result.
    pub fn process_new_signature(
        &self,
        result: &TaskResult<S::Proof>,
    ) -> Result<(), AggregationError> {
        self.process_new_signature_at(result, unix_now())
    }

    /// [`process_new_signature`](Self::process_new_signature) with an explicit clock.
    pub fn process_new_signature_at(
        &self,
        result: &TaskResult<S::Proof>,
        now_unix_seconds: u64,
    ) -> Result<(), AggregationError> {
        let outcome = self.try_accept(result, now_unix_seconds);
        let label = match &outcome {
            Ok(()) => "accepted",
            Err(e) => e.metric_label(),
        };
        SIGNATURES_PROCESSED.with_label_values(&[S::NAME, label]).inc();

        if let Err(e) = &outcome {
            warn!(
                task_id = %self.context.task_id,
                avs = %self.context.avs_address,
                operator = %result.operator_address,
                scheme = S::NAME,
                error = %e,
                "Rejected operator signature"
            );
        }
        outcome
    }

    fn try_accept(
        &self,
        result: &TaskResult<S::Proof>,
        now_unix_seconds: u64,
    ) -> Result<(), AggregationError> {
        self.ensure_live(now_unix_seconds)?;
        self.ensure_same_task(result)?;

        let operator = self.roster.get(&result.operator_address).ok_or(
            AggregationError::UnknownOperator {
                operator: result.operator_address,
            },
        )?;
        let duplicate = AggregationError::DuplicateSignature {
            operator: operator.address,
        };
        if self.state.lock().accepted.contains_key(&operator.address) {
            return Err(duplicate);
        }

        let digest = self.context.response_digest(&result.output);
        S::verify_proof(&self.context, operator, &digest, &result.signature).map_err(|reason| {
            AggregationError::InvalidSignature {
                operator: operator.address,
                reason,
            }
        })?;

        let mut state = self.state.lock();
        // Another submission from the same operator may have won the race.
        if state.accepted.contains_key(&operator.address) {
            return Err(duplicate);
        }
        state
            .accepted
            .insert(operator.address, (digest, result.signature.clone()));

        let majority = state
            .tallies
            .iter()
            .max_by_key(|(_, t)| t.weight)
            .map(|(d, _)| *d);
        let tally = state.tallies.entry(digest).or_insert_with(|| Tally {
            weight: 0,
            output: result.output.clone(),
        });
        tally.weight = tally.weight.saturating_add(operator.weight);
        let weight = tally.weight;

        if majority.is_some_and(|m| m != digest) {
            warn!(
                task_id = %self.context.task_id,
                operator = %operator.address,
                response_digest = %digest,
                "Operator signed a conflicting response"
            );
        }
        debug!(
            task_id = %self.context.task_id,
            operator = %operator.address,
            weight = operator.weight,
            response_weight = weight,
            total_weight = self.total_weight,
            "Accepted operator signature"
        );
        Ok(())
    }

    fn ensure_live(&self, now_unix_seconds: u64) -> Result<(), AggregationError> {
        if self.is_cancelled() {
            return Err(AggregationError::Cancelled {
                task_id: self.context.task_id.clone(),
            });
        }
        match self.deadline_unix_seconds {
            Some(deadline) if now_unix_seconds >= deadline => Err(AggregationError::TaskExpired {
                task_id: self.context.task_id.clone(),
                deadline,
            }),
            _ => Ok(()),
        }
    }

    fn ensure_same_task(&self, result: &TaskResult<S::Proof>) -> Result<(), AggregationError> {
        let field = if result.task_id != self.context.task_id {
            "task_id"
        } else if result.avs_address != self.context.avs_address {
            "avs_address"
        } else if result.operator_set_id != self.context.operator_set_id {
            "operator_set_id"
        } else {
            return Ok(());
        };
        Err(AggregationError::TaskMismatch { field })
    }

    fn meets_threshold(&self, weight: u64) -> bool {
        weight as u128 * MAX_THRESHOLD_BIPS as u128
            >= self.threshold_bips as u128 * self.total_weight as u128
    }

    /// Heaviest response that reaches quorum. Ties go to the lower digest.
    fn winning_digest(&self, state: &State<S>) -> Option<B256> {
        state
            .tallies
            .iter()
            .filter(|(_, tally)| self.meets_threshold(tally.weight))
            .max_by(|(da, a), (db, b)| a.weight.cmp(&b.weight).then_with(|| db.cmp(da)))
            .map(|(digest, _)| *digest)
    }

    pub fn signing_threshold_met(&self) -> bool {
        let state = self.state.lock();
        self.winning_digest(&state).is_some()
    }

    /// Weight behind the currently heaviest response.
    pub fn leading_weight(&self) -> u64 {
        let state = self.state.lock();
        state.tallies.values().map(|t| t.weight).max().unwrap_or(0)
    }

    /// Operators whose signatures were accepted, for any response.
    pub fn signer_count(&self) -> usize {
        self.state.lock().accepted.len()
    }

    pub fn generate_final_certificate(
        &self,
    ) -> Result<Certificate<S::Material>, AggregationError> {
        self.generate_final_certificate_at(unix_now())
    }

    /// Build the certificate for the winning response. The first certificate
    /// is cached and returned by every later call.
    pub fn generate_final_certificate_at(
        &self,
        now_unix_seconds: u64,
    ) -> Result<Certificate<S::Material>, AggregationError> {
        let mut state = self.state.lock();
        if let Some(certificate) = &state.certificate {
            return Ok(certificate.clone());
        }
        if self.is_cancelled() {
            return Err(AggregationError::Cancelled {
                task_id: self.context.task_id.clone(),
            });
        }

        let Some(digest) = self.winning_digest(&state) else {
            return Err(AggregationError::ThresholdNotMet {
                signed_weight: state.tallies.values().map(|t| t.weight).max().unwrap_or(0),
                total_weight: self.total_weight,
                threshold_bips: self.threshold_bips,
            });
        };

        let signers: Vec<(&Operator<S::Key>, &S::Proof)> = state
            .accepted
            .iter()
            .filter(|(_, (d, _))| *d == digest)
            .filter_map(|(address, (_, proof))| self.roster.get(address).map(|op| (op, proof)))
            .collect();
        let non_signers: Vec<&Operator<S::Key>> = self
            .roster
            .values()
            .filter(|op| !signers.iter().any(|(s, _)| s.address == op.address))
            .collect();

        let material =
            S::build_material(&signers, &non_signers).map_err(AggregationError::Certificate)?;

        let signer_weights: Vec<SignerWeight> = signers
            .iter()
            .map(|(op, _)| SignerWeight {
                operator: op.address,
                weight: op.weight,
            })
            .collect();
        let signed_weight: u64 = signer_weights.iter().map(|s| s.weight).sum();
        let task_response = state
            .tallies
            .get(&digest)
            .map(|t| t.output.clone())
            .unwrap_or_default();

        let certificate = Certificate {
            task_id: self.context.task_id.clone(),
            avs_address: self.context.avs_address,
            operator_set_id: self.context.operator_set_id,
            reference_timestamp: self.context.reference_timestamp,
            payload_hash: self.context.payload_hash,
            task_response,
            response_digest: digest,
            signers: signer_weights,
            signed_weight,
            total_weight: self.total_weight,
            signed_at: now_unix_seconds,
            material,
        };

        CERTIFICATES_GENERATED.with_label_values(&[S::NAME]).inc();
        info!(
            task_id = %self.context.task_id,
            avs = %self.context.avs_address,
            scheme = S::NAME,
            signers = certificate.signers.len(),
            signed_weight,
            total_weight = self.total_weight,
            "Generated task certificate"
        );

        state.certificate = Some(certificate.clone());
        Ok(certificate)
    }
}
