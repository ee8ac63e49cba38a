//! Test helpers: operators holding real keys, and a submitter that records.

use crate::domain::bls::{BlsPublicKey, BlsSignature, DST};
use crate::domain::certificate::Certificate;
use crate::domain::digest::SigningContext;
use crate::domain::ecdsa::{self, EcdsaOperatorKey};
use crate::domain::operator::{Operator, OperatorSetSnapshot};
use crate::domain::scheme::{EcdsaResultSignature, TaskResult};
use crate::ports::{CertificateSubmitter, SubmitError};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use blst::min_sig::SecretKey;
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use shared_types::OperatorSetId;

/// Reference timestamp used by [`snapshot`].
pub const REFERENCE_TIMESTAMP: u64 = 1_700_000_000;

fn result_for<P>(
    ctx: &SigningContext,
    operator_address: Address,
    output: &[u8],
    signature: P,
) -> TaskResult<P> {
    TaskResult {
        task_id: ctx.task_id.clone(),
        avs_address: ctx.avs_address,
        operator_set_id: ctx.operator_set_id,
        operator_address,
        output: output.to_vec(),
        signature,
    }
}

pub struct BlsTestOperator {
    secret: SecretKey,
    pub operator: Operator<BlsPublicKey>,
}

impl BlsTestOperator {
    /// Deterministic key and address derived from `seed`.
    pub fn new(seed: u8, weight: u64) -> Self {
        Self::from_ikm(&[seed; 32], Address::repeat_byte(seed), weight)
    }

    pub fn random(weight: u64) -> Self {
        let ikm: [u8; 32] = rand::random();
        let address = Address::from(rand::random::<[u8; 20]>());
        Self::from_ikm(&ikm, address, weight)
    }

    fn from_ikm(ikm: &[u8; 32], address: Address, weight: u64) -> Self {
        let secret = SecretKey::key_gen(ikm, &[]).expect("32-byte ikm is accepted");
        let public_key = BlsPublicKey::from_bytes(secret.sk_to_pk().to_bytes());
        Self {
            secret,
            operator: Operator::new(address, public_key, weight),
        }
    }

    pub fn address(&self) -> Address {
        self.operator.address
    }

    pub fn sign(&self, digest: &B256) -> BlsSignature {
        BlsSignature::from_bytes(self.secret.sign(digest.as_slice(), DST, &[]).to_bytes())
    }

    /// Correctly signed result for `output`.
    pub fn result(&self, ctx: &SigningContext, output: &[u8]) -> TaskResult<BlsSignature> {
        let signature = self.sign(&ctx.response_digest(output));
        result_for(ctx, self.address(), output, signature)
    }
}

pub struct EcdsaTestOperator {
    key: SigningKey,
    pub operator: Operator<EcdsaOperatorKey>,
}

impl EcdsaTestOperator {
    pub fn random(weight: u64) -> Self {
        let key = SigningKey::random(&mut rand::thread_rng());
        let public_key = EcdsaOperatorKey::from_verifying_key(key.verifying_key());
        Self {
            operator: Operator::new(public_key.address, public_key, weight),
            key,
        }
    }

    pub fn address(&self) -> Address {
        self.operator.address
    }

    /// Result signature plus the auth signature over it.
    pub fn result(&self, ctx: &SigningContext, output: &[u8]) -> TaskResult<EcdsaResultSignature> {
        let result = ecdsa::sign_prehash(&ctx.response_digest(output), &self.key)
            .expect("prehash signing succeeds");
        let auth = ecdsa::sign_prehash(
            &ctx.auth_digest(&self.address(), &result.to_bytes()),
            &self.key,
        )
        .expect("prehash signing succeeds");
        result_for(
            ctx,
            self.address(),
            output,
            EcdsaResultSignature { result, auth },
        )
    }
}

pub fn snapshot<K>(operator_set_id: OperatorSetId, operators: Vec<Operator<K>>) -> OperatorSetSnapshot<K> {
    OperatorSetSnapshot {
        operator_set_id,
        reference_timestamp: REFERENCE_TIMESTAMP,
        operators,
    }
}

/// Keeps every submitted certificate; can be told to reject.
pub struct RecordingSubmitter<M> {
    submitted: Mutex<Vec<Certificate<M>>>,
    fail_with: Mutex<Option<SubmitError>>,
}

impl<M: Clone> RecordingSubmitter<M> {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    pub fn failing(error: SubmitError) -> Self {
        let submitter = Self::new();
        *submitter.fail_with.lock() = Some(error);
        submitter
    }

    pub fn submitted(&self) -> Vec<Certificate<M>> {
        self.submitted.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.submitted.lock().len()
    }
}

impl<M: Clone> Default for RecordingSubmitter<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: Clone + Send + Sync + 'static> CertificateSubmitter<M> for RecordingSubmitter<M> {
    async fn submit(&self, certificate: &Certificate<M>) -> Result<(), SubmitError> {
        if let Some(error) = self.fail_with.lock().clone() {
            return Err(error);
        }
        self.submitted.lock().push(certificate.clone());
        Ok(())
    }
}
