//! Verification flow: check an uploaded proof file against the registry.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use crate::contracts::ContractGateway;
use crate::error::{FlowError, ProofError};
use crate::proof::{compute_hash, parse_proof_file, ProofFile};
use crate::types::{ProofHash, TxHash};
use crate::wallet::WalletProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationErrorKind {
    /// Not an Anon Aadhaar proof file; the contract was not consulted.
    InvalidFormat,
    /// Valid proof, unknown to the registry. The user can submit it.
    NotFoundOnChain,
    /// Network, wallet or contract failure.
    Failure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VerificationStatus {
    #[default]
    Idle,
    Loading,
    Submitting,
    Success,
    Error { kind: VerificationErrorKind, message: String },
}

impl VerificationStatus {
    fn error(kind: VerificationErrorKind, message: impl ToString) -> Self {
        VerificationStatus::Error { kind, message: message.to_string() }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, VerificationStatus::Loading | VerificationStatus::Submitting)
    }

    fn describe(&self) -> &'static str {
        match self {
            VerificationStatus::Idle => "idle",
            VerificationStatus::Loading => "verifying",
            VerificationStatus::Submitting => "submitting",
            VerificationStatus::Success => "verified",
            VerificationStatus::Error { .. } => "in error",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    status: VerificationStatus,
    file: Option<ProofFile>,
    proof_hash: Option<ProofHash>,
    transaction_hash: Option<TxHash>,
    run: u64,
}

impl Inner {
    fn set(&mut self, status: VerificationStatus) -> VerificationStatus {
        info!(status = status.describe(), "verification status");
        self.status = status.clone();
        status
    }
}

/// Runs independently of the submission wizard, sharing only the contract
/// gateway.
pub struct VerificationFlow<P: WalletProvider> {
    contract: Rc<ContractGateway<P>>,
    inner: RefCell<Inner>,
}

impl<P: WalletProvider + 'static> VerificationFlow<P> {
    pub fn new(contract: Rc<ContractGateway<P>>) -> Self {
        Self { contract, inner: RefCell::new(Inner::default()) }
    }

    pub fn status(&self) -> VerificationStatus { self.inner.borrow().status.clone() }

    pub fn file(&self) -> Option<ProofFile> { self.inner.borrow().file.clone() }

    pub fn proof_hash(&self) -> Option<ProofHash> { self.inner.borrow().proof_hash }

    /// Transaction sent by `submit_unregistered`, if any.
    pub fn transaction_hash(&self) -> Option<TxHash> { self.inner.borrow().transaction_hash }

    fn begin(&self, action: &'static str, to: VerificationStatus) -> Result<u64, FlowError> {
        let mut inner = self.inner.borrow_mut();
        if inner.status.is_busy() {
            let state = inner.status.describe().to_string();
            return Err(FlowError::InvalidTransition { state, action });
        }
        inner.run += 1;
        inner.set(to);
        Ok(inner.run)
    }

    /// Parses the file, hashes the proof and asks the registry whether the
    /// hash is known. The outcome is also kept as the current status.
    pub async fn verify_file(&self, bytes: &[u8]) -> Result<VerificationStatus, FlowError> {
        let run = self.begin("verify a file", VerificationStatus::Loading)?;
        {
            let mut inner = self.inner.borrow_mut();
            inner.file = None;
            inner.proof_hash = None;
            inner.transaction_hash = None;
        }

        let file = match parse_proof_file(bytes) {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "rejected proof file");
                let status = VerificationStatus::error(VerificationErrorKind::InvalidFormat, err);
                return Ok(self.inner.borrow_mut().set(status));
            }
        };
        let hash = compute_hash(&file.proof);
        {
            let mut inner = self.inner.borrow_mut();
            inner.file = Some(file);
            inner.proof_hash = Some(hash);
        }

        let result = self.contract.exists_proof(&hash).await;
        let mut inner = self.inner.borrow_mut();
        if inner.run != run {
            return Err(FlowError::Interrupted("verification"));
        }
        let status = match result {
            Ok(true) => VerificationStatus::Success,
            Ok(false) => VerificationStatus::error(
                VerificationErrorKind::NotFoundOnChain,
                ProofError::NotFoundOnChain,
            ),
            Err(err) => {
                warn!(%hash, error = %err, "verification failed");
                VerificationStatus::error(VerificationErrorKind::Failure, err)
            }
        };
        info!(%hash, found = status == VerificationStatus::Success, "proof verified");
        Ok(inner.set(status))
    }

    /// Registers a verified-but-unknown proof.
    pub async fn submit_unregistered(&self) -> Result<VerificationStatus, FlowError> {
        let hash = {
            let inner = self.inner.borrow();
            let not_found = matches!(
                inner.status,
                VerificationStatus::Error { kind: VerificationErrorKind::NotFoundOnChain, .. }
            );
            match inner.proof_hash.filter(|_| not_found) {
                Some(hash) => hash,
                None => {
                    return Err(FlowError::InvalidTransition {
                        state: inner.status.describe().to_string(),
                        action: "submit",
                    })
                }
            }
        };
        let run = self.begin("submit", VerificationStatus::Submitting)?;

        let result = self.contract.submit_proof(&hash).await;
        let mut inner = self.inner.borrow_mut();
        if inner.run != run {
            return Err(FlowError::Interrupted("submission"));
        }
        let status = match result {
            Ok(submission) => {
                inner.transaction_hash = submission.transaction_hash;
                VerificationStatus::Success
            }
            Err(err) => VerificationStatus::error(VerificationErrorKind::Failure, err),
        };
        Ok(inner.set(status))
    }

    /// Back to `Idle`; a result still in flight is discarded.
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.run += 1;
        inner.file = None;
        inner.proof_hash = None;
        inner.transaction_hash = None;
        inner.status = VerificationStatus::Idle;
    }
}
