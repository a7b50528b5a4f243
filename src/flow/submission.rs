//! Submission flow: the five-step wizard from wallet detection to an
//! on-chain proof.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::contracts::{ContractGateway, StoredProof};
use crate::error::{Error, FlowError, ProofError, WalletError};
use crate::proof::{compute_hash, Proof, ProofExport, ProofGenerator, ProofRequest};
use crate::types::{ProofHash, TxHash};
use crate::wallet::gateway::network_name_for;
use crate::wallet::{WalletEvent, WalletGateway, WalletProvider, WalletSubscription};

/// Shown instead of a transaction when the hash was registered before.
pub const ALREADY_STORED_NOTICE: &str =
    "Proof already exists on the blockchain. No need to store again.";

/// Wizard steps, numbered 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    InstallWallet = 1,
    ConnectWallet = 2,
    GenerateProof = 3,
    ReviewProof = 4,
    StoreProof = 5,
}

impl Step {
    pub const COUNT: u8 = 5;

    pub fn number(self) -> u8 { self as u8 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    NoWallet,
    WalletPresent,
    Connected,
    ProofGenerating,
    ProofReady,
    Submitting,
    Stored,
    /// A failure, shown on the step where it happened.
    Error { message: String, step: Step },
}

impl SubmissionState {
    pub fn step(&self) -> Step {
        match self {
            SubmissionState::NoWallet => Step::InstallWallet,
            SubmissionState::WalletPresent => Step::ConnectWallet,
            SubmissionState::Connected | SubmissionState::ProofGenerating => Step::GenerateProof,
            SubmissionState::ProofReady => Step::ReviewProof,
            SubmissionState::Submitting | SubmissionState::Stored => Step::StoreProof,
            SubmissionState::Error { step, .. } => *step,
        }
    }

    /// Waiting on the prover or the chain, with no way to tell how long.
    pub fn is_busy(&self) -> bool {
        matches!(self, SubmissionState::ProofGenerating | SubmissionState::Submitting)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::NoWallet => "no wallet is installed",
            SubmissionState::WalletPresent => "the wallet is not connected",
            SubmissionState::Connected => "connected",
            SubmissionState::ProofGenerating => "generating a proof",
            SubmissionState::ProofReady => "a proof is ready",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Stored => "the proof is stored",
            SubmissionState::Error { .. } => "in error",
        };
        f.write_str(name)
    }
}

/// Step indicator for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub step: Step,
    pub total: u8,
    pub indeterminate: bool,
}

/// A proof this session put (or found) on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub proof_hash: ProofHash,
    pub transaction_hash: Option<TxHash>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    state: SubmissionState,
    proof: Option<Proof>,
    proof_hash: Option<ProofHash>,
    transaction_hash: Option<TxHash>,
    notice: Option<String>,
    last_error: Option<Error>,
    history: Vec<HistoryEntry>,
    /// Bumped whenever in-flight work must be discarded.
    epoch: u64,
}

impl Inner {
    fn new(state: SubmissionState) -> Self {
        Self {
            state,
            proof: None,
            proof_hash: None,
            transaction_hash: None,
            notice: None,
            last_error: None,
            history: Vec::new(),
            epoch: 0,
        }
    }

    fn transition(&mut self, to: SubmissionState) {
        if self.state != to {
            info!(from = %self.state, to = %to, step = to.step().number(), "submission state");
        }
        self.state = to;
    }

    fn fail(&mut self, err: Error) {
        warn!(error = %err, state = %self.state, "submission step failed");
        let step = self.state.step();
        self.transition(SubmissionState::Error { message: err.to_string(), step });
        self.last_error = Some(err);
    }

    /// Drops the proof and everything derived from it. History survives.
    fn clear_proof(&mut self) {
        self.proof = None;
        self.proof_hash = None;
        self.transaction_hash = None;
        self.notice = None;
        self.last_error = None;
    }

    fn invalidate(&mut self) { self.epoch += 1; }

    fn guard(&self, allowed: bool, action: &'static str) -> Result<u64, FlowError> {
        if allowed {
            Ok(self.epoch)
        } else {
            Err(FlowError::InvalidTransition { state: self.state.to_string(), action })
        }
    }

    fn on_wallet_event(&mut self, event: &WalletEvent) {
        match event {
            WalletEvent::AccountConnected(_) => {
                if self.state == SubmissionState::WalletPresent {
                    self.transition(SubmissionState::Connected);
                }
            }
            WalletEvent::AccountsCleared => {
                if self.state != SubmissionState::NoWallet {
                    self.invalidate();
                    self.clear_proof();
                    self.transition(SubmissionState::WalletPresent);
                }
            }
            WalletEvent::NetworkChanged { chain_id, name } => {
                info!(%chain_id, %name, "wallet network changed");
            }
        }
    }
}

pub struct SubmissionFlow<P: WalletProvider, G: ProofGenerator> {
    wallet: Rc<WalletGateway<P>>,
    contract: Rc<ContractGateway<P>>,
    generator: Rc<G>,
    inner: Rc<RefCell<Inner>>,
    subscription: RefCell<Option<WalletSubscription<P>>>,
}

impl<P: WalletProvider + 'static, G: ProofGenerator> SubmissionFlow<P, G> {
    pub fn new(
        wallet: Rc<WalletGateway<P>>,
        contract: Rc<ContractGateway<P>>,
        generator: Rc<G>,
    ) -> Self {
        let initial = Self::resting_state(&wallet);
        Self {
            wallet,
            contract,
            generator,
            inner: Rc::new(RefCell::new(Inner::new(initial))),
            subscription: RefCell::new(None),
        }
    }

    /// Builds both gateways from `config`.
    pub fn from_config(provider: Option<Rc<P>>, generator: Rc<G>, config: &RegistryConfig) -> Self {
        let wallet = Rc::new(WalletGateway::new(provider, config.network.clone()));
        let contract = Rc::new(ContractGateway::from_config(Rc::clone(&wallet), config));
        Self::new(wallet, contract, generator)
    }

    fn resting_state(wallet: &WalletGateway<P>) -> SubmissionState {
        if !wallet.is_installed() {
            SubmissionState::NoWallet
        } else if wallet.address().is_some() {
            SubmissionState::Connected
        } else {
            SubmissionState::WalletPresent
        }
    }

    pub fn wallet(&self) -> &Rc<WalletGateway<P>> { &self.wallet }

    pub fn contract(&self) -> &Rc<ContractGateway<P>> { &self.contract }

    pub fn state(&self) -> SubmissionState { self.inner.borrow().state.clone() }

    pub fn step(&self) -> Step { self.inner.borrow().state.step() }

    pub fn progress(&self) -> Progress {
        let inner = self.inner.borrow();
        Progress { step: inner.state.step(), total: Step::COUNT, indeterminate: inner.state.is_busy() }
    }

    pub fn proof(&self) -> Option<Proof> { self.inner.borrow().proof.clone() }

    pub fn proof_hash(&self) -> Option<ProofHash> { self.inner.borrow().proof_hash }

    pub fn transaction_hash(&self) -> Option<TxHash> { self.inner.borrow().transaction_hash }

    /// Informational message, never an error.
    pub fn notice(&self) -> Option<String> { self.inner.borrow().notice.clone() }

    pub fn last_error(&self) -> Option<Error> { self.inner.borrow().last_error.clone() }

    pub fn history(&self) -> Vec<HistoryEntry> { self.inner.borrow().history.clone() }

    pub fn is_attached(&self) -> bool { self.subscription.borrow().is_some() }

    /// Explorer link for the stored transaction.
    pub fn transaction_url(&self) -> Option<String> {
        let tx = self.transaction_hash()?;
        self.wallet.network().explorer_tx_url(&tx)
    }

    /// Follows the wallet's account and chain events until `detach` or drop.
    pub fn attach(&self) -> Result<(), Error> {
        let inner = Rc::clone(&self.inner);
        let subscription = self
            .wallet
            .subscribe(move |event| inner.borrow_mut().on_wallet_event(&event))?;
        *self.subscription.borrow_mut() = Some(subscription);
        Ok(())
    }

    pub fn detach(&self) { self.subscription.borrow_mut().take(); }

    /// Picks up an account the wallet already authorized, without a prompt.
    pub async fn restore_session(&self) -> Result<bool, Error> {
        let epoch = {
            let inner = self.inner.borrow();
            inner.guard(inner.state == SubmissionState::WalletPresent, "restore a session")?
        };
        let Some(address) = self.wallet.existing_accounts().await? else {
            return Ok(false);
        };
        self.wallet.refresh_network_name().await?;
        self.check_epoch(epoch, "session restore")?;
        info!(%address, "wallet session restored");
        self.inner.borrow_mut().transition(SubmissionState::Connected);
        Ok(true)
    }

    /// Step 2: request account access and the required network.
    pub async fn connect(&self) -> Result<(), Error> {
        let epoch = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == SubmissionState::NoWallet {
                let err = Error::from(WalletError::NotInstalled);
                warn!(error = %err, "cannot connect");
                inner.last_error = Some(err.clone());
                return Err(err);
            }
            inner.guard(inner.state == SubmissionState::WalletPresent, "connect")?
        };

        let result = self.wallet.connect().await;
        self.check_epoch(epoch, "connect")?;
        let mut inner = self.inner.borrow_mut();
        match result {
            Ok(_) => {
                inner.last_error = None;
                inner.transition(SubmissionState::Connected);
                Ok(())
            }
            Err(err) => {
                let err = Error::from(err);
                inner.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Step 3: hand the request to the prover and wait for its outcome.
    pub async fn generate_proof(&self, request: &ProofRequest) -> Result<ProofHash, Error> {
        let epoch = {
            let mut inner = self.inner.borrow_mut();
            let epoch = inner.guard(inner.state == SubmissionState::Connected, "generate a proof")?;
            inner.clear_proof();
            inner.transition(SubmissionState::ProofGenerating);
            epoch
        };

        let result = self.generator.generate(request).await;
        self.check_epoch(epoch, "proof generation")?;
        let mut inner = self.inner.borrow_mut();
        match result {
            Ok(proof) => {
                let hash = compute_hash(&proof);
                info!(%hash, "proof generated");
                inner.proof = Some(proof);
                inner.proof_hash = Some(hash);
                inner.transition(SubmissionState::ProofReady);
                Ok(hash)
            }
            Err(err) => {
                let err = Error::from(match err {
                    ProofError::GenerationFailed(_) => err,
                    other => ProofError::GenerationFailed(other.to_string()),
                });
                inner.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Steps 4 to 5: register the proof hash on chain.
    pub async fn submit(&self) -> Result<Option<TxHash>, Error> {
        let (epoch, hash) = {
            let mut inner = self.inner.borrow_mut();
            let epoch = inner.guard(inner.state == SubmissionState::ProofReady, "submit")?;
            let Some(hash) = inner.proof_hash else {
                return Err(FlowError::InvalidTransition {
                    state: inner.state.to_string(),
                    action: "submit",
                }
                .into());
            };
            inner.transition(SubmissionState::Submitting);
            (epoch, hash)
        };

        let result = self.contract.submit_proof(&hash).await;
        self.check_epoch(epoch, "submission")?;
        let mut inner = self.inner.borrow_mut();
        match result {
            Ok(submission) => {
                inner.transaction_hash = submission.transaction_hash;
                inner.notice = submission.already_existed().then(|| ALREADY_STORED_NOTICE.to_string());
                inner.history.push(HistoryEntry {
                    proof_hash: hash,
                    transaction_hash: submission.transaction_hash,
                    stored_at: Utc::now(),
                });
                inner.transition(SubmissionState::Stored);
                Ok(submission.transaction_hash)
            }
            Err(err) => {
                let err = Error::from(err);
                inner.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Generates and immediately submits.
    pub async fn generate_and_submit(&self, request: &ProofRequest) -> Result<Option<TxHash>, Error> {
        self.generate_proof(request).await?;
        self.submit().await
    }

    /// Leaves the error state for the step the wallet allows.
    pub fn restart(&self) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        inner.guard(matches!(inner.state, SubmissionState::Error { .. }), "restart")?;
        inner.clear_proof();
        inner.transition(Self::resting_state(&self.wallet));
        Ok(())
    }

    /// Forgets the current proof and starts over. Anything still running is
    /// discarded when it returns.
    pub fn start_new_verification(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.invalidate();
        inner.clear_proof();
        inner.transition(Self::resting_state(&self.wallet));
    }

    pub fn logout(&self) {
        self.wallet.disconnect();
        self.start_new_verification();
    }

    /// The download document for the stored proof.
    pub fn export(&self) -> Result<ProofExport, Error> {
        let inner = self.inner.borrow();
        let (Some(proof), Some(tx)) = (&inner.proof, inner.transaction_hash) else {
            return Err(FlowError::NothingToExport.into());
        };
        if inner.state != SubmissionState::Stored {
            return Err(FlowError::NothingToExport.into());
        }
        let network = self
            .wallet
            .network_name()
            .unwrap_or_else(|| network_name_for(self.wallet.network().chain_id).to_string());
        Ok(ProofExport::new(proof.clone(), tx, network, self.contract.address()))
    }

    /// Every proof the connected account has registered, read from chain.
    pub async fn on_chain_proofs(&self) -> Result<Vec<StoredProof>, Error> {
        let address = self.wallet.address().ok_or(WalletError::NoAccounts)?;
        Ok(self.contract.list_user_proofs(address).await?)
    }

    fn check_epoch(&self, epoch: u64, action: &'static str) -> Result<(), FlowError> {
        if self.inner.borrow().epoch == epoch {
            Ok(())
        } else {
            warn!(action, "discarding result of interrupted operation");
            Err(FlowError::Interrupted(action))
        }
    }
}
