//! Lending contract lifecycle state machine and operation dispatch
//!
//! [`LendingContract`] is the single entry point the host calls. In the
//! verification context it answers whether a withdrawal may enter a block
//! ([`LendingContract::verify`]). In the application context it runs a
//! named operation ([`LendingContract::invoke`]) inside a fresh
//! [`StorageContext`] that commits only when the operation succeeds.
//!
//! Lifecycle: `Initial → Active` once through `initialize`, then
//! `Active ↔ Inactive` through `suspend` / `continue`. Lending operations
//! run only while `Active`; admin configuration needs only an initialized
//! contract.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};
use types::errors::ValidationError;
use types::ids::{Address, AssetId, LoanId};
use types::loan::{InterestRate, LoanKind};
use types::numeric::{Amount, Height};

use crate::balances;
use crate::codec::LoanCodec;
use crate::config::{ContractConfig, ReplayGuard};
use crate::errors::{ConfigError, ContractError};
use crate::events::{ContractEvent, Deposited, WithdrawalRequested, WithdrawalSettled};
use crate::fee;
use crate::host::{Ledger, Runtime, Transaction};
use crate::registry::LoanRegistry;
use crate::security::{require_active, require_initialized, require_witness, AccessControl};
use crate::state::ContractState;
use crate::storage::{read_state, write_state, StorageContext, StorageRead, StorageWrite};
use crate::verifier::WithdrawalVerifier;

// ───────────────────────── Operations ─────────────────────────

/// Every operation the contract answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    GetState,
    GetFee,
    GetFeeAddress,
    GetBalance,
    GetLoan,
    CreateLoanOffer,
    CreateLoanDemand,
    FillOfferLoan,
    FillDemandLoan,
    ClaimClosingLoan,
    CancelLoanOffer,
    CancelLoanDemand,
    Deposit,
    RequestWithdrawal,
    SettleWithdrawal,
    Suspend,
    Continue,
    SetFee,
    SetFeeAddress,
}

impl Operation {
    pub const ALL: [Operation; 20] = [
        Operation::Initialize,
        Operation::GetState,
        Operation::GetFee,
        Operation::GetFeeAddress,
        Operation::GetBalance,
        Operation::GetLoan,
        Operation::CreateLoanOffer,
        Operation::CreateLoanDemand,
        Operation::FillOfferLoan,
        Operation::FillDemandLoan,
        Operation::ClaimClosingLoan,
        Operation::CancelLoanOffer,
        Operation::CancelLoanDemand,
        Operation::Deposit,
        Operation::RequestWithdrawal,
        Operation::SettleWithdrawal,
        Operation::Suspend,
        Operation::Continue,
        Operation::SetFee,
        Operation::SetFeeAddress,
    ];

    /// Name the host invokes the operation by.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::GetState => "getState",
            Operation::GetFee => "getFee",
            Operation::GetFeeAddress => "getFeeAddress",
            Operation::GetBalance => "getBalance",
            Operation::GetLoan => "getLoan",
            Operation::CreateLoanOffer => "createLoanOffer",
            Operation::CreateLoanDemand => "createLoanDemand",
            Operation::FillOfferLoan => "fillOfferLoan",
            Operation::FillDemandLoan => "fillDemandLoan",
            Operation::ClaimClosingLoan => "claimClosingLoan",
            Operation::CancelLoanOffer => "cancelLoanOffer",
            Operation::CancelLoanDemand => "cancelLoanDemand",
            Operation::Deposit => "deposit",
            Operation::RequestWithdrawal => "requestWithdrawal",
            Operation::SettleWithdrawal => "settleWithdrawal",
            Operation::Suspend => "suspend",
            Operation::Continue => "continue",
            Operation::SetFee => "setFee",
            Operation::SetFeeAddress => "setFeeAddress",
        }
    }

    /// Number of arguments the operation takes.
    pub fn arity(self) -> usize {
        match self {
            Operation::GetState
            | Operation::GetFee
            | Operation::GetFeeAddress
            | Operation::SettleWithdrawal
            | Operation::Suspend
            | Operation::Continue => 0,
            Operation::ClaimClosingLoan
            | Operation::CancelLoanOffer
            | Operation::CancelLoanDemand
            | Operation::Deposit
            | Operation::RequestWithdrawal
            | Operation::SetFee
            | Operation::SetFeeAddress => 1,
            Operation::Initialize
            | Operation::GetBalance
            | Operation::GetLoan
            | Operation::FillOfferLoan
            | Operation::FillDemandLoan => 2,
            Operation::CreateLoanOffer | Operation::CreateLoanDemand => 4,
        }
    }
}

impl FromStr for Operation {
    type Err = ContractError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| ContractError::UnknownOperation {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ───────────────────────── Arguments & results ─────────────────────────

/// One invocation argument as the host passes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationArg {
    Integer(i128),
    Bytes(Vec<u8>),
}

impl InvocationArg {
    /// Integer view. Byte strings read as little-endian two's complement;
    /// the empty string is zero.
    pub fn to_integer(&self) -> Option<i128> {
        match self {
            InvocationArg::Integer(value) => Some(*value),
            InvocationArg::Bytes(bytes) if bytes.len() > 16 => None,
            InvocationArg::Bytes(bytes) => {
                let fill = match bytes.last() {
                    Some(b) if b & 0x80 != 0 => 0xff,
                    _ => 0x00,
                };
                let mut buf = [fill; 16];
                buf[..bytes.len()].copy_from_slice(bytes);
                Some(i128::from_le_bytes(buf))
            }
        }
    }

    /// Byte view. Integers encode as minimal little-endian two's complement.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            InvocationArg::Bytes(bytes) => bytes.clone(),
            InvocationArg::Integer(0) => Vec::new(),
            InvocationArg::Integer(value) => {
                let mut bytes = value.to_le_bytes().to_vec();
                let fill = if *value < 0 { 0xff } else { 0x00 };
                while bytes.len() > 1
                    && bytes[bytes.len() - 1] == fill
                    && (bytes[bytes.len() - 2] & 0x80 == fill & 0x80)
                {
                    bytes.pop();
                }
                bytes
            }
        }
    }
}

impl From<i128> for InvocationArg {
    fn from(value: i128) -> Self {
        InvocationArg::Integer(value)
    }
}

impl From<u64> for InvocationArg {
    fn from(value: u64) -> Self {
        InvocationArg::Integer(i128::from(value))
    }
}

impl From<Vec<u8>> for InvocationArg {
    fn from(bytes: Vec<u8>) -> Self {
        InvocationArg::Bytes(bytes)
    }
}

impl From<Address> for InvocationArg {
    fn from(address: Address) -> Self {
        InvocationArg::Bytes(address.as_bytes().to_vec())
    }
}

impl From<AssetId> for InvocationArg {
    fn from(asset: AssetId) -> Self {
        InvocationArg::Bytes(asset.as_bytes().to_vec())
    }
}

impl From<LoanId> for InvocationArg {
    fn from(id: LoanId) -> Self {
        InvocationArg::Bytes(id.as_bytes().to_vec())
    }
}

impl From<InterestRate> for InvocationArg {
    fn from(interest: InterestRate) -> Self {
        InvocationArg::Bytes(interest.as_bytes().to_vec())
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Integer(i128),
    Bytes(Vec<u8>),
    State(ContractState),
}

/// Typed view over an operation's argument list.
struct Args<'a> {
    operation: Operation,
    args: &'a [InvocationArg],
}

impl<'a> Args<'a> {
    fn new(operation: Operation, args: &'a [InvocationArg]) -> Result<Self, ContractError> {
        if args.len() != operation.arity() {
            return Err(ContractError::InvalidArguments {
                operation: operation.name().to_string(),
                reason: format!("expected {} arguments, got {}", operation.arity(), args.len()),
            });
        }
        Ok(Self { operation, args })
    }

    fn invalid(&self, reason: impl Into<String>) -> ContractError {
        ContractError::InvalidArguments {
            operation: self.operation.name().to_string(),
            reason: reason.into(),
        }
    }

    fn integer(&self, index: usize) -> Result<i128, ContractError> {
        self.args[index]
            .to_integer()
            .ok_or_else(|| self.invalid(format!("argument {index} is not an integer")))
    }

    fn bytes(&self, index: usize) -> Vec<u8> {
        self.args[index].to_bytes()
    }

    fn address(&self, index: usize) -> Result<Address, ContractError> {
        Ok(Address::from_slice(&self.bytes(index))?)
    }

    fn asset(&self, index: usize) -> Result<AssetId, ContractError> {
        Ok(AssetId::from_slice(&self.bytes(index))?)
    }

    fn loan_id(&self, index: usize) -> Result<LoanId, ContractError> {
        Ok(LoanId::from_slice(&self.bytes(index))?)
    }

    /// Strictly positive amount.
    fn amount(&self, index: usize) -> Result<Amount, ContractError> {
        let value = self.integer(index)?;
        if value <= 0 {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        Amount::try_from(value).map_err(|_| {
            ValidationError::OutOfRange {
                value,
                target: "amount",
            }
            .into()
        })
    }

    fn height(&self, index: usize) -> Result<Height, ContractError> {
        let value = self.integer(index)?;
        Height::try_from(value).map_err(|_| {
            ValidationError::OutOfRange {
                value,
                target: "height",
            }
            .into()
        })
    }

    fn loan_kind(&self, index: usize) -> Result<LoanKind, ContractError> {
        let value = self.integer(index)?;
        let tag = u8::try_from(value).map_err(|_| ValidationError::OutOfRange {
            value,
            target: "loan kind tag",
        })?;
        Ok(LoanKind::from_tag(tag)?)
    }
}

// ───────────────────────── Contract ─────────────────────────

/// The deployed lending contract.
#[derive(Debug)]
pub struct LendingContract {
    config: ContractConfig,
    access: AccessControl,
    /// Events released by committed invocations (append-only)
    events: Vec<ContractEvent>,
}

impl LendingContract {
    pub fn new(config: ContractConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            access: AccessControl::new(config.admin),
            config,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    /// Verification context: may `tx` spend the contract's assets?
    pub fn verify(&self, store: &impl StorageRead, ledger: &dyn Ledger, tx: &Transaction) -> bool {
        WithdrawalVerifier::new(&self.config).verify(store, ledger, tx)
    }

    /// Application context: run `operation` with `args`.
    ///
    /// Storage writes and events of a failed invocation are discarded.
    pub fn invoke<S: StorageWrite>(
        &mut self,
        store: &mut S,
        runtime: &Runtime<'_>,
        operation: &str,
        args: &[InvocationArg],
    ) -> Result<Value, ContractError> {
        let operation: Operation = operation.parse()?;
        let args = Args::new(operation, args)?;

        let mut ctx = StorageContext::begin(store);
        let value = self.dispatch(&mut ctx, runtime, &args)?;
        let events = ctx.commit();
        for event in &events {
            debug!(%operation, event = event.name(), "Event released");
        }
        self.events.extend(events);
        Ok(value)
    }

    /// Host-facing boolean form of [`LendingContract::invoke`].
    pub fn invoke_flag<S: StorageWrite>(
        &mut self,
        store: &mut S,
        runtime: &Runtime<'_>,
        operation: &str,
        args: &[InvocationArg],
    ) -> bool {
        match self.invoke(store, runtime, operation, args) {
            Ok(Value::Bool(flag)) => flag,
            Ok(_) => true,
            Err(err) => {
                debug!(operation, kind = ?err.kind(), %err, "Invocation failed");
                false
            }
        }
    }

    fn dispatch<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        runtime: &Runtime<'_>,
        args: &Args<'_>,
    ) -> Result<Value, ContractError> {
        let registry = LoanRegistry::new(&self.config);
        let height = runtime.height();

        match args.operation {
            Operation::Initialize => {
                let rate = args.integer(0)?;
                let fee_address = args.address(1)?;
                self.initialize(ctx, runtime, rate, fee_address)?;
                Ok(Value::Bool(true))
            }
            Operation::GetState => Ok(Value::State(read_state(ctx)?)),
            Operation::GetFee => Ok(Value::Integer(i128::from(
                fee::fee_rate(ctx)?.percent(),
            ))),
            Operation::GetFeeAddress => Ok(Value::Bytes(
                fee::fee_address(ctx)?
                    .map(|address| address.as_bytes().to_vec())
                    .unwrap_or_default(),
            )),
            Operation::GetBalance => {
                let address = args.address(0)?;
                let asset = args.asset(1)?;
                let balance = balances::balance_of(ctx, &address, &asset)?;
                Ok(Value::Integer(i128::from(balance)))
            }
            Operation::GetLoan => {
                let kind = args.loan_kind(0)?;
                let id = args.loan_id(1)?;
                Ok(Value::Bytes(
                    LoanRegistry::get_loan(ctx, kind, &id)
                        .map(|loan| LoanCodec::encode(&loan))
                        .unwrap_or_default(),
                ))
            }
            Operation::CreateLoanOffer | Operation::CreateLoanDemand => {
                require_active(read_state(ctx)?)?;
                let kind = if args.operation == Operation::CreateLoanOffer {
                    LoanKind::Offer
                } else {
                    LoanKind::Demand
                };
                let address = args.address(0)?;
                let amount = args.amount(1)?;
                let interest = InterestRate::from_bytes(args.bytes(2));
                let duration = args.height(3)?;
                let id = registry.create(
                    ctx, runtime, height, kind, address, amount, interest, duration,
                )?;
                Ok(Value::Bytes(id.as_bytes().to_vec()))
            }
            Operation::FillOfferLoan | Operation::FillDemandLoan => {
                require_active(read_state(ctx)?)?;
                let kind = if args.operation == Operation::FillOfferLoan {
                    LoanKind::Offer
                } else {
                    LoanKind::Demand
                };
                let counterparty = args.address(0)?;
                let id = args.loan_id(1)?;
                registry.fill(ctx, runtime, height, kind, counterparty, id)?;
                Ok(Value::Bool(true))
            }
            Operation::ClaimClosingLoan => {
                require_active(read_state(ctx)?)?;
                let sender = args.address(0)?;
                registry.claim(ctx, runtime, height, sender)?;
                Ok(Value::Bool(true))
            }
            Operation::CancelLoanOffer | Operation::CancelLoanDemand => {
                require_active(read_state(ctx)?)?;
                let kind = if args.operation == Operation::CancelLoanOffer {
                    LoanKind::Offer
                } else {
                    LoanKind::Demand
                };
                let id = args.loan_id(0)?;
                registry.cancel(ctx, runtime, kind, id)?;
                Ok(Value::Bool(true))
            }
            Operation::Deposit => {
                let address = args.address(0)?;
                self.deposit(ctx, runtime, address)?;
                Ok(Value::Bool(true))
            }
            Operation::RequestWithdrawal => {
                let address = args.address(0)?;
                self.request_withdrawal(ctx, runtime, address)?;
                Ok(Value::Bool(true))
            }
            Operation::SettleWithdrawal => {
                self.settle_withdrawal(ctx, runtime)?;
                Ok(Value::Bool(true))
            }
            Operation::Suspend => {
                self.transition(ctx, runtime, ContractState::Active, ContractState::Inactive)?;
                Ok(Value::Bool(true))
            }
            Operation::Continue => {
                self.transition(ctx, runtime, ContractState::Inactive, ContractState::Active)?;
                Ok(Value::Bool(true))
            }
            Operation::SetFee => {
                require_initialized(read_state(ctx)?)?;
                self.access.require_admin(runtime)?;
                fee::set_fee(ctx, args.integer(0)?)?;
                Ok(Value::Bool(true))
            }
            Operation::SetFeeAddress => {
                require_initialized(read_state(ctx)?)?;
                let address = args.address(0)?;
                fee::set_fee_address(ctx, &self.access, runtime, address)?;
                Ok(Value::Bool(true))
            }
        }
    }

    // ───────────────────────── Lifecycle ─────────────────────────

    /// One-time bootstrap: fee policy, then `Initial → Active`.
    pub fn initialize<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        runtime: &Runtime<'_>,
        rate: i128,
        fee_address: Address,
    ) -> Result<(), ContractError> {
        let state = read_state(ctx)?;
        if state != ContractState::Initial {
            return Err(ContractError::InvalidState { actual: state });
        }
        self.access.require_admin(runtime)?;
        let rate = fee::set_fee(ctx, rate)?;
        fee::set_fee_address(ctx, &self.access, runtime, fee_address)?;
        write_state(ctx, ContractState::Active);
        info!(%rate, %fee_address, "Contract initialized");
        Ok(())
    }

    fn transition<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        runtime: &Runtime<'_>,
        from: ContractState,
        to: ContractState,
    ) -> Result<(), ContractError> {
        let state = read_state(ctx)?;
        if state != from {
            return Err(ContractError::InvalidState { actual: state });
        }
        self.access.require_admin(runtime)?;
        write_state(ctx, to);
        info!(%from, %to, "Contract state changed");
        Ok(())
    }

    // ───────────────────────── Balances ─────────────────────────

    /// Credit the invocation's contract-bound outputs to `address`.
    pub fn deposit<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        runtime: &Runtime<'_>,
        address: Address,
    ) -> Result<(), ContractError> {
        require_active(read_state(ctx)?)?;
        require_witness(runtime, &address)?;

        let mut received: BTreeMap<AssetId, Amount> = BTreeMap::new();
        for output in &runtime.container.outputs {
            if output.script_hash != self.config.contract_hash || output.value == 0 {
                continue;
            }
            let total = received.entry(output.asset_id).or_insert(0);
            *total = total.checked_add(output.value).ok_or(ContractError::Overflow)?;
        }
        if received.is_empty() {
            return Err(ContractError::NothingToDeposit);
        }

        for (asset, amount) in received {
            balances::credit(ctx, &address, &asset, amount)?;
            debug!(%address, %asset, amount, "Deposit credited");
            ctx.notify(ContractEvent::Deposited(Deposited {
                address,
                asset,
                amount,
            }));
        }
        Ok(())
    }

    /// Open `address`'s withdrawal window at the current height.
    pub fn request_withdrawal<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        runtime: &Runtime<'_>,
        address: Address,
    ) -> Result<(), ContractError> {
        require_active(read_state(ctx)?)?;
        require_witness(runtime, &address)?;
        if let Some(since) = balances::withdrawal_window(ctx, &address)? {
            self.reconcile_window(ctx, runtime.ledger, &address, since)?;
        }
        let window_start = runtime.height();
        balances::open_withdrawal_window(ctx, &address, window_start)?;
        ctx.notify(ContractEvent::WithdrawalRequested(WithdrawalRequested {
            address,
            window_start,
        }));
        Ok(())
    }

    /// Close a window that can no longer admit a withdrawal, debiting any
    /// withdrawal the chain recorded in it without a settlement. A window
    /// that can still admit one stays open.
    fn reconcile_window<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        ledger: &dyn Ledger,
        holder: &Address,
        since: Height,
    ) -> Result<(), ContractError> {
        let still_open = || ContractError::WithdrawalWindowOpen {
            address: holder.to_string(),
            since,
        };
        let ReplayGuard::HistoryScan { max_span } = self.config.replay_guard else {
            return Err(still_open());
        };

        // last height at which the verifier admits from this window
        let last = since.saturating_add(max_span);
        let current = ledger.current_height();
        let end = current.min(last.saturating_add(1));
        let recorded = WithdrawalVerifier::new(&self.config).recorded_withdrawals(
            ledger,
            holder,
            since..end,
        )?;
        if recorded.is_empty() && current <= last {
            return Err(still_open());
        }

        for (height, claim) in recorded {
            let mut withdrawn = Vec::with_capacity(claim.outgoing.len());
            for (asset, requested) in &claim.outgoing {
                let available = balances::balance_of(ctx, holder, asset)?;
                let amount = Amount::try_from(*requested)
                    .unwrap_or(Amount::MAX)
                    .min(available);
                if u128::from(amount) < *requested {
                    warn!(%holder, %asset, requested, available, "Recorded withdrawal exceeds balance");
                }
                balances::debit(ctx, holder, asset, amount)?;
                withdrawn.push((*asset, amount));
            }
            info!(%holder, since, height, "Unsettled withdrawal reconciled");
            ctx.notify(ContractEvent::WithdrawalSettled(WithdrawalSettled {
                address: *holder,
                window_start: since,
                withdrawn,
            }));
        }
        balances::close_withdrawal_window(ctx, holder);
        Ok(())
    }

    /// Apply the withdrawal carried by the invocation: debit the outgoing
    /// amounts and close the destination's window.
    pub fn settle_withdrawal<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        runtime: &Runtime<'_>,
    ) -> Result<(), ContractError> {
        require_active(read_state(ctx)?)?;
        let claim = WithdrawalVerifier::new(&self.config).claim(runtime.container)?;
        let destination = claim.destination;
        require_witness(runtime, &destination)?;
        let window_start = balances::withdrawal_window(ctx, &destination)?.ok_or_else(|| {
            ContractError::NoWithdrawalWindow {
                address: destination.to_string(),
            }
        })?;

        let mut withdrawn = Vec::with_capacity(claim.outgoing.len());
        for (asset, requested) in &claim.outgoing {
            let amount = Amount::try_from(*requested).map_err(|_| ContractError::Overflow)?;
            balances::ensure_available(ctx, &destination, asset, amount)?;
            withdrawn.push((*asset, amount));
        }
        for (asset, amount) in &withdrawn {
            balances::debit(ctx, &destination, asset, *amount)?;
        }
        balances::close_withdrawal_window(ctx, &destination);

        info!(%destination, window_start, "Withdrawal settled");
        ctx.notify(ContractEvent::WithdrawalSettled(WithdrawalSettled {
            address: destination,
            window_start,
            withdrawn,
        }));
        Ok(())
    }
}
