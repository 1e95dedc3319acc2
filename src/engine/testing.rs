//! 测试用的内存账本、聚合器与签名器。所有调用写入共享事件日志，便于断言顺序。

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::api::{
    AggregatorError, ExecuteSwapRequest, ExecuteSwapResponse, QuoteRequest, QuoteResponse,
    SwapAggregator,
};
use crate::ledger::{
    AssetInfo, Ledger, LedgerError, NATIVE_ASSET_ID, NetworkParams, PendingTransaction,
    SubmitReceipt,
};
use crate::txn::codec::{decode_signed_transaction, encode_signed_transaction};
use crate::txn::{
    Address, DecodedTransaction, SignerError, TransactionSigner, TxType, field,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Quote,
    Bundle,
    Holdings,
    Params,
    AssetInfo(u64),
    /// 提交的每笔交易类型，按组内顺序。
    Submit(Vec<TxType>),
    Pending(String),
    Signed { tx_type: TxType, grouped: bool },
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().expect("event log").push(event);
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.0.lock().expect("event log").clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.snapshot().iter().filter(|event| predicate(event)).count()
    }

    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.snapshot().iter().position(predicate)
    }

    pub fn submissions(&self) -> Vec<Vec<TxType>> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                Event::Submit(types) => Some(types),
                _ => None,
            })
            .collect()
    }
}

pub fn test_params() -> NetworkParams {
    NetworkParams {
        fee: 0,
        min_fee: 1_000,
        first_valid: 40_000,
        last_valid: 41_000,
        genesis_id: "testnet-v1.0".into(),
        genesis_hash: vec![4; 32],
    }
}

/// 节点对待确认查询的行为。
#[derive(Debug, Clone)]
pub enum ConfirmBehavior {
    ConfirmAt(u64),
    /// 始终 404，直到窗口耗尽。
    NeverSeen,
    PoolError(String),
}

struct LedgerState {
    holdings: BTreeSet<u64>,
    decimals: HashMap<u64, u32>,
    round: u64,
    confirm: ConfirmBehavior,
    submit_overrides: VecDeque<Result<Value, LedgerError>>,
    submitted: Vec<Vec<DecodedTransaction>>,
}

pub struct MockLedger {
    events: EventLog,
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            state: Mutex::new(LedgerState {
                holdings: BTreeSet::new(),
                decimals: HashMap::new(),
                round: test_params().first_valid,
                confirm: ConfirmBehavior::ConfirmAt(40_002),
                submit_overrides: VecDeque::new(),
                submitted: Vec::new(),
            }),
        }
    }

    pub fn with_holding(self, asset_id: u64) -> Self {
        self.state.lock().expect("ledger").holdings.insert(asset_id);
        self
    }

    pub fn with_decimals(self, asset_id: u64, decimals: u32) -> Self {
        self.state
            .lock()
            .expect("ledger")
            .decimals
            .insert(asset_id, decimals);
        self
    }

    pub fn with_confirm(self, confirm: ConfirmBehavior) -> Self {
        self.state.lock().expect("ledger").confirm = confirm;
        self
    }

    /// 下一次提交使用给定的原始响应，而不是默认的 `{"txId": ..}`。
    pub fn with_submit_response(self, response: Result<Value, LedgerError>) -> Self {
        self.state
            .lock()
            .expect("ledger")
            .submit_overrides
            .push_back(response);
        self
    }

    pub fn submitted(&self) -> Vec<Vec<DecodedTransaction>> {
        self.state.lock().expect("ledger").submitted.clone()
    }

    pub fn round(&self) -> u64 {
        self.state.lock().expect("ledger").round
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn account_assets(&self, _address: &Address) -> Result<BTreeSet<u64>, LedgerError> {
        self.events.push(Event::Holdings);
        Ok(self.state.lock().expect("ledger").holdings.clone())
    }

    async fn suggested_params(&self) -> Result<NetworkParams, LedgerError> {
        self.events.push(Event::Params);
        Ok(test_params())
    }

    async fn asset_info(&self, asset_id: u64) -> Result<AssetInfo, LedgerError> {
        self.events.push(Event::AssetInfo(asset_id));
        if asset_id == NATIVE_ASSET_ID {
            return Ok(AssetInfo::native());
        }
        let decimals = self
            .state
            .lock()
            .expect("ledger")
            .decimals
            .get(&asset_id)
            .copied()
            .ok_or_else(|| LedgerError::ApiStatus {
                endpoint: format!("/v2/assets/{asset_id}"),
                status: StatusCode::NOT_FOUND,
                body: "asset does not exist".into(),
            })?;
        Ok(AssetInfo {
            asset_id,
            decimals,
            name: None,
            unit_name: None,
        })
    }

    async fn submit(&self, signed: &[Vec<u8>]) -> Result<SubmitReceipt, LedgerError> {
        let txns = signed
            .iter()
            .map(|blob| decode_signed_transaction(blob))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| LedgerError::Schema(err.to_string()))?;
        self.events
            .push(Event::Submit(txns.iter().map(DecodedTransaction::tx_type).collect()));

        let mut state = self.state.lock().expect("ledger");
        if let Some(response) = state.submit_overrides.pop_front() {
            state.submitted.push(txns);
            return response.map(SubmitReceipt::new);
        }
        for txn in &txns {
            let is_opt_in = txn.tx_type() == TxType::AssetTransfer
                && txn.get_u64(field::ASSET_AMOUNT).is_none()
                && txn.get_bytes(field::SENDER) == txn.get_bytes(field::ASSET_RECEIVER);
            if let (true, Some(asset_id)) = (is_opt_in, txn.get_u64(field::ASSET_ID)) {
                state.holdings.insert(asset_id);
            }
        }
        let tx_id = txns
            .first()
            .map(DecodedTransaction::id)
            .transpose()
            .map_err(|err| LedgerError::Schema(err.to_string()))?
            .unwrap_or_default();
        state.submitted.push(txns);
        Ok(SubmitReceipt::new(json!({ "txId": tx_id })))
    }

    async fn last_round(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().expect("ledger").round)
    }

    async fn pending_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<PendingTransaction>, LedgerError> {
        self.events.push(Event::Pending(tx_id.to_string()));
        let confirm = self.state.lock().expect("ledger").confirm.clone();
        let value = match confirm {
            ConfirmBehavior::ConfirmAt(round) => json!({ "confirmed-round": round, "pool-error": "" }),
            ConfirmBehavior::NeverSeen => return Ok(None),
            ConfirmBehavior::PoolError(reason) => json!({ "pool-error": reason }),
        };
        PendingTransaction::try_from_value(value)
            .map(Some)
            .map_err(|err| LedgerError::Schema(err.to_string()))
    }

    async fn wait_for_block_after(&self, round: u64) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().expect("ledger");
        state.round = state.round.max(round + 1);
        Ok(state.round)
    }
}

pub struct MockAggregator {
    events: EventLog,
    quote: Value,
    bundle: Value,
    quote_requests: Mutex<Vec<QuoteRequest>>,
    bundle_requests: Mutex<Vec<ExecuteSwapRequest>>,
}

impl MockAggregator {
    pub fn new(events: EventLog, quote: Value, bundle: Value) -> Self {
        Self {
            events,
            quote,
            bundle,
            quote_requests: Mutex::new(Vec::new()),
            bundle_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.quote_requests.lock().expect("quote requests").clone()
    }

    pub fn bundle_requests(&self) -> Vec<ExecuteSwapRequest> {
        self.bundle_requests.lock().expect("bundle requests").clone()
    }
}

#[async_trait]
impl SwapAggregator for MockAggregator {
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AggregatorError> {
        self.events.push(Event::Quote);
        self.quote_requests
            .lock()
            .expect("quote requests")
            .push(request.clone());
        Ok(QuoteResponse::try_from_value(self.quote.clone())?)
    }

    async fn fetch_execute_swap_txns(
        &self,
        request: &ExecuteSwapRequest,
    ) -> Result<ExecuteSwapResponse, AggregatorError> {
        self.events.push(Event::Bundle);
        self.bundle_requests
            .lock()
            .expect("bundle requests")
            .push(request.clone());
        ExecuteSwapResponse::try_from_value(self.bundle.clone()).map_err(AggregatorError::Schema)
    }
}

/// 以全零签名打包交易，只记录调用，不做真实签名。
pub struct RecordingSigner {
    address: Address,
    events: EventLog,
}

impl RecordingSigner {
    pub fn new(address: Address) -> Self {
        Self::with_events(address, EventLog::default())
    }

    pub fn with_events(address: Address, events: EventLog) -> Self {
        Self { address, events }
    }

    pub fn signed_count(&self) -> usize {
        self.events
            .count(|event| matches!(event, Event::Signed { .. }))
    }
}

#[async_trait]
impl TransactionSigner for RecordingSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, txn: &DecodedTransaction) -> Result<Vec<u8>, SignerError> {
        self.events.push(Event::Signed {
            tx_type: txn.tx_type(),
            grouped: txn.group().is_some(),
        });
        Ok(encode_signed_transaction(txn, &[0u8; 64])?)
    }
}

pub fn encode_unsigned(txn: &DecodedTransaction) -> String {
    BASE64_STANDARD.encode(txn.encode().expect("encode txn"))
}

/// 聚合器风格的路由交易：发送方为用户的支付与一笔应用调用。
pub fn user_payment(sender: &Address, amount: u64) -> DecodedTransaction {
    let mut txn = DecodedTransaction::new(TxType::Payment);
    txn.set_address(field::SENDER, sender);
    txn.set_address(field::RECEIVER, &Address::new([0xAA; 32]));
    txn.set_u64(field::AMOUNT, amount);
    txn.set_u64(field::FEE, 1_000);
    txn.set_validity(1, 2);
    txn
}

pub fn app_call(sender: &Address, app_id: u64) -> DecodedTransaction {
    let mut txn = DecodedTransaction::new(TxType::ApplicationCall);
    txn.set_address(field::SENDER, sender);
    txn.set_u64("apid", app_id);
    txn.set_u64(field::FEE, 2_000);
    txn.set_validity(1, 2);
    txn
}

/// 聚合器预签名的逻辑签名交易 `{lsig, txn}`，内嵌交易带着旧的有效期。
pub fn logic_sig_blob(txn: &DecodedTransaction) -> Vec<u8> {
    let lsig = rmpv::Value::Map(vec![(
        rmpv::Value::from("l"),
        rmpv::Value::Binary(vec![1, 32, 1, 1]),
    )]);
    let value = rmpv::Value::Map(vec![
        (rmpv::Value::from(field::LOGIC_SIG), lsig),
        (rmpv::Value::from(field::TXN), txn.to_value()),
    ]);
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &value).expect("encode lsig");
    buf
}

/// 以 `{"0": b0, "1": b1, ..}` 形式携带字节。
pub fn indexed_map(bytes: &[u8]) -> Value {
    Value::Object(
        bytes
            .iter()
            .enumerate()
            .map(|(position, byte)| (position.to_string(), json!(byte)))
            .collect(),
    )
}

pub fn quote_fixture(quote: u64) -> Value {
    json!({
        "quote": quote.to_string(),
        "txnPayload": { "iv": "abc", "data": "route" },
        "userPriceImpact": 0.12,
        "usdIn": 1.0,
        "usdOut": 0.99
    })
}
