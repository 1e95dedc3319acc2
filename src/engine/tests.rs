use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Value, json};

use super::testing::{
    ConfirmBehavior, Event, EventLog, MockAggregator, MockLedger, RecordingSigner, app_call,
    encode_unsigned, indexed_map, logic_sig_blob, quote_fixture, user_payment,
};
use super::*;
use crate::api::FIXED_INPUT;
use crate::txn::{Address, TxType, field};

const USDC: u64 = 31_566_704;
const POOL_APP: u64 = 1_002_541_853;

fn user() -> Address {
    Address::new([1; 32])
}

fn pool_account() -> Address {
    Address::new([0x55; 32])
}

fn fee_recipient() -> Address {
    Address::new([9; 32])
}

fn settings(fee: FeePolicy) -> PipelineSettings {
    PipelineSettings {
        quote: QuoteSettings {
            chain: "testnet".into(),
            algod_uri: "https://testnet-api.algonode.cloud".into(),
            algod_token: String::new(),
            algod_port: "443".into(),
            api_key: "test-key".into(),
            max_group_size: 13,
            atomic_only: false,
            referrer: String::new(),
        },
        fee,
        swap_validity_rounds: 500,
        confirmation_rounds: 4,
        rebind_logic_sigs: true,
    }
}

/// 用户支付 + 聚合器以逻辑签名预签的应用调用，blob 以数字键 map 下发。
fn two_leg_bundle() -> Value {
    let pool_call = app_call(&pool_account(), POOL_APP);
    json!({
        "txns": [
            { "data": encode_unsigned(&user_payment(&user(), 1_000_000)), "logicSigBlob": false },
            {
                "data": encode_unsigned(&pool_call),
                "logicSigBlob": indexed_map(&logic_sig_blob(&pool_call))
            }
        ]
    })
}

fn request() -> SwapRequest {
    SwapRequest {
        from_asset_id: 0,
        to_asset_id: USDC,
        amount: 1_000_000,
        slippage_percent: Decimal::ONE,
        sender: user(),
    }
}

struct Harness {
    events: EventLog,
    ledger: Arc<MockLedger>,
    aggregator: Arc<MockAggregator>,
    pipeline: SwapPipeline,
}

fn harness_with(
    configure: impl FnOnce(MockLedger) -> MockLedger,
    quote: Value,
    bundle: Value,
    fee: FeePolicy,
) -> Harness {
    let events = EventLog::default();
    let ledger = Arc::new(configure(
        MockLedger::new(events.clone()).with_decimals(USDC, 6),
    ));
    let aggregator = Arc::new(MockAggregator::new(events.clone(), quote, bundle));
    let signer = Arc::new(RecordingSigner::with_events(user(), events.clone()));
    let pipeline = SwapPipeline::new(aggregator.clone(), ledger.clone(), signer, settings(fee));
    Harness {
        events,
        ledger,
        aggregator,
        pipeline,
    }
}

fn harness(configure: impl FnOnce(MockLedger) -> MockLedger) -> Harness {
    harness_with(
        configure,
        quote_fixture(2_500_000),
        two_leg_bundle(),
        FeePolicy::disabled(),
    )
}

fn is_submit(event: &Event) -> bool {
    matches!(event, Event::Submit(_))
}

#[tokio::test(flavor = "current_thread")]
async fn swap_with_held_asset_submits_one_group() {
    let h = harness(|ledger| ledger.with_holding(USDC));

    let outcome = h.pipeline.execute(&request()).await.expect("swap");

    assert_eq!(outcome.group_size, 2);
    assert_eq!(outcome.quoted_amount, 2_500_000);
    assert_eq!(outcome.confirmed_round, 40_002);
    assert!(outcome.opt_in_tx_id.is_none());
    assert!(outcome.fee_tx_id.is_none());
    assert_eq!(
        h.events.submissions(),
        vec![vec![TxType::Payment, TxType::ApplicationCall]]
    );

    let submitted = h.ledger.submitted();
    let group = &submitted[0];
    assert_eq!(outcome.transaction_id, group[0].id().expect("txid"));
    assert!(group.iter().all(|txn| txn.group() == Some(outcome.group_id)));

    let quote_requests = h.aggregator.quote_requests();
    let quote_request = &quote_requests[0];
    assert_eq!(quote_request.swap_type, FIXED_INPUT);
    assert_eq!(quote_request.amount, 1_000_000);
    assert_eq!(quote_request.to_asset_id, USDC);
    let bundle_requests = h.aggregator.bundle_requests();
    let bundle_request = &bundle_requests[0];
    assert_eq!(bundle_request.address, user().to_string());
    assert_eq!(bundle_request.slippage, Decimal::ONE);
    assert_eq!(bundle_request.txn_payload, json!({ "iv": "abc", "data": "route" }));
}

#[tokio::test(flavor = "current_thread")]
async fn decoded_legs_are_restamped_before_grouping() {
    let h = harness(|ledger| ledger.with_holding(USDC));
    h.pipeline.execute(&request()).await.expect("swap");

    let submitted = h.ledger.submitted();
    for txn in &submitted[0] {
        assert_eq!(txn.first_valid(), 40_000);
        assert_eq!(txn.last_valid(), 40_500);
        assert_eq!(txn.genesis_id(), Some("testnet-v1.0"));
    }
    assert_eq!(submitted[0][1].get_u64("apid"), Some(POOL_APP));
}

#[tokio::test(flavor = "current_thread")]
async fn presigned_indexed_map_is_submitted_as_bytes() {
    let bundle = json!({
        "txns": [
            { "data": encode_unsigned(&user_payment(&user(), 1_000_000)), "logicSigBlob": false },
            {
                "data": encode_unsigned(&app_call(&pool_account(), POOL_APP)),
                "logicSigBlob": { "0": 1, "1": 2, "2": 3 }
            }
        ]
    });
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        quote_fixture(2_500_000),
        bundle,
        FeePolicy::disabled(),
    );
    let simulated = h.pipeline.simulate(&request()).await.expect("simulate");
    assert_eq!(simulated.signed[1], vec![1, 2, 3]);
    assert_eq!(simulated.transaction_ids.len(), 2);
    assert!(!simulated.opt_in_required);
    assert_eq!(h.events.count(is_submit), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn held_asset_skips_opt_in() {
    let h = harness(|ledger| ledger.with_holding(USDC));
    let opted = h
        .pipeline
        .opt_in()
        .ensure_opted_in(&user(), USDC)
        .await
        .expect("opt-in");
    assert!(opted);
    assert_eq!(h.events.count(is_submit), 0);
    assert_eq!(h.events.count(|event| matches!(event, Event::Signed { .. })), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn native_asset_never_needs_opt_in() {
    let h = harness(|ledger| ledger);
    let status = h
        .pipeline
        .opt_in()
        .ensure_opted_in_detailed(0)
        .await
        .expect("opt-in");
    assert_eq!(status, OptInStatus::NotRequired);
    assert!(h.events.snapshot().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn opt_in_is_confirmed_before_group_is_signed() {
    let h = harness(|ledger| ledger);

    let outcome = h.pipeline.execute(&request()).await.expect("swap");

    assert_eq!(
        h.events.submissions(),
        vec![
            vec![TxType::AssetTransfer],
            vec![TxType::Payment, TxType::ApplicationCall],
        ]
    );
    let opt_in_confirmed = h
        .events
        .position(|event| matches!(event, Event::Pending(_)))
        .expect("opt-in confirmation poll");
    let first_group_signature = h
        .events
        .position(|event| matches!(event, Event::Signed { grouped: true, .. }))
        .expect("group signature");
    assert!(opt_in_confirmed < first_group_signature);

    let submitted = h.ledger.submitted();
    let opt_in = &submitted[0][0];
    assert_eq!(opt_in.get_u64(field::ASSET_ID), Some(USDC));
    assert_eq!(opt_in.get_u64(field::ASSET_AMOUNT), None);
    assert_eq!(outcome.opt_in_tx_id, Some(opt_in.id().expect("txid")));
}

#[tokio::test(flavor = "current_thread")]
async fn same_group_fee_is_appended_as_last_member() {
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        quote_fixture(2_500_000),
        two_leg_bundle(),
        FeePolicy::new(FeeMode::SameGroup, Some(fee_recipient()), Decimal::ONE),
    );

    let outcome = h.pipeline.execute(&request()).await.expect("swap");

    assert_eq!(outcome.group_size, 3);
    let submitted = h.ledger.submitted();
    let fee = &submitted[0][2];
    assert_eq!(fee.tx_type(), TxType::Payment);
    assert_eq!(fee.get_u64(field::AMOUNT), Some(10_000));
    assert_eq!(fee.get_bytes(field::RECEIVER), Some(&fee_recipient().as_bytes()[..]));
    assert_eq!(fee.group(), Some(outcome.group_id));
}

#[tokio::test(flavor = "current_thread")]
async fn standalone_fee_confirms_before_swap_group() {
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        quote_fixture(2_500_000),
        two_leg_bundle(),
        FeePolicy::new(FeeMode::Standalone, Some(fee_recipient()), Decimal::ONE),
    );

    let outcome = h.pipeline.execute(&request()).await.expect("swap");

    assert_eq!(
        h.events.submissions(),
        vec![
            vec![TxType::Payment],
            vec![TxType::Payment, TxType::ApplicationCall],
        ]
    );
    assert!(outcome.fee_tx_id.is_some());
    assert_eq!(outcome.group_size, 2);
}

#[tokio::test(flavor = "current_thread")]
async fn oversized_bundle_fails_before_any_side_effect() {
    let txns: Vec<Value> = (0..16)
        .map(|i| json!({ "data": encode_unsigned(&user_payment(&user(), 100 + i)), "logicSigBlob": false }))
        .collect();
    let h = harness_with(
        |ledger| ledger,
        quote_fixture(2_500_000),
        json!({ "txns": txns }),
        FeePolicy::new(FeeMode::SameGroup, Some(fee_recipient()), Decimal::ONE),
    );

    let err = h.pipeline.execute(&request()).await.expect_err("too large");

    assert!(matches!(err, SwapError::GroupTooLarge { size: 17, max: 16 }));
    assert_eq!(err.broadcast_state(), BroadcastState::NotBroadcast);
    assert_eq!(h.events.count(is_submit), 0);
    assert_eq!(h.events.count(|event| matches!(event, Event::Signed { .. })), 0);
    assert_eq!(h.events.count(|event| matches!(event, Event::Holdings)), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn blank_or_zero_amount_quotes_without_network() {
    let h = harness(|ledger| ledger);
    for amount in ["", "0", "  "] {
        let outcome = h.pipeline.quote(0, USDC, amount).await.expect("quote");
        assert!(matches!(outcome, QuoteOutcome::NoQuote));
        assert_eq!(outcome.buy_amount(), Decimal::ZERO);
    }
    assert!(h.events.snapshot().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn quote_is_normalized_with_destination_decimals() {
    let h = harness(|ledger| ledger);
    let outcome = h.pipeline.quote(0, USDC, "1000000").await.expect("quote");
    assert_eq!(outcome.buy_amount(), Decimal::new(25, 1));
    let quote = outcome.quote().expect("quoted");
    assert_eq!(quote.decimals, 6);
    assert_eq!(quote.price_impact_percent, Some(Decimal::new(12, 2)));
    assert_eq!(
        h.events.snapshot(),
        vec![Event::Quote, Event::AssetInfo(USDC)]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn zero_quote_is_unavailable() {
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        json!({ "quote": 0, "txnPayload": { "iv": "x" } }),
        two_leg_bundle(),
        FeePolicy::disabled(),
    );
    let err = h.pipeline.execute(&request()).await.expect_err("no quote");
    assert!(matches!(err, SwapError::QuoteUnavailable(_)));
    assert_eq!(h.events.count(|event| matches!(event, Event::Bundle)), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_route_payload_is_unavailable() {
    let h = harness_with(
        |ledger| ledger,
        json!({ "quote": "2500000" }),
        two_leg_bundle(),
        FeePolicy::disabled(),
    );
    let err = h.pipeline.quote(0, USDC, "1000000").await.expect_err("no payload");
    assert!(matches!(err, SwapError::QuoteUnavailable(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn transaction_id_falls_back_to_lowercase_field() {
    let h = harness(|ledger| {
        ledger
            .with_holding(USDC)
            .with_submit_response(Ok(json!({ "txid": "LOWERCASEID" })))
    });

    let outcome = h.pipeline.execute(&request()).await.expect("swap");

    assert_eq!(outcome.transaction_id, "LOWERCASEID");
    assert!(h
        .events
        .snapshot()
        .contains(&Event::Pending("LOWERCASEID".into())));
}

#[tokio::test(flavor = "current_thread")]
async fn missing_transaction_id_is_broadcast_but_unconfirmed() {
    let h = harness(|ledger| ledger.with_holding(USDC).with_submit_response(Ok(json!({}))));

    let err = h.pipeline.execute(&request()).await.expect_err("no txid");

    assert!(matches!(err, SwapError::MissingTransactionId));
    assert_eq!(err.broadcast_state(), BroadcastState::BroadcastUnconfirmed);
    assert_eq!(h.events.count(|event| matches!(event, Event::Pending(_))), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn unconfirmed_group_times_out_without_resubmission() {
    let h = harness(|ledger| {
        ledger
            .with_holding(USDC)
            .with_confirm(ConfirmBehavior::NeverSeen)
    });

    let err = h.pipeline.execute(&request()).await.expect_err("timeout");

    assert!(matches!(err, SwapError::NotConfirmed { rounds: 4, .. }));
    assert_eq!(err.broadcast_state(), BroadcastState::BroadcastUnconfirmed);
    assert_eq!(h.events.count(is_submit), 1);
    assert_eq!(h.events.count(|event| matches!(event, Event::Pending(_))), 4);
    assert_eq!(h.ledger.round(), 40_005);
}

#[tokio::test(flavor = "current_thread")]
async fn pool_error_is_reported_as_rejection() {
    let h = harness(|ledger| {
        ledger
            .with_holding(USDC)
            .with_confirm(ConfirmBehavior::PoolError("overspend".into()))
    });

    let err = h.pipeline.execute(&request()).await.expect_err("rejected");

    assert!(matches!(err, SwapError::TransactionRejected { ref reason, .. } if reason == "overspend"));
    assert_eq!(err.broadcast_state(), BroadcastState::BroadcastRejected);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_opt_in_aborts_swap() {
    let h = harness(|ledger| ledger.with_confirm(ConfirmBehavior::NeverSeen));

    let err = h.pipeline.execute(&request()).await.expect_err("opt-in");

    assert!(matches!(err, SwapError::OptInFailed { asset_id: USDC, .. }));
    assert_eq!(err.broadcast_state(), BroadcastState::NotBroadcast);
    assert_eq!(h.events.submissions(), vec![vec![TxType::AssetTransfer]]);
}

#[tokio::test(flavor = "current_thread")]
async fn unrecognized_blob_aborts_before_submission() {
    let bundle = json!({
        "txns": [
            { "data": encode_unsigned(&user_payment(&user(), 1_000_000)), "logicSigBlob": false },
            { "data": encode_unsigned(&app_call(&pool_account(), POOL_APP)), "logicSigBlob": { "sig": "??" } }
        ]
    });
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        quote_fixture(2_500_000),
        bundle,
        FeePolicy::disabled(),
    );

    let err = h.pipeline.execute(&request()).await.expect_err("bad blob");

    assert!(matches!(err, SwapError::UnrecognizedSignatureFormat { index: 1, .. }));
    assert_eq!(h.events.count(is_submit), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn undecodable_entry_aborts_before_submission() {
    let bundle = json!({
        "txns": [
            { "logicSigBlob": false },
            { "data": encode_unsigned(&app_call(&pool_account(), POOL_APP)), "logicSigBlob": "AQID" }
        ]
    });
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        quote_fixture(2_500_000),
        bundle,
        FeePolicy::disabled(),
    );

    let err = h.pipeline.execute(&request()).await.expect_err("decode");

    assert!(matches!(err, SwapError::Decode { index: 0, .. }));
    assert_eq!(h.events.count(is_submit), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn foreign_sender_request_is_rejected_up_front() {
    let h = harness(|ledger| ledger.with_holding(USDC));
    let request = SwapRequest {
        sender: Address::new([2; 32]),
        ..request()
    };
    let err = h.pipeline.execute(&request).await.expect_err("sender");
    assert!(matches!(err, SwapError::InvalidRequest(_)));
    assert!(h.events.snapshot().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn bad_blob_aborts_before_opt_in_or_standalone_fee() {
    let bundle = json!({
        "txns": [
            { "data": encode_unsigned(&user_payment(&user(), 1_000_000)), "logicSigBlob": false },
            { "data": encode_unsigned(&app_call(&pool_account(), POOL_APP)), "logicSigBlob": { "sig": "??" } }
        ]
    });
    let h = harness_with(
        |ledger| ledger,
        quote_fixture(2_500_000),
        bundle,
        FeePolicy::new(FeeMode::Standalone, Some(fee_recipient()), Decimal::ONE),
    );

    let err = h.pipeline.execute(&request()).await.expect_err("bad blob");

    assert!(matches!(
        err,
        SwapError::UnrecognizedSignatureFormat { index: 1, kind: "unrecognized" }
    ));
    assert_eq!(err.broadcast_state(), BroadcastState::NotBroadcast);
    assert_eq!(h.events.count(is_submit), 0);
    assert_eq!(h.events.count(|event| matches!(event, Event::Holdings)), 0);
    assert_eq!(h.events.count(|event| matches!(event, Event::Signed { .. })), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn foreign_route_leg_aborts_before_standalone_fee() {
    let bundle = json!({
        "txns": [
            {
                "data": encode_unsigned(&user_payment(&Address::new([2; 32]), 1_000_000)),
                "logicSigBlob": false
            },
            { "data": encode_unsigned(&app_call(&pool_account(), POOL_APP)), "logicSigBlob": "AQID" }
        ]
    });
    let h = harness_with(
        |ledger| ledger.with_holding(USDC),
        quote_fixture(2_500_000),
        bundle,
        FeePolicy::new(FeeMode::Standalone, Some(fee_recipient()), Decimal::ONE),
    );

    let err = h.pipeline.execute(&request()).await.expect_err("foreign leg");

    assert!(matches!(err, SwapError::SignerMismatch { index: 0, .. }));
    assert_eq!(h.events.count(is_submit), 0);
    assert_eq!(h.events.count(|event| matches!(event, Event::Signed { .. })), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn unconfirmed_standalone_fee_is_reported_as_broadcast() {
    let h = harness_with(
        |ledger| {
            ledger
                .with_holding(USDC)
                .with_confirm(ConfirmBehavior::NeverSeen)
        },
        quote_fixture(2_500_000),
        two_leg_bundle(),
        FeePolicy::new(FeeMode::Standalone, Some(fee_recipient()), Decimal::ONE),
    );

    let err = h.pipeline.execute(&request()).await.expect_err("fee unconfirmed");

    match &err {
        SwapError::FeeTransferFailed(inner) => {
            assert!(matches!(**inner, SwapError::NotConfirmed { rounds: 4, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.broadcast_state(), BroadcastState::BroadcastUnconfirmed);
    assert_eq!(h.events.submissions(), vec![vec![TxType::Payment]]);
    assert_eq!(
        h.events
            .count(|event| matches!(event, Event::Signed { grouped: true, .. })),
        0
    );
}
