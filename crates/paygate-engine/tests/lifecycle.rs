//! End-to-end lifecycle scenarios against the in-memory wiring:
//! MemStore, StubBank, manual clock, recording metrics and webhooks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use paygate_auth::{compute_token, AuthConfig, Authenticator, SignedFields};
use paygate_bank::StubBank;
use paygate_cache::ResponseCache;
use paygate_engine::cancel::{CancelCommand, CancelOperation};
use paygate_engine::check::CheckCommand;
use paygate_engine::confirm::ConfirmCommand;
use paygate_engine::form::{RenderOutcome, SubmitCommand};
use paygate_engine::init::{InitCommand, InitItem};
use paygate_engine::metrics::names;
use paygate_engine::team_ops::RegisterCommand;
use paygate_engine::{CardForm, EngineConfig, PaymentEngine, RecordingSender, RecordingSink};
use paygate_store::{MemStore, Store};
use paygate_types::{
    GatewayError, ManualClock, OpFamily, PaymentStatus, TransactionStatus, TransactionType,
};

const VISA: &str = "4111 1111 1111 1111";

struct Harness {
    engine: Arc<PaymentEngine>,
    store: Arc<MemStore>,
    bank: Arc<StubBank>,
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
    webhooks: Arc<RecordingSender>,
}

fn harness() -> Harness {
    let store = Arc::new(MemStore::new());
    let bank = Arc::new(StubBank::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = Arc::new(ResponseCache::new(clock.clone()));
    let sink = Arc::new(RecordingSink::new());
    let webhooks = Arc::new(RecordingSender::new());

    let authenticator = Arc::new(Authenticator::new(
        store.clone(),
        cache.clone(),
        clock.clone(),
        AuthConfig::default(),
    ));
    let engine = Arc::new(PaymentEngine::new(
        store.clone(),
        bank.clone(),
        cache,
        authenticator,
        sink.clone(),
        webhooks.clone(),
        clock.clone(),
        EngineConfig::default(),
    ));

    Harness {
        engine,
        store,
        bank,
        clock,
        sink,
        webhooks,
    }
}

async fn register(h: &Harness, slug: &str, password: &str) {
    h.engine
        .register_team(RegisterCommand {
            slug: slug.into(),
            name: slug.to_uppercase(),
            password: password.into(),
            supported_currencies: vec!["RUB".into()],
            ..Default::default()
        })
        .await
        .unwrap();
}

fn init_cmd(slug: &str, password: &str, amount: i64, order_id: &str) -> InitCommand {
    let fields = SignedFields::init(amount, "RUB", order_id, slug);
    InitCommand {
        team_slug: slug.into(),
        token: Some(compute_token(&fields, password)),
        amount,
        currency: "RUB".into(),
        order_id: order_id.into(),
        ..Default::default()
    }
}

fn confirm_cmd(slug: &str, password: &str, payment_id: &str) -> ConfirmCommand {
    let fields = SignedFields::payment_op(slug, payment_id, None);
    ConfirmCommand {
        team_slug: slug.into(),
        token: Some(compute_token(&fields, password)),
        payment_id: payment_id.into(),
        ..Default::default()
    }
}

fn cancel_cmd(
    slug: &str,
    password: &str,
    payment_id: &str,
    external_request_id: Option<&str>,
) -> CancelCommand {
    let fields = SignedFields::payment_op(slug, payment_id, None);
    let mut data = HashMap::new();
    if let Some(rid) = external_request_id {
        data.insert("externalRequestId".to_string(), rid.to_string());
    }
    CancelCommand {
        team_slug: slug.into(),
        token: Some(compute_token(&fields, password)),
        payment_id: payment_id.into(),
        data,
        ..Default::default()
    }
}

fn check_cmd(slug: &str, password: &str, payment_id: &str) -> CheckCommand {
    let fields = SignedFields::payment_op(slug, payment_id, None);
    CheckCommand {
        team_slug: slug.into(),
        token: Some(compute_token(&fields, password)),
        payment_id: Some(payment_id.into()),
        ..Default::default()
    }
}

/// init -> form render -> card submit, leaving the payment AUTHORIZED.
async fn authorized_payment(h: &Harness, slug: &str, password: &str, order_id: &str) -> String {
    let init = h
        .engine
        .init(init_cmd(slug, password, 150_000, order_id))
        .await
        .unwrap();
    assert_eq!(init.status, PaymentStatus::New);

    match h.engine.render_form(&init.payment_id).await.unwrap() {
        RenderOutcome::Form(view) => assert_eq!(view.amount, 150_000),
        RenderOutcome::Status(view) => panic!("expected form, got status {:?}", view.status),
    }

    let submit = h
        .engine
        .submit_form(SubmitCommand {
            payment_id: init.payment_id.clone(),
            card: CardForm {
                card_number: VISA.into(),
                exp_date: "12/29".into(),
                cvv: "123".into(),
                holder: Some("J DOE".into()),
            },
        })
        .await
        .unwrap();
    assert_eq!(submit.status, PaymentStatus::Authorized);
    init.payment_id
}

#[tokio::test]
async fn happy_path_init_form_auth_confirm_check() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;

    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-1").await;

    let confirm = h
        .engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap();
    assert_eq!(confirm.status, PaymentStatus::Confirmed);
    assert_eq!(confirm.amount, 150_000);

    let mut check = check_cmd("acme", "s3cret!", &payment_id);
    check.include_transactions = true;
    check.include_card = true;
    let outcome = h.engine.check(check).await.unwrap();
    assert_eq!(outcome.payments.len(), 1);
    let info = &outcome.payments[0];
    assert_eq!(info.status, PaymentStatus::Confirmed);
    assert_eq!(info.amount, 150_000);
    assert_eq!(info.card_mask.as_deref(), Some("411111******1111"));

    let txs = info.transactions.as_ref().unwrap();
    assert!(txs
        .iter()
        .any(|t| t.tx_type == TransactionType::Authorize
            && t.status == TransactionStatus::Approved));
    assert!(txs
        .iter()
        .any(|t| t.tx_type == TransactionType::Capture
            && t.status == TransactionStatus::Approved));

    assert_eq!(h.bank.authorize_calls(), 1);
    assert_eq!(h.bank.capture_calls(), 1);
    assert_eq!(
        h.sink
            .counter_value(names::INIT_REQUESTS, &[("result", "success".into())]),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirms_have_exactly_one_winner() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-race").await;

    let cmd = confirm_cmd("acme", "s3cret!", &payment_id);
    let (e1, e2) = (h.engine.clone(), h.engine.clone());
    let (c1, c2) = (cmd.clone(), cmd.clone());
    let a = tokio::spawn(async move { e1.confirm(c1).await });
    let b = tokio::spawn(async move { e2.confirm(c2).await });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one confirm must win");
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    match loser {
        Err(GatewayError::Conflict(_)) | Err(GatewayError::InvalidState(_)) => {}
        other => panic!("loser must see conflict or invalid_state, got {other:?}"),
    }

    // The capture hit the bank exactly once.
    assert_eq!(h.bank.capture_calls(), 1);
    let stored = h
        .store
        .payment_by_public_id_any_team(&payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Confirmed);
}

#[tokio::test]
async fn idempotent_cancel_replays_byte_identical_response() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-idem").await;
    h.engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap();

    let cmd = cancel_cmd("acme", "s3cret!", &payment_id, Some("r1"));
    let first = h.engine.cancel(cmd.clone()).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Refunded);
    assert_eq!(first.operation, CancelOperation::FullRefund);
    assert_eq!(h.bank.refund_calls(), 1);

    let second = h.engine.cancel(cmd).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap(),
        "replayed response must be byte-identical"
    );
    assert_eq!(h.bank.refund_calls(), 1, "no additional refund call");
    assert_eq!(
        h.sink
            .counter_value(names::IDEMPOTENT_HITS, &[("scope", "cancel".into())]),
        1
    );
}

#[tokio::test]
async fn cancelling_a_refunded_payment_is_3409() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-z").await;
    h.engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap();
    h.engine
        .cancel(cancel_cmd("acme", "s3cret!", &payment_id, None))
        .await
        .unwrap();

    let err = h
        .engine
        .cancel(cancel_cmd("acme", "s3cret!", &payment_id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidState(_)));
    assert_eq!(err.wire_code(OpFamily::Cancel), "3409");
    assert!(err.to_string().contains("cannot be cancelled"));
}

#[tokio::test]
async fn tampered_init_token_is_1001() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;

    // Token computed over one amount, request carries another.
    let fields = SignedFields::init(150_000, "RUB", "order-1", "acme");
    let mut cmd = init_cmd("acme", "s3cret!", 999_999, "order-1");
    cmd.token = Some(compute_token(&fields, "s3cret!"));

    let err = h.engine.init(cmd).await.unwrap_err();
    assert!(matches!(err, GatewayError::Auth(_)));
    assert_eq!(err.wire_code(OpFamily::InitCheck), "1001");
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn expiry_sweep_moves_new_payments_to_expired() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;

    let mut cmd = init_cmd("acme", "s3cret!", 150_000, "order-exp");
    cmd.payment_expiry_minutes = Some(5);
    let init = h.engine.init(cmd).await.unwrap();

    h.clock.advance(Duration::minutes(6));
    let stats = h.engine.run_expiry_sweep().await.unwrap();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.deadline_expired, 0);

    let outcome = h
        .engine
        .check(check_cmd("acme", "s3cret!", &init.payment_id))
        .await
        .unwrap();
    assert_eq!(outcome.payments[0].status, PaymentStatus::Expired);

    // Terminal responses get the long TTL: a second check 31s later is
    // still served from cache even though the active TTL is 30s.
    h.clock.advance(Duration::seconds(31));
    h.engine
        .check(check_cmd("acme", "s3cret!", &init.payment_id))
        .await
        .unwrap();
    assert_eq!(
        h.sink.counter_value(
            names::CHECK_REQUESTS,
            &[("result", "success".into()), ("cache", "hit".into())]
        ),
        1
    );

    // Sweep is idempotent.
    let again = h.engine.run_expiry_sweep().await.unwrap();
    assert_eq!(again.scanned, 0);
}

#[tokio::test]
async fn authorized_payment_expires_to_deadline_expired() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let mut cmd = init_cmd("acme", "s3cret!", 150_000, "order-dl");
    cmd.payment_expiry_minutes = Some(5);
    let init = h.engine.init(cmd).await.unwrap();
    h.engine.render_form(&init.payment_id).await.unwrap();
    h.engine
        .submit_form(SubmitCommand {
            payment_id: init.payment_id.clone(),
            card: CardForm {
                card_number: VISA.into(),
                exp_date: "12/29".into(),
                cvv: "123".into(),
                holder: None,
            },
        })
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(6));
    let stats = h.engine.run_expiry_sweep().await.unwrap();
    assert_eq!(stats.deadline_expired, 1);

    let stored = h
        .store
        .payment_by_public_id_any_team(&init.payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::DeadlineExpired);
}

#[tokio::test]
async fn team_limit_boundaries() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    h.engine
        .admin_update_limits(
            "acme",
            paygate_types::TeamLimits {
                min_amount: Some(1_000),
                max_amount: Some(10_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(h
        .engine
        .init(init_cmd("acme", "s3cret!", 1_000, "o-min"))
        .await
        .is_ok());
    assert!(h
        .engine
        .init(init_cmd("acme", "s3cret!", 10_000, "o-max"))
        .await
        .is_ok());

    let low = h
        .engine
        .init(init_cmd("acme", "s3cret!", 999, "o-low"))
        .await
        .unwrap_err();
    assert!(matches!(low, GatewayError::LimitExceeded(_)));
    assert_eq!(low.http_status(), 422);

    let high = h
        .engine
        .init(init_cmd("acme", "s3cret!", 10_001, "o-high"))
        .await
        .unwrap_err();
    assert!(matches!(high, GatewayError::LimitExceeded(_)));
}

#[tokio::test]
async fn payment_expiry_boundaries() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;

    for (minutes, ok) in [(5, true), (43_200, true), (4, false), (43_201, false)] {
        let mut cmd = init_cmd("acme", "s3cret!", 150_000, &format!("o-exp-{minutes}"));
        cmd.payment_expiry_minutes = Some(minutes);
        let result = h.engine.init(cmd).await;
        assert_eq!(result.is_ok(), ok, "PaymentExpiry={minutes}");
        if !ok {
            assert!(matches!(result.unwrap_err(), GatewayError::Validation(_)));
        }
    }
}

#[tokio::test]
async fn items_must_sum_to_amount() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;

    let mut cmd = init_cmd("acme", "s3cret!", 150_000, "o-items");
    cmd.items = vec![
        InitItem {
            name: "widget".into(),
            amount: 100_000,
            quantity: 1,
        },
        InitItem {
            name: "gadget".into(),
            amount: 49_000,
            quantity: 1,
        },
    ];
    let err = h.engine.init(cmd).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    // Within one minor unit is accepted.
    let mut cmd = init_cmd("acme", "s3cret!", 150_000, "o-items-ok");
    cmd.items = vec![InitItem {
        name: "widget".into(),
        amount: 149_999,
        quantity: 1,
    }];
    assert!(h.engine.init(cmd).await.is_ok());
}

#[tokio::test]
async fn capture_failure_rolls_back_to_authorized() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-fail").await;

    h.bank.set_fail_capture(true);
    let err = h
        .engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AdapterFailure(_)));

    let stored = h
        .store
        .payment_by_public_id_any_team(&payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Authorized);

    // The hold is intact, a later confirm succeeds.
    h.bank.set_fail_capture(false);
    let confirmed = h
        .engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap();
    assert_eq!(confirmed.status, PaymentStatus::Confirmed);
}

#[tokio::test]
async fn check_never_serves_stale_status_after_mutation() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let init = h
        .engine
        .init(init_cmd("acme", "s3cret!", 150_000, "order-stale"))
        .await
        .unwrap();

    let before = h
        .engine
        .check(check_cmd("acme", "s3cret!", &init.payment_id))
        .await
        .unwrap();
    assert_eq!(before.payments[0].status, PaymentStatus::New);

    h.engine.render_form(&init.payment_id).await.unwrap();
    h.engine
        .submit_form(SubmitCommand {
            payment_id: init.payment_id.clone(),
            card: CardForm {
                card_number: VISA.into(),
                exp_date: "12/29".into(),
                cvv: "123".into(),
                holder: None,
            },
        })
        .await
        .unwrap();

    let after = h
        .engine
        .check(check_cmd("acme", "s3cret!", &init.payment_id))
        .await
        .unwrap();
    assert_eq!(after.payments[0].status, PaymentStatus::Authorized);
}

#[tokio::test]
async fn declined_card_rejects_payment() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let init = h
        .engine
        .init(init_cmd("acme", "s3cret!", 150_000, "order-decl"))
        .await
        .unwrap();
    h.engine.render_form(&init.payment_id).await.unwrap();

    h.bank.decline_pan(VISA);
    let submit = h
        .engine
        .submit_form(SubmitCommand {
            payment_id: init.payment_id.clone(),
            card: CardForm {
                card_number: VISA.into(),
                exp_date: "12/29".into(),
                cvv: "123".into(),
                holder: None,
            },
        })
        .await
        .unwrap();
    assert_eq!(submit.status, PaymentStatus::Rejected);

    let stored = h
        .store
        .payment_by_public_id_any_team(&init.payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.metadata.get("rejectionCode").map(String::as_str), Some("05"));
}

#[tokio::test]
async fn order_reference_may_span_multiple_payments() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    h.engine
        .init(init_cmd("acme", "s3cret!", 150_000, "order-multi"))
        .await
        .unwrap();
    h.engine
        .init(init_cmd("acme", "s3cret!", 150_000, "order-multi"))
        .await
        .unwrap();

    let fields = SignedFields::order_op("acme", "order-multi");
    let outcome = h
        .engine
        .check(CheckCommand {
            team_slug: "acme".into(),
            token: Some(compute_token(&fields, "s3cret!")),
            order_id: Some("order-multi".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.payments.len(), 2);
}

#[tokio::test]
async fn daily_count_cap_blocks_second_init() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    h.engine
        .admin_update_limits(
            "acme",
            paygate_types::TeamLimits {
                daily_count: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(h
        .engine
        .init(init_cmd("acme", "s3cret!", 150_000, "o-1"))
        .await
        .is_ok());
    let err = h
        .engine
        .init(init_cmd("acme", "s3cret!", 150_000, "o-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::LimitExceeded(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn terminal_status_fires_webhook() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;

    let mut team = h.store.team_by_slug("acme").await.unwrap().unwrap();
    team.features.webhooks = true;
    team.notification_url = Some("https://merchant.example/hook".into());
    h.store.update_team(&team).await.unwrap();

    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-hook").await;
    h.engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap();

    // Delivery is fire-and-forget; give the spawned task a beat.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let deliveries = h.webhooks.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "https://merchant.example/hook");
    assert_eq!(deliveries[0].1.status, PaymentStatus::Confirmed);
    assert_eq!(deliveries[0].1.payment_id, payment_id);
}

#[tokio::test]
async fn cross_team_payment_is_invisible() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    register(&h, "rival", "hunter2!").await;
    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-x").await;

    let err = h
        .engine
        .check(check_cmd("rival", "hunter2!", &payment_id))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    let err = h
        .engine
        .confirm(confirm_cmd("rival", "hunter2!", &payment_id))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
}

#[tokio::test]
async fn partial_cancel_amount_warns_but_runs_full_operation() {
    let h = harness();
    register(&h, "acme", "s3cret!").await;
    let payment_id = authorized_payment(&h, "acme", "s3cret!", "order-part").await;
    h.engine
        .confirm(confirm_cmd("acme", "s3cret!", &payment_id))
        .await
        .unwrap();

    let fields = SignedFields::payment_op("acme", &payment_id, Some(50_000));
    let outcome = h
        .engine
        .cancel(CancelCommand {
            team_slug: "acme".into(),
            token: Some(compute_token(&fields, "s3cret!")),
            payment_id: payment_id.clone(),
            amount: Some(50_000),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.status, PaymentStatus::Refunded);
    assert!(outcome.warning.is_some());
    assert_eq!(h.bank.refund_calls(), 1);
}
