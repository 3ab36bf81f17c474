//! Status-code and body contract of the REST surface, driven through the
//! real router with `tower::ServiceExt::oneshot`.

mod common;

use axum::http::StatusCode;
use common::*;
use commission_engine::domain::actor::Actor;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;

/// Decimal wire values keep whatever scale the arithmetic produced, so
/// amounts are compared numerically rather than textually.
fn amount(value: &serde_json::Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn initiate_body(driver: &str) -> serde_json::Value {
    json!({
        "driver_id": driver,
        "from": "2024-03-01",
        "to": "2024-03-31",
        "payment_method": "bank_transfer"
    })
}

#[tokio::test]
async fn initiate_returns_created_with_the_payout() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let response = app
        .oneshot(post_json_as(
            "/commission/initiate",
            MANAGER,
            "manager",
            &initiate_body(DRIVER),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending_approval");
    assert_eq!(body["driver_id"], DRIVER);
    assert_eq!(body["total_orders"], 10);
    assert_eq!(amount(&body["commission_amount"]["amount"]), dec!(50.00));
    assert_eq!(body["receipt_ready"], false);
    assert!(body.get("rejection_reason").is_none());
}

#[tokio::test]
async fn duplicate_initiate_conflicts_and_names_the_blocker() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let first = app
        .clone()
        .oneshot(post_json_as(
            "/commission/initiate",
            MANAGER,
            "manager",
            &initiate_body(DRIVER),
        ))
        .await
        .unwrap();
    let first = body_json(first).await;

    let second = app
        .oneshot(post_json_as(
            "/commission/initiate",
            MANAGER,
            "manager",
            &initiate_body(DRIVER),
        ))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["error"], "already_pending");
    assert_eq!(body["conflict"], first["id"]);
}

#[tokio::test]
async fn an_empty_window_is_unprocessable() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    // driver-2 delivered nothing in March.
    let response = app
        .oneshot(post_json_as(
            "/commission/initiate",
            MANAGER,
            "manager",
            &initiate_body(OTHER_DRIVER),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "nothing_to_pay");
}

#[tokio::test]
async fn drivers_cannot_initiate_their_own_payout() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let response = app
        .oneshot(post_json_as(
            "/commission/initiate",
            DRIVER,
            "driver",
            &initiate_body(DRIVER),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn approval_is_reserved_for_the_payouts_driver() {
    let stack = stack(ten_orders());
    let app = router(&stack);
    let payout = pending_payout(&stack).await;
    let approve_uri = format!("/commission/{}/approve", payout.id);

    let wrong = app
        .clone()
        .oneshot(post_json_as(&approve_uri, OTHER_DRIVER, "driver", &json!({})))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(wrong).await["error"], "actor_mismatch");

    let right = app
        .oneshot(post_json_as(
            &approve_uri,
            DRIVER,
            "driver",
            &json!({"note": "all good"}),
        ))
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);
    let body = body_json(right).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["driver_note"], "all good");
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let stack = stack(ten_orders());
    let app = router(&stack);
    let payout = pending_payout(&stack).await;

    let response = app
        .oneshot(post_json_as(
            &format!("/commission/{}/reject", payout.id),
            DRIVER,
            "driver",
            &json!({"reason": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn settlement_over_http() {
    let stack = stack(ten_orders());
    let app = router(&stack);
    let payout = pending_payout(&stack).await;

    app.clone()
        .oneshot(post_json_as(
            &format!("/commission/{}/approve", payout.id),
            DRIVER,
            "driver",
            &json!({}),
        ))
        .await
        .unwrap();

    let empty_ref = app
        .clone()
        .oneshot(post_json_as(
            &format!("/commission/{}/paid", payout.id),
            MANAGER,
            "manager",
            &json!({"payment_reference": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(empty_ref.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json_as(
            &format!("/commission/{}/paid", payout.id),
            MANAGER,
            "manager",
            &json!({"payment_reference": "wire-77"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "paid");
    assert_eq!(body["payment_reference"], "wire-77");
}

#[tokio::test]
async fn transitions_on_settled_payouts_conflict() {
    let stack = stack(ten_orders());
    let app = router(&stack);
    let payout = pending_payout(&stack).await;

    app.clone()
        .oneshot(post_json_as(
            &format!("/commission/{}/cancel", payout.id),
            MANAGER,
            "manager",
            &json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json_as(
            &format!("/commission/{}/approve", payout.id),
            DRIVER,
            "driver",
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "invalid_transition");
}

#[tokio::test]
async fn unknown_and_malformed_payout_ids() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let unknown = app
        .clone()
        .oneshot(post_json_as(
            "/commission/550e8400-e29b-41d4-a716-446655440000/approve",
            DRIVER,
            "driver",
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(unknown).await["error"], "not_found");

    let malformed = app
        .oneshot(post_json_as(
            "/commission/not-a-uuid/approve",
            DRIVER,
            "driver",
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn my_payouts_sees_only_the_callers_rows() {
    let mut orders = ten_orders();
    orders.push(order("o-20", OTHER_DRIVER, 20, dec!(40.00)));
    let stack = stack(orders);
    let app = router(&stack);

    let mine = pending_payout(&stack).await;
    stack
        .engine
        .initiate(&Actor::manager(MANAGER), initiate_request(OTHER_DRIVER))
        .await
        .unwrap();

    let response = app
        .oneshot(get_as("/commission/my-payouts", DRIVER, "driver"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], mine.id.to_string());
}

#[tokio::test]
async fn history_scopes_drivers_and_filters_by_status() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let first = pending_payout(&stack).await;
    stack
        .engine
        .reject(&Actor::driver(DRIVER), first.id, "wrong totals".into())
        .await
        .unwrap();
    pending_payout(&stack).await;

    let rejected = app
        .clone()
        .oneshot(get_as(
            "/commission/history?status=rejected",
            MANAGER,
            "manager",
        ))
        .await
        .unwrap();
    let rows = body_json(rejected).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);

    // A driver asking for someone else's rows still gets their own.
    let scoped = app
        .oneshot(get_as(
            &format!("/commission/history?driver_id={DRIVER}"),
            OTHER_DRIVER,
            "driver",
        ))
        .await
        .unwrap();
    let rows = body_json(scoped).await;
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn wallet_endpoint_serves_converted_figures() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let response = app
        .clone()
        .oneshot(get_as(&format!("/commission/wallet/{DRIVER}"), DRIVER, "driver"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(amount(&body["primary"]["amount"]), dec!(20));
    assert_eq!(body["primary"]["currency"], "SAR");
    assert_eq!(amount(&body["secondary"]["amount"]), dec!(5));
    assert_eq!(body["secondary"]["currency"], "USD");
    assert_eq!(body["estimated"], false);

    let missing = app
        .oneshot(get_as("/commission/wallet/ghost", DRIVER, "driver"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_without_a_country_is_empty() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let response = app
        .clone()
        .oneshot(get_as(
            "/commission/dashboard?from=2024-03-01&to=2024-03-31",
            MANAGER,
            "manager",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);

    let scoped = app
        .oneshot(get_as(
            "/commission/dashboard?country=sa&from=2024-03-01&to=2024-03-31",
            MANAGER,
            "manager",
        ))
        .await
        .unwrap();
    let rows = body_json(scoped).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["driver_id"], DRIVER);
}

#[tokio::test]
async fn receipt_roundtrip_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack_with_receipts(ten_orders(), dir.path());
    let app = router(&stack);
    let payout = pending_payout(&stack).await;
    let receipt_uri = format!("/commission/{}/receipt", payout.id);

    let early = app
        .clone()
        .oneshot(get_as(&receipt_uri, DRIVER, "driver"))
        .await
        .unwrap();
    assert_eq!(early.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(early).await["error"], "receipt_not_ready");

    app.clone()
        .oneshot(post_json_as(
            &format!("/commission/{}/approve", payout.id),
            DRIVER,
            "driver",
            &json!({}),
        ))
        .await
        .unwrap();
    wait_for_receipt(&stack.store, payout.id)
        .await
        .expect("receipt was never issued");

    let response = app
        .oneshot(get_as(&receipt_uri, DRIVER, "driver"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let document = body_json(response).await;
    assert_eq!(document["payout_id"], payout.id.to_string());
    assert_eq!(document["driver_name"], "Ali");
}

#[tokio::test]
async fn an_unknown_role_header_is_rejected() {
    let stack = stack(ten_orders());
    let app = router(&stack);

    let response = app
        .oneshot(get_as("/commission/my-payouts", DRIVER, "auditor"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}
