mod common;

use assert_matches::assert_matches;
use rstest::rstest;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use strum::IntoEnumIterator;
use tableside_api::{
    entities::audit_log,
    errors::ServiceError,
    models::{OrderStatus, PaymentMethod, PaymentStatus},
    services::order_status::MarkPaidRequest,
};
use uuid::Uuid;

use common::{line, TestApp};

fn card_settlement(reference: &str) -> MarkPaidRequest {
    MarkPaidRequest {
        payment_method: PaymentMethod::Card,
        transaction_ref: reference.to_string(),
        actor_id: None,
    }
}

#[tokio::test]
async fn skipping_ahead_is_rejected_and_leaves_the_order_alone() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Cash, vec![line(tea, 1)]).await;

    let err = app
        .services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Ready, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { ref from, ref to } if from == "SUBMITTED" && to == "READY");

    let view = app.services.orders.get_order(receipt.order_id).await.unwrap();
    assert_eq!(view.status, OrderStatus::Submitted);
    assert_eq!(view.version, 1);
}

#[tokio::test]
async fn walks_the_happy_path_to_completed() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Cash, vec![line(tea, 1)]).await;

    let mut last_updated = app
        .services
        .orders
        .get_order(receipt.order_id)
        .await
        .unwrap()
        .updated_at;
    let path = [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Completed,
    ];
    for (step, target) in path.into_iter().enumerate() {
        let view = app
            .services
            .order_status
            .transition_status(receipt.order_id, target, Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(view.status, target);
        assert_eq!(view.version, step as i32 + 2);
        assert!(view.updated_at > last_updated, "updated_at must move forward");
        last_updated = view.updated_at;
    }

    let err = app
        .services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });
}

#[rstest]
#[case(OrderStatus::Submitted)]
#[case(OrderStatus::Confirmed)]
#[case(OrderStatus::Preparing)]
#[tokio::test]
async fn cancellable_until_ready(#[case] reached: OrderStatus) {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Cash, vec![line(tea, 1)]).await;

    let steps: &[OrderStatus] = match reached {
        OrderStatus::Submitted => &[],
        OrderStatus::Confirmed => &[OrderStatus::Confirmed],
        _ => &[OrderStatus::Confirmed, OrderStatus::Preparing],
    };
    for target in steps {
        app.services
            .order_status
            .transition_status(receipt.order_id, *target, None)
            .await
            .unwrap();
    }

    let view = app
        .services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Cancelled);
}

/// Places an order and drives it to `status` along the shortest legal path.
async fn order_in(app: &TestApp, menu_item: Uuid, status: OrderStatus) -> Uuid {
    use OrderStatus::*;
    let (method, path): (PaymentMethod, &[OrderStatus]) = match status {
        Submitted => (PaymentMethod::Cash, &[]),
        AwaitingPayment => (PaymentMethod::Card, &[]),
        Pending => (PaymentMethod::Card, &[Pending]),
        Confirmed => (PaymentMethod::Cash, &[Confirmed]),
        Preparing => (PaymentMethod::Cash, &[Confirmed, Preparing]),
        Ready => (PaymentMethod::Cash, &[Confirmed, Preparing, Ready]),
        Served => (PaymentMethod::Cash, &[Confirmed, Preparing, Ready, Served]),
        Completed => (PaymentMethod::Cash, &[Confirmed, Preparing, Ready, Served, Completed]),
        Cancelled => (PaymentMethod::Cash, &[Cancelled]),
        Paid => unreachable!("no transition enters PAID"),
    };
    let receipt = app.place(method, vec![line(menu_item, 1)]).await;
    for target in path {
        app.services
            .order_status
            .transition_status(receipt.order_id, *target, None)
            .await
            .unwrap();
    }
    receipt.order_id
}

#[tokio::test]
async fn stored_state_follows_the_transition_table() {
    let app = TestApp::new().await;
    let burger = app.menu_item("Burger", dec!(95));
    let beef = app.stock_item("Beef", dec!(100000), dec!(500)).await;
    app.recipe(burger, beef, dec!(150)).await;

    for from in OrderStatus::iter().filter(|s| *s != OrderStatus::Paid) {
        let idle = order_in(&app, burger, from).await;
        for target in OrderStatus::iter() {
            if from.can_transition_to(target) {
                let order_id = order_in(&app, burger, from).await;
                let view = app
                    .services
                    .order_status
                    .transition_status(order_id, target, None)
                    .await
                    .unwrap_or_else(|e| panic!("{from} -> {target} should succeed: {e}"));
                assert_eq!(view.status, target);
                continue;
            }

            let before = app.stored_order(idle).await;
            let moves_before = app
                .services
                .inventory
                .movements_for_order(idle)
                .await
                .unwrap()
                .len();
            let err = app
                .services
                .order_status
                .transition_status(idle, target, None)
                .await
                .unwrap_err();
            assert_matches!(err, ServiceError::InvalidTransition { .. }, "{from} -> {target}");

            let after = app.stored_order(idle).await;
            assert_eq!(after.status, before.status, "{from} -> {target}");
            assert_eq!(after.version, before.version, "{from} -> {target}");
            assert_eq!(after.updated_at, before.updated_at, "{from} -> {target}");
            assert_eq!(after.inventory_committed, before.inventory_committed);
            assert_eq!(
                app.services
                    .inventory
                    .movements_for_order(idle)
                    .await
                    .unwrap()
                    .len(),
                moves_before,
                "{from} -> {target}"
            );
        }
    }
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new().await;
    assert_matches!(
        app.services
            .order_status
            .transition_status(Uuid::new_v4(), OrderStatus::Confirmed, None)
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn card_payment_confirms_the_order() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Card, vec![line(tea, 1)]).await;

    let view = app
        .services
        .order_status
        .mark_paid(receipt.order_id, card_settlement("txn-001"))
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Confirmed);
    assert_eq!(view.payment_status, PaymentStatus::Paid);
    assert_eq!(view.transaction_ref.as_deref(), Some("txn-001"));
    assert!(view.paid_at.is_some());
    assert_eq!(view.version, 2);
}

#[tokio::test]
async fn cash_payment_keeps_kitchen_progress() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Cash, vec![line(tea, 1)]).await;
    for target in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Served] {
        app.services
            .order_status
            .transition_status(receipt.order_id, target, None)
            .await
            .unwrap();
    }

    let view = app
        .services
        .order_status
        .mark_paid(
            receipt.order_id,
            MarkPaidRequest {
                payment_method: PaymentMethod::Cash,
                transaction_ref: "till-17".into(),
                actor_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Served);
    assert_eq!(view.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn paying_twice_changes_nothing() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Card, vec![line(tea, 1)]).await;

    let first = app
        .services
        .order_status
        .mark_paid(receipt.order_id, card_settlement("txn-001"))
        .await
        .unwrap();
    let mut kitchen = app.hub.subscribe([tableside_api::events::Room::kitchen(app.branch_id)]);
    let second = app
        .services
        .order_status
        .mark_paid(receipt.order_id, card_settlement("txn-002"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.transaction_ref.as_deref(), Some("txn-001"));
    assert!(kitchen.try_recv().is_none());
}

#[tokio::test]
async fn cancelled_order_cannot_be_paid() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Card, vec![line(tea, 1)]).await;
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap();

    let err = app
        .services
        .order_status
        .mark_paid(receipt.order_id, card_settlement("txn-late"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });

    let view = app.services.orders.get_order(receipt.order_id).await.unwrap();
    assert_eq!(view.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn blank_transaction_reference_is_rejected() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Card, vec![line(tea, 1)]).await;

    assert_matches!(
        app.services
            .order_status
            .mark_paid(receipt.order_id, card_settlement(""))
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn every_change_leaves_an_audit_entry() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app.place(PaymentMethod::Card, vec![line(tea, 1)]).await;
    let actor = Uuid::new_v4();

    app.services
        .order_status
        .mark_paid(
            receipt.order_id,
            MarkPaidRequest {
                actor_id: Some(actor),
                ..card_settlement("txn-001")
            },
        )
        .await
        .unwrap();
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Preparing, Some(actor))
        .await
        .unwrap();

    let entries = audit_log::Entity::find()
        .filter(audit_log::Column::EntityRef.eq(format!("order:{}", receipt.order_id)))
        .all(&*app.db)
        .await
        .unwrap();
    let mut actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    actions.sort_unstable();
    assert_eq!(actions, vec!["order.created", "order.paid", "order.status_changed"]);
    assert!(entries
        .iter()
        .filter(|e| e.action != "order.created")
        .all(|e| e.actor_id == Some(actor)));
}
