mod common;

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use sea_orm::DatabaseTransaction;
use tableside_api::{
    entities::stock_movement::MovementReason,
    errors::ServiceError,
    models::{OrderStatus, PaymentMethod},
    services::{
        inventory::{RecipeBook, RecipeLine},
        order_status::MarkPaidRequest,
    },
};
use uuid::Uuid;

use common::{line, TestApp};

/// Burger uses 150 g beef and 1 bun; fries use 200 g potato.
struct Kitchen {
    burger: Uuid,
    fries: Uuid,
    beef: Uuid,
    buns: Uuid,
    potato: Uuid,
}

async fn stocked(app: &TestApp) -> Kitchen {
    let burger = app.menu_item("Burger", dec!(95));
    let fries = app.menu_item("Fries", dec!(30));
    let beef = app.stock_item("Beef", dec!(3000), dec!(500)).await;
    let buns = app.stock_item("Buns", dec!(40), dec!(10)).await;
    let potato = app.stock_item("Potato", dec!(5000), dec!(1000)).await;
    app.recipe(burger, beef, dec!(150)).await;
    app.recipe(burger, buns, dec!(1)).await;
    app.recipe(fries, potato, dec!(200)).await;
    Kitchen {
        burger,
        fries,
        beef,
        buns,
        potato,
    }
}

#[tokio::test]
async fn confirming_consumes_the_recipe() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app
        .place(PaymentMethod::Cash, vec![line(k.burger, 2), line(k.fries, 1)])
        .await;

    // nothing moves before confirmation
    assert_eq!(app.quantity_of(k.beef).await, dec!(3000));

    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Confirmed, None)
        .await
        .unwrap();

    assert_eq!(app.quantity_of(k.beef).await, dec!(2700));
    assert_eq!(app.quantity_of(k.buns).await, dec!(38));
    assert_eq!(app.quantity_of(k.potato).await, dec!(4800));

    let movements = app
        .services
        .inventory
        .movements_for_order(receipt.order_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);
    assert!(movements
        .iter()
        .all(|m| m.reason == MovementReason::OrderConsumed.as_ref() && m.order_id == Some(receipt.order_id)));
}

#[tokio::test]
async fn same_stock_item_across_lines_is_one_movement() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app
        .place(PaymentMethod::Cash, vec![line(k.burger, 1), line(k.burger, 3)])
        .await;
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Confirmed, None)
        .await
        .unwrap();

    let beef_moves: Vec<_> = app
        .services
        .inventory
        .movements_for_order(receipt.order_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.stock_item_id == k.beef)
        .collect();
    assert_eq!(beef_moves.len(), 1);
    assert_eq!(beef_moves[0].change, dec!(-600));
}

#[tokio::test]
async fn cancel_after_confirm_nets_to_zero() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app
        .place(PaymentMethod::Cash, vec![line(k.burger, 2), line(k.fries, 1)])
        .await;

    for target in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Cancelled] {
        app.services
            .order_status
            .transition_status(receipt.order_id, target, None)
            .await
            .unwrap();
    }

    for stock in [k.beef, k.buns, k.potato] {
        let net: rust_decimal::Decimal = app
            .services
            .inventory
            .movements_for_order(receipt.order_id)
            .await
            .unwrap()
            .iter()
            .filter(|m| m.stock_item_id == stock)
            .map(|m| m.change)
            .sum();
        assert_eq!(net, dec!(0), "order movements must cancel out");
    }
    assert_eq!(app.quantity_of(k.beef).await, dec!(3000));
    assert_eq!(app.quantity_of(k.buns).await, dec!(40));
    assert_eq!(app.quantity_of(k.potato).await, dec!(5000));
}

#[tokio::test]
async fn cancel_before_confirm_moves_nothing() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app.place(PaymentMethod::Cash, vec![line(k.burger, 1)]).await;
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap();

    assert!(app
        .services
        .inventory
        .movements_for_order(receipt.order_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn restore_uses_what_was_consumed_not_the_current_recipe() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app.place(PaymentMethod::Cash, vec![line(k.burger, 2)]).await;
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Confirmed, None)
        .await
        .unwrap();

    app.recipe(k.burger, k.beef, dec!(200)).await;

    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(app.quantity_of(k.beef).await, dec!(3000));
}

#[tokio::test]
async fn card_payment_consumes_once() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app.place(PaymentMethod::Card, vec![line(k.burger, 1)]).await;

    let settle = MarkPaidRequest {
        payment_method: PaymentMethod::Card,
        transaction_ref: "txn-1".into(),
        actor_id: None,
    };
    app.services
        .order_status
        .mark_paid(receipt.order_id, settle.clone())
        .await
        .unwrap();
    app.services
        .order_status
        .mark_paid(receipt.order_id, settle)
        .await
        .unwrap();

    assert_eq!(app.quantity_of(k.beef).await, dec!(2850));
    assert_eq!(app.quantity_of(k.buns).await, dec!(39));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_confirmations_consume_once() {
    let app = Arc::new(TestApp::new().await);
    let k = stocked(&app).await;
    let receipt = app.place(PaymentMethod::Cash, vec![line(k.burger, 2)]).await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let app = app.clone();
        let order_id = receipt.order_id;
        tasks.push(tokio::spawn(async move {
            app.services
                .order_status
                .transition_status(order_id, OrderStatus::Confirmed, None)
                .await
        }));
    }

    let mut confirmed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(view) => {
                assert_eq!(view.status, OrderStatus::Confirmed);
                confirmed += 1;
            }
            Err(err) => assert_matches!(err, ServiceError::InvalidTransition { .. }),
        }
    }
    assert_eq!(confirmed, 1);
    assert_eq!(app.quantity_of(k.beef).await, dec!(2700));
    assert_eq!(app.quantity_of(k.buns).await, dec!(38));
}

#[tokio::test]
async fn stock_may_go_negative_and_shows_in_alerts() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app.place(PaymentMethod::Cash, vec![line(k.burger, 41)]).await;
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Confirmed, None)
        .await
        .unwrap();

    assert_eq!(app.quantity_of(k.buns).await, dec!(-1));
    assert_eq!(app.quantity_of(k.beef).await, dec!(-3150));

    // potato is untouched and stays above its threshold
    let alerts = app.services.inventory.low_stock(app.branch_id).await.unwrap();
    let ids: Vec<_> = alerts.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![k.beef, k.buns]);
}

#[tokio::test]
async fn ledger_reconciles_with_stored_quantity() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    let receipt = app.place(PaymentMethod::Cash, vec![line(k.burger, 3)]).await;
    app.services
        .order_status
        .transition_status(receipt.order_id, OrderStatus::Confirmed, None)
        .await
        .unwrap();
    app.services
        .inventory
        .receive_stock(k.beef, dec!(1000), Some("delivery 42".into()))
        .await
        .unwrap();

    let report = app.services.inventory.reconcile(k.beef).await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.stored_quantity, dec!(3550));
    assert_eq!(app.ledger_sum(k.beef).await, dec!(3550));
}

#[tokio::test]
async fn zero_receipt_is_rejected() {
    let app = TestApp::new().await;
    let k = stocked(&app).await;
    assert_matches!(
        app.services.inventory.receive_stock(k.beef, dec!(0), None).await,
        Err(ServiceError::ValidationError(_))
    );
}

/// Every menu item uses the same fixed recipe lines.
#[derive(Default)]
struct FixedRecipes(Mutex<Vec<RecipeLine>>);

#[async_trait]
impl RecipeBook for FixedRecipes {
    async fn recipe_for(
        &self,
        _txn: &DatabaseTransaction,
        _menu_item_id: Uuid,
    ) -> Result<Vec<RecipeLine>, ServiceError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn failed_consumption_leaves_the_order_unconfirmed() {
    let recipes = Arc::new(FixedRecipes::default());
    let app = TestApp::with_recipes(recipes.clone()).await;
    let burger = app.menu_item("Burger", dec!(95));
    let beef = app.stock_item("Beef", dec!(3000), dec!(500)).await;
    *recipes.0.lock().unwrap() = vec![
        RecipeLine {
            stock_item_id: beef,
            qty_per_serving: dec!(150),
        },
        RecipeLine {
            stock_item_id: Uuid::new_v4(),
            qty_per_serving: dec!(1),
        },
    ];
    let receipt = app.place(PaymentMethod::Cash, vec![line(burger, 2)]).await;

    assert_matches!(
        app.services
            .order_status
            .transition_status(receipt.order_id, OrderStatus::Confirmed, None)
            .await,
        Err(ServiceError::ReferenceError(_))
    );

    let stored = app.stored_order(receipt.order_id).await;
    assert_eq!(stored.status, OrderStatus::Submitted.to_string());
    assert_eq!(stored.version, 1);
    assert!(!stored.inventory_committed);
    assert!(app
        .services
        .inventory
        .movements_for_order(receipt.order_id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(app.quantity_of(beef).await, dec!(3000));
    assert_eq!(app.ledger_sum(beef).await, dec!(3000));
}
