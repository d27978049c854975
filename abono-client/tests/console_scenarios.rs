use abono_client::cli::{self, Command};
use abono_client::mutations::{Api, CreatePayment, DeleteCustomer};
use abono_client::queries;
use abono_client::screens::{CustomerProfile, PurchaseBoard, PurchaseLedger};
use abono_core::validation::PaymentForm;
use abono_core::{
    ApiError, CustomerId, CustomerPurchasesParams, InstallmentSimulationRequest, PaymentCreateRequest,
    PaymentMethod, PurchaseId, PurchaseStatus,
};
use abono_sync::{CacheStore, MutationDispatcher, QueryBinder};
use abono_test_utils::assertions::{assert_amount_eq, assert_server_error};
use abono_test_utils::{fixtures, Endpoint, InMemoryConsole};
use std::sync::Arc;

fn dispatcher(console: &Arc<InMemoryConsole>) -> MutationDispatcher<Api> {
    let api: Arc<Api> = console.clone();
    MutationDispatcher::new(api, CacheStore::default())
}

fn cash(amount: f64) -> PaymentCreateRequest {
    PaymentCreateRequest {
        amount,
        method: PaymentMethod::Efectivo,
        paid_at: None,
        note: None,
    }
}

#[tokio::test]
async fn paying_off_a_purchase_updates_every_open_view() {
    let console = Arc::new(fixtures::seeded_console());
    let dispatcher = dispatcher(&console);

    let mut profile = CustomerProfile::open(dispatcher.clone(), CustomerId::new(3));
    let (_, purchases) = profile.settled().await;
    let listed = purchases.data().map(|page| page.len());
    assert_eq!(listed, Some(2));

    let mut ledger = PurchaseLedger::open(dispatcher.clone(), PurchaseId::new(12));
    ledger.settled().await;
    let form = PaymentForm {
        amount: "50".to_string(),
        method: "EFECTIVO".to_string(),
        note: "liquidación".to_string(),
    };
    let payment = ledger.pay(&form).await.unwrap();

    let purchase = ledger.purchase();
    let purchase = purchase.data().unwrap();
    assert_amount_eq(purchase.remaining_amount, 0.0);
    assert_eq!(purchase.status, PurchaseStatus::Pagado);

    let payments = ledger.payments();
    let notes: Vec<Option<&str>> = payments
        .data()
        .unwrap()
        .iter()
        .filter(|p| p.id == payment.id)
        .map(|p| p.note.as_deref())
        .collect();
    assert_eq!(notes, vec![Some("liquidación")]);

    let purchases = profile.purchases();
    assert!(!purchases.is_stale);
    let fridge = purchases
        .data()
        .and_then(|page| page.content.iter().find(|p| p.id == PurchaseId::new(12)).cloned())
        .unwrap();
    assert_amount_eq(fridge.remaining_amount, 0.0);
    assert_eq!(console.calls(Endpoint::ListCustomerPurchases), 2);
}

#[tokio::test]
async fn payment_invalidation_leaves_other_purchases_alone() {
    let console = Arc::new(fixtures::seeded_console());
    let dispatcher = dispatcher(&console);
    let api = dispatcher.context().clone();
    let store = dispatcher.store().clone();

    let mut views = vec![
        QueryBinder::mount(store.clone(), queries::payments(&api, PurchaseId::new(7))),
        QueryBinder::mount(store.clone(), queries::payments(&api, PurchaseId::new(8))),
    ];
    for view in views.iter_mut() {
        view.settled().await;
    }
    let mut purchase = QueryBinder::mount(store.clone(), queries::purchase(&api, PurchaseId::new(7)));
    purchase.settled().await;
    let mut board = PurchaseBoard::open(dispatcher.clone());
    board.settled().await;

    let dispatched = dispatcher
        .dispatch(CreatePayment {
            purchase_id: PurchaseId::new(7),
            request: cash(30.0),
        })
        .await
        .unwrap();

    let refetched: Vec<String> = dispatched.refetched.iter().map(|id| id.to_string()).collect();
    assert!(refetched.contains(&queries::payments_identity(PurchaseId::new(7)).to_string()));
    assert!(refetched.contains(&queries::purchase_identity(PurchaseId::new(7)).to_string()));
    assert!(refetched.iter().any(|id| id.starts_with("purchases{")));
    assert!(!refetched.contains(&queries::payments_identity(PurchaseId::new(8)).to_string()));

    let untouched = store.get(&queries::payments_identity(PurchaseId::new(8))).unwrap();
    assert!(!untouched.is_stale);
    assert_eq!(console.calls(Endpoint::ListPayments), 3);
    assert_amount_eq(
        purchase.view().data().map(|p| p.remaining_amount).unwrap(),
        50.0,
    );
}

#[tokio::test]
async fn unobserved_entries_refresh_lazily() {
    let console = Arc::new(fixtures::seeded_console());
    let dispatcher = dispatcher(&console);
    let api = dispatcher.context().clone();
    let store = dispatcher.store().clone();
    let params = CustomerPurchasesParams::default();

    let mut profile = QueryBinder::mount(
        store.clone(),
        queries::customer_purchases(&api, Some(CustomerId::new(3)), params.clone()),
    );
    profile.settled().await;
    drop(profile);

    dispatcher
        .mutate(CreatePayment {
            purchase_id: PurchaseId::new(11),
            request: cash(100.0),
        })
        .await
        .unwrap();
    let identity = queries::customer_purchases_identity(CustomerId::new(3), &params);
    assert!(store.get(&identity).unwrap().is_stale);
    assert_eq!(console.calls(Endpoint::ListCustomerPurchases), 1);

    let mut profile = QueryBinder::mount(
        store.clone(),
        queries::customer_purchases(&api, Some(CustomerId::new(3)), params),
    );
    let view = profile.settled().await;
    assert!(!view.is_stale);
    assert_eq!(console.calls(Endpoint::ListCustomerPurchases), 2);
}

#[tokio::test]
async fn failed_mutation_invalidates_nothing() {
    let console = Arc::new(fixtures::seeded_console());
    let dispatcher = dispatcher(&console);
    let mut ledger = PurchaseLedger::open(dispatcher.clone(), PurchaseId::new(13));
    ledger.settled().await;

    let result = dispatcher
        .mutate(CreatePayment {
            purchase_id: PurchaseId::new(13),
            request: cash(5.0),
        })
        .await;
    assert_server_error(&result, 409);
    assert!(!ledger.purchase().is_stale);
    assert_eq!(console.calls(Endpoint::GetPurchase), 1);

    console.fail_next(Endpoint::DeleteCustomer, ApiError::transport("connection reset"));
    let result = dispatcher
        .mutate(DeleteCustomer {
            customer_id: CustomerId::new(2),
        })
        .await;
    assert!(matches!(result, Err(ApiError::Transport { .. })));
    assert!(console.customer(CustomerId::new(2)).is_some());
}

#[tokio::test]
async fn identical_simulations_share_one_call() {
    let console = Arc::new(fixtures::seeded_console());
    let dispatcher = dispatcher(&console);
    let api = dispatcher.context().clone();
    let store = dispatcher.store().clone();
    let request = InstallmentSimulationRequest {
        total_amount: 300.0,
        installment_count: 3,
    };

    let mut first = QueryBinder::mount(store.clone(), queries::installment_simulation(&api, Some(request)));
    let mut second = QueryBinder::mount(store.clone(), queries::installment_simulation(&api, Some(request)));
    let a = first.settled().await;
    let b = second.settled().await;

    assert_eq!(a.data().map(|s| s.installment_amount), Some(100.0));
    assert_eq!(a.data(), b.data());
    assert_eq!(console.calls(Endpoint::SimulateInstallments), 1);
}

#[tokio::test]
async fn cli_renders_a_ledger() {
    let console = Arc::new(fixtures::seeded_console());
    let command = Command::parse(["purchase", "12"].map(String::from)).unwrap();
    let output = cli::run(command, dispatcher(&console)).await.unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Refrigerador"));
    assert!(lines[0].ends_with("ACTIVO"));
    assert!(lines[1].contains("TRANSFERENCIA"));
}

#[tokio::test]
async fn cli_pay_reports_server_rejections() {
    let console = Arc::new(fixtures::seeded_console());
    let command = Command::parse(["pay", "13", "5", "otro"].map(String::from)).unwrap();
    let err = cli::run(command, dispatcher(&console)).await.unwrap_err();
    assert!(err.to_string().contains("does not accept payments"));
    assert_eq!(console.calls(Endpoint::CreatePayment), 0);
}
