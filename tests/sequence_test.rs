mod common;

use std::collections::HashSet;

use chrono::{Datelike, Utc};
use common::TestApp;
use futures::future::join_all;
use windowworks_api::{auth::Role, services::contracts::CreateContractRequest};

#[tokio::test]
async fn order_numbers_follow_the_yearly_sequence() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;
    let year = Utc::now().year();

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let order = app.seed_order(client.id, manager.id).await;
        numbers.push(order.order().order_number.clone());
    }

    assert_eq!(
        numbers,
        vec![
            format!("WM-{}-0001", year),
            format!("WM-{}-0002", year),
            format!("WM-{}-0003", year),
        ]
    );
}

#[tokio::test]
async fn concurrent_order_creation_never_reuses_a_number() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;

    let created = join_all((0..8).map(|_| app.seed_order(client.id, manager.id))).await;
    let numbers: HashSet<String> = created
        .iter()
        .map(|details| details.order().order_number.clone())
        .collect();
    assert_eq!(numbers.len(), 8);
}

#[tokio::test]
async fn deleting_an_order_does_not_free_its_number() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;
    let year = Utc::now().year();

    let first = app.seed_order(client.id, manager.id).await;
    app.state
        .services
        .orders
        .delete_order(first.order().id)
        .await
        .unwrap();

    let second = app.seed_order(client.id, manager.id).await;
    assert_eq!(second.order().order_number, format!("WM-{}-0002", year));
}

#[tokio::test]
async fn contracts_have_their_own_sequence() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;
    let year = Utc::now().year();
    let order = app.seed_order(client.id, manager.id).await;
    app.seed_order(client.id, manager.id).await;

    let contract = app
        .state
        .services
        .contracts
        .create_contract(order.order().id, CreateContractRequest::default())
        .await
        .unwrap();
    assert_eq!(contract.contract_number, format!("CT-{}-0001", year));
}
