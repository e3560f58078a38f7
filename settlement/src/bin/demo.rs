//! End-to-end demo: partner onboarding through transfer settlement.

use rust_decimal::Decimal;
use tracing::info;

use custody_core::{ClientType, CreateAccount, CreateClient, CreatePartner, Currency};
use settlement::{
    Config, SettlementEngine, TransferDestination, TransferRequest, TransferState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Settlement demo starting...");

    let engine = SettlementEngine::new(Config::default());

    let credentials = engine.create_partner(CreatePartner {
        name: "Acme Payments".to_string(),
        allowed_currencies: vec![Currency::USD, Currency::EUR],
        webhook_url: Some("https://acme.example/webhooks/settlement".to_string()),
    })?;
    info!(partner_id = %credentials.partner_id, client_id = %credentials.client_id, "partner onboarded");

    let client = engine.create_client(
        &credentials.partner_id,
        CreateClient {
            external_client_id: "acme-client-001".to_string(),
            legal_name: "Northwind Trading Ltd".to_string(),
            country: "GB".to_string(),
            client_type: ClientType::Fintech,
            allowed_currencies: vec![Currency::USD],
        },
    )?;

    let alice = engine.create_account(CreateAccount {
        client_id: client.client_id.clone(),
        currency: Currency::USD,
        initial_balance: Some(Decimal::from(10_000)),
    })?;
    let bob = engine.create_account(CreateAccount {
        client_id: client.client_id.clone(),
        currency: Currency::USD,
        initial_balance: Some(Decimal::from(2_500)),
    })?;
    info!(from = %alice.account_id, to = %bob.account_id, "accounts funded");

    engine.set_operation_limits(
        &alice.account_id,
        Decimal::from(5_000),  // daily
        Decimal::from(2_000),  // per operation
        Decimal::from(1_500),  // requires approval above
        Decimal::from(500),    // auto-approve below
    )?;

    // A transfer within limits settles immediately
    let settled = engine
        .submit_transfer(
            &credentials.partner_id,
            TransferRequest {
                transfer_request_id: "req-001".to_string(),
                from_account_id: alice.account_id.clone(),
                destination: TransferDestination::Internal(bob.account_id.clone()),
                amount: Decimal::from(750),
                sending_currency: Currency::USD,
                receiving_currency: Currency::USD,
                description: "Invoice 4411".to_string(),
                details: None,
            },
        )
        .await?;
    info!(transfer_id = %settled.transfer_id, state = %settled.state, "first transfer");

    // Replaying the same request ID returns the same transfer
    let replay = engine
        .submit_transfer(
            &credentials.partner_id,
            TransferRequest {
                transfer_request_id: "req-001".to_string(),
                from_account_id: alice.account_id.clone(),
                destination: TransferDestination::Internal(bob.account_id.clone()),
                amount: Decimal::from(750),
                sending_currency: Currency::USD,
                receiving_currency: Currency::USD,
                description: "Invoice 4411".to_string(),
                details: None,
            },
        )
        .await?;
    assert_eq!(replay.transfer_id, settled.transfer_id);
    info!("replay returned the original transfer");
    println!("{}", serde_json::to_string_pretty(&settled)?);

    // Over the per-operation cap: rejected, balances untouched
    let rejected = engine
        .submit_transfer(
            &credentials.partner_id,
            TransferRequest {
                transfer_request_id: "req-002".to_string(),
                from_account_id: alice.account_id.clone(),
                destination: TransferDestination::Internal(bob.account_id.clone()),
                amount: Decimal::from(3_000),
                sending_currency: Currency::USD,
                receiving_currency: Currency::USD,
                description: "Oversized".to_string(),
                details: None,
            },
        )
        .await?;
    assert_eq!(rejected.state, TransferState::Rejected);
    info!(
        reason = rejected.failure_reason.as_deref().unwrap_or("-"),
        "oversized transfer rejected"
    );

    for snapshot in [
        engine.get_balance(&alice.account_id)?,
        engine.get_balance(&bob.account_id)?,
    ] {
        info!(
            account_id = %snapshot.account_id,
            balance = %snapshot.balance,
            available = %snapshot.available_balance,
            reserved = %snapshot.reserved_balance,
            "final balances"
        );
    }

    match engine.verify_audit_chain() {
        None => info!("audit chain intact"),
        Some(entry_id) => anyhow::bail!("audit chain broken at entry {entry_id}"),
    }

    for alert in engine.list_alerts(true) {
        info!(alert_id = %alert.id, title = %alert.title, "open alert");
    }

    info!("Settlement demo complete");
    Ok(())
}
