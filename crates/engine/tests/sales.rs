use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    DerivedRates, Engine, EngineError, FinalizeSaleCmd, IntakeRate, Notification,
    NotificationSink, NotifyError, RecordIntakeCmd,
};
use migration::MigratorTrait;

#[derive(Debug, Default)]
struct RecordingSink {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

async fn engine_with_db() -> (Engine, DatabaseConnection, Arc<RecordingSink>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let sink = Arc::new(RecordingSink::default());
    let engine = Engine::builder()
        .database(db.clone())
        .notifier(sink.clone())
        .owner_id("owner")
        .build()
        .await
        .unwrap();
    (engine, db, sink)
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

async fn intake(engine: &Engine, source_amount: Decimal, rate: Decimal) {
    engine
        .record_intake(RecordIntakeCmd::new(
            source_amount,
            IntakeRate::Fixed(rate),
            "owner",
            at(0),
        ))
        .await
        .unwrap();
}

fn sale(source: Decimal, paid: Decimal, market: Decimal, by: &str) -> FinalizeSaleCmd {
    let rates = DerivedRates::from_market(market).unwrap();
    FinalizeSaleCmd {
        source_received: source,
        actual_target_paid: paid,
        suggested_target: source * rates.intermediary,
        rates,
        recorded_by: by.to_string(),
        recorded_at: at(10),
        note: None,
    }
}

fn remaining_by_lot(ledger: &engine::InventoryLedger) -> Vec<Decimal> {
    ledger
        .lots()
        .iter()
        .map(|lot| lot.remaining_quantity)
        .collect()
}

#[tokio::test]
async fn intake_opens_a_lot_at_inverse_rate() {
    let (engine, _db, _sink) = engine_with_db().await;

    let recorded = engine
        .record_intake(
            RecordIntakeCmd::new(dec!(1000), IntakeRate::Fixed(dec!(15.5)), "owner", at(0))
                .note("first wire"),
        )
        .await
        .unwrap();
    assert_eq!(recorded.target_received, dec!(15500));
    assert_eq!(recorded.note.as_deref(), Some("first wire"));

    let ledger = engine.inventory_ledger().await.unwrap();
    let lot = &ledger.lots()[0];
    assert_eq!(lot.bulk_intake_id, recorded.id);
    assert_eq!(lot.remaining_quantity, dec!(15500));
    assert_eq!(lot.unit_cost, Decimal::ONE / dec!(15.5));

    let intakes = engine.bulk_intakes().await.unwrap();
    assert_eq!(intakes, vec![recorded]);
}

#[tokio::test]
async fn intake_rejects_non_positive_input() {
    let (engine, db, _sink) = engine_with_db().await;

    let err = engine
        .record_intake(RecordIntakeCmd::new(
            dec!(1000),
            IntakeRate::Fixed(Decimal::ZERO),
            "owner",
            at(0),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("rate applied must be > 0".to_string())
    );

    let err = engine
        .record_intake(RecordIntakeCmd::new(
            dec!(-1),
            IntakeRate::Fixed(dec!(15.5)),
            "owner",
            at(0),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    assert_eq!(count_rows(&db, "bulk_intakes").await, 0);
    assert_eq!(count_rows(&db, "inventory_lots").await, 0);
}

#[tokio::test]
async fn intake_at_current_rate_needs_a_market_rate() {
    let (engine, _db, _sink) = engine_with_db().await;

    let err = engine
        .record_intake(RecordIntakeCmd::new(
            dec!(100),
            IntakeRate::Current,
            "owner",
            at(0),
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoRateAvailable);

    engine
        .record_market_rate(dec!(16), "owner", at(5))
        .await
        .unwrap();
    let recorded = engine
        .record_intake(RecordIntakeCmd::new(
            dec!(100),
            IntakeRate::Current,
            "owner",
            at(6),
        ))
        .await
        .unwrap();
    assert_eq!(recorded.rate_applied, dec!(16));
    assert_eq!(recorded.target_received, dec!(1600));
}

#[tokio::test]
async fn latest_market_rate_follows_timestamps() {
    let (engine, _db, _sink) = engine_with_db().await;

    assert_eq!(engine.latest_market_rate().await.unwrap(), None);
    assert_eq!(
        engine.current_rates().await.unwrap_err(),
        EngineError::NoRateAvailable
    );

    engine
        .record_market_rate(dec!(15.5), "owner", at(1000))
        .await
        .unwrap();
    engine
        .record_market_rate(dec!(16.0), "owner", at(2000))
        .await
        .unwrap();
    engine
        .record_market_rate(dec!(14.0), "system", at(1500))
        .await
        .unwrap();

    let latest = engine.latest_market_rate().await.unwrap().unwrap();
    assert_eq!(latest.value, dec!(16.0));

    let rates = engine.current_rates().await.unwrap();
    assert_eq!(rates.owner, dec!(12.5));
    assert_eq!(rates.intermediary, dec!(12.0));

    let history = engine.market_rate_history(10).await.unwrap();
    let values: Vec<Decimal> = history.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![dec!(16.0), dec!(14.0), dec!(15.5)]);

    let err = engine
        .record_market_rate(Decimal::ZERO, "owner", at(3000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn reference_sale_commits_with_profit() {
    let (engine, db, _sink) = engine_with_db().await;
    engine
        .record_market_rate(dec!(15.5), "owner", at(0))
        .await
        .unwrap();
    intake(&engine, dec!(1000), dec!(15.5)).await;

    let quote = engine.quote_sale(dec!(100)).await.unwrap();
    assert_eq!(quote.rates.owner, dec!(12.0));
    assert_eq!(quote.owner_share, dec!(1200));
    assert_eq!(quote.suggested, dec!(1150));

    let receipt = engine
        .finalize_sale(quote.accept("owner", at(10)))
        .await
        .unwrap();

    let tx = &receipt.transaction;
    assert_eq!(tx.actual_target_paid, dec!(1150));
    assert_eq!(tx.owner_rate_at_time, dec!(12.0));
    assert_eq!(tx.intermediary_rate_at_time, dec!(11.5));
    assert!((tx.owner_profit - dec!(22.58)).abs() < dec!(0.01));
    assert_eq!(receipt.remaining, dec!(14300));
    assert!(!receipt.low_balance);

    assert_eq!(receipt.usages.len(), 1);
    assert_eq!(receipt.usages[0].quantity_used, dec!(1200));
    assert!((receipt.usages[0].cost().unwrap() - dec!(77.42)).abs() < dec!(0.01));

    let ledger = engine.inventory_ledger().await.unwrap();
    assert_eq!(ledger.total_remaining().unwrap(), dec!(14300));

    let stored = engine.sale(tx.id).await.unwrap();
    assert_eq!(&stored, tx);
    let usages = engine.sale_usages(tx.id).await.unwrap();
    assert_eq!(usages, receipt.usages);
    assert_eq!(count_rows(&db, "lot_usages").await, 1);
}

#[tokio::test]
async fn sale_spans_lots_oldest_first() {
    let (engine, _db, _sink) = engine_with_db().await;
    intake(&engine, dec!(50), dec!(16)).await; // 800 @ 0.0625
    intake(&engine, dec!(100), dec!(15)).await; // 1500 @ 1/15

    let receipt = engine
        .finalize_sale(sale(dec!(100), dec!(1100), dec!(15.5), "owner"))
        .await
        .unwrap();

    let lots: Vec<(i64, Decimal)> = receipt
        .usages
        .iter()
        .map(|u| (u.lot_id, u.quantity_used))
        .collect();
    let ledger = engine.inventory_ledger().await.unwrap();
    let first = ledger.lots()[0].id;
    let second = ledger.lots()[1].id;
    assert_eq!(lots, vec![(first, dec!(800)), (second, dec!(400))]);
    assert_eq!(remaining_by_lot(&ledger), vec![dec!(0), dec!(1100)]);

    let expected_cost = dec!(800) * dec!(0.0625) + dec!(400) * (Decimal::ONE / dec!(15));
    let expected_profit = dec!(100) - expected_cost;
    assert!((receipt.transaction.owner_profit - expected_profit).abs() < dec!(0.0000001));
}

#[tokio::test]
async fn payout_above_owner_share_is_rejected() {
    let (engine, db, _sink) = engine_with_db().await;
    intake(&engine, dec!(1000), dec!(15.5)).await;

    let err = engine
        .finalize_sale(sale(dec!(100), dec!(1200.01), dec!(15.5), "partner"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::ExceedsOwnerShare {
            paid: dec!(1200.01),
            owner_share: dec!(1200),
        }
    );

    let ledger = engine.inventory_ledger().await.unwrap();
    assert_eq!(ledger.total_remaining().unwrap(), dec!(15500));
    assert_eq!(count_rows(&db, "customer_transactions").await, 0);
}

#[tokio::test]
async fn insufficient_inventory_leaves_everything_untouched() {
    let (engine, db, _sink) = engine_with_db().await;
    intake(&engine, dec!(50), dec!(16)).await; // 800
    intake(&engine, dec!(20), dec!(15)).await; // 300

    let err = engine
        .finalize_sale(sale(dec!(100), dec!(1000), dec!(15.5), "owner"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientInventory {
            requested: dec!(1200),
            available: dec!(1100),
        }
    );

    let ledger = engine.inventory_ledger().await.unwrap();
    assert_eq!(remaining_by_lot(&ledger), vec![dec!(800), dec!(300)]);
    assert_eq!(count_rows(&db, "customer_transactions").await, 0);
    assert_eq!(count_rows(&db, "lot_usages").await, 0);
}

#[tokio::test]
async fn negative_profit_rolls_back_the_deduction() {
    let (engine, db, _sink) = engine_with_db().await;
    // 500 units bought at 0.2 each, far above what a 15.5 market pays back.
    intake(&engine, dec!(100), dec!(5)).await;

    let err = engine
        .finalize_sale(sale(dec!(10), dec!(100), dec!(15.5), "owner"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NegativeProfit(dec!(-14)));

    let ledger = engine.inventory_ledger().await.unwrap();
    assert_eq!(ledger.total_remaining().unwrap(), dec!(500));
    assert_eq!(count_rows(&db, "customer_transactions").await, 0);
    assert_eq!(count_rows(&db, "lot_usages").await, 0);
}

#[tokio::test]
async fn finalize_rejects_non_positive_inputs() {
    let (engine, _db, _sink) = engine_with_db().await;
    intake(&engine, dec!(1000), dec!(15.5)).await;

    let err = engine
        .finalize_sale(sale(Decimal::ZERO, Decimal::ZERO, dec!(15.5), "owner"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .finalize_sale(sale(dec!(10), dec!(-1), dec!(15.5), "owner"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    // A market this low floors the owner rate to zero.
    let err = engine
        .finalize_sale(sale(dec!(10), Decimal::ZERO, dec!(0.5), "owner"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("owner rate must be > 0".to_string())
    );
}

#[tokio::test]
async fn notifications_follow_committed_sales() {
    let (engine, _db, sink) = engine_with_db().await;
    intake(&engine, dec!(100), dec!(15)).await; // 1500

    let receipt = engine
        .finalize_sale(sale(dec!(100), dec!(1150), dec!(15.5), "partner"))
        .await
        .unwrap();
    assert_eq!(receipt.remaining, dec!(300));
    assert!(receipt.low_balance);

    let seen = sink.seen();
    assert_eq!(seen.len(), 2);
    assert!(matches!(
        &seen[0],
        Notification::SaleRecorded { recorded_by, remaining, .. }
            if recorded_by == "partner" && *remaining == dec!(300)
    ));
    assert_eq!(
        seen[1],
        Notification::LowBalance {
            remaining: dec!(300),
            threshold: dec!(1000),
        }
    );
}

#[tokio::test]
async fn rejected_sales_do_not_notify() {
    let (engine, _db, sink) = engine_with_db().await;
    intake(&engine, dec!(10), dec!(15)).await; // 150

    let err = engine
        .finalize_sale(sale(dec!(100), dec!(1000), dec!(15.5), "partner"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientInventory { .. }));
    assert!(sink.seen().is_empty());
}

#[tokio::test]
async fn concurrent_sales_cannot_overdraw_the_lots() {
    let (engine, db, _sink) = engine_with_db().await;
    intake(&engine, dec!(100), dec!(15)).await; // 1500, each sale needs 1200

    let first = engine.clone();
    let second = engine.clone();
    let (a, b) = tokio::join!(
        first.finalize_sale(sale(dec!(100), dec!(1150), dec!(15.5), "owner")),
        second.finalize_sale(sale(dec!(100), dec!(1150), dec!(15.5), "partner")),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = a.err().or(b.err()).unwrap();
    assert_eq!(
        failure,
        EngineError::InsufficientInventory {
            requested: dec!(1200),
            available: dec!(300),
        }
    );

    let ledger = engine.inventory_ledger().await.unwrap();
    assert_eq!(ledger.total_remaining().unwrap(), dec!(300));
    assert_eq!(count_rows(&db, "customer_transactions").await, 1);
}

#[tokio::test]
async fn delete_sale_keeps_lots_consumed() {
    let (engine, db, _sink) = engine_with_db().await;
    intake(&engine, dec!(1000), dec!(15.5)).await;
    let receipt = engine
        .finalize_sale(sale(dec!(100), dec!(1150), dec!(15.5), "owner"))
        .await
        .unwrap();

    let deleted = engine
        .delete_sale(receipt.transaction.id, "owner")
        .await
        .unwrap();
    assert_eq!(deleted, receipt.transaction);

    assert_eq!(count_rows(&db, "customer_transactions").await, 0);
    assert_eq!(count_rows(&db, "lot_usages").await, 0);
    let ledger = engine.inventory_ledger().await.unwrap();
    assert_eq!(ledger.total_remaining().unwrap(), dec!(14300));

    let err = engine
        .delete_sale(receipt.transaction.id, "owner")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::KeyNotFound("transaction not exists".to_string())
    );
}

#[tokio::test]
async fn profit_summary_adds_up_sales() {
    let (engine, _db, sink) = engine_with_db().await;
    intake(&engine, dec!(1000), dec!(15.5)).await;

    let empty = engine.profit_summary().await.unwrap();
    assert_eq!(empty.transactions, 0);
    assert_eq!(empty.total_owner_profit, Decimal::ZERO);

    let mut expected = Decimal::ZERO;
    for source in [dec!(100), dec!(40)] {
        let receipt = engine
            .finalize_sale(sale(source, source * dec!(11.5), dec!(15.5), "owner"))
            .await
            .unwrap();
        expected += receipt.transaction.owner_profit;
    }

    let summary = engine.report_profit().await.unwrap();
    assert_eq!(summary.transactions, 2);
    assert_eq!(summary.total_owner_profit, expected);
    assert_eq!(
        sink.seen(),
        vec![Notification::ProfitSummary {
            total_owner_profit: expected,
            transactions: 2,
        }]
    );

    let history = engine.sales_history(1).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn standalone_deduction_is_all_or_nothing() {
    let (engine, _db, _sink) = engine_with_db().await;
    intake(&engine, dec!(100), dec!(10)).await; // 1000 @ 0.1

    let err = engine.deduct_inventory(dec!(1000.5)).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientInventory { .. }));
    assert_eq!(
        engine.inventory_ledger().await.unwrap().total_remaining().unwrap(),
        dec!(1000)
    );

    let deduction = engine.deduct_inventory(dec!(1000)).await.unwrap();
    assert_eq!(deduction.total_cost, dec!(100));
    let summary = engine.inventory_summary().await.unwrap();
    assert_eq!(summary.total_remaining, Decimal::ZERO);
    assert_eq!(summary.open_lots, 0);
    assert_eq!(summary.average_rate, None);
}

#[tokio::test]
async fn payout_equal_to_owner_share_commits() {
    let (engine, _db, _sink) = engine_with_db().await;
    intake(&engine, dec!(1000), dec!(15.5)).await;

    let receipt = engine
        .finalize_sale(sale(dec!(100), dec!(1200), dec!(15.5), "owner"))
        .await
        .unwrap();
    assert_eq!(receipt.transaction.actual_target_paid, dec!(1200));
    assert_eq!(receipt.remaining, dec!(14300));
}

#[tokio::test]
async fn remaining_at_threshold_is_not_low() {
    let (engine, _db, sink) = engine_with_db().await;
    intake(&engine, dec!(100), dec!(22)).await; // 2200

    let receipt = engine
        .finalize_sale(sale(dec!(100), dec!(1150), dec!(15.5), "owner"))
        .await
        .unwrap();
    assert_eq!(receipt.remaining, engine.low_balance_threshold());
    assert!(!receipt.low_balance);
    assert!(sink.seen().is_empty());
}

#[tokio::test]
async fn oversized_amounts_are_rejected_without_panicking() {
    let (engine, db, _sink) = engine_with_db().await;

    let err = engine
        .record_intake(RecordIntakeCmd::new(
            dec!(50000000000000000000000000000),
            IntakeRate::Fixed(dec!(2)),
            "owner",
            at(0),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("target received overflows".to_string())
    );
    assert_eq!(count_rows(&db, "bulk_intakes").await, 0);
    assert_eq!(count_rows(&db, "inventory_lots").await, 0);

    intake(&engine, dec!(1000), dec!(15.5)).await;
    let rates = DerivedRates::from_market(dec!(15.5)).unwrap();
    let err = engine
        .finalize_sale(FinalizeSaleCmd {
            source_received: dec!(50000000000000000000000000000),
            actual_target_paid: Decimal::ZERO,
            suggested_target: Decimal::ZERO,
            rates,
            recorded_by: "owner".to_string(),
            recorded_at: at(10),
            note: None,
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("owner share overflows".to_string())
    );
    assert_eq!(
        engine.inventory_ledger().await.unwrap().total_remaining().unwrap(),
        dec!(15500)
    );
    assert_eq!(count_rows(&db, "customer_transactions").await, 0);

    engine
        .record_market_rate(Decimal::MAX, "system", at(20))
        .await
        .unwrap();
    let err = engine.quote_sale(dec!(2)).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("suggested target overflows".to_string())
    );
}

#[tokio::test]
async fn quote_rejects_rates_that_floor_to_zero() {
    let (engine, _db, _sink) = engine_with_db().await;
    engine
        .record_market_rate(dec!(0.65), "owner", at(0))
        .await
        .unwrap();

    let err = engine.quote_sale(dec!(100)).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("intermediary rate must be > 0".to_string())
    );
}

#[tokio::test]
async fn sales_history_breaks_timestamp_ties_by_insertion() {
    let (engine, _db, _sink) = engine_with_db().await;
    intake(&engine, dec!(1000), dec!(15.5)).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let receipt = engine
            .finalize_sale(sale(dec!(10), dec!(115), dec!(15.5), "owner"))
            .await
            .unwrap();
        ids.push(receipt.transaction.id);
    }
    ids.reverse();

    let history: Vec<_> = engine
        .sales_history(10)
        .await
        .unwrap()
        .into_iter()
        .map(|tx| tx.id)
        .collect();
    assert_eq!(history, ids);
}
