//! Initial schema migration.
//!
//! - `market_rates`: append-only log of market rates
//! - `bulk_intakes`: source-currency capital converted into stock
//! - `inventory_lots`: one lot per intake, consumed FIFO by id
//! - `customer_transactions`: finalized sales
//! - `lot_usages`: which lots funded which sale
//!
//! Amounts and rates are stored as decimal strings.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum MarketRates {
    Table,
    Id,
    Rate,
    RecordedAt,
    EnteredBy,
}

#[derive(Iden)]
enum BulkIntakes {
    Table,
    Id,
    SourceAmount,
    RateApplied,
    TargetReceived,
    RecordedAt,
    RecordedBy,
    Note,
}

#[derive(Iden)]
enum InventoryLots {
    Table,
    Id,
    BulkIntakeId,
    RemainingQuantity,
    UnitCost,
}

#[derive(Iden)]
enum CustomerTransactions {
    Table,
    Id,
    SourceReceived,
    SuggestedTarget,
    ActualTargetPaid,
    MarketRateAtTime,
    OwnerRateAtTime,
    IntermediaryRateAtTime,
    OwnerProfit,
    RecordedAt,
    RecordedBy,
    Note,
}

#[derive(Iden)]
enum LotUsages {
    Table,
    TransactionId,
    LotId,
    QuantityUsed,
    UnitCost,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Market rates
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(MarketRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketRates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MarketRates::Rate).string().not_null())
                    .col(ColumnDef::new(MarketRates::RecordedAt).timestamp().not_null())
                    .col(ColumnDef::new(MarketRates::EnteredBy).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-market_rates-recorded_at")
                    .table(MarketRates::Table)
                    .col(MarketRates::RecordedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Bulk intakes
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BulkIntakes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BulkIntakes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BulkIntakes::SourceAmount).string().not_null())
                    .col(ColumnDef::new(BulkIntakes::RateApplied).string().not_null())
                    .col(ColumnDef::new(BulkIntakes::TargetReceived).string().not_null())
                    .col(ColumnDef::new(BulkIntakes::RecordedAt).timestamp().not_null())
                    .col(ColumnDef::new(BulkIntakes::RecordedBy).string().not_null())
                    .col(ColumnDef::new(BulkIntakes::Note).string())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Inventory lots
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(InventoryLots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryLots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InventoryLots::BulkIntakeId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryLots::RemainingQuantity)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryLots::UnitCost).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-inventory_lots-bulk_intake_id")
                            .from(InventoryLots::Table, InventoryLots::BulkIntakeId)
                            .to(BulkIntakes::Table, BulkIntakes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-inventory_lots-bulk_intake_id-unique")
                    .table(InventoryLots::Table)
                    .col(InventoryLots::BulkIntakeId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Customer transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CustomerTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomerTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::SourceReceived)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::SuggestedTarget)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::ActualTargetPaid)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::MarketRateAtTime)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::OwnerRateAtTime)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::IntermediaryRateAtTime)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::OwnerProfit)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomerTransactions::RecordedBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CustomerTransactions::Note).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-customer_transactions-recorded_at")
                    .table(CustomerTransactions::Table)
                    .col(CustomerTransactions::RecordedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Lot usages
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LotUsages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LotUsages::TransactionId).string().not_null())
                    .col(ColumnDef::new(LotUsages::LotId).integer().not_null())
                    .col(ColumnDef::new(LotUsages::QuantityUsed).string().not_null())
                    .col(ColumnDef::new(LotUsages::UnitCost).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(LotUsages::TransactionId)
                            .col(LotUsages::LotId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-lot_usages-transaction_id")
                            .from(LotUsages::Table, LotUsages::TransactionId)
                            .to(CustomerTransactions::Table, CustomerTransactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-lot_usages-lot_id")
                            .from(LotUsages::Table, LotUsages::LotId)
                            .to(InventoryLots::Table, InventoryLots::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-lot_usages-lot_id")
                    .table(LotUsages::Table)
                    .col(LotUsages::LotId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Children first.
        manager
            .drop_table(Table::drop().table(LotUsages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomerTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InventoryLots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BulkIntakes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MarketRates::Table).to_owned())
            .await?;
        Ok(())
    }
}
