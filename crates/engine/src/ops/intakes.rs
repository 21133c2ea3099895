use sea_orm::{QueryOrder, TransactionTrait, prelude::*};

use crate::{
    BulkIntake, EngineError, IntakeFigures, IntakeRate, RecordIntakeCmd, ResultEngine, intakes,
    inventory,
    util::{ensure_positive, normalize_optional_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Record a bulk intake and open the matching inventory lot.
    ///
    /// The intake row and its lot are written in the same transaction. With
    /// [`IntakeRate::Current`] the latest market rate is used, failing with
    /// `NoRateAvailable` when none was recorded.
    pub async fn record_intake(&self, cmd: RecordIntakeCmd) -> ResultEngine<BulkIntake> {
        ensure_positive(cmd.source_amount, "source amount")?;
        if let IntakeRate::Fixed(rate) = cmd.rate {
            ensure_positive(rate, "rate applied")?;
        }
        let note = normalize_optional_text(cmd.note.as_deref());
        let _guard = self.write_lock.lock().await;
        with_tx!(self, |db_tx| {
            let rate_applied = match cmd.rate {
                IntakeRate::Fixed(rate) => rate,
                IntakeRate::Current => {
                    self.latest_market_rate_in(&db_tx)
                        .await?
                        .ok_or(EngineError::NoRateAvailable)?
                        .value
                }
            };
            let figures = IntakeFigures::compute(cmd.source_amount, rate_applied)?;

            let model = intakes::ActiveModel::new_intake(
                cmd.source_amount,
                rate_applied,
                figures,
                &cmd.recorded_by,
                cmd.recorded_at,
                note,
            )
            .insert(&db_tx)
            .await?;
            let intake = BulkIntake::try_from(model)?;

            let lot =
                inventory::ActiveModel::new_lot(intake.id, figures.target_received, figures.unit_cost)
                    .insert(&db_tx)
                    .await?;

            tracing::info!(
                intake_id = intake.id,
                lot_id = lot.id,
                source_amount = %intake.source_amount,
                rate = %intake.rate_applied,
                target_received = %intake.target_received,
                "bulk intake recorded"
            );
            Ok(intake)
        })
    }

    /// Every bulk intake, oldest first.
    pub async fn bulk_intakes(&self) -> ResultEngine<Vec<BulkIntake>> {
        with_tx!(self, |db_tx| {
            intakes::Entity::find()
                .order_by_asc(intakes::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(BulkIntake::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
