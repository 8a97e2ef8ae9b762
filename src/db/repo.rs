//! Repository layer for database operations.
//!
//! All mutation paths that touch an opportunity and its history run in a
//! single transaction, so an accepted stage change commits the updated row
//! and its history entry together or not at all. Decimal columns are stored
//! as canonical strings; SQLite REAL would truncate money values.

use crate::domain::{
    ActorId, Decimal, Opportunity, OpportunityId, PartnerId, PartnerRateBook, PipelineStage,
    StageHistoryEntry, TimeMs,
};
use crate::engine::StageTransition;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Per-stage aggregate over all opportunities, computed in Rust with
/// Decimal sums to avoid SQLite's float SUM.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub stage: PipelineStage,
    pub count: i64,
    pub total_amount: Decimal,
    pub total_weighted_value: Decimal,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Connectivity probe for the readiness endpoint: fails until the
    /// schema has been applied.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT COUNT(*) FROM opportunities")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Opportunity operations
    // =========================================================================

    /// Insert a new opportunity together with its first history entry
    /// (previous stage NULL) in one transaction.
    ///
    /// # Errors
    /// Returns an error if any insert fails; nothing is committed partially.
    pub async fn create_opportunity(
        &self,
        opportunity: &Opportunity,
        first_entry: &StageHistoryEntry,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO opportunities
            (id, name, amount, stage, probability, weighted_value, actual_close_ms, created_ms, updated_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(opportunity.id.to_string())
        .bind(&opportunity.name)
        .bind(opportunity.amount.to_canonical_string())
        .bind(opportunity.stage.as_str())
        .bind(opportunity.probability as i64)
        .bind(opportunity.weighted_value.to_canonical_string())
        .bind(opportunity.actual_close_ms.map(|t| t.as_i64()))
        .bind(opportunity.created_ms.as_i64())
        .bind(opportunity.updated_ms.as_i64())
        .execute(&mut *tx)
        .await?;

        Self::append_history(&mut tx, first_entry).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Fetch one opportunity by id.
    pub async fn get_opportunity(
        &self,
        id: OpportunityId,
    ) -> Result<Option<Opportunity>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, amount, stage, probability, weighted_value,
                   actual_close_ms, created_ms, updated_ms
            FROM opportunities
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode_opportunity(&r)).transpose()
    }

    /// List all opportunities in creation order.
    pub async fn list_opportunities(&self) -> Result<Vec<Opportunity>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, amount, stage, probability, weighted_value,
                   actual_close_ms, created_ms, updated_ms
            FROM opportunities
            ORDER BY created_ms ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_opportunity).collect()
    }

    /// Persist an accepted stage transition: the opportunity UPDATE and the
    /// history INSERT commit in one transaction.
    ///
    /// # Errors
    /// `RowNotFound` if the opportunity no longer exists; any other failure
    /// rolls back both writes.
    pub async fn apply_stage_change(
        &self,
        transition: &StageTransition,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let opp = &transition.opportunity;

        let result = sqlx::query(
            r#"
            UPDATE opportunities
            SET stage = ?, probability = ?, weighted_value = ?,
                actual_close_ms = ?, updated_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(opp.stage.as_str())
        .bind(opp.probability as i64)
        .bind(opp.weighted_value.to_canonical_string())
        .bind(opp.actual_close_ms.map(|t| t.as_i64()))
        .bind(opp.updated_ms.as_i64())
        .bind(opp.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Self::append_history(&mut tx, &transition.history).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn append_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        entry: &StageHistoryEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO stage_history
            (opportunity_id, previous_stage, new_stage, actor, note, time_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.opportunity_id.to_string())
        .bind(entry.previous_stage.map(|s| s.as_str()))
        .bind(entry.new_stage.as_str())
        .bind(entry.actor.as_str())
        .bind(entry.note.as_deref())
        .bind(entry.time_ms.as_i64())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// History entries for an opportunity in chronological order.
    pub async fn list_stage_history(
        &self,
        id: OpportunityId,
    ) -> Result<Vec<StageHistoryEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT opportunity_id, previous_stage, new_stage, actor, note, time_ms
            FROM stage_history
            WHERE opportunity_id = ?
            ORDER BY time_ms ASC, id ASC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_history_entry).collect()
    }

    // =========================================================================
    // Partner rate operations
    // =========================================================================

    /// Negotiated override rate for a partner, or None.
    pub async fn partner_rate(&self, partner: &PartnerId) -> Result<Option<f64>, sqlx::Error> {
        let row = sqlx::query("SELECT rate FROM partner_rates WHERE partner_id = ?")
            .bind(partner.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| {
            let rate_str: String = r.get("rate");
            match rate_str.parse::<f64>() {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warn!(partner = %partner, rate = %rate_str, error = %e,
                          "Failed to parse partner rate, ignoring override");
                    None
                }
            }
        }))
    }

    /// Upsert a partner's override rate.
    pub async fn set_partner_rate(
        &self,
        partner: &PartnerId,
        rate: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO partner_rates (partner_id, rate)
            VALUES (?, ?)
            ON CONFLICT(partner_id) DO UPDATE SET rate = excluded.rate
            "#,
        )
        .bind(partner.as_str())
        .bind(rate.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Hydrate the full rate book, for callers that compute many partner
    /// commissions in one pass.
    pub async fn load_partner_rate_book(&self) -> Result<PartnerRateBook, sqlx::Error> {
        let rows = sqlx::query("SELECT partner_id, rate FROM partner_rates")
            .fetch_all(&self.pool)
            .await?;

        let mut book = PartnerRateBook::new();
        for row in rows {
            let partner: String = row.get("partner_id");
            let rate_str: String = row.get("rate");
            match rate_str.parse::<f64>() {
                Ok(rate) => book.set(PartnerId::new(partner), rate),
                Err(e) => {
                    warn!(partner = %partner, rate = %rate_str, error = %e,
                          "Failed to parse partner rate, skipping");
                }
            }
        }
        Ok(book)
    }

    // =========================================================================
    // Pipeline aggregation
    // =========================================================================

    /// Per-stage counts, totals, and weighted totals.
    ///
    /// # Implementation Note
    ///
    /// Rows are fetched and summed in Rust with the Decimal type. SQLite's
    /// SUM aggregate returns REAL, which loses precision for money columns
    /// stored as strings.
    pub async fn pipeline_summary(&self) -> Result<Vec<StageSummary>, sqlx::Error> {
        let opportunities = self.list_opportunities().await?;

        let mut summaries: Vec<StageSummary> = PipelineStage::ALL
            .iter()
            .map(|&stage| StageSummary {
                stage,
                count: 0,
                total_amount: Decimal::zero(),
                total_weighted_value: Decimal::zero(),
            })
            .collect();

        for summary in &mut summaries {
            for opp in opportunities.iter().filter(|o| o.stage == summary.stage) {
                summary.count += 1;
                summary.total_amount = summary.total_amount + opp.amount;
                summary.total_weighted_value = summary.total_weighted_value + opp.weighted_value;
            }
        }

        Ok(summaries)
    }
}

fn decode_opportunity(row: &SqliteRow) -> Result<Opportunity, sqlx::Error> {
    let id_str: String = row.get("id");
    let id = OpportunityId::parse(&id_str)
        .map_err(|e| decode_error(format!("bad opportunity id {}: {}", id_str, e)))?;

    let stage_str: String = row.get("stage");
    let stage = PipelineStage::from_wire(&stage_str)
        .ok_or_else(|| decode_error(format!("unrecognized stage in storage: {}", stage_str)))?;

    let probability_raw: i64 = row.get("probability");
    let probability = u8::try_from(probability_raw)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| decode_error(format!("probability out of range: {}", probability_raw)))?;

    Ok(Opportunity {
        id,
        name: row.get("name"),
        amount: decode_decimal(row, "amount"),
        stage,
        probability,
        weighted_value: decode_decimal(row, "weighted_value"),
        actual_close_ms: row
            .get::<Option<i64>, _>("actual_close_ms")
            .map(TimeMs::new),
        created_ms: TimeMs::new(row.get("created_ms")),
        updated_ms: TimeMs::new(row.get("updated_ms")),
    })
}

fn decode_history_entry(row: &SqliteRow) -> Result<StageHistoryEntry, sqlx::Error> {
    let id_str: String = row.get("opportunity_id");
    let opportunity_id = OpportunityId::parse(&id_str)
        .map_err(|e| decode_error(format!("bad opportunity id {}: {}", id_str, e)))?;

    let previous_stage = match row.get::<Option<String>, _>("previous_stage") {
        None => None,
        Some(s) => Some(
            PipelineStage::from_wire(&s)
                .ok_or_else(|| decode_error(format!("unrecognized stage in history: {}", s)))?,
        ),
    };

    let new_stage_str: String = row.get("new_stage");
    let new_stage = PipelineStage::from_wire(&new_stage_str).ok_or_else(|| {
        decode_error(format!("unrecognized stage in history: {}", new_stage_str))
    })?;

    Ok(StageHistoryEntry {
        opportunity_id,
        previous_stage,
        new_stage,
        actor: ActorId::new(row.get::<String, _>("actor")),
        note: row.get("note"),
        time_ms: TimeMs::new(row.get("time_ms")),
    })
}

fn decode_decimal(row: &SqliteRow, column: &str) -> Decimal {
    let raw: String = row.get(column);
    Decimal::from_str(&raw).unwrap_or_else(|e| {
        warn!(column = column, value = %raw, error = %e,
              "Failed to parse stored decimal, using default");
        Decimal::default()
    })
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn opportunity(stage: PipelineStage, amount: &str, probability: u8) -> Opportunity {
        let amount = Decimal::from_str(amount).unwrap();
        Opportunity {
            id: OpportunityId::generate(),
            name: "Acme pilot".to_string(),
            amount,
            stage,
            probability,
            weighted_value: crate::engine::recompute_weighted_value(amount, probability),
            actual_close_ms: None,
            created_ms: TimeMs::new(1000),
            updated_ms: TimeMs::new(1000),
        }
    }

    fn first_entry(opp: &Opportunity) -> StageHistoryEntry {
        StageHistoryEntry {
            opportunity_id: opp.id,
            previous_stage: None,
            new_stage: opp.stage,
            actor: ActorId::new("user-1"),
            note: None,
            time_ms: opp.created_ms,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_opportunity() {
        let (repo, _temp) = setup_test_db().await;

        let opp = opportunity(PipelineStage::Lead, "100000", 10);
        repo.create_opportunity(&opp, &first_entry(&opp))
            .await
            .expect("create failed");

        let fetched = repo.get_opportunity(opp.id).await.unwrap();
        assert_eq!(fetched, Some(opp.clone()));

        let history = repo.list_stage_history(opp.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_stage, None);
        assert_eq!(history[0].new_stage, PipelineStage::Lead);
    }

    #[tokio::test]
    async fn test_get_missing_opportunity_is_none() {
        let (repo, _temp) = setup_test_db().await;
        let result = repo.get_opportunity(OpportunityId::generate()).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_apply_stage_change_commits_both_writes() {
        let (repo, _temp) = setup_test_db().await;

        let opp = opportunity(PipelineStage::Lead, "100000", 10);
        repo.create_opportunity(&opp, &first_entry(&opp))
            .await
            .unwrap();

        let transition = crate::engine::apply_stage_change(
            &opp,
            "demo",
            ActorId::new("user-2"),
            Some("intro call done".to_string()),
            crate::engine::ProbabilityPolicy::OverwriteWithStageDefault,
            TimeMs::new(2000),
        )
        .unwrap();

        repo.apply_stage_change(&transition).await.unwrap();

        let fetched = repo.get_opportunity(opp.id).await.unwrap().unwrap();
        assert_eq!(fetched.stage, PipelineStage::Demo);
        assert_eq!(fetched.probability, 25);

        let history = repo.list_stage_history(opp.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].previous_stage, Some(PipelineStage::Lead));
        assert_eq!(history[1].note.as_deref(), Some("intro call done"));
    }

    #[tokio::test]
    async fn test_apply_stage_change_for_missing_opportunity_writes_nothing() {
        let (repo, _temp) = setup_test_db().await;

        let opp = opportunity(PipelineStage::Lead, "100000", 10);
        let transition = crate::engine::apply_stage_change(
            &opp,
            "demo",
            ActorId::new("user-1"),
            None,
            crate::engine::ProbabilityPolicy::OverwriteWithStageDefault,
            TimeMs::new(2000),
        )
        .unwrap();

        let result = repo.apply_stage_change(&transition).await;
        assert!(matches!(result, Err(sqlx::Error::RowNotFound)));

        let history = repo.list_stage_history(opp.id).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_partner_rate_seeded_and_upserted() {
        let (repo, _temp) = setup_test_db().await;

        let premium = PartnerId::new("partner-premium-001");
        assert_eq!(repo.partner_rate(&premium).await.unwrap(), Some(0.18));
        assert_eq!(
            repo.partner_rate(&PartnerId::new("unknown")).await.unwrap(),
            None
        );

        repo.set_partner_rate(&premium, 0.22).await.unwrap();
        assert_eq!(repo.partner_rate(&premium).await.unwrap(), Some(0.22));

        let book = repo.load_partner_rate_book().await.unwrap();
        assert_eq!(book.rate_for(&premium), Some(0.22));
        assert_eq!(book.len(), 2);
    }

    #[tokio::test]
    async fn test_pipeline_summary_sums_per_stage() {
        let (repo, _temp) = setup_test_db().await;

        let a = opportunity(PipelineStage::Lead, "100000", 10);
        let b = opportunity(PipelineStage::Lead, "50000", 10);
        let c = opportunity(PipelineStage::Proposal, "200000", 75);
        for opp in [&a, &b, &c] {
            repo.create_opportunity(opp, &first_entry(opp)).await.unwrap();
        }

        let summary = repo.pipeline_summary().await.unwrap();
        assert_eq!(summary.len(), PipelineStage::ALL.len());

        let lead = summary
            .iter()
            .find(|s| s.stage == PipelineStage::Lead)
            .unwrap();
        assert_eq!(lead.count, 2);
        assert_eq!(lead.total_amount, Decimal::from_str("150000").unwrap());
        assert_eq!(
            lead.total_weighted_value,
            Decimal::from_str("15000").unwrap()
        );

        let won = summary
            .iter()
            .find(|s| s.stage == PipelineStage::ClosedWon)
            .unwrap();
        assert_eq!(won.count, 0);
        assert_eq!(won.total_amount, Decimal::zero());
    }
}
