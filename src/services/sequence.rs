use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::{sea_query::{Expr, OnConflict}, ActiveValue::Set, ConnectionTrait, EntityTrait};
use tracing::debug;
use uuid::Uuid;

use super::catalog::BranchProfile;
use crate::entities::order_sequence;
use crate::errors::ServiceError;

/// Branch-local calendar date of `now`. The sequence resets when it changes.
pub fn business_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// `{BRANCH_CODE}-{YYYYMMDD}-{SEQ}` with the sequence zero-padded to four digits.
pub fn format_order_code(branch_code: &str, date: NaiveDate, seq: i64) -> String {
    format!("{}-{}-{:04}", branch_code, date.format("%Y%m%d"), seq)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedCode {
    pub business_date: NaiveDate,
    pub seq: i64,
    pub code: String,
}

/// Hands out per-branch, per-day order numbers from the `order_sequences`
/// counter.
///
/// The counter is bumped with a single upsert inside the caller's
/// transaction. The row stays write-locked until that transaction ends, so
/// concurrent allocations for the same branch and day queue behind each
/// other. A rolled-back order leaves a gap, never a duplicate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceAllocator;

impl SequenceAllocator {
    pub async fn next_seq<C: ConnectionTrait>(
        conn: &C,
        branch_id: Uuid,
        date: NaiveDate,
    ) -> Result<i64, ServiceError> {
        let row = order_sequence::Entity::insert(order_sequence::ActiveModel {
            branch_id: Set(branch_id),
            business_date: Set(date),
            last_seq: Set(1),
        })
        .on_conflict(
            OnConflict::columns([
                order_sequence::Column::BranchId,
                order_sequence::Column::BusinessDate,
            ])
            .value(
                order_sequence::Column::LastSeq,
                Expr::col((order_sequence::Entity, order_sequence::Column::LastSeq)).add(1),
            )
            .to_owned(),
        )
        .exec_with_returning(conn)
        .await?;
        Ok(row.last_seq)
    }

    pub async fn allocate<C: ConnectionTrait>(
        conn: &C,
        branch: &BranchProfile,
        now: DateTime<Utc>,
    ) -> Result<AllocatedCode, ServiceError> {
        let date = business_date(now, branch.offset());
        let seq = Self::next_seq(conn, branch.id, date).await?;
        let code = format_order_code(&branch.code, date, seq);
        debug!(branch_id = %branch.id, %date, seq, %code, "Allocated order code");
        Ok(AllocatedCode {
            business_date: date,
            seq,
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn code_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
        assert_eq!(format_order_code("CAS", date, 2), "CAS-20251028-0002");
        assert_eq!(format_order_code("CAS", date, 12345), "CAS-20251028-12345");
    }

    #[test]
    fn business_date_uses_branch_offset() {
        // 17:30 UTC is already the next day at UTC+7
        let now = Utc.with_ymd_and_hms(2025, 10, 27, 17, 30, 0).unwrap();
        let plus7 = FixedOffset::east_opt(7 * 3600).unwrap();
        assert_eq!(
            business_date(now, plus7),
            NaiveDate::from_ymd_opt(2025, 10, 28).unwrap()
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            business_date(now, utc),
            NaiveDate::from_ymd_opt(2025, 10, 27).unwrap()
        );
    }
}
