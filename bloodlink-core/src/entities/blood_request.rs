use crate::entities::BloodType;
use crate::framework::DatabaseProcessor;
use bloodlink_sdk::objects::RequestStatus as SdkRequestStatus;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BloodRequest {
    pub id: Uuid,
    pub seeker_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    pub location_url: Option<String>,
    pub patient_name: Option<String>,
    pub quantity: Option<String>,
    pub status: RequestStatus,
    /// Donors who accepted, in acceptance order. Never contains duplicates.
    pub accepted_by: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "request_status")]
pub enum RequestStatus {
    Pending,
    Fulfilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request cannot move from {from:?} to {to:?}")]
pub struct RequestTransitionError {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

impl RequestStatus {
    /// Validate a status change. Staying put is always allowed; a fulfilled
    /// request never reopens.
    pub fn transition(self, to: RequestStatus) -> Result<RequestStatus, RequestTransitionError> {
        match (self, to) {
            (a, b) if a == b => Ok(b),
            (RequestStatus::Pending, RequestStatus::Fulfilled) => Ok(to),
            (from, to) => Err(RequestTransitionError { from, to }),
        }
    }
}

impl From<RequestStatus> for SdkRequestStatus {
    fn from(value: RequestStatus) -> Self {
        match value {
            RequestStatus::Pending => SdkRequestStatus::Pending,
            RequestStatus::Fulfilled => SdkRequestStatus::Fulfilled,
        }
    }
}

impl From<SdkRequestStatus> for RequestStatus {
    fn from(value: SdkRequestStatus) -> Self {
        match value {
            SdkRequestStatus::Pending => RequestStatus::Pending,
            SdkRequestStatus::Fulfilled => RequestStatus::Fulfilled,
        }
    }
}

/// Data for inserting a new blood request. New requests always start pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBloodRequest {
    pub seeker_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    pub location_url: Option<String>,
    pub patient_name: Option<String>,
    pub quantity: Option<String>,
}

const REQUEST_COLUMNS: &str = "id, seeker_id, blood_type, location, location_url, patient_name, \
    quantity, status, accepted_by, created_at, updated_at";

impl Processor<NewBloodRequest> for DatabaseProcessor {
    type Output = BloodRequest;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertBloodRequest")]
    async fn process(&self, insert: NewBloodRequest) -> Result<BloodRequest, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO blood_requests
            (id, seeker_id, blood_type, location, location_url, patient_name, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {REQUEST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BloodRequest>(&sql)
            .bind(Uuid::now_v7())
            .bind(insert.seeker_id)
            .bind(insert.blood_type)
            .bind(insert.location)
            .bind(insert.location_url)
            .bind(insert.patient_name)
            .bind(insert.quantity)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetBloodRequestById {
    pub id: Uuid,
}

impl Processor<GetBloodRequestById> for DatabaseProcessor {
    type Output = Option<BloodRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBloodRequestById")]
    async fn process(
        &self,
        query: GetBloodRequestById,
    ) -> Result<Option<BloodRequest>, sqlx::Error> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM blood_requests WHERE id = $1");
        sqlx::query_as::<_, BloodRequest>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Persist status and descriptive fields. `accepted_by` is left alone; use
/// [`AddAcceptedDonor`] for that.
pub struct SaveBloodRequest {
    pub request: BloodRequest,
}

impl Processor<SaveBloodRequest> for DatabaseProcessor {
    type Output = BloodRequest;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SaveBloodRequest")]
    async fn process(&self, query: SaveBloodRequest) -> Result<BloodRequest, sqlx::Error> {
        let request = query.request;
        let sql = format!(
            r#"
            UPDATE blood_requests SET
                location = $2,
                location_url = $3,
                patient_name = $4,
                quantity = $5,
                status = $6,
                updated_at = now()
            WHERE id = $1
            RETURNING {REQUEST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BloodRequest>(&sql)
            .bind(request.id)
            .bind(request.location)
            .bind(request.location_url)
            .bind(request.patient_name)
            .bind(request.quantity)
            .bind(request.status)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Append a donor to `accepted_by` unless already present.
///
/// The membership check and append happen in one statement, so concurrent
/// acceptances by the same donor add them exactly once. Returns `None` when
/// the donor was already present (or the request does not exist).
pub struct AddAcceptedDonor {
    pub request_id: Uuid,
    pub donor_id: Uuid,
}

impl Processor<AddAcceptedDonor> for DatabaseProcessor {
    type Output = Option<BloodRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AddAcceptedDonor")]
    async fn process(&self, query: AddAcceptedDonor) -> Result<Option<BloodRequest>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE blood_requests SET
                accepted_by = array_append(accepted_by, $2),
                updated_at = now()
            WHERE id = $1 AND NOT ($2 = ANY(accepted_by))
            RETURNING {REQUEST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BloodRequest>(&sql)
            .bind(query.request_id)
            .bind(query.donor_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Most recent requests first.
pub struct ListBloodRequests {
    pub limit: i64,
}

impl Processor<ListBloodRequests> for DatabaseProcessor {
    type Output = Vec<BloodRequest>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListBloodRequests")]
    async fn process(&self, query: ListBloodRequests) -> Result<Vec<BloodRequest>, sqlx::Error> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM blood_requests ORDER BY created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, BloodRequest>(&sql)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_transitions() {
        assert_eq!(
            RequestStatus::Pending.transition(RequestStatus::Fulfilled),
            Ok(RequestStatus::Fulfilled)
        );
        assert_eq!(
            RequestStatus::Fulfilled.transition(RequestStatus::Fulfilled),
            Ok(RequestStatus::Fulfilled)
        );
        assert!(
            RequestStatus::Fulfilled
                .transition(RequestStatus::Pending)
                .is_err()
        );
    }
}
