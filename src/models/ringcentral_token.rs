// Stored RingCentral OAuth tokens, one row per user

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::ringcentral_tokens;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = ringcentral_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RingCentralToken {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ringcentral_tokens)]
pub struct NewRingCentralToken {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// Safety margin so a token is not handed out seconds before it expires
const EXPIRY_SKEW_SECS: i64 = 60;

impl RingCentralToken {
    pub fn access_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > now
    }

    /// Refresh tokens without a recorded expiry are assumed usable
    pub fn refresh_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token_expires_at.map_or(true, |exp| exp > now)
    }

    pub async fn find_by_user(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::ringcentral_tokens::dsl;

        dsl::ringcentral_tokens
            .filter(dsl::user_id.eq(user_id))
            .select(RingCentralToken::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Insert or replace the user's token row
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        token: NewRingCentralToken,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::ringcentral_tokens::dsl;

        diesel::insert_into(dsl::ringcentral_tokens)
            .values(&token)
            .on_conflict(dsl::user_id)
            .do_update()
            .set((
                dsl::access_token.eq(excluded(dsl::access_token)),
                dsl::refresh_token.eq(excluded(dsl::refresh_token)),
                dsl::expires_at.eq(excluded(dsl::expires_at)),
                dsl::refresh_token_expires_at.eq(excluded(dsl::refresh_token_expires_at)),
                dsl::scope.eq(excluded(dsl::scope)),
                dsl::updated_at.eq(Utc::now()),
            ))
            .returning(RingCentralToken::as_returning())
            .get_result(conn)
            .await
    }
}
