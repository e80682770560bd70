use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::routes::notification::model::NotificationDraft;

/// Sole writer of the user-to-shelter relationship. Both sides of the
/// invariant (the user's shelter pointer and the shelter's occupant list)
/// are only ever mutated here, inside a single transaction, so a completed
/// enter or leave always leaves them mutually consistent.
pub struct Occupancy;

/// The presence writes an enter requires, decided from the state read at the
/// start of the operation.
#[derive(Debug, PartialEq)]
pub struct EnterPlan {
    /// Shelter to remove the user from first, when moving between shelters.
    pub leave_prior: Option<String>,
    /// Whether the user is joining the occupant list (as opposed to
    /// re-entering a shelter they are already in).
    pub new_entry: bool,
}

pub fn plan_enter(
    current_shelter: Option<&str>,
    target_shelter: &str,
    already_present: bool,
) -> EnterPlan {
    let leave_prior = current_shelter
        .filter(|prior| *prior != target_shelter)
        .map(str::to_string);

    EnterPlan {
        leave_prior,
        new_entry: !already_present,
    }
}

/// Everyone already in the shelter gets notified about the new arrival;
/// the entering user never notifies themselves.
pub fn fanout_recipients(occupants: &[String], entering_user: &str) -> Vec<String> {
    occupants
        .iter()
        .filter(|id| id.as_str() != entering_user)
        .cloned()
        .collect()
}

#[derive(Debug, Serialize)]
pub struct PeopleCountResponse {
    pub people_count: i64,
}

/// Result of a completed enter: the new occupancy count plus the
/// notifications the caller should record once the write has committed.
#[derive(Debug)]
pub struct EnterOutcome {
    pub people_count: i64,
    pub notifications: Vec<NotificationDraft>,
}

#[derive(Debug, FromRow)]
struct ActorSnapshot {
    full_name: String,
    profile_image: String,
    shelter_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct ShelterSnapshot {
    name: String,
}

impl Occupancy {
    pub async fn enter(
        pool: &PgPool,
        user_id: &str,
        shelter_id: &str,
    ) -> Result<EnterOutcome, sqlx::Error> {
        let actor = sqlx::query_as::<_, ActorSnapshot>(
            "SELECT full_name, profile_image, shelter_id FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| sqlx::Error::Protocol("User not found".into()))?;

        let shelter =
            sqlx::query_as::<_, ShelterSnapshot>("SELECT name FROM shelters WHERE shelter_id = $1")
                .bind(shelter_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| sqlx::Error::Protocol("Shelter not found".into()))?;

        let mut tx = pool.begin().await?;

        let already_present = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM shelter_occupants WHERE shelter_id = $1 AND user_id = $2)",
        )
        .bind(shelter_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let plan = plan_enter(actor.shelter_id.as_deref(), shelter_id, already_present);

        if let Some(prior) = &plan.leave_prior {
            sqlx::query("DELETE FROM shelter_occupants WHERE shelter_id = $1 AND user_id = $2")
                .bind(prior)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let mut notifications = Vec::new();
        if plan.new_entry {
            let occupants = sqlx::query_scalar::<_, String>(
                "SELECT user_id FROM shelter_occupants WHERE shelter_id = $1 ORDER BY entered_at",
            )
            .bind(shelter_id)
            .fetch_all(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO shelter_occupants (shelter_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(shelter_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            notifications = fanout_recipients(&occupants, user_id)
                .into_iter()
                .map(|recipient| {
                    NotificationDraft::user_entered(
                        recipient,
                        user_id,
                        &actor.full_name,
                        &actor.profile_image,
                        shelter_id,
                        &shelter.name,
                    )
                })
                .collect();
        }

        // pointer refresh is unconditional, re-entry included
        sqlx::query("UPDATE users SET shelter_id = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(shelter_id)
            .execute(&mut *tx)
            .await?;

        let people_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shelter_occupants WHERE shelter_id = $1",
        )
        .bind(shelter_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(EnterOutcome {
            people_count,
            notifications,
        })
    }

    pub async fn leave(
        pool: &PgPool,
        user_id: &str,
        shelter_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let shelter_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM shelters WHERE shelter_id = $1)",
        )
        .bind(shelter_id)
        .fetch_one(pool)
        .await?;

        if !shelter_exists {
            return Err(sqlx::Error::Protocol("Shelter not found".into()));
        }

        let mut tx = pool.begin().await?;

        // no-op if the user was never recorded here
        sqlx::query("DELETE FROM shelter_occupants WHERE shelter_id = $1 AND user_id = $2")
            .bind(shelter_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET shelter_id = NULL WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let people_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shelter_occupants WHERE shelter_id = $1",
        )
        .bind(shelter_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(people_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_from_nowhere() {
        let plan = plan_enter(None, "s1", false);
        assert_eq!(
            plan,
            EnterPlan {
                leave_prior: None,
                new_entry: true,
            }
        );
    }

    #[test]
    fn moving_shelters_leaves_the_prior_one() {
        let plan = plan_enter(Some("s1"), "s2", false);
        assert_eq!(plan.leave_prior.as_deref(), Some("s1"));
        assert!(plan.new_entry);
    }

    #[test]
    fn re_entering_same_shelter_is_a_presence_noop() {
        let plan = plan_enter(Some("s1"), "s1", true);
        assert_eq!(plan.leave_prior, None);
        assert!(!plan.new_entry);
    }

    #[test]
    fn stale_pointer_to_target_does_not_trigger_removal() {
        // pointer says s1 but the occupant row is gone; entry is new,
        // nothing to leave
        let plan = plan_enter(Some("s1"), "s1", false);
        assert_eq!(plan.leave_prior, None);
        assert!(plan.new_entry);
    }

    #[test]
    fn fanout_goes_to_existing_occupants_only() {
        let occupants = vec!["a".to_string(), "b".to_string()];
        let recipients = fanout_recipients(&occupants, "c");
        assert_eq!(recipients, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn fanout_never_addresses_the_enterer() {
        let occupants = vec!["a".to_string(), "c".to_string(), "b".to_string()];
        let recipients = fanout_recipients(&occupants, "c");
        assert_eq!(recipients, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn fanout_of_empty_shelter_is_empty() {
        assert!(fanout_recipients(&[], "c").is_empty());
    }

    // end-to-end presence checks against a per-test database
    mod db {
        use super::*;

        async fn seed_user(pool: &PgPool, user_id: &str) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO users (user_id, full_name, email, password_hash) \
                 VALUES ($1, $2, $3, 'x')",
            )
            .bind(user_id)
            .bind(format!("User {user_id}"))
            .bind(format!("{user_id}@example.com"))
            .execute(pool)
            .await?;
            Ok(())
        }

        async fn seed_shelter(pool: &PgPool, shelter_id: &str) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO shelters (shelter_id, name, latitude, longitude) \
                 VALUES ($1, $2, 32.0853, 34.7818)",
            )
            .bind(shelter_id)
            .bind(format!("Shelter {shelter_id}"))
            .execute(pool)
            .await?;
            Ok(())
        }

        async fn occupant_count(pool: &PgPool, shelter_id: &str) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar("SELECT COUNT(*) FROM shelter_occupants WHERE shelter_id = $1")
                .bind(shelter_id)
                .fetch_one(pool)
                .await
        }

        #[sqlx::test]
        async fn leave_of_a_non_occupied_shelter_keeps_the_count(
            pool: PgPool,
        ) -> Result<(), sqlx::Error> {
            seed_shelter(&pool, "s1").await?;
            seed_user(&pool, "u1").await?;
            seed_user(&pool, "u2").await?;

            Occupancy::enter(&pool, "u1", "s1").await?;

            // u2 was never in s1; leave succeeds and changes nothing
            let count = Occupancy::leave(&pool, "u2", "s1").await?;
            assert_eq!(count, 1);
            assert_eq!(occupant_count(&pool, "s1").await?, 1);
            Ok(())
        }

        #[sqlx::test]
        async fn moving_shelters_transfers_the_count(pool: PgPool) -> Result<(), sqlx::Error> {
            seed_shelter(&pool, "s1").await?;
            seed_shelter(&pool, "s2").await?;
            seed_user(&pool, "u1").await?;

            let first = Occupancy::enter(&pool, "u1", "s1").await?;
            assert_eq!(first.people_count, 1);

            let second = Occupancy::enter(&pool, "u1", "s2").await?;
            assert_eq!(second.people_count, 1);
            assert_eq!(occupant_count(&pool, "s1").await?, 0);

            let pointer: Option<String> =
                sqlx::query_scalar("SELECT shelter_id FROM users WHERE user_id = 'u1'")
                    .fetch_one(&pool)
                    .await?;
            assert_eq!(pointer.as_deref(), Some("s2"));
            Ok(())
        }

        #[sqlx::test]
        async fn double_enter_keeps_the_occupant_row_unique(
            pool: PgPool,
        ) -> Result<(), sqlx::Error> {
            seed_shelter(&pool, "s1").await?;
            seed_user(&pool, "u1").await?;

            let first = Occupancy::enter(&pool, "u1", "s1").await?;
            let second = Occupancy::enter(&pool, "u1", "s1").await?;

            assert_eq!(first.people_count, 1);
            assert_eq!(second.people_count, 1);
            // re-entry is silent
            assert!(second.notifications.is_empty());
            Ok(())
        }

        #[sqlx::test]
        async fn enter_drafts_notifications_for_prior_occupants(
            pool: PgPool,
        ) -> Result<(), sqlx::Error> {
            seed_shelter(&pool, "s1").await?;
            seed_user(&pool, "u1").await?;
            seed_user(&pool, "u2").await?;

            let first = Occupancy::enter(&pool, "u1", "s1").await?;
            assert!(first.notifications.is_empty());

            let second = Occupancy::enter(&pool, "u2", "s1").await?;
            assert_eq!(second.people_count, 2);
            assert_eq!(second.notifications.len(), 1);
            assert_eq!(second.notifications[0].user_id, "u1");
            assert_eq!(
                second.notifications[0].shelter_name.as_deref(),
                Some("Shelter s1")
            );
            Ok(())
        }
    }
}
