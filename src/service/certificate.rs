//! Idempotent certificate issuance for the top of the final leaderboard.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Months};
use tokio::sync::RwLock;

use super::{EngineContext, RankingEngine};
use crate::domain::{Certificate, CertificateId, DomainEvent, EventId, EventStatus, Outbox, UserId};
use crate::error::GatewayError;

/// Highest rank that earns a certificate.
pub const MAX_CERTIFICATE_RANK: u8 = 3;

#[derive(Debug, Default)]
struct CertificateBook {
    by_rank: HashMap<(EventId, u8), Certificate>,
    numbers: HashSet<String>,
}

/// Issues certificates for events that have completed.
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    ctx: EngineContext,
    rankings: RankingEngine,
    book: Arc<RwLock<CertificateBook>>,
}

impl CertificateIssuer {
    /// Creates an issuer backed by `rankings` for final leaderboards.
    #[must_use]
    pub fn new(ctx: EngineContext, rankings: RankingEngine) -> Self {
        Self {
            ctx,
            rankings,
            book: Arc::new(RwLock::new(CertificateBook::default())),
        }
    }

    /// Issues certificates for ranks `1..=min(n, recipients)` and returns the
    /// ones created by this call. Ranks that already hold a certificate are
    /// skipped, so repeating the call issues nothing.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Validation`] if `n` is not in `1..=3`.
    /// - [`GatewayError::StateConflict`] unless the event is completed and
    ///   had at least one participant.
    pub async fn issue_top_n(
        &self,
        event_id: EventId,
        n: usize,
    ) -> Result<Vec<Certificate>, GatewayError> {
        if n == 0 || n > usize::from(MAX_CERTIFICATE_RANK) {
            return Err(GatewayError::invalid(
                "n",
                format!("must be between 1 and {MAX_CERTIFICATE_RANK}"),
            ));
        }
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let (end_date, participants) = {
            let entry = entry_lock.read().await;
            if entry.event.status != EventStatus::Completed {
                return Err(GatewayError::StateConflict(
                    "certificates are issued only for completed events".to_string(),
                ));
            }
            (entry.event.end_date, entry.participant_count())
        };
        if participants == 0 {
            return Err(GatewayError::StateConflict(
                "event finished without participants".to_string(),
            ));
        }
        let expires_at = end_date
            .checked_add_months(Months::new(12))
            .ok_or_else(|| GatewayError::Internal(format!("no expiry date after {end_date}")))?;

        let ranking = self.rankings.finalize(event_id).await?;
        let now = self.ctx.clock.now();
        let mut outbox = Outbox::new();
        let mut issued = Vec::new();

        let mut book = self.book.write().await;
        for (row, rank) in ranking.rankings.iter().zip(1..=MAX_CERTIFICATE_RANK).take(n) {
            if book.by_rank.contains_key(&(event_id, rank)) {
                continue;
            }
            let certificate_number = unique_number(&book.numbers, event_id, end_date.year(), rank);
            let certificate = Certificate {
                id: CertificateId::new(),
                user_id: row.user_id,
                event_id,
                rank,
                total_amount: row.total_amount,
                certificate_number: certificate_number.clone(),
                issued_at: now,
                expires_at,
            };
            book.numbers.insert(certificate_number);
            book.by_rank.insert((event_id, rank), certificate.clone());
            outbox.stage(DomainEvent::CertificateIssued {
                event_id,
                certificate_id: certificate.id,
                user_id: certificate.user_id,
                rank,
                total_amount: certificate.total_amount,
                certificate_number: certificate.certificate_number.clone(),
                expires_at,
                timestamp: now,
            });
            issued.push(certificate);
        }
        drop(book);
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, issued = issued.len(), "certificates issued");
        Ok(issued)
    }

    /// Puts a stored certificate back into the book.
    ///
    /// Its number is reserved again, so numbers generated afterwards never
    /// repeat one issued before a restart.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] if the rank is already held
    /// or the number is taken by another certificate.
    pub async fn restore(&self, certificate: Certificate) -> Result<(), GatewayError> {
        let mut book = self.book.write().await;
        let slot = (certificate.event_id, certificate.rank);
        if book.by_rank.contains_key(&slot) {
            return Err(GatewayError::StateConflict(format!(
                "event {} already holds a rank {} certificate",
                certificate.event_id, certificate.rank
            )));
        }
        if !book.numbers.insert(certificate.certificate_number.clone()) {
            return Err(GatewayError::StateConflict(format!(
                "certificate number {} is already taken",
                certificate.certificate_number
            )));
        }
        book.by_rank.insert(slot, certificate);
        Ok(())
    }

    /// Looks up a certificate by id.
    pub async fn certificate(&self, id: CertificateId) -> Option<Certificate> {
        self.book
            .read()
            .await
            .by_rank
            .values()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Certificates of an event ordered by rank.
    pub async fn certificates_for_event(&self, event_id: EventId) -> Vec<Certificate> {
        let mut certificates: Vec<Certificate> = self
            .book
            .read()
            .await
            .by_rank
            .values()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect();
        certificates.sort_by_key(|c| c.rank);
        certificates
    }

    /// Certificates held by a user, newest first.
    pub async fn certificates_for_user(&self, user_id: UserId) -> Vec<Certificate> {
        let mut certificates: Vec<Certificate> = self
            .book
            .read()
            .await
            .by_rank
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        certificates.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        certificates
    }
}

/// `RA-<year>-<event prefix>-<rank>`, suffixed when already taken.
fn unique_number(taken: &HashSet<String>, event_id: EventId, year: i32, rank: u8) -> String {
    let simple = event_id.as_uuid().simple().to_string();
    let prefix: String = simple.chars().take(8).collect::<String>().to_uppercase();
    let base = format!("RA-{year}-{prefix}-{rank}");
    if !taken.contains(&base) {
        return base;
    }
    (2u32..)
        .map(|suffix| format!("{base}-{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::tests::date;
    use crate::service::fixtures::harness;

    #[test]
    fn number_is_deterministic_and_suffixed_on_collision() {
        let event_id = EventId::new();
        let mut taken = HashSet::new();
        let first = unique_number(&taken, event_id, 2026, 1);
        assert!(first.starts_with("RA-2026-"));
        assert!(first.ends_with("-1"));
        assert_eq!(first, unique_number(&taken, event_id, 2026, 1));

        taken.insert(first.clone());
        let second = unique_number(&taken, event_id, 2026, 1);
        assert_eq!(second, format!("{first}-2"));
    }

    #[tokio::test]
    async fn issuance_is_idempotent_and_never_pads_ranks() {
        let h = harness();
        let (event_id, users) = h.started(3).await;
        let [giver, a, b] = users.as_slice() else {
            panic!("three users");
        };
        let target_a = h.check_in_today(event_id, *a).await;
        let target_b = h.check_in_today(event_id, *b).await;
        assert!(h.give(*giver, &target_a, 2).await.is_ok());
        assert!(h.give(*giver, &target_b, 1).await.is_ok());

        let early = h.engine.certificates.issue_top_n(event_id, 3).await;
        let Err(GatewayError::StateConflict(_)) = early else {
            panic!("expected state conflict, got {early:?}");
        };

        let Ok(report) = h.engine.lifecycle.complete(event_id, &h.leader).await else {
            panic!("complete");
        };
        let issued: Vec<(UserId, u8, u64)> = report
            .certificates
            .iter()
            .map(|c| (c.user_id, c.rank, c.total_amount))
            .collect();
        assert_eq!(issued, vec![(*a, 1, 2), (*b, 2, 1)]);
        assert!(report.certificates.iter().all(|c| c.expires_at == date(2027, 3, 8)));

        let Ok(repeat) = h.engine.certificates.issue_top_n(event_id, 3).await else {
            panic!("repeat issuance");
        };
        assert!(repeat.is_empty());
        assert_eq!(h.engine.certificates.certificates_for_event(event_id).await, report.certificates);
        assert_eq!(h.engine.certificates.certificates_for_user(*a).await.len(), 1);
        assert!(h.engine.certificates.certificates_for_user(*giver).await.is_empty());

        let numbers: HashSet<&str> = report
            .certificates
            .iter()
            .map(|c| c.certificate_number.as_str())
            .collect();
        assert_eq!(numbers.len(), 2);
    }

    #[tokio::test]
    async fn restored_numbers_are_never_reissued() {
        let h = harness();
        let (event_id, users) = h.started(2).await;
        let [giver, a] = users.as_slice() else {
            panic!("two users");
        };
        let target = h.check_in_today(event_id, *a).await;
        assert!(h.give(*giver, &target, 1).await.is_ok());

        let taken = unique_number(&HashSet::new(), event_id, 2026, 1);
        let earlier = Certificate {
            id: CertificateId::new(),
            user_id: UserId::new(),
            event_id: EventId::new(),
            rank: 1,
            total_amount: 9,
            certificate_number: taken.clone(),
            issued_at: chrono::Utc::now(),
            expires_at: date(2027, 1, 1),
        };
        assert!(h.engine.certificates.restore(earlier.clone()).await.is_ok());
        let again = h.engine.certificates.restore(earlier.clone()).await;
        let Err(GatewayError::StateConflict(_)) = again else {
            panic!("expected state conflict, got {again:?}");
        };
        assert_eq!(h.engine.certificates.certificate(earlier.id).await, Some(earlier));

        let Ok(report) = h.engine.lifecycle.complete(event_id, &h.leader).await else {
            panic!("complete");
        };
        let Some(first) = report.certificates.first() else {
            panic!("rank 1 certificate issued");
        };
        assert_eq!(first.certificate_number, format!("{taken}-2"));
    }

    #[tokio::test]
    async fn top_n_is_bounded() {
        let h = harness();
        let (event_id, _) = h.started(2).await;
        for n in [0, 4] {
            let result = h.engine.certificates.issue_top_n(event_id, n).await;
            let Err(GatewayError::Validation(_)) = result else {
                panic!("expected validation error for n={n}, got {result:?}");
            };
        }
    }
}
