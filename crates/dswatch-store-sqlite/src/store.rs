//! [`SqliteStore`] — the SQLite implementation of [`CheckStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;

use dswatch_core::{
  check::{CheckRecord, ClassRatio, Recorded, Transition, Verdict},
  domain::{CatalogEntry, Domain, DomainId, StaleDomain},
  store::CheckStore,
};

use crate::{
  encode::{encode_dt, RawCheck, RawDomain, RawStale, RawTransition},
  schema::SCHEMA,
  Error, Result,
};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Selects the newest `dns_checks` row for the domain aliased `d`.
const LATEST_CHECK: &str = "(
  SELECT dc.id FROM dns_checks dc
  WHERE dc.domain_id = d.id
  ORDER BY dc.checked_at DESC, dc.id DESC
  LIMIT 1
)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// The catalog and check history backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CheckStore impl ─────────────────────────────────────────────────────────

impl CheckStore for SqliteStore {
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn seed_catalog(&self, entries: Vec<CatalogEntry>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: i64 =
          tx.query_row("SELECT COUNT(*) FROM domains", [], |r| r.get(0))?;
        if existing > 0 {
          return Ok(0);
        }

        let mut inserted = 0;
        {
          let mut stmt =
            tx.prepare("INSERT INTO domains (name, rank) VALUES (?1, ?2)")?;
          for entry in &entries {
            inserted += stmt.execute(rusqlite::params![entry.name, entry.rank])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    debug!(inserted, "catalog seeded");
    Ok(inserted)
  }

  async fn catalog_size(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM domains", [], |r| r.get(0))?)
      })
      .await?;
    usize::try_from(count).map_err(|_| Error::Corrupt(format!("domain count {count}")))
  }

  async fn domain_by_name(&self, name: &str) -> Result<Option<Domain>> {
    let name = name.to_owned();

    let raw: Option<RawDomain> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, name, rank, class FROM domains WHERE name = ?1",
              rusqlite::params![name],
              |row| RawDomain::read(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDomain::into_domain).transpose()
  }

  async fn set_class(&self, name: String, class: String) -> Result<()> {
    let lookup = name.clone();
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE domains SET class = ?1 WHERE name = ?2",
          rusqlite::params![class, lookup],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(dswatch_core::Error::DomainNotFound(name).into());
    }
    Ok(())
  }

  async fn list_unclassed(&self, max_rank: u32) -> Result<Vec<Domain>> {
    let raws: Vec<RawDomain> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, rank, class FROM domains
           WHERE (class IS NULL OR class = '') AND rank <= ?1
           ORDER BY rank, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![max_rank], |row| RawDomain::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDomain::into_domain).collect()
  }

  // ── Scheduling ────────────────────────────────────────────────────────────

  async fn stalest(&self, limit: usize) -> Result<Vec<StaleDomain>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawStale> = self
      .conn
      .call(move |conn| {
        // NULL last_check sorts first: never-probed domains are most overdue.
        let mut stmt = conn.prepare(
          "SELECT d.id, d.name, d.rank, d.class, c.last_check
           FROM domains d
           LEFT JOIN (
             SELECT domain_id, MAX(checked_at) AS last_check
             FROM dns_checks
             GROUP BY domain_id
           ) c ON c.domain_id = d.id
           ORDER BY c.last_check IS NOT NULL, c.last_check ASC, d.rank ASC, d.id ASC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |row| {
            Ok(RawStale {
              domain:     RawDomain::read(row, 0)?,
              last_check: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStale::into_stale).collect()
  }

  // ── History — compacting writes ───────────────────────────────────────────

  async fn record(
    &self,
    domain_id: DomainId,
    verdict: Verdict,
    at: DateTime<Utc>,
  ) -> Result<Recorded> {
    let has_dnssec = verdict.has_dnssec();
    let error = verdict.error().to_owned();
    let at_str = encode_dt(at);

    // The read of the current row and the write that follows share one
    // IMMEDIATE transaction, so two writers cannot both append.
    let outcome: Option<(RawCheck, bool)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM domains WHERE id = ?1",
            rusqlite::params![domain_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(None);
        }

        let current = tx
          .query_row(
            "SELECT id, domain_id, checked_at, has_dnssec, error
             FROM dns_checks
             WHERE domain_id = ?1
             ORDER BY checked_at DESC, id DESC
             LIMIT 1",
            rusqlite::params![domain_id],
            |row| RawCheck::read(row, 0),
          )
          .optional()?;

        let outcome = match current {
          Some(cur) if cur.same_verdict(has_dnssec, &error) => {
            let checked_at = std::cmp::max(at_str, cur.checked_at.clone());
            tx.execute(
              "UPDATE dns_checks SET checked_at = ?1 WHERE id = ?2",
              rusqlite::params![checked_at, cur.id],
            )?;
            (RawCheck { checked_at, ..cur }, false)
          }
          current => {
            let checked_at = match current {
              Some(cur) => std::cmp::max(at_str, cur.checked_at),
              None => at_str,
            };
            tx.execute(
              "INSERT INTO dns_checks (domain_id, checked_at, has_dnssec, error)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![domain_id, checked_at, has_dnssec, error],
            )?;
            let raw = RawCheck {
              id: tx.last_insert_rowid(),
              domain_id,
              checked_at,
              has_dnssec,
              error,
            };
            (raw, true)
          }
        };

        tx.commit()?;
        Ok(Some(outcome))
      })
      .await?;

    let (raw, inserted) = outcome
      .ok_or(Error::Core(dswatch_core::Error::DomainIdNotFound(domain_id)))?;
    Ok(Recorded { record: raw.into_record()?, inserted })
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn current(&self, domain_id: DomainId) -> Result<Option<CheckRecord>> {
    let raw: Option<RawCheck> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, domain_id, checked_at, has_dnssec, error
               FROM dns_checks
               WHERE domain_id = ?1
               ORDER BY checked_at DESC, id DESC
               LIMIT 1",
              rusqlite::params![domain_id],
              |row| RawCheck::read(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCheck::into_record).transpose()
  }

  async fn history(&self, domain_id: DomainId) -> Result<Vec<CheckRecord>> {
    let raws: Vec<RawCheck> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, domain_id, checked_at, has_dnssec, error
           FROM dns_checks
           WHERE domain_id = ?1
           ORDER BY checked_at ASC, id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![domain_id], |row| RawCheck::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCheck::into_record).collect()
  }

  async fn transitions(&self, limit: usize) -> Result<Vec<Transition>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "WITH
           completed AS (
             SELECT id, domain_id, checked_at, has_dnssec, error
             FROM dns_checks
             WHERE error = '' AND has_dnssec IS NOT NULL
           ),
           lagged AS (
             SELECT id, domain_id, checked_at, has_dnssec, error,
                    LAG(has_dnssec) OVER (
                      PARTITION BY domain_id
                      ORDER BY checked_at, id
                    ) AS prev
             FROM completed
           )
           SELECT d.id, d.name, d.rank, d.class,
                  l.id, l.domain_id, l.checked_at, l.has_dnssec, l.error,
                  l.prev
           FROM lagged l
           JOIN domains d ON d.id = l.domain_id
           WHERE l.prev IS NOT NULL AND l.prev != l.has_dnssec
           ORDER BY l.checked_at DESC, l.id DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |row| {
            Ok(RawTransition {
              domain:   RawDomain::read(row, 0)?,
              check:    RawCheck::read(row, 4)?,
              previous: row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_transition).collect()
  }

  async fn ratio(&self, top_n: u32) -> Result<f64> {
    let (total, signed): (i64, i64) = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "WITH top AS (
             SELECT id FROM domains ORDER BY rank, id LIMIT ?1
           )
           SELECT COUNT(*), COALESCE(SUM(c.has_dnssec = 1), 0)
           FROM top d
           LEFT JOIN dns_checks c ON c.id = {LATEST_CHECK}"
        );
        Ok(conn.query_row(&sql, rusqlite::params![top_n], |r| {
          Ok((r.get(0)?, r.get(1)?))
        })?)
      })
      .await?;

    Ok(percent(signed, total))
  }

  async fn class_ratios(&self, max_rank: u32) -> Result<Vec<ClassRatio>> {
    let rows: Vec<(String, i64, i64)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT d.class, COUNT(*), COALESCE(SUM(c.has_dnssec = 1), 0)
           FROM domains d
           LEFT JOIN dns_checks c ON c.id = {LATEST_CHECK}
           WHERE d.rank <= ?1 AND d.class IS NOT NULL AND d.class != ''
           GROUP BY d.class
           ORDER BY d.class"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![max_rank], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(class, total, signed)| ClassRatio {
          class,
          percent: percent(signed, total),
        })
        .collect(),
    )
  }
}

fn percent(part: i64, total: i64) -> f64 {
  if total == 0 {
    return 0.0;
  }
  100.0 * part as f64 / total as f64
}
