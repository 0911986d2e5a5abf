//! Ledger audit and reconciliation.
//!
//! Confirmation writes one ledger per player with no cross-player
//! transaction, and the snapshot files are replaced one at a time, so a
//! crash can leave a match partially applied: ledgers holding the result
//! while the match is still upcoming, or a finished match whose draft was
//! never marked confirmed. Nothing repairs that mid-request.
//! `audit_ledgers` reports inconsistencies; `reconcile_ledgers` repairs them
//! and is idempotent: running it on its own output changes nothing.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{CoreError, PlatformState};
use crate::ledger;
use crate::models::{
    DraftId, JoinSnapshot, LedgerEntry, Match, MatchId, MatchState, Player, PlayerId, Role,
};
use crate::rating::resolve_join_rating;

/// One inconsistency found by an audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    /// Stored rating differs from `DEFAULT_RATING + Σ delta`
    RatingDrift {
        player_id: PlayerId,
        stored: f64,
        ledger: f64,
    },
    /// More than one entry for the same match
    DuplicateEntries {
        player_id: PlayerId,
        match_id: MatchId,
        count: usize,
    },
    /// Placeholder for a match that is gone, closed, or no longer lists the player
    StalePlaceholder {
        player_id: PlayerId,
        match_id: MatchId,
    },
    /// Roster member of an upcoming match without a join snapshot
    MissingSnapshot {
        player_id: PlayerId,
        match_id: MatchId,
    },
    /// Roster member of an upcoming match without a ledger entry
    MissingEntry {
        player_id: PlayerId,
        match_id: MatchId,
    },
    /// Roster member of a finished match whose result was never applied
    MissingConfirmedEntry {
        player_id: PlayerId,
        match_id: MatchId,
    },
    /// Result confirmed in a draft or a ledger while the match is not finished
    UnfinishedResult {
        match_id: MatchId,
        state: MatchState,
    },
    /// Finished match whose draft was never marked confirmed
    UnconfirmedDraft {
        match_id: MatchId,
        draft_id: DraftId,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub players_checked: usize,
    pub matches_checked: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub duplicates_removed: usize,
    pub stale_placeholders_removed: usize,
    pub snapshots_restored: usize,
    pub placeholders_restored: usize,
    pub confirmations_completed: usize,
    pub confirmed_entries_restored: usize,
    pub ratings_corrected: BTreeSet<PlayerId>,
}

impl ReconcileReport {
    pub fn total_changes(&self) -> usize {
        self.duplicates_removed
            + self.stale_placeholders_removed
            + self.snapshots_restored
            + self.placeholders_restored
            + self.confirmations_completed
            + self.confirmed_entries_restored
            + self.ratings_corrected.len()
    }
}

fn is_stale(entry: &LedgerEntry, player_id: &PlayerId, matches: &HashMap<MatchId, Match>) -> bool {
    if !entry.is_placeholder() {
        return false;
    }
    match matches.get(&entry.match_id) {
        Some(m) => m.state.is_terminal() || !m.is_member(player_id),
        None => true,
    }
}

/// Keep one entry per match, preferring the confirmed one.
fn dedupe(player: &mut Player) -> usize {
    let confirmed: HashSet<MatchId> = player
        .ledger
        .iter()
        .filter(|e| !e.is_placeholder())
        .map(|e| e.match_id.clone())
        .collect();
    let mut seen = HashSet::new();
    let before = player.ledger.len();
    player.ledger.retain(|e| {
        if e.is_placeholder() && confirmed.contains(&e.match_id) {
            return false;
        }
        seen.insert(e.match_id.clone())
    });
    before - player.ledger.len()
}

/// Earliest confirmed entry date per match, across every ledger.
fn confirmed_result_dates(players: &HashMap<PlayerId, Player>) -> HashMap<MatchId, DateTime<Utc>> {
    let mut dates: HashMap<MatchId, DateTime<Utc>> = HashMap::new();
    for entry in players
        .values()
        .flat_map(|p| &p.ledger)
        .filter(|e| !e.is_placeholder())
    {
        dates
            .entry(entry.match_id.clone())
            .and_modify(|d| *d = (*d).min(entry.date))
            .or_insert(entry.date);
    }
    dates
}

fn sorted_ids<K: Ord + Clone, V>(map: &HashMap<K, V>) -> Vec<K> {
    let mut ids: Vec<K> = map.keys().cloned().collect();
    ids.sort();
    ids
}

impl PlatformState {
    /// Check every ledger against the stored ratings and the match rosters.
    pub fn audit_ledgers(&self) -> AuditReport {
        let mut findings = Vec::new();

        for player_id in sorted_ids(&self.players) {
            let Some(player) = self.players.get(&player_id) else {
                continue;
            };

            let expected = ledger::ledger_rating(player);
            if ledger::drift(player).abs() > self.rules.drift_tolerance {
                findings.push(AuditFinding::RatingDrift {
                    player_id: player_id.clone(),
                    stored: player.current_rating,
                    ledger: expected,
                });
            }

            let mut per_match: HashMap<&MatchId, usize> = HashMap::new();
            for entry in &player.ledger {
                *per_match.entry(&entry.match_id).or_default() += 1;
            }
            let mut duplicated: Vec<_> = per_match.into_iter().filter(|(_, n)| *n > 1).collect();
            duplicated.sort();
            for (match_id, count) in duplicated {
                findings.push(AuditFinding::DuplicateEntries {
                    player_id: player_id.clone(),
                    match_id: match_id.clone(),
                    count,
                });
            }

            for entry in &player.ledger {
                if is_stale(entry, &player_id, &self.matches) {
                    findings.push(AuditFinding::StalePlaceholder {
                        player_id: player_id.clone(),
                        match_id: entry.match_id.clone(),
                    });
                }
            }
        }

        let result_dates = confirmed_result_dates(&self.players);
        for match_id in sorted_ids(&self.matches) {
            let Some(game_match) = self.matches.get(&match_id) else {
                continue;
            };
            let draft = self.draft_for_match(&match_id);
            if game_match.state == MatchState::Finished {
                if let Some(draft) = draft.filter(|d| !d.confirmed) {
                    findings.push(AuditFinding::UnconfirmedDraft {
                        match_id: match_id.clone(),
                        draft_id: draft.id.clone(),
                    });
                }
            } else if draft.is_some_and(|d| d.confirmed) || result_dates.contains_key(&match_id) {
                findings.push(AuditFinding::UnfinishedResult {
                    match_id: match_id.clone(),
                    state: game_match.state,
                });
            }

            for player_id in &game_match.roster {
                let player = self.players.get(player_id);
                match game_match.state {
                    MatchState::Upcoming => {
                        if game_match.snapshot_for(player_id).is_none() {
                            findings.push(AuditFinding::MissingSnapshot {
                                player_id: player_id.clone(),
                                match_id: match_id.clone(),
                            });
                        }
                        if player.is_some_and(|p| p.entry_for_match(&match_id).is_none()) {
                            findings.push(AuditFinding::MissingEntry {
                                player_id: player_id.clone(),
                                match_id: match_id.clone(),
                            });
                        }
                    }
                    MatchState::Finished => {
                        if player.is_some_and(|p| !ledger::has_confirmed_entry(p, &match_id)) {
                            findings.push(AuditFinding::MissingConfirmedEntry {
                                player_id: player_id.clone(),
                                match_id: match_id.clone(),
                            });
                        }
                    }
                    MatchState::Cancelled => {}
                }
            }
        }

        for finding in &findings {
            warn!("Audit finding: {:?}", finding);
        }

        AuditReport {
            players_checked: self.players.len(),
            matches_checked: self.matches.len(),
            findings,
        }
    }

    /// Admin entry point for [`PlatformState::repair_ledgers`].
    pub fn reconcile_ledgers(
        &mut self,
        actor_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport, CoreError> {
        self.require_role(actor_id, Role::Admin)?;
        info!("Reconciliation requested by {}", actor_id);
        self.repair_ledgers(now)
    }

    /// Repair every ledger and stored rating.
    ///
    /// Order: drop duplicates, finish partly persisted confirmations, align
    /// ratings with ledgers, apply results missing from finished matches,
    /// drop stale placeholders, restore missing snapshots and placeholders,
    /// then align ratings again.
    pub fn repair_ledgers(&mut self, now: DateTime<Utc>) -> Result<ReconcileReport, CoreError> {
        let mut report = ReconcileReport::default();

        for player in self.players.values_mut() {
            report.duplicates_removed += dedupe(player);
        }

        report.confirmations_completed = self.complete_confirmations(now);

        self.correct_ratings(&mut report);
        report.confirmed_entries_restored = self.restore_confirmed_entries(now)?;

        let matches = &self.matches;
        for player in self.players.values_mut() {
            let before = player.ledger.len();
            let player_id = player.id.clone();
            player
                .ledger
                .retain(|e| !is_stale(e, &player_id, matches));
            report.stale_placeholders_removed += before - player.ledger.len();
        }

        self.restore_join_records(now, &mut report);
        self.correct_ratings(&mut report);

        if report.total_changes() > 0 {
            info!(
                "Reconciliation: {} duplicates, {} stale placeholders removed; {} snapshots, {} placeholders, {} results restored; {} confirmations completed; {} ratings corrected",
                report.duplicates_removed,
                report.stale_placeholders_removed,
                report.snapshots_restored,
                report.placeholders_restored,
                report.confirmed_entries_restored,
                report.confirmations_completed,
                report.ratings_corrected.len()
            );
        } else {
            info!("Reconciliation: nothing to repair");
        }
        Ok(report)
    }

    fn correct_ratings(&mut self, report: &mut ReconcileReport) {
        for player in self.players.values_mut() {
            let target = ledger::ledger_rating(player);
            if (player.current_rating - target).abs() > 1e-9 {
                info!(
                    "Correcting rating of {}: {:.2} -> {:.2}",
                    player.id, player.current_rating, target
                );
                player.current_rating = target;
                report.ratings_corrected.insert(player.id.clone());
            }
        }
    }

    /// Finish matches whose confirmation was only partly persisted.
    ///
    /// A match with a draft counts as resolved once the draft is confirmed,
    /// the match is finished, or any ledger holds its confirmed entry. Such a
    /// match is marked finished and its draft confirmed; ledgers still
    /// missing the result are filled in by `restore_confirmed_entries`.
    /// Cancelled matches are left alone.
    fn complete_confirmations(&mut self, now: DateTime<Utc>) -> usize {
        let result_dates = confirmed_result_dates(&self.players);
        let mut completed = 0;

        for match_id in sorted_ids(&self.matches) {
            let Some(game_match) = self.matches.get_mut(&match_id) else {
                continue;
            };
            let Some(draft) = self.drafts.values_mut().find(|d| d.match_id == match_id) else {
                continue;
            };
            let finished = game_match.state == MatchState::Finished;
            let resolved = finished || draft.confirmed || result_dates.contains_key(&match_id);
            if game_match.state == MatchState::Cancelled || !resolved || (finished && draft.confirmed) {
                continue;
            }

            let closed_at = game_match
                .closed_at
                .or(draft.confirmed_at)
                .or_else(|| result_dates.get(&match_id).copied())
                .unwrap_or(now);
            if !draft.confirmed {
                let by = draft
                    .confirmed_by
                    .clone()
                    .unwrap_or_else(|| draft.created_by.clone());
                draft.confirm(by, closed_at);
            }
            game_match.state = MatchState::Finished;
            game_match.closed_at = Some(closed_at);

            info!(
                "Completed confirmation of match {} (draft {})",
                match_id, draft.id
            );
            completed += 1;
        }

        completed
    }

    /// Apply confirmed results to roster members a finished match skipped.
    fn restore_confirmed_entries(&mut self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let mut restored = 0;

        for match_id in sorted_ids(&self.matches) {
            let (Some(game_match), Some(draft)) =
                (self.matches.get(&match_id), self.draft_for_match(&match_id))
            else {
                continue;
            };
            if game_match.state != MatchState::Finished || !draft.confirmed {
                continue;
            }

            let mut participants = game_match.roster.clone();
            for player_id in draft.players() {
                if !participants.contains(player_id) {
                    participants.push(player_id.clone());
                }
            }
            participants.retain(|id| self.players.contains_key(id));

            let missing: Vec<PlayerId> = participants
                .iter()
                .filter(|id| {
                    self.players
                        .get(*id)
                        .is_some_and(|p| !ledger::has_confirmed_entry(p, &match_id))
                })
                .cloned()
                .collect();
            if missing.is_empty() {
                continue;
            }

            let baselines: HashMap<PlayerId, f64> = participants
                .iter()
                .map(|id| {
                    let resolved = resolve_join_rating(id, self.players.get(id), game_match);
                    (id.clone(), resolved.value)
                })
                .collect();
            let outcome = self.engine.compute(&participants, &draft.games, &baselines)?;
            let applied_at = draft.confirmed_at.unwrap_or(now);

            for player_id in &missing {
                let (Some(player), Some(player_outcome)) =
                    (self.players.get_mut(player_id), outcome.get(player_id))
                else {
                    continue;
                };
                ledger::apply(player, &match_id, player_outcome, applied_at)
                    .map_err(|e| CoreError::conflict(e.to_string()))?;
                info!(
                    "Restored confirmed entry for {} in match {} ({:+.2})",
                    player_id, match_id, player_outcome.total_delta
                );
                restored += 1;
            }
        }

        Ok(restored)
    }

    /// Give every upcoming roster member a join snapshot and a placeholder.
    fn restore_join_records(&mut self, now: DateTime<Utc>, report: &mut ReconcileReport) {
        for game_match in self.matches.values_mut() {
            if game_match.state != MatchState::Upcoming {
                continue;
            }
            for player_id in game_match.roster.clone() {
                let Some(player) = self.players.get_mut(&player_id) else {
                    continue;
                };

                if game_match.snapshot_for(&player_id).is_none() {
                    let (rating, joined_at) = match player.entry_for_match(&game_match.id) {
                        Some(entry) => (entry.join_rating_used.unwrap_or(entry.rating_after), entry.date),
                        None => (player.current_rating, now),
                    };
                    game_match.join_snapshots.push(JoinSnapshot {
                        player_id: player_id.clone(),
                        rating_at_join: rating,
                        joined_at,
                    });
                    report.snapshots_restored += 1;
                }

                if player.entry_for_match(&game_match.id).is_none() {
                    if let Some(snapshot) = game_match.snapshot_for(&player_id) {
                        player.ledger.push(LedgerEntry::placeholder(
                            &player_id,
                            game_match.id.clone(),
                            snapshot.rating_at_join,
                            snapshot.joined_at,
                        ));
                        report.placeholders_restored += 1;
                    }
                }
            }
        }
    }
}
