//! Result drafts and confirmation.
//!
//! A match has at most one draft. Any roster member may create, edit,
//! delete or confirm it while the result window is open. Confirmation is
//! the only path that moves ratings.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::{CoreError, PlatformState, TimeWindow};
use crate::config::RulesConfig;
use crate::ledger;
use crate::models::{
    validate_games, DraftId, GameInput, LedgerEntry, Match, MatchId, MatchState, PlayerId,
    ResultDraft,
};
use crate::rating::resolve_join_rating;

/// The ledger entry written for one player by a confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedEntry {
    pub player_id: PlayerId,
    pub entry: LedgerEntry,
}

/// Everything a confirmation wrote.
#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    pub match_id: MatchId,
    pub draft_id: DraftId,
    pub entries: Vec<ConfirmedEntry>,
    pub ratings_after: BTreeMap<PlayerId, f64>,
}

fn check_result_window(
    rules: &RulesConfig,
    game_match: &Match,
    now: DateTime<Utc>,
) -> Result<(), CoreError> {
    let opens = game_match.start_time;
    let closes = opens + rules.result_window();
    if now < opens || now > closes {
        return Err(CoreError::WindowExpired(TimeWindow::Result));
    }
    Ok(())
}

fn check_roster_member(game_match: &Match, actor_id: &PlayerId) -> Result<(), CoreError> {
    if !game_match.is_member(actor_id) {
        return Err(CoreError::forbidden(format!(
            "player {} is not on the roster of match {}",
            actor_id, game_match.id
        )));
    }
    Ok(())
}

fn check_upcoming(game_match: &Match) -> Result<(), CoreError> {
    if game_match.state != MatchState::Upcoming {
        return Err(CoreError::conflict(format!(
            "match {} is {}",
            game_match.id, game_match.state
        )));
    }
    Ok(())
}

impl PlatformState {
    /// Look up a draft and its match, checking that `actor_id` may still edit it.
    fn editable_draft(
        &self,
        draft_id: &DraftId,
        actor_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<(&ResultDraft, &Match), CoreError> {
        let draft = self.draft(draft_id)?;
        let game_match = self.get_match(&draft.match_id)?;

        check_roster_member(game_match, actor_id)?;
        if draft.confirmed {
            return Err(CoreError::conflict(format!(
                "draft {} is already confirmed",
                draft_id
            )));
        }
        check_upcoming(game_match)?;
        check_result_window(&self.rules, game_match, now)?;

        Ok((draft, game_match))
    }

    /// Create the result draft of a match.
    pub fn create_draft(
        &mut self,
        match_id: &MatchId,
        actor_id: &PlayerId,
        games: &[GameInput],
        now: DateTime<Utc>,
    ) -> Result<ResultDraft, CoreError> {
        self.player(actor_id)?;
        let game_match = self.get_match(match_id)?;

        check_roster_member(game_match, actor_id)?;
        check_upcoming(game_match)?;
        if self.draft_for_match(match_id).is_some() {
            return Err(CoreError::ResultExists(match_id.clone()));
        }
        check_result_window(&self.rules, game_match, now)?;

        let games = validate_games(games, &game_match.roster)?;
        let draft = ResultDraft::new(match_id.clone(), actor_id.clone(), games, now);

        info!(
            "Draft {} created for match {} by {} ({} games)",
            draft.id,
            match_id,
            actor_id,
            draft.games.len()
        );
        self.drafts.insert(draft.id.clone(), draft.clone());
        Ok(draft)
    }

    /// Replace the games of an unconfirmed draft.
    pub fn update_draft(
        &mut self,
        draft_id: &DraftId,
        actor_id: &PlayerId,
        games: &[GameInput],
        now: DateTime<Utc>,
    ) -> Result<ResultDraft, CoreError> {
        let (_, game_match) = self.editable_draft(draft_id, actor_id, now)?;
        let games = validate_games(games, &game_match.roster)?;

        let Some(draft) = self.drafts.get_mut(draft_id) else {
            return Err(CoreError::NotFound(format!("draft {}", draft_id)));
        };
        draft.replace_games(games, now);

        info!(
            "Draft {} updated by {} ({} games)",
            draft_id,
            actor_id,
            draft.games.len()
        );
        Ok(draft.clone())
    }

    /// Delete an unconfirmed draft. Ratings are untouched.
    pub fn delete_draft(
        &mut self,
        draft_id: &DraftId,
        actor_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.editable_draft(draft_id, actor_id, now)?;
        self.drafts.remove(draft_id);
        info!("Draft {} deleted by {}", draft_id, actor_id);
        Ok(())
    }

    /// Confirm a draft: rate every roster member, write their ledgers and
    /// finish the match.
    ///
    /// All checks and the rating computation run before the first write, so
    /// a failed confirmation leaves players, draft and match unchanged.
    pub fn confirm_draft(
        &mut self,
        draft_id: &DraftId,
        actor_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Confirmation, CoreError> {
        let (draft, game_match) = self.editable_draft(draft_id, actor_id, now)?;
        let match_id = game_match.id.clone();

        let mut participants = game_match.roster.clone();
        for player_id in draft.players() {
            if !participants.contains(player_id) {
                participants.push(player_id.clone());
            }
        }

        let mut baselines = HashMap::with_capacity(participants.len());
        for player_id in &participants {
            let player = self.player(player_id)?;
            if ledger::has_confirmed_entry(player, &match_id) {
                return Err(CoreError::conflict(format!(
                    "player {} already has a result for match {}",
                    player_id, match_id
                )));
            }
            let resolved = resolve_join_rating(player_id, Some(player), game_match);
            debug!(
                "Baseline for {} in match {}: {:.2} ({:?})",
                player_id, match_id, resolved.value, resolved.source
            );
            baselines.insert(player_id.clone(), resolved.value);
        }

        let outcome = self.engine.compute(&participants, &draft.games, &baselines)?;

        let mut entries = Vec::with_capacity(outcome.players.len());
        let mut ratings_after = BTreeMap::new();
        for player_outcome in &outcome.players {
            let Some(player) = self.players.get_mut(&player_outcome.player_id) else {
                return Err(CoreError::NotFound(format!(
                    "player {}",
                    player_outcome.player_id
                )));
            };
            let entry = ledger::apply(player, &match_id, player_outcome, now)
                .map_err(|e| CoreError::conflict(e.to_string()))?;
            ratings_after.insert(player.id.clone(), player.current_rating);
            entries.push(ConfirmedEntry {
                player_id: player.id.clone(),
                entry,
            });
        }

        if let Some(draft) = self.drafts.get_mut(draft_id) {
            draft.confirm(actor_id.clone(), now);
        }
        if let Some(game_match) = self.matches.get_mut(&match_id) {
            game_match.state = MatchState::Finished;
            game_match.closed_at = Some(now);
        }

        info!(
            "Draft {} confirmed by {}; match {} finished ({} players rated)",
            draft_id,
            actor_id,
            match_id,
            entries.len()
        );
        Ok(Confirmation {
            match_id,
            draft_id: draft_id.clone(),
            entries,
            ratings_after,
        })
    }
}
