//! Match lifecycle: roster mutations and cancellation.
//!
//! ```text
//! upcoming ──confirm──▶ finished
//!    │ ├────cancel────▶ cancelled
//!    │ └────delete────▶ (removed)
//! ```
//!
//! Windows, relative to the match start `S` and end `E`:
//! - join: until `S + join_grace`
//! - leave: before `S`
//! - removal: until `S + join_grace` (unrestricted admins exempt)
//! - cancel: before `S`, or in `(E, E + cancel_after_end]`

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{CoreError, PlatformState, TimeWindow};
use crate::ledger;
use crate::models::{Match, MatchId, MatchState, Player, PlayerId};

/// What a cancel-or-delete request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CancelOutcome {
    Deleted,
    Cancelled,
}

/// Drop every placeholder entry for a match from its roster's ledgers.
pub(crate) fn clear_placeholders(players: &mut HashMap<PlayerId, Player>, game_match: &Match) -> usize {
    let mut removed = 0;
    for id in &game_match.roster {
        if let Some(player) = players.get_mut(id) {
            removed += ledger::remove_placeholder(player, &game_match.id);
        }
    }
    removed
}

/// Look up a match that is still open for roster changes.
pub(crate) fn upcoming_mut<'a>(
    matches: &'a mut HashMap<MatchId, Match>,
    match_id: &MatchId,
) -> Result<&'a mut Match, CoreError> {
    let game_match = matches
        .get_mut(match_id)
        .ok_or_else(|| CoreError::NotFound(format!("match {}", match_id)))?;
    if game_match.state != MatchState::Upcoming {
        return Err(CoreError::conflict(format!(
            "match {} is {}",
            match_id, game_match.state
        )));
    }
    Ok(game_match)
}

impl PlatformState {
    /// Add a player to a match roster.
    ///
    /// Snapshots the player's current rating and writes a zero-delta
    /// placeholder to their ledger.
    pub fn join_match(
        &mut self,
        match_id: &MatchId,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Match, CoreError> {
        self.player(player_id)?;
        if self
            .draft_for_match(match_id)
            .is_some_and(|d| d.confirmed)
        {
            return Err(CoreError::conflict("match result is already confirmed"));
        }

        let join_grace = self.rules.join_grace();
        let game_match = upcoming_mut(&mut self.matches, match_id)?;

        if game_match.is_member(player_id) {
            return Err(CoreError::conflict(format!(
                "player {} already joined",
                player_id
            )));
        }
        if now > game_match.start_time + join_grace {
            return Err(CoreError::WindowExpired(TimeWindow::Join));
        }
        if game_match.is_full() {
            return Err(CoreError::Capacity(match_id.clone()));
        }

        let Some(player) = self.players.get_mut(player_id) else {
            return Err(CoreError::NotFound(format!("player {}", player_id)));
        };
        game_match.add_member(player_id.clone(), player.current_rating, now);
        ledger::append_placeholder(player, match_id, now);

        info!(
            "Player {} joined match {} ({}/{})",
            player_id,
            match_id,
            game_match.roster.len(),
            game_match.capacity
        );
        Ok(game_match.clone())
    }

    /// Leave a match before it starts. The creator cannot leave.
    pub fn leave_match(
        &mut self,
        match_id: &MatchId,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Match, CoreError> {
        let game_match = self.get_match(match_id)?;
        if &game_match.creator == player_id {
            return Err(CoreError::forbidden("the creator cannot leave their match"));
        }
        if now >= game_match.start_time {
            return Err(CoreError::WindowExpired(TimeWindow::Leave));
        }

        let game_match = upcoming_mut(&mut self.matches, match_id)?;
        if !game_match.remove_member(player_id) {
            return Err(CoreError::conflict(format!(
                "player {} is not on the roster",
                player_id
            )));
        }
        if let Some(player) = self.players.get_mut(player_id) {
            ledger::remove_placeholder(player, match_id);
        }

        info!("Player {} left match {}", player_id, match_id);
        Ok(game_match.clone())
    }

    /// Remove a member on behalf of the creator or a scoped admin.
    ///
    /// Any draft, confirmed or not, locks the roster.
    pub fn remove_member(
        &mut self,
        match_id: &MatchId,
        actor_id: &PlayerId,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Match, CoreError> {
        let actor = self.player(actor_id)?;
        let game_match = self.get_match(match_id)?;

        if !self.can_manage(actor, game_match) {
            return Err(CoreError::forbidden(
                "only the creator or a court admin may remove members",
            ));
        }
        if self.draft_for_match(match_id).is_some() {
            return Err(CoreError::conflict(
                "roster is locked once a result exists",
            ));
        }
        if now > game_match.start_time + self.rules.join_grace()
            && !actor.primary_role().is_unrestricted()
        {
            return Err(CoreError::WindowExpired(TimeWindow::Removal));
        }
        if &game_match.creator == player_id {
            return Err(CoreError::forbidden("the creator cannot be removed"));
        }

        let game_match = upcoming_mut(&mut self.matches, match_id)?;
        if !game_match.remove_member(player_id) {
            return Err(CoreError::conflict(format!(
                "player {} is not on the roster",
                player_id
            )));
        }
        if let Some(player) = self.players.get_mut(player_id) {
            ledger::remove_placeholder(player, match_id);
        }

        info!(
            "Player {} removed from match {} by {}",
            player_id, match_id, actor_id
        );
        Ok(game_match.clone())
    }

    /// Cancel a match, or delete it outright if only the creator is on it.
    pub fn cancel_or_delete_match(
        &mut self,
        match_id: &MatchId,
        actor_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, CoreError> {
        let actor = self.player(actor_id)?;
        let game_match = self.get_match(match_id)?;

        if !self.can_manage(actor, game_match) {
            return Err(CoreError::forbidden(
                "only the creator or a court admin may cancel a match",
            ));
        }
        if game_match.state != MatchState::Upcoming {
            return Err(CoreError::conflict(format!(
                "match {} is {}",
                match_id, game_match.state
            )));
        }

        let has_result = self.draft_for_match(match_id).is_some();

        if now < game_match.start_time {
            if game_match.roster.len() <= 1 {
                self.delete_match(match_id);
                return Ok(CancelOutcome::Deleted);
            }
            if has_result {
                return Err(CoreError::ResultExists(match_id.clone()));
            }
            self.cancel_match(match_id, now);
            return Ok(CancelOutcome::Cancelled);
        }

        let end = game_match.end_time();
        if now > end && now <= end + self.rules.cancel_after_end() {
            if has_result {
                return Err(CoreError::ResultExists(match_id.clone()));
            }
            self.cancel_match(match_id, now);
            return Ok(CancelOutcome::Cancelled);
        }

        Err(CoreError::WindowExpired(TimeWindow::Cancellation))
    }

    /// Mark a match cancelled and drop its placeholders.
    pub(crate) fn cancel_match(&mut self, match_id: &MatchId, now: DateTime<Utc>) {
        let Some(game_match) = self.matches.get_mut(match_id) else {
            return;
        };
        game_match.state = MatchState::Cancelled;
        game_match.closed_at = Some(now);
        let removed = clear_placeholders(&mut self.players, game_match);
        info!(
            "Match {} cancelled ({} placeholder entries removed)",
            match_id, removed
        );
    }

    /// Remove a match, its draft and its placeholders.
    pub(crate) fn delete_match(&mut self, match_id: &MatchId) {
        let Some(game_match) = self.matches.remove(match_id) else {
            return;
        };
        let removed = clear_placeholders(&mut self.players, &game_match);
        self.drafts.retain(|_, d| &d.match_id != match_id);
        info!(
            "Match {} deleted ({} placeholder entries removed)",
            match_id, removed
        );
    }
}
