use crate::client_manager::ClientId;
use crate::error::SessionError;
use crate::scoring::ScoreBoard;
use log::{debug, info};
use shared::{CanvasId, Color, GameResults};
use std::collections::HashMap;

/// One cell of the shared board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanvasSlot {
    /// Client currently drawing on the canvas
    pub owner: Option<ClientId>,
    /// Set once the canvas is filled; never cleared until the game resets
    pub locked: bool,
}

/// Board-level game state: who holds which color, who is drawing on which
/// canvas, which canvases are finished, and the reported scores.
///
/// Not synchronized on its own; the session store wraps it in a lock so each
/// method runs as one transaction.
#[derive(Debug, Clone)]
pub struct GameState {
    board_size: usize,
    /// color hash -> owning client
    color_owners: HashMap<u32, ClientId>,
    /// client -> registered color hash
    client_colors: HashMap<ClientId, u32>,
    canvases: Vec<CanvasSlot>,
    scores: ScoreBoard,
}

impl GameState {
    pub fn new(board_size: usize) -> Self {
        Self {
            board_size,
            color_owners: HashMap::new(),
            client_colors: HashMap::new(),
            canvases: vec![CanvasSlot::default(); board_size],
            scores: ScoreBoard::new(),
        }
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    pub fn canvas(&self, canvas_id: CanvasId) -> Option<&CanvasSlot> {
        self.canvases.get(canvas_id)
    }

    pub fn ensure_canvas_in_range(&self, canvas_id: CanvasId) -> Result<(), SessionError> {
        if canvas_id < self.board_size {
            Ok(())
        } else {
            Err(SessionError::InvalidArgument(format!(
                "canvas {} is outside the board (size {})",
                canvas_id, self.board_size
            )))
        }
    }

    /// Claims `color_hash` for the client unless another client holds it.
    /// A client holds one color at a time; a successful registration frees
    /// its previous color.
    pub fn register_color(&mut self, client_id: ClientId, color_hash: u32) -> bool {
        match self.color_owners.get(&color_hash) {
            Some(owner) if *owner == client_id => true,
            Some(_) => false,
            None => {
                if let Some(previous) = self.client_colors.insert(client_id, color_hash) {
                    self.color_owners.remove(&previous);
                }
                self.color_owners.insert(color_hash, client_id);
                info!(
                    "Client {} registered color {}",
                    client_id,
                    Color::from_hash_code(color_hash)
                );
                true
            }
        }
    }

    pub fn color_of(&self, client_id: ClientId) -> Option<Color> {
        self.client_colors
            .get(&client_id)
            .map(|hash| Color::from_hash_code(*hash))
    }

    pub fn check_valid_color(&self, client_id: ClientId, color_hash: u32) -> bool {
        self.client_colors.get(&client_id) == Some(&color_hash)
    }

    /// Claims a canvas for drawing. Fails if the id is out of range, the
    /// canvas is locked, or another client is drawing on it. A client draws
    /// on one canvas at a time; a successful claim releases its previous one.
    pub fn acquire_canvas(&mut self, client_id: ClientId, canvas_id: CanvasId) -> bool {
        let Some(slot) = self.canvases.get(canvas_id) else {
            return false;
        };

        if slot.locked {
            return false;
        }
        match slot.owner {
            Some(owner) if owner == client_id => return true,
            Some(_) => return false,
            None => {}
        }

        self.release_canvas(client_id);
        self.canvases[canvas_id].owner = Some(client_id);
        debug!("Client {} acquired canvas {}", client_id, canvas_id);
        true
    }

    /// Releases whatever canvas the client holds. Idempotent.
    pub fn release_canvas(&mut self, client_id: ClientId) -> Option<CanvasId> {
        let canvas_id = self.owned_canvas(client_id)?;
        self.canvases[canvas_id].owner = None;
        debug!("Client {} released canvas {}", client_id, canvas_id);
        Some(canvas_id)
    }

    pub fn owned_canvas(&self, client_id: ClientId) -> Option<CanvasId> {
        self.canvases
            .iter()
            .position(|slot| slot.owner == Some(client_id))
    }

    pub fn check_valid_ownership(&self, client_id: ClientId, canvas_id: CanvasId) -> bool {
        self.canvases
            .get(canvas_id)
            .is_some_and(|slot| slot.owner == Some(client_id))
    }

    /// Permanently marks a canvas as filled for the rest of the game.
    pub fn lock_canvas(&mut self, canvas_id: CanvasId) -> Result<(), SessionError> {
        self.ensure_canvas_in_range(canvas_id)?;
        if !self.canvases[canvas_id].locked {
            self.canvases[canvas_id].locked = true;
            info!(
                "Canvas {} locked ({}/{} done)",
                canvas_id,
                self.locked_count(),
                self.board_size
            );
        }
        Ok(())
    }

    pub fn locked_count(&self) -> usize {
        self.canvases.iter().filter(|slot| slot.locked).count()
    }

    pub fn is_board_full(&self) -> bool {
        self.canvases.iter().all(|slot| slot.locked)
    }

    /// Records a color's score and reports whether the board is now full,
    /// which is the signal to resolve the winner.
    pub fn set_score(&mut self, color: Color, score: u32) -> bool {
        self.scores.set(color, score);
        self.is_board_full()
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    /// Resolves the winner. Only valid once every canvas is locked and at
    /// least one score has been reported.
    pub fn winner(&self) -> Result<GameResults, SessionError> {
        if !self.is_board_full() {
            return Err(SessionError::IllegalState(format!(
                "winner requested with {}/{} canvases locked",
                self.locked_count(),
                self.board_size
            )));
        }

        self.scores
            .resolve()
            .ok_or_else(|| SessionError::IllegalState("no scores reported".to_string()))
    }

    /// Drops everything a disconnecting client held.
    pub fn remove_client(&mut self, client_id: &ClientId) {
        if let Some(hash) = self.client_colors.remove(client_id) {
            self.color_owners.remove(&hash);
        }
        self.release_canvas(*client_id);
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.board_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Winner;

    const RED: u32 = 0xff0000ff;
    const BLUE: u32 = 0x0000ffff;

    #[test]
    fn test_color_is_exclusive() {
        let mut game = GameState::new(8);
        assert!(game.register_color(1, RED));
        assert!(!game.register_color(2, RED));
        assert!(game.register_color(2, BLUE));
        assert!(game.check_valid_color(1, RED));
        assert!(!game.check_valid_color(2, RED));
    }

    #[test]
    fn test_reregistering_replaces_previous_color() {
        let mut game = GameState::new(8);
        assert!(game.register_color(1, RED));
        assert!(game.register_color(1, RED));
        assert!(game.register_color(1, BLUE));
        assert_eq!(game.color_of(1), Some(Color::BLUE));
        // RED is free again
        assert!(game.register_color(2, RED));
    }

    #[test]
    fn test_canvas_is_exclusive_until_released() {
        let mut game = GameState::new(8);
        assert!(game.acquire_canvas(1, 3));
        assert!(!game.acquire_canvas(2, 3));
        game.release_canvas(1);
        assert!(game.acquire_canvas(2, 3));
        assert!(game.check_valid_ownership(2, 3));
        assert!(!game.check_valid_ownership(1, 3));
    }

    #[test]
    fn test_out_of_range_canvas_is_refused() {
        let mut game = GameState::new(4);
        assert!(!game.acquire_canvas(1, 4));
        assert!(!game.check_valid_ownership(1, 4));
        assert!(matches!(
            game.lock_canvas(4),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut game = GameState::new(8);
        game.acquire_canvas(1, 2);

        assert_eq!(game.release_canvas(1), Some(2));
        let after_once = game.canvas(2).copied();
        assert_eq!(game.release_canvas(1), None);
        assert_eq!(game.canvas(2).copied(), after_once);
        assert_eq!(game.owned_canvas(1), None);
    }

    #[test]
    fn test_acquiring_another_canvas_moves_ownership() {
        let mut game = GameState::new(8);
        assert!(game.acquire_canvas(1, 0));
        assert!(game.acquire_canvas(1, 0));
        assert!(game.acquire_canvas(1, 5));
        assert_eq!(game.owned_canvas(1), Some(5));
        assert!(game.acquire_canvas(2, 0));
    }

    #[test]
    fn test_locked_canvas_can_never_be_acquired() {
        let mut game = GameState::new(8);
        assert!(game.acquire_canvas(1, 6));
        game.lock_canvas(6).unwrap();
        game.release_canvas(1);

        assert!(!game.acquire_canvas(1, 6));
        assert!(!game.acquire_canvas(2, 6));
        assert!(game.canvas(6).unwrap().locked);
    }

    #[test]
    fn test_set_score_reports_board_full() {
        let mut game = GameState::new(2);
        game.lock_canvas(0).unwrap();
        assert!(!game.set_score(Color::RED, 10));
        game.lock_canvas(1).unwrap();
        assert!(game.set_score(Color::BLUE, 10));
    }

    #[test]
    fn test_winner_before_board_full_is_illegal() {
        let mut game = GameState::new(2);
        game.set_score(Color::RED, 10);
        assert!(matches!(game.winner(), Err(SessionError::IllegalState(_))));
    }

    #[test]
    fn test_winner_after_board_full() {
        let mut game = GameState::new(2);
        game.lock_canvas(0).unwrap();
        game.lock_canvas(1).unwrap();
        game.set_score(Color::RED, 40);
        game.set_score(Color::BLUE, 30);

        let results = game.winner().unwrap();
        assert_eq!(results.winner_score, 40);
        assert_eq!(results.winner, Winner::Color(Color::RED));
    }

    #[test]
    fn test_remove_client_frees_color_and_canvas() {
        let mut game = GameState::new(8);
        game.register_color(1, RED);
        game.acquire_canvas(1, 1);

        game.remove_client(&1);

        assert!(game.register_color(2, RED));
        assert!(game.acquire_canvas(2, 1));
    }

    #[test]
    fn test_reset_clears_locks_and_scores() {
        let mut game = GameState::new(3);
        game.register_color(1, RED);
        game.lock_canvas(0).unwrap();
        game.set_score(Color::RED, 10);

        game.reset();

        assert_eq!(game.board_size(), 3);
        assert_eq!(game.locked_count(), 0);
        assert!(game.scores().is_empty());
        assert_eq!(game.color_of(1), None);
    }
}
