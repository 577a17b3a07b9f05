use crate::error::MatrixError;
use crate::types::CompetitorIndex;

/// Square "beats" relation over competitor indices.
///
/// `beats(i, j)` holds when `i` won against `j` directly or through a chain of
/// results. The relation is kept transitively closed after every `record`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WinMatrix {
  size: usize,
  cells: Vec<bool>,
  recorded: usize,
}

impl WinMatrix {
  pub fn new(size: usize) -> Self {
    WinMatrix {
      size,
      cells: vec![false; size * size],
      recorded: 0,
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Number of direct results recorded so far.
  pub fn recorded(&self) -> usize {
    self.recorded
  }

  /// Reinitializes the matrix to all-false at `size`. Only allowed before any result lands.
  pub fn resize(&mut self, size: usize) -> Result<(), MatrixError> {
    if self.recorded > 0 {
      return Err(MatrixError::InvalidState);
    }
    self.size = size;
    self.cells = vec![false; size * size];
    Ok(())
  }

  pub fn beats(&self, winner: CompetitorIndex, loser: CompetitorIndex) -> bool {
    if winner >= self.size || loser >= self.size {
      return false;
    }
    self.cells[winner * self.size + loser]
  }

  /// Sets `winner -> loser` and recomputes the closure.
  ///
  /// # Panics
  ///
  /// Panics if `loser` is already known to beat `winner`; the caller only
  /// records results for pairs the matrix left undetermined.
  pub fn record(&mut self, winner: CompetitorIndex, loser: CompetitorIndex) -> Result<(), MatrixError> {
    self.check_index(winner)?;
    self.check_index(loser)?;
    if winner == loser {
      return Err(MatrixError::SelfMatch { index: winner });
    }
    assert!(
      !self.beats(loser, winner),
      "win matrix inconsistency: recording {winner} over {loser} but {loser} already beats {winner}"
    );
    self.cells[winner * self.size + loser] = true;
    self.recorded += 1;
    self.close();
    Ok(())
  }

  /// Returns whichever of the two is proven to beat the other.
  ///
  /// # Panics
  ///
  /// Panics when both directions are set, which means the closure was corrupted.
  pub fn known_winner(&self, a: CompetitorIndex, b: CompetitorIndex) -> Option<CompetitorIndex> {
    if a == b {
      return None;
    }
    match (self.beats(a, b), self.beats(b, a)) {
      (true, false) => Some(a),
      (false, true) => Some(b),
      (false, false) => None,
      (true, true) => panic!("win matrix inconsistency: {a} and {b} are both proven to beat each other"),
    }
  }

  /// Indices this competitor is known to beat.
  pub fn victims_of(&self, winner: CompetitorIndex) -> Vec<CompetitorIndex> {
    if winner >= self.size {
      return Vec::new();
    }
    (0..self.size).filter(|&j| self.beats(winner, j)).collect()
  }

  pub fn is_closed(&self) -> bool {
    let n = self.size;
    for i in 0..n {
      for k in 0..n {
        if !self.cells[i * n + k] {
          continue;
        }
        for j in 0..n {
          if self.cells[k * n + j] && !self.cells[i * n + j] {
            return false;
          }
        }
      }
    }
    true
  }

  // Warshall: one pass over every intermediate k yields the full closure.
  fn close(&mut self) {
    let n = self.size;
    for k in 0..n {
      for i in 0..n {
        if !self.cells[i * n + k] {
          continue;
        }
        for j in 0..n {
          if self.cells[k * n + j] {
            self.cells[i * n + j] = true;
          }
        }
      }
    }
    for i in 0..n {
      debug_assert!(!self.cells[i * n + i], "win matrix self-loop at {i}");
    }
  }

  fn check_index(&self, index: CompetitorIndex) -> Result<(), MatrixError> {
    if index >= self.size {
      return Err(MatrixError::OutOfRange { index, size: self.size });
    }
    Ok(())
  }
}
