//! Ten-frame bowling scoreboard.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Frames in a game.
pub const FRAME_COUNT: usize = 10;
/// Pins in a full rack.
pub const MAX_PINS: u8 = 10;

const LAST_FRAME: usize = FRAME_COUNT - 1;

/// Rolls the scoreboard refuses to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("a roll cannot knock down {pins} pins")]
    TooManyPins { pins: u8 },
    #[error("{pins} pins knocked down but only {standing} were standing")]
    ExceedsStanding { pins: u8, standing: u8 },
    #[error("the game is already finished")]
    GameFinished,
}

/// One frame. Rolls are `None` until bowled; `score` is `None` until its
/// bonus rolls exist.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    pub roll1: Option<u8>,
    pub roll2: Option<u8>,
    /// Only used by the tenth frame.
    pub roll3: Option<u8>,
    pub is_strike: bool,
    pub is_spare: bool,
    pub score: Option<u32>,
}

impl Frame {
    fn pins(self) -> u32 {
        [self.roll1, self.roll2, self.roll3]
            .into_iter()
            .flatten()
            .map(u32::from)
            .sum()
    }
}

/// One scoreboard column ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRow {
    /// Roll marks: `X`, `/`, `-`, a digit, or blank for unbowled.
    pub marks: [char; 3],
    /// Running total through this frame, once it is known.
    pub cumulative: Option<u32>,
    /// Strike/spare bonus carried by this frame.
    pub bonus: Option<u32>,
}

/// Ten frames plus the total.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scoreboard {
    frames: [Frame; FRAME_COUNT],
    total_score: u32,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn frames(&self) -> &[Frame; FRAME_COUNT] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    /// Index of the frame the next roll goes into. Stays on the tenth frame
    /// once the game is over.
    pub fn current_frame_index(&self) -> usize {
        self.frames[..LAST_FRAME]
            .iter()
            .position(|f| !f.is_strike && f.roll2.is_none())
            .unwrap_or(LAST_FRAME)
    }

    /// Pins standing for the next roll.
    pub fn standing_pins(&self) -> u8 {
        let index = self.current_frame_index();
        let f = &self.frames[index];
        match (f.roll1, f.roll2) {
            (None, _) => MAX_PINS,
            (Some(r1), None) if index < LAST_FRAME || r1 < MAX_PINS => MAX_PINS - r1,
            (Some(_), None) => MAX_PINS,
            (Some(r1), Some(r2)) => {
                if r1 == MAX_PINS && r2 < MAX_PINS {
                    MAX_PINS - r2
                } else {
                    MAX_PINS
                }
            }
        }
    }

    pub fn is_game_finished(&self) -> bool {
        if self.current_frame_index() < LAST_FRAME {
            return false;
        }
        let last = &self.frames[LAST_FRAME];
        match (last.roll1, last.roll2) {
            (Some(_), Some(_)) if last.is_strike || last.is_spare => last.roll3.is_some(),
            (Some(_), Some(_)) => true,
            _ => false,
        }
    }

    /// Records a roll and rescores every frame. Returns whether the roll
    /// completed its frame.
    pub fn add_roll(&mut self, pins: u8) -> Result<bool, ScoreError> {
        if let Err(err) = self.check_roll(pins) {
            tracing::error!(pins, %err, "[score] roll rejected");
            return Err(err);
        }

        let index = self.current_frame_index();
        let completed = if index < LAST_FRAME {
            self.record_open_frame(index, pins)
        } else {
            self.record_last_frame(pins)
        };
        self.recompute();

        tracing::debug!(
            frame = index + 1,
            pins,
            completed,
            total = self.total_score,
            "[score] roll recorded"
        );
        Ok(completed)
    }

    fn check_roll(&self, pins: u8) -> Result<(), ScoreError> {
        if self.is_game_finished() {
            return Err(ScoreError::GameFinished);
        }
        if pins > MAX_PINS {
            return Err(ScoreError::TooManyPins { pins });
        }
        let standing = self.standing_pins();
        if pins > standing {
            return Err(ScoreError::ExceedsStanding { pins, standing });
        }
        Ok(())
    }

    fn record_open_frame(&mut self, index: usize, pins: u8) -> bool {
        let frame = &mut self.frames[index];
        match frame.roll1 {
            None if pins == MAX_PINS => {
                frame.roll1 = Some(pins);
                frame.roll2 = Some(0);
                frame.is_strike = true;
                true
            }
            None => {
                frame.roll1 = Some(pins);
                false
            }
            Some(r1) => {
                frame.roll2 = Some(pins);
                frame.is_spare = r1 + pins == MAX_PINS;
                true
            }
        }
    }

    fn record_last_frame(&mut self, pins: u8) -> bool {
        let frame = &mut self.frames[LAST_FRAME];
        match (frame.roll1, frame.roll2) {
            (None, _) => {
                frame.roll1 = Some(pins);
                frame.is_strike = pins == MAX_PINS;
                false
            }
            (Some(r1), None) => {
                frame.roll2 = Some(pins);
                frame.is_spare = !frame.is_strike && r1 + pins == MAX_PINS;
                !(frame.is_strike || frame.is_spare)
            }
            (Some(_), Some(_)) => {
                frame.roll3 = Some(pins);
                true
            }
        }
    }

    /// Rescores every frame from the recorded rolls. Running it again
    /// without a new roll changes nothing.
    pub fn recompute(&mut self) {
        let mut rolls: Vec<u32> = Vec::with_capacity(21);
        let mut starts = [0usize; FRAME_COUNT];
        for (index, frame) in self.frames.iter().enumerate() {
            starts[index] = rolls.len();
            if index < LAST_FRAME && frame.is_strike {
                rolls.push(u32::from(MAX_PINS));
            } else {
                rolls.extend(
                    [frame.roll1, frame.roll2, frame.roll3]
                        .into_iter()
                        .flatten()
                        .map(u32::from),
                );
            }
        }
        let bonus = |from: usize, count: usize| -> Option<u32> {
            let window = rolls.get(from..from + count)?;
            Some(window.iter().sum())
        };

        for (index, frame) in self.frames.iter_mut().enumerate() {
            let start = starts[index];
            let base = u32::from(MAX_PINS);
            frame.score = if index == LAST_FRAME {
                frame.roll1.map(|_| frame.pins())
            } else if frame.is_strike {
                bonus(start + 1, 2).map(|b| base + b)
            } else if frame.is_spare {
                bonus(start + 2, 1).map(|b| base + b)
            } else {
                match (frame.roll1, frame.roll2) {
                    (Some(r1), Some(r2)) => Some(u32::from(r1) + u32::from(r2)),
                    _ => None,
                }
            };
        }

        self.total_score = self.frames.iter().filter_map(|f| f.score).sum();
    }

    /// Display rows for every frame.
    pub fn rows(&self) -> [FrameRow; FRAME_COUNT] {
        let mut running = Some(0u32);
        std::array::from_fn(|index| {
            let frame = &self.frames[index];
            running = match (running, frame.score) {
                (Some(sum), Some(score)) => Some(sum + score),
                _ => None,
            };
            let bonus = if index < LAST_FRAME && (frame.is_strike || frame.is_spare) {
                frame.score.map(|s| s.saturating_sub(u32::from(MAX_PINS)))
            } else {
                None
            };
            FrameRow {
                marks: marks(frame, index == LAST_FRAME),
                cumulative: running,
                bonus,
            }
        })
    }
}

fn roll_mark(pins: Option<u8>, previous: Option<u8>) -> char {
    match (pins, previous) {
        (None, _) => ' ',
        (Some(p), Some(prev)) if prev < MAX_PINS && prev + p == MAX_PINS => '/',
        (Some(MAX_PINS), _) => 'X',
        (Some(0), _) => '-',
        (Some(p), _) => char::from(b'0' + p),
    }
}

fn marks(frame: &Frame, last: bool) -> [char; 3] {
    if !last {
        if frame.is_strike {
            return ['X', ' ', ' '];
        }
        return [
            roll_mark(frame.roll1, None),
            roll_mark(frame.roll2, frame.roll1),
            ' ',
        ];
    }
    // In the tenth a fresh rack follows every strike or spare.
    let fresh_after = |roll: Option<u8>, previous: Option<u8>| match (roll, previous) {
        (Some(MAX_PINS), _) => None,
        (Some(r), Some(p)) if p < MAX_PINS && p + r == MAX_PINS => None,
        (r, _) => r,
    };
    let second_prev = frame.roll1.filter(|r| *r < MAX_PINS);
    let third_prev = fresh_after(frame.roll2, frame.roll1);
    [
        roll_mark(frame.roll1, None),
        roll_mark(frame.roll2, second_prev),
        roll_mark(frame.roll3, third_prev),
    ]
}

impl fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        for (index, row) in rows.iter().enumerate() {
            let marks: String = if index == LAST_FRAME {
                row.marks.iter().collect()
            } else {
                row.marks[..2].iter().collect()
            };
            write!(f, "|{marks:^5}")?;
        }
        writeln!(f, "|")?;
        for row in &rows {
            match row.cumulative {
                Some(total) => write!(f, "|{total:^5}")?,
                None => write!(f, "|{:^5}", "")?,
            }
        }
        write!(f, "| {}", self.total_score)
    }
}
