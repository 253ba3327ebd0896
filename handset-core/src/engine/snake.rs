//! Snake, the built-in reference game.
//!
//! [`SnakeGame`] is the pure simulation: it never sleeps and never draws.
//! [`SnakeEngine`] drives it from a tokio interval and hands every rendered
//! frame to a [`FrameSink`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::Engine;
use crate::config::SnakeConfig;
use crate::display::{DisplayFrame, FrameSink, PixelRect};
use crate::error::{HandsetError, HandsetResult};
use crate::input::Key;
use crate::storage::KvStore;

/// Storage key of the saved snapshot.
pub const SNAKE_SAVE_KEY: &str = "snake_save";

pub const BACKGROUND_COLOR: &str = "#9DB892";
pub const BODY_COLOR: &str = "#2c3e50";
pub const FOOD_COLOR: &str = "#e74c3c";
pub const TEXT_COLOR: &str = "#000000";
pub const TEXT_FONT: &str = "bold 12px monospace";

/// Random probes before falling back to scanning for free cells.
const FOOD_ATTEMPTS: usize = 64;

/// Grid cell, in cells rather than pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Unit movement vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    pub x: i32,
    pub y: i32,
}

impl Direction {
    pub const UP: Direction = Direction { x: 0, y: -1 };
    pub const DOWN: Direction = Direction { x: 0, y: 1 };
    pub const LEFT: Direction = Direction { x: -1, y: 0 };
    pub const RIGHT: Direction = Direction { x: 1, y: 0 };

    fn shares_axis(self, other: Direction) -> bool {
        (self.x != 0 && other.x != 0) || (self.y != 0 && other.y != 0)
    }
}

/// Persisted game snapshot. Segments are head-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeSnapshot {
    pub snake: Vec<Cell>,
    pub direction: Direction,
    pub food: Cell,
    pub score: u32,
    pub speed: u64,
}

/// What an input did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored,
    Steered,
    PauseToggled,
    /// The game was reset; the tick loop must be restarted.
    Reset,
}

pub struct SnakeGame {
    config: SnakeConfig,
    segments: VecDeque<Cell>,
    direction: Direction,
    pending_direction: Direction,
    food: Cell,
    score: u32,
    speed_ms: u64,
    game_over: bool,
    paused: bool,
    rng: StdRng,
}

impl SnakeGame {
    pub fn new(config: SnakeConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic food placement, for tests and replays.
    pub fn with_seed(config: SnakeConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SnakeConfig, rng: StdRng) -> Self {
        let origin = Cell::new(config.origin.0, config.origin.1);
        let mut game = Self {
            segments: VecDeque::from([origin]),
            direction: Direction::RIGHT,
            pending_direction: Direction::RIGHT,
            food: origin,
            score: 0,
            speed_ms: config.tick_ms,
            game_over: false,
            paused: false,
            rng,
            config,
        };
        game.reset();
        game
    }

    /// Back to a single segment at the origin, score 0, default speed.
    pub fn reset(&mut self) {
        let origin = Cell::new(self.config.origin.0, self.config.origin.1);
        self.segments = VecDeque::from([origin]);
        self.direction = Direction::RIGHT;
        self.pending_direction = Direction::RIGHT;
        self.score = 0;
        self.speed_ms = self.config.tick_ms;
        self.game_over = false;
        self.paused = false;
        match self.generate_food() {
            Some(food) => self.food = food,
            None => self.game_over = true,
        }
    }

    pub fn config(&self) -> &SnakeConfig {
        &self.config
    }

    pub fn head(&self) -> Cell {
        self.segments[0]
    }

    pub fn segments(&self) -> impl Iterator<Item = Cell> + '_ {
        self.segments.iter().copied()
    }

    pub fn length(&self) -> usize {
        self.segments.len()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn food(&self) -> Cell {
        self.food
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Tick period in milliseconds.
    pub fn speed(&self) -> u64 {
        self.speed_ms
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// One timer tick: update and render unless paused or over.
    pub fn tick(&mut self) -> Option<DisplayFrame> {
        if self.paused || self.game_over {
            return None;
        }
        self.update();
        Some(self.render())
    }

    /// Advance the simulation by one step.
    pub fn update(&mut self) {
        self.direction = self.pending_direction;

        let head = self.head();
        let next = Cell::new(
            (head.x + self.direction.x).rem_euclid(self.config.cols),
            (head.y + self.direction.y).rem_euclid(self.config.rows),
        );

        if self.segments.contains(&next) {
            info!(score = self.score, length = self.segments.len(), "snake bit itself");
            self.game_over = true;
            return;
        }

        self.segments.push_front(next);

        if next == self.food {
            self.score += self.config.food_score;
            match self.generate_food() {
                Some(food) => self.food = food,
                None => {
                    info!(score = self.score, "board full");
                    self.game_over = true;
                }
            }
        } else {
            self.segments.pop_back();
        }
    }

    /// Describe the current state for a display sink.
    pub fn render(&self) -> DisplayFrame {
        let cell = self.config.cell_size;
        let rect = |c: Cell, color: &str| PixelRect {
            x: c.x * cell,
            y: c.y * cell,
            width: cell - 1,
            height: cell - 1,
            color: color.to_string(),
        };

        let mut pixels: Vec<PixelRect> = self.segments.iter().map(|&c| rect(c, BODY_COLOR)).collect();
        pixels.push(rect(self.food, FOOD_COLOR));

        let (text, text_x, text_y) = if self.game_over {
            (
                format!("GAME OVER! Score: {}", self.score),
                20,
                self.config.rows * cell / 2,
            )
        } else if self.paused {
            (format!("PAUSED - Score: {}", self.score), 10, 15)
        } else {
            (format!("Score: {}", self.score), 10, 15)
        };

        DisplayFrame {
            background_color: BACKGROUND_COLOR.to_string(),
            pixels,
            text,
            text_color: TEXT_COLOR.to_string(),
            font: TEXT_FONT.to_string(),
            text_x,
            text_y,
        }
    }

    /// Apply one key. While the game is over only Select (restart) counts.
    pub fn handle_input(&mut self, key: &Key) -> InputOutcome {
        if self.game_over {
            if *key == Key::Select {
                self.reset();
                return InputOutcome::Reset;
            }
            return InputOutcome::Ignored;
        }

        match key {
            Key::Up | Key::Digit(2) => self.steer(Direction::UP),
            Key::Down | Key::Digit(8) => self.steer(Direction::DOWN),
            Key::Left | Key::Digit(4) => self.steer(Direction::LEFT),
            Key::Right | Key::Digit(6) => self.steer(Direction::RIGHT),
            Key::Back => {
                self.paused = !self.paused;
                InputOutcome::PauseToggled
            }
            _ => InputOutcome::Ignored,
        }
    }

    fn steer(&mut self, dir: Direction) -> InputOutcome {
        // Checked against the committed direction, not the pending one
        if dir.shares_axis(self.direction) {
            return InputOutcome::Ignored;
        }
        self.pending_direction = dir;
        InputOutcome::Steered
    }

    pub fn snapshot(&self) -> SnakeSnapshot {
        SnakeSnapshot {
            snake: self.segments.iter().copied().collect(),
            direction: self.direction,
            food: self.food,
            score: self.score,
            speed: self.speed_ms,
        }
    }

    /// Replace state with `snapshot`, clearing the paused and game-over flags.
    pub fn restore(&mut self, snapshot: SnakeSnapshot) -> HandsetResult<()> {
        if snapshot.snake.is_empty() {
            return Err(HandsetError::CorruptSave("snake has no segments".into()));
        }
        if snapshot.speed == 0 {
            return Err(HandsetError::CorruptSave("tick speed is zero".into()));
        }
        self.segments = snapshot.snake.into();
        self.direction = snapshot.direction;
        self.pending_direction = snapshot.direction;
        self.food = snapshot.food;
        self.score = snapshot.score;
        self.speed_ms = snapshot.speed;
        self.game_over = false;
        self.paused = false;
        Ok(())
    }

    /// A uniformly random cell not covered by the snake, or None when the
    /// snake fills the grid.
    fn generate_food(&mut self) -> Option<Cell> {
        let (cols, rows) = (self.config.cols, self.config.rows);
        if cols <= 0 || rows <= 0 {
            return None;
        }
        if self.segments.len() >= cols as usize * rows as usize {
            return None;
        }

        for _ in 0..FOOD_ATTEMPTS {
            let cell = Cell::new(self.rng.random_range(0..cols), self.rng.random_range(0..rows));
            if !self.segments.contains(&cell) {
                return Some(cell);
            }
        }

        // Crowded board: pick among the free cells directly
        let free: Vec<Cell> = (0..rows)
            .flat_map(|y| (0..cols).map(move |x| Cell::new(x, y)))
            .filter(|c| !self.segments.contains(c))
            .collect();
        if free.is_empty() {
            return None;
        }
        Some(free[self.rng.random_range(0..free.len())])
    }

    #[cfg(test)]
    fn place(&mut self, segments: &[Cell], direction: Direction, food: Cell) {
        self.segments = segments.iter().copied().collect();
        self.direction = direction;
        self.pending_direction = direction;
        self.food = food;
    }
}

/// Tick-driven host for [`SnakeGame`].
pub struct SnakeEngine {
    game: Arc<Mutex<SnakeGame>>,
    sink: Arc<dyn FrameSink>,
    store: Arc<dyn KvStore>,
    ticker: Option<JoinHandle<()>>,
}

impl SnakeEngine {
    pub fn new(config: SnakeConfig, store: Arc<dyn KvStore>, sink: Arc<dyn FrameSink>) -> Self {
        Self::with_game(SnakeGame::new(config), store, sink)
    }

    pub fn with_game(game: SnakeGame, store: Arc<dyn KvStore>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            game: Arc::new(Mutex::new(game)),
            sink,
            store,
            ticker: None,
        }
    }

    /// Lock the simulation for inspection.
    pub fn game(&self) -> MutexGuard<'_, SnakeGame> {
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_ticker(&mut self) {
        let period = Duration::from_millis(self.game().speed());
        let game = Arc::clone(&self.game);
        let sink = Arc::clone(&self.sink);

        debug!(period_ms = period.as_millis() as u64, "snake tick loop starting");
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the first step is one period in
            interval.tick().await;
            loop {
                interval.tick().await;
                let frame = game.lock().unwrap_or_else(PoisonError::into_inner).tick();
                if let Some(frame) = frame {
                    sink.present(&frame);
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    fn restart(&mut self) {
        self.stop_ticker();
        self.spawn_ticker();
    }
}

#[async_trait]
impl Engine for SnakeEngine {
    fn name(&self) -> &str {
        "snake"
    }

    async fn start(&mut self) -> HandsetResult<()> {
        if self.is_running() {
            return Ok(());
        }
        self.game().config().validate()?;
        info!("snake started");
        self.spawn_ticker();
        Ok(())
    }

    fn stop(&mut self) {
        if self.ticker.is_some() {
            info!(score = self.game().score(), "snake stopped");
        }
        self.stop_ticker();
    }

    fn handle_input(&mut self, key: &Key) {
        let outcome = self.game().handle_input(key);
        debug!(%key, ?outcome, "snake input");
        if !self.is_running() {
            return;
        }
        match outcome {
            InputOutcome::Reset => self.restart(),
            // Ticks stop while paused, so the overlay is drawn here
            InputOutcome::PauseToggled => {
                let frame = self.game().render();
                self.sink.present(&frame);
            }
            InputOutcome::Ignored | InputOutcome::Steered => {}
        }
    }

    fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn supports_save(&self) -> bool {
        true
    }

    fn save_state(&mut self) -> HandsetResult<()> {
        let snapshot = self.game().snapshot();
        let json = serde_json::to_string(&snapshot)?;
        self.store.set(SNAKE_SAVE_KEY, &json)?;
        info!(score = snapshot.score, length = snapshot.snake.len(), "snake saved");
        Ok(())
    }

    fn load_state(&mut self) -> HandsetResult<()> {
        let json = self.store.get(SNAKE_SAVE_KEY).ok_or(HandsetError::NoSavedState)?;
        let snapshot: SnakeSnapshot = serde_json::from_str(&json)?;
        self.game().restore(snapshot)?;
        info!("snake restored");
        self.restart();
        Ok(())
    }
}

impl Drop for SnakeEngine {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
