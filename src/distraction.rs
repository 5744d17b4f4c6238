use rand::seq::SliceRandom;
use rand::Rng;
use std::f64::consts::TAU;

/// Upper bound on floaters alive at once.
pub const MAX_FLOATERS: usize = 40;
const SYMBOLS: [char; 7] = ['✦', '◆', '●', '✶', '◇', '○', '✧'];
const BOB_AMPLITUDE: f64 = 4.0;

/// A glyph drifting across the playground, positions in percent (5..=95).
#[derive(Debug, Clone)]
pub struct Floater {
    pub x: f64,
    pub y: f64,
    base_y: f64,
    drift: f64,
    /// Seconds per bob cycle.
    period: f64,
    phase: f64,
    pub symbol: char,
    pub color_index: usize,
}

impl Floater {
    pub fn spawn(rng: &mut impl Rng) -> Self {
        let y = rng.gen_range(5.0..95.0);
        Self {
            x: rng.gen_range(5.0..95.0),
            y,
            base_y: y,
            drift: rng.gen_range(-3.0..3.0),
            period: rng.gen_range(4.0..8.0),
            phase: 0.0,
            symbol: *SYMBOLS.choose(rng).unwrap_or(&'✦'),
            color_index: rng.gen_range(0..SYMBOLS.len()),
        }
    }

    fn update(&mut self, dt: f64) {
        self.phase = (self.phase + dt / self.period) % 1.0;
        self.y = (self.base_y + BOB_AMPLITUDE * (self.phase * TAU).sin()).clamp(5.0, 95.0);
        self.x += self.drift * dt;
        if self.x < 5.0 {
            self.x = 95.0;
        } else if self.x > 95.0 {
            self.x = 5.0;
        }
    }
}

/// The floaters layered over the playground to pull the eye away.
#[derive(Debug, Default)]
pub struct Distractions {
    pub floaters: Vec<Floater>,
}

impl Distractions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` floaters; the oldest are dropped past [`MAX_FLOATERS`].
    pub fn spawn(&mut self, count: usize, rng: &mut impl Rng) {
        self.floaters.extend((0..count).map(|_| Floater::spawn(rng)));
        if self.floaters.len() > MAX_FLOATERS {
            let excess = self.floaters.len() - MAX_FLOATERS;
            self.floaters.drain(..excess);
        }
    }

    pub fn update(&mut self, dt: f64) {
        for floater in &mut self.floaters {
            floater.update(dt);
        }
    }

    pub fn len(&self) -> usize {
        self.floaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.floaters.is_empty()
    }
}
