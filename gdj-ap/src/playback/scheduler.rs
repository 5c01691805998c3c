//! Look-ahead stream scheduling clock
//!
//! Decides when each incoming audio chunk starts so playback is gapless
//! despite network jitter. Chunks are scheduled back-to-back from a
//! monotonically advancing `next_start_time`; the first chunk of an epoch
//! is pushed a fixed cushion into the future so the buffer fills before
//! audio is heard.
//!
//! All times are in seconds on the audio output's own clock. A
//! `next_start_time` of zero means "no epoch in progress" (fresh start,
//! post-underrun, or post-reset).

/// Look-ahead cushion between the first chunk's arrival and audible
/// playback, and the delay before the loading -> playing transition.
pub const BUFFER_TIME: f64 = 2.0;

/// Scheduling decision for one incoming chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// First chunk of a fresh epoch: schedule at `start_at` and arm the
    /// buffer-ready timer
    First { start_at: f64 },
    /// Steady-state chunk: schedule at `start_at`, back-to-back with the
    /// previous one
    Append { start_at: f64 },
    /// The output clock passed `next_start_time`: the device underran.
    /// The chunk is dropped and the epoch reset; the caller re-enters
    /// loading and waits for the buffer to refill.
    Underrun,
}

/// The scheduling clock
#[derive(Debug)]
pub struct StreamScheduler {
    next_start_time: f64,
    buffer_time: f64,
}

impl StreamScheduler {
    pub fn new(buffer_time: f64) -> Self {
        Self {
            next_start_time: 0.0,
            buffer_time,
        }
    }

    /// Decide where the chunk of `duration` seconds goes, given the output
    /// clock's current time, and advance the clock accordingly.
    pub fn on_chunk(&mut self, duration: f64, now: f64) -> Schedule {
        if self.next_start_time == 0.0 {
            let start_at = now + self.buffer_time;
            self.next_start_time = start_at + duration;
            return Schedule::First { start_at };
        }

        if self.next_start_time <= now {
            self.next_start_time = 0.0;
            return Schedule::Underrun;
        }

        let start_at = self.next_start_time;
        self.next_start_time += duration;
        Schedule::Append { start_at }
    }

    /// Abandon the current epoch (pause, stop, reconnect)
    pub fn reset(&mut self) {
        self.next_start_time = 0.0;
    }

    /// True when no epoch is in progress
    pub fn is_idle(&self) -> bool {
        self.next_start_time == 0.0
    }

    /// Where the next chunk would start (0.0 when idle)
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    /// Look-ahead cushion in seconds
    pub fn buffer_time(&self) -> f64 {
        self.buffer_time
    }
}

impl Default for StreamScheduler {
    fn default() -> Self {
        Self::new(BUFFER_TIME)
    }
}
