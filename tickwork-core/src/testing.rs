//! Simulated hardware for host-side testing
//!
//! [`SimBoard`] implements every hardware collaborator trait over plain
//! in-memory state, so components can be driven deterministically:
//!
//! ```
//! use tickwork_core::testing::SimBoard;
//! use tickwork_core::ChannelIo;
//! use tickwork_hal::Clock;
//!
//! let mut board = SimBoard::<4>::new();
//! board.set_input(0, 1);
//! board.advance(250);
//! assert!(board.read_digital(0));
//! assert_eq!(board.now(), 250);
//! ```

use heapless::{Deque, HistoryBuffer};

use tickwork_hal::{Capabilities, ChannelId, ChannelIo, ChannelMode, Clock, Delay, Tick};

/// Scripted readings per channel
pub const SCRIPT_DEPTH: usize = 16;

/// Output writes remembered by the board
pub const WRITE_HISTORY: usize = 32;

#[derive(Default)]
struct SimChannel {
    capabilities: Capabilities,
    mode: Option<ChannelMode>,
    input: u16,
    script: Deque<u16, SCRIPT_DEPTH>,
    output: i32,
    writes: u32,
    reads: u32,
}

/// In-memory board with `N` channels
pub struct SimBoard<const N: usize> {
    channels: [SimChannel; N],
    now: Tick,
    delayed: Tick,
    history: HistoryBuffer<(ChannelId, i32), WRITE_HISTORY>,
}

impl<const N: usize> SimBoard<N> {
    /// Create a board with digital-only channels at tick 0
    pub fn new() -> Self {
        Self {
            channels: core::array::from_fn(|_| SimChannel::default()),
            now: 0,
            delayed: 0,
            history: HistoryBuffer::new(),
        }
    }

    fn channel(&self, id: ChannelId) -> Option<&SimChannel> {
        self.channels.get(usize::from(id))
    }

    fn channel_mut(&mut self, id: ChannelId) -> Option<&mut SimChannel> {
        self.channels.get_mut(usize::from(id))
    }

    /// Set what a channel supports
    pub fn set_capabilities(&mut self, id: ChannelId, capabilities: Capabilities) {
        if let Some(ch) = self.channel_mut(id) {
            ch.capabilities = capabilities;
        }
    }

    /// Set the steady input value of a channel
    pub fn set_input(&mut self, id: ChannelId, value: u16) {
        if let Some(ch) = self.channel_mut(id) {
            ch.input = value;
        }
    }

    /// Queue readings returned (in order) before the steady value
    pub fn script(&mut self, id: ChannelId, values: &[u16]) {
        if let Some(ch) = self.channel_mut(id) {
            for &v in values {
                if ch.script.push_back(v).is_err() {
                    break;
                }
            }
        }
    }

    /// Last value written to a channel
    pub fn output(&self, id: ChannelId) -> i32 {
        self.channel(id).map_or(0, |ch| ch.output)
    }

    /// Number of writes to a channel
    pub fn writes(&self, id: ChannelId) -> u32 {
        self.channel(id).map_or(0, |ch| ch.writes)
    }

    /// Number of reads from a channel
    pub fn reads(&self, id: ChannelId) -> u32 {
        self.channel(id).map_or(0, |ch| ch.reads)
    }

    /// Mode a channel was configured with
    pub fn mode(&self, id: ChannelId) -> Option<ChannelMode> {
        self.channel(id).and_then(|ch| ch.mode)
    }

    /// Recent writes, oldest first
    pub fn history(&self) -> impl Iterator<Item = &(ChannelId, i32)> {
        self.history.oldest_ordered()
    }

    /// Set the clock
    pub fn set_now(&mut self, now: Tick) {
        self.now = now;
    }

    /// Advance the clock
    pub fn advance(&mut self, ticks: Tick) {
        self.now = self.now.wrapping_add(ticks);
    }

    /// Total ticks spent in [`Delay::delay`]
    pub fn delayed(&self) -> Tick {
        self.delayed
    }

    fn next_reading(&mut self, id: ChannelId) -> u16 {
        match self.channel_mut(id) {
            Some(ch) => {
                ch.reads += 1;
                ch.script.pop_front().unwrap_or(ch.input)
            }
            None => 0,
        }
    }

    fn record_write(&mut self, id: ChannelId, value: i32) {
        if let Some(ch) = self.channel_mut(id) {
            ch.output = value;
            ch.writes += 1;
            self.history.write((id, value));
        }
    }
}

impl<const N: usize> Default for SimBoard<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Clock for SimBoard<N> {
    fn now(&self) -> Tick {
        self.now
    }
}

impl<const N: usize> Delay for SimBoard<N> {
    fn delay(&mut self, ticks: Tick) {
        self.delayed = self.delayed.wrapping_add(ticks);
        self.advance(ticks);
    }
}

impl<const N: usize> ChannelIo for SimBoard<N> {
    fn configure_channel(&mut self, id: ChannelId, mode: ChannelMode) {
        if let Some(ch) = self.channel_mut(id) {
            ch.mode = Some(mode);
        }
    }

    fn capabilities(&self, id: ChannelId) -> Capabilities {
        self.channel(id).map(|ch| ch.capabilities).unwrap_or_default()
    }

    fn read_digital(&mut self, id: ChannelId) -> bool {
        // Output channels read back what was last driven
        if self.mode(id) == Some(ChannelMode::Output) {
            return self.output(id) != 0;
        }
        self.next_reading(id) != 0
    }

    fn read_analog(&mut self, id: ChannelId) -> u16 {
        self.next_reading(id)
    }

    fn write_digital(&mut self, id: ChannelId, high: bool) {
        self.record_write(id, i32::from(high));
    }

    fn write_pwm(&mut self, id: ChannelId, duty: u16) {
        self.record_write(id, i32::from(duty));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_before_steady_value() {
        let mut board = SimBoard::<2>::new();
        board.set_input(0, 7);
        board.script(0, &[1, 2]);

        assert_eq!(board.read_analog(0), 1);
        assert_eq!(board.read_analog(0), 2);
        assert_eq!(board.read_analog(0), 7);
        assert_eq!(board.reads(0), 3);
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let mut board = SimBoard::<2>::new();
        board.write_digital(9, true);
        assert_eq!(board.output(9), 0);
        assert!(!board.read_digital(9));
    }

    #[test]
    fn test_output_reads_back() {
        let mut board = SimBoard::<2>::new();
        board.set_input(0, 1);
        board.configure_channel(0, ChannelMode::Output);
        assert!(!board.read_digital(0));
        board.write_pwm(0, 40);
        assert!(board.read_digital(0));
        assert_eq!(board.history().copied().last(), Some((0, 40)));
    }

    #[test]
    fn test_delay_advances_clock() {
        let mut board = SimBoard::<1>::new();
        board.delay(30);
        board.delay(12);
        assert_eq!(board.now(), 42);
        assert_eq!(board.delayed(), 42);
    }
}
