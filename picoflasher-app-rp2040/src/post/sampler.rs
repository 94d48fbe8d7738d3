use embedded_hal_1::digital::InputPin;
use picoflasher_core::post::{PostDecoder, PostLog};

/// Polls the console's POST bus (8 data lines) and CPU reset line
pub struct PostSampler<I: InputPin> {
    lines: [I; 8],
    cpu_reset: I,
    decoder: PostDecoder,
}

impl<I: InputPin> PostSampler<I> {
    pub fn new(lines: [I; 8], cpu_reset: I) -> Self {
        Self {
            lines,
            cpu_reset,
            decoder: PostDecoder::new(),
        }
    }

    /// Sample once, recording a new code into `log`
    pub fn poll(&mut self, log: &mut PostLog) {
        let mut raw = 0u8;
        for (bit, line) in self.lines.iter_mut().enumerate() {
            if matches!(line.is_high(), Ok(true)) {
                raw |= 1 << bit;
            }
        }
        let cpu_running = matches!(self.cpu_reset.is_high(), Ok(true));
        if let Some(code) = self.decoder.sample(raw, cpu_running) {
            crate::trace!("POST {:#x}", code);
            log.push(code);
        }
    }
}
