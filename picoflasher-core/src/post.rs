//! Console POST (power-on self test) code capture.

/// Slots in the POST log ring
pub const POST_LOG_SIZE: usize = 0x100;

/// Lossy ring of the most recent POST codes. Once full, the oldest code is dropped,
/// so at most `POST_LOG_SIZE - 1` codes are held.
pub struct PostLog {
    buf: [u8; POST_LOG_SIZE],
    put: u8,
    get: u8,
}

impl Default for PostLog {
    fn default() -> Self {
        Self::new()
    }
}

impl PostLog {
    pub const fn new() -> Self {
        Self {
            buf: [0; POST_LOG_SIZE],
            put: 0,
            get: 0,
        }
    }

    pub fn push(&mut self, code: u8) {
        self.buf[usize::from(self.put)] = code;
        self.put = self.put.wrapping_add(1);
        if self.put == self.get {
            self.get = self.get.wrapping_add(1);
        }
    }

    pub fn len(&self) -> u8 {
        self.put.wrapping_sub(self.get)
    }

    pub fn is_empty(&self) -> bool {
        self.put == self.get
    }

    /// Held codes, oldest first. The second slice is non-empty when the ring wrapped.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let (get, put) = (usize::from(self.get), usize::from(self.put));
        if get <= put {
            (&self.buf[get..put], &[])
        } else {
            (&self.buf[get..], &self.buf[..put])
        }
    }

    pub fn clear(&mut self) {
        self.put = 0;
        self.get = 0;
    }
}

/// Turns raw POST bus samples into codes.
///
/// The POST lines are wired in reverse bit order. A code is reported when the value changes
/// while the CPU is out of reset.
#[derive(Default)]
pub struct PostDecoder {
    last: Option<u8>,
}

impl PostDecoder {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// `lines` holds POST line 0 in bit 0
    pub fn sample(&mut self, lines: u8, cpu_running: bool) -> Option<u8> {
        if !cpu_running {
            self.last = None;
            return None;
        }
        let code = lines.reverse_bits();
        if self.last == Some(code) {
            return None;
        }
        self.last = Some(code);
        Some(code)
    }
}
