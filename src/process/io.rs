use parking_lot::RwLock;

pub const INITIAL_BUFFER_SIZE: usize = 8192;

/// Append-only byte buffer that doubles its capacity when full.
#[derive(Debug)]
struct GrowableBuffer {
    data: Vec<u8>,
}

impl GrowableBuffer {
    fn new() -> Self {
        Self {
            data: Vec::with_capacity(INITIAL_BUFFER_SIZE),
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let new_capacity = (self.data.capacity() * 2).max(needed);
            let mut grown = Vec::with_capacity(new_capacity);
            grown.extend_from_slice(&self.data);
            self.data = grown;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Removes and returns about `max` bytes from the front without
    /// splitting a UTF-8 sequence.
    ///
    /// The cut backs off to the last whole character. When even the first
    /// character is wider than `max`, that character is taken whole, or
    /// nothing if its tail has not arrived yet.
    fn drain_front(&mut self, max: usize) -> Vec<u8> {
        let mut take = max.min(self.data.len());
        if take < self.data.len() {
            if let Err(e) = std::str::from_utf8(&self.data[..take]) {
                if e.error_len().is_none() {
                    take = if e.valid_up_to() > 0 {
                        e.valid_up_to()
                    } else {
                        let widest = self.data.len().min(4);
                        (take + 1..=widest)
                            .find(|&n| std::str::from_utf8(&self.data[..n]).is_ok())
                            .unwrap_or(0)
                    };
                }
            }
        }
        self.data.drain(..take).collect()
    }
}

#[derive(Debug)]
struct Streams {
    stdout: GrowableBuffer,
    stderr: GrowableBuffer,
}

/// Captured stdout/stderr of one process.
///
/// Written only by that process's monitor thread; read from anywhere. One
/// reader/writer lock covers both streams.
#[derive(Debug)]
pub struct ProcessIO {
    streams: RwLock<Streams>,
}

impl Default for ProcessIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessIO {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(Streams {
                stdout: GrowableBuffer::new(),
                stderr: GrowableBuffer::new(),
            }),
        }
    }

    pub fn append_stdout(&self, bytes: &[u8]) {
        self.streams.write().stdout.append(bytes);
    }

    pub fn append_stderr(&self, bytes: &[u8]) {
        self.streams.write().stderr.append(bytes);
    }

    pub fn get_stdout(&self) -> String {
        String::from_utf8_lossy(&self.streams.read().stdout.data).into_owned()
    }

    pub fn get_stderr(&self) -> String {
        String::from_utf8_lossy(&self.streams.read().stderr.data).into_owned()
    }

    /// Stdout followed by stderr.
    pub fn get_all_output(&self) -> String {
        let streams = self.streams.read();
        let mut all = Vec::with_capacity(streams.stdout.data.len() + streams.stderr.data.len());
        all.extend_from_slice(&streams.stdout.data);
        all.extend_from_slice(&streams.stderr.data);
        String::from_utf8_lossy(&all).into_owned()
    }

    /// Consumes up to `max_bytes` (0 for everything), stdout first.
    pub fn take_output(&self, max_bytes: usize) -> String {
        let mut streams = self.streams.write();
        let limit = if max_bytes == 0 { usize::MAX } else { max_bytes };

        let mut taken = streams.stdout.drain_front(limit);
        let remaining = limit.saturating_sub(taken.len());
        if remaining > 0 && streams.stdout.data.is_empty() {
            taken.extend(streams.stderr.drain_front(remaining));
        }

        String::from_utf8_lossy(&taken).into_owned()
    }

    /// Empties both streams but keeps their capacity.
    pub fn clear(&self) {
        let mut streams = self.streams.write();
        streams.stdout.data.clear();
        streams.stderr.data.clear();
    }

    pub fn has_data(&self) -> bool {
        let streams = self.streams.read();
        !streams.stdout.data.is_empty() || !streams.stderr.data.is_empty()
    }

    pub fn stdout_size(&self) -> usize {
        self.streams.read().stdout.data.len()
    }

    pub fn stderr_size(&self) -> usize {
        self.streams.read().stderr.data.len()
    }

    /// Allocated capacity of (stdout, stderr).
    pub fn capacities(&self) -> (usize, usize) {
        let streams = self.streams.read();
        (streams.stdout.data.capacity(), streams.stderr.data.capacity())
    }
}
