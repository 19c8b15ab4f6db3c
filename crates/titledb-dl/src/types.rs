/// Download progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// `total` is 0 when the server did not announce a length.
    Starting { total: u64 },
    Chunk { current: u64, total: u64 },
    Complete { total: u64 },
}
