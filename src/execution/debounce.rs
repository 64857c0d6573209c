use crate::models::{PositionRecord, Signal};

/// Suppress the first occurrence of a new directional signal
///
/// A LONG/SHORT that differs from the last observed signal is recorded but not
/// acted on; the direction has to persist into a second cycle before it becomes
/// actionable. Returns the updated record and the effective signal, `None`
/// meaning "no action this cycle".
pub fn debounce(raw: Signal, mut record: PositionRecord) -> (PositionRecord, Option<Signal>) {
    if raw.is_directional() && raw != record.last_signal {
        tracing::info!(
            "First appearance of {} (last was {}), recording without trading",
            raw,
            record.last_signal
        );
        record.last_signal = raw;
        return (record, None);
    }

    record.last_signal = raw;
    (record, Some(raw))
}
