use crate::domain::{Phase, StreamTiming, TimeMs};

/// Recompute the phase from the clock.
///
/// Terminal phases are returned unchanged; every other phase is derived from
/// `now` alone, so the function may be called any number of times.
pub fn next_phase(
    current: Phase,
    now: TimeMs,
    bootstrapping_start: TimeMs,
    stream_start: TimeMs,
    stream_end: TimeMs,
) -> Phase {
    if current.is_terminal() {
        return current;
    }
    if now < bootstrapping_start {
        Phase::Waiting
    } else if now < stream_start {
        Phase::Bootstrapping
    } else if now < stream_end {
        Phase::Active
    } else {
        Phase::Ended
    }
}

/// [`next_phase`] with the checkpoints taken from a timing configuration.
pub fn phase_at(current: Phase, now: TimeMs, timing: &StreamTiming) -> Phase {
    next_phase(
        current,
        now,
        timing.bootstrapping_start,
        timing.stream_start,
        timing.stream_end,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(current: Phase, now: i64) -> Phase {
        next_phase(current, TimeMs(now), TimeMs(100), TimeMs(200), TimeMs(300))
    }

    #[test]
    fn test_time_driven_phases() {
        assert_eq!(at(Phase::Waiting, 99), Phase::Waiting);
        assert_eq!(at(Phase::Waiting, 100), Phase::Bootstrapping);
        assert_eq!(at(Phase::Waiting, 199), Phase::Bootstrapping);
        assert_eq!(at(Phase::Bootstrapping, 200), Phase::Active);
        assert_eq!(at(Phase::Active, 299), Phase::Active);
        assert_eq!(at(Phase::Active, 300), Phase::Ended);
        assert_eq!(at(Phase::Ended, 10_000), Phase::Ended);
    }

    #[test]
    fn test_terminal_phases_are_sticky() {
        for terminal in [Phase::SettledSuccess, Phase::SettledRefund, Phase::Cancelled] {
            for now in [0, 150, 250, 350] {
                assert_eq!(at(terminal, now), terminal);
            }
        }
    }

    #[test]
    fn test_equal_checkpoints_skip_phases() {
        let phase = next_phase(
            Phase::Waiting,
            TimeMs(100),
            TimeMs(100),
            TimeMs(100),
            TimeMs(100),
        );
        assert_eq!(phase, Phase::Ended);
    }
}
