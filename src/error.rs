/// Errors reported by the timeslot session manager
///
/// The first group is returned synchronously from the lifecycle API of
/// [`Session`](crate::timeslot::Session). The second group is delivered asynchronously through
/// the `error` callback from the worker context.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Malformed arguments passed to `open` or `start`
    InvalidParam,
    /// `open` was called on a session which is already open
    SessionAlreadyOpen,
    /// `start` was called while a timeslot sequence is running or being stopped
    AlreadyStarted,
    /// `stop` was called while no timeslot sequence is running
    NoTimeslotStarted,
    /// The first timeslot could not be obtained within the skipped tolerance
    AnchorFailed,
    /// A running periodic sequence lost more consecutive timeslots than tolerated
    Cancelled,
    /// The application did not vacate the timeslot before it ended
    Overstayed,
    /// The multiplexer violated the timeslot protocol
    Internal,
    /// The multiplexer driver rejected a call with the given error code
    Multiplexer(i32),
}
