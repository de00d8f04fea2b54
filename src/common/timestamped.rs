/// A value tagged with the time it was produced, in seconds since the start
/// of the event stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamped<T> {
    pub t: f64,
    pub v: T,
}

impl<T> Timestamped<T> {
    pub fn new(t: f64, v: T) -> Self {
        Timestamped { t, v }
    }
}
